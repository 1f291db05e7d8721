//! Outbound peer RPC clients.
//!
//! # Purpose
//! The refund pipeline needs the buyer's email address, owned by the orders
//! service. The peer accepts different authorization header shapes depending
//! on deployment, so calls sweep a fixed, deduplicated list of
//! `(authorization, x-force-auth)` attempts and stop at the first success.
//! There is no unbounded retry: the sweep is the only retry pattern.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("orders service address is required")]
    MissingAddress,
    #[error("invoice uuid is required")]
    MissingInvoice,
    #[error("authorization is missing for orders request")]
    MissingAuthorization,
    #[error("orders request failed: {0}")]
    Transport(String),
    #[error("orders request rejected: {0}")]
    Rejected(String),
}

/// Credentials and forwarded metadata available for an outbound peer call.
#[derive(Debug, Clone, Default)]
pub struct PeerAuth {
    /// Tenant's stored OAuth access token, the primary credential.
    pub access_token: String,
    /// `authorization` header from the inbound request, used as fallback.
    pub incoming_authorization: String,
    /// `x-client-id` from the inbound request, forwarded verbatim.
    pub incoming_client_id: String,
    /// `x-request-source` from the inbound request, forwarded verbatim.
    pub incoming_request_source: String,
    /// Authenticated tenant id, used when no incoming client id exists.
    pub client_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AuthAttempt {
    pub label: &'static str,
    pub authorization: String,
    pub force_auth: bool,
}

/// Header-shape sweep: bearer+force, bearer, raw+force, raw. Identical
/// shapes are deduplicated and the empty token yields no attempts.
pub(crate) fn build_auth_attempts(token: &str) -> Vec<AuthAttempt> {
    let token = token.trim();
    if token.is_empty() {
        return Vec::new();
    }
    let raw = if token.len() >= 7 && token[..7].eq_ignore_ascii_case("bearer ") {
        token[7..].trim()
    } else {
        token
    };
    if raw.is_empty() {
        return Vec::new();
    }
    let bearer = format!("Bearer {raw}");

    let candidates = [
        AuthAttempt {
            label: "bearer+x-force-auth",
            authorization: bearer.clone(),
            force_auth: true,
        },
        AuthAttempt {
            label: "bearer",
            authorization: bearer,
            force_auth: false,
        },
        AuthAttempt {
            label: "raw+x-force-auth",
            authorization: raw.to_string(),
            force_auth: true,
        },
        AuthAttempt {
            label: "raw",
            authorization: raw.to_string(),
            force_auth: false,
        },
    ];

    let mut filtered: Vec<AuthAttempt> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if filtered
            .iter()
            .any(|seen| seen.authorization == candidate.authorization && seen.force_auth == candidate.force_auth)
        {
            continue;
        }
        filtered.push(candidate);
    }
    filtered
}

/// Masks the local part of an email before it reaches logs.
pub(crate) fn redact_email(value: &str) -> String {
    let value = value.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return value.to_string();
    };
    if local.len() <= 2 {
        format!("***@{domain}")
    } else {
        format!("{}***@{domain}", &local[..2])
    }
}

#[async_trait]
pub trait OrdersApi: Send + Sync {
    /// Looks up the buyer email for an invoice. An empty string means the
    /// order exists but carries no email.
    async fn customer_email(&self, auth: &PeerAuth, invoice_uuid: &str)
    -> Result<String, PeerError>;
}

#[derive(Debug, Serialize)]
struct OrdersInvoiceRequest<'a> {
    invoice_uuid: &'a str,
    show_only_unpaid_items: bool,
}

#[derive(Debug, Default, Deserialize)]
struct OrdersInvoiceResponse {
    #[serde(default)]
    invoice: Option<OrdersInvoice>,
}

#[derive(Debug, Default, Deserialize)]
struct OrdersInvoice {
    #[serde(default)]
    #[allow(dead_code)]
    invoice_id: String,
    #[serde(default)]
    customers_email_address: String,
}

#[derive(Debug, Clone)]
pub struct HttpOrdersClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpOrdersClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, PeerError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|err| PeerError::Transport(err.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn call_once(
        &self,
        auth: &PeerAuth,
        attempt: &AuthAttempt,
        invoice_uuid: &str,
    ) -> Result<Result<String, String>, PeerError> {
        let mut request = self
            .http
            .post(format!("{}/v1/orders/invoice", self.base_url))
            .header("authorization", &attempt.authorization)
            .json(&OrdersInvoiceRequest {
                invoice_uuid,
                show_only_unpaid_items: false,
            });
        if attempt.force_auth {
            request = request.header("x-force-auth", "true");
        }
        if !auth.incoming_client_id.trim().is_empty() {
            request = request.header("x-client-id", auth.incoming_client_id.trim());
        } else if auth.client_id > 0 {
            request = request.header("x-client-id", auth.client_id.to_string());
        }
        if !auth.incoming_request_source.trim().is_empty() {
            request = request.header("x-request-source", auth.incoming_request_source.trim());
        }

        let response = request
            .send()
            .await
            .map_err(|err| PeerError::Transport(err.to_string()))?;
        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            // Wrong header shape for this peer; let the sweep continue.
            return Ok(Err(format!("{}: status {}", attempt.label, status)));
        }
        if !status.is_success() {
            return Err(PeerError::Rejected(format!(
                "{}: status {}",
                attempt.label, status
            )));
        }

        let body: OrdersInvoiceResponse = response
            .json()
            .await
            .map_err(|err| PeerError::Transport(err.to_string()))?;
        let email = body
            .invoice
            .map(|invoice| invoice.customers_email_address.trim().to_string())
            .unwrap_or_default();
        tracing::debug!(invoice_uuid, customer_email = %redact_email(&email), "orders invoice lookup");
        Ok(Ok(email))
    }
}

#[async_trait]
impl OrdersApi for HttpOrdersClient {
    async fn customer_email(
        &self,
        auth: &PeerAuth,
        invoice_uuid: &str,
    ) -> Result<String, PeerError> {
        if self.base_url.trim().is_empty() {
            return Err(PeerError::MissingAddress);
        }
        let invoice_uuid = invoice_uuid.trim();
        if invoice_uuid.is_empty() {
            return Err(PeerError::MissingInvoice);
        }

        // The stored token is the primary credential; the caller's own
        // authorization header is the fallback.
        let credential = if !auth.access_token.trim().is_empty() {
            auth.access_token.trim()
        } else {
            auth.incoming_authorization.trim()
        };
        let attempts = build_auth_attempts(credential);
        if attempts.is_empty() {
            return Err(PeerError::MissingAuthorization);
        }

        let mut failures = Vec::with_capacity(attempts.len());
        for attempt in &attempts {
            match self.call_once(auth, attempt, invoice_uuid).await? {
                Ok(email) => return Ok(email),
                Err(failure) => failures.push(failure),
            }
        }
        Err(PeerError::Rejected(failures.join(" | ")))
    }
}
