//! Basic-auth HTTPS client for the non-contract shipping services.
//!
//! # Purpose
//! Marshals requests into the carrier's namespaced XML, performs the HTTPS
//! calls, and decodes both success and `<messages>` error envelopes into
//! typed results.
//!
//! # Notes
//! Request XML is logged at debug level; credentials never are.
use crate::error::CarrierError;
use crate::postoffice::{PostOffice, PostOfficeList};
use crate::types::{
    Messages, RateRequest, RateResponse, RefundRequest, RefundTicket, ShipmentRequest,
    ShipmentResponse,
};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

const RATE_CONTENT_TYPE: &str = "application/vnd.cpc.ship.rate-v4+xml";
const NCSHIPMENT_CONTENT_TYPE: &str = "application/vnd.cpc.ncshipment-v4+xml";
const POSTOFFICE_CONTENT_TYPE: &str = "application/vnd.cpc.postoffice+xml";
const ACCEPT_LANGUAGE: &str = "en-CA";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Seam between the pipelines and the wire client so tests can substitute a
/// stub carrier.
#[async_trait]
pub trait CarrierApi: Send + Sync {
    async fn get_rates(&self, request: &RateRequest) -> Result<RateResponse, CarrierError>;
    async fn create_shipment(
        &self,
        request: &ShipmentRequest,
    ) -> Result<ShipmentResponse, CarrierError>;
    async fn get_artifact(&self, url: &str) -> Result<Vec<u8>, CarrierError>;
    async fn refund_shipment(
        &self,
        refund_url: &str,
        email: &str,
    ) -> Result<RefundTicket, CarrierError>;
    async fn find_post_offices(&self, postal_code: &str) -> Result<Vec<PostOffice>, CarrierError>;
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    username: String,
    password: String,
    customer_number: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        customer_number: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, CarrierError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            customer_number: customer_number.into(),
            http,
        })
    }

    pub fn customer_number(&self) -> &str {
        &self.customer_number
    }

    async fn post_xml(
        &self,
        url: &str,
        content_type: &str,
        body: String,
    ) -> Result<(u16, String), CarrierError> {
        let response = self
            .http
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Content-Type", content_type)
            .header("Accept", content_type)
            .header("Accept-Language", ACCEPT_LANGUAGE)
            .body(body)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }
}

/// Serializes `value` as an XML document rooted at `root`.
pub fn to_xml<T: Serialize>(root: &str, value: &T) -> Result<String, CarrierError> {
    let mut buf = String::new();
    let serializer = quick_xml::se::Serializer::with_root(&mut buf, Some(root))
        .map_err(|err| CarrierError::Decode(err.to_string()))?;
    value
        .serialize(serializer)
        .map_err(|err| CarrierError::Decode(err.to_string()))?;
    Ok(buf)
}

pub fn from_xml<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, CarrierError> {
    quick_xml::de::from_str(body).map_err(|err| CarrierError::Decode(err.to_string()))
}

/// First message of a `<messages>` envelope, if the body is one.
pub fn parse_message_envelope(body: &str) -> Option<(String, String)> {
    let envelope: Messages = quick_xml::de::from_str(body).ok()?;
    let first = envelope.messages.first()?;
    let code = first.code.trim().to_string();
    let description = first.description.trim().to_string();
    if code.is_empty() && description.is_empty() {
        return None;
    }
    Some((code, description))
}

fn envelope_error(status: u16, body: &str) -> CarrierError {
    match parse_message_envelope(body) {
        Some((code, description)) => CarrierError::Api {
            status,
            code,
            description,
        },
        None => CarrierError::Status {
            status,
            body: body.to_string(),
        },
    }
}

/// Decodes a refund response body: a ticket on success, a message envelope
/// on rejection, anything else is a decode failure.
pub fn parse_refund_response(status: u16, body: &str) -> Result<RefundTicket, CarrierError> {
    if body.trim().is_empty() {
        return Err(CarrierError::Decode("refund response is empty".to_string()));
    }
    if let Ok(ticket) = quick_xml::de::from_str::<RefundTicket>(body)
        && !ticket.is_empty()
    {
        return Ok(ticket);
    }
    if let Some((code, description)) = parse_message_envelope(body) {
        return Err(CarrierError::Api {
            status,
            code,
            description,
        });
    }
    Err(CarrierError::Decode(
        "unexpected refund response payload".to_string(),
    ))
}

#[async_trait]
impl CarrierApi for Client {
    async fn get_rates(&self, request: &RateRequest) -> Result<RateResponse, CarrierError> {
        let xml = to_xml("mailing-scenario", request)?;
        tracing::debug!(request = %xml, "canada post rate request");

        let url = format!("{}/rs/ship/price", self.base_url);
        let (status, body) = self.post_xml(&url, RATE_CONTENT_TYPE, xml).await?;
        tracing::debug!(status, response = %body, "canada post rate response");

        if !(200..300).contains(&status) {
            return Err(envelope_error(status, &body));
        }
        if let Some((code, description)) = parse_message_envelope(&body) {
            return Err(CarrierError::Api {
                status,
                code,
                description,
            });
        }
        from_xml(&body)
    }

    async fn create_shipment(
        &self,
        request: &ShipmentRequest,
    ) -> Result<ShipmentResponse, CarrierError> {
        let xml = to_xml("non-contract-shipment", request)?;
        tracing::debug!(request = %xml, "canada post shipment request");

        let url = format!("{}/rs/{}/ncshipment", self.base_url, self.customer_number);
        let (status, body) = self.post_xml(&url, NCSHIPMENT_CONTENT_TYPE, xml).await?;
        tracing::debug!(status, response = %body, "canada post shipment response");

        if status != 200 && status != 201 {
            return Err(envelope_error(status, &body));
        }
        if let Some((code, description)) = parse_message_envelope(&body) {
            return Err(CarrierError::Api {
                status,
                code,
                description,
            });
        }
        from_xml(&body)
    }

    async fn get_artifact(&self, url: &str) -> Result<Vec<u8>, CarrierError> {
        let response = self
            .http
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/pdf")
            .send()
            .await?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(CarrierError::Status {
                status,
                body: format!("failed to download artifact: status {status}"),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn refund_shipment(
        &self,
        refund_url: &str,
        email: &str,
    ) -> Result<RefundTicket, CarrierError> {
        let refund_url = refund_url.trim();
        if refund_url.is_empty() {
            return Err(CarrierError::Decode("refund url is required".to_string()));
        }
        let email = email.trim();
        if email.is_empty() {
            return Err(CarrierError::Decode("refund email is required".to_string()));
        }

        let request = RefundRequest::new(email.to_string());
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}",
            to_xml("non-contract-shipment-refund-request", &request)?
        );
        tracing::debug!(url = %refund_url, request = %xml, "canada post refund request");

        let (status, body) = self
            .post_xml(refund_url, NCSHIPMENT_CONTENT_TYPE, xml)
            .await?;
        tracing::debug!(status, response = %body, "canada post refund response");

        if status == 404 {
            return Err(CarrierError::refund_not_found());
        }
        if !(200..300).contains(&status) {
            return Err(envelope_error(status, &body));
        }
        parse_refund_response(status, &body)
    }

    async fn find_post_offices(&self, postal_code: &str) -> Result<Vec<PostOffice>, CarrierError> {
        let url = format!("{}/rs/postoffice", self.base_url);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", POSTOFFICE_CONTENT_TYPE)
            .header("Accept-Language", ACCEPT_LANGUAGE)
            .query(&[("d2po", "true"), ("postalCode", postal_code)])
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        tracing::debug!(status, response = %body, "canada post post-office response");

        if status != 200 {
            return Err(envelope_error(status, &body));
        }
        let list: PostOfficeList = from_xml(&body)?;
        Ok(list.post_offices.into_iter().map(PostOffice::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refund_success_body_parses_to_ticket() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
<non-contract-shipment-refund-request-info xmlns="http://www.canadapost.ca/ws/ncshipment-v4">
  <service-ticket-date>2026-02-03</service-ticket-date>
  <service-ticket-id>0123456789</service-ticket-id>
</non-contract-shipment-refund-request-info>"#;

        let ticket = parse_refund_response(200, body).expect("ticket");
        assert_eq!(ticket.service_ticket_id, "0123456789");
        assert_eq!(ticket.service_ticket_date, "2026-02-03");
    }

    #[test]
    fn refund_message_envelope_becomes_api_error() {
        let body = r#"<messages>
  <message>
    <code>7292</code>
    <description>Refund already submitted</description>
  </message>
</messages>"#;

        match parse_refund_response(200, body) {
            Err(CarrierError::Api {
                code, description, ..
            }) => {
                assert_eq!(code, "7292");
                assert_eq!(description, "Refund already submitted");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn refund_unexpected_payload_is_decode_error() {
        match parse_refund_response(200, "<html>oops</html>") {
            Err(CarrierError::Decode(_)) => {}
            other => panic!("expected Decode error, got {other:?}"),
        }
    }

    #[test]
    fn message_envelope_with_empty_fields_is_ignored() {
        assert!(parse_message_envelope("<messages><message><code/><description/></message></messages>").is_none());
        assert!(parse_message_envelope("<price-quotes></price-quotes>").is_none());
    }

    async fn spawn_upstream(app: axum::Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn refund_404_maps_to_typed_error() {
        let app = axum::Router::new().route(
            "/refund",
            axum::routing::post(|| async { axum::http::StatusCode::NOT_FOUND }),
        );
        let base = spawn_upstream(app).await;

        let client = Client::new("user", "pass", "123", base.clone()).expect("client");
        let err = client
            .refund_shipment(&format!("{base}/refund"), "name@example.ca")
            .await
            .expect_err("404");
        match err {
            CarrierError::Api {
                status,
                code,
                description,
            } => {
                assert_eq!(status, 404);
                assert_eq!(code, "404");
                assert_eq!(description, "invalid shipment id or refund link");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_rates_sends_basic_auth_and_parses_quotes() {
        let app = axum::Router::new().route(
            "/rs/ship/price",
            axum::routing::post(|headers: axum::http::HeaderMap, body: String| async move {
                assert!(
                    headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        .is_some_and(|value| value.starts_with("Basic ")),
                    "missing basic auth"
                );
                assert_eq!(
                    headers.get("accept-language").and_then(|v| v.to_str().ok()),
                    Some("en-CA")
                );
                assert!(body.contains("<mailing-scenario"));
                (
                    [("content-type", "application/vnd.cpc.ship.rate-v4+xml")],
                    r#"<price-quotes xmlns="http://www.canadapost.ca/ws/ship/rate-v4">
                         <price-quote>
                           <service-code>DOM.EP</service-code>
                           <service-name>Expedited Parcel</service-name>
                           <price-details><due>14.30</due></price-details>
                         </price-quote>
                       </price-quotes>"#,
                )
            }),
        );
        let base = spawn_upstream(app).await;

        let client = Client::new("user", "pass", "123", base).expect("client");
        let request = crate::types::RateRequest::new(
            None,
            Vec::new(),
            crate::types::ParcelCharacteristics {
                weight: 0.5,
                dimensions: None,
            },
            "M5V1E3".to_string(),
            crate::types::RateDestination::for_country("CA", "H2X1Y4"),
        );
        let response = client.get_rates(&request).await.expect("rates");
        assert_eq!(response.price_quotes.len(), 1);
        assert_eq!(response.price_quotes[0].service_code, "DOM.EP");
        assert_eq!(response.price_quotes[0].price_details.due, 14.30);
    }

    #[tokio::test]
    async fn ok_status_with_message_envelope_is_still_an_error() {
        let app = axum::Router::new().route(
            "/rs/ship/price",
            axum::routing::post(|| async {
                r#"<messages xmlns="http://www.canadapost.ca/ws/messages">
                     <message><code>9111</code><description>postal code mismatch</description></message>
                   </messages>"#
            }),
        );
        let base = spawn_upstream(app).await;

        let client = Client::new("user", "pass", "123", base).expect("client");
        let request = crate::types::RateRequest::new(
            None,
            Vec::new(),
            crate::types::ParcelCharacteristics {
                weight: 0.5,
                dimensions: None,
            },
            "M5V1E3".to_string(),
            crate::types::RateDestination::for_country("CA", "H2X1Y4"),
        );
        match client.get_rates(&request).await {
            Err(CarrierError::Api { code, .. }) => assert_eq!(code, "9111"),
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
