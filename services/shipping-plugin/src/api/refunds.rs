//! Refund pipeline: load the label record, look up the buyer email, post
//! the refund request to the carrier.
use crate::api::types::{ResultResponse, ShippingRateRequest};
use crate::api::{ServiceError, client_id_from_request};
use crate::app::AppState;
use crate::auth::AuthTenant;
use crate::peers::PeerAuth;
use axum::Json;
use axum::extract::{Extension, State};
use axum::http::HeaderMap;

pub async fn refund_shipment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthTenant>,
    headers: HeaderMap,
    Json(request): Json<ShippingRateRequest>,
) -> Json<ResultResponse> {
    match refund_inner(&state, &headers, &auth, &request).await {
        Ok(message) => Json(ResultResponse::ok(message)),
        Err(err) => {
            tracing::warn!(code = err.code(), message = err.message(), "RefundShipment rejected");
            Json(err.into_response())
        }
    }
}

async fn refund_inner(
    state: &AppState,
    headers: &HeaderMap,
    auth: &AuthTenant,
    request: &ShippingRateRequest,
) -> Result<String, ServiceError> {
    let ship_request = request
        .ship_request
        .as_ref()
        .ok_or_else(|| ServiceError::Validation("RefundShipment missing ship_request".to_string()))?;
    let label_id = ship_request.label_id.trim();
    if label_id.is_empty() {
        return Err(ServiceError::Validation(
            "RefundShipment missing label_id".to_string(),
        ));
    }

    let record = state
        .store
        .load_label_record(label_id)
        .await
        .map_err(|err| {
            tracing::error!(label_id, error = %ServiceError::from(err).message(), "failed to load label record");
            ServiceError::Internal("RefundShipment failed to load label record".to_string())
        })?
        .ok_or_else(|| ServiceError::NotFound("RefundShipment label not found".to_string()))?;

    if record.refund_link.trim().is_empty() {
        return Err(ServiceError::Validation(
            "RefundShipment refund link not found".to_string(),
        ));
    }
    if record.invoice_uuid.trim().is_empty() {
        return Err(ServiceError::Validation(
            "RefundShipment invoice uuid not found".to_string(),
        ));
    }
    tracing::info!(
        label_id,
        invoice_uuid = %record.invoice_uuid,
        "refund shipment requested"
    );

    let client_id = client_id_from_request(auth, request);
    let access_token = if client_id > 0 {
        state
            .store
            .load_access_token(client_id)
            .await?
            .unwrap_or_default()
    } else {
        String::new()
    };

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .trim()
            .to_string()
    };
    let peer_auth = PeerAuth {
        access_token,
        incoming_authorization: header("authorization"),
        incoming_client_id: header("x-client-id"),
        incoming_request_source: header("x-request-source"),
        client_id,
    };

    // Canada Post requires an email on the refund request; it belongs to
    // the order, which only the orders service knows.
    let email = state
        .orders
        .customer_email(&peer_auth, &record.invoice_uuid)
        .await
        .map_err(|err| {
            tracing::error!(invoice_uuid = %record.invoice_uuid, error = %err, "failed to fetch customer email from orders");
            match err {
                crate::peers::PeerError::MissingAddress => {
                    ServiceError::Config("orders service address not configured".to_string())
                }
                _ => ServiceError::Internal(
                    "RefundShipment failed to load customer email".to_string(),
                ),
            }
        })?;
    if email.trim().is_empty() {
        return Err(ServiceError::Validation(
            "customer email missing (required by Canada Post refund request)".to_string(),
        ));
    }

    let ticket = state
        .carrier
        .refund_shipment(&record.refund_link, &email)
        .await
        .map_err(|err| ServiceError::Validation(err.to_string()))?;

    let ticket_id = ticket.service_ticket_id.trim().to_string();
    let ticket_date = ticket.service_ticket_date.trim().to_string();
    tracing::info!(ticket_id = %ticket_id, ticket_date = %ticket_date, "refund ticket issued");
    Ok(format!(
        "RefundShipment OK ticket_id={ticket_id} ticket_date={ticket_date}"
    ))
}
