//! RPC surface: carrier-agnostic operations invoked by the host platform.
//!
//! Business rejections never surface as transport errors; handlers always
//! answer 200 with `ResultResponse { success: false, failure: true, code,
//! message }`. Only auth failures and unrecoverable faults use HTTP status
//! codes.
use crate::api::types::{Address, CustomsInfo, Money, ResultResponse, ShippingRateRequest};
use crate::auth::AuthTenant;
use crate::currency::ounces_to_kilograms;
use crate::snapshot::{
    AddressSnapshot, CustomsItemSnapshot, CustomsSnapshot, InsuranceSnapshot,
};
use crate::store::StoreError;
use axum::http::HeaderMap;

pub mod labels;
pub mod options;
pub mod rates;
pub mod refunds;
pub mod types;

/// Internal error taxonomy; `code` follows the host's HTTP-like strings.
#[derive(Debug)]
pub(crate) enum ServiceError {
    Validation(String),
    NotFound(String),
    Config(String),
    Internal(String),
}

impl ServiceError {
    pub(crate) fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "400",
            ServiceError::NotFound(_) => "404",
            ServiceError::Config(_) | ServiceError::Internal(_) => "500",
        }
    }

    pub(crate) fn message(&self) -> &str {
        match self {
            ServiceError::Validation(message)
            | ServiceError::NotFound(message)
            | ServiceError::Config(message)
            | ServiceError::Internal(message) => message,
        }
    }

    pub(crate) fn into_response(self) -> ResultResponse {
        ResultResponse::rejected(self.code(), self.message())
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Invalid(message) => ServiceError::Validation(message),
            StoreError::Unexpected(err) => ServiceError::Internal(err.to_string()),
        }
    }
}

impl From<crate::snapshot::SnapshotError> for ServiceError {
    fn from(err: crate::snapshot::SnapshotError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<crate::options::OptionError> for ServiceError {
    fn from(err: crate::options::OptionError) -> Self {
        ServiceError::Validation(err.0)
    }
}

/// Tenant id: the request body's store info wins, the authenticated claim
/// is the fallback.
pub(crate) fn client_id_from_request(auth: &AuthTenant, request: &ShippingRateRequest) -> i64 {
    if let Some(store_info) = request
        .shipping_auth
        .as_ref()
        .and_then(|auth| auth.store_info.as_ref())
        && store_info.client_id > 0
    {
        return store_info.client_id;
    }
    auth.0.unwrap_or(0)
}

/// Request currency resolution order: inbound metadata, the ship request's
/// own currency, insurance currency, first customs item currency, first
/// parcel item currency, `CAD`.
pub(crate) fn resolve_request_currency(
    headers: &HeaderMap,
    request: &ShippingRateRequest,
) -> String {
    if let Some(currency) = headers
        .get("x-currency-code")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return currency.to_uppercase();
    }

    let Some(ship_request) = request.ship_request.as_ref() else {
        return "CAD".to_string();
    };
    if !ship_request.currency_code.trim().is_empty() {
        return ship_request.currency_code.trim().to_uppercase();
    }
    if let Some(insurance) = ship_request
        .parcel
        .as_ref()
        .and_then(|parcel| parcel.insurance.as_ref())
        && !insurance.currency_code.trim().is_empty()
    {
        return insurance.currency_code.trim().to_uppercase();
    }
    if let Some(currency) = ship_request
        .customs_info
        .as_ref()
        .and_then(|customs| customs.custom_items.first())
        .and_then(|item| item.total_value.as_ref())
        .map(|money| money.currency_code.trim())
        .filter(|currency| !currency.is_empty())
    {
        return currency.to_uppercase();
    }
    if let Some(currency) = ship_request
        .parcel
        .as_ref()
        .and_then(|parcel| parcel.items.first())
        .and_then(|item| item.price.as_ref())
        .map(|money| money.currency_code.trim())
        .filter(|currency| !currency.is_empty())
    {
        return currency.to_uppercase();
    }
    "CAD".to_string()
}

pub(crate) fn snapshot_address(address: Option<&Address>) -> AddressSnapshot {
    let Some(address) = address else {
        return AddressSnapshot::default();
    };
    AddressSnapshot {
        address_id: address.address_id.trim().to_string(),
        street1: address.street1.trim().to_string(),
        street2: address.street2.trim().to_string(),
        city: address.city.trim().to_string(),
        province: address.province.trim().to_string(),
        zip: address.zip.trim().to_string(),
        phone: address.phone.trim().to_string(),
        full_name: address.full_name.trim().to_string(),
        company: address.company.trim().to_string(),
        country_code: address.country_code.trim().to_uppercase(),
        province_code: address.province_code.trim().to_string(),
        country: address.country.trim().to_string(),
        email: address.email.trim().to_string(),
        first_name: address.first_name.trim().to_string(),
        last_name: address.last_name.trim().to_string(),
    }
}

pub(crate) fn snapshot_customs(customs: &CustomsInfo) -> CustomsSnapshot {
    let mut currency = String::new();
    let items = customs
        .custom_items
        .iter()
        .map(|item| {
            let value = item.total_value.clone().unwrap_or_default();
            if currency.is_empty() {
                currency = value.currency_code.trim().to_string();
            }
            CustomsItemSnapshot {
                description: item.description.trim().to_string(),
                quantity: if item.quantity <= 0 {
                    1
                } else {
                    item.quantity as i32
                },
                total_value_cents: value.amount,
                weight: ounces_to_kilograms(item.weight),
                hs_tariff_number: item.hs_tariff_number.trim().to_string(),
                code: item.code.trim().to_string(),
                origin_country: item.origin_country.trim().to_string(),
            }
        })
        .collect();
    CustomsSnapshot {
        eel_pfc: customs.eel_pfc.trim().to_string(),
        contents_type: customs.contents_type.trim().to_string(),
        contents_explanation: customs.contents_explanation.trim().to_string(),
        restriction_comments: customs.restriction_comments.trim().to_string(),
        currency,
        custom_items: items,
    }
}

pub(crate) fn snapshot_insurance(insurance: Option<&Money>) -> InsuranceSnapshot {
    let Some(insurance) = insurance else {
        return InsuranceSnapshot::default();
    };
    InsuranceSnapshot {
        decimal: insurance.decimal.trim().to_string(),
        currency_code: insurance.currency_code.trim().to_string(),
        amount: insurance.amount,
    }
}

/// Full name for the carrier forms: the explicit full name, else first and
/// last joined.
pub(crate) fn contact_name(address: &AddressSnapshot) -> String {
    if !address.full_name.is_empty() {
        return address.full_name.clone();
    }
    format!("{} {}", address.first_name, address.last_name)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::{CustomItem, Parcel, ParcelItem, ShipRequest};

    fn request_with(ship_request: ShipRequest) -> ShippingRateRequest {
        ShippingRateRequest {
            ship_request: Some(ship_request),
            ..ShippingRateRequest::default()
        }
    }

    #[test]
    fn currency_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-currency-code", "usd".parse().unwrap());
        let request = request_with(ShipRequest {
            currency_code: "EUR".to_string(),
            ..ShipRequest::default()
        });
        assert_eq!(resolve_request_currency(&headers, &request), "USD");
    }

    #[test]
    fn currency_falls_back_through_the_chain() {
        let headers = HeaderMap::new();

        let insurance = request_with(ShipRequest {
            parcel: Some(Parcel {
                insurance: Some(Money {
                    amount: 100,
                    currency_code: "usd".to_string(),
                    decimal: String::new(),
                }),
                ..Parcel::default()
            }),
            ..ShipRequest::default()
        });
        assert_eq!(resolve_request_currency(&headers, &insurance), "USD");

        let customs = request_with(ShipRequest {
            customs_info: Some(CustomsInfo {
                custom_items: vec![CustomItem {
                    total_value: Some(Money {
                        amount: 100,
                        currency_code: "eur".to_string(),
                        decimal: String::new(),
                    }),
                    ..CustomItem::default()
                }],
                ..CustomsInfo::default()
            }),
            ..ShipRequest::default()
        });
        assert_eq!(resolve_request_currency(&headers, &customs), "EUR");

        let parcel_item = request_with(ShipRequest {
            parcel: Some(Parcel {
                items: vec![ParcelItem {
                    price: Some(Money {
                        amount: 100,
                        currency_code: "gbp".to_string(),
                        decimal: String::new(),
                    }),
                    ..ParcelItem::default()
                }],
                ..Parcel::default()
            }),
            ..ShipRequest::default()
        });
        assert_eq!(resolve_request_currency(&headers, &parcel_item), "GBP");

        assert_eq!(
            resolve_request_currency(&headers, &request_with(ShipRequest::default())),
            "CAD"
        );
    }

    #[test]
    fn client_id_prefers_request_body() {
        use crate::api::types::{ShippingAuth, StoreInfo};
        let request = ShippingRateRequest {
            shipping_auth: Some(ShippingAuth {
                store_info: Some(StoreInfo { client_id: 9 }),
            }),
            ..ShippingRateRequest::default()
        };
        assert_eq!(client_id_from_request(&AuthTenant(Some(7)), &request), 9);
        assert_eq!(
            client_id_from_request(&AuthTenant(Some(7)), &ShippingRateRequest::default()),
            7
        );
        assert_eq!(
            client_id_from_request(&AuthTenant(None), &ShippingRateRequest::default()),
            0
        );
    }
}
