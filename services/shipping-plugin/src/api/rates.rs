//! Rate pipeline: quote, snapshot, return display rates.
use crate::api::types::{ResultResponse, ShippingRate, ShippingRateRequest};
use crate::api::{
    ServiceError, client_id_from_request, resolve_request_currency, snapshot_address,
    snapshot_customs, snapshot_insurance,
};
use crate::app::AppState;
use crate::auth::AuthTenant;
use crate::currency::{cad_cents_from_amount, cad_cents_to_display_cents, ounces_to_kilograms};
use crate::options;
use crate::snapshot::{
    DestinationSnapshot, OriginSnapshot, ParcelMetrics, RateSnapshot, new_rate_id,
};
use axum::Json;
use axum::extract::{Extension, State};
use axum::http::HeaderMap;
use chrono::{NaiveDate, Utc};
use portage_canpost::normalize_postal_code;
use portage_canpost::types::{
    Dimensions, ParcelCharacteristics, PriceQuote, RateDestination, RateRequest,
};
use std::collections::HashMap;

pub(crate) const CARRIER_NAME: &str = "Canada Post";

pub async fn get_shipping_rate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthTenant>,
    headers: HeaderMap,
    Json(request): Json<ShippingRateRequest>,
) -> Json<ResultResponse> {
    match fetch_rates(&state, &headers, &auth, &request).await {
        Ok(rates) => {
            let mut response = ResultResponse::ok("GetShippingRate OK");
            response.shipping_rates = Some(rates);
            Json(response)
        }
        Err(err) => {
            tracing::warn!(code = err.code(), message = err.message(), "GetShippingRate rejected");
            Json(err.into_response())
        }
    }
}

async fn fetch_rates(
    state: &AppState,
    headers: &HeaderMap,
    auth: &AuthTenant,
    request: &ShippingRateRequest,
) -> Result<Vec<ShippingRate>, ServiceError> {
    let ship_request = request
        .ship_request
        .as_ref()
        .ok_or_else(|| ServiceError::Validation("missing ship_request".to_string()))?;

    let bag = options::bag_from_pairs(
        request
            .shippingpluginreqeust_custom_info
            .iter()
            .map(|item| (item.field_name.as_str(), item.field_value.as_str())),
    );
    options::validate_values(&bag)?;

    let client_id = client_id_from_request(auth, request);
    let currency = resolve_request_currency(headers, request);
    let rate_to_cad = if currency == "CAD" {
        1.0
    } else {
        if client_id == 0 {
            return Err(ServiceError::Validation(
                "client_id required for currency conversion".to_string(),
            ));
        }
        state
            .store
            .load_currency_rate(client_id, &currency)
            .await?
            .ok_or_else(|| {
                ServiceError::Validation(format!("missing conversion rate for {currency}"))
            })?
    };

    let shipper = snapshot_address(ship_request.shipper.as_ref());
    let customer = snapshot_address(ship_request.customer.as_ref());
    let dest_country = if customer.country_code.is_empty() {
        "CA".to_string()
    } else {
        customer.country_code.clone()
    };

    options::validate_rules(
        &bag,
        &ship_request.signature,
        &customer.phone,
        &dest_country,
        rate_to_cad,
    )?;

    let parcel = ship_request
        .parcel
        .as_ref()
        .ok_or_else(|| ServiceError::Validation("parcel is required".to_string()))?;
    if parcel.weight <= 0.0 {
        return Err(ServiceError::Validation(
            "parcel weight is required".to_string(),
        ));
    }
    let weight_kg = ounces_to_kilograms(parcel.weight);
    let dimensions = parcel.parcel_dimensions.clone().unwrap_or_default();

    let settings = if client_id > 0 {
        state
            .store
            .load_shipping_settings(client_id)
            .await?
            .unwrap_or_default()
    } else {
        Default::default()
    };

    let mut origin_postal = normalize_postal_code(&shipper.zip);
    if origin_postal.is_empty() {
        origin_postal = normalize_postal_code(&settings.default_postal_code);
    }
    if origin_postal.is_empty() {
        return Err(ServiceError::Validation(
            "origin postal code is required".to_string(),
        ));
    }

    let dest_postal = if dest_country == "CA" {
        normalize_postal_code(&customer.zip)
    } else {
        customer.zip.clone()
    };

    let customer_number = if settings.account_number.trim().is_empty() {
        state.config.canpost_customer_number.clone()
    } else {
        settings.account_number.trim().to_string()
    };

    let rate_options = options::build_rate_options(&bag, rate_to_cad, &ship_request.signature)?;
    let carrier_request = RateRequest::new(
        if customer_number.is_empty() {
            None
        } else {
            Some(customer_number)
        },
        rate_options,
        ParcelCharacteristics {
            weight: weight_kg,
            dimensions: if dimensions.length > 0.0 && dimensions.width > 0.0 && dimensions.height > 0.0
            {
                Some(Dimensions {
                    length: dimensions.length,
                    width: dimensions.width,
                    height: dimensions.height,
                })
            } else {
                None
            },
        },
        origin_postal.clone(),
        RateDestination::for_country(&dest_country, &dest_postal),
    );

    let response = state
        .carrier
        .get_rates(&carrier_request)
        .await
        .map_err(|err| ServiceError::Validation(err.to_string()))?;

    let best = cheapest_per_service(&response.price_quotes);

    let mut rates = Vec::with_capacity(best.len());
    for quote in best {
        let service_code = quote.service_code.trim().to_string();
        // An empty enabled-service set disables quoting entirely.
        if !settings.service_enabled(&service_code) {
            continue;
        }

        let price_cents = cad_cents_from_amount(quote.price_details.due);
        let service_name = if quote.service_name.trim().is_empty() {
            fallback_service_name(&service_code)
        } else {
            quote.service_name.trim().to_string()
        };
        let delivery_date = quote.service_standard.expected_delivery_date.trim().to_string();

        let rate_id = new_rate_id();
        let snapshot = RateSnapshot {
            rate_id: rate_id.clone(),
            service_code: service_code.clone(),
            service_name: service_name.clone(),
            price_cents,
            currency_code: currency.clone(),
            rate_to_cad,
            delivery_date: delivery_date.clone(),
            signature: ship_request.signature.trim().to_string(),
            custom_options: bag.clone(),
            shipper: shipper.clone(),
            customer: customer.clone(),
            parcel: ParcelMetrics {
                weight: weight_kg,
                length: dimensions.length,
                width: dimensions.width,
                height: dimensions.height,
            },
            customs_info: ship_request.customs_info.as_ref().map(snapshot_customs),
            insurance: snapshot_insurance(
                ship_request
                    .parcel
                    .as_ref()
                    .and_then(|parcel| parcel.insurance.as_ref()),
            ),
            origin: OriginSnapshot {
                postal_code: origin_postal.clone(),
                address_line: shipper.street1.clone(),
                city: shipper.city.clone(),
                province: province_of(&shipper),
            },
            destination: DestinationSnapshot {
                country: dest_country.clone(),
                postal_code: dest_postal.clone(),
                address_line: customer.street1.clone(),
                city: customer.city.clone(),
                province: province_of(&customer),
            },
            invoice_uuid: ship_request.invoice_uuid.trim().to_string(),
            client_id,
            created_at: Utc::now(),
        };
        state.snapshots.save(&snapshot).await?;

        rates.push(ShippingRate {
            shippingrate_id: rate_id,
            shippingrate_carrier_name: CARRIER_NAME.to_string(),
            shippingrate_service_name: service_name,
            shippingrate_price: cad_cents_to_display_cents(price_cents, rate_to_cad),
            shippingrate_delivery_days: delivery_days_from_date(&delivery_date),
            shippingrate_delivery_date: delivery_date,
            shippingrate_delivery_date_guaranteed: quote.service_standard.guaranteed_delivery,
        });
    }
    Ok(rates)
}

fn province_of(address: &crate::snapshot::AddressSnapshot) -> String {
    if !address.province_code.is_empty() {
        address.province_code.clone()
    } else {
        address.province.clone()
    }
}

/// Cheapest quote per service code; the first-seen quote wins ties, and
/// service codes keep their response order.
fn cheapest_per_service(quotes: &[PriceQuote]) -> Vec<&PriceQuote> {
    let mut order: Vec<&str> = Vec::with_capacity(quotes.len());
    let mut best: HashMap<&str, &PriceQuote> = HashMap::with_capacity(quotes.len());
    for quote in quotes {
        let code = quote.service_code.trim();
        if code.is_empty() {
            continue;
        }
        match best.get(code) {
            None => {
                order.push(code);
                best.insert(code, quote);
            }
            Some(existing) if quote.price_details.due < existing.price_details.due => {
                best.insert(code, quote);
            }
            Some(_) => {}
        }
    }
    order.into_iter().map(|code| best[code]).collect()
}

/// Days until the expected delivery date, rounded up; 0 for past or
/// unparseable dates.
pub(crate) fn delivery_days_from_date(delivery_date: &str) -> u32 {
    let delivery_date = delivery_date.trim();
    if delivery_date.is_empty() {
        return 0;
    }
    let Ok(date) = NaiveDate::parse_from_str(delivery_date, "%Y-%m-%d") else {
        return 0;
    };
    let delta = date.and_time(chrono::NaiveTime::MIN).and_utc() - Utc::now();
    let hours = delta.num_hours();
    if hours <= 0 {
        return 0;
    }
    (hours as u32).div_ceil(24)
}

pub(crate) fn fallback_service_name(service_code: &str) -> String {
    match service_code.trim().to_uppercase().as_str() {
        "DOM.RP" => "Regular Parcel".to_string(),
        "DOM.EP" => "Expedited Parcel".to_string(),
        "DOM.XP" => "Xpresspost".to_string(),
        "DOM.PC" => "Priority".to_string(),
        "USA.EP" => "Expedited Parcel USA".to_string(),
        "USA.XP" => "Xpresspost USA".to_string(),
        "USA.TP" => "Tracked Packet USA".to_string(),
        "USA.SP.AIR" => "Small Packet USA Air".to_string(),
        "INT.XP" => "Xpresspost International".to_string(),
        "INT.TP" => "Tracked Packet International".to_string(),
        "INT.IP.AIR" => "International Parcel Air".to_string(),
        "INT.IP.SURF" => "International Parcel Surface".to_string(),
        other => humanize_code(other),
    }
}

/// Readable rendition of a raw code: separators become spaces.
pub(crate) fn humanize_code(value: &str) -> String {
    value
        .replace(['_', '-', '.'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
