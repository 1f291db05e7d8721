//! Label pipeline: resolve the rate snapshot, re-validate, create the
//! shipment, download and persist the PDF, record the label.
use crate::api::rates::{CARRIER_NAME, delivery_days_from_date, fallback_service_name, humanize_code};
use crate::api::types::{LabelResponse, ResultResponse, ShippingRateRequest};
use crate::api::{
    ServiceError, client_id_from_request, contact_name, resolve_request_currency, snapshot_customs,
};
use crate::app::AppState;
use crate::auth::AuthTenant;
use crate::currency::round2;
use crate::options;
use crate::snapshot::RateSnapshot;
use crate::store::LabelRecord;
use axum::Json;
use axum::extract::{Extension, State};
use axum::http::HeaderMap;
use chrono::Utc;
use portage_canpost::types::{
    CustomsItem, CustomsSkuList, DeliverySpec, Destination, DestinationAddressDetails, Dimensions,
    ParcelCharacteristics, Preferences, Sender, SenderAddressDetails, ShipmentCustoms,
    ShipmentOptions, ShipmentRequest,
};
use rand::RngCore;
use std::fmt::Write as _;
use std::path::Path;

pub async fn create_label(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthTenant>,
    headers: HeaderMap,
    Json(request): Json<ShippingRateRequest>,
) -> Json<ResultResponse> {
    match create_label_inner(&state, &headers, &auth, &request).await {
        Ok(label) => {
            let mut response = ResultResponse::ok("CreateLabel OK");
            response.label = Some(label);
            Json(response)
        }
        Err(err) => {
            tracing::warn!(code = err.code(), message = err.message(), "CreateLabel rejected");
            Json(err.into_response())
        }
    }
}

async fn create_label_inner(
    state: &AppState,
    headers: &HeaderMap,
    auth: &AuthTenant,
    request: &ShippingRateRequest,
) -> Result<LabelResponse, ServiceError> {
    let ship_request = request
        .ship_request
        .as_ref()
        .ok_or_else(|| ServiceError::Validation("CreateLabel missing ship_request".to_string()))?;

    let selected_rate_id = ship_request.shipping_rate_id.trim();
    if selected_rate_id.is_empty() {
        return Err(ServiceError::Validation(
            "CreateLabel missing shipping_rate_id".to_string(),
        ));
    }

    let mut snapshot = state
        .snapshots
        .load(selected_rate_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("rate expired or invalid".to_string()))?;
    tracing::debug!(
        rate_id = selected_rate_id,
        service_code = %snapshot.service_code,
        "rate snapshot loaded"
    );

    // Customs are allowed to change between quote and ship; the incoming
    // declaration replaces the cached one.
    if let Some(customs) = ship_request.customs_info.as_ref() {
        snapshot.customs_info = Some(snapshot_customs(customs));
    }

    let request_currency = resolve_request_currency(headers, request);
    if snapshot.currency_code.is_empty() {
        snapshot.currency_code = request_currency.clone();
    }
    if snapshot.rate_to_cad <= 0.0 && request_currency != "CAD" {
        let client_id = client_id_from_request(auth, request);
        if client_id == 0 {
            return Err(ServiceError::Validation(
                "client_id required for currency conversion".to_string(),
            ));
        }
        let rate = state
            .store
            .load_currency_rate(client_id, &request_currency)
            .await?
            .ok_or_else(|| {
                ServiceError::Validation(format!("missing conversion rate for {request_currency}"))
            })?;
        snapshot.rate_to_cad = rate;
    }
    if snapshot.rate_to_cad <= 0.0 {
        snapshot.rate_to_cad = 1.0;
    }

    let label_id = if ship_request.label_id.trim().is_empty() {
        generate_label_id()
    } else {
        ship_request.label_id.trim().to_string()
    };
    validate_label_id(&label_id)?;

    let incoming = options::bag_from_pairs(
        request
            .shippingpluginreqeust_custom_info
            .iter()
            .map(|item| (item.field_name.as_str(), item.field_value.as_str())),
    );
    if incoming.is_empty() && !snapshot.custom_options.is_empty() {
        tracing::debug!(
            stored = snapshot.custom_options.len(),
            "label request has no custom options; using stored options from rate snapshot"
        );
    }
    let merged = options::merge_bags(&snapshot.custom_options, &incoming);
    let dest_country = destination_country(&snapshot);

    options::validate_values(&merged)?;
    options::validate_rules(
        &merged,
        &snapshot.signature,
        &snapshot.customer.phone,
        &dest_country,
        snapshot.rate_to_cad,
    )?;

    let client_id = client_id_from_request(auth, request);
    // A display selection only needs resolving when no direct office id
    // was supplied; d2po_selection already encodes that.
    let office_id = match options::d2po_selection(&merged) {
        Some(selection) => Some(
            state
                .post_offices
                .find_office_id_by_display_text(client_id, &selection)
                .await
                .map_err(|err| {
                    ServiceError::Validation(format!(
                        "failed to resolve post office selection: {err}"
                    ))
                })?,
        ),
        None => None,
    };

    let (mut shipment_options, notification) =
        options::build_shipment_options(&merged, snapshot.rate_to_cad, office_id.as_deref())?;
    shipment_options.extend(options::snapshot_options(&snapshot));
    let shipment_options = options::finalize_shipment_options(shipment_options, &dest_country);
    options::validate_emitted_options(&shipment_options)?;

    validate_shipment_snapshot(&snapshot, &dest_country)?;
    validate_customs(&snapshot)?;
    if options::requires_customs(&dest_country) && snapshot.customs_info.is_none() {
        return Err(ServiceError::Validation(
            "customs info is required for international shipments".to_string(),
        ));
    }

    let carrier_request = build_shipment_request(&snapshot, &dest_country, shipment_options, notification)?;
    let shipment = state
        .carrier
        .create_shipment(&carrier_request)
        .await
        .map_err(|err| ServiceError::Validation(err.to_string()))?;

    let label_url = shipment
        .link_href("label")
        .map(str::to_string)
        .ok_or_else(|| ServiceError::Internal("label URL not found in response".to_string()))?;
    let refund_url = shipment.link_href("refund").unwrap_or("").to_string();

    let label_pdf = state
        .carrier
        .get_artifact(&label_url)
        .await
        .map_err(|err| ServiceError::Internal(err.to_string()))?;
    save_label_pdf(&state.config.label_storage_path, &label_id, &label_pdf).await?;

    let tracking = shipment.tracking_pin.clone();
    let invoice_uuid = if snapshot.invoice_uuid.trim().is_empty() {
        ship_request.invoice_uuid.trim().to_string()
    } else {
        snapshot.invoice_uuid.trim().to_string()
    };

    if !invoice_uuid.is_empty() {
        if let Err(err) = state.store.save_chosen_rate(&invoice_uuid, selected_rate_id).await {
            tracing::error!(invoice_uuid = %invoice_uuid, error = %err, "failed to store chosen rate");
        }
        if !tracking.is_empty()
            && let Err(err) = state.store.save_tracking_number(&invoice_uuid, &tracking).await
        {
            tracing::error!(invoice_uuid = %invoice_uuid, error = %err, "failed to store tracking number");
        }
    }

    let service_name = if snapshot.service_name.trim().is_empty() {
        fallback_service_name(&snapshot.service_code)
    } else {
        snapshot.service_name.trim().to_string()
    };

    let record = LabelRecord {
        id: label_id.clone(),
        shipment_id: shipment.shipment_id.clone(),
        tracking_number: tracking.clone(),
        invoice_uuid: invoice_uuid.clone(),
        rate_id: selected_rate_id.to_string(),
        carrier: CARRIER_NAME.to_string(),
        service_code: snapshot.service_code.trim().to_string(),
        service_name: service_name.clone(),
        shipping_charges_cents: snapshot.price_cents,
        delivery_date: snapshot.delivery_date.clone(),
        delivery_days: delivery_days_from_date(&snapshot.delivery_date) as i32,
        refund_link: refund_url,
        weight: snapshot.parcel.weight,
        created_at: None,
    };
    if let Err(err) = state.store.save_label_record(&record).await {
        tracing::error!(label_id = %record.id, error = %err, "failed to store label record");
    }

    Ok(LabelResponse {
        label_id: label_id.clone(),
        label_url: public_label_url(&state.config.public_base_url, &label_id),
        tracking_code: tracking,
        carrier: CARRIER_NAME.to_string(),
        method: humanize_code(if service_name.is_empty() {
            "STANDARD"
        } else {
            &service_name
        }),
        ship_date: Utc::now().timestamp(),
        invoice_uuid,
    })
}

fn destination_country(snapshot: &RateSnapshot) -> String {
    let country = snapshot.destination.country.trim().to_uppercase();
    if !country.is_empty() {
        return country;
    }
    let country = snapshot.customer.country_code.trim().to_uppercase();
    if country.is_empty() {
        "CA".to_string()
    } else {
        country
    }
}

/// 16 CSPRNG bytes, hex-encoded.
pub(crate) fn generate_label_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().fold(String::with_capacity(32), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

fn validate_label_id(label_id: &str) -> Result<(), ServiceError> {
    if label_id.contains('/') || label_id.contains('\\') || label_id.contains("..") {
        return Err(ServiceError::Validation("invalid label id".to_string()));
    }
    Ok(())
}

async fn save_label_pdf(storage_path: &str, label_id: &str, data: &[u8]) -> Result<(), ServiceError> {
    validate_label_id(label_id)?;
    let storage_path = if storage_path.trim().is_empty() {
        crate::config::DEFAULT_LABEL_STORAGE_PATH
    } else {
        storage_path
    };
    tokio::fs::create_dir_all(storage_path)
        .await
        .map_err(|err| ServiceError::Internal(err.to_string()))?;
    let path = Path::new(storage_path).join(format!("{label_id}.pdf"));
    tokio::fs::write(&path, data)
        .await
        .map_err(|err| ServiceError::Internal(err.to_string()))?;
    Ok(())
}

fn public_label_url(public_base_url: &str, label_id: &str) -> String {
    let base = public_base_url.trim_end_matches('/');
    let base = if base.is_empty() {
        "http://localhost:50050"
    } else {
        base
    };
    format!("{base}/files/labels/{label_id}.pdf")
}

// ---------------------------------------------------------------------
// Carrier field invariants
// ---------------------------------------------------------------------

const MAX_ADDRESS_FIELD_LEN: usize = 44;
const MAX_PHONE_LEN: usize = 25;

pub(crate) fn validate_canada_post_phone(phone: &str) -> Result<(), ServiceError> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Ok(());
    }
    if phone.len() > MAX_PHONE_LEN {
        return Err(ServiceError::Validation(
            "phone number must be at most 25 characters".to_string(),
        ));
    }
    for (index, ch) in phone.chars().enumerate() {
        let valid = ch.is_ascii_digit()
            || matches!(ch, ' ' | '(' | ')' | '-' | '.')
            || (ch == '+' && index == 0);
        if !valid {
            return Err(ServiceError::Validation(
                "phone number may only contain digits, spaces, parentheses, dashes, periods, and a leading plus sign".to_string(),
            ));
        }
    }
    Ok(())
}

pub(crate) fn validate_postal_code(country: &str, postal: &str) -> Result<(), ServiceError> {
    let country = country.trim().to_uppercase();
    let postal = postal.trim().to_uppercase();
    match country.as_str() {
        "CA" | "" => {
            let compact = postal.replace(' ', "");
            let bytes: Vec<char> = compact.chars().collect();
            let valid = bytes.len() == 6
                && bytes[0].is_ascii_alphabetic()
                && bytes[1].is_ascii_digit()
                && bytes[2].is_ascii_alphabetic()
                && bytes[3].is_ascii_digit()
                && bytes[4].is_ascii_alphabetic()
                && bytes[5].is_ascii_digit();
            if !valid {
                return Err(ServiceError::Validation(
                    "invalid Canadian postal code".to_string(),
                ));
            }
            Ok(())
        }
        "US" => {
            let compact = postal.replace([' ', '-'], "");
            let valid = (compact.len() == 5 || compact.len() == 9)
                && compact.chars().all(|ch| ch.is_ascii_digit());
            if !valid {
                return Err(ServiceError::Validation("invalid US zip code".to_string()));
            }
            Ok(())
        }
        _ => {
            // International postal codes are optional and free-form, but
            // the carrier caps their length.
            if postal.len() > 14 {
                return Err(ServiceError::Validation(
                    "postal code must be at most 14 characters".to_string(),
                ));
            }
            Ok(())
        }
    }
}

fn validate_field_lengths(snapshot: &RateSnapshot) -> Result<(), ServiceError> {
    let fields = [
        ("sender name", &snapshot.shipper.full_name),
        ("sender company", &snapshot.shipper.company),
        ("sender address line 1", &snapshot.shipper.street1),
        ("sender address line 2", &snapshot.shipper.street2),
        ("sender city", &snapshot.shipper.city),
        ("recipient name", &snapshot.customer.full_name),
        ("recipient company", &snapshot.customer.company),
        ("recipient address line 1", &snapshot.customer.street1),
        ("recipient address line 2", &snapshot.customer.street2),
        ("recipient city", &snapshot.customer.city),
    ];
    for (label, value) in fields {
        if value.trim().len() > MAX_ADDRESS_FIELD_LEN {
            return Err(ServiceError::Validation(format!(
                "{label} must be at most 44 characters"
            )));
        }
    }
    Ok(())
}

/// Field invariants the carrier enforces on shipment submission; failing
/// them here produces a clean rejection instead of a carrier error.
pub(crate) fn validate_shipment_snapshot(
    snapshot: &RateSnapshot,
    dest_country: &str,
) -> Result<(), ServiceError> {
    if snapshot.parcel.weight <= 0.0 {
        return Err(ServiceError::Validation(
            "parcel weight is required".to_string(),
        ));
    }
    if snapshot.origin.address_line.trim().is_empty() && snapshot.shipper.street1.trim().is_empty() {
        return Err(ServiceError::Validation(
            "sender address is required".to_string(),
        ));
    }
    if snapshot.shipper.city.trim().is_empty() {
        return Err(ServiceError::Validation(
            "sender city is required".to_string(),
        ));
    }
    if snapshot.destination.address_line.trim().is_empty()
        && snapshot.customer.street1.trim().is_empty()
    {
        return Err(ServiceError::Validation(
            "recipient address is required".to_string(),
        ));
    }
    if contact_name(&snapshot.customer).is_empty() {
        return Err(ServiceError::Validation(
            "recipient name is required".to_string(),
        ));
    }

    validate_field_lengths(snapshot)?;
    validate_canada_post_phone(&snapshot.shipper.phone)?;
    validate_canada_post_phone(&snapshot.customer.phone)?;
    validate_postal_code("CA", &snapshot.origin.postal_code)?;

    let dest_postal = if snapshot.destination.postal_code.trim().is_empty() {
        snapshot.customer.zip.as_str()
    } else {
        snapshot.destination.postal_code.as_str()
    };
    // Postal codes are optional outside CA/US.
    if !dest_postal.trim().is_empty() || matches!(dest_country, "CA" | "US") {
        validate_postal_code(dest_country, dest_postal)?;
    }
    Ok(())
}

/// The declared customs weight may not exceed the parcel weight.
pub(crate) fn validate_customs(snapshot: &RateSnapshot) -> Result<(), ServiceError> {
    let Some(customs) = snapshot.customs_info.as_ref() else {
        return Ok(());
    };
    if snapshot.parcel.weight <= 0.0 {
        return Ok(());
    }
    let total: f64 = customs
        .custom_items
        .iter()
        .map(|item| item.weight * item.quantity.max(1) as f64)
        .sum();
    if total > snapshot.parcel.weight + 1e-9 {
        return Err(ServiceError::Validation(
            "customs total weight exceeds parcel weight".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn reason_for_export(contents_type: &str) -> &'static str {
    let contents = contents_type.trim().to_uppercase();
    if contents.contains("DOCUMENT") {
        "DOC"
    } else if contents.contains("SAMPLE") {
        "SAM"
    } else if contents.contains("RETURN") || contents.contains("REPAIR") {
        "REP"
    } else if contents.contains("MERCHANDISE") || contents.contains("SALE") {
        "SOG"
    } else {
        "OTH"
    }
}

fn build_customs_block(snapshot: &RateSnapshot) -> Option<ShipmentCustoms> {
    let customs = snapshot.customs_info.as_ref()?;
    let mut currency = customs.currency.trim().to_uppercase();
    if currency.is_empty() {
        currency = snapshot.currency_code.trim().to_uppercase();
    }
    if currency.is_empty() {
        currency = "CAD".to_string();
    }

    let rate = if snapshot.rate_to_cad > 0.0 {
        snapshot.rate_to_cad
    } else {
        1.0
    };
    let conversion_from_cad = if currency == "CAD" {
        None
    } else {
        Some(format!("{:.4}", 1.0 / rate))
    };

    let items = customs
        .custom_items
        .iter()
        .map(|item| {
            let quantity = item.quantity.max(1);
            CustomsItem {
                number_of_units: quantity,
                description: item.description.clone(),
                sku: if item.code.is_empty() {
                    None
                } else {
                    Some(item.code.clone())
                },
                hs_tariff_code: if item.hs_tariff_number.is_empty() {
                    None
                } else {
                    Some(item.hs_tariff_number.clone())
                },
                unit_weight: item.weight,
                value_per_unit: round2(item.total_value_cents as f64 / (100.0 * quantity as f64)),
                country_of_origin: if item.origin_country.is_empty() {
                    None
                } else {
                    Some(item.origin_country.clone())
                },
                province_of_origin: None,
            }
        })
        .collect();

    Some(ShipmentCustoms {
        currency,
        conversion_from_cad,
        reason_for_export: reason_for_export(&customs.contents_type).to_string(),
        sku_list: CustomsSkuList { items },
    })
}

fn build_shipment_request(
    snapshot: &RateSnapshot,
    dest_country: &str,
    shipment_options: Vec<portage_canpost::types::ShipmentOption>,
    notification: Option<portage_canpost::types::ShipmentNotification>,
) -> Result<ShipmentRequest, ServiceError> {
    let service_code = snapshot.service_code.trim().to_string();
    if service_code.is_empty() {
        return Err(ServiceError::Validation(
            "service code missing from rate snapshot".to_string(),
        ));
    }

    let sender_name = contact_name(&snapshot.shipper);
    let sender_company = if snapshot.shipper.company.trim().is_empty() {
        sender_name.clone()
    } else {
        snapshot.shipper.company.trim().to_string()
    };
    let sender_phone = if snapshot.shipper.phone.trim().is_empty() {
        "0000000000".to_string()
    } else {
        snapshot.shipper.phone.trim().to_string()
    };
    let sender_line1 = if snapshot.origin.address_line.trim().is_empty() {
        snapshot.shipper.street1.trim().to_string()
    } else {
        snapshot.origin.address_line.trim().to_string()
    };
    let sender_province = if snapshot.origin.province.trim().is_empty() {
        snapshot.shipper.province_code.trim().to_string()
    } else {
        snapshot.origin.province.trim().to_string()
    };

    let recipient_name = contact_name(&snapshot.customer);
    let recipient_line1 = if snapshot.destination.address_line.trim().is_empty() {
        snapshot.customer.street1.trim().to_string()
    } else {
        snapshot.destination.address_line.trim().to_string()
    };
    let recipient_city = if snapshot.destination.city.trim().is_empty() {
        snapshot.customer.city.trim().to_string()
    } else {
        snapshot.destination.city.trim().to_string()
    };
    let recipient_province = if snapshot.destination.province.trim().is_empty() {
        snapshot.customer.province_code.trim().to_string()
    } else {
        snapshot.destination.province.trim().to_string()
    };
    let recipient_postal = if snapshot.destination.postal_code.trim().is_empty() {
        snapshot.customer.zip.trim().to_string()
    } else {
        snapshot.destination.postal_code.trim().to_string()
    };

    let dimensions = if snapshot.parcel.length > 0.0
        && snapshot.parcel.width > 0.0
        && snapshot.parcel.height > 0.0
    {
        Some(Dimensions {
            length: snapshot.parcel.length,
            width: snapshot.parcel.width,
            height: snapshot.parcel.height,
        })
    } else {
        None
    };

    Ok(ShipmentRequest::new(DeliverySpec {
        service_code,
        sender: Sender {
            name: if sender_name.is_empty() {
                None
            } else {
                Some(sender_name)
            },
            company: sender_company,
            contact_phone: sender_phone,
            address_details: SenderAddressDetails {
                address_line_1: sender_line1,
                address_line_2: optional(&snapshot.shipper.street2),
                city: snapshot.shipper.city.trim().to_string(),
                prov_state: sender_province,
                postal_zip_code: snapshot.origin.postal_code.trim().to_string(),
            },
        },
        destination: Destination {
            name: recipient_name,
            company: optional(&snapshot.customer.company),
            client_voice_number: optional(&snapshot.customer.phone),
            address_details: DestinationAddressDetails {
                address_line_1: recipient_line1,
                address_line_2: optional(&snapshot.customer.street2),
                city: recipient_city,
                prov_state: optional(&recipient_province),
                country_code: dest_country.to_string(),
                postal_zip_code: optional(&recipient_postal),
            },
        },
        options: if shipment_options.is_empty() {
            None
        } else {
            Some(ShipmentOptions {
                options: shipment_options,
            })
        },
        parcel_characteristics: ParcelCharacteristics {
            weight: snapshot.parcel.weight,
            dimensions,
        },
        notification,
        preferences: Preferences {
            show_packing_instructions: false,
        },
        customs: build_customs_block(snapshot),
    }))
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
