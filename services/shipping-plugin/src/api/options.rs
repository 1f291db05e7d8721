//! Dynamic option catalogue returned to the host for rendering.
use crate::api::types::{
    FIELD_TYPE_CHECKBOX, FIELD_TYPE_RADIO, FIELD_TYPE_TEXT, ResultResponse, ShippingDynamicData,
    ShippingMethod,
};
use crate::app::AppState;
use crate::auth::AuthTenant;
use crate::options::{
    AGE_VERIFICATION_LABELS, DELIVERY_METHOD_LABELS, FIELD_AGE_VERIFICATION, FIELD_COD_AMOUNT,
    FIELD_COD_INCLUDES_SHIPPING, FIELD_COV_AMOUNT, FIELD_D2PO_NOTIFICATION_EMAIL,
    FIELD_D2PO_OFFICE_ID, FIELD_D2PO_OFFICE_SELECTION, FIELD_DELIVERY_METHOD,
    FIELD_NON_DELIVERY_HANDLING, FIELD_SO_ENABLED, LABEL_NO_D2PO_SELECTION,
    LABEL_NO_DELIVERY_METHOD, LABEL_NO_NON_DELIVERY_HANDLING, NON_DELIVERY_LABELS,
};
use axum::Json;
use axum::extract::{Extension, State};
use portage_canpost::format_display;

pub async fn list_label_shipping_options(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthTenant>,
) -> Json<ResultResponse> {
    let office_options = office_options_for_tenant(&state, auth.0.unwrap_or(0)).await;
    let mut response = ResultResponse::ok("ListLabelShippingOptions OK");
    response.shipping_method = Some(ShippingMethod {
        shippingpluginreqeust_credentials: build_catalogue(office_options),
    });
    Json(response)
}

/// Cached offices for the tenant's default postal code, or the tenant's
/// whole cache when no default is configured. Lookup failures degrade to
/// an empty set rather than failing the catalogue.
async fn office_options_for_tenant(state: &AppState, client_id: i64) -> Vec<String> {
    if client_id <= 0 {
        return Vec::new();
    }
    let default_postal = match state.store.load_shipping_settings(client_id).await {
        Ok(settings) => settings
            .map(|settings| settings.default_postal_code.trim().to_string())
            .unwrap_or_default(),
        Err(err) => {
            tracing::warn!(client_id, error = %err, "failed to load shipping settings");
            String::new()
        }
    };

    let offices = if default_postal.is_empty() {
        state.post_offices.list_all(client_id).await
    } else {
        state.post_offices.list_by_postal(client_id, &default_postal).await
    };
    match offices {
        Ok(offices) => offices.iter().map(format_display).collect(),
        Err(err) => {
            tracing::warn!(client_id, error = %err, "failed to load cached post offices");
            Vec::new()
        }
    }
}

fn field(
    name: &str,
    label: &str,
    field_type: &str,
    value_set: Vec<String>,
) -> ShippingDynamicData {
    ShippingDynamicData {
        field_name: name.to_string(),
        field_label: label.to_string(),
        field_value: String::new(),
        field_type: field_type.to_string(),
        field_value_set: value_set,
    }
}

fn with_sentinel(sentinel: &str, labels: &[&str]) -> Vec<String> {
    std::iter::once(sentinel)
        .chain(labels.iter().copied())
        .map(str::to_string)
        .collect()
}

pub(crate) fn build_catalogue(office_options: Vec<String>) -> Vec<ShippingDynamicData> {
    let mut office_values = Vec::with_capacity(office_options.len() + 1);
    office_values.push(LABEL_NO_D2PO_SELECTION.to_string());
    office_values.extend(office_options);

    vec![
        field(
            FIELD_COD_AMOUNT,
            "COD amount (in your currency)",
            FIELD_TYPE_TEXT,
            Vec::new(),
        ),
        field(
            FIELD_COD_INCLUDES_SHIPPING,
            "COD amount includes shipping cost",
            FIELD_TYPE_CHECKBOX,
            Vec::new(),
        ),
        field(
            FIELD_DELIVERY_METHOD,
            "How should the package be delivered?",
            FIELD_TYPE_RADIO,
            with_sentinel(LABEL_NO_DELIVERY_METHOD, &DELIVERY_METHOD_LABELS),
        ),
        field(
            FIELD_AGE_VERIFICATION,
            "Recipient age verification",
            FIELD_TYPE_RADIO,
            AGE_VERIFICATION_LABELS.iter().map(|label| label.to_string()).collect(),
        ),
        field(
            FIELD_D2PO_OFFICE_SELECTION,
            "Select post office for delivery",
            FIELD_TYPE_RADIO,
            office_values,
        ),
        field(FIELD_D2PO_OFFICE_ID, "Post office ID", FIELD_TYPE_TEXT, Vec::new()),
        field(
            FIELD_D2PO_NOTIFICATION_EMAIL,
            "Email for pickup notification",
            FIELD_TYPE_TEXT,
            Vec::new(),
        ),
        field(
            FIELD_NON_DELIVERY_HANDLING,
            "What should happen if delivery fails?",
            FIELD_TYPE_RADIO,
            with_sentinel(LABEL_NO_NON_DELIVERY_HANDLING, &NON_DELIVERY_LABELS),
        ),
        field(
            FIELD_COV_AMOUNT,
            "Coverage amount (in your currency)",
            FIELD_TYPE_TEXT,
            Vec::new(),
        ),
        field(
            FIELD_SO_ENABLED,
            "Request signature on delivery",
            FIELD_TYPE_CHECKBOX,
            Vec::new(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn by_name(fields: &[ShippingDynamicData]) -> HashMap<String, ShippingDynamicData> {
        fields
            .iter()
            .map(|field| (field.field_name.clone(), field.clone()))
            .collect()
    }

    #[test]
    fn catalogue_exposes_no_enable_checkboxes() {
        let fields = by_name(&build_catalogue(Vec::new()));
        assert!(!fields.contains_key("COD_enabled"));
        assert!(!fields.contains_key("D2PO_enabled"));
        assert!(fields.contains_key(FIELD_COD_AMOUNT));
        assert!(fields.contains_key(FIELD_SO_ENABLED));
        assert_eq!(fields.len(), 10);
    }

    #[test]
    fn radios_carry_no_selection_sentinels() {
        let fields = by_name(&build_catalogue(Vec::new()));
        let contains = |name: &str, expected: &str| {
            fields[name]
                .field_value_set
                .iter()
                .any(|value| value == expected)
        };
        assert!(contains(FIELD_DELIVERY_METHOD, LABEL_NO_DELIVERY_METHOD));
        assert!(contains(FIELD_D2PO_OFFICE_SELECTION, LABEL_NO_D2PO_SELECTION));
        assert!(contains(FIELD_NON_DELIVERY_HANDLING, LABEL_NO_NON_DELIVERY_HANDLING));
        assert!(contains(FIELD_AGE_VERIFICATION, "No Age Verification"));
    }

    #[test]
    fn office_display_strings_populate_the_selection_radio() {
        let fields = by_name(&build_catalogue(vec![
            "EATON CENTRE PO - 220 YONGE ST (TORONTO) [1.24km]".to_string(),
        ]));
        let values = &fields[FIELD_D2PO_OFFICE_SELECTION].field_value_set;
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], LABEL_NO_D2PO_SELECTION);
        assert!(values[1].contains("EATON CENTRE PO"));
    }
}
