//! Host-platform RPC wire types.
//!
//! # Purpose
//! Carrier-neutral request/response messages exchanged with the host
//! commerce platform. Field names (including `shippingpluginreqeust_*`)
//! follow the host's schema verbatim; every field is optional on the wire.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShippingRateRequest {
    #[serde(default)]
    pub ship_request: Option<ShipRequest>,
    #[serde(default)]
    pub shipping_auth: Option<ShippingAuth>,
    #[serde(default)]
    pub shippingpluginreqeust_custom_info: Vec<ShippingDynamicData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShippingAuth {
    #[serde(default)]
    pub store_info: Option<StoreInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreInfo {
    #[serde(default)]
    pub client_id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipRequest {
    #[serde(default)]
    pub invoice_uuid: String,
    #[serde(default)]
    pub shipping_rate_id: String,
    #[serde(default)]
    pub label_id: String,
    #[serde(default)]
    pub shipper: Option<Address>,
    #[serde(default)]
    pub customer: Option<Address>,
    #[serde(default)]
    pub parcel: Option<Parcel>,
    #[serde(default)]
    pub customs_info: Option<CustomsInfo>,
    /// Signature service selection, e.g. `NO_SIGNATURE` / `ADULT_SIGNATURE`.
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub currency_code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub address_id: String,
    #[serde(default)]
    pub street1: String,
    #[serde(default)]
    pub street2: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub province_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parcel {
    /// Weight in ounces, per the host schema.
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub parcel_dimensions: Option<ParcelDimensions>,
    #[serde(default)]
    pub items: Vec<ParcelItem>,
    #[serde(default)]
    pub insurance: Option<Money>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParcelDimensions {
    #[serde(default)]
    pub length: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParcelItem {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub price: Option<Money>,
    /// Weight in ounces.
    #[serde(default)]
    pub weight: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units (cents).
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency_code: String,
    #[serde(default)]
    pub decimal: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomsInfo {
    #[serde(default)]
    pub eel_pfc: String,
    #[serde(default)]
    pub contents_type: String,
    #[serde(default)]
    pub contents_explanation: String,
    #[serde(default)]
    pub restriction_comments: String,
    #[serde(default)]
    pub custom_items: Vec<CustomItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomItem {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub total_value: Option<Money>,
    /// Weight in ounces.
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub hs_tariff_number: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub origin_country: String,
}

/// One entry of the dynamic option catalogue / option bag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShippingDynamicData {
    #[serde(default)]
    pub field_name: String,
    #[serde(default)]
    pub field_label: String,
    #[serde(default)]
    pub field_value: String,
    #[serde(default)]
    pub field_type: String,
    #[serde(default)]
    pub field_value_set: Vec<String>,
}

pub const FIELD_TYPE_CHECKBOX: &str = "checkbox";
pub const FIELD_TYPE_RADIO: &str = "radio";
pub const FIELD_TYPE_TEXT: &str = "text";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultResponse {
    pub success: bool,
    pub failure: bool,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_rates: Option<Vec<ShippingRate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<LabelResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_method: Option<ShippingMethod>,
}

impl ResultResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            failure: false,
            code: "200".to_string(),
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            failure: true,
            code: code.into(),
            message: message.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShippingRate {
    #[serde(default)]
    pub shippingrate_id: String,
    #[serde(default)]
    pub shippingrate_carrier_name: String,
    #[serde(default)]
    pub shippingrate_service_name: String,
    /// Price in request-currency cents.
    #[serde(default)]
    pub shippingrate_price: i64,
    #[serde(default)]
    pub shippingrate_delivery_days: u32,
    #[serde(default)]
    pub shippingrate_delivery_date: String,
    #[serde(default)]
    pub shippingrate_delivery_date_guaranteed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelResponse {
    #[serde(default)]
    pub label_id: String,
    #[serde(default)]
    pub label_url: String,
    #[serde(default)]
    pub tracking_code: String,
    #[serde(default)]
    pub carrier: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub ship_date: i64,
    #[serde(default)]
    pub invoice_uuid: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShippingMethod {
    #[serde(default)]
    pub shippingpluginreqeust_credentials: Vec<ShippingDynamicData>,
}
