//! Canada Post XML wire types.
//!
//! # Purpose
//! Request and response shapes for the non-contract rating, shipment and
//! refund services. Field order inside each struct matches the element order
//! the carrier's schemas require; serialization relies on that order.
use serde::{Deserialize, Serialize};

/// Namespace for the rating service (`mailing-scenario` / `price-quotes`).
pub const RATE_NS: &str = "http://www.canadapost.ca/ws/ship/rate-v4";
/// Namespace for the non-contract shipment service.
pub const NCSHIPMENT_NS: &str = "http://www.canadapost.ca/ws/ncshipment-v4";

#[derive(Debug, Clone, Serialize)]
pub struct RateRequest {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    #[serde(rename = "customer-number", skip_serializing_if = "Option::is_none")]
    pub customer_number: Option<String>,
    #[serde(rename = "options", skip_serializing_if = "Option::is_none")]
    pub options: Option<RateOptions>,
    #[serde(rename = "parcel-characteristics")]
    pub parcel_characteristics: ParcelCharacteristics,
    #[serde(rename = "origin-postal-code")]
    pub origin_postal_code: String,
    #[serde(rename = "destination")]
    pub destination: RateDestination,
}

impl RateRequest {
    pub fn new(
        customer_number: Option<String>,
        options: Vec<RateOption>,
        parcel: ParcelCharacteristics,
        origin_postal_code: String,
        destination: RateDestination,
    ) -> Self {
        Self {
            xmlns: RATE_NS.to_string(),
            customer_number,
            options: if options.is_empty() {
                None
            } else {
                Some(RateOptions { options })
            },
            parcel_characteristics: parcel,
            origin_postal_code,
            destination,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RateOptions {
    #[serde(rename = "option")]
    pub options: Vec<RateOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateOption {
    #[serde(rename = "option-code")]
    pub code: String,
    #[serde(rename = "option-amount", skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ParcelCharacteristics {
    /// Weight in kilograms.
    #[serde(rename = "weight")]
    pub weight: f64,
    #[serde(rename = "dimensions", skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

/// Dimensions in centimetres.
#[derive(Debug, Clone, Serialize)]
pub struct Dimensions {
    #[serde(rename = "length")]
    pub length: f64,
    #[serde(rename = "width")]
    pub width: f64,
    #[serde(rename = "height")]
    pub height: f64,
}

/// Destination variant for rating. Exactly one of the three is set,
/// selected by the destination country code.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RateDestination {
    #[serde(rename = "domestic", skip_serializing_if = "Option::is_none")]
    pub domestic: Option<DomesticDestination>,
    #[serde(rename = "united-states", skip_serializing_if = "Option::is_none")]
    pub united_states: Option<UnitedStatesDestination>,
    #[serde(rename = "international", skip_serializing_if = "Option::is_none")]
    pub international: Option<InternationalDestination>,
}

impl RateDestination {
    /// Routes by ISO country code: CA is domestic, US maps to the zip-code
    /// variant, everything else is international.
    pub fn for_country(country: &str, postal: &str) -> Self {
        match country.trim().to_ascii_uppercase().as_str() {
            "CA" | "" => Self {
                domestic: Some(DomesticDestination {
                    postal_code: postal.trim().to_string(),
                }),
                ..Self::default()
            },
            "US" => Self {
                united_states: Some(UnitedStatesDestination {
                    zip_code: postal.trim().to_string(),
                }),
                ..Self::default()
            },
            code => Self {
                international: Some(InternationalDestination {
                    country_code: code.to_string(),
                }),
                ..Self::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DomesticDestination {
    #[serde(rename = "postal-code")]
    pub postal_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitedStatesDestination {
    #[serde(rename = "zip-code")]
    pub zip_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InternationalDestination {
    #[serde(rename = "country-code")]
    pub country_code: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateResponse {
    #[serde(rename = "price-quote", default)]
    pub price_quotes: Vec<PriceQuote>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceQuote {
    #[serde(rename = "service-code", default)]
    pub service_code: String,
    #[serde(rename = "service-name", default)]
    pub service_name: String,
    #[serde(rename = "service-link", default)]
    pub service_link: Option<Link>,
    #[serde(rename = "price-details", default)]
    pub price_details: PriceDetails,
    #[serde(rename = "service-standard", default)]
    pub service_standard: ServiceStandard,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceDetails {
    #[serde(rename = "base", default)]
    pub base: f64,
    /// Total amount due in CAD.
    #[serde(rename = "due", default)]
    pub due: f64,
    #[serde(rename = "taxes", default)]
    pub taxes: Option<Taxes>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Taxes {
    #[serde(rename = "gst", default)]
    pub gst: Option<Tax>,
    #[serde(rename = "pst", default)]
    pub pst: Option<Tax>,
    #[serde(rename = "hst", default)]
    pub hst: Option<Tax>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Tax {
    #[serde(rename = "$text", default)]
    pub value: f64,
    #[serde(rename = "@percent", default)]
    pub percent: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceStandard {
    #[serde(rename = "am-delivery", default)]
    pub am_delivery: bool,
    #[serde(rename = "guaranteed-delivery", default)]
    pub guaranteed_delivery: bool,
    #[serde(rename = "expected-transit-time", default)]
    pub expected_transit_time: Option<i32>,
    #[serde(rename = "expected-delivery-date", default)]
    pub expected_delivery_date: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Link {
    #[serde(rename = "@rel", default)]
    pub rel: String,
    #[serde(rename = "@href", default)]
    pub href: String,
    #[serde(rename = "@media-type", default)]
    pub media_type: String,
    #[serde(rename = "@index", default)]
    pub index: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShipmentRequest {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    #[serde(
        rename = "requested-shipping-point",
        skip_serializing_if = "Option::is_none"
    )]
    pub requested_shipping_point: Option<String>,
    #[serde(rename = "delivery-spec")]
    pub delivery_spec: DeliverySpec,
}

impl ShipmentRequest {
    pub fn new(delivery_spec: DeliverySpec) -> Self {
        Self {
            xmlns: NCSHIPMENT_NS.to_string(),
            requested_shipping_point: None,
            delivery_spec,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliverySpec {
    #[serde(rename = "service-code")]
    pub service_code: String,
    #[serde(rename = "sender")]
    pub sender: Sender,
    #[serde(rename = "destination")]
    pub destination: Destination,
    #[serde(rename = "options", skip_serializing_if = "Option::is_none")]
    pub options: Option<ShipmentOptions>,
    #[serde(rename = "parcel-characteristics")]
    pub parcel_characteristics: ParcelCharacteristics,
    #[serde(rename = "notification", skip_serializing_if = "Option::is_none")]
    pub notification: Option<ShipmentNotification>,
    #[serde(rename = "preferences")]
    pub preferences: Preferences,
    #[serde(rename = "customs", skip_serializing_if = "Option::is_none")]
    pub customs: Option<ShipmentCustoms>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Sender {
    #[serde(rename = "name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "company")]
    pub company: String,
    #[serde(rename = "contact-phone")]
    pub contact_phone: String,
    #[serde(rename = "address-details")]
    pub address_details: SenderAddressDetails,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SenderAddressDetails {
    #[serde(rename = "address-line-1")]
    pub address_line_1: String,
    #[serde(rename = "address-line-2", skip_serializing_if = "Option::is_none")]
    pub address_line_2: Option<String>,
    #[serde(rename = "city")]
    pub city: String,
    #[serde(rename = "prov-state")]
    pub prov_state: String,
    #[serde(rename = "postal-zip-code")]
    pub postal_zip_code: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Destination {
    #[serde(rename = "name")]
    pub name: String,
    #[serde(rename = "company", skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(rename = "client-voice-number", skip_serializing_if = "Option::is_none")]
    pub client_voice_number: Option<String>,
    #[serde(rename = "address-details")]
    pub address_details: DestinationAddressDetails,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DestinationAddressDetails {
    #[serde(rename = "address-line-1")]
    pub address_line_1: String,
    #[serde(rename = "address-line-2", skip_serializing_if = "Option::is_none")]
    pub address_line_2: Option<String>,
    #[serde(rename = "city")]
    pub city: String,
    #[serde(rename = "prov-state", skip_serializing_if = "Option::is_none")]
    pub prov_state: Option<String>,
    #[serde(rename = "country-code")]
    pub country_code: String,
    #[serde(rename = "postal-zip-code", skip_serializing_if = "Option::is_none")]
    pub postal_zip_code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ShipmentOptions {
    #[serde(rename = "option")]
    pub options: Vec<ShipmentOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShipmentOption {
    #[serde(rename = "option-code")]
    pub code: String,
    #[serde(rename = "option-amount", skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(rename = "option-qualifier-1", skip_serializing_if = "Option::is_none")]
    pub qualifier_1: Option<String>,
    #[serde(rename = "option-qualifier-2", skip_serializing_if = "Option::is_none")]
    pub qualifier_2: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipmentNotification {
    #[serde(rename = "email")]
    pub email: String,
    #[serde(rename = "on-shipment")]
    pub on_shipment: bool,
    #[serde(rename = "on-exception")]
    pub on_exception: bool,
    #[serde(rename = "on-delivery")]
    pub on_delivery: bool,
}

impl ShipmentNotification {
    /// Notification with all three triggers enabled, the shape used for
    /// post-office delivery pickups.
    pub fn all_triggers(email: String) -> Self {
        Self {
            email,
            on_shipment: true,
            on_exception: true,
            on_delivery: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Preferences {
    #[serde(rename = "show-packing-instructions")]
    pub show_packing_instructions: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ShipmentCustoms {
    #[serde(rename = "currency")]
    pub currency: String,
    #[serde(rename = "conversion-from-cad", skip_serializing_if = "Option::is_none")]
    pub conversion_from_cad: Option<String>,
    #[serde(rename = "reason-for-export")]
    pub reason_for_export: String,
    #[serde(rename = "sku-list")]
    pub sku_list: CustomsSkuList,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CustomsSkuList {
    #[serde(rename = "item")]
    pub items: Vec<CustomsItem>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CustomsItem {
    #[serde(rename = "customs-number-of-units")]
    pub number_of_units: i32,
    #[serde(rename = "customs-description")]
    pub description: String,
    #[serde(rename = "sku", skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(rename = "hs-tariff-code", skip_serializing_if = "Option::is_none")]
    pub hs_tariff_code: Option<String>,
    #[serde(rename = "unit-weight")]
    pub unit_weight: f64,
    #[serde(rename = "customs-value-per-unit")]
    pub value_per_unit: f64,
    #[serde(rename = "country-of-origin", skip_serializing_if = "Option::is_none")]
    pub country_of_origin: Option<String>,
    #[serde(rename = "province-of-origin", skip_serializing_if = "Option::is_none")]
    pub province_of_origin: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShipmentResponse {
    #[serde(rename = "shipment-id", default)]
    pub shipment_id: String,
    #[serde(rename = "tracking-pin", default)]
    pub tracking_pin: String,
    #[serde(rename = "links", default)]
    pub links: Links,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Links {
    #[serde(rename = "link", default)]
    pub links: Vec<Link>,
}

impl ShipmentResponse {
    pub fn link_href(&self, rel: &str) -> Option<&str> {
        self.links
            .links
            .iter()
            .find(|link| link.rel == rel)
            .map(|link| link.href.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundRequest {
    #[serde(rename = "@xmlns")]
    pub xmlns: String,
    #[serde(rename = "email")]
    pub email: String,
}

impl RefundRequest {
    pub fn new(email: String) -> Self {
        Self {
            xmlns: NCSHIPMENT_NS.to_string(),
            email,
        }
    }
}

/// Successful refund acknowledgement. Presence of a ticket id or date is
/// what distinguishes success from a message envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefundTicket {
    #[serde(rename = "service-ticket-date", default)]
    pub service_ticket_date: String,
    #[serde(rename = "service-ticket-id", default)]
    pub service_ticket_id: String,
}

impl RefundTicket {
    pub fn is_empty(&self) -> bool {
        self.service_ticket_id.trim().is_empty() && self.service_ticket_date.trim().is_empty()
    }
}

/// Carrier error envelope. Returned with any HTTP status, including 2xx.
#[derive(Debug, Clone, Deserialize)]
pub struct Messages {
    #[serde(rename = "message")]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    #[serde(rename = "code", default)]
    pub code: String,
    #[serde(rename = "description", default)]
    pub description: String,
}
