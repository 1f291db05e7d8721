//! Canada Post option engine.
//!
//! # Purpose
//! Takes the host platform's loosely-typed custom-info bag and projects it
//! into validated carrier options: a small list of rate options at quote
//! time, and shipment options plus an optional pickup notification at label
//! time. All cross-field interdependency rules (signature, age
//! verification, COD, delivery method, post-office delivery, non-delivery
//! handling) are enforced here before either pipeline talks to the carrier.
//!
//! # Notes
//! Unknown keys pass through untouched and never reach the carrier. Enum
//! fields accept both human-readable labels and canonical codes,
//! case-insensitively. Radio "no selection" sentinels resolve to disabled.
use crate::snapshot::RateSnapshot;
use portage_canpost::types::{RateOption, ShipmentNotification, ShipmentOption};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

pub const FIELD_COD_AMOUNT: &str = "COD_amount";
pub const FIELD_COD_INCLUDES_SHIPPING: &str = "COD_includes_shipping";
pub const FIELD_AGE_VERIFICATION: &str = "age_verification";
pub const FIELD_DELIVERY_METHOD: &str = "delivery_method";
pub const FIELD_NON_DELIVERY_HANDLING: &str = "non_delivery_handling";
pub const FIELD_D2PO_OFFICE_ID: &str = "D2PO_office_id";
pub const FIELD_D2PO_OFFICE_SELECTION: &str = "D2PO_office_selection";
pub const FIELD_D2PO_NOTIFICATION_EMAIL: &str = "D2PO_notification_email";
pub const FIELD_COV_AMOUNT: &str = "COV_amount";
pub const FIELD_SO_ENABLED: &str = "SO_enabled";

pub const LABEL_NO_DELIVERY_METHOD: &str = "No Delivery Preference";
pub const LABEL_NO_NON_DELIVERY_HANDLING: &str = "No Non-Delivery Preference";
pub const LABEL_NO_D2PO_SELECTION: &str = "No Post Office Selected";

pub const AGE_VERIFICATION_LABELS: [&str; 3] =
    ["No Age Verification", "Proof of Age 18+", "Proof of Age 19+"];
pub const DELIVERY_METHOD_LABELS: [&str; 4] = [
    "Standard Delivery",
    "Hold for Pickup (Pay at Post Office)",
    "Do Not Safe Drop",
    "Leave at Door",
];
pub const NON_DELIVERY_LABELS: [&str; 3] = [
    "Return at Sender's Expense",
    "Return to Sender",
    "Abandon Shipment",
];

/// Carrier-side cap on collect-on-delivery amounts, in CAD.
const COD_MAX_CAD: f64 = 1000.0;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct OptionError(pub String);

fn err(message: impl Into<String>) -> OptionError {
    OptionError(message.into())
}

// Label-and-code to canonical-code dictionaries. Sentinel labels resolve
// to the empty string, which reads as "not selected" everywhere below.
const AGE_VERIFICATION_MAP: [(&str, &str); 6] = [
    ("NO AGE VERIFICATION", "NONE"),
    ("PROOF OF AGE 18+", "PA18"),
    ("PROOF OF AGE 19+", "PA19"),
    ("NONE", "NONE"),
    ("PA18", "PA18"),
    ("PA19", "PA19"),
];

const DELIVERY_METHOD_MAP: [(&str, &str); 10] = [
    ("STANDARD DELIVERY", "STANDARD"),
    ("HOLD AT POST OFFICE", "HFP"),
    ("HOLD FOR PICKUP (PAY AT POST OFFICE)", "HFP"),
    ("DO NOT SAFE DROP", "DNS"),
    ("LEAVE AT DOOR", "LAD"),
    ("NO DELIVERY PREFERENCE", ""),
    ("STANDARD", "STANDARD"),
    ("HFP", "HFP"),
    ("DNS", "DNS"),
    ("LAD", "LAD"),
];

const NON_DELIVERY_MAP: [(&str, &str); 7] = [
    ("RETURN AT SENDER'S EXPENSE", "RASE"),
    ("RETURN TO SENDER", "RTS"),
    ("ABANDON SHIPMENT", "ABAN"),
    ("NO NON-DELIVERY PREFERENCE", ""),
    ("RASE", "RASE"),
    ("RTS", "RTS"),
    ("ABAN", "ABAN"),
];

const DEFAULT_NON_DELIVERY_OPTION: &str = "RASE";

/// Builds the canonical option bag from `(field_name, field_value)` pairs,
/// trimming both and dropping entries without a name.
pub fn bag_from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for (name, value) in pairs {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        values.insert(name.to_string(), value.trim().to_string());
    }
    values
}

/// Merges the stored (quote-time) bag with the incoming (label-time) bag.
/// Incoming keys override stored ones; keys absent from the incoming bag
/// fall back to their stored values.
pub fn merge_bags(
    stored: &HashMap<String, String>,
    incoming: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged: HashMap<String, String> = stored
        .iter()
        .map(|(key, value)| (key.clone(), value.trim().to_string()))
        .collect();
    for (key, value) in incoming {
        merged.insert(key.clone(), value.trim().to_string());
    }
    merged
}

fn get<'a>(values: &'a HashMap<String, String>, field: &str) -> &'a str {
    values.get(field).map(String::as_str).unwrap_or("")
}

pub fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

fn normalize_bool_string(value: &str) -> Option<String> {
    if parse_bool(value) {
        return Some("true".to_string());
    }
    if value.trim().is_empty() {
        return None;
    }
    Some("false".to_string())
}

/// Parses a strictly positive decimal amount.
pub fn parse_amount(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let parsed: f64 = value.parse().ok()?;
    if parsed <= 0.0 { None } else { Some(parsed) }
}

fn resolve_mapped(value: &str, mapping: &[(&str, &str)]) -> String {
    let value = value.trim().to_uppercase();
    if value.is_empty() {
        return String::new();
    }
    for (key, mapped) in mapping {
        if *key == value {
            return (*mapped).to_string();
        }
    }
    value
}

fn resolve_age(values: &HashMap<String, String>) -> String {
    resolve_mapped(get(values, FIELD_AGE_VERIFICATION), &AGE_VERIFICATION_MAP)
}

fn resolve_delivery(values: &HashMap<String, String>) -> String {
    resolve_mapped(get(values, FIELD_DELIVERY_METHOD), &DELIVERY_METHOD_MAP)
}

fn resolve_non_delivery(values: &HashMap<String, String>) -> String {
    resolve_mapped(get(values, FIELD_NON_DELIVERY_HANDLING), &NON_DELIVERY_MAP)
}

/// True when the request's signature enum names a real signature service.
pub fn signature_enabled(signature_value: &str) -> bool {
    !matches!(
        signature_value.trim().to_uppercase().as_str(),
        "" | "NO_SIGNATURE" | "SIGNATURE_UNSPECIFIED" | "UNSPECIFIED"
    )
}

fn is_no_d2po_selection(selection: &str) -> bool {
    let normalized = selection.trim().to_uppercase();
    normalized.is_empty()
        || normalized == "NONE"
        || normalized == LABEL_NO_D2PO_SELECTION.to_uppercase()
}

/// Post-office delivery is active when an office id is given directly or a
/// real (non-sentinel) office selection was made.
pub fn d2po_enabled(values: &HashMap<String, String>) -> bool {
    if !get(values, FIELD_D2PO_OFFICE_ID).trim().is_empty() {
        return true;
    }
    let selection = get(values, FIELD_D2PO_OFFICE_SELECTION);
    !is_no_d2po_selection(selection)
}

/// The office display selection, when one was actually made.
pub fn d2po_selection(values: &HashMap<String, String>) -> Option<String> {
    if !get(values, FIELD_D2PO_OFFICE_ID).trim().is_empty() {
        return None;
    }
    let selection = get(values, FIELD_D2PO_OFFICE_SELECTION).trim();
    if is_no_d2po_selection(selection) {
        None
    } else {
        Some(selection.to_string())
    }
}

fn cod_amount(values: &HashMap<String, String>) -> Option<f64> {
    parse_amount(get(values, FIELD_COD_AMOUNT))
}

fn cov_amount(values: &HashMap<String, String>) -> Option<f64> {
    parse_amount(get(values, FIELD_COV_AMOUNT))
}

// ---------------------------------------------------------------------
// Value validation (total over the recognised catalogue)
// ---------------------------------------------------------------------

fn validate_bool_field(values: &HashMap<String, String>, field: &str) -> Result<(), OptionError> {
    let value = get(values, field).trim().to_lowercase();
    if value.is_empty() {
        return Ok(());
    }
    match value.as_str() {
        "true" | "false" | "1" | "0" | "yes" | "no" => Ok(()),
        _ => Err(err(format!("invalid boolean value for {field}"))),
    }
}

fn validate_enum_field(
    values: &HashMap<String, String>,
    field: &str,
    allowed: &[&str],
) -> Result<(), OptionError> {
    let value = get(values, field).trim().to_uppercase();
    if value.is_empty() {
        return Ok(());
    }
    if allowed
        .iter()
        .any(|candidate| candidate.trim().to_uppercase() == value)
    {
        return Ok(());
    }
    Err(err(format!("invalid value for {field}")))
}

fn validate_amount_field(
    values: &HashMap<String, String>,
    field: &str,
    message: &str,
) -> Result<(), OptionError> {
    let raw = get(values, field).trim();
    if raw.is_empty() {
        return Ok(());
    }
    if parse_amount(raw).is_none() {
        return Err(err(message));
    }
    Ok(())
}

/// Validates every recognised field's value in isolation. Unknown keys are
/// ignored for forward compatibility.
pub fn validate_values(values: &HashMap<String, String>) -> Result<(), OptionError> {
    validate_bool_field(values, FIELD_COD_INCLUDES_SHIPPING)?;
    validate_bool_field(values, FIELD_SO_ENABLED)?;

    let age_allowed: Vec<&str> = AGE_VERIFICATION_LABELS
        .iter()
        .copied()
        .chain(["NONE", "PA18", "PA19"])
        .collect();
    validate_enum_field(values, FIELD_AGE_VERIFICATION, &age_allowed)?;

    let delivery_allowed: Vec<&str> = DELIVERY_METHOD_LABELS
        .iter()
        .copied()
        .chain([
            LABEL_NO_DELIVERY_METHOD,
            "Hold at Post Office",
            "STANDARD",
            "HFP",
            "DNS",
            "LAD",
        ])
        .collect();
    validate_enum_field(values, FIELD_DELIVERY_METHOD, &delivery_allowed)?;

    let non_delivery_allowed: Vec<&str> = NON_DELIVERY_LABELS
        .iter()
        .copied()
        .chain([LABEL_NO_NON_DELIVERY_HANDLING, "RASE", "RTS", "ABAN"])
        .collect();
    validate_enum_field(values, FIELD_NON_DELIVERY_HANDLING, &non_delivery_allowed)?;

    validate_amount_field(
        values,
        FIELD_COD_AMOUNT,
        "COD amount is required and must be a positive number",
    )?;
    validate_amount_field(
        values,
        FIELD_COV_AMOUNT,
        "COV amount is required and must be a positive number",
    )?;
    Ok(())
}

// ---------------------------------------------------------------------
// Cross-field rules
// ---------------------------------------------------------------------

/// Runs every interdependency rule against the bag. `signature_value` and
/// `recipient_phone` come from the ship request (or the snapshot at label
/// time, so omitting fields cannot downgrade the rules).
pub fn validate_rules(
    values: &HashMap<String, String>,
    signature_value: &str,
    recipient_phone: &str,
    destination_country: &str,
    rate_to_cad: f64,
) -> Result<(), OptionError> {
    validate_signature_requirement(values, signature_value)?;
    validate_delivery_method_exclusivity(values)?;
    validate_cod_requirements(values, destination_country, rate_to_cad)?;
    validate_d2po_requirements(values, recipient_phone, destination_country)?;
    validate_non_delivery_handling(values, destination_country)?;
    Ok(())
}

fn validate_signature_requirement(
    values: &HashMap<String, String>,
    signature_value: &str,
) -> Result<(), OptionError> {
    let delivery = resolve_delivery(values);
    let age = resolve_age(values);
    let age_requires_signature = age == "PA18" || age == "PA19";
    let has_signature = signature_enabled(signature_value) || parse_bool(get(values, FIELD_SO_ENABLED));

    if age_requires_signature && !has_signature {
        return Err(err(
            "age verification requires signature option. please enable signature to continue",
        ));
    }
    if delivery == "LAD" && has_signature {
        return Err(err(
            "Leave at Door cannot be combined with signature option. please choose standard delivery or another delivery method",
        ));
    }
    if age_requires_signature && delivery == "LAD" {
        return Err(err(
            "Leave at Door cannot be combined with age verification. please choose standard delivery",
        ));
    }
    Ok(())
}

fn validate_delivery_method_exclusivity(
    values: &HashMap<String, String>,
) -> Result<(), OptionError> {
    let mut selected = Vec::with_capacity(2);
    match resolve_delivery(values).as_str() {
        "HFP" => selected.push("Hold for Pickup (Pay at Post Office)"),
        "DNS" => selected.push("Do Not Safe Drop"),
        "LAD" => selected.push("Leave at Door"),
        _ => {}
    }
    if d2po_enabled(values) {
        selected.push("Deliver to Post Office");
    }
    if selected.len() <= 1 {
        return Ok(());
    }
    Err(err(format!(
        "only one delivery method can be selected, but found: {}",
        selected.join(", ")
    )))
}

fn validate_cod_requirements(
    values: &HashMap<String, String>,
    destination_country: &str,
    rate_to_cad: f64,
) -> Result<(), OptionError> {
    let raw = get(values, FIELD_COD_AMOUNT).trim();
    let amount = parse_amount(raw);
    if raw.is_empty() && amount.is_none() {
        return Ok(());
    }
    let Some(amount) = amount else {
        return Err(err("COD amount is required and must be a positive number"));
    };

    let dest_country = destination_country.trim().to_uppercase();
    if !dest_country.is_empty() && dest_country != "CA" {
        return Err(err("COD is only available for Canadian destinations"));
    }

    let rate = if rate_to_cad > 0.0 { rate_to_cad } else { 1.0 };
    if amount * rate > COD_MAX_CAD {
        return Err(err("COD amount cannot exceed $1,000 CAD"));
    }

    let delivery = resolve_delivery(values);
    if delivery == "LAD" {
        return Err(err("COD cannot be combined with Leave at Door"));
    }
    if delivery == "DNS" {
        return Err(err("COD cannot be combined with Do Not Safe Drop"));
    }

    let has_pickup = delivery == "HFP" || d2po_enabled(values);
    if !has_pickup {
        return Err(err(
            "COD requires Hold for Pickup or Deliver to Post Office to be selected",
        ));
    }
    Ok(())
}

fn validate_d2po_requirements(
    values: &HashMap<String, String>,
    recipient_phone: &str,
    destination_country: &str,
) -> Result<(), OptionError> {
    if !d2po_enabled(values) {
        return Ok(());
    }

    let dest_country = destination_country.trim().to_uppercase();
    if !dest_country.is_empty() && dest_country != "CA" {
        return Err(err(
            "Deliver to Post Office is only available for Canadian destinations",
        ));
    }

    let office_id = get(values, FIELD_D2PO_OFFICE_ID).trim();
    if office_id.is_empty() && d2po_selection(values).is_none() {
        return Err(err(
            "post office selection is required when Deliver to Post Office is selected",
        ));
    }
    if get(values, FIELD_D2PO_NOTIFICATION_EMAIL).trim().is_empty() {
        return Err(err(
            "email is required for post office delivery notifications",
        ));
    }
    if recipient_phone.trim().is_empty() {
        return Err(err(
            "recipient phone number is required when using Deliver to Post Office",
        ));
    }

    match resolve_delivery(values).as_str() {
        "HFP" => Err(err(
            "cannot select both Hold for Pickup (Pay at Post Office) and Deliver to Post Office",
        )),
        "LAD" => Err(err(
            "cannot select both Leave at Door and Deliver to Post Office",
        )),
        "DNS" => Err(err(
            "cannot select both Do Not Safe Drop and Deliver to Post Office",
        )),
        _ => Ok(()),
    }
}

fn validate_non_delivery_handling(
    values: &HashMap<String, String>,
    destination_country: &str,
) -> Result<(), OptionError> {
    let non_delivery = resolve_non_delivery(values);
    if non_delivery.is_empty() || non_delivery == "NONE" {
        return Ok(());
    }
    let dest_country = destination_country.trim().to_uppercase();
    if dest_country != "CA" {
        return Ok(());
    }
    let mut selected = get(values, FIELD_NON_DELIVERY_HANDLING).trim().to_string();
    if selected.is_empty() {
        selected = non_delivery;
    }
    Err(err(format!(
        "non-delivery handling option '{selected}' is not available for Canadian destinations. these options are only available for USA and international shipments"
    )))
}

// ---------------------------------------------------------------------
// Option projection
// ---------------------------------------------------------------------

/// Options attached to the rate request: signature and coverage.
pub fn build_rate_options(
    values: &HashMap<String, String>,
    rate_to_cad: f64,
    signature_value: &str,
) -> Result<Vec<RateOption>, OptionError> {
    let rate = if rate_to_cad > 0.0 { rate_to_cad } else { 1.0 };

    let mut options = Vec::with_capacity(2);
    if parse_bool(get(values, FIELD_SO_ENABLED)) || signature_enabled(signature_value) {
        options.push(RateOption {
            code: "SO".to_string(),
            amount: None,
        });
    }
    let raw_cov = get(values, FIELD_COV_AMOUNT).trim();
    if !raw_cov.is_empty() {
        let Some(amount) = parse_amount(raw_cov) else {
            return Err(err("COV amount is required and must be a positive number"));
        };
        options.push(RateOption {
            code: "COV".to_string(),
            amount: Some(amount * rate),
        });
    }

    Ok(dedupe_rate_options(options))
}

/// Options (and an optional pickup notification) attached to the shipment
/// request. `office_id` is the resolved post-office id when the caller
/// already translated a display selection through the post-office cache.
pub fn build_shipment_options(
    values: &HashMap<String, String>,
    rate_to_cad: f64,
    office_id: Option<&str>,
) -> Result<(Vec<ShipmentOption>, Option<ShipmentNotification>), OptionError> {
    let rate = if rate_to_cad > 0.0 { rate_to_cad } else { 1.0 };
    let mut options = Vec::with_capacity(8);

    if parse_bool(get(values, FIELD_SO_ENABLED)) {
        options.push(ShipmentOption {
            code: "SO".to_string(),
            ..ShipmentOption::default()
        });
    }

    let raw_cov = get(values, FIELD_COV_AMOUNT).trim();
    if !raw_cov.is_empty() {
        let Some(amount) = parse_amount(raw_cov) else {
            return Err(err("COV amount is required and must be a positive number"));
        };
        options.push(ShipmentOption {
            code: "COV".to_string(),
            amount: Some(amount * rate),
            ..ShipmentOption::default()
        });
    }

    let raw_cod = get(values, FIELD_COD_AMOUNT).trim();
    if !raw_cod.is_empty() {
        let Some(amount) = parse_amount(raw_cod) else {
            return Err(err("COD amount is required and must be a positive number"));
        };
        options.push(ShipmentOption {
            code: "COD".to_string(),
            amount: Some(amount * rate),
            qualifier_1: normalize_bool_string(get(values, FIELD_COD_INCLUDES_SHIPPING))
                .or_else(|| Some("false".to_string())),
            ..ShipmentOption::default()
        });
    }

    let delivery = resolve_delivery(values);
    let d2po = d2po_enabled(values);
    if d2po && matches!(delivery.as_str(), "HFP" | "DNS" | "LAD") {
        return Err(err(
            "delivery method is mutually exclusive with Deliver to Post Office",
        ));
    }

    let mut notification = None;
    if d2po {
        let resolved = office_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| {
                let direct = get(values, FIELD_D2PO_OFFICE_ID).trim();
                if direct.is_empty() {
                    None
                } else {
                    Some(direct.to_string())
                }
            });
        let Some(resolved) = resolved else {
            return Err(err(
                "D2PO office selection is required when Deliver to Post Office is enabled",
            ));
        };
        options.push(ShipmentOption {
            code: "D2PO".to_string(),
            qualifier_2: Some(resolved),
            ..ShipmentOption::default()
        });

        let email = get(values, FIELD_D2PO_NOTIFICATION_EMAIL).trim();
        if email.is_empty() {
            return Err(err("D2PO notification email is required"));
        }
        notification = Some(ShipmentNotification::all_triggers(email.to_string()));
    } else if matches!(delivery.as_str(), "HFP" | "DNS" | "LAD") {
        options.push(ShipmentOption {
            code: delivery.clone(),
            ..ShipmentOption::default()
        });
    }

    let age = resolve_age(values);
    if age == "PA18" || age == "PA19" {
        options.push(ShipmentOption {
            code: age,
            ..ShipmentOption::default()
        });
    }

    let non_delivery = resolve_non_delivery(values);
    if matches!(non_delivery.as_str(), "RASE" | "RTS" | "ABAN") {
        options.push(ShipmentOption {
            code: non_delivery,
            ..ShipmentOption::default()
        });
    }

    Ok((dedupe_shipment_options(options), notification))
}

/// Options derived from the quote-time snapshot itself: the request-level
/// signature flag and insurance coverage.
pub fn snapshot_options(snapshot: &RateSnapshot) -> Vec<ShipmentOption> {
    let mut options = Vec::with_capacity(2);
    if signature_enabled(&snapshot.signature) {
        options.push(ShipmentOption {
            code: "SO".to_string(),
            ..ShipmentOption::default()
        });
    }
    if let Some(amount) = insurance_amount_cad(snapshot)
        && amount > 0.0
    {
        options.push(ShipmentOption {
            code: "COV".to_string(),
            amount: Some(amount),
            ..ShipmentOption::default()
        });
    }
    options
}

fn insurance_amount_cad(snapshot: &RateSnapshot) -> Option<f64> {
    let rate = if snapshot.rate_to_cad > 0.0 {
        snapshot.rate_to_cad
    } else {
        1.0
    };
    if snapshot.insurance.amount > 0 {
        let cad_cents = crate::currency::currency_cents_to_cad_cents(snapshot.insurance.amount, rate);
        return Some(cad_cents as f64 / 100.0);
    }
    let amount = parse_amount(&snapshot.insurance.decimal)?;
    Some(amount * rate)
}

/// Final shipment option list: deduplicated, with the default non-delivery
/// handling appended for dutiable destinations that chose none.
pub fn finalize_shipment_options(
    options: Vec<ShipmentOption>,
    destination_country: &str,
) -> Vec<ShipmentOption> {
    let mut finalized = dedupe_shipment_options(options);
    if requires_customs(destination_country) && !has_non_delivery_option(&finalized) {
        finalized.push(ShipmentOption {
            code: DEFAULT_NON_DELIVERY_OPTION.to_string(),
            ..ShipmentOption::default()
        });
    }
    finalized
}

/// Destinations outside Canada need a customs declaration.
pub fn requires_customs(country: &str) -> bool {
    let country = country.trim().to_uppercase();
    !country.is_empty() && country != "CA"
}

fn has_non_delivery_option(options: &[ShipmentOption]) -> bool {
    options.iter().any(|option| {
        matches!(
            option.code.trim().to_uppercase().as_str(),
            "RASE" | "RTS" | "ABAN"
        )
    })
}

/// Structural validation of the emitted option list, independent of how it
/// was assembled.
pub fn validate_emitted_options(options: &[ShipmentOption]) -> Result<(), OptionError> {
    if options.is_empty() {
        return Ok(());
    }

    let mut age_count = 0;
    let mut delivery_count = 0;
    let mut non_delivery_count = 0;
    let mut has_cod = false;
    let mut has_hfp = false;
    let mut has_d2po = false;

    for option in options {
        match option.code.trim().to_uppercase().as_str() {
            "PA18" | "PA19" => age_count += 1,
            "HFP" => {
                delivery_count += 1;
                has_hfp = true;
            }
            "DNS" | "LAD" => delivery_count += 1,
            "RASE" | "RTS" | "ABAN" => non_delivery_count += 1,
            "COD" => {
                has_cod = true;
                if option.amount.unwrap_or(0.0) <= 0.0 {
                    return Err(err("COD amount must be greater than zero"));
                }
                if option
                    .qualifier_1
                    .as_deref()
                    .unwrap_or("")
                    .trim()
                    .is_empty()
                {
                    return Err(err("COD includes_shipping must be provided"));
                }
            }
            "COV" => {
                if option.amount.unwrap_or(0.0) <= 0.0 {
                    return Err(err("coverage amount must be greater than zero"));
                }
            }
            "D2PO" => {
                has_d2po = true;
                if option
                    .qualifier_2
                    .as_deref()
                    .unwrap_or("")
                    .trim()
                    .is_empty()
                {
                    return Err(err("D2PO office_id is required"));
                }
            }
            _ => {}
        }
    }

    if age_count > 1 {
        return Err(err("only one age verification option can be selected"));
    }
    if delivery_count > 1 {
        return Err(err("only one delivery method option can be selected"));
    }
    if non_delivery_count > 1 {
        return Err(err(
            "only one non-delivery handling option can be selected",
        ));
    }
    if has_cod && !(has_hfp || has_d2po) {
        return Err(err(
            "COD requires Hold for Pickup or Deliver to Post Office to be selected",
        ));
    }
    Ok(())
}

fn dedupe_rate_options(options: Vec<RateOption>) -> Vec<RateOption> {
    let mut seen = HashSet::with_capacity(options.len());
    options
        .into_iter()
        .filter(|option| {
            let code = option.code.trim().to_uppercase();
            !code.is_empty() && seen.insert(code)
        })
        .collect()
}

pub fn dedupe_shipment_options(options: Vec<ShipmentOption>) -> Vec<ShipmentOption> {
    let mut seen = HashSet::with_capacity(options.len());
    options
        .into_iter()
        .filter(|option| {
            let code = option.code.trim().to_uppercase();
            !code.is_empty() && seen.insert(code)
        })
        .collect()
}
