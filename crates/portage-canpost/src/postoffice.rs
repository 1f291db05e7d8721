//! Post-office lookup wire types and display helpers.
use serde::Deserialize;

/// Namespace for the post-office lookup service.
pub const POSTOFFICE_NS: &str = "http://www.canadapost.ca/ws/postoffice";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostOfficeList {
    #[serde(rename = "post-office", default)]
    pub post_offices: Vec<PostOfficeXml>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostOfficeXml {
    #[serde(rename = "office-id", default)]
    pub office_id: String,
    #[serde(rename = "name", default)]
    pub name: String,
    #[serde(rename = "location", default)]
    pub location: String,
    #[serde(rename = "distance", default)]
    pub distance: f64,
    #[serde(rename = "bilingual-designation", default)]
    pub bilingual_designation: bool,
    #[serde(rename = "address", default)]
    pub address: PostOfficeAddressXml,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostOfficeAddressXml {
    #[serde(rename = "office-address", default)]
    pub office_address: String,
    #[serde(rename = "city", default)]
    pub city: String,
    #[serde(rename = "province", default)]
    pub province: String,
    #[serde(rename = "postal-code", default)]
    pub postal_code: String,
    #[serde(rename = "latitude", default)]
    pub latitude: f64,
    #[serde(rename = "longitude", default)]
    pub longitude: f64,
}

/// A post office as exposed to the plugin: wire fields flattened into one
/// record, also the shape cached per tenant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostOffice {
    pub office_id: String,
    pub name: String,
    pub location: String,
    pub office_address: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance: f64,
    pub bilingual: bool,
}

impl From<PostOfficeXml> for PostOffice {
    fn from(xml: PostOfficeXml) -> Self {
        Self {
            office_id: xml.office_id.trim().to_string(),
            name: xml.name.trim().to_string(),
            location: xml.location.trim().to_string(),
            office_address: xml.address.office_address.trim().to_string(),
            city: xml.address.city.trim().to_string(),
            province: xml.address.province.trim().to_string(),
            postal_code: xml.address.postal_code.trim().to_string(),
            latitude: xml.address.latitude,
            longitude: xml.address.longitude,
            distance: xml.distance,
            bilingual: xml.bilingual_designation,
        }
    }
}

/// Uppercases and strips interior spaces, the canonical cache key form.
pub fn normalize_postal_code(postal: &str) -> String {
    postal.trim().to_uppercase().replace(' ', "")
}

/// Display string rendered into the office-selection radio:
/// `"<location> - <address> (<city>)"` with an optional trailing distance
/// annotation.
pub fn format_display(office: &PostOffice) -> String {
    let base = format!(
        "{} - {} ({})",
        office.location.trim(),
        office.office_address.trim(),
        office.city.trim()
    );
    if office.distance > 0.0 {
        format!("{base} [{:.2}km]", office.distance.max(0.0))
    } else {
        base
    }
}

/// Strips the trailing ` [d.ddkm]` annotation from a selection so it can be
/// matched against the cached display text.
pub fn base_display(selection: &str) -> String {
    let selection = selection.trim();
    match selection.rfind(" [") {
        Some(idx) => selection[..idx].trim().to_string(),
        None => selection.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn office() -> PostOffice {
        PostOffice {
            office_id: "12345".to_string(),
            location: "EATON CENTRE PO".to_string(),
            office_address: "220 YONGE ST".to_string(),
            city: "TORONTO".to_string(),
            distance: 1.237,
            ..PostOffice::default()
        }
    }

    #[test]
    fn display_includes_distance_annotation() {
        assert_eq!(
            format_display(&office()),
            "EATON CENTRE PO - 220 YONGE ST (TORONTO) [1.24km]"
        );
    }

    #[test]
    fn display_omits_zero_distance() {
        let mut office = office();
        office.distance = 0.0;
        assert_eq!(
            format_display(&office),
            "EATON CENTRE PO - 220 YONGE ST (TORONTO)"
        );
    }

    #[test]
    fn base_display_strips_annotation() {
        assert_eq!(
            base_display("EATON CENTRE PO - 220 YONGE ST (TORONTO) [1.24km]"),
            "EATON CENTRE PO - 220 YONGE ST (TORONTO)"
        );
        assert_eq!(base_display("PLAIN TEXT"), "PLAIN TEXT");
    }

    #[test]
    fn normalize_strips_spaces_and_uppercases() {
        assert_eq!(normalize_postal_code(" m5v 1e3 "), "M5V1E3");
    }
}
