//! Golden wire vectors for the Canada Post XML codec.
//!
//! Requests are asserted byte-for-byte against hand-written documents;
//! responses are parsed from captured fixtures and checked field by field.
use portage_canpost::types::{
    DeliverySpec, Destination, DestinationAddressDetails, ParcelCharacteristics, RateDestination,
    RateOption, RateRequest, RateResponse, RefundTicket, Sender, SenderAddressDetails,
    ShipmentCustoms, ShipmentNotification, ShipmentOption, ShipmentOptions, ShipmentRequest,
    ShipmentResponse, CustomsItem, CustomsSkuList, Preferences,
};
use portage_canpost::{from_xml, to_xml};

#[test]
fn rate_request_marshals_to_mailing_scenario() {
    let request = RateRequest::new(
        Some("1234567".to_string()),
        vec![
            RateOption {
                code: "SO".to_string(),
                amount: None,
            },
            RateOption {
                code: "COV".to_string(),
                amount: Some(20.0),
            },
        ],
        ParcelCharacteristics {
            weight: 0.5,
            dimensions: None,
        },
        "M5V1E3".to_string(),
        RateDestination::for_country("CA", "H2X1Y4"),
    );

    let xml = to_xml("mailing-scenario", &request).expect("marshal");
    assert_eq!(
        xml,
        "<mailing-scenario xmlns=\"http://www.canadapost.ca/ws/ship/rate-v4\">\
         <customer-number>1234567</customer-number>\
         <options>\
         <option><option-code>SO</option-code></option>\
         <option><option-code>COV</option-code><option-amount>20</option-amount></option>\
         </options>\
         <parcel-characteristics><weight>0.5</weight></parcel-characteristics>\
         <origin-postal-code>M5V1E3</origin-postal-code>\
         <destination><domestic><postal-code>H2X1Y4</postal-code></domestic></destination>\
         </mailing-scenario>"
    );
}

#[test]
fn rate_request_routes_united_states_and_international() {
    let us = RateDestination::for_country("us", "90210");
    assert_eq!(us.united_states.expect("us").zip_code, "90210");

    let intl = RateDestination::for_country("FR", "");
    assert_eq!(intl.international.expect("intl").country_code, "FR");
}

#[test]
fn rate_response_fixture_parses_all_semantic_fields() {
    let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<price-quotes xmlns="http://www.canadapost.ca/ws/ship/rate-v4">
  <price-quote>
    <service-code>DOM.EP</service-code>
    <service-link rel="service" href="https://ct.soa-gw.canadapost.ca/rs/ship/service/DOM.EP" media-type="application/vnd.cpc.ship.rate-v4+xml"/>
    <service-name>Expedited Parcel</service-name>
    <price-details>
      <base>13.25</base>
      <taxes>
        <gst>0</gst>
        <pst>0</pst>
        <hst percent="13">1.05</hst>
      </taxes>
      <due>14.30</due>
    </price-details>
    <service-standard>
      <am-delivery>false</am-delivery>
      <guaranteed-delivery>true</guaranteed-delivery>
      <expected-transit-time>1</expected-transit-time>
      <expected-delivery-date>2026-02-03</expected-delivery-date>
    </service-standard>
  </price-quote>
  <price-quote>
    <service-code>DOM.RP</service-code>
    <service-name>Regular Parcel</service-name>
    <price-details>
      <base>9.60</base>
      <due>10.85</due>
    </price-details>
    <service-standard>
      <am-delivery>false</am-delivery>
      <guaranteed-delivery>false</guaranteed-delivery>
      <expected-delivery-date>2026-02-06</expected-delivery-date>
    </service-standard>
  </price-quote>
</price-quotes>"#;

    let response: RateResponse = from_xml(body).expect("parse");
    assert_eq!(response.price_quotes.len(), 2);

    let quote = &response.price_quotes[0];
    assert_eq!(quote.service_code, "DOM.EP");
    assert_eq!(quote.service_name, "Expedited Parcel");
    assert_eq!(quote.price_details.due, 14.30);
    assert_eq!(quote.price_details.base, 13.25);
    assert!(quote.service_standard.guaranteed_delivery);
    assert_eq!(quote.service_standard.expected_transit_time, Some(1));
    assert_eq!(quote.service_standard.expected_delivery_date, "2026-02-03");
    let link = quote.service_link.as_ref().expect("link");
    assert_eq!(link.rel, "service");
    assert!(link.href.ends_with("/DOM.EP"));

    assert_eq!(response.price_quotes[1].service_code, "DOM.RP");
    assert_eq!(response.price_quotes[1].price_details.due, 10.85);
}

#[test]
fn shipment_request_marshals_to_non_contract_shipment() {
    let request = ShipmentRequest::new(DeliverySpec {
        service_code: "DOM.EP".to_string(),
        sender: Sender {
            name: Some("Sender Name".to_string()),
            company: "Sender Co".to_string(),
            contact_phone: "4165550000".to_string(),
            address_details: SenderAddressDetails {
                address_line_1: "1 Main St".to_string(),
                address_line_2: None,
                city: "Toronto".to_string(),
                prov_state: "ON".to_string(),
                postal_zip_code: "M5V1E3".to_string(),
            },
        },
        destination: Destination {
            name: "Recipient Name".to_string(),
            company: None,
            client_voice_number: Some("+14165551234".to_string()),
            address_details: DestinationAddressDetails {
                address_line_1: "2 Rue Example".to_string(),
                address_line_2: None,
                city: "Montreal".to_string(),
                prov_state: Some("QC".to_string()),
                country_code: "CA".to_string(),
                postal_zip_code: Some("H2X1Y4".to_string()),
            },
        },
        options: Some(ShipmentOptions {
            options: vec![ShipmentOption {
                code: "D2PO".to_string(),
                amount: None,
                qualifier_1: None,
                qualifier_2: Some("12345".to_string()),
            }],
        }),
        parcel_characteristics: ParcelCharacteristics {
            weight: 0.5,
            dimensions: None,
        },
        notification: Some(ShipmentNotification::all_triggers(
            "buyer@example.com".to_string(),
        )),
        preferences: Preferences {
            show_packing_instructions: false,
        },
        customs: None,
    });

    let xml = to_xml("non-contract-shipment", &request).expect("marshal");
    assert_eq!(
        xml,
        "<non-contract-shipment xmlns=\"http://www.canadapost.ca/ws/ncshipment-v4\">\
         <delivery-spec>\
         <service-code>DOM.EP</service-code>\
         <sender>\
         <name>Sender Name</name>\
         <company>Sender Co</company>\
         <contact-phone>4165550000</contact-phone>\
         <address-details>\
         <address-line-1>1 Main St</address-line-1>\
         <city>Toronto</city>\
         <prov-state>ON</prov-state>\
         <postal-zip-code>M5V1E3</postal-zip-code>\
         </address-details>\
         </sender>\
         <destination>\
         <name>Recipient Name</name>\
         <client-voice-number>+14165551234</client-voice-number>\
         <address-details>\
         <address-line-1>2 Rue Example</address-line-1>\
         <city>Montreal</city>\
         <prov-state>QC</prov-state>\
         <country-code>CA</country-code>\
         <postal-zip-code>H2X1Y4</postal-zip-code>\
         </address-details>\
         </destination>\
         <options>\
         <option><option-code>D2PO</option-code><option-qualifier-2>12345</option-qualifier-2></option>\
         </options>\
         <parcel-characteristics><weight>0.5</weight></parcel-characteristics>\
         <notification>\
         <email>buyer@example.com</email>\
         <on-shipment>true</on-shipment>\
         <on-exception>true</on-exception>\
         <on-delivery>true</on-delivery>\
         </notification>\
         <preferences><show-packing-instructions>false</show-packing-instructions></preferences>\
         </delivery-spec>\
         </non-contract-shipment>"
    );
}

#[test]
fn shipment_request_customs_block_marshals() {
    let customs = ShipmentCustoms {
        currency: "USD".to_string(),
        conversion_from_cad: Some("0.74".to_string()),
        reason_for_export: "SOG".to_string(),
        sku_list: CustomsSkuList {
            items: vec![CustomsItem {
                number_of_units: 2,
                description: "T-shirt".to_string(),
                sku: Some("TS-1".to_string()),
                hs_tariff_code: None,
                unit_weight: 0.2,
                value_per_unit: 12.5,
                country_of_origin: Some("CA".to_string()),
                province_of_origin: None,
            }],
        },
    };

    let xml = to_xml("customs", &customs).expect("marshal");
    assert_eq!(
        xml,
        "<customs>\
         <currency>USD</currency>\
         <conversion-from-cad>0.74</conversion-from-cad>\
         <reason-for-export>SOG</reason-for-export>\
         <sku-list>\
         <item>\
         <customs-number-of-units>2</customs-number-of-units>\
         <customs-description>T-shirt</customs-description>\
         <sku>TS-1</sku>\
         <unit-weight>0.2</unit-weight>\
         <customs-value-per-unit>12.5</customs-value-per-unit>\
         <country-of-origin>CA</country-of-origin>\
         </item>\
         </sku-list>\
         </customs>"
    );
}

#[test]
fn shipment_response_fixture_parses_links() {
    let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<non-contract-shipment-info xmlns="http://www.canadapost.ca/ws/ncshipment-v4">
  <shipment-id>SH1</shipment-id>
  <tracking-pin>1Z999</tracking-pin>
  <links>
    <link rel="self" href="https://ct.soa-gw.canadapost.ca/rs/1234567/ncshipment/SH1" media-type="application/vnd.cpc.ncshipment-v4+xml"/>
    <link rel="label" href="https://ct.soa-gw.canadapost.ca/rs/artifact/label-1.pdf" media-type="application/pdf" index="0"/>
    <link rel="refund" href="https://ct.soa-gw.canadapost.ca/rs/1234567/ncshipment/SH1/refund" media-type="application/vnd.cpc.ncshipment-v4+xml"/>
  </links>
</non-contract-shipment-info>"#;

    let response: ShipmentResponse = from_xml(body).expect("parse");
    assert_eq!(response.shipment_id, "SH1");
    assert_eq!(response.tracking_pin, "1Z999");
    assert_eq!(
        response.link_href("label"),
        Some("https://ct.soa-gw.canadapost.ca/rs/artifact/label-1.pdf")
    );
    assert_eq!(
        response.link_href("refund"),
        Some("https://ct.soa-gw.canadapost.ca/rs/1234567/ncshipment/SH1/refund")
    );
    assert_eq!(response.link_href("nope"), None);
}

#[test]
fn refund_request_marshals_with_email() {
    let request = portage_canpost::types::RefundRequest::new("name@example.ca".to_string());
    let xml = to_xml("non-contract-shipment-refund-request", &request).expect("marshal");
    assert_eq!(
        xml,
        "<non-contract-shipment-refund-request xmlns=\"http://www.canadapost.ca/ws/ncshipment-v4\">\
         <email>name@example.ca</email>\
         </non-contract-shipment-refund-request>"
    );
}

#[test]
fn refund_ticket_round_trips() {
    let body = r#"<non-contract-shipment-refund-request-info xmlns="http://www.canadapost.ca/ws/ncshipment-v4">
  <service-ticket-date>2026-02-03</service-ticket-date>
  <service-ticket-id>T1</service-ticket-id>
</non-contract-shipment-refund-request-info>"#;
    let ticket: RefundTicket = from_xml(body).expect("parse");
    assert_eq!(ticket.service_ticket_id, "T1");
    assert_eq!(ticket.service_ticket_date, "2026-02-03");
}

#[test]
fn post_office_list_fixture_parses() {
    let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<post-office-list xmlns="http://www.canadapost.ca/ws/postoffice">
  <post-office>
    <office-id>12345</office-id>
    <name>EATON CENTRE PO</name>
    <location>EATON CENTRE PO</location>
    <distance>1.24</distance>
    <bilingual-designation>true</bilingual-designation>
    <address>
      <office-address>220 YONGE ST</office-address>
      <city>TORONTO</city>
      <province>ON</province>
      <postal-code>M5B2H1</postal-code>
      <latitude>43.6544</latitude>
      <longitude>-79.3807</longitude>
    </address>
  </post-office>
</post-office-list>"#;

    let list: portage_canpost::postoffice::PostOfficeList = from_xml(body).expect("parse");
    assert_eq!(list.post_offices.len(), 1);
    let office = portage_canpost::PostOffice::from(list.post_offices[0].clone());
    assert_eq!(office.office_id, "12345");
    assert_eq!(office.city, "TORONTO");
    assert!(office.bilingual);
    assert_eq!(
        portage_canpost::format_display(&office),
        "EATON CENTRE PO - 220 YONGE ST (TORONTO) [1.24km]"
    );
}
