//! End-to-end RPC tests: the router is driven in-process with a stub
//! carrier and a stub orders peer behind the real pipelines.
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use portage_canpost::types::{
    Link, Links, PriceDetails, PriceQuote, RateRequest, RateResponse, RefundTicket,
    ServiceStandard, ShipmentRequest, ShipmentResponse,
};
use portage_canpost::{CarrierApi, CarrierError, PostOffice};
use shipping_plugin::api::types::ResultResponse;
use shipping_plugin::app::{AppState, build_router};
use shipping_plugin::auth::HostClaims;
use shipping_plugin::config::{OauthConfig, PluginConfig};
use shipping_plugin::peers::{OrdersApi, PeerAuth, PeerError};
use shipping_plugin::postoffice::PostOfficeService;
use shipping_plugin::snapshot::{SnapshotStore, TtlSnapshotStore};
use shipping_plugin::store::{LabelRecord, PluginStore, memory::InMemoryStore};
use std::sync::Arc;
use std::sync::Mutex;
use tower::ServiceExt;

const APP_SECRET: &str = "plugin-test-secret";

#[derive(Default)]
struct StubCarrier {
    quotes: Vec<PriceQuote>,
    shipment: Option<ShipmentResponse>,
    artifact: Vec<u8>,
    refund: Option<RefundTicket>,
    rate_requests: Mutex<Vec<RateRequest>>,
    shipment_requests: Mutex<Vec<ShipmentRequest>>,
    refund_requests: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl CarrierApi for StubCarrier {
    async fn get_rates(&self, request: &RateRequest) -> Result<RateResponse, CarrierError> {
        self.rate_requests.lock().unwrap().push(request.clone());
        Ok(RateResponse {
            price_quotes: self.quotes.clone(),
        })
    }

    async fn create_shipment(
        &self,
        request: &ShipmentRequest,
    ) -> Result<ShipmentResponse, CarrierError> {
        self.shipment_requests.lock().unwrap().push(request.clone());
        self.shipment
            .clone()
            .ok_or_else(|| CarrierError::Transport("no shipment configured".to_string()))
    }

    async fn get_artifact(&self, _url: &str) -> Result<Vec<u8>, CarrierError> {
        Ok(self.artifact.clone())
    }

    async fn refund_shipment(
        &self,
        refund_url: &str,
        email: &str,
    ) -> Result<RefundTicket, CarrierError> {
        self.refund_requests
            .lock()
            .unwrap()
            .push((refund_url.to_string(), email.to_string()));
        self.refund
            .clone()
            .ok_or_else(|| CarrierError::Transport("no refund configured".to_string()))
    }

    async fn find_post_offices(&self, _postal_code: &str) -> Result<Vec<PostOffice>, CarrierError> {
        Ok(Vec::new())
    }
}

struct StubOrders {
    email: String,
}

#[async_trait]
impl OrdersApi for StubOrders {
    async fn customer_email(
        &self,
        _auth: &PeerAuth,
        _invoice_uuid: &str,
    ) -> Result<String, PeerError> {
        Ok(self.email.clone())
    }
}

fn quote(code: &str, name: &str, due: f64) -> PriceQuote {
    PriceQuote {
        service_code: code.to_string(),
        service_name: name.to_string(),
        price_details: PriceDetails {
            due,
            ..PriceDetails::default()
        },
        service_standard: ServiceStandard {
            guaranteed_delivery: true,
            expected_delivery_date: "2026-09-01".to_string(),
            ..ServiceStandard::default()
        },
        ..PriceQuote::default()
    }
}

fn shipment_response() -> ShipmentResponse {
    ShipmentResponse {
        shipment_id: "SH1".to_string(),
        tracking_pin: "1Z999".to_string(),
        links: Links {
            links: vec![
                Link {
                    rel: "label".to_string(),
                    href: "https://carrier.example/rs/artifact/label-1.pdf".to_string(),
                    media_type: "application/pdf".to_string(),
                    index: None,
                },
                Link {
                    rel: "refund".to_string(),
                    href: "https://carrier.example/rs/SH1/refund".to_string(),
                    media_type: String::new(),
                    index: None,
                },
            ],
        },
    }
}

fn test_config(label_dir: &std::path::Path, skip_auth: bool) -> PluginConfig {
    PluginConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        metrics_bind: "127.0.0.1:0".parse().unwrap(),
        database_url: None,
        canpost_base_url: "https://carrier.example".to_string(),
        canpost_username: "user".to_string(),
        canpost_password: "pass".to_string(),
        canpost_customer_number: "1234567".to_string(),
        rate_snapshot_ttl_minutes: 30,
        label_storage_path: label_dir.to_string_lossy().to_string(),
        public_base_url: "http://plugin.example".to_string(),
        orders_base_url: "http://orders.example".to_string(),
        app_secret: APP_SECRET.to_string(),
        oauth: OauthConfig::default(),
        skip_auth,
    }
}

struct Harness {
    state: AppState,
    carrier: Arc<StubCarrier>,
    _label_dir: tempfile::TempDir,
}

impl Harness {
    fn new(carrier: StubCarrier, skip_auth: bool) -> Self {
        let label_dir = tempfile::TempDir::new().expect("label dir");
        let store: Arc<dyn PluginStore> = Arc::new(InMemoryStore::new());
        let snapshots: Arc<dyn SnapshotStore> =
            Arc::new(TtlSnapshotStore::new(std::time::Duration::from_secs(1800)));
        let carrier = Arc::new(carrier);
        let orders: Arc<dyn OrdersApi> = Arc::new(StubOrders {
            email: "buyer@example.com".to_string(),
        });
        let post_offices = PostOfficeService::new(store.clone(), carrier.clone());
        let state = AppState {
            config: test_config(label_dir.path(), skip_auth),
            store,
            snapshots,
            carrier: carrier.clone(),
            orders,
            post_offices,
        };
        Self {
            state,
            carrier,
            _label_dir: label_dir,
        }
    }

    fn label_path(&self, label_id: &str) -> std::path::PathBuf {
        self._label_dir.path().join(format!("{label_id}.pdf"))
    }

    async fn call(&self, method: &str, uri: &str, body: Option<serde_json::Value>) -> ResultResponse {
        let response = self.call_raw(method, uri, body, None).await;
        assert_eq!(response.0, StatusCode::OK);
        serde_json::from_slice(&response.1).expect("result response")
    }

    async fn call_raw(
        &self,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
        authorization: Option<&str>,
    ) -> (StatusCode, Vec<u8>) {
        let app = build_router(self.state.clone());
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = authorization {
            builder = builder.header("authorization", token);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, bytes.to_vec())
    }
}

fn domestic_ship_request() -> serde_json::Value {
    serde_json::json!({
        "invoice_uuid": "INV-1",
        "shipper": {
            "street1": "1 Main St",
            "city": "Toronto",
            "province_code": "ON",
            "zip": "M5V1E3",
            "phone": "4165550000",
            "full_name": "Sender Name",
            "company": "Sender Co",
            "country_code": "CA"
        },
        "customer": {
            "street1": "2 Rue Example",
            "city": "Montreal",
            "province_code": "QC",
            "zip": "H2X1Y4",
            "phone": "+14165551234",
            "full_name": "Recipient Name",
            "country_code": "CA"
        },
        "parcel": { "weight": 17.64 },
        "signature": "NO_SIGNATURE"
    })
}

fn rate_request_body(ship_request: serde_json::Value, custom_info: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "ship_request": ship_request,
        "shipping_auth": { "store_info": { "client_id": 7 } },
        "shippingpluginreqeust_custom_info": custom_info
    })
}

async fn enable_services(state: &AppState, services: &[&str]) {
    let services: Vec<String> = services.iter().map(|service| service.to_string()).collect();
    state
        .store
        .save_shipping_settings(7, "1234567", &services)
        .await
        .expect("settings");
}

#[tokio::test]
async fn domestic_rate_quote_in_cad() {
    let harness = Harness::new(
        StubCarrier {
            quotes: vec![quote("DOM.EP", "Expedited Parcel", 14.30)],
            ..StubCarrier::default()
        },
        true,
    );
    enable_services(&harness.state, &["DOM.EP"]).await;

    let response = harness
        .call(
            "POST",
            "/v1/shipping/rates",
            Some(rate_request_body(domestic_ship_request(), serde_json::json!([]))),
        )
        .await;

    assert!(response.success, "unexpected failure: {}", response.message);
    let rates = response.shipping_rates.expect("rates");
    assert_eq!(rates.len(), 1);
    let rate = &rates[0];
    assert_eq!(rate.shippingrate_carrier_name, "Canada Post");
    assert_eq!(rate.shippingrate_service_name, "Expedited Parcel");
    assert_eq!(rate.shippingrate_price, 1430);
    assert!(!rate.shippingrate_id.is_empty());

    let snapshot = harness
        .state
        .snapshots
        .load(&rate.shippingrate_id)
        .await
        .expect("load")
        .expect("snapshot");
    assert_eq!(snapshot.price_cents, 1430);
    assert_eq!(snapshot.rate_to_cad, 1.0);
    assert_eq!(snapshot.currency_code, "CAD");
    assert_eq!(snapshot.service_code, "DOM.EP");
    assert_eq!(snapshot.client_id, 7);

    // The carrier saw a kilogram weight and the normalized origin postal.
    let rate_requests = harness.carrier.rate_requests.lock().unwrap();
    assert_eq!(rate_requests.len(), 1);
    assert_eq!(rate_requests[0].parcel_characteristics.weight, 0.50);
    assert_eq!(rate_requests[0].origin_postal_code, "M5V1E3");
}

#[tokio::test]
async fn usd_quote_converts_display_price() {
    let harness = Harness::new(
        StubCarrier {
            quotes: vec![quote("USA.EP", "Expedited Parcel USA", 25.00)],
            ..StubCarrier::default()
        },
        true,
    );
    enable_services(&harness.state, &["USA.EP"]).await;
    harness
        .state
        .store
        .save_currency_rate(7, "USD", 1.35)
        .await
        .expect("currency");

    let mut ship_request = domestic_ship_request();
    ship_request["customer"]["country_code"] = serde_json::json!("US");
    ship_request["customer"]["zip"] = serde_json::json!("90210");
    ship_request["currency_code"] = serde_json::json!("USD");

    let response = harness
        .call(
            "POST",
            "/v1/shipping/rates",
            Some(rate_request_body(ship_request, serde_json::json!([]))),
        )
        .await;

    assert!(response.success, "unexpected failure: {}", response.message);
    let rates = response.shipping_rates.expect("rates");
    assert_eq!(rates.len(), 1);
    assert_eq!(rates[0].shippingrate_price, 1852);

    let snapshot = harness
        .state
        .snapshots
        .load(&rates[0].shippingrate_id)
        .await
        .expect("load")
        .expect("snapshot");
    assert_eq!(snapshot.price_cents, 2500);
    assert_eq!(snapshot.rate_to_cad, 1.35);
    assert_eq!(snapshot.currency_code, "USD");
}

#[tokio::test]
async fn missing_currency_rate_never_reaches_the_carrier() {
    let harness = Harness::new(
        StubCarrier {
            quotes: vec![quote("USA.EP", "Expedited Parcel USA", 25.00)],
            ..StubCarrier::default()
        },
        true,
    );
    enable_services(&harness.state, &["USA.EP"]).await;

    let mut ship_request = domestic_ship_request();
    ship_request["customer"]["country_code"] = serde_json::json!("US");
    ship_request["customer"]["zip"] = serde_json::json!("90210");
    ship_request["currency_code"] = serde_json::json!("USD");

    let response = harness
        .call(
            "POST",
            "/v1/shipping/rates",
            Some(rate_request_body(ship_request, serde_json::json!([]))),
        )
        .await;

    assert!(response.failure);
    assert_eq!(response.code, "400");
    assert!(response.message.contains("missing conversion rate for USD"));
    assert!(harness.carrier.rate_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn create_label_persists_record_and_pdf() {
    let harness = Harness::new(
        StubCarrier {
            quotes: vec![quote("DOM.EP", "Expedited Parcel", 14.30)],
            shipment: Some(shipment_response()),
            artifact: b"%PDF-1.4 test".to_vec(),
            ..StubCarrier::default()
        },
        true,
    );
    enable_services(&harness.state, &["DOM.EP"]).await;

    let quote_response = harness
        .call(
            "POST",
            "/v1/shipping/rates",
            Some(rate_request_body(domestic_ship_request(), serde_json::json!([]))),
        )
        .await;
    let rate_id = quote_response.shipping_rates.expect("rates")[0]
        .shippingrate_id
        .clone();

    let mut ship_request = domestic_ship_request();
    ship_request["shipping_rate_id"] = serde_json::json!(rate_id);
    ship_request["label_id"] = serde_json::json!("test-label-1");

    let response = harness
        .call(
            "POST",
            "/v1/shipping/labels",
            Some(rate_request_body(ship_request, serde_json::json!([]))),
        )
        .await;

    assert!(response.success, "unexpected failure: {}", response.message);
    let label = response.label.expect("label");
    assert_eq!(label.label_id, "test-label-1");
    assert_eq!(label.tracking_code, "1Z999");
    assert_eq!(label.carrier, "Canada Post");
    assert_eq!(
        label.label_url,
        "http://plugin.example/files/labels/test-label-1.pdf"
    );

    let record = harness
        .state
        .store
        .load_label_record("test-label-1")
        .await
        .expect("load")
        .expect("record");
    assert_eq!(record.shipment_id, "SH1");
    assert_eq!(record.tracking_number, "1Z999");
    assert_eq!(record.rate_id, rate_id);
    assert_eq!(record.refund_link, "https://carrier.example/rs/SH1/refund");
    assert_eq!(record.service_code, "DOM.EP");
    assert_eq!(record.shipping_charges_cents, 1430);
    assert_eq!(record.carrier, "Canada Post");

    let pdf = std::fs::read(harness.label_path("test-label-1")).expect("pdf file");
    assert!(!pdf.is_empty());

    assert_eq!(
        harness
            .state
            .store
            .load_tracking_number("INV-1")
            .await
            .expect("tracking"),
        Some("1Z999".to_string())
    );
    assert_eq!(
        harness
            .state
            .store
            .load_chosen_rate("INV-1")
            .await
            .expect("chosen"),
        Some(rate_id)
    );
}

#[tokio::test]
async fn create_label_with_unknown_rate_id_is_not_found() {
    let harness = Harness::new(StubCarrier::default(), true);

    let mut ship_request = domestic_ship_request();
    ship_request["shipping_rate_id"] = serde_json::json!("nonexistent-rate");

    let response = harness
        .call(
            "POST",
            "/v1/shipping/labels",
            Some(rate_request_body(ship_request, serde_json::json!([]))),
        )
        .await;

    assert!(response.failure);
    assert_eq!(response.code, "404");
    assert_eq!(response.message, "rate expired or invalid");
    assert!(harness.carrier.shipment_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cod_over_the_cap_is_rejected_before_the_carrier() {
    let harness = Harness::new(
        StubCarrier {
            quotes: vec![quote("DOM.EP", "Expedited Parcel", 14.30)],
            ..StubCarrier::default()
        },
        true,
    );
    enable_services(&harness.state, &["DOM.EP"]).await;
    harness
        .state
        .store
        .save_currency_rate(7, "USD", 1.35)
        .await
        .expect("currency");

    let mut ship_request = domestic_ship_request();
    ship_request["currency_code"] = serde_json::json!("USD");
    let custom_info = serde_json::json!([
        { "field_name": "COD_amount", "field_value": "800" },
        { "field_name": "delivery_method", "field_value": "Hold for Pickup (Pay at Post Office)" }
    ]);

    let response = harness
        .call(
            "POST",
            "/v1/shipping/rates",
            Some(rate_request_body(ship_request, custom_info)),
        )
        .await;

    assert!(response.failure);
    assert_eq!(response.code, "400");
    assert!(response.message.contains("COD amount cannot exceed $1,000 CAD"));
    assert!(harness.carrier.rate_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn d2po_selection_resolves_office_and_sets_notification() {
    let harness = Harness::new(
        StubCarrier {
            quotes: vec![quote("DOM.EP", "Expedited Parcel", 14.30)],
            shipment: Some(shipment_response()),
            artifact: b"%PDF-1.4 test".to_vec(),
            ..StubCarrier::default()
        },
        true,
    );
    enable_services(&harness.state, &["DOM.EP"]).await;
    harness
        .state
        .store
        .save_post_offices(
            7,
            "H2X1Y4",
            &[PostOffice {
                office_id: "12345".to_string(),
                location: "EATON CENTRE PO".to_string(),
                office_address: "220 YONGE ST".to_string(),
                city: "TORONTO".to_string(),
                distance: 1.2,
                ..PostOffice::default()
            }],
        )
        .await
        .expect("seed offices");

    let custom_info = serde_json::json!([
        { "field_name": "D2PO_office_selection", "field_value": "EATON CENTRE PO - 220 YONGE ST (TORONTO)" },
        { "field_name": "D2PO_notification_email", "field_value": "buyer@example.com" }
    ]);

    let quote_response = harness
        .call(
            "POST",
            "/v1/shipping/rates",
            Some(rate_request_body(domestic_ship_request(), custom_info.clone())),
        )
        .await;
    assert!(quote_response.success, "quote failed: {}", quote_response.message);
    let rate_id = quote_response.shipping_rates.expect("rates")[0]
        .shippingrate_id
        .clone();

    let mut ship_request = domestic_ship_request();
    ship_request["shipping_rate_id"] = serde_json::json!(rate_id);

    let response = harness
        .call(
            "POST",
            "/v1/shipping/labels",
            Some(rate_request_body(ship_request, custom_info)),
        )
        .await;
    assert!(response.success, "label failed: {}", response.message);

    let shipment_requests = harness.carrier.shipment_requests.lock().unwrap();
    assert_eq!(shipment_requests.len(), 1);
    let spec = &shipment_requests[0].delivery_spec;

    let d2po = spec
        .options
        .as_ref()
        .expect("options")
        .options
        .iter()
        .find(|option| option.code == "D2PO")
        .expect("D2PO option");
    assert_eq!(d2po.qualifier_2.as_deref(), Some("12345"));

    assert_eq!(
        spec.destination.client_voice_number.as_deref(),
        Some("+14165551234")
    );

    let notification = spec.notification.as_ref().expect("notification");
    assert_eq!(notification.email, "buyer@example.com");
    assert!(notification.on_shipment);
    assert!(notification.on_exception);
    assert!(notification.on_delivery);
}

#[tokio::test]
async fn refund_returns_ticket_details() {
    let harness = Harness::new(
        StubCarrier {
            refund: Some(RefundTicket {
                service_ticket_id: "T1".to_string(),
                service_ticket_date: "2026-02-03".to_string(),
            }),
            ..StubCarrier::default()
        },
        true,
    );
    harness
        .state
        .store
        .save_label_record(&LabelRecord {
            id: "test-label-1".to_string(),
            invoice_uuid: "INV-9".to_string(),
            refund_link: "https://carrier.example/rs/SH1/refund".to_string(),
            carrier: "Canada Post".to_string(),
            ..LabelRecord::default()
        })
        .await
        .expect("seed label");

    let response = harness
        .call(
            "POST",
            "/v1/shipping/refunds",
            Some(serde_json::json!({
                "ship_request": { "label_id": "test-label-1" },
                "shipping_auth": { "store_info": { "client_id": 7 } }
            })),
        )
        .await;

    assert!(response.success, "refund failed: {}", response.message);
    assert_eq!(response.code, "200");
    assert!(response.message.contains("T1"));
    assert!(response.message.contains("2026-02-03"));

    let refunds = harness.carrier.refund_requests.lock().unwrap();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].0, "https://carrier.example/rs/SH1/refund");
    assert_eq!(refunds[0].1, "buyer@example.com");
}

#[tokio::test]
async fn refund_for_unknown_label_is_not_found() {
    let harness = Harness::new(StubCarrier::default(), true);
    let response = harness
        .call(
            "POST",
            "/v1/shipping/refunds",
            Some(serde_json::json!({
                "ship_request": { "label_id": "missing" }
            })),
        )
        .await;
    assert!(response.failure);
    assert_eq!(response.code, "404");
}

#[tokio::test]
async fn option_catalogue_lists_cached_offices() {
    let harness = Harness::new(StubCarrier::default(), true);
    harness
        .state
        .store
        .save_post_offices(
            7,
            "M5V1E3",
            &[PostOffice {
                office_id: "12345".to_string(),
                location: "EATON CENTRE PO".to_string(),
                office_address: "220 YONGE ST".to_string(),
                city: "TORONTO".to_string(),
                distance: 1.2,
                ..PostOffice::default()
            }],
        )
        .await
        .expect("seed offices");

    // Without auth context the catalogue still renders, with an empty
    // office list.
    let response = harness.call("GET", "/v1/shipping/label-options", None).await;
    assert!(response.success);
    let fields = response.shipping_method.expect("method").shippingpluginreqeust_credentials;
    assert_eq!(fields.len(), 10);
}

#[tokio::test]
async fn auth_layer_rejects_missing_and_bad_tokens() {
    let harness = Harness::new(StubCarrier::default(), false);

    let (status, _) = harness
        .call_raw("GET", "/v1/shipping/label-options", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = harness
        .call_raw("GET", "/v1/shipping/label-options", None, Some("Bearer junk"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn auth_layer_accepts_host_jwt_and_scopes_tenant() {
    let harness = Harness::new(StubCarrier::default(), false);
    harness
        .state
        .store
        .save_post_offices(
            7,
            "M5V1E3",
            &[PostOffice {
                office_id: "12345".to_string(),
                location: "EATON CENTRE PO".to_string(),
                office_address: "220 YONGE ST".to_string(),
                city: "TORONTO".to_string(),
                distance: 1.2,
                ..PostOffice::default()
            }],
        )
        .await
        .expect("seed offices");

    let now = chrono::Utc::now().timestamp();
    let claims = HostClaims {
        store_id: 7,
        exp: now + 3600,
        iat: now,
        iss: "host".to_string(),
    };
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(APP_SECRET.as_bytes()),
    )
    .expect("token");

    let (status, body) = harness
        .call_raw(
            "GET",
            "/v1/shipping/label-options",
            None,
            Some(&format!("Bearer {token}")),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let response: ResultResponse = serde_json::from_slice(&body).expect("response");
    let fields = response.shipping_method.expect("method").shippingpluginreqeust_credentials;
    let offices = fields
        .iter()
        .find(|field| field.field_name == "D2PO_office_selection")
        .expect("office selection");
    // Tenant 7's cache backs the selection radio.
    assert!(offices.field_value_set.iter().any(|value| value.contains("EATON CENTRE PO")));
}

#[tokio::test]
async fn system_health_needs_no_credentials() {
    let harness = Harness::new(StubCarrier::default(), false);
    let (status, body) = harness.call_raw("GET", "/v1/system/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).expect("health");
    assert_eq!(health["status"], "ok");
    assert_eq!(health["store_backend"], "memory");
}

#[tokio::test]
async fn international_rate_without_postal_succeeds() {
    let harness = Harness::new(
        StubCarrier {
            quotes: vec![quote("INT.XP", "Xpresspost International", 40.00)],
            ..StubCarrier::default()
        },
        true,
    );
    enable_services(&harness.state, &["INT.XP"]).await;

    let mut ship_request = domestic_ship_request();
    ship_request["customer"]["country_code"] = serde_json::json!("FR");
    ship_request["customer"]["zip"] = serde_json::json!("");

    let response = harness
        .call(
            "POST",
            "/v1/shipping/rates",
            Some(rate_request_body(ship_request, serde_json::json!([]))),
        )
        .await;
    assert!(response.success, "unexpected failure: {}", response.message);
    assert_eq!(response.shipping_rates.expect("rates").len(), 1);
}
