//! Rate snapshots: server-held state bridging the quote and label calls.
//!
//! # Purpose
//! A quote response hands the client an opaque `rate_id`; everything needed
//! to later produce a shipment is captured server-side under that id so the
//! label call never has to trust client-resupplied rate context.
//!
//! # Notes
//! Ids are v4 UUIDs (128 bits from a CSPRNG) and the store exposes no
//! enumeration, so possession of an id is the only way to reach a snapshot.
//! Snapshots are stored as JSON payloads with a TTL and lazily expired on
//! read.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub rate_id: String,
    pub service_code: String,
    pub service_name: String,
    /// Quoted total in CAD cents, exactly as returned by the carrier.
    pub price_cents: i64,
    pub currency_code: String,
    pub rate_to_cad: f64,
    pub delivery_date: String,
    pub signature: String,
    #[serde(default)]
    pub custom_options: HashMap<String, String>,
    pub shipper: AddressSnapshot,
    pub customer: AddressSnapshot,
    pub parcel: ParcelMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customs_info: Option<CustomsSnapshot>,
    #[serde(default)]
    pub insurance: InsuranceSnapshot,
    pub origin: OriginSnapshot,
    pub destination: DestinationSnapshot,
    pub invoice_uuid: String,
    pub client_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Default for RateSnapshot {
    fn default() -> Self {
        Self {
            rate_id: String::new(),
            service_code: String::new(),
            service_name: String::new(),
            price_cents: 0,
            currency_code: String::new(),
            rate_to_cad: 0.0,
            delivery_date: String::new(),
            signature: String::new(),
            custom_options: HashMap::new(),
            shipper: AddressSnapshot::default(),
            customer: AddressSnapshot::default(),
            parcel: ParcelMetrics::default(),
            customs_info: None,
            insurance: InsuranceSnapshot::default(),
            origin: OriginSnapshot::default(),
            destination: DestinationSnapshot::default(),
            invoice_uuid: String::new(),
            client_id: 0,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddressSnapshot {
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

/// Parcel weight in kilograms, dimensions in centimetres.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParcelMetrics {
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub length: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomsSnapshot {
    #[serde(default)]
    pub eel_pfc: String,
    #[serde(default)]
    pub contents_type: String,
    #[serde(default)]
    pub contents_explanation: String,
    #[serde(default)]
    pub restriction_comments: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub custom_items: Vec<CustomsItemSnapshot>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomsItemSnapshot {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub quantity: i32,
    /// Declared total value for the line, in the customs currency, cents.
    #[serde(default)]
    pub total_value_cents: i64,
    /// Unit weight in kilograms.
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub hs_tariff_number: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub origin_country: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsuranceSnapshot {
    #[serde(default)]
    pub decimal: String,
    #[serde(default)]
    pub currency_code: String,
    /// Amount in tenant-currency cents.
    #[serde(default)]
    pub amount: i64,
}

/// Carrier-side origin captured at quote time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OriginSnapshot {
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub address_line: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub province: String,
}

/// Carrier-side destination captured at quote time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DestinationSnapshot {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub address_line: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub province: String,
}

/// Fresh unguessable rate id.
pub fn new_rate_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("rate snapshot missing rate_id")]
    MissingRateId,
    #[error("rate snapshot codec error: {0}")]
    Codec(String),
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persists the snapshot under its rate id with the configured TTL,
    /// overwriting any previous payload for the same key.
    async fn save(&self, snapshot: &RateSnapshot) -> Result<(), SnapshotError>;
    /// Loads a snapshot, or `None` when the id is unknown or expired.
    async fn load(&self, rate_id: &str) -> Result<Option<RateSnapshot>, SnapshotError>;
}

struct TtlEntry {
    payload: String,
    expires_at: Instant,
}

/// In-process TTL store. Entries are JSON payloads so a remote key-value
/// implementation of the trait stores the identical representation.
pub struct TtlSnapshotStore {
    inner: RwLock<HashMap<String, TtlEntry>>,
    ttl: Duration,
}

impl TtlSnapshotStore {
    pub fn new(ttl: Duration) -> Self {
        let ttl = if ttl.is_zero() { DEFAULT_TTL } else { ttl };
        Self {
            inner: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn with_ttl_minutes(minutes: u64) -> Self {
        Self::new(Duration::from_secs(minutes * 60))
    }
}

#[async_trait]
impl SnapshotStore for TtlSnapshotStore {
    async fn save(&self, snapshot: &RateSnapshot) -> Result<(), SnapshotError> {
        if snapshot.rate_id.trim().is_empty() {
            return Err(SnapshotError::MissingRateId);
        }
        let payload =
            serde_json::to_string(snapshot).map_err(|err| SnapshotError::Codec(err.to_string()))?;
        // Compute expiry once so reads only compare Instants.
        let entry = TtlEntry {
            payload,
            expires_at: Instant::now() + self.ttl,
        };
        self.inner
            .write()
            .await
            .insert(snapshot.rate_id.clone(), entry);
        Ok(())
    }

    async fn load(&self, rate_id: &str) -> Result<Option<RateSnapshot>, SnapshotError> {
        let rate_id = rate_id.trim();
        if rate_id.is_empty() {
            return Err(SnapshotError::MissingRateId);
        }
        // Take a write lock so expired entries can be evicted on read.
        let mut guard = self.inner.write().await;
        let Some(entry) = guard.get(rate_id) else {
            return Ok(None);
        };
        if Instant::now() >= entry.expires_at {
            // Lazy-expire on read to avoid a background sweeper.
            guard.remove(rate_id);
            return Ok(None);
        }
        let snapshot = serde_json::from_str(&entry.payload)
            .map_err(|err| SnapshotError::Codec(err.to_string()))?;
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn snapshot(rate_id: &str) -> RateSnapshot {
        RateSnapshot {
            rate_id: rate_id.to_string(),
            service_code: "DOM.EP".to_string(),
            service_name: "Expedited Parcel".to_string(),
            price_cents: 1430,
            currency_code: "CAD".to_string(),
            rate_to_cad: 1.0,
            ..RateSnapshot::default()
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = TtlSnapshotStore::new(Duration::from_secs(60));
        store.save(&snapshot("rate-1")).await.expect("save");

        let loaded = store.load("rate-1").await.expect("load").expect("present");
        assert_eq!(loaded.service_code, "DOM.EP");
        assert_eq!(loaded.price_cents, 1430);
        assert_eq!(loaded.rate_to_cad, 1.0);
    }

    #[tokio::test]
    async fn unknown_id_is_none() {
        let store = TtlSnapshotStore::new(Duration::from_secs(60));
        assert!(store.load("missing").await.expect("load").is_none());
    }

    #[tokio::test]
    async fn empty_id_is_rejected() {
        let store = TtlSnapshotStore::new(Duration::from_secs(60));
        assert!(matches!(
            store.load("  ").await,
            Err(SnapshotError::MissingRateId)
        ));
        assert!(matches!(
            store.save(&snapshot("")).await,
            Err(SnapshotError::MissingRateId)
        ));
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let store = TtlSnapshotStore::new(Duration::from_millis(30));
        store.save(&snapshot("rate-ttl")).await.expect("save");
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(store.load("rate-ttl").await.expect("load").is_none());
    }

    #[tokio::test]
    async fn save_overwrites_existing_key() {
        let store = TtlSnapshotStore::new(Duration::from_secs(60));
        store.save(&snapshot("rate-1")).await.expect("save");
        let mut updated = snapshot("rate-1");
        updated.price_cents = 999;
        store.save(&updated).await.expect("save");

        let loaded = store.load("rate-1").await.expect("load").expect("present");
        assert_eq!(loaded.price_cents, 999);
    }

    #[test]
    fn rate_ids_do_not_collide() {
        let mut seen = HashSet::with_capacity(1_000_000);
        for _ in 0..1_000_000 {
            assert!(seen.insert(new_rate_id()));
        }
    }
}
