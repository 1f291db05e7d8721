//! Tenant persistence: settings, currency rates, labels, chosen rates,
//! tracking numbers, the post-office cache, and OAuth state.
//!
//! # Purpose
//! `PluginStore` is the seam between the pipelines and storage. Two
//! implementations exist: an in-memory store for development and tests, and
//! a Postgres store with idempotent schema evolution for production.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use portage_canpost::PostOffice;
use std::collections::HashSet;
use thiserror::Error;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid argument: {0}")]
    Invalid(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Per-tenant carrier configuration maintained through the settings UI.
#[derive(Debug, Clone, Default)]
pub struct ShippingSettings {
    pub account_number: String,
    pub enabled_services: HashSet<String>,
    pub default_postal_code: String,
}

impl ShippingSettings {
    pub fn service_enabled(&self, service_code: &str) -> bool {
        self.enabled_services.contains(service_code)
    }
}

#[derive(Debug, Clone)]
pub struct CurrencyRate {
    pub currency_code: String,
    pub rate_to_cad: f64,
    pub updated_at: DateTime<Utc>,
}

/// Immutable record of a successfully created label.
#[derive(Debug, Clone, Default)]
pub struct LabelRecord {
    pub id: String,
    pub shipment_id: String,
    pub tracking_number: String,
    pub invoice_uuid: String,
    pub rate_id: String,
    pub carrier: String,
    pub service_code: String,
    pub service_name: String,
    pub shipping_charges_cents: i64,
    pub delivery_date: String,
    pub delivery_days: i32,
    pub refund_link: String,
    /// Parcel weight in kilograms.
    pub weight: f64,
    pub created_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait PluginStore: Send + Sync {
    // Shipping settings
    async fn save_shipping_settings(
        &self,
        client_id: i64,
        account_number: &str,
        enabled_services: &[String],
    ) -> StoreResult<()>;
    async fn load_shipping_settings(&self, client_id: i64) -> StoreResult<Option<ShippingSettings>>;
    async fn save_default_postal_code(&self, client_id: i64, postal_code: &str) -> StoreResult<()>;

    // Currency rates
    async fn save_currency_rate(
        &self,
        client_id: i64,
        currency_code: &str,
        rate_to_cad: f64,
    ) -> StoreResult<()>;
    async fn load_currency_rate(
        &self,
        client_id: i64,
        currency_code: &str,
    ) -> StoreResult<Option<f64>>;
    async fn load_currency_rates(&self, client_id: i64) -> StoreResult<Vec<CurrencyRate>>;

    // Chosen rates and tracking numbers (latest wins per invoice)
    async fn save_chosen_rate(&self, invoice_id: &str, rate_id: &str) -> StoreResult<()>;
    async fn load_chosen_rate(&self, invoice_id: &str) -> StoreResult<Option<String>>;
    async fn save_tracking_number(&self, invoice_id: &str, tracking: &str) -> StoreResult<()>;
    async fn load_tracking_number(&self, invoice_id: &str) -> StoreResult<Option<String>>;
    async fn load_latest_tracking_number(&self) -> StoreResult<Option<String>>;

    // Label records
    async fn save_label_record(&self, record: &LabelRecord) -> StoreResult<()>;
    async fn load_label_record(&self, label_id: &str) -> StoreResult<Option<LabelRecord>>;
    async fn load_refund_link(&self, label_id: &str) -> StoreResult<Option<String>>;
    /// Records for the Canada Post carrier, newest first, with inclusive
    /// `YYYY-MM-DD` date bounds. Returns `(records, has_next_page)`.
    async fn load_label_records_page(
        &self,
        from_date: &str,
        to_date: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<LabelRecord>, bool)>;

    // Post-office cache
    async fn save_post_offices(
        &self,
        client_id: i64,
        search_postal_code: &str,
        offices: &[PostOffice],
    ) -> StoreResult<()>;
    async fn load_post_offices(
        &self,
        client_id: i64,
        search_postal_code: &str,
    ) -> StoreResult<Vec<PostOffice>>;
    async fn load_all_post_offices(&self, client_id: i64) -> StoreResult<Vec<PostOffice>>;
    async fn find_office_id_by_display(
        &self,
        client_id: i64,
        display: &str,
    ) -> StoreResult<Option<String>>;
    async fn used_postal_codes(&self, client_id: i64) -> StoreResult<Vec<String>>;
    async fn used_postal_codes_page(
        &self,
        client_id: i64,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<String>, bool)>;
    async fn delete_postal_code(&self, client_id: i64, postal_code: &str) -> StoreResult<()>;

    // OAuth state and delegated tokens
    async fn save_access_token(&self, client_id: i64, access_token: &str) -> StoreResult<()>;
    async fn load_access_token(&self, client_id: i64) -> StoreResult<Option<String>>;
    async fn save_oauth_state(&self, state: &str) -> StoreResult<()>;
    /// Marks the state used. Returns false when unknown or already used.
    async fn consume_oauth_state(&self, state: &str) -> StoreResult<bool>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}

pub(crate) fn parse_enabled_services(value: &str) -> HashSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn clamp_page(limit: i64, offset: i64) -> (i64, i64) {
    let limit = if limit <= 0 { 20 } else { limit.min(200) };
    let offset = offset.max(0);
    (limit, offset)
}
