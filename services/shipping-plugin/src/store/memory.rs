//! In-memory implementation of the plugin store.
//!
//! # Purpose
//! HashMaps guarded by `tokio::sync::RwLock`, for local development and
//! tests. Not durable: all state is lost on restart. Single-process
//! consistency only; mutations take write locks, reads take read locks.
use super::{
    CurrencyRate, LabelRecord, PluginStore, ShippingSettings, StoreError, StoreResult, clamp_page,
};
use async_trait::async_trait;
use chrono::Utc;
use portage_canpost::{PostOffice, normalize_postal_code};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct MemoryState {
    settings: HashMap<i64, ShippingSettings>,
    currency_rates: HashMap<(i64, String), CurrencyRate>,
    chosen_rates: HashMap<String, String>,
    tracking_numbers: HashMap<String, (String, u64)>,
    tracking_seq: u64,
    label_records: Vec<LabelRecord>,
    // Keyed (client_id, normalized search postal); insertion-ordered per key.
    post_offices: HashMap<(i64, String), Vec<PostOffice>>,
    postal_order: Vec<(i64, String)>,
    access_tokens: HashMap<i64, String>,
    oauth_states: HashMap<String, bool>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn base_display_of(office: &PostOffice) -> String {
    format!(
        "{} - {} ({})",
        office.location.trim(),
        office.office_address.trim(),
        office.city.trim()
    )
}

#[async_trait]
impl PluginStore for InMemoryStore {
    async fn save_shipping_settings(
        &self,
        client_id: i64,
        account_number: &str,
        enabled_services: &[String],
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let entry = state.settings.entry(client_id).or_default();
        entry.account_number = account_number.to_string();
        entry.enabled_services = enabled_services
            .iter()
            .map(|service| service.trim().to_string())
            .filter(|service| !service.is_empty())
            .collect();
        Ok(())
    }

    async fn load_shipping_settings(&self, client_id: i64) -> StoreResult<Option<ShippingSettings>> {
        Ok(self.state.read().await.settings.get(&client_id).cloned())
    }

    async fn save_default_postal_code(&self, client_id: i64, postal_code: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        let entry = state.settings.entry(client_id).or_default();
        entry.default_postal_code = postal_code.trim().to_uppercase();
        Ok(())
    }

    async fn save_currency_rate(
        &self,
        client_id: i64,
        currency_code: &str,
        rate_to_cad: f64,
    ) -> StoreResult<()> {
        let code = currency_code.trim().to_uppercase();
        if code.is_empty() {
            return Err(StoreError::Invalid("currency code is required".to_string()));
        }
        if rate_to_cad <= 0.0 {
            return Err(StoreError::Invalid(
                "rate_to_cad must be greater than zero".to_string(),
            ));
        }
        self.state.write().await.currency_rates.insert(
            (client_id, code.clone()),
            CurrencyRate {
                currency_code: code,
                rate_to_cad,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn load_currency_rate(
        &self,
        client_id: i64,
        currency_code: &str,
    ) -> StoreResult<Option<f64>> {
        let code = currency_code.trim().to_uppercase();
        if code.is_empty() {
            return Ok(None);
        }
        Ok(self
            .state
            .read()
            .await
            .currency_rates
            .get(&(client_id, code))
            .map(|rate| rate.rate_to_cad))
    }

    async fn load_currency_rates(&self, client_id: i64) -> StoreResult<Vec<CurrencyRate>> {
        let state = self.state.read().await;
        let mut rates: Vec<CurrencyRate> = state
            .currency_rates
            .iter()
            .filter(|((id, _), _)| *id == client_id)
            .map(|(_, rate)| rate.clone())
            .collect();
        rates.sort_by(|a, b| a.currency_code.cmp(&b.currency_code));
        Ok(rates)
    }

    async fn save_chosen_rate(&self, invoice_id: &str, rate_id: &str) -> StoreResult<()> {
        self.state
            .write()
            .await
            .chosen_rates
            .insert(invoice_id.to_string(), rate_id.to_string());
        Ok(())
    }

    async fn load_chosen_rate(&self, invoice_id: &str) -> StoreResult<Option<String>> {
        Ok(self.state.read().await.chosen_rates.get(invoice_id).cloned())
    }

    async fn save_tracking_number(&self, invoice_id: &str, tracking: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.tracking_seq += 1;
        let seq = state.tracking_seq;
        state
            .tracking_numbers
            .insert(invoice_id.to_string(), (tracking.to_string(), seq));
        Ok(())
    }

    async fn load_tracking_number(&self, invoice_id: &str) -> StoreResult<Option<String>> {
        Ok(self
            .state
            .read()
            .await
            .tracking_numbers
            .get(invoice_id)
            .map(|(tracking, _)| tracking.clone()))
    }

    async fn load_latest_tracking_number(&self) -> StoreResult<Option<String>> {
        Ok(self
            .state
            .read()
            .await
            .tracking_numbers
            .values()
            .max_by_key(|(_, seq)| *seq)
            .map(|(tracking, _)| tracking.clone()))
    }

    async fn save_label_record(&self, record: &LabelRecord) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.label_records.iter().any(|existing| existing.id == record.id) {
            return Err(StoreError::Invalid(format!(
                "label record {} already exists",
                record.id
            )));
        }
        let mut record = record.clone();
        record.created_at = Some(record.created_at.unwrap_or_else(Utc::now));
        state.label_records.push(record);
        Ok(())
    }

    async fn load_label_record(&self, label_id: &str) -> StoreResult<Option<LabelRecord>> {
        let label_id = label_id.trim();
        if label_id.is_empty() {
            return Ok(None);
        }
        Ok(self
            .state
            .read()
            .await
            .label_records
            .iter()
            .find(|record| record.id == label_id)
            .cloned())
    }

    async fn load_refund_link(&self, label_id: &str) -> StoreResult<Option<String>> {
        Ok(self
            .load_label_record(label_id)
            .await?
            .map(|record| record.refund_link.trim().to_string()))
    }

    async fn load_label_records_page(
        &self,
        from_date: &str,
        to_date: &str,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<LabelRecord>, bool)> {
        let (limit, offset) = clamp_page(if limit <= 0 { 10 } else { limit }, offset);
        let state = self.state.read().await;
        let mut records: Vec<LabelRecord> = state
            .label_records
            .iter()
            .filter(|record| record.carrier == "Canada Post" || record.carrier.is_empty())
            .filter(|record| {
                let Some(created_at) = record.created_at else {
                    return true;
                };
                let date = created_at.format("%Y-%m-%d").to_string();
                (from_date.trim().is_empty() || date.as_str() >= from_date.trim())
                    && (to_date.trim().is_empty() || date.as_str() <= to_date.trim())
            })
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let page: Vec<LabelRecord> = records
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize + 1)
            .collect();
        let has_next = page.len() > limit as usize;
        Ok((page.into_iter().take(limit as usize).collect(), has_next))
    }

    async fn save_post_offices(
        &self,
        client_id: i64,
        search_postal_code: &str,
        offices: &[PostOffice],
    ) -> StoreResult<()> {
        if offices.is_empty() {
            return Ok(());
        }
        let postal = normalize_postal_code(search_postal_code);
        let mut state = self.state.write().await;
        let key = (client_id, postal);
        if !state.postal_order.contains(&key) {
            state.postal_order.push(key.clone());
        }
        let cached = state.post_offices.entry(key).or_default();
        for office in offices {
            if office.office_id.trim().is_empty() {
                continue;
            }
            if cached
                .iter()
                .any(|existing| existing.office_id == office.office_id)
            {
                continue;
            }
            cached.push(office.clone());
        }
        cached.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(())
    }

    async fn load_post_offices(
        &self,
        client_id: i64,
        search_postal_code: &str,
    ) -> StoreResult<Vec<PostOffice>> {
        let postal = normalize_postal_code(search_postal_code);
        Ok(self
            .state
            .read()
            .await
            .post_offices
            .get(&(client_id, postal))
            .cloned()
            .unwrap_or_default())
    }

    async fn load_all_post_offices(&self, client_id: i64) -> StoreResult<Vec<PostOffice>> {
        let state = self.state.read().await;
        let mut offices: Vec<PostOffice> = state
            .post_offices
            .iter()
            .filter(|((id, _), _)| *id == client_id)
            .flat_map(|(_, offices)| offices.iter().cloned())
            .collect();
        offices.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(offices)
    }

    async fn find_office_id_by_display(
        &self,
        client_id: i64,
        display: &str,
    ) -> StoreResult<Option<String>> {
        let state = self.state.read().await;
        for ((id, _), offices) in &state.post_offices {
            if *id != client_id {
                continue;
            }
            for office in offices {
                if base_display_of(office) == display {
                    return Ok(Some(office.office_id.clone()));
                }
            }
        }
        Ok(None)
    }

    async fn used_postal_codes(&self, client_id: i64) -> StoreResult<Vec<String>> {
        let state = self.state.read().await;
        let mut postals: Vec<String> = state
            .post_offices
            .keys()
            .filter(|(id, _)| *id == client_id)
            .map(|(_, postal)| postal.clone())
            .collect();
        postals.sort();
        Ok(postals)
    }

    async fn used_postal_codes_page(
        &self,
        client_id: i64,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<String>, bool)> {
        let (limit, offset) = clamp_page(limit, offset);
        let state = self.state.read().await;
        // Most recently cached postal first, matching the Postgres ordering.
        let recent: Vec<String> = state
            .postal_order
            .iter()
            .rev()
            .filter(|(id, _)| *id == client_id)
            .map(|(_, postal)| postal.clone())
            .collect();
        let page: Vec<String> = recent
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize + 1)
            .collect();
        let has_next = page.len() > limit as usize;
        Ok((page.into_iter().take(limit as usize).collect(), has_next))
    }

    async fn delete_postal_code(&self, client_id: i64, postal_code: &str) -> StoreResult<()> {
        let postal = normalize_postal_code(postal_code);
        let mut state = self.state.write().await;
        let key = (client_id, postal);
        state.post_offices.remove(&key);
        state.postal_order.retain(|entry| entry != &key);
        Ok(())
    }

    async fn save_access_token(&self, client_id: i64, access_token: &str) -> StoreResult<()> {
        self.state
            .write()
            .await
            .access_tokens
            .insert(client_id, access_token.to_string());
        Ok(())
    }

    async fn load_access_token(&self, client_id: i64) -> StoreResult<Option<String>> {
        Ok(self.state.read().await.access_tokens.get(&client_id).cloned())
    }

    async fn save_oauth_state(&self, state: &str) -> StoreResult<()> {
        self.state
            .write()
            .await
            .oauth_states
            .insert(state.to_string(), false);
        Ok(())
    }

    async fn consume_oauth_state(&self, state: &str) -> StoreResult<bool> {
        let mut guard = self.state.write().await;
        match guard.oauth_states.get_mut(state) {
            Some(used) if !*used => {
                *used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
