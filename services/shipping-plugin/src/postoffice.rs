//! Post-office lookup and per-tenant caching.
//!
//! # Purpose
//! Backs the "deliver to post office" option: offices near a postal code
//! are fetched from Canada Post once per tenant and postal code, then served
//! from the `client_post_offices` cache. Display selections made in the
//! option UI are resolved back to office ids here.
use crate::store::{PluginStore, StoreError};
use portage_canpost::{CarrierApi, CarrierError, PostOffice, base_display, normalize_postal_code};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PostOfficeError {
    #[error("client id required")]
    ClientIdRequired,
    #[error("postal code required")]
    PostalCodeRequired,
    #[error("office selection required")]
    SelectionRequired,
    #[error("office not found")]
    OfficeNotFound,
    #[error("failed to fetch from Canada Post: {0}")]
    Carrier(#[from] CarrierError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct PostOfficeService {
    store: Arc<dyn PluginStore>,
    carrier: Arc<dyn CarrierApi>,
}

impl PostOfficeService {
    pub fn new(store: Arc<dyn PluginStore>, carrier: Arc<dyn CarrierApi>) -> Self {
        Self { store, carrier }
    }

    /// Returns offices for the postal code, and whether they came from the
    /// cache. A cache-write failure after a successful fetch is logged and
    /// the fetched offices are still returned.
    pub async fn get_or_fetch(
        &self,
        client_id: i64,
        postal_code: &str,
    ) -> Result<(Vec<PostOffice>, bool), PostOfficeError> {
        if client_id <= 0 {
            return Err(PostOfficeError::ClientIdRequired);
        }
        let postal = normalize_postal_code(postal_code);
        if postal.is_empty() {
            return Err(PostOfficeError::PostalCodeRequired);
        }

        let cached = self.store.load_post_offices(client_id, &postal).await?;
        if !cached.is_empty() {
            return Ok((cached, true));
        }

        let offices = self.carrier.find_post_offices(&postal).await?;
        if offices.is_empty() {
            return Ok((offices, false));
        }
        if let Err(err) = self
            .store
            .save_post_offices(client_id, &postal, &offices)
            .await
        {
            tracing::warn!(client_id, postal = %postal, error = %err, "failed to cache post offices");
        }
        Ok((offices, false))
    }

    /// Resolves a display selection (with or without the trailing distance
    /// annotation) back to the cached office id.
    pub async fn find_office_id_by_display_text(
        &self,
        client_id: i64,
        selection: &str,
    ) -> Result<String, PostOfficeError> {
        if client_id <= 0 {
            return Err(PostOfficeError::ClientIdRequired);
        }
        let base = base_display(selection);
        if base.is_empty() {
            return Err(PostOfficeError::SelectionRequired);
        }
        match self
            .store
            .find_office_id_by_display(client_id, &base)
            .await?
        {
            Some(office_id) if !office_id.trim().is_empty() => Ok(office_id.trim().to_string()),
            _ => Err(PostOfficeError::OfficeNotFound),
        }
    }

    pub async fn list_by_postal(
        &self,
        client_id: i64,
        postal_code: &str,
    ) -> Result<Vec<PostOffice>, PostOfficeError> {
        if client_id <= 0 {
            return Err(PostOfficeError::ClientIdRequired);
        }
        let postal = normalize_postal_code(postal_code);
        if postal.is_empty() {
            return Err(PostOfficeError::PostalCodeRequired);
        }
        Ok(self.store.load_post_offices(client_id, &postal).await?)
    }

    pub async fn list_all(&self, client_id: i64) -> Result<Vec<PostOffice>, PostOfficeError> {
        if client_id <= 0 {
            return Err(PostOfficeError::ClientIdRequired);
        }
        Ok(self.store.load_all_post_offices(client_id).await?)
    }

    pub async fn used_postal_codes(&self, client_id: i64) -> Result<Vec<String>, PostOfficeError> {
        if client_id <= 0 {
            return Err(PostOfficeError::ClientIdRequired);
        }
        Ok(self.store.used_postal_codes(client_id).await?)
    }

    pub async fn used_postal_codes_page(
        &self,
        client_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<String>, bool), PostOfficeError> {
        if client_id <= 0 {
            return Err(PostOfficeError::ClientIdRequired);
        }
        Ok(self
            .store
            .used_postal_codes_page(client_id, limit, offset)
            .await?)
    }

    pub async fn delete_postal_code(
        &self,
        client_id: i64,
        postal_code: &str,
    ) -> Result<(), PostOfficeError> {
        if client_id <= 0 {
            return Err(PostOfficeError::ClientIdRequired);
        }
        let postal = normalize_postal_code(postal_code);
        if postal.is_empty() {
            return Err(PostOfficeError::PostalCodeRequired);
        }
        Ok(self.store.delete_postal_code(client_id, &postal).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use portage_canpost::types::{
        RateRequest, RateResponse, RefundTicket, ShipmentRequest, ShipmentResponse,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubCarrier {
        offices: Vec<PostOffice>,
        lookups: AtomicUsize,
    }

    impl StubCarrier {
        fn new(offices: Vec<PostOffice>) -> Self {
            Self {
                offices,
                lookups: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CarrierApi for StubCarrier {
        async fn get_rates(&self, _request: &RateRequest) -> Result<RateResponse, CarrierError> {
            unimplemented!("not used in post office tests")
        }

        async fn create_shipment(
            &self,
            _request: &ShipmentRequest,
        ) -> Result<ShipmentResponse, CarrierError> {
            unimplemented!("not used in post office tests")
        }

        async fn get_artifact(&self, _url: &str) -> Result<Vec<u8>, CarrierError> {
            unimplemented!("not used in post office tests")
        }

        async fn refund_shipment(
            &self,
            _refund_url: &str,
            _email: &str,
        ) -> Result<RefundTicket, CarrierError> {
            unimplemented!("not used in post office tests")
        }

        async fn find_post_offices(
            &self,
            _postal_code: &str,
        ) -> Result<Vec<PostOffice>, CarrierError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.offices.clone())
        }
    }

    fn office(id: &str) -> PostOffice {
        PostOffice {
            office_id: id.to_string(),
            location: "EATON CENTRE PO".to_string(),
            office_address: "220 YONGE ST".to_string(),
            city: "TORONTO".to_string(),
            distance: 1.2,
            ..PostOffice::default()
        }
    }

    #[tokio::test]
    async fn first_lookup_fetches_then_serves_from_cache() {
        let store = Arc::new(InMemoryStore::new());
        let carrier = Arc::new(StubCarrier::new(vec![office("12345")]));
        let service = PostOfficeService::new(store, carrier.clone());

        let (offices, cached) = service.get_or_fetch(7, "m5v 1e3").await.expect("fetch");
        assert_eq!(offices.len(), 1);
        assert!(!cached);

        let (offices, cached) = service.get_or_fetch(7, "M5V1E3").await.expect("fetch");
        assert_eq!(offices.len(), 1);
        assert!(cached);
        assert_eq!(carrier.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn selection_with_distance_annotation_resolves() {
        let store = Arc::new(InMemoryStore::new());
        let carrier = Arc::new(StubCarrier::new(vec![office("12345")]));
        let service = PostOfficeService::new(store, carrier);
        service.get_or_fetch(7, "M5V1E3").await.expect("seed");

        let office_id = service
            .find_office_id_by_display_text(7, "EATON CENTRE PO - 220 YONGE ST (TORONTO) [1.20km]")
            .await
            .expect("resolve");
        assert_eq!(office_id, "12345");
    }

    #[tokio::test]
    async fn unknown_selection_is_an_error() {
        let store = Arc::new(InMemoryStore::new());
        let carrier = Arc::new(StubCarrier::new(vec![]));
        let service = PostOfficeService::new(store, carrier);

        let result = service
            .find_office_id_by_display_text(7, "NOWHERE PO - 0 NULL ST (TORONTO)")
            .await;
        assert!(matches!(result, Err(PostOfficeError::OfficeNotFound)));

        let result = service.find_office_id_by_display_text(7, "  ").await;
        assert!(matches!(result, Err(PostOfficeError::SelectionRequired)));
    }

    #[tokio::test]
    async fn client_id_is_required() {
        let store = Arc::new(InMemoryStore::new());
        let carrier = Arc::new(StubCarrier::new(vec![]));
        let service = PostOfficeService::new(store, carrier);
        assert!(matches!(
            service.get_or_fetch(0, "M5V1E3").await,
            Err(PostOfficeError::ClientIdRequired)
        ));
        assert!(matches!(
            service.get_or_fetch(7, "  ").await,
            Err(PostOfficeError::PostalCodeRequired)
        ));
    }
}
