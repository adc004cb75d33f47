//! Cross-provider fallback.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{DataProvider, FetchRequest, ProviderError, ProviderPayload};

/// Serves requests from `primary`, delegating to `secondary` whenever the
/// primary payload is empty.
///
/// The delegated payload carries `delegated_from` (the primary id) and,
/// when present, the primary's error in `primary_error` so degraded tiles
/// remain traceable.
pub struct FallbackChain {
    primary: Arc<dyn DataProvider>,
    secondary: Arc<dyn DataProvider>,
}

impl FallbackChain {
    /// Chains `primary` in front of `secondary`.
    #[must_use]
    pub fn new(primary: Arc<dyn DataProvider>, secondary: Arc<dyn DataProvider>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl DataProvider for FallbackChain {
    fn id(&self) -> &str {
        self.primary.id()
    }

    async fn authenticate(&self) -> Result<(), ProviderError> {
        self.primary.authenticate().await?;
        self.secondary.authenticate().await
    }

    async fn fetch(&self, request: &FetchRequest<'_>) -> ProviderPayload {
        let primary = self.primary.fetch(request).await;
        if !primary.is_empty() {
            return primary;
        }

        log::debug!(
            "{} returned nothing for {}; delegating to {}",
            self.primary.id(),
            request.aoi.name(),
            self.secondary.id()
        );
        let mut payload = self
            .secondary
            .fetch(request)
            .await
            .with_metadata("delegated_from", self.primary.id());
        if let Some(error) = primary.metadata.get("live_error") {
            payload = payload.with_metadata("primary_error", error.clone());
        }
        payload
    }

    fn attribution(&self) -> &str {
        self.primary.attribution()
    }

    fn license(&self) -> &str {
        self.primary.license()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::open_buildings::{self, OpenBuildingsProvider};
    use crate::osm_buildings::{self, OsmBuildingsProvider};
    use crate::test_support;

    fn footprint_chain() -> FallbackChain {
        FallbackChain::new(
            Arc::new(OsmBuildingsProvider::offline()),
            Arc::new(OpenBuildingsProvider::new(42)),
        )
    }

    #[tokio::test]
    async fn empty_primary_delegates_to_secondary() {
        let aoi = test_support::aoi();
        let range = test_support::time_range();
        let payload = footprint_chain()
            .fetch(&FetchRequest::new(&aoi, &range, 10))
            .await;

        assert_eq!(payload.source, open_buildings::SOURCE);
        assert_eq!(payload.vectors.len(), 16);
        assert_eq!(payload.metadata["delegated_from"], json!(osm_buildings::SOURCE));
        assert!(!payload.metadata.contains_key("primary_error"));
    }

    #[tokio::test]
    async fn non_empty_primary_is_returned_as_is() {
        let aoi = test_support::aoi();
        let range = test_support::time_range();
        let chain = FallbackChain::new(
            Arc::new(OpenBuildingsProvider::new(1)),
            Arc::new(OsmBuildingsProvider::offline()),
        );
        let payload = chain.fetch(&FetchRequest::new(&aoi, &range, 10)).await;
        assert_eq!(payload.source, open_buildings::SOURCE);
        assert!(!payload.metadata.contains_key("delegated_from"));
    }

    #[test]
    fn chain_reports_primary_identity() {
        let chain = footprint_chain();
        assert_eq!(chain.id(), osm_buildings::SOURCE);
        assert_eq!(chain.license(), "ODbL 1.0 for OpenStreetMap data.");
    }
}
