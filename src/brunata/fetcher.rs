//! Meter catalog and consumption retrieval.

use crate::brunata::endpoints::{DateRange, ProviderEndpoints};
use crate::brunata::gateway::{browser_headers, HttpGateway, HttpRequest, HttpResponse};
use crate::clock::Clock;
use crate::error::FetchError;
use crate::model::{Category, ConsumptionDataset, ConsumptionPayload, Granularity};
use reqwest::header::AUTHORIZATION;
use reqwest::Url;
use serde_derive::Deserialize;
use std::fmt;
use std::sync::Arc;

const METERS: &str = "meters";
const CONSUMPTION: &str = "consumption";

/// Meter identifiers come back as numbers from some accounts and strings
/// from others.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum MeterId {
    Number(i64),
    Text(String),
}

impl fmt::Display for MeterId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MeterId::Number(id) => write!(f, "{}", id),
            MeterId::Text(id) => write!(f, "{}", id),
        }
    }
}

/// One entry of the account's meter inventory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterInfo {
    pub meter_id: Option<MeterId>,
    pub meter_no: Option<String>,
    pub placement: Option<String>,
    pub allocation_unit: Option<String>,
}

/// Pulls data from the provider and accumulates one cycle's dataset.
pub struct ConsumptionFetcher {
    gateway: Arc<dyn HttpGateway>,
    endpoints: ProviderEndpoints,
    clock: Arc<dyn Clock>,
    catalog: Vec<MeterInfo>,
    dataset: ConsumptionDataset,
}

impl ConsumptionFetcher {
    pub fn new(
        gateway: Arc<dyn HttpGateway>,
        endpoints: ProviderEndpoints,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            endpoints,
            clock,
            catalog: Vec::new(),
            dataset: ConsumptionDataset::new(),
        }
    }

    /// Replaces the cached meter inventory. The dataset is left alone.
    pub async fn fetch_meter_catalog(&mut self, token: &str) -> Result<&[MeterInfo], FetchError> {
        let range = DateRange::ending(self.clock.now().date_naive(), Granularity::Day);
        let response = self
            .get(METERS, self.endpoints.meters_url(&range), token)
            .await?;

        self.catalog = response.json().map_err(|source| FetchError::Decode {
            endpoint: METERS,
            source,
        })?;
        tracing::debug!(meters = self.catalog.len(), "Meter catalog fetched");
        Ok(&self.catalog)
    }

    /// Fetches one category at one granularity and stores it in the
    /// dataset, replacing whatever the pair held before.
    pub async fn fetch_consumption(
        &mut self,
        category: Category,
        granularity: Granularity,
        token: &str,
    ) -> Result<(), FetchError> {
        let range = DateRange::ending(self.clock.now().date_naive(), granularity);
        let url = self.endpoints.consumption_url(category, granularity, &range);
        let response = self.get(CONSUMPTION, url, token).await?;

        let mut payload =
            ConsumptionPayload::from_json(&response.body).map_err(|source| FetchError::Decode {
                endpoint: CONSUMPTION,
                source,
            })?;
        let meters = payload.take(category, granularity);
        tracing::debug!(
            category = %category,
            granularity = %granularity,
            meters = meters.len(),
            "Consumption fetched"
        );
        self.dataset.insert(category, granularity, meters);
        Ok(())
    }

    pub fn consumption_dataset(&self) -> &ConsumptionDataset {
        &self.dataset
    }

    pub fn catalog(&self) -> &[MeterInfo] {
        &self.catalog
    }

    /// Starts a new cycle. The catalog is kept until the next fetch replaces it.
    pub fn reset(&mut self) {
        self.dataset.clear();
    }

    async fn get(
        &self,
        endpoint: &'static str,
        url: Url,
        token: &str,
    ) -> Result<HttpResponse, FetchError> {
        let request = HttpRequest::get(url)
            .with_headers(browser_headers())
            .with_header(AUTHORIZATION, &format!("Bearer {}", token))
            .map_err(|source| FetchError::Transport { endpoint, source })?;

        let response = self
            .gateway
            .request(request)
            .await
            .map_err(|source| FetchError::Transport { endpoint, source })?;

        if !response.status.is_success() {
            return Err(FetchError::from_status(
                endpoint,
                response.status,
                response.body,
            ));
        }
        Ok(response)
    }
}
