// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use super::{into_records, ListingKind, ListingQuery, PropertySource};
use crate::adk::error::{FetchError, ReportError};
use crate::submarket::state::Record;

const PROVIDER: &str = "rentcast";

/// Property records and listing search over the RentCast REST API
pub struct RentCastClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl RentCastClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ReportError> {
        if api_key.trim().is_empty() {
            return Err(ReportError::config("RENTCAST_API_KEY must be set"));
        }
        Ok(Self {
            client: Client::new(),
            base_url: Url::parse(base_url)?,
            api_key: api_key.to_string(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::malformed(PROVIDER, "base URL cannot have a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `/properties/{id}` where the id is the address with spaces replaced by dashes
    fn property_url(&self, address: &str) -> Result<Url, FetchError> {
        let id = address.replace(' ', "-");
        self.endpoint(&["properties", id.as_str()])
    }

    fn listings_url(&self, kind: ListingKind) -> Result<Url, FetchError> {
        match kind {
            ListingKind::Sale => self.endpoint(&["listings", "sale"]),
            ListingKind::Rental => self.endpoint(&["listings", "rental", "long-term"]),
        }
    }

    async fn get_json(&self, url: Url, query: &[(&str, String)]) -> Result<Value, FetchError> {
        log::debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .header("X-Api-Key", &self.api_key)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::transport(PROVIDER, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        resp.json()
            .await
            .map_err(|e| FetchError::malformed(PROVIDER, e.to_string()))
    }
}

fn listing_params(query: &ListingQuery) -> Vec<(&'static str, String)> {
    vec![
        ("address", query.address.clone()),
        ("radius", query.radius.to_string()),
        ("propertyType", query.property_type.clone()),
        ("limit", query.limit.to_string()),
        ("offset", query.offset.to_string()),
    ]
}

#[async_trait]
impl PropertySource for RentCastClient {
    async fn property_record(&self, address: &str) -> Result<Record, FetchError> {
        let url = self.property_url(address)?;
        match self.get_json(url, &[]).await? {
            Value::Object(record) => Ok(record),
            // Some lookups answer with a one-element array
            Value::Array(items) => into_records(PROVIDER, Value::Array(items))?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    FetchError::malformed(PROVIDER, format!("no property record for {}", address))
                }),
            other => Err(FetchError::malformed(
                PROVIDER,
                format!("expected a property record, got {}", other),
            )),
        }
    }

    async fn listings_page(
        &self,
        kind: ListingKind,
        query: &ListingQuery,
    ) -> Result<Vec<Record>, FetchError> {
        let url = self.listings_url(kind)?;
        let page = self.get_json(url, &listing_params(query)).await?;
        into_records(PROVIDER, page)
    }
}
