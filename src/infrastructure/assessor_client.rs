//! Assessor web endpoints as a [`DiscoveryClient`] and [`DetailClient`]
//!
//! Discovery is a GET keyed by the 8-digit search term; detail is a form POST
//! keyed by the 9-digit parcel number. Both answer with JSON arrays.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::domain::errors::{CrawlError, CrawlResult};
use crate::domain::parcel::{Apn, RawParcelRecord, SearchKey};
use crate::domain::record_source::{DetailClient, DiscoveryClient};
use crate::infrastructure::config::EndpointConfig;
use crate::infrastructure::http_client::HttpClient;

pub struct AssessorClient {
    http: Arc<HttpClient>,
    endpoints: EndpointConfig,
}

impl AssessorClient {
    pub fn new(http: Arc<HttpClient>, endpoints: EndpointConfig) -> Self {
        Self { http, endpoints }
    }
}

#[async_trait]
impl DiscoveryClient for AssessorClient {
    async fn discover(&self, key: SearchKey) -> CrawlResult<HashSet<Apn>> {
        let url = &self.endpoints.search_url;
        let term = key.search_term();
        let body = self
            .http
            .get_text(url, &[("field", self.endpoints.search_field.as_str()), ("term", &term)])
            .await?;

        let found = decode_search_results(url, &body)?;
        debug!("🔎 Search {} returned {} valid parcel numbers", term, found.len());
        Ok(found)
    }
}

#[async_trait]
impl DetailClient for AssessorClient {
    async fn fetch_detail(&self, apn: Apn) -> CrawlResult<Option<RawParcelRecord>> {
        let url = &self.endpoints.detail_url;
        let value = apn.query_value();
        let body = self
            .http
            .post_form_text(
                url,
                &[
                    ("field", self.endpoints.search_field.as_str()),
                    ("qtype", self.endpoints.detail_qtype.as_str()),
                    ("value", &value),
                ],
            )
            .await?;

        decode_parcel_detail(url, &body)
    }
}

/// Valid parcel numbers from a search response.
///
/// Items are either `[]` or objects with a string `value`; anything without an
/// all-digit `value` is dropped.
pub fn decode_search_results(url: &str, body: &str) -> CrawlResult<HashSet<Apn>> {
    let items: Vec<Value> = serde_json::from_str(body)
        .map_err(|e| CrawlError::malformed(url, format!("search results: {e}")))?;

    Ok(items
        .iter()
        .filter_map(|item| item.get("value").and_then(Value::as_str))
        .filter_map(Apn::parse_digits)
        .collect())
}

#[derive(Debug, Deserialize)]
struct ParcelDetailWire {
    #[serde(default)]
    lng: Option<Value>,
    #[serde(default)]
    lat: Option<Value>,
    #[serde(default)]
    class_code: Option<Value>,
    #[serde(default, rename = "District")]
    district: Option<Value>,
    #[serde(default)]
    address: Option<Value>,
}

/// Raw detail record from an assessment-info response; `None` when the array is empty.
///
/// Each item must be a JSON object; anything else is a malformed response.
pub fn decode_parcel_detail(url: &str, body: &str) -> CrawlResult<Option<RawParcelRecord>> {
    let items: Vec<Value> = serde_json::from_str(body)
        .map_err(|e| CrawlError::malformed(url, format!("parcel detail: {e}")))?;

    if items.len() > 1 {
        debug!("Detail response from {} had {} records; using the first", url, items.len());
    }
    let Some(item) = items.into_iter().next() else {
        return Ok(None);
    };

    let malformed = |reason: String| CrawlError::malformed(url, reason);
    let Value::Object(fields) = item else {
        return Err(malformed(format!("parcel detail is not an object: {item}")));
    };
    let wire: ParcelDetailWire = serde_json::from_value(Value::Object(fields))
        .map_err(|e| malformed(format!("parcel detail: {e}")))?;

    Ok(Some(RawParcelRecord {
        longitude: coordinate("lng", wire.lng).map_err(malformed)?,
        latitude: coordinate("lat", wire.lat).map_err(malformed)?,
        class_code: text("class_code", wire.class_code).map_err(malformed)?,
        district: text("District", wire.district).map_err(malformed)?,
        address: text("address", wire.address).map_err(malformed)?,
    }))
}

fn coordinate(field: &str, value: Option<Value>) -> Result<Option<f64>, String> {
    let parsed = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => Some(
            s.trim()
                .parse::<f64>()
                .map_err(|_| format!("{field} is not numeric: {s:?}"))?,
        ),
        Some(other) => return Err(format!("{field} has unexpected type: {other}")),
    };

    match parsed {
        Some(f) if !f.is_finite() => Err(format!("{field} is not finite: {f}")),
        other => Ok(other),
    }
}

fn text(field: &str, value: Option<Value>) -> Result<Option<String>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(format!("{field} has unexpected type: {other}")),
    }
}
