//! services/api/src/adapters/nlp.rs
//!
//! HTTP adapter for the NLP service: text-to-pictogram translation,
//! pictogram-to-text glosses and word completion.

use async_trait::async_trait;
use pictolink_core::domain::{CatalogRecord, Pictogram};
use pictolink_core::ports::{
    AutocompleteService, GlossService, PortError, PortResult, TextToPictogramService,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
}

/// Pictograms arrive in catalog shape, so ids may be numbers or numeric strings.
#[derive(Deserialize)]
struct PictogramsResponse {
    #[serde(default)]
    pictograms: Vec<CatalogRecord>,
}

#[derive(Serialize)]
struct GlossRequest<'a> {
    pictograms: &'a [Pictogram],
}

#[derive(Deserialize)]
struct GlossResponse {
    #[serde(default)]
    text: String,
}

/// Talks to the NLP service rooted at `base_url` (e.g. `http://localhost:8000/api/v1`).
#[derive(Clone)]
pub struct NlpHttpAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl NlpHttpAdapter {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

fn port_error(e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        PortError::Timeout(e.to_string())
    } else {
        PortError::Unexpected(e.to_string())
    }
}

#[async_trait]
impl TextToPictogramService for NlpHttpAdapter {
    async fn text_to_pictograms(&self, text: &str) -> PortResult<Vec<Pictogram>> {
        let response: PictogramsResponse = self
            .client
            .post(self.url("text-to-pictos"))
            .json(&TranslateRequest { text })
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(port_error)?
            .json()
            .await
            .map_err(port_error)?;

        let pictograms: Vec<Pictogram> = response
            .pictograms
            .iter()
            .filter_map(CatalogRecord::to_pictogram)
            .collect();
        debug!("'{}' translated to {} pictograms.", text, pictograms.len());
        Ok(pictograms)
    }
}

#[async_trait]
impl GlossService for NlpHttpAdapter {
    async fn pictograms_to_text(&self, pictograms: &[Pictogram]) -> PortResult<String> {
        let response: GlossResponse = self
            .client
            .post(self.url("pictos-to-text"))
            .json(&GlossRequest { pictograms })
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(port_error)?
            .json()
            .await
            .map_err(port_error)?;
        Ok(response.text)
    }
}

#[async_trait]
impl AutocompleteService for NlpHttpAdapter {
    async fn suggest(&self, query: &str) -> PortResult<Vec<String>> {
        self.client
            .get(self.url("autocomplete"))
            .query(&[("q", query)])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(port_error)?
            .json::<Vec<String>>()
            .await
            .map_err(port_error)
    }
}
