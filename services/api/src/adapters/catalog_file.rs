//! services/api/src/adapters/catalog_file.rs
//!
//! Serves the line-delimited pictogram catalog from the local filesystem.

use async_trait::async_trait;
use pictolink_core::ports::{CatalogSource, PortError, PortResult};
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct CatalogFileSource {
    path: PathBuf,
}

impl CatalogFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for CatalogFileSource {
    async fn fetch_catalog(&self) -> PortResult<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    PortError::NotFound(format!("Catalog file {}", self.path.display()))
                }
                _ => PortError::Unexpected(format!(
                    "Failed to read catalog {}: {}",
                    self.path.display(),
                    e
                )),
            })
    }
}
