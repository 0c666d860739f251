//! crates/pictolink_core/src/catalog.rs
//!
//! Search and category lookups over the pictogram catalog.
//!
//! The dataset is fetched once through a `CatalogSource` and parsed line by
//! line; malformed lines are skipped on their own. Every lookup degrades to an
//! empty list when the source cannot be read.

use crate::domain::{CatalogRecord, Language, Pictogram};
use crate::ports::{CatalogSource, PortError, PortResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

/// Tag categories offered when no curated list is configured.
pub const DEFAULT_CATEGORIES: [&str; 18] = [
    "animal",
    "food",
    "person",
    "family",
    "emotion",
    "action",
    "object",
    "place",
    "transport",
    "nature",
    "leisure",
    "work",
    "health",
    "communication",
    "clothes",
    "building facility",
    "gastronomy",
    "core vocabulary-object",
];

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Maximum number of results returned by `search`.
    pub search_limit: usize,
    /// Default cap for tag-scanned categories.
    pub category_limit: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            search_limit: 10,
            category_limit: 20,
        }
    }
}

/// Hand-picked pictogram ids for well-known category keys, kept in the order
/// they should be shown.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct CuratedCategories(HashMap<String, Vec<u32>>);

impl CuratedCategories {
    pub fn new(map: HashMap<String, Vec<u32>>) -> Self {
        Self(map)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn get(&self, category: &str) -> Option<&[u32]> {
        self.0.get(category).map(Vec::as_slice)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.0.keys().cloned().collect();
        keys.sort();
        keys
    }
}

struct CatalogEntry {
    record: CatalogRecord,
    pictogram: Pictogram,
}

/// Parses the line-delimited dataset, keeping catalog order.
fn parse_catalog(text: &str) -> Vec<CatalogEntry> {
    let mut skipped = 0usize;
    let entries: Vec<CatalogEntry> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parsed = serde_json::from_str::<CatalogRecord>(line)
                .ok()
                .and_then(|record| {
                    let pictogram = record.to_pictogram()?;
                    Some(CatalogEntry { record, pictogram })
                });
            if parsed.is_none() {
                skipped += 1;
            }
            parsed
        })
        .collect();
    if skipped > 0 {
        debug!("Skipped {} malformed catalog records.", skipped);
    }
    entries
}

pub struct PictogramCatalog {
    source: Arc<dyn CatalogSource>,
    config: CatalogConfig,
    curated: CuratedCategories,
    entries: OnceCell<Arc<Vec<CatalogEntry>>>,
}

impl PictogramCatalog {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        config: CatalogConfig,
        curated: CuratedCategories,
    ) -> Self {
        Self {
            source,
            config,
            curated,
            entries: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Curated keys first, then the default tag categories not already listed.
    pub fn categories(&self) -> Vec<String> {
        let mut categories = self.curated.keys();
        for tag in DEFAULT_CATEGORIES {
            if !categories.iter().any(|c| c == tag) {
                categories.push(tag.to_string());
            }
        }
        categories
    }

    async fn load(&self) -> PortResult<Arc<Vec<CatalogEntry>>> {
        self.entries
            .get_or_try_init(|| async {
                let text = self.source.fetch_catalog().await?;
                let entries = parse_catalog(&text);
                info!("Pictogram catalog loaded with {} records.", entries.len());
                Ok::<_, PortError>(Arc::new(entries))
            })
            .await
            .cloned()
    }

    /// Case-insensitive substring search over the label in `lang` and its synonyms.
    pub async fn search(&self, query: &str, lang: Language) -> Vec<Pictogram> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        let entries = match self.load().await {
            Ok(entries) => entries,
            Err(e) => {
                error!("Error searching pictograms for '{}': {}", query, e);
                return Vec::new();
            }
        };

        entries
            .iter()
            .filter(|entry| {
                let label = entry.pictogram.label(lang);
                !label.is_empty()
                    && (label.to_lowercase().contains(&needle)
                        || entry
                            .record
                            .synonyms(lang)
                            .iter()
                            .any(|s| s.to_lowercase().contains(&needle)))
            })
            .take(self.config.search_limit)
            .map(|entry| entry.pictogram.clone())
            .collect()
    }

    /// Pictograms for a category: the curated id list when one exists for the
    /// key, otherwise a tag scan in catalog order capped at `limit`.
    pub async fn by_category(&self, category: &str, limit: Option<usize>) -> Vec<Pictogram> {
        let entries = match self.load().await {
            Ok(entries) => entries,
            Err(e) => {
                error!("Error loading pictograms for category '{}': {}", category, e);
                return Vec::new();
            }
        };

        if let Some(ids) = self.curated.get(category) {
            let by_id: HashMap<u32, &Pictogram> =
                entries.iter().map(|e| (e.pictogram.id, &e.pictogram)).collect();
            return ids
                .iter()
                .map(|id| {
                    by_id
                        .get(id)
                        .map(|p| (*p).clone())
                        .unwrap_or_else(|| Pictogram::placeholder(*id))
                })
                .collect();
        }

        let limit = limit.unwrap_or(self.config.category_limit);
        entries
            .iter()
            .filter(|entry| {
                !entry.pictogram.labels.es.is_empty()
                    && entry.record.categories().iter().any(|c| c == category)
            })
            .take(limit)
            .map(|entry| entry.pictogram.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StaticSource(&'static str);

    #[async_trait]
    impl CatalogSource for StaticSource {
        async fn fetch_catalog(&self) -> PortResult<String> {
            Ok(self.0.to_string())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl CatalogSource for BrokenSource {
        async fn fetch_catalog(&self) -> PortResult<String> {
            Err(PortError::Unexpected("connection refused".to_string()))
        }
    }

    const CATALOG: &str = r#"{"id":10,"labels":{"es":"Comer","en":"eat"},"image_urls":{},"sources":{"es":{"raw":{"categories":["action","food"]}}}}
not json at all
{"id":11,"labels":{"es":"manzana","en":"apple"},"sources":{"es":{"raw":{"categories":["food"]}}}}
{"labels":{"es":"sin id"}}
{"id":12,"labels":{"es":"beber","en":"drink"},"synonyms":{"es":["tomar"]},"sources":{"es":{"raw":{"categories":["action"]}}}}
{"id":13,"labels":{"es":"","en":"ghost"},"sources":{"es":{"raw":{"categories":["food"]}}}}
"#;

    fn catalog(curated: CuratedCategories) -> PictogramCatalog {
        PictogramCatalog::new(
            Arc::new(StaticSource(CATALOG)),
            CatalogConfig::default(),
            curated,
        )
    }

    fn ids(pictograms: &[Pictogram]) -> Vec<u32> {
        pictograms.iter().map(|p| p.id).collect()
    }

    #[tokio::test]
    async fn test_search_matches_label_case_insensitively() {
        let found = catalog(CuratedCategories::default()).search("COM", Language::Es).await;
        assert_eq!(ids(&found), vec![10]);
    }

    #[tokio::test]
    async fn test_search_matches_synonyms() {
        let found = catalog(CuratedCategories::default()).search("tom", Language::Es).await;
        assert_eq!(ids(&found), vec![12]);
    }

    #[tokio::test]
    async fn test_blank_query_returns_nothing() {
        assert!(catalog(CuratedCategories::default()).search("   ", Language::Es).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_respects_limit() {
        let catalog = PictogramCatalog::new(
            Arc::new(StaticSource(CATALOG)),
            CatalogConfig {
                search_limit: 1,
                category_limit: 20,
            },
            CuratedCategories::default(),
        );
        assert_eq!(catalog.search("a", Language::Es).await.len(), 1);
    }

    #[tokio::test]
    async fn test_tag_scan_keeps_catalog_order_and_skips_unlabelled() {
        let found = catalog(CuratedCategories::default()).by_category("food", None).await;
        assert_eq!(ids(&found), vec![10, 11]);
        let capped = catalog(CuratedCategories::default()).by_category("food", Some(1)).await;
        assert_eq!(ids(&capped), vec![10]);
    }

    #[tokio::test]
    async fn test_curated_list_wins_and_keeps_its_order() {
        let curated = CuratedCategories::new(HashMap::from([(
            "food".to_string(),
            vec![12, 99, 10],
        )]));
        let found = catalog(curated).by_category("food", Some(1)).await;
        assert_eq!(ids(&found), vec![12, 99, 10]);
        assert_eq!(found[0].labels.es, "beber");
        assert!(found[1].labels.es.is_empty());
    }

    #[tokio::test]
    async fn test_source_failure_yields_empty_results() {
        let catalog = PictogramCatalog::new(
            Arc::new(BrokenSource),
            CatalogConfig::default(),
            CuratedCategories::default(),
        );
        assert!(catalog.search("comer", Language::Es).await.is_empty());
        assert!(catalog.by_category("food", None).await.is_empty());
    }

    #[test]
    fn test_categories_list_curated_keys_first() {
        let curated = CuratedCategories::from_json(r#"{"saludos":[1,2],"food":[3]}"#).unwrap();
        let categories = catalog(curated).categories();
        assert_eq!(&categories[..3], &["food", "saludos", "animal"]);
        assert_eq!(categories.len(), 19);
        assert!(categories.iter().any(|c| c == "building facility"));
        assert!(!categories.iter().any(|c| c == "education"));
    }
}
