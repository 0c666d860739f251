//! crates/pictolink_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use uuid::Uuid;

/// Label shown when a pictogram carries no label in the requested language.
pub const FALLBACK_LABEL: &str = "Pictograma";

const STATIC_IMAGE_BASE: &str = "https://static.arasaac.org/pictograms";

//=========================================================================================
// Pictograms
//=========================================================================================

/// The label languages the catalog is known to carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Es,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Es => "es",
            Language::En => "en",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "es" => Ok(Language::Es),
            "en" => Ok(Language::En),
            other => Err(format!("unsupported language '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PictogramLabels {
    #[serde(default)]
    pub es: String,
    #[serde(default)]
    pub en: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageUrls {
    #[serde(default)]
    pub png_color: String,
    #[serde(default)]
    pub svg_color: String,
    #[serde(default)]
    pub detail: String,
}

/// A catalog entry representing one visual symbol.
///
/// Only `id` takes part in equality and hashing; labels and images are
/// display data that may be partially empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pictogram {
    pub id: u32,
    #[serde(default)]
    pub labels: PictogramLabels,
    #[serde(default)]
    pub image_urls: ImageUrls,
}

impl Pictogram {
    /// A pictogram known only by id, pointing at the public static images.
    pub fn placeholder(id: u32) -> Self {
        Self {
            id,
            labels: PictogramLabels::default(),
            image_urls: ImageUrls {
                png_color: static_image_url(id),
                svg_color: String::new(),
                detail: format!("{}/{}", STATIC_IMAGE_BASE, id),
            },
        }
    }

    pub fn label(&self, lang: Language) -> &str {
        match lang {
            Language::Es => &self.labels.es,
            Language::En => &self.labels.en,
        }
    }

    /// The label captured into outgoing messages.
    pub fn display_label(&self, lang: Language) -> &str {
        let label = self.label(lang).trim();
        if label.is_empty() {
            FALLBACK_LABEL
        } else {
            label
        }
    }
}

impl PartialEq for Pictogram {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Pictogram {}

impl Hash for Pictogram {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// The public PNG rendition of a pictogram, used when rendering decoded messages.
pub fn static_image_url(id: u32) -> String {
    format!("{}/{}/{}_500.png", STATIC_IMAGE_BASE, id, id)
}

//=========================================================================================
// Raw Catalog Records
//=========================================================================================

/// Catalog ids arrive either as JSON numbers or as numeric strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn to_id(&self) -> Option<u32> {
        let id = match self {
            RawId::Number(n) => u32::try_from(*n).ok()?,
            RawId::Text(s) => s.trim().parse::<u32>().ok()?,
        };
        (id > 0).then_some(id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCategories {
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLanguageSource {
    #[serde(default)]
    pub raw: RawCategories,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSources {
    #[serde(default)]
    pub es: RawLanguageSource,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Synonyms {
    #[serde(default)]
    pub es: Vec<String>,
    #[serde(default)]
    pub en: Vec<String>,
}

/// One line of the line-delimited catalog dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogRecord {
    pub id: RawId,
    #[serde(default)]
    pub labels: PictogramLabels,
    #[serde(default)]
    pub image_urls: ImageUrls,
    #[serde(default)]
    pub sources: RawSources,
    #[serde(default)]
    pub synonyms: Synonyms,
}

impl CatalogRecord {
    pub fn categories(&self) -> &[String] {
        &self.sources.es.raw.categories
    }

    pub fn synonyms(&self, lang: Language) -> &[String] {
        match lang {
            Language::Es => &self.synonyms.es,
            Language::En => &self.synonyms.en,
        }
    }

    /// Normalizes the record; `None` when the id is missing, non-numeric or zero.
    pub fn to_pictogram(&self) -> Option<Pictogram> {
        Some(Pictogram {
            id: self.id.to_id()?,
            labels: self.labels.clone(),
            image_urls: self.image_urls.clone(),
        })
    }
}

//=========================================================================================
// Preferences
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceKind {
    Recent,
    Favorite,
}

impl PreferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreferenceKind::Recent => "recent",
            PreferenceKind::Favorite => "favorite",
        }
    }
}

impl FromStr for PreferenceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recent" => Ok(PreferenceKind::Recent),
            "favorite" => Ok(PreferenceKind::Favorite),
            other => Err(format!("unknown preference type '{}'", other)),
        }
    }
}

/// A persisted recent/favorite entry. `snapshot` is the pictogram as it looked
/// when the user interacted with it, and is what gets redisplayed.
#[derive(Debug, Clone)]
pub struct PreferenceRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: PreferenceKind,
    pub pictogram_id: u32,
    pub snapshot: Pictogram,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Chat
//=========================================================================================

/// A persisted chat message. `content` holds the wire-encoded payload.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// The logged-in user on whose behalf the core acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: Uuid,
}

impl SessionContext {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}
