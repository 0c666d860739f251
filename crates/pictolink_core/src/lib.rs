pub mod catalog;
pub mod codec;
pub mod composition;
pub mod dictation;
pub mod domain;
pub mod ports;
pub mod preferences;
pub mod suggest;

pub use catalog::{CatalogConfig, CuratedCategories, PictogramCatalog};
pub use codec::{decode, encode, encode_single, WireMessage};
pub use composition::{
    ComposeError, Composer, ComposerConfig, ComposerServices, Draft, DraftMode, PendingSend,
};
pub use dictation::{Dictation, SpeechError};
pub use domain::{ChatMessage, Language, Pictogram, PreferenceKind, PreferenceRecord, SessionContext};
pub use ports::{
    AuthSessionService, AutocompleteService, CatalogSource, GlossService, MessageTransport,
    PortError, PortResult, PreferenceRepository, SpeechToTextService, TextToPictogramService,
    TextToSpeechService,
};
pub use preferences::{PreferenceSnapshot, PreferenceStore, RECENT_CAPACITY};
pub use suggest::{Debouncer, SuggestionClient, SuggestionPipeline};
