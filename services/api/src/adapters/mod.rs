pub mod catalog_file;
pub mod db;
pub mod gloss_llm;
pub mod nlp;
pub mod sst;
pub mod tts;

pub use catalog_file::CatalogFileSource;
pub use db::DbAdapter;
pub use gloss_llm::OpenAiGlossAdapter;
pub use nlp::NlpHttpAdapter;
pub use sst::OpenAiSstAdapter;
pub use tts::OpenAiTtsAdapter;
