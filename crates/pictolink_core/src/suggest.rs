//! crates/pictolink_core/src/suggest.rs
//!
//! Word completion for the text being typed.

use crate::ports::AutocompleteService;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Shortest trailing word worth asking suggestions for.
pub const MIN_PREFIX_CHARS: usize = 2;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

/// The partial word at the end of `text`; empty when `text` ends in whitespace.
pub fn trailing_word(text: &str) -> &str {
    text.rsplit(char::is_whitespace).next().unwrap_or_default()
}

/// Replaces the trailing partial word of `text` with `suggestion`, keeping
/// everything before it and ending with a separator.
pub fn accept_suggestion(text: &str, suggestion: &str) -> String {
    let partial = trailing_word(text);
    let prefix = &text[..text.len() - partial.len()];
    format!("{}{} ", prefix, suggestion)
}

//=========================================================================================
// Debouncer
//=========================================================================================

/// Runs only the most recent of a burst of jobs, once its input has been
/// quiet for `quiet`.
///
/// Scheduling a job cancels the previous one, whether it is still waiting or
/// already running; `cancel` drops whatever is pending.
pub struct Debouncer {
    quiet: Duration,
    root: CancellationToken,
    pending: Option<CancellationToken>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            root: CancellationToken::new(),
            pending: None,
        }
    }

    pub fn schedule<F>(&mut self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let token = self.root.child_token();
        self.pending = Some(token.clone());
        let quiet = self.quiet;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = async {
                    tokio::time::sleep(quiet).await;
                    job.await;
                } => {}
            }
        });
    }

    pub fn cancel(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

//=========================================================================================
// Suggestion Client
//=========================================================================================

pub struct SuggestionClient {
    service: Arc<dyn AutocompleteService>,
}

impl SuggestionClient {
    pub fn new(service: Arc<dyn AutocompleteService>) -> Self {
        Self { service }
    }

    /// Completions for `partial_word`. Prefixes shorter than two characters
    /// and failed requests both yield no suggestions.
    pub async fn suggest(&self, partial_word: &str) -> Vec<String> {
        if partial_word.chars().count() < MIN_PREFIX_CHARS {
            return Vec::new();
        }
        match self.service.suggest(partial_word).await {
            Ok(suggestions) => suggestions,
            Err(e) => {
                warn!("Error fetching suggestions for '{}': {}", partial_word, e);
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionUpdate {
    pub query: String,
    pub suggestions: Vec<String>,
}

/// Feeds text-buffer changes through the debouncer and publishes the
/// suggestions for the last one.
pub struct SuggestionPipeline {
    client: Arc<SuggestionClient>,
    debouncer: Debouncer,
    updates: mpsc::UnboundedSender<SuggestionUpdate>,
}

impl SuggestionPipeline {
    pub fn new(
        client: Arc<SuggestionClient>,
        quiet: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SuggestionUpdate>) {
        let (updates, rx) = mpsc::unbounded_channel();
        (
            Self {
                client,
                debouncer: Debouncer::new(quiet),
                updates,
            },
            rx,
        )
    }

    pub fn on_input(&mut self, text: &str) {
        let query = trailing_word(text).to_string();
        if query.chars().count() < MIN_PREFIX_CHARS {
            self.debouncer.cancel();
            let _ = self.updates.send(SuggestionUpdate {
                query,
                suggestions: Vec::new(),
            });
            return;
        }

        let client = self.client.clone();
        let updates = self.updates.clone();
        self.debouncer.schedule(async move {
            let suggestions = client.suggest(&query).await;
            debug!("{} suggestions for '{}'.", suggestions.len(), query);
            let _ = updates.send(SuggestionUpdate { query, suggestions });
        });
    }

    /// Drops any pending request, e.g. when the conversation changes.
    pub fn cancel(&mut self) {
        self.debouncer.cancel();
    }
}
