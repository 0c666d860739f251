//! crates/pictolink_core/src/dictation.rs
//!
//! Sequencing for live speech-to-text sessions.
//!
//! A recognizer keeps emitting transcript updates for a short while after the
//! user asks it to stop. `Dictation` therefore has a `Stopping` phase: updates
//! that land between the stop request and the recognizer's end event are still
//! the final transcript and must reach the draft. Only after `finish` are late
//! updates dropped.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DictationPhase {
    Idle,
    Listening,
    Stopping,
}

/// Recognizer failures, each carrying the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechError {
    #[error("Este navegador no soporta reconocimiento de voz.")]
    Unsupported,
    #[error("Permiso de micrófono denegado. Por favor, habilítalo en la configuración del navegador.")]
    PermissionDenied,
    #[error("No se detectó voz. Intenta hablar más cerca del micrófono.")]
    NoSpeech,
    #[error("Error: {0}")]
    Other(String),
}

impl SpeechError {
    /// Maps a recognizer error code (`not-allowed`, `no-speech`, ...) to a `SpeechError`.
    pub fn from_code(code: &str) -> Self {
        match code {
            "not-allowed" | "permission-denied" | "service-not-allowed" => {
                SpeechError::PermissionDenied
            }
            "no-speech" => SpeechError::NoSpeech,
            "unsupported" | "language-not-supported" => SpeechError::Unsupported,
            other => SpeechError::Other(other.to_string()),
        }
    }
}

/// One recognizer result.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    #[serde(default)]
    pub is_final: bool,
}

/// Final results joined with a trailing space each; interim text only when
/// nothing is final yet.
pub fn assemble_transcript(segments: &[TranscriptSegment]) -> String {
    let mut final_text = String::new();
    let mut interim_text = String::new();
    for segment in segments {
        if segment.is_final {
            final_text.push_str(&segment.text);
            final_text.push(' ');
        } else {
            interim_text.push_str(&segment.text);
        }
    }
    if final_text.is_empty() {
        interim_text
    } else {
        final_text
    }
}

#[derive(Debug)]
pub struct Dictation {
    phase: DictationPhase,
    transcript: String,
    last_error: Option<SpeechError>,
}

impl Default for Dictation {
    fn default() -> Self {
        Self::new()
    }
}

impl Dictation {
    pub fn new() -> Self {
        Self {
            phase: DictationPhase::Idle,
            transcript: String::new(),
            last_error: None,
        }
    }

    pub fn phase(&self) -> DictationPhase {
        self.phase
    }

    pub fn is_listening(&self) -> bool {
        self.phase == DictationPhase::Listening
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn last_error(&self) -> Option<&SpeechError> {
        self.last_error.as_ref()
    }

    /// Begins a new session, discarding any previous transcript and error.
    /// Returns `false` when a session is already running.
    pub fn start(&mut self) -> bool {
        if self.phase != DictationPhase::Idle {
            return false;
        }
        self.phase = DictationPhase::Listening;
        self.transcript.clear();
        self.last_error = None;
        true
    }

    /// Records a transcript update. Returns the text to apply to the draft, or
    /// `None` when no session is active.
    pub fn on_transcript(&mut self, text: &str) -> Option<String> {
        if self.phase == DictationPhase::Idle {
            return None;
        }
        self.transcript = text.to_string();
        self.last_error = None;
        Some(self.transcript.clone())
    }

    /// Asks the session to stop. Returns the transcript captured so far so the
    /// caller can apply it; later updates are still accepted until `finish`.
    pub fn stop(&mut self) -> Option<String> {
        if self.phase != DictationPhase::Listening {
            return None;
        }
        self.phase = DictationPhase::Stopping;
        (!self.transcript.is_empty()).then(|| self.transcript.clone())
    }

    /// The recognizer has ended.
    pub fn finish(&mut self) {
        self.phase = DictationPhase::Idle;
    }

    /// The recognizer has failed; the session ends with `error`.
    pub fn fail(&mut self, error: SpeechError) {
        self.phase = DictationPhase::Idle;
        self.last_error = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_updates_after_stop_are_still_applied() {
        let mut dictation = Dictation::new();
        assert!(dictation.start());
        assert_eq!(dictation.on_transcript("quiero"), Some("quiero".to_string()));
        assert_eq!(dictation.stop(), Some("quiero".to_string()));
        assert_eq!(dictation.phase(), DictationPhase::Stopping);
        assert_eq!(
            dictation.on_transcript("quiero agua"),
            Some("quiero agua".to_string())
        );
        dictation.finish();
        assert_eq!(dictation.on_transcript("tarde"), None);
        assert_eq!(dictation.transcript(), "quiero agua");
    }

    #[test]
    fn test_start_is_ignored_while_running() {
        let mut dictation = Dictation::new();
        assert!(dictation.start());
        assert!(!dictation.start());
    }

    #[test]
    fn test_failure_ends_session_with_localized_message() {
        let mut dictation = Dictation::new();
        dictation.start();
        dictation.fail(SpeechError::from_code("not-allowed"));
        assert_eq!(dictation.phase(), DictationPhase::Idle);
        assert_eq!(
            dictation.last_error().map(|e| e.to_string()),
            Some("Permiso de micrófono denegado. Por favor, habilítalo en la configuración del navegador.".to_string())
        );
    }

    #[test]
    fn test_assemble_prefers_final_results() {
        let segments = vec![
            TranscriptSegment { text: "hola".to_string(), is_final: true },
            TranscriptSegment { text: "qué tal".to_string(), is_final: false },
        ];
        assert_eq!(assemble_transcript(&segments), "hola ");
        assert_eq!(assemble_transcript(&segments[1..]), "qué tal");
    }
}
