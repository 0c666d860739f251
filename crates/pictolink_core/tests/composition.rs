mod common;

use assert_matches::assert_matches;
use common::{pictogram, RecordingTransport, Reply, ScriptedGlosser, ScriptedTranslator};
use pictolink_core::codec::{decode, WireMessage};
use pictolink_core::{ComposeError, Composer, ComposerConfig, ComposerServices, DraftMode, SessionContext};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use uuid::Uuid;

struct Harness {
    composer: Composer,
    transport: Arc<RecordingTransport>,
    translator: Arc<ScriptedTranslator>,
}

fn harness(translation: Reply<Vec<pictolink_core::Pictogram>>, gloss: Reply<String>) -> Harness {
    let transport = Arc::new(RecordingTransport::default());
    let translator = Arc::new(ScriptedTranslator::new(translation));
    let services = ComposerServices {
        translator: translator.clone(),
        glosser: Arc::new(ScriptedGlosser { reply: gloss }),
        transport: transport.clone(),
    };
    let mut composer = Composer::new(
        SessionContext::new(Uuid::new_v4()),
        services,
        ComposerConfig::default(),
    );
    composer.open_conversation(Uuid::new_v4());
    Harness {
        composer,
        transport,
        translator,
    }
}

#[tokio::test]
async fn test_typed_text_is_sent_as_sequence_with_gloss() {
    let mut h = harness(
        Reply::Value(vec![pictogram(2349, "comer"), pictogram(11, "agua")]),
        Reply::Fail,
    );
    h.composer.set_text("  quiero comer  ");

    let sent = h.composer.send().await.unwrap();

    assert!(sent.is_some());
    assert_eq!(h.transport.contents(), vec!["[pictograms:2349,11:comer agua|quiero comer]"]);
    assert_eq!(*h.translator.calls.lock().unwrap(), vec!["quiero comer"]);
    assert_eq!(h.composer.mode(), DraftMode::Empty);
}

#[tokio::test]
async fn test_empty_translation_sends_plain_text() {
    let mut h = harness(Reply::Value(Vec::new()), Reply::Fail);
    h.composer.set_text("hola");

    h.composer.send().await.unwrap();

    assert_eq!(h.transport.contents(), vec!["hola"]);
}

#[tokio::test]
async fn test_failed_translation_sends_plain_text() {
    let mut h = harness(Reply::Fail, Reply::Fail);
    h.composer.set_text("hola");

    h.composer.send().await.unwrap();

    assert_eq!(h.transport.contents(), vec!["hola"]);
}

#[tokio::test(start_paused = true)]
async fn test_hung_translation_falls_back_after_the_time_bound() {
    let mut h = harness(Reply::Hang, Reply::Fail);
    h.composer.set_text("hola");
    let started = tokio::time::Instant::now();

    h.composer.send().await.unwrap();

    assert!(started.elapsed() >= ComposerConfig::default().translation_timeout);
    assert_eq!(h.transport.contents(), vec!["hola"]);
}

#[tokio::test]
async fn test_pictogram_sequence_carries_gloss() {
    let mut h = harness(Reply::Fail, Reply::Value("Yo quiero comer.".to_string()));
    h.composer.add_pictogram(pictogram(6632, "yo"));
    h.composer.add_pictogram(pictogram(5441, "querer"));
    h.composer.add_pictogram(pictogram(2349, "comer"));

    h.composer.send().await.unwrap();

    let content = h.transport.contents().remove(0);
    assert_eq!(content, "[pictograms:6632,5441,2349:yo querer comer|Yo quiero comer.]");
    assert_matches!(
        decode(&content),
        WireMessage::PictogramSequence { ids, text: Some(gloss), .. } => {
            assert_eq!(ids, vec![6632, 5441, 2349]);
            assert_eq!(gloss, "Yo quiero comer.");
        }
    );
    // Translation is never consulted for a pictogram draft.
    assert!(h.translator.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_gloss_failure_still_sends_sequence() {
    let mut h = harness(Reply::Fail, Reply::Fail);
    h.composer.add_pictogram(pictogram(2349, "comer"));

    h.composer.send().await.unwrap();

    assert_eq!(h.transport.contents(), vec!["[pictograms:2349:comer]"]);
}

#[tokio::test(start_paused = true)]
async fn test_hung_gloss_still_sends_sequence() {
    let mut h = harness(Reply::Fail, Reply::Hang);
    h.composer.add_pictogram(pictogram(2349, "comer"));

    h.composer.send().await.unwrap();

    assert_eq!(h.transport.contents(), vec!["[pictograms:2349:comer]"]);
}

#[tokio::test]
async fn test_unlabeled_pictogram_uses_fallback_label() {
    let mut h = harness(Reply::Fail, Reply::Fail);
    h.composer.add_pictogram(pictolink_core::Pictogram::placeholder(99));

    h.composer.send().await.unwrap();

    assert_eq!(h.transport.contents(), vec!["[pictograms:99:Pictograma]"]);
}

#[tokio::test]
async fn test_text_and_pictograms_are_mutually_exclusive() {
    let mut h = harness(Reply::Fail, Reply::Fail);

    assert!(h.composer.set_text("hola"));
    assert_eq!(h.composer.mode(), DraftMode::ComposingText);

    h.composer.add_pictogram(pictogram(1, "uno"));
    assert_eq!(h.composer.mode(), DraftMode::ComposingPictograms);
    assert_eq!(h.composer.draft().text(), "");

    assert!(!h.composer.set_text("adiós"));
    assert!(!h.composer.apply_transcript("dictado"));
    assert_eq!(h.composer.draft().text(), "");

    h.composer.add_pictogram(pictogram(1, "uno"));
    assert_eq!(h.composer.draft().pictograms().len(), 2);

    assert_eq!(h.composer.remove_pictogram(5), None);
    assert_eq!(h.composer.remove_pictogram(0).map(|p| p.id), Some(1));
    assert_eq!(h.composer.remove_last_pictogram().map(|p| p.id), Some(1));
    assert_eq!(h.composer.mode(), DraftMode::Empty);

    assert!(h.composer.set_text("otra vez"));
    assert_eq!(h.composer.mode(), DraftMode::ComposingText);
}

#[tokio::test]
async fn test_whitespace_only_draft_is_a_no_op() {
    let mut h = harness(Reply::Fail, Reply::Fail);
    h.composer.set_text("   ");

    assert_eq!(h.composer.mode(), DraftMode::Empty);
    assert!(h.composer.send().await.unwrap().is_none());
    assert!(h.transport.contents().is_empty());
    assert!(h.translator.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_send_without_conversation_is_a_no_op() {
    let mut h = harness(Reply::Fail, Reply::Fail);
    h.composer.close_conversation();
    h.composer.set_text("hola");

    assert!(h.composer.send().await.unwrap().is_none());
    assert!(h.transport.contents().is_empty());
}

#[tokio::test]
async fn test_rejected_send_keeps_the_draft() {
    let mut h = harness(Reply::Fail, Reply::Fail);
    h.transport.reject.store(true, Ordering::SeqCst);
    h.composer.add_pictogram(pictogram(2349, "comer"));

    let result = h.composer.send().await;

    assert_matches!(result, Err(ComposeError::Transport(_)));
    assert_eq!(h.composer.mode(), DraftMode::ComposingPictograms);
    assert_eq!(h.composer.draft().pictograms().len(), 1);
}

#[tokio::test]
async fn test_send_single_leaves_the_sequence_alone() {
    let mut h = harness(Reply::Fail, Reply::Fail);
    h.composer.add_pictogram(pictogram(6632, "yo"));

    h.composer.send_single(&pictogram(2349, "comer")).await.unwrap();

    assert_eq!(h.transport.contents(), vec!["[pictogram:2349:comer]"]);
    assert_eq!(h.composer.draft().pictograms().len(), 1);
}

#[tokio::test]
async fn test_opening_a_conversation_resets_the_draft() {
    let mut h = harness(Reply::Fail, Reply::Fail);
    h.composer.add_pictogram(pictogram(1, "uno"));

    let contact = Uuid::new_v4();
    h.composer.open_conversation(contact);

    assert_eq!(h.composer.contact_id(), Some(contact));
    assert_eq!(h.composer.mode(), DraftMode::Empty);
}

#[tokio::test]
async fn test_draft_stays_editable_while_a_send_is_in_flight() {
    let mut h = harness(Reply::Value(Vec::new()), Reply::Fail);
    h.composer.set_text("hola");

    let pending = h.composer.begin_send().unwrap();
    assert!(h.composer.is_sending());
    assert!(h.composer.begin_send().is_none());
    assert!(h.composer.set_text("hola mamá"));

    let message = pending.deliver().await.unwrap();
    h.composer.finish_send(&pending, true);

    assert_eq!(message.content, "hola");
    assert!(!h.composer.is_sending());
    assert_eq!(h.composer.draft().text(), "hola mamá");
}

#[tokio::test]
async fn test_unedited_draft_is_cleared_once_delivered() {
    let mut h = harness(Reply::Value(Vec::new()), Reply::Fail);
    h.composer.add_pictogram(pictogram(2349, "comer"));

    let pending = h.composer.begin_send().unwrap();
    pending.deliver().await.unwrap();
    h.composer.finish_send(&pending, true);

    assert_eq!(h.composer.mode(), DraftMode::Empty);
    assert_eq!(h.transport.contents(), vec!["[pictograms:2349:comer]"]);
}

#[tokio::test]
async fn test_send_finishing_after_a_conversation_switch_is_ignored() {
    let mut h = harness(Reply::Value(Vec::new()), Reply::Fail);
    h.composer.set_text("hola");
    let pending = h.composer.begin_send().unwrap();

    h.composer.open_conversation(Uuid::new_v4());
    h.composer.set_text("buenos días");
    let next = h.composer.begin_send().unwrap();

    pending.deliver().await.unwrap();
    h.composer.finish_send(&pending, true);

    assert!(h.composer.is_sending());
    assert_eq!(h.composer.draft().text(), "buenos días");

    next.deliver().await.unwrap();
    h.composer.finish_send(&next, true);
    assert_eq!(h.composer.mode(), DraftMode::Empty);
}
