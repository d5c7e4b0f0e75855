//! Integration tests for the conversation panel
//!
//! These tests verify that:
//! - Answers land directly after their own question regardless of arrival order
//! - A failed round trip records the fixed connection error text
//! - Blank submissions are ignored

mod common;

use common::{Gated, Offline, PanicsOnce, controller};
use ppewatch::services::ServiceError;
use ppewatch::session::CONNECTION_ERROR_MESSAGE;
use ppewatch::{Sender, StateChange};
use std::sync::Arc;

fn transcript_lines(controller: &ppewatch::AppController) -> Vec<(u64, Sender, String)> {
    controller
        .state()
        .snapshot()
        .transcript
        .iter()
        .map(|e| (e.sequence, e.sender, e.text.clone()))
        .collect()
}

#[tokio::test]
async fn test_out_of_order_answers_keep_question_order() {
    let chat = Gated::<String>::new();
    let controller = controller(Arc::new(Offline), chat.clone());

    let release_q1 = chat.gate("How many helmet violations?");
    let release_q2 = chat.gate("Which camera saw the most?");

    let task_q1 = controller
        .submit_message("How many helmet violations?")
        .unwrap();
    let task_q2 = controller
        .submit_message("Which camera saw the most?")
        .unwrap();

    // Second answer arrives first
    release_q2.send(Ok("Camera 3".to_string())).unwrap();
    assert!(task_q2.await.unwrap());

    let partial = transcript_lines(&controller);
    assert_eq!(
        partial.iter().map(|(seq, ..)| *seq).collect::<Vec<_>>(),
        vec![1, 3, 4]
    );

    release_q1.send(Ok("Twelve".to_string())).unwrap();
    assert!(task_q1.await.unwrap());

    assert_eq!(
        transcript_lines(&controller),
        vec![
            (1, Sender::User, "How many helmet violations?".to_string()),
            (2, Sender::Bot, "Twelve".to_string()),
            (3, Sender::User, "Which camera saw the most?".to_string()),
            (4, Sender::Bot, "Camera 3".to_string()),
        ]
    );
    assert_eq!(controller.state().snapshot().pending_questions, 0);
}

#[tokio::test]
async fn test_failed_round_trip_records_error_in_place() {
    let chat = Gated::<String>::new();
    let controller = controller(Arc::new(Offline), chat.clone());

    let release_q1 = chat.gate("first");
    let release_q2 = chat.gate("second");
    let task_q1 = controller.submit_message("first").unwrap();
    let task_q2 = controller.submit_message("second").unwrap();

    release_q2.send(Ok("ok".to_string())).unwrap();
    release_q1
        .send(Err(ServiceError::Network("connection reset".to_string())))
        .unwrap();
    task_q1.await.unwrap();
    task_q2.await.unwrap();

    let lines = transcript_lines(&controller);
    assert_eq!(lines[1], (2, Sender::Bot, CONNECTION_ERROR_MESSAGE.to_string()));
    assert_eq!(lines[3], (4, Sender::Bot, "ok".to_string()));
}

#[tokio::test]
async fn test_blank_submission_is_ignored() {
    let chat = Gated::<String>::new();
    let controller = controller(Arc::new(Offline), chat);

    assert!(controller.submit_message("").is_none());
    assert!(controller.submit_message(" \t\n").is_none());

    let snapshot = controller.state().snapshot();
    assert!(snapshot.transcript.is_empty());
    assert_eq!(snapshot.pending_questions, 0);
}

#[tokio::test]
async fn test_transcript_events_name_each_entry() {
    let chat = Gated::<String>::new();
    let controller = controller(Arc::new(Offline), chat.clone());
    let mut events = controller.state().subscribe();

    let release = chat.gate("status?");
    let task = controller.submit_message("status?").unwrap();
    release.send(Ok("All clear".to_string())).unwrap();
    task.await.unwrap();

    let mut appended = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let StateChange::TranscriptAppended { sequence, sender } = event {
            appended.push((sequence, sender));
        }
    }
    assert_eq!(appended, vec![(1, Sender::User), (2, Sender::Bot)]);
}

#[tokio::test]
async fn test_conversation_is_independent_of_detection() {
    let chat = Gated::<String>::new();
    let controller = controller(Arc::new(Offline), chat.clone());

    let release = chat.gate("q");
    let task = controller.submit_message("q").unwrap();

    // Selecting a new image does not touch the transcript or its pending call
    controller.select_file(common::image("site.jpg"));
    release.send(Ok("a".to_string())).unwrap();
    assert!(task.await.unwrap());

    assert_eq!(controller.state().snapshot().transcript.len(), 2);
}

#[tokio::test]
async fn test_panicking_chat_call_still_records_one_entry() {
    let controller = controller(Arc::new(Offline), PanicsOnce::new());

    let first = controller.submit_message("first").unwrap();
    assert!(first.await.unwrap());
    let second = controller.submit_message("second").unwrap();
    assert!(second.await.unwrap());

    assert_eq!(
        transcript_lines(&controller),
        vec![
            (1, Sender::User, "first".to_string()),
            (2, Sender::Bot, CONNECTION_ERROR_MESSAGE.to_string()),
            (3, Sender::User, "second".to_string()),
            (4, Sender::Bot, "re: second".to_string()),
        ]
    );
    assert_eq!(controller.state().snapshot().pending_questions, 0);
}
