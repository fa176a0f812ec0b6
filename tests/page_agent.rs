mod common;

use common::{chat_input, send_button, DomAction, FakeDom};
use region_relay_lib::automation::{
    AgentOutcome, DomEvent, ElementInfo, ElementKind, Key, SubmitMethod,
};
use region_relay_lib::{Message, PageAgent, RelayError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const ORIGIN: &str = "https://gemini.google.com";

fn agent(dom: &Arc<FakeDom>) -> PageAgent {
    PageAgent::new(dom.clone(), &common::config())
}

fn marked(text: &str) -> serde_json::Value {
    Message::paste_and_send(text).to_value()
}

#[tokio::test(start_paused = true)]
async fn fills_input_then_clicks_named_submit() {
    let dom = FakeDom::new(vec![chat_input(1), send_button(2)]);
    let agent = agent(&dom);

    let outcome = agent
        .handle_window_message(ORIGIN, &marked("Summarize this"))
        .await
        .unwrap();

    let report = match outcome {
        AgentOutcome::Delivered(report) => report,
        other => panic!("expected delivery, got {:?}", other),
    };
    assert_eq!(report.input_strategy, "accessible-name");
    assert_eq!(
        report.submit,
        SubmitMethod::Clicked {
            strategy: "submit-name"
        }
    );

    let input = chat_input(1).id;
    assert_eq!(
        dom.actions(),
        vec![
            DomAction::Focus(input),
            DomAction::Clear(input),
            DomAction::SetContent(input, "Summarize this".into()),
            DomAction::Dispatch(input, DomEvent::Input),
            DomAction::Dispatch(input, DomEvent::Change),
            DomAction::Click(send_button(2).id),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn falls_back_to_enter_without_a_submit_control() {
    let mut input = ElementInfo::new(7, ElementKind::ContentEditable, 500.0, 40.0);
    input.role = Some("textbox".into());
    let dom = FakeDom::new(vec![input.clone()]);

    let report = agent(&dom).paste_and_send("hi").await.unwrap();

    assert_eq!(report.submit, SubmitMethod::EnterKey);
    assert_eq!(report.input_strategy, "editable-role");
    let tail: Vec<_> = dom.actions().into_iter().rev().take(3).rev().collect();
    assert_eq!(
        tail,
        vec![
            DomAction::Dispatch(input.id, DomEvent::KeyDown(Key::Enter)),
            DomAction::Dispatch(input.id, DomEvent::KeyPress(Key::Enter)),
            DomAction::Dispatch(input.id, DomEvent::KeyUp(Key::Enter)),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn submit_inside_the_input_form_is_used_as_last_resort() {
    let mut unnamed = ElementInfo::new(3, ElementKind::Button, 24.0, 24.0);
    unnamed.form = Some(1);
    let dom = FakeDom::new(vec![chat_input(1), unnamed.clone()]);

    let report = agent(&dom).paste_and_send("hi").await.unwrap();

    assert_eq!(
        report.submit,
        SubmitMethod::Clicked {
            strategy: "form-button"
        }
    );
    assert_eq!(dom.actions().last(), Some(&DomAction::Click(unnamed.id)));
}

#[tokio::test(start_paused = true)]
async fn read_only_and_tiny_inputs_are_skipped() {
    let mut locked = chat_input(1);
    locked.read_only = true;
    let tiny = ElementInfo::new(2, ElementKind::TextInput, 40.0, 10.0);
    let big = ElementInfo::new(3, ElementKind::TextInput, 400.0, 40.0);
    let dom = FakeDom::new(vec![locked, tiny, big]);

    let report = agent(&dom).paste_and_send("hi").await.unwrap();

    assert_eq!(report.input.0, 3);
    assert_eq!(report.input_strategy, "largest-text-entry");
}

#[tokio::test(start_paused = true)]
async fn unmarked_messages_are_ignored() {
    let dom = FakeDom::new(vec![chat_input(1)]);
    let agent = agent(&dom);

    for data in [
        json!({ "type": "PASTE_AND_SEND", "payload": { "text": "x" } }),
        json!({ "type": "PASTE_AND_SEND", "__REGION_RELAY__": "yes", "payload": { "text": "x" } }),
        json!({ "type": "OTHER", "__REGION_RELAY__": true }),
        json!("PASTE_AND_SEND"),
    ] {
        let outcome = agent.handle_window_message(ORIGIN, &data).await.unwrap();
        assert_eq!(outcome, AgentOutcome::Ignored);
    }
    assert!(dom.actions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn marked_message_without_payload_is_invalid() {
    let dom = FakeDom::new(vec![chat_input(1)]);

    let err = agent(&dom)
        .handle_window_message(
            ORIGIN,
            &json!({ "type": "PASTE_AND_SEND", "__REGION_RELAY__": true }),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RelayError::Validation(_)));
    assert!(dom.actions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn sixth_message_in_window_is_dropped() {
    let dom = FakeDom::new(vec![chat_input(1), send_button(2)]);
    let agent = agent(&dom);

    for _ in 0..5 {
        let outcome = agent.handle_window_message(ORIGIN, &marked("hi")).await.unwrap();
        assert!(matches!(outcome, AgentOutcome::Delivered(_)));
    }
    let clicks_before = dom.actions().len();

    let outcome = agent.handle_window_message(ORIGIN, &marked("hi")).await.unwrap();
    assert_eq!(outcome, AgentOutcome::RateLimited);
    assert_eq!(dom.actions().len(), clicks_before);

    // Other origins have their own budget.
    let other = agent
        .handle_window_message("https://elsewhere.example", &marked("hi"))
        .await
        .unwrap();
    assert!(matches!(other, AgentOutcome::Delivered(_)));

    tokio::time::advance(Duration::from_secs(10)).await;
    let outcome = agent.handle_window_message(ORIGIN, &marked("hi")).await.unwrap();
    assert!(matches!(outcome, AgentOutcome::Delivered(_)));
}

#[tokio::test(start_paused = true)]
async fn waits_for_an_input_that_renders_late() {
    let dom = FakeDom::new(vec![chat_input(1), send_button(2)]);
    dom.state.lock().unwrap().render_delay = 3;

    let report = agent(&dom).paste_and_send("hi").await.unwrap();

    assert_eq!(report.input, chat_input(1).id);
    // Four input polls, then one for the submit control.
    assert_eq!(dom.state.lock().unwrap().polls, 5);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_the_attempt_budget() {
    let dom = FakeDom::new(vec![send_button(2)]);
    let started = tokio::time::Instant::now();

    let err = agent(&dom).paste_and_send("hi").await.unwrap_err();

    assert!(matches!(err, RelayError::NotFound(_)), "got {:?}", err);
    assert_eq!(dom.state.lock().unwrap().polls, 10);
    assert!(started.elapsed() >= Duration::from_millis(9 * 500));
    assert!(dom.actions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn page_that_never_reports_ready_is_still_tried() {
    let dom = FakeDom::new(vec![chat_input(1), send_button(2)]);
    dom.state.lock().unwrap().ready = false;

    let report = agent(&dom).paste_and_send("hi").await.unwrap();

    assert!(matches!(report.submit, SubmitMethod::Clicked { .. }));
}

#[tokio::test(start_paused = true)]
async fn oversized_text_is_truncated() {
    let dom = FakeDom::new(vec![chat_input(1), send_button(2)]);
    let mut config = common::config();
    config.max_text_chars = 4;
    let agent = PageAgent::new(dom.clone(), &config);

    agent.paste_and_send("héllo wörld").await.unwrap();

    assert!(dom
        .actions()
        .contains(&DomAction::SetContent(chat_input(1).id, "héll".into())));
}
