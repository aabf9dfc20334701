//! Session-controller tests for the autonomous continuation loop.
//!
//! The tokio clock is paused, so the 2.5 s continuation delay elapses
//! instantly once every task is idle while `Instant` still measures it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, broadcast};
use tokio::time::Instant;

use docagent::controller::{STOP_NOTICE, SendOutcome, SessionController, SessionEvent};
use docagent::core::path::resolve;
use docagent::core::types::Message;
use docagent::prompt::CONTINUE_PROMPT;
use docagent::test_support::{ScriptedBackend, agent_reply, scripted_controller};

async fn wait_for(
    events: &mut broadcast::Receiver<SessionEvent>,
    predicate: impl Fn(&SessionEvent) -> bool,
) {
    loop {
        let event = events.recv().await.expect("event stream open");
        if predicate(&event) {
            return;
        }
    }
}

fn is_scheduled(event: &SessionEvent) -> bool {
    matches!(event, SessionEvent::ContinuationScheduled { .. })
}

fn setup(backend: ScriptedBackend) -> (Arc<SessionController>, Arc<ScriptedBackend>) {
    let backend = Arc::new(backend);
    (scripted_controller(backend.clone()), backend)
}

/// An update asking to continue submits "Continue with the plan." exactly once,
/// after the delay, reading the session as it is when the timer fires.
#[tokio::test(start_paused = true)]
async fn continuation_fires_once_with_state_at_fire_time() {
    let (controller, backend) = setup(
        ScriptedBackend::new()
            .reply(&[&agent_reply(
                "Step 1 done.",
                "CONTENT_GENERATION",
                Some(("docs/README.md", "# One\n")),
                true,
            )])
            .reply(&[&agent_reply("All done.", "CONTENT_GENERATION", None, false)]),
    );
    let mut events = controller.subscribe();

    controller.send("Build a CRM").expect("send");
    wait_for(&mut events, is_scheduled).await;
    let scheduled_at = Instant::now();
    assert_eq!(backend.requests().len(), 1);
    assert!(controller.is_running());

    // Changed after scheduling; the continuation must see it.
    controller.select_path(Some("docs/notes.md".to_string()));

    controller.wait_until_idle().await;
    assert!(scheduled_at.elapsed() >= Duration::from_millis(2_500));

    tokio::time::sleep(Duration::from_secs(30)).await;
    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].prompt, CONTINUE_PROMPT);
    assert!(
        requests[1]
            .system_instruction
            .contains("\"mode\": \"CONTENT_GENERATION\"")
    );
    assert!(
        requests[1]
            .system_instruction
            .ends_with("The user is currently viewing: docs/notes.md")
    );
    assert_eq!(
        requests[1].history.last(),
        Some(&Message::assistant("Step 1 done."))
    );

    // No synthetic user message is added for the continuation.
    let session = controller.snapshot();
    assert_eq!(
        session.history,
        vec![
            Message::user("Build a CRM"),
            Message::assistant("Step 1 done."),
            Message::assistant("All done."),
        ]
    );
    assert_eq!(
        resolve(&session.tree, "docs/README.md").and_then(|node| node.content()),
        Some("# One\n")
    );
    assert!(!session.running);
}

/// A cycle with an empty chat segment leaves an empty assistant message, which
/// the continuation's placeholder then takes over; it is never sent to the model.
#[tokio::test(start_paused = true)]
async fn empty_chat_segment_in_chain_is_taken_over_by_continuation() {
    let (controller, backend) = setup(
        ScriptedBackend::new()
            .reply(&[&agent_reply(
                "",
                "CONTENT_GENERATION",
                Some(("docs/notes.md", "- first\n")),
                true,
            )])
            .reply(&[&agent_reply("All done.", "CONTENT_GENERATION", None, false)]),
    );
    let mut events = controller.subscribe();

    controller.send("Build a CRM").expect("send");
    wait_for(&mut events, is_scheduled).await;
    assert_eq!(
        controller.snapshot().history,
        vec![Message::user("Build a CRM"), Message::assistant("")]
    );

    controller.wait_until_idle().await;
    let session = controller.snapshot();
    assert_eq!(
        session.history,
        vec![Message::user("Build a CRM"), Message::assistant("All done.")]
    );
    assert_eq!(
        resolve(&session.tree, "docs/notes.md").and_then(|node| node.content()),
        Some("- first\n")
    );

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].prompt, CONTINUE_PROMPT);
    assert_eq!(requests[1].history, vec![Message::user("Build a CRM")]);
}

#[tokio::test(start_paused = true)]
async fn stop_before_delay_cancels_continuation() {
    let (controller, backend) = setup(
        ScriptedBackend::new()
            .reply(&[&agent_reply("Step 1 done.", "ANALYSIS", None, true)])
            .reply(&[&agent_reply("never", "ANALYSIS", None, false)]),
    );
    let mut events = controller.subscribe();

    controller.send("Build a CRM").expect("send");
    wait_for(&mut events, is_scheduled).await;
    assert!(controller.stop());
    assert!(!controller.is_running());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.requests().len(), 1);
    let session = controller.snapshot();
    assert_eq!(
        session.history.last(),
        Some(&Message::assistant(STOP_NOTICE))
    );
    assert!(!session.running);
}

/// A second send while a cycle runs adds no message and starts no cycle.
#[tokio::test(start_paused = true)]
async fn send_while_running_is_ignored() {
    let gate = Arc::new(Notify::new());
    let (controller, backend) = setup(ScriptedBackend::new().gated_reply(
        Arc::clone(&gate),
        &[&agent_reply("Done.", "ANALYSIS", None, false)],
    ));

    assert!(matches!(
        controller.send("first"),
        Ok(SendOutcome::Started { .. })
    ));
    let history_len = controller.snapshot().history.len();
    tokio::task::yield_now().await;

    assert_eq!(controller.send("second"), Ok(SendOutcome::Busy));
    assert_eq!(controller.snapshot().history.len(), history_len);

    gate.notify_one();
    controller.wait_until_idle().await;
    assert_eq!(backend.requests().len(), 1);
    assert_eq!(backend.requests()[0].prompt, "first");
}

#[tokio::test(start_paused = true)]
async fn send_while_awaiting_continuation_is_ignored() {
    let (controller, backend) = setup(
        ScriptedBackend::new()
            .reply(&[&agent_reply("Step 1.", "ANALYSIS", None, true)])
            .reply(&[&agent_reply("Step 2.", "ANALYSIS", None, false)]),
    );
    let mut events = controller.subscribe();

    controller.send("Plan it").expect("send");
    wait_for(&mut events, is_scheduled).await;
    assert_eq!(controller.send("interrupt"), Ok(SendOutcome::Busy));

    controller.wait_until_idle().await;
    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].prompt, CONTINUE_PROMPT);
}

/// A response arriving after a stop must not touch the session.
#[tokio::test(start_paused = true)]
async fn late_result_after_stop_is_discarded() {
    let gate = Arc::new(Notify::new());
    let (controller, backend) = setup(ScriptedBackend::new().gated_reply(
        Arc::clone(&gate),
        &[&agent_reply(
            "Too late.",
            "REFINEMENT",
            Some(("docs/README.md", "overwritten")),
            true,
        )],
    ));

    controller.send("Build a CRM").expect("send");
    tokio::task::yield_now().await;
    assert_eq!(backend.requests().len(), 1);

    assert!(controller.stop());
    gate.notify_one();
    tokio::time::sleep(Duration::from_secs(30)).await;

    let session = controller.snapshot();
    assert_eq!(
        session.history,
        vec![Message::user("Build a CRM"), Message::assistant(STOP_NOTICE)]
    );
    assert_eq!(session.schema.mode(), "ANALYSIS");
    assert_eq!(
        resolve(&session.tree, "docs/README.md").and_then(|node| node.content()),
        Some("# Readme\n")
    );
    assert!(!session.running);
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn error_mid_chain_clears_running_for_manual_retry() {
    let (controller, backend) = setup(
        ScriptedBackend::new()
            .reply(&[&agent_reply("Step 1.", "ANALYSIS", None, true)])
            .reply(&["the model forgot the separator"])
            .reply(&[&agent_reply("Retried.", "ANALYSIS", None, false)]),
    );

    controller.send("Plan it").expect("send");
    controller.wait_until_idle().await;

    let session = controller.snapshot();
    let last = session.history.last().expect("message");
    assert!(last.content.contains("**Error:** Agent did not return the required separator"));
    assert_eq!(backend.requests().len(), 2);

    assert!(matches!(
        controller.send("try again"),
        Ok(SendOutcome::Started { .. })
    ));
    controller.wait_until_idle().await;
    assert_eq!(backend.requests().len(), 3);
}
