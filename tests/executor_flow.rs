//! Approval/submission sequencing and error rendering through the full
//! pipeline, with a scripted backend and provider.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;

use common::{FakeBackend, FakeProvider, approval_descriptor};
use swapsmith::agent::{Pipeline, TurnOutcome};
use swapsmith::api::ResponseBody;
use swapsmith::session::{Response, ResponseStatus, Session};

fn harness_with_provider(provider: Arc<FakeProvider>) -> (Arc<FakeBackend>, Pipeline, Session) {
    let backend = Arc::new(FakeBackend::default());
    let pipeline = Pipeline::new(backend.clone(), provider);
    let mut session = Session::new("tester", 8453);
    session.connect_wallet("0x1111111111111111111111111111111111111111");
    (backend, pipeline, session)
}

async fn offered_quotes_entry(pipeline: &Pipeline, session: &mut Session) -> uuid::Uuid {
    pipeline.handle_input(session, "swap 0.1 ETH for USDC").await;
    pipeline.handle_input(session, "yes").await;
    session.entries().last().unwrap().id
}

fn texts(entries: &[Response]) -> Vec<String> {
    entries
        .iter()
        .filter_map(|entry| match &entry.content {
            ResponseBody::Text(text) => Some(text.clone()),
            ResponseBody::Structured(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn approval_descriptor_runs_the_full_sequence_in_order() {
    let provider = Arc::new(FakeProvider::default());
    let (backend, pipeline, mut session) = harness_with_provider(provider.clone());
    backend.set_swap_descriptor(approval_descriptor());
    let quotes_entry = offered_quotes_entry(&pipeline, &mut session).await;
    let mark = session.len();

    let outcome = pipeline
        .select_quote(&mut session, quotes_entry, 0)
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Executed);

    // Approval is submitted and mined before anything else; the fresh
    // descriptor is fetched with skip_approval and only then submitted.
    assert_eq!(
        provider.calls(),
        vec![
            "send:0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
            "receipt:0xtx1",
            "send:0xrouter",
            "receipt:0xtx2",
        ]
    );
    assert!(
        backend
            .calls()
            .contains(&"prepare:approved:swap 0.1 ETH for USDC:skip=true".to_string())
    );

    let turn_texts = texts(session.entries_since(mark));
    let position = |needle: &str| {
        turn_texts
            .iter()
            .position(|text| text.contains(needle))
            .unwrap_or_else(|| panic!("no entry containing '{needle}' in {turn_texts:?}"))
    };
    let approving = position("Approving");
    let approved = position("Approval confirmed");
    let refetching = position("fresh route data");
    let confirmed = position("Transaction confirmed");
    assert!(approving < approved);
    assert!(approved < refetching);
    assert!(refetching < confirmed);
}

#[tokio::test]
async fn submitted_entry_is_replaced_in_place_on_success() {
    let provider = Arc::new(FakeProvider::default());
    let (_backend, pipeline, mut session) = harness_with_provider(provider);
    let quotes_entry = offered_quotes_entry(&pipeline, &mut session).await;

    pipeline
        .select_quote(&mut session, quotes_entry, 0)
        .await
        .unwrap();

    // No entry still reads as submitted; the terminal entry carries the
    // explorer link and success status.
    let all_texts = texts(session.entries());
    assert!(!all_texts.iter().any(|text| text.contains("submitted")));
    let terminal = session.entries().last().unwrap();
    assert_eq!(terminal.status, ResponseStatus::Success);
    match &terminal.content {
        ResponseBody::Text(text) => assert!(text.contains("https://basescan.org/tx/0xtx1")),
        other => panic!("expected text, got {other:?}"),
    }
}

#[tokio::test]
async fn user_rejection_yields_single_terminal_error_and_no_submitted_entry() {
    let provider = Arc::new(FakeProvider::rejecting());
    let (_backend, pipeline, mut session) = harness_with_provider(provider.clone());
    let quotes_entry = offered_quotes_entry(&pipeline, &mut session).await;
    let mark = session.len();

    let outcome = pipeline
        .select_quote(&mut session, quotes_entry, 0)
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Errored);

    let turn_entries = session.entries_since(mark);
    let errors: Vec<_> = turn_entries
        .iter()
        .filter(|entry| entry.status == ResponseStatus::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    match &errors[0].content {
        ResponseBody::Text(text) => assert!(text.contains("cancelled by user")),
        other => panic!("expected text, got {other:?}"),
    }
    assert!(!texts(turn_entries).iter().any(|t| t.contains("submitted")));
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn on_chain_revert_replaces_the_submitted_entry_with_an_error() {
    let provider = Arc::new(FakeProvider::reverting());
    let (_backend, pipeline, mut session) = harness_with_provider(provider);
    let quotes_entry = offered_quotes_entry(&pipeline, &mut session).await;

    // Capture the submitted entry's identity while the receipt is pending:
    // the replacement must reuse the same entry and timestamp.
    let outcome = pipeline
        .select_quote(&mut session, quotes_entry, 0)
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Errored);

    let terminal = session.entries().last().unwrap();
    assert_eq!(terminal.status, ResponseStatus::Error);
    match &terminal.content {
        ResponseBody::Text(text) => assert!(text.contains("reverted on-chain")),
        other => panic!("expected text, got {other:?}"),
    }
}

#[tokio::test]
async fn executing_without_a_wallet_renders_an_error_entry() {
    let backend = Arc::new(FakeBackend::default());
    let provider = Arc::new(FakeProvider::default());
    let pipeline = Pipeline::new(backend.clone(), provider);
    let mut session = Session::new("tester", 8453);

    // Confirmation flow reaches the quotes step, which needs a wallet.
    pipeline
        .handle_input(&mut session, "swap 0.1 ETH for USDC")
        .await;
    let outcome = pipeline.handle_input(&mut session, "yes").await;

    assert_eq!(outcome, TurnOutcome::Errored);
    let terminal = session.entries().last().unwrap();
    assert_eq!(terminal.status, ResponseStatus::Error);
    match &terminal.content {
        ResponseBody::Text(text) => assert!(text.contains("Connect a wallet")),
        other => panic!("expected text, got {other:?}"),
    }
    // The quote fetch never happened.
    assert_eq!(backend.calls(), vec!["process_swap:swap 0.1 ETH for USDC"]);
}
