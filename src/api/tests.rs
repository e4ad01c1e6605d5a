use std::sync::Arc;

use super::*;
use crate::logic::curation::LearningOutcome;
use crate::logic::decision::{Decision, DecisionRecord, FinalDecision, HistoryFilter};
use crate::logic::gateway::memory::weights_map;
use crate::logic::gateway::{
    ErrorKind, GatewayCall, HumanActionRequest, MemoryGateway, WeightsResource, WorkflowGateway,
};
use crate::logic::MutationOutcome;

async fn contested_service(suggestion: Option<&[(&str, f64)]>) -> (Arc<MemoryGateway>, String) {
    let mut gateway = MemoryGateway::new()
        .with_records(vec![DecisionRecord::new("dec_1", "u_1", 500.0, "USD", Decision::Block, 91.0)])
        .with_weights(WeightsResource {
            weights: weights_map(&[("velocity", 40.0), ("geo", 20.0)]),
            pending_suggestion: None,
            system_score: None,
        });
    if let Some(pairs) = suggestion {
        gateway = gateway.with_learning_suggestion(weights_map(pairs));
    }
    let gateway = Arc::new(gateway);

    gateway
        .submit_human_action(&HumanActionRequest::conflict("dec_1", "admin", FinalDecision::Approve, "verified"))
        .await
        .unwrap();
    let id = gateway.conflicted()[0].human_review_id.clone();
    gateway.clear_calls();
    (gateway, id)
}

#[tokio::test]
async fn test_learning_proposal_reaches_weights_view() {
    let (gateway, id) = contested_service(Some(&[("velocity", 50.0), ("geo", 20.0)])).await;
    let console = Console::new(gateway.clone(), "admin");
    console.load_conflicted().await.unwrap();
    console.load_weights().await.unwrap();

    let result = console.approve_for_learning(&id).await.unwrap();
    let proposal = weights_map(&[("velocity", 50.0), ("geo", 20.0)]);
    assert_eq!(result.outcome, LearningOutcome::Proposed(proposal.clone()));
    assert_eq!(result.weights.suggested_weights, Some(proposal.clone()));

    let change = console.apply_suggested().await.unwrap();
    assert_eq!(change.outcome, MutationOutcome::Applied);
    assert_eq!(change.weights.suggested_weights, None);
    assert_eq!(gateway.weights().weights, proposal);
}

#[tokio::test]
async fn test_no_proposal_rereads_weights() {
    let (gateway, id) = contested_service(None).await;
    let console = Console::new(gateway.clone(), "admin");
    console.load_conflicted().await.unwrap();
    gateway.clear_calls();

    let result = console.approve_for_learning(&id).await.unwrap();
    assert_eq!(result.outcome, LearningOutcome::NoProposal);
    assert_eq!(
        gateway.calls(),
        vec![GatewayCall::ApproveForLearning, GatewayCall::FetchWeights]
    );
    assert_eq!(result.weights.signals.len(), 2);
}

#[tokio::test]
async fn test_second_approval_surfaces_view_message() {
    let (gateway, id) = contested_service(None).await;
    let console = Console::new(gateway, "admin");
    console.load_conflicted().await.unwrap();
    console.approve_for_learning(&id).await.unwrap();

    let err = console.approve_for_learning(&id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(err.message, "Invalid request (e.g. already approved).");
    assert!(err.local);
    assert!(console.conflict_details(&id).unwrap().approved_for_learning);
}

#[tokio::test]
async fn test_empty_history_message() {
    let console = Console::new(Arc::new(MemoryGateway::new()), "admin");
    let view = console.load_history(None).await.unwrap();

    assert!(view.records.is_empty());
    assert_eq!(
        view.empty_message,
        Some("No history yet. Run a few decisions or seed demo data.")
    );
    assert!(view.last_refreshed.is_some());
}

#[tokio::test]
async fn test_review_actions_through_console() {
    let gateway = Arc::new(MemoryGateway::new().with_records(vec![DecisionRecord::new(
        "dec_9",
        "u_9",
        91.0,
        "USD",
        Decision::Block,
        91.0,
    )]));
    let console = Console::new(gateway, "admin");
    console.load_history(Some(HistoryFilter::default())).await.unwrap();

    let err = console.conflict("dec_9", "  ").await.unwrap_err();
    assert!(err.local);
    assert_eq!(err.message, "A note is required to contest a decision.");

    let result = console.conflict("dec_9", "false positive, verified").await.unwrap();
    let record = result.record.unwrap();
    assert_eq!(record.human_final_decision, Some(FinalDecision::Approve));
    assert!(record.human_overrode);

    let view = console.history_view();
    assert!(view.records[0].available_actions.is_empty());
}

#[tokio::test]
async fn test_offline_demo_console() {
    let console = Console::offline("admin");

    let health = console.health().await.unwrap();
    assert_eq!(health.mode, "offline");

    let history = console.load_history(None).await.unwrap();
    assert!(!history.records.is_empty());

    let rationale = console.review_rationale("dec_1003").await.unwrap();
    assert!(!rationale.is_empty());

    let weights = console.load_weights().await.unwrap();
    assert!(weights.pending_suggestion.is_some());
    assert_eq!(weights.system_score, Some(72.0));

    let rows = console.load_conflicted().await.unwrap();
    assert_eq!(rows.len(), 1);

    let err = console
        .submit_decision(&crate::logic::gateway::PayoutDecisionRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unknown);
}
