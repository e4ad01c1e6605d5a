use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::*;
use crate::logic::decision::{Decision, FinalDecision, HistoryFilter};

async fn gateway_for(server: &MockServer) -> HttpGateway {
    HttpGateway::new(GatewayConfig {
        base_url: server.uri(),
        timeout_ms: 2_000,
    })
    .unwrap()
}

fn history_row(id: &str, decision: &str) -> serde_json::Value {
    json!({
        "id": id,
        "created_at": "2026-10-15T08:30:00Z",
        "user_id": "u_1",
        "amount": 120.0,
        "currency": "USD",
        "decision": decision,
        "risk_score": 42.5,
        "confidence_score": 0.7,
        "regret_level": "low",
        "triggered_signals": ["velocity"],
        "reasons": ["3 withdrawals in 1h"],
        "counterfactuals": [],
        "human_final_decision": null,
        "human_overrode": false,
        "human_note": null
    })
}

// ============================================================================
// HTTP GATEWAY
// ============================================================================

#[tokio::test]
async fn test_history_sends_filter_as_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payout/history"))
        .and(query_param("limit", "100"))
        .and(query_param("decision", "review"))
        .and(query_param("user_id", "u_1"))
        .and(query_param("days", "14"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([history_row("dec_1", "review")])))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server).await;
    let filter = HistoryFilter::default()
        .with_decision(Some(Decision::Review))
        .with_user_id(Some("  u_1 "))
        .with_days(14);

    let records = gateway.fetch_history(&filter).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "dec_1");
    assert_eq!(records[0].decision, Decision::Review);
}

#[tokio::test]
async fn test_human_action_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payout/human-review"))
        .and(body_json(json!({
            "decision_id": "dec_7",
            "reviewer_id": "admin",
            "action": "conflict",
            "final_decision": "approve",
            "note": "verified by phone"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/payout/human-review"))
        .and(body_json(json!({
            "decision_id": "dec_8",
            "reviewer_id": "admin",
            "action": "accept"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server).await;
    gateway
        .submit_human_action(&HumanActionRequest::conflict(
            "dec_7",
            "admin",
            FinalDecision::Approve,
            " verified by phone ",
        ))
        .await
        .unwrap();
    gateway
        .submit_human_action(&HumanActionRequest::accept("dec_8", "admin"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_resolve_omits_blank_note() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payout/resolve-review"))
        .and(body_json(json!({
            "decision_id": "dec_3",
            "action": "resolve",
            "final_decision": "block"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server).await;
    let request = ResolveReviewRequest::new("dec_3", FinalDecision::Block, Some("   "));
    gateway.resolve_review(&request).await.unwrap();
}

#[tokio::test]
async fn test_status_codes_map_to_kinds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payout/human-review"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"detail": "Decision already reviewed"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/payout/resolve-review"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Decision not found"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/admin/conflicted-decisions/hr_1/approve"))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({"error": "learning sink unavailable"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/weights"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server).await;

    let err = gateway
        .submit_human_action(&HumanActionRequest::accept("dec_1", "admin"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert_eq!(err.status, Some(400));
    assert_eq!(err.message, "Decision already reviewed");

    let err = gateway
        .resolve_review(&ResolveReviewRequest::new("dec_x", FinalDecision::Approve, None))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    let err = gateway.approve_for_learning("hr_1").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::UpstreamFailure);
    assert_eq!(err.message, "learning sink unavailable");

    let err = gateway.fetch_weights().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unknown);
    assert_eq!(err.message, "boom");
}

#[tokio::test]
async fn test_unreachable_service_is_network_error() {
    // Nothing listens on port 9 locally
    let gateway = HttpGateway::new(GatewayConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        timeout_ms: 500,
    })
    .unwrap();

    let err = gateway.health().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Network);
    assert_eq!(err.status, None);
}

#[tokio::test]
async fn test_conflicted_list_shapes() {
    let entry = json!({
        "human_review_id": "hr_1",
        "decision_id": "dec_4",
        "system_decision": "block",
        "human_decision": "approve",
        "human_note": "known customer",
        "risk_score": 84.0,
        "approved_for_learning": false,
        "user_id": "u_4"
    });

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/conflicted-decisions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"conflicted_decisions": [entry.clone()]})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/conflicted-decisions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([entry])))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server).await;

    let wrapped = gateway.fetch_conflicted().await.unwrap();
    let bare = gateway.fetch_conflicted().await.unwrap();
    assert_eq!(wrapped, bare);
    assert_eq!(wrapped[0].human_decision, FinalDecision::Approve);
    assert_eq!(wrapped[0].who(), Some("u_4"));
}

#[tokio::test]
async fn test_rationale_shapes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/payout/dec_1/review-rationale"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"explanation": "Amount near limit"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/payout/dec_2/review-rationale"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("New payment method")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/payout/dec_3/review-rationale"))
        .respond_with(ResponseTemplate::new(200).set_body_string("  plain text reason \n"))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server).await;
    assert_eq!(gateway.fetch_review_rationale("dec_1").await.unwrap(), "Amount near limit");
    assert_eq!(gateway.fetch_review_rationale("dec_2").await.unwrap(), "New payment method");
    assert_eq!(gateway.fetch_review_rationale("dec_3").await.unwrap(), "plain text reason");
}

#[tokio::test]
async fn test_patch_weights_wraps_map() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/admin/weights"))
        .and(body_json(json!({"signal_weights": {"geo": 20.0, "velocity": 55.0}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "weights": {"geo": 20.0, "velocity": 55.0},
            "system_score": 71.5
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server).await;
    let map = memory::weights_map(&[("velocity", 55.0), ("geo", 20.0)]);
    let resource = gateway.patch_weights(&map).await.unwrap();

    assert_eq!(resource.weights, map);
    assert!(!resource.has_pending_suggestion());
    assert_eq!(resource.system_score, Some(71.5));
}

#[tokio::test]
async fn test_approve_with_and_without_proposal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/admin/conflicted-decisions/hr_1/approve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"suggested_weights": {"velocity": 45.0}})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/admin/conflicted-decisions/hr_2/approve"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server).await;

    let proposed = gateway.approve_for_learning("hr_1").await.unwrap();
    assert_eq!(proposed.suggested_weights, Some(memory::weights_map(&[("velocity", 45.0)])));

    let empty = gateway.approve_for_learning("hr_2").await.unwrap();
    assert_eq!(empty.suggested_weights, None);
}

#[tokio::test]
async fn test_ids_are_encoded_as_one_path_segment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/admin/conflicted-decisions/hr%2F1%23x/approve"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/payout/dec%2F9/review-rationale"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Manual band"))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server).await;
    gateway.approve_for_learning("hr/1#x").await.unwrap();
    assert_eq!(gateway.fetch_review_rationale("dec/9").await.unwrap(), "Manual band");
}

#[tokio::test]
async fn test_base_url_path_prefix_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/payout/dec_1/review-rationale"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Behind a proxy"))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = HttpGateway::new(GatewayConfig {
        base_url: format!("{}/api", server.uri()),
        timeout_ms: 2_000,
    })
    .unwrap();
    assert_eq!(gateway.fetch_review_rationale("dec_1").await.unwrap(), "Behind a proxy");
}

#[tokio::test]
async fn test_submit_decision_keeps_unknown_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payout/decision"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "decision_id": "dec_99",
            "decision": "approve",
            "risk_score": 8.0,
            "regret_level": "low"
        })))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server).await;
    let outcome = gateway.submit_decision(&PayoutDecisionRequest::default()).await.unwrap();

    assert_eq!(outcome.decision_id.as_deref(), Some("dec_99"));
    assert_eq!(outcome.decision, Decision::Approve);
    assert_eq!(outcome.extra.get("regret_level"), Some(&json!("low")));
}

// ============================================================================
// MEMORY GATEWAY
// ============================================================================

#[tokio::test]
async fn test_memory_conflict_creates_curation_entry() {
    let gateway = MemoryGateway::new().with_records(vec![DecisionRecord::new(
        "dec_1",
        "u_1",
        300.0,
        "USD",
        Decision::Block,
        88.0,
    )]);

    gateway
        .submit_human_action(&HumanActionRequest::conflict(
            "dec_1",
            "admin",
            FinalDecision::Approve,
            "trusted",
        ))
        .await
        .unwrap();

    let record = gateway.record("dec_1").unwrap();
    assert_eq!(record.human_final_decision, Some(FinalDecision::Approve));
    assert!(record.human_overrode);

    let conflicted = gateway.conflicted();
    assert_eq!(conflicted.len(), 1);
    assert_eq!(conflicted[0].decision_id.as_deref(), Some("dec_1"));
    assert_eq!(conflicted[0].human_note.as_deref(), Some("trusted"));

    // Second action on a settled record is refused
    let err = gateway
        .submit_human_action(&HumanActionRequest::accept("dec_1", "admin"))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_memory_patch_rejects_out_of_range() {
    let gateway = MemoryGateway::new();
    let err = gateway
        .patch_weights(&memory::weights_map(&[("velocity", 101.0)]))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert!(gateway.weights().weights.is_empty());
}

#[tokio::test]
async fn test_memory_injected_failure_is_one_shot() {
    let gateway = MemoryGateway::new();
    gateway.fail_next(
        GatewayCall::FetchWeights,
        GatewayError::new(ErrorKind::Network, "offline"),
    );

    assert!(gateway.fetch_weights().await.is_err());
    assert!(gateway.fetch_weights().await.is_ok());
    assert_eq!(gateway.call_count(GatewayCall::FetchWeights), 2);
}

#[tokio::test]
async fn test_memory_demo_is_consistent() {
    let gateway = MemoryGateway::demo();

    let history = gateway.fetch_history(&HistoryFilter::default()).await.unwrap();
    assert!(!history.is_empty());
    assert!(history.windows(2).all(|w| w[0].created_at >= w[1].created_at));

    let conflicted = gateway.fetch_conflicted().await.unwrap();
    assert_eq!(conflicted.len(), 1);
    assert!(gateway.weights().has_pending_suggestion());
}
