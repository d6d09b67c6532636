mod common;

use common::{harness, three_nodes, Behavior, TEST_TIMEOUT};
use meridian_ledger::{Assignment, Ledger, Node, RetryFailure, RetryKey};
use meridian_orchestrator::{FailureKind, ProvisionError};
use std::time::Instant;

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn test_create_on_all_active_nodes() -> anyhow::Result<()> {
    let mut nodes = three_nodes();
    nodes.push(Node::new("n4", "US", "vless").inactive());
    let h = harness(&nodes).await?;

    let out = h
        .orchestrator
        .create_user(Some("u1".to_string()), None)
        .await?;

    assert_eq!(out.user_id, "u1");
    let regions: Vec<&str> = out.connections.iter().map(|c| c.country_code.as_str()).collect();
    assert_eq!(regions, vec!["DE", "NL", "FI"]);
    assert!(out.connections[0].config.starts_with("vless://u1@n1:443?flow=xtls-rprx-vision"));
    assert_eq!(
        out.connections[1].config,
        "trojan://pw1@n2:443?type=tcp&security=none#Config:u1"
    );
    assert!(!out.is_partial());

    assert_eq!(h.ledger.assignments_for_user("u1").await?.len(), 3);
    assert_eq!(h.agent.count("create"), 3);
    Ok(())
}

#[tokio::test]
async fn test_create_generates_identifier_when_absent() -> anyhow::Result<()> {
    let h = harness(&three_nodes()).await?;

    let a = h.orchestrator.create_user(None, None).await?;
    let b = h.orchestrator.create_user(Some("  ".to_string()), None).await?;

    assert_eq!(a.user_id.len(), 36);
    assert_ne!(a.user_id, b.user_id);
    Ok(())
}

#[tokio::test]
async fn test_partial_success_persists_only_successes() -> anyhow::Result<()> {
    let h = harness(&three_nodes()).await?;
    h.agent.on_create("n2", Behavior::Fail);

    let out = h
        .orchestrator
        .create_user(Some("u1".to_string()), None)
        .await?;

    assert_eq!(out.connections.len(), 2);
    assert_eq!(out.failures.len(), 1);
    assert_eq!(out.failures[0].node, "n2");
    assert_eq!(out.failures[0].kind, FailureKind::Agent);

    let nodes: Vec<String> = h
        .ledger
        .assignments_for_user("u1")
        .await?
        .into_iter()
        .map(|a| a.node)
        .collect();
    assert_eq!(nodes.len(), 2);
    assert!(!nodes.contains(&"n2".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_synthesis_failure_counts_as_node_failure() -> anyhow::Result<()> {
    let h = harness(&three_nodes()).await?;
    h.agent.on_create("n1", Behavior::EmptyDescriptor);

    let out = h
        .orchestrator
        .create_user(Some("u1".to_string()), None)
        .await?;

    assert_eq!(out.connections.len(), 2);
    assert_eq!(out.failures[0].kind, FailureKind::Synthesis);
    Ok(())
}

#[tokio::test]
async fn test_all_nodes_failed_writes_nothing() -> anyhow::Result<()> {
    let h = harness(&three_nodes()).await?;
    for node in ["n1", "n2", "n3"] {
        h.agent.on_create(node, Behavior::Fail);
    }

    let err = h
        .orchestrator
        .create_user(Some("u1".to_string()), None)
        .await
        .unwrap_err();

    match err {
        ProvisionError::AllNodesFailed(failures) => assert_eq!(failures.len(), 3),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.ledger.assignments_for_user("u1").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_shared_deadline_bounds_the_fan_out() -> anyhow::Result<()> {
    let h = harness(&three_nodes()).await?;
    h.agent.on_create("n3", Behavior::Hang);

    let started = Instant::now();
    let out = h
        .orchestrator
        .create_user(Some("u1".to_string()), None)
        .await?;
    let elapsed = started.elapsed();

    assert!(elapsed < TEST_TIMEOUT * 5, "fan-out took {elapsed:?}");
    assert_eq!(out.connections.len(), 2);
    assert_eq!(out.failures[0].node, "n3");
    assert_eq!(out.failures[0].kind, FailureKind::DeadlineExceeded);
    Ok(())
}

#[tokio::test]
async fn test_pre_cleanup_runs_before_creates_and_never_fails() -> anyhow::Result<()> {
    let h = harness(&three_nodes()).await?;
    h.agent.on_delete("n1", Behavior::Fail);
    h.agent.on_delete("n2", Behavior::Hang);

    let out = h
        .orchestrator
        .create_user(Some("u1".to_string()), None)
        .await?;
    assert_eq!(out.connections.len(), 3);

    let calls = h.agent.calls();
    let last_delete = calls.iter().rposition(|c| c.starts_with("delete:"));
    let first_create = calls.iter().position(|c| c.starts_with("create:"));
    assert_eq!(h.agent.count("delete"), 3);
    assert!(last_delete < first_create, "calls out of order: {calls:?}");

    assert_eq!(h.ledger.count_pending_retries().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_target_node_resolution() -> anyhow::Result<()> {
    let mut nodes = three_nodes();
    nodes.push(Node::new("off", "US", "vless").inactive());
    let h = harness(&nodes).await?;

    let out = h
        .orchestrator
        .create_user(Some("u1".to_string()), Some("n2"))
        .await?;
    assert_eq!(out.connections.len(), 1);
    assert_eq!(out.connections[0].country_code, "NL");
    assert_eq!(h.agent.count("create"), 1);

    let missing = h.orchestrator.create_user(None, Some("nope")).await;
    assert!(matches!(missing, Err(ProvisionError::NodeNotFound(_))));

    let inactive = h.orchestrator.create_user(None, Some("off")).await;
    assert!(matches!(inactive, Err(ProvisionError::NodeInactive(_))));
    Ok(())
}

#[tokio::test]
async fn test_no_active_nodes() -> anyhow::Result<()> {
    let h = harness(&[Node::new("n1", "DE", "vless").inactive()]).await?;

    let err = h.orchestrator.create_user(None, None).await;
    assert!(matches!(err, Err(ProvisionError::NoActiveNodes)));
    assert!(h.agent.calls().is_empty());
    Ok(())
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_bulk_delete_always_clears_assignments() -> anyhow::Result<()> {
    let h = harness(&three_nodes()).await?;
    h.orchestrator
        .create_user(Some("u1".to_string()), None)
        .await?;

    h.agent.on_delete("n1", Behavior::Fail);
    h.agent.on_delete("n3", Behavior::Hang);

    let out = h.orchestrator.delete_user("u1").await?;
    assert_eq!(out.attempted, 3);
    assert_eq!(out.failures.len(), 2);

    assert!(h.ledger.assignments_for_user("u1").await?.is_empty());

    let pending = h.ledger.list_pending_retries().await?;
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|p| p.attempts == 1));
    let n1 = pending.iter().find(|p| p.key.node == "n1").expect("n1 pending");
    assert_eq!(n1.key.protocol, "vless");
    Ok(())
}

#[tokio::test]
async fn test_bulk_delete_without_assignments_is_noop() -> anyhow::Result<()> {
    let h = harness(&three_nodes()).await?;

    let out = h.orchestrator.delete_user("ghost").await?;
    assert_eq!(out.attempted, 0);
    assert!(h.agent.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_repeated_failures_increment_a_single_row() -> anyhow::Result<()> {
    let h = harness(&three_nodes()).await?;
    h.agent.on_delete("n2", Behavior::Fail);

    let pre = RetryFailure::new(RetryKey::new("u1", "n2", "trojan"), "earlier");
    h.ledger.record_pending_retry(&pre).await?;
    let before = h.ledger.list_pending_retries().await?;

    h.ledger
        .insert_assignments(&[Assignment {
            user_id: "u1".to_string(),
            node: "n2".to_string(),
            protocol: "trojan".to_string(),
            created_at: chrono::Utc::now(),
        }])
        .await?;
    h.orchestrator.delete_user("u1").await?;

    let after = h.ledger.list_pending_retries().await?;
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].attempts, 2);
    assert_ne!(after[0].last_error, "earlier");
    assert!(after[0].last_attempt >= before[0].last_attempt);
    Ok(())
}

#[tokio::test]
async fn test_targeted_delete_never_touches_assignments() -> anyhow::Result<()> {
    let h = harness(&three_nodes()).await?;
    h.orchestrator
        .create_user(Some("u1".to_string()), None)
        .await?;

    h.orchestrator.delete_user_from_node("u1", "n1").await?;
    assert_eq!(h.ledger.assignments_for_user("u1").await?.len(), 3);

    h.agent.on_delete("n2", Behavior::Fail);
    let err = h.orchestrator.delete_user_from_node("u1", "n2").await;
    assert!(matches!(err, Err(ProvisionError::Transport(_))));
    assert_eq!(h.ledger.assignments_for_user("u1").await?.len(), 3);

    let pending = h.ledger.list_pending_retries().await?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].key, RetryKey::new("u1", "n2", "trojan"));
    Ok(())
}

#[tokio::test]
async fn test_targeted_delete_without_assignment_records_nothing() -> anyhow::Result<()> {
    let h = harness(&three_nodes()).await?;
    h.agent.on_delete("n3", Behavior::Fail);

    let err = h.orchestrator.delete_user_from_node("never-assigned", "n3").await;
    assert!(matches!(err, Err(ProvisionError::Transport(_))));
    assert_eq!(h.agent.count("delete"), 1);

    assert!(h.ledger.assignments_for_user("never-assigned").await?.is_empty());
    assert!(h.ledger.list_pending_retries().await?.is_empty());

    let report = h.orchestrator.cleanup_pending_retries().await?;
    assert_eq!(report.total_attempted, 0);
    Ok(())
}

#[tokio::test]
async fn test_validation_happens_before_node_calls() -> anyhow::Result<()> {
    let h = harness(&three_nodes()).await?;

    assert!(matches!(
        h.orchestrator.delete_user("").await,
        Err(ProvisionError::Validation(_))
    ));
    assert!(matches!(
        h.orchestrator.delete_user_from_node("u1", " ").await,
        Err(ProvisionError::Validation(_))
    ));
    assert!(matches!(
        h.orchestrator.remove_pending_retry("", "n1", None).await,
        Err(ProvisionError::Validation(_))
    ));
    assert!(h.agent.calls().is_empty());
    Ok(())
}

// =============================================================================
// Cleanup sweep
// =============================================================================

#[tokio::test]
async fn test_cleanup_sweep_accounting() -> anyhow::Result<()> {
    let h = harness(&three_nodes()).await?;
    h.orchestrator
        .create_user(Some("u1".to_string()), None)
        .await?;
    h.orchestrator
        .create_user(Some("u2".to_string()), None)
        .await?;

    // targeted failures leave both the pending rows and the assignments
    for node in ["n1", "n2", "n3"] {
        h.agent.on_delete(node, Behavior::Fail);
    }
    for node in ["n1", "n2", "n3"] {
        let _ = h.orchestrator.delete_user_from_node("u1", node).await;
    }
    let _ = h.orchestrator.delete_user_from_node("u2", "n1").await;
    assert_eq!(h.ledger.count_pending_retries().await?, 4);

    h.agent.on_delete("n1", Behavior::Succeed);
    h.agent.on_delete("n2", Behavior::Succeed);

    let report = h.orchestrator.cleanup_pending_retries().await?;
    assert_eq!(report.total_attempted, 4);
    assert_eq!(report.successful, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.still_pending, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("user=u1, endpoint=n3, inbound=vless: "));

    let left = h.ledger.list_pending_retries().await?;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].attempts, 2);

    let u1: Vec<String> = h
        .ledger
        .assignments_for_user("u1")
        .await?
        .into_iter()
        .map(|a| a.node)
        .collect();
    assert_eq!(u1, vec!["n3".to_string()]);
    assert_eq!(h.ledger.assignments_for_user("u2").await?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_cleanup_runs_sequentially() -> anyhow::Result<()> {
    let h = harness(&three_nodes()).await?;
    h.ledger
        .record_pending_retries(&[
            RetryFailure::new(RetryKey::new("a", "n1", "vless"), "e"),
            RetryFailure::new(RetryKey::new("b", "n2", "trojan"), "e"),
        ])
        .await?;
    h.agent.on_delete("n1", Behavior::Hang);
    h.agent.on_delete("n2", Behavior::Hang);

    let started = Instant::now();
    let report = h.orchestrator.cleanup_pending_retries().await?;

    assert_eq!(report.failed, 2);
    assert!(started.elapsed() >= TEST_TIMEOUT * 2);
    Ok(())
}

#[tokio::test]
async fn test_cleanup_with_nothing_pending() -> anyhow::Result<()> {
    let h = harness(&three_nodes()).await?;

    let report = h.orchestrator.cleanup_pending_retries().await?;
    assert_eq!(report, Default::default());
    Ok(())
}

// =============================================================================
// Operator override
// =============================================================================

#[tokio::test]
async fn test_remove_pending_exact_and_wildcard() -> anyhow::Result<()> {
    let h = harness(&three_nodes()).await?;
    h.ledger
        .record_pending_retries(&[
            RetryFailure::new(RetryKey::new("u1", "n1", "vless"), "e"),
            RetryFailure::new(RetryKey::new("u1", "n1", "trojan"), "e"),
            RetryFailure::new(RetryKey::new("u1", "n2", "trojan"), "e"),
        ])
        .await?;

    let removed = h
        .orchestrator
        .remove_pending_retry("u1", "n2", Some("trojan"))
        .await?;
    assert_eq!(removed, 1);

    let again = h
        .orchestrator
        .remove_pending_retry("u1", "n2", Some("trojan"))
        .await;
    assert!(matches!(again, Err(ProvisionError::NotFound(_))));

    let wildcard = h.orchestrator.remove_pending_retry("u1", "n1", None).await?;
    assert_eq!(wildcard, 2);

    let empty = h.orchestrator.remove_pending_retry("u1", "n1", Some("")).await;
    assert!(matches!(empty, Err(ProvisionError::NotFound(_))));

    assert_eq!(h.ledger.count_pending_retries().await?, 0);
    assert!(h.agent.calls().is_empty());
    Ok(())
}
