//! Escalation chain behavior: target selection, tie-breaks, and
//! termination at the top of the hierarchy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;

use bulkhead_core::prelude::*;
use bulkhead_test_utils::{quick_config, three_tier_runtime, RecordingPort};

#[tokio::test]
async fn escalation_climbs_without_revisiting() {
    // The port proposes escalation at every tier; only the critical root
    // refuses to pass the fault on. No clients are attached anywhere:
    // being registered makes a boundary a valid escalation target.
    let port = RecordingPort::suggesting(Action::Escalate);
    let (runtime, tiers) = three_tier_runtime(quick_config(), port.clone()).await;
    let coordinator = runtime.coordinator();

    let action = coordinator
        .handle_violation(tiers.widget.clone(), Fault::Device("sensor gone".into()))
        .await
        .unwrap();
    assert_eq!(action, Action::Escalate);

    // One decision per tier, none repeated.
    assert_eq!(port.decide_count(), 3);
    assert!(port.decided().iter().all(|f| matches!(f, Fault::Device(_))));

    let widget = coordinator.violations(tiers.widget.clone()).await.unwrap();
    let session = coordinator.violations(tiers.session.clone()).await.unwrap();
    let app = coordinator.violations(tiers.app.clone()).await.unwrap();
    assert_eq!((widget.len(), session.len(), app.len()), (1, 1, 1));

    // The chain ends in a halt at the critical root.
    assert_eq!(port.presented(), vec![tiers.app.clone()]);
    let stats = coordinator.stats().await.unwrap();
    assert_eq!(stats.actions.escalations, 2);
    assert_eq!(stats.actions.halts, 1);

    runtime.shutdown().await;
}

#[tokio::test]
async fn repeated_faults_escalate_to_an_idle_parent_tier() {
    // Root owns no clients; the tripped breaker must still reach it.
    let port = RecordingPort::suggesting(Action::Halt);
    let runtime = ContainmentRuntime::new(quick_config(), port.clone()).unwrap();
    let coordinator = runtime.coordinator();

    coordinator
        .create_boundary(BoundarySpec::new("root", Severity::Error))
        .await
        .unwrap();
    coordinator
        .create_boundary(BoundarySpec::new("widget", Severity::Warning).with_parent("root"))
        .await
        .unwrap();
    coordinator.attach_client("widget", "k1").await.unwrap();

    let mut actions = Vec::new();
    for round in 0..6 {
        actions.push(
            coordinator
                .handle_violation("widget", Fault::Context(format!("corrupt state {round}")))
                .await
                .unwrap(),
        );
    }

    // Five softened fallbacks, then the breaker forces the escalation; the
    // root decides interactively and halts at its error severity.
    assert_eq!(actions[..5], [Action::Fallback; 5]);
    assert_eq!(actions[5], Action::Escalate);

    let root = coordinator.violations("root").await.unwrap();
    assert_eq!(root.len(), 1);
    assert_eq!(root[0].severity, Severity::Error);

    // The tripped decision skipped the port; the root consulted it again.
    assert_eq!(port.decide_count(), 6);
    let mut presented = vec![BoundaryId::new("widget"); 5];
    presented.push(BoundaryId::new("root"));
    assert_eq!(port.presented(), presented);

    runtime.shutdown().await;
}

#[tokio::test]
async fn escalation_prefers_the_lowest_id_on_ties() {
    let port = RecordingPort::scripted(Action::Continue, [Action::Escalate]);
    let runtime = ContainmentRuntime::new(quick_config(), port.clone()).unwrap();
    let coordinator = runtime.coordinator();

    coordinator
        .create_boundary(BoundarySpec::new("leaf", Severity::Warning))
        .await
        .unwrap();
    coordinator
        .create_boundary(BoundarySpec::new("mid-a", Severity::Error))
        .await
        .unwrap();
    coordinator
        .create_boundary(BoundarySpec::new("mid-b", Severity::Error))
        .await
        .unwrap();

    let action = coordinator
        .handle_violation("leaf", Fault::Network("reset".into()))
        .await
        .unwrap();
    assert_eq!(action, Action::Escalate);

    // Equal severity: id order decides, deterministically.
    let a = coordinator.violations("mid-a").await.unwrap();
    let b = coordinator.violations("mid-b").await.unwrap();
    assert_eq!(a.len(), 1);
    assert!(b.is_empty());

    runtime.shutdown().await;
}

#[tokio::test]
async fn escalation_skips_removed_boundaries() {
    let port = RecordingPort::scripted(Action::Continue, [Action::Escalate]);
    let (runtime, tiers) = three_tier_runtime(quick_config(), port.clone()).await;
    let coordinator = runtime.coordinator();

    // The error tier is gone; the next bucket up is the critical root.
    coordinator
        .remove_boundary(tiers.session.clone())
        .await
        .unwrap();

    let action = coordinator
        .handle_violation(tiers.widget.clone(), Fault::Network("reset".into()))
        .await
        .unwrap();
    assert_eq!(action, Action::Escalate);

    let session = coordinator.violations(tiers.session.clone()).await.unwrap();
    let app = coordinator.violations(tiers.app.clone()).await.unwrap();
    assert!(session.is_empty());
    assert_eq!(app.len(), 1);

    runtime.shutdown().await;
}

#[tokio::test]
async fn escalation_without_targets_halts_in_place() {
    let port = RecordingPort::scripted(Action::Continue, [Action::Escalate]);
    let runtime = ContainmentRuntime::new(quick_config(), port.clone()).unwrap();
    let coordinator = runtime.coordinator();

    // The warning tier is the top of this hierarchy: nothing is registered
    // above it, so the escalation cannot go anywhere and resolves as a halt
    // at the origin.
    coordinator
        .create_boundary(BoundarySpec::new("leaf", Severity::Warning))
        .await
        .unwrap();

    let action = coordinator
        .handle_violation("leaf", Fault::Network("reset".into()))
        .await
        .unwrap();
    assert_eq!(action, Action::Halt);
    assert_eq!(port.presented(), vec![BoundaryId::new("leaf")]);

    let stats = coordinator.stats().await.unwrap();
    assert_eq!(stats.actions.halts, 1);
    assert_eq!(stats.actions.escalations, 0);

    runtime.shutdown().await;
}

#[tokio::test]
async fn halting_runs_the_boundary_fallback() {
    let ran = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&ran);
    let port = RecordingPort::suggesting(Action::Halt);
    let runtime = ContainmentRuntime::new(quick_config(), port.clone()).unwrap();
    let coordinator = runtime.coordinator();

    coordinator
        .create_boundary(
            BoundarySpec::new("screen", Severity::Error).with_fallback(FallbackAction::new(
                "blank-screen",
                move || {
                    let counted = Arc::clone(&counted);
                    async move {
                        counted.fetch_add(1, Ordering::SeqCst);
                    }
                },
            )),
        )
        .await
        .unwrap();

    let action = coordinator
        .handle_violation("screen", Fault::Device("gpu lost".into()))
        .await
        .unwrap();
    assert_eq!(action, Action::Halt);

    // The fallback ran before the presentation was acknowledged.
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert_eq!(port.presented(), vec![BoundaryId::new("screen")]);

    runtime.shutdown().await;
}
