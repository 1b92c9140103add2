//! Tests for the workflow service and query views.
//!
//! These run against `MemoryStore`, so no Postgres connection is required.
//! The Postgres adapter is exercised by `tests/postgres.rs`, which is
//! ignored unless a database is available.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use store::{
    ItemStore, MemoryStore, NewItem, Scope, Status, StoreError, TransitionRecord, WorkflowItem,
    WorkflowKind,
};

use crate::{
    Action, Actor, CreateItem, Rejection, Role, ServiceConfig, WorkflowError, WorkflowService,
};

const U1: i64 = 1;
const U2: i64 = 2;

fn owner() -> Actor {
    Actor::new(U1, Role::Student)
}

fn admin() -> Actor {
    Actor::new(U2, Role::Admin)
}

fn service_over(store: &MemoryStore) -> WorkflowService {
    WorkflowService::with_store(Arc::new(store.clone()), ServiceConfig::default())
}

fn story(title: &str) -> CreateItem {
    CreateItem {
        kind: WorkflowKind::StoryIdea,
        title: title.into(),
        details: json!({ "class": "Period 3 Journalism" }),
        initial_status: None,
    }
}

/// Drive an item to `pending` and return its id.
async fn pending_story(svc: &WorkflowService) -> Uuid {
    let item = svc.create(&owner(), story("Cafeteria waste audit")).await.unwrap();
    svc.request_transition(item.id, &owner(), Action::Submit, None)
        .await
        .unwrap();
    item.id
}

fn chain(records: &[TransitionRecord]) -> Vec<(Status, Status)> {
    records.iter().map(|r| (r.from_status, r.to_status)).collect()
}

// ============================================================
// Scenarios
// ============================================================

#[tokio::test]
async fn scenario_a_submit_moves_draft_to_pending() {
    let store = MemoryStore::new();
    let svc = service_over(&store);

    let item = svc.create(&owner(), story("Local radio history")).await.unwrap();
    assert_eq!(item.status, Status::Draft);

    let outcome = svc
        .request_transition(item.id, &owner(), Action::Submit, None)
        .await
        .expect("owner may submit a draft");

    assert_eq!(outcome.item.status, Status::Pending);
    assert_eq!(outcome.record.from_status, Status::Draft);
    assert_eq!(outcome.record.to_status, Status::Pending);
    assert_eq!(outcome.record.actor_id, U1);
    assert_eq!(outcome.record.seq, 1);
    assert_eq!(store.record_count().await, 1);
}

#[tokio::test]
async fn scenario_b_reject_without_reason_changes_nothing() {
    let store = MemoryStore::new();
    let svc = service_over(&store);
    let id = pending_story(&svc).await;

    let result = svc.request_transition(id, &admin(), Action::Reject, None).await;
    assert!(matches!(
        result,
        Err(WorkflowError::Rejected(Rejection::MissingReason { current: Status::Pending, .. }))
    ));

    assert_eq!(svc.get(id).await.unwrap().status, Status::Pending);
    assert_eq!(store.record_count().await, 1);
}

#[tokio::test]
async fn scenario_c_reject_with_reason_is_logged() {
    let store = MemoryStore::new();
    let svc = service_over(&store);
    let id = pending_story(&svc).await;

    let outcome = svc
        .request_transition(id, &admin(), Action::Reject, Some("insufficient detail"))
        .await
        .unwrap();

    assert_eq!(outcome.item.status, Status::Rejected);
    assert_eq!(outcome.record.actor_id, U2);
    assert_eq!(outcome.record.reason.as_deref(), Some("insufficient detail"));
    assert_eq!(
        (outcome.record.from_status, outcome.record.to_status),
        (Status::Pending, Status::Rejected)
    );
}

#[tokio::test]
async fn scenario_d_resubmit_builds_an_unbroken_chain() {
    let store = MemoryStore::new();
    let svc = service_over(&store);
    let id = pending_story(&svc).await;

    svc.request_transition(id, &admin(), Action::Reject, Some("insufficient detail"))
        .await
        .unwrap();
    let outcome = svc
        .request_transition(id, &owner(), Action::Resubmit, None)
        .await
        .unwrap();
    assert_eq!(outcome.item.status, Status::Pending);

    let history = svc.views().history(id).await.unwrap();
    assert_eq!(
        chain(&history),
        vec![
            (Status::Draft, Status::Pending),
            (Status::Pending, Status::Rejected),
            (Status::Rejected, Status::Pending),
        ]
    );
    assert!(history.windows(2).all(|w| w[0].occurred_at <= w[1].occurred_at));
    assert!(history.windows(2).all(|w| w[0].id < w[1].id));

    let report = svc.views().verify(id).await.unwrap();
    assert_eq!(report.item.version, 3);
}

// ============================================================
// Properties
// ============================================================

#[tokio::test]
async fn status_always_matches_the_latest_record() {
    let store = MemoryStore::new();
    let svc = service_over(&store);
    let item = svc.create(&owner(), story("Bus route podcast")).await.unwrap();

    let steps: Vec<(Actor, Action, Option<&str>)> = vec![
        (owner(), Action::Submit, None),
        (admin(), Action::Reject, Some("needs interviews")),
        (owner(), Action::Resubmit, None),
        (admin(), Action::Reject, Some("still thin")),
        (owner(), Action::Resubmit, None),
        (admin(), Action::Approve, None),
    ];

    for (actor, action, reason) in steps {
        svc.request_transition(item.id, &actor, action, reason).await.unwrap();

        let current = svc.get(item.id).await.unwrap();
        let history = svc.views().history(item.id).await.unwrap();
        assert_eq!(history.last().map(|r| r.to_status), Some(current.status));
        assert_eq!(history.len() as i64, current.version);
        assert!(current.last_transition_at >= current.created_at);
    }
}

#[tokio::test]
async fn no_op_requests_never_append() {
    let store = MemoryStore::new();
    let svc = service_over(&store);
    let id = pending_story(&svc).await;
    svc.request_transition(id, &admin(), Action::Approve, None).await.unwrap();
    let before = store.record_count().await;

    for _ in 0..3 {
        let result = svc.request_transition(id, &admin(), Action::Approve, None).await;
        assert!(matches!(
            result,
            Err(WorkflowError::Rejected(Rejection::NoOp { current: Status::Approved, .. }))
        ));
    }

    // Double-submitted "submit" on an already pending item is a no-op too.
    let other = pending_story(&svc).await;
    let result = svc.request_transition(other, &owner(), Action::Submit, None).await;
    assert!(matches!(result, Err(WorkflowError::Rejected(Rejection::NoOp { .. }))));

    assert_eq!(store.record_count().await, before + 1);
}

#[tokio::test]
async fn student_approve_is_forbidden() {
    let store = MemoryStore::new();
    let svc = service_over(&store);
    let id = pending_story(&svc).await;
    let student = Actor::new(99, Role::Student);

    let err = svc
        .request_transition(id, &student, Action::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Rejected(Rejection::ForbiddenActor { .. })));
    // The message says what is needed, not just "failed".
    assert!(err.to_string().contains("requires the admin or teacher role"));

    // Even the owner cannot approve their own story.
    let own = svc.request_transition(id, &owner(), Action::Approve, None).await;
    assert!(matches!(own, Err(WorkflowError::Rejected(Rejection::ForbiddenActor { .. }))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_approvals_have_exactly_one_winner() {
    let store = MemoryStore::new();
    let id = pending_story(&service_over(&store)).await;
    let before = store.record_count().await;

    // Both requests read the pending item before either writes.
    let gated = store.clone().with_read_barrier(2);
    let svc = service_over(&gated);

    let first_admin = Actor::new(20, Role::Admin);
    let second_admin = Actor::new(21, Role::Admin);

    let a = {
        let svc = svc.clone();
        tokio::spawn(async move {
            svc.request_transition(id, &first_admin, Action::Approve, None).await
        })
    };
    let b = {
        let svc = svc.clone();
        tokio::spawn(async move {
            svc.request_transition(id, &second_admin, Action::Approve, None).await
        })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let losers = results
        .iter()
        .filter(|r| matches!(r, Err(WorkflowError::ConcurrentModification { current: Status::Approved, .. })))
        .count();

    assert_eq!(winners, 1);
    assert_eq!(losers, 1);
    assert_eq!(store.record_count().await, before + 1);
    assert!(svc.views().verify(id).await.is_ok());
}

// ============================================================
// CAS retry behaviour
// ============================================================

/// Wraps a `MemoryStore` and reports a lost CAS for the first `conflicts`
/// status updates, the way a concurrent writer bumping the version would.
struct ConflictingStore {
    inner: MemoryStore,
    conflicts: AtomicU32,
    updates: AtomicU32,
}

impl ConflictingStore {
    fn new(inner: MemoryStore, conflicts: u32) -> Self {
        Self { inner, conflicts: AtomicU32::new(conflicts), updates: AtomicU32::new(0) }
    }
}

#[async_trait]
impl ItemStore for ConflictingStore {
    async fn get(&self, id: Uuid) -> Result<WorkflowItem, StoreError> {
        self.inner.get(id).await
    }

    async fn create(&self, item: NewItem) -> Result<WorkflowItem, StoreError> {
        self.inner.create(item).await
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected_status: Status,
        expected_version: i64,
        new_status: Status,
    ) -> Result<WorkflowItem, StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let conflicted = self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if conflicted {
            return Err(StoreError::Conflict { item_id: id, expected_status, expected_version });
        }
        self.inner.update_status(id, expected_status, expected_version, new_status).await
    }

    async fn list_by_status(&self, status: Status, scope: Scope) -> Result<Vec<WorkflowItem>, StoreError> {
        self.inner.list_by_status(status, scope).await
    }
}

#[tokio::test]
async fn a_single_lost_cas_is_absorbed_by_the_retry() {
    let memory = MemoryStore::new();
    let id = pending_story(&service_over(&memory)).await;

    let flaky = Arc::new(ConflictingStore::new(memory.clone(), 1));
    let svc = WorkflowService::new(flaky.clone(), Arc::new(memory.clone()), ServiceConfig::default());

    let outcome = svc.request_transition(id, &admin(), Action::Approve, None).await.unwrap();
    assert_eq!(outcome.item.status, Status::Approved);
    assert_eq!(flaky.updates.load(Ordering::SeqCst), 2);
    assert_eq!(memory.record_count().await, 2);
}

#[tokio::test]
async fn repeated_conflicts_surface_as_concurrent_modification() {
    let memory = MemoryStore::new();
    let id = pending_story(&service_over(&memory)).await;

    let flaky = Arc::new(ConflictingStore::new(memory.clone(), u32::MAX));
    let svc = WorkflowService::new(flaky.clone(), Arc::new(memory.clone()), ServiceConfig::default());

    let result = svc.request_transition(id, &admin(), Action::Approve, None).await;
    assert!(matches!(
        result,
        Err(WorkflowError::ConcurrentModification { attempts: 2, current: Status::Pending, .. })
    ));
    assert_eq!(flaky.updates.load(Ordering::SeqCst), 2);
    assert_eq!(memory.record_count().await, 1);
}

// ============================================================
// Partial failure and repair
// ============================================================

#[tokio::test]
async fn failed_audit_append_is_a_distinguishable_partial_failure() {
    let store = MemoryStore::new();
    let svc = service_over(&store);
    let id = pending_story(&svc).await;

    store.fail_next_appends(1);
    let err = svc
        .request_transition(id, &admin(), Action::Approve, None)
        .await
        .unwrap_err();
    assert!(err.needs_operator());

    let (item, pending) = match err {
        WorkflowError::PartialFailure { item, pending, .. } => (item, pending),
        other => panic!("expected PartialFailure, got {other:?}"),
    };
    assert_eq!(item.status, Status::Approved);
    assert_eq!(pending.seq, 2);

    // The status moved but the trail did not: verify catches the drift.
    assert!(matches!(
        svc.views().verify(id).await,
        Err(WorkflowError::CorruptHistory { .. })
    ));

    // Repair, twice, to show the append is idempotent.
    let repaired = svc.record_transition(*pending.clone()).await.unwrap();
    let again = svc.record_transition(*pending).await.unwrap();
    assert_eq!(repaired, again);
    assert_eq!(store.record_count().await, 2);
    assert!(svc.views().verify(id).await.is_ok());
}

#[tokio::test]
async fn late_repair_restores_an_unbroken_history() {
    let store = MemoryStore::new();
    let svc = service_over(&store);
    let id = pending_story(&svc).await;

    store.fail_next_appends(1);
    let pending = match svc
        .request_transition(id, &admin(), Action::Reject, Some("needs a source"))
        .await
    {
        Err(WorkflowError::PartialFailure { pending, .. }) => pending,
        other => panic!("expected PartialFailure, got {other:?}"),
    };
    assert_eq!(pending.seq, 2);

    // The owner moves on before anyone reconciles the trail.
    svc.request_transition(id, &owner(), Action::Resubmit, None)
        .await
        .unwrap();
    assert!(matches!(
        svc.views().history(id).await,
        Err(WorkflowError::CorruptHistory { .. })
    ));

    svc.record_transition(*pending).await.unwrap();

    let history = svc.views().history(id).await.unwrap();
    assert_eq!(history.iter().map(|r| r.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(
        chain(&history),
        vec![
            (Status::Draft, Status::Pending),
            (Status::Pending, Status::Rejected),
            (Status::Rejected, Status::Pending),
        ]
    );
    assert_eq!(history[1].reason.as_deref(), Some("needs a source"));

    let report = svc.views().verify(id).await.unwrap();
    assert_eq!(report.item.status, Status::Pending);
    assert_eq!(report.item.version, 3);
}

#[tokio::test]
async fn verify_flags_a_snapshot_that_drifted_from_its_trail() {
    let store = MemoryStore::new();
    let svc = service_over(&store);
    let id = pending_story(&svc).await;
    assert!(svc.views().verify(id).await.is_ok());

    // Same version, different status: the tail no longer matches.
    let mut drifted = svc.get(id).await.unwrap();
    drifted.status = Status::Approved;
    store.force_item(drifted.clone()).await;
    let err = svc.views().verify(id).await.unwrap_err();
    assert!(matches!(err, WorkflowError::CorruptHistory { item_id, .. } if item_id == id));
    assert!(err.to_string().contains("history ends in 'pending'"));

    // Right status, but a version the trail cannot account for.
    drifted.status = Status::Pending;
    drifted.version = 4;
    store.force_item(drifted).await;
    let err = svc.views().verify(id).await.unwrap_err();
    assert!(err.to_string().contains("1 records for an item at version 4"));

    // history only checks the chain itself, which is still intact.
    assert_eq!(svc.views().history(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn store_outage_propagates_unchanged() {
    let store = MemoryStore::new();
    let svc = service_over(&store);
    let id = pending_story(&svc).await;

    store.set_unavailable(true);
    let result = svc.request_transition(id, &admin(), Action::Approve, None).await;
    assert!(matches!(result, Err(WorkflowError::StoreUnavailable(_))));

    store.set_unavailable(false);
    assert_eq!(svc.get(id).await.unwrap().status, Status::Pending);
}

#[tokio::test]
async fn unknown_item_is_not_found() {
    let svc = service_over(&MemoryStore::new());
    let missing = Uuid::new_v4();
    let result = svc.request_transition(missing, &admin(), Action::Approve, None).await;
    assert!(matches!(result, Err(WorkflowError::NotFound(id)) if id == missing));
}

// ============================================================
// Teacher requests
// ============================================================

#[tokio::test]
async fn teacher_requests_are_decided_by_admins_only() {
    let store = MemoryStore::new();
    let svc = service_over(&store);
    let applicant = Actor::new(40, Role::Teacher);

    let request = svc
        .create(
            &applicant,
            CreateItem {
                kind: WorkflowKind::TeacherRequest,
                title: "Ms. Rivera, Lincoln High".into(),
                details: json!({ "school": "Lincoln High" }),
                initial_status: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(request.status, Status::Pending);

    let by_teacher = svc.request_transition(request.id, &applicant, Action::Approve, None).await;
    assert!(matches!(by_teacher, Err(WorkflowError::Rejected(Rejection::ForbiddenActor { .. }))));

    svc.request_transition(request.id, &admin(), Action::Reject, Some("unverified school"))
        .await
        .unwrap();

    // Rejected is terminal for teacher requests.
    let resubmit = svc.request_transition(request.id, &applicant, Action::Resubmit, None).await;
    assert!(matches!(resubmit, Err(WorkflowError::Rejected(Rejection::IllegalTransition { .. }))));
}

#[tokio::test]
async fn create_validates_title_and_initial_status() {
    let svc = service_over(&MemoryStore::new());

    let blank = svc.create(&owner(), story("   ")).await;
    assert!(matches!(blank, Err(WorkflowError::InvalidItem(_))));

    let draft_request = svc
        .create(
            &owner(),
            CreateItem {
                kind: WorkflowKind::TeacherRequest,
                title: "Mr. Okafor".into(),
                details: json!({}),
                initial_status: Some(Status::Draft),
            },
        )
        .await;
    assert!(matches!(draft_request, Err(WorkflowError::InvalidItem(_))));
}

// ============================================================
// Query views
// ============================================================

#[tokio::test]
async fn pending_listing_is_scoped_to_the_caller() {
    let store = MemoryStore::new();
    let svc = service_over(&store);
    let mine = pending_story(&svc).await;

    let other_owner = Actor::new(7, Role::Student);
    let theirs = svc.create(&other_owner, story("Skate park petition")).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    svc.request_transition(theirs.id, &other_owner, Action::Submit, None)
        .await
        .unwrap();

    let views = svc.views();
    let as_owner = views
        .list_by_status(Status::Pending, crate::scope_for_actor(&owner(), WorkflowKind::StoryIdea))
        .await
        .unwrap();
    assert_eq!(as_owner.iter().map(|i| i.id).collect::<Vec<_>>(), vec![mine]);

    let as_admin = views
        .list_by_status(Status::Pending, crate::scope_for_actor(&admin(), WorkflowKind::StoryIdea))
        .await
        .unwrap();
    assert_eq!(as_admin.iter().map(|i| i.id).collect::<Vec<_>>(), vec![theirs.id, mine]);

    // A fresh query reflects the latest state.
    svc.request_transition(mine, &admin(), Action::Approve, None).await.unwrap();
    let refreshed = views
        .list_by_status(Status::Pending, crate::scope_for_actor(&admin(), WorkflowKind::StoryIdea))
        .await
        .unwrap();
    assert_eq!(refreshed.len(), 1);
}

#[tokio::test]
async fn broken_history_fails_loudly() {
    let store = MemoryStore::new();
    let svc = service_over(&store);
    let id = pending_story(&svc).await;

    // A record claiming to leave 'rejected' when the item was 'pending'.
    let item = svc.get(id).await.unwrap();
    store
        .force_record(TransitionRecord {
            id: 0,
            item_id: id,
            seq: 2,
            actor_id: U2,
            from_status: Status::Rejected,
            to_status: Status::Approved,
            reason: None,
            occurred_at: item.last_transition_at,
        })
        .await;

    let result = svc.views().history(id).await;
    assert!(matches!(
        result,
        Err(WorkflowError::CorruptHistory { item_id, .. }) if item_id == id
    ));
}
