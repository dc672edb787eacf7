//! Integration tests for the Budget Tracker bootstrap
//!
//! These tests run the complete procedure against the in-memory backend.

use std::time::Duration;

use bson::doc;
use chrono::Utc;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

use budget_tracker_bootstrap::bootstrap::{seed_filter, StepStatus};
use budget_tracker_bootstrap::db::memory::{InjectedFailure, Operation};
use budget_tracker_bootstrap::db::schema::{
    ExistingIndex, RoleGrant, BACKUPS, NOTIFICATIONS, NOTIFICATIONS_BY_TYPE_STATUS, NOTIFICATIONS_BY_USER,
};
use budget_tracker_bootstrap::models::{Notification, NotificationStatus};
use budget_tracker_bootstrap::{
    AdminBackend, BootstrapError, BootstrapPlan, BootstrapReport, Bootstrapper, MemoryBackend,
    Step, StepFailure,
};

const TEST_DATABASE: &str = "budget_tracker";
const TEST_USER: &str = "budget_user";
const TEST_PASSWORD: &str = "test-password";

// =============================================================================
// Test Helpers
// =============================================================================

fn test_plan() -> BootstrapPlan {
    BootstrapPlan::new(TEST_DATABASE, TEST_USER, TEST_PASSWORD)
}

async fn run_bootstrap(backend: &MemoryBackend) -> Result<BootstrapReport, StepFailure> {
    let plan = test_plan();
    Bootstrapper::new(backend, &plan).run(Utc::now()).await
}

async fn index_names(backend: &MemoryBackend, collection: &str) -> Vec<String> {
    assert_ok!(backend.list_indexes(collection).await)
        .into_iter()
        .map(|index| index.name)
        .collect()
}

async fn unread_system_notifications(backend: &MemoryBackend) -> u64 {
    assert_ok!(
        backend
            .count_documents("notifications", doc! { "type": "SYSTEM", "status": "UNREAD" })
            .await
    )
}

// =============================================================================
// Fresh Server Tests
// =============================================================================

#[tokio::test]
async fn test_fresh_server_applies_every_step() {
    let backend = MemoryBackend::new(TEST_DATABASE);

    let report = assert_ok!(run_bootstrap(&backend).await);

    assert_eq!(report.database, TEST_DATABASE);
    assert_eq!(report.steps.len(), 9);
    assert_eq!(report.applied(), 9);
    assert_eq!(report.skipped(), 0);
}

#[tokio::test]
async fn test_fresh_server_creates_user_with_read_write_only() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    assert_ok!(run_bootstrap(&backend).await);

    let roles = assert_ok!(backend.user_roles(TEST_USER).await).expect("user should exist");

    assert_eq!(backend.user_count().await, 1);
    assert_eq!(
        roles,
        vec![RoleGrant {
            role: "readWrite".to_string(),
            db: TEST_DATABASE.to_string(),
        }]
    );
}

#[tokio::test]
async fn test_fresh_server_creates_collections_and_indexes() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    assert_ok!(run_bootstrap(&backend).await);

    let collections = assert_ok!(backend.list_collections().await);
    assert_eq!(collections, vec!["backups", "notifications"]);

    assert_eq!(
        index_names(&backend, "notifications").await,
        vec!["_id_", "userId_1_createdAt_-1", "type_1_status_1"]
    );
    assert_eq!(
        index_names(&backend, "backups").await,
        vec!["_id_", "userId_1_createdAt_-1", "status_1"]
    );
}

#[tokio::test]
async fn test_recency_index_keys_are_user_then_created_desc() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    assert_ok!(run_bootstrap(&backend).await);

    let indexes = assert_ok!(backend.list_indexes("notifications").await);
    let recency = indexes
        .iter()
        .find(|index| index.name == "userId_1_createdAt_-1")
        .expect("recency index should exist");

    let fields: Vec<&str> = recency.keys.keys().map(String::as_str).collect();
    assert_eq!(fields, vec!["userId", "createdAt"]);
    assert_eq!(recency.keys.get_i32("createdAt").unwrap(), -1);
}

#[tokio::test]
async fn test_fresh_server_seeds_exactly_one_welcome() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    assert_ok!(run_bootstrap(&backend).await);

    assert_eq!(unread_system_notifications(&backend).await, 1);

    let documents = backend.documents("notifications").await;
    assert_eq!(documents.len(), 1);

    let welcome: Notification = assert_ok!(bson::from_document(documents[0].clone()));
    assert!(welcome.is_system());
    assert_eq!(welcome.status, NotificationStatus::Unread);
    assert_eq!(welcome.title, "Welcome to Budget Tracker");
    assert_eq!(welcome.created_at, welcome.updated_at);
    assert!(welcome.id.is_some());
}

// =============================================================================
// Re-run Tests
// =============================================================================

#[tokio::test]
async fn test_second_run_skips_duplicates() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    assert_ok!(run_bootstrap(&backend).await);

    let report = assert_ok!(run_bootstrap(&backend).await);

    assert_eq!(report.status_of(&Step::SelectDatabase), Some(StepStatus::Applied));
    assert_eq!(report.status_of(&Step::CreateUser), Some(StepStatus::Skipped));
    assert_eq!(
        report.status_of(&Step::CreateCollection(&NOTIFICATIONS)),
        Some(StepStatus::Skipped)
    );
    assert_eq!(
        report.status_of(&Step::CreateCollection(&BACKUPS)),
        Some(StepStatus::Skipped)
    );
    // Identical indexes are a no-op on the server
    assert_eq!(
        report.status_of(&Step::CreateIndex(&NOTIFICATIONS, &NOTIFICATIONS_BY_USER)),
        Some(StepStatus::Applied)
    );
    assert_eq!(report.status_of(&Step::InsertSeed), Some(StepStatus::Skipped));
}

#[tokio::test]
async fn test_second_run_does_not_duplicate_welcome() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    assert_ok!(run_bootstrap(&backend).await);
    assert_ok!(run_bootstrap(&backend).await);

    assert_eq!(unread_system_notifications(&backend).await, 1);
    assert_eq!(backend.user_count().await, 1);
}

#[tokio::test]
async fn test_read_welcome_is_not_reseeded() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    let mut welcome = Notification::welcome(Utc::now());
    welcome.mark_read(Utc::now());
    assert_ok!(
        backend
            .insert_document("notifications", bson::to_document(&welcome).unwrap())
            .await
    );

    let report = assert_ok!(run_bootstrap(&backend).await);

    assert_eq!(report.status_of(&Step::InsertSeed), Some(StepStatus::Skipped));
    assert_eq!(
        assert_ok!(backend.count_documents("notifications", seed_filter()).await),
        1
    );
    assert_eq!(unread_system_notifications(&backend).await, 0);
}

#[tokio::test]
async fn test_preexisting_collection_is_skipped_and_run_continues() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    assert_ok!(backend.create_collection("backups").await);

    let report = assert_ok!(run_bootstrap(&backend).await);

    assert_eq!(
        report.status_of(&Step::CreateCollection(&BACKUPS)),
        Some(StepStatus::Skipped)
    );
    assert_eq!(report.skipped(), 1);
    assert_eq!(index_names(&backend, "backups").await.len(), 3);
}

#[tokio::test]
async fn test_index_with_same_keys_under_other_name_is_skipped() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    backend
        .insert_index(
            "notifications",
            ExistingIndex {
                name: "by_user_recent".to_string(),
                keys: doc! { "userId": 1, "createdAt": -1 },
            },
        )
        .await;

    let report = assert_ok!(run_bootstrap(&backend).await);

    assert_eq!(
        report.status_of(&Step::CreateIndex(&NOTIFICATIONS, &NOTIFICATIONS_BY_USER)),
        Some(StepStatus::Skipped)
    );
    assert_eq!(
        report.status_of(&Step::CreateIndex(&NOTIFICATIONS, &NOTIFICATIONS_BY_TYPE_STATUS)),
        Some(StepStatus::Applied)
    );
    assert_eq!(report.status_of(&Step::InsertSeed), Some(StepStatus::Applied));

    let names = index_names(&backend, "notifications").await;
    assert!(names.contains(&"by_user_recent".to_string()));
    assert!(!names.contains(&"userId_1_createdAt_-1".to_string()));

    let plan = test_plan();
    let verify = assert_ok!(Bootstrapper::new(&backend, &plan).verify().await);
    assert_eq!(
        verify.missing,
        vec!["index notifications.userId_1_createdAt_-1"]
    );
}

// =============================================================================
// Fatal Error Tests
// =============================================================================

#[tokio::test]
async fn test_stalled_step_times_out_at_that_step() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    backend
        .inject_failure(Operation::CreateCollection, InjectedFailure::Stall)
        .await;
    let plan = test_plan();
    let limit = Duration::from_millis(50);

    let failure = assert_err!(
        Bootstrapper::new(&backend, &plan)
            .with_deadline(Instant::now() + limit, limit)
            .run(Utc::now())
            .await
    );

    assert_eq!(failure.step, Step::CreateCollection(&NOTIFICATIONS));
    assert!(matches!(failure.error, BootstrapError::Timeout(d) if d == limit));
    // select database, create user
    assert_eq!(failure.report.applied(), 2);
    assert_eq!(backend.user_count().await, 1);
}

#[tokio::test]
async fn test_deadline_not_reached_completes_run() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    let plan = test_plan();
    let limit = Duration::from_secs(5);

    let report = assert_ok!(
        Bootstrapper::new(&backend, &plan)
            .with_deadline(Instant::now() + limit, limit)
            .run(Utc::now())
            .await
    );

    assert_eq!(report.applied(), 9);
}

#[tokio::test]
async fn test_backend_for_other_database_is_rejected() {
    let backend = MemoryBackend::new("budget_staging");
    let plan = test_plan();

    let failure = assert_err!(Bootstrapper::new(&backend, &plan).run(Utc::now()).await);

    assert_eq!(failure.step, Step::SelectDatabase);
    assert!(matches!(
        failure.error,
        BootstrapError::DatabaseMismatch { ref backend, ref plan }
            if backend == "budget_staging" && plan == TEST_DATABASE
    ));
    assert!(failure.report.steps.is_empty());
    assert_eq!(backend.user_count().await, 0);
    assert!(assert_ok!(backend.list_collections().await).is_empty());

    let err = assert_err!(Bootstrapper::new(&backend, &plan).verify().await);
    assert!(matches!(err, BootstrapError::DatabaseMismatch { .. }));
}

#[tokio::test]
async fn test_unreachable_server_halts_before_any_change() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    backend
        .inject_failure(Operation::Ping, InjectedFailure::Connection)
        .await;

    let failure = assert_err!(run_bootstrap(&backend).await);

    assert_eq!(failure.step, Step::SelectDatabase);
    assert!(matches!(failure.error, BootstrapError::ConnectionFailure(_)));
    assert!(failure.report.steps.is_empty());
    assert_eq!(backend.user_count().await, 0);
}

#[tokio::test]
async fn test_connection_loss_aborts_remaining_steps() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    backend
        .inject_failure(Operation::CreateUser, InjectedFailure::Connection)
        .await;

    let failure = assert_err!(run_bootstrap(&backend).await);

    assert_eq!(failure.step, Step::CreateUser);
    assert!(failure.error.is_fatal());
    assert_eq!(failure.report.steps.len(), 1);
    assert!(failure.to_string().contains("create user"));

    backend.clear_failures().await;
    assert!(assert_ok!(backend.list_collections().await).is_empty());
    assert!(backend.documents("notifications").await.is_empty());
}

#[tokio::test]
async fn test_permission_denied_reports_failing_step() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    backend
        .inject_failure(Operation::CreateIndex, InjectedFailure::PermissionDenied)
        .await;

    let failure = assert_err!(run_bootstrap(&backend).await);

    assert_eq!(
        failure.step,
        Step::CreateIndex(&NOTIFICATIONS, &NOTIFICATIONS_BY_USER)
    );
    assert!(matches!(failure.error, BootstrapError::PermissionDenied(_)));
    // select database, create user, create collection notifications
    assert_eq!(failure.report.applied(), 3);
}

#[tokio::test]
async fn test_rerun_after_fixing_failure_completes() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    backend
        .inject_failure(Operation::InsertDocument, InjectedFailure::Connection)
        .await;
    let failure = assert_err!(run_bootstrap(&backend).await);
    assert_eq!(failure.step, Step::InsertSeed);

    backend.clear_failures().await;
    let report = assert_ok!(run_bootstrap(&backend).await);

    assert_eq!(report.status_of(&Step::InsertSeed), Some(StepStatus::Applied));
    assert_eq!(unread_system_notifications(&backend).await, 1);
}

// =============================================================================
// Verify Tests
// =============================================================================

#[tokio::test]
async fn test_verify_fresh_server_reports_everything_missing() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    let plan = test_plan();

    let report = assert_ok!(Bootstrapper::new(&backend, &plan).verify().await);

    assert!(!report.is_complete());
    assert_eq!(
        report.missing,
        vec![
            "user budget_user",
            "collection notifications",
            "collection backups",
            "welcome notification",
        ]
    );
}

#[tokio::test]
async fn test_verify_after_bootstrap_is_complete() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    assert_ok!(run_bootstrap(&backend).await);
    let plan = test_plan();

    let report = assert_ok!(Bootstrapper::new(&backend, &plan).verify().await);

    assert!(report.is_complete(), "missing: {:?}", report.missing);
}

#[tokio::test]
async fn test_verify_detects_missing_index() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    assert_ok!(backend.create_collection("notifications").await);
    assert_ok!(
        backend
            .create_index("notifications", &NOTIFICATIONS_BY_TYPE_STATUS)
            .await
    );
    let plan = test_plan();

    let report = assert_ok!(Bootstrapper::new(&backend, &plan).verify().await);

    assert!(report
        .missing
        .contains(&"index notifications.userId_1_createdAt_-1".to_string()));
    assert!(!report
        .missing
        .contains(&"index notifications.type_1_status_1".to_string()));
}

#[tokio::test]
async fn test_verify_detects_extra_role() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    let mut plan = test_plan();
    plan.user.roles.push(RoleGrant {
        role: "dbAdmin".to_string(),
        db: TEST_DATABASE.to_string(),
    });
    assert_ok!(Bootstrapper::new(&backend, &plan).run(Utc::now()).await);

    let report = assert_ok!(Bootstrapper::new(&backend, &test_plan()).verify().await);

    assert_eq!(report.missing.len(), 1);
    assert!(report.missing[0].starts_with("user budget_user role grant"));
}

#[tokio::test]
async fn test_verify_propagates_connection_failure() {
    let backend = MemoryBackend::new(TEST_DATABASE);
    backend
        .inject_failure(Operation::ListCollections, InjectedFailure::Connection)
        .await;
    let plan = test_plan();

    let err = assert_err!(Bootstrapper::new(&backend, &plan).verify().await);

    assert!(matches!(err, BootstrapError::ConnectionFailure(_)));
}
