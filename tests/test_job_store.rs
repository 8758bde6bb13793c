//! Job store lifecycle, merge, and retention behavior

use std::collections::BTreeMap;
use std::time::Duration;

use uuid::Uuid;

use vigil::domain::entities::{AggregatedReport, SeverityCounts, TechnologyProfile};
use vigil::domain::value_objects::{Grade, ScanPhase, ScanStatus};
use vigil::infrastructure::job_store::{
    InMemoryScanJobStore, JobStoreError, ScanJobStore, ScanUpdate,
};

fn empty_report(target: &str) -> AggregatedReport {
    AggregatedReport {
        target_url: target.to_string(),
        scanned_at: chrono::Utc::now(),
        score: 100,
        grade: Grade::A,
        severity_counts: SeverityCounts::default(),
        total_issues: 0,
        findings: vec![],
        technology: TechnologyProfile::default(),
        probe_errors: BTreeMap::new(),
    }
}

#[tokio::test]
async fn create_initializes_queued_at_zero() {
    let store = InMemoryScanJobStore::new(Duration::from_secs(600));
    let job = store
        .create("https://example.com/".into(), "example.com".into())
        .await;

    let fetched = store.get(job.scan_id).await.unwrap();
    assert_eq!(fetched.status, ScanStatus::Queued);
    assert_eq!(fetched.phase, ScanPhase::Start);
    assert_eq!(fetched.progress_percent, 0);
}

#[tokio::test]
async fn get_unknown_id_is_not_found() {
    let store = InMemoryScanJobStore::new(Duration::from_secs(600));
    let result = store.get(Uuid::new_v4()).await;
    assert!(matches!(result, Err(JobStoreError::NotFound(_))));
}

#[tokio::test]
async fn progress_is_monotonic_under_out_of_order_updates() {
    let store = InMemoryScanJobStore::new(Duration::from_secs(600));
    let job = store
        .create("https://example.com/".into(), "example.com".into())
        .await;
    store.start(job.scan_id).await.unwrap();

    // Parallel-phase completions can land in any order.
    for percent in [48, 85, 66, 30] {
        store
            .update(job.scan_id, ScanUpdate::progress(percent))
            .await
            .unwrap();
    }

    let fetched = store.get(job.scan_id).await.unwrap();
    assert_eq!(fetched.progress_percent, 85);
}

#[tokio::test]
async fn update_merges_fields_without_losing_others() {
    let store = InMemoryScanJobStore::new(Duration::from_secs(600));
    let job = store
        .create("https://example.com/".into(), "example.com".into())
        .await;
    store.start(job.scan_id).await.unwrap();

    store
        .update(job.scan_id, ScanUpdate::phase(ScanPhase::ParallelScans))
        .await
        .unwrap();
    // A progress-only update must not clobber the phase.
    store
        .update(job.scan_id, ScanUpdate::progress(40))
        .await
        .unwrap();

    let fetched = store.get(job.scan_id).await.unwrap();
    assert_eq!(fetched.phase, ScanPhase::ParallelScans);
    assert_eq!(fetched.progress_percent, 40);
}

#[tokio::test]
async fn complete_attaches_report_and_finishes_progress() {
    let store = InMemoryScanJobStore::new(Duration::from_secs(600));
    let job = store
        .create("https://example.com/".into(), "example.com".into())
        .await;
    store.start(job.scan_id).await.unwrap();
    store
        .complete(job.scan_id, empty_report("https://example.com/"))
        .await
        .unwrap();

    let fetched = store.get(job.scan_id).await.unwrap();
    assert_eq!(fetched.status, ScanStatus::Completed);
    assert_eq!(fetched.progress_percent, 100);
    assert_eq!(fetched.phase, ScanPhase::Done);
    assert!(fetched.report.is_some());
    assert!(fetched.completed_at.is_some());
}

#[tokio::test]
async fn fail_records_the_error_message() {
    let store = InMemoryScanJobStore::new(Duration::from_secs(600));
    let job = store
        .create("https://example.com/".into(), "example.com".into())
        .await;
    store.start(job.scan_id).await.unwrap();
    store
        .fail(job.scan_id, "aggregation blew up".into())
        .await
        .unwrap();

    let fetched = store.get(job.scan_id).await.unwrap();
    assert_eq!(fetched.status, ScanStatus::Failed);
    assert_eq!(fetched.error.as_deref(), Some("aggregation blew up"));
}

#[tokio::test]
async fn reject_is_only_reachable_from_queued() {
    let store = InMemoryScanJobStore::new(Duration::from_secs(600));
    let job = store
        .create("https://example.com/".into(), "example.com".into())
        .await;
    store
        .reject(job.scan_id, "target resolves to a private range".into())
        .await
        .unwrap();

    let fetched = store.get(job.scan_id).await.unwrap();
    assert_eq!(fetched.status, ScanStatus::Rejected);

    // Terminal: no further transitions are accepted.
    assert!(store.start(job.scan_id).await.is_err());
    assert!(store.fail(job.scan_id, "late".into()).await.is_err());
}

#[tokio::test]
async fn terminal_jobs_expire_after_the_retention_window() {
    let store = InMemoryScanJobStore::new(Duration::from_millis(20));
    let job = store
        .create("https://example.com/".into(), "example.com".into())
        .await;
    store.start(job.scan_id).await.unwrap();
    store
        .complete(job.scan_id, empty_report("https://example.com/"))
        .await
        .unwrap();

    assert!(store.get(job.scan_id).await.is_ok());

    tokio::time::sleep(Duration::from_millis(60)).await;

    // Expired on read even before the sweeper runs.
    assert!(matches!(
        store.get(job.scan_id).await,
        Err(JobStoreError::NotFound(_))
    ));

    // The sweep physically removes it.
    assert_eq!(store.sweep().await, 1);
    assert_eq!(store.sweep().await, 0);
}

#[tokio::test]
async fn running_jobs_never_expire() {
    let store = InMemoryScanJobStore::new(Duration::from_millis(10));
    let job = store
        .create("https://example.com/".into(), "example.com".into())
        .await;
    store.start(job.scan_id).await.unwrap();

    tokio::time::sleep(Duration::from_millis(40)).await;

    assert!(store.get(job.scan_id).await.is_ok());
    assert_eq!(store.sweep().await, 0);
    assert_eq!(store.active_count().await, 1);
}
