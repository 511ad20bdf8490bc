//! Cross-module scenario tests: the full write path over the in-memory
//! store, exercising the fast path, the merge path, conflict rejection,
//! deletion, revert, contributor accounting, and the retry loop.

use crate::error::{ConflictField, Result, WeaveError};
use crate::service::{
    CreateRequest, DeleteRequest, PageService, RevertRequest, ServiceConfig, UpdateRequest,
    WriteOutcome,
};
use crate::store::{Commit, MemoryStore, Storage};
use crate::types::{Author, ChangeKind, Contributor, HistorySnapshot, Page};
use async_trait::async_trait;
use tokio_test::assert_ok;
use std::sync::atomic::{AtomicU32, Ordering};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn alice() -> Author {
    Author::new("alice", "Alice", "alice@example.com")
}

fn bob() -> Author {
    Author::new("bob", "Bob", "bob@example.com")
}

fn service() -> (PageService<MemoryStore>, MemoryStore) {
    let store = MemoryStore::new();
    (PageService::new(store.clone()), store)
}

async fn create_sample(service: &PageService<MemoryStore>, body: &str) -> WriteOutcome {
    service
        .create(CreateRequest {
            title: "Sample Page".to_string(),
            body: body.to_string(),
            tags: vec!["wiki".to_string()],
            author: alice(),
        })
        .await
        .unwrap()
}

fn edit(body: &str, base_version: u64, author: Author) -> UpdateRequest {
    UpdateRequest {
        title: "Sample Page".to_string(),
        body: body.to_string(),
        tags: vec!["wiki".to_string()],
        message: "edit".to_string(),
        base_version,
        author,
        is_minor: false,
    }
}

#[tokio::test]
async fn test_create_seeds_page_history_and_contributor() {
    init_tracing();
    let (service, store) = service();
    let outcome = create_sample(&service, "Hello\nWorld").await;

    assert_eq!(outcome.page.version, 1);
    assert_eq!(outcome.page.latest_version, 1);

    let snapshot = &outcome.snapshot;
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.change_kind, ChangeKind::Create);
    assert_eq!(snapshot.previous_version, None);
    assert!(snapshot.parent_versions.is_empty());
    assert_eq!(snapshot.added_characters, 11);
    assert_eq!(snapshot.removed_characters, 0);
    assert_eq!(snapshot.content_size, 11);
    assert_eq!(snapshot.content_hash.len(), 64);
    assert_eq!(snapshot.added_tags, vec!["wiki"]);

    let contributor = outcome.contributor.unwrap();
    assert_eq!(contributor.lines_added, 11);
    assert_eq!(contributor.lines_removed, 0);
    assert_eq!(store.snapshot_count(&outcome.page.id), 1);
}

#[tokio::test]
async fn test_fast_path_edit_advances_version_and_chains_snapshots() {
    let (service, store) = service();
    let created = create_sample(&service, "Line 1\nLine 2").await;

    let updated = service
        .update(&created.page.id, edit("Line 1\nLine 2 more", 1, alice()))
        .await
        .unwrap();

    assert_eq!(updated.page.version, 2);
    assert_eq!(updated.page.latest_version, 2);
    assert_eq!(updated.page.body, "Line 1\nLine 2 more");
    assert_eq!(
        updated.snapshot.previous_version.as_deref(),
        Some(created.snapshot.id.as_str())
    );
    assert_eq!(
        updated.snapshot.parent_versions,
        vec![created.snapshot.id.clone()]
    );
    assert_eq!(updated.snapshot.added_characters, 5);
    assert_eq!(updated.snapshot.removed_characters, 0);
    assert_eq!(store.snapshot_count(&created.page.id), 2);
}

#[tokio::test]
async fn test_stale_edit_to_unrelated_line_is_merged() {
    init_tracing();
    let (service, _store) = service();
    let created = create_sample(&service, "Line 1\nLine 2\nLine 3\nLine 4\nLine 5").await;
    let page_id = created.page.id.clone();

    // Bob edits line 1 and commits version 2.
    service
        .update(
            &page_id,
            edit("Bob Line 1\nLine 2\nLine 3\nLine 4\nLine 5", 1, bob()),
        )
        .await
        .unwrap();

    // Alice still holds version 1 and edits line 4.
    let merged = service
        .update(
            &page_id,
            edit("Line 1\nLine 2\nLine 3\nAlice Line 4\nLine 5", 1, alice()),
        )
        .await
        .unwrap();

    assert_eq!(merged.page.version, 3);
    assert_eq!(
        merged.page.body,
        "Bob Line 1\nLine 2\nLine 3\nAlice Line 4\nLine 5"
    );
    assert_eq!(merged.snapshot.change_kind, ChangeKind::Edit);
}

#[tokio::test]
async fn test_stale_edit_to_same_line_is_rejected() {
    let (service, store) = service();
    let created = create_sample(&service, "Line 1\nLine 2\nLine 3").await;
    let page_id = created.page.id.clone();

    service
        .update(&page_id, edit("Bob's Line 1\nLine 2\nLine 3", 1, bob()))
        .await
        .unwrap();

    let err = service
        .update(&page_id, edit("Alice's Line 1\nLine 2\nLine 3", 1, alice()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WeaveError::MergeConflict {
            field: ConflictField::Body
        }
    ));
    assert!(err.is_conflict());

    // The rejected write left no partial state behind.
    let page = store.load_page(&page_id).await.unwrap();
    assert_eq!(page.version, 2);
    assert_eq!(page.body, "Bob's Line 1\nLine 2\nLine 3");
    assert_eq!(store.snapshot_count(&page_id), 2);
}

#[tokio::test]
async fn test_stale_title_rename_is_merged() {
    let (service, _store) = service();
    let created = create_sample(&service, "Body").await;
    let page_id = created.page.id.clone();

    let mut rename = edit("Body", 1, bob());
    rename.title = "Renamed Page".to_string();
    service.update(&page_id, rename).await.unwrap();

    // Alice edits the body against version 1; Bob's rename survives.
    let merged = service
        .update(&page_id, edit("Body edited", 1, alice()))
        .await
        .unwrap();
    assert_eq!(merged.page.title, "Renamed Page");
    assert_eq!(merged.page.body, "Body edited");
}

#[tokio::test]
async fn test_delete_clears_content_and_keeps_history() {
    let (service, store) = service();
    let created = create_sample(&service, "Line 1\nLine 2").await;
    let page_id = created.page.id.clone();

    let deleted = service
        .delete(
            &page_id,
            DeleteRequest {
                message: "obsolete".to_string(),
                base_version: 1,
                author: alice(),
            },
        )
        .await
        .unwrap();

    assert_eq!(deleted.page.version, 2);
    assert_eq!(deleted.page.body, "");
    assert!(deleted.page.tags.is_empty());
    assert_eq!(deleted.snapshot.change_kind, ChangeKind::Delete);
    assert_eq!(deleted.snapshot.removed_tags, vec!["wiki"]);
    assert_eq!(deleted.snapshot.removed_characters, 13);
    // History is preserved, not erased.
    assert_eq!(store.snapshot_count(&page_id), 2);
    assert!(store.load_snapshot_at(&page_id, 1).await.is_ok());
}

#[tokio::test]
async fn test_stale_delete_does_not_beat_concurrent_modification() {
    let (service, _store) = service();
    let created = create_sample(&service, "Line 1\nLine 2").await;
    let page_id = created.page.id.clone();

    service
        .update(&page_id, edit("Line 1 rewritten\nLine 2", 1, bob()))
        .await
        .unwrap();

    // Alice's delete is based on version 1, but Bob modified the body since.
    let err = service
        .delete(
            &page_id,
            DeleteRequest {
                message: "obsolete".to_string(),
                base_version: 1,
                author: alice(),
            },
        )
        .await
        .unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_revert_writes_old_content_as_new_version() {
    let (service, _store) = service();
    let created = create_sample(&service, "Original body").await;
    let page_id = created.page.id.clone();

    service
        .update(&page_id, edit("Changed body", 1, bob()))
        .await
        .unwrap();

    let reverted = service
        .revert(
            &page_id,
            RevertRequest {
                version: 1,
                author: alice(),
            },
        )
        .await
        .unwrap();

    assert_eq!(reverted.page.version, 3);
    assert_eq!(reverted.page.latest_version, 3);
    assert_eq!(reverted.page.body, "Original body");
    assert_eq!(reverted.snapshot.change_kind, ChangeKind::Revert);
    assert_eq!(reverted.snapshot.change_message, "Revert to version 1");
    assert!(reverted.contributor.is_some());
}

#[tokio::test]
async fn test_revert_to_current_version_is_a_noop() {
    let (service, store) = service();
    let created = create_sample(&service, "Body").await;
    let page_id = created.page.id.clone();

    let outcome = service
        .revert(
            &page_id,
            RevertRequest {
                version: 1,
                author: bob(),
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.page.version, 1);
    assert_eq!(outcome.snapshot.id, created.snapshot.id);
    assert!(outcome.contributor.is_none());
    assert_eq!(store.snapshot_count(&page_id), 1);
}

#[tokio::test]
async fn test_contributor_counts_accumulate_per_author() {
    let (service, store) = service();
    let created = create_sample(&service, "12345").await;
    let page_id = created.page.id.clone();

    // Alice appends five characters twice; Bob appends two once.
    service
        .update(&page_id, edit("1234567890", 1, alice()))
        .await
        .unwrap();
    service
        .update(&page_id, edit("123456789012345", 2, alice()))
        .await
        .unwrap();
    service
        .update(&page_id, edit("12345678901234567", 3, bob()))
        .await
        .unwrap();

    let alice_record = store
        .load_contributor(&page_id, "alice")
        .await
        .unwrap()
        .unwrap();
    // 5 from create, then 5 + 5 from the two edits.
    assert_eq!(alice_record.lines_added, 15);

    let bob_record = store
        .load_contributor(&page_id, "bob")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bob_record.lines_added, 2);
    assert!(bob_record.first_contributed_at <= bob_record.contributed_at);
}

#[tokio::test]
async fn test_missing_page_and_snapshot_are_not_found() {
    let (service, _store) = service();
    let err = service
        .update("missing-page", edit("x", 1, alice()))
        .await
        .unwrap_err();
    assert!(matches!(err, WeaveError::NotFound { entity: "page", .. }));

    let created = create_sample(&service, "Body").await;
    let err = service
        .update(&created.page.id, edit("x", 9, alice()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WeaveError::NotFound {
            entity: "snapshot",
            ..
        }
    ));
}

#[tokio::test]
async fn test_snapshot_diff_against_previous_version() {
    let (service, _store) = service();
    let created = create_sample(&service, "Line 1\nLine 2").await;
    let page_id = created.page.id.clone();

    let updated = service
        .update(&page_id, edit("Line 1\nLine 2 and more", 1, alice()))
        .await
        .unwrap();

    let diff = service.snapshot_diff(&updated.snapshot.id).await.unwrap();
    assert_eq!(diff.added, 9);
    assert_eq!(diff.removed, 0);
    assert_eq!(diff.changed_lines.len(), 1);
    assert_eq!(diff.changed_lines[0].line, 1);

    // The first snapshot diffs against the empty string.
    let initial = service.snapshot_diff(&created.snapshot.id).await.unwrap();
    assert_eq!(initial.added, 13);
    assert_eq!(initial.removed, 0);
}

#[tokio::test]
async fn test_snapshot_serialization_round_trip() {
    let (service, _store) = service();
    let created = create_sample(&service, "Body").await;

    let json = serde_json::to_value(&created.snapshot).unwrap();
    assert_eq!(json["change_kind"], "create");
    let back: HistorySnapshot = serde_json::from_value(json).unwrap();
    assert_eq!(back.id, created.snapshot.id);
    assert_eq!(back.change_kind, ChangeKind::Create);
}

/// Storage wrapper that loses the version race a configured number of times
/// before letting commits through.
struct RacyStore {
    inner: MemoryStore,
    remaining_races: AtomicU32,
}

impl RacyStore {
    fn new(inner: MemoryStore, races: u32) -> Self {
        RacyStore {
            inner,
            remaining_races: AtomicU32::new(races),
        }
    }
}

#[async_trait]
impl Storage for RacyStore {
    async fn load_page(&self, page_id: &str) -> Result<Page> {
        self.inner.load_page(page_id).await
    }

    async fn load_snapshot(&self, snapshot_id: &str) -> Result<HistorySnapshot> {
        self.inner.load_snapshot(snapshot_id).await
    }

    async fn load_snapshot_at(&self, page_id: &str, version: u64) -> Result<HistorySnapshot> {
        self.inner.load_snapshot_at(page_id, version).await
    }

    async fn load_latest_snapshot(&self, page_id: &str) -> Result<HistorySnapshot> {
        self.inner.load_latest_snapshot(page_id).await
    }

    async fn load_contributor(
        &self,
        page_id: &str,
        contributor_id: &str,
    ) -> Result<Option<Contributor>> {
        self.inner.load_contributor(page_id, contributor_id).await
    }

    async fn commit(&self, commit: Commit) -> Result<()> {
        let remaining = self.remaining_races.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_races.store(remaining - 1, Ordering::SeqCst);
            return Err(WeaveError::StaleVersion {
                expected: commit.page.version.saturating_sub(1),
                found: commit.page.version,
            });
        }
        self.inner.commit(commit).await
    }
}

#[tokio::test]
async fn test_lost_version_race_is_retried() {
    init_tracing();
    let store = MemoryStore::new();
    let setup = PageService::new(store.clone());
    let created = create_sample(&setup, "Body").await;

    // Two lost races, then success: within the retry budget.
    let racy = PageService::new(RacyStore::new(store.clone(), 2));
    let outcome = tokio_test::assert_ok!(
        racy.update(&created.page.id, edit("Body updated", 1, alice()))
            .await
    );
    assert_eq!(outcome.page.version, 2);
}

#[tokio::test]
async fn test_exhausted_retries_surface_as_conflict() {
    let store = MemoryStore::new();
    let setup = PageService::new(store.clone());
    let created = create_sample(&setup, "Body").await;

    let racy = PageService::with_config(
        RacyStore::new(store.clone(), u32::MAX),
        ServiceConfig {
            max_commit_attempts: 3,
        },
    );
    let err = racy
        .update(&created.page.id, edit("Body updated", 1, alice()))
        .await
        .unwrap_err();
    assert!(matches!(err, WeaveError::StaleVersion { .. }));
    assert!(err.is_conflict());

    // Nothing was persisted.
    let page = store.load_page(&created.page.id).await.unwrap();
    assert_eq!(page.version, 1);
    assert_eq!(page.body, "Body");
}
