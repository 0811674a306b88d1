//! Cascade delete against a real SQLite pool and a filesystem blob store.
//!
//! Tests cover:
//! - Step order for a comic with several chapters
//! - Rows written before storage keys were recorded
//! - Blob failures that must not stop the pipeline
//! - Row failures that must stop it
//! - Chapter-only deletes

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;

use comicshelf::admin::{self, NewComicForm, Upload};
use comicshelf::blobs::{BlobError, BlobStore, Bucket, FsBlobStore};
use comicshelf::cascade::{CascadeDeleter, CascadeStep};
use comicshelf::content::{ContentError, ContentRepository, SqliteContentRepository};
use comicshelf::db;
use comicshelf::db::models::*;

const BASE: &str = "http://test.local";

fn setup() -> (TempDir, SqliteContentRepository, FsBlobStore) {
    let temp_dir = TempDir::new().unwrap();
    let pool = db::memory_pool().expect("Failed to create pool");
    db::run_migrations(&pool).expect("Failed to run migrations");
    let blobs = FsBlobStore::new(temp_dir.path().join("blobs"), BASE);
    (temp_dir, SqliteContentRepository::new(pool), blobs)
}

fn png(name: &str) -> Upload {
    Upload::new(name, Bytes::from_static(b"\x89PNG fake"))
}

/// A comic with a cover and two chapters of two pages each.
async fn seed(repo: &dyn ContentRepository, blobs: &dyn BlobStore) -> (Comic, Vec<Chapter>) {
    let comic = admin::create_comic(
        repo,
        blobs,
        NewComicForm {
            title: "Night Shift".into(),
            genres: "horror".into(),
            cover: Some(png("cover.png")),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let mut chapters = Vec::new();
    for n in 1..=2 {
        let (chapter, _) = admin::create_chapter(
            repo,
            blobs,
            &comic.id,
            &format!("Chapter {}", n),
            n,
            vec![png("a.png"), png("b.png")],
        )
        .await
        .unwrap();
        chapters.push(chapter);
    }
    (comic, chapters)
}

fn blob_exists(root: &Path, bucket: Bucket, key: &str) -> bool {
    root.join(bucket.as_str()).join(key).exists()
}

fn step_names(steps: &[CascadeStep]) -> Vec<&'static str> {
    steps
        .iter()
        .map(|s| match s {
            CascadeStep::ListedChapters { .. } => "listed_chapters",
            CascadeStep::ListedPages { .. } => "listed_pages",
            CascadeStep::RemovedBlobs { .. } => "removed_blobs",
            CascadeStep::BlobSkipped { .. } => "blob_skipped",
            CascadeStep::DeletedPages { .. } => "deleted_pages",
            CascadeStep::DeletedChapters { .. } => "deleted_chapters",
            CascadeStep::DeletedChapter { .. } => "deleted_chapter",
            CascadeStep::DeletedComic { .. } => "deleted_comic",
        })
        .collect()
}

// ============================================================================
// COMIC CASCADE
// ============================================================================

#[tokio::test]
async fn comic_cascade_removes_everything_in_order() {
    let (_tmp, repo, blobs) = setup();
    let (comic, chapters) = seed(&repo, &blobs).await;

    let mut page_keys = Vec::new();
    for chapter in &chapters {
        for page in repo.list_pages(&chapter.id).await.unwrap() {
            page_keys.push(page.image_key.unwrap());
        }
    }
    let cover_key = comic.cover_key.clone().unwrap();
    assert!(blob_exists(blobs.root(), Bucket::Covers, &cover_key));

    let report = CascadeDeleter::new(&repo, &blobs)
        .delete_comic(&comic.id)
        .await
        .unwrap();

    assert!(report.is_clean(), "unexpected failures: {:?}", report.failures);
    assert_eq!(report.deleted_comic.as_deref(), Some(comic.id.as_str()));
    assert_eq!(
        step_names(&report.steps),
        vec![
            "listed_chapters",
            "listed_pages",
            "removed_blobs",
            "deleted_pages",
            "listed_pages",
            "removed_blobs",
            "deleted_pages",
            "deleted_chapters",
            "removed_blobs",
            "deleted_comic",
        ]
    );
    assert_eq!(
        report.steps[8],
        CascadeStep::RemovedBlobs {
            bucket: Bucket::Covers,
            keys: vec![cover_key.clone()],
        }
    );

    assert!(repo.get_comic(&comic.id).await.unwrap().is_none());
    for chapter in &chapters {
        assert!(repo.get_chapter(&chapter.id).await.unwrap().is_none());
        assert!(repo.list_pages(&chapter.id).await.unwrap().is_empty());
    }
    assert!(!blob_exists(blobs.root(), Bucket::Covers, &cover_key));
    for key in &page_keys {
        assert!(!blob_exists(blobs.root(), Bucket::Pages, key));
    }
}

#[tokio::test]
async fn comic_without_chapters_or_cover() {
    let (_tmp, repo, blobs) = setup();
    let comic = repo
        .insert_comic(NewComic {
            title: "Empty".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let report = CascadeDeleter::new(&repo, &blobs)
        .delete_comic(&comic.id)
        .await
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(
        step_names(&report.steps),
        vec!["listed_chapters", "deleted_chapters", "deleted_comic"]
    );
}

#[tokio::test]
async fn missing_comic_is_not_found() {
    let (_tmp, repo, blobs) = setup();
    let result = CascadeDeleter::new(&repo, &blobs)
        .delete_comic("does-not-exist")
        .await;
    assert!(matches!(result, Err(ContentError::NotFound(_))));
}

// ============================================================================
// LEGACY ROWS (URL ONLY)
// ============================================================================

#[tokio::test]
async fn legacy_page_url_with_marker_still_removes_blob() {
    let (_tmp, repo, blobs) = setup();
    let comic = repo
        .insert_comic(NewComic {
            title: "Old".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let chapter = repo
        .insert_chapter(NewChapter {
            comic_id: comic.id.clone(),
            title: "One".into(),
            chapter_number: 1,
        })
        .await
        .unwrap();

    let key = format!("{}/old.png", chapter.id);
    blobs
        .upload(Bucket::Pages, &key, Bytes::from_static(b"img"))
        .await
        .unwrap();
    repo.insert_page(NewPage {
        chapter_id: chapter.id.clone(),
        image_url: blobs.public_url(Bucket::Pages, &key),
        image_key: None,
        page_number: 1,
    })
    .await
    .unwrap();

    let report = CascadeDeleter::new(&repo, &blobs)
        .delete_comic(&comic.id)
        .await
        .unwrap();

    assert!(report.is_clean());
    assert!(report.steps.contains(&CascadeStep::RemovedBlobs {
        bucket: Bucket::Pages,
        keys: vec![key.clone()],
    }));
    assert!(!blob_exists(blobs.root(), Bucket::Pages, &key));
}

#[tokio::test]
async fn unresolvable_cover_is_reported_not_silently_skipped() {
    let (_tmp, repo, blobs) = setup();
    let comic = repo
        .insert_comic(NewComic {
            title: "Hotlinked".into(),
            cover_url: Some("https://elsewhere.example/img.png".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let report = CascadeDeleter::new(&repo, &blobs)
        .delete_comic(&comic.id)
        .await
        .unwrap();

    assert!(report.completed);
    assert!(report.steps.contains(&CascadeStep::BlobSkipped {
        bucket: Bucket::Covers,
        owner_id: comic.id.clone(),
        url: "https://elsewhere.example/img.png".into(),
    }));
    assert!(repo.get_comic(&comic.id).await.unwrap().is_none());
}

// ============================================================================
// FAILURE POLICY
// ============================================================================

/// Blob store whose removals always fail.
struct StuckBlobs(FsBlobStore);

#[async_trait]
impl BlobStore for StuckBlobs {
    async fn upload(&self, bucket: Bucket, key: &str, data: Bytes) -> Result<(), BlobError> {
        self.0.upload(bucket, key, data).await
    }

    fn public_url(&self, bucket: Bucket, key: &str) -> String {
        self.0.public_url(bucket, key)
    }

    async fn remove(&self, _bucket: Bucket, _keys: &[String]) -> Result<(), BlobError> {
        Err(BlobError::Io(std::io::Error::other("bucket offline")))
    }

    async fn read(&self, bucket: Bucket, key: &str) -> Result<Bytes, BlobError> {
        self.0.read(bucket, key).await
    }
}

#[tokio::test]
async fn blob_failures_are_recorded_and_rows_still_go() {
    let (_tmp, repo, fs) = setup();
    let blobs = StuckBlobs(fs);
    let (comic, chapters) = seed(&repo, &blobs).await;

    let report = CascadeDeleter::new(&repo, &blobs)
        .delete_comic(&comic.id)
        .await
        .unwrap();

    assert!(report.completed);
    assert!(!report.is_clean());
    // Two page batches and the cover
    assert_eq!(report.failures.len(), 3);
    assert!(repo.get_comic(&comic.id).await.unwrap().is_none());
    assert!(repo.get_chapter(&chapters[0].id).await.unwrap().is_none());
}

/// Repository that refuses to delete page rows and forwards everything else.
struct LockedPages {
    inner: SqliteContentRepository,
    locked: AtomicBool,
}

#[async_trait]
impl ContentRepository for LockedPages {
    async fn list_comics(&self) -> Result<Vec<Comic>, ContentError> {
        self.inner.list_comics().await
    }
    async fn get_comic(&self, id: &str) -> Result<Option<Comic>, ContentError> {
        self.inner.get_comic(id).await
    }
    async fn insert_comic(&self, comic: NewComic) -> Result<Comic, ContentError> {
        self.inner.insert_comic(comic).await
    }
    async fn update_comic(&self, id: &str, update: ComicUpdate) -> Result<Comic, ContentError> {
        self.inner.update_comic(id, update).await
    }
    async fn delete_comic(&self, id: &str) -> Result<bool, ContentError> {
        self.inner.delete_comic(id).await
    }
    async fn list_chapters(&self, comic_id: &str) -> Result<Vec<Chapter>, ContentError> {
        self.inner.list_chapters(comic_id).await
    }
    async fn get_chapter(&self, id: &str) -> Result<Option<Chapter>, ContentError> {
        self.inner.get_chapter(id).await
    }
    async fn chapter_ids_for_comic(&self, comic_id: &str) -> Result<Vec<String>, ContentError> {
        self.inner.chapter_ids_for_comic(comic_id).await
    }
    async fn insert_chapter(&self, chapter: NewChapter) -> Result<Chapter, ContentError> {
        self.inner.insert_chapter(chapter).await
    }
    async fn delete_chapter(&self, id: &str) -> Result<bool, ContentError> {
        self.inner.delete_chapter(id).await
    }
    async fn delete_chapters_for_comic(&self, comic_id: &str) -> Result<u64, ContentError> {
        self.inner.delete_chapters_for_comic(comic_id).await
    }
    async fn list_pages(&self, chapter_id: &str) -> Result<Vec<Page>, ContentError> {
        self.inner.list_pages(chapter_id).await
    }
    async fn get_page(&self, id: &str) -> Result<Option<Page>, ContentError> {
        self.inner.get_page(id).await
    }
    async fn insert_page(&self, page: NewPage) -> Result<Page, ContentError> {
        self.inner.insert_page(page).await
    }
    async fn set_page_number(&self, id: &str, page_number: i64) -> Result<(), ContentError> {
        self.inner.set_page_number(id, page_number).await
    }
    async fn delete_page(&self, id: &str) -> Result<bool, ContentError> {
        self.inner.delete_page(id).await
    }
    async fn delete_pages_for_chapter(&self, chapter_id: &str) -> Result<u64, ContentError> {
        if self.locked.load(Ordering::SeqCst) {
            return Err(ContentError::Conflict("pages are locked".into()));
        }
        self.inner.delete_pages_for_chapter(chapter_id).await
    }
    async fn list_comments(&self, chapter_id: &str) -> Result<Vec<Comment>, ContentError> {
        self.inner.list_comments(chapter_id).await
    }
    async fn insert_comment(&self, comment: NewComment) -> Result<Comment, ContentError> {
        self.inner.insert_comment(comment).await
    }
    async fn register_user(&self, username: &str) -> Result<User, ContentError> {
        self.inner.register_user(username).await
    }
    async fn find_user(&self, username: &str) -> Result<Option<User>, ContentError> {
        self.inner.find_user(username).await
    }
}

#[tokio::test]
async fn row_failure_stops_before_parents_are_touched() {
    let (_tmp, inner, blobs) = setup();
    let repo = LockedPages {
        inner,
        locked: AtomicBool::new(false),
    };
    let (comic, chapters) = seed(&repo, &blobs).await;
    repo.locked.store(true, Ordering::SeqCst);

    let report = CascadeDeleter::new(&repo, &blobs)
        .delete_comic(&comic.id)
        .await
        .unwrap();

    assert!(!report.completed);
    assert!(report.deleted_comic.is_none());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        step_names(&report.steps),
        vec!["listed_chapters", "listed_pages", "removed_blobs"]
    );

    // Page blobs of the first chapter are already gone, but no row above them moved
    assert!(repo.get_comic(&comic.id).await.unwrap().is_some());
    for chapter in &chapters {
        assert!(repo.get_chapter(&chapter.id).await.unwrap().is_some());
        assert_eq!(repo.list_pages(&chapter.id).await.unwrap().len(), 2);
    }
}

// ============================================================================
// CHAPTER CASCADE
// ============================================================================

#[tokio::test]
async fn chapter_cascade_removes_page_blobs_and_keeps_comic() {
    let (_tmp, repo, blobs) = setup();
    let (comic, chapters) = seed(&repo, &blobs).await;
    let target = &chapters[0];
    let keys: Vec<String> = repo
        .list_pages(&target.id)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|p| p.image_key)
        .collect();
    assert_eq!(keys.len(), 2);

    let report = CascadeDeleter::new(&repo, &blobs)
        .delete_chapter(&target.id)
        .await
        .unwrap();

    assert!(report.is_clean());
    assert!(report.deleted_comic.is_none());
    assert_eq!(
        step_names(&report.steps),
        vec!["listed_pages", "removed_blobs", "deleted_pages", "deleted_chapter"]
    );
    for key in &keys {
        assert!(!blob_exists(blobs.root(), Bucket::Pages, key));
    }

    assert!(repo.get_chapter(&target.id).await.unwrap().is_none());
    assert!(repo.get_comic(&comic.id).await.unwrap().is_some());
    assert_eq!(repo.list_chapters(&comic.id).await.unwrap().len(), 1);
    assert_eq!(repo.list_pages(&chapters[1].id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn missing_chapter_is_not_found() {
    let (_tmp, repo, blobs) = setup();
    let blobs: Arc<dyn BlobStore> = Arc::new(blobs);
    let result = CascadeDeleter::new(&repo, blobs.as_ref())
        .delete_chapter("nope")
        .await;
    assert!(matches!(result, Err(ContentError::NotFound(_))));
}
