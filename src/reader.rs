// Reader state machine - pure transitions plus progress persistence on every page change
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::content::{ContentError, ContentRepository};
use crate::db::models::{Chapter, Comment, NewComment, Page};
use crate::local::{Preferences, ProgressStore};

/// Horizontal travel of a page turn animation, in pixels.
pub const TURN_OFFSET: i32 = 40;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("{0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    #[default]
    Scroll,
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ltr,
    Rtl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Next,
    Prev,
}

/// A completed index change. `offset` is the slide-out distance; zero in scroll mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTurn {
    pub from: usize,
    pub to: usize,
    pub offset: i32,
}

/// Slide-out offset for a page turn. Direction flips the sign only.
pub fn turn_offset(direction: Direction, turn: Turn) -> i32 {
    match (direction, turn) {
        (Direction::Ltr, Turn::Next) | (Direction::Rtl, Turn::Prev) => -TURN_OFFSET,
        (Direction::Ltr, Turn::Prev) | (Direction::Rtl, Turn::Next) => TURN_OFFSET,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReaderOptions {
    pub ui_idle: Duration,
    /// Start at the page saved for this chapter instead of the first one.
    pub resume: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            ui_idle: Duration::from_millis(2200),
            resume: false,
        }
    }
}

pub enum Reader {
    Loading { chapter_id: String },
    NotFound { chapter_id: String },
    Ready(Box<ReaderSession>),
}

impl Reader {
    pub fn loading(chapter_id: impl Into<String>) -> Self {
        Reader::Loading {
            chapter_id: chapter_id.into(),
        }
    }

    /// Fetch the chapter, its pages and its siblings. Only a complete set becomes `Ready`.
    pub async fn load(
        self,
        repo: Arc<dyn ContentRepository>,
        store: ProgressStore,
        options: ReaderOptions,
        now: Instant,
    ) -> Result<Reader, ReaderError> {
        let chapter_id = match self {
            Reader::Loading { chapter_id } => chapter_id,
            other => return Ok(other),
        };

        let Some(chapter) = repo.get_chapter(&chapter_id).await? else {
            tracing::info!("Chapter {} not found", chapter_id);
            return Ok(Reader::NotFound { chapter_id });
        };

        let pages = repo.list_pages(&chapter.id).await?;
        let chapters = repo.list_chapters(&chapter.comic_id).await?;

        let start = if options.resume {
            store
                .chapter_progress(&chapter.id)
                .filter(|idx| *idx < pages.len())
                .unwrap_or(0)
        } else {
            0
        };

        let session = ReaderSession {
            repo,
            store,
            chapter,
            pages,
            chapters,
            page_index: start,
            mode: ReadMode::default(),
            direction: Direction::default(),
            ui_visible: true,
            last_interaction: now,
            ui_idle: options.ui_idle,
        };
        session.persist_position();
        Ok(Reader::Ready(Box::new(session)))
    }

    pub fn session(&self) -> Option<&ReaderSession> {
        match self {
            Reader::Ready(session) => Some(session.as_ref()),
            _ => None,
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut ReaderSession> {
        match self {
            Reader::Ready(session) => Some(session.as_mut()),
            _ => None,
        }
    }
}

pub struct ReaderSession {
    repo: Arc<dyn ContentRepository>,
    store: ProgressStore,
    chapter: Chapter,
    pages: Vec<Page>,
    chapters: Vec<Chapter>,
    page_index: usize,
    mode: ReadMode,
    direction: Direction,
    ui_visible: bool,
    last_interaction: Instant,
    ui_idle: Duration,
}

impl ReaderSession {
    pub fn chapter(&self) -> &Chapter {
        &self.chapter
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn current_page(&self) -> Option<&Page> {
        self.pages.get(self.page_index)
    }

    pub fn mode(&self) -> ReadMode {
        self.mode
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn ui_visible(&self) -> bool {
        self.ui_visible
    }

    pub fn next(&mut self, now: Instant) -> Option<PageTurn> {
        if self.page_index + 1 >= self.pages.len() {
            return None;
        }
        self.turn_to(self.page_index + 1, Turn::Next, now)
    }

    pub fn prev(&mut self, now: Instant) -> Option<PageTurn> {
        if self.page_index == 0 {
            return None;
        }
        self.turn_to(self.page_index - 1, Turn::Prev, now)
    }

    /// Go straight to `index`, e.g. when a page scrolls into view.
    pub fn jump(&mut self, index: usize, now: Instant) -> Option<PageTurn> {
        if index >= self.pages.len() || index == self.page_index {
            return None;
        }
        let turn = if index > self.page_index {
            Turn::Next
        } else {
            Turn::Prev
        };
        self.turn_to(index, turn, now)
    }

    fn turn_to(&mut self, to: usize, turn: Turn, now: Instant) -> Option<PageTurn> {
        let from = self.page_index;
        self.page_index = to;
        // Saved before the caller starts any animation
        self.persist_position();
        self.interact(now);

        let offset = match self.mode {
            ReadMode::Page => turn_offset(self.direction, turn),
            ReadMode::Scroll => 0,
        };
        Some(PageTurn { from, to, offset })
    }

    /// Write the continue pointer, chapter position and comic position.
    ///
    /// Write failures are logged and do not block reading.
    fn persist_position(&self) {
        if let Err(e) = self
            .store
            .set_continue_pointer(&self.chapter.id, self.page_index)
        {
            tracing::warn!("Failed to save continue pointer: {}", e);
        }
        if let Err(e) = self
            .store
            .record_chapter_progress(&self.chapter.id, self.page_index)
        {
            tracing::warn!("Failed to save chapter progress: {}", e);
        }
        if let Some(position) = self.chapter_position() {
            if let Err(e) = self.store.record_comic_progress(
                &self.chapter.comic_id,
                position as u32 + 1,
                self.chapters.len() as u32,
            ) {
                tracing::warn!("Failed to save comic progress: {}", e);
            }
        }
    }

    fn chapter_position(&self) -> Option<usize> {
        self.chapters.iter().position(|c| c.id == self.chapter.id)
    }

    pub fn toggle_mode(&mut self, now: Instant) -> ReadMode {
        self.mode = match self.mode {
            ReadMode::Scroll => ReadMode::Page,
            ReadMode::Page => ReadMode::Scroll,
        };
        self.interact(now);
        self.mode
    }

    pub fn toggle_direction(&mut self, now: Instant) -> Direction {
        self.direction = match self.direction {
            Direction::Ltr => Direction::Rtl,
            Direction::Rtl => Direction::Ltr,
        };
        self.interact(now);
        self.direction
    }

    /// Any input shows the UI and restarts the idle timer.
    pub fn interact(&mut self, now: Instant) {
        self.ui_visible = true;
        self.last_interaction = now;
    }

    /// Hide the UI once it has been idle long enough. Returns the visibility.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.ui_visible && now.saturating_duration_since(self.last_interaction) >= self.ui_idle {
            self.ui_visible = false;
        }
        self.ui_visible
    }

    pub fn next_chapter(&self) -> Option<&Chapter> {
        self.chapter_position()
            .and_then(|pos| self.chapters.get(pos + 1))
    }

    pub fn prev_chapter(&self) -> Option<&Chapter> {
        self.chapter_position()
            .and_then(|pos| pos.checked_sub(1))
            .and_then(|pos| self.chapters.get(pos))
    }

    pub async fn comments(&self) -> Result<Vec<Comment>, ReaderError> {
        Ok(self.repo.list_comments(&self.chapter.id).await?)
    }

    pub async fn post_comment(
        &self,
        prefs: &Preferences,
        message: &str,
    ) -> Result<Comment, ReaderError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ReaderError::Validation("Comment cannot be empty".into()));
        }
        let comment = self
            .repo
            .insert_comment(NewComment {
                chapter_id: self.chapter.id.clone(),
                comic_id: self.chapter.comic_id.clone(),
                username: prefs.username().unwrap_or_else(|| "Reader".to_string()),
                message: message.to_string(),
            })
            .await?;
        Ok(comment)
    }
}
