use serde::Serialize;

use super::ProgressStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadingStats {
    pub started: u32,
    pub ongoing: u32,
    pub completed: u32,
    /// Chapters with a saved position past the first page.
    pub chapters_read: u32,
    pub comics_completed: u32,
}

impl ReadingStats {
    pub fn from_store(store: &ProgressStore) -> Self {
        let mut stats = ReadingStats {
            chapters_read: store
                .chapter_progress_map()
                .values()
                .filter(|idx| **idx > 0)
                .count() as u32,
            started: store.comic_progress_entry_count() as u32,
            ..Default::default()
        };

        // Entries from older layouts count as started but are not classified
        for entry in store.comic_progress_map().values() {
            if entry.last_chapter >= entry.total_chapters {
                stats.completed += 1;
                stats.comics_completed += 1;
            } else {
                stats.ongoing += 1;
            }
        }

        // A pointer with no comic entries still means something was opened
        if stats.started == 0 && store.continue_pointer().is_some() {
            stats.started = 1;
            stats.ongoing = 1;
        }

        stats
    }

    /// Share of started comics that are completed, 0..=100.
    pub fn completion_percent(&self) -> u8 {
        let total = self.started.max(1);
        ((self.completed * 100 + total / 2) / total).min(100) as u8
    }

    pub fn unlocked_badges(&self) -> Vec<&'static Badge> {
        BADGES.iter().filter(|b| b.is_unlocked(self)).collect()
    }
}

pub struct Badge {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    unlock: fn(&ReadingStats) -> bool,
}

impl Badge {
    pub fn is_unlocked(&self, stats: &ReadingStats) -> bool {
        (self.unlock)(stats)
    }
}

pub static BADGES: [Badge; 5] = [
    Badge {
        id: "initiate",
        title: "Initiate",
        description: "Read your first chapter",
        unlock: |s: &ReadingStats| s.chapters_read >= 1,
    },
    Badge {
        id: "reader",
        title: "Reader",
        description: "Read 10 chapters",
        unlock: |s: &ReadingStats| s.chapters_read >= 10,
    },
    Badge {
        id: "binge",
        title: "Binge",
        description: "Read 50 chapters",
        unlock: |s: &ReadingStats| s.chapters_read >= 50,
    },
    Badge {
        id: "veteran",
        title: "Veteran",
        description: "Complete 3 comics",
        unlock: |s: &ReadingStats| s.comics_completed >= 3,
    },
    Badge {
        id: "archivist",
        title: "Archivist",
        description: "Complete 10 comics",
        unlock: |s: &ReadingStats| s.comics_completed >= 10,
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::MemoryKv;
    use std::sync::Arc;

    fn store() -> ProgressStore {
        ProgressStore::for_device(Arc::new(MemoryKv::new()), "dev")
    }

    #[test]
    fn empty_store_has_no_stats() {
        let stats = ReadingStats::from_store(&store());
        assert_eq!(stats, ReadingStats::default());
        assert!(stats.unlocked_badges().is_empty());
    }

    #[test]
    fn counts_started_ongoing_completed() {
        let store = store();
        store.record_comic_progress("a", 3, 3).unwrap();
        store.record_comic_progress("b", 1, 4).unwrap();
        store.record_chapter_progress("x", 0).unwrap();
        store.record_chapter_progress("y", 5).unwrap();

        let stats = ReadingStats::from_store(&store);
        assert_eq!(stats.started, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.ongoing, 1);
        assert_eq!(stats.chapters_read, 1);
        assert_eq!(stats.completion_percent(), 50);

        let ids: Vec<&str> = stats.unlocked_badges().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec!["initiate"]);
    }

    #[test]
    fn old_shaped_entries_count_as_started_only() {
        let store = store();
        store
            .kv()
            .set(
                &store.key("comic_progress"),
                r#"{"old":{"pageIndex":4,"totalPages":9},"gone":null,"done":{"lastChapter":2,"totalChapters":2}}"#,
            )
            .unwrap();

        let stats = ReadingStats::from_store(&store);
        assert_eq!(stats.started, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.ongoing, 0);
        assert_eq!(stats.completion_percent(), 50);
    }

    #[test]
    fn continue_pointer_alone_counts_as_started() {
        let store = store();
        store.set_continue_pointer("ch", 3).unwrap();
        let stats = ReadingStats::from_store(&store);
        assert_eq!(stats.started, 1);
        assert_eq!(stats.ongoing, 1);
    }

    #[test]
    fn badge_thresholds() {
        let stats = ReadingStats {
            chapters_read: 50,
            comics_completed: 3,
            ..Default::default()
        };
        let ids: Vec<&str> = stats.unlocked_badges().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec!["initiate", "reader", "binge", "veteran"]);
    }
}
