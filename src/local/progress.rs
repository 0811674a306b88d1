use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{device_id, KvStore, LocalStoreError};

pub const CONTINUE_KEY: &str = "continue_reading";

/// How far this device has read into a comic, counted in chapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComicProgress {
    pub last_chapter: u32,
    pub total_chapters: u32,
}

/// The single most recent reading position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuePointer {
    pub chapter_id: String,
    pub page_index: usize,
    /// Unix millis
    pub updated_at: i64,
}

/// `floor(last / total * 100)` clamped to 0..=100; zero for a missing entry or no chapters.
pub fn percent_complete(entry: Option<&ComicProgress>) -> u8 {
    match entry {
        Some(p) if p.total_chapters > 0 => {
            let pct = (u64::from(p.last_chapter) * 100) / u64::from(p.total_chapters);
            pct.min(100) as u8
        }
        _ => 0,
    }
}

/// Typed access to the per-device progress maps.
///
/// Reads never fail: anything missing or shaped differently from what this
/// version writes is read as empty.
#[derive(Clone)]
pub struct ProgressStore {
    kv: Arc<dyn KvStore>,
    device: String,
}

impl ProgressStore {
    /// Resolve (creating if needed) the device id from the same store.
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        let device = device_id(Some(kv.as_ref()));
        Self { kv, device }
    }

    pub fn for_device(kv: Arc<dyn KvStore>, device: impl Into<String>) -> Self {
        Self {
            kv,
            device: device.into(),
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn key(&self, map: &str) -> String {
        format!("device:{}:{}", self.device, map)
    }

    // --- favourites ---

    pub fn favourites(&self) -> Vec<String> {
        let list: Vec<serde_json::Value> = self.read_json(&self.key("fav_comics"));
        let mut ids: Vec<String> = Vec::with_capacity(list.len());
        for value in list {
            if let serde_json::Value::String(id) = value {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    pub fn is_favourite(&self, comic_id: &str) -> bool {
        self.favourites().iter().any(|id| id == comic_id)
    }

    /// Add if absent, remove if present. Returns the resulting membership.
    pub fn toggle_favourite(&self, comic_id: &str) -> Result<bool, LocalStoreError> {
        let mut favs = self.favourites();
        let now_favourite = match favs.iter().position(|id| id == comic_id) {
            Some(idx) => {
                favs.remove(idx);
                false
            }
            None => {
                favs.push(comic_id.to_string());
                true
            }
        };
        self.write_json(&self.key("fav_comics"), &favs)?;
        Ok(now_favourite)
    }

    // --- comic progress ---

    pub fn comic_progress_map(&self) -> BTreeMap<String, ComicProgress> {
        self.read_entries(&self.key("comic_progress"))
    }

    /// Entries that hold anything at all, well-formed or not.
    pub fn comic_progress_entry_count(&self) -> usize {
        let raw: BTreeMap<String, serde_json::Value> = self.read_json(&self.key("comic_progress"));
        raw.values()
            .filter(|v| match v {
                serde_json::Value::Null => false,
                serde_json::Value::Bool(b) => *b,
                serde_json::Value::Number(n) => n.as_f64() != Some(0.0),
                serde_json::Value::String(s) => !s.is_empty(),
                _ => true,
            })
            .count()
    }

    pub fn comic_progress(&self, comic_id: &str) -> Option<ComicProgress> {
        self.comic_progress_map().remove(comic_id)
    }

    /// Overwrite this comic's entry, leaving other comics alone.
    pub fn record_comic_progress(
        &self,
        comic_id: &str,
        last_chapter: u32,
        total_chapters: u32,
    ) -> Result<(), LocalStoreError> {
        let key = self.key("comic_progress");
        let mut map: BTreeMap<String, serde_json::Value> = self.read_json(&key);
        map.insert(
            comic_id.to_string(),
            serde_json::to_value(ComicProgress {
                last_chapter,
                total_chapters,
            })?,
        );
        self.write_json(&key, &map)
    }

    // --- chapter progress ---

    pub fn chapter_progress_map(&self) -> BTreeMap<String, usize> {
        self.read_entries(&self.key("chapter_progress"))
    }

    pub fn chapter_progress(&self, chapter_id: &str) -> Option<usize> {
        self.chapter_progress_map().remove(chapter_id)
    }

    pub fn record_chapter_progress(
        &self,
        chapter_id: &str,
        page_index: usize,
    ) -> Result<(), LocalStoreError> {
        let key = self.key("chapter_progress");
        let mut map: BTreeMap<String, serde_json::Value> = self.read_json(&key);
        map.insert(chapter_id.to_string(), page_index.into());
        self.write_json(&key, &map)
    }

    // --- continue pointer ---

    pub fn continue_pointer(&self) -> Option<ContinuePointer> {
        let raw = self.kv.get(CONTINUE_KEY)?;
        serde_json::from_str(&raw).ok()
    }

    /// Replace the pointer wholesale with a fresh timestamp.
    pub fn set_continue_pointer(
        &self,
        chapter_id: &str,
        page_index: usize,
    ) -> Result<ContinuePointer, LocalStoreError> {
        let pointer = ContinuePointer {
            chapter_id: chapter_id.to_string(),
            page_index,
            updated_at: chrono::Utc::now().timestamp_millis(),
        };
        self.write_json(CONTINUE_KEY, &pointer)?;
        Ok(pointer)
    }

    // --- helpers ---

    fn read_json<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        self.kv
            .get(key)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    /// Object map whose malformed entries are dropped individually.
    fn read_entries<T: DeserializeOwned>(&self, key: &str) -> BTreeMap<String, T> {
        let raw: BTreeMap<String, serde_json::Value> = self.read_json(key);
        raw.into_iter()
            .filter_map(|(k, v)| serde_json::from_value(v).ok().map(|v| (k, v)))
            .collect()
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), LocalStoreError> {
        self.kv.set(key, &serde_json::to_string(value)?)
    }

    pub(crate) fn kv(&self) -> &dyn KvStore {
        self.kv.as_ref()
    }
}
