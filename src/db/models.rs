use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comic {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    /// Storage key of the cover inside the covers bucket.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_key: Option<String>,
    pub author: Option<String>,
    pub status: Option<String>,
    pub genres: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub comic_id: String,
    pub title: String,
    pub chapter_number: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    pub chapter_id: String,
    pub image_url: String,
    /// Storage key of the image inside the pages bucket.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_key: Option<String>,
    pub page_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub chapter_id: String,
    pub comic_id: String,
    pub username: String,
    pub message: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub created_at: String,
}

// --- Insert / update payloads ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewComic {
    pub title: String,
    pub description: Option<String>,
    pub cover_url: Option<String>,
    pub cover_key: Option<String>,
    pub author: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Fields left as `None` are not touched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComicUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub status: Option<String>,
    pub genres: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewChapter {
    pub comic_id: String,
    pub title: String,
    pub chapter_number: i64,
}

#[derive(Debug, Clone)]
pub struct NewPage {
    pub chapter_id: String,
    pub image_url: String,
    pub image_key: Option<String>,
    pub page_number: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewComment {
    pub chapter_id: String,
    pub comic_id: String,
    pub username: String,
    pub message: String,
}
