// Library exports for comicshelf
// Integration tests and the binary both build on these modules

pub mod admin;
pub mod blobs;
pub mod cascade;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod extractors;
pub mod local;
pub mod reader;
pub mod routes;
pub mod state;
