//! News On Africa edge API: comments, bookmarks, and the edge-cached home feed.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
