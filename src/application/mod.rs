pub mod auth;
pub mod bookmarks;
pub mod comments;
pub mod error;
pub mod home;
pub mod pagination;
pub mod rate_limit;
pub mod repos;
