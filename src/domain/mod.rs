pub mod bookmarks;
pub mod comments;
pub mod error;
pub mod home;
pub mod users;
