//! Supabase adapters: PostgREST tables and token verification.

pub mod auth;
pub mod bookmarks;
pub mod comments;
pub mod postgrest;

pub use auth::SupabaseAuth;
pub use bookmarks::SupabaseBookmarksRepo;
pub use comments::SupabaseCommentsRepo;
pub use postgrest::PostgrestClient;
