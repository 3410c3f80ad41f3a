pub mod counters;
pub mod cursor;
pub mod service;

pub use counters::{
    BookmarkCounterDelta, UNCOLLECTED_KEY, build_addition_counter_delta,
    build_removal_counter_delta, build_update_counter_delta, collection_key_for_id,
};
pub use cursor::BookmarkCursor;
pub use service::{
    BookmarkError, BookmarkListRequest, BookmarkMutation, BookmarkPolicy, BookmarkService,
    BookmarksPage, NewBookmark, RemovedBookmarks,
};
