pub mod cursor;
pub mod service;

pub use cursor::{CommentCursor, build_cursor_conditions};
pub use service::{
    CommentError, CommentListRequest, CommentPolicy, CommentService, CommentsPage, NewComment,
};
