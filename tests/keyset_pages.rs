mod support;

use axum::http::StatusCode;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Value, json};
use uuid::Uuid;

use noa::domain::comments::{Comment, CommentStatus};
use support::{READER_TOKEN, TestApp, TestAppBuilder, get, json_body, request};

const POST_ID: i64 = 7;

fn seeded(n: u128, minute: u32, reaction_count: Option<i64>) -> Comment {
    Comment {
        id: Uuid::from_u128(n),
        wp_post_id: POST_ID,
        body: format!("comment {n}"),
        user_id: Uuid::from_u128(1000 + n),
        edition_code: Some("ng".to_string()),
        status: CommentStatus::Active,
        created_at: format!("2024-05-01T10:{minute:02}:00+00:00"),
        reaction_count,
    }
}

/// Ties on every sort key, a zero count, and a null block with its own ties.
async fn seed_thread(app: &TestApp) {
    let rows = [
        seeded(1, 0, Some(5)),
        seeded(2, 1, Some(5)),
        seeded(3, 1, Some(5)),
        seeded(4, 2, Some(0)),
        seeded(5, 3, None),
        seeded(6, 3, None),
        seeded(7, 4, None),
        seeded(8, 5, Some(12)),
        seeded(9, 5, None),
    ];
    for row in rows {
        app.comments.seed(row).await;
    }

    let mut hidden = seeded(10, 6, Some(99));
    hidden.status = CommentStatus::Deleted;
    app.comments.seed(hidden).await;
    let mut elsewhere = seeded(11, 6, Some(99));
    elsewhere.wp_post_id = POST_ID + 1;
    app.comments.seed(elsewhere).await;
}

fn ids(comments: &Value) -> Vec<u128> {
    comments
        .as_array()
        .expect("comments")
        .iter()
        .map(|comment| {
            let id: Uuid = comment["id"].as_str().expect("id").parse().expect("uuid");
            id.as_u128()
        })
        .collect()
}

async fn list(app: &TestApp, sort: &str, limit: u32, cursor: Option<&str>) -> Value {
    let mut uri = format!("/api/comments?postId={POST_ID}&sort={sort}&limit={limit}");
    if let Some(cursor) = cursor {
        uri.push_str("&cursor=");
        uri.extend(utf8_percent_encode(cursor, NON_ALPHANUMERIC));
    }
    let response = app.send(get(&uri, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

/// Follows `nextCursor` until the listing runs out, returning ids per page.
async fn walk(app: &TestApp, sort: &str, limit: u32) -> Vec<Vec<u128>> {
    let mut pages = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let body = list(app, sort, limit, cursor.as_deref()).await;
        pages.push(ids(&body["comments"]));
        match body["nextCursor"].as_str() {
            Some(next) => {
                assert_eq!(body["hasMore"], true);
                cursor = Some(next.to_string());
            }
            None => {
                assert_eq!(body["hasMore"], false);
                break;
            }
        }
        assert!(pages.len() <= 10, "cursor walk did not terminate");
    }
    pages
}

#[tokio::test]
async fn newest_pages_follow_created_at_then_id_descending() {
    let app = TestAppBuilder::default().build();
    seed_thread(&app).await;

    let expected = vec![9, 8, 7, 6, 5, 4, 3, 2, 1];
    assert_eq!(ids(&list(&app, "newest", 50, None).await["comments"]), expected);

    let pages = walk(&app, "newest", 2).await;
    assert_eq!(pages, vec![vec![9, 8], vec![7, 6], vec![5, 4], vec![3, 2], vec![1]]);
    assert_eq!(pages.concat(), expected);
}

#[tokio::test]
async fn oldest_pages_follow_created_at_then_id_ascending() {
    let app = TestAppBuilder::default().build();
    seed_thread(&app).await;

    let expected = vec![1, 2, 3, 4, 5, 6, 7, 8, 9];
    assert_eq!(ids(&list(&app, "oldest", 50, None).await["comments"]), expected);
    assert_eq!(walk(&app, "oldest", 2).await.concat(), expected);
    assert_eq!(walk(&app, "oldest", 4).await.concat(), expected);
}

#[tokio::test]
async fn popular_pages_cross_into_the_unreacted_block_without_gaps() {
    let app = TestAppBuilder::default().build();
    seed_thread(&app).await;

    let expected = vec![8, 3, 2, 1, 4, 9, 7, 6, 5];
    assert_eq!(ids(&list(&app, "popular", 50, None).await["comments"]), expected);

    let pages = walk(&app, "popular", 2).await;
    assert_eq!(pages, vec![vec![8, 3], vec![2, 1], vec![4, 9], vec![7, 6], vec![5]]);

    for limit in [1, 3, 5] {
        let walked = walk(&app, "popular", limit).await.concat();
        assert_eq!(walked, expected, "page size {limit}");
    }
}

#[tokio::test]
async fn cursor_from_another_sort_restarts_the_listing() {
    let app = TestAppBuilder::default().build();
    seed_thread(&app).await;

    let first = list(&app, "newest", 2, None).await;
    let cursor = first["nextCursor"].as_str().expect("cursor").to_string();
    let popular = list(&app, "popular", 2, Some(&cursor)).await;
    assert_eq!(ids(&popular["comments"]), vec![8, 3]);
}

#[tokio::test]
async fn bookmark_cursor_walk_matches_the_offset_listing() {
    let app = TestAppBuilder::default().build();
    for post_id in ["1", "2", "3", "4", "5"] {
        let response = app
            .send(request(
                "POST",
                "/api/bookmarks",
                Some(READER_TOKEN),
                Some(json!({ "postId": post_id })),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let mut walked = Vec::new();
    let mut uri = "/api/bookmarks?limit=2".to_string();
    loop {
        let body = json_body(app.send(get(&uri, Some(READER_TOKEN))).await).await;
        walked.extend(
            body["items"]
                .as_array()
                .expect("items")
                .iter()
                .map(|item| item["postId"].as_str().expect("postId").to_string()),
        );
        let Some(next) = body["pagination"]["nextCursor"].as_str() else {
            break;
        };
        uri = format!(
            "/api/bookmarks?limit=2&cursor={}",
            utf8_percent_encode(next, NON_ALPHANUMERIC)
        );
        assert!(walked.len() <= 5, "cursor walk did not terminate");
    }

    assert_eq!(walked, ["5", "4", "3", "2", "1"]);
}
