mod support;

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::StatusCode;
use metrics_util::debugging::DebuggingRecorder;
use serde_json::json;

use noa::cache::MemoryCacheBackend;
use noa::cache::edge::{CACHE_OUTCOME_METRIC, FILL_FAILURE_METRIC};
use noa::infra::http::RATE_LIMITED_METRIC;
use support::{FixedSource, READER_TOKEN, TestAppBuilder, get, request};

#[tokio::test]
async fn edge_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let app = TestAppBuilder::default()
        .backend(Arc::new(MemoryCacheBackend::new()))
        .comment_limit(1)
        .build();
    for _ in 0..2 {
        let response = app.send(get("/api/home-feed", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    for expected in [StatusCode::CREATED, StatusCode::TOO_MANY_REQUESTS] {
        let response = app
            .send(request(
                "POST",
                "/api/comments",
                Some(READER_TOKEN),
                Some(json!({ "postId": 42, "body": "metrics" })),
            ))
            .await;
        assert_eq!(response.status(), expected);
    }

    let failing = TestAppBuilder::default()
        .source(FixedSource::failing())
        .build();
    let response = failing.send(get("/api/home-feed", None)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let snapshot = snapshotter.snapshot().into_vec();
    let names: HashSet<String> = snapshot
        .iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();
    for metric in [CACHE_OUTCOME_METRIC, FILL_FAILURE_METRIC, RATE_LIMITED_METRIC] {
        assert!(names.contains(metric), "missing metric: {metric}");
    }

    let outcomes: HashSet<String> = snapshot
        .iter()
        .filter(|(composite_key, _, _, _)| composite_key.key().name() == CACHE_OUTCOME_METRIC)
        .flat_map(|(composite_key, _, _, _)| {
            composite_key
                .key()
                .labels()
                .map(|label| label.value().to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    assert!(outcomes.contains("miss"));
    assert!(outcomes.contains("hit"));
}
