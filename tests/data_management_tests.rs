// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Export, import and clear tests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};

mod common;

fn roster() -> Vec<u8> {
    common::checkin_xlsx(
        &["昵称", "提交时间"],
        &[&["小明", "2024-03-01 08:00:00"], &["阿强", "2024-03-01 08:30:00"]],
    )
}

async fn seed(app: &axum::Router, token: &str) {
    let request = common::upload("/api/uploads", token, &[("day1.xlsx", roster())], None);
    let (status, _, _) = common::send(app, request).await;
    assert_eq!(status, StatusCode::OK);
}

fn import_request(token: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/import")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn leaderboard(app: &axum::Router, token: &str) -> Value {
    let (_, _, body) = common::send(app, common::get("/api/leaderboard", token)).await;
    common::json(&body)
}

#[tokio::test]
async fn test_export_is_a_tagged_attachment() {
    let (app, _, _dir) = common::create_test_app();
    let token = common::start_session(&app).await;
    seed(&app, &token).await;

    let (status, headers, body) = common::send(&app, common::get("/api/export", &token)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
    assert!(headers
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .contains("checkin_records_"));

    let document = common::json(&body);
    assert!(document["exported_at"].as_str().is_some());
    assert!(document["session_id"].as_str().is_some());
    assert_eq!(document["total_files_processed"], 1);
    assert_eq!(document["records"]["小明"]["score"], 1.0);
    assert_eq!(document["processed_files"]["day1.xlsx"]["nicknames_count"], 2);
}

#[tokio::test]
async fn test_export_then_import_into_another_session() {
    let (app, _, _dir) = common::create_test_app();
    let source = common::start_session(&app).await;
    seed(&app, &source).await;
    let (_, _, exported) = common::send(&app, common::get("/api/export", &source)).await;

    let target = common::start_session(&app).await;
    let request = import_request(&target, std::str::from_utf8(&exported).unwrap());
    let (status, _, body) = common::send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    let body = common::json(&body);
    assert_eq!(body["participants"], 2);
    assert_eq!(body["files"], 1);
    assert!(body["backup_file"].as_str().unwrap().starts_with("backup_"));

    assert_eq!(leaderboard(&app, &target).await, leaderboard(&app, &source).await);

    // The imported file is known, so uploading it again is a no-op
    let request = common::upload("/api/uploads", &target, &[("day1.xlsx", roster())], None);
    let (_, _, report) = common::send(&app, request).await;
    assert_eq!(common::json(&report)["files"][0]["status"], "skipped");
}

#[tokio::test]
async fn test_import_accepts_legacy_documents() {
    let (app, _, _dir) = common::create_test_app();
    let token = common::start_session(&app).await;

    let legacy = json!({
        "records": {
            "老王": {
                "score": 3,
                "files": [{"file_name": "old.xlsx", "date": "2023-01-01T00:00:00", "weight": 3, "points": 3}]
            }
        },
        "processed_files": {
            "old.xlsx": {"processed_date": "2023-01-01T00:00:00", "nicknames_count": 1, "weight": 3}
        },
        "last_updated": "2023-01-01T00:00:00",
        "total_files_processed": 1
    });
    let (status, _, _) = common::send(&app, import_request(&token, &legacy.to_string())).await;
    assert_eq!(status, StatusCode::OK);

    let (_, _, files) = common::send(&app, common::get("/api/files", &token)).await;
    let files = common::json(&files);
    assert_eq!(files[0]["base_score"], 1.0);
    assert_eq!(files[0]["reward_multiplier"], 1.0);
    assert_eq!(files[0]["total_points"], 1.0);
    assert_eq!(files[0]["rewarded_users"], json!([]));
}

#[tokio::test]
async fn test_invalid_import_leaves_ledger_untouched() {
    let (app, _, dir) = common::create_test_app();
    let token = common::start_session(&app).await;
    seed(&app, &token).await;
    let before = leaderboard(&app, &token).await;

    let (status, _, body) =
        common::send(&app, import_request(&token, r#"{"records": {}}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body = common::json(&body);
    assert_eq!(body["error"], "invalid_document");
    let details = body["details"].as_str().unwrap();
    assert!(details.contains("last_updated"));
    assert!(details.contains("total_files_processed"));

    let (status, _, _) = common::send(&app, import_request(&token, "[1, 2, 3]")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = common::send(&app, import_request(&token, "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(leaderboard(&app, &token).await, before);
    let backups = std::fs::read_dir(dir.path())
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .starts_with("backup_")
        })
        .count();
    assert_eq!(backups, 0);
}

#[tokio::test]
async fn test_clear_backs_up_then_empties() {
    let (app, _, dir) = common::create_test_app();
    let token = common::start_session(&app).await;
    seed(&app, &token).await;

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/data")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = common::send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let backup_file = common::json(&body)["backup_file"]
        .as_str()
        .unwrap()
        .to_string();
    let backup: Value =
        serde_json::from_slice(&std::fs::read(dir.path().join(&backup_file)).unwrap()).unwrap();
    assert_eq!(backup["total_files_processed"], 1);
    assert!(backup["records"]["阿强"].is_object());

    assert_eq!(leaderboard(&app, &token).await, json!([]));
    let (_, _, stats) = common::send(&app, common::get("/api/stats", &token)).await;
    assert_eq!(common::json(&stats)["total_files_processed"], 0);
}
