//! Integration tests for shelf-canon HTTP endpoints

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use helpers::{create_test_app, google_sparse_volume, open_library_details, token_from_url, Reply};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

const ISBN: &str = "9780545010221";

async fn get(app: &axum::Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn send_json(app: &axum::Router, method: &str, uri: &str, body: Value) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn body_text(response: Response) -> String {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(body.to_vec()).unwrap()
}

fn cover_correction() -> Value {
    json!({
        "isbn": ISBN,
        "submitter_id": "reader-7",
        "original_data": {"cover_url": "https://covers.openlibrary.org/b/id/8231856-M.jpg"},
        "proposed_changes": {"cover_url": "https://img.example/hp7-hardcover.jpg"}
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let t = create_test_app(Reply::Missing, Reply::Missing).await;

    let response = get(&t.app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "shelf-canon");
}

#[tokio::test]
async fn test_lookup_merges_sources_and_scores() {
    let t = create_test_app(
        Reply::Payload(google_sparse_volume()),
        Reply::Payload(open_library_details()),
    )
    .await;

    let response = get(&t.app, "/books/978-0-545-01022-1").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["book"]["isbn"], ISBN);
    assert_eq!(json["book"]["page_count"], 309);
    assert_eq!(json["book"]["authors"], json!(["J.K. Rowling"]));
    assert_eq!(json["book"]["description"], "The final adventure.");
    assert_eq!(
        json["book"]["cover_url"],
        "https://covers.openlibrary.org/b/id/8231856-M.jpg"
    );
    assert_eq!(json["book"]["missing_fields"], json!([]));
    assert_eq!(json["completeness"]["percentage"], 100);
    assert_eq!(json["completeness"]["label"], "Complete");
}

#[tokio::test]
async fn test_repeat_lookup_does_not_refetch() {
    let t = create_test_app(
        Reply::Payload(google_sparse_volume()),
        Reply::Payload(open_library_details()),
    )
    .await;

    let first = body_json(get(&t.app, &format!("/books/{}", ISBN)).await).await;
    let second = body_json(get(&t.app, &format!("/books/{}", ISBN)).await).await;

    assert_eq!(first["book"]["id"], second["book"]["id"]);
    assert_eq!(t.google.calls(), 1);
    assert_eq!(t.open_library.calls(), 1);
}

#[tokio::test]
async fn test_invalid_isbn_is_400() {
    let t = create_test_app(Reply::Payload(google_sparse_volume()), Reply::Missing).await;

    let response = get(&t.app, "/books/12345").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "INVALID_FORMAT");
    assert_eq!(t.google.calls(), 0);
}

#[tokio::test]
async fn test_unknown_book_is_404() {
    let t = create_test_app(Reply::Missing, Reply::Down).await;

    let response = get(&t.app, &format!("/books/{}", ISBN)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books_canonical")
        .fetch_one(&t.pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_snapshot_uses_submission_names() {
    let t = create_test_app(
        Reply::Payload(google_sparse_volume()),
        Reply::Payload(open_library_details()),
    )
    .await;

    let missing = get(&t.app, &format!("/books/{}/snapshot", ISBN)).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    get(&t.app, &format!("/books/{}", ISBN)).await;
    let json = body_json(get(&t.app, &format!("/books/{}/snapshot", ISBN)).await).await;

    assert_eq!(json["author"], "J.K. Rowling");
    assert_eq!(json["total_pages"], 309);
    assert_eq!(json["genres"], json!(["Juvenile Fiction"]));
    assert!(json.get("authors").is_none());
}

#[tokio::test]
async fn test_incomplete_listing() {
    let t = create_test_app(Reply::Missing, Reply::Payload(open_library_details())).await;
    get(&t.app, &format!("/books/{}", ISBN)).await;

    let all = body_json(get(&t.app, "/books/incomplete").await).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
    assert_eq!(all[0]["book"]["title"], "Harry Potter and the Deathly Hallows");

    let by_submission_name = body_json(get(&t.app, "/books/incomplete?field=genres").await).await;
    assert_eq!(by_submission_name.as_array().unwrap().len(), 1);

    let none_missing_pages = body_json(get(&t.app, "/books/incomplete?field=page_count").await).await;
    assert!(none_missing_pages.as_array().unwrap().is_empty());

    let bad = get(&t.app, "/books/incomplete?field=isbn").await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_correction_submit_and_approve_by_link() {
    let t = create_test_app(
        Reply::Payload(google_sparse_volume()),
        Reply::Payload(open_library_details()),
    )
    .await;
    get(&t.app, &format!("/books/{}", ISBN)).await;

    let response = send_json(&t.app, "POST", "/corrections", cover_correction()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["status"], "pending");

    let notification = t.notifier.last().await;
    assert_eq!(notification.title, "Harry Potter and the Deathly Hallows");
    let approve = token_from_url(&notification.approve_url);
    let reject = token_from_url(&notification.reject_url);

    let page = get(&t.app, &format!("/review/action?token={}", approve)).await;
    assert_eq!(page.status(), StatusCode::OK);
    assert!(body_text(page).await.contains("Correction approved"));

    let book = body_json(get(&t.app, &format!("/books/{}", ISBN)).await).await;
    assert_eq!(book["book"]["cover_url"], "https://img.example/hp7-hardcover.jpg");
    assert_eq!(book["book"]["community_edited"], true);
    assert_eq!(book["book"]["last_edited_by"], "reader-7");

    let stale = get(&t.app, &format!("/review/action?token={}", reject)).await;
    assert_eq!(stale.status(), StatusCode::GONE);
    assert!(body_text(stale).await.contains("Already reviewed"));

    let book_after = body_json(get(&t.app, &format!("/books/{}", ISBN)).await).await;
    assert_eq!(book_after["book"], book["book"]);
}

#[tokio::test]
async fn test_review_page_not_found() {
    let t = create_test_app(Reply::Missing, Reply::Missing).await;

    let page = get(&t.app, "/review/action?token=bogus").await;

    assert_eq!(page.status(), StatusCode::NOT_FOUND);
    let html = body_text(page).await;
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("Link not recognized"));
}

#[tokio::test]
async fn test_review_page_expired_link() {
    let t = create_test_app(
        Reply::Payload(google_sparse_volume()),
        Reply::Payload(open_library_details()),
    )
    .await;
    get(&t.app, &format!("/books/{}", ISBN)).await;
    let created = body_json(send_json(&t.app, "POST", "/corrections", cover_correction()).await).await;
    let approve = token_from_url(&t.notifier.last().await.approve_url);

    let an_hour_ago = (chrono::Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
    sqlx::query("UPDATE correction_action_tokens SET expires_at = ?")
        .bind(an_hour_ago)
        .execute(&t.pool)
        .await
        .unwrap();

    let page = get(&t.app, &format!("/review/action?token={}", approve)).await;

    assert_eq!(page.status(), StatusCode::GONE);
    let html = body_text(page).await;
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains("Link expired"));

    let id = created["id"].as_str().unwrap();
    let submission = body_json(get(&t.app, &format!("/corrections/{}", id)).await).await;
    assert_eq!(submission["status"], "pending");
}

#[tokio::test]
async fn test_reject_by_link_with_reason() {
    let t = create_test_app(
        Reply::Payload(google_sparse_volume()),
        Reply::Payload(open_library_details()),
    )
    .await;
    get(&t.app, &format!("/books/{}", ISBN)).await;
    let created = body_json(send_json(&t.app, "POST", "/corrections", cover_correction()).await).await;
    let reject = token_from_url(&t.notifier.last().await.reject_url);

    let page = get(&t.app, &format!("/review/action?token={}&reason=blurry%20scan", reject)).await;

    assert_eq!(page.status(), StatusCode::OK);
    assert!(body_text(page).await.contains("Reason recorded: blurry scan"));
    let submission = body_json(get(&t.app, &format!("/corrections/{}", created["id"].as_str().unwrap())).await).await;
    assert_eq!(submission["status"], "rejected");
    assert_eq!(submission["rejection_reason"], "blurry scan");
}

#[tokio::test]
async fn test_correction_validation_errors() {
    let t = create_test_app(Reply::Missing, Reply::Missing).await;

    let unchanged = send_json(
        &t.app,
        "POST",
        "/corrections",
        json!({
            "isbn": ISBN,
            "submitter_id": "reader-7",
            "original_data": {"total_pages": 309},
            "proposed_changes": {"total_pages": 309}
        }),
    )
    .await;
    assert_eq!(unchanged.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(unchanged).await["error"]["code"], "NO_CHANGES");

    let unknown = send_json(
        &t.app,
        "POST",
        "/corrections",
        json!({
            "isbn": ISBN,
            "submitter_id": "reader-7",
            "proposed_changes": {"page_count": 400}
        }),
    )
    .await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(unknown).await["error"]["code"], "UNKNOWN_FIELD");
}

#[tokio::test]
async fn test_reviewer_flow_and_conflict() {
    let t = create_test_app(
        Reply::Payload(google_sparse_volume()),
        Reply::Payload(open_library_details()),
    )
    .await;
    get(&t.app, &format!("/books/{}", ISBN)).await;
    let created = body_json(send_json(&t.app, "POST", "/corrections", cover_correction()).await).await;
    let id = created["id"].as_str().unwrap().to_string();

    let pending = body_json(get(&t.app, "/corrections/pending").await).await;
    assert_eq!(pending.as_array().unwrap().len(), 1);
    assert_eq!(pending[0]["proposed_changes"], json!({"cover_url": "https://img.example/hp7-hardcover.jpg"}));

    let approved = send_json(
        &t.app,
        "POST",
        &format!("/corrections/{}/review", id),
        json!({"decision": "approve", "reviewer_id": "mod-1"}),
    )
    .await;
    assert_eq!(approved.status(), StatusCode::OK);
    let json = body_json(approved).await;
    assert_eq!(json["submission"]["status"], "approved");
    assert_eq!(json["submission"]["reviewed_by"], "mod-1");
    assert_eq!(json["book"]["book"]["cover_url"], "https://img.example/hp7-hardcover.jpg");

    let again = send_json(
        &t.app,
        "POST",
        &format!("/corrections/{}/review", id),
        json!({"decision": "reject", "reviewer_id": "mod-2"}),
    )
    .await;
    assert_eq!(again.status(), StatusCode::CONFLICT);

    let link = get(
        &t.app,
        &format!("/review/action?token={}", token_from_url(&t.notifier.last().await.reject_url)),
    )
    .await;
    assert_eq!(link.status(), StatusCode::GONE);

    assert!(body_json(get(&t.app, "/corrections/pending").await).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_rejection_reason_endpoint() {
    let t = create_test_app(Reply::Missing, Reply::Missing).await;
    let created = body_json(send_json(&t.app, "POST", "/corrections", cover_correction()).await).await;
    let id = created["id"].as_str().unwrap().to_string();

    send_json(
        &t.app,
        "POST",
        &format!("/corrections/{}/review", id),
        json!({"decision": "reject", "reviewer_id": "mod-1"}),
    )
    .await;

    let response = send_json(
        &t.app,
        "PUT",
        &format!("/corrections/{}/rejection-reason", id),
        json!({"reason": "Cover belongs to another edition"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let submission = body_json(get(&t.app, &format!("/corrections/{}", id)).await).await;
    assert_eq!(submission["rejection_reason"], "Cover belongs to another edition");
}

#[tokio::test]
async fn test_set_api_key_rejects_blank() {
    let t = create_test_app(Reply::Missing, Reply::Missing).await;

    let blank = send_json(&t.app, "POST", "/settings/google_books_api_key", json!({"api_key": "  "})).await;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let ok = send_json(&t.app, "POST", "/settings/google_books_api_key", json!({"api_key": "abc123"})).await;
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(
        shelf_canon::db::settings::get_google_books_api_key(&t.pool).await.unwrap(),
        Some("abc123".to_string())
    );
}
