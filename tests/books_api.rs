//! End-to-end tests for the `/books` API over an in-memory database.

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{Method, StatusCode},
    Router,
};
use bookshelf_app::modules::books::{models::Book, repository::BookRepository};
use bookshelf_kernel::settings::Settings;
use serde_json::{json, Value};
use tower::ServiceExt;

const ISBN: &str = "0691161518";

/// Fresh app with one seeded book.
async fn seeded_app() -> Router {
    let mut settings = Settings::default();
    settings.database.url = "sqlite::memory:".to_string();

    let (db, registry) = bookshelf_app::prepare(&settings)
        .await
        .expect("failed to prepare database");

    BookRepository::new(db.clone())
        .create(&Book {
            isbn: ISBN.to_string(),
            amazon_url: "http://a.co/eobPtX2".to_string(),
            author: "Matthew Lane".to_string(),
            language: "english".to_string(),
            pages: 264,
            publisher: "Princeton University Press".to_string(),
            title: "Power-Up: Unlocking the Hidden Mathematics in Video Games".to_string(),
            year: 2017,
        })
        .await
        .expect("failed to seed book");

    bookshelf_http::build_router(&registry, &settings, &db)
        .await
        .expect("failed to build router")
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn new_book() -> Value {
    json!({
        "isbn": "1234000000",
        "amazon_url": "http://a.co/eobPtX2",
        "author": "Eric Jho",
        "language": "Korean",
        "pages": 555,
        "publisher": "University Press",
        "title": "New title 1",
        "year": 1945
    })
}

fn update_payload() -> Value {
    json!({
        "amazon_url": "http://a.co/eobPtX2",
        "author": "Max Jung",
        "language": "Korean",
        "pages": 555,
        "publisher": "University Press",
        "title": "New title 1",
        "year": 1945
    })
}

#[tokio::test]
async fn lists_all_books() {
    let app = seeded_app().await;

    let (status, body) = send(&app, Method::GET, "/books/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["books"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn gets_book_by_isbn() {
    let app = seeded_app().await;

    let (status, body) = send(&app, Method::GET, &format!("/books/{ISBN}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book"]["isbn"], ISBN);
}

#[tokio::test]
async fn unknown_isbn_is_not_found() {
    let app = seeded_app().await;

    let (status, body) = send(&app, Method::GET, "/books/000wrongisbn", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "000wrongisbn not found");
}

#[tokio::test]
async fn creates_book() {
    let app = seeded_app().await;

    let (status, body) = send(&app, Method::POST, "/books/", Some(new_book())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["book"], new_book());

    let (_, body) = send(&app, Method::GET, "/books/", None).await;
    assert_eq!(body["books"].as_array().unwrap().len(), 2);

    let (status, body) = send(&app, Method::GET, "/books/1234000000", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book"], new_book());
}

#[tokio::test]
async fn create_rejects_wrong_type() {
    let app = seeded_app().await;
    let mut payload = new_book();
    payload["year"] = json!("WRONG STRING TYPE");

    let (status, body) = send(&app, Method::POST, "/books/", Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        json!(["instance.year is not of a type(s) integer"])
    );
}

#[tokio::test]
async fn create_rejects_missing_field() {
    let app = seeded_app().await;
    let mut payload = new_book();
    payload.as_object_mut().unwrap().remove("year");

    let (status, body) = send(&app, Method::POST, "/books/", Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!(["instance requires property \"year\""]));

    let (_, body) = send(&app, Method::GET, "/books/", None).await;
    assert_eq!(body["books"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn updates_book() {
    let app = seeded_app().await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/books/{ISBN}"),
        Some(update_payload()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["book"]["author"], "Max Jung");
    assert_eq!(body["book"]["isbn"], ISBN);
}

#[tokio::test]
async fn update_rejects_isbn_in_body() {
    let app = seeded_app().await;
    let mut payload = update_payload();
    payload["isbn"] = json!("12344555555");

    let (status, _) = send(&app, Method::PUT, &format!("/books/{ISBN}"), Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, Method::GET, &format!("/books/{ISBN}"), None).await;
    assert_eq!(body["book"]["author"], "Matthew Lane");
}

#[tokio::test]
async fn deletes_book() {
    let app = seeded_app().await;

    let (status, body) = send(&app, Method::DELETE, &format!("/books/{ISBN}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Book deleted");

    let (_, body) = send(&app, Method::GET, "/books/", None).await;
    assert_eq!(body["books"].as_array().unwrap().len(), 0);

    let (status, _) = send(&app, Method::GET, &format!("/books/{ISBN}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = seeded_app().await;

    let response = app
        .oneshot(Request::builder().uri("/books/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn readiness_reports_database() {
    let app = seeded_app().await;

    let (status, body) = send(&app, Method::GET, "/readyz", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok", "db": "ready" }));
}

#[tokio::test]
async fn openapi_lists_book_routes() {
    let app = seeded_app().await;

    let (status, body) = send(&app, Method::GET, "/docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/books/{isbn}"]["put"].is_object());
}
