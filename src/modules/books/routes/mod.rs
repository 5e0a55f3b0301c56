//! HTTP handlers for `/books`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use bookshelf_http::AppError;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::models::{Book, BookChanges};
use super::repository::{BookRepository, StoreError};
use super::schema::{self, Operation};
use crate::utils;

type JsonResult = Result<Json<Value>, AppError>;

/// Static route table for the books resource.
pub fn router(repo: BookRepository) -> Router {
    let prefix = utils::log_prefix("books");
    tracing::info!(target: "project.routes", %prefix, "registering books routes");

    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route("/books/", get(list_books).post(create_book))
        .route(
            "/books/{isbn}",
            get(get_book).put(update_book).delete(delete_book),
        )
        .with_state(repo)
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::not_found(err.to_string()),
            StoreError::Duplicate(_) => AppError::conflict(err.to_string()),
            StoreError::Database(db_err) => AppError::Internal(db_err.into()),
        }
    }
}

/// GET /books/ => {books: [book, ...]}
async fn list_books(State(repo): State<BookRepository>) -> JsonResult {
    let books = repo.list_all().await?;
    Ok(Json(json!({ "books": books })))
}

/// GET /books/{isbn} => {book}
async fn get_book(State(repo): State<BookRepository>, Path(isbn): Path<String>) -> JsonResult {
    let book = repo.get_by_isbn(&isbn).await?;
    Ok(Json(json!({ "book": book })))
}

/// POST /books/ (all fields) => 201 {book}
async fn create_book(
    State(repo): State<BookRepository>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(payload) = payload?;
    let book: Book = validated(payload, Operation::Create)?;

    let created = repo.create(&book).await?;
    tracing::info!(isbn = %created.isbn, "book created");

    Ok((StatusCode::CREATED, Json(json!({ "book": created }))))
}

/// PUT /books/{isbn} (all fields but isbn) => {book}
async fn update_book(
    State(repo): State<BookRepository>,
    Path(isbn): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> JsonResult {
    let Json(payload) = payload?;
    let changes: BookChanges = validated(payload, Operation::Update)?;

    let updated = repo.update(&isbn, &changes).await?;
    tracing::info!(isbn = %updated.isbn, "book updated");

    Ok(Json(json!({ "book": updated })))
}

/// DELETE /books/{isbn} => {message: "Book deleted"}
async fn delete_book(State(repo): State<BookRepository>, Path(isbn): Path<String>) -> JsonResult {
    repo.remove(&isbn).await?;
    tracing::info!(isbn = %isbn, "book deleted");

    Ok(Json(json!({ "message": "Book deleted" })))
}

/// Run schema validation, then decode the accepted payload.
fn validated<T: DeserializeOwned>(payload: Value, operation: Operation) -> Result<T, AppError> {
    let mut payload = schema::validate(payload, operation)
        .map_err(|errors| AppError::validation(errors.into_messages()))?;
    schema::normalize_integers(schema::BOOK_SCHEMA, &mut payload);

    serde_json::from_value(payload).map_err(|err| AppError::bad_request(err.to_string()))
}
