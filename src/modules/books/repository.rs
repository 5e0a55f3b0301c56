//! SQL access to the `books` table.

use bookshelf_db::{Database, Migration};
use thiserror::Error;

use super::models::{Book, BookChanges};

const BOOK_COLUMNS: &str = "isbn, amazon_url, author, language, pages, publisher, title, year";

pub const MIGRATIONS: &[Migration] = &[Migration {
    id: "001_init",
    up: r#"
        CREATE TABLE IF NOT EXISTS books (
            isbn       TEXT PRIMARY KEY,
            amazon_url TEXT NOT NULL,
            author     TEXT NOT NULL,
            language   TEXT NOT NULL,
            pages      INTEGER NOT NULL CHECK (pages > 0),
            publisher  TEXT NOT NULL,
            title      TEXT NOT NULL,
            year       INTEGER NOT NULL
        );
        "#,
}];

/// Errors surfaced by [`BookRepository`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("a book with isbn {0} already exists")]
    Duplicate(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Parameterized statements against the `books` table.
#[derive(Debug, Clone)]
pub struct BookRepository {
    db: Database,
}

impl BookRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// All books ordered by title.
    pub async fn list_all(&self) -> Result<Vec<Book>, StoreError> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY title ASC, isbn ASC"
        ))
        .fetch_all(self.db.pool())
        .await?;

        Ok(books)
    }

    pub async fn get_by_isbn(&self, isbn: &str) -> Result<Book, StoreError> {
        sqlx::query_as::<_, Book>(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE isbn = ?1"))
            .bind(isbn)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| StoreError::NotFound(isbn.to_string()))
    }

    /// Insert a new row. A taken ISBN yields [`StoreError::Duplicate`].
    pub async fn create(&self, book: &Book) -> Result<Book, StoreError> {
        let result = sqlx::query_as::<_, Book>(&format!(
            "INSERT INTO books ({BOOK_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             RETURNING {BOOK_COLUMNS}"
        ))
        .bind(&book.isbn)
        .bind(&book.amazon_url)
        .bind(&book.author)
        .bind(&book.language)
        .bind(book.pages)
        .bind(&book.publisher)
        .bind(&book.title)
        .bind(book.year)
        .fetch_one(self.db.pool())
        .await;

        match result {
            Ok(created) => Ok(created),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Duplicate(book.isbn.clone())),
            Err(err) => Err(err.into()),
        }
    }

    /// Replace every non-key column of the row matching `isbn`.
    pub async fn update(&self, isbn: &str, changes: &BookChanges) -> Result<Book, StoreError> {
        sqlx::query_as::<_, Book>(&format!(
            "UPDATE books SET \
                 amazon_url = ?1, author = ?2, language = ?3, pages = ?4, \
                 publisher = ?5, title = ?6, year = ?7 \
             WHERE isbn = ?8 \
             RETURNING {BOOK_COLUMNS}"
        ))
        .bind(&changes.amazon_url)
        .bind(&changes.author)
        .bind(&changes.language)
        .bind(changes.pages)
        .bind(&changes.publisher)
        .bind(&changes.title)
        .bind(changes.year)
        .bind(isbn)
        .fetch_optional(self.db.pool())
        .await?
        .ok_or_else(|| StoreError::NotFound(isbn.to_string()))
    }

    pub async fn remove(&self, isbn: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM books WHERE isbn = ?1")
            .bind(isbn)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(isbn.to_string()));
        }

        Ok(())
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
            .fetch_one(self.db.pool())
            .await?;

        Ok(count)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}
