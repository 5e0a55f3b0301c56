pub mod models;
pub mod repository;
pub mod routes;
pub mod schema;

use async_trait::async_trait;
use axum::Router;
use bookshelf_kernel::{Database, InitCtx, Migration, Module};
use serde_json::json;

use repository::BookRepository;

/// Books resource: CRUD over the `books` table.
pub struct BooksModule {
    repo: BookRepository,
}

impl BooksModule {
    pub fn new(db: Database) -> Self {
        Self {
            repo: BookRepository::new(db),
        }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let books = self.repo.count().await?;

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            books,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.repo.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };
        let json_body = |schema: &str| {
            json!({
                "content": {
                    "application/json": {
                        "schema": { "$ref": format!("#/components/schemas/{}", schema) }
                    }
                }
            })
        };
        let isbn_param = json!([{
            "name": "isbn",
            "in": "path",
            "required": true,
            "schema": { "type": "string" }
        }]);

        let book_properties = json!({
            "isbn": { "type": "string", "description": "Primary key; immutable" },
            "amazon_url": { "type": "string", "format": "uri" },
            "author": { "type": "string" },
            "language": { "type": "string" },
            "pages": { "type": "integer", "minimum": 1 },
            "publisher": { "type": "string" },
            "title": { "type": "string" },
            "year": { "type": "integer" }
        });
        let mut update_properties = book_properties.clone();
        if let Some(props) = update_properties.as_object_mut() {
            props.remove("isbn");
        }

        Some(json!({
            "paths": {
                "/books/": {
                    "get": {
                        "summary": "List books ordered by title",
                        "tags": ["Books"],
                        "responses": {
                            "200": { "description": "{books: [Book]}", "content": {
                                "application/json": { "schema": {
                                    "type": "object",
                                    "properties": { "books": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/Book" }
                                    }}
                                }}
                            }},
                            "500": error("Internal server error")
                        }
                    },
                    "post": {
                        "summary": "Create a book",
                        "tags": ["Books"],
                        "requestBody": json_body("Book"),
                        "responses": {
                            "201": { "description": "{book: Book}" },
                            "400": error("Validation failed"),
                            "409": error("ISBN already exists")
                        }
                    }
                },
                "/books/{isbn}": {
                    "get": {
                        "summary": "Get a book by ISBN",
                        "tags": ["Books"],
                        "parameters": isbn_param.clone(),
                        "responses": {
                            "200": { "description": "{book: Book}" },
                            "404": error("Book not found")
                        }
                    },
                    "put": {
                        "summary": "Replace a book's fields (ISBN is immutable)",
                        "tags": ["Books"],
                        "parameters": isbn_param.clone(),
                        "requestBody": json_body("UpdateBook"),
                        "responses": {
                            "200": { "description": "{book: Book}" },
                            "400": error("Validation failed"),
                            "404": error("Book not found")
                        }
                    },
                    "delete": {
                        "summary": "Delete a book",
                        "tags": ["Books"],
                        "parameters": isbn_param,
                        "responses": {
                            "200": { "description": "{message: \"Book deleted\"}" },
                            "404": error("Book not found")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": book_properties,
                        "required": ["isbn", "amazon_url", "author", "language", "pages", "publisher", "title", "year"],
                        "additionalProperties": false
                    },
                    "UpdateBook": {
                        "type": "object",
                        "properties": update_properties,
                        "required": ["amazon_url", "author", "language", "pages", "publisher", "title", "year"],
                        "additionalProperties": false
                    }
                }
            }
        }))
    }

    fn migrations(&self) -> Vec<Migration> {
        repository::MIGRATIONS.to_vec()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module backed by `db`
pub fn create_module(db: Database) -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BooksModule::new(db))
}
