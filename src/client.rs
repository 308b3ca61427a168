//! Library client: books, borrowing and the borrow summary

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::{
    cache::{CacheKey, QueryCache, Tag},
    config::AppConfig,
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, CreateBook, UpdateBook},
        borrow::{BorrowForm, BorrowRecord, BorrowSummary},
    },
    transport::{ApiRequest, HttpTransport, Transport},
    validation::{validate_book, validate_book_update, validate_borrow},
};

const GET_BOOKS: &str = "getBooks";
const GET_BOOK_BY_ID: &str = "getBookById";
const GET_BORROW_SUMMARY: &str = "getBorrowSummary";

fn decode<T: DeserializeOwned>(value: Value) -> AppResult<T> {
    serde_json::from_value(value).map_err(AppError::from)
}

/// Entry point for every read and write against the backend
#[derive(Clone)]
pub struct LibraryClient {
    transport: Arc<dyn Transport>,
    cache: QueryCache,
}

impl LibraryClient {
    pub fn new(transport: Arc<dyn Transport>, cache: QueryCache) -> Self {
        Self { transport, cache }
    }

    /// Client over HTTP, configured from [`AppConfig`]
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let transport = HttpTransport::new(&config.api)?;
        tracing::info!("Using library API at {}", transport.base_url());
        Ok(Self::new(
            Arc::new(transport),
            QueryCache::new(config.cache.stale_after()),
        ))
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    async fn fetch_data(&self, request: ApiRequest) -> AppResult<Value> {
        self.transport.send(request).await.map(|envelope| envelope.data)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// List books matching `query`
    pub async fn list_books(&self, query: &BookQuery) -> AppResult<Vec<Book>> {
        let key = CacheKey::new(GET_BOOKS, query);
        let value = self
            .cache
            .query(key, &[Tag::books()], || {
                self.fetch_data(ApiRequest::get(&["books"]).with_query(query.to_params()))
            })
            .await?;
        decode(value)
    }

    /// Last fetched list for `query`, without touching the network
    pub fn cached_books(&self, query: &BookQuery) -> Option<Vec<Book>> {
        let key = CacheKey::new(GET_BOOKS, query);
        let value = self.cache.peek(&key)?;
        match decode(value) {
            Ok(books) => Some(books),
            Err(e) => {
                tracing::debug!(%key, "Cached book list does not decode: {}", e);
                None
            }
        }
    }

    /// Get a single book
    pub async fn get_book(&self, id: &str) -> AppResult<Book> {
        let key = CacheKey::new(GET_BOOK_BY_ID, id);
        let value = self
            .cache
            .query(key, &[Tag::book(id)], || {
                self.fetch_data(ApiRequest::get(&["books", id]))
            })
            .await?;
        decode(value)
    }

    /// Borrowed quantities aggregated per book
    pub async fn get_borrow_summary(&self) -> AppResult<Vec<BorrowSummary>> {
        let key = CacheKey::unit(GET_BORROW_SUMMARY);
        let value = self
            .cache
            .query(key, &[Tag::borrows()], || self.fetch_data(ApiRequest::get(&["borrow"])))
            .await?;
        decode(value)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Create a book
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        validate_book(&book).into_result().map_err(AppError::Validation)?;

        let request = ApiRequest::post(&["books"], &book)?;
        let created: Book = self
            .cache
            .mutate(&[Tag::books()], async { decode(self.fetch_data(request).await?) })
            .await?;

        tracing::info!(id = %created.id, "Created book \"{}\"", created.title);
        Ok(created)
    }

    /// Update a book; only the fields present in `update` are sent
    pub async fn update_book(&self, id: &str, update: UpdateBook) -> AppResult<Book> {
        validate_book_update(&update).into_result().map_err(AppError::Validation)?;

        let request = ApiRequest::put(&["books", id], &update)?;
        let updated: Book = self
            .cache
            .mutate(&[Tag::book(id), Tag::books()], async {
                decode(self.fetch_data(request).await?)
            })
            .await?;

        tracing::info!(id = %updated.id, "Updated book");
        Ok(updated)
    }

    /// Delete a book; its item entry is evicted rather than kept invalid
    pub async fn delete_book(&self, id: &str) -> AppResult<()> {
        let request = ApiRequest::delete(&["books", id]);
        self.cache
            .mutate(&[Tag::books()], async { self.fetch_data(request).await.map(|_| ()) })
            .await?;
        self.cache.evict(&[Tag::book(id)]);

        tracing::info!(id, "Deleted book");
        Ok(())
    }

    /// Borrow copies of `book`.
    ///
    /// Rejected locally, without any request, when the book cannot be
    /// borrowed or the form does not validate against its current copies.
    pub async fn borrow_book(&self, book: &Book, form: BorrowForm) -> AppResult<BorrowRecord> {
        if !book.can_borrow() {
            return Err(AppError::NotBorrowable(format!(
                "\"{}\" is not available for borrowing",
                book.title
            )));
        }
        validate_borrow(&form, book.copies)
            .into_result()
            .map_err(AppError::Validation)?;

        let request = ApiRequest::post(&["borrow"], &form.into_request(book.id.as_str()))?;
        let record: BorrowRecord = self
            .cache
            .mutate(&[Tag::books(), Tag::borrows()], async {
                decode(self.fetch_data(request).await?)
            })
            .await?;

        tracing::info!(book = %book.id, quantity = record.quantity, "Borrowed book");
        Ok(record)
    }
}
