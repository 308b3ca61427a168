//! Library Management Client
//!
//! Async client for the library REST API: lists, creates, edits, deletes
//! and borrows books, and reads the borrow summary. Reads are cached and
//! invalidated by tag when a write succeeds; form input is validated
//! locally before anything is sent.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod telemetry;
pub mod transport;
pub mod validation;

pub use cache::{CacheKey, QueryCache, Tag};
pub use client::LibraryClient;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use transport::{ApiRequest, HttpTransport, Transport};
pub use validation::FieldErrors;
