//! Book model and related request types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Genre, SortField, SortOrder};

/// Book as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub author: String,
    pub genre: Genre,
    pub isbn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub copies: i64,
    pub available: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Book {
    /// `available` is advisory: a book may be flagged available with no
    /// copies left, or unavailable with copies on the shelf. Both must hold.
    pub fn can_borrow(&self) -> bool {
        self.available && self.copies > 0
    }

    /// Case-insensitive match on title, author or ISBN
    pub fn matches_search(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        [&self.title, &self.author, &self.isbn]
            .iter()
            .any(|field| field.to_lowercase().contains(&term))
    }
}

/// Narrow a fetched list with the free-text search box
pub fn search_books<'a>(books: &'a [Book], term: &str) -> Vec<&'a Book> {
    books.iter().filter(|b| b.matches_search(term)).collect()
}

/// Create book request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    pub title: String,
    pub author: String,
    pub genre: Genre,
    pub isbn: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub copies: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
}

impl Default for CreateBook {
    fn default() -> Self {
        Self {
            title: String::new(),
            author: String::new(),
            genre: Genre::Fiction,
            isbn: String::new(),
            description: None,
            copies: 1,
            available: Some(true),
        }
    }
}

impl From<&Book> for CreateBook {
    fn from(book: &Book) -> Self {
        Self {
            title: book.title.clone(),
            author: book.author.clone(),
            genre: book.genre,
            isbn: book.isbn.clone(),
            description: book.description.clone(),
            copies: book.copies,
            available: Some(book.available),
        }
    }
}

/// Update book request (partial, absent fields are left untouched)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBook {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<Genre>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copies: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
}

impl UpdateBook {
    pub fn is_empty(&self) -> bool {
        *self == UpdateBook::default()
    }
}

impl From<CreateBook> for UpdateBook {
    fn from(book: CreateBook) -> Self {
        Self {
            title: Some(book.title),
            author: Some(book.author),
            genre: Some(book.genre),
            isbn: Some(book.isbn),
            description: book.description,
            copies: Some(book.copies),
            available: book.available,
        }
    }
}

/// Book list query parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Genre>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl Default for BookQuery {
    /// Newest ten books, any genre
    fn default() -> Self {
        Self {
            filter: None,
            sort_by: Some(SortField::CreatedAt),
            sort: Some(SortOrder::Desc),
            limit: Some(10),
        }
    }
}

impl BookQuery {
    /// Query with no parameters at all; the backend applies its own defaults
    pub fn unfiltered() -> Self {
        Self { filter: None, sort_by: None, sort: None, limit: None }
    }

    pub fn genre(mut self, genre: Option<Genre>) -> Self {
        self.filter = genre;
        self
    }

    pub fn sort_by(mut self, field: SortField) -> Self {
        self.sort_by = Some(field);
        self
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.sort = Some(order);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query string pairs for `GET /books`
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(genre) = self.filter {
            params.push(("filter".to_string(), genre.as_code().to_string()));
        }
        if let Some(field) = self.sort_by {
            params.push(("sortBy".to_string(), field.as_code().to_string()));
        }
        if let Some(order) = self.sort {
            params.push(("sort".to_string(), order.as_code().to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}
