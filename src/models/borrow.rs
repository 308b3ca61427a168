//! Borrow (loan) model, request types and the borrow summary

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::book::Book;

/// Default loan length in days for a new borrow form
pub const DEFAULT_LOAN_DAYS: i64 = 14;

/// Calendar date format used on the wire for borrow and due dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Either a bare id or the populated document, depending on the endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference<T> {
    Id(String),
    Populated(T),
}

impl<T> Reference<T> {
    pub fn populated(&self) -> Option<&T> {
        match self {
            Reference::Populated(value) => Some(value),
            Reference::Id(_) => None,
        }
    }
}

impl Reference<Book> {
    pub fn id(&self) -> &str {
        match self {
            Reference::Id(id) => id,
            Reference::Populated(book) => &book.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Borrower {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Borrow record returned after a successful borrow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRecord {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub book: Reference<Book>,
    pub quantity: i64,
    pub borrow_date: Option<String>,
    pub due_date: Option<String>,
    #[serde(default)]
    pub borrower: Option<Reference<Borrower>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of `POST /borrow`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowBookRequest {
    pub book: String,
    pub quantity: i64,
    pub borrow_date: String,
    pub due_date: String,
    pub borrower_name: String,
    pub borrower_email: String,
}

/// Borrow form input, before it is bound to a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowForm {
    pub quantity: i64,
    pub borrow_date: String,
    pub due_date: String,
    pub borrower_name: String,
    pub borrower_email: String,
}

impl BorrowForm {
    /// One copy, borrowed on `today`, due two weeks later
    pub fn starting(today: NaiveDate) -> Self {
        let due = today + Duration::days(DEFAULT_LOAN_DAYS);
        Self {
            quantity: 1,
            borrow_date: today.format(DATE_FORMAT).to_string(),
            due_date: due.format(DATE_FORMAT).to_string(),
            borrower_name: String::new(),
            borrower_email: String::new(),
        }
    }

    pub fn into_request(self, book_id: impl Into<String>) -> BorrowBookRequest {
        BorrowBookRequest {
            book: book_id.into(),
            quantity: self.quantity,
            borrow_date: self.borrow_date,
            due_date: self.due_date,
            borrower_name: self.borrower_name,
            borrower_email: self.borrower_email,
        }
    }
}

impl Default for BorrowForm {
    fn default() -> Self {
        Self::starting(Utc::now().date_naive())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryBook {
    pub title: String,
    pub isbn: String,
}

/// One row of `GET /borrow`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowSummary {
    pub book: SummaryBook,
    pub total_quantity: i64,
}

/// Totals shown above the summary table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SummaryStats {
    pub titles: usize,
    pub total_borrowed: i64,
    pub average_per_title: i64,
}

impl SummaryStats {
    pub fn from_summary(summary: &[BorrowSummary]) -> Self {
        let total_borrowed: i64 = summary.iter().map(|s| s.total_quantity).sum();
        let average_per_title = if summary.is_empty() {
            0
        } else {
            (total_borrowed as f64 / summary.len() as f64).round() as i64
        };
        Self {
            titles: summary.len(),
            total_borrowed,
            average_per_title,
        }
    }
}
