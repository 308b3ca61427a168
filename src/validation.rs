//! Form validation rules, run before any request reaches the backend

use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{
    book::{CreateBook, UpdateBook},
    borrow::{BorrowForm, DATE_FORMAT},
};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+@\S+\.\S+").expect("valid regex"));

/// Field name (wire spelling) to error message. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error; the first message for a field wins
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `Ok(())` when empty, otherwise the errors themselves
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        write!(f, "{}", parts.join("; "))
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Calendar date of a form value: `YYYY-MM-DD`, or the date part of an
/// RFC 3339 timestamp. Time of day never takes part in comparisons.
pub fn parse_calendar_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
}

/// Validate a new (or fully edited) book
pub fn validate_book(book: &CreateBook) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if is_blank(&book.title) {
        errors.add("title", "Title is required");
    }
    if is_blank(&book.author) {
        errors.add("author", "Author is required");
    }
    if is_blank(&book.isbn) {
        errors.add("isbn", "ISBN is required");
    }
    if book.copies < 0 {
        errors.add("copies", "Copies cannot be negative");
    }

    errors
}

/// Same rules as [`validate_book`], limited to the fields being changed
pub fn validate_book_update(update: &UpdateBook) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if update.title.as_deref().is_some_and(is_blank) {
        errors.add("title", "Title is required");
    }
    if update.author.as_deref().is_some_and(is_blank) {
        errors.add("author", "Author is required");
    }
    if update.isbn.as_deref().is_some_and(is_blank) {
        errors.add("isbn", "ISBN is required");
    }
    if update.copies.is_some_and(|c| c < 0) {
        errors.add("copies", "Copies cannot be negative");
    }

    errors
}

/// Validate a borrow against the book's current number of copies
pub fn validate_borrow(form: &BorrowForm, copies: i64) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if is_blank(&form.borrower_name) {
        errors.add("borrowerName", "Borrower name is required");
    }

    if is_blank(&form.borrower_email) {
        errors.add("borrowerEmail", "Borrower email is required");
    } else if !EMAIL_RE.is_match(&form.borrower_email) {
        errors.add("borrowerEmail", "Please enter a valid email address");
    }

    if form.quantity <= 0 {
        errors.add("quantity", "Quantity must be greater than 0");
    } else if form.quantity > copies {
        errors.add("quantity", format!("Cannot borrow more than {} copies", copies));
    }

    let borrow_date = if is_blank(&form.borrow_date) {
        errors.add("borrowDate", "Borrow date is required");
        None
    } else {
        let parsed = parse_calendar_date(&form.borrow_date);
        if parsed.is_none() {
            errors.add("borrowDate", "Please enter a valid date");
        }
        parsed
    };

    if is_blank(&form.due_date) {
        errors.add("dueDate", "Due date is required");
    } else {
        match (parse_calendar_date(&form.due_date), borrow_date) {
            (None, _) => errors.add("dueDate", "Please enter a valid date"),
            (Some(due), Some(borrowed)) if due <= borrowed => {
                errors.add("dueDate", "Due date must be after borrow date")
            }
            _ => {}
        }
    }

    errors
}
