//! Data models for the library client

pub mod book;
pub mod borrow;
pub mod enums;
pub mod response;

// Re-export commonly used types
pub use book::{search_books, Book, BookQuery, CreateBook, UpdateBook};
pub use borrow::{
    BorrowBookRequest, BorrowForm, BorrowRecord, BorrowSummary, Borrower, Reference, SummaryBook,
    SummaryStats,
};
pub use enums::{Genre, SortField, SortOrder};
pub use response::ApiResponse;
