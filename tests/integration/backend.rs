//! In-memory library backend served over loopback HTTP

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use library_client::models::{Book, BorrowBookRequest, CreateBook, Genre, UpdateBook};

type Reply = (StatusCode, Json<Value>);

#[derive(Default)]
pub struct Hits {
    pub list: AtomicUsize,
    pub get: AtomicUsize,
    pub summary: AtomicUsize,
    pub writes: AtomicUsize,
}

impl Hits {
    pub fn list(&self) -> usize {
        self.list.load(Ordering::SeqCst)
    }

    pub fn get(&self) -> usize {
        self.get.load(Ordering::SeqCst)
    }

    pub fn summary(&self) -> usize {
        self.summary.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Store {
    books: Vec<Book>,
    borrows: Vec<BorrowBookRequest>,
    next_id: u64,
}

#[derive(Clone, Default)]
pub struct Backend {
    store: Arc<Mutex<Store>>,
    pub hits: Arc<Hits>,
}

impl Backend {
    /// Serve on an ephemeral loopback port; returns the API base URL
    pub async fn spawn(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let app = Router::new().nest("/api", routes()).with_state(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve backend");
        });
        format!("http://{}/api", addr)
    }

    pub fn borrow_count(&self) -> usize {
        self.store.lock().unwrap().borrows.len()
    }
}

fn routes() -> Router<Backend> {
    Router::new()
        .route("/books", get(list_books).post(create_book))
        .route("/books/:id", get(get_book).put(update_book).delete(delete_book))
        .route("/borrow", get(borrow_summary).post(borrow_book))
}

fn ok(status: StatusCode, message: &str, data: Value) -> Reply {
    (status, Json(json!({ "success": true, "message": message, "data": data })))
}

fn fail(status: StatusCode, message: &str) -> Reply {
    (
        status,
        Json(json!({ "success": false, "message": message, "error": { "message": message } })),
    )
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).expect("serialize")
}

async fn list_books(
    State(backend): State<Backend>,
    Query(params): Query<HashMap<String, String>>,
) -> Reply {
    backend.hits.list.fetch_add(1, Ordering::SeqCst);
    let store = backend.store.lock().unwrap();

    let genre = params.get("filter").and_then(|g| g.parse::<Genre>().ok());
    let mut books: Vec<Book> = store
        .books
        .iter()
        .filter(|b| genre.map_or(true, |g| b.genre == g))
        .cloned()
        .collect();

    match params.get("sortBy").map(String::as_str) {
        Some("title") => books.sort_by(|a, b| a.title.cmp(&b.title)),
        Some("author") => books.sort_by(|a, b| a.author.cmp(&b.author)),
        Some("copies") => books.sort_by_key(|b| b.copies),
        _ => books.sort_by_key(|b| b.created_at),
    }
    if params.get("sort").map(String::as_str) == Some("desc") {
        books.reverse();
    }
    if let Some(limit) = params.get("limit").and_then(|l| l.parse::<usize>().ok()) {
        books.truncate(limit);
    }

    ok(StatusCode::OK, "Books retrieved successfully", to_value(&books))
}

async fn get_book(State(backend): State<Backend>, Path(id): Path<String>) -> Reply {
    backend.hits.get.fetch_add(1, Ordering::SeqCst);
    let store = backend.store.lock().unwrap();
    match store.books.iter().find(|b| b.id == id) {
        Some(book) => ok(StatusCode::OK, "Book retrieved successfully", to_value(book)),
        None => fail(StatusCode::NOT_FOUND, "Book not found"),
    }
}

async fn create_book(State(backend): State<Backend>, Json(body): Json<CreateBook>) -> Reply {
    backend.hits.writes.fetch_add(1, Ordering::SeqCst);
    let mut store = backend.store.lock().unwrap();
    store.next_id += 1;
    let now = Utc::now();
    let book = Book {
        id: format!("book-{}", store.next_id),
        title: body.title,
        author: body.author,
        genre: body.genre,
        isbn: body.isbn,
        description: body.description,
        copies: body.copies,
        available: body.available.unwrap_or(true),
        created_at: Some(now),
        updated_at: Some(now),
    };
    store.books.push(book.clone());
    ok(StatusCode::CREATED, "Book created successfully", to_value(&book))
}

async fn update_book(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Json(body): Json<UpdateBook>,
) -> Reply {
    backend.hits.writes.fetch_add(1, Ordering::SeqCst);
    let mut store = backend.store.lock().unwrap();
    let Some(book) = store.books.iter_mut().find(|b| b.id == id) else {
        return fail(StatusCode::NOT_FOUND, "Book not found");
    };
    if let Some(title) = body.title {
        book.title = title;
    }
    if let Some(author) = body.author {
        book.author = author;
    }
    if let Some(genre) = body.genre {
        book.genre = genre;
    }
    if let Some(isbn) = body.isbn {
        book.isbn = isbn;
    }
    if body.description.is_some() {
        book.description = body.description;
    }
    if let Some(copies) = body.copies {
        book.copies = copies;
    }
    if let Some(available) = body.available {
        book.available = available;
    }
    book.updated_at = Some(Utc::now());
    ok(StatusCode::OK, "Book updated successfully", to_value(book))
}

async fn delete_book(State(backend): State<Backend>, Path(id): Path<String>) -> Reply {
    backend.hits.writes.fetch_add(1, Ordering::SeqCst);
    let mut store = backend.store.lock().unwrap();
    let before = store.books.len();
    store.books.retain(|b| b.id != id);
    if store.books.len() == before {
        return fail(StatusCode::NOT_FOUND, "Book not found");
    }
    ok(StatusCode::OK, "Book deleted successfully", Value::Null)
}

async fn borrow_book(State(backend): State<Backend>, Json(body): Json<BorrowBookRequest>) -> Reply {
    backend.hits.writes.fetch_add(1, Ordering::SeqCst);
    let mut store = backend.store.lock().unwrap();
    let Some(book) = store.books.iter_mut().find(|b| b.id == body.book) else {
        return fail(StatusCode::NOT_FOUND, "Book not found");
    };
    if body.quantity > book.copies {
        return fail(StatusCode::BAD_REQUEST, "Not enough copies available");
    }
    book.copies -= body.quantity;
    book.available = book.copies > 0;

    store.borrows.push(body.clone());
    let record = json!({
        "_id": format!("borrow-{}", store.borrows.len()),
        "book": body.book,
        "quantity": body.quantity,
        "borrowDate": body.borrow_date,
        "dueDate": body.due_date,
        "borrower": { "_id": "borrower-1", "name": body.borrower_name, "email": body.borrower_email },
    });
    ok(StatusCode::CREATED, "Book borrowed successfully", record)
}

async fn borrow_summary(State(backend): State<Backend>) -> Reply {
    backend.hits.summary.fetch_add(1, Ordering::SeqCst);
    let store = backend.store.lock().unwrap();

    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, i64> = HashMap::new();
    for borrow in &store.borrows {
        if !totals.contains_key(&borrow.book) {
            order.push(borrow.book.clone());
        }
        *totals.entry(borrow.book.clone()).or_default() += borrow.quantity;
    }

    let rows: Vec<Value> = order
        .iter()
        .filter_map(|id| {
            let book = store.books.iter().find(|b| &b.id == id)?;
            Some(json!({
                "book": { "title": book.title, "isbn": book.isbn },
                "totalQuantity": totals[id],
            }))
        })
        .collect();

    ok(StatusCode::OK, "Borrowed books summary retrieved successfully", Value::Array(rows))
}
