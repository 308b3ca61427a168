//! End-to-end tests of `LibraryClient` against an in-memory backend over HTTP

mod backend;

use backend::Backend;
use library_client::{
    config::{ApiConfig, AppConfig},
    models::{BookQuery, BorrowForm, BorrowSummary, CreateBook, Genre, SummaryBook, UpdateBook},
    AppError, LibraryClient,
};

fn client_for(base_url: String) -> LibraryClient {
    let config = AppConfig {
        api: ApiConfig { base_url, timeout_secs: 5 },
        ..Default::default()
    };
    LibraryClient::from_config(&config).expect("client")
}

async fn start() -> (Backend, LibraryClient) {
    let backend = Backend::default();
    let url = backend.spawn().await;
    (backend, client_for(url))
}

fn dune() -> CreateBook {
    CreateBook {
        title: "Dune".to_string(),
        author: "Herbert".to_string(),
        genre: Genre::Science,
        isbn: "123".to_string(),
        description: None,
        copies: 3,
        available: Some(true),
    }
}

fn borrow(quantity: i64) -> BorrowForm {
    BorrowForm {
        quantity,
        borrow_date: "2024-01-01".to_string(),
        due_date: "2024-01-15".to_string(),
        borrower_name: "A".to_string(),
        borrower_email: "a@b.com".to_string(),
    }
}

#[tokio::test]
async fn test_create_list_borrow_summary_scenario() {
    let (backend, client) = start().await;
    let query = BookQuery::default();

    let book = client.create_book(dune()).await.unwrap();
    let listed = client.list_books(&query).await.unwrap();
    assert!(listed.iter().any(|b| b.id == book.id && b.title == "Dune"));

    let record = client.borrow_book(&book, borrow(2)).await.unwrap();
    assert_eq!(record.quantity, 2);
    assert_eq!(record.book.id(), book.id);

    let summary = client.get_borrow_summary().await.unwrap();
    assert_eq!(
        summary,
        vec![BorrowSummary {
            book: SummaryBook { title: "Dune".to_string(), isbn: "123".to_string() },
            total_quantity: 2,
        }]
    );

    // Copies changed server-side; the borrow invalidated the book tags.
    let refreshed = client.get_book(&book.id).await.unwrap();
    assert_eq!(refreshed.copies, 1);
    assert_eq!(backend.borrow_count(), 1);
}

#[tokio::test]
async fn test_create_invalidates_book_list() {
    let (backend, client) = start().await;
    let query = BookQuery::default();

    assert!(client.list_books(&query).await.unwrap().is_empty());
    assert!(client.list_books(&query).await.unwrap().is_empty());
    assert_eq!(backend.hits.list(), 1);

    client.create_book(dune()).await.unwrap();
    let books = client.list_books(&query).await.unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(backend.hits.list(), 2);
}

#[tokio::test]
async fn test_concurrent_reads_share_one_request() {
    let (backend, client) = start().await;
    client.create_book(dune()).await.unwrap();
    let query = BookQuery::default().genre(Some(Genre::Science));

    let (a, b) = tokio::join!(client.list_books(&query), client.list_books(&query));
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(backend.hits.list(), 1);
}

#[tokio::test]
async fn test_borrow_over_copies_never_reaches_backend() {
    let (backend, client) = start().await;
    let book = client.create_book(dune()).await.unwrap();
    let writes = backend.hits.writes();

    let err = client.borrow_book(&book, borrow(5)).await.unwrap_err();
    let AppError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    assert!(errors.contains("quantity"));
    assert_eq!(backend.hits.writes(), writes);
    assert_eq!(backend.borrow_count(), 0);
}

#[tokio::test]
async fn test_summary_refetched_only_after_borrow() {
    let (backend, client) = start().await;
    let book = client.create_book(dune()).await.unwrap();

    assert!(client.get_borrow_summary().await.unwrap().is_empty());
    assert!(client.get_borrow_summary().await.unwrap().is_empty());
    assert_eq!(backend.hits.summary(), 1);

    client.borrow_book(&book, borrow(1)).await.unwrap();
    let summary = client.get_borrow_summary().await.unwrap();
    assert_eq!(summary[0].total_quantity, 1);
    assert_eq!(backend.hits.summary(), 2);
}

#[tokio::test]
async fn test_update_refetches_item() {
    let (backend, client) = start().await;
    let book = client.create_book(dune()).await.unwrap();

    assert_eq!(client.get_book(&book.id).await.unwrap().copies, 3);
    client.get_book(&book.id).await.unwrap();
    assert_eq!(backend.hits.get(), 1);

    let updated = client
        .update_book(&book.id, UpdateBook { copies: Some(8), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(updated.copies, 8);
    assert_eq!(client.get_book(&book.id).await.unwrap().copies, 8);
    assert_eq!(backend.hits.get(), 2);
}

#[tokio::test]
async fn test_deleted_book_is_not_found() {
    let (_backend, client) = start().await;
    let book = client.create_book(dune()).await.unwrap();
    client.get_book(&book.id).await.unwrap();

    client.delete_book(&book.id).await.unwrap();

    let err = client.get_book(&book.id).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.user_message(), "Book not found");
    assert!(client.list_books(&BookQuery::default()).await.unwrap().is_empty());

    let err = client.delete_book(&book.id).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_backend_rejection_keeps_cache() {
    let backend = Backend::default();
    let url = backend.spawn().await;
    let client = client_for(url.clone());
    let other = client_for(url);
    let book = client.create_book(dune()).await.unwrap();

    // Another client drains the stock; ours still holds the old copy count.
    let current = other.get_book(&book.id).await.unwrap();
    other.borrow_book(&current, borrow(2)).await.unwrap();

    assert_eq!(client.get_borrow_summary().await.unwrap().len(), 1);
    let summary_hits = backend.hits.summary();

    let err = client.borrow_book(&book, borrow(2)).await.unwrap_err();
    assert!(matches!(err, AppError::Api { status: 400, .. }));
    assert_eq!(err.user_message(), "Not enough copies available");

    // Failed write: nothing was invalidated.
    client.get_borrow_summary().await.unwrap();
    assert_eq!(backend.hits.summary(), summary_hits);
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(format!("http://{}/api", addr));
    let err = client.list_books(&BookQuery::default()).await.unwrap_err();
    assert!(matches!(err, AppError::Transport(_)));
    assert_eq!(err.user_message(), library_client::error::GENERIC_ERROR_MESSAGE);
    assert!(client.cached_books(&BookQuery::default()).is_none());
}

#[tokio::test]
async fn test_id_with_reserved_characters_stays_one_segment() {
    let (backend, client) = start().await;

    let err = client.get_book("missing/id?x=1").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.user_message(), "Book not found");
    // The request reached the item route rather than some other path.
    assert_eq!(backend.hits.get(), 1);
}

#[tokio::test]
async fn test_failure_envelope_with_ok_status_keeps_message() {
    use axum::{routing::get, Json, Router};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route(
        "/api/borrow",
        get(|| async { Json(serde_json::json!({ "success": false, "message": "Summary unavailable" })) }),
    );
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = client_for(format!("http://{}/api", addr));
    let err = client.get_borrow_summary().await.unwrap_err();
    assert!(matches!(err, AppError::Api { status: 200, .. }));
    assert_eq!(err.user_message(), "Summary unavailable");
    assert!(client.cache().is_empty());
}
