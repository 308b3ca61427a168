//! Library client - command line front end
//!
//! Lists, creates, edits, deletes and borrows books against the library
//! REST API, and prints the borrow summary.

use clap::{Parser, Subcommand};

use library_client::{
    config::AppConfig,
    models::{
        search_books, Book, BookQuery, BorrowForm, BorrowSummary, CreateBook, Genre, SortField,
        SortOrder, SummaryStats, UpdateBook,
    },
    telemetry, AppError, LibraryClient,
};

#[derive(Parser)]
#[command(name = "library", version, about = "Manage books and borrows on the library API")]
struct Cli {
    /// Override the API base URL from configuration
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List books
    List {
        #[arg(long, help = "Only books of this genre (e.g. science, non-fiction)")]
        genre: Option<Genre>,
        #[arg(long, default_value = "createdAt", help = "createdAt|title|author|copies")]
        sort_by: SortField,
        #[arg(long, default_value = "desc", help = "asc|desc")]
        order: SortOrder,
        #[arg(long, default_value_t = 10)]
        limit: u32,
        #[arg(long, help = "Filter the fetched page by title, author or ISBN")]
        search: Option<String>,
    },
    /// Show one book
    Show { id: String },
    /// Add a new book
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long, default_value = "fiction")]
        genre: Genre,
        #[arg(long)]
        isbn: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value_t = 1, allow_hyphen_values = true)]
        copies: i64,
        #[arg(long, help = "Mark the book as not available for borrowing")]
        unavailable: bool,
    },
    /// Edit fields of an existing book
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        genre: Option<Genre>,
        #[arg(long)]
        isbn: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        copies: Option<i64>,
        #[arg(long)]
        available: Option<bool>,
    },
    /// Delete a book
    Delete { id: String },
    /// Borrow copies of a book
    Borrow {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value_t = 1, allow_hyphen_values = true)]
        quantity: i64,
        #[arg(long, help = "YYYY-MM-DD, defaults to today")]
        borrow_date: Option<String>,
        #[arg(long, help = "YYYY-MM-DD, defaults to two weeks after today")]
        due_date: Option<String>,
    },
    /// Borrowed quantities per book
    Summary,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    if let Some(url) = cli.api_url.clone() {
        config.api.base_url = url;
    }

    telemetry::init(&config.logging);
    tracing::debug!("Starting library client v{}", env!("CARGO_PKG_VERSION"));

    let client = LibraryClient::from_config(&config)?;

    if let Err(e) = run(&client, cli.command).await {
        tracing::debug!("Command failed: {:?}", e);
        eprintln!("Error: {}", e.user_message());
        if let AppError::Validation(errors) = &e {
            for (field, message) in errors.iter() {
                eprintln!("  {}: {}", field, message);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(client: &LibraryClient, command: Command) -> Result<(), AppError> {
    match command {
        Command::List { genre, sort_by, order, limit, search } => {
            let query = BookQuery::default()
                .genre(genre)
                .sort_by(sort_by)
                .order(order)
                .limit(limit);
            let books = client.list_books(&query).await?;
            let shown = search_books(&books, search.as_deref().unwrap_or(""));
            if shown.is_empty() {
                println!("No books found.");
            } else {
                print_books(&shown);
            }
        }
        Command::Show { id } => {
            let book = client.get_book(&id).await?;
            print_book(&book);
        }
        Command::Create { title, author, genre, isbn, description, copies, unavailable } => {
            let book = client
                .create_book(CreateBook {
                    title,
                    author,
                    genre,
                    isbn,
                    description,
                    copies,
                    available: Some(!unavailable),
                })
                .await?;
            println!("Book added: {} ({})", book.title, book.id);
        }
        Command::Update { id, title, author, genre, isbn, description, copies, available } => {
            let update = UpdateBook { title, author, genre, isbn, description, copies, available };
            if update.is_empty() {
                println!("Nothing to update.");
                return Ok(());
            }
            let book = client.update_book(&id, update).await?;
            println!("Book updated: {} ({})", book.title, book.id);
        }
        Command::Delete { id } => {
            client.delete_book(&id).await?;
            println!("Book deleted.");
        }
        Command::Borrow { id, name, email, quantity, borrow_date, due_date } => {
            let book = client.get_book(&id).await?;
            let defaults = BorrowForm::default();
            let form = BorrowForm {
                quantity,
                borrow_date: borrow_date.unwrap_or(defaults.borrow_date),
                due_date: due_date.unwrap_or(defaults.due_date),
                borrower_name: name,
                borrower_email: email,
            };
            let record = client.borrow_book(&book, form).await?;
            println!("Borrowed {} x \"{}\"", record.quantity, book.title);
        }
        Command::Summary => {
            let summary = client.get_borrow_summary().await?;
            print_summary(&summary);
        }
    }
    Ok(())
}

fn print_books(books: &[&Book]) {
    println!("{:<26} {:<32} {:<20} {:<12} {:<16} {:>6}  STATUS", "ID", "TITLE", "AUTHOR", "GENRE", "ISBN", "COPIES");
    for book in books {
        let status = if book.available { "Available" } else { "Unavailable" };
        println!(
            "{:<26} {:<32} {:<20} {:<12} {:<16} {:>6}  {}",
            book.id, book.title, book.author, book.genre, book.isbn, book.copies, status
        );
    }
}

fn print_book(book: &Book) {
    println!("{}", book.title);
    println!("  Author:      {}", book.author);
    println!("  Genre:       {}", book.genre);
    println!("  ISBN:        {}", book.isbn);
    println!("  Copies:      {}", book.copies);
    println!("  Available:   {}", if book.available { "yes" } else { "no" });
    println!("  Borrowable:  {}", if book.can_borrow() { "yes" } else { "no" });
    if let Some(description) = &book.description {
        println!("  Description: {}", description);
    }
    if let Some(created) = book.created_at {
        println!("  Added:       {}", created.format("%Y-%m-%d"));
    }
}

fn print_summary(summary: &[BorrowSummary]) {
    if summary.is_empty() {
        println!("No books have been borrowed yet.");
        return;
    }
    let stats = SummaryStats::from_summary(summary);
    println!(
        "{} titles borrowed, {} copies in total, {} per title on average",
        stats.titles, stats.total_borrowed, stats.average_per_title
    );
    println!("{:<32} {:<16} {:>8}", "TITLE", "ISBN", "BORROWED");
    for row in summary {
        println!("{:<32} {:<16} {:>8}", row.book.title, row.book.isbn, row.total_quantity);
    }
}
