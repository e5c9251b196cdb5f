//! biblion CLI: library catalog with AI-assisted search.

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use biblion::catalog::model::{BookId, NewBook, Role, UserId};
use biblion::catalog::query::{ListQuery, SortField, SortOrder};
use biblion::catalog::{Catalog, CheckoutRequest};
use biblion::config::ServiceConfig;
use biblion::paths::BiblionPaths;

const DEFAULT_ADMIN_EMAIL: &str = "admin@biblion.local";

#[derive(Parser)]
#[command(name = "biblion", version, about = "Library catalog with AI-assisted search")]
struct Cli {
    /// Act as the user with this email.
    #[arg(long = "as", global = true, value_name = "EMAIL")]
    as_user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config, data directory, and the bootstrap admin.
    Init {
        /// Admin email.
        #[arg(long, default_value = DEFAULT_ADMIN_EMAIL)]
        email: String,
        /// Admin display name.
        #[arg(long, default_value = "Administrator")]
        name: String,
    },

    /// Add a book to the catalog.
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: String,
        #[arg(long)]
        isbn: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        genre: Option<String>,
        /// May be given multiple times.
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        year: Option<i32>,
    },

    /// List books.
    List {
        /// Free-text filter across title, author, isbn, genre, and tags.
        #[arg(long)]
        q: Option<String>,
        /// AVAILABLE or BORROWED.
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        genre: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, default_value = "1")]
        page: usize,
        #[arg(long, default_value = "10")]
        limit: usize,
        /// created_at, title, author, or year.
        #[arg(long, default_value = "created_at")]
        sort: String,
        /// asc or desc.
        #[arg(long, default_value = "desc")]
        order: String,
    },

    /// Check a book out.
    Checkout {
        book_id: String,
        /// Borrower email (staff only; defaults to the acting user).
        #[arg(long)]
        user: Option<String>,
        /// Displace an existing loan (staff only).
        #[arg(long)]
        r#override: bool,
    },

    /// Return a book to the shelf.
    Checkin { book_id: String },

    /// Natural-language search over the catalog.
    Search { query: String },

    /// Fill in tags, genre, and a summary for a book.
    Enrich { book_id: String },

    /// Print a book's checkout trail.
    History { book_id: String },

    /// Load the demo catalog and user roster.
    Seed,

    /// Manage users.
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user.
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        /// ADMIN, LIBRARIAN, or MEMBER.
        #[arg(long, default_value = "MEMBER")]
        role: String,
    },
    /// Change a user's role.
    Role {
        user_id: String,
        /// ADMIN, LIBRARIAN, or MEMBER.
        role: String,
    },
    /// List all users.
    List,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let paths = BiblionPaths::resolve().into_diagnostic()?;
    paths.ensure_dirs().into_diagnostic()?;
    let config = ServiceConfig::load_or_default(&paths.config_file()).into_diagnostic()?;

    if let Commands::Init { email, name } = &cli.command {
        if !paths.config_file().exists() {
            config.save(&paths.config_file()).into_diagnostic()?;
        }
        let catalog = Catalog::open(&paths, &config)?;
        let admin = catalog.ensure_admin(email, name).into_diagnostic()?;
        println!("Initialized biblion at {}", paths.data_dir.display());
        println!("Admin: {} <{}>", admin.name, admin.email);
        return Ok(());
    }

    let catalog = Catalog::open(&paths, &config)?;

    let actor_email = cli.as_user.as_deref().unwrap_or(DEFAULT_ADMIN_EMAIL);
    let actor = catalog
        .find_user_by_email(actor_email)
        .into_diagnostic()?
        .ok_or_else(|| {
            miette::miette!(
                help = "Run `biblion init` first, or pass --as with a known user email.",
                "no user with email \"{actor_email}\""
            )
        })?;

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),

        Commands::Add {
            title,
            author,
            isbn,
            description,
            genre,
            tags,
            year,
        } => {
            let book = catalog
                .create_book(
                    &actor,
                    NewBook {
                        title,
                        author,
                        isbn,
                        description,
                        genre,
                        tags,
                        year,
                    },
                )
                .into_diagnostic()?;
            println!("Added book {}: \"{}\" by {}", book.id, book.title, book.author);
        }

        Commands::List {
            q,
            status,
            genre,
            year,
            page,
            limit,
            sort,
            order,
        } => {
            let query = ListQuery {
                q,
                availability: status.as_deref().and_then(biblion::catalog::model::BookStatus::parse),
                genre,
                year,
                page: Some(page),
                limit: Some(limit),
                sort: SortField::parse(&sort),
                order: SortOrder::parse(&order),
            };
            let result = catalog.list_books(&query).into_diagnostic()?;
            println!(
                "Books ({} of {}, page {}):",
                result.data.len(),
                result.total,
                result.page
            );
            for book in &result.data {
                let status = match book.borrower {
                    Some(borrower) => format!("{} (user {})", book.status, borrower),
                    None => book.status.to_string(),
                };
                println!(
                    "  {}. \"{}\" by {} [{}]{}",
                    book.id,
                    book.title,
                    book.author,
                    status,
                    book.year.map(|y| format!(" ({y})")).unwrap_or_default()
                );
            }
        }

        Commands::Checkout {
            book_id,
            user,
            r#override,
        } => {
            let id = parse_book_id(&book_id)?;
            let user_id = match user {
                Some(email) => Some(resolve_user_id(&catalog, &email)?),
                None => None,
            };
            let book = catalog
                .checkout(
                    &actor,
                    id,
                    &CheckoutRequest {
                        user_id,
                        override_loan: r#override,
                    },
                )
                .into_diagnostic()?;
            println!(
                "Checked out \"{}\" to user {} (due {})",
                book.title,
                book.borrower.expect("borrowed book has a borrower"),
                book.due_at.expect("borrowed book has a due date").format("%Y-%m-%d")
            );
        }

        Commands::Checkin { book_id } => {
            let id = parse_book_id(&book_id)?;
            let book = catalog.checkin(&actor, id).into_diagnostic()?;
            println!("Checked in \"{}\"", book.title);
        }

        Commands::Search { query } => {
            let result = catalog.smart_search(Some(&actor), &query).into_diagnostic()?;
            println!("{}", result.explanation);
            println!("(provider: {})", result.provider);
            if result.books.is_empty() {
                println!("No matching books.");
            }
            for book in &result.books {
                println!(
                    "  {}. \"{}\" by {} [{}]",
                    book.id, book.title, book.author, book.status
                );
            }
        }

        Commands::Enrich { book_id } => {
            let id = parse_book_id(&book_id)?;
            let result = catalog.enrich_book(&actor, id).into_diagnostic()?;
            let book = result.book;
            println!("Enriched \"{}\" (provider: {})", book.title, result.provider);
            if let Some(genre) = &book.genre {
                println!("  genre:   {genre}");
            }
            if !book.tags.is_empty() {
                println!("  tags:    {}", book.tags.join(", "));
            }
            if let Some(summary) = &book.summary {
                println!("  summary: {summary}");
            }
        }

        Commands::History { book_id } => {
            let id = parse_book_id(&book_id)?;
            let records = catalog.history(&actor, id).into_diagnostic()?;
            if records.is_empty() {
                println!("No checkout history for book {id}.");
            } else {
                println!("History for book {id} ({} entries):", records.len());
                for record in &records {
                    println!(
                        "  {} {} user {} by user {}{}",
                        record.at.format("%Y-%m-%d %H:%M"),
                        record.action,
                        record.user_id,
                        record.actor_id,
                        if record.override_used { " [override]" } else { "" }
                    );
                }
            }
        }

        Commands::Seed => {
            let report = catalog.seed_demo(&actor).into_diagnostic()?;
            println!(
                "Seeded {} users and {} books",
                report.users_created, report.books_created
            );
        }

        Commands::User { action } => match action {
            UserAction::Add { email, name, role } => {
                let role = parse_role(&role)?;
                let user = catalog
                    .create_user(&actor, &email, &name, role)
                    .into_diagnostic()?;
                println!("Created user {}: {} <{}> [{}]", user.id, user.name, user.email, user.role);
            }
            UserAction::Role { user_id, role } => {
                let id = UserId::parse(&user_id)
                    .ok_or_else(|| miette::miette!("invalid user id \"{user_id}\""))?;
                let role = parse_role(&role)?;
                let user = catalog.set_user_role(&actor, id, role).into_diagnostic()?;
                println!("User {} is now {}", user.email, user.role);
            }
            UserAction::List => {
                let users = catalog.list_users(&actor).into_diagnostic()?;
                println!("Users ({}):", users.len());
                for user in &users {
                    println!("  {}. {} <{}> [{}]", user.id, user.name, user.email, user.role);
                }
            }
        },
    }

    Ok(())
}

fn parse_book_id(raw: &str) -> Result<BookId> {
    BookId::parse(raw).ok_or_else(|| miette::miette!("invalid book id \"{raw}\""))
}

fn parse_role(raw: &str) -> Result<Role> {
    Role::parse(raw).ok_or_else(|| {
        miette::miette!(
            help = "Valid roles: ADMIN, LIBRARIAN, MEMBER.",
            "invalid role \"{raw}\""
        )
    })
}

fn resolve_user_id(catalog: &Catalog, email: &str) -> Result<UserId> {
    catalog
        .find_user_by_email(email)
        .into_diagnostic()?
        .map(|u| u.id)
        .ok_or_else(|| miette::miette!("no user with email \"{email}\""))
}
