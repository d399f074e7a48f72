//! SQLite-backed post persistence

mod repository;

pub use repository::SqlitePostRepository;
