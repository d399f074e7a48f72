//! SQLite-backed collection persistence

mod repository;

pub use repository::SqliteCollectionRepository;
