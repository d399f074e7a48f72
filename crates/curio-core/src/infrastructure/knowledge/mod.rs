//! SQLite-backed knowledge graph persistence

mod repository;

pub use repository::SqliteKnowledgeRepository;
