//! Storage module for persistent data storage
//!
//! Provides SQLite-based persistence for users, validation jobs, and request logs.

mod database;

pub use database::ValidationDb;
