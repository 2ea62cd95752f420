//! SQLite-backed storage regions.
//!
//! Regions and their entries live in two tables with cascade delete, so
//! dropping a region is a single statement. Access goes through
//! tokio-rusqlite, which runs every statement on a background thread.

mod connection;
mod entries;
mod migrations;

pub use connection::SqliteStorage;
