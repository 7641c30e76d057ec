//! SQLite backend for the payment transaction engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
