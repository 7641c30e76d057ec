//! Helpers for tests that need a real, migrated SQLite database.
pub mod prepare_env;
