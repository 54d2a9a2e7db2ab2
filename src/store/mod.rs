//! Cursor persistence backends.
//!
//! PostgreSQL in deployed environments; an in-memory map when no
//! `DATABASE_URL` is configured and in tests.

pub mod db;
pub mod memory;

pub use db::PgCursorStore;
pub use memory::MemoryCursorStore;
