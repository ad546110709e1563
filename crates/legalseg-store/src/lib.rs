//! SQLite persistence for users, cases, and prediction records.

pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::CaseStore;
pub use types::User;
