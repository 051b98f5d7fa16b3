//! Book catalogue service.
//!
//! HTTP access to a single MongoDB collection of books: CSV bulk load,
//! canned queries and CRUD by identifier.

pub mod bootstrap;
pub mod modules;

pub use modules::books;
