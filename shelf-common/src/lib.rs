//! # Shelf Common Library
//!
//! Shared code for the shelf book-library tools including:
//! - The `BookRecord` model and its JSON layout
//! - Configuration loading and library path resolution
//! - JSON persistence of the reconciled library
//! - Common error types

pub mod config;
pub mod error;
pub mod record;
pub mod store;

pub use error::{Error, Result};
pub use record::BookRecord;
pub use store::BookStore;
