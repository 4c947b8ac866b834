//! # Service
//!
//! Document operations as the HTTP layer sees them.

mod documents;
mod errors;

pub use documents::{DocumentService, Entry};
pub use errors::{ServiceError, ServiceResult};
