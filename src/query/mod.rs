//! # Query
//!
//! A jq-style filter language evaluated per stored document.
//!
//! ```text
//! source --lexer--> tokens --parser--> Expr --eval--> outputs
//! ```

mod ast;
mod engine;
mod errors;
mod eval;
mod lexer;
mod parser;

pub use ast::{BinOp, Expr, ObjectKey, BUILTINS};
pub use engine::{run_filter, Filter, SearchHit};
pub use errors::{QueryError, QueryResult, SearchError};
pub use eval::compare;
