//! The RelDB engine core.
//!
//! This crate implements a relational algebra engine: polymorphic values
//! over user-defined scalar types, real (stored) and virtual
//! (expression-backed) tables, a catalog describing both, a streaming tuple
//! iterator, transactional mutation with declarative integrity constraints,
//! and an operator registry extensible through dynamic modules or host
//! language bindings. Physical storage is delegated to a record store behind
//! the traits in [`kvs`]; an in-memory store is bundled for embedded use and
//! for tests.

#[macro_use]
extern crate tracing;

#[macro_use]
mod mac;

pub mod cat;
pub mod cst;
pub mod ctx;
pub mod dml;
pub mod env;
pub mod err;
pub mod expr;
pub mod fnc;
pub mod kvs;
pub mod ops;
pub mod qrs;
pub mod rel;
pub mod tbl;
pub mod typ;
pub mod val;

pub use crate::env::{Database, Environment};
pub use crate::err::Error;
pub use crate::expr::Expression;
pub use crate::kvs::Transaction;
pub use crate::tbl::{Key, Table};
pub use crate::typ::Type;
pub use crate::val::{Tuple, Value};
