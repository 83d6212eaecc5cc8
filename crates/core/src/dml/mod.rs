//! The mutation engine.
//!
//! Inserts, updates and deletes run against stored tables directly and
//! against virtual tables where the algebra gives the operation a meaning.
//! Every public mutation is a multi-assignment of one element: the declared
//! constraints are checked against the post-assignment image first, and the
//! base tables are touched only after every affected constraint holds.

mod assign;
mod delete;
mod insert;
mod update;

pub use assign::{multi_assign, Assignment};
pub use delete::{delete, delete_tuple};
pub use insert::insert;
pub use update::{update, AttrUpdate};

pub(crate) use delete::{delete_tuple_unchecked, delete_unchecked};
pub(crate) use insert::insert_unchecked;
pub(crate) use update::update_unchecked;

use crate::err::Error;
use crate::kvs::Transaction;
use crate::tbl::Table;

/// Replaces the contents of `dst` by the tuples of `src`.
pub fn copy_table(dst: &Table, src: &Table, tx: &Transaction) -> Result<u64, Error> {
	if dst.typ() != src.typ() {
		return Err(Error::TypeMismatch("copy between different relation types".to_string()));
	}
	multi_assign(
		&[Assignment::Copy {
			dst: dst.clone(),
			src: src.clone(),
		}],
		tx,
	)
}

/// Applies a copy without constraint checking.
pub(crate) fn copy_table_unchecked(
	dst: &Table,
	src: &Table,
	tx: &Transaction,
) -> Result<u64, Error> {
	let tuples = src.to_tuples(Some(tx))?;
	delete::delete_unchecked(dst, None, tx)?;
	let mut n = 0;
	for t in tuples {
		insert::insert_unchecked(dst, t, tx)?;
		n += 1;
	}
	Ok(n)
}

/// Whether every free variable of an expression names an attribute of the
/// given heading. Used when pushing mutations through virtual tables.
pub(crate) fn refs_only(exp: &crate::expr::Expression, heading: &crate::typ::TupleType) -> bool {
	use crate::expr::Expression;
	match exp {
		Expression::Val(_) | Expression::TableRef(_) => true,
		Expression::Var(name) => heading.contains(name),
		Expression::Op(op) => op.args.iter().all(|a| refs_only(a, heading)),
		Expression::CompGet(e, _) => refs_only(e, heading),
	}
}
