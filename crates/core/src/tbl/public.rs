//! Public tables.
//!
//! A public table is a named virtual table created with a declared heading
//! and key list but no defining expression; a later map operation supplies
//! the expression, which must match the declaration exactly. The mapping is
//! stored in the catalog, so consumers can be written against the public
//! name while the backing definition evolves.

use super::{all_key, validate_keys, Key, Table};
use crate::err::Error;
use crate::expr::Expression;
use crate::kvs::Transaction;
use crate::typ::{Attr, RelationType, TupleType, Type};

pub fn create_public_table(
	name: &str,
	attrs: Vec<Attr>,
	keys: Vec<Key>,
	tx: &mut Transaction,
) -> Result<Table, Error> {
	if name.starts_with("sys_") {
		return Err(Error::InvalidArgument(format!("reserved table name {name}")));
	}
	let heading = TupleType::new(attrs)?;
	let keys = if keys.is_empty() {
		vec![all_key(&heading)]
	} else {
		keys
	};
	validate_keys(&heading, &keys)?;
	let table = Table::new_virtual(
		Some(name.to_string()),
		RelationType::new(heading),
		keys,
		None,
		true,
		true,
	);
	crate::cat::insert_ptable(&table, tx)?;
	tx.environment().cache_table(&table);
	Ok(table)
}

/// Maps a public table to its defining expression. The expression's type
/// must equal the declared relation type and its inferred keys must equal
/// the declared keys.
pub fn map_public_table(name: &str, exp: Expression, tx: &mut Transaction) -> Result<(), Error> {
	let table = crate::env::get_table(name, tx)?;
	if !table.is_virtual() || !table.is_persistent() {
		return Err(Error::InvalidArgument(format!("{name} is not a public table")));
	}
	let exp = exp.resolve_varnames(tx)?;
	let inferred = exp.expr_type(None, Some(tx))?;
	if inferred != Type::Relation(Box::new(table.typ().clone())) {
		return Err(Error::TypeMismatch(format!(
			"mapping expression for {name} has type {inferred}"
		)));
	}
	let mapped = super::eval_table_arg(&exp, Some(tx))?;
	if !keys_set_eq(mapped.keys(), table.keys()) {
		return Err(Error::InvalidArgument(format!(
			"mapping expression for {name} does not preserve the declared keys"
		)));
	}
	crate::cat::update_ptable_def(name, &exp, tx)?;
	table.set_defining_expr(exp);
	debug!("mapped public table {name}");
	Ok(())
}

fn keys_set_eq(a: &[Key], b: &[Key]) -> bool {
	a.len() == b.len()
		&& a.iter().all(|ka| b.iter().any(|kb| ka.set_eq(kb)))
}
