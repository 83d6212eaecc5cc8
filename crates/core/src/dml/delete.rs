//! Delete.

use super::{multi_assign, Assignment};
use crate::err::Error;
use crate::expr::Expression;
use crate::kvs::{StoreError, Transaction};
use crate::qrs::pindex_key;
use crate::tbl::Table;
use crate::val::Tuple;

/// Deletes the tuples matching `cond` (all tuples if none), checking the
/// declared constraints first. Returns the number of deleted tuples.
pub fn delete(
	table: &Table,
	cond: Option<Expression>,
	tx: &Transaction,
) -> Result<u64, Error> {
	multi_assign(
		&[Assignment::Delete {
			table: table.clone(),
			cond,
		}],
		tx,
	)
}

/// Deletes one specific tuple, checking the declared constraints first.
pub fn delete_tuple(table: &Table, tuple: &Tuple, tx: &Transaction) -> Result<u64, Error> {
	multi_assign(
		&[Assignment::DeleteTuple {
			table: table.clone(),
			tuple: tuple.clone(),
		}],
		tx,
	)
}

pub(crate) fn delete_unchecked(
	table: &Table,
	cond: Option<&Expression>,
	tx: &Transaction,
) -> Result<u64, Error> {
	if table.is_local() {
		let rows = table.local_tuples()?;
		let mut count = 0u64;
		for tuple in rows {
			let matches = match cond {
				Some(c) => c.evaluate_bool(Some(&tuple), Some(tx))?,
				None => true,
			};
			if matches && table.local_delete(&tuple, Some(tx))? {
				count += 1;
			}
		}
		return Ok(count);
	}
	if table.is_real() {
		return delete_stored(table, cond, tx);
	}
	delete_virtual(table, cond, tx)
}

fn delete_stored(
	table: &Table,
	cond: Option<&Expression>,
	tx: &Transaction,
) -> Result<u64, Error> {
	let real = table.real().expect("stored delete on a real table");
	let rm = real
		.recmap
		.read()
		.ok_or_else(|| Error::Internal("table has no record map".to_string()))?;

	// fast key path mirrors update
	if let Some(key) = cond.and_then(|c| pindex_key(table, c)) {
		return match tx.store().delete_rec(rm, &[key.to_irep()?], tx.stx()) {
			Ok(()) => Ok(1),
			Err(StoreError::NotFound) => Ok(0),
			Err(e) => Err(e.into()),
		};
	}

	let mut cursor = tx.store().cursor(rm, tx.stx())?;
	let mut more = cursor.first()?;
	let mut count = 0u64;
	while more {
		let mut fields = Vec::with_capacity(real.field_attrs.len());
		for no in 0..real.field_attrs.len() {
			fields.push(cursor.field(no)?);
		}
		let tuple = table.tuple_from_fields(&fields)?;
		let matches = match cond {
			Some(c) => c.evaluate_bool(Some(&tuple), Some(tx))?,
			None => true,
		};
		if matches {
			cursor.delete()?;
			count += 1;
		}
		more = cursor.next()?;
	}
	Ok(count)
}

fn delete_virtual(
	table: &Table,
	cond: Option<&Expression>,
	tx: &Transaction,
) -> Result<u64, Error> {
	let exp = table
		.defining_expr()
		.ok_or_else(|| Error::InvalidArgument("public table is not mapped".to_string()))?;
	let (name, args) = match &exp {
		Expression::Op(op) => (op.name.as_str(), op.args.as_slice()),
		_ => return Err(Error::NotSupported("delete from this virtual table".to_string())),
	};
	match name {
		"where" => {
			let base = crate::tbl::eval_table_arg(&args[0], Some(tx))?;
			let combined = match cond {
				Some(c) => Expression::and(args[1].clone(), c.clone()),
				None => args[1].clone(),
			};
			delete_unchecked(&base, Some(&combined), tx)
		}
		"rename" => {
			let base = crate::tbl::eval_table_arg(&args[0], Some(tx))?;
			let mut back = Vec::new();
			let mut i = 1;
			while i + 1 < args.len() {
				back.push((
					crate::tbl::const_string(&args[i + 1])?,
					crate::tbl::const_string(&args[i])?,
				));
				i += 2;
			}
			let refs: Vec<(&str, &str)> =
				back.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
			delete_unchecked(&base, cond.map(|c| c.rename_vars(&refs)).as_ref(), tx)
		}
		"union" => {
			let t1 = crate::tbl::eval_table_arg(&args[0], Some(tx))?;
			let t2 = crate::tbl::eval_table_arg(&args[1], Some(tx))?;
			Ok(delete_unchecked(&t1, cond, tx)? + delete_unchecked(&t2, cond, tx)?)
		}
		_ => Err(Error::NotSupported(format!("delete through {name}"))),
	}
}

pub(crate) fn delete_tuple_unchecked(
	table: &Table,
	tuple: &Tuple,
	tx: &Transaction,
) -> Result<u64, Error> {
	if table.is_local() {
		return Ok(table.local_delete(tuple, Some(tx))? as u64);
	}
	if table.is_real() {
		if !table.contains(tuple, Some(tx))? {
			return Ok(0);
		}
		let real = table.real().expect("stored delete on a real table");
		let rm = real
			.recmap
			.read()
			.ok_or_else(|| Error::Internal("table has no record map".to_string()))?;
		let key = table.key_fields(tuple)?;
		return match tx.store().delete_rec(rm, &key, tx.stx()) {
			Ok(()) => Ok(1),
			Err(StoreError::NotFound) => Ok(0),
			Err(e) => Err(e.into()),
		};
	}
	let exp = table
		.defining_expr()
		.ok_or_else(|| Error::InvalidArgument("public table is not mapped".to_string()))?;
	let (name, args) = match &exp {
		Expression::Op(op) => (op.name.as_str(), op.args.as_slice()),
		_ => return Err(Error::NotSupported("delete from this virtual table".to_string())),
	};
	match name {
		"where" => {
			if !args[1].evaluate_bool(Some(tuple), Some(tx))? {
				return Ok(0);
			}
			let base = crate::tbl::eval_table_arg(&args[0], Some(tx))?;
			delete_tuple_unchecked(&base, tuple, tx)
		}
		"rename" => {
			let base = crate::tbl::eval_table_arg(&args[0], Some(tx))?;
			let mut back = Vec::new();
			let mut i = 1;
			while i + 1 < args.len() {
				back.push((
					crate::tbl::const_string(&args[i + 1])?,
					crate::tbl::const_string(&args[i])?,
				));
				i += 2;
			}
			let refs: Vec<(&str, &str)> =
				back.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
			delete_tuple_unchecked(&base, &tuple.rename(&refs), tx)
		}
		"union" => {
			let t1 = crate::tbl::eval_table_arg(&args[0], Some(tx))?;
			let t2 = crate::tbl::eval_table_arg(&args[1], Some(tx))?;
			let n1 = delete_tuple_unchecked(&t1, tuple, tx)?;
			let n2 = delete_tuple_unchecked(&t2, tuple, tx)?;
			Ok((n1 + n2).min(1))
		}
		_ => Err(Error::NotSupported(format!("delete through {name}"))),
	}
}
