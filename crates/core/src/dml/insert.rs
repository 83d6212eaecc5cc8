//! Insert.

use super::{multi_assign, Assignment};
use crate::err::Error;
use crate::expr::Expression;
use crate::kvs::{StoreError, Transaction};
use crate::tbl::Table;
use crate::val::Tuple;

/// Inserts a tuple, checking the declared constraints first.
pub fn insert(table: &Table, tuple: Tuple, tx: &Transaction) -> Result<(), Error> {
	multi_assign(
		&[Assignment::Insert {
			table: table.clone(),
			tuple,
		}],
		tx,
	)
	.map(|_| ())
}

/// The raw insert path, applied once constraints have passed.
pub(crate) fn insert_unchecked(
	table: &Table,
	mut tuple: Tuple,
	tx: &Transaction,
) -> Result<(), Error> {
	// missing attributes with declared defaults are filled in
	for (name, val) in table.default_values().iter() {
		if !tuple.contains(name) {
			tuple.set(name.clone(), val.clone());
		}
	}
	insert_filled(table, tuple, tx)
}

fn insert_filled(table: &Table, tuple: Tuple, tx: &Transaction) -> Result<(), Error> {
	if table.is_local() {
		return table.local_insert(tuple, Some(tx));
	}
	if table.is_real() {
		return insert_stored(table, &tuple, tx);
	}
	let exp = table
		.defining_expr()
		.ok_or_else(|| Error::InvalidArgument("public table is not mapped".to_string()))?;
	let (name, args) = match &exp {
		Expression::Op(op) => (op.name.as_str(), op.args.as_slice()),
		_ => return Err(Error::NotSupported("insert into this virtual table".to_string())),
	};
	match name {
		"where" => {
			if !args[1].evaluate_bool(Some(&tuple), Some(tx))? {
				return Err(Error::PredicateViolation(
					"tuple does not satisfy the selection condition".to_string(),
				));
			}
			let base = crate::tbl::eval_table_arg(&args[0], Some(tx))?;
			insert_filled(&base, tuple, tx)
		}
		"union" => {
			let t1 = crate::tbl::eval_table_arg(&args[0], Some(tx))?;
			let t2 = crate::tbl::eval_table_arg(&args[1], Some(tx))?;
			if t1.contains(&tuple, Some(tx))? || t2.contains(&tuple, Some(tx))? {
				return Err(Error::ElementExists("tuple is already in table".to_string()));
			}
			// Insert into both operands. The insertion fails if one insert
			// fails for a reason other than a key or predicate violation,
			// or if both fail with such a violation.
			let r1 = insert_filled(&t1, tuple.clone(), tx);
			if let Err(e) = &r1 {
				if !e.is_violation() {
					return r1;
				}
			}
			match insert_filled(&t2, tuple, tx) {
				Ok(()) => Ok(()),
				Err(e) if !e.is_violation() => Err(e),
				Err(_) => r1,
			}
		}
		"intersect" | "join" => {
			let t1 = crate::tbl::eval_table_arg(&args[0], Some(tx))?;
			let t2 = crate::tbl::eval_table_arg(&args[1], Some(tx))?;
			let part1 = project_onto(&t1, &tuple);
			let part2 = project_onto(&t2, &tuple);
			let in1 = t1.contains(&part1, Some(tx))?;
			let in2 = t2.contains(&part2, Some(tx))?;
			if in1 && in2 {
				return Err(Error::ElementExists("tuple is already in table".to_string()));
			}
			// insert into both operands, undoing the first on failure
			let mut inserted1 = false;
			if !in1 {
				insert_filled(&t1, part1.clone(), tx)?;
				inserted1 = true;
			}
			if !in2 {
				if let Err(e) = insert_filled(&t2, part2, tx) {
					if inserted1 {
						let _ = super::delete::delete_tuple_unchecked(&t1, &part1, tx);
					}
					return Err(e);
				}
			}
			Ok(())
		}
		"extend" => {
			// supplied values for the derived attributes must match
			let mut i = 1;
			while i + 1 < args.len() {
				let name = crate::tbl::const_string(&args[i])?;
				let computed = args[i + 1].evaluate(Some(&tuple), Some(tx))?;
				match tuple.get(&name) {
					Some(given) if given.equals(&computed, Some(tx))? => {}
					_ => {
						return Err(Error::PredicateViolation(format!(
							"derived attribute {name} does not match its expression"
						)))
					}
				}
				i += 2;
			}
			let base = crate::tbl::eval_table_arg(&args[0], Some(tx))?;
			insert_filled(&base, tuple, tx)
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
			insert_filled(&base, tuple.rename(&refs), tx)
		}
		_ => Err(Error::NotSupported(format!("insert through {name}"))),
	}
}

fn project_onto(table: &Table, tuple: &Tuple) -> Tuple {
	let names: Vec<&str> = table.tuple_typ().names().collect();
	tuple.project(&names)
}

fn insert_stored(table: &Table, tuple: &Tuple, tx: &Transaction) -> Result<(), Error> {
	let real = table.real().expect("stored insert on a real table");
	let rm = real
		.recmap
		.read()
		.ok_or_else(|| Error::Internal("table has no record map".to_string()))?;
	let fields = table.tuple_fields(tuple)?;
	match tx.store().insert_rec(rm, fields, tx.stx()) {
		Ok(()) => Ok(()),
		Err(StoreError::KeyExists) => {
			// the identical tuple being present is reported differently
			// from a mere key collision
			if table.contains(tuple, Some(tx))? {
				Err(Error::ElementExists("tuple is already in table".to_string()))
			} else {
				Err(Error::KeyViolation(format!(
					"key collision in table {}",
					table.name().unwrap_or("?")
				)))
			}
		}
		Err(e) => Err(e.into()),
	}
}
