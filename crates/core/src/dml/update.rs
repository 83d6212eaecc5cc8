//! Update.
//!
//! Stored tables are updated by one of three strategies: a primary-index
//! point update when the condition addresses a single key value and neither
//! a key attribute nor the table itself is involved in the new values; an
//! in-place cursor scan when only non-key attributes change; and otherwise a
//! buffered rewrite that collects the updated tuples, deletes the originals,
//! and re-inserts.

use super::{multi_assign, refs_only, Assignment};
use crate::err::Error;
use crate::expr::Expression;
use crate::kvs::{Field, StoreError, Transaction};
use crate::qrs::pindex_key;
use crate::tbl::Table;
use crate::val::{Tuple, Value};

/// One attribute assignment of an update.
#[derive(Clone, Debug)]
pub struct AttrUpdate {
	pub name: String,
	pub exp: Expression,
}

impl AttrUpdate {
	pub fn new(name: impl Into<String>, exp: Expression) -> AttrUpdate {
		AttrUpdate {
			name: name.into(),
			exp,
		}
	}
}

/// Updates the tuples matching `cond` (all tuples if none), checking the
/// declared constraints first. Returns the number of updated tuples.
pub fn update(
	table: &Table,
	cond: Option<Expression>,
	updates: Vec<AttrUpdate>,
	tx: &Transaction,
) -> Result<u64, Error> {
	multi_assign(
		&[Assignment::Update {
			table: table.clone(),
			cond,
			updates,
		}],
		tx,
	)
}

pub(crate) fn update_unchecked(
	table: &Table,
	cond: Option<&Expression>,
	updates: &[AttrUpdate],
	tx: &Transaction,
) -> Result<u64, Error> {
	for u in updates {
		if table.tuple_typ().attr(&u.name).is_none() {
			return Err(Error::Name(format!("attribute {} not found", u.name)));
		}
	}
	if table.is_local() {
		return update_local(table, cond, updates, tx);
	}
	if table.is_real() {
		return update_stored(table, cond, updates, tx);
	}
	update_virtual(table, cond, updates, tx)
}

/// Applies the attribute updates to one tuple, typechecking the results.
fn updated_tuple(
	table: &Table,
	tuple: &Tuple,
	updates: &[AttrUpdate],
	tx: &Transaction,
) -> Result<Tuple, Error> {
	let mut out = tuple.clone();
	for u in updates {
		let val = u.exp.evaluate(Some(tuple), Some(tx))?;
		let attr = table.tuple_typ().attr(&u.name).expect("validated by the caller");
		crate::tbl::check_attr_type(&val, &attr.typ)?;
		out.set(u.name.clone(), val);
	}
	Ok(out)
}

fn update_stored(
	table: &Table,
	cond: Option<&Expression>,
	updates: &[AttrUpdate],
	tx: &Transaction,
) -> Result<u64, Error> {
	let key_touched = updates
		.iter()
		.any(|u| table.keys().iter().any(|k| k.contains(&u.name)));
	let self_ref = cond.is_some_and(|c| c.depends_on(table))
		|| updates.iter().any(|u| u.exp.depends_on(table));

	if !key_touched && !self_ref {
		if let Some(key) = cond.and_then(|c| pindex_key(table, c)) {
			return update_by_key(table, key, updates, tx);
		}
		return update_scan(table, cond, updates, tx);
	}
	update_complex(table, cond, updates, tx)
}

/// Fast key path: one point update through the primary index.
fn update_by_key(
	table: &Table,
	key: Value,
	updates: &[AttrUpdate],
	tx: &Transaction,
) -> Result<u64, Error> {
	let real = table.real().expect("stored update on a real table");
	let rm = real
		.recmap
		.read()
		.ok_or_else(|| Error::Internal("table has no record map".to_string()))?;
	let fieldnos: Vec<usize> = (0..real.field_attrs.len()).collect();
	let fields = match tx.store().get_fields(rm, &[key.to_irep()?], &fieldnos, tx.stx()) {
		Ok(f) => f,
		Err(StoreError::NotFound) => return Ok(0),
		Err(e) => return Err(e.into()),
	};
	let tuple = table.tuple_from_fields(&fields)?;
	let new = updated_tuple(table, &tuple, updates, tx)?;
	let field_updates = changed_fields(table, updates, &new)?;
	tx.store().update_rec(rm, &[key.to_irep()?], &field_updates, tx.stx())?;
	Ok(1)
}

/// Simple path: update matching records in place during one scan.
fn update_scan(
	table: &Table,
	cond: Option<&Expression>,
	updates: &[AttrUpdate],
	tx: &Transaction,
) -> Result<u64, Error> {
	let real = table.real().expect("stored update on a real table");
	let rm = real
		.recmap
		.read()
		.ok_or_else(|| Error::Internal("table has no record map".to_string()))?;
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
			let new = updated_tuple(table, &tuple, updates, tx)?;
			let field_updates = changed_fields(table, updates, &new)?;
			cursor.update(&field_updates)?;
			count += 1;
		}
		more = cursor.next()?;
	}
	Ok(count)
}

/// Complex path: buffer the updated tuples, delete the originals, then
/// re-insert. Needed when a key attribute changes or an expression reads
/// the table being updated.
fn update_complex(
	table: &Table,
	cond: Option<&Expression>,
	updates: &[AttrUpdate],
	tx: &Transaction,
) -> Result<u64, Error> {
	let real = table.real().expect("stored update on a real table");
	let rm = real
		.recmap
		.read()
		.ok_or_else(|| Error::Internal("table has no record map".to_string()))?;

	let mut buffered = Vec::new();
	let mut qr = crate::qrs::QResult::new(table, Some(tx))?;
	while let Some(tuple) = qr.next(Some(tx))? {
		let matches = match cond {
			Some(c) => c.evaluate_bool(Some(&tuple), Some(tx))?,
			None => true,
		};
		if matches {
			buffered.push(updated_tuple(table, &tuple, updates, tx)?);
		}
	}
	drop(qr);

	// delete the originals in a second pass
	let mut cursor = tx.store().cursor(rm, tx.stx())?;
	let mut more = cursor.first()?;
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
		}
		more = cursor.next()?;
	}
	drop(cursor);

	let count = buffered.len() as u64;
	for tuple in buffered {
		super::insert::insert_unchecked(table, tuple, tx)?;
	}
	Ok(count)
}

/// The changed fields of an updated tuple, as record-store updates.
fn changed_fields(
	table: &Table,
	updates: &[AttrUpdate],
	new: &Tuple,
) -> Result<Vec<(usize, Field)>, Error> {
	let real = table.real().expect("stored update on a real table");
	let mut out = Vec::with_capacity(updates.len());
	for u in updates {
		let no = real.attr_map[&u.name];
		let val = new.get(&u.name).expect("attribute set by updated_tuple");
		out.push((no, val.to_irep()?));
	}
	Ok(out)
}

fn update_local(
	table: &Table,
	cond: Option<&Expression>,
	updates: &[AttrUpdate],
	tx: &Transaction,
) -> Result<u64, Error> {
	let rows = table.local_tuples()?;
	let staging = Table::new_local(table.typ().clone(), Some(table.keys().to_vec()))?;
	let mut count = 0u64;
	for tuple in &rows {
		let matches = match cond {
			Some(c) => c.evaluate_bool(Some(tuple), Some(tx))?,
			None => true,
		};
		let next = if matches {
			count += 1;
			updated_tuple(table, tuple, updates, tx)?
		} else {
			tuple.clone()
		};
		staging.local_insert(next, Some(tx))?;
	}
	// replace the contents only after every row went through
	for tuple in rows {
		table.local_delete(&tuple, Some(tx))?;
	}
	for tuple in staging.local_tuples()? {
		table.local_insert(tuple, Some(tx))?;
	}
	Ok(count)
}

fn update_virtual(
	table: &Table,
	cond: Option<&Expression>,
	updates: &[AttrUpdate],
	tx: &Transaction,
) -> Result<u64, Error> {
	let exp = table
		.defining_expr()
		.ok_or_else(|| Error::InvalidArgument("public table is not mapped".to_string()))?;
	let (name, args) = match &exp {
		Expression::Op(op) => (op.name.as_str(), op.args.as_slice()),
		_ => return Err(Error::NotSupported("update of this virtual table".to_string())),
	};
	match name {
		"where" => {
			let base = crate::tbl::eval_table_arg(&args[0], Some(tx))?;
			let combined = match cond {
				Some(c) => Expression::and(args[1].clone(), c.clone()),
				None => args[1].clone(),
			};
			update_unchecked(&base, Some(&combined), updates, tx)
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
			let cond = cond.map(|c| c.rename_vars(&refs));
			let updates: Vec<AttrUpdate> = updates
				.iter()
				.map(|u| {
					let name = refs
						.iter()
						.find(|(from, _)| *from == u.name)
						.map(|(_, to)| to.to_string())
						.unwrap_or_else(|| u.name.clone());
					AttrUpdate {
						name,
						exp: u.exp.rename_vars(&refs),
					}
				})
				.collect();
			update_unchecked(&base, cond.as_ref(), &updates, tx)
		}
		"extend" => {
			let base = crate::tbl::eval_table_arg(&args[0], Some(tx))?;
			let mut i = 1;
			while i + 1 < args.len() {
				let derived = crate::tbl::const_string(&args[i])?;
				if updates.iter().any(|u| u.name == derived) {
					return Err(Error::NotSupported(
						"update of a derived attribute".to_string(),
					));
				}
				i += 2;
			}
			let base_heading = base.tuple_typ();
			let pushable = cond.map_or(true, |c| refs_only(c, base_heading))
				&& updates.iter().all(|u| refs_only(&u.exp, base_heading));
			if !pushable {
				return Err(Error::NotSupported(
					"update condition reads derived attributes".to_string(),
				));
			}
			update_unchecked(&base, cond, updates, tx)
		}
		_ => Err(Error::NotSupported(format!("update through {name}"))),
	}
}
