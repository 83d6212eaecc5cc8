//! The table model.
//!
//! A table has a relation type, a list of candidate keys, and one of three
//! backings: *real* tables store their tuples in the record store, *virtual*
//! tables are defined by a relational expression over other tables, and
//! *local* tables hold their tuples in memory. Local backing serves
//! transient tables and relation literals, which must work without a
//! transaction. Public tables are virtual tables whose defining expression
//! is supplied after creation and registered in the catalog.

mod key;
mod public;
mod real;

pub use key::Key;
pub(crate) use key::{all_key, remove_redundant_keys, validate_keys};
pub use public::{create_public_table, map_public_table};
pub use real::{add_virtual_table, create_table, drop_table};
pub(crate) use real::{create_stored, open_stored};

use crate::err::Error;
use crate::expr::Expression;
use crate::kvs::{Field, IndexId, RecMapId, Transaction};
use crate::typ::{RelationType, TupleType, Type};
use crate::val::{Tuple, Value};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) struct RealTable {
	pub(crate) recmap: RwLock<Option<RecMapId>>,
	/// attribute name -> field number; primary-key fields come first
	pub(crate) attr_map: HashMap<String, usize>,
	/// field number -> attribute name
	pub(crate) field_attrs: Vec<String>,
	/// secondary unique indexes enforcing the non-primary keys
	pub(crate) indexes: RwLock<Vec<(IndexId, Key)>>,
}

pub(crate) struct VirtualTable {
	pub(crate) exp: RwLock<Option<Expression>>,
}

pub(crate) struct LocalTable {
	pub(crate) rows: RwLock<Vec<Tuple>>,
}

pub(crate) enum Kind {
	Real(RealTable),
	Virtual(VirtualTable),
	Local(LocalTable),
}

pub(crate) struct TableInner {
	pub(crate) name: Option<String>,
	pub(crate) typ: RelationType,
	pub(crate) keys: Vec<Key>,
	pub(crate) is_user: bool,
	pub(crate) persistent: bool,
	/// default attribute values applied by insert
	pub(crate) defaults: RwLock<Tuple>,
	pub(crate) kind: Kind,
}

/// A table handle. Handles are cheap to clone and shared through the
/// per-environment table cache, so two lookups of the same named table
/// yield the same underlying table.
#[derive(Clone)]
pub struct Table(pub(crate) Arc<TableInner>);

impl std::fmt::Debug for Table {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Table")
			.field("name", &self.0.name)
			.field("keys", &self.0.keys)
			.finish_non_exhaustive()
	}
}

impl Table {
	/// Builds a virtual table from its defining expression.
	pub(crate) fn new_virtual(
		name: Option<String>,
		typ: RelationType,
		keys: Vec<Key>,
		exp: Option<Expression>,
		persistent: bool,
		is_user: bool,
	) -> Table {
		Table(Arc::new(TableInner {
			name,
			typ,
			keys,
			is_user,
			persistent,
			defaults: RwLock::new(Tuple::new()),
			kind: Kind::Virtual(VirtualTable {
				exp: RwLock::new(exp),
			}),
		}))
	}

	/// Builds an in-memory table. With no keys given the table is all-key.
	pub fn new_local(typ: RelationType, keys: Option<Vec<Key>>) -> Result<Table, Error> {
		let keys = match keys {
			Some(keys) => {
				validate_keys(&typ.base, &keys)?;
				keys
			}
			None => vec![all_key(&typ.base)],
		};
		Ok(Table(Arc::new(TableInner {
			name: None,
			typ,
			keys,
			is_user: true,
			persistent: false,
			defaults: RwLock::new(Tuple::new()),
			kind: Kind::Local(LocalTable {
				rows: RwLock::new(Vec::new()),
			}),
		})))
	}

	/// Builds a single-tuple local table, used for relation literals in
	/// constraint rewriting.
	pub(crate) fn singleton(typ: RelationType, tuple: Tuple) -> Result<Table, Error> {
		let t = Table::new_local(typ, None)?;
		t.local_insert(tuple, None)?;
		Ok(t)
	}

	pub fn name(&self) -> Option<&str> {
		self.0.name.as_deref()
	}

	pub fn typ(&self) -> &RelationType {
		&self.0.typ
	}

	pub fn tuple_typ(&self) -> &TupleType {
		&self.0.typ.base
	}

	pub fn keys(&self) -> &[Key] {
		&self.0.keys
	}

	pub fn is_user(&self) -> bool {
		self.0.is_user
	}

	pub fn is_persistent(&self) -> bool {
		self.0.persistent
	}

	pub fn is_real(&self) -> bool {
		matches!(self.0.kind, Kind::Real(_))
	}

	pub fn is_virtual(&self) -> bool {
		matches!(self.0.kind, Kind::Virtual(_))
	}

	pub(crate) fn is_local(&self) -> bool {
		matches!(self.0.kind, Kind::Local(_))
	}

	/// Identity: two handles denote the same table.
	pub fn same(a: &Table, b: &Table) -> bool {
		Arc::ptr_eq(&a.0, &b.0)
			|| (a.name().is_some() && a.name() == b.name())
	}

	pub(crate) fn real(&self) -> Option<&RealTable> {
		match &self.0.kind {
			Kind::Real(r) => Some(r),
			_ => None,
		}
	}

	pub(crate) fn local(&self) -> Option<&LocalTable> {
		match &self.0.kind {
			Kind::Local(l) => Some(l),
			_ => None,
		}
	}

	/// The default attribute values applied to inserted tuples.
	pub fn default_values(&self) -> Tuple {
		self.0.defaults.read().clone()
	}

	pub(crate) fn set_defaults(&self, defaults: Tuple) {
		*self.0.defaults.write() = defaults;
	}

	/// The defining expression of a virtual table, if one has been set.
	pub fn defining_expr(&self) -> Option<Expression> {
		match &self.0.kind {
			Kind::Virtual(v) => v.exp.read().clone(),
			_ => None,
		}
	}

	pub(crate) fn set_defining_expr(&self, exp: Expression) {
		if let Kind::Virtual(v) = &self.0.kind {
			*v.exp.write() = Some(exp);
		}
	}

	/// The number of primary-key fields of a real table.
	pub(crate) fn pkey_len(&self) -> usize {
		self.0.keys[0].len()
	}

	/// Converts a tuple into stored fields, in field order, typechecking
	/// each attribute against the heading.
	pub(crate) fn tuple_fields(&self, tuple: &Tuple) -> Result<Vec<Field>, Error> {
		let real = self
			.real()
			.ok_or_else(|| Error::Internal("field access on a non-stored table".to_string()))?;
		let mut fields: Vec<Field> = vec![Vec::new(); real.field_attrs.len()];
		for attr in &self.tuple_typ().attrs {
			let val = tuple
				.get(&attr.name)
				.ok_or_else(|| Error::InvalidArgument(format!("missing attribute {}", attr.name)))?;
			check_attr_type(val, &attr.typ)?;
			let no = real.attr_map[&attr.name];
			fields[no] = val.to_irep()?;
		}
		Ok(fields)
	}

	/// Converts the primary-key attributes of a tuple into fields.
	pub(crate) fn key_fields(&self, tuple: &Tuple) -> Result<Vec<Field>, Error> {
		let real = self
			.real()
			.ok_or_else(|| Error::Internal("field access on a non-stored table".to_string()))?;
		let mut fields = Vec::with_capacity(self.pkey_len());
		for no in 0..self.pkey_len() {
			let attr = &real.field_attrs[no];
			let val = tuple
				.get(attr)
				.ok_or_else(|| Error::InvalidArgument(format!("missing attribute {attr}")))?;
			fields.push(val.to_irep()?);
		}
		Ok(fields)
	}

	/// Reconstructs a tuple from stored fields.
	pub(crate) fn tuple_from_fields(&self, fields: &[Field]) -> Result<Tuple, Error> {
		let real = self
			.real()
			.ok_or_else(|| Error::Internal("field access on a non-stored table".to_string()))?;
		let mut out = Tuple::new();
		for attr in &self.tuple_typ().attrs {
			let no = real.attr_map[&attr.name];
			out.set(attr.name.clone(), Value::from_irep(&attr.typ, &fields[no])?);
		}
		Ok(out)
	}

	/// Inserts into a local table. An identical tuple raises
	/// ELEMENT_EXISTS; a distinct tuple agreeing on some key raises
	/// KEY_VIOLATION.
	pub(crate) fn local_insert(
		&self,
		tuple: Tuple,
		tx: Option<&Transaction>,
	) -> Result<(), Error> {
		let local = self
			.local()
			.ok_or_else(|| Error::Internal("local insert on a non-local table".to_string()))?;
		for attr in &self.tuple_typ().attrs {
			let val = tuple
				.get(&attr.name)
				.ok_or_else(|| Error::InvalidArgument(format!("missing attribute {}", attr.name)))?;
			check_attr_type(val, &attr.typ)?;
		}
		let names: Vec<&str> = self.tuple_typ().names().collect();
		let tuple = tuple.project(&names);
		let mut rows = local.rows.write();
		for row in rows.iter() {
			for k in &self.0.keys {
				let kattrs: Vec<&str> = k.attrs().iter().map(String::as_str).collect();
				if row.project(&kattrs).equals(&tuple.project(&kattrs), tx)? {
					return if row.equals(&tuple, tx)? {
						Err(Error::ElementExists("tuple is already in table".to_string()))
					} else {
						Err(Error::KeyViolation(format!(
							"key {:?} duplicated",
							k.attrs()
						)))
					};
				}
			}
		}
		rows.push(tuple);
		Ok(())
	}

	pub(crate) fn local_delete(
		&self,
		tuple: &Tuple,
		tx: Option<&Transaction>,
	) -> Result<bool, Error> {
		let local = self
			.local()
			.ok_or_else(|| Error::Internal("local delete on a non-local table".to_string()))?;
		let mut rows = local.rows.write();
		for (i, row) in rows.iter().enumerate() {
			if row.equals(tuple, tx)? {
				rows.remove(i);
				return Ok(true);
			}
		}
		Ok(false)
	}

	/// The tuples of a local table. Raises NOT_SUPPORTED for stored and
	/// virtual tables, whose tuples require a transaction to enumerate.
	pub(crate) fn local_tuples(&self) -> Result<Vec<Tuple>, Error> {
		match self.local() {
			Some(local) => Ok(local.rows.read().clone()),
			None => Err(Error::NotSupported(
				"table value is not materialized in memory".to_string(),
			)),
		}
	}

	/// Set membership.
	pub fn contains(&self, tuple: &Tuple, tx: Option<&Transaction>) -> Result<bool, Error> {
		match &self.0.kind {
			Kind::Local(local) => {
				for row in local.rows.read().iter() {
					if row.equals(tuple, tx)? {
						return Ok(true);
					}
				}
				Ok(false)
			}
			Kind::Real(real) => {
				let tx = tx.ok_or(Error::NoRunningTx)?;
				let rm = real
					.recmap
					.read()
					.ok_or_else(|| Error::Internal("table has no record map".to_string()))?;
				let fields = self.tuple_fields(tuple)?;
				Ok(tx.store().contains_rec(rm, &fields, tx.stx())?)
			}
			Kind::Virtual(_) => self.contains_virtual(tuple, tx),
		}
	}

	fn contains_virtual(&self, tuple: &Tuple, tx: Option<&Transaction>) -> Result<bool, Error> {
		let exp = self
			.defining_expr()
			.ok_or_else(|| Error::InvalidArgument("public table is not mapped".to_string()))?;
		if let Expression::Op(op) = &exp {
			match (op.name.as_str(), op.args.len()) {
				("where", 2) => {
					let inner = eval_table_arg(&op.args[0], tx)?;
					if !op.args[1].evaluate_bool(Some(tuple), tx)? {
						return Ok(false);
					}
					return inner.contains(tuple, tx);
				}
				("union", 2) => {
					let t1 = eval_table_arg(&op.args[0], tx)?;
					let t2 = eval_table_arg(&op.args[1], tx)?;
					return Ok(t1.contains(tuple, tx)? || t2.contains(tuple, tx)?);
				}
				("minus", 2) => {
					let t1 = eval_table_arg(&op.args[0], tx)?;
					let t2 = eval_table_arg(&op.args[1], tx)?;
					return Ok(t1.contains(tuple, tx)? && !t2.contains(tuple, tx)?);
				}
				("semiminus", 2) => {
					let t1 = eval_table_arg(&op.args[0], tx)?;
					let t2 = eval_table_arg(&op.args[1], tx)?;
					return Ok(t1.contains(tuple, tx)? && !contains_matching(&t2, tuple, tx)?);
				}
				("intersect", 2) => {
					let t1 = eval_table_arg(&op.args[0], tx)?;
					let t2 = eval_table_arg(&op.args[1], tx)?;
					return Ok(t1.contains(tuple, tx)? && t2.contains(tuple, tx)?);
				}
				("semijoin", 2) => {
					let t1 = eval_table_arg(&op.args[0], tx)?;
					let t2 = eval_table_arg(&op.args[1], tx)?;
					return Ok(t1.contains(tuple, tx)? && contains_matching(&t2, tuple, tx)?);
				}
				("join", 2) => {
					let t1 = eval_table_arg(&op.args[0], tx)?;
					let t2 = eval_table_arg(&op.args[1], tx)?;
					return Ok(t1.contains(&project_for(&t1, tuple), tx)?
						&& t2.contains(&project_for(&t2, tuple), tx)?);
				}
				("rename", _) => {
					let inner = eval_table_arg(&op.args[0], tx)?;
					let mut back: Vec<(String, String)> = Vec::new();
					let mut i = 1;
					while i + 1 < op.args.len() {
						let from = const_string(&op.args[i])?;
						let to = const_string(&op.args[i + 1])?;
						back.push((to, from));
						i += 2;
					}
					let pairs: Vec<(&str, &str)> =
						back.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
					return inner.contains(&tuple.rename(&pairs), tx);
				}
				("extend", _) => {
					let inner = eval_table_arg(&op.args[0], tx)?;
					let mut i = 1;
					while i + 1 < op.args.len() {
						let name = const_string(&op.args[i])?;
						let val = op.args[i + 1].evaluate(Some(tuple), tx)?;
						match tuple.get(&name) {
							Some(given) if given.equals(&val, tx)? => {}
							_ => return Ok(false),
						}
						i += 2;
					}
					return inner.contains(&project_for(&inner, tuple), tx);
				}
				_ => {}
			}
		}
		// generic fallback: scan
		let mut qr = crate::qrs::QResult::new(self, tx)?;
		while let Some(t) = qr.next(tx)? {
			if t.equals(tuple, tx)? {
				return Ok(true);
			}
		}
		Ok(false)
	}

	/// Whether the table has no tuples.
	pub fn is_empty(&self, tx: Option<&Transaction>) -> Result<bool, Error> {
		let mut qr = crate::qrs::QResult::new(self, tx)?;
		Ok(qr.next(tx)?.is_none())
	}

	/// The number of tuples.
	pub fn count(&self, tx: Option<&Transaction>) -> Result<i64, Error> {
		let mut qr = crate::qrs::QResult::new(self, tx)?;
		let mut n = 0i64;
		while qr.next(tx)?.is_some() {
			n += 1;
		}
		Ok(n)
	}

	/// Materializes the table into tuples, in no particular order.
	pub fn to_tuples(&self, tx: Option<&Transaction>) -> Result<Vec<Tuple>, Error> {
		let mut qr = crate::qrs::QResult::new(self, tx)?;
		let mut out = Vec::new();
		while let Some(t) = qr.next(tx)? {
			out.push(t);
		}
		Ok(out)
	}

	/// Relational value equality: equal headings and mutual containment.
	pub fn equals(&self, other: &Table, tx: Option<&Transaction>) -> Result<bool, Error> {
		if self.typ() != other.typ() {
			return Ok(false);
		}
		let mut qr = crate::qrs::QResult::new(self, tx)?;
		let mut n = 0i64;
		while let Some(t) = qr.next(tx)? {
			if !other.contains(&t, tx)? {
				return Ok(false);
			}
			n += 1;
		}
		Ok(other.count(tx)? == n)
	}
}

/// Projects a tuple onto the heading of a table, dropping foreign
/// attributes.
fn project_for(table: &Table, tuple: &Tuple) -> Tuple {
	let names: Vec<&str> = table.tuple_typ().names().collect();
	tuple.project(&names)
}

/// Whether some tuple of `table` agrees with `tuple` on their common
/// attributes.
pub(crate) fn contains_matching(
	table: &Table,
	tuple: &Tuple,
	tx: Option<&Transaction>,
) -> Result<bool, Error> {
	let common: Vec<&str> =
		table.tuple_typ().names().filter(|n| tuple.contains(n)).collect();
	let probe = tuple.project(&common);
	let mut qr = crate::qrs::QResult::new(table, tx)?;
	while let Some(t) = qr.next(tx)? {
		if t.project(&common).equals(&probe, tx)? {
			return Ok(true);
		}
	}
	Ok(false)
}

/// Evaluates an expression argument that must denote a table.
pub(crate) fn eval_table_arg(
	exp: &Expression,
	tx: Option<&Transaction>,
) -> Result<Table, Error> {
	match exp {
		Expression::TableRef(t) => Ok(t.clone()),
		_ => exp.evaluate(None, tx)?.into_table(),
	}
}

/// Reads a literal string argument of a relational operator.
pub(crate) fn const_string(exp: &Expression) -> Result<String, Error> {
	match exp {
		Expression::Val(v) => Ok(v.string_val()?.to_string()),
		_ => Err(Error::InvalidArgument("string literal expected".to_string())),
	}
}

/// Typechecks an attribute value against the declared attribute type.
pub(crate) fn check_attr_type(val: &Value, typ: &Type) -> Result<(), Error> {
	match val.typ() {
		Some(t) if t == typ => Ok(()),
		None if val.is_tuple() => {
			let derived = Type::Tuple(val.tuple_type()?);
			if &derived == typ {
				Ok(())
			} else {
				Err(Error::TypeMismatch(format!("expected {typ}, got {derived}")))
			}
		}
		Some(t) => Err(Error::TypeMismatch(format!("expected {typ}, got {t}"))),
		None => Err(Error::TypeMismatch(format!("expected {typ}, got untyped value"))),
	}
}
