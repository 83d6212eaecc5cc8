//! Creation and deletion of base tables.
//!
//! Persistent tables get catalog rows and a named record map whose
//! primary-key fields come first; every further candidate key is enforced by
//! a unique secondary index. Transient tables are local in-memory tables:
//! they honor the same key invariants but leave no trace in the catalog.

use super::{all_key, validate_keys, Key, Kind, LocalTable, RealTable, Table, TableInner};
use crate::err::Error;
use crate::kvs::{FieldDef, Transaction};
use crate::typ::{Attr, RelationType, TupleType};
use crate::val::Tuple;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Creates a user table.
///
/// With `persistent` set, catalog rows are written and a record map is
/// requested from the record store; otherwise the table lives in memory for
/// the duration of the session. Passing no keys declares the table all-key.
pub fn create_table(
	name: &str,
	persistent: bool,
	attrs: Vec<Attr>,
	defaults: Option<Tuple>,
	keys: Vec<Key>,
	tx: &mut Transaction,
) -> Result<Table, Error> {
	if name.starts_with("sys_") {
		return Err(Error::InvalidArgument(format!("reserved table name {name}")));
	}
	let table = create_table_i(Some(name), persistent, true, attrs, defaults, keys, tx)?;
	tx.environment().cache_table(&table);
	Ok(table)
}

/// Creates a table without touching the environment cache; used for system
/// tables and for user tables alike.
pub(crate) fn create_table_i(
	name: Option<&str>,
	persistent: bool,
	is_user: bool,
	attrs: Vec<Attr>,
	defaults: Option<Tuple>,
	keys: Vec<Key>,
	tx: &Transaction,
) -> Result<Table, Error> {
	let heading = TupleType::new(attrs)?;
	let keys = if keys.is_empty() {
		vec![all_key(&heading)]
	} else {
		keys
	};
	validate_keys(&heading, &keys)?;
	if let Some(defaults) = &defaults {
		for (attr, val) in defaults.iter() {
			match heading.attr(attr) {
				Some(a) => super::check_attr_type(val, &a.typ)?,
				None => {
					return Err(Error::InvalidArgument(format!(
						"default for unknown attribute {attr}"
					)))
				}
			}
		}
	}
	let typ = RelationType::new(heading);

	let table = if persistent {
		let name = name.ok_or_else(|| {
			Error::InvalidArgument("a persistent table needs a name".to_string())
		})?;
		create_stored(name, typ, keys, is_user, tx)?
	} else {
		let t = Table::new_local(typ, Some(keys))?;
		// transient tables may still carry a name for the session
		Table(Arc::new(TableInner {
			name: name.map(str::to_string),
			typ: t.0.typ.clone(),
			keys: t.0.keys.clone(),
			is_user,
			persistent: false,
			defaults: RwLock::new(Tuple::new()),
			kind: Kind::Local(LocalTable {
				rows: RwLock::new(Vec::new()),
			}),
		}))
	};
	if let Some(defaults) = defaults {
		table.set_defaults(defaults);
	}

	if persistent && is_user {
		crate::cat::insert_table(&table, tx)?;
	}
	Ok(table)
}

/// Builds the stored backing of a table: field numbering with the primary
/// key first, the record map, and one unique index per further key.
pub(crate) fn create_stored(
	name: &str,
	typ: RelationType,
	keys: Vec<Key>,
	is_user: bool,
	tx: &Transaction,
) -> Result<Table, Error> {
	let pkey = &keys[0];
	let mut field_attrs: Vec<String> = pkey.attrs().to_vec();
	for attr in &typ.base.attrs {
		if !pkey.contains(&attr.name) {
			field_attrs.push(attr.name.clone());
		}
	}
	let attr_map: HashMap<String, usize> =
		field_attrs.iter().enumerate().map(|(no, a)| (a.clone(), no)).collect();
	let field_defs: Vec<FieldDef> = field_attrs
		.iter()
		.map(|a| FieldDef {
			len: typ.base.attr(a).expect("attr from the same heading").typ.irep_len(),
		})
		.collect();

	let store = tx.store();
	let rm = store.create_recmap(Some(name), field_defs, pkey.len(), tx.stx())?;
	let mut indexes = Vec::new();
	for (i, key) in keys.iter().enumerate().skip(1) {
		let fieldnos: Vec<usize> = key.attrs().iter().map(|a| attr_map[a]).collect();
		let ixname = format!("{name}_k{i}");
		let ix = store.create_index(rm, Some(&ixname), fieldnos, true, tx.stx())?;
		indexes.push((ix, key.clone()));
	}
	debug!("created stored table {name} with {} keys", keys.len());

	Ok(Table(Arc::new(TableInner {
		name: Some(name.to_string()),
		typ,
		keys,
		is_user,
		persistent: true,
		defaults: RwLock::new(Tuple::new()),
		kind: Kind::Real(RealTable {
			recmap: RwLock::new(Some(rm)),
			attr_map,
			field_attrs,
			indexes: RwLock::new(indexes),
		}),
	})))
}

/// Re-attaches a stored table read back from the catalog to its record map.
pub(crate) fn open_stored(
	name: &str,
	typ: RelationType,
	keys: Vec<Key>,
	is_user: bool,
	tx: &Transaction,
) -> Result<Table, Error> {
	let pkey = &keys[0];
	let mut field_attrs: Vec<String> = pkey.attrs().to_vec();
	for attr in &typ.base.attrs {
		if !pkey.contains(&attr.name) {
			field_attrs.push(attr.name.clone());
		}
	}
	let attr_map: HashMap<String, usize> =
		field_attrs.iter().enumerate().map(|(no, a)| (a.clone(), no)).collect();
	let rm = tx.store().open_recmap(name, tx.stx())?;
	Ok(Table(Arc::new(TableInner {
		name: Some(name.to_string()),
		typ,
		keys,
		is_user,
		persistent: true,
		defaults: RwLock::new(Tuple::new()),
		kind: Kind::Real(RealTable {
			recmap: RwLock::new(Some(rm)),
			attr_map,
			field_attrs,
			indexes: RwLock::new(Vec::new()),
		}),
	})))
}

/// Registers an anonymous virtual table under a name, persisting its
/// defining expression in the catalog.
pub fn add_virtual_table(name: &str, table: &Table, tx: &mut Transaction) -> Result<Table, Error> {
	if name.starts_with("sys_") {
		return Err(Error::InvalidArgument(format!("reserved table name {name}")));
	}
	let def = table.defining_expr().ok_or_else(|| {
		Error::InvalidArgument("only a virtual table can be registered by definition".to_string())
	})?;
	let named = Table::new_virtual(
		Some(name.to_string()),
		table.typ().clone(),
		table.keys().to_vec(),
		Some(def),
		true,
		true,
	);
	crate::cat::insert_vtable(&named, tx)?;
	tx.environment().cache_table(&named);
	Ok(named)
}

/// Drops a table. Catalog rows are deleted at once; for stored tables the
/// record map and its indexes are scheduled for deletion when the top-level
/// transaction commits.
pub fn drop_table(table: &Table, tx: &mut Transaction) -> Result<(), Error> {
	if table.is_persistent() {
		crate::cat::delete_table(table, tx)?;
	}
	if let Some(real) = table.real() {
		for (ix, _) in real.indexes.write().drain(..) {
			tx.del_index(ix);
		}
		if let Some(rm) = real.recmap.write().take() {
			tx.del_recmap(rm);
		}
	}
	if let Some(name) = table.name() {
		tx.environment().uncache_table(name);
	}
	debug!("dropped table {:?}", table.name());
	Ok(())
}
