//! The catalog.
//!
//! The system tables describe every persistent table, type, operator and
//! constraint. They are themselves tables of the engine: every catalog row
//! is read and written through the same relational operations that serve
//! users, so the catalog is queryable like any other data.

pub mod serialize;

use crate::cst::Constraint;
use crate::err::Error;
use crate::expr::Expression;
use crate::kvs::Transaction;
use crate::ops::{Operator, Parameter};
use crate::tbl::{Key, Table};
use crate::typ::{Attr, Possrep, RelationType, ScalarType, TupleType, Type};
use crate::val::{Tuple, Value};
use std::sync::Arc;

/// The catalog format version. Opening an environment written by a
/// different major version fails with VERSION_MISMATCH.
const VERSION_MAJOR: i64 = 1;
const VERSION_MINOR: i64 = 0;

/// Handles to the open system tables.
pub(crate) struct Catalog {
	pub(crate) rtables: Table,
	pub(crate) vtables: Table,
	pub(crate) ptables: Table,
	pub(crate) tableattrs: Table,
	pub(crate) defvals: Table,
	pub(crate) keys: Table,
	pub(crate) types: Table,
	pub(crate) possreps: Table,
	pub(crate) possrepcomps: Table,
	pub(crate) ro_ops: Table,
	pub(crate) upd_ops: Table,
	pub(crate) constraints: Table,
	pub(crate) dbtables: Table,
	pub(crate) version: Table,
}

impl Catalog {
	/// The system tables in a fixed order, for self-registration and
	/// database linking.
	fn all(&self) -> [&Table; 14] {
		[
			&self.rtables,
			&self.vtables,
			&self.ptables,
			&self.tableattrs,
			&self.defvals,
			&self.keys,
			&self.types,
			&self.possreps,
			&self.possrepcomps,
			&self.ro_ops,
			&self.upd_ops,
			&self.constraints,
			&self.dbtables,
			&self.version,
		]
	}
}

struct SysTableDef {
	name: &'static str,
	attrs: fn() -> Vec<Attr>,
	keys: fn() -> Vec<Key>,
}

const SYS_TABLES: &[SysTableDef] = &[
	SysTableDef {
		name: "sys_rtables",
		attrs: || {
			vec![
				Attr::new("tablename", Type::string()),
				Attr::new("is_user", Type::boolean()),
				Attr::new("recmap", Type::string()),
			]
		},
		keys: || vec![Key::new(["tablename"])],
	},
	SysTableDef {
		name: "sys_vtables",
		attrs: || {
			vec![
				Attr::new("tablename", Type::string()),
				Attr::new("is_user", Type::boolean()),
				Attr::new("i_def", Type::binary()),
			]
		},
		keys: || vec![Key::new(["tablename"])],
	},
	SysTableDef {
		name: "sys_ptables",
		attrs: || {
			vec![
				Attr::new("tablename", Type::string()),
				Attr::new("is_user", Type::boolean()),
				Attr::new("i_def", Type::binary()),
			]
		},
		keys: || vec![Key::new(["tablename"])],
	},
	SysTableDef {
		name: "sys_tableattrs",
		attrs: || {
			vec![
				Attr::new("tablename", Type::string()),
				Attr::new("attrname", Type::string()),
				Attr::new("typ", Type::binary()),
				Attr::new("fno", Type::integer()),
			]
		},
		keys: || vec![Key::new(["tablename", "attrname"])],
	},
	SysTableDef {
		name: "sys_tableattr_defvals",
		attrs: || {
			vec![
				Attr::new("tablename", Type::string()),
				Attr::new("attrname", Type::string()),
				Attr::new("default_value", Type::binary()),
			]
		},
		keys: || vec![Key::new(["tablename", "attrname"])],
	},
	SysTableDef {
		name: "sys_keys",
		attrs: || {
			vec![
				Attr::new("tablename", Type::string()),
				Attr::new("keyno", Type::integer()),
				Attr::new("attrs", Type::string()),
			]
		},
		keys: || vec![Key::new(["tablename", "keyno"])],
	},
	SysTableDef {
		name: "sys_types",
		attrs: || {
			vec![
				Attr::new("typename", Type::string()),
				Attr::new("i_arep_len", Type::integer()),
				Attr::new("i_sysimpl", Type::boolean()),
				Attr::new("ordered", Type::boolean()),
				Attr::new("i_arep_type", Type::binary()),
				Attr::new("i_constraint", Type::binary()),
				Attr::new("i_init", Type::binary()),
			]
		},
		keys: || vec![Key::new(["typename"])],
	},
	SysTableDef {
		name: "sys_possreps",
		attrs: || {
			vec![
				Attr::new("typename", Type::string()),
				Attr::new("possrepname", Type::string()),
			]
		},
		keys: || vec![Key::new(["typename", "possrepname"])],
	},
	SysTableDef {
		name: "sys_possrepcomps",
		attrs: || {
			vec![
				Attr::new("typename", Type::string()),
				Attr::new("possrepname", Type::string()),
				Attr::new("compno", Type::integer()),
				Attr::new("compname", Type::string()),
				Attr::new("comptype", Type::binary()),
			]
		},
		keys: || {
			vec![
				Key::new(["typename", "possrepname", "compno"]),
				Key::new(["typename", "possrepname", "compname"]),
			]
		},
	},
	SysTableDef {
		name: "sys_ro_ops",
		attrs: || {
			vec![
				Attr::new("name", Type::string()),
				Attr::new("argtypes", Type::array(Type::binary())),
				Attr::new("rtype", Type::binary()),
				Attr::new("lib", Type::string()),
				Attr::new("symbol", Type::string()),
				Attr::new("source", Type::string()),
			]
		},
		keys: || vec![Key::new(["name", "argtypes"])],
	},
	SysTableDef {
		name: "sys_upd_ops",
		attrs: || {
			vec![
				Attr::new("name", Type::string()),
				Attr::new("argtypes", Type::array(Type::binary())),
				Attr::new("updflags", Type::string()),
				Attr::new("lib", Type::string()),
				Attr::new("symbol", Type::string()),
				Attr::new("source", Type::string()),
			]
		},
		keys: || vec![Key::new(["name", "argtypes"])],
	},
	SysTableDef {
		name: "sys_constraints",
		attrs: || {
			vec![
				Attr::new("constraintname", Type::string()),
				Attr::new("i_expr", Type::binary()),
			]
		},
		keys: || vec![Key::new(["constraintname"])],
	},
	SysTableDef {
		name: "sys_dbtables",
		attrs: || {
			vec![
				Attr::new("tablename", Type::string()),
				Attr::new("dbname", Type::string()),
			]
		},
		keys: || vec![Key::new(["tablename", "dbname"])],
	},
	SysTableDef {
		name: "sys_version_info",
		attrs: || {
			vec![
				Attr::new("major", Type::integer()),
				Attr::new("minor", Type::integer()),
			]
		},
		keys: || vec![Key::new(["major", "minor"])],
	},
];

/// Opens or creates the system tables. Returns the catalog and whether the
/// environment was freshly created.
pub(crate) fn bootstrap(tx: &Transaction) -> Result<(Catalog, bool), Error> {
	let mut tables = Vec::with_capacity(SYS_TABLES.len());
	let mut fresh = false;
	for def in SYS_TABLES {
		let heading = TupleType::new((def.attrs)())?;
		let typ = RelationType::new(heading);
		let table = match crate::tbl::open_stored(def.name, typ.clone(), (def.keys)(), false, tx)
		{
			Ok(t) => t,
			Err(Error::NotFound(_)) => {
				fresh = true;
				crate::tbl::create_stored(def.name, typ, (def.keys)(), false, tx)?
			}
			Err(e) => return Err(e),
		};
		tables.push(table);
	}
	let mut it = tables.into_iter();
	let cat = Catalog {
		rtables: it.next().expect("fixed table list"),
		vtables: it.next().expect("fixed table list"),
		ptables: it.next().expect("fixed table list"),
		tableattrs: it.next().expect("fixed table list"),
		defvals: it.next().expect("fixed table list"),
		keys: it.next().expect("fixed table list"),
		types: it.next().expect("fixed table list"),
		possreps: it.next().expect("fixed table list"),
		possrepcomps: it.next().expect("fixed table list"),
		ro_ops: it.next().expect("fixed table list"),
		upd_ops: it.next().expect("fixed table list"),
		constraints: it.next().expect("fixed table list"),
		dbtables: it.next().expect("fixed table list"),
		version: it.next().expect("fixed table list"),
	};
	if fresh {
		info!("creating catalog, format {VERSION_MAJOR}.{VERSION_MINOR}");
		crate::dml::insert_unchecked(
			&cat.version,
			tuple!("major" => VERSION_MAJOR, "minor" => VERSION_MINOR),
			tx,
		)?;
	} else {
		let rows = cat.version.to_tuples(Some(tx))?;
		let ok = rows.iter().any(|t| {
			t.get("major").and_then(|v| v.int_val().ok()) == Some(VERSION_MAJOR)
		});
		if !ok {
			return Err(Error::VersionMismatch(format!(
				"catalog was not written by format {VERSION_MAJOR}.x"
			)));
		}
	}
	Ok((cat, fresh))
}

/// Registers the system tables themselves in the catalog of a fresh
/// environment.
pub(crate) fn register_systables(cat: &Catalog, tx: &Transaction) -> Result<(), Error> {
	for table in cat.all() {
		insert_table_meta(cat, table, tx)?;
	}
	Ok(())
}

fn syscat(tx: &Transaction) -> Result<Arc<Catalog>, Error> {
	tx.environment().catalog()
}

fn eq_str(attr: &str, value: &str) -> Expression {
	Expression::eq(Expression::var(attr), Expression::val(value))
}

/// The rows of a catalog table matching a condition.
fn rows(table: &Table, cond: Expression, tx: &Transaction) -> Result<Vec<Tuple>, Error> {
	table.select(cond)?.to_tuples(Some(tx))
}

// --- tables ---------------------------------------------------------------

/// Writes the catalog rows describing a stored table.
pub(crate) fn insert_table(table: &Table, tx: &Transaction) -> Result<(), Error> {
	let cat = syscat(tx)?;
	insert_table_meta(&cat, table, tx)?;
	link_table(
		table.name().expect("persistent tables are named"),
		tx.database().name(),
		tx,
	)?;
	Ok(())
}

fn insert_table_meta(cat: &Catalog, table: &Table, tx: &Transaction) -> Result<(), Error> {
	let name = table.name().expect("persistent tables are named").to_string();
	crate::dml::insert_unchecked(
		&cat.rtables,
		tuple!(
			"tablename" => name.clone(),
			"is_user" => table.is_user(),
			"recmap" => name.clone()
		),
		tx,
	)?;
	let real = table
		.real()
		.ok_or_else(|| Error::Internal("catalog row for a non-stored table".to_string()))?;
	for attr in &table.tuple_typ().attrs {
		let fno = real.attr_map[&attr.name] as i64;
		crate::dml::insert_unchecked(
			&cat.tableattrs,
			tuple!(
				"tablename" => name.clone(),
				"attrname" => attr.name.clone(),
				"typ" => serialize::type_to_bin(&attr.typ),
				"fno" => fno
			),
			tx,
		)?;
	}
	for (attr, val) in table.default_values().iter() {
		crate::dml::insert_unchecked(
			&cat.defvals,
			tuple!(
				"tablename" => name.clone(),
				"attrname" => attr.clone(),
				"default_value" => serialize::value_to_bin(val)?
			),
			tx,
		)?;
	}
	insert_keys(cat, &name, table.keys(), tx)?;
	Ok(())
}

fn insert_keys(
	cat: &Catalog,
	name: &str,
	keys: &[Key],
	tx: &Transaction,
) -> Result<(), Error> {
	for (keyno, key) in keys.iter().enumerate() {
		crate::dml::insert_unchecked(
			&cat.keys,
			tuple!(
				"tablename" => name.to_string(),
				"keyno" => keyno as i64,
				"attrs" => key.attrs().join(" ")
			),
			tx,
		)?;
	}
	Ok(())
}

/// Links a table to a database in sys_dbtables.
pub(crate) fn link_table(name: &str, dbname: &str, tx: &Transaction) -> Result<(), Error> {
	if dbname.is_empty() {
		return Ok(());
	}
	let cat = syscat(tx)?;
	match crate::dml::insert_unchecked(
		&cat.dbtables,
		tuple!("tablename" => name.to_string(), "dbname" => dbname.to_string()),
		tx,
	) {
		Ok(()) | Err(Error::ElementExists(_)) => Ok(()),
		Err(e) => Err(e),
	}
}

/// Writes the catalog rows describing a named persistent virtual table.
pub(crate) fn insert_vtable(table: &Table, tx: &Transaction) -> Result<(), Error> {
	let cat = syscat(tx)?;
	let name = table.name().expect("persistent tables are named").to_string();
	let def = table
		.defining_expr()
		.ok_or_else(|| Error::InvalidArgument("virtual table has no definition".to_string()))?;
	crate::dml::insert_unchecked(
		&cat.vtables,
		tuple!(
			"tablename" => name.clone(),
			"is_user" => table.is_user(),
			"i_def" => serialize::expr_to_bin(&def)?
		),
		tx,
	)?;
	insert_keys(&cat, &name, table.keys(), tx)?;
	link_table(&name, tx.database().name(), tx)
}

/// Writes the catalog rows describing a public table. The mapping
/// expression starts out empty.
pub(crate) fn insert_ptable(table: &Table, tx: &Transaction) -> Result<(), Error> {
	let cat = syscat(tx)?;
	let name = table.name().expect("persistent tables are named").to_string();
	crate::dml::insert_unchecked(
		&cat.ptables,
		tuple!(
			"tablename" => name.clone(),
			"is_user" => table.is_user(),
			"i_def" => Vec::<u8>::new()
		),
		tx,
	)?;
	for (no, attr) in table.tuple_typ().attrs.iter().enumerate() {
		crate::dml::insert_unchecked(
			&cat.tableattrs,
			tuple!(
				"tablename" => name.clone(),
				"attrname" => attr.name.clone(),
				"typ" => serialize::type_to_bin(&attr.typ),
				"fno" => no as i64
			),
			tx,
		)?;
	}
	insert_keys(&cat, &name, table.keys(), tx)?;
	link_table(&name, tx.database().name(), tx)
}

/// Stores the mapping expression of a public table.
pub(crate) fn update_ptable_def(
	name: &str,
	exp: &Expression,
	tx: &Transaction,
) -> Result<(), Error> {
	let cat = syscat(tx)?;
	let cond = eq_str("tablename", name);
	let updates = vec![crate::dml::AttrUpdate::new(
		"i_def",
		Expression::val(serialize::expr_to_bin(exp)?),
	)];
	let n = crate::dml::update_unchecked(&cat.ptables, Some(&cond), &updates, tx)?;
	if n == 0 {
		return Err(Error::NotFound(format!("public table {name}")));
	}
	Ok(())
}

/// Removes every catalog row describing a table.
pub(crate) fn delete_table(table: &Table, tx: &Transaction) -> Result<(), Error> {
	let cat = syscat(tx)?;
	let name = table.name().expect("persistent tables are named");
	for t in [
		&cat.rtables,
		&cat.vtables,
		&cat.ptables,
		&cat.tableattrs,
		&cat.defvals,
		&cat.keys,
		&cat.dbtables,
	] {
		crate::dml::delete_unchecked(t, Some(&eq_str("tablename", name)), tx)?;
	}
	Ok(())
}

/// Reconstructs a table from its catalog rows.
pub(crate) fn read_table(name: &str, tx: &Transaction) -> Result<Table, Error> {
	let cat = syscat(tx)?;
	let keys = read_keys(&cat, name, tx)?;

	let rrows = rows(&cat.rtables, eq_str("tablename", name), tx)?;
	if let Some(row) = rrows.first() {
		let is_user = row.get("is_user").expect("catalog schema").bool_val()?;
		let mut attrs = read_attrs(&cat, name, tx)?;
		attrs.sort_by_key(|(fno, _)| *fno);
		let heading =
			TupleType::new(attrs.into_iter().map(|(_, a)| a).collect())?;
		let table = crate::tbl::open_stored(
			name,
			RelationType::new(heading),
			keys,
			is_user,
			tx,
		)?;
		let drows = rows(&cat.defvals, eq_str("tablename", name), tx)?;
		if !drows.is_empty() {
			let mut defaults = Tuple::new();
			for d in drows {
				let attr = d.get("attrname").expect("catalog schema").string_val()?;
				let bin = d.get("default_value").expect("catalog schema").binary_val()?;
				defaults.set(attr, serialize::value_from_bin(bin, Some(tx))?);
			}
			table.set_defaults(defaults);
		}
		return Ok(table);
	}

	let vrows = rows(&cat.vtables, eq_str("tablename", name), tx)?;
	if let Some(row) = vrows.first() {
		let is_user = row.get("is_user").expect("catalog schema").bool_val()?;
		let def = serialize::expr_from_bin(
			row.get("i_def").expect("catalog schema").binary_val()?,
			tx,
		)?;
		let shape = crate::tbl::eval_table_arg(&def, Some(tx))?;
		return Ok(Table::new_virtual(
			Some(name.to_string()),
			shape.typ().clone(),
			if keys.is_empty() {
				shape.keys().to_vec()
			} else {
				keys
			},
			Some(def),
			true,
			is_user,
		));
	}

	let prows = rows(&cat.ptables, eq_str("tablename", name), tx)?;
	if let Some(row) = prows.first() {
		let is_user = row.get("is_user").expect("catalog schema").bool_val()?;
		let mut attrs = read_attrs(&cat, name, tx)?;
		attrs.sort_by_key(|(fno, _)| *fno);
		let heading =
			TupleType::new(attrs.into_iter().map(|(_, a)| a).collect())?;
		let bin = row.get("i_def").expect("catalog schema").binary_val()?;
		let def = if bin.is_empty() {
			None
		} else {
			Some(serialize::expr_from_bin(bin, tx)?)
		};
		return Ok(Table::new_virtual(
			Some(name.to_string()),
			RelationType::new(heading),
			keys,
			def,
			true,
			is_user,
		));
	}

	Err(Error::NotFound(format!("table {name}")))
}

fn read_attrs(
	cat: &Catalog,
	name: &str,
	tx: &Transaction,
) -> Result<Vec<(i64, Attr)>, Error> {
	let mut out = Vec::new();
	for row in rows(&cat.tableattrs, eq_str("tablename", name), tx)? {
		let attr = row.get("attrname").expect("catalog schema").string_val()?.to_string();
		let typ = serialize::type_from_bin(
			row.get("typ").expect("catalog schema").binary_val()?,
			Some(tx),
		)?;
		let fno = row.get("fno").expect("catalog schema").int_val()?;
		out.push((fno, Attr::new(attr, typ)));
	}
	Ok(out)
}

fn read_keys(cat: &Catalog, name: &str, tx: &Transaction) -> Result<Vec<Key>, Error> {
	let mut rows_ = rows(&cat.keys, eq_str("tablename", name), tx)?;
	rows_.sort_by_key(|t| t.get("keyno").and_then(|v| v.int_val().ok()).unwrap_or(0));
	let mut out = Vec::with_capacity(rows_.len());
	for row in rows_ {
		let attrs = row.get("attrs").expect("catalog schema").string_val()?;
		out.push(Key::new(attrs.split_whitespace()));
	}
	Ok(out)
}

// --- databases ------------------------------------------------------------

/// Whether any table is linked to the given database name.
pub(crate) fn database_exists(dbname: &str, tx: &Transaction) -> Result<bool, Error> {
	let cat = syscat(tx)?;
	Ok(!rows(&cat.dbtables, eq_str("dbname", dbname), tx)?.is_empty())
}

/// Registers a database by linking the catalog tables to its name.
pub(crate) fn register_database(dbname: &str, tx: &Transaction) -> Result<(), Error> {
	let cat = syscat(tx)?;
	for table in cat.all() {
		let name = table.name().expect("system tables are named").to_string();
		crate::dml::insert_unchecked(
			&cat.dbtables,
			tuple!("tablename" => name, "dbname" => dbname.to_string()),
			tx,
		)?;
	}
	Ok(())
}

// --- operators ------------------------------------------------------------

fn argtypes_value(params: &[Parameter]) -> Value {
	Value::array(
		params.iter().map(|p| Value::from(serialize::type_to_bin(&p.typ))).collect(),
		Type::binary(),
	)
}

fn op_row_fields(op: &Operator) -> Result<(String, Value, String, String), Error> {
	let (lib, symbol) = match &op.kind {
		crate::ops::OpKind::Extern {
			lib,
			symbol,
			..
		} => (lib.clone(), symbol.clone()),
		crate::ops::OpKind::Host {
			tag, ..
		} => (tag.clone(), String::new()),
		crate::ops::OpKind::SysSelect => {
			(String::new(), crate::ops::create::SYS_SELECT_SYMBOL.to_string())
		}
		_ => (String::new(), String::new()),
	};
	Ok((op.name.clone(), argtypes_value(&op.params), lib, symbol))
}

pub(crate) fn insert_ro_op(op: &Operator, tx: &Transaction) -> Result<(), Error> {
	let cat = syscat(tx)?;
	let (name, argtypes, lib, symbol) = op_row_fields(op)?;
	let rtyp = op
		.rtyp
		.as_ref()
		.ok_or_else(|| Error::Internal("read-only operator without type".to_string()))?;
	let mut row = tuple!(
		"name" => name,
		"rtype" => serialize::type_to_bin(rtyp),
		"lib" => lib,
		"symbol" => symbol,
		"source" => op.source.clone()
	);
	row.set("argtypes", argtypes);
	crate::dml::insert_unchecked(&cat.ro_ops, row, tx)
}

pub(crate) fn insert_upd_op(op: &Operator, tx: &Transaction) -> Result<(), Error> {
	let cat = syscat(tx)?;
	let (name, argtypes, lib, symbol) = op_row_fields(op)?;
	let updflags: String =
		op.params.iter().map(|p| if p.update { '1' } else { '0' }).collect();
	let mut row = tuple!(
		"name" => name,
		"updflags" => updflags,
		"lib" => lib,
		"symbol" => symbol,
		"source" => op.source.clone()
	);
	row.set("argtypes", argtypes);
	crate::dml::insert_unchecked(&cat.upd_ops, row, tx)
}

fn row_params(row: &Tuple, tx: &Transaction) -> Result<Vec<Parameter>, Error> {
	let arr = row.get("argtypes").expect("catalog schema").as_array()?;
	let mut params = Vec::with_capacity(arr.len());
	for v in arr.iter() {
		params.push(Parameter::ro(serialize::type_from_bin(v.binary_val()?, Some(tx))?));
	}
	Ok(params)
}

/// Hydrates the read-only overloads of a name from the catalog into the
/// environment's operator map. Returns how many were loaded.
pub(crate) fn load_ro_ops(name: &str, tx: &Transaction) -> Result<usize, Error> {
	let cat = syscat(tx)?;
	let found = rows(&cat.ro_ops, eq_str("name", name), tx)?;
	let n = found.len();
	for row in found {
		let params = row_params(&row, tx)?;
		let rtyp = serialize::type_from_bin(
			row.get("rtype").expect("catalog schema").binary_val()?,
			Some(tx),
		)?;
		let lib = row.get("lib").expect("catalog schema").string_val()?;
		let symbol = row.get("symbol").expect("catalog schema").string_val()?;
		let source = row.get("source").expect("catalog schema").string_val()?;
		let op = crate::ops::create::make_operator(
			name,
			params,
			false,
			Some(rtyp),
			lib,
			symbol,
			source,
			false,
			tx,
		);
		tx.environment().dbroot().ro_ops.put(Arc::new(op));
	}
	Ok(n)
}

pub(crate) fn load_upd_ops(name: &str, tx: &Transaction) -> Result<usize, Error> {
	let cat = syscat(tx)?;
	let found = rows(&cat.upd_ops, eq_str("name", name), tx)?;
	let n = found.len();
	for row in found {
		let mut params = row_params(&row, tx)?;
		let updflags = row.get("updflags").expect("catalog schema").string_val()?;
		for (p, flag) in params.iter_mut().zip(updflags.chars()) {
			p.update = flag == '1';
		}
		let lib = row.get("lib").expect("catalog schema").string_val()?;
		let symbol = row.get("symbol").expect("catalog schema").string_val()?;
		let source = row.get("source").expect("catalog schema").string_val()?;
		let op = crate::ops::create::make_operator(
			name,
			params,
			false,
			None,
			lib,
			symbol,
			source,
			true,
			tx,
		);
		tx.environment().dbroot().upd_ops.put(Arc::new(op));
	}
	Ok(n)
}

/// Deletes every catalog row of an operator name. Returns whether any
/// existed.
pub(crate) fn delete_ops(name: &str, tx: &Transaction) -> Result<bool, Error> {
	let cat = syscat(tx)?;
	let n1 = crate::dml::delete_unchecked(&cat.ro_ops, Some(&eq_str("name", name)), tx)?;
	let n2 = crate::dml::delete_unchecked(&cat.upd_ops, Some(&eq_str("name", name)), tx)?;
	Ok(n1 + n2 > 0)
}

// --- constraints ----------------------------------------------------------

pub(crate) fn insert_constraint(
	name: &str,
	exp: &Expression,
	tx: &Transaction,
) -> Result<(), Error> {
	let cat = syscat(tx)?;
	crate::dml::insert_unchecked(
		&cat.constraints,
		tuple!(
			"constraintname" => name.to_string(),
			"i_expr" => serialize::expr_to_bin(exp)?
		),
		tx,
	)
}

pub(crate) fn read_constraints(tx: &Transaction) -> Result<Vec<Constraint>, Error> {
	let cat = syscat(tx)?;
	let mut out = Vec::new();
	for row in cat.constraints.to_tuples(Some(tx))? {
		let name =
			row.get("constraintname").expect("catalog schema").string_val()?.to_string();
		let exp = serialize::expr_from_bin(
			row.get("i_expr").expect("catalog schema").binary_val()?,
			tx,
		)?;
		out.push(Constraint {
			name,
			exp,
		});
	}
	Ok(out)
}

pub(crate) fn delete_constraint(name: &str, tx: &Transaction) -> Result<(), Error> {
	let cat = syscat(tx)?;
	let n = crate::dml::delete_unchecked(&cat.constraints, Some(&eq_str("constraintname", name)), tx)?;
	if n == 0 {
		return Err(Error::NotFound(format!("constraint {name}")));
	}
	Ok(())
}

// --- types ----------------------------------------------------------------

/// Writes the catalog rows of a freshly defined type.
pub(crate) fn insert_type(st: &ScalarType, tx: &Transaction) -> Result<(), Error> {
	let cat = syscat(tx)?;
	let constraint_bin = match st.constraint() {
		Some(e) => serialize::expr_to_bin(e)?,
		None => Vec::new(),
	};
	let init_bin = match st.init_expr() {
		Some(e) => serialize::expr_to_bin(e)?,
		None => Vec::new(),
	};
	crate::dml::insert_unchecked(
		&cat.types,
		tuple!(
			"typename" => st.name().to_string(),
			"i_arep_len" => -1i64,
			"i_sysimpl" => false,
			"ordered" => st.is_ordered(),
			"i_arep_type" => Vec::<u8>::new(),
			"i_constraint" => constraint_bin,
			"i_init" => init_bin
		),
		tx,
	)?;
	for rep in st.possreps() {
		crate::dml::insert_unchecked(
			&cat.possreps,
			tuple!(
				"typename" => st.name().to_string(),
				"possrepname" => rep.name.clone()
			),
			tx,
		)?;
		for (no, comp) in rep.comps.iter().enumerate() {
			crate::dml::insert_unchecked(
				&cat.possrepcomps,
				tuple!(
					"typename" => st.name().to_string(),
					"possrepname" => rep.name.clone(),
					"compno" => no as i64,
					"compname" => comp.name.clone(),
					"comptype" => serialize::type_to_bin(&comp.typ)
				),
				tx,
			)?;
		}
	}
	Ok(())
}

/// Records the physical representation chosen by implement_type.
pub(crate) fn update_type_impl(
	name: &str,
	arep: Option<&Type>,
	areplen: i64,
	sysimpl: bool,
	tx: &Transaction,
) -> Result<(), Error> {
	let cat = syscat(tx)?;
	let arep_bin = match arep {
		Some(t) => serialize::type_to_bin(t),
		None => Vec::new(),
	};
	let cond = eq_str("typename", name);
	let updates = vec![
		crate::dml::AttrUpdate::new("i_arep_len", Expression::val(areplen)),
		crate::dml::AttrUpdate::new("i_sysimpl", Expression::val(sysimpl)),
		crate::dml::AttrUpdate::new("i_arep_type", Expression::val(arep_bin)),
	];
	let n = crate::dml::update_unchecked(&cat.types, Some(&cond), &updates, tx)?;
	if n == 0 {
		return Err(Error::NotFound(format!("type {name}")));
	}
	Ok(())
}

/// Reconstructs a user-defined type from its catalog rows.
pub(crate) fn read_type(name: &str, tx: &Transaction) -> Result<Arc<ScalarType>, Error> {
	let cat = syscat(tx)?;
	let trows = rows(&cat.types, eq_str("typename", name), tx)?;
	let row = trows
		.first()
		.ok_or_else(|| Error::NotFound(format!("type {name}")))?;
	let ordered = row.get("ordered").expect("catalog schema").bool_val()?;
	let sysimpl = row.get("i_sysimpl").expect("catalog schema").bool_val()?;
	let arep_len = row.get("i_arep_len").expect("catalog schema").int_val()?;
	let arep_bin = row.get("i_arep_type").expect("catalog schema").binary_val()?.to_vec();

	let mut possreps = Vec::new();
	for rep in rows(&cat.possreps, eq_str("typename", name), tx)? {
		let repname = rep.get("possrepname").expect("catalog schema").string_val()?;
		let mut comps = Vec::new();
		for c in rows(
			&cat.possrepcomps,
			Expression::and(eq_str("typename", name), eq_str("possrepname", repname)),
			tx,
		)? {
			let no = c.get("compno").expect("catalog schema").int_val()?;
			let cname = c.get("compname").expect("catalog schema").string_val()?.to_string();
			let ctyp = serialize::type_from_bin(
				c.get("comptype").expect("catalog schema").binary_val()?,
				Some(tx),
			)?;
			comps.push((no, Attr::new(cname, ctyp)));
		}
		comps.sort_by_key(|(no, _)| *no);
		possreps.push(Possrep {
			name: repname.to_string(),
			comps: comps.into_iter().map(|(_, a)| a).collect(),
		});
	}

	let constraint_bin = row.get("i_constraint").expect("catalog schema").binary_val()?;
	let constraint = if constraint_bin.is_empty() {
		None
	} else {
		Some(serialize::expr_from_bin(constraint_bin, tx)?)
	};
	let init_bin = row.get("i_init").expect("catalog schema").binary_val()?;
	let init = if init_bin.is_empty() {
		None
	} else {
		Some(serialize::expr_from_bin(init_bin, tx)?)
	};

	let st = ScalarType::new_user(name, possreps, constraint, init, ordered);
	if sysimpl || !arep_bin.is_empty() || arep_len >= 0 {
		let arep = if arep_bin.is_empty() {
			None
		} else {
			Some(serialize::type_from_bin(&arep_bin, Some(tx))?)
		};
		st.set_impl(crate::typ::TypeImpl {
			arep,
			areplen: (arep_len >= 0).then_some(arep_len as usize),
			sysimpl,
		})?;
	}
	Ok(Arc::new(st))
}

/// Removes every catalog row of a type.
pub(crate) fn delete_type(name: &str, tx: &Transaction) -> Result<(), Error> {
	let cat = syscat(tx)?;
	crate::dml::delete_unchecked(&cat.types, Some(&eq_str("typename", name)), tx)?;
	crate::dml::delete_unchecked(&cat.possreps, Some(&eq_str("typename", name)), tx)?;
	crate::dml::delete_unchecked(&cat.possrepcomps, Some(&eq_str("typename", name)), tx)?;
	Ok(())
}

/// Whether a scalar type name occurs anywhere in a type tree.
fn type_mentions(typ: &Type, name: &str) -> bool {
	match typ {
		Type::Scalar(st) => st.name() == name,
		Type::Tuple(tt) => tt.attrs.iter().any(|a| type_mentions(&a.typ, name)),
		Type::Relation(rt) => rt.base.attrs.iter().any(|a| type_mentions(&a.typ, name)),
		Type::Array(base) => type_mentions(base, name),
	}
}

/// Reports what still uses a type: a table attribute or an operator
/// signature. Selectors of the type itself are ignored, as they fall with
/// it.
pub(crate) fn type_usage(name: &str, tx: &Transaction) -> Result<Option<String>, Error> {
	let cat = syscat(tx)?;
	for row in cat.tableattrs.to_tuples(Some(tx))? {
		let typ = serialize::type_from_bin(
			row.get("typ").expect("catalog schema").binary_val()?,
			Some(tx),
		)?;
		if type_mentions(&typ, name) {
			let table = row.get("tablename").expect("catalog schema").string_val()?;
			return Ok(Some(format!("table {table}")));
		}
	}
	for (ops, has_rtype) in [(&cat.ro_ops, true), (&cat.upd_ops, false)] {
		for row in ops.to_tuples(Some(tx))? {
			let opname = row.get("name").expect("catalog schema").string_val()?;
			let selector = has_rtype && {
				let rtyp = serialize::type_from_bin(
					row.get("rtype").expect("catalog schema").binary_val()?,
					Some(tx),
				)?;
				rtyp.name() == Some(name)
					&& rtyp.as_scalar().is_some_and(|st| st.possrep(opname).is_some())
			};
			if selector {
				continue;
			}
			for v in row.get("argtypes").expect("catalog schema").as_array()?.iter() {
				let t = serialize::type_from_bin(v.binary_val()?, Some(tx))?;
				if type_mentions(&t, name) {
					return Ok(Some(format!("operator {opname}")));
				}
			}
			if has_rtype {
				let rtyp = serialize::type_from_bin(
					row.get("rtype").expect("catalog schema").binary_val()?,
					Some(tx),
				)?;
				if type_mentions(&rtyp, name) {
					return Ok(Some(format!("operator {opname}")));
				}
			}
		}
	}
	Ok(None)
}
