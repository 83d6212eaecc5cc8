//! Shared helpers for the integration tests.

#![allow(dead_code)]

use reldb_core::dml;
use reldb_core::tbl::create_table;
use reldb_core::typ::{Attr, Type};
use reldb_core::val::Tuple;
use reldb_core::{Database, Environment, Key, Table, Transaction, Value};

pub fn new_db() -> Database {
	let env = Environment::memory().expect("open in-memory environment");
	env.create_database("test").expect("create database")
}

pub fn emp_attrs() -> Vec<Attr> {
	vec![
		Attr::new("empno", Type::integer()),
		Attr::new("name", Type::string()),
		Attr::new("salary", Type::float()),
	]
}

pub fn emp(no: i64, name: &str, salary: f64) -> Tuple {
	let mut t = Tuple::new();
	t.set("empno", Value::from(no));
	t.set("name", Value::from(name));
	t.set("salary", Value::from(salary));
	t
}

/// Creates the emps1 table used across the suites and fills it with two
/// rows.
pub fn create_emps1(tx: &mut Transaction) -> Table {
	let table = create_table(
		"emps1",
		true,
		emp_attrs(),
		None,
		vec![Key::new(["empno"])],
		tx,
	)
	.expect("create emps1");
	dml::insert(&table, emp(1, "A", 4000.0), tx).expect("insert");
	dml::insert(&table, emp(2, "B", 4400.0), tx).expect("insert");
	table
}

/// The tuples of a table as (empno, name, salary), ordered by empno.
pub fn emps_rows(table: &Table, tx: &Transaction) -> Vec<(i64, String, f64)> {
	let tuples = reldb_core::qrs::table_to_array(
		table,
		&[reldb_core::qrs::SeqItem::asc("empno")],
		Some(tx),
	)
	.expect("materialize");
	tuples
		.iter()
		.map(|t| {
			(
				t.get("empno").unwrap().int_val().unwrap(),
				t.get("name").unwrap().string_val().unwrap().to_string(),
				t.get("salary").unwrap().float_val().unwrap(),
			)
		})
		.collect()
}
