mod util;

use reldb_core::cst::create_constraint;
use reldb_core::dml;
use reldb_core::kvs::MemStore;
use reldb_core::ops::call_ro;
use reldb_core::typ::{define_type, get_type, implement_type, Attr, Possrep, Type};
use reldb_core::{Environment, Error, Expression, Value};
use util::{create_emps1, emp};

#[test]
fn everything_survives_a_reopen() {
	let store = MemStore::new();

	{
		let env = Environment::open(Box::new(store.clone())).unwrap();
		let db = env.create_database("test").unwrap();
		let mut tx = db.begin().unwrap();
		create_emps1(&mut tx);
		define_type(
			"point",
			vec![Possrep {
				name: "cart".to_string(),
				comps: vec![
					Attr::new("x", Type::float()),
					Attr::new("y", Type::float()),
				],
			}],
			None,
			None,
			false,
			&tx,
		)
		.unwrap();
		implement_type("point", None, None, &tx).unwrap();
		create_constraint(
			"emps_salary_nonneg",
			Expression::op(
				"is_empty",
				vec![Expression::op(
					"where",
					vec![
						Expression::var("emps1"),
						Expression::lt(Expression::var("salary"), Expression::val(0.0f64)),
					],
				)],
			),
			&tx,
		)
		.unwrap();
		tx.commit().unwrap();
	}

	// a second environment over the same store discovers everything
	let env = Environment::open(Box::new(store)).unwrap();
	let db = env.get_database("test").unwrap();
	let tx = db.begin().unwrap();

	let emps = reldb_core::env::get_table("emps1", &tx).unwrap();
	assert_eq!(emps.count(Some(&tx)).unwrap(), 2);
	assert_eq!(emps.keys().len(), 1);

	let point = get_type("point", &tx).unwrap();
	assert!(point.as_scalar().unwrap().is_sysimpl());
	let p = call_ro(
		"cart",
		vec![Value::from(1.0f64), Value::from(2.0f64)],
		Some(&tx),
	)
	.unwrap();
	assert_eq!(p.get_comp("y", Some(&tx)).unwrap().float_val().unwrap(), 2.0);

	// the constraint was rehydrated and still fires
	let res = dml::insert(&emps, emp(4, "C", -1.0), &tx);
	assert!(matches!(res, Err(Error::PredicateViolation(_))));
	dml::insert(&emps, emp(4, "C", 1.0), &tx).unwrap();
	tx.commit().unwrap();
}

#[test]
fn unknown_database_is_not_found() {
	let env = Environment::memory().unwrap();
	assert!(matches!(env.get_database("nope"), Err(Error::NotFound(_))));
	env.create_database("db1").unwrap();
	assert!(matches!(env.create_database("db1"), Err(Error::ElementExists(_))));
	assert!(env.get_database("db1").is_ok());
}

#[test]
fn the_catalog_is_queryable_like_any_table() {
	let store = MemStore::new();
	let env = Environment::open(Box::new(store)).unwrap();
	let db = env.create_database("test").unwrap();
	let mut tx = db.begin().unwrap();
	create_emps1(&mut tx);

	let rtables = reldb_core::env::get_table("sys_rtables", &tx).unwrap();
	let row = rtables
		.select(Expression::eq(
			Expression::var("tablename"),
			Expression::val("emps1"),
		))
		.unwrap();
	let rows = row.to_tuples(Some(&tx)).unwrap();
	assert_eq!(rows.len(), 1);
	assert!(rows[0].get("is_user").unwrap().bool_val().unwrap());

	let keys = reldb_core::env::get_table("sys_keys", &tx).unwrap();
	let row = keys
		.select(Expression::eq(
			Expression::var("tablename"),
			Expression::val("emps1"),
		))
		.unwrap();
	let rows = row.to_tuples(Some(&tx)).unwrap();
	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].get("attrs").unwrap().string_val().unwrap(), "empno");

	// every catalog table is linked to the database
	let dbtables = reldb_core::env::get_table("sys_dbtables", &tx).unwrap();
	let linked = dbtables
		.select(Expression::eq(
			Expression::var("dbname"),
			Expression::val("test"),
		))
		.unwrap();
	assert!(linked.count(Some(&tx)).unwrap() >= 14);
	tx.commit().unwrap();
}

#[test]
fn serialize_builtin_round_trips() {
	let db = util::new_db();
	let tx = db.begin().unwrap();
	let bin = call_ro("serialize", vec![Value::from(42i64)], Some(&tx)).unwrap();
	assert!(bin.binary_val().unwrap().len() > 8);
	tx.commit().unwrap();
}
