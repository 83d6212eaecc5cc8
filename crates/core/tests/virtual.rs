mod util;

use reldb_core::dml;
use reldb_core::tbl::{add_virtual_table, create_public_table, create_table, map_public_table};
use reldb_core::typ::{Attr, Type};
use reldb_core::{Error, Expression, Key};
use util::{create_emps1, emp, emp_attrs, new_db};

#[test]
fn insert_through_selection() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);
	let v = emps
		.select(Expression::gt(
			Expression::var("salary"),
			Expression::val(4500.0f64),
		))
		.unwrap();

	// a tuple satisfying the predicate lands in the base table
	dml::insert(&v, emp(5, "D", 5000.0), &tx).unwrap();
	assert!(emps.contains(&emp(5, "D", 5000.0), Some(&tx)).unwrap());

	// a tuple violating it is rejected
	let res = dml::insert(&v, emp(6, "E", 4000.0), &tx);
	assert!(matches!(res, Err(Error::PredicateViolation(_))));
	assert!(!emps.contains(&emp(6, "E", 4000.0), Some(&tx)).unwrap());
	tx.commit().unwrap();
}

#[test]
fn selection_iterates_matching_tuples_only() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);
	let v = emps
		.select(Expression::gt(
			Expression::var("salary"),
			Expression::val(4200.0f64),
		))
		.unwrap();
	let rows = v.to_tuples(Some(&tx)).unwrap();
	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].get("empno").unwrap().int_val().unwrap(), 2);
	tx.commit().unwrap();
}

#[test]
fn insert_through_union_and_extend() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let a = create_table(
		"ua",
		true,
		emp_attrs(),
		None,
		vec![Key::new(["empno"])],
		&mut tx,
	)
	.unwrap();
	let b = create_table(
		"ub",
		true,
		emp_attrs(),
		None,
		vec![Key::new(["empno"])],
		&mut tx,
	)
	.unwrap();
	let u = a.union(&b).unwrap();

	dml::insert(&u, emp(1, "A", 1.0), &tx).unwrap();
	assert!(a.contains(&emp(1, "A", 1.0), Some(&tx)).unwrap());
	assert!(b.contains(&emp(1, "A", 1.0), Some(&tx)).unwrap());

	// inserting it again reports existence
	let res = dml::insert(&u, emp(1, "A", 1.0), &tx);
	assert!(matches!(res, Err(Error::ElementExists(_))));

	// derived attributes must match on insert through extend
	let e = a
		.extend(
			vec![(
				"double".to_string(),
				Expression::op(
					"*",
					vec![Expression::var("salary"), Expression::val(2.0f64)],
				),
			)],
			Some(&tx),
		)
		.unwrap();
	let mut good = emp(2, "B", 3.0);
	good.set("double", reldb_core::Value::from(6.0f64));
	dml::insert(&e, good, &tx).unwrap();
	assert!(a.contains(&emp(2, "B", 3.0), Some(&tx)).unwrap());

	let mut bad = emp(3, "C", 3.0);
	bad.set("double", reldb_core::Value::from(7.0f64));
	let res = dml::insert(&e, bad, &tx);
	assert!(matches!(res, Err(Error::PredicateViolation(_))));
	tx.commit().unwrap();
}

#[test]
fn insert_through_projection_is_not_supported() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);
	let p = emps.project(&["name", "salary"]).unwrap();
	let mut t = reldb_core::val::Tuple::new();
	t.set("name", reldb_core::Value::from("Q"));
	t.set("salary", reldb_core::Value::from(1.0f64));
	let res = dml::insert(&p, t, &tx);
	assert!(matches!(res, Err(Error::NotSupported(_))));

	// the same goes for minus and summarize
	let m = emps.minus(&emps).unwrap();
	let res = dml::insert(&m, emp(8, "H", 1.0), &tx);
	assert!(matches!(res, Err(Error::NotSupported(_))));
	tx.rollback().unwrap();
}

#[test]
fn named_virtual_tables_round_trip_through_the_catalog() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);
	let rich = emps
		.select(Expression::gt(
			Expression::var("salary"),
			Expression::val(4200.0f64),
		))
		.unwrap();
	add_virtual_table("rich", &rich, &mut tx).unwrap();

	// resolvable by name, backed by the same definition
	let found = reldb_core::env::get_table("rich", &tx).unwrap();
	assert_eq!(found.count(Some(&tx)).unwrap(), 1);
	dml::insert(&emps, emp(10, "R", 9000.0), &tx).unwrap();
	assert_eq!(found.count(Some(&tx)).unwrap(), 2);
	tx.commit().unwrap();
}

#[test]
fn public_tables_map_later() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);

	create_public_table(
		"staff",
		vec![
			Attr::new("empno", Type::integer()),
			Attr::new("name", Type::string()),
		],
		vec![Key::new(["empno"])],
		&mut tx,
	)
	.unwrap();

	// unmapped: not iterable yet
	let staff = reldb_core::env::get_table("staff", &tx).unwrap();
	assert!(staff.to_tuples(Some(&tx)).is_err());

	// a mapping with the wrong type is rejected
	let res = map_public_table(
		"staff",
		Expression::var("emps1"),
		&mut tx,
	);
	assert!(matches!(res, Err(Error::TypeMismatch(_))));

	// project emps1 onto the declared heading and map it
	map_public_table(
		"staff",
		Expression::op(
			"project",
			vec![
				Expression::var("emps1"),
				Expression::val("empno"),
				Expression::val("name"),
			],
		),
		&mut tx,
	)
	.unwrap();
	assert_eq!(staff.count(Some(&tx)).unwrap(), 2);
	dml::insert(&emps, emp(3, "C", 1.0), &tx).unwrap();
	assert_eq!(staff.count(Some(&tx)).unwrap(), 3);
	tx.commit().unwrap();
}
