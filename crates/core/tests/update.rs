mod util;

use reldb_core::dml::{self, AttrUpdate};
use reldb_core::{Error, Expression};
use util::{create_emps1, emps_rows, new_db};

fn empno_eq(no: i64) -> Expression {
	Expression::eq(Expression::var("empno"), Expression::val(no))
}

#[test]
fn update_strategies_end_to_end() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);

	// unconditional update, simple scan
	let n = dml::update(
		&emps,
		None,
		vec![AttrUpdate::new("salary", Expression::val(4500.0f64))],
		&tx,
	)
	.unwrap();
	assert_eq!(n, 2);

	// key attribute update forces the buffered rewrite
	let n = dml::update(
		&emps,
		Some(empno_eq(2)),
		vec![AttrUpdate::new("empno", Expression::val(3i64))],
		&tx,
	)
	.unwrap();
	assert_eq!(n, 1);

	// point update through the primary index
	let n = dml::update(
		&emps,
		Some(empno_eq(1)),
		vec![AttrUpdate::new("name", Expression::val("Smythe"))],
		&tx,
	)
	.unwrap();
	assert_eq!(n, 1);

	// self-referencing value expression
	let n = dml::update(
		&emps,
		Some(empno_eq(3)),
		vec![AttrUpdate::new(
			"salary",
			Expression::op(
				"+",
				vec![Expression::var("salary"), Expression::val(100.0f64)],
			),
		)],
		&tx,
	)
	.unwrap();
	assert_eq!(n, 1);

	let rows = emps_rows(&emps, &tx);
	assert_eq!(
		rows,
		vec![(1, "Smythe".to_string(), 4500.0), (3, "B".to_string(), 4600.0)]
	);
	tx.commit().unwrap();
}

#[test]
fn key_collision_is_reported() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);

	let res = dml::update(
		&emps,
		Some(empno_eq(2)),
		vec![AttrUpdate::new("empno", Expression::val(1i64))],
		&tx,
	);
	assert!(matches!(res, Err(Error::KeyViolation(_))));
	tx.rollback().unwrap();
}

#[test]
fn updating_unknown_attribute_fails() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);
	let res = dml::update(
		&emps,
		None,
		vec![AttrUpdate::new("wage", Expression::val(1.0f64))],
		&tx,
	);
	assert!(matches!(res, Err(Error::Name(_))));
	tx.rollback().unwrap();
}

#[test]
fn delete_with_and_without_condition() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);

	// point delete via the key
	assert_eq!(dml::delete(&emps, Some(empno_eq(1)), &tx).unwrap(), 1);
	assert_eq!(dml::delete(&emps, Some(empno_eq(1)), &tx).unwrap(), 0);
	// scan delete of everything left
	assert_eq!(dml::delete(&emps, None, &tx).unwrap(), 1);
	assert!(emps.is_empty(Some(&tx)).unwrap());
	tx.commit().unwrap();
}

#[test]
fn insert_duplicate_distinctions() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);

	// identical tuple: element exists
	let res = dml::insert(&emps, util::emp(1, "A", 4000.0), &tx);
	assert!(matches!(res, Err(Error::ElementExists(_))));
	// same key, different tuple: key violation
	let res = dml::insert(&emps, util::emp(1, "Z", 1.0), &tx);
	assert!(matches!(res, Err(Error::KeyViolation(_))));
	tx.rollback().unwrap();
}
