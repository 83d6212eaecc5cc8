mod util;

use reldb_core::ops::call_ro;
use reldb_core::tbl::create_table;
use reldb_core::typ::{define_type, drop_type, get_type, implement_type, Attr, Possrep, Type};
use reldb_core::{Error, Expression, Key, Value};
use util::new_db;

fn define_point(tx: &reldb_core::Transaction) {
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
		tx,
	)
	.unwrap();
	implement_type("point", None, None, tx).unwrap();
}

fn define_polar(tx: &reldb_core::Transaction) {
	define_type(
		"polarpoint",
		vec![Possrep {
			name: "polar".to_string(),
			comps: vec![
				Attr::new("r", Type::float()),
				Attr::new("theta", Type::float()),
			],
		}],
		Some(Expression::op(
			">=",
			vec![Expression::var("r"), Expression::val(0.0f64)],
		)),
		None,
		false,
		tx,
	)
	.unwrap();
	implement_type("polarpoint", None, None, tx).unwrap();
}

#[test]
fn selector_equality_and_type_constraint() {
	let db = new_db();
	let tx = db.begin().unwrap();
	define_point(&tx);
	define_polar(&tx);

	let a = call_ro(
		"cart",
		vec![Value::from(1.0f64), Value::from(0.0f64)],
		Some(&tx),
	)
	.unwrap();
	let b = call_ro(
		"cart",
		vec![Value::from(1.0f64), Value::from(0.0f64)],
		Some(&tx),
	)
	.unwrap();
	assert!(a.equals(&b, Some(&tx)).unwrap());

	let c = call_ro(
		"cart",
		vec![Value::from(2.0f64), Value::from(0.0f64)],
		Some(&tx),
	)
	.unwrap();
	assert!(!a.equals(&c, Some(&tx)).unwrap());

	// the constraint admits a valid polar point
	let ok = call_ro(
		"polar",
		vec![Value::from(1.0f64), Value::from(0.0f64)],
		Some(&tx),
	);
	assert!(ok.is_ok());

	// and rejects a negative radius
	let res = call_ro(
		"polar",
		vec![Value::from(-1.0f64), Value::from(0.0f64)],
		Some(&tx),
	);
	assert!(matches!(res, Err(Error::TypeConstraintViolation(_))));
	tx.commit().unwrap();
}

#[test]
fn components_read_and_write() {
	let db = new_db();
	let tx = db.begin().unwrap();
	define_point(&tx);
	define_polar(&tx);

	let p = call_ro(
		"cart",
		vec![Value::from(3.0f64), Value::from(4.0f64)],
		Some(&tx),
	)
	.unwrap();
	assert_eq!(p.get_comp("x", Some(&tx)).unwrap().float_val().unwrap(), 3.0);
	assert_eq!(p.get_comp("y", Some(&tx)).unwrap().float_val().unwrap(), 4.0);

	let mut p2 = p.clone();
	p2.set_comp("x", Value::from(5.0f64), Some(&tx)).unwrap();
	assert_eq!(p2.get_comp("x", Some(&tx)).unwrap().float_val().unwrap(), 5.0);

	// a component write violating the constraint leaves the value intact
	let mut q = call_ro(
		"polar",
		vec![Value::from(1.0f64), Value::from(0.5f64)],
		Some(&tx),
	)
	.unwrap();
	let res = q.set_comp("r", Value::from(-2.0f64), Some(&tx));
	assert!(matches!(res, Err(Error::TypeConstraintViolation(_))));
	assert_eq!(q.get_comp("r", Some(&tx)).unwrap().float_val().unwrap(), 1.0);
	tx.commit().unwrap();
}

#[test]
fn user_types_in_tables() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	define_point(&tx);
	let point = get_type("point", &tx).unwrap();

	let table = create_table(
		"places",
		true,
		vec![
			Attr::new("name", Type::string()),
			Attr::new("loc", point.clone()),
		],
		None,
		vec![Key::new(["name"])],
		&mut tx,
	)
	.unwrap();

	let loc = call_ro(
		"cart",
		vec![Value::from(1.5f64), Value::from(2.5f64)],
		Some(&tx),
	)
	.unwrap();
	let mut t = reldb_core::val::Tuple::new();
	t.set("name", Value::from("home"));
	t.set("loc", loc.clone());
	reldb_core::dml::insert(&table, t, &tx).unwrap();

	let rows = table.to_tuples(Some(&tx)).unwrap();
	assert_eq!(rows.len(), 1);
	let read = rows[0].get("loc").unwrap();
	assert!(read.equals(&loc, Some(&tx)).unwrap());
	assert_eq!(
		read.get_comp("y", Some(&tx)).unwrap().float_val().unwrap(),
		2.5
	);

	// the type cannot be dropped while the table uses it
	let res = drop_type("point", &tx);
	assert!(matches!(res, Err(Error::InUse(_))));
	tx.commit().unwrap();
}

#[test]
fn drop_type_removes_selector() {
	let db = new_db();
	let tx = db.begin().unwrap();
	define_point(&tx);
	drop_type("point", &tx).unwrap();
	assert!(matches!(get_type("point", &tx), Err(Error::NotFound(_))));
	let res = call_ro(
		"cart",
		vec![Value::from(0.0f64), Value::from(0.0f64)],
		Some(&tx),
	);
	assert!(matches!(res, Err(Error::OperatorNotFound(_))));
	tx.commit().unwrap();
}

#[test]
fn ordered_type_comparison_derives_from_components() {
	let db = new_db();
	let tx = db.begin().unwrap();
	define_type(
		"money",
		vec![Possrep {
			name: "amount".to_string(),
			comps: vec![Attr::new("cents", Type::integer())],
		}],
		None,
		None,
		true,
		&tx,
	)
	.unwrap();
	implement_type("money", None, None, &tx).unwrap();

	let a = call_ro("amount", vec![Value::from(100i64)], Some(&tx)).unwrap();
	let b = call_ro("amount", vec![Value::from(250i64)], Some(&tx)).unwrap();
	let lt = call_ro("<", vec![a.clone(), b.clone()], Some(&tx)).unwrap();
	assert!(lt.bool_val().unwrap());
	let ge = call_ro(">=", vec![a, b], Some(&tx)).unwrap();
	assert!(!ge.bool_val().unwrap());
	tx.commit().unwrap();
}

#[test]
fn redefining_a_type_fails() {
	let db = new_db();
	let tx = db.begin().unwrap();
	define_point(&tx);
	let res = define_type("point", Vec::new(), None, None, false, &tx);
	assert!(matches!(res, Err(Error::ElementExists(_))));
	let res = define_type("integer", Vec::new(), None, None, false, &tx);
	assert!(matches!(res, Err(Error::ElementExists(_))));
	tx.commit().unwrap();
}
