mod util;

use reldb_core::dml;
use reldb_core::tbl::create_table;
use reldb_core::typ::{Attr, Type};
use reldb_core::val::Tuple;
use reldb_core::{Key, Value};
use util::{create_emps1, new_db};

fn dept(deptno: i64, empno: i64) -> Tuple {
	let mut t = Tuple::new();
	t.set("deptno", Value::from(deptno));
	t.set("empno", Value::from(empno));
	t
}

#[test]
fn join_keys_and_cardinality() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);
	let depts = create_table(
		"depts",
		true,
		vec![
			Attr::new("deptno", Type::integer()),
			Attr::new("empno", Type::integer()),
		],
		None,
		vec![Key::new(["empno"])],
		&mut tx,
	)
	.unwrap();
	dml::insert(&depts, dept(10, 1), &tx).unwrap();
	dml::insert(&depts, dept(20, 7), &tx).unwrap();

	let joined = emps.join(&depts).unwrap();
	// both inputs are keyed on empno, so the join is too
	assert_eq!(joined.keys().len(), 1);
	assert!(joined.keys()[0].set_eq(&Key::new(["empno"])));

	// the cardinality equals that of the semijoin
	let n = joined.count(Some(&tx)).unwrap();
	let semi = emps.semijoin(&depts).unwrap();
	assert_eq!(n, semi.count(Some(&tx)).unwrap());
	assert_eq!(n, 1);

	let rows = joined.to_tuples(Some(&tx)).unwrap();
	assert_eq!(rows[0].get("deptno").unwrap().int_val().unwrap(), 10);
	assert_eq!(rows[0].get("name").unwrap().string_val().unwrap(), "A");

	// semiminus keeps the unmatched employee
	let rest = emps.semiminus(&depts).unwrap();
	let rows = rest.to_tuples(Some(&tx)).unwrap();
	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].get("empno").unwrap().int_val().unwrap(), 2);
	tx.commit().unwrap();
}

#[test]
fn join_with_dee_is_identity() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);

	// the unary relation with no attributes and one tuple
	let dee = reldb_core::Table::new_local(
		reldb_core::typ::RelationType::new(reldb_core::typ::TupleType::new(Vec::new()).unwrap()),
		None,
	)
	.unwrap();
	dml::insert(&dee, Tuple::new(), &tx).unwrap();

	let joined = emps.join(&dee).unwrap();
	assert!(joined.equals(&emps, Some(&tx)).unwrap());
	tx.commit().unwrap();
}

#[test]
fn cross_join_multiplies() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);
	let tags = create_table(
		"tags",
		true,
		vec![Attr::new("tag", Type::string())],
		None,
		vec![Key::new(["tag"])],
		&mut tx,
	)
	.unwrap();
	for tag in ["x", "y", "z"] {
		let mut t = Tuple::new();
		t.set("tag", Value::from(tag));
		dml::insert(&tags, t, &tx).unwrap();
	}
	let crossed = emps.join(&tags).unwrap();
	assert_eq!(crossed.count(Some(&tx)).unwrap(), 6);
	// disjoint keys cross-multiply
	assert_eq!(crossed.keys().len(), 1);
	assert!(crossed.keys()[0].set_eq(&Key::new(["empno", "tag"])));
	tx.commit().unwrap();
}
