mod util;

use reldb_core::dml;
use reldb_core::rel::SummarizeAdd;
use reldb_core::tbl::create_table;
use reldb_core::typ::{Attr, RelationType, TupleType, Type};
use reldb_core::val::Tuple;
use reldb_core::{Error, Expression, Key, Table, Value};
use util::{create_emps1, emp, new_db};

fn dee() -> Table {
	let t = Table::new_local(
		RelationType::new(TupleType::new(Vec::new()).unwrap()),
		None,
	)
	.unwrap();
	t
}

fn count_and_avg(emps: &Table, per: &Table, tx: &reldb_core::Transaction) -> Table {
	emps.summarize(
		per,
		vec![
			SummarizeAdd {
				exp: Expression::op("count", vec![]),
				name: "n".to_string(),
			},
			SummarizeAdd {
				exp: Expression::op("avg", vec![Expression::var("salary")]),
				name: "m".to_string(),
			},
		],
		Some(tx),
	)
	.unwrap()
}

#[test]
fn summarize_by_the_empty_heading() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);
	dml::update(
		&emps,
		None,
		vec![dml::AttrUpdate::new("salary", Expression::val(4500.0f64))],
		&tx,
	)
	.unwrap();
	dml::update(
		&emps,
		Some(Expression::eq(Expression::var("empno"), Expression::val(2i64))),
		vec![dml::AttrUpdate::new("salary", Expression::val(4600.0f64))],
		&tx,
	)
	.unwrap();

	let per = dee();
	dml::insert(&per, Tuple::new(), &tx).unwrap();
	let summary = count_and_avg(&emps, &per, &tx);
	let rows = summary.to_tuples(Some(&tx)).unwrap();
	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].get("n").unwrap().int_val().unwrap(), 2);
	assert_eq!(rows[0].get("m").unwrap().float_val().unwrap(), 4550.0);
	tx.commit().unwrap();
}

#[test]
fn avg_over_no_tuples_is_undefined_on_read() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);
	dml::delete(&emps, None, &tx).unwrap();

	let per = dee();
	dml::insert(&per, Tuple::new(), &tx).unwrap();
	let summary = count_and_avg(&emps, &per, &tx);
	let mut qr = reldb_core::qrs::QResult::new(&summary, Some(&tx)).unwrap();
	let res = qr.next(Some(&tx));
	assert!(matches!(res, Err(Error::AggregateUndefined)));
	tx.commit().unwrap();
}

#[test]
fn summarize_per_groups() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let sales = create_table(
		"sales",
		true,
		vec![
			Attr::new("id", Type::integer()),
			Attr::new("region", Type::string()),
			Attr::new("amount", Type::integer()),
		],
		None,
		vec![Key::new(["id"])],
		&mut tx,
	)
	.unwrap();
	for (id, region, amount) in
		[(1, "n", 10), (2, "n", 20), (3, "s", 5), (4, "s", 7), (5, "w", 0)]
	{
		let mut t = Tuple::new();
		t.set("id", Value::from(id as i64));
		t.set("region", Value::from(region));
		t.set("amount", Value::from(amount as i64));
		dml::insert(&sales, t, &tx).unwrap();
	}
	let per = sales.project(&["region"]).unwrap();
	let summary = sales
		.summarize(
			&per,
			vec![
				SummarizeAdd {
					exp: Expression::op("sum", vec![Expression::var("amount")]),
					name: "total".to_string(),
				},
				SummarizeAdd {
					exp: Expression::op("max", vec![Expression::var("amount")]),
					name: "best".to_string(),
				},
			],
			Some(&tx),
		)
		.unwrap();
	// the key set is the key set of the per table
	assert_eq!(summary.keys().len(), 1);
	assert!(summary.keys()[0].set_eq(&Key::new(["region"])));

	let mut rows = summary.to_tuples(Some(&tx)).unwrap();
	rows.sort_by_key(|t| t.get("region").unwrap().string_val().unwrap().to_string());
	let flat: Vec<(String, i64, i64)> = rows
		.iter()
		.map(|t| {
			(
				t.get("region").unwrap().string_val().unwrap().to_string(),
				t.get("total").unwrap().int_val().unwrap(),
				t.get("best").unwrap().int_val().unwrap(),
			)
		})
		.collect();
	assert_eq!(
		flat,
		vec![
			("n".to_string(), 30, 20),
			("s".to_string(), 12, 7),
			("w".to_string(), 0, 0),
		]
	);
	tx.commit().unwrap();
}

#[test]
fn aggregates_as_expressions() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);

	let count = Expression::op("count", vec![Expression::var("emps1")])
		.evaluate(None, Some(&tx))
		.unwrap();
	assert_eq!(count.int_val().unwrap(), 2);

	let max = Expression::op(
		"max",
		vec![Expression::var("emps1"), Expression::var("salary")],
	)
	.evaluate(None, Some(&tx))
	.unwrap();
	assert_eq!(max.float_val().unwrap(), 4400.0);

	let any = Expression::op(
		"any",
		vec![
			Expression::var("emps1"),
			Expression::gt(Expression::var("salary"), Expression::val(4200.0f64)),
		],
	)
	.evaluate(None, Some(&tx))
	.unwrap();
	assert!(any.bool_val().unwrap());

	dml::delete(&emps, None, &tx).unwrap();
	let res = Expression::op(
		"avg",
		vec![Expression::var("emps1"), Expression::var("salary")],
	)
	.evaluate(None, Some(&tx));
	assert!(matches!(res, Err(Error::AggregateUndefined)));
	tx.commit().unwrap();
}

#[test]
fn group_and_ungroup() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let sales = create_table(
		"gsales",
		true,
		vec![
			Attr::new("region", Type::string()),
			Attr::new("id", Type::integer()),
		],
		None,
		vec![Key::new(["id"])],
		&mut tx,
	)
	.unwrap();
	for (region, id) in [("n", 1), ("n", 2), ("s", 3)] {
		let mut t = Tuple::new();
		t.set("region", Value::from(region));
		t.set("id", Value::from(id as i64));
		dml::insert(&sales, t, &tx).unwrap();
	}

	let grouped = sales.group(&["id"], "ids").unwrap();
	// the grouping attributes become the key
	assert!(grouped.keys()[0].set_eq(&Key::new(["region"])));
	let rows = grouped.to_tuples(Some(&tx)).unwrap();
	assert_eq!(rows.len(), 2);
	for row in &rows {
		let ids = row.get("ids").unwrap().as_table().unwrap();
		let expect = match row.get("region").unwrap().string_val().unwrap() {
			"n" => 2,
			_ => 1,
		};
		assert_eq!(ids.count(Some(&tx)).unwrap(), expect);
	}

	// ungroup restores the original
	let flat = grouped.ungroup("ids").unwrap();
	assert!(flat.equals(&sales, Some(&tx)).unwrap());
	tx.commit().unwrap();
}

#[test]
fn wrap_and_unwrap() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);
	let wrapped = emps.wrap(&["name", "salary"], "info").unwrap();
	let rows = wrapped.to_tuples(Some(&tx)).unwrap();
	assert_eq!(rows.len(), 2);
	assert!(rows[0].get("info").unwrap().as_tuple().is_ok());

	let back = wrapped.unwrap_attr("info").unwrap();
	assert!(back.equals(&emps, Some(&tx)).unwrap());
	tx.commit().unwrap();
}

#[test]
fn transitive_closure_converges() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let edges = create_table(
		"edges",
		true,
		vec![
			Attr::new("src", Type::integer()),
			Attr::new("dst", Type::integer()),
		],
		None,
		vec![],
		&mut tx,
	)
	.unwrap();
	for (src, dst) in [(1, 2), (2, 3), (3, 4)] {
		let mut t = Tuple::new();
		t.set("src", Value::from(src as i64));
		t.set("dst", Value::from(dst as i64));
		dml::insert(&edges, t, &tx).unwrap();
	}
	let closure = edges.tclose().unwrap();
	assert_eq!(closure.count(Some(&tx)).unwrap(), 6);
	let mut probe = Tuple::new();
	probe.set("src", Value::from(1i64));
	probe.set("dst", Value::from(4i64));
	assert!(closure.contains(&probe, Some(&tx)).unwrap());
	tx.commit().unwrap();
}

#[test]
fn divide_selects_complete_matches() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	// students, required courses, and passed exams
	let students = create_table(
		"students",
		true,
		vec![Attr::new("student", Type::string())],
		None,
		vec![],
		&mut tx,
	)
	.unwrap();
	let courses = create_table(
		"courses",
		true,
		vec![Attr::new("course", Type::string())],
		None,
		vec![],
		&mut tx,
	)
	.unwrap();
	let exams = create_table(
		"exams",
		true,
		vec![
			Attr::new("student", Type::string()),
			Attr::new("course", Type::string()),
		],
		None,
		vec![],
		&mut tx,
	)
	.unwrap();
	for s in ["ada", "bob"] {
		let mut t = Tuple::new();
		t.set("student", Value::from(s));
		dml::insert(&students, t, &tx).unwrap();
	}
	for c in ["db", "os"] {
		let mut t = Tuple::new();
		t.set("course", Value::from(c));
		dml::insert(&courses, t, &tx).unwrap();
	}
	for (s, c) in [("ada", "db"), ("ada", "os"), ("bob", "db")] {
		let mut t = Tuple::new();
		t.set("student", Value::from(s));
		t.set("course", Value::from(c));
		dml::insert(&exams, t, &tx).unwrap();
	}
	let complete = students.divide(&courses, &exams).unwrap();
	let rows = complete.to_tuples(Some(&tx)).unwrap();
	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].get("student").unwrap().string_val().unwrap(), "ada");
	tx.commit().unwrap();
}
