mod util;

use reldb_core::dml;
use reldb_core::qrs::{table_to_array, QResult, SeqItem};
use reldb_core::tbl::create_table;
use reldb_core::{Expression, Key, Table};
use util::{create_emps1, emp, emp_attrs, new_db};

#[test]
fn union_intersect_minus_with_self() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);

	let u = emps.union(&emps).unwrap();
	assert!(u.equals(&emps, Some(&tx)).unwrap());

	let i = emps.intersect(&emps).unwrap();
	assert!(i.equals(&emps, Some(&tx)).unwrap());

	let m = emps.minus(&emps).unwrap();
	assert!(m.is_empty(Some(&tx)).unwrap());
	assert_eq!(m.typ(), emps.typ());
	tx.commit().unwrap();
}

#[test]
fn projection_composition() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);

	let wide = emps.project(&["empno", "name", "salary"]).unwrap();
	let narrow_direct = emps.project(&["name"]).unwrap();
	let narrow_composed = wide.project(&["name"]).unwrap();
	assert!(narrow_composed.equals(&narrow_direct, Some(&tx)).unwrap());
	tx.commit().unwrap();
}

#[test]
fn projection_with_key_loss_deduplicates() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);
	dml::insert(&emps, emp(3, "A", 1.0), &tx).unwrap();

	let names = emps.project(&["name"]).unwrap();
	// two employees share the name A
	assert_eq!(names.count(Some(&tx)).unwrap(), 2);
	// and the result is all-key
	assert_eq!(names.keys().len(), 1);
	assert!(names.keys()[0].set_eq(&Key::new(["name"])));
	tx.commit().unwrap();
}

#[test]
fn extend_then_project_inverts() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);
	let extended = emps
		.extend(
			vec![(
				"monthly".to_string(),
				Expression::op(
					"/",
					vec![Expression::var("salary"), Expression::val(12.0f64)],
				),
			)],
			Some(&tx),
		)
		.unwrap();
	let back = extended.remove(&["monthly"]).unwrap();
	assert!(back.equals(&emps, Some(&tx)).unwrap());
	tx.commit().unwrap();
}

#[test]
fn rename_involution() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);
	let there = emps.rename(&[("name", "label")]).unwrap();
	assert!(there.tuple_typ().contains("label"));
	let back = there.rename(&[("label", "name")]).unwrap();
	assert!(back.equals(&emps, Some(&tx)).unwrap());
	tx.commit().unwrap();
}

#[test]
fn round_trip_through_an_array() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);

	let tuples = table_to_array(&emps, &[SeqItem::desc("salary")], Some(&tx)).unwrap();
	assert_eq!(tuples.len(), 2);
	assert!(
		tuples[0].get("salary").unwrap().float_val().unwrap()
			>= tuples[1].get("salary").unwrap().float_val().unwrap()
	);

	let copy = create_table(
		"emps_copy",
		true,
		emp_attrs(),
		None,
		vec![Key::new(["empno"])],
		&mut tx,
	)
	.unwrap();
	for t in tuples {
		dml::insert(&copy, t, &tx).unwrap();
	}
	assert!(copy.equals(&emps, Some(&tx)).unwrap());
	tx.commit().unwrap();
}

#[test]
fn key_uniqueness_holds_under_every_key() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	// two candidate keys: badge and ssn
	let people = create_table(
		"people",
		true,
		vec![
			reldb_core::typ::Attr::new("badge", reldb_core::typ::Type::integer()),
			reldb_core::typ::Attr::new("ssn", reldb_core::typ::Type::string()),
		],
		None,
		vec![Key::new(["badge"]), Key::new(["ssn"])],
		&mut tx,
	)
	.unwrap();
	let mut t = reldb_core::val::Tuple::new();
	t.set("badge", reldb_core::Value::from(1i64));
	t.set("ssn", reldb_core::Value::from("a"));
	dml::insert(&people, t, &tx).unwrap();

	// distinct badge but duplicate ssn violates the secondary key
	let mut t = reldb_core::val::Tuple::new();
	t.set("badge", reldb_core::Value::from(2i64));
	t.set("ssn", reldb_core::Value::from("a"));
	let res = dml::insert(&people, t, &tx);
	assert!(matches!(res, Err(reldb_core::Error::KeyViolation(_))));
	assert_eq!(people.count(Some(&tx)).unwrap(), 1);
	tx.commit().unwrap();
}

#[test]
fn d_union_reports_overlap_at_iteration() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);
	let overlap = emps.d_union(&emps).unwrap();
	let mut qr = QResult::new(&overlap, Some(&tx)).unwrap();
	let err = loop {
		match qr.next(Some(&tx)) {
			Ok(Some(_)) => continue,
			Ok(None) => break None,
			Err(e) => break Some(e),
		}
	};
	assert!(matches!(err, Some(reldb_core::Error::ElementExists(_))));

	// disjoint operands stream fine
	let low = emps
		.select(Expression::lt(
			Expression::var("salary"),
			Expression::val(4200.0f64),
		))
		.unwrap();
	let high = emps
		.select(Expression::op(
			">=",
			vec![Expression::var("salary"), Expression::val(4200.0f64)],
		))
		.unwrap();
	let all: Table = low.d_union(&high).unwrap();
	assert_eq!(all.count(Some(&tx)).unwrap(), 2);
	tx.commit().unwrap();
}
