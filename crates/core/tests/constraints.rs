mod util;

use reldb_core::cst::{create_constraint, drop_constraint};
use reldb_core::dml;
use reldb_core::{Error, Expression};
use util::{create_emps1, emp, new_db};

#[test]
fn count_constraint_admits_inserts() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);

	create_constraint(
		"emps_nonneg_count",
		Expression::op(
			">=",
			vec![
				Expression::op("count", vec![Expression::var("emps1")]),
				Expression::val(0i64),
			],
		),
		&tx,
	)
	.unwrap();

	dml::insert(&emps, emp(7, "G", 5000.0), &tx).unwrap();
	assert_eq!(emps.count(Some(&tx)).unwrap(), 3);
	tx.commit().unwrap();
}

#[test]
fn violating_insert_is_rejected_and_rolled_off() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);

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

	let res = dml::insert(&emps, emp(4, "C", -1.0), &tx);
	match res {
		Err(Error::PredicateViolation(name)) => assert_eq!(name, "emps_salary_nonneg"),
		other => panic!("expected a predicate violation, got {other:?}"),
	}
	// the table is unchanged
	assert_eq!(emps.count(Some(&tx)).unwrap(), 2);
	tx.commit().unwrap();
}

#[test]
fn constraint_must_hold_at_creation() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let _emps = create_emps1(&mut tx);

	let res = create_constraint(
		"emps_empty",
		Expression::op("is_empty", vec![Expression::var("emps1")]),
		&tx,
	);
	assert!(matches!(res, Err(Error::PredicateViolation(_))));
	tx.rollback().unwrap();
}

#[test]
fn update_and_delete_are_checked_against_the_post_image() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);

	create_constraint(
		"emps_not_empty",
		Expression::not(Expression::op("is_empty", vec![Expression::var("emps1")])),
		&tx,
	)
	.unwrap();
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

	// an update pushing a salary negative violates
	let res = dml::update(
		&emps,
		None,
		vec![dml::AttrUpdate::new("salary", Expression::val(-5.0f64))],
		&tx,
	);
	assert!(matches!(res, Err(Error::PredicateViolation(_))));

	// deleting everything violates the non-empty constraint
	let res = dml::delete(&emps, None, &tx);
	assert!(matches!(res, Err(Error::PredicateViolation(_))));
	assert_eq!(emps.count(Some(&tx)).unwrap(), 2);

	// deleting one tuple is fine
	assert_eq!(
		dml::delete(
			&emps,
			Some(Expression::eq(Expression::var("empno"), Expression::val(1i64))),
			&tx
		)
		.unwrap(),
		1
	);
	tx.commit().unwrap();
}

#[test]
fn subset_rewrite_equivalence() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);
	let rich = emps
		.select(Expression::gt(
			Expression::var("salary"),
			Expression::val(4200.0f64),
		))
		.unwrap();

	let a = Expression::op(
		"subset_of",
		vec![
			Expression::table(rich.clone()),
			Expression::table(emps.clone()),
		],
	);
	let b = a.rewrite_subset_of();
	let va = a.evaluate_bool(None, Some(&tx)).unwrap();
	let vb = b.evaluate_bool(None, Some(&tx)).unwrap();
	assert!(va);
	assert_eq!(va, vb);

	// and in the other direction
	let a = Expression::op(
		"subset_of",
		vec![Expression::table(emps), Expression::table(rich)],
	);
	let b = a.rewrite_subset_of();
	assert!(!a.evaluate_bool(None, Some(&tx)).unwrap());
	assert!(!b.evaluate_bool(None, Some(&tx)).unwrap());
	tx.commit().unwrap();
}

#[test]
fn transition_constraint_sees_the_pre_image() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);

	// salaries may never shrink: the new table restricted to tuples whose
	// salary undercuts some same-numbered tuple of the old table is empty
	create_constraint(
		"salaries_grow",
		Expression::op(
			"is_empty",
			vec![Expression::op(
				"where",
				vec![
					Expression::op(
						"join",
						vec![
							Expression::var("emps1"),
							Expression::op(
								"rename",
								vec![
									Expression::op(
										"project",
										vec![
											Expression::var("emps1'"),
											Expression::val("empno"),
											Expression::val("salary"),
										],
									),
									Expression::val("salary"),
									Expression::val("old_salary"),
								],
							),
						],
					),
					Expression::lt(
						Expression::var("salary"),
						Expression::var("old_salary"),
					),
				],
			)],
		),
		&tx,
	)
	.unwrap();

	// a raise passes
	dml::update(
		&emps,
		Some(Expression::eq(Expression::var("empno"), Expression::val(1i64))),
		vec![dml::AttrUpdate::new("salary", Expression::val(4100.0f64))],
		&tx,
	)
	.unwrap();

	// a cut violates
	let res = dml::update(
		&emps,
		Some(Expression::eq(Expression::var("empno"), Expression::val(1i64))),
		vec![dml::AttrUpdate::new("salary", Expression::val(100.0f64))],
		&tx,
	);
	assert!(matches!(res, Err(Error::PredicateViolation(_))));
	tx.commit().unwrap();
}

#[test]
fn dropped_constraints_stop_applying() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);

	create_constraint(
		"emps_small",
		Expression::lt(
			Expression::op("count", vec![Expression::var("emps1")]),
			Expression::val(3i64),
		),
		&tx,
	)
	.unwrap();
	let res = dml::insert(&emps, emp(9, "X", 1.0), &tx);
	assert!(matches!(res, Err(Error::PredicateViolation(_))));

	drop_constraint("emps_small", &tx).unwrap();
	dml::insert(&emps, emp(9, "X", 1.0), &tx).unwrap();
	assert!(matches!(
		drop_constraint("emps_small", &tx),
		Err(Error::NotFound(_))
	));
	tx.commit().unwrap();
}
