mod util;

use reldb_core::dml;
use reldb_core::tbl::drop_table;
use reldb_core::{Error, Transaction};
use util::{create_emps1, emp, new_db};

#[test]
fn rollback_restores_data_and_catalog() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);
	tx.commit().unwrap();

	let mut tx = db.begin().unwrap();
	dml::insert(&emps, emp(3, "C", 1.0), &tx).unwrap();
	let _other = create_emps1_named(&mut tx, "temp_t");
	assert_eq!(emps.count(Some(&tx)).unwrap(), 3);
	tx.rollback().unwrap();

	let tx = db.begin().unwrap();
	assert_eq!(emps.count(Some(&tx)).unwrap(), 2);
	// the rolled-back table is gone from the catalog
	let res = reldb_core::env::get_table("temp_t", &tx);
	assert!(matches!(res, Err(Error::NotFound(_))));
	tx.commit().unwrap();
}

fn create_emps1_named(tx: &mut Transaction, name: &str) -> reldb_core::Table {
	reldb_core::tbl::create_table(
		name,
		true,
		util::emp_attrs(),
		None,
		vec![reldb_core::Key::new(["empno"])],
		tx,
	)
	.unwrap()
}

#[test]
fn nested_commit_folds_into_the_parent() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);

	let sub = Transaction::begin(&db, Some(tx)).unwrap();
	dml::insert(&emps, emp(3, "C", 1.0), &sub).unwrap();
	let mut tx = sub.commit().unwrap().expect("parent comes back");
	assert_eq!(emps.count(Some(&tx)).unwrap(), 3);

	// a nested rollback undoes only its own work
	let sub = Transaction::begin(&db, Some(tx)).unwrap();
	dml::insert(&emps, emp(4, "D", 1.0), &sub).unwrap();
	assert_eq!(emps.count(Some(&sub)).unwrap(), 4);
	tx = sub.rollback().unwrap().expect("parent comes back");
	assert_eq!(emps.count(Some(&tx)).unwrap(), 3);
	tx.commit().unwrap();
}

#[test]
fn dropped_tables_are_deleted_at_top_level_commit() {
	let db = new_db();
	let mut tx = db.begin().unwrap();
	let emps = create_emps1(&mut tx);
	tx.commit().unwrap();

	// drop inside a nested transaction: the deletion migrates upward
	let tx = db.begin().unwrap();
	let mut sub = Transaction::begin(&db, Some(tx)).unwrap();
	drop_table(&emps, &mut sub).unwrap();
	let tx = sub.commit().unwrap().expect("parent comes back");
	tx.commit().unwrap();

	let tx = db.begin().unwrap();
	let res = reldb_core::env::get_table("emps1", &tx);
	assert!(matches!(res, Err(Error::NotFound(_))));
	tx.commit().unwrap();
}

#[test]
fn transaction_is_running_until_consumed() {
	let db = new_db();
	let tx = db.begin().unwrap();
	assert!(tx.is_running());
	assert!(tx.commit().unwrap().is_none());
}
