mod util;

use reldb_core::ctx::ExecContext;
use reldb_core::ops::{
	call_ro, create_ro_op, create_update_op, drop_op, HostInvoker, Operator, Parameter,
};
use reldb_core::typ::Type;
use reldb_core::{Error, Expression, Transaction, Value};
use std::sync::Arc;
use util::new_db;

/// A host invoker standing in for a language binding: read-only calls
/// evaluate to the operator's source string plus a session property,
/// update calls overwrite their first argument.
fn host_ro(
	op: &Operator,
	_args: Vec<Value>,
	ctx: Option<&ExecContext>,
	_tx: Option<&Transaction>,
) -> Result<Value, Error> {
	let session = ctx
		.and_then(|c| c.property::<String>("session"))
		.unwrap_or_default();
	Ok(Value::from(format!("{}:{}", op.source, session)))
}

fn host_update(
	_op: &Operator,
	args: &mut [Value],
	_ctx: Option<&ExecContext>,
	_tx: Option<&Transaction>,
) -> Result<(), Error> {
	args[0] = Value::from("written");
	Ok(())
}

#[test]
fn host_binding_dispatch() {
	let db = new_db();
	db.environment().register_host(
		"testlang",
		HostInvoker {
			ro: host_ro,
			update: host_update,
		},
	);

	let ctx = Arc::new(ExecContext::new());
	ctx.set_property("session", "s1".to_string());
	let tx = db.begin().unwrap().with_context(ctx);

	create_ro_op(
		"greet",
		vec![Parameter::ro(Type::string())],
		Type::string(),
		"testlang",
		"",
		"hello",
		&tx,
	)
	.unwrap();

	let out = call_ro("greet", vec![Value::from("ignored")], Some(&tx)).unwrap();
	assert_eq!(out.string_val().unwrap(), "hello:s1");

	// expressions dispatch through the same registry
	let out = Expression::op("greet", vec![Expression::val("x")])
		.evaluate(None, Some(&tx))
		.unwrap();
	assert_eq!(out.string_val().unwrap(), "hello:s1");
	tx.commit().unwrap();
}

#[test]
fn update_operators_modify_in_place() {
	let db = new_db();
	db.environment().register_host(
		"testlang",
		HostInvoker {
			ro: host_ro,
			update: host_update,
		},
	);
	let tx = db.begin().unwrap();
	create_update_op(
		"clobber",
		vec![Parameter::upd(Type::string())],
		"testlang",
		"",
		"",
		&tx,
	)
	.unwrap();

	let mut args = vec![Value::from("original")];
	reldb_core::ops::call_update("clobber", &mut args, Some(&tx)).unwrap();
	assert_eq!(args[0].string_val().unwrap(), "written");
	tx.commit().unwrap();
}

#[test]
fn overloads_dispatch_by_type() {
	let db = new_db();
	db.environment().register_host(
		"testlang",
		HostInvoker {
			ro: host_ro,
			update: host_update,
		},
	);
	let tx = db.begin().unwrap();
	create_ro_op(
		"probe",
		vec![Parameter::ro(Type::integer())],
		Type::string(),
		"testlang",
		"",
		"int",
		&tx,
	)
	.unwrap();
	create_ro_op(
		"probe",
		vec![Parameter::ro(Type::string())],
		Type::string(),
		"testlang",
		"",
		"string",
		&tx,
	)
	.unwrap();

	let out = call_ro("probe", vec![Value::from(1i64)], Some(&tx)).unwrap();
	assert_eq!(out.string_val().unwrap(), "int:");
	let out = call_ro("probe", vec![Value::from("x")], Some(&tx)).unwrap();
	assert_eq!(out.string_val().unwrap(), "string:");

	// a matching arity with no matching overload is a type mismatch
	let res = call_ro("probe", vec![Value::from(1.5f64)], Some(&tx));
	assert!(matches!(res, Err(Error::TypeMismatch(_))));
	// a foreign arity is operator-not-found
	let res = call_ro("probe", vec![], Some(&tx));
	assert!(matches!(res, Err(Error::OperatorNotFound(_))));
	tx.commit().unwrap();
}

#[test]
fn dropping_removes_all_overloads() {
	let db = new_db();
	db.environment().register_host(
		"testlang",
		HostInvoker {
			ro: host_ro,
			update: host_update,
		},
	);
	let tx = db.begin().unwrap();
	create_ro_op(
		"gone",
		vec![Parameter::ro(Type::integer())],
		Type::integer(),
		"testlang",
		"",
		"",
		&tx,
	)
	.unwrap();
	drop_op("gone", &tx).unwrap();
	let res = call_ro("gone", vec![Value::from(1i64)], Some(&tx));
	assert!(matches!(res, Err(Error::OperatorNotFound(_))));
	assert!(matches!(drop_op("gone", &tx), Err(Error::OperatorNotFound(_))));
	tx.commit().unwrap();
}

#[test]
fn missing_module_raises_resource_not_found() {
	let db = new_db();
	let tx = db.begin().unwrap();
	create_ro_op(
		"external",
		vec![Parameter::ro(Type::integer())],
		Type::integer(),
		"no_such_library",
		"no_such_symbol",
		"",
		&tx,
	)
	.unwrap();
	let res = call_ro("external", vec![Value::from(1i64)], Some(&tx));
	assert!(matches!(res, Err(Error::ResourceNotFound(_))));
	tx.commit().unwrap();
}
