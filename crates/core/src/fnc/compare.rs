//! Equality and ordering operators.

use super::{expect_args, ro_var};
use crate::err::Error;
use crate::kvs::Transaction;
use crate::ops::{OpMap, Operator};
use crate::typ::Type;
use crate::val::Value;
use std::cmp::Ordering;

pub(super) fn register(map: &OpMap) {
	ro_var(map, "=", Some(Type::boolean()), eq);
	ro_var(map, "<>", Some(Type::boolean()), neq);
	ro_var(map, "<", Some(Type::boolean()), lt);
	ro_var(map, ">", Some(Type::boolean()), gt);
	ro_var(map, "<=", Some(Type::boolean()), le);
	ro_var(map, ">=", Some(Type::boolean()), ge);
}

fn eq(op: &Operator, args: Vec<Value>, tx: Option<&Transaction>) -> Result<Value, Error> {
	expect_args(&args, 2, &op.name)?;
	Ok(Value::from(args[0].equals(&args[1], tx)?))
}

fn neq(op: &Operator, args: Vec<Value>, tx: Option<&Transaction>) -> Result<Value, Error> {
	expect_args(&args, 2, &op.name)?;
	Ok(Value::from(!args[0].equals(&args[1], tx)?))
}

fn ordered(args: &[Value], name: &str, tx: Option<&Transaction>) -> Result<Ordering, Error> {
	expect_args(args, 2, name)?;
	match args[0].typ() {
		Some(t) if t.is_ordered() => {}
		_ => {
			return Err(Error::TypeMismatch(format!(
				"{name} needs operands of an ordered type"
			)))
		}
	}
	args[0].compare(&args[1], tx)
}

fn lt(op: &Operator, args: Vec<Value>, tx: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(ordered(&args, &op.name, tx)? == Ordering::Less))
}

fn gt(op: &Operator, args: Vec<Value>, tx: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(ordered(&args, &op.name, tx)? == Ordering::Greater))
}

fn le(op: &Operator, args: Vec<Value>, tx: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(ordered(&args, &op.name, tx)? != Ordering::Greater))
}

fn ge(op: &Operator, args: Vec<Value>, tx: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(ordered(&args, &op.name, tx)? != Ordering::Less))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ops::call_ro;

	#[test]
	fn equality_and_ordering() {
		let r = call_ro("=", vec![Value::from(1i64), Value::from(1i64)], None).unwrap();
		assert!(r.bool_val().unwrap());
		let r = call_ro("<", vec![Value::from(1i64), Value::from(2i64)], None).unwrap();
		assert!(r.bool_val().unwrap());
		let r = call_ro(">=", vec![Value::from("b"), Value::from("a")], None).unwrap();
		assert!(r.bool_val().unwrap());
	}

	#[test]
	fn ordering_rejects_unordered_types() {
		let r = call_ro("<", vec![Value::from(true), Value::from(false)], None);
		assert!(matches!(r, Err(Error::TypeMismatch(_))));
	}
}
