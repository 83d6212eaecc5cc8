//! Boolean connectives.

use super::ro;
use crate::err::Error;
use crate::kvs::Transaction;
use crate::ops::{OpMap, Operator};
use crate::typ::Type;
use crate::val::Value;

pub(super) fn register(map: &OpMap) {
	let b = Type::boolean();
	ro(map, "and", &[b.clone(), b.clone()], b.clone(), and);
	ro(map, "or", &[b.clone(), b.clone()], b.clone(), or);
	ro(map, "xor", &[b.clone(), b.clone()], b.clone(), xor);
	ro(map, "not", &[b.clone()], b, not);
}

fn and(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(args[0].bool_val()? && args[1].bool_val()?))
}

fn or(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(args[0].bool_val()? || args[1].bool_val()?))
}

fn xor(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(args[0].bool_val()? != args[1].bool_val()?))
}

fn not(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(!args[0].bool_val()?))
}
