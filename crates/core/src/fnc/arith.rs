//! Arithmetic over INTEGER and FLOAT.

use super::ro;
use crate::err::Error;
use crate::kvs::Transaction;
use crate::ops::{OpMap, Operator};
use crate::typ::Type;
use crate::val::Value;

pub(super) fn register(map: &OpMap) {
	let i = Type::integer();
	let f = Type::float();
	ro(map, "+", &[i.clone(), i.clone()], i.clone(), add_int);
	ro(map, "+", &[f.clone(), f.clone()], f.clone(), add_float);
	ro(map, "-", &[i.clone(), i.clone()], i.clone(), sub_int);
	ro(map, "-", &[f.clone(), f.clone()], f.clone(), sub_float);
	ro(map, "-", &[i.clone()], i.clone(), neg_int);
	ro(map, "-", &[f.clone()], f.clone(), neg_float);
	ro(map, "*", &[i.clone(), i.clone()], i.clone(), mul_int);
	ro(map, "*", &[f.clone(), f.clone()], f.clone(), mul_float);
	ro(map, "/", &[i.clone(), i.clone()], i, div_int);
	ro(map, "/", &[f.clone(), f.clone()], f, div_float);
}

fn add_int(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(args[0].int_val()?.wrapping_add(args[1].int_val()?)))
}

fn add_float(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(args[0].float_val()? + args[1].float_val()?))
}

fn sub_int(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(args[0].int_val()?.wrapping_sub(args[1].int_val()?)))
}

fn sub_float(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(args[0].float_val()? - args[1].float_val()?))
}

fn neg_int(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(args[0].int_val()?.wrapping_neg()))
}

fn neg_float(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(-args[0].float_val()?))
}

fn mul_int(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(args[0].int_val()?.wrapping_mul(args[1].int_val()?)))
}

fn mul_float(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(args[0].float_val()? * args[1].float_val()?))
}

fn div_int(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	let d = args[1].int_val()?;
	if d == 0 {
		return Err(Error::InvalidArgument("division by zero".to_string()));
	}
	Ok(Value::from(args[0].int_val()? / d))
}

fn div_float(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	let d = args[1].float_val()?;
	if d == 0.0 {
		return Err(Error::InvalidArgument("division by zero".to_string()));
	}
	Ok(Value::from(args[0].float_val()? / d))
}
