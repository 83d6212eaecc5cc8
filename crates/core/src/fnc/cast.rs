//! Cast operators.

use super::ro;
use crate::err::Error;
use crate::kvs::Transaction;
use crate::ops::{OpMap, Operator};
use crate::typ::Type;
use crate::val::Value;

pub(super) fn register(map: &OpMap) {
	let i = Type::integer();
	let f = Type::float();
	let s = Type::string();
	let b = Type::binary();
	ro(map, "cast_as_integer", &[f.clone()], i.clone(), float_to_int);
	ro(map, "cast_as_integer", &[s.clone()], i, string_to_int);
	ro(map, "cast_as_float", &[Type::integer()], f.clone(), int_to_float);
	ro(map, "cast_as_float", &[s.clone()], f, string_to_float);
	ro(map, "cast_as_string", &[Type::integer()], s.clone(), int_to_string);
	ro(map, "cast_as_string", &[Type::float()], s.clone(), float_to_string);
	ro(map, "cast_as_string", &[b.clone()], s.clone(), binary_to_string);
	ro(map, "cast_as_binary", &[s], b, string_to_binary);
}

fn float_to_int(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	let f = args[0].float_val()?;
	if !f.is_finite() || f < i64::MIN as f64 || f > i64::MAX as f64 {
		return Err(Error::InvalidArgument(format!("{f} is out of integer range")));
	}
	Ok(Value::from(f.round() as i64))
}

fn string_to_int(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	let s = args[0].string_val()?;
	s.trim()
		.parse::<i64>()
		.map(Value::from)
		.map_err(|_| Error::InvalidArgument(format!("cannot parse {s:?} as integer")))
}

fn int_to_float(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(args[0].int_val()? as f64))
}

fn string_to_float(
	_: &Operator,
	args: Vec<Value>,
	_: Option<&Transaction>,
) -> Result<Value, Error> {
	let s = args[0].string_val()?;
	s.trim()
		.parse::<f64>()
		.map(Value::from)
		.map_err(|_| Error::InvalidArgument(format!("cannot parse {s:?} as float")))
}

fn int_to_string(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(args[0].int_val()?.to_string()))
}

fn float_to_string(
	_: &Operator,
	args: Vec<Value>,
	_: Option<&Transaction>,
) -> Result<Value, Error> {
	Ok(Value::from(args[0].float_val()?.to_string()))
}

fn binary_to_string(
	_: &Operator,
	args: Vec<Value>,
	_: Option<&Transaction>,
) -> Result<Value, Error> {
	let bytes = args[0].binary_val()?;
	String::from_utf8(bytes.to_vec())
		.map(Value::from)
		.map_err(|_| Error::InvalidArgument("binary data is not valid utf-8".to_string()))
}

fn string_to_binary(
	_: &Operator,
	args: Vec<Value>,
	_: Option<&Transaction>,
) -> Result<Value, Error> {
	Ok(Value::from(args[0].string_val()?.as_bytes().to_vec()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ops::call_ro;

	#[test]
	fn casts_round_trip() {
		let r = call_ro("cast_as_integer", vec![Value::from("42")], None).unwrap();
		assert_eq!(r.int_val().unwrap(), 42);
		let r = call_ro("cast_as_float", vec![Value::from(2i64)], None).unwrap();
		assert_eq!(r.float_val().unwrap(), 2.0);
		let r = call_ro("cast_as_string", vec![Value::from(2.5f64)], None).unwrap();
		assert_eq!(r.string_val().unwrap(), "2.5");
		let r = call_ro("cast_as_integer", vec![Value::from("x")], None);
		assert!(matches!(r, Err(Error::InvalidArgument(_))));
	}
}
