//! Constructors and predicates over tuples, relations and arrays.

use super::{expect_args, ro_var};
use crate::err::Error;
use crate::kvs::Transaction;
use crate::ops::{OpMap, Operator};
use crate::tbl::Table;
use crate::typ::{RelationType, Type};
use crate::val::{Tuple, Value};

pub(super) fn register(map: &OpMap) {
	ro_var(map, "tuple", None, tuple);
	ro_var(map, "relation", None, relation);
	ro_var(map, "array", None, array);
	ro_var(map, "length", Some(Type::integer()), length);
	ro_var(map, "index_of", Some(Type::integer()), index_of);
	ro_var(map, "[]", None, subscript);
	ro_var(map, "to_tuple", None, to_tuple);
	ro_var(map, "in", Some(Type::boolean()), contains);
	ro_var(map, "subset_of", Some(Type::boolean()), subset_of);
	ro_var(map, "is_empty", Some(Type::boolean()), is_empty);
	ro_var(map, "serialize", Some(Type::binary()), serialize);
}

/// `tuple(name1, value1, ...)`: builds a tuple from alternating attribute
/// names and values.
fn tuple(op: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	if args.len() % 2 != 0 {
		return Err(Error::InvalidArgument(format!(
			"{} takes alternating names and values",
			op.name
		)));
	}
	let mut out = Tuple::new();
	let mut it = args.into_iter();
	while let (Some(name), Some(val)) = (it.next(), it.next()) {
		let name = name.string_val()?.to_string();
		if out.contains(&name) {
			return Err(Error::InvalidArgument(format!("duplicate attribute {name}")));
		}
		out.set(name, val);
	}
	Ok(Value::from(out))
}

/// `relation(schema, tuples...)`: the first tuple defines the heading; the
/// remaining tuples become the elements, with duplicates collapsed.
fn relation(op: &Operator, args: Vec<Value>, tx: Option<&Transaction>) -> Result<Value, Error> {
	let mut it = args.into_iter();
	let schema = it
		.next()
		.ok_or_else(|| Error::InvalidArgument(format!("{} needs a schema tuple", op.name)))?;
	let heading = schema.tuple_type()?;
	let table = Table::new_local(RelationType::new(heading), None)?;
	for v in it {
		match table.local_insert(v.into_tuple()?, tx) {
			Ok(()) | Err(Error::ElementExists(_)) => {}
			Err(e) => return Err(e),
		}
	}
	Ok(Value::from(table))
}

/// `array(elem, ...)`: builds an array of values of one common type.
fn array(op: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	let base = match args.first().and_then(Value::typ) {
		Some(t) => t.clone(),
		None => {
			return Err(Error::InvalidArgument(format!(
				"{} needs at least one typed element",
				op.name
			)))
		}
	};
	for v in &args[1..] {
		if v.typ() != Some(&base) {
			return Err(Error::TypeMismatch("array elements must share a type".to_string()));
		}
	}
	Ok(Value::array(args, base))
}

fn length(op: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	expect_args(&args, 1, &op.name)?;
	Ok(Value::from(args[0].as_array()?.length()))
}

fn index_of(op: &Operator, args: Vec<Value>, tx: Option<&Transaction>) -> Result<Value, Error> {
	expect_args(&args, 2, &op.name)?;
	Ok(Value::from(args[0].as_array()?.index_of(&args[1], tx)?))
}

fn subscript(op: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	expect_args(&args, 2, &op.name)?;
	Ok(args[0].as_array()?.get(args[1].int_val()?)?.clone())
}

/// `to_tuple(relation)`: the single tuple of a singleton relation.
fn to_tuple(op: &Operator, args: Vec<Value>, tx: Option<&Transaction>) -> Result<Value, Error> {
	expect_args(&args, 1, &op.name)?;
	let table = args[0].as_table()?;
	let tuples = table.to_tuples(tx)?;
	if tuples.len() != 1 {
		return Err(Error::InvalidArgument(format!(
			"{} of a relation with {} tuples",
			op.name,
			tuples.len()
		)));
	}
	Ok(Value::from(tuples.into_iter().next().expect("one tuple")))
}

/// `in(tuple, relation)`.
fn contains(op: &Operator, args: Vec<Value>, tx: Option<&Transaction>) -> Result<Value, Error> {
	expect_args(&args, 2, &op.name)?;
	let tuple = args[0].as_tuple()?;
	let table = args[1].as_table()?;
	Ok(Value::from(table.contains(tuple, tx)?))
}

/// `subset_of(a, b)`: every tuple of `a` is in `b`. Headings must agree.
fn subset_of(op: &Operator, args: Vec<Value>, tx: Option<&Transaction>) -> Result<Value, Error> {
	expect_args(&args, 2, &op.name)?;
	let a = args[0].as_table()?;
	let b = args[1].as_table()?;
	if a.typ() != b.typ() {
		return Err(Error::TypeMismatch("operand types differ".to_string()));
	}
	let mut qr = crate::qrs::QResult::new(a, tx)?;
	while let Some(t) = qr.next(tx)? {
		if !b.contains(&t, tx)? {
			return Ok(Value::from(false));
		}
	}
	Ok(Value::from(true))
}

fn is_empty(op: &Operator, args: Vec<Value>, tx: Option<&Transaction>) -> Result<Value, Error> {
	expect_args(&args, 1, &op.name)?;
	Ok(Value::from(args[0].as_table()?.is_empty(tx)?))
}

/// `serialize(value)`: the self-describing binary form of any value.
fn serialize(op: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	expect_args(&args, 1, &op.name)?;
	Ok(Value::from(crate::cat::serialize::value_to_bin(&args[0])?))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ops::call_ro;

	#[test]
	fn tuple_constructor_checks_arity_and_duplicates() {
		let r = call_ro("tuple", vec![Value::from("a")], None);
		assert!(matches!(r, Err(Error::InvalidArgument(_))));
		let r = call_ro(
			"tuple",
			vec![
				Value::from("a"),
				Value::from(1i64),
				Value::from("a"),
				Value::from(2i64),
			],
			None,
		);
		assert!(matches!(r, Err(Error::InvalidArgument(_))));
		let r = call_ro("tuple", vec![Value::from("a"), Value::from(1i64)], None).unwrap();
		assert_eq!(r.as_tuple().unwrap().get("a").unwrap().int_val().unwrap(), 1);
	}

	#[test]
	fn relation_collapses_duplicates() {
		let schema = call_ro("tuple", vec![Value::from("n"), Value::from(0i64)], None).unwrap();
		let one = call_ro("tuple", vec![Value::from("n"), Value::from(1i64)], None).unwrap();
		let r = call_ro("relation", vec![schema, one.clone(), one], None).unwrap();
		assert_eq!(r.as_table().unwrap().count(None).unwrap(), 1);
	}

	#[test]
	fn array_ops() {
		let arr = call_ro("array", vec![Value::from(1i64), Value::from(2i64)], None).unwrap();
		let len = call_ro("length", vec![arr.clone()], None).unwrap();
		assert_eq!(len.int_val().unwrap(), 2);
		let idx = call_ro("index_of", vec![arr.clone(), Value::from(2i64)], None).unwrap();
		assert_eq!(idx.int_val().unwrap(), 1);
		let el = call_ro("[]", vec![arr, Value::from(0i64)], None).unwrap();
		assert_eq!(el.int_val().unwrap(), 1);
	}
}
