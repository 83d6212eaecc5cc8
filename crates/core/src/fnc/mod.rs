//! The built-in operators.
//!
//! Every operator of the base library is registered here, grouped by
//! family. Typed overloads are registered per signature; polymorphic
//! operators register a variadic descriptor and check their arguments
//! themselves. Aggregates and the conditional are special forms evaluated
//! by the expression evaluator, not registry entries.

mod arith;
mod cast;
mod collection;
mod compare;
mod logic;
mod string;

use crate::err::Error;
use crate::expr::Expression;
use crate::kvs::Transaction;
use crate::ops::{OpKind, OpMap, Operator, Parameter, RoFn};
use crate::tbl::Table;
use crate::typ::Type;
use crate::val::Value;
use once_cell::sync::Lazy;
use std::sync::Arc;

static BUILTINS: Lazy<OpMap> = Lazy::new(|| {
	let map = OpMap::new();
	compare::register(&map);
	logic::register(&map);
	arith::register(&map);
	string::register(&map);
	cast::register(&map);
	collection::register(&map);
	map
});

/// The process-wide map of built-in read-only operators.
pub(crate) fn builtins() -> &'static OpMap {
	&BUILTINS
}

/// Registers one typed overload.
pub(super) fn ro(map: &OpMap, name: &str, params: &[Type], rtyp: Type, f: RoFn) {
	map.put(Arc::new(Operator {
		name: name.to_string(),
		params: params.iter().cloned().map(Parameter::ro).collect(),
		variadic: false,
		rtyp: Some(rtyp),
		source: String::new(),
		kind: OpKind::Ro(f),
	}));
}

/// Registers a variadic catch-all overload.
pub(super) fn ro_var(map: &OpMap, name: &str, rtyp: Option<Type>, f: RoFn) {
	map.put(Arc::new(Operator {
		name: name.to_string(),
		params: Vec::new(),
		variadic: true,
		rtyp,
		source: String::new(),
		kind: OpKind::Ro(f),
	}));
}

pub(super) fn expect_args(args: &[Value], n: usize, name: &str) -> Result<(), Error> {
	if args.len() != n {
		return Err(Error::InvalidArgument(format!("{name} takes {n} arguments")));
	}
	Ok(())
}

/// Evaluates an aggregate over the tuples of a table. With no operand
/// expression given, a single-attribute table aggregates over its
/// attribute.
pub(crate) fn aggregate(
	name: &str,
	table: &Table,
	arg: Option<&Expression>,
	tx: Option<&Transaction>,
) -> Result<Value, Error> {
	if name == "count" {
		return Ok(Value::from(table.count(tx)?));
	}
	let arg = match arg {
		Some(a) => a.clone(),
		None => {
			let attrs = &table.tuple_typ().attrs;
			if attrs.len() != 1 {
				return Err(Error::InvalidArgument(format!(
					"{name} needs an operand expression"
				)));
			}
			Expression::var(attrs[0].name.clone())
		}
	};
	let arg_type = arg.expr_type(Some(table.tuple_typ()), tx)?;
	crate::rel::aggregate_type(name, Some(&arg_type))?;

	let mut count = 0i64;
	let mut acc: Option<Value> = None;
	let mut fsum = 0.0f64;
	let mut isum = 0i64;
	let mut all = true;
	let mut any = false;
	let mut qr = crate::qrs::QResult::new(table, tx)?;
	while let Some(t) = qr.next(tx)? {
		let v = arg.evaluate(Some(&t), tx)?;
		count += 1;
		match name {
			"sum" | "avg" => {
				if arg_type.is_integer() {
					isum += v.int_val()?;
					fsum += v.int_val()? as f64;
				} else {
					fsum += v.float_val()?;
				}
			}
			"max" => match &acc {
				Some(m) if v.compare(m, tx)? != std::cmp::Ordering::Greater => {}
				_ => acc = Some(v),
			},
			"min" => match &acc {
				Some(m) if v.compare(m, tx)? != std::cmp::Ordering::Less => {}
				_ => acc = Some(v),
			},
			"all" => all = all && v.bool_val()?,
			"any" => any = any || v.bool_val()?,
			_ => return Err(Error::OperatorNotFound(name.to_string())),
		}
	}
	match name {
		"sum" => {
			if arg_type.is_integer() {
				Ok(Value::from(isum))
			} else {
				Ok(Value::from(fsum))
			}
		}
		"avg" => {
			if count == 0 {
				Err(Error::AggregateUndefined)
			} else {
				Ok(Value::from(fsum / count as f64))
			}
		}
		"max" | "min" => acc.ok_or(Error::AggregateUndefined),
		"all" => Ok(Value::from(all)),
		"any" => Ok(Value::from(any)),
		_ => Err(Error::OperatorNotFound(name.to_string())),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builtin_map_is_populated() {
		assert!(builtins().has("="));
		assert!(builtins().has("+"));
		assert!(builtins().has("||"));
		assert!(builtins().has("like"));
		assert!(builtins().has("cast_as_integer"));
		assert!(builtins().has("is_empty"));
	}
}
