//! Bottom-up type inference.
//!
//! Result types of built-in special forms are computed structurally; all
//! remaining operators are typed from the registry descriptor matching the
//! inferred argument types.

use super::{Expression, OpExpr};
use crate::err::Error;
use crate::kvs::Transaction;
use crate::tbl::const_string;
use crate::typ::{Attr, TupleType, Type};

impl Expression {
	/// Infers the type of this expression. `env` types the free variables
	/// that denote tuple attributes; the transaction is consulted for table
	/// names and user-defined operators.
	pub fn expr_type(
		&self,
		env: Option<&TupleType>,
		tx: Option<&Transaction>,
	) -> Result<Type, Error> {
		match self {
			Expression::Val(v) => match v.typ() {
				Some(t) => Ok(t.clone()),
				None if v.is_tuple() => Ok(Type::Tuple(v.tuple_type()?)),
				None => {
					Err(Error::InvalidArgument("literal value has no type".to_string()))
				}
			},
			Expression::Var(name) => {
				if let Some(env) = env {
					if let Some(attr) = env.attr(name) {
						return Ok(attr.typ.clone());
					}
				}
				if let Some(tx) = tx {
					let base = name.strip_suffix('\'').unwrap_or(name);
					match crate::env::get_table(base, tx) {
						Ok(t) => return Ok(Type::Relation(Box::new(t.typ().clone()))),
						Err(Error::NotFound(_)) => {}
						Err(e) => return Err(e),
					}
				}
				Err(Error::Name(name.clone()))
			}
			Expression::TableRef(t) => Ok(Type::Relation(Box::new(t.typ().clone()))),
			Expression::CompGet(e, comp) => {
				let t = e.expr_type(env, tx)?;
				let st = t.as_scalar().ok_or_else(|| {
					Error::TypeMismatch("component access needs a scalar".to_string())
				})?;
				let rep = st
					.comp_possrep(comp)
					.ok_or_else(|| Error::Name(format!("component {comp} not found")))?;
				Ok(rep
					.comps
					.iter()
					.find(|c| &c.name == comp)
					.expect("possrep declares the component")
					.typ
					.clone())
			}
			Expression::Op(op) => infer_op(op, env, tx),
		}
	}
}

fn infer_op(
	op: &OpExpr,
	env: Option<&TupleType>,
	tx: Option<&Transaction>,
) -> Result<Type, Error> {
	let name = op.name.as_str();
	match name {
		// predicates and connectives
		"=" | "<>" | "<" | ">" | "<=" | ">=" | "and" | "or" | "xor" | "not" | "like"
		| "regex_like" | "starts_with" | "in" | "subset_of" | "is_empty" => Ok(Type::boolean()),
		// arithmetic keeps the operand type
		"+" | "-" | "*" | "/" => {
			let t = op
				.args
				.first()
				.ok_or_else(|| Error::InvalidArgument(format!("{name} needs operands")))?
				.expr_type(env, tx)?;
			if !t.is_integer() && !t.is_float() {
				return Err(Error::TypeMismatch(format!("{name} needs numeric operands")));
			}
			for a in &op.args[1..] {
				if a.expr_type(env, tx)? != t {
					return Err(Error::TypeMismatch(format!("{name} operand types differ")));
				}
			}
			Ok(t)
		}
		"strlen" | "strlen_b" | "strfind_b" | "length" | "index_of" => Ok(Type::integer()),
		"||" | "substr" | "substr_b" | "format" | "cast_as_string" => Ok(Type::string()),
		"cast_as_integer" => Ok(Type::integer()),
		"cast_as_float" => Ok(Type::float()),
		"cast_as_binary" | "serialize" => Ok(Type::binary()),
		"if" => {
			if op.args.len() != 3 {
				return Err(Error::InvalidArgument(
					"if takes a condition and two branches".to_string(),
				));
			}
			let t1 = op.args[1].expr_type(env, tx)?;
			let t2 = op.args[2].expr_type(env, tx)?;
			if t1 != t2 {
				return Err(Error::TypeMismatch("if branches have different types".to_string()));
			}
			Ok(t1)
		}
		"tuple" => {
			if op.args.len() % 2 != 0 {
				return Err(Error::InvalidArgument(
					"tuple takes alternating names and values".to_string(),
				));
			}
			let mut attrs = Vec::with_capacity(op.args.len() / 2);
			let mut i = 0;
			while i + 1 < op.args.len() {
				attrs.push(Attr::new(
					const_string(&op.args[i])?,
					op.args[i + 1].expr_type(env, tx)?,
				));
				i += 2;
			}
			Ok(Type::Tuple(TupleType::new(attrs)?))
		}
		"relation" => {
			let schema = op
				.args
				.first()
				.ok_or_else(|| Error::InvalidArgument("relation needs a schema".to_string()))?
				.expr_type(env, tx)?;
			match schema {
				Type::Tuple(t) => Ok(Type::relation(t)),
				_ => Err(Error::TypeMismatch("relation schema must be a tuple".to_string())),
			}
		}
		"array" => {
			let base = op
				.args
				.first()
				.ok_or_else(|| Error::InvalidArgument("array needs elements".to_string()))?
				.expr_type(env, tx)?;
			Ok(Type::array(base))
		}
		"[]" => {
			let arr = op
				.args
				.first()
				.ok_or_else(|| Error::InvalidArgument("subscript needs an array".to_string()))?
				.expr_type(env, tx)?;
			arr.array_base()
				.cloned()
				.ok_or_else(|| Error::TypeMismatch("subscript needs an array".to_string()))
		}
		"to_tuple" => {
			let rel = op
				.args
				.first()
				.ok_or_else(|| Error::InvalidArgument("to_tuple needs a relation".to_string()))?
				.expr_type(env, tx)?;
			match rel {
				Type::Relation(r) => Ok(Type::Tuple(r.base)),
				_ => Err(Error::TypeMismatch("to_tuple needs a relation".to_string())),
			}
		}
		"update" => {
			// keeps the operand relation type
			op.args
				.first()
				.ok_or_else(|| Error::InvalidArgument("update needs a relation".to_string()))?
				.expr_type(env, tx)
		}
		_ if crate::rel::is_relational_op(name) => {
			let table = crate::rel::eval_relational(name, &op.args, None, tx)?;
			Ok(Type::Relation(Box::new(table.typ().clone())))
		}
		_ if crate::rel::AGGREGATE_OPS.contains(&name) => {
			let rel = op
				.args
				.first()
				.ok_or_else(|| Error::InvalidArgument(format!("{name} needs a relation")))?
				.expr_type(env, tx)?;
			let base = match &rel {
				Type::Relation(r) => &r.base,
				_ => return Err(Error::TypeMismatch(format!("{name} needs a relation"))),
			};
			let arg_type = match op.args.get(1) {
				Some(a) => Some(a.expr_type(Some(base), tx)?),
				None if base.attrs.len() == 1 => Some(base.attrs[0].typ.clone()),
				None => None,
			};
			crate::rel::aggregate_type(name, arg_type.as_ref())
		}
		_ => {
			// registry lookup for user operators, selectors and getters
			let mut argtv = Vec::with_capacity(op.args.len());
			for a in &op.args {
				argtv.push(a.expr_type(env, tx)?);
			}
			let found = crate::ops::get_ro(name, &argtv, tx)?;
			found
				.rtyp
				.clone()
				.ok_or_else(|| Error::TypeMismatch(format!("{name} has no result type")))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn literals_and_arithmetic() {
		let e = Expression::op("+", vec![Expression::val(1i64), Expression::val(2i64)]);
		assert!(e.expr_type(None, None).unwrap().is_integer());
		let e = Expression::op("+", vec![Expression::val(1i64), Expression::val(2.0f64)]);
		assert!(e.expr_type(None, None).is_err());
	}

	#[test]
	fn variables_take_env_types() {
		let env = TupleType::new(vec![Attr::new("salary", Type::float())]).unwrap();
		let e = Expression::gt(Expression::var("salary"), Expression::val(100.0f64));
		assert!(e.expr_type(Some(&env), None).unwrap().is_boolean());
	}

	#[test]
	fn if_branches_must_agree() {
		let e = Expression::op(
			"if",
			vec![
				Expression::val(true),
				Expression::val(1i64),
				Expression::val("x"),
			],
		);
		assert!(matches!(e.expr_type(None, None), Err(Error::TypeMismatch(_))));
	}
}
