//! Expression evaluation.
//!
//! Evaluation maps free variables through the given environment tuple,
//! resolves remaining names as tables of the running transaction, builds
//! virtual tables for relational operators, runs aggregates, and dispatches
//! everything else through the operator registry. The conditional is the
//! one lazy special form: only the chosen branch is evaluated.

use super::{Expression, OpExpr};
use crate::err::Error;
use crate::kvs::Transaction;
use crate::tbl::{const_string, Table};
use crate::val::{Tuple, Value};

impl Expression {
	/// Evaluates this expression against an optional variable environment
	/// and an optional running transaction.
	pub fn evaluate(
		&self,
		env: Option<&Tuple>,
		tx: Option<&Transaction>,
	) -> Result<Value, Error> {
		match self {
			Expression::Val(v) => Ok(v.clone()),
			Expression::Var(name) => {
				if let Some(env) = env {
					if let Some(v) = env.get(name) {
						return Ok(v.clone());
					}
				}
				if let Some(tx) = tx {
					// transition names bind to the current table when no
					// rewrite has replaced them
					let base = name.strip_suffix('\'').unwrap_or(name);
					match crate::env::get_table(base, tx) {
						Ok(t) => return Ok(Value::from(t)),
						Err(Error::NotFound(_)) => {}
						Err(e) => return Err(e),
					}
				}
				Err(Error::Name(name.clone()))
			}
			Expression::TableRef(t) => Ok(Value::from(t.clone())),
			Expression::CompGet(e, comp) => e.evaluate(env, tx)?.get_comp(comp, tx),
			Expression::Op(op) => eval_op(op, env, tx),
		}
	}

	/// Evaluates a boolean expression.
	pub fn evaluate_bool(
		&self,
		env: Option<&Tuple>,
		tx: Option<&Transaction>,
	) -> Result<bool, Error> {
		self.evaluate(env, tx)?.bool_val()
	}
}

fn eval_op(op: &OpExpr, env: Option<&Tuple>, tx: Option<&Transaction>) -> Result<Value, Error> {
	match op.name.as_str() {
		"if" => {
			if op.args.len() != 3 {
				return Err(Error::InvalidArgument(
					"if takes a condition and two branches".to_string(),
				));
			}
			if op.args[0].evaluate_bool(env, tx)? {
				op.args[1].evaluate(env, tx)
			} else {
				op.args[2].evaluate(env, tx)
			}
		}
		"update" => eval_update(op, env, tx),
		name if crate::rel::is_relational_op(name) => {
			crate::rel::eval_relational(name, &op.args, env, tx).map(Value::from)
		}
		name if crate::rel::AGGREGATE_OPS.contains(&name) => {
			if op.args.is_empty() {
				return Err(Error::InvalidArgument(format!("{name} needs a relation")));
			}
			let table = op.args[0].evaluate(env, tx)?.into_table()?;
			let arg = match (op.args.get(1), env) {
				(Some(a), Some(env)) => Some(a.substitute_vars(env)),
				(Some(a), None) => Some(a.clone()),
				(None, _) => None,
			};
			crate::fnc::aggregate(name, &table, arg.as_ref(), tx)
		}
		_ => {
			let mut args = Vec::with_capacity(op.args.len());
			for a in &op.args {
				args.push(a.evaluate(env, tx)?);
			}
			crate::ops::call_ro(&op.name, args, tx)
		}
	}
}

/// The read-only `update` operator: the operand relation with attribute
/// updates applied to every tuple, collapsing tuples made equal.
fn eval_update(
	op: &OpExpr,
	env: Option<&Tuple>,
	tx: Option<&Transaction>,
) -> Result<Value, Error> {
	if op.args.is_empty() || op.args.len() % 2 != 1 {
		return Err(Error::InvalidArgument(
			"update takes a relation and name/expression pairs".to_string(),
		));
	}
	let table = op.args[0].evaluate(env, tx)?.into_table()?;
	let mut updates = Vec::new();
	let mut i = 1;
	while i + 1 < op.args.len() {
		let name = const_string(&op.args[i])?;
		if !table.tuple_typ().contains(&name) {
			return Err(Error::Name(format!("attribute {name} not found")));
		}
		let exp = match env {
			Some(env) => op.args[i + 1].substitute_vars(env),
			None => op.args[i + 1].clone(),
		};
		updates.push((name, exp));
		i += 2;
	}
	let out = Table::new_local(table.typ().clone(), None)?;
	let mut qr = crate::qrs::QResult::new(&table, tx)?;
	while let Some(t) = qr.next(tx)? {
		let mut t2 = t.clone();
		for (name, exp) in &updates {
			t2.set(name.clone(), exp.evaluate(Some(&t), tx)?);
		}
		match out.local_insert(t2, tx) {
			Ok(()) | Err(Error::ElementExists(_)) => {}
			Err(e) => return Err(e),
		}
	}
	Ok(Value::from(out))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn literals_and_variables() {
		let env = tuple!("a" => 2i64);
		let e = Expression::eq(Expression::var("a"), Expression::val(2i64));
		assert!(e.evaluate_bool(Some(&env), None).unwrap());
		let e = Expression::var("missing");
		assert!(matches!(e.evaluate(Some(&env), None), Err(Error::Name(_))));
	}

	#[test]
	fn conditional_is_lazy() {
		// the unchosen branch would divide by zero
		let bad = Expression::op(
			"/",
			vec![Expression::val(1i64), Expression::val(0i64)],
		);
		let e = Expression::op(
			"if",
			vec![Expression::val(true), Expression::val(7i64), bad],
		);
		assert_eq!(e.evaluate(None, None).unwrap().int_val().unwrap(), 7);
	}

	#[test]
	fn arithmetic_through_registry() {
		let e = Expression::op(
			"*",
			vec![Expression::val(6i64), Expression::val(7i64)],
		);
		assert_eq!(e.evaluate(None, None).unwrap().int_val().unwrap(), 42);
	}
}
