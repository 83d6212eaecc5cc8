//! Expression trees.
//!
//! An expression is an immutable tree of literals, variable references,
//! direct table references, operator invocations, and component accessors.
//! Expressions define virtual tables, selection conditions, constraint
//! predicates, and computed attributes. Evaluation is pure with respect to
//! its inputs: mutations happen only in [`crate::dml`].

mod eval;
mod infer;

use crate::err::Error;
use crate::kvs::Transaction;
use crate::tbl::Table;
use crate::val::Value;

/// An operator invocation with an ordered argument list.
#[derive(Clone, Debug)]
pub struct OpExpr {
	pub name: String,
	pub args: Vec<Expression>,
}

/// An expression tree node.
#[derive(Clone, Debug)]
pub enum Expression {
	/// An embedded literal value
	Val(Value),
	/// A free variable: a tuple attribute or a table name
	Var(String),
	/// A direct table reference
	TableRef(Table),
	/// An operator invocation
	Op(Box<OpExpr>),
	/// A component accessor on a scalar value
	CompGet(Box<Expression>, String),
}

impl Expression {
	pub fn val(v: impl Into<Value>) -> Expression {
		Expression::Val(v.into())
	}

	pub fn var(name: impl Into<String>) -> Expression {
		Expression::Var(name.into())
	}

	pub fn table(t: Table) -> Expression {
		Expression::TableRef(t)
	}

	pub fn op(name: impl Into<String>, args: Vec<Expression>) -> Expression {
		Expression::Op(Box::new(OpExpr {
			name: name.into(),
			args,
		}))
	}

	pub fn comp_get(arg: Expression, comp: impl Into<String>) -> Expression {
		Expression::CompGet(Box::new(arg), comp.into())
	}

	pub fn eq(a: Expression, b: Expression) -> Expression {
		Expression::op("=", vec![a, b])
	}

	pub fn neq(a: Expression, b: Expression) -> Expression {
		Expression::op("<>", vec![a, b])
	}

	pub fn lt(a: Expression, b: Expression) -> Expression {
		Expression::op("<", vec![a, b])
	}

	pub fn gt(a: Expression, b: Expression) -> Expression {
		Expression::op(">", vec![a, b])
	}

	pub fn and(a: Expression, b: Expression) -> Expression {
		Expression::op("and", vec![a, b])
	}

	pub fn or(a: Expression, b: Expression) -> Expression {
		Expression::op("or", vec![a, b])
	}

	pub fn not(a: Expression) -> Expression {
		Expression::op("not", vec![a])
	}

	/// The operator name, if this is an invocation.
	pub fn op_name(&self) -> Option<&str> {
		match self {
			Expression::Op(op) => Some(op.name.as_str()),
			_ => None,
		}
	}

	pub fn op_args(&self) -> Option<&[Expression]> {
		match self {
			Expression::Op(op) => Some(&op.args),
			_ => None,
		}
	}

	/// Whether this expression contains no variables or table references.
	pub fn is_const(&self) -> bool {
		match self {
			Expression::Val(_) => true,
			Expression::Var(_) | Expression::TableRef(_) => false,
			Expression::Op(op) => op.args.iter().all(Expression::is_const),
			Expression::CompGet(e, _) => e.is_const(),
		}
	}

	/// Resolves free variable names that denote tables into direct table
	/// references. Names that do not resolve are left as variables;
	/// transition names carrying a trailing tick are never resolved here,
	/// since the mutation engine binds them to the pre-image.
	pub fn resolve_varnames(&self, tx: &Transaction) -> Result<Expression, Error> {
		Ok(match self {
			Expression::Var(name) if !name.ends_with('\'') => {
				match crate::env::get_table(name, tx) {
					Ok(t) => Expression::TableRef(t),
					Err(Error::NotFound(_)) => self.clone(),
					Err(e) => return Err(e),
				}
			}
			Expression::Op(op) => {
				let args = op
					.args
					.iter()
					.map(|a| a.resolve_varnames(tx))
					.collect::<Result<Vec<_>, Error>>()?;
				Expression::op(op.name.clone(), args)
			}
			Expression::CompGet(e, comp) => {
				Expression::comp_get(e.resolve_varnames(tx)?, comp.clone())
			}
			_ => self.clone(),
		})
	}

	/// Whether evaluating this expression reads the given table, directly
	/// or through the defining expression of a referenced virtual table.
	pub fn depends_on(&self, table: &Table) -> bool {
		match self {
			Expression::Val(v) => {
				v.as_table().is_ok_and(|t| {
					Table::same(t, table)
						|| t.defining_expr().is_some_and(|e| e.depends_on(table))
				})
			}
			Expression::Var(name) => {
				let name = name.strip_suffix('\'').unwrap_or(name);
				table.name() == Some(name)
			}
			Expression::TableRef(t) => {
				Table::same(t, table)
					|| t.defining_expr().is_some_and(|e| e.depends_on(table))
			}
			Expression::Op(op) => op.args.iter().any(|a| a.depends_on(table)),
			Expression::CompGet(e, _) => e.depends_on(table),
		}
	}

	/// Replaces variables bound in `env` by their values. Used when a
	/// sub-expression escapes into a virtual table constructed during the
	/// evaluation of an enclosing expression.
	pub(crate) fn substitute_vars(&self, env: &crate::val::Tuple) -> Expression {
		match self {
			Expression::Var(name) => match env.get(name) {
				Some(v) => Expression::Val(v.clone()),
				None => self.clone(),
			},
			Expression::Op(op) => Expression::op(
				op.name.clone(),
				op.args.iter().map(|a| a.substitute_vars(env)).collect(),
			),
			Expression::CompGet(e, comp) => {
				Expression::comp_get(e.substitute_vars(env), comp.clone())
			}
			_ => self.clone(),
		}
	}

	/// Renames free variables, used when pushing a mutation through a
	/// rename table back to its base.
	pub(crate) fn rename_vars(&self, pairs: &[(&str, &str)]) -> Expression {
		match self {
			Expression::Var(name) => match pairs.iter().find(|(from, _)| from == name) {
				Some((_, to)) => Expression::var(*to),
				None => self.clone(),
			},
			Expression::Op(op) => Expression::op(
				op.name.clone(),
				op.args.iter().map(|a| a.rename_vars(pairs)).collect(),
			),
			Expression::CompGet(e, comp) => {
				Expression::comp_get(e.rename_vars(pairs), comp.clone())
			}
			_ => self.clone(),
		}
	}

	/// Rewrites `subset_of(A, B)` into `is_empty(A minus B)` so that
	/// constraint checking can use the dedicated empty-test path.
	pub fn rewrite_subset_of(&self) -> Expression {
		match self {
			Expression::Op(op) if op.name == "subset_of" && op.args.len() == 2 => {
				let a = op.args[0].rewrite_subset_of();
				let b = op.args[1].rewrite_subset_of();
				Expression::op("is_empty", vec![Expression::op("minus", vec![a, b])])
			}
			Expression::Op(op) => Expression::op(
				op.name.clone(),
				op.args.iter().map(|a| a.rewrite_subset_of()).collect(),
			),
			Expression::CompGet(e, comp) => {
				Expression::comp_get(e.rewrite_subset_of(), comp.clone())
			}
			_ => self.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn subset_rewrite() {
		let e = Expression::op(
			"subset_of",
			vec![Expression::var("a"), Expression::var("b")],
		);
		let r = e.rewrite_subset_of();
		assert_eq!(r.op_name(), Some("is_empty"));
		let inner = &r.op_args().unwrap()[0];
		assert_eq!(inner.op_name(), Some("minus"));
	}

	#[test]
	fn const_detection() {
		assert!(Expression::val(1i64).is_const());
		assert!(Expression::eq(Expression::val(1i64), Expression::val(2i64)).is_const());
		assert!(!Expression::eq(Expression::var("a"), Expression::val(2i64)).is_const());
	}

	#[test]
	fn substitution_binds_only_known_vars() {
		let env = tuple!("a" => 1i64);
		let e = Expression::eq(Expression::var("a"), Expression::var("b"));
		let s = e.substitute_vars(&env);
		let args = s.op_args().unwrap();
		assert!(matches!(args[0], Expression::Val(_)));
		assert!(matches!(args[1], Expression::Var(_)));
	}
}
