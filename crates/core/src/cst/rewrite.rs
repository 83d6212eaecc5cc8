//! Post-image substitution.
//!
//! To check a constraint against the outcome of a pending multi-assignment
//! without mutating anything, every occurrence of a target table in the
//! constraint expression is replaced by an expression denoting the table
//! after the assignment:
//!
//! - insert            -> `T union {t}`
//! - update with cond  -> `update(T where cond, ...) union (T where not cond)`
//! - update all        -> `update(T, ...)`
//! - delete with cond  -> `T where not cond`
//! - delete all        -> the empty relation of T's type
//! - delete tuple      -> `T minus {t}`
//! - copy              -> the source table
//!
//! Virtual tables are traversed through their defining expression, so a
//! constraint over a view sees the post-image of the base tables beneath
//! it. Ticked names resolve to the unmodified base table, giving transition
//! constraints their pre-image.

use crate::dml::Assignment;
use crate::err::Error;
use crate::expr::Expression;
use crate::kvs::Transaction;
use crate::tbl::Table;
use crate::val::Value;

pub(super) fn replace_targets(
	exp: &Expression,
	assigns: &[Assignment],
	tx: &Transaction,
) -> Result<Expression, Error> {
	Ok(match exp {
		Expression::Val(_) => exp.clone(),
		Expression::Var(name) => match name.strip_suffix('\'') {
			Some(base) => {
				// the pre-image: the table as currently stored
				let t = crate::env::get_table(base, tx)?;
				Expression::table(t)
			}
			None => exp.clone(),
		},
		Expression::TableRef(t) => match t.defining_expr() {
			Some(def) => replace_targets(&def, assigns, tx)?,
			None => replace_real(t, assigns)?,
		},
		Expression::Op(op) => {
			let mut args = Vec::with_capacity(op.args.len());
			for a in &op.args {
				args.push(replace_targets(a, assigns, tx)?);
			}
			Expression::op(op.name.clone(), args)
		}
		Expression::CompGet(e, comp) => {
			Expression::comp_get(replace_targets(e, assigns, tx)?, comp.clone())
		}
	})
}

/// The post-image of a base table under the first assignment targeting it.
fn replace_real(table: &Table, assigns: &[Assignment]) -> Result<Expression, Error> {
	for a in assigns {
		match a {
			Assignment::Insert {
				table: t,
				tuple,
			} if Table::same(t, table) => {
				let mut tuple = tuple.clone();
				for (name, val) in t.default_values().iter() {
					if !tuple.contains(name) {
						tuple.set(name.clone(), val.clone());
					}
				}
				let lit = Table::singleton(t.typ().clone(), tuple)?;
				return Ok(Expression::op(
					"union",
					vec![Expression::table(table.clone()), Expression::val(Value::from(lit))],
				));
			}
			Assignment::Update {
				table: t,
				cond,
				updates,
			} if Table::same(t, table) => {
				let updated = |inner: Expression| {
					let mut args = vec![inner];
					for u in updates {
						args.push(Expression::val(u.name.clone()));
						args.push(u.exp.clone());
					}
					Expression::op("update", args)
				};
				return Ok(match cond {
					Some(cond) => Expression::op(
						"union",
						vec![
							updated(Expression::op(
								"where",
								vec![Expression::table(table.clone()), cond.clone()],
							)),
							Expression::op(
								"where",
								vec![
									Expression::table(table.clone()),
									Expression::not(cond.clone()),
								],
							),
						],
					),
					None => updated(Expression::table(table.clone())),
				});
			}
			Assignment::Delete {
				table: t,
				cond,
			} if Table::same(t, table) => {
				return Ok(match cond {
					Some(cond) => Expression::op(
						"where",
						vec![
							Expression::table(table.clone()),
							Expression::not(cond.clone()),
						],
					),
					None => {
						let empty = Table::new_local(t.typ().clone(), None)?;
						Expression::val(Value::from(empty))
					}
				});
			}
			Assignment::DeleteTuple {
				table: t,
				tuple,
			} if Table::same(t, table) => {
				let lit = Table::singleton(t.typ().clone(), tuple.clone())?;
				return Ok(Expression::op(
					"minus",
					vec![Expression::table(table.clone()), Expression::val(Value::from(lit))],
				));
			}
			Assignment::Copy {
				dst,
				src,
			} if Table::same(dst, table) => {
				return Ok(Expression::table(src.clone()));
			}
			_ => {}
		}
	}
	Ok(Expression::table(table.clone()))
}
