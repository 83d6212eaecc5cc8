//! Multi-assignment.
//!
//! A multi-assignment is a set of inserts, updates, deletes and copies that
//! must hold the declared constraints as a whole. The affected constraints
//! are evaluated against the post-assignment image before any base table is
//! touched; only then are the mutations applied in order.

use super::{delete, insert, update};
use crate::err::Error;
use crate::expr::Expression;
use crate::kvs::Transaction;
use crate::tbl::Table;
use crate::val::Tuple;

/// One element of a multi-assignment.
pub enum Assignment {
	Insert {
		table: Table,
		tuple: Tuple,
	},
	Update {
		table: Table,
		cond: Option<Expression>,
		updates: Vec<update::AttrUpdate>,
	},
	Delete {
		table: Table,
		cond: Option<Expression>,
	},
	/// Deletion of one specific tuple
	DeleteTuple {
		table: Table,
		tuple: Tuple,
	},
	Copy {
		dst: Table,
		src: Table,
	},
}

impl Assignment {
	/// The table this assignment writes to.
	pub(crate) fn target(&self) -> &Table {
		match self {
			Assignment::Insert {
				table, ..
			}
			| Assignment::Update {
				table, ..
			}
			| Assignment::Delete {
				table, ..
			}
			| Assignment::DeleteTuple {
				table, ..
			} => table,
			Assignment::Copy {
				dst, ..
			} => dst,
		}
	}
}

/// Resolves assignments through virtual targets one operator at a time, so
/// that constraint checking sees the base tables a mutation will land in.
/// Selections check their condition here (PREDICATE_VIOLATION on failure),
/// renames map names back, extensions validate their derived attributes.
/// Multi-operand operators are left for the insert recursion.
fn resolve(assigns: &[Assignment], tx: &Transaction) -> Result<Vec<Assignment>, Error> {
	let mut out = Vec::with_capacity(assigns.len());
	for a in assigns {
		out.extend(resolve_one(a, tx)?);
	}
	Ok(out)
}

fn resolve_one(a: &Assignment, tx: &Transaction) -> Result<Vec<Assignment>, Error> {
	let target = a.target();
	if !target.is_virtual() {
		return Ok(vec![clone_assignment(a)]);
	}
	let Some(Expression::Op(op)) = target.defining_expr() else {
		return Ok(vec![clone_assignment(a)]);
	};
	let resolved = match (op.name.as_str(), a) {
		(
			"where",
			Assignment::Insert {
				tuple, ..
			},
		) => {
			if !op.args[1].evaluate_bool(Some(tuple), Some(tx))? {
				return Err(Error::PredicateViolation(
					"tuple does not satisfy the selection condition".to_string(),
				));
			}
			Some(Assignment::Insert {
				table: crate::tbl::eval_table_arg(&op.args[0], Some(tx))?,
				tuple: tuple.clone(),
			})
		}
		(
			"where",
			Assignment::Update {
				cond,
				updates,
				..
			},
		) => {
			let combined = match cond {
				Some(c) => Expression::and(op.args[1].clone(), c.clone()),
				None => op.args[1].clone(),
			};
			Some(Assignment::Update {
				table: crate::tbl::eval_table_arg(&op.args[0], Some(tx))?,
				cond: Some(combined),
				updates: updates.clone(),
			})
		}
		(
			"where",
			Assignment::Delete {
				cond, ..
			},
		) => {
			let combined = match cond {
				Some(c) => Expression::and(op.args[1].clone(), c.clone()),
				None => op.args[1].clone(),
			};
			Some(Assignment::Delete {
				table: crate::tbl::eval_table_arg(&op.args[0], Some(tx))?,
				cond: Some(combined),
			})
		}
		(
			"where",
			Assignment::DeleteTuple {
				tuple, ..
			},
		) => {
			if !op.args[1].evaluate_bool(Some(tuple), Some(tx))? {
				// the tuple is not in the selection: nothing to delete
				return Ok(Vec::new());
			}
			Some(Assignment::DeleteTuple {
				table: crate::tbl::eval_table_arg(&op.args[0], Some(tx))?,
				tuple: tuple.clone(),
			})
		}
		(
			"rename",
			Assignment::Insert {
				tuple, ..
			},
		) => {
			let refs = rename_back(&op.args)?;
			let pairs: Vec<(&str, &str)> =
				refs.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
			Some(Assignment::Insert {
				table: crate::tbl::eval_table_arg(&op.args[0], Some(tx))?,
				tuple: tuple.rename(&pairs),
			})
		}
		(
			"rename",
			Assignment::DeleteTuple {
				tuple, ..
			},
		) => {
			let refs = rename_back(&op.args)?;
			let pairs: Vec<(&str, &str)> =
				refs.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
			Some(Assignment::DeleteTuple {
				table: crate::tbl::eval_table_arg(&op.args[0], Some(tx))?,
				tuple: tuple.rename(&pairs),
			})
		}
		(
			"rename",
			Assignment::Delete {
				cond, ..
			},
		) => {
			let refs = rename_back(&op.args)?;
			let pairs: Vec<(&str, &str)> =
				refs.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
			Some(Assignment::Delete {
				table: crate::tbl::eval_table_arg(&op.args[0], Some(tx))?,
				cond: cond.as_ref().map(|c| c.rename_vars(&pairs)),
			})
		}
		(
			"rename",
			Assignment::Update {
				cond,
				updates,
				..
			},
		) => {
			let refs = rename_back(&op.args)?;
			let pairs: Vec<(&str, &str)> =
				refs.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
			let updates = updates
				.iter()
				.map(|u| update::AttrUpdate {
					name: pairs
						.iter()
						.find(|(from, _)| *from == u.name)
						.map(|(_, to)| to.to_string())
						.unwrap_or_else(|| u.name.clone()),
					exp: u.exp.rename_vars(&pairs),
				})
				.collect();
			Some(Assignment::Update {
				table: crate::tbl::eval_table_arg(&op.args[0], Some(tx))?,
				cond: cond.as_ref().map(|c| c.rename_vars(&pairs)),
				updates,
			})
		}
		(
			"extend",
			Assignment::Insert {
				tuple, ..
			},
		) => {
			let mut i = 1;
			while i + 1 < op.args.len() {
				let name = crate::tbl::const_string(&op.args[i])?;
				let computed = op.args[i + 1].evaluate(Some(tuple), Some(tx))?;
				match tuple.get(&name) {
					Some(given) if given.equals(&computed, Some(tx))? => {}
					_ => {
						return Err(Error::PredicateViolation(format!(
							"derived attribute {name} does not match its expression"
						)))
					}
				}
				i += 2;
			}
			Some(Assignment::Insert {
				table: crate::tbl::eval_table_arg(&op.args[0], Some(tx))?,
				tuple: tuple.clone(),
			})
		}
		_ => None,
	};
	match resolved {
		// a step was taken; the base may itself be virtual
		Some(r) => resolve_one(&r, tx),
		None => Ok(vec![clone_assignment(a)]),
	}
}

fn rename_back(args: &[Expression]) -> Result<Vec<(String, String)>, Error> {
	let mut back = Vec::new();
	let mut i = 1;
	while i + 1 < args.len() {
		back.push((
			crate::tbl::const_string(&args[i + 1])?,
			crate::tbl::const_string(&args[i])?,
		));
		i += 2;
	}
	Ok(back)
}

fn clone_assignment(a: &Assignment) -> Assignment {
	match a {
		Assignment::Insert {
			table,
			tuple,
		} => Assignment::Insert {
			table: table.clone(),
			tuple: tuple.clone(),
		},
		Assignment::Update {
			table,
			cond,
			updates,
		} => Assignment::Update {
			table: table.clone(),
			cond: cond.clone(),
			updates: updates.clone(),
		},
		Assignment::Delete {
			table,
			cond,
		} => Assignment::Delete {
			table: table.clone(),
			cond: cond.clone(),
		},
		Assignment::DeleteTuple {
			table,
			tuple,
		} => Assignment::DeleteTuple {
			table: table.clone(),
			tuple: tuple.clone(),
		},
		Assignment::Copy {
			dst,
			src,
		} => Assignment::Copy {
			dst: dst.clone(),
			src: src.clone(),
		},
	}
}

/// Applies a multi-assignment atomically with respect to the declared
/// constraints. Returns the number of affected tuples.
pub fn multi_assign(assigns: &[Assignment], tx: &Transaction) -> Result<u64, Error> {
	let assigns = resolve(assigns, tx)?;
	crate::cst::apply_constraints(&assigns, tx)?;
	let mut count = 0u64;
	for a in &assigns {
		match a {
			Assignment::Insert {
				table,
				tuple,
			} => {
				insert::insert_unchecked(table, tuple.clone(), tx)?;
				count += 1;
			}
			Assignment::Update {
				table,
				cond,
				updates,
			} => count += update::update_unchecked(table, cond.as_ref(), updates, tx)?,
			Assignment::Delete {
				table,
				cond,
			} => count += delete::delete_unchecked(table, cond.as_ref(), tx)?,
			Assignment::DeleteTuple {
				table,
				tuple,
			} => count += delete::delete_tuple_unchecked(table, tuple, tx)?,
			Assignment::Copy {
				dst,
				src,
			} => count += super::copy_table_unchecked(dst, src, tx)?,
		}
	}
	Ok(count)
}
