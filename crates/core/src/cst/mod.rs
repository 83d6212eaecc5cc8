//! Declarative integrity constraints.
//!
//! A constraint is a named boolean expression over the database. It must
//! hold when created and after every multi-assignment. Before a mutation is
//! applied, each affected constraint is re-evaluated with every target
//! table replaced by its post-assignment image; see [`rewrite`].
//!
//! A free name with a single trailing tick refers to the pre-image of the
//! same-named table, which makes transition constraints expressible: the
//! mutation rewrite substitutes the un-ticked occurrence with the
//! post-image and binds the ticked one to the base table.

mod rewrite;

use crate::dml::Assignment;
use crate::err::Error;
use crate::expr::Expression;
use crate::kvs::Transaction;

/// A loaded constraint.
#[derive(Clone)]
pub struct Constraint {
	pub name: String,
	pub(crate) exp: Expression,
}

/// Creates a constraint: the expression must be boolean, must hold against
/// the current database, and is stored with `subset_of` rewritten to the
/// dedicated empty-test form.
pub fn create_constraint(name: &str, exp: Expression, tx: &Transaction) -> Result<(), Error> {
	let exp = exp.resolve_varnames(tx)?;
	match exp.expr_type(None, Some(tx)) {
		Ok(t) if t.is_boolean() => {}
		Ok(t) => {
			return Err(Error::TypeMismatch(format!("constraint {name} has type {t}")))
		}
		Err(e) => return Err(e),
	}
	if !exp.evaluate_bool(None, Some(tx))? {
		return Err(Error::PredicateViolation(name.to_string()));
	}
	let exp = exp.rewrite_subset_of();
	load_constraints(tx)?;
	crate::cat::insert_constraint(name, &exp, tx)?;
	let dbroot = tx.environment().dbroot();
	let mut list = dbroot.constraints.write();
	list.get_or_insert_with(Vec::new).push(Constraint {
		name: name.to_string(),
		exp,
	});
	debug!("created constraint {name}");
	Ok(())
}

/// Drops a constraint from the catalog and the in-memory list. There are no
/// cascading effects.
pub fn drop_constraint(name: &str, tx: &Transaction) -> Result<(), Error> {
	load_constraints(tx)?;
	let dbroot = tx.environment().dbroot();
	{
		let mut list = dbroot.constraints.write();
		let list = list.get_or_insert_with(Vec::new);
		let before = list.len();
		list.retain(|c| c.name != name);
		if list.len() == before {
			return Err(Error::NotFound(format!("constraint {name}")));
		}
	}
	crate::cat::delete_constraint(name, tx)?;
	debug!("dropped constraint {name}");
	Ok(())
}

/// Materializes the constraint list from the catalog on first use.
pub(crate) fn load_constraints(tx: &Transaction) -> Result<(), Error> {
	let dbroot = tx.environment().dbroot();
	if dbroot.constraints.read().is_some() {
		return Ok(());
	}
	let loaded = crate::cat::read_constraints(tx)?;
	debug!("loaded {} constraints", loaded.len());
	*dbroot.constraints.write() = Some(loaded);
	Ok(())
}

/// Checks every constraint affected by the pending assignments against the
/// post-assignment image. A failing constraint aborts with
/// PREDICATE_VIOLATION naming it; the base tables are untouched.
pub(crate) fn apply_constraints(
	assigns: &[Assignment],
	tx: &Transaction,
) -> Result<(), Error> {
	load_constraints(tx)?;
	let list = match &*tx.environment().dbroot().constraints.read() {
		Some(list) if !list.is_empty() => list.clone(),
		_ => return Ok(()),
	};
	for c in list {
		let affected = assigns.iter().any(|a| c.exp.depends_on(a.target()));
		if !affected {
			continue;
		}
		let rewritten = rewrite::replace_targets(&c.exp, assigns, tx)?;
		trace!("checking constraint {}", c.name);
		if !rewritten.evaluate_bool(None, Some(tx))? {
			return Err(Error::PredicateViolation(c.name));
		}
	}
	Ok(())
}
