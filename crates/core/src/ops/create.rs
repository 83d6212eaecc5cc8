//! Creation and deletion of user operators.

use super::{OpKind, Operator, Parameter};
use crate::err::Error;
use crate::kvs::Transaction;
use crate::typ::Type;
use std::sync::Arc;

/// The symbol name under which engine-generated selectors are recorded in
/// the catalog.
pub(crate) const SYS_SELECT_SYMBOL: &str = "sys_select";

/// Builds the in-memory descriptor for an operator row. The library name
/// decides the dispatch: a registered host tag goes to the host invoker,
/// the reserved selector symbol to the engine, anything else to the dynamic
/// loader.
pub(crate) fn make_operator(
	name: &str,
	params: Vec<Parameter>,
	variadic: bool,
	rtyp: Option<Type>,
	lib: &str,
	symbol: &str,
	source: &str,
	update: bool,
	tx: &Transaction,
) -> Operator {
	let kind = if symbol == SYS_SELECT_SYMBOL {
		OpKind::SysSelect
	} else if tx.environment().has_host(lib) {
		OpKind::Host {
			tag: lib.to_string(),
			update,
		}
	} else {
		OpKind::Extern {
			lib: lib.to_string(),
			symbol: symbol.to_string(),
			update,
		}
	};
	Operator {
		name: name.to_string(),
		params,
		variadic,
		rtyp,
		source: source.to_string(),
		kind,
	}
}

/// Creates a read-only operator, persisting it to the catalog and making it
/// immediately dispatchable.
pub fn create_ro_op(
	name: &str,
	params: Vec<Parameter>,
	rtyp: Type,
	lib: &str,
	symbol: &str,
	source: &str,
	tx: &Transaction,
) -> Result<(), Error> {
	if params.iter().any(|p| p.update) {
		return Err(Error::InvalidArgument(
			"a read-only operator cannot have update parameters".to_string(),
		));
	}
	let op = Arc::new(make_operator(
		name,
		params,
		false,
		Some(rtyp),
		lib,
		symbol,
		source,
		false,
		tx,
	));
	crate::cat::insert_ro_op(&op, tx)?;
	tx.environment().dbroot().ro_ops.put(op);
	debug!("created read-only operator {name}");
	Ok(())
}

/// Creates an update operator.
pub fn create_update_op(
	name: &str,
	params: Vec<Parameter>,
	lib: &str,
	symbol: &str,
	source: &str,
	tx: &Transaction,
) -> Result<(), Error> {
	let op = Arc::new(make_operator(
		name,
		params,
		false,
		None,
		lib,
		symbol,
		source,
		true,
		tx,
	));
	crate::cat::insert_upd_op(&op, tx)?;
	tx.environment().dbroot().upd_ops.put(op);
	debug!("created update operator {name}");
	Ok(())
}

/// Drops every overload of an operator name, from the catalog and from the
/// in-memory maps.
pub fn drop_op(name: &str, tx: &Transaction) -> Result<(), Error> {
	let dbroot = tx.environment().dbroot();
	let in_ro = dbroot.ro_ops.del_ops(name);
	let in_upd = dbroot.upd_ops.del_ops(name);
	let in_cat = crate::cat::delete_ops(name, tx)?;
	if !in_ro && !in_upd && !in_cat {
		return Err(Error::OperatorNotFound(name.to_string()));
	}
	debug!("dropped operator {name}");
	Ok(())
}
