//! Definition, implementation and deletion of user-defined types.

use super::{Attr, Possrep, ScalarType, TupleType, Type, TypeImpl};
use crate::err::Error;
use crate::expr::Expression;
use crate::kvs::Transaction;
use crate::ops::Parameter;
use std::sync::Arc;

/// Defines a scalar type with its possible representations. The type
/// cannot be used for data until [`implement_type`] has been called.
///
/// The constraint must be a boolean expression and may reference component
/// names directly; the initializer is evaluated lazily to produce the
/// default value of the type.
pub fn define_type(
	name: &str,
	possreps: Vec<Possrep>,
	constraint: Option<Expression>,
	init: Option<Expression>,
	ordered: bool,
	tx: &Transaction,
) -> Result<(), Error> {
	if Type::builtin_scalar(name).is_some() {
		return Err(Error::ElementExists(format!("type {name}")));
	}
	match get_type(name, tx) {
		Ok(_) => return Err(Error::ElementExists(format!("type {name}"))),
		Err(Error::NotFound(_)) => {}
		Err(e) => return Err(e),
	}
	for (i, rep) in possreps.iter().enumerate() {
		if possreps[..i].iter().any(|r| r.name == rep.name) {
			return Err(Error::InvalidArgument(format!("duplicate possrep {}", rep.name)));
		}
		for (j, comp) in rep.comps.iter().enumerate() {
			if rep.comps[..j].iter().any(|c| c.name == comp.name) {
				return Err(Error::InvalidArgument(format!(
					"duplicate component {}",
					comp.name
				)));
			}
		}
	}
	if let Some(c) = &constraint {
		// component names are in scope for the constraint
		let comps: Vec<Attr> =
			possreps.iter().flat_map(|r| r.comps.iter().cloned()).collect();
		if let Ok(env) = TupleType::new(comps) {
			match c.expr_type(Some(&env), Some(tx)) {
				Ok(t) if t.is_boolean() => {}
				Ok(t) => {
					return Err(Error::TypeMismatch(format!(
						"type constraint has type {t}"
					)))
				}
				Err(_) => {}
			}
		}
	}
	let st = ScalarType::new_user(name, possreps, constraint, init, ordered);
	crate::cat::insert_type(&st, tx)?;
	tx.environment().dbroot().types.write().insert(name.to_string(), Arc::new(st));
	debug!("defined type {name}");
	Ok(())
}

/// Implements a previously defined type.
///
/// With an explicit `arep`, that type becomes the physical representation
/// and the caller provides selector, getters and setters. With only a
/// length, the representation is a fixed-length byte array. With neither,
/// the engine implements the type itself: the single possrep's only
/// component type becomes the representation, or a tuple type over all
/// components, and the selector is generated.
pub fn implement_type(
	name: &str,
	arep: Option<Type>,
	areplen: Option<usize>,
	tx: &Transaction,
) -> Result<(), Error> {
	let typ = get_type(name, tx)?;
	let st = typ
		.as_scalar()
		.filter(|st| !st.is_builtin())
		.ok_or_else(|| Error::InvalidArgument(format!("{name} is not a user type")))?
		.clone();

	let sysimpl = arep.is_none() && areplen.is_none();
	let imp = if sysimpl {
		if st.possreps().len() != 1 {
			return Err(Error::InvalidArgument(
				"a system-implemented type needs exactly one possrep".to_string(),
			));
		}
		let rep = &st.possreps()[0];
		let arep = if rep.comps.len() == 1 {
			rep.comps[0].typ.clone()
		} else {
			Type::Tuple(TupleType::new(rep.comps.clone())?)
		};
		// generate the selector
		let params: Vec<Parameter> =
			rep.comps.iter().map(|c| Parameter::ro(c.typ.clone())).collect();
		crate::ops::create_ro_op(
			&rep.name,
			params,
			typ.clone(),
			"",
			crate::ops::create::SYS_SELECT_SYMBOL,
			"",
			tx,
		)?;
		TypeImpl {
			arep: Some(arep),
			areplen: None,
			sysimpl: true,
		}
	} else {
		TypeImpl {
			arep,
			areplen,
			sysimpl: false,
		}
	};

	if st.is_ordered() && !crate::ops::has_ro(&format!("{name}_cmp"), Some(tx)) {
		// comparison must be derivable from one possrep of ordered types
		let derivable = st.possreps().len() == 1
			&& st.possreps()[0].comps.iter().all(|c| c.typ.is_ordered());
		if !derivable {
			return Err(Error::InvalidArgument(format!(
				"ordered type {name} needs a {name}_cmp operator"
			)));
		}
	}

	let arep_len = match (&imp.arep, imp.areplen) {
		(_, Some(len)) => len as i64,
		(Some(t), None) => match t.irep_len() {
			crate::kvs::FieldLen::Fixed(n) => n as i64,
			crate::kvs::FieldLen::Variable => -1,
		},
		(None, None) => -1,
	};
	crate::cat::update_type_impl(name, imp.arep.as_ref(), arep_len, imp.sysimpl, tx)?;
	st.set_impl(imp)?;

	// the default value comes from the initializer, evaluated once
	if let Some(init) = st.init_expr() {
		let val = init.evaluate(None, Some(tx))?;
		st.set_init_val(val.with_typ(typ.clone()));
	}
	debug!("implemented type {name}");
	Ok(())
}

/// Drops a user-defined type. Fails with IN_USE while any table attribute
/// or operator other than the type's own selector refers to it.
pub fn drop_type(name: &str, tx: &Transaction) -> Result<(), Error> {
	let typ = get_type(name, tx)?;
	let st = typ
		.as_scalar()
		.filter(|st| !st.is_builtin())
		.ok_or_else(|| Error::InvalidArgument(format!("{name} is not a user type")))?
		.clone();
	if let Some(usage) = crate::cat::type_usage(name, tx)? {
		return Err(Error::InUse(format!("type {name} is used by {usage}")));
	}
	// implementation operators fall with the type
	for rep in st.possreps() {
		match crate::ops::drop_op(&rep.name, tx) {
			Ok(()) | Err(Error::OperatorNotFound(_)) => {}
			Err(e) => return Err(e),
		}
		for comp in &rep.comps {
			for opname in [
				format!("{name}_get_{}", comp.name),
				format!("{name}_set_{}", comp.name),
			] {
				match crate::ops::drop_op(&opname, tx) {
					Ok(()) | Err(Error::OperatorNotFound(_)) => {}
					Err(e) => return Err(e),
				}
			}
		}
	}
	match crate::ops::drop_op(&format!("{name}_cmp"), tx) {
		Ok(()) | Err(Error::OperatorNotFound(_)) => {}
		Err(e) => return Err(e),
	}
	crate::cat::delete_type(name, tx)?;
	tx.environment().dbroot().types.write().remove(name);
	debug!("dropped type {name}");
	Ok(())
}

/// Resolves a scalar type by name: the built-ins, then the environment's
/// type cache, then the catalog.
pub fn get_type(name: &str, tx: &Transaction) -> Result<Type, Error> {
	if let Some(t) = Type::builtin_scalar(name) {
		return Ok(t);
	}
	let dbroot = tx.environment().dbroot();
	if let Some(st) = dbroot.types.read().get(name) {
		return Ok(Type::Scalar(Arc::clone(st)));
	}
	let st = crate::cat::read_type(name, tx)?;
	dbroot.types.write().insert(name.to_string(), Arc::clone(&st));
	Ok(Type::Scalar(st))
}
