//! The operator registry.
//!
//! Read-only and update operators live in two maps from operator name to
//! overload list. Dispatch first matches an overload whose parameter types
//! equal the argument types, then falls back to a variadic catch-all; an
//! arity match without a type match is a TYPE_MISMATCH, anything else
//! OPERATOR_NOT_FOUND.
//!
//! Built-in operators are implemented by Rust functions; user operators are
//! addressed by a `(library, symbol)` pair resolved through the platform's
//! dynamic-module mechanism, or by a registered host-binding tag carrying
//! interpreter source.

pub(crate) mod create;
mod modload;

pub use create::{create_ro_op, create_update_op, drop_op};

use crate::ctx::ExecContext;
use crate::err::Error;
use crate::kvs::Transaction;
use crate::typ::Type;
use crate::val::{check_type_constraint, Value};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A declared operator parameter.
#[derive(Clone, Debug)]
pub struct Parameter {
	pub typ: Type,
	/// Whether an update operator modifies this argument in place
	pub update: bool,
}

impl Parameter {
	pub fn ro(typ: Type) -> Parameter {
		Parameter {
			typ,
			update: false,
		}
	}

	pub fn upd(typ: Type) -> Parameter {
		Parameter {
			typ,
			update: true,
		}
	}
}

/// The implementation of a read-only builtin.
pub type RoFn = fn(&Operator, Vec<Value>, Option<&Transaction>) -> Result<Value, Error>;

/// The implementation of an update builtin.
pub type UpdFn = fn(&Operator, &mut [Value], Option<&Transaction>) -> Result<(), Error>;

/// The symbol signature expected of read-only operators in dynamic modules.
pub type ExternRoFn = fn(Vec<Value>, Option<&Transaction>) -> Result<Value, Error>;

/// The symbol signature expected of update operators in dynamic modules.
pub type ExternUpdFn = fn(&mut [Value], Option<&Transaction>) -> Result<(), Error>;

/// Host-binding invokers, registered per tag on the environment.
#[derive(Clone, Copy)]
pub struct HostInvoker {
	pub ro: fn(
		&Operator,
		Vec<Value>,
		Option<&ExecContext>,
		Option<&Transaction>,
	) -> Result<Value, Error>,
	pub update: fn(
		&Operator,
		&mut [Value],
		Option<&ExecContext>,
		Option<&Transaction>,
	) -> Result<(), Error>,
}

/// How an operator is implemented.
pub enum OpKind {
	/// A built-in read-only operator
	Ro(RoFn),
	/// A built-in update operator
	Update(UpdFn),
	/// Resolved from a dynamic module as `(library, symbol)`
	Extern {
		lib: String,
		symbol: String,
		update: bool,
	},
	/// Dispatched to a registered host binding
	Host {
		tag: String,
		update: bool,
	},
	/// The engine-generated selector of a system-implemented type
	SysSelect,
}

/// An operator descriptor.
pub struct Operator {
	pub name: String,
	pub params: Vec<Parameter>,
	/// A variadic descriptor matches any argument list when no exact
	/// overload does
	pub variadic: bool,
	/// The return type; `None` for update operators
	pub rtyp: Option<Type>,
	/// Interpreter source for host-dispatched operators
	pub source: String,
	pub kind: OpKind,
}

impl Operator {
	pub fn is_update(&self) -> bool {
		matches!(
			self.kind,
			OpKind::Update(_)
				| OpKind::Extern {
					update: true,
					..
				} | OpKind::Host {
				update: true,
				..
			}
		)
	}

	/// A read-only operator whose name equals a possrep name of its return
	/// type is a selector.
	pub fn is_selector(&self) -> bool {
		match &self.rtyp {
			Some(Type::Scalar(st)) => st.possrep(&self.name).is_some(),
			_ => false,
		}
	}
}

/// A map from operator name to overload list.
#[derive(Default)]
pub struct OpMap {
	map: RwLock<HashMap<String, Vec<Arc<Operator>>>>,
}

impl OpMap {
	pub fn new() -> OpMap {
		OpMap::default()
	}

	pub fn put(&self, op: Arc<Operator>) {
		self.map.write().entry(op.name.clone()).or_default().push(op);
	}

	/// Whether any overload is registered under `name`.
	pub fn has(&self, name: &str) -> bool {
		self.map.read().get(name).is_some_and(|v| !v.is_empty())
	}

	/// Looks up the overload matching the argument types.
	pub fn get(&self, name: &str, argtv: &[Type]) -> Result<Arc<Operator>, Error> {
		let map = self.map.read();
		let Some(overloads) = map.get(name).filter(|v| !v.is_empty()) else {
			return Err(Error::OperatorNotFound(name.to_string()));
		};
		let mut argc_match = false;
		for op in overloads {
			if !op.variadic && op.params.len() == argtv.len() {
				if op.params.iter().zip(argtv).all(|(p, a)| &p.typ == a) {
					return Ok(Arc::clone(op));
				}
				argc_match = true;
			}
		}
		for op in overloads {
			if op.variadic {
				return Ok(Arc::clone(op));
			}
		}
		if argc_match {
			Err(Error::TypeMismatch(name.to_string()))
		} else {
			Err(Error::OperatorNotFound(name.to_string()))
		}
	}

	/// Removes every overload of `name`, reporting whether any existed.
	pub fn del_ops(&self, name: &str) -> bool {
		self.map.write().remove(name).is_some_and(|v| !v.is_empty())
	}

	/// Drops every entry. Used when a rollback invalidates hydrated state.
	pub(crate) fn clear(&self) {
		self.map.write().clear();
	}
}

/// The types of an argument list, deriving tuple types where absent.
pub(crate) fn arg_types(args: &[Value]) -> Result<Vec<Type>, Error> {
	args.iter()
		.map(|v| match v.typ() {
			Some(t) => Ok(t.clone()),
			None if v.is_tuple() => Ok(Type::Tuple(v.tuple_type()?)),
			None => Err(Error::InvalidArgument("uninitialized operator argument".to_string())),
		})
		.collect()
}

/// Resolves a read-only operator: the environment's user operators first
/// (hydrating from the catalog on a miss), then the built-ins.
pub(crate) fn get_ro(
	name: &str,
	argtv: &[Type],
	tx: Option<&Transaction>,
) -> Result<Arc<Operator>, Error> {
	let mut type_mismatch = None;
	if let Some(tx) = tx {
		let dbroot = tx.environment().dbroot();
		match dbroot.ro_ops.get(name, argtv) {
			Ok(op) => return Ok(op),
			Err(e @ Error::TypeMismatch(_)) => type_mismatch = Some(e),
			Err(Error::OperatorNotFound(_)) => {
				if crate::cat::load_ro_ops(name, tx)? > 0 {
					match dbroot.ro_ops.get(name, argtv) {
						Ok(op) => return Ok(op),
						Err(e @ Error::TypeMismatch(_)) => type_mismatch = Some(e),
						Err(_) => {}
					}
				}
			}
			Err(e) => return Err(e),
		}
	}
	match crate::fnc::builtins().get(name, argtv) {
		Ok(op) => Ok(op),
		Err(e @ Error::TypeMismatch(_)) => Err(e),
		Err(e) => Err(type_mismatch.unwrap_or(e)),
	}
}

/// Resolves an update operator.
pub(crate) fn get_update(
	name: &str,
	argtv: &[Type],
	tx: Option<&Transaction>,
) -> Result<Arc<Operator>, Error> {
	if let Some(tx) = tx {
		let dbroot = tx.environment().dbroot();
		match dbroot.upd_ops.get(name, argtv) {
			Ok(op) => return Ok(op),
			Err(Error::OperatorNotFound(_)) => {
				if crate::cat::load_upd_ops(name, tx)? > 0 {
					return dbroot.upd_ops.get(name, argtv);
				}
			}
			Err(e) => return Err(e),
		}
	}
	Err(Error::OperatorNotFound(name.to_string()))
}

/// Whether a read-only operator of the given name exists.
pub(crate) fn has_ro(name: &str, tx: Option<&Transaction>) -> bool {
	if let Some(tx) = tx {
		if tx.environment().dbroot().ro_ops.has(name) {
			return true;
		}
		if let Ok(n) = crate::cat::load_ro_ops(name, tx) {
			if n > 0 {
				return true;
			}
		}
	}
	crate::fnc::builtins().has(name)
}

/// Invokes a read-only operator by name.
pub fn call_ro(
	name: &str,
	args: Vec<Value>,
	tx: Option<&Transaction>,
) -> Result<Value, Error> {
	let argtv = arg_types(&args)?;
	let op = get_ro(name, &argtv, tx)?;
	invoke_ro(&op, args, tx)
}

/// Invokes a resolved read-only operator, enforcing the selector type
/// constraint on the produced value.
pub(crate) fn invoke_ro(
	op: &Operator,
	args: Vec<Value>,
	tx: Option<&Transaction>,
) -> Result<Value, Error> {
	let result = match &op.kind {
		OpKind::Ro(f) => f(op, args, tx)?,
		OpKind::SysSelect => sys_select(op, args)?,
		OpKind::Extern {
			lib,
			symbol,
			..
		} => modload::call_extern_ro(lib, symbol, args, tx)?,
		OpKind::Host {
			tag, ..
		} => {
			let tx_ref = tx.ok_or(Error::NoRunningTx)?;
			let invoker = tx_ref.environment().host_invoker(tag)?;
			(invoker.ro)(op, args, tx_ref.context(), tx)?
		}
		OpKind::Update(_) => {
			return Err(Error::InvalidArgument(format!(
				"{} is an update operator",
				op.name
			)))
		}
	};
	if op.is_selector() {
		check_type_constraint(&result, tx)?;
	}
	Ok(result)
}

/// Invokes an update operator by name. Arguments marked as update
/// parameters are modified in place.
pub fn call_update(
	name: &str,
	args: &mut [Value],
	tx: Option<&Transaction>,
) -> Result<(), Error> {
	let argtv = arg_types(args)?;
	let op = get_update(name, &argtv, tx)?;
	match &op.kind {
		OpKind::Update(f) => f(&op, args, tx),
		OpKind::Extern {
			lib,
			symbol,
			..
		} => modload::call_extern_update(lib, symbol, args, tx),
		OpKind::Host {
			tag, ..
		} => {
			let tx_ref = tx.ok_or(Error::NoRunningTx)?;
			let invoker = tx_ref.environment().host_invoker(tag)?;
			(invoker.update)(&op, args, tx_ref.context(), tx)
		}
		_ => Err(Error::InvalidArgument(format!("{name} is not an update operator"))),
	}
}

/// The engine-generated selector of a system-implemented type: composes the
/// arep value from the component arguments.
fn sys_select(op: &Operator, args: Vec<Value>) -> Result<Value, Error> {
	let rtyp = op
		.rtyp
		.clone()
		.ok_or_else(|| Error::Internal("selector without return type".to_string()))?;
	let st = rtyp
		.as_scalar()
		.ok_or_else(|| Error::Internal("selector of a nonscalar type".to_string()))?
		.clone();
	let rep = st
		.possrep(&op.name)
		.ok_or_else(|| Error::Internal("selector without possrep".to_string()))?;
	if args.len() != rep.comps.len() {
		return Err(Error::InvalidArgument(format!(
			"{} takes {} arguments",
			op.name,
			rep.comps.len()
		)));
	}
	if rep.comps.len() == 1 {
		Ok(args.into_iter().next().expect("one argument").with_typ(rtyp))
	} else {
		let mut t = crate::val::Tuple::new();
		for (comp, arg) in rep.comps.iter().zip(args) {
			t.set(comp.name.clone(), arg);
		}
		Ok(Value::from(t).with_typ(rtyp))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn dummy(_: &Operator, _: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
		Ok(Value::from(true))
	}

	fn op(name: &str, params: Vec<Type>, variadic: bool) -> Arc<Operator> {
		Arc::new(Operator {
			name: name.to_string(),
			params: params.into_iter().map(Parameter::ro).collect(),
			variadic,
			rtyp: Some(Type::boolean()),
			source: String::new(),
			kind: OpKind::Ro(dummy),
		})
	}

	#[test]
	fn dispatch_prefers_exact_match() {
		let map = OpMap::new();
		map.put(op("f", vec![Type::integer()], false));
		map.put(op("f", vec![], true));
		let found = map.get("f", &[Type::integer()]).unwrap();
		assert!(!found.variadic);
		let found = map.get("f", &[Type::string(), Type::string()]).unwrap();
		assert!(found.variadic);
	}

	#[test]
	fn arity_match_without_types_is_type_mismatch() {
		let map = OpMap::new();
		map.put(op("g", vec![Type::integer()], false));
		assert!(matches!(map.get("g", &[Type::string()]), Err(Error::TypeMismatch(_))));
		assert!(matches!(
			map.get("g", &[Type::string(), Type::string()]),
			Err(Error::OperatorNotFound(_))
		));
		assert!(matches!(map.get("h", &[]), Err(Error::OperatorNotFound(_))));
	}
}
