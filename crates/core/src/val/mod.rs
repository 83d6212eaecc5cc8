//! Polymorphic values.
//!
//! A [`Value`] starts out uninitialized and is typed on first assignment.
//! Scalar values carry a reference-shared type descriptor; values of
//! user-defined types hold their actual-representation (arep) value, from
//! which component getters compute the external possrep components.
//!
//! Values convert to and from the flat byte representation (irep) used for
//! record-store fields and for the catalog's binary columns.

mod array;
mod tuple;

pub use array::Array;
pub use tuple::Tuple;

use crate::err::Error;
use crate::kvs::Transaction;
use crate::tbl::Table;
use crate::typ::{ScalarKind, Type};
use lexicmp::lexical_cmp;
use std::cmp::Ordering;
use std::fmt;

#[derive(Clone, Debug)]
pub(crate) enum Repr {
	Initial,
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	Binary(Vec<u8>),
	Tuple(Tuple),
	Table(Table),
	Array(Array),
}

/// A polymorphic engine value.
#[derive(Clone, Debug)]
pub struct Value {
	pub(crate) typ: Option<Type>,
	pub(crate) repr: Repr,
}

impl Default for Value {
	fn default() -> Self {
		Value {
			typ: None,
			repr: Repr::Initial,
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value {
			typ: Some(Type::boolean()),
			repr: Repr::Bool(v),
		}
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value {
			typ: Some(Type::integer()),
			repr: Repr::Int(v),
		}
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value {
			typ: Some(Type::float()),
			repr: Repr::Float(v),
		}
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value {
			typ: Some(Type::string()),
			repr: Repr::String(v.to_string()),
		}
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value {
			typ: Some(Type::string()),
			repr: Repr::String(v),
		}
	}
}

impl From<Vec<u8>> for Value {
	fn from(v: Vec<u8>) -> Self {
		Value {
			typ: Some(Type::binary()),
			repr: Repr::Binary(v),
		}
	}
}

impl From<Tuple> for Value {
	fn from(v: Tuple) -> Self {
		Value {
			typ: None,
			repr: Repr::Tuple(v),
		}
	}
}

impl From<Table> for Value {
	fn from(v: Table) -> Self {
		Value {
			typ: Some(Type::Relation(Box::new(v.typ().clone()))),
			repr: Repr::Table(v),
		}
	}
}

impl Value {
	/// An uninitialized value.
	pub fn new() -> Self {
		Self::default()
	}

	/// An array value over the given base type.
	pub fn array(elems: Vec<Value>, base: Type) -> Value {
		Value {
			typ: Some(Type::array(base)),
			repr: Repr::Array(Array::from(elems)),
		}
	}

	/// An array of strings, as taken by the wrap and group operators.
	pub fn string_array<S: AsRef<str>>(items: &[S]) -> Value {
		Value::array(
			items.iter().map(|s| Value::from(s.as_ref())).collect(),
			Type::string(),
		)
	}

	pub fn is_initial(&self) -> bool {
		matches!(self.repr, Repr::Initial)
	}

	/// The type of this value. Untyped tuples report no type; use
	/// [`Value::tuple_type`] to derive one.
	pub fn typ(&self) -> Option<&Type> {
		self.typ.as_ref()
	}

	pub(crate) fn set_typ(&mut self, typ: Type) {
		self.typ = Some(typ);
	}

	/// Retypes this value, keeping the representation. Used by selectors
	/// and late tuple typing.
	pub(crate) fn with_typ(mut self, typ: Type) -> Value {
		self.typ = Some(typ);
		self
	}

	pub fn bool_val(&self) -> Result<bool, Error> {
		match &self.repr {
			Repr::Bool(v) => Ok(*v),
			_ => Err(Error::TypeMismatch("boolean expected".to_string())),
		}
	}

	pub fn int_val(&self) -> Result<i64, Error> {
		match &self.repr {
			Repr::Int(v) => Ok(*v),
			_ => Err(Error::TypeMismatch("integer expected".to_string())),
		}
	}

	pub fn float_val(&self) -> Result<f64, Error> {
		match &self.repr {
			Repr::Float(v) => Ok(*v),
			_ => Err(Error::TypeMismatch("float expected".to_string())),
		}
	}

	pub fn string_val(&self) -> Result<&str, Error> {
		match &self.repr {
			Repr::String(v) => Ok(v),
			_ => Err(Error::TypeMismatch("string expected".to_string())),
		}
	}

	pub fn binary_val(&self) -> Result<&[u8], Error> {
		match &self.repr {
			Repr::Binary(v) => Ok(v),
			_ => Err(Error::TypeMismatch("binary expected".to_string())),
		}
	}

	pub fn as_tuple(&self) -> Result<&Tuple, Error> {
		match &self.repr {
			Repr::Tuple(v) => Ok(v),
			_ => Err(Error::TypeMismatch("tuple expected".to_string())),
		}
	}

	pub fn as_table(&self) -> Result<&Table, Error> {
		match &self.repr {
			Repr::Table(v) => Ok(v),
			_ => Err(Error::TypeMismatch("relation expected".to_string())),
		}
	}

	pub fn as_array(&self) -> Result<&Array, Error> {
		match &self.repr {
			Repr::Array(v) => Ok(v),
			_ => Err(Error::TypeMismatch("array expected".to_string())),
		}
	}

	pub fn into_tuple(self) -> Result<Tuple, Error> {
		match self.repr {
			Repr::Tuple(v) => Ok(v),
			_ => Err(Error::TypeMismatch("tuple expected".to_string())),
		}
	}

	pub fn into_table(self) -> Result<Table, Error> {
		match self.repr {
			Repr::Table(v) => Ok(v),
			_ => Err(Error::TypeMismatch("relation expected".to_string())),
		}
	}

	pub fn is_table(&self) -> bool {
		matches!(self.repr, Repr::Table(_))
	}

	pub fn is_tuple(&self) -> bool {
		matches!(self.repr, Repr::Tuple(_))
	}

	/// Reads a component of a user-defined scalar value.
	pub fn get_comp(&self, comp: &str, tx: Option<&Transaction>) -> Result<Value, Error> {
		let st = match self.typ.as_ref().and_then(Type::as_scalar) {
			Some(st) if !st.is_builtin() => st.clone(),
			_ => {
				return Err(Error::InvalidArgument(
					"component access requires a user-defined scalar value".to_string(),
				))
			}
		};
		let rep = st
			.comp_possrep(comp)
			.ok_or_else(|| Error::Name(format!("component {comp} not found")))?;
		if st.is_sysimpl() {
			if rep.comps.len() == 1 {
				let mut inner = self.clone();
				inner.typ = Some(rep.comps[0].typ.clone());
				Ok(inner)
			} else {
				match &self.repr {
					Repr::Tuple(t) => t
						.get(comp)
						.cloned()
						.ok_or_else(|| Error::Internal(format!("missing component {comp}"))),
					_ => Err(Error::Internal("bad system representation".to_string())),
				}
			}
		} else {
			let opname = format!("{}_get_{}", st.name(), comp);
			crate::ops::call_ro(&opname, vec![self.clone()], tx)
		}
	}

	/// Updates a component of a user-defined scalar value, re-checking the
	/// type constraint. On violation the value is left unchanged.
	pub fn set_comp(
		&mut self,
		comp: &str,
		val: Value,
		tx: Option<&Transaction>,
	) -> Result<(), Error> {
		let st = match self.typ.as_ref().and_then(Type::as_scalar) {
			Some(st) if !st.is_builtin() => st.clone(),
			_ => {
				return Err(Error::InvalidArgument(
					"component access requires a user-defined scalar value".to_string(),
				))
			}
		};
		let rep = st
			.comp_possrep(comp)
			.ok_or_else(|| Error::Name(format!("component {comp} not found")))?;
		if st.is_sysimpl() {
			let mut next = self.clone();
			if rep.comps.len() == 1 {
				next.repr = val.repr;
			} else {
				match &mut next.repr {
					Repr::Tuple(t) => t.set(comp, val),
					_ => return Err(Error::Internal("bad system representation".to_string())),
				}
			}
			check_type_constraint(&next, tx)?;
			*self = next;
			Ok(())
		} else {
			let opname = format!("{}_set_{}", st.name(), comp);
			let mut args = vec![self.clone(), val];
			crate::ops::call_update(&opname, &mut args, tx)?;
			let next = args.swap_remove(0);
			check_type_constraint(&next, tx)?;
			*self = next;
			Ok(())
		}
	}

	/// Value equality: compatible types and equal external values.
	pub fn equals(&self, other: &Value, tx: Option<&Transaction>) -> Result<bool, Error> {
		match (&self.repr, &other.repr) {
			(Repr::Initial, _) | (_, Repr::Initial) => {
				Err(Error::InvalidArgument("comparison of uninitialized value".to_string()))
			}
			(Repr::Bool(a), Repr::Bool(b)) => Ok(a == b),
			(Repr::Int(a), Repr::Int(b)) => {
				if self.same_scalar_type(other) {
					Ok(a == b)
				} else {
					self.compare_user(other, tx).map(|o| o == Ordering::Equal)
				}
			}
			(Repr::Float(a), Repr::Float(b)) => {
				if self.same_scalar_type(other) {
					Ok(a == b)
				} else {
					self.compare_user(other, tx).map(|o| o == Ordering::Equal)
				}
			}
			(Repr::String(a), Repr::String(b)) => {
				if self.same_scalar_type(other) {
					Ok(a == b)
				} else {
					self.compare_user(other, tx).map(|o| o == Ordering::Equal)
				}
			}
			(Repr::Binary(a), Repr::Binary(b)) => {
				if self.typ == other.typ {
					Ok(a == b)
				} else {
					Err(Error::TypeMismatch(
						"comparison of incompatible values".to_string(),
					))
				}
			}
			(Repr::Tuple(a), Repr::Tuple(b)) => match (&self.typ, &other.typ) {
				(Some(ta), Some(tb)) if ta != tb => {
					Err(Error::TypeMismatch("comparison of incompatible values".to_string()))
				}
				_ => a.equals(b, tx),
			},
			(Repr::Table(a), Repr::Table(b)) => a.equals(b, tx),
			(Repr::Array(a), Repr::Array(b)) => a.equals(b, tx),
			_ => Err(Error::TypeMismatch("comparison of incompatible values".to_string())),
		}
	}

	fn same_scalar_type(&self, other: &Value) -> bool {
		match (&self.typ, &other.typ) {
			(Some(a), Some(b)) => {
				a == b && a.as_scalar().is_some_and(|t| t.is_builtin())
			}
			_ => false,
		}
	}

	/// Compares two values of the same user-defined type, either through a
	/// registered `<type>_cmp` operator or derived from the components of a
	/// single possrep of ordered component types.
	fn compare_user(&self, other: &Value, tx: Option<&Transaction>) -> Result<Ordering, Error> {
		let (Some(ta), Some(tb)) = (&self.typ, &other.typ) else {
			return Err(Error::TypeMismatch("comparison of untyped values".to_string()));
		};
		if ta != tb {
			return Err(Error::TypeMismatch("comparison of incompatible values".to_string()));
		}
		let st = ta
			.as_scalar()
			.ok_or_else(|| Error::TypeMismatch("ordered comparison needs a scalar".to_string()))?;
		let cmp_name = format!("{}_cmp", st.name());
		if tx.is_some() && crate::ops::has_ro(&cmp_name, tx) {
			let res = crate::ops::call_ro(&cmp_name, vec![self.clone(), other.clone()], tx)?;
			return Ok(res.int_val()?.cmp(&0));
		}
		// Derive from the components of the first possrep
		let rep = st.possreps().first().ok_or_else(|| {
			Error::InvalidArgument(format!("type {} has no comparison", st.name()))
		})?;
		for comp in &rep.comps {
			let a = self.get_comp(&comp.name, tx)?;
			let b = other.get_comp(&comp.name, tx)?;
			let ord = a.compare(&b, tx)?;
			if ord != Ordering::Equal {
				return Ok(ord);
			}
		}
		Ok(Ordering::Equal)
	}

	/// Total ordering for ordered types. Strings collate locale-aware.
	pub fn compare(&self, other: &Value, tx: Option<&Transaction>) -> Result<Ordering, Error> {
		match (&self.repr, &other.repr) {
			(Repr::Int(a), Repr::Int(b)) if self.same_scalar_type(other) => Ok(a.cmp(b)),
			(Repr::Float(a), Repr::Float(b)) if self.same_scalar_type(other) => {
				Ok(a.total_cmp(b))
			}
			(Repr::String(a), Repr::String(b)) if self.same_scalar_type(other) => {
				Ok(lexical_cmp(a, b))
			}
			(Repr::Bool(a), Repr::Bool(b)) => Ok(a.cmp(b)),
			_ => self.compare_user(other, tx),
		}
	}

	/// The tuple type of a tuple value, derived from its attribute values.
	pub fn tuple_type(&self) -> Result<crate::typ::TupleType, Error> {
		let t = self.as_tuple()?;
		let mut attrs = Vec::with_capacity(t.len());
		for (name, val) in t.iter() {
			let typ = val
				.typ()
				.cloned()
				.or_else(|| val.is_tuple().then(|| val.tuple_type().ok().map(Type::Tuple)).flatten())
				.ok_or_else(|| {
					Error::InvalidArgument(format!("attribute {name} has no type"))
				})?;
			attrs.push(crate::typ::Attr::new(name.clone(), typ));
		}
		crate::typ::TupleType::new(attrs)
	}

	/// Types the attributes of a tuple value from a tuple type.
	pub fn set_tuple_type(&mut self, typ: &crate::typ::TupleType) -> Result<(), Error> {
		let t = match &mut self.repr {
			Repr::Tuple(t) => t,
			_ => return Err(Error::TypeMismatch("tuple expected".to_string())),
		};
		for attr in &typ.attrs {
			if let Some(v) = t.0.get_mut(&attr.name) {
				v.set_typ(attr.typ.clone());
			}
		}
		self.typ = Some(Type::Tuple(typ.clone()));
		Ok(())
	}

	/// Serializes this value into the flat byte form stored in record
	/// fields and catalog binary columns.
	pub fn to_irep(&self) -> Result<Vec<u8>, Error> {
		let mut out = Vec::new();
		self.write_irep(&mut out)?;
		Ok(out)
	}

	fn write_irep(&self, out: &mut Vec<u8>) -> Result<(), Error> {
		match &self.repr {
			Repr::Initial => {
				Err(Error::InvalidArgument("uninitialized value has no representation".to_string()))
			}
			Repr::Bool(v) => {
				out.push(*v as u8);
				Ok(())
			}
			Repr::Int(v) => {
				out.extend_from_slice(&v.to_be_bytes());
				Ok(())
			}
			Repr::Float(v) => {
				out.extend_from_slice(&v.to_bits().to_be_bytes());
				Ok(())
			}
			Repr::String(v) => {
				out.extend_from_slice(v.as_bytes());
				Ok(())
			}
			Repr::Binary(v) => {
				out.extend_from_slice(v);
				Ok(())
			}
			Repr::Tuple(t) => {
				// attributes in name order, each length-prefixed
				for (_, v) in t.iter() {
					let bytes = v.to_irep()?;
					out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
					out.extend_from_slice(&bytes);
				}
				Ok(())
			}
			Repr::Table(tb) => {
				let mut reps = Vec::new();
				for tpl in tb.local_tuples()? {
					reps.push(Value::from(tpl).to_irep()?);
				}
				// canonical form: tuples in byte order
				reps.sort();
				out.extend_from_slice(&(reps.len() as u32).to_be_bytes());
				for rep in reps {
					out.extend_from_slice(&(rep.len() as u32).to_be_bytes());
					out.extend_from_slice(&rep);
				}
				Ok(())
			}
			Repr::Array(a) => {
				out.extend_from_slice(&(a.len() as u32).to_be_bytes());
				for v in a.iter() {
					let bytes = v.to_irep()?;
					out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
					out.extend_from_slice(&bytes);
				}
				Ok(())
			}
		}
	}

	/// Reconstructs a value of the given type from its flat byte form.
	pub fn from_irep(typ: &Type, data: &[u8]) -> Result<Value, Error> {
		match typ {
			Type::Scalar(st) => match st.kind() {
				ScalarKind::Boolean => {
					if data.len() != 1 {
						return Err(Error::Internal("bad boolean representation".to_string()));
					}
					Ok(Value::from(data[0] != 0))
				}
				ScalarKind::Integer => {
					let bytes: [u8; 8] = data
						.try_into()
						.map_err(|_| Error::Internal("bad integer representation".to_string()))?;
					Ok(Value::from(i64::from_be_bytes(bytes)))
				}
				ScalarKind::Float => {
					let bytes: [u8; 8] = data
						.try_into()
						.map_err(|_| Error::Internal("bad float representation".to_string()))?;
					Ok(Value::from(f64::from_bits(u64::from_be_bytes(bytes))))
				}
				ScalarKind::String => {
					let s = std::str::from_utf8(data)
						.map_err(|_| Error::Internal("invalid utf-8".to_string()))?;
					Ok(Value::from(s))
				}
				ScalarKind::Binary => Ok(Value::from(data.to_vec())),
				ScalarKind::UserDefined => {
					if let Some(arep) = st.arep() {
						let inner = Value::from_irep(arep, data)?;
						Ok(inner.with_typ(typ.clone()))
					} else {
						Ok(Value {
							typ: Some(typ.clone()),
							repr: Repr::Binary(data.to_vec()),
						})
					}
				}
			},
			Type::Tuple(tt) => {
				let mut names: Vec<&str> = tt.names().collect();
				names.sort_unstable();
				let mut pos = 0usize;
				let mut out = Tuple::new();
				for name in names {
					let len = read_u32(data, &mut pos)? as usize;
					let end = pos + len;
					if end > data.len() {
						return Err(Error::Internal("truncated tuple field".to_string()));
					}
					let attr = tt.attr(name).expect("name from the same heading");
					out.set(name, Value::from_irep(&attr.typ, &data[pos..end])?);
					pos = end;
				}
				let mut v = Value::from(out);
				v.typ = Some(typ.clone());
				Ok(v)
			}
			Type::Relation(rt) => {
				let mut pos = 0usize;
				let count = read_u32(data, &mut pos)? as usize;
				let mut tuples = Vec::with_capacity(count);
				for _ in 0..count {
					let len = read_u32(data, &mut pos)? as usize;
					let end = pos + len;
					if end > data.len() {
						return Err(Error::Internal("truncated relation element".to_string()));
					}
					let tv = Value::from_irep(&Type::Tuple(rt.base.clone()), &data[pos..end])?;
					tuples.push(tv.into_tuple()?);
					pos = end;
				}
				let tb = Table::new_local(rt.as_ref().clone(), None)?;
				for tpl in tuples {
					tb.local_insert(tpl, None)?;
				}
				Ok(Value::from(tb))
			}
			Type::Array(base) => {
				let mut pos = 0usize;
				let count = read_u32(data, &mut pos)? as usize;
				let mut elems = Vec::with_capacity(count);
				for _ in 0..count {
					let len = read_u32(data, &mut pos)? as usize;
					let end = pos + len;
					if end > data.len() {
						return Err(Error::Internal("truncated array element".to_string()));
					}
					elems.push(Value::from_irep(base, &data[pos..end])?);
					pos = end;
				}
				Ok(Value::array(elems, base.as_ref().clone()))
			}
		}
	}
}

fn read_u32(data: &[u8], pos: &mut usize) -> Result<u32, Error> {
	let end = *pos + 4;
	if end > data.len() {
		return Err(Error::Internal("truncated representation".to_string()));
	}
	let bytes: [u8; 4] = data[*pos..end].try_into().expect("length checked");
	*pos = end;
	Ok(u32::from_be_bytes(bytes))
}

/// Checks the type constraint of a user-defined scalar value. The
/// constraint expression references component names directly.
pub(crate) fn check_type_constraint(
	val: &Value,
	tx: Option<&Transaction>,
) -> Result<(), Error> {
	let Some(st) = val.typ().and_then(Type::as_scalar) else {
		return Ok(());
	};
	let Some(constraint) = st.constraint() else {
		return Ok(());
	};
	let mut env = Tuple::new();
	for rep in st.possreps() {
		for comp in &rep.comps {
			env.set(comp.name.clone(), val.get_comp(&comp.name, tx)?);
		}
	}
	if constraint.evaluate_bool(Some(&env), tx)? {
		Ok(())
	} else {
		Err(Error::TypeConstraintViolation(st.name().to_string()))
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.repr {
			Repr::Initial => write!(f, "<uninitialized>"),
			Repr::Bool(v) => write!(f, "{v}"),
			Repr::Int(v) => write!(f, "{v}"),
			Repr::Float(v) => write!(f, "{v}"),
			Repr::String(v) => write!(f, "{v:?}"),
			Repr::Binary(v) => {
				write!(f, "x'")?;
				for b in v {
					write!(f, "{b:02x}")?;
				}
				write!(f, "'")
			}
			Repr::Tuple(t) => write!(f, "{t}"),
			Repr::Table(t) => match t.name() {
				Some(name) => write!(f, "{name}"),
				None => write!(f, "<relation>"),
			},
			Repr::Array(a) => write!(f, "{a}"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::typ::{Attr, TupleType};

	#[test]
	fn scalar_irep_round_trip() {
		for v in [Value::from(42i64), Value::from(-7i64)] {
			let bytes = v.to_irep().unwrap();
			let back = Value::from_irep(&Type::integer(), &bytes).unwrap();
			assert!(v.equals(&back, None).unwrap());
		}
		let v = Value::from(2.5f64);
		let back = Value::from_irep(&Type::float(), &v.to_irep().unwrap()).unwrap();
		assert!(v.equals(&back, None).unwrap());
		let v = Value::from("héllo");
		let back = Value::from_irep(&Type::string(), &v.to_irep().unwrap()).unwrap();
		assert!(v.equals(&back, None).unwrap());
		let v = Value::from(true);
		let back = Value::from_irep(&Type::boolean(), &v.to_irep().unwrap()).unwrap();
		assert!(v.equals(&back, None).unwrap());
	}

	#[test]
	fn tuple_irep_round_trip() {
		let tt = TupleType::new(vec![
			Attr::new("a", Type::integer()),
			Attr::new("b", Type::string()),
		])
		.unwrap();
		let v = Value::from(tuple!("a" => 5i64, "b" => "x"));
		let bytes = v.to_irep().unwrap();
		let back = Value::from_irep(&Type::Tuple(tt), &bytes).unwrap();
		assert!(v.equals(&back, None).unwrap());
	}

	#[test]
	fn incompatible_comparison_fails() {
		let a = Value::from(1i64);
		let b = Value::from("1");
		assert!(a.equals(&b, None).is_err());
	}

	#[test]
	fn string_ordering_is_collated() {
		let a = Value::from("a2");
		let b = Value::from("a10");
		// lexical comparison orders numerically embedded runs
		assert_eq!(a.compare(&b, None).unwrap(), Ordering::Less);
	}
}
