//! Type descriptors.
//!
//! A type is either scalar (built-in or user-defined, optionally with
//! possible representations and an actual representation) or nonscalar: a
//! tuple type, a relation type, or an array type. Scalar types are interned
//! by name — the built-ins in process-wide singletons, user-defined types in
//! the per-environment dbroot — so type equality for scalars is name
//! equality, while nonscalar types compare structurally.

mod define;

pub use define::{define_type, drop_type, get_type, implement_type};

use crate::err::Error;
use crate::expr::Expression;
use crate::kvs::FieldLen;
use crate::val::Value;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;
use std::sync::OnceLock;

/// A named attribute with its type.
#[derive(Clone, Debug, PartialEq)]
pub struct Attr {
	pub name: String,
	pub typ: Type,
}

impl Attr {
	pub fn new(name: impl Into<String>, typ: Type) -> Self {
		Attr {
			name: name.into(),
			typ,
		}
	}
}

/// A possible representation of a user-defined scalar type.
#[derive(Clone, Debug, PartialEq)]
pub struct Possrep {
	pub name: String,
	pub comps: Vec<Attr>,
}

/// The built-in representation family of a scalar type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarKind {
	Boolean,
	Integer,
	Float,
	String,
	Binary,
	UserDefined,
}

/// How a user-defined scalar type is physically represented.
#[derive(Clone, Debug)]
pub struct TypeImpl {
	/// The actual-representation type, if the type is represented by
	/// another type
	pub arep: Option<Type>,
	/// The fixed byte length, if the type is represented by a raw byte
	/// array
	pub areplen: Option<usize>,
	/// Whether selector, getters and setters are generated by the engine
	pub sysimpl: bool,
}

/// A scalar type descriptor.
///
/// Built-in scalar types carry their [`ScalarKind`]; user-defined types are
/// `UserDefined` and become usable once implemented.
#[derive(Debug)]
pub struct ScalarType {
	name: String,
	kind: ScalarKind,
	ordered: bool,
	possreps: Vec<Possrep>,
	constraint: Option<Expression>,
	init: Option<Expression>,
	implemented: OnceLock<TypeImpl>,
	init_val: OnceLock<Value>,
}

impl ScalarType {
	pub(crate) fn new_user(
		name: impl Into<String>,
		possreps: Vec<Possrep>,
		constraint: Option<Expression>,
		init: Option<Expression>,
		ordered: bool,
	) -> Self {
		ScalarType {
			name: name.into(),
			kind: ScalarKind::UserDefined,
			ordered,
			possreps,
			constraint,
			init,
			implemented: OnceLock::new(),
			init_val: OnceLock::new(),
		}
	}

	fn new_builtin(name: &str, kind: ScalarKind, ordered: bool) -> Self {
		let t = ScalarType {
			name: name.to_string(),
			kind,
			ordered,
			possreps: Vec::new(),
			constraint: None,
			init: None,
			implemented: OnceLock::new(),
			init_val: OnceLock::new(),
		};
		t.implemented
			.set(TypeImpl {
				arep: None,
				areplen: None,
				sysimpl: false,
			})
			.expect("fresh type");
		t
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn kind(&self) -> ScalarKind {
		self.kind
	}

	pub fn is_builtin(&self) -> bool {
		self.kind != ScalarKind::UserDefined
	}

	pub fn is_ordered(&self) -> bool {
		self.ordered
	}

	pub fn possreps(&self) -> &[Possrep] {
		&self.possreps
	}

	pub fn possrep(&self, name: &str) -> Option<&Possrep> {
		self.possreps.iter().find(|r| r.name == name)
	}

	/// The possrep declaring a component of the given name.
	pub fn comp_possrep(&self, comp: &str) -> Option<&Possrep> {
		self.possreps.iter().find(|r| r.comps.iter().any(|c| c.name == comp))
	}

	pub fn constraint(&self) -> Option<&Expression> {
		self.constraint.as_ref()
	}

	pub fn init_expr(&self) -> Option<&Expression> {
		self.init.as_ref()
	}

	pub fn is_implemented(&self) -> bool {
		self.implemented.get().is_some()
	}

	pub fn type_impl(&self) -> Option<&TypeImpl> {
		self.implemented.get()
	}

	/// The actual-representation type, once implemented.
	pub fn arep(&self) -> Option<&Type> {
		self.implemented.get().and_then(|i| i.arep.as_ref())
	}

	/// Whether selector, getters and setters are generated by the engine.
	pub fn is_sysimpl(&self) -> bool {
		self.implemented.get().is_some_and(|i| i.sysimpl)
	}

	pub(crate) fn set_impl(&self, imp: TypeImpl) -> Result<(), Error> {
		self.implemented
			.set(imp)
			.map_err(|_| Error::InvalidArgument(format!("type {} is already implemented", self.name)))
	}

	pub(crate) fn set_init_val(&self, val: Value) {
		let _ = self.init_val.set(val);
	}

	/// The default value of the type, produced by its initializer when the
	/// type was implemented.
	pub fn init_value(&self) -> Option<&Value> {
		self.init_val.get()
	}
}

impl PartialEq for ScalarType {
	fn eq(&self, other: &Self) -> bool {
		self.name == other.name
	}
}

impl Eq for ScalarType {}

/// An ordered list of named attribute types.
#[derive(Clone, Debug, Default)]
pub struct TupleType {
	pub attrs: Vec<Attr>,
}

impl TupleType {
	/// Builds a tuple type, rejecting duplicate attribute names.
	pub fn new(attrs: Vec<Attr>) -> Result<TupleType, Error> {
		for (i, a) in attrs.iter().enumerate() {
			if attrs[..i].iter().any(|b| b.name == a.name) {
				return Err(Error::InvalidArgument(format!("duplicate attribute {}", a.name)));
			}
		}
		Ok(TupleType {
			attrs,
		})
	}

	pub fn attr(&self, name: &str) -> Option<&Attr> {
		self.attrs.iter().find(|a| a.name == name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.attr(name).is_some()
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.attrs.iter().map(|a| a.name.as_str())
	}

	/// The heading of the join of two tuple types. Common attributes must
	/// have equal types.
	pub fn join(&self, other: &TupleType) -> Result<TupleType, Error> {
		let mut attrs = self.attrs.clone();
		for a in &other.attrs {
			match self.attr(&a.name) {
				Some(b) if b.typ == a.typ => {}
				Some(_) => {
					return Err(Error::TypeMismatch(format!(
						"attribute {} has different types",
						a.name
					)))
				}
				None => attrs.push(a.clone()),
			}
		}
		TupleType::new(attrs)
	}

	/// The heading restricted to the given attributes.
	pub fn project(&self, names: &[&str]) -> Result<TupleType, Error> {
		let mut attrs = Vec::with_capacity(names.len());
		for name in names {
			match self.attr(name) {
				Some(a) => attrs.push(a.clone()),
				None => return Err(Error::Name(format!("attribute {name} not found"))),
			}
		}
		TupleType::new(attrs)
	}

	/// The heading without the given attributes.
	pub fn remove(&self, names: &[&str]) -> Result<TupleType, Error> {
		for name in names {
			if !self.contains(name) {
				return Err(Error::Name(format!("attribute {name} not found")));
			}
		}
		TupleType::new(
			self.attrs.iter().filter(|a| !names.contains(&a.name.as_str())).cloned().collect(),
		)
	}

	/// The heading with attributes renamed. Every source attribute must
	/// exist; renaming must not create duplicates.
	pub fn rename(&self, pairs: &[(&str, &str)]) -> Result<TupleType, Error> {
		for (from, _) in pairs {
			if !self.contains(from) {
				return Err(Error::Name(format!("attribute {from} not found")));
			}
		}
		let attrs = self
			.attrs
			.iter()
			.map(|a| {
				let name = pairs
					.iter()
					.find(|(from, _)| *from == a.name)
					.map(|(_, to)| to.to_string())
					.unwrap_or_else(|| a.name.clone());
				Attr::new(name, a.typ.clone())
			})
			.collect();
		TupleType::new(attrs)
	}

	/// The heading extended by new attributes.
	pub fn extend(&self, added: Vec<Attr>) -> Result<TupleType, Error> {
		let mut attrs = self.attrs.clone();
		attrs.extend(added);
		TupleType::new(attrs)
	}

	/// Replaces the attributes in `names` by a single tuple-valued
	/// attribute `wrapped`.
	pub fn wrap(&self, names: &[&str], wrapped: &str) -> Result<TupleType, Error> {
		let inner = self.project(names)?;
		let mut attrs: Vec<Attr> =
			self.attrs.iter().filter(|a| !names.contains(&a.name.as_str())).cloned().collect();
		attrs.push(Attr::new(wrapped, Type::Tuple(inner)));
		TupleType::new(attrs)
	}

	/// Replaces the tuple-valued attribute `name` by its attributes.
	pub fn unwrap(&self, name: &str) -> Result<TupleType, Error> {
		let inner = match self.attr(name) {
			Some(Attr {
				typ: Type::Tuple(t),
				..
			}) => t.clone(),
			Some(_) => {
				return Err(Error::TypeMismatch(format!("attribute {name} is not tuple-valued")))
			}
			None => return Err(Error::Name(format!("attribute {name} not found"))),
		};
		let mut attrs: Vec<Attr> =
			self.attrs.iter().filter(|a| a.name != name).cloned().collect();
		attrs.extend(inner.attrs);
		TupleType::new(attrs)
	}
}

impl PartialEq for TupleType {
	fn eq(&self, other: &Self) -> bool {
		self.attrs.len() == other.attrs.len()
			&& self.attrs.iter().all(|a| other.attr(&a.name).is_some_and(|b| b.typ == a.typ))
	}
}

/// A relation type: the type of a set of tuples with a common heading.
#[derive(Clone, Debug, PartialEq)]
pub struct RelationType {
	pub base: TupleType,
}

impl RelationType {
	pub fn new(base: TupleType) -> Self {
		RelationType {
			base,
		}
	}
}

/// A type descriptor.
#[derive(Clone, Debug)]
pub enum Type {
	Scalar(Arc<ScalarType>),
	Tuple(TupleType),
	Relation(Box<RelationType>),
	Array(Box<Type>),
}

static BOOLEAN: Lazy<Arc<ScalarType>> =
	Lazy::new(|| Arc::new(ScalarType::new_builtin("boolean", ScalarKind::Boolean, false)));
static INTEGER: Lazy<Arc<ScalarType>> =
	Lazy::new(|| Arc::new(ScalarType::new_builtin("integer", ScalarKind::Integer, true)));
static FLOAT: Lazy<Arc<ScalarType>> =
	Lazy::new(|| Arc::new(ScalarType::new_builtin("float", ScalarKind::Float, true)));
static STRING: Lazy<Arc<ScalarType>> =
	Lazy::new(|| Arc::new(ScalarType::new_builtin("string", ScalarKind::String, true)));
static BINARY: Lazy<Arc<ScalarType>> =
	Lazy::new(|| Arc::new(ScalarType::new_builtin("binary", ScalarKind::Binary, false)));

impl Type {
	pub fn boolean() -> Type {
		Type::Scalar(Arc::clone(&BOOLEAN))
	}

	pub fn integer() -> Type {
		Type::Scalar(Arc::clone(&INTEGER))
	}

	pub fn float() -> Type {
		Type::Scalar(Arc::clone(&FLOAT))
	}

	pub fn string() -> Type {
		Type::Scalar(Arc::clone(&STRING))
	}

	pub fn binary() -> Type {
		Type::Scalar(Arc::clone(&BINARY))
	}

	pub fn relation(base: TupleType) -> Type {
		Type::Relation(Box::new(RelationType::new(base)))
	}

	pub fn array(base: Type) -> Type {
		Type::Array(Box::new(base))
	}

	/// The built-in scalar type of the given name, if any.
	pub fn builtin_scalar(name: &str) -> Option<Type> {
		match name {
			"boolean" => Some(Type::boolean()),
			"integer" => Some(Type::integer()),
			"float" => Some(Type::float()),
			"string" => Some(Type::string()),
			"binary" => Some(Type::binary()),
			_ => None,
		}
	}

	pub fn is_scalar(&self) -> bool {
		matches!(self, Type::Scalar(_))
	}

	pub fn is_tuple(&self) -> bool {
		matches!(self, Type::Tuple(_))
	}

	pub fn is_relation(&self) -> bool {
		matches!(self, Type::Relation(_))
	}

	pub fn is_array(&self) -> bool {
		matches!(self, Type::Array(_))
	}

	pub fn is_boolean(&self) -> bool {
		matches!(self, Type::Scalar(t) if t.kind() == ScalarKind::Boolean)
	}

	pub fn is_integer(&self) -> bool {
		matches!(self, Type::Scalar(t) if t.kind() == ScalarKind::Integer)
	}

	pub fn is_float(&self) -> bool {
		matches!(self, Type::Scalar(t) if t.kind() == ScalarKind::Float)
	}

	pub fn is_string(&self) -> bool {
		matches!(self, Type::Scalar(t) if t.kind() == ScalarKind::String)
	}

	pub fn is_binary(&self) -> bool {
		matches!(self, Type::Scalar(t) if t.kind() == ScalarKind::Binary)
	}

	/// The name of a scalar type.
	pub fn name(&self) -> Option<&str> {
		match self {
			Type::Scalar(t) => Some(t.name()),
			_ => None,
		}
	}

	pub fn as_scalar(&self) -> Option<&Arc<ScalarType>> {
		match self {
			Type::Scalar(t) => Some(t),
			_ => None,
		}
	}

	/// The tuple heading of a tuple or relation type.
	pub fn base_tuple(&self) -> Option<&TupleType> {
		match self {
			Type::Tuple(t) => Some(t),
			Type::Relation(r) => Some(&r.base),
			_ => None,
		}
	}

	pub fn as_relation(&self) -> Option<&RelationType> {
		match self {
			Type::Relation(r) => Some(r),
			_ => None,
		}
	}

	pub fn array_base(&self) -> Option<&Type> {
		match self {
			Type::Array(t) => Some(t),
			_ => None,
		}
	}

	/// Whether values of this type can be compared with `<`.
	pub fn is_ordered(&self) -> bool {
		match self {
			Type::Scalar(t) => t.is_ordered(),
			_ => false,
		}
	}

	/// The stored-field length of values of this type.
	pub(crate) fn irep_len(&self) -> FieldLen {
		match self {
			Type::Scalar(t) => match t.kind() {
				ScalarKind::Boolean => FieldLen::Fixed(1),
				ScalarKind::Integer => FieldLen::Fixed(8),
				ScalarKind::Float => FieldLen::Fixed(8),
				ScalarKind::String | ScalarKind::Binary => FieldLen::Variable,
				ScalarKind::UserDefined => match t.type_impl() {
					Some(TypeImpl {
						arep: Some(arep), ..
					}) => arep.irep_len(),
					Some(TypeImpl {
						areplen: Some(len),
						..
					}) => FieldLen::Fixed(*len),
					_ => FieldLen::Variable,
				},
			},
			_ => FieldLen::Variable,
		}
	}
}

impl PartialEq for Type {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Type::Scalar(a), Type::Scalar(b)) => a == b,
			(Type::Tuple(a), Type::Tuple(b)) => a == b,
			(Type::Relation(a), Type::Relation(b)) => a == b,
			(Type::Array(a), Type::Array(b)) => a == b,
			_ => false,
		}
	}
}

impl Eq for Type {}

impl fmt::Display for Type {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Type::Scalar(t) => write!(f, "{}", t.name()),
			Type::Tuple(t) => {
				write!(f, "tuple {{")?;
				for (i, a) in t.attrs.iter().enumerate() {
					if i > 0 {
						write!(f, ",")?;
					}
					write!(f, " {} {}", a.name, a.typ)?;
				}
				write!(f, " }}")
			}
			Type::Relation(r) => {
				write!(f, "relation {{")?;
				for (i, a) in r.base.attrs.iter().enumerate() {
					if i > 0 {
						write!(f, ",")?;
					}
					write!(f, " {} {}", a.name, a.typ)?;
				}
				write!(f, " }}")
			}
			Type::Array(t) => write!(f, "array of {t}"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn heading() -> TupleType {
		TupleType::new(vec![
			Attr::new("empno", Type::integer()),
			Attr::new("name", Type::string()),
			Attr::new("salary", Type::float()),
		])
		.unwrap()
	}

	#[test]
	fn tuple_type_rejects_duplicates() {
		let res = TupleType::new(vec![
			Attr::new("a", Type::integer()),
			Attr::new("a", Type::string()),
		]);
		assert!(matches!(res, Err(Error::InvalidArgument(_))));
	}

	#[test]
	fn tuple_type_equality_ignores_order() {
		let a = heading();
		let b = TupleType::new(vec![
			Attr::new("salary", Type::float()),
			Attr::new("empno", Type::integer()),
			Attr::new("name", Type::string()),
		])
		.unwrap();
		assert_eq!(a, b);
	}

	#[test]
	fn join_rejects_mismatched_common_attr() {
		let a = heading();
		let b = TupleType::new(vec![Attr::new("empno", Type::string())]).unwrap();
		assert!(matches!(a.join(&b), Err(Error::TypeMismatch(_))));
	}

	#[test]
	fn wrap_and_unwrap_are_inverse() {
		let a = heading();
		let wrapped = a.wrap(&["empno", "name"], "who").unwrap();
		assert!(wrapped.contains("who"));
		assert!(!wrapped.contains("empno"));
		let unwrapped = wrapped.unwrap("who").unwrap();
		assert_eq!(unwrapped, a);
	}

	#[test]
	fn rename_checks_source_attrs() {
		let a = heading();
		assert!(a.rename(&[("missing", "x")]).is_err());
		let r = a.rename(&[("empno", "id")]).unwrap();
		assert!(r.contains("id"));
		assert!(!r.contains("empno"));
	}

	#[test]
	fn scalar_equality_is_by_name() {
		assert_eq!(Type::integer(), Type::integer());
		assert_ne!(Type::integer(), Type::float());
		let user = Type::Scalar(Arc::new(ScalarType::new_user(
			"point",
			Vec::new(),
			None,
			None,
			false,
		)));
		let user2 = Type::Scalar(Arc::new(ScalarType::new_user(
			"point",
			Vec::new(),
			None,
			None,
			true,
		)));
		assert_eq!(user, user2);
	}
}
