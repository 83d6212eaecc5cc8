//! Tuples: unordered mappings from attribute name to value.

use super::Value;
use crate::err::Error;
use crate::kvs::Transaction;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::ops::DerefMut;

#[derive(Clone, Debug, Default)]
pub struct Tuple(pub BTreeMap<String, Value>);

impl Tuple {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, name: &str) -> Option<&Value> {
		self.0.get(name)
	}

	pub fn set(&mut self, name: impl Into<String>, val: Value) {
		self.0.insert(name.into(), val);
	}

	pub fn remove_attr(&mut self, name: &str) -> Option<Value> {
		self.0.remove(name)
	}

	pub fn contains(&self, name: &str) -> bool {
		self.0.contains_key(name)
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}

	/// The tuple restricted to the given attributes. Attributes not present
	/// are ignored.
	pub fn project(&self, names: &[&str]) -> Tuple {
		Tuple(
			self.0
				.iter()
				.filter(|(k, _)| names.contains(&k.as_str()))
				.map(|(k, v)| (k.clone(), v.clone()))
				.collect(),
		)
	}

	/// The tuple without the given attributes.
	pub fn remove(&self, names: &[&str]) -> Tuple {
		Tuple(
			self.0
				.iter()
				.filter(|(k, _)| !names.contains(&k.as_str()))
				.map(|(k, v)| (k.clone(), v.clone()))
				.collect(),
		)
	}

	/// The tuple with attributes renamed.
	pub fn rename(&self, pairs: &[(&str, &str)]) -> Tuple {
		Tuple(
			self.0
				.iter()
				.map(|(k, v)| {
					let name = pairs
						.iter()
						.find(|(from, _)| from == k)
						.map(|(_, to)| to.to_string())
						.unwrap_or_else(|| k.clone());
					(name, v.clone())
				})
				.collect(),
		)
	}

	/// Merges two tuples. Shared attributes must agree on value.
	pub fn join(&self, other: &Tuple, tx: Option<&Transaction>) -> Result<Tuple, Error> {
		let mut out = self.clone();
		for (k, v) in &other.0 {
			match out.get(k) {
				Some(mine) => {
					if !mine.equals(v, tx)? {
						return Err(Error::InvalidArgument(format!(
							"tuples disagree on attribute {k}"
						)));
					}
				}
				None => out.set(k.clone(), v.clone()),
			}
		}
		Ok(out)
	}

	/// Replaces the attributes in `names` by one tuple-valued attribute.
	pub fn wrap(&self, names: &[&str], wrapped: &str) -> Tuple {
		let inner = self.project(names);
		let mut out = self.remove(names);
		out.set(wrapped, Value::from(inner));
		out
	}

	/// Replaces the tuple-valued attribute `name` by its attributes.
	pub fn unwrap_attr(&self, name: &str) -> Result<Tuple, Error> {
		let inner = match self.get(name) {
			Some(v) => v.as_tuple()?.clone(),
			None => return Err(Error::Name(format!("attribute {name} not found"))),
		};
		let mut out = self.remove(&[name]);
		for (k, v) in inner.0 {
			out.set(k, v);
		}
		Ok(out)
	}

	/// Whether two tuples have the same attributes with equal values.
	pub fn equals(&self, other: &Tuple, tx: Option<&Transaction>) -> Result<bool, Error> {
		if self.0.len() != other.0.len() {
			return Ok(false);
		}
		for (k, v) in &self.0 {
			match other.get(k) {
				Some(o) => {
					if !v.equals(o, tx)? {
						return Ok(false);
					}
				}
				None => return Ok(false),
			}
		}
		Ok(true)
	}
}

impl Deref for Tuple {
	type Target = BTreeMap<String, Value>;
	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl DerefMut for Tuple {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

impl From<BTreeMap<String, Value>> for Tuple {
	fn from(m: BTreeMap<String, Value>) -> Self {
		Tuple(m)
	}
}

impl IntoIterator for Tuple {
	type Item = (String, Value);
	type IntoIter = std::collections::btree_map::IntoIter<String, Value>;
	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}

impl fmt::Display for Tuple {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{{")?;
		for (i, (k, v)) in self.0.iter().enumerate() {
			if i > 0 {
				write!(f, ",")?;
			}
			write!(f, " {k} {v}")?;
		}
		write!(f, " }}")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn project_and_remove() {
		let t = tuple!("a" => 1i64, "b" => "x", "c" => 2.0f64);
		assert_eq!(t.project(&["a", "c"]).len(), 2);
		assert_eq!(t.remove(&["a"]).len(), 2);
		assert!(!t.remove(&["a"]).contains("a"));
	}

	#[test]
	fn rename_keeps_values() {
		let t = tuple!("a" => 1i64);
		let r = t.rename(&[("a", "b")]);
		assert!(r.get("b").is_some());
		assert!(r.get("a").is_none());
	}

	#[test]
	fn join_disagreement_fails() {
		let a = tuple!("k" => 1i64, "x" => "u");
		let b = tuple!("k" => 2i64, "y" => "v");
		assert!(a.join(&b, None).is_err());
		let c = tuple!("k" => 1i64, "y" => "v");
		let j = a.join(&c, None).unwrap();
		assert_eq!(j.len(), 3);
	}

	#[test]
	fn wrap_unwrap_round_trip() {
		let t = tuple!("a" => 1i64, "b" => "x", "c" => 2.0f64);
		let w = t.wrap(&["a", "b"], "ab");
		assert!(w.contains("ab"));
		let u = w.unwrap_attr("ab").unwrap();
		assert!(u.equals(&t, None).unwrap());
	}
}
