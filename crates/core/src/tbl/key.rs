//! Candidate keys.

use crate::err::Error;
use crate::typ::TupleType;

/// A candidate key: a set of attribute names guaranteed unique across the
/// tuples of a table. The declaration order of the first key determines the
/// primary-key field prefix of a stored table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Key(pub Vec<String>);

impl Key {
	pub fn new<I, S>(attrs: I) -> Key
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Key(attrs.into_iter().map(Into::into).collect())
	}

	pub fn attrs(&self) -> &[String] {
		&self.0
	}

	pub fn contains(&self, name: &str) -> bool {
		self.0.iter().any(|a| a == name)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Set inclusion, ignoring order.
	pub fn is_subset_of(&self, other: &Key) -> bool {
		self.0.iter().all(|a| other.contains(a))
	}

	/// Set equality, ignoring order.
	pub fn set_eq(&self, other: &Key) -> bool {
		self.is_subset_of(other) && other.is_subset_of(self)
	}

	/// Whether every attribute of this key is in `names`.
	pub fn within(&self, names: &[&str]) -> bool {
		self.0.iter().all(|a| names.contains(&a.as_str()))
	}

	/// The key with attributes renamed.
	pub fn rename(&self, pairs: &[(&str, &str)]) -> Key {
		Key(self
			.0
			.iter()
			.map(|a| {
				pairs
					.iter()
					.find(|(from, _)| from == a)
					.map(|(_, to)| to.to_string())
					.unwrap_or_else(|| a.clone())
			})
			.collect())
	}

	/// The union of two keys, without duplicates.
	pub fn union(&self, other: &Key) -> Key {
		let mut attrs = self.0.clone();
		for a in &other.0 {
			if !attrs.contains(a) {
				attrs.push(a.clone());
			}
		}
		Key(attrs)
	}
}

/// The all-attribute key of a heading.
pub(crate) fn all_key(tt: &TupleType) -> Key {
	Key(tt.names().map(str::to_string).collect())
}

/// Validates a key list against a heading: keys must be non-empty, name
/// existing attributes without repetition, and no key may be a proper
/// subset of another.
pub(crate) fn validate_keys(tt: &TupleType, keys: &[Key]) -> Result<(), Error> {
	if keys.is_empty() {
		return Err(Error::InvalidArgument("table needs at least one key".to_string()));
	}
	for key in keys {
		if key.is_empty() && !tt.attrs.is_empty() {
			return Err(Error::InvalidArgument("empty candidate key".to_string()));
		}
		for (i, attr) in key.0.iter().enumerate() {
			if !tt.contains(attr) {
				return Err(Error::InvalidArgument(format!("key attribute {attr} not found")));
			}
			if key.0[..i].contains(attr) {
				return Err(Error::InvalidArgument(format!("duplicate key attribute {attr}")));
			}
		}
	}
	for (i, a) in keys.iter().enumerate() {
		for (j, b) in keys.iter().enumerate() {
			if i != j && a.is_subset_of(b) && !b.is_subset_of(a) {
				return Err(Error::InvalidArgument(
					"a key must not be a subset of another key".to_string(),
				));
			}
			if i < j && a.set_eq(b) {
				return Err(Error::InvalidArgument("duplicate candidate key".to_string()));
			}
		}
	}
	Ok(())
}

/// Drops keys that are proper supersets of another key in the list, and
/// collapses duplicates. Used by join key inference.
pub(crate) fn remove_redundant_keys(keys: Vec<Key>) -> Vec<Key> {
	let mut out: Vec<Key> = Vec::new();
	for key in &keys {
		let dominated = keys
			.iter()
			.any(|other| other.is_subset_of(key) && !key.is_subset_of(other));
		if !dominated && !out.iter().any(|k| k.set_eq(key)) {
			out.push(key.clone());
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::typ::{Attr, Type};

	fn heading() -> TupleType {
		TupleType::new(vec![
			Attr::new("a", Type::integer()),
			Attr::new("b", Type::integer()),
			Attr::new("c", Type::integer()),
		])
		.unwrap()
	}

	#[test]
	fn subset_keys_rejected() {
		let keys = vec![Key::new(["a", "b"]), Key::new(["a"])];
		assert!(validate_keys(&heading(), &keys).is_err());
	}

	#[test]
	fn distinct_keys_accepted() {
		let keys = vec![Key::new(["a"]), Key::new(["b", "c"])];
		assert!(validate_keys(&heading(), &keys).is_ok());
	}

	#[test]
	fn unknown_key_attr_rejected() {
		let keys = vec![Key::new(["z"])];
		assert!(validate_keys(&heading(), &keys).is_err());
	}

	#[test]
	fn redundant_supersets_removed() {
		let keys = vec![
			Key::new(["a", "b"]),
			Key::new(["a"]),
			Key::new(["b", "a"]),
			Key::new(["b", "c"]),
		];
		let out = remove_redundant_keys(keys);
		assert_eq!(out.len(), 2);
		assert!(out.iter().any(|k| k.set_eq(&Key::new(["a"]))));
		assert!(out.iter().any(|k| k.set_eq(&Key::new(["b", "c"]))));
	}
}
