//! Arrays: ordered sequences of values of a common base type.

use super::Value;
use crate::err::Error;
use crate::kvs::Transaction;
use std::fmt;
use std::ops::Deref;
use std::ops::DerefMut;

#[derive(Clone, Debug, Default)]
pub struct Array(pub Vec<Value>);

impl Array {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn length(&self) -> i64 {
		self.0.len() as i64
	}

	/// The index of the first element equal to `val`, or -1.
	pub fn index_of(&self, val: &Value, tx: Option<&Transaction>) -> Result<i64, Error> {
		for (i, v) in self.0.iter().enumerate() {
			if v.equals(val, tx)? {
				return Ok(i as i64);
			}
		}
		Ok(-1)
	}

	pub fn get(&self, idx: i64) -> Result<&Value, Error> {
		if idx < 0 {
			return Err(Error::InvalidArgument(format!("negative array index {idx}")));
		}
		self.0
			.get(idx as usize)
			.ok_or_else(|| Error::NotFound(format!("array index {idx} out of bounds")))
	}

	pub fn equals(&self, other: &Array, tx: Option<&Transaction>) -> Result<bool, Error> {
		if self.0.len() != other.0.len() {
			return Ok(false);
		}
		for (a, b) in self.0.iter().zip(other.0.iter()) {
			if !a.equals(b, tx)? {
				return Ok(false);
			}
		}
		Ok(true)
	}
}

impl Deref for Array {
	type Target = Vec<Value>;
	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl DerefMut for Array {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

impl From<Vec<Value>> for Array {
	fn from(v: Vec<Value>) -> Self {
		Array(v)
	}
}

impl IntoIterator for Array {
	type Item = Value;
	type IntoIter = std::vec::IntoIter<Value>;
	fn into_iter(self) -> Self::IntoIter {
		self.0.into_iter()
	}
}

impl fmt::Display for Array {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[")?;
		for (i, v) in self.0.iter().enumerate() {
			if i > 0 {
				write!(f, ", ")?;
			}
			write!(f, "{v}")?;
		}
		write!(f, "]")
	}
}
