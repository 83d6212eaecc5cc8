//! The catalog's binary format.
//!
//! Types, values and expressions are stored in the catalog's binary columns
//! in a self-describing tag+length layout: scalar types are referenced by
//! name, nonscalar constructors by structure, strings and byte runs are
//! length-prefixed. The format is what `serialize` exposes to users and
//! what virtual-table definitions, operator signatures and constraint
//! expressions persist as.

use crate::err::Error;
use crate::expr::Expression;
use crate::kvs::Transaction;
use crate::typ::{Attr, TupleType, Type};
use crate::val::Value;

const T_SCALAR: u8 = 0;
const T_TUPLE: u8 = 1;
const T_RELATION: u8 = 2;
const T_ARRAY: u8 = 3;

const E_VAL: u8 = 0;
const E_VAR: u8 = 1;
const E_TABLE: u8 = 2;
const E_OP: u8 = 3;
const E_COMP: u8 = 4;

fn w_u32(out: &mut Vec<u8>, v: u32) {
	out.extend_from_slice(&v.to_be_bytes());
}

fn w_str(out: &mut Vec<u8>, s: &str) {
	w_u32(out, s.len() as u32);
	out.extend_from_slice(s.as_bytes());
}

fn w_bytes(out: &mut Vec<u8>, b: &[u8]) {
	w_u32(out, b.len() as u32);
	out.extend_from_slice(b);
}

pub(crate) struct Reader<'a> {
	data: &'a [u8],
	pos: usize,
}

impl<'a> Reader<'a> {
	pub(crate) fn new(data: &'a [u8]) -> Reader<'a> {
		Reader {
			data,
			pos: 0,
		}
	}

	pub(crate) fn done(&self) -> bool {
		self.pos >= self.data.len()
	}

	fn byte(&mut self) -> Result<u8, Error> {
		let b = self
			.data
			.get(self.pos)
			.copied()
			.ok_or_else(|| Error::Internal("truncated catalog data".to_string()))?;
		self.pos += 1;
		Ok(b)
	}

	fn u32(&mut self) -> Result<u32, Error> {
		let end = self.pos + 4;
		if end > self.data.len() {
			return Err(Error::Internal("truncated catalog data".to_string()));
		}
		let v = u32::from_be_bytes(self.data[self.pos..end].try_into().expect("length checked"));
		self.pos = end;
		Ok(v)
	}

	fn bytes(&mut self) -> Result<&'a [u8], Error> {
		let len = self.u32()? as usize;
		let end = self.pos + len;
		if end > self.data.len() {
			return Err(Error::Internal("truncated catalog data".to_string()));
		}
		let b = &self.data[self.pos..end];
		self.pos = end;
		Ok(b)
	}

	fn str(&mut self) -> Result<String, Error> {
		let b = self.bytes()?;
		String::from_utf8(b.to_vec())
			.map_err(|_| Error::Internal("invalid utf-8 in catalog data".to_string()))
	}
}

pub(crate) fn write_type(out: &mut Vec<u8>, typ: &Type) {
	match typ {
		Type::Scalar(st) => {
			out.push(T_SCALAR);
			w_str(out, st.name());
		}
		Type::Tuple(tt) => {
			out.push(T_TUPLE);
			w_u32(out, tt.attrs.len() as u32);
			for a in &tt.attrs {
				w_str(out, &a.name);
				write_type(out, &a.typ);
			}
		}
		Type::Relation(rt) => {
			out.push(T_RELATION);
			write_type(out, &Type::Tuple(rt.base.clone()));
		}
		Type::Array(base) => {
			out.push(T_ARRAY);
			write_type(out, base);
		}
	}
}

pub(crate) fn type_to_bin(typ: &Type) -> Vec<u8> {
	let mut out = Vec::new();
	write_type(&mut out, typ);
	out
}

pub(crate) fn read_type(r: &mut Reader, tx: Option<&Transaction>) -> Result<Type, Error> {
	match r.byte()? {
		T_SCALAR => {
			let name = r.str()?;
			match Type::builtin_scalar(&name) {
				Some(t) => Ok(t),
				None => {
					let tx = tx.ok_or(Error::NoRunningTx)?;
					crate::typ::get_type(&name, tx)
				}
			}
		}
		T_TUPLE => {
			let n = r.u32()? as usize;
			let mut attrs = Vec::with_capacity(n);
			for _ in 0..n {
				let name = r.str()?;
				let typ = read_type(r, tx)?;
				attrs.push(Attr::new(name, typ));
			}
			Ok(Type::Tuple(TupleType::new(attrs)?))
		}
		T_RELATION => match read_type(r, tx)? {
			Type::Tuple(tt) => Ok(Type::relation(tt)),
			_ => Err(Error::Internal("relation over a nonscalar base".to_string())),
		},
		T_ARRAY => Ok(Type::array(read_type(r, tx)?)),
		_ => Err(Error::Internal("unknown type tag".to_string())),
	}
}

pub(crate) fn type_from_bin(data: &[u8], tx: Option<&Transaction>) -> Result<Type, Error> {
	read_type(&mut Reader::new(data), tx)
}

/// Serializes a value as its type followed by its flat representation.
pub fn value_to_bin(val: &Value) -> Result<Vec<u8>, Error> {
	let typ = match val.typ() {
		Some(t) => t.clone(),
		None if val.is_tuple() => Type::Tuple(val.tuple_type()?),
		None => return Err(Error::InvalidArgument("value has no type".to_string())),
	};
	let mut out = Vec::new();
	write_type(&mut out, &typ);
	w_bytes(&mut out, &val.to_irep()?);
	Ok(out)
}

pub(crate) fn read_value(r: &mut Reader, tx: Option<&Transaction>) -> Result<Value, Error> {
	let typ = read_type(r, tx)?;
	let bytes = r.bytes()?;
	Value::from_irep(&typ, bytes)
}

pub(crate) fn value_from_bin(data: &[u8], tx: Option<&Transaction>) -> Result<Value, Error> {
	read_value(&mut Reader::new(data), tx)
}

pub(crate) fn write_expr(out: &mut Vec<u8>, exp: &Expression) -> Result<(), Error> {
	match exp {
		Expression::Val(v) => {
			out.push(E_VAL);
			let bin = value_to_bin(v)?;
			out.extend_from_slice(&bin);
		}
		Expression::Var(name) => {
			out.push(E_VAR);
			w_str(out, name);
		}
		Expression::TableRef(t) => {
			if let Some(name) = t.name() {
				out.push(E_TABLE);
				w_str(out, name);
			} else if let Some(def) = t.defining_expr() {
				// anonymous virtual tables persist by structure
				write_expr(out, &def)?;
			} else if t.is_local() {
				out.push(E_VAL);
				let bin = value_to_bin(&Value::from(t.clone()))?;
				out.extend_from_slice(&bin);
			} else {
				return Err(Error::NotSupported(
					"cannot persist a reference to an unnamed table".to_string(),
				));
			}
		}
		Expression::Op(op) => {
			out.push(E_OP);
			w_str(out, &op.name);
			w_u32(out, op.args.len() as u32);
			for a in &op.args {
				write_expr(out, a)?;
			}
		}
		Expression::CompGet(e, comp) => {
			out.push(E_COMP);
			write_expr(out, e)?;
			w_str(out, comp);
		}
	}
	Ok(())
}

pub(crate) fn expr_to_bin(exp: &Expression) -> Result<Vec<u8>, Error> {
	let mut out = Vec::new();
	write_expr(&mut out, exp)?;
	Ok(out)
}

pub(crate) fn read_expr(r: &mut Reader, tx: &Transaction) -> Result<Expression, Error> {
	match r.byte()? {
		E_VAL => Ok(Expression::Val(read_value(r, Some(tx))?)),
		E_VAR => Ok(Expression::var(r.str()?)),
		E_TABLE => {
			let name = r.str()?;
			let t = crate::env::get_table(&name, tx)?;
			Ok(Expression::table(t))
		}
		E_OP => {
			let name = r.str()?;
			let n = r.u32()? as usize;
			let mut args = Vec::with_capacity(n);
			for _ in 0..n {
				args.push(read_expr(r, tx)?);
			}
			Ok(Expression::op(name, args))
		}
		E_COMP => {
			let e = read_expr(r, tx)?;
			let comp = r.str()?;
			Ok(Expression::comp_get(e, comp))
		}
		_ => Err(Error::Internal("unknown expression tag".to_string())),
	}
}

pub(crate) fn expr_from_bin(data: &[u8], tx: &Transaction) -> Result<Expression, Error> {
	read_expr(&mut Reader::new(data), tx)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn type_round_trip() {
		let t = Type::relation(
			TupleType::new(vec![
				Attr::new("a", Type::integer()),
				Attr::new("b", Type::array(Type::string())),
				Attr::new(
					"c",
					Type::Tuple(
						TupleType::new(vec![Attr::new("x", Type::float())]).unwrap(),
					),
				),
			])
			.unwrap(),
		);
		let bin = type_to_bin(&t);
		let back = type_from_bin(&bin, None).unwrap();
		assert_eq!(t, back);
	}

	#[test]
	fn value_round_trip() {
		for v in [
			Value::from(42i64),
			Value::from("hello"),
			Value::from(true),
			Value::from(vec![1u8, 2, 3]),
			Value::string_array(&["a", "b"]),
		] {
			let bin = value_to_bin(&v).unwrap();
			let back = value_from_bin(&bin, None).unwrap();
			assert!(v.equals(&back, None).unwrap(), "{v} did not round-trip");
		}
	}

	#[test]
	fn expr_round_trip_shape() {
		// no transaction: use only vars, values, and ops
		let e = Expression::op(
			"and",
			vec![
				Expression::gt(Expression::var("salary"), Expression::val(100.0f64)),
				Expression::op("is_empty", vec![Expression::var("emps")]),
			],
		);
		let bin = expr_to_bin(&e).unwrap();
		// reading back needs a transaction only for table refs; check the
		// writer produced a parseable stream by scanning tags manually
		let mut r = Reader::new(&bin);
		assert_eq!(r.byte().unwrap(), E_OP);
		assert_eq!(r.str().unwrap(), "and");
		assert_eq!(r.u32().unwrap(), 2);
	}
}
