//! Summarize pre-materialization.
//!
//! The per-group state is seeded from the per table with the identity of
//! each aggregate (COUNT 0, SUM 0, AVG 0 with a zero side-count, MAX -∞,
//! MIN +∞, ALL true, ANY false), then one scan of the summarized table
//! applies the aggregate step to the matching group. Reading a group whose
//! AVG saw no tuples raises AGGREGATE_UNDEFINED.

use super::{MatRow, QResult};
use crate::err::Error;
use crate::expr::Expression;
use crate::kvs::Transaction;
use crate::rel::SummarizeAdd;
use crate::tbl::Table;
use crate::val::{Tuple, Value};
use std::collections::BTreeMap;

enum Acc {
	Count(i64),
	SumInt(i64),
	SumFloat(f64),
	Avg {
		sum: f64,
		count: i64,
	},
	MaxInt(i64),
	MaxFloat(f64),
	MinInt(i64),
	MinFloat(f64),
	All(bool),
	Any(bool),
}

impl Acc {
	/// The identity state of an aggregate over the given operand type.
	fn identity(name: &str, arg: Option<&crate::typ::Type>) -> Result<Acc, Error> {
		match name {
			"count" => Ok(Acc::Count(0)),
			"sum" => match arg {
				Some(t) if t.is_integer() => Ok(Acc::SumInt(0)),
				Some(t) if t.is_float() => Ok(Acc::SumFloat(0.0)),
				_ => Err(Error::TypeMismatch("sum needs a numeric operand".to_string())),
			},
			"avg" => match arg {
				Some(t) if t.is_integer() || t.is_float() => Ok(Acc::Avg {
					sum: 0.0,
					count: 0,
				}),
				_ => Err(Error::TypeMismatch("avg needs a numeric operand".to_string())),
			},
			"max" => match arg {
				Some(t) if t.is_integer() => Ok(Acc::MaxInt(i64::MIN)),
				Some(t) if t.is_float() => Ok(Acc::MaxFloat(f64::NEG_INFINITY)),
				_ => Err(Error::TypeMismatch("max needs a numeric operand".to_string())),
			},
			"min" => match arg {
				Some(t) if t.is_integer() => Ok(Acc::MinInt(i64::MAX)),
				Some(t) if t.is_float() => Ok(Acc::MinFloat(f64::INFINITY)),
				_ => Err(Error::TypeMismatch("min needs a numeric operand".to_string())),
			},
			"all" => Ok(Acc::All(true)),
			"any" => Ok(Acc::Any(false)),
			_ => Err(Error::OperatorNotFound(name.to_string())),
		}
	}

	fn step(&mut self, val: Option<&Value>) -> Result<(), Error> {
		match self {
			Acc::Count(n) => *n += 1,
			Acc::SumInt(s) => *s += val.expect("typed above").int_val()?,
			Acc::SumFloat(s) => *s += val.expect("typed above").float_val()?,
			Acc::Avg {
				sum,
				count,
			} => {
				let v = match val.expect("typed above") {
					v if v.typ().is_some_and(crate::typ::Type::is_integer) => {
						v.int_val()? as f64
					}
					v => v.float_val()?,
				};
				*sum += v;
				*count += 1;
			}
			Acc::MaxInt(m) => *m = (*m).max(val.expect("typed above").int_val()?),
			Acc::MaxFloat(m) => *m = (*m).max(val.expect("typed above").float_val()?),
			Acc::MinInt(m) => *m = (*m).min(val.expect("typed above").int_val()?),
			Acc::MinFloat(m) => *m = (*m).min(val.expect("typed above").float_val()?),
			Acc::All(b) => *b = *b && val.expect("typed above").bool_val()?,
			Acc::Any(b) => *b = *b || val.expect("typed above").bool_val()?,
		}
		Ok(())
	}

	/// The emitted value, or the error a read of it must raise.
	fn emit(&self) -> Result<Value, Error> {
		match self {
			Acc::Count(n) => Ok(Value::from(*n)),
			Acc::SumInt(s) => Ok(Value::from(*s)),
			Acc::SumFloat(s) => Ok(Value::from(*s)),
			Acc::Avg {
				sum,
				count,
			} => {
				if *count == 0 {
					Err(Error::AggregateUndefined)
				} else {
					Ok(Value::from(*sum / *count as f64))
				}
			}
			Acc::MaxInt(m) => Ok(Value::from(*m)),
			Acc::MaxFloat(m) => Ok(Value::from(*m)),
			Acc::MinInt(m) => Ok(Value::from(*m)),
			Acc::MinFloat(m) => Ok(Value::from(*m)),
			Acc::All(b) => Ok(Value::from(*b)),
			Acc::Any(b) => Ok(Value::from(*b)),
		}
	}
}

pub(crate) fn summarize_rows(
	base: &Table,
	per: &Table,
	adds: &[SummarizeAdd],
	tx: Option<&Transaction>,
) -> Result<Vec<MatRow>, Error> {
	// parse the aggregate invocations once
	let mut parsed: Vec<(&str, Option<&Expression>)> = Vec::with_capacity(adds.len());
	for add in adds {
		match &add.exp {
			Expression::Op(op) => parsed.push((op.name.as_str(), op.args.first())),
			_ => {
				return Err(Error::InvalidArgument(
					"summarize add must be an aggregate invocation".to_string(),
				))
			}
		}
	}

	// seed one state per tuple of the per table
	let per_names: Vec<&str> = per.tuple_typ().names().collect();
	let mut groups: BTreeMap<Vec<u8>, (Tuple, Vec<Acc>)> = BTreeMap::new();
	let mut qr = QResult::new(per, tx)?;
	while let Some(t) = qr.next(tx)? {
		let mut accs = Vec::with_capacity(parsed.len());
		for (name, arg) in &parsed {
			let arg_type = match arg {
				Some(e) => Some(e.expr_type(Some(base.tuple_typ()), tx)?),
				None => None,
			};
			accs.push(Acc::identity(name, arg_type.as_ref())?);
		}
		let key = Value::from(t.clone()).to_irep()?;
		groups.insert(key, (t, accs));
	}

	// one scan of the summarized table applies the aggregate steps
	let mut qr = QResult::new(base, tx)?;
	while let Some(t) = qr.next(tx)? {
		let key = Value::from(t.project(&per_names)).to_irep()?;
		let Some((_, accs)) = groups.get_mut(&key) else {
			continue;
		};
		for (acc, (_, arg)) in accs.iter_mut().zip(parsed.iter()) {
			let val = match arg {
				Some(e) => Some(e.evaluate(Some(&t), tx)?),
				None => None,
			};
			acc.step(val.as_ref())?;
		}
	}

	let mut rows = Vec::with_capacity(groups.len());
	for (_, (mut tuple, accs)) in groups {
		let mut err = None;
		for (acc, add) in accs.iter().zip(adds.iter()) {
			match acc.emit() {
				Ok(v) => tuple.set(add.name.clone(), v),
				Err(e) => {
					err.get_or_insert(e);
				}
			}
		}
		rows.push(MatRow {
			tuple,
			err,
		});
	}
	Ok(rows)
}
