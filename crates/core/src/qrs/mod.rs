//! The tuple-stream iterator.
//!
//! A [`QResult`] produces the tuples of a table one at a time. Stored and
//! local tables stream directly; virtual tables get one strategy per
//! relational operator, following the algebraic definitions: unions suppress
//! duplicates from the second operand, projections with key loss de-duplicate
//! through a set of projected representations, summarize pre-materializes
//! its per-group state, joins run a nested loop with a restartable inner
//! stream, and the transitive closure iterates to a fixed point.
//!
//! No ordering is guaranteed; [`table_to_array`] applies an explicit sort
//! specification where one is needed.

mod summarize;

use crate::err::Error;
use crate::expr::Expression;
use crate::kvs::{StoreCursor, Transaction};
use crate::rel::SummarizeAdd;
use crate::tbl::{const_string, contains_matching, eval_table_arg, Table};
use crate::typ::Type;
use crate::val::{Tuple, Value};
use std::collections::BTreeSet;

/// One step of an explicit ordering: an attribute and a direction.
#[derive(Clone, Debug)]
pub struct SeqItem {
	pub attr: String,
	pub asc: bool,
}

impl SeqItem {
	pub fn asc(attr: impl Into<String>) -> SeqItem {
		SeqItem {
			attr: attr.into(),
			asc: true,
		}
	}

	pub fn desc(attr: impl Into<String>) -> SeqItem {
		SeqItem {
			attr: attr.into(),
			asc: false,
		}
	}
}

enum QrKind {
	Local {
		rows: std::vec::IntoIter<Tuple>,
	},
	Stored {
		table: Table,
		cursor: Box<dyn StoreCursor>,
		started: bool,
	},
	/// Point lookup through the primary key of a stored table
	PIndex {
		table: Table,
		key: Value,
		done: bool,
	},
	Select {
		inner: Box<QResult>,
		cond: Expression,
	},
	Union {
		first: Option<Box<QResult>>,
		table1: Table,
		table2: Table,
		second: Option<Box<QResult>>,
		disjoint: bool,
	},
	/// minus (keep = false) and intersect (keep = true)
	Filter {
		inner: Box<QResult>,
		other: Table,
		keep: bool,
	},
	/// semijoin (negate = false) and semiminus (negate = true)
	Semi {
		inner: Box<QResult>,
		other: Table,
		negate: bool,
	},
	Join {
		outer: Box<QResult>,
		inner: Box<QResult>,
		inner_table: Table,
		outer_tuple: Option<Tuple>,
		common: Vec<String>,
	},
	Extend {
		inner: Box<QResult>,
		attrs: Vec<(String, Expression)>,
	},
	Project {
		inner: Box<QResult>,
		names: Vec<String>,
		/// set of projected representations, present on key loss
		seen: Option<BTreeSet<Vec<u8>>>,
	},
	Rename {
		inner: Box<QResult>,
		pairs: Vec<(String, String)>,
	},
	Wrap {
		inner: Box<QResult>,
		attrs: Vec<String>,
		name: String,
	},
	Unwrap {
		inner: Box<QResult>,
		name: String,
	},
	Ungroup {
		inner: Box<QResult>,
		rvname: String,
		pending: Vec<Tuple>,
	},
	Divide {
		inner: Box<QResult>,
		divisor: Vec<Tuple>,
		mediator: Table,
	},
	/// group, tclose and summarize pre-materialize their result
	Materialized {
		rows: std::vec::IntoIter<MatRow>,
	},
}

/// A materialized row, optionally poisoned by an undefined aggregate that
/// must surface when the row is read.
pub(crate) struct MatRow {
	pub(crate) tuple: Tuple,
	pub(crate) err: Option<Error>,
}

impl MatRow {
	pub(crate) fn ok(tuple: Tuple) -> MatRow {
		MatRow {
			tuple,
			err: None,
		}
	}
}

/// A lazy stream over the tuples of a table.
pub struct QResult {
	kind: QrKind,
}

impl QResult {
	/// Opens a stream over `table`, choosing the strategy by table kind.
	pub fn new(table: &Table, tx: Option<&Transaction>) -> Result<QResult, Error> {
		if table.is_local() {
			return Ok(QResult {
				kind: QrKind::Local {
					rows: table.local_tuples()?.into_iter(),
				},
			});
		}
		if table.is_real() {
			let tx = tx.ok_or(Error::NoRunningTx)?;
			let real = table.real().expect("checked above");
			let rm = real
				.recmap
				.read()
				.ok_or_else(|| Error::Internal("table has no record map".to_string()))?;
			let cursor = tx.store().cursor(rm, tx.stx())?;
			return Ok(QResult {
				kind: QrKind::Stored {
					table: table.clone(),
					cursor,
					started: false,
				},
			});
		}
		let exp = table
			.defining_expr()
			.ok_or_else(|| Error::InvalidArgument("public table is not mapped".to_string()))?;
		Self::from_expr(table, &exp, tx)
	}

	fn from_expr(
		table: &Table,
		exp: &Expression,
		tx: Option<&Transaction>,
	) -> Result<QResult, Error> {
		let (name, args) = match exp {
			Expression::Op(op) => (op.name.as_str(), op.args.as_slice()),
			_ => {
				return Err(Error::Internal(
					"virtual table without an operator expression".to_string(),
				))
			}
		};
		let kind = match name {
			"where" => {
				let base = eval_table_arg(&args[0], tx)?;
				if let Some(key) = pindex_key(&base, &args[1]) {
					trace!("using primary-index path for selection");
					QrKind::PIndex {
						table: base,
						key,
						done: false,
					}
				} else {
					QrKind::Select {
						inner: Box::new(QResult::new(&base, tx)?),
						cond: args[1].clone(),
					}
				}
			}
			"union" | "d_union" => {
				let t1 = eval_table_arg(&args[0], tx)?;
				let t2 = eval_table_arg(&args[1], tx)?;
				QrKind::Union {
					first: Some(Box::new(QResult::new(&t1, tx)?)),
					table1: t1,
					table2: t2,
					second: None,
					disjoint: name == "d_union",
				}
			}
			"minus" | "intersect" => {
				let t1 = eval_table_arg(&args[0], tx)?;
				let t2 = eval_table_arg(&args[1], tx)?;
				QrKind::Filter {
					inner: Box::new(QResult::new(&t1, tx)?),
					other: t2,
					keep: name == "intersect",
				}
			}
			"semijoin" | "semiminus" => {
				let t1 = eval_table_arg(&args[0], tx)?;
				let t2 = eval_table_arg(&args[1], tx)?;
				QrKind::Semi {
					inner: Box::new(QResult::new(&t1, tx)?),
					other: t2,
					negate: name == "semiminus",
				}
			}
			"join" => {
				let t1 = eval_table_arg(&args[0], tx)?;
				let t2 = eval_table_arg(&args[1], tx)?;
				let common: Vec<String> = t1
					.tuple_typ()
					.names()
					.filter(|n| t2.tuple_typ().contains(n))
					.map(str::to_string)
					.collect();
				QrKind::Join {
					outer: Box::new(QResult::new(&t1, tx)?),
					inner: Box::new(QResult::new(&t2, tx)?),
					inner_table: t2,
					outer_tuple: None,
					common,
				}
			}
			"extend" => {
				let base = eval_table_arg(&args[0], tx)?;
				let mut attrs = Vec::new();
				let mut i = 1;
				while i + 1 < args.len() {
					attrs.push((const_string(&args[i])?, args[i + 1].clone()));
					i += 2;
				}
				QrKind::Extend {
					inner: Box::new(QResult::new(&base, tx)?),
					attrs,
				}
			}
			"project" => {
				let base = eval_table_arg(&args[0], tx)?;
				let mut names = Vec::new();
				for a in &args[1..] {
					names.push(const_string(a)?);
				}
				// key loss: no key of the input survives the projection
				let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
				let keyloss = !base.keys().iter().any(|k| k.within(&name_refs));
				QrKind::Project {
					inner: Box::new(QResult::new(&base, tx)?),
					names,
					seen: keyloss.then(BTreeSet::new),
				}
			}
			"rename" => {
				let base = eval_table_arg(&args[0], tx)?;
				let mut pairs = Vec::new();
				let mut i = 1;
				while i + 1 < args.len() {
					pairs.push((const_string(&args[i])?, const_string(&args[i + 1])?));
					i += 2;
				}
				QrKind::Rename {
					inner: Box::new(QResult::new(&base, tx)?),
					pairs,
				}
			}
			"wrap" => {
				let base = eval_table_arg(&args[0], tx)?;
				let attrs = string_list_value(&args[1])?;
				QrKind::Wrap {
					inner: Box::new(QResult::new(&base, tx)?),
					attrs,
					name: const_string(&args[2])?,
				}
			}
			"unwrap" => {
				let base = eval_table_arg(&args[0], tx)?;
				QrKind::Unwrap {
					inner: Box::new(QResult::new(&base, tx)?),
					name: const_string(&args[1])?,
				}
			}
			"group" => {
				let base = eval_table_arg(&args[0], tx)?;
				let attrs = string_list_value(&args[1])?;
				let rvname = const_string(&args[2])?;
				let rows = group_rows(table, &base, &attrs, &rvname, tx)?;
				QrKind::Materialized {
					rows: rows.into_iter(),
				}
			}
			"ungroup" => {
				let base = eval_table_arg(&args[0], tx)?;
				QrKind::Ungroup {
					inner: Box::new(QResult::new(&base, tx)?),
					rvname: const_string(&args[1])?,
					pending: Vec::new(),
				}
			}
			"divide" => {
				let t1 = eval_table_arg(&args[0], tx)?;
				let t2 = eval_table_arg(&args[1], tx)?;
				let t3 = eval_table_arg(&args[2], tx)?;
				QrKind::Divide {
					inner: Box::new(QResult::new(&t1, tx)?),
					divisor: t2.to_tuples(tx)?,
					mediator: t3,
				}
			}
			"tclose" => {
				let base = eval_table_arg(&args[0], tx)?;
				let rows = tclose_rows(&base, tx)?;
				QrKind::Materialized {
					rows: rows.into_iter(),
				}
			}
			"summarize" => {
				let base = eval_table_arg(&args[0], tx)?;
				let per = eval_table_arg(&args[1], tx)?;
				let mut adds = Vec::new();
				let mut i = 2;
				while i + 1 < args.len() {
					adds.push(SummarizeAdd {
						exp: args[i].clone(),
						name: const_string(&args[i + 1])?,
					});
					i += 2;
				}
				let rows = summarize::summarize_rows(&base, &per, &adds, tx)?;
				QrKind::Materialized {
					rows: rows.into_iter(),
				}
			}
			other => {
				return Err(Error::NotSupported(format!(
					"cannot iterate operator {other}"
				)))
			}
		};
		Ok(QResult {
			kind,
		})
	}

	/// Produces the next tuple, or `None` at the end of the stream.
	pub fn next(&mut self, tx: Option<&Transaction>) -> Result<Option<Tuple>, Error> {
		match &mut self.kind {
			QrKind::Local {
				rows,
			} => Ok(rows.next()),
			QrKind::Stored {
				table,
				cursor,
				started,
			} => {
				let more = if *started {
					cursor.next()?
				} else {
					*started = true;
					cursor.first()?
				};
				if !more {
					return Ok(None);
				}
				let real = table.real().expect("stored stream over a real table");
				let mut fields = Vec::with_capacity(real.field_attrs.len());
				for no in 0..real.field_attrs.len() {
					fields.push(cursor.field(no)?);
				}
				Ok(Some(table.tuple_from_fields(&fields)?))
			}
			QrKind::PIndex {
				table,
				key,
				done,
			} => {
				if *done {
					return Ok(None);
				}
				*done = true;
				let tx = tx.ok_or(Error::NoRunningTx)?;
				let real = table.real().expect("index path over a real table");
				let rm = real
					.recmap
					.read()
					.ok_or_else(|| Error::Internal("table has no record map".to_string()))?;
				let fieldnos: Vec<usize> = (0..real.field_attrs.len()).collect();
				match tx.store().get_fields(rm, &[key.to_irep()?], &fieldnos, tx.stx()) {
					Ok(fields) => Ok(Some(table.tuple_from_fields(&fields)?)),
					Err(crate::kvs::StoreError::NotFound) => Ok(None),
					Err(e) => Err(e.into()),
				}
			}
			QrKind::Select {
				inner,
				cond,
			} => loop {
				match inner.next(tx)? {
					Some(t) => {
						if cond.evaluate_bool(Some(&t), tx)? {
							return Ok(Some(t));
						}
					}
					None => return Ok(None),
				}
			},
			QrKind::Union {
				first,
				table1,
				table2,
				second,
				disjoint,
			} => {
				if let Some(qr) = first {
					if let Some(t) = qr.next(tx)? {
						return Ok(Some(t));
					}
					*first = None;
					*second = Some(Box::new(QResult::new(table2, tx)?));
				}
				let qr = second.as_mut().expect("second stream opened above");
				loop {
					match qr.next(tx)? {
						Some(t) => {
							if table1.contains(&t, tx)? {
								if *disjoint {
									return Err(Error::ElementExists(
										"tuple occurs in both operands".to_string(),
									));
								}
								continue;
							}
							return Ok(Some(t));
						}
						None => return Ok(None),
					}
				}
			}
			QrKind::Filter {
				inner,
				other,
				keep,
			} => loop {
				match inner.next(tx)? {
					Some(t) => {
						if other.contains(&t, tx)? == *keep {
							return Ok(Some(t));
						}
					}
					None => return Ok(None),
				}
			},
			QrKind::Semi {
				inner,
				other,
				negate,
			} => loop {
				match inner.next(tx)? {
					Some(t) => {
						if contains_matching(other, &t, tx)? != *negate {
							return Ok(Some(t));
						}
					}
					None => return Ok(None),
				}
			},
			QrKind::Join {
				outer,
				inner,
				inner_table,
				outer_tuple,
				common,
			} => {
				if outer_tuple.is_none() {
					match outer.next(tx)? {
						Some(t) => *outer_tuple = Some(t),
						None => return Ok(None),
					}
				}
				loop {
					match inner.next(tx)? {
						Some(t) => {
							let ot = outer_tuple.as_ref().expect("outer position held");
							let mut matches = true;
							for attr in common.iter() {
								let a = ot.get(attr).ok_or_else(|| {
									Error::Internal(format!("missing join attribute {attr}"))
								})?;
								let b = t.get(attr).ok_or_else(|| {
									Error::Internal(format!("missing join attribute {attr}"))
								})?;
								if !a.equals(b, tx)? {
									matches = false;
									break;
								}
							}
							if matches {
								let joined = ot.join(&t, tx)?;
								return Ok(Some(joined));
							}
						}
						None => {
							// restart the inner stream for the next outer tuple
							match outer.next(tx)? {
								Some(t) => *outer_tuple = Some(t),
								None => return Ok(None),
							}
							**inner = QResult::new(inner_table, tx)?;
						}
					}
				}
			}
			QrKind::Extend {
				inner,
				attrs,
			} => match inner.next(tx)? {
				Some(mut t) => {
					for (name, exp) in attrs.iter() {
						let v = exp.evaluate(Some(&t), tx)?;
						t.set(name.clone(), v);
					}
					Ok(Some(t))
				}
				None => Ok(None),
			},
			QrKind::Project {
				inner,
				names,
				seen,
			} => {
				let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
				loop {
					match inner.next(tx)? {
						Some(t) => {
							let p = t.project(&name_refs);
							if let Some(seen) = seen {
								let rep = Value::from(p.clone()).to_irep()?;
								if !seen.insert(rep) {
									continue;
								}
							}
							return Ok(Some(p));
						}
						None => return Ok(None),
					}
				}
			}
			QrKind::Rename {
				inner,
				pairs,
			} => match inner.next(tx)? {
				Some(t) => {
					let refs: Vec<(&str, &str)> =
						pairs.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
					Ok(Some(t.rename(&refs)))
				}
				None => Ok(None),
			},
			QrKind::Wrap {
				inner,
				attrs,
				name,
			} => match inner.next(tx)? {
				Some(t) => {
					let refs: Vec<&str> = attrs.iter().map(String::as_str).collect();
					Ok(Some(t.wrap(&refs, name)))
				}
				None => Ok(None),
			},
			QrKind::Unwrap {
				inner,
				name,
			} => match inner.next(tx)? {
				Some(t) => Ok(Some(t.unwrap_attr(name)?)),
				None => Ok(None),
			},
			QrKind::Ungroup {
				inner,
				rvname,
				pending,
			} => loop {
				if let Some(t) = pending.pop() {
					return Ok(Some(t));
				}
				match inner.next(tx)? {
					Some(t) => {
						let rv = t
							.get(rvname)
							.ok_or_else(|| {
								Error::Internal(format!("missing attribute {rvname}"))
							})?
							.as_table()?
							.clone();
						let rest = t.remove(&[rvname.as_str()]);
						for nested in rv.to_tuples(tx)? {
							pending.push(rest.join(&nested, tx)?);
						}
					}
					None => return Ok(None),
				}
			},
			QrKind::Divide {
				inner,
				divisor,
				mediator,
			} => loop {
				match inner.next(tx)? {
					Some(t) => {
						let mut all = true;
						for d in divisor.iter() {
							let joined = t.join(d, tx)?;
							if !mediator.contains(&joined, tx)? {
								all = false;
								break;
							}
						}
						if all {
							return Ok(Some(t));
						}
					}
					None => return Ok(None),
				}
			},
			QrKind::Materialized {
				rows,
			} => match rows.next() {
				Some(MatRow {
					tuple,
					err: None,
				}) => Ok(Some(tuple)),
				Some(MatRow {
					err: Some(e), ..
				}) => Err(e),
				None => Ok(None),
			},
		}
	}
}

/// Detects the primary-index fast path: a condition of the form
/// `<pk-attr> = <literal>` over a stored table with a single-attribute
/// primary key.
pub(crate) fn pindex_key(table: &Table, cond: &Expression) -> Option<Value> {
	if !table.is_real() || table.pkey_len() != 1 {
		return None;
	}
	let pk = &table.keys()[0].attrs()[0];
	let (name, args) = match cond {
		Expression::Op(op) if op.name == "=" && op.args.len() == 2 => ("=", &op.args),
		_ => return None,
	};
	let _ = name;
	match (&args[0], &args[1]) {
		(Expression::Var(attr), Expression::Val(v)) if attr == pk => Some(v.clone()),
		(Expression::Val(v), Expression::Var(attr)) if attr == pk => Some(v.clone()),
		_ => None,
	}
}

fn string_list_value(exp: &Expression) -> Result<Vec<String>, Error> {
	match exp {
		Expression::Val(v) => {
			v.as_array()?.iter().map(|s| s.string_val().map(str::to_string)).collect()
		}
		_ => Err(Error::InvalidArgument("attribute list literal expected".to_string())),
	}
}

/// Materializes the groups of a group operation.
fn group_rows(
	result: &Table,
	base: &Table,
	attrs: &[String],
	rvname: &str,
	tx: Option<&Transaction>,
) -> Result<Vec<MatRow>, Error> {
	use std::collections::BTreeMap;
	let attr_refs: Vec<&str> = attrs.iter().map(String::as_str).collect();
	let nested_typ = match result.tuple_typ().attr(rvname) {
		Some(attr) => match &attr.typ {
			Type::Relation(r) => r.as_ref().clone(),
			_ => return Err(Error::Internal("grouped attribute is not relational".to_string())),
		},
		None => return Err(Error::Internal(format!("missing attribute {rvname}"))),
	};
	let mut groups: BTreeMap<Vec<u8>, (Tuple, Table)> = BTreeMap::new();
	let mut qr = QResult::new(base, tx)?;
	while let Some(t) = qr.next(tx)? {
		let outer = t.remove(&attr_refs);
		let inner = t.project(&attr_refs);
		let key = Value::from(outer.clone()).to_irep()?;
		let entry = match groups.get(&key) {
			Some(_) => None,
			None => Some((outer, Table::new_local(nested_typ.clone(), None)?)),
		};
		if let Some(e) = entry {
			groups.insert(key.clone(), e);
		}
		let (_, nested) = groups.get(&key).expect("group inserted above");
		match nested.local_insert(inner, tx) {
			Ok(()) | Err(Error::ElementExists(_)) => {}
			Err(e) => return Err(e),
		}
	}
	Ok(groups
		.into_values()
		.map(|(mut outer, nested)| {
			outer.set(rvname, Value::from(nested));
			MatRow::ok(outer)
		})
		.collect())
}

/// Computes the transitive closure of a binary relation by iterating joins
/// to a fixed point.
fn tclose_rows(base: &Table, tx: Option<&Transaction>) -> Result<Vec<MatRow>, Error> {
	use std::collections::BTreeMap;
	let attrs = &base.tuple_typ().attrs;
	let (a1, a2) = (attrs[0].name.clone(), attrs[1].name.clone());
	let mut pairs: BTreeMap<Vec<u8>, (Value, Value)> = BTreeMap::new();
	let mut qr = QResult::new(base, tx)?;
	while let Some(t) = qr.next(tx)? {
		let x = t.get(&a1).expect("binary relation").clone();
		let y = t.get(&a2).expect("binary relation").clone();
		let key = [x.to_irep()?, y.to_irep()?].concat();
		pairs.insert(key, (x, y));
	}
	loop {
		let mut added = Vec::new();
		for (x, y) in pairs.values() {
			for (u, v) in pairs.values() {
				if y.equals(u, tx)? {
					let key = [x.to_irep()?, v.to_irep()?].concat();
					if !pairs.contains_key(&key) {
						added.push((key, (x.clone(), v.clone())));
					}
				}
			}
		}
		if added.is_empty() {
			break;
		}
		for (key, pair) in added {
			pairs.insert(key, pair);
		}
	}
	Ok(pairs
		.into_values()
		.map(|(x, y)| {
			let mut t = Tuple::new();
			t.set(a1.clone(), x);
			t.set(a2.clone(), y);
			MatRow::ok(t)
		})
		.collect())
}

/// Materializes a table into an array value, optionally sorted by an
/// explicit ordering. Without a sort specification the order is arbitrary.
pub fn table_to_array(
	table: &Table,
	seq: &[SeqItem],
	tx: Option<&Transaction>,
) -> Result<Vec<Tuple>, Error> {
	for item in seq {
		match table.tuple_typ().attr(&item.attr) {
			Some(a) if a.typ.is_ordered() => {}
			Some(_) => {
				return Err(Error::TypeMismatch(format!(
					"attribute {} is not ordered",
					item.attr
				)))
			}
			None => return Err(Error::Name(format!("attribute {} not found", item.attr))),
		}
	}
	let mut tuples = table.to_tuples(tx)?;
	if !seq.is_empty() {
		let mut err = None;
		tuples.sort_by(|a, b| {
			for item in seq {
				let (x, y) = (a.get(&item.attr), b.get(&item.attr));
				let ord = match (x, y) {
					(Some(x), Some(y)) => match x.compare(y, tx) {
						Ok(o) => o,
						Err(e) => {
							err.get_or_insert(e);
							std::cmp::Ordering::Equal
						}
					},
					_ => std::cmp::Ordering::Equal,
				};
				let ord = if item.asc {
					ord
				} else {
					ord.reverse()
				};
				if ord != std::cmp::Ordering::Equal {
					return ord;
				}
			}
			std::cmp::Ordering::Equal
		});
		if let Some(e) = err {
			return Err(e);
		}
	}
	Ok(tuples)
}
