//! Construction of the relational operators.
//!
//! Every operator builds a virtual table carrying its defining expression,
//! its result type, and its inferred candidate keys. Evaluation is deferred
//! to the qresult machinery; construction only validates types and computes
//! keys.

mod keys;

use crate::err::Error;
use crate::expr::Expression;
use crate::kvs::Transaction;
use crate::tbl::{all_key, const_string, eval_table_arg, Key, Table};
use crate::typ::{Attr, RelationType, TupleType, Type};
use crate::val::Value;

/// One added attribute of a summarize: an aggregate invocation and the name
/// of the result attribute.
#[derive(Clone, Debug)]
pub struct SummarizeAdd {
	pub exp: Expression,
	pub name: String,
}

/// The aggregate operators usable in summarize and as expressions.
pub(crate) const AGGREGATE_OPS: &[&str] = &["count", "sum", "avg", "max", "min", "all", "any"];

/// The operators whose invocation produces a virtual table.
pub(crate) fn is_relational_op(name: &str) -> bool {
	matches!(
		name,
		"where"
			| "project" | "remove"
			| "rename" | "union"
			| "d_union" | "minus"
			| "semiminus" | "intersect"
			| "semijoin" | "join"
			| "extend" | "wrap"
			| "unwrap" | "group"
			| "ungroup" | "divide"
			| "tclose" | "summarize"
	)
}

fn new_virtual(typ: RelationType, keys: Vec<Key>, exp: Expression) -> Table {
	Table::new_virtual(None, typ, keys, Some(exp), false, true)
}

/// Checks that a selection condition is boolean where that can be decided
/// without a transaction; operators needing catalog access are checked at
/// evaluation time instead.
fn check_bool_cond(cond: &Expression, base: &TupleType) -> Result<(), Error> {
	match cond.expr_type(Some(base), None) {
		Ok(t) if t.is_boolean() => Ok(()),
		Ok(t) => Err(Error::TypeMismatch(format!("condition has type {t}"))),
		Err(_) => Ok(()),
	}
}

fn check_same_type(a: &Table, b: &Table) -> Result<(), Error> {
	if a.typ() != b.typ() {
		return Err(Error::TypeMismatch("operand types differ".to_string()));
	}
	Ok(())
}

impl Table {
	/// The selection of this table by a boolean condition.
	pub fn select(&self, cond: Expression) -> Result<Table, Error> {
		check_bool_cond(&cond, self.tuple_typ())?;
		let exp = Expression::op("where", vec![Expression::table(self.clone()), cond]);
		Ok(new_virtual(self.typ().clone(), self.keys().to_vec(), exp))
	}

	/// The projection of this table onto the given attributes.
	pub fn project(&self, names: &[&str]) -> Result<Table, Error> {
		let heading = self.tuple_typ().project(names)?;
		let keys = match keys::project_keys(self.keys(), names) {
			Some(keys) => keys,
			None => vec![all_key(&heading)],
		};
		let mut args = vec![Expression::table(self.clone())];
		args.extend(names.iter().map(|n| Expression::val(*n)));
		let exp = Expression::op("project", args);
		Ok(new_virtual(RelationType::new(heading), keys, exp))
	}

	/// The projection of this table removing the given attributes.
	pub fn remove(&self, names: &[&str]) -> Result<Table, Error> {
		let heading = self.tuple_typ().remove(names)?;
		let kept: Vec<&str> = heading.attrs.iter().map(|a| a.name.as_str()).collect();
		self.project(&kept)
	}

	/// This table with attributes renamed.
	pub fn rename(&self, pairs: &[(&str, &str)]) -> Result<Table, Error> {
		let heading = self.tuple_typ().rename(pairs)?;
		let keys = keys::rename_keys(self.keys(), pairs);
		let mut args = vec![Expression::table(self.clone())];
		for (from, to) in pairs {
			args.push(Expression::val(*from));
			args.push(Expression::val(*to));
		}
		let exp = Expression::op("rename", args);
		Ok(new_virtual(RelationType::new(heading), keys, exp))
	}

	/// The set union of two tables of the same type.
	pub fn union(&self, other: &Table) -> Result<Table, Error> {
		check_same_type(self, other)?;
		let heading = self.tuple_typ().clone();
		let exp = Expression::op(
			"union",
			vec![Expression::table(self.clone()), Expression::table(other.clone())],
		);
		let keys = vec![all_key(&heading)];
		Ok(new_virtual(RelationType::new(heading), keys, exp))
	}

	/// The disjoint union: like union, but a tuple occurring in both
	/// operands is an error at evaluation time.
	pub fn d_union(&self, other: &Table) -> Result<Table, Error> {
		check_same_type(self, other)?;
		let heading = self.tuple_typ().clone();
		let exp = Expression::op(
			"d_union",
			vec![Expression::table(self.clone()), Expression::table(other.clone())],
		);
		let keys = vec![all_key(&heading)];
		Ok(new_virtual(RelationType::new(heading), keys, exp))
	}

	/// The difference of two tables of the same type.
	pub fn minus(&self, other: &Table) -> Result<Table, Error> {
		check_same_type(self, other)?;
		let exp = Expression::op(
			"minus",
			vec![Expression::table(self.clone()), Expression::table(other.clone())],
		);
		Ok(new_virtual(self.typ().clone(), self.keys().to_vec(), exp))
	}

	/// The tuples of this table matching no tuple of `other` on the common
	/// attributes.
	pub fn semiminus(&self, other: &Table) -> Result<Table, Error> {
		self.tuple_typ().join(other.tuple_typ())?;
		let exp = Expression::op(
			"semiminus",
			vec![Expression::table(self.clone()), Expression::table(other.clone())],
		);
		Ok(new_virtual(self.typ().clone(), self.keys().to_vec(), exp))
	}

	/// The intersection of two tables of the same type.
	pub fn intersect(&self, other: &Table) -> Result<Table, Error> {
		check_same_type(self, other)?;
		let exp = Expression::op(
			"intersect",
			vec![Expression::table(self.clone()), Expression::table(other.clone())],
		);
		Ok(new_virtual(self.typ().clone(), self.keys().to_vec(), exp))
	}

	/// The tuples of this table matching some tuple of `other` on the
	/// common attributes.
	pub fn semijoin(&self, other: &Table) -> Result<Table, Error> {
		self.tuple_typ().join(other.tuple_typ())?;
		let exp = Expression::op(
			"semijoin",
			vec![Expression::table(self.clone()), Expression::table(other.clone())],
		);
		Ok(new_virtual(self.typ().clone(), self.keys().to_vec(), exp))
	}

	/// The natural join of two tables.
	pub fn join(&self, other: &Table) -> Result<Table, Error> {
		let heading = self.tuple_typ().join(other.tuple_typ())?;
		let keys = keys::join_keys(self.keys(), other.keys());
		let exp = Expression::op(
			"join",
			vec![Expression::table(self.clone()), Expression::table(other.clone())],
		);
		Ok(new_virtual(RelationType::new(heading), keys, exp))
	}

	/// This table extended by computed attributes.
	pub fn extend(
		&self,
		attrs: Vec<(String, Expression)>,
		tx: Option<&Transaction>,
	) -> Result<Table, Error> {
		let mut added = Vec::with_capacity(attrs.len());
		for (name, exp) in &attrs {
			let typ = exp.expr_type(Some(self.tuple_typ()), tx)?;
			added.push(Attr::new(name.clone(), typ));
		}
		let heading = self.tuple_typ().extend(added)?;
		let mut args = vec![Expression::table(self.clone())];
		for (name, exp) in attrs {
			args.push(Expression::val(name));
			args.push(exp);
		}
		let exp = Expression::op("extend", args);
		Ok(new_virtual(RelationType::new(heading), self.keys().to_vec(), exp))
	}

	/// The given attributes wrapped into one tuple-valued attribute.
	pub fn wrap(&self, attrs: &[&str], name: &str) -> Result<Table, Error> {
		let heading = self.tuple_typ().wrap(attrs, name)?;
		let keys = match keys::wrap_keys(self.keys(), attrs, name) {
			Some(keys) => keys,
			None => vec![all_key(&heading)],
		};
		let exp = Expression::op(
			"wrap",
			vec![
				Expression::table(self.clone()),
				Expression::val(Value::string_array(attrs)),
				Expression::val(name),
			],
		);
		Ok(new_virtual(RelationType::new(heading), keys, exp))
	}

	/// A tuple-valued attribute unwrapped into its attributes.
	pub fn unwrap_attr(&self, name: &str) -> Result<Table, Error> {
		let inner: Vec<String> = match self.tuple_typ().attr(name) {
			Some(Attr {
				typ: Type::Tuple(t),
				..
			}) => t.names().map(str::to_string).collect(),
			_ => {
				return Err(Error::TypeMismatch(format!("attribute {name} is not tuple-valued")))
			}
		};
		let heading = self.tuple_typ().unwrap(name)?;
		let inner_refs: Vec<&str> = inner.iter().map(String::as_str).collect();
		let keys = keys::unwrap_keys(self.keys(), name, &inner_refs);
		let exp = Expression::op(
			"unwrap",
			vec![Expression::table(self.clone()), Expression::val(name)],
		);
		Ok(new_virtual(RelationType::new(heading), keys, exp))
	}

	/// The given attributes grouped into a relation-valued attribute.
	pub fn group(&self, attrs: &[&str], rvname: &str) -> Result<Table, Error> {
		let nested = self.tuple_typ().project(attrs)?;
		let grouping: Vec<&str> =
			self.tuple_typ().names().filter(|n| !attrs.contains(n)).collect();
		let mut heading_attrs: Vec<Attr> = self
			.tuple_typ()
			.attrs
			.iter()
			.filter(|a| grouping.contains(&a.name.as_str()))
			.cloned()
			.collect();
		heading_attrs.push(Attr::new(rvname, Type::relation(nested)));
		let heading = TupleType::new(heading_attrs)?;
		let keys = keys::group_keys(&grouping);
		let exp = Expression::op(
			"group",
			vec![
				Expression::table(self.clone()),
				Expression::val(Value::string_array(attrs)),
				Expression::val(rvname),
			],
		);
		Ok(new_virtual(RelationType::new(heading), keys, exp))
	}

	/// A relation-valued attribute flattened back into its attributes.
	pub fn ungroup(&self, rvname: &str) -> Result<Table, Error> {
		let inner: Vec<String> = match self.tuple_typ().attr(rvname) {
			Some(Attr {
				typ: Type::Relation(r),
				..
			}) => r.base.names().map(str::to_string).collect(),
			_ => {
				return Err(Error::TypeMismatch(format!(
					"attribute {rvname} is not relation-valued"
				)))
			}
		};
		let nested_attrs = match self.tuple_typ().attr(rvname) {
			Some(Attr {
				typ: Type::Relation(r),
				..
			}) => r.base.attrs.clone(),
			_ => unreachable!(),
		};
		let mut heading_attrs: Vec<Attr> =
			self.tuple_typ().attrs.iter().filter(|a| a.name != rvname).cloned().collect();
		heading_attrs.extend(nested_attrs);
		let heading = TupleType::new(heading_attrs)?;
		let inner_refs: Vec<&str> = inner.iter().map(String::as_str).collect();
		let keys = match keys::ungroup_keys(self.keys(), rvname, &inner_refs) {
			Some(keys) => keys,
			None => vec![all_key(&heading)],
		};
		let exp = Expression::op(
			"ungroup",
			vec![Expression::table(self.clone()), Expression::val(rvname)],
		);
		Ok(new_virtual(RelationType::new(heading), keys, exp))
	}

	/// Aggregation of this table per the tuples of `per`.
	pub fn summarize(
		&self,
		per: &Table,
		adds: Vec<SummarizeAdd>,
		tx: Option<&Transaction>,
	) -> Result<Table, Error> {
		for attr in &per.tuple_typ().attrs {
			match self.tuple_typ().attr(&attr.name) {
				Some(a) if a.typ == attr.typ => {}
				_ => {
					return Err(Error::TypeMismatch(format!(
						"per attribute {} not in summarized table",
						attr.name
					)))
				}
			}
		}
		let mut heading_attrs = per.tuple_typ().attrs.clone();
		for add in &adds {
			heading_attrs.push(Attr::new(
				add.name.clone(),
				summarize_add_type(&add.exp, self.tuple_typ(), tx)?,
			));
		}
		let heading = TupleType::new(heading_attrs)?;
		let mut args =
			vec![Expression::table(self.clone()), Expression::table(per.clone())];
		for add in adds {
			args.push(add.exp);
			args.push(Expression::val(add.name));
		}
		let exp = Expression::op("summarize", args);
		Ok(new_virtual(RelationType::new(heading), per.keys().to_vec(), exp))
	}

	/// The small divide: the tuples of this table joining with every tuple
	/// of `divisor` to a tuple of `mediator`.
	pub fn divide(&self, divisor: &Table, mediator: &Table) -> Result<Table, Error> {
		let joined = self.tuple_typ().join(divisor.tuple_typ())?;
		if &joined != mediator.tuple_typ() {
			return Err(Error::TypeMismatch(
				"mediator heading must join dividend and divisor".to_string(),
			));
		}
		let exp = Expression::op(
			"divide",
			vec![
				Expression::table(self.clone()),
				Expression::table(divisor.clone()),
				Expression::table(mediator.clone()),
			],
		);
		Ok(new_virtual(self.typ().clone(), self.keys().to_vec(), exp))
	}

	/// The transitive closure of a binary relation over two attributes of
	/// the same type.
	pub fn tclose(&self) -> Result<Table, Error> {
		let attrs = &self.tuple_typ().attrs;
		if attrs.len() != 2 || attrs[0].typ != attrs[1].typ {
			return Err(Error::TypeMismatch(
				"transitive closure needs two attributes of one type".to_string(),
			));
		}
		let heading = self.tuple_typ().clone();
		let exp = Expression::op("tclose", vec![Expression::table(self.clone())]);
		let keys = vec![all_key(&heading)];
		Ok(new_virtual(RelationType::new(heading), keys, exp))
	}
}

/// The result type of one summarize aggregate.
pub(crate) fn summarize_add_type(
	exp: &Expression,
	base: &TupleType,
	tx: Option<&Transaction>,
) -> Result<Type, Error> {
	let (name, args) = match exp {
		Expression::Op(op) if AGGREGATE_OPS.contains(&op.name.as_str()) => {
			(op.name.as_str(), &op.args)
		}
		_ => {
			return Err(Error::InvalidArgument(
				"summarize add must be an aggregate invocation".to_string(),
			))
		}
	};
	let arg_type = match args.first() {
		Some(a) => Some(a.expr_type(Some(base), tx)?),
		None => None,
	};
	aggregate_type(name, arg_type.as_ref())
}

/// The result type of an aggregate from its operand type.
pub(crate) fn aggregate_type(name: &str, arg: Option<&Type>) -> Result<Type, Error> {
	match name {
		"count" => Ok(Type::integer()),
		"avg" => match arg {
			Some(t) if t.is_integer() || t.is_float() => Ok(Type::float()),
			_ => Err(Error::TypeMismatch("avg needs a numeric operand".to_string())),
		},
		"sum" | "max" | "min" => match arg {
			Some(t) if t.is_integer() || t.is_float() => Ok(t.clone()),
			_ => Err(Error::TypeMismatch(format!("{name} needs a numeric operand"))),
		},
		"all" | "any" => match arg {
			Some(t) if t.is_boolean() => Ok(Type::boolean()),
			_ => Err(Error::TypeMismatch(format!("{name} needs a boolean operand"))),
		},
		_ => Err(Error::OperatorNotFound(name.to_string())),
	}
}

/// Evaluates a relational operator invocation into a virtual table. Table
/// arguments are evaluated; condition and attribute expressions stay
/// unevaluated, with enclosing bindings substituted in.
pub(crate) fn eval_relational(
	name: &str,
	args: &[Expression],
	env: Option<&crate::val::Tuple>,
	tx: Option<&Transaction>,
) -> Result<Table, Error> {
	let bind = |e: &Expression| match env {
		Some(env) => e.substitute_vars(env),
		None => e.clone(),
	};
	if args.is_empty() {
		return Err(Error::InvalidArgument(format!("{name} needs arguments")));
	}
	let t1 = eval_table_arg(&args[0], tx)?;
	match name {
		"where" => {
			if args.len() != 2 {
				return Err(Error::InvalidArgument("where takes a condition".to_string()));
			}
			t1.select(bind(&args[1]))
		}
		"project" | "remove" => {
			let mut names = Vec::with_capacity(args.len() - 1);
			for a in &args[1..] {
				names.push(const_string(a)?);
			}
			let refs: Vec<&str> = names.iter().map(String::as_str).collect();
			if name == "project" {
				t1.project(&refs)
			} else {
				t1.remove(&refs)
			}
		}
		"rename" => {
			let mut pairs = Vec::new();
			let mut i = 1;
			while i + 1 < args.len() {
				pairs.push((const_string(&args[i])?, const_string(&args[i + 1])?));
				i += 2;
			}
			let refs: Vec<(&str, &str)> =
				pairs.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
			t1.rename(&refs)
		}
		"union" | "d_union" | "minus" | "semiminus" | "intersect" | "semijoin" | "join" => {
			if args.len() != 2 {
				return Err(Error::InvalidArgument(format!("{name} takes two tables")));
			}
			let t2 = eval_table_arg(&args[1], tx)?;
			match name {
				"union" => t1.union(&t2),
				"d_union" => t1.d_union(&t2),
				"minus" => t1.minus(&t2),
				"semiminus" => t1.semiminus(&t2),
				"intersect" => t1.intersect(&t2),
				"semijoin" => t1.semijoin(&t2),
				_ => t1.join(&t2),
			}
		}
		"extend" => {
			let mut attrs = Vec::new();
			let mut i = 1;
			while i + 1 < args.len() {
				attrs.push((const_string(&args[i])?, bind(&args[i + 1])));
				i += 2;
			}
			t1.extend(attrs, tx)
		}
		"wrap" => {
			if args.len() != 3 {
				return Err(Error::InvalidArgument(
					"wrap takes an attribute list and a name".to_string(),
				));
			}
			let list = string_list(&args[1], env, tx)?;
			let refs: Vec<&str> = list.iter().map(String::as_str).collect();
			t1.wrap(&refs, &const_string(&args[2])?)
		}
		"unwrap" => {
			if args.len() != 2 {
				return Err(Error::InvalidArgument("unwrap takes a name".to_string()));
			}
			t1.unwrap_attr(&const_string(&args[1])?)
		}
		"group" => {
			if args.len() != 3 {
				return Err(Error::InvalidArgument(
					"group takes an attribute list and a name".to_string(),
				));
			}
			let list = string_list(&args[1], env, tx)?;
			let refs: Vec<&str> = list.iter().map(String::as_str).collect();
			t1.group(&refs, &const_string(&args[2])?)
		}
		"ungroup" => {
			if args.len() != 2 {
				return Err(Error::InvalidArgument("ungroup takes a name".to_string()));
			}
			t1.ungroup(&const_string(&args[1])?)
		}
		"divide" => {
			if args.len() != 3 {
				return Err(Error::InvalidArgument("divide takes three tables".to_string()));
			}
			let t2 = eval_table_arg(&args[1], tx)?;
			let t3 = eval_table_arg(&args[2], tx)?;
			t1.divide(&t2, &t3)
		}
		"tclose" => t1.tclose(),
		"summarize" => {
			if args.len() < 2 || args.len() % 2 != 0 {
				return Err(Error::InvalidArgument(
					"summarize takes a per table and add pairs".to_string(),
				));
			}
			let per = eval_table_arg(&args[1], tx)?;
			let mut adds = Vec::new();
			let mut i = 2;
			while i + 1 < args.len() {
				adds.push(SummarizeAdd {
					exp: bind(&args[i]),
					name: const_string(&args[i + 1])?,
				});
				i += 2;
			}
			t1.summarize(&per, adds, tx)
		}
		_ => Err(Error::OperatorNotFound(name.to_string())),
	}
}

/// Reads an ARRAY OF STRING argument.
fn string_list(
	exp: &Expression,
	env: Option<&crate::val::Tuple>,
	tx: Option<&Transaction>,
) -> Result<Vec<String>, Error> {
	let val = exp.evaluate(env, tx)?;
	let arr = val.as_array()?;
	arr.iter().map(|v| v.string_val().map(str::to_string)).collect()
}
