//! String operators.
//!
//! Positions and lengths are in characters for `strlen`/`substr` and in
//! bytes for the `_b` variants. `like` implements the engine's own pattern
//! language (`.` one character, `*` any run); `regex_like` delegates to the
//! regex crate.

use super::{ro, ro_var};
use crate::err::Error;
use crate::kvs::Transaction;
use crate::ops::{OpMap, Operator};
use crate::typ::Type;
use crate::val::Value;

pub(super) fn register(map: &OpMap) {
	let s = Type::string();
	let i = Type::integer();
	let b = Type::boolean();
	ro(map, "||", &[s.clone(), s.clone()], s.clone(), concat);
	ro(map, "strlen", &[s.clone()], i.clone(), strlen);
	ro(map, "strlen_b", &[s.clone()], i.clone(), strlen_b);
	ro(map, "substr", &[s.clone(), i.clone(), i.clone()], s.clone(), substr);
	ro(map, "substr_b", &[s.clone(), i.clone(), i.clone()], s.clone(), substr_b);
	ro(map, "substr_b", &[s.clone(), i.clone()], s.clone(), substr_b);
	ro(map, "strfind_b", &[s.clone(), s.clone()], i.clone(), strfind_b);
	ro(map, "strfind_b", &[s.clone(), s.clone(), i.clone()], i, strfind_b);
	ro(map, "starts_with", &[s.clone(), s.clone()], b.clone(), starts_with);
	ro(map, "like", &[s.clone(), s.clone()], b.clone(), like);
	ro(map, "regex_like", &[s.clone(), s.clone()], b, regex_like);
	ro_var(map, "format", Some(Type::string()), format);
}

fn concat(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(format!("{}{}", args[0].string_val()?, args[1].string_val()?)))
}

fn strlen(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(args[0].string_val()?.chars().count() as i64))
}

fn strlen_b(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(args[0].string_val()?.len() as i64))
}

fn substr(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	let s = args[0].string_val()?;
	let start = args[1].int_val()?;
	let len = args[2].int_val()?;
	if start < 0 || len < 0 {
		return Err(Error::InvalidArgument("substring out of range".to_string()));
	}
	let chars: Vec<char> = s.chars().collect();
	let (start, len) = (start as usize, len as usize);
	if start + len > chars.len() {
		return Err(Error::InvalidArgument("substring out of range".to_string()));
	}
	Ok(Value::from(chars[start..start + len].iter().collect::<String>()))
}

fn substr_b(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	let s = args[0].string_val()?;
	let start = args[1].int_val()?;
	if start < 0 || start as usize > s.len() {
		return Err(Error::InvalidArgument("substring out of range".to_string()));
	}
	let start = start as usize;
	let end = match args.get(2) {
		Some(len) => {
			let len = len.int_val()?;
			if len < 0 || start + len as usize > s.len() {
				return Err(Error::InvalidArgument("substring out of range".to_string()));
			}
			start + len as usize
		}
		None => s.len(),
	};
	if !s.is_char_boundary(start) || !s.is_char_boundary(end) {
		return Err(Error::InvalidArgument("substring splits a character".to_string()));
	}
	Ok(Value::from(&s[start..end]))
}

fn strfind_b(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	let hay = args[0].string_val()?;
	let needle = args[1].string_val()?;
	let from = match args.get(2) {
		Some(p) => {
			let p = p.int_val()?;
			if p < 0 || p as usize > hay.len() {
				return Err(Error::InvalidArgument("position out of range".to_string()));
			}
			p as usize
		}
		None => 0,
	};
	Ok(Value::from(match hay[from..].find(needle) {
		Some(i) => (from + i) as i64,
		None => -1,
	}))
}

fn starts_with(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	Ok(Value::from(args[0].string_val()?.starts_with(args[1].string_val()?)))
}

/// Pattern match with `.` matching one character and `*` matching any run.
pub(crate) fn like_match(s: &[char], pat: &[char]) -> bool {
	match pat.first() {
		None => s.is_empty(),
		Some('*') => {
			// a run of any length, including empty
			(0..=s.len()).any(|n| like_match(&s[n..], &pat[1..]))
		}
		Some('.') => !s.is_empty() && like_match(&s[1..], &pat[1..]),
		Some(c) => s.first() == Some(c) && like_match(&s[1..], &pat[1..]),
	}
}

fn like(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	let s: Vec<char> = args[0].string_val()?.chars().collect();
	let pat: Vec<char> = args[1].string_val()?.chars().collect();
	Ok(Value::from(like_match(&s, &pat)))
}

fn regex_like(_: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	let re = regex::Regex::new(args[1].string_val()?)
		.map_err(|e| Error::InvalidArgument(format!("bad regular expression: {e}")))?;
	Ok(Value::from(re.is_match(args[0].string_val()?)))
}

/// sprintf-style formatting supporting `%s`, `%d`, `%f` and `%%`.
fn format(op: &Operator, args: Vec<Value>, _: Option<&Transaction>) -> Result<Value, Error> {
	if args.is_empty() {
		return Err(Error::InvalidArgument(format!("{} needs a format string", op.name)));
	}
	let fmt = args[0].string_val()?;
	let mut out = String::with_capacity(fmt.len());
	let mut rest = args[1..].iter();
	let mut chars = fmt.chars();
	while let Some(c) = chars.next() {
		if c != '%' {
			out.push(c);
			continue;
		}
		match chars.next() {
			Some('%') => out.push('%'),
			Some('s') => {
				let v = rest.next().ok_or_else(|| {
					Error::InvalidArgument("too few format arguments".to_string())
				})?;
				out.push_str(v.string_val()?);
			}
			Some('d') => {
				let v = rest.next().ok_or_else(|| {
					Error::InvalidArgument("too few format arguments".to_string())
				})?;
				out.push_str(&v.int_val()?.to_string());
			}
			Some('f') => {
				let v = rest.next().ok_or_else(|| {
					Error::InvalidArgument("too few format arguments".to_string())
				})?;
				out.push_str(&v.float_val()?.to_string());
			}
			_ => return Err(Error::InvalidArgument("bad format directive".to_string())),
		}
	}
	if rest.next().is_some() {
		return Err(Error::InvalidArgument("too many format arguments".to_string()));
	}
	Ok(Value::from(out))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ops::call_ro;

	fn s(v: &str) -> Value {
		Value::from(v)
	}

	#[test]
	fn like_patterns() {
		let cases = [
			("abc", "abc", true),
			("abc", "a.c", true),
			("abc", "a*", true),
			("abc", "*c", true),
			("abc", "*", true),
			("abc", "a.b", false),
			("", "*", true),
			("", ".", false),
			("aXbXc", "a*b*c", true),
		];
		for (txt, pat, want) in cases {
			let t: Vec<char> = txt.chars().collect();
			let p: Vec<char> = pat.chars().collect();
			assert_eq!(like_match(&t, &p), want, "{txt} like {pat}");
		}
	}

	#[test]
	fn substr_ranges() {
		let r = call_ro("substr", vec![s("hello"), Value::from(1i64), Value::from(3i64)], None)
			.unwrap();
		assert_eq!(r.string_val().unwrap(), "ell");
		let r = call_ro("substr", vec![s("hello"), Value::from(3i64), Value::from(9i64)], None);
		assert!(matches!(r, Err(Error::InvalidArgument(_))));
	}

	#[test]
	fn strfind_positions() {
		let r = call_ro("strfind_b", vec![s("banana"), s("na")], None).unwrap();
		assert_eq!(r.int_val().unwrap(), 2);
		let r = call_ro(
			"strfind_b",
			vec![s("banana"), s("na"), Value::from(3i64)],
			None,
		)
		.unwrap();
		assert_eq!(r.int_val().unwrap(), 4);
		let r = call_ro("strfind_b", vec![s("banana"), s("xy")], None).unwrap();
		assert_eq!(r.int_val().unwrap(), -1);
	}

	#[test]
	fn format_directives() {
		let r = call_ro(
			"format",
			vec![s("%s is %d%%"), s("x"), Value::from(10i64)],
			None,
		)
		.unwrap();
		assert_eq!(r.string_val().unwrap(), "x is 10%");
		let r = call_ro("format", vec![s("%d")], None);
		assert!(matches!(r, Err(Error::InvalidArgument(_))));
	}
}
