//! Candidate-key inference for the relational operators.
//!
//! Each function derives the key set of an operator's result from the key
//! sets of its inputs. The rules are deterministic; the unit tests below pin
//! them down operator by operator.

use crate::tbl::{remove_redundant_keys, Key};

/// project/remove: keys fully inside the projection survive; with none
/// left, the result is all-key (key loss).
pub(crate) fn project_keys(keys: &[Key], attrs: &[&str]) -> Option<Vec<Key>> {
	let surviving: Vec<Key> = keys.iter().filter(|k| k.within(attrs)).cloned().collect();
	if surviving.is_empty() {
		None
	} else {
		Some(surviving)
	}
}

/// rename: each key is renamed attribute by attribute.
pub(crate) fn rename_keys(keys: &[Key], pairs: &[(&str, &str)]) -> Vec<Key> {
	keys.iter().map(|k| k.rename(pairs)).collect()
}

/// join: every pair of keys of the two inputs yields their union;
/// redundant supersets are removed.
pub(crate) fn join_keys(keys1: &[Key], keys2: &[Key]) -> Vec<Key> {
	let mut out = Vec::with_capacity(keys1.len() * keys2.len());
	for k1 in keys1 {
		for k2 in keys2 {
			out.push(k1.union(k2));
		}
	}
	remove_redundant_keys(out)
}

/// wrap: a key containing all wrapped attributes has them replaced by the
/// wrapper attribute; any other key is dropped. Returns `None` on total key
/// loss.
pub(crate) fn wrap_keys(keys: &[Key], wrapped: &[&str], name: &str) -> Option<Vec<Key>> {
	let mut out = Vec::new();
	for key in keys {
		if wrapped.iter().all(|w| key.contains(w)) {
			let mut attrs: Vec<String> =
				key.attrs().iter().filter(|a| !wrapped.contains(&a.as_str())).cloned().collect();
			attrs.push(name.to_string());
			out.push(Key(attrs));
		}
	}
	if out.is_empty() {
		None
	} else {
		Some(out)
	}
}

/// unwrap: a key containing the wrapper attribute has it replaced by the
/// wrapped attributes; other keys are kept.
pub(crate) fn unwrap_keys(keys: &[Key], name: &str, inner: &[&str]) -> Vec<Key> {
	keys.iter()
		.map(|key| {
			if key.contains(name) {
				let mut attrs: Vec<String> =
					key.attrs().iter().filter(|a| a.as_str() != name).cloned().collect();
				attrs.extend(inner.iter().map(|s| s.to_string()));
				Key(attrs)
			} else {
				key.clone()
			}
		})
		.collect()
}

/// group: the grouping attributes (the complement of the nested attribute
/// set) become the single key.
pub(crate) fn group_keys(grouping: &[&str]) -> Vec<Key> {
	vec![Key::new(grouping.iter().copied())]
}

/// ungroup: each key containing the nested attribute has it replaced by the
/// nested heading; with no such key the result is all-key.
pub(crate) fn ungroup_keys(keys: &[Key], rvname: &str, inner: &[&str]) -> Option<Vec<Key>> {
	let with_rv: Vec<Key> = keys
		.iter()
		.filter(|k| k.contains(rvname))
		.map(|key| {
			let mut attrs: Vec<String> =
				key.attrs().iter().filter(|a| a.as_str() != rvname).cloned().collect();
			attrs.extend(inner.iter().map(|s| s.to_string()));
			Key(attrs)
		})
		.collect();
	if with_rv.is_empty() {
		None
	} else {
		Some(with_rv)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn project_keeps_contained_keys() {
		let keys = vec![Key::new(["a"]), Key::new(["b", "c"])];
		let out = project_keys(&keys, &["a", "b"]).unwrap();
		assert_eq!(out, vec![Key::new(["a"])]);
		assert!(project_keys(&keys, &["b"]).is_none());
	}

	#[test]
	fn join_pairs_without_redundancy() {
		// R(a) and S(a): the pair union is {a}
		let out = join_keys(&[Key::new(["a"])], &[Key::new(["a"])]);
		assert_eq!(out, vec![Key::new(["a"])]);
		// R keys {empno} and S keys {empno}: join on empno keeps {empno}
		let out = join_keys(
			&[Key::new(["empno"])],
			&[Key::new(["empno"]), Key::new(["deptno", "empno"])],
		);
		assert_eq!(out, vec![Key::new(["empno"])]);
		// disjoint keys cross
		let out = join_keys(&[Key::new(["a"])], &[Key::new(["b"])]);
		assert_eq!(out, vec![Key::new(["a", "b"])]);
	}

	#[test]
	fn wrap_replaces_or_drops() {
		let keys = vec![Key::new(["a", "b"]), Key::new(["c"])];
		let out = wrap_keys(&keys, &["a", "b"], "w").unwrap();
		assert_eq!(out, vec![Key::new(["w"])]);
		// neither key contains the wrapped set
		assert!(wrap_keys(&[Key::new(["a"])], &["a", "b"], "w").is_none());
	}

	#[test]
	fn unwrap_expands_wrapper() {
		let keys = vec![Key::new(["w"]), Key::new(["c"])];
		let out = unwrap_keys(&keys, "w", &["a", "b"]);
		assert_eq!(out, vec![Key::new(["a", "b"]), Key::new(["c"])]);
	}

	#[test]
	fn group_key_is_grouping_attrs() {
		assert_eq!(group_keys(&["a", "b"]), vec![Key::new(["a", "b"])]);
	}

	#[test]
	fn ungroup_expands_or_loses_keys() {
		let keys = vec![Key::new(["g", "rv"])];
		let out = ungroup_keys(&keys, "rv", &["x"]).unwrap();
		assert_eq!(out, vec![Key::new(["g", "x"])]);
		assert!(ungroup_keys(&[Key::new(["g"])], "rv", &["x"]).is_none());
	}
}
