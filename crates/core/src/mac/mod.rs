/// Constructs a `BTreeMap` from key/value pairs.
macro_rules! map {
	($($k:expr => $v:expr),* $(,)?) => {{
		let mut m = ::std::collections::BTreeMap::new();
		$(m.insert($k, $v);)*
		m
	}};
}

/// Builds a [`crate::val::Tuple`] from attribute name and value pairs.
macro_rules! tuple {
	($($k:expr => $v:expr),* $(,)?) => {
		$crate::val::Tuple::from(map! {
			$(::std::string::String::from($k) => $crate::val::Value::from($v)),*
		})
	};
}
