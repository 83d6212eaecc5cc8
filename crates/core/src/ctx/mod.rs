//! Execution contexts.
//!
//! An execution context belongs to one logical thread of execution and
//! carries arbitrary named properties. Language bindings use the property
//! map to attach their session state so that host-dispatched operators can
//! retrieve it; see [`crate::env::Environment::register_host`] for the
//! invoker side of the contract.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;

#[derive(Default)]
pub struct ExecContext {
	properties: RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl ExecContext {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores a named property, replacing any previous value.
	pub fn set_property<T: Any + Send + Sync>(&self, name: &str, value: T) {
		self.properties.write().insert(name.to_string(), Box::new(value));
	}

	/// Retrieves a clone of a named property, if present and of type `T`.
	pub fn property<T: Any + Send + Sync + Clone>(&self, name: &str) -> Option<T> {
		self.properties.read().get(name).and_then(|v| v.downcast_ref::<T>()).cloned()
	}

	/// Removes a named property.
	pub fn remove_property(&self, name: &str) {
		self.properties.write().remove(name);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn properties_round_trip() {
		let ctx = ExecContext::new();
		ctx.set_property("session", 42u32);
		assert_eq!(ctx.property::<u32>("session"), Some(42));
		assert_eq!(ctx.property::<String>("session"), None);
		ctx.remove_property("session");
		assert_eq!(ctx.property::<u32>("session"), None);
	}
}
