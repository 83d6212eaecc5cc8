//! Dynamic-module resolution of user operators.
//!
//! Operators created with a library name are looked up as
//! `(library, symbol)` through the platform's dynamic loader, trying the
//! plain library name first and a versioned fallback filename second. A
//! missing library or symbol raises RESOURCE_NOT_FOUND.

use super::{ExternRoFn, ExternUpdFn};
use crate::err::Error;
use crate::kvs::Transaction;
use crate::val::Value;
use libloading::Library;

/// The version suffix tried when the plain library name does not resolve.
const LIB_VERSION: &str = "1";

fn open_library(lib: &str) -> Result<Library, Error> {
	let plain = libloading::library_filename(lib);
	// Safety: loading a module runs its initializers; the operator contract
	// requires modules to be inert on load.
	match unsafe { Library::new(&plain) } {
		Ok(l) => Ok(l),
		Err(first) => {
			let versioned = format!("{}.{}", plain.to_string_lossy(), LIB_VERSION);
			match unsafe { Library::new(&versioned) } {
				Ok(l) => Ok(l),
				Err(_) => Err(Error::ResourceNotFound(format!("library {lib}: {first}"))),
			}
		}
	}
}

pub(super) fn call_extern_ro(
	lib: &str,
	symbol: &str,
	args: Vec<Value>,
	tx: Option<&Transaction>,
) -> Result<Value, Error> {
	let library = open_library(lib)?;
	// Safety: the symbol must have the documented ExternRoFn signature.
	let f = unsafe {
		library
			.get::<ExternRoFn>(symbol.as_bytes())
			.map_err(|e| Error::ResourceNotFound(format!("symbol {symbol}: {e}")))?
	};
	f(args, tx)
}

pub(super) fn call_extern_update(
	lib: &str,
	symbol: &str,
	args: &mut [Value],
	tx: Option<&Transaction>,
) -> Result<(), Error> {
	let library = open_library(lib)?;
	// Safety: the symbol must have the documented ExternUpdFn signature.
	let f = unsafe {
		library
			.get::<ExternUpdFn>(symbol.as_bytes())
			.map_err(|e| Error::ResourceNotFound(format!("symbol {symbol}: {e}")))?
	};
	f(args, tx)
}
