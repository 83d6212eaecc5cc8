//! The error taxonomy shared by every engine operation.
//!
//! Each fallible operation either succeeds, or fails returning exactly one
//! [`Error`]; callers propagate with `?`. Record-store status codes are
//! translated through [`Error::from`] so that storage failures surface with
//! the same taxonomy as engine failures.

use crate::kvs::StoreError;
use thiserror::Error;

/// The errors raised by the engine.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
	/// A memory allocation was refused by the underlying store
	#[error("Out of memory")]
	NoMemory,
	/// A DDL or DML call was made outside of a running transaction
	#[error("No running transaction")]
	NoRunningTx,
	/// An argument value was outside the domain of the operation
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	/// Operand types did not match any overload of the operation
	#[error("Type mismatch: {0}")]
	TypeMismatch(String),
	/// A required lookup produced no result
	#[error("Not found: {0}")]
	NotFound(String),
	/// No operator with the given name is known
	#[error("Operator not found: {0}")]
	OperatorNotFound(String),
	/// A name was undefined or malformed
	#[error("Unknown name: {0}")]
	Name(String),
	/// The element to be inserted is already present
	#[error("Element exists: {0}")]
	ElementExists(String),
	/// A selector produced a value violating the type constraint
	#[error("Type constraint violation: {0}")]
	TypeConstraintViolation(String),
	/// A tuple would collide with an existing tuple under a declared key
	#[error("Key violation: {0}")]
	KeyViolation(String),
	/// A table predicate or database constraint does not hold
	#[error("Predicate violation: {0}")]
	PredicateViolation(String),
	/// An aggregate with no defined identity was applied to no tuples
	#[error("Aggregate is undefined for zero tuples")]
	AggregateUndefined,
	/// Persistent data was written by an incompatible engine version
	#[error("Version mismatch: {0}")]
	VersionMismatch(String),
	/// The operation is not defined for this table or value kind
	#[error("Not supported: {0}")]
	NotSupported(String),
	/// A string could not be parsed
	#[error("Syntax error: {0}")]
	Syntax(String),
	/// The item cannot be dropped because other definitions refer to it
	#[error("In use: {0}")]
	InUse(String),
	/// The record store reported an unclassified failure
	#[error("System error: {0}")]
	System(String),
	/// The record store could not acquire a required lock
	#[error("Lock not granted")]
	LockNotGranted,
	/// The transaction was chosen as a deadlock victim and rolled back
	#[error("Deadlock detected")]
	Deadlock,
	/// A dynamic module or symbol could not be resolved
	#[error("Resource not found: {0}")]
	ResourceNotFound(String),
	/// An engine invariant was broken
	#[error("Internal error: {0}")]
	Internal(String),
	/// The environment is unusable and must be recovered
	#[error("Fatal: {0}")]
	Fatal(String),
}

impl Error {
	/// Whether this error leaves the environment unusable.
	pub fn is_fatal(&self) -> bool {
		matches!(self, Error::Fatal(_))
	}

	/// Whether this error is a key or predicate violation. The insert path
	/// for union tables tolerates exactly these from one operand.
	pub(crate) fn is_violation(&self) -> bool {
		matches!(self, Error::KeyViolation(_) | Error::PredicateViolation(_))
	}
}

impl From<StoreError> for Error {
	fn from(e: StoreError) -> Self {
		match e {
			StoreError::KeyExists => Error::KeyViolation("key exists".to_string()),
			StoreError::NotFound => Error::NotFound("record not found".to_string()),
			StoreError::Deadlock => Error::Deadlock,
			StoreError::LockNotGranted => Error::LockNotGranted,
			StoreError::NoMemory => Error::NoMemory,
			StoreError::RunRecovery(msg) => Error::Fatal(msg),
			StoreError::Other(msg) => Error::System(msg),
		}
	}
}
