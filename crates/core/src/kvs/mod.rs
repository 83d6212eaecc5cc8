//! The record-store abstraction and the transaction model.
//!
//! The engine stores tuples of real tables through the [`RecordStore`]
//! trait: flat records of byte fields addressed by a primary-key field
//! prefix, with optional secondary indexes and cursors. Any transactional
//! store can back the engine by implementing the trait; [`MemStore`] is the
//! bundled in-memory implementation used for embedded operation and tests.
//!
//! Record-store failures are reported as [`StoreError`] status codes which
//! the engine translates into its own error taxonomy.

mod mem;
mod tx;

pub use mem::MemStore;
pub use tx::Transaction;

/// A single stored field value.
pub type Field = Vec<u8>;

/// The declared length of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLen {
	/// Fixed length in bytes
	Fixed(usize),
	/// Variable length
	Variable,
}

/// The definition of one record field.
#[derive(Debug, Clone)]
pub struct FieldDef {
	pub len: FieldLen,
}

/// Identifies a record map within its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecMapId(pub u64);

/// Identifies a secondary index within its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexId(pub u64);

/// An opaque store transaction handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreTx(pub u64);

/// Status codes reported by a record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
	/// A record with the same primary key, or the same key of a unique
	/// index, is already present
	KeyExists,
	/// No record matches the given key
	NotFound,
	/// The transaction was aborted to break a deadlock
	Deadlock,
	/// A lock could not be acquired
	LockNotGranted,
	/// The store ran out of memory
	NoMemory,
	/// The store needs recovery before further use
	RunRecovery(String),
	/// Any other store failure
	Other(String),
}

impl std::fmt::Display for StoreError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			StoreError::KeyExists => write!(f, "key exists"),
			StoreError::NotFound => write!(f, "not found"),
			StoreError::Deadlock => write!(f, "deadlock"),
			StoreError::LockNotGranted => write!(f, "lock not granted"),
			StoreError::NoMemory => write!(f, "out of memory"),
			StoreError::RunRecovery(m) => write!(f, "run recovery: {m}"),
			StoreError::Other(m) => write!(f, "{m}"),
		}
	}
}

impl std::error::Error for StoreError {}

/// A transactional store of record maps.
///
/// A record map holds records of a fixed field layout; the first
/// `key_fields` fields form the primary key. All mutating and reading
/// operations take a [`StoreTx`] previously obtained from [`begin`]
/// (`RecordStore::begin`); the store must make the effects of a transaction
/// visible to subsequent operations in the same transaction, and discard
/// them on rollback. Transactions nest; committing a nested transaction
/// folds its effects into the parent.
pub trait RecordStore: Send + Sync {
	/// Starts a transaction, optionally nested inside `parent`.
	fn begin(&self, parent: Option<StoreTx>) -> Result<StoreTx, StoreError>;
	/// Commits a transaction.
	fn commit(&self, tx: StoreTx) -> Result<(), StoreError>;
	/// Rolls a transaction back.
	fn rollback(&self, tx: StoreTx) -> Result<(), StoreError>;

	/// Creates a record map. Named maps can be re-opened later; anonymous
	/// maps live until deleted.
	fn create_recmap(
		&self,
		name: Option<&str>,
		fields: Vec<FieldDef>,
		key_fields: usize,
		tx: StoreTx,
	) -> Result<RecMapId, StoreError>;
	/// Opens a previously created named record map.
	fn open_recmap(&self, name: &str, tx: StoreTx) -> Result<RecMapId, StoreError>;
	/// Releases a record map handle without deleting data.
	fn close_recmap(&self, rm: RecMapId) -> Result<(), StoreError>;
	/// Deletes a record map and its data. Passing no transaction performs
	/// the deletion outside transactional control, as done for deferred
	/// deletions at top-level commit.
	fn delete_recmap(&self, rm: RecMapId, tx: Option<StoreTx>) -> Result<(), StoreError>;

	/// Inserts a full record.
	fn insert_rec(&self, rm: RecMapId, fields: Vec<Field>, tx: StoreTx)
		-> Result<(), StoreError>;
	/// Updates the record addressed by the primary key fields.
	fn update_rec(
		&self,
		rm: RecMapId,
		key: &[Field],
		updates: &[(usize, Field)],
		tx: StoreTx,
	) -> Result<(), StoreError>;
	/// Deletes the record addressed by the primary key fields.
	fn delete_rec(&self, rm: RecMapId, key: &[Field], tx: StoreTx) -> Result<(), StoreError>;
	/// Reads the requested fields of the record addressed by the primary
	/// key fields, in the order requested.
	fn get_fields(
		&self,
		rm: RecMapId,
		key: &[Field],
		fieldnos: &[usize],
		tx: StoreTx,
	) -> Result<Vec<Field>, StoreError>;
	/// Whether a record with exactly these fields exists.
	fn contains_rec(&self, rm: RecMapId, fields: &[Field], tx: StoreTx)
		-> Result<bool, StoreError>;
	/// The number of records in the map.
	fn record_count(&self, rm: RecMapId, tx: StoreTx) -> Result<u64, StoreError>;

	/// Opens a cursor over the map, in arbitrary order.
	fn cursor(&self, rm: RecMapId, tx: StoreTx) -> Result<Box<dyn StoreCursor>, StoreError>;

	/// Creates a secondary index over the given fields.
	fn create_index(
		&self,
		rm: RecMapId,
		name: Option<&str>,
		fieldnos: Vec<usize>,
		unique: bool,
		tx: StoreTx,
	) -> Result<IndexId, StoreError>;
	/// Releases an index handle without deleting it.
	fn close_index(&self, ix: IndexId) -> Result<(), StoreError>;
	/// Deletes an index. See [`RecordStore::delete_recmap`] for the
	/// transaction argument.
	fn delete_index(&self, ix: IndexId, tx: Option<StoreTx>) -> Result<(), StoreError>;
	/// Returns the full records whose indexed fields equal `key`.
	fn index_get(
		&self,
		ix: IndexId,
		key: &[Field],
		tx: StoreTx,
	) -> Result<Vec<Vec<Field>>, StoreError>;
}

/// A pull cursor over the records of a record map.
///
/// A fresh cursor is positioned before the first record; [`first`]
/// (`StoreCursor::first`) or [`next`](`StoreCursor::next`) position it and
/// report whether a record is available.
pub trait StoreCursor {
	fn first(&mut self) -> Result<bool, StoreError>;
	fn next(&mut self) -> Result<bool, StoreError>;
	/// Reads one field of the current record.
	fn field(&self, no: usize) -> Result<Field, StoreError>;
	/// Updates fields of the current record in place.
	fn update(&mut self, updates: &[(usize, Field)]) -> Result<(), StoreError>;
	/// Deletes the current record.
	fn delete(&mut self) -> Result<(), StoreError>;
}

/// Encodes a primary key from its fields. Each field is length-prefixed so
/// that distinct field vectors never collide.
pub(crate) fn encode_key(fields: &[Field]) -> Vec<u8> {
	let mut out = Vec::with_capacity(fields.iter().map(|f| f.len() + 4).sum());
	for f in fields {
		out.extend_from_slice(&(f.len() as u32).to_be_bytes());
		out.extend_from_slice(f);
	}
	out
}
