//! Environments and databases.
//!
//! An [`Environment`] wraps a record store together with the dbroot: the
//! caches of types, operators, tables and constraints, the open catalog
//! handles, and the registered host-binding invokers. Opening an
//! environment over an existing store discovers the catalog; a fresh store
//! gets one created. Databases are registered in the catalog and scope
//! transactions; the dbroot is shared by all of them and freed when the
//! last environment handle is dropped.

use crate::cat::Catalog;
use crate::cst::Constraint;
use crate::err::Error;
use crate::kvs::{MemStore, RecordStore, Transaction};
use crate::ops::{HostInvoker, OpMap};
use crate::tbl::Table;
use crate::typ::ScalarType;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;

/// The per-environment shared state.
pub(crate) struct DbRoot {
	/// user-defined types, interned by name
	pub(crate) types: RwLock<HashMap<String, Arc<ScalarType>>>,
	/// user read-only operators
	pub(crate) ro_ops: OpMap,
	/// user update operators
	pub(crate) upd_ops: OpMap,
	/// named tables, shared across lookups
	pub(crate) tables: RwLock<HashMap<String, Table>>,
	/// declarative constraints, materialized on first use
	pub(crate) constraints: RwLock<Option<Vec<Constraint>>>,
	/// host-binding invokers by tag
	hosts: RwLock<HashMap<String, HostInvoker>>,
	cat: OnceLock<Arc<Catalog>>,
}

pub(crate) struct EnvInner {
	store: Box<dyn RecordStore>,
	dbroot: DbRoot,
}

/// A handle to an open environment.
#[derive(Clone)]
pub struct Environment(Arc<EnvInner>);

impl Environment {
	/// Opens an environment over a record store, creating or discovering
	/// the catalog.
	pub fn open(store: Box<dyn RecordStore>) -> Result<Environment, Error> {
		let env = Environment(Arc::new(EnvInner {
			store,
			dbroot: DbRoot {
				types: RwLock::new(HashMap::new()),
				ro_ops: OpMap::new(),
				upd_ops: OpMap::new(),
				tables: RwLock::new(HashMap::new()),
				constraints: RwLock::new(None),
				hosts: RwLock::new(HashMap::new()),
				cat: OnceLock::new(),
			},
		}));
		let boot = Database {
			env: env.clone(),
			name: Arc::from(""),
		};
		let tx = Transaction::begin(&boot, None)?;
		let (catalog, fresh) = match crate::cat::bootstrap(&tx) {
			Ok(res) => res,
			Err(e) => {
				let _ = tx.rollback();
				return Err(e);
			}
		};
		let catalog = Arc::new(catalog);
		env.0
			.dbroot
			.cat
			.set(Arc::clone(&catalog))
			.map_err(|_| Error::Internal("environment opened twice".to_string()))?;
		if fresh {
			if let Err(e) = crate::cat::register_systables(&catalog, &tx) {
				let _ = tx.rollback();
				return Err(e);
			}
		}
		for table in [
			&catalog.rtables,
			&catalog.vtables,
			&catalog.ptables,
			&catalog.tableattrs,
			&catalog.defvals,
			&catalog.keys,
			&catalog.types,
			&catalog.possreps,
			&catalog.possrepcomps,
			&catalog.ro_ops,
			&catalog.upd_ops,
			&catalog.constraints,
			&catalog.dbtables,
			&catalog.version,
		] {
			env.cache_table(table);
		}
		tx.commit()?;
		info!("environment open");
		Ok(env)
	}

	/// Opens an environment over a fresh in-memory store.
	pub fn memory() -> Result<Environment, Error> {
		Self::open(Box::new(MemStore::new()))
	}

	/// Whether two handles denote the same environment.
	pub fn same(a: &Environment, b: &Environment) -> bool {
		Arc::ptr_eq(&a.0, &b.0)
	}

	/// Creates and registers a database.
	pub fn create_database(&self, name: &str) -> Result<Database, Error> {
		if name.is_empty() {
			return Err(Error::InvalidArgument("database name is empty".to_string()));
		}
		let db = Database {
			env: self.clone(),
			name: Arc::from(name),
		};
		let tx = Transaction::begin(&db, None)?;
		if crate::cat::database_exists(name, &tx)? {
			let _ = tx.rollback();
			return Err(Error::ElementExists(format!("database {name}")));
		}
		if let Err(e) = crate::cat::register_database(name, &tx) {
			let _ = tx.rollback();
			return Err(e);
		}
		tx.commit()?;
		info!("created database {name}");
		Ok(db)
	}

	/// Looks an existing database up by name.
	pub fn get_database(&self, name: &str) -> Result<Database, Error> {
		let db = Database {
			env: self.clone(),
			name: Arc::from(name),
		};
		let tx = Transaction::begin(&db, None)?;
		let exists = crate::cat::database_exists(name, &tx)?;
		tx.commit()?;
		if !exists {
			return Err(Error::NotFound(format!("database {name}")));
		}
		Ok(db)
	}

	/// Registers a host-binding invoker under a tag. Operators created with
	/// the tag as their library dispatch to the invoker, which can retrieve
	/// binding state from the transaction's execution context.
	pub fn register_host(&self, tag: &str, invoker: HostInvoker) {
		self.0.dbroot.hosts.write().insert(tag.to_string(), invoker);
	}

	pub(crate) fn has_host(&self, tag: &str) -> bool {
		!tag.is_empty() && self.0.dbroot.hosts.read().contains_key(tag)
	}

	pub(crate) fn host_invoker(&self, tag: &str) -> Result<HostInvoker, Error> {
		self.0
			.dbroot
			.hosts
			.read()
			.get(tag)
			.copied()
			.ok_or_else(|| Error::ResourceNotFound(format!("host binding {tag}")))
	}

	pub(crate) fn store(&self) -> &dyn RecordStore {
		self.0.store.as_ref()
	}

	pub(crate) fn dbroot(&self) -> &DbRoot {
		&self.0.dbroot
	}

	pub(crate) fn catalog(&self) -> Result<Arc<Catalog>, Error> {
		self.0
			.dbroot
			.cat
			.get()
			.cloned()
			.ok_or_else(|| Error::Internal("catalog is not open".to_string()))
	}

	/// Forgets everything hydrated from the catalog. Called after a
	/// rollback, which may have undone DDL the caches reflect.
	pub(crate) fn invalidate_caches(&self) {
		self.0.dbroot.tables.write().retain(|name, _| name.starts_with("sys_"));
		self.0.dbroot.types.write().clear();
		self.0.dbroot.ro_ops.clear();
		self.0.dbroot.upd_ops.clear();
		*self.0.dbroot.constraints.write() = None;
	}

	pub(crate) fn cache_table(&self, table: &Table) {
		if let Some(name) = table.name() {
			self.0.dbroot.tables.write().insert(name.to_string(), table.clone());
		}
	}

	pub(crate) fn uncache_table(&self, name: &str) {
		self.0.dbroot.tables.write().remove(name);
	}
}

/// A named database within an environment.
#[derive(Clone)]
pub struct Database {
	env: Environment,
	name: Arc<str>,
}

impl Database {
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn environment(&self) -> &Environment {
		&self.env
	}

	/// Begins a top-level transaction on this database.
	pub fn begin(&self) -> Result<Transaction, Error> {
		Transaction::begin(self, None)
	}
}

/// Looks a table up by name: the environment cache first, then the
/// catalog.
pub fn get_table(name: &str, tx: &Transaction) -> Result<Table, Error> {
	if let Some(t) = tx.environment().dbroot().tables.read().get(name) {
		return Ok(t.clone());
	}
	let table = crate::cat::read_table(name, tx)?;
	tx.environment().cache_table(&table);
	Ok(table)
}
