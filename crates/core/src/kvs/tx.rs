//! Engine transactions.
//!
//! A [`Transaction`] scopes all catalog and data access. Transactions nest
//! by value: beginning a nested transaction consumes the parent, and
//! committing or rolling back hands the parent back, so a transaction can
//! never be used while one of its children is running.
//!
//! Record maps and indexes scheduled for deletion (by `drop_table`) are held
//! on the transaction. On nested commit they migrate to the parent; on
//! top-level commit they are deleted from the store; on rollback they are
//! closed without deletion.

use super::{IndexId, RecMapId, RecordStore, StoreTx};
use crate::ctx::ExecContext;
use crate::env::{Database, Environment};
use crate::err::Error;
use std::sync::Arc;

pub struct Transaction {
	db: Database,
	stx: StoreTx,
	parent: Option<Box<Transaction>>,
	del_recmaps: Vec<RecMapId>,
	del_indexes: Vec<IndexId>,
	ctx: Option<Arc<ExecContext>>,
}

impl Transaction {
	/// Begins a transaction against `db`, nested inside `parent` if given.
	pub fn begin(db: &Database, parent: Option<Transaction>) -> Result<Transaction, Error> {
		if let Some(p) = &parent {
			if !Environment::same(p.environment(), db.environment()) {
				return Err(Error::InvalidArgument(
					"parent transaction belongs to another environment".to_string(),
				));
			}
		}
		let stx = db.environment().store().begin(parent.as_ref().map(|p| p.stx))?;
		trace!("beginning transaction on database {}", db.name());
		Ok(Transaction {
			db: db.clone(),
			stx,
			ctx: parent.as_ref().and_then(|p| p.ctx.clone()),
			parent: parent.map(Box::new),
			del_recmaps: Vec::new(),
			del_indexes: Vec::new(),
		})
	}

	/// Commits this transaction, returning its parent if it was nested.
	pub fn commit(mut self) -> Result<Option<Transaction>, Error> {
		self.db.environment().store().commit(self.stx)?;
		match self.parent.take() {
			Some(mut parent) => {
				// deferred deletions migrate to the parent
				parent.del_recmaps.append(&mut self.del_recmaps);
				parent.del_indexes.append(&mut self.del_indexes);
				Ok(Some(*parent))
			}
			None => {
				let store = self.db.environment().store();
				for ix in self.del_indexes.drain(..) {
					store.delete_index(ix, None)?;
				}
				for rm in self.del_recmaps.drain(..) {
					store.delete_recmap(rm, None)?;
				}
				Ok(None)
			}
		}
	}

	/// Rolls this transaction back, returning its parent if it was nested.
	/// Scheduled deletions are discarded; the affected handles are closed.
	/// State hydrated from the catalog is invalidated, since the rollback
	/// may have undone DDL.
	pub fn rollback(mut self) -> Result<Option<Transaction>, Error> {
		self.db.environment().store().rollback(self.stx)?;
		let store = self.db.environment().store();
		for ix in self.del_indexes.drain(..) {
			store.close_index(ix)?;
		}
		for rm in self.del_recmaps.drain(..) {
			store.close_recmap(rm)?;
		}
		self.db.environment().invalidate_caches();
		Ok(self.parent.take().map(|p| *p))
	}

	/// Whether this transaction can still be used. A transaction is
	/// consumed by commit and rollback, so an accessible transaction is
	/// always running.
	pub fn is_running(&self) -> bool {
		true
	}

	/// Schedules a record map for deletion on top-level commit.
	pub fn del_recmap(&mut self, rm: RecMapId) {
		self.del_recmaps.push(rm);
	}

	/// Schedules an index for deletion on top-level commit.
	pub fn del_index(&mut self, ix: IndexId) {
		self.del_indexes.push(ix);
	}

	/// Attaches an execution context carrying host-binding properties.
	pub fn with_context(mut self, ctx: Arc<ExecContext>) -> Self {
		self.ctx = Some(ctx);
		self
	}

	pub fn context(&self) -> Option<&ExecContext> {
		self.ctx.as_deref()
	}

	pub fn database(&self) -> &Database {
		&self.db
	}

	pub fn environment(&self) -> &Environment {
		self.db.environment()
	}

	pub(crate) fn store(&self) -> &dyn RecordStore {
		self.db.environment().store()
	}

	pub(crate) fn stx(&self) -> StoreTx {
		self.stx
	}
}
