//! The bundled in-memory record store.
//!
//! Record maps are kept as ordered maps from encoded primary-key bytes to
//! field vectors; mutations are checked against the declared field layout
//! (arity and fixed lengths). Transactions take a snapshot of the whole
//! store on begin and restore it on rollback, which is exact for the
//! single-threaded use the engine makes of a store. Secondary indexes are
//! maintained eagerly on every mutation.

use super::{
	encode_key, Field, FieldDef, FieldLen, IndexId, RecMapId, RecordStore, StoreCursor,
	StoreError, StoreTx,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone)]
struct MemMap {
	name: Option<String>,
	fields: Vec<FieldDef>,
	key_fields: usize,
	rows: BTreeMap<Vec<u8>, Vec<Field>>,
}

impl MemMap {
	/// Checks a full record against the declared field layout.
	fn check_record(&self, fields: &[Field]) -> Result<(), StoreError> {
		if fields.len() != self.fields.len() {
			return Err(StoreError::Other(format!(
				"record has {} fields, map declares {}",
				fields.len(),
				self.fields.len()
			)));
		}
		for (no, (field, def)) in fields.iter().zip(&self.fields).enumerate() {
			self.check_len(no, field, def)?;
		}
		Ok(())
	}

	/// Checks field updates against the declared field layout.
	fn check_updates(&self, updates: &[(usize, Field)]) -> Result<(), StoreError> {
		for (no, field) in updates {
			let def = self
				.fields
				.get(*no)
				.ok_or_else(|| StoreError::Other(format!("no field {no} in map")))?;
			self.check_len(*no, field, def)?;
		}
		Ok(())
	}

	fn check_len(&self, no: usize, field: &Field, def: &FieldDef) -> Result<(), StoreError> {
		match def.len {
			FieldLen::Fixed(len) if field.len() != len => Err(StoreError::Other(format!(
				"field {no} has {} bytes, declared fixed length is {len}",
				field.len()
			))),
			_ => Ok(()),
		}
	}
}

#[derive(Clone)]
struct MemIndex {
	rm: RecMapId,
	fieldnos: Vec<usize>,
	unique: bool,
	// index key bytes -> primary key bytes of the matching rows
	entries: BTreeMap<Vec<u8>, Vec<Vec<u8>>>,
}

#[derive(Clone, Default)]
struct Data {
	maps: HashMap<RecMapId, MemMap>,
	names: HashMap<String, RecMapId>,
	indexes: HashMap<IndexId, MemIndex>,
}

struct TxState {
	parent: Option<StoreTx>,
	snapshot: Data,
}

struct Inner {
	seq: AtomicU64,
	data: RwLock<Data>,
	txs: RwLock<HashMap<StoreTx, TxState>>,
}

/// An in-memory [`RecordStore`]. Clones share the same storage, so an
/// environment can be reopened over the data a previous one wrote.
#[derive(Clone)]
pub struct MemStore {
	inner: Arc<Inner>,
}

impl Default for MemStore {
	fn default() -> Self {
		Self::new()
	}
}

impl MemStore {
	pub fn new() -> Self {
		MemStore {
			inner: Arc::new(Inner {
				seq: AtomicU64::new(1),
				data: RwLock::new(Data::default()),
				txs: RwLock::new(HashMap::new()),
			}),
		}
	}

	fn next_id(&self) -> u64 {
		self.inner.seq.fetch_add(1, Ordering::Relaxed)
	}

	fn index_key(idx: &MemIndex, row: &[Field]) -> Vec<u8> {
		let fields: Vec<Field> = idx.fieldnos.iter().map(|&no| row[no].clone()).collect();
		encode_key(&fields)
	}

	/// Removes the row addressed by `key` from every index over `rm`.
	fn unindex(data: &mut Data, rm: RecMapId, key: &[u8], row: &[Field]) {
		for idx in data.indexes.values_mut().filter(|i| i.rm == rm) {
			let ik = Self::index_key(idx, row);
			if let Some(pks) = idx.entries.get_mut(&ik) {
				pks.retain(|pk| pk != key);
				if pks.is_empty() {
					idx.entries.remove(&ik);
				}
			}
		}
	}

	/// Adds the row to every index over `rm`, enforcing uniqueness.
	fn index(data: &mut Data, rm: RecMapId, key: &[u8], row: &[Field]) -> Result<(), StoreError> {
		// validate unique indexes before mutating any of them
		for idx in data.indexes.values().filter(|i| i.rm == rm) {
			if idx.unique {
				let ik = Self::index_key(idx, row);
				if let Some(pks) = idx.entries.get(&ik) {
					if pks.iter().any(|pk| pk != key) {
						return Err(StoreError::KeyExists);
					}
				}
			}
		}
		for idx in data.indexes.values_mut().filter(|i| i.rm == rm) {
			let ik = Self::index_key(idx, row);
			idx.entries.entry(ik).or_default().push(key.to_vec());
		}
		Ok(())
	}
}

impl RecordStore for MemStore {
	fn begin(&self, parent: Option<StoreTx>) -> Result<StoreTx, StoreError> {
		let tx = StoreTx(self.next_id());
		let snapshot = self.inner.data.read().clone();
		self.inner.txs.write().insert(
			tx,
			TxState {
				parent,
				snapshot,
			},
		);
		Ok(tx)
	}

	fn commit(&self, tx: StoreTx) -> Result<(), StoreError> {
		match self.inner.txs.write().remove(&tx) {
			Some(_) => Ok(()),
			None => Err(StoreError::Other("unknown transaction".to_string())),
		}
	}

	fn rollback(&self, tx: StoreTx) -> Result<(), StoreError> {
		match self.inner.txs.write().remove(&tx) {
			Some(state) => {
				*self.inner.data.write() = state.snapshot;
				let _ = state.parent;
				Ok(())
			}
			None => Err(StoreError::Other("unknown transaction".to_string())),
		}
	}

	fn create_recmap(
		&self,
		name: Option<&str>,
		fields: Vec<FieldDef>,
		key_fields: usize,
		_tx: StoreTx,
	) -> Result<RecMapId, StoreError> {
		if key_fields == 0 || key_fields > fields.len() {
			return Err(StoreError::Other("invalid key field count".to_string()));
		}
		let rm = RecMapId(self.next_id());
		let mut data = self.inner.data.write();
		if let Some(name) = name {
			if data.names.contains_key(name) {
				return Err(StoreError::KeyExists);
			}
			data.names.insert(name.to_string(), rm);
		}
		data.maps.insert(
			rm,
			MemMap {
				name: name.map(str::to_string),
				fields,
				key_fields,
				rows: BTreeMap::new(),
			},
		);
		Ok(rm)
	}

	fn open_recmap(&self, name: &str, _tx: StoreTx) -> Result<RecMapId, StoreError> {
		self.inner.data.read().names.get(name).copied().ok_or(StoreError::NotFound)
	}

	fn close_recmap(&self, _rm: RecMapId) -> Result<(), StoreError> {
		Ok(())
	}

	fn delete_recmap(&self, rm: RecMapId, _tx: Option<StoreTx>) -> Result<(), StoreError> {
		let mut data = self.inner.data.write();
		let map = data.maps.remove(&rm).ok_or(StoreError::NotFound)?;
		if let Some(name) = map.name {
			data.names.remove(&name);
		}
		data.indexes.retain(|_, idx| idx.rm != rm);
		Ok(())
	}

	fn insert_rec(
		&self,
		rm: RecMapId,
		fields: Vec<Field>,
		_tx: StoreTx,
	) -> Result<(), StoreError> {
		let mut data = self.inner.data.write();
		let map = data.maps.get(&rm).ok_or(StoreError::NotFound)?;
		map.check_record(&fields)?;
		let key = encode_key(&fields[..map.key_fields]);
		if map.rows.contains_key(&key) {
			return Err(StoreError::KeyExists);
		}
		Self::index(&mut data, rm, &key, &fields)?;
		data.maps.get_mut(&rm).expect("checked above").rows.insert(key, fields);
		Ok(())
	}

	fn update_rec(
		&self,
		rm: RecMapId,
		key: &[Field],
		updates: &[(usize, Field)],
		_tx: StoreTx,
	) -> Result<(), StoreError> {
		let mut data = self.inner.data.write();
		let map = data.maps.get(&rm).ok_or(StoreError::NotFound)?;
		map.check_updates(updates)?;
		let key_fields = map.key_fields;
		let kb = encode_key(key);
		let orig = map.rows.get(&kb).cloned().ok_or(StoreError::NotFound)?;
		Self::unindex(&mut data, rm, &kb, &orig);
		let mut row = orig.clone();
		for (no, val) in updates {
			row[*no] = val.clone();
		}
		let nkb = encode_key(&row[..key_fields]);
		if nkb != kb && data.maps.get(&rm).expect("checked above").rows.contains_key(&nkb) {
			// restore the index entries removed above
			Self::index(&mut data, rm, &kb, &orig)?;
			return Err(StoreError::KeyExists);
		}
		Self::index(&mut data, rm, &nkb, &row)?;
		let map = data.maps.get_mut(&rm).expect("checked above");
		map.rows.remove(&kb);
		map.rows.insert(nkb, row);
		Ok(())
	}

	fn delete_rec(&self, rm: RecMapId, key: &[Field], _tx: StoreTx) -> Result<(), StoreError> {
		let mut data = self.inner.data.write();
		let kb = encode_key(key);
		let row = {
			let map = data.maps.get_mut(&rm).ok_or(StoreError::NotFound)?;
			map.rows.remove(&kb).ok_or(StoreError::NotFound)?
		};
		Self::unindex(&mut data, rm, &kb, &row);
		Ok(())
	}

	fn get_fields(
		&self,
		rm: RecMapId,
		key: &[Field],
		fieldnos: &[usize],
		_tx: StoreTx,
	) -> Result<Vec<Field>, StoreError> {
		let data = self.inner.data.read();
		let map = data.maps.get(&rm).ok_or(StoreError::NotFound)?;
		let row = map.rows.get(&encode_key(key)).ok_or(StoreError::NotFound)?;
		fieldnos
			.iter()
			.map(|&no| row.get(no).cloned().ok_or(StoreError::Other("bad field".to_string())))
			.collect()
	}

	fn contains_rec(
		&self,
		rm: RecMapId,
		fields: &[Field],
		_tx: StoreTx,
	) -> Result<bool, StoreError> {
		let data = self.inner.data.read();
		let map = data.maps.get(&rm).ok_or(StoreError::NotFound)?;
		let key = encode_key(&fields[..map.key_fields]);
		Ok(map.rows.get(&key).is_some_and(|row| row.as_slice() == fields))
	}

	fn record_count(&self, rm: RecMapId, _tx: StoreTx) -> Result<u64, StoreError> {
		let data = self.inner.data.read();
		let map = data.maps.get(&rm).ok_or(StoreError::NotFound)?;
		Ok(map.rows.len() as u64)
	}

	fn cursor(&self, rm: RecMapId, _tx: StoreTx) -> Result<Box<dyn StoreCursor>, StoreError> {
		let data = self.inner.data.read();
		let map = data.maps.get(&rm).ok_or(StoreError::NotFound)?;
		Ok(Box::new(MemCursor {
			inner: Arc::clone(&self.inner),
			rm,
			keys: map.rows.keys().cloned().collect(),
			pos: None,
		}))
	}

	fn create_index(
		&self,
		rm: RecMapId,
		_name: Option<&str>,
		fieldnos: Vec<usize>,
		unique: bool,
		_tx: StoreTx,
	) -> Result<IndexId, StoreError> {
		let ix = IndexId(self.next_id());
		let mut data = self.inner.data.write();
		let map = data.maps.get(&rm).ok_or(StoreError::NotFound)?;
		let mut idx = MemIndex {
			rm,
			fieldnos,
			unique,
			entries: BTreeMap::new(),
		};
		for (key, row) in &map.rows {
			let ik = Self::index_key(&idx, row);
			let pks = idx.entries.entry(ik).or_default();
			if unique && !pks.is_empty() {
				return Err(StoreError::KeyExists);
			}
			pks.push(key.clone());
		}
		data.indexes.insert(ix, idx);
		Ok(ix)
	}

	fn close_index(&self, _ix: IndexId) -> Result<(), StoreError> {
		Ok(())
	}

	fn delete_index(&self, ix: IndexId, _tx: Option<StoreTx>) -> Result<(), StoreError> {
		self.inner.data.write().indexes.remove(&ix).map(|_| ()).ok_or(StoreError::NotFound)
	}

	fn index_get(
		&self,
		ix: IndexId,
		key: &[Field],
		_tx: StoreTx,
	) -> Result<Vec<Vec<Field>>, StoreError> {
		let data = self.inner.data.read();
		let idx = data.indexes.get(&ix).ok_or(StoreError::NotFound)?;
		let map = data.maps.get(&idx.rm).ok_or(StoreError::NotFound)?;
		let ik = encode_key(key);
		let mut out = Vec::new();
		if let Some(pks) = idx.entries.get(&ik) {
			for pk in pks {
				if let Some(row) = map.rows.get(pk) {
					out.push(row.clone());
				}
			}
		}
		Ok(out)
	}
}

struct MemCursor {
	inner: Arc<Inner>,
	rm: RecMapId,
	keys: Vec<Vec<u8>>,
	pos: Option<usize>,
}

impl MemCursor {
	fn current_key(&self) -> Result<&[u8], StoreError> {
		let pos = self.pos.ok_or(StoreError::NotFound)?;
		self.keys.get(pos).map(Vec::as_slice).ok_or(StoreError::NotFound)
	}

	/// Advances to the next key that still exists in the map.
	fn advance(&mut self, mut pos: usize) -> Result<bool, StoreError> {
		let data = self.inner.data.read();
		let map = data.maps.get(&self.rm).ok_or(StoreError::NotFound)?;
		while pos < self.keys.len() {
			if map.rows.contains_key(&self.keys[pos]) {
				self.pos = Some(pos);
				return Ok(true);
			}
			pos += 1;
		}
		self.pos = Some(self.keys.len());
		Ok(false)
	}
}

impl StoreCursor for MemCursor {
	fn first(&mut self) -> Result<bool, StoreError> {
		self.advance(0)
	}

	fn next(&mut self) -> Result<bool, StoreError> {
		match self.pos {
			Some(pos) => self.advance(pos + 1),
			None => self.advance(0),
		}
	}

	fn field(&self, no: usize) -> Result<Field, StoreError> {
		let key = self.current_key()?.to_vec();
		let data = self.inner.data.read();
		let map = data.maps.get(&self.rm).ok_or(StoreError::NotFound)?;
		let row = map.rows.get(&key).ok_or(StoreError::NotFound)?;
		row.get(no).cloned().ok_or(StoreError::Other("bad field".to_string()))
	}

	fn update(&mut self, updates: &[(usize, Field)]) -> Result<(), StoreError> {
		let key = self.current_key()?.to_vec();
		let data = self.inner.data.read();
		let map = data.maps.get(&self.rm).ok_or(StoreError::NotFound)?;
		let key_fields = map.key_fields;
		let row = map.rows.get(&key).ok_or(StoreError::NotFound)?;
		let keyv: Vec<Field> = row[..key_fields].to_vec();
		drop(data);
		let store = MemStore {
			inner: Arc::clone(&self.inner),
		};
		store.update_rec(self.rm, &keyv, updates, StoreTx(0))
	}

	fn delete(&mut self) -> Result<(), StoreError> {
		let key = self.current_key()?.to_vec();
		let data = self.inner.data.read();
		let map = data.maps.get(&self.rm).ok_or(StoreError::NotFound)?;
		let key_fields = map.key_fields;
		let row = map.rows.get(&key).ok_or(StoreError::NotFound)?;
		let keyv: Vec<Field> = row[..key_fields].to_vec();
		drop(data);
		let store = MemStore {
			inner: Arc::clone(&self.inner),
		};
		store.delete_rec(self.rm, &keyv, StoreTx(0))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn fields(vals: &[&[u8]]) -> Vec<Field> {
		vals.iter().map(|v| v.to_vec()).collect()
	}

	#[test]
	fn insert_get_delete() {
		let store = MemStore::new();
		let tx = store.begin(None).unwrap();
		let rm = store
			.create_recmap(
				None,
				vec![
					FieldDef {
						len: FieldLen::Variable,
					},
					FieldDef {
						len: FieldLen::Variable,
					},
				],
				1,
				tx,
			)
			.unwrap();
		store.insert_rec(rm, fields(&[b"k1", b"v1"]), tx).unwrap();
		assert_eq!(
			store.insert_rec(rm, fields(&[b"k1", b"v2"]), tx),
			Err(StoreError::KeyExists)
		);
		let got = store.get_fields(rm, &fields(&[b"k1"]), &[1], tx).unwrap();
		assert_eq!(got, fields(&[b"v1"]));
		store.delete_rec(rm, &fields(&[b"k1"]), tx).unwrap();
		assert_eq!(store.get_fields(rm, &fields(&[b"k1"]), &[1], tx), Err(StoreError::NotFound));
		store.commit(tx).unwrap();
	}

	#[test]
	fn record_shape_is_validated() {
		let store = MemStore::new();
		let tx = store.begin(None).unwrap();
		let rm = store
			.create_recmap(
				None,
				vec![
					FieldDef {
						len: FieldLen::Fixed(8),
					},
					FieldDef {
						len: FieldLen::Variable,
					},
				],
				1,
				tx,
			)
			.unwrap();
		// wrong field count
		assert!(matches!(
			store.insert_rec(rm, fields(&[b"12345678"]), tx),
			Err(StoreError::Other(_))
		));
		// fixed-length field of the wrong size
		assert!(matches!(
			store.insert_rec(rm, fields(&[b"short", b"v"]), tx),
			Err(StoreError::Other(_))
		));
		store.insert_rec(rm, fields(&[b"12345678", b"v"]), tx).unwrap();
		// updates are checked too
		assert!(matches!(
			store.update_rec(rm, &fields(&[b"12345678"]), &[(0, b"nope".to_vec())], tx),
			Err(StoreError::Other(_))
		));
		assert!(matches!(
			store.update_rec(rm, &fields(&[b"12345678"]), &[(9, b"v".to_vec())], tx),
			Err(StoreError::Other(_))
		));
		store
			.update_rec(rm, &fields(&[b"12345678"]), &[(1, b"w".to_vec())], tx)
			.unwrap();
		store.commit(tx).unwrap();
	}

	#[test]
	fn rollback_restores_snapshot() {
		let store = MemStore::new();
		let tx = store.begin(None).unwrap();
		let rm = store
			.create_recmap(
				Some("t"),
				vec![FieldDef {
					len: FieldLen::Variable,
				}],
				1,
				tx,
			)
			.unwrap();
		store.insert_rec(rm, fields(&[b"a"]), tx).unwrap();
		store.commit(tx).unwrap();

		let tx = store.begin(None).unwrap();
		store.insert_rec(rm, fields(&[b"b"]), tx).unwrap();
		assert_eq!(store.record_count(rm, tx).unwrap(), 2);
		store.rollback(tx).unwrap();

		let tx = store.begin(None).unwrap();
		assert_eq!(store.record_count(rm, tx).unwrap(), 1);
		store.commit(tx).unwrap();
	}

	#[test]
	fn unique_index_rejects_duplicates() {
		let store = MemStore::new();
		let tx = store.begin(None).unwrap();
		let rm = store
			.create_recmap(
				None,
				vec![
					FieldDef {
						len: FieldLen::Variable,
					},
					FieldDef {
						len: FieldLen::Variable,
					},
				],
				1,
				tx,
			)
			.unwrap();
		let ix = store.create_index(rm, None, vec![1], true, tx).unwrap();
		store.insert_rec(rm, fields(&[b"k1", b"x"]), tx).unwrap();
		assert_eq!(
			store.insert_rec(rm, fields(&[b"k2", b"x"]), tx),
			Err(StoreError::KeyExists)
		);
		store.insert_rec(rm, fields(&[b"k2", b"y"]), tx).unwrap();
		let hits = store.index_get(ix, &fields(&[b"y"]), tx).unwrap();
		assert_eq!(hits, vec![fields(&[b"k2", b"y"])]);
		store.commit(tx).unwrap();
	}

	#[test]
	fn cursor_skips_deleted_rows() {
		let store = MemStore::new();
		let tx = store.begin(None).unwrap();
		let rm = store
			.create_recmap(
				None,
				vec![FieldDef {
					len: FieldLen::Variable,
				}],
				1,
				tx,
			)
			.unwrap();
		for k in [b"a".as_slice(), b"b", b"c"] {
			store.insert_rec(rm, fields(&[k]), tx).unwrap();
		}
		let mut cur = store.cursor(rm, tx).unwrap();
		assert!(cur.first().unwrap());
		cur.delete().unwrap();
		assert!(cur.next().unwrap());
		let mut seen = vec![cur.field(0).unwrap()];
		while cur.next().unwrap() {
			seen.push(cur.field(0).unwrap());
		}
		assert_eq!(seen, fields(&[b"b", b"c"]));
		store.commit(tx).unwrap();
	}
}
