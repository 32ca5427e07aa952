use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
	binder::{Binding, RecordType, RemoteId},
	BackendId, LocalId,
};

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
	#[error("remote id already bound: <record_type='{record_type}', remote_id='{remote_id}'>")]
	RemoteIdTaken {
		record_type: RecordType,
		remote_id: RemoteId,
	},
	#[error("binding not found: <record_type='{record_type}', local_id={local_id}>")]
	BindingNotFound {
		record_type: RecordType,
		local_id: LocalId,
	},
	#[error("local record not found: <record_type='{record_type}', local_id={local_id}>")]
	RecordNotFound {
		record_type: RecordType,
		local_id: LocalId,
	},
}

/// Storage boundary for bindings.
///
/// Uniqueness of `(backend, record type, remote id)` is the store's job, not
/// the caller's, so that two concurrent first-time exports of the same remote
/// identity cannot both succeed.
#[async_trait]
pub trait BindingStore: Send + Sync {
	async fn get(
		&self,
		backend_id: BackendId,
		record_type: &RecordType,
		local_id: LocalId,
	) -> Result<Option<Binding>, StoreError>;

	async fn get_by_remote_id(
		&self,
		backend_id: BackendId,
		record_type: &RecordType,
		remote_id: &RemoteId,
	) -> Result<Option<Binding>, StoreError>;

	/// Create a binding row for a record newly targeted for synchronization.
	async fn insert(&self, binding: Binding) -> Result<(), StoreError>;

	/// Set the remote id and sync watermark of an existing binding.
	async fn bind(
		&self,
		backend_id: BackendId,
		record_type: &RecordType,
		local_id: LocalId,
		remote_id: RemoteId,
		sync_date: DateTime<Utc>,
	) -> Result<(), StoreError>;

	async fn set_active(
		&self,
		backend_id: BackendId,
		record_type: &RecordType,
		local_id: LocalId,
		active: bool,
	) -> Result<(), StoreError>;

	/// Bindings due for synchronization: sync watermark older than the cutoff
	/// or never set; every binding of the record type when no cutoff is given.
	async fn select_stale(
		&self,
		backend_id: BackendId,
		record_type: &RecordType,
		cutoff: Option<DateTime<Utc>>,
	) -> Result<Vec<Binding>, StoreError>;
}

/// One local record as handed over by the host store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalRecord {
	pub id: LocalId,
	pub values: Map<String, Value>,
}

impl LocalRecord {
	#[must_use]
	pub fn get(&self, field: &str) -> Option<&Value> {
		self.values.get(field)
	}

	#[must_use]
	pub fn str_field(&self, field: &str) -> Option<&str> {
		self.values.get(field).and_then(Value::as_str)
	}

	/// Soft-delete flag, present only on record models that carry one.
	#[must_use]
	pub fn active(&self) -> Option<bool> {
		self.values.get("active").and_then(Value::as_bool)
	}
}

/// Boundary to the host application's record storage.
#[async_trait]
pub trait RecordStore: Send + Sync {
	async fn fetch(
		&self,
		record_type: &RecordType,
		local_id: LocalId,
	) -> Result<Option<LocalRecord>, StoreError>;

	async fn create(
		&self,
		record_type: &RecordType,
		values: Map<String, Value>,
	) -> Result<LocalId, StoreError>;

	/// Merge the given values into an existing record.
	async fn update(
		&self,
		record_type: &RecordType,
		local_id: LocalId,
		values: Map<String, Value>,
	) -> Result<(), StoreError>;
}

type BindingKey = (BackendId, RecordType, LocalId);
type RemoteKey = (BackendId, RecordType, RemoteId);

#[derive(Default)]
struct BindingTable {
	rows: HashMap<BindingKey, Binding>,
	// unique index over (backend, record type, remote id)
	remote_index: HashMap<RemoteKey, LocalId>,
}

/// In-memory [`BindingStore`] for tests and embedding.
#[derive(Default)]
pub struct MemoryBindingStore {
	inner: RwLock<BindingTable>,
}

impl MemoryBindingStore {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl BindingStore for MemoryBindingStore {
	async fn get(
		&self,
		backend_id: BackendId,
		record_type: &RecordType,
		local_id: LocalId,
	) -> Result<Option<Binding>, StoreError> {
		Ok(self
			.inner
			.read()
			.await
			.rows
			.get(&(backend_id, record_type.clone(), local_id))
			.cloned())
	}

	async fn get_by_remote_id(
		&self,
		backend_id: BackendId,
		record_type: &RecordType,
		remote_id: &RemoteId,
	) -> Result<Option<Binding>, StoreError> {
		let table = self.inner.read().await;

		Ok(table
			.remote_index
			.get(&(backend_id, record_type.clone(), remote_id.clone()))
			.and_then(|local_id| {
				table
					.rows
					.get(&(backend_id, record_type.clone(), *local_id))
					.cloned()
			}))
	}

	async fn insert(&self, binding: Binding) -> Result<(), StoreError> {
		let mut table = self.inner.write().await;

		if let Some(remote_id) = &binding.remote_id {
			let key = (
				binding.backend_id,
				binding.record_type.clone(),
				remote_id.clone(),
			);
			if table
				.remote_index
				.get(&key)
				.is_some_and(|existing| *existing != binding.local_id)
			{
				return Err(StoreError::RemoteIdTaken {
					record_type: binding.record_type.clone(),
					remote_id: remote_id.clone(),
				});
			}
			table.remote_index.insert(key, binding.local_id);
		}

		table.rows.insert(
			(
				binding.backend_id,
				binding.record_type.clone(),
				binding.local_id,
			),
			binding,
		);

		Ok(())
	}

	async fn bind(
		&self,
		backend_id: BackendId,
		record_type: &RecordType,
		local_id: LocalId,
		remote_id: RemoteId,
		sync_date: DateTime<Utc>,
	) -> Result<(), StoreError> {
		let mut table = self.inner.write().await;

		let remote_key = (backend_id, record_type.clone(), remote_id.clone());
		if table
			.remote_index
			.get(&remote_key)
			.is_some_and(|existing| *existing != local_id)
		{
			return Err(StoreError::RemoteIdTaken {
				record_type: record_type.clone(),
				remote_id,
			});
		}

		let Some(row) = table
			.rows
			.get_mut(&(backend_id, record_type.clone(), local_id))
		else {
			return Err(StoreError::BindingNotFound {
				record_type: record_type.clone(),
				local_id,
			});
		};

		let previous = row.remote_id.replace(remote_id.clone());
		row.sync_date = Some(sync_date);

		if let Some(previous) = previous.filter(|previous| *previous != remote_id) {
			table
				.remote_index
				.remove(&(backend_id, record_type.clone(), previous));
		}
		table.remote_index.insert(remote_key, local_id);

		Ok(())
	}

	async fn set_active(
		&self,
		backend_id: BackendId,
		record_type: &RecordType,
		local_id: LocalId,
		active: bool,
	) -> Result<(), StoreError> {
		let mut table = self.inner.write().await;

		let Some(row) = table
			.rows
			.get_mut(&(backend_id, record_type.clone(), local_id))
		else {
			return Err(StoreError::BindingNotFound {
				record_type: record_type.clone(),
				local_id,
			});
		};
		row.active = active;

		Ok(())
	}

	async fn select_stale(
		&self,
		backend_id: BackendId,
		record_type: &RecordType,
		cutoff: Option<DateTime<Utc>>,
	) -> Result<Vec<Binding>, StoreError> {
		Ok(self
			.inner
			.read()
			.await
			.rows
			.values()
			.filter(|binding| {
				binding.backend_id == backend_id && binding.record_type == *record_type
			})
			.filter(|binding| match (cutoff, binding.sync_date) {
				(None, _) | (Some(_), None) => true,
				(Some(cutoff), Some(sync_date)) => sync_date < cutoff,
			})
			.cloned()
			.collect())
	}
}

/// In-memory [`RecordStore`] for tests and embedding.
#[derive(Default)]
pub struct MemoryRecordStore {
	tables: RwLock<HashMap<RecordType, HashMap<LocalId, LocalRecord>>>,
}

impl MemoryRecordStore {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Seed a record with a fixed id, for fixtures.
	pub async fn seed(&self, record_type: &RecordType, record: LocalRecord) {
		self.tables
			.write()
			.await
			.entry(record_type.clone())
			.or_default()
			.insert(record.id, record);
	}
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
	async fn fetch(
		&self,
		record_type: &RecordType,
		local_id: LocalId,
	) -> Result<Option<LocalRecord>, StoreError> {
		Ok(self
			.tables
			.read()
			.await
			.get(record_type)
			.and_then(|table| table.get(&local_id))
			.cloned())
	}

	async fn create(
		&self,
		record_type: &RecordType,
		values: Map<String, Value>,
	) -> Result<LocalId, StoreError> {
		let local_id = Uuid::new_v4();

		self.tables
			.write()
			.await
			.entry(record_type.clone())
			.or_default()
			.insert(
				local_id,
				LocalRecord {
					id: local_id,
					values,
				},
			);

		Ok(local_id)
	}

	async fn update(
		&self,
		record_type: &RecordType,
		local_id: LocalId,
		values: Map<String, Value>,
	) -> Result<(), StoreError> {
		let mut tables = self.tables.write().await;

		let Some(record) = tables
			.get_mut(record_type)
			.and_then(|table| table.get_mut(&local_id))
		else {
			return Err(StoreError::RecordNotFound {
				record_type: record_type.clone(),
				local_id,
			});
		};

		record.values.extend(values);

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn binding_with_remote(
		backend_id: BackendId,
		record_type: &RecordType,
		remote_id: &str,
	) -> Binding {
		Binding {
			remote_id: Some(RemoteId::new(remote_id)),
			..Binding::new(backend_id, record_type.clone(), Uuid::new_v4())
		}
	}

	#[tokio::test]
	async fn remote_id_is_unique_per_backend_and_record_type() {
		let store = MemoryBindingStore::new();
		let backend_id = Uuid::new_v4();
		let record_type = RecordType::new("account");

		store
			.insert(binding_with_remote(backend_id, &record_type, "R-1"))
			.await
			.unwrap();

		let duplicate = store
			.insert(binding_with_remote(backend_id, &record_type, "R-1"))
			.await;
		assert!(matches!(
			duplicate,
			Err(StoreError::RemoteIdTaken { .. })
		));

		// same remote id on another record type is a different identity
		store
			.insert(binding_with_remote(backend_id, &RecordType::new("contact"), "R-1"))
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn bind_rejects_taken_remote_id() {
		let store = MemoryBindingStore::new();
		let backend_id = Uuid::new_v4();
		let record_type = RecordType::new("account");

		store
			.insert(binding_with_remote(backend_id, &record_type, "R-1"))
			.await
			.unwrap();

		let local_id = Uuid::new_v4();
		store
			.insert(Binding::new(backend_id, record_type.clone(), local_id))
			.await
			.unwrap();

		let taken = store
			.bind(
				backend_id,
				&record_type,
				local_id,
				RemoteId::new("R-1"),
				Utc::now(),
			)
			.await;
		assert!(matches!(taken, Err(StoreError::RemoteIdTaken { .. })));

		store
			.bind(
				backend_id,
				&record_type,
				local_id,
				RemoteId::new("R-2"),
				Utc::now(),
			)
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn rebinding_frees_the_previous_remote_id() {
		let store = MemoryBindingStore::new();
		let backend_id = Uuid::new_v4();
		let record_type = RecordType::new("account");
		let local_id = Uuid::new_v4();

		store
			.insert(Binding::new(backend_id, record_type.clone(), local_id))
			.await
			.unwrap();
		store
			.bind(
				backend_id,
				&record_type,
				local_id,
				RemoteId::new("R-1"),
				Utc::now(),
			)
			.await
			.unwrap();
		store
			.bind(
				backend_id,
				&record_type,
				local_id,
				RemoteId::new("R-2"),
				Utc::now(),
			)
			.await
			.unwrap();

		assert!(store
			.get_by_remote_id(backend_id, &record_type, &RemoteId::new("R-1"))
			.await
			.unwrap()
			.is_none());
		assert!(store
			.get_by_remote_id(backend_id, &record_type, &RemoteId::new("R-2"))
			.await
			.unwrap()
			.is_some());
	}
}
