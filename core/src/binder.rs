use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{error::Error, store::BindingStore, BackendId, LocalId};

/// Name of a synchronized record type, e.g. `account` or `contact`.
///
/// Record types are resolved against the [`crate::registry::SyncRegistry`] at
/// startup; an unregistered name is an error, never a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordType(String);

impl RecordType {
	pub fn new(name: impl Into<String>) -> Self {
		Self(name.into())
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for RecordType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for RecordType {
	fn from(name: &str) -> Self {
		Self::new(name)
	}
}

/// Identifier a record carries on the remote backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for RemoteId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for RemoteId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

/// Pairing of one local record with at most one remote record.
///
/// A binding with no remote id has never been successfully exported. Bindings
/// are never physically deleted on deactivation; the active flag is cleared
/// and the remote record is soft-deleted instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
	pub local_id: LocalId,
	pub backend_id: BackendId,
	pub record_type: RecordType,
	pub remote_id: Option<RemoteId>,
	/// Watermark of the last successful synchronization.
	pub sync_date: Option<DateTime<Utc>>,
	pub active: bool,
}

impl Binding {
	#[must_use]
	pub fn new(backend_id: BackendId, record_type: RecordType, local_id: LocalId) -> Self {
		Self {
			local_id,
			backend_id,
			record_type,
			remote_id: None,
			sync_date: None,
			active: true,
		}
	}
}

/// Two-way identity lookup over the bindings of one record type on one
/// backend. Scoping is fixed at construction; no network calls happen here.
pub struct Binder {
	backend_id: BackendId,
	record_type: RecordType,
	store: Arc<dyn BindingStore>,
}

impl Binder {
	pub fn new(
		backend_id: BackendId,
		record_type: RecordType,
		store: Arc<dyn BindingStore>,
	) -> Self {
		Self {
			backend_id,
			record_type,
			store,
		}
	}

	#[must_use]
	pub fn record_type(&self) -> &RecordType {
		&self.record_type
	}

	/// Idempotently record the pairing, overwriting any prior remote id for
	/// this local record and stamping the sync watermark.
	pub async fn bind(&self, remote_id: RemoteId, local_id: LocalId) -> Result<(), Error> {
		self.store
			.bind(
				self.backend_id,
				&self.record_type,
				local_id,
				remote_id,
				Utc::now(),
			)
			.await
			.map_err(Error::from)
	}

	pub async fn to_local(&self, remote_id: &RemoteId) -> Result<Option<Binding>, Error> {
		self.store
			.get_by_remote_id(self.backend_id, &self.record_type, remote_id)
			.await
			.map_err(Error::from)
	}

	pub async fn to_remote(&self, local_id: LocalId) -> Result<Option<RemoteId>, Error> {
		Ok(self
			.binding(local_id)
			.await?
			.and_then(|binding| binding.remote_id))
	}

	pub async fn binding(&self, local_id: LocalId) -> Result<Option<Binding>, Error> {
		self.store
			.get(self.backend_id, &self.record_type, local_id)
			.await
			.map_err(Error::from)
	}
}
