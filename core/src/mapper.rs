use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{context::MappingContext, error::Error, store::LocalRecord};

/// When a mapped field may be written to the destination record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
	/// Recomputed and overwritten on every synchronization.
	Always,
	/// Computed once at first export/import and never overwritten.
	OnCreate,
}

/// Field values produced by one mapper run.
///
/// Ephemeral; consumed by the adapter or store call that follows it, never
/// persisted. The exporter/importer select the create or update view, since
/// the mapper alone cannot know which one applies.
#[derive(Debug, Default, Clone)]
pub struct MappedData {
	entries: Vec<(String, Value, WritePolicy)>,
}

impl MappedData {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
		self.push(field.into(), value.into(), WritePolicy::Always);
	}

	pub fn insert_on_create(&mut self, field: impl Into<String>, value: impl Into<Value>) {
		self.push(field.into(), value.into(), WritePolicy::OnCreate);
	}

	fn push(&mut self, field: String, value: Value, policy: WritePolicy) {
		// last write wins per field
		self.entries.retain(|(existing, ..)| *existing != field);
		self.entries.push((field, value, policy));
	}

	#[must_use]
	pub fn get(&self, field: &str) -> Option<&Value> {
		self.entries
			.iter()
			.find(|(existing, ..)| existing == field)
			.map(|(_, value, _)| value)
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// All entries, for a destination record being created.
	#[must_use]
	pub fn for_create(&self) -> Map<String, Value> {
		self.entries
			.iter()
			.map(|(field, value, _)| (field.clone(), value.clone()))
			.collect()
	}

	/// Only the always-writable entries, for an existing destination record.
	#[must_use]
	pub fn for_update(&self) -> Map<String, Value> {
		self.entries
			.iter()
			.filter(|(.., policy)| *policy == WritePolicy::Always)
			.map(|(field, value, _)| (field.clone(), value.clone()))
			.collect()
	}
}

/// Translate one local record into the remote field mapping.
#[async_trait]
pub trait ExportMapper: Send + Sync {
	async fn map(
		&self,
		ctx: &MappingContext<'_>,
		record: &LocalRecord,
	) -> Result<MappedData, Error>;
}

/// Translate one remote record into the local field mapping.
#[async_trait]
pub trait ImportMapper: Send + Sync {
	async fn map(&self, ctx: &MappingContext<'_>, record: &Value) -> Result<MappedData, Error>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn update_view_excludes_on_create_entries() {
		let mut data = MappedData::new();
		data.insert("city", "Lausanne");
		data.insert_on_create("name", "Acme");

		let create = data.for_create();
		assert_eq!(create.len(), 2);
		assert_eq!(create["name"], "Acme");

		let update = data.for_update();
		assert_eq!(update.len(), 1);
		assert!(!update.contains_key("name"));
	}

	#[test]
	fn last_write_wins_per_field() {
		let mut data = MappedData::new();
		data.insert("city", "Lausanne");
		data.insert("city", "Geneva");

		assert_eq!(data.get("city"), Some(&Value::from("Geneva")));
		assert_eq!(data.for_create().len(), 1);
	}
}
