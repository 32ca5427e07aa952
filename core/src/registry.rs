use std::{collections::HashMap, sync::Arc};

use crate::{
	batch::{BatchHooks, NoopBatchHooks},
	binder::RecordType,
	error::Error,
	export::{ExportHooks, NoopExportHooks},
	import::{ImportHooks, NoopImportHooks},
	mapper::{ExportMapper, ImportMapper},
};

/// Everything the engine needs to synchronize one record type: the remote
/// object it maps to, its mappers per direction, and the hook strategies.
///
/// Direction capability is carried by the mappers: a flow without an import
/// mapper is export-only, and vice versa.
pub struct RecordFlow {
	pub record_type: RecordType,
	/// Remote object name, e.g. `Account`.
	pub object: String,
	/// External-id field the backend resolves identity by, for export-only
	/// record types.
	pub lookup_field: Option<String>,
	pub export_mapper: Option<Arc<dyn ExportMapper>>,
	pub import_mapper: Option<Arc<dyn ImportMapper>>,
	pub export_hooks: Arc<dyn ExportHooks>,
	pub import_hooks: Arc<dyn ImportHooks>,
	pub batch_hooks: Arc<dyn BatchHooks>,
}

impl RecordFlow {
	#[must_use]
	pub fn bidirectional(
		record_type: impl Into<RecordType>,
		object: impl Into<String>,
		export_mapper: Arc<dyn ExportMapper>,
		import_mapper: Arc<dyn ImportMapper>,
	) -> Self {
		Self {
			record_type: record_type.into(),
			object: object.into(),
			lookup_field: None,
			export_mapper: Some(export_mapper),
			import_mapper: Some(import_mapper),
			export_hooks: Arc::new(NoopExportHooks),
			import_hooks: Arc::new(NoopImportHooks),
			batch_hooks: Arc::new(NoopBatchHooks),
		}
	}

	#[must_use]
	pub fn export_only(
		record_type: impl Into<RecordType>,
		object: impl Into<String>,
		export_mapper: Arc<dyn ExportMapper>,
	) -> Self {
		Self {
			record_type: record_type.into(),
			object: object.into(),
			lookup_field: None,
			export_mapper: Some(export_mapper),
			import_mapper: None,
			export_hooks: Arc::new(NoopExportHooks),
			import_hooks: Arc::new(NoopImportHooks),
			batch_hooks: Arc::new(NoopBatchHooks),
		}
	}

	#[must_use]
	pub fn import_only(
		record_type: impl Into<RecordType>,
		object: impl Into<String>,
		import_mapper: Arc<dyn ImportMapper>,
	) -> Self {
		Self {
			record_type: record_type.into(),
			object: object.into(),
			lookup_field: None,
			export_mapper: None,
			import_mapper: Some(import_mapper),
			export_hooks: Arc::new(NoopExportHooks),
			import_hooks: Arc::new(NoopImportHooks),
			batch_hooks: Arc::new(NoopBatchHooks),
		}
	}

	#[must_use]
	pub fn with_lookup_field(mut self, field: impl Into<String>) -> Self {
		self.lookup_field = Some(field.into());
		self
	}

	#[must_use]
	pub fn with_export_hooks(mut self, hooks: Arc<dyn ExportHooks>) -> Self {
		self.export_hooks = hooks;
		self
	}

	#[must_use]
	pub fn with_import_hooks(mut self, hooks: Arc<dyn ImportHooks>) -> Self {
		self.import_hooks = hooks;
		self
	}

	#[must_use]
	pub fn with_batch_hooks(mut self, hooks: Arc<dyn BatchHooks>) -> Self {
		self.batch_hooks = hooks;
		self
	}
}

/// Record flows keyed by record type, resolved once at startup.
pub struct SyncRegistry {
	flows: HashMap<RecordType, Arc<RecordFlow>>,
}

impl SyncRegistry {
	#[must_use]
	pub fn builder() -> SyncRegistryBuilder {
		SyncRegistryBuilder { flows: Vec::new() }
	}

	pub fn get(&self, record_type: &RecordType) -> Result<&Arc<RecordFlow>, Error> {
		self.flows
			.get(record_type)
			.ok_or_else(|| Error::UnknownRecordType(record_type.clone()))
	}

	pub fn record_types(&self) -> impl Iterator<Item = &RecordType> {
		self.flows.keys()
	}
}

pub struct SyncRegistryBuilder {
	flows: Vec<RecordFlow>,
}

impl SyncRegistryBuilder {
	#[must_use]
	pub fn flow(mut self, flow: RecordFlow) -> Self {
		self.flows.push(flow);
		self
	}

	/// Lookup-field identity cannot round-trip back into an import, so a
	/// lookup field on an importable flow is rejected here, at startup.
	pub fn build(self) -> Result<SyncRegistry, Error> {
		let mut flows = HashMap::new();

		for flow in self.flows {
			if flow.lookup_field.is_some() && flow.import_mapper.is_some() {
				return Err(Error::LookupImport(flow.record_type));
			}
			flows.insert(flow.record_type.clone(), Arc::new(flow));
		}

		Ok(SyncRegistry { flows })
	}
}
