use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
	backend::{with_retry_on_expiration, BackendRegistry},
	batch::{self, BatchReport},
	binder::RecordType,
	context::SyncContext,
	error::Error,
	job::{Jobs, SyncJob},
	registry::SyncRegistry,
	store::{BindingStore, RecordStore},
	BackendId, LocalId,
};

/// Top-level handle wiring the record-flow registry, the configured
/// backends, the two storage boundaries and the job queue.
pub struct Runtime {
	registry: Arc<SyncRegistry>,
	backends: BackendRegistry,
	records: Arc<dyn RecordStore>,
	bindings: Arc<dyn BindingStore>,
	jobs: Arc<Jobs>,
}

impl Runtime {
	pub fn new(
		registry: SyncRegistry,
		records: Arc<dyn RecordStore>,
		bindings: Arc<dyn BindingStore>,
	) -> Arc<Self> {
		let (jobs, actor) = Jobs::new();

		let this = Arc::new(Self {
			registry: Arc::new(registry),
			backends: BackendRegistry::new(),
			records,
			bindings,
			jobs,
		});

		actor.start(Arc::clone(&this));

		this
	}

	#[must_use]
	pub fn backends(&self) -> &BackendRegistry {
		&self.backends
	}

	#[must_use]
	pub fn jobs(&self) -> &Arc<Jobs> {
		&self.jobs
	}

	#[must_use]
	pub fn registry(&self) -> &Arc<SyncRegistry> {
		&self.registry
	}

	/// Synchronization context for one configured backend.
	pub async fn context(&self, backend_id: BackendId) -> Result<SyncContext, Error> {
		let backend = self.backends.get(backend_id).await?;

		Ok(SyncContext::new(
			backend,
			Arc::clone(&self.registry),
			Arc::clone(&self.records),
			Arc::clone(&self.bindings),
		))
	}

	/// Export every stale binding of the record type inline.
	///
	/// Wrapped in the retry-on-expiration cycle at this outer boundary, so
	/// the whole run is replayed at most once on an expiration that escapes
	/// the per-call retries.
	pub async fn export(
		&self,
		backend_id: BackendId,
		record_type: &RecordType,
		cutoff: Option<DateTime<Utc>>,
	) -> Result<BatchReport, Error> {
		let backend = self.backends.get(backend_id).await?;

		with_retry_on_expiration(&backend, || {
			let ctx = SyncContext::new(
				Arc::clone(&backend),
				Arc::clone(&self.registry),
				Arc::clone(&self.records),
				Arc::clone(&self.bindings),
			);
			let record_type = record_type.clone();
			async move { batch::export_direct(&ctx, &record_type, cutoff).await }
		})
		.await
	}

	/// Submit one deferred export job per stale binding of the record type.
	pub async fn export_deferred(
		&self,
		backend_id: BackendId,
		record_type: &RecordType,
		cutoff: Option<DateTime<Utc>>,
	) -> Result<usize, Error> {
		let backend = self.backends.get(backend_id).await?;

		with_retry_on_expiration(&backend, || {
			let ctx = SyncContext::new(
				Arc::clone(&backend),
				Arc::clone(&self.registry),
				Arc::clone(&self.records),
				Arc::clone(&self.bindings),
			);
			let record_type = record_type.clone();
			async move { batch::export_deferred(&ctx, &self.jobs, &record_type, cutoff).await }
		})
		.await
	}

	/// Re-import every stale, previously imported binding inline.
	pub async fn import(
		&self,
		backend_id: BackendId,
		record_type: &RecordType,
		cutoff: Option<DateTime<Utc>>,
	) -> Result<BatchReport, Error> {
		let backend = self.backends.get(backend_id).await?;

		with_retry_on_expiration(&backend, || {
			let ctx = SyncContext::new(
				Arc::clone(&backend),
				Arc::clone(&self.registry),
				Arc::clone(&self.records),
				Arc::clone(&self.bindings),
			);
			let record_type = record_type.clone();
			async move { batch::import_direct(&ctx, &record_type, cutoff).await }
		})
		.await
	}

	/// Submit one deferred import job per stale, previously imported binding.
	pub async fn import_deferred(
		&self,
		backend_id: BackendId,
		record_type: &RecordType,
		cutoff: Option<DateTime<Utc>>,
	) -> Result<usize, Error> {
		let backend = self.backends.get(backend_id).await?;

		with_retry_on_expiration(&backend, || {
			let ctx = SyncContext::new(
				Arc::clone(&backend),
				Arc::clone(&self.registry),
				Arc::clone(&self.records),
				Arc::clone(&self.bindings),
			);
			let record_type = record_type.clone();
			async move { batch::import_deferred(&ctx, &self.jobs, &record_type, cutoff).await }
		})
		.await
	}

	/// Enqueue a deferred deactivation without consulting the record's
	/// active flag.
	pub async fn deactivate_deferred(
		&self,
		backend_id: BackendId,
		record_type: &RecordType,
		local_id: LocalId,
	) -> Result<(), Error> {
		// fail early on an unknown backend instead of in the worker
		self.backends.get(backend_id).await?;

		self.jobs
			.enqueue(SyncJob::deactivate(
				backend_id,
				record_type.clone(),
				local_id,
			))
			.await;

		Ok(())
	}
}
