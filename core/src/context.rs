use std::sync::Arc;

use futures::{future::BoxFuture, FutureExt};
use tokio::sync::Mutex;

use crate::{
	backend::BackendHandle,
	binder::{Binder, Binding, RecordType, RemoteId},
	error::Error,
	export::RecordExporter,
	import::RecordImporter,
	reference::{ReferenceData, REFERENCE},
	registry::{RecordFlow, SyncRegistry},
	remote::RemoteAdapter,
	store::{BindingStore, RecordStore},
	BackendId, Direction, LocalId,
};

/// Everything single-record synchronizers need for one backend: the backend
/// handle, the record-flow registry and the two storage boundaries.
#[derive(Clone)]
pub struct SyncContext {
	backend: Arc<BackendHandle>,
	registry: Arc<SyncRegistry>,
	records: Arc<dyn RecordStore>,
	bindings: Arc<dyn BindingStore>,
}

impl SyncContext {
	#[must_use]
	pub fn new(
		backend: Arc<BackendHandle>,
		registry: Arc<SyncRegistry>,
		records: Arc<dyn RecordStore>,
		bindings: Arc<dyn BindingStore>,
	) -> Self {
		Self {
			backend,
			registry,
			records,
			bindings,
		}
	}

	#[must_use]
	pub fn backend(&self) -> &Arc<BackendHandle> {
		&self.backend
	}

	#[must_use]
	pub fn backend_id(&self) -> BackendId {
		self.backend.id()
	}

	#[must_use]
	pub fn records(&self) -> &Arc<dyn RecordStore> {
		&self.records
	}

	#[must_use]
	pub fn bindings(&self) -> &Arc<dyn BindingStore> {
		&self.bindings
	}

	pub fn flow(&self, record_type: &RecordType) -> Result<Arc<RecordFlow>, Error> {
		self.registry.get(record_type).cloned()
	}

	#[must_use]
	pub fn binder(&self, record_type: &RecordType) -> Binder {
		Binder::new(
			self.backend.id(),
			record_type.clone(),
			Arc::clone(&self.bindings),
		)
	}

	#[must_use]
	pub fn adapter(&self, flow: &RecordFlow) -> RemoteAdapter {
		RemoteAdapter::new(Arc::clone(&self.backend), flow)
	}

	/// Export or deactivate one local record, depth-first through its
	/// dependencies.
	pub async fn export_record(
		&self,
		record_type: &RecordType,
		local_id: LocalId,
		force_deactivate: bool,
	) -> Result<ExportOutcome, Error> {
		Pass::new(self)
			.export(record_type, local_id, force_deactivate)
			.await
	}

	/// Import one remote record, depth-first through its dependencies.
	pub async fn import_record(
		&self,
		record_type: &RecordType,
		remote_id: &RemoteId,
	) -> Result<ImportOutcome, Error> {
		Pass::new(self).import(record_type, remote_id).await
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
	Exported(RemoteId),
	Deactivated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
	Created { local_id: LocalId },
	Updated { local_id: LocalId },
}

impl ImportOutcome {
	#[must_use]
	pub fn local_id(&self) -> LocalId {
		match self {
			Self::Created { local_id } | Self::Updated { local_id } => *local_id,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PassEntry {
	direction: Direction,
	record_type: RecordType,
	key: String,
}

/// One depth-first synchronization pass.
///
/// Tracks the chain of in-flight records so that a dependency that leads
/// back to a record already being synchronized is reported as a cycle
/// instead of recursing forever.
pub struct Pass<'ctx> {
	ctx: &'ctx SyncContext,
	stack: Mutex<Vec<PassEntry>>,
}

impl<'ctx> Pass<'ctx> {
	fn new(ctx: &'ctx SyncContext) -> Self {
		Self {
			ctx,
			stack: Mutex::new(Vec::new()),
		}
	}

	#[must_use]
	pub(crate) fn ctx(&self) -> &'ctx SyncContext {
		self.ctx
	}

	pub(crate) fn export(
		&self,
		record_type: &RecordType,
		local_id: LocalId,
		force_deactivate: bool,
	) -> BoxFuture<'_, Result<ExportOutcome, Error>> {
		let record_type = record_type.clone();

		async move {
			let flow = self.ctx.flow(&record_type)?;

			self.enter(Direction::Export, &record_type, local_id.to_string())
				.await?;
			let result = RecordExporter::new(self.ctx, &flow)
				.run(self, local_id, force_deactivate)
				.await;
			self.leave().await;

			result
		}
		.boxed()
	}

	pub(crate) fn import(
		&self,
		record_type: &RecordType,
		remote_id: &RemoteId,
	) -> BoxFuture<'_, Result<ImportOutcome, Error>> {
		let record_type = record_type.clone();
		let remote_id = remote_id.clone();

		async move {
			let flow = self.ctx.flow(&record_type)?;

			self.enter(Direction::Import, &record_type, remote_id.to_string())
				.await?;
			let result = RecordImporter::new(self.ctx, &flow)
				.run(self, &remote_id)
				.await;
			self.leave().await;

			result
		}
		.boxed()
	}

	async fn enter(
		&self,
		direction: Direction,
		record_type: &RecordType,
		key: String,
	) -> Result<(), Error> {
		let mut stack = self.stack.lock().await;

		let entry = PassEntry {
			direction,
			record_type: record_type.clone(),
			key,
		};

		if stack.contains(&entry) {
			let chain = stack
				.iter()
				.chain(std::iter::once(&entry))
				.map(|e| format!("{}:{}", e.record_type, e.key))
				.collect::<Vec<_>>()
				.join(" -> ");
			return Err(Error::DependencyCycle { chain });
		}

		stack.push(entry);

		Ok(())
	}

	async fn leave(&self) {
		self.stack.lock().await.pop();
	}
}

/// What a mapper gets to see: reference catalogs, binder lookups and
/// on-demand synchronization of dependent records.
pub struct MappingContext<'a> {
	pass: &'a Pass<'a>,
}

impl<'a> MappingContext<'a> {
	pub(crate) fn new(pass: &'a Pass<'a>) -> Self {
		Self { pass }
	}

	#[must_use]
	pub fn reference(&self) -> &'static ReferenceData {
		&REFERENCE
	}

	#[must_use]
	pub fn backend_id(&self) -> BackendId {
		self.pass.ctx().backend_id()
	}

	pub async fn to_remote(
		&self,
		record_type: &RecordType,
		local_id: LocalId,
	) -> Result<Option<RemoteId>, Error> {
		self.pass.ctx().binder(record_type).to_remote(local_id).await
	}

	pub async fn to_local(
		&self,
		record_type: &RecordType,
		remote_id: &RemoteId,
	) -> Result<Option<Binding>, Error> {
		self.pass.ctx().binder(record_type).to_local(remote_id).await
	}

	/// Remote id of a local dependency, exporting it on demand when it has
	/// never been bound.
	pub async fn require_remote(
		&self,
		record_type: &RecordType,
		local_id: LocalId,
	) -> Result<RemoteId, Error> {
		if let Some(remote_id) = self.to_remote(record_type, local_id).await? {
			return Ok(remote_id);
		}

		match self.pass.export(record_type, local_id, false).await {
			Ok(ExportOutcome::Exported(remote_id)) => Ok(remote_id),
			Ok(ExportOutcome::Deactivated) => Err(Error::DependencyNotResolved {
				record_type: record_type.clone(),
				reference: local_id.to_string(),
			}),
			Err(Error::UnknownRecordType(_) | Error::ExportUnsupported(_)) => {
				Err(Error::DependencyNotResolved {
					record_type: record_type.clone(),
					reference: local_id.to_string(),
				})
			}
			Err(e) => Err(e),
		}
	}

	/// Local id of a remote dependency, importing it on demand when it has
	/// never been bound.
	pub async fn require_local(
		&self,
		record_type: &RecordType,
		remote_id: &RemoteId,
	) -> Result<LocalId, Error> {
		if let Some(binding) = self.to_local(record_type, remote_id).await? {
			return Ok(binding.local_id);
		}

		match self.pass.import(record_type, remote_id).await {
			Ok(outcome) => Ok(outcome.local_id()),
			Err(Error::UnknownRecordType(_) | Error::ImportUnsupported(_)) => {
				Err(Error::DependencyNotResolved {
					record_type: record_type.clone(),
					reference: remote_id.to_string(),
				})
			}
			Err(e) => Err(e),
		}
	}
}
