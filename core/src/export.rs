use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
	binder::{Binder, Binding, RemoteId},
	context::{ExportOutcome, MappingContext, Pass, SyncContext},
	error::Error,
	mapper::MappedData,
	registry::RecordFlow,
	remote::{RemoteAdapter, UpsertTarget},
	store::{LocalRecord, StoreError},
	LocalId,
};

/// Extension points bracketing a single-record export. Every default is a
/// no-op; flows inject an implementation instead of subclassing anything.
#[async_trait]
pub trait ExportHooks: Send + Sync {
	async fn before_export(
		&self,
		_ctx: &MappingContext<'_>,
		_binding: &Binding,
		_record: &LocalRecord,
	) -> Result<(), Error> {
		Ok(())
	}

	/// Pre-flight check of the mapped data, raised before any remote call.
	async fn validate(&self, _data: &MappedData) -> Result<(), Error> {
		Ok(())
	}

	async fn after_export(&self, _binding: &Binding, _remote_id: &RemoteId) -> Result<(), Error> {
		Ok(())
	}

	/// Whether the record must be deactivated remotely instead of exported.
	/// Record models without an active flag never deactivate.
	fn to_deactivate(&self, record: &LocalRecord) -> bool {
		record.active() == Some(false)
	}
}

pub struct NoopExportHooks;

impl ExportHooks for NoopExportHooks {}

/// Exports or deactivates one local record on the remote backend.
pub(crate) struct RecordExporter<'a> {
	ctx: &'a SyncContext,
	flow: &'a RecordFlow,
	adapter: RemoteAdapter,
	binder: Binder,
}

impl<'a> RecordExporter<'a> {
	pub(crate) fn new(ctx: &'a SyncContext, flow: &'a RecordFlow) -> Self {
		Self {
			ctx,
			flow,
			adapter: ctx.adapter(flow),
			binder: ctx.binder(&flow.record_type),
		}
	}

	#[instrument(
		skip_all,
		fields(record_type = %self.flow.record_type, local_id = %local_id, force_deactivate = force_deactivate),
		err,
	)]
	pub(crate) async fn run(
		&self,
		pass: &Pass<'_>,
		local_id: LocalId,
		force_deactivate: bool,
	) -> Result<ExportOutcome, Error> {
		let Some(binding) = self.binder.binding(local_id).await? else {
			// deactivating a record that was never bound is a logic error
			// upstream, not something to paper over here
			return Err(Error::BindingNotFound {
				record_type: self.flow.record_type.clone(),
				local_id,
			});
		};

		let record = self.ctx.records().fetch(&self.flow.record_type, local_id).await?;

		let hooks = &self.flow.export_hooks;

		if force_deactivate
			|| record
				.as_ref()
				.is_some_and(|record| hooks.to_deactivate(record))
		{
			self.deactivate(&binding).await?;
			return Ok(ExportOutcome::Deactivated);
		}

		let Some(record) = record else {
			return Err(Error::Store(StoreError::RecordNotFound {
				record_type: self.flow.record_type.clone(),
				local_id,
			}));
		};

		let mapper = self
			.flow
			.export_mapper
			.as_ref()
			.ok_or_else(|| Error::ExportUnsupported(self.flow.record_type.clone()))?;

		let mapping_ctx = MappingContext::new(pass);

		hooks.before_export(&mapping_ctx, &binding, &record).await?;

		// the upsert identifier: an existing remote id means update, a
		// lookup value defers identity to the backend, none means create
		let target = if let Some(remote_id) = binding.remote_id.clone() {
			Some(UpsertTarget::Remote(remote_id))
		} else if self.adapter.lookup_field().is_some() {
			Some(UpsertTarget::Lookup(local_id.to_string()))
		} else {
			None
		};
		let updating = matches!(target, Some(UpsertTarget::Remote(_)));

		let data = mapper.map(&mapping_ctx, &record).await?;
		hooks.validate(&data).await?;

		let payload = if updating {
			data.for_update()
		} else {
			data.for_create()
		};

		let remote_id = self.adapter.upsert(target, &Value::Object(payload)).await?;
		self.binder.bind(remote_id.clone(), local_id).await?;

		hooks.after_export(&binding, &remote_id).await?;

		Ok(ExportOutcome::Exported(remote_id))
	}

	/// Deactivation never touches identity: the binding keeps its remote id
	/// and the remote record moves to the backend's recycle bin.
	async fn deactivate(&self, binding: &Binding) -> Result<(), Error> {
		let Some(remote_id) = &binding.remote_id else {
			debug!(local_id = %binding.local_id, "Binding was never exported; nothing to deactivate;");
			return Ok(());
		};

		if self.adapter.exists(remote_id).await? {
			self.adapter.delete(remote_id).await?;
		}

		Ok(())
	}
}
