use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use crate::{
	binder::{Binder, Binding, RemoteId},
	context::{ImportOutcome, MappingContext, Pass, SyncContext},
	error::Error,
	registry::RecordFlow,
	remote::RemoteAdapter,
};

/// Extension points bracketing a single-record import; no-op by default.
#[async_trait]
pub trait ImportHooks: Send + Sync {
	/// Runs after the remote record is fetched and before it is mapped.
	/// The place to make sure dependent records exist locally.
	async fn before_import(
		&self,
		_ctx: &MappingContext<'_>,
		_remote_record: &Value,
	) -> Result<(), Error> {
		Ok(())
	}

	async fn after_import(&self, _binding: &Binding) -> Result<(), Error> {
		Ok(())
	}
}

pub struct NoopImportHooks;

impl ImportHooks for NoopImportHooks {}

/// Imports one remote record into the local store.
pub(crate) struct RecordImporter<'a> {
	ctx: &'a SyncContext,
	flow: &'a RecordFlow,
	adapter: RemoteAdapter,
	binder: Binder,
}

impl<'a> RecordImporter<'a> {
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
		fields(record_type = %self.flow.record_type, remote_id = %remote_id),
		err,
	)]
	pub(crate) async fn run(
		&self,
		pass: &Pass<'_>,
		remote_id: &RemoteId,
	) -> Result<ImportOutcome, Error> {
		let mapper = self
			.flow
			.import_mapper
			.as_ref()
			.ok_or_else(|| Error::ImportUnsupported(self.flow.record_type.clone()))?;

		let remote_record = self.adapter.get(remote_id).await?;

		let mapping_ctx = MappingContext::new(pass);

		self.flow
			.import_hooks
			.before_import(&mapping_ctx, &remote_record)
			.await?;

		let data = mapper.map(&mapping_ctx, &remote_record).await?;

		let outcome = match self.binder.to_local(remote_id).await? {
			Some(binding) => {
				self.ctx
					.records()
					.update(&self.flow.record_type, binding.local_id, data.for_update())
					.await?;

				ImportOutcome::Updated {
					local_id: binding.local_id,
				}
			}
			None => {
				let local_id = self
					.ctx
					.records()
					.create(&self.flow.record_type, data.for_create())
					.await?;

				self.ctx
					.bindings()
					.insert(Binding::new(
						self.ctx.backend_id(),
						self.flow.record_type.clone(),
						local_id,
					))
					.await?;

				ImportOutcome::Created { local_id }
			}
		};

		self.binder.bind(remote_id.clone(), outcome.local_id()).await?;

		let binding = self
			.binder
			.binding(outcome.local_id())
			.await?
			.ok_or_else(|| Error::BindingNotFound {
				record_type: self.flow.record_type.clone(),
				local_id: outcome.local_id(),
			})?;
		self.flow.import_hooks.after_import(&binding).await?;

		Ok(outcome)
	}
}
