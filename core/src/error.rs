use crate::{
	binder::{RecordType, RemoteId},
	store::StoreError,
	BackendId, LocalId,
};

/// Failure taxonomy of the synchronization engine.
///
/// Every variant propagates unchanged out of the single-record
/// exporter/importer; only the session-expired signal is ever retried, and
/// only once per call chain.
#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("binding not found: <record_type='{record_type}', local_id={local_id}>")]
	BindingNotFound {
		record_type: RecordType,
		local_id: LocalId,
	},
	#[error("mapping failed for field '{field}': {reason}")]
	Mapping { field: String, reason: String },
	#[error(
		"dependency not resolved: <record_type='{record_type}', reference='{reference}'>"
	)]
	DependencyNotResolved {
		record_type: RecordType,
		reference: String,
	},
	#[error("dependency cycle detected: {chain}")]
	DependencyCycle { chain: String },
	#[error("validation failed: {0}")]
	Validation(String),
	#[error("record type '{0}' is not registered")]
	UnknownRecordType(RecordType),
	#[error("record type '{0}' does not support export")]
	ExportUnsupported(RecordType),
	#[error("record type '{0}' does not support import")]
	ImportUnsupported(RecordType),
	#[error("record type '{0}' uses a lookup field and cannot be imported")]
	LookupImport(RecordType),
	#[error("no lookup field configured for remote object '{0}'")]
	LookupFieldUnset(String),
	#[error("remote record not found: <remote_id='{0}'>")]
	RemoteRecordNotFound(RemoteId),
	#[error("backend not found: <backend_id={0}>")]
	BackendNotFound(BackendId),
	#[error("backend is not authorized")]
	Unauthorized,
	#[error("oauth callback failed: {0}")]
	Callback(String),
	#[error("job target does not match its direction")]
	MalformedJob,
	#[error(transparent)]
	Api(#[from] sb_cloud_api::Error),
	#[error(transparent)]
	Store(#[from] StoreError),
}

impl Error {
	/// Whether this failure is the session-expired signal that entitles the
	/// caller to one token refresh and one replay.
	#[must_use]
	pub fn is_session_expired(&self) -> bool {
		matches!(self, Self::Api(e) if e.is_session_expired())
	}
}
