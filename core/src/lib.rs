#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

//! Bidirectional record synchronization between a local system of record
//! and a remote CRM backend behind a rate-limited, token-authenticated
//! REST API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod backend;
pub mod batch;
pub mod binder;
pub mod context;
pub mod error;
pub mod export;
pub mod flows;
pub mod import;
pub mod job;
pub mod mapper;
pub mod oauth;
pub mod reference;
pub mod registry;
pub mod remote;
pub mod runtime;
pub mod store;

pub use backend::{with_retry_on_expiration, BackendConfig, BackendHandle, BackendRegistry};
pub use binder::{Binder, Binding, RecordType, RemoteId};
pub use context::{ExportOutcome, ImportOutcome, SyncContext};
pub use error::Error;
pub use registry::{RecordFlow, SyncRegistry};
pub use runtime::Runtime;

/// Identifier of a record in the host store.
pub type LocalId = Uuid;

/// Identifier of a configured backend connection.
pub type BackendId = Uuid;

/// Which way a synchronization moves data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
	Export,
	Import,
}
