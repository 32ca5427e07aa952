use std::{collections::HashMap, fmt, future::Future, sync::Arc};

use sb_cloud_api::auth::{ClientCredentials, OAuthToken};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::{error::Error, remote::RemoteConnector, BackendId};

/// Configuration of one authenticated backend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
	pub id: BackendId,
	pub name: String,
	/// Base URL for record operations.
	pub api_url: String,
	/// Base URL for the OAuth endpoints.
	pub login_url: String,
	pub credentials: ClientCredentials,
	/// Redirect URI registered with the backend for the OAuth callback.
	pub callback_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
	Unauthorized,
	Authorized,
	TokenExpired,
}

/// Runtime handle of one backend connection.
///
/// The handle owns the access token; the only paths that mutate it are
/// [`BackendHandle::authorize`] and the refresh performed by
/// [`with_retry_on_expiration`].
pub struct BackendHandle {
	config: BackendConfig,
	connector: Arc<dyn RemoteConnector>,
	authorization_code: RwLock<Option<String>>,
	token: RwLock<Option<OAuthToken>>,
	state: RwLock<AuthState>,
}

impl fmt::Debug for BackendHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BackendHandle")
			.field("id", &self.config.id)
			.field("name", &self.config.name)
			.finish()
	}
}

impl BackendHandle {
	pub fn new(config: BackendConfig, connector: Arc<dyn RemoteConnector>) -> Arc<Self> {
		Arc::new(Self {
			config,
			connector,
			authorization_code: RwLock::new(None),
			token: RwLock::new(None),
			state: RwLock::new(AuthState::Unauthorized),
		})
	}

	#[must_use]
	pub fn id(&self) -> BackendId {
		self.config.id
	}

	#[must_use]
	pub fn name(&self) -> &str {
		&self.config.name
	}

	#[must_use]
	pub fn config(&self) -> &BackendConfig {
		&self.config
	}

	#[must_use]
	pub fn connector(&self) -> &Arc<dyn RemoteConnector> {
		&self.connector
	}

	pub async fn auth_state(&self) -> AuthState {
		*self.state.read().await
	}

	/// Current access token; remote calls must only be attempted with one.
	pub async fn access_token(&self) -> Result<OAuthToken, Error> {
		self.token.read().await.clone().ok_or(Error::Unauthorized)
	}

	/// Store a freshly received authorization code and immediately trade it
	/// for a token; codes expire within minutes of being issued.
	#[instrument(skip_all, fields(backend_id = %self.config.id), err)]
	pub async fn authorize(&self, code: &str) -> Result<(), Error> {
		*self.authorization_code.write().await = Some(code.to_string());

		let token = self
			.connector
			.exchange_token(&self.config.credentials, code, &self.config.callback_url)
			.await?;

		*self.token.write().await = Some(token);
		*self.state.write().await = AuthState::Authorized;

		debug!("Backend authorized;");

		Ok(())
	}

	pub(crate) async fn mark_expired(&self) {
		*self.state.write().await = AuthState::TokenExpired;
	}

	/// Swap the stored token for a fresh one.
	///
	/// The write lock is held across the token-endpoint call, so racing
	/// refreshes serialize: the second caller waits, then redundantly
	/// re-authenticates against an already-fresh token. Nobody ever observes
	/// a half-written token.
	pub(crate) async fn refresh_token(&self) -> Result<(), Error> {
		let mut guard = self.token.write().await;

		let current = guard.clone().ok_or(Error::Unauthorized)?;
		let refresh_token = current.refresh_token.ok_or(Error::Unauthorized)?;

		let fresh = self
			.connector
			.refresh_token(&self.config.credentials, &refresh_token)
			.await?;

		*guard = Some(fresh);
		drop(guard);

		*self.state.write().await = AuthState::Authorized;

		Ok(())
	}
}

/// Invoke `op`; on the session-expired signal, refresh the backend token
/// exactly once and replay `op` exactly once. Any failure of the replay,
/// a second expiration included, propagates unmodified.
///
/// This bounds retries to one cycle per external call, so permanently
/// invalid credentials fail fast instead of looping.
pub async fn with_retry_on_expiration<T, F, Fut>(
	backend: &BackendHandle,
	mut op: F,
) -> Result<T, Error>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, Error>>,
{
	match op().await {
		Err(e) if e.is_session_expired() => {
			backend.mark_expired().await;
			warn!(
				backend_id = %backend.id(),
				"Session expired; refreshing token and retrying once;"
			);
			backend.refresh_token().await?;
			op().await
		}
		result => result,
	}
}

/// All configured backends, keyed by id.
#[derive(Default)]
pub struct BackendRegistry {
	backends: RwLock<HashMap<BackendId, Arc<BackendHandle>>>,
}

impl BackendRegistry {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn register(&self, handle: Arc<BackendHandle>) {
		self.backends.write().await.insert(handle.id(), handle);
	}

	pub async fn get(&self, backend_id: BackendId) -> Result<Arc<BackendHandle>, Error> {
		self.backends
			.read()
			.await
			.get(&backend_id)
			.cloned()
			.ok_or(Error::BackendNotFound(backend_id))
	}
}
