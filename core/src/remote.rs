use std::sync::Arc;

use sb_cloud_api::{
	auth::{ClientCredentials, OAuthToken},
	RequestConfig,
};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
	backend::{with_retry_on_expiration, BackendHandle},
	binder::RemoteId,
	error::Error,
	registry::RecordFlow,
};

/// Seam to the remote service.
///
/// Implemented over the REST client for production and by scripted fakes in
/// tests; everything above this trait is transport-agnostic.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
	async fn exists(
		&self,
		token: &OAuthToken,
		object: &str,
		id: &str,
	) -> Result<bool, sb_cloud_api::Error>;

	async fn get(
		&self,
		token: &OAuthToken,
		object: &str,
		id: &str,
	) -> Result<Value, sb_cloud_api::Error>;

	async fn create(
		&self,
		token: &OAuthToken,
		object: &str,
		data: &Value,
	) -> Result<String, sb_cloud_api::Error>;

	async fn update(
		&self,
		token: &OAuthToken,
		object: &str,
		id: &str,
		data: &Value,
	) -> Result<(), sb_cloud_api::Error>;

	async fn upsert_by(
		&self,
		token: &OAuthToken,
		object: &str,
		field: &str,
		value: &str,
		data: &Value,
	) -> Result<String, sb_cloud_api::Error>;

	async fn delete(
		&self,
		token: &OAuthToken,
		object: &str,
		id: &str,
	) -> Result<(), sb_cloud_api::Error>;

	async fn exchange_token(
		&self,
		credentials: &ClientCredentials,
		code: &str,
		redirect_uri: &str,
	) -> Result<OAuthToken, sb_cloud_api::Error>;

	async fn refresh_token(
		&self,
		credentials: &ClientCredentials,
		refresh_token: &str,
	) -> Result<OAuthToken, sb_cloud_api::Error>;
}

/// [`RemoteConnector`] over the backend's REST API.
pub struct RestConnector {
	client: reqwest::Client,
	api_url: String,
	login_url: String,
}

impl RestConnector {
	#[must_use]
	pub fn new(api_url: impl Into<String>, login_url: impl Into<String>) -> Self {
		Self {
			client: reqwest::Client::new(),
			api_url: api_url.into(),
			login_url: login_url.into(),
		}
	}

	fn config(&self, token: &OAuthToken) -> RequestConfig {
		RequestConfig {
			client: self.client.clone(),
			api_url: self.api_url.clone(),
			auth_token: Some(token.clone()),
		}
	}
}

#[async_trait]
impl RemoteConnector for RestConnector {
	async fn exists(
		&self,
		token: &OAuthToken,
		object: &str,
		id: &str,
	) -> Result<bool, sb_cloud_api::Error> {
		sb_cloud_api::record::exists(self.config(token), object, id).await
	}

	async fn get(
		&self,
		token: &OAuthToken,
		object: &str,
		id: &str,
	) -> Result<Value, sb_cloud_api::Error> {
		sb_cloud_api::record::get(self.config(token), object, id).await
	}

	async fn create(
		&self,
		token: &OAuthToken,
		object: &str,
		data: &Value,
	) -> Result<String, sb_cloud_api::Error> {
		sb_cloud_api::record::create(self.config(token), object, data)
			.await
			.map(|created| created.id)
	}

	async fn update(
		&self,
		token: &OAuthToken,
		object: &str,
		id: &str,
		data: &Value,
	) -> Result<(), sb_cloud_api::Error> {
		sb_cloud_api::record::update(self.config(token), object, id, data).await
	}

	async fn upsert_by(
		&self,
		token: &OAuthToken,
		object: &str,
		field: &str,
		value: &str,
		data: &Value,
	) -> Result<String, sb_cloud_api::Error> {
		sb_cloud_api::record::upsert_by(self.config(token), object, field, value, data)
			.await
			.map(|upserted| upserted.id)
	}

	async fn delete(
		&self,
		token: &OAuthToken,
		object: &str,
		id: &str,
	) -> Result<(), sb_cloud_api::Error> {
		sb_cloud_api::record::delete(self.config(token), object, id).await
	}

	async fn exchange_token(
		&self,
		credentials: &ClientCredentials,
		code: &str,
		redirect_uri: &str,
	) -> Result<OAuthToken, sb_cloud_api::Error> {
		sb_cloud_api::auth::exchange(&self.client, &self.login_url, credentials, code, redirect_uri)
			.await
	}

	async fn refresh_token(
		&self,
		credentials: &ClientCredentials,
		refresh_token: &str,
	) -> Result<OAuthToken, sb_cloud_api::Error> {
		sb_cloud_api::auth::refresh(&self.client, &self.login_url, credentials, refresh_token).await
	}
}

/// Identifier handed to [`RemoteAdapter::upsert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertTarget {
	/// Update the record behind this remote id.
	Remote(RemoteId),
	/// Let the backend resolve identity by the adapter's lookup field.
	Lookup(String),
}

/// Remote operations of one record type, each threaded through the
/// retry-on-expiration wrapper.
pub struct RemoteAdapter {
	backend: Arc<BackendHandle>,
	object: String,
	lookup_field: Option<String>,
}

impl RemoteAdapter {
	#[must_use]
	pub fn new(backend: Arc<BackendHandle>, flow: &RecordFlow) -> Self {
		Self {
			backend,
			object: flow.object.clone(),
			lookup_field: flow.lookup_field.clone(),
		}
	}

	#[must_use]
	pub fn lookup_field(&self) -> Option<&str> {
		self.lookup_field.as_deref()
	}

	pub async fn exists(&self, id: &RemoteId) -> Result<bool, Error> {
		with_retry_on_expiration(&self.backend, || {
			let backend = Arc::clone(&self.backend);
			let object = self.object.clone();
			let id = id.clone();
			async move {
				let token = backend.access_token().await?;
				backend
					.connector()
					.exists(&token, &object, id.as_str())
					.await
					.map_err(Error::from)
			}
		})
		.await
	}

	pub async fn get(&self, id: &RemoteId) -> Result<Value, Error> {
		with_retry_on_expiration(&self.backend, || {
			let backend = Arc::clone(&self.backend);
			let object = self.object.clone();
			let id = id.clone();
			async move {
				let token = backend.access_token().await?;
				backend
					.connector()
					.get(&token, &object, id.as_str())
					.await
					.map_err(Error::from)
			}
		})
		.await
	}

	/// Create-or-update. `None` creates; an existing remote id updates; a
	/// lookup value defers identity resolution to the backend.
	pub async fn upsert(
		&self,
		target: Option<UpsertTarget>,
		data: &Value,
	) -> Result<RemoteId, Error> {
		match target {
			None => {
				with_retry_on_expiration(&self.backend, || {
					let backend = Arc::clone(&self.backend);
					let object = self.object.clone();
					let data = data.clone();
					async move {
						let token = backend.access_token().await?;
						backend
							.connector()
							.create(&token, &object, &data)
							.await
							.map(RemoteId::new)
							.map_err(Error::from)
					}
				})
				.await
			}
			Some(UpsertTarget::Remote(id)) => {
				with_retry_on_expiration(&self.backend, || {
					let backend = Arc::clone(&self.backend);
					let object = self.object.clone();
					let id = id.clone();
					let data = data.clone();
					async move {
						let token = backend.access_token().await?;
						backend
							.connector()
							.update(&token, &object, id.as_str(), &data)
							.await
							.map_err(Error::from)
					}
				})
				.await?;

				Ok(id)
			}
			Some(UpsertTarget::Lookup(value)) => {
				let field = self
					.lookup_field
					.clone()
					.ok_or_else(|| Error::LookupFieldUnset(self.object.clone()))?;

				with_retry_on_expiration(&self.backend, || {
					let backend = Arc::clone(&self.backend);
					let object = self.object.clone();
					let field = field.clone();
					let value = value.clone();
					let data = data.clone();
					async move {
						let token = backend.access_token().await?;
						backend
							.connector()
							.upsert_by(&token, &object, &field, &value, &data)
							.await
							.map(RemoteId::new)
							.map_err(Error::from)
					}
				})
				.await
			}
		}
	}

	pub async fn delete(&self, id: &RemoteId) -> Result<(), Error> {
		with_retry_on_expiration(&self.backend, || {
			let backend = Arc::clone(&self.backend);
			let object = self.object.clone();
			let id = id.clone();
			async move {
				let token = backend.access_token().await?;
				backend
					.connector()
					.delete(&token, &object, id.as_str())
					.await
					.map_err(Error::from)
			}
		})
		.await
	}
}
