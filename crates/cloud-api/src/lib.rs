pub mod auth;

use auth::OAuthToken;
use reqwest::{header, StatusCode};
use serde::Deserialize;
use serde_json::Value;

/// Everything needed to issue one authenticated request against a backend.
///
/// A config is built per call so that a retried call picks up the freshly
/// refreshed token instead of the one that just expired.
pub struct RequestConfig {
	pub client: reqwest::Client,
	pub api_url: String,
	pub auth_token: Option<OAuthToken>,
}

trait WithAuth {
	fn with_auth(self, token: &OAuthToken) -> Self;
}

impl WithAuth for reqwest::RequestBuilder {
	fn with_auth(self, token: &OAuthToken) -> Self {
		self.header(
			header::AUTHORIZATION,
			format!("{} {}", token.token_type, token.access_token),
		)
	}
}

/// Error code the backend uses to flag an expired session on a 401 response.
///
/// This is the only signal that may trigger a token refresh; every other
/// failure is terminal for the attempt.
const SESSION_EXPIRED_CODE: &str = "session_expired";

#[derive(Deserialize, Debug, Default)]
struct ErrorBody {
	#[serde(default)]
	code: String,
	#[serde(default)]
	message: String,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("authentication required")]
	Unauthenticated,
	#[error("session expired: {message}")]
	SessionExpired { message: String },
	#[error("not found: <url='{url}'>")]
	NotFound { url: String },
	#[error("rate limited by the backend")]
	RateLimited { retry_after: Option<u64> },
	#[error("api error <status={status}>: {message}")]
	Api { status: u16, message: String },
	#[error("transport error: {0}")]
	Transport(#[from] reqwest::Error),
}

impl Error {
	#[must_use]
	pub fn is_session_expired(&self) -> bool {
		matches!(self, Self::SessionExpired { .. })
	}
}

/// Turn a non-success response into the matching [`Error`] variant.
async fn digest(response: reqwest::Response) -> Result<reqwest::Response, Error> {
	let status = response.status();
	if status.is_success() {
		return Ok(response);
	}

	match status {
		StatusCode::NOT_FOUND => Err(Error::NotFound {
			url: response.url().to_string(),
		}),
		StatusCode::TOO_MANY_REQUESTS => Err(Error::RateLimited {
			retry_after: response
				.headers()
				.get(header::RETRY_AFTER)
				.and_then(|value| value.to_str().ok())
				.and_then(|value| value.parse().ok()),
		}),
		StatusCode::UNAUTHORIZED => {
			let body = response.json::<ErrorBody>().await.unwrap_or_default();
			if body.code == SESSION_EXPIRED_CODE {
				Err(Error::SessionExpired {
					message: body.message,
				})
			} else {
				Err(Error::Api {
					status: status.as_u16(),
					message: body.message,
				})
			}
		}
		_ => Err(Error::Api {
			status: status.as_u16(),
			message: response.text().await.unwrap_or_default(),
		}),
	}
}

pub mod record {
	use super::*;

	pub use get::exec as get;
	pub mod get {
		use super::*;

		pub async fn exec(config: RequestConfig, object: &str, id: &str) -> Result<Value, Error> {
			let Some(auth_token) = config.auth_token else {
				return Err(Error::Unauthenticated);
			};

			let response = config
				.client
				.get(format!("{}/api/v1/objects/{object}/{id}", config.api_url))
				.with_auth(&auth_token)
				.send()
				.await?;

			digest(response).await?.json().await.map_err(Error::from)
		}
	}

	pub use exists::exec as exists;
	pub mod exists {
		use super::*;

		pub async fn exec(config: RequestConfig, object: &str, id: &str) -> Result<bool, Error> {
			let Some(auth_token) = config.auth_token else {
				return Err(Error::Unauthenticated);
			};

			let response = config
				.client
				.head(format!("{}/api/v1/objects/{object}/{id}", config.api_url))
				.with_auth(&auth_token)
				.send()
				.await?;

			match digest(response).await {
				Ok(_) => Ok(true),
				Err(Error::NotFound { .. }) => Ok(false),
				Err(e) => Err(e),
			}
		}
	}

	pub use create::exec as create;
	pub mod create {
		use super::*;

		#[derive(Deserialize, Debug)]
		pub struct Created {
			pub id: String,
		}

		pub async fn exec(
			config: RequestConfig,
			object: &str,
			data: &Value,
		) -> Result<Created, Error> {
			let Some(auth_token) = config.auth_token else {
				return Err(Error::Unauthenticated);
			};

			let response = config
				.client
				.post(format!("{}/api/v1/objects/{object}", config.api_url))
				.json(data)
				.with_auth(&auth_token)
				.send()
				.await?;

			digest(response).await?.json().await.map_err(Error::from)
		}
	}

	pub use update::exec as update;
	pub mod update {
		use super::*;

		pub async fn exec(
			config: RequestConfig,
			object: &str,
			id: &str,
			data: &Value,
		) -> Result<(), Error> {
			let Some(auth_token) = config.auth_token else {
				return Err(Error::Unauthenticated);
			};

			let response = config
				.client
				.patch(format!("{}/api/v1/objects/{object}/{id}", config.api_url))
				.json(data)
				.with_auth(&auth_token)
				.send()
				.await?;

			digest(response).await.map(|_| ())
		}
	}

	pub use upsert_by::exec as upsert_by;
	pub mod upsert_by {
		use super::*;

		#[derive(Deserialize, Debug)]
		pub struct Upserted {
			pub id: String,
			#[serde(default)]
			pub created: bool,
		}

		/// Create-or-update keyed by an external lookup field; the backend
		/// resolves identity by the field value itself.
		pub async fn exec(
			config: RequestConfig,
			object: &str,
			field: &str,
			value: &str,
			data: &Value,
		) -> Result<Upserted, Error> {
			let Some(auth_token) = config.auth_token else {
				return Err(Error::Unauthenticated);
			};

			let response = config
				.client
				.patch(format!(
					"{}/api/v1/objects/{object}/by/{field}/{value}",
					config.api_url
				))
				.json(data)
				.with_auth(&auth_token)
				.send()
				.await?;

			digest(response).await?.json().await.map_err(Error::from)
		}
	}

	pub use delete::exec as delete;
	pub mod delete {
		use super::*;

		/// Soft-delete on the backend side; deleted records land in the
		/// backend's recycle bin and keep their identifier.
		pub async fn exec(config: RequestConfig, object: &str, id: &str) -> Result<(), Error> {
			let Some(auth_token) = config.auth_token else {
				return Err(Error::Unauthenticated);
			};

			let response = config
				.client
				.delete(format!("{}/api/v1/objects/{object}/{id}", config.api_url))
				.with_auth(&auth_token)
				.send()
				.await?;

			digest(response).await.map(|_| ())
		}
	}
}
