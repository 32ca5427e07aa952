use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{digest, Error};

/// Access token as returned by the backend token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthToken {
	pub access_token: String,
	pub token_type: String,
	#[serde(default)]
	pub refresh_token: Option<String>,
	/// Lifetime in seconds as reported by the backend. Informational only;
	/// expiry is always detected from a response, never predicted.
	#[serde(default)]
	pub expires_in: Option<u64>,
	/// Stamped on receipt, not reported by the backend.
	#[serde(default = "Utc::now")]
	pub issued_at: DateTime<Utc>,
}

/// OAuth client credentials of one backend connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientCredentials {
	pub client_id: String,
	pub client_secret: String,
}

pub use exchange::exec as exchange;
pub mod exchange {
	use super::*;

	/// Exchange a freshly received authorization code for a token. Codes
	/// expire quickly, so this is called right from the OAuth callback.
	pub async fn exec(
		client: &reqwest::Client,
		login_url: &str,
		credentials: &ClientCredentials,
		code: &str,
		redirect_uri: &str,
	) -> Result<OAuthToken, Error> {
		let response = client
			.post(format!("{login_url}/api/v1/oauth/token"))
			.json(&json!({
				"grant_type": "authorization_code",
				"code": code,
				"client_id": credentials.client_id,
				"client_secret": credentials.client_secret,
				"redirect_uri": redirect_uri,
			}))
			.send()
			.await?;

		let token = digest(response)
			.await?
			.json::<OAuthToken>()
			.await
			.map_err(Error::from)?;

		debug!(issued_at = %token.issued_at, "Exchanged authorization code for token;");

		Ok(token)
	}
}

pub use refresh::exec as refresh;
pub mod refresh {
	use super::*;

	/// Trade a refresh token for a new access token.
	pub async fn exec(
		client: &reqwest::Client,
		login_url: &str,
		credentials: &ClientCredentials,
		refresh_token: &str,
	) -> Result<OAuthToken, Error> {
		let response = client
			.post(format!("{login_url}/api/v1/oauth/token"))
			.json(&json!({
				"grant_type": "refresh_token",
				"refresh_token": refresh_token,
				"client_id": credentials.client_id,
				"client_secret": credentials.client_secret,
			}))
			.send()
			.await?;

		let mut token = digest(response)
			.await?
			.json::<OAuthToken>()
			.await
			.map_err(Error::from)?;

		// Backends commonly omit the refresh token on refresh responses.
		if token.refresh_token.is_none() {
			token.refresh_token = Some(refresh_token.to_string());
		}

		debug!(issued_at = %token.issued_at, "Refreshed access token;");

		Ok(token)
	}
}
