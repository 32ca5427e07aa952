use base64::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::{
	backend::{BackendConfig, BackendRegistry},
	error::Error,
	BackendId,
};

/// Query parameters the OAuth redirect lands with.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
	pub code: Option<String>,
	pub state: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CallbackState {
	backend_id: BackendId,
	dbname: String,
}

/// Opaque state blob threaded through the authorization redirect.
#[must_use]
pub fn encode_state(backend_id: BackendId, dbname: &str) -> String {
	BASE64_URL_SAFE_NO_PAD.encode(
		json!({
			"backend_id": backend_id,
			"dbname": dbname,
		})
		.to_string(),
	)
}

fn decode_state(state: &str) -> Result<CallbackState, Error> {
	BASE64_URL_SAFE_NO_PAD
		.decode(state)
		.ok()
		.and_then(|bytes| serde_json::from_slice(&bytes).ok())
		.ok_or_else(|| {
			Error::Callback("the authorization process did not return valid values".to_string())
		})
}

/// URL an administrator visits to grant this connection access.
#[must_use]
pub fn authorization_url(config: &BackendConfig, dbname: &str) -> String {
	format!(
		"{}/api/v1/oauth/authorize?response_type=code&client_id={}&redirect_uri={}&state={}",
		config.login_url,
		config.credentials.client_id,
		config.callback_url,
		encode_state(config.id, dbname),
	)
}

/// Landing point of the OAuth redirect.
///
/// Stores the authorization code on the backend and immediately trades it
/// for a token, because codes expire quickly. Returns the human-readable
/// message to show the administrator.
pub async fn authorize_callback(
	registry: &BackendRegistry,
	params: CallbackParams,
) -> Result<String, Error> {
	let (Some(code), Some(state)) = (params.code, params.state) else {
		return Err(Error::Callback(
			"authorization process went wrong: missing code or state parameter".to_string(),
		));
	};

	let state = decode_state(&state)?;

	let backend = registry
		.get(state.backend_id)
		.await
		.map_err(|_| Error::Callback(format!("no backend with id {}", state.backend_id)))?;

	backend.authorize(&code).await?;

	info!(
		backend_id = %state.backend_id,
		dbname = %state.dbname,
		"Backend authorized via oauth callback;"
	);

	Ok(format!(
		"Backend '{}' successfully authorized. You can now close this window.",
		backend.name()
	))
}

#[cfg(test)]
mod tests {
	use super::*;
	use sb_cloud_api::auth::ClientCredentials;
	use uuid::Uuid;

	#[test]
	fn authorization_url_carries_client_and_state() {
		let config = BackendConfig {
			id: Uuid::new_v4(),
			name: "crm".to_string(),
			api_url: "https://api.example".to_string(),
			login_url: "https://login.example".to_string(),
			credentials: ClientCredentials {
				client_id: "client-1".to_string(),
				client_secret: "secret-1".to_string(),
			},
			callback_url: "https://host.example/oauth".to_string(),
		};

		let url = authorization_url(&config, "production");

		assert!(url.starts_with("https://login.example/api/v1/oauth/authorize?"));
		assert!(url.contains("client_id=client-1"));
		assert!(url.contains(&format!("state={}", encode_state(config.id, "production"))));
	}

	#[test]
	fn state_blob_round_trips() {
		let backend_id = Uuid::new_v4();
		let state = decode_state(&encode_state(backend_id, "production")).unwrap();

		assert_eq!(state.backend_id, backend_id);
		assert_eq!(state.dbname, "production");
	}

	#[test]
	fn malformed_state_is_rejected() {
		assert!(matches!(
			decode_state("not base64!"),
			Err(Error::Callback(_))
		));
		assert!(matches!(
			decode_state(&BASE64_URL_SAFE_NO_PAD.encode("not json")),
			Err(Error::Callback(_))
		));
	}
}
