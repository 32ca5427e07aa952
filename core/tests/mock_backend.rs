//! Scripted stand-in for the remote backend, plus the harness wiring it to
//! a runtime with in-memory stores.

use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering},
		Arc,
	},
};

use sb_cloud_api::auth::{ClientCredentials, OAuthToken};
use sb_core::{
	flows,
	remote::RemoteConnector,
	store::{MemoryBindingStore, MemoryRecordStore},
	BackendConfig, BackendHandle, BackendId, Runtime, SyncRegistry,
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

pub struct MockRemote {
	// object -> id -> fields
	records: Mutex<HashMap<String, HashMap<String, Map<String, Value>>>>,
	// soft-deleted (object, id) pairs; identity survives deletion
	deleted: Mutex<Vec<(String, String)>>,
	next_id: AtomicUsize,

	valid_token: Mutex<String>,
	stale_refresh: AtomicBool,
	pub refresh_calls: AtomicUsize,
	pub delete_calls: AtomicUsize,
	pub upsert_calls: AtomicUsize,
}

impl MockRemote {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			records: Mutex::new(HashMap::new()),
			deleted: Mutex::new(Vec::new()),
			next_id: AtomicUsize::new(1),
			valid_token: Mutex::new("token-0".to_string()),
			stale_refresh: AtomicBool::new(false),
			refresh_calls: AtomicUsize::new(0),
			delete_calls: AtomicUsize::new(0),
			upsert_calls: AtomicUsize::new(0),
		})
	}

	fn token(&self, access_token: &str) -> OAuthToken {
		OAuthToken {
			access_token: access_token.to_string(),
			token_type: "Bearer".to_string(),
			refresh_token: Some("refresh-0".to_string()),
			expires_in: Some(7200),
			issued_at: Utc::now(),
		}
	}

	/// Invalidate every token handed out so far; the next refresh hands out
	/// the new valid one.
	pub async fn expire_session(&self) {
		let mut valid = self.valid_token.lock().await;
		*valid = format!("{}x", *valid);
	}

	/// Make refreshes hand out tokens the backend will keep rejecting.
	pub fn poison_refresh(&self) {
		self.stale_refresh.store(true, Ordering::Relaxed);
	}

	pub async fn seed_record(&self, object: &str, id: &str, fields: Map<String, Value>) {
		self.records
			.lock()
			.await
			.entry(object.to_string())
			.or_default()
			.insert(id.to_string(), fields);
	}

	pub async fn record(&self, object: &str, id: &str) -> Option<Map<String, Value>> {
		self.records
			.lock()
			.await
			.get(object)
			.and_then(|table| table.get(id))
			.cloned()
	}

	pub async fn record_count(&self, object: &str) -> usize {
		self.records
			.lock()
			.await
			.get(object)
			.map_or(0, HashMap::len)
	}

	pub async fn is_deleted(&self, object: &str, id: &str) -> bool {
		self.deleted
			.lock()
			.await
			.contains(&(object.to_string(), id.to_string()))
	}

	async fn check_session(&self, token: &OAuthToken) -> Result<(), sb_cloud_api::Error> {
		if *self.valid_token.lock().await == token.access_token {
			Ok(())
		} else {
			Err(sb_cloud_api::Error::SessionExpired {
				message: "session expired or invalid".to_string(),
			})
		}
	}

	fn not_found(object: &str, id: &str) -> sb_cloud_api::Error {
		sb_cloud_api::Error::NotFound {
			url: format!("mock://objects/{object}/{id}"),
		}
	}
}

#[async_trait]
impl RemoteConnector for MockRemote {
	async fn exists(
		&self,
		token: &OAuthToken,
		object: &str,
		id: &str,
	) -> Result<bool, sb_cloud_api::Error> {
		self.check_session(token).await?;

		Ok(self
			.records
			.lock()
			.await
			.get(object)
			.is_some_and(|table| table.contains_key(id))
			&& !self.is_deleted(object, id).await)
	}

	async fn get(
		&self,
		token: &OAuthToken,
		object: &str,
		id: &str,
	) -> Result<Value, sb_cloud_api::Error> {
		self.check_session(token).await?;

		if self.is_deleted(object, id).await {
			return Err(Self::not_found(object, id));
		}

		let mut fields = self
			.records
			.lock()
			.await
			.get(object)
			.and_then(|table| table.get(id))
			.cloned()
			.ok_or_else(|| Self::not_found(object, id))?;
		fields.insert("Id".to_string(), Value::from(id));

		Ok(Value::Object(fields))
	}

	async fn create(
		&self,
		token: &OAuthToken,
		object: &str,
		data: &Value,
	) -> Result<String, sb_cloud_api::Error> {
		self.check_session(token).await?;
		self.upsert_calls.fetch_add(1, Ordering::Relaxed);

		let id = format!("R-{}-{}", object, self.next_id.fetch_add(1, Ordering::Relaxed));
		let fields = data.as_object().cloned().unwrap_or_default();

		self.records
			.lock()
			.await
			.entry(object.to_string())
			.or_default()
			.insert(id.clone(), fields);

		Ok(id)
	}

	async fn update(
		&self,
		token: &OAuthToken,
		object: &str,
		id: &str,
		data: &Value,
	) -> Result<(), sb_cloud_api::Error> {
		self.check_session(token).await?;
		self.upsert_calls.fetch_add(1, Ordering::Relaxed);

		let mut records = self.records.lock().await;
		let fields = records
			.get_mut(object)
			.and_then(|table| table.get_mut(id))
			.ok_or_else(|| Self::not_found(object, id))?;
		fields.extend(data.as_object().cloned().unwrap_or_default());

		Ok(())
	}

	async fn upsert_by(
		&self,
		token: &OAuthToken,
		object: &str,
		field: &str,
		value: &str,
		data: &Value,
	) -> Result<String, sb_cloud_api::Error> {
		self.check_session(token).await?;
		self.upsert_calls.fetch_add(1, Ordering::Relaxed);

		let mut records = self.records.lock().await;
		let table = records.entry(object.to_string()).or_default();

		let existing = table
			.iter()
			.find(|(_, fields)| {
				fields
					.get(field)
					.and_then(Value::as_str)
					.is_some_and(|existing| existing == value)
			})
			.map(|(id, _)| id.clone());

		let incoming = data.as_object().cloned().unwrap_or_default();

		match existing {
			Some(id) => {
				if let Some(fields) = table.get_mut(&id) {
					fields.extend(incoming);
				}
				Ok(id)
			}
			None => {
				let id = format!("R-{}-{}", object, self.next_id.fetch_add(1, Ordering::Relaxed));
				let mut fields = incoming;
				fields.insert(field.to_string(), Value::from(value));
				table.insert(id.clone(), fields);
				Ok(id)
			}
		}
	}

	async fn delete(
		&self,
		token: &OAuthToken,
		object: &str,
		id: &str,
	) -> Result<(), sb_cloud_api::Error> {
		self.check_session(token).await?;

		if !self
			.records
			.lock()
			.await
			.get(object)
			.is_some_and(|table| table.contains_key(id))
		{
			return Err(Self::not_found(object, id));
		}

		self.delete_calls.fetch_add(1, Ordering::Relaxed);
		self.deleted
			.lock()
			.await
			.push((object.to_string(), id.to_string()));

		Ok(())
	}

	async fn exchange_token(
		&self,
		_credentials: &ClientCredentials,
		_code: &str,
		_redirect_uri: &str,
	) -> Result<OAuthToken, sb_cloud_api::Error> {
		let valid = self.valid_token.lock().await.clone();
		Ok(self.token(&valid))
	}

	async fn refresh_token(
		&self,
		_credentials: &ClientCredentials,
		_refresh_token: &str,
	) -> Result<OAuthToken, sb_cloud_api::Error> {
		self.refresh_calls.fetch_add(1, Ordering::Relaxed);

		if self.stale_refresh.load(Ordering::Relaxed) {
			return Ok(self.token("stale-token"));
		}

		let valid = self.valid_token.lock().await.clone();
		Ok(self.token(&valid))
	}
}

pub struct Harness {
	pub runtime: Arc<Runtime>,
	pub backend: Arc<BackendHandle>,
	pub backend_id: BackendId,
	pub mock: Arc<MockRemote>,
	pub records: Arc<MemoryRecordStore>,
	pub bindings: Arc<MemoryBindingStore>,
}

pub async fn harness() -> Harness {
	harness_with_registry(flows::default_registry().unwrap()).await
}

pub async fn harness_with_registry(registry: SyncRegistry) -> Harness {
	let mock = MockRemote::new();
	let records = Arc::new(MemoryRecordStore::new());
	let bindings = Arc::new(MemoryBindingStore::new());

	let records_store: Arc<dyn sb_core::store::RecordStore> = records.clone();
	let bindings_store: Arc<dyn sb_core::store::BindingStore> = bindings.clone();
	let runtime = Runtime::new(registry, records_store, bindings_store);

	let backend_id = Uuid::new_v4();
	let connector: Arc<dyn RemoteConnector> = mock.clone();
	let backend = BackendHandle::new(
		BackendConfig {
			id: backend_id,
			name: "test backend".to_string(),
			api_url: "mock://api".to_string(),
			login_url: "mock://login".to_string(),
			credentials: ClientCredentials {
				client_id: "client-1".to_string(),
				client_secret: "secret-1".to_string(),
			},
			callback_url: "mock://callback".to_string(),
		},
		connector,
	);

	runtime.backends().register(Arc::clone(&backend)).await;
	backend.authorize("code-1").await.unwrap();

	Harness {
		runtime,
		backend,
		backend_id,
		mock,
		records,
		bindings,
	}
}
