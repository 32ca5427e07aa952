use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::{
	binder::{RecordType, RemoteId},
	context::MappingContext,
	error::Error,
	import::ImportHooks,
	mapper::{ExportMapper, ImportMapper, MappedData},
	registry::RecordFlow,
	store::LocalRecord,
};

use super::account;

pub const RECORD_TYPE: &str = "contact";
pub const REMOTE_OBJECT: &str = "Contact";

// (local field, remote field)
const DIRECT: &[(&str, &str)] = &[
	("street", "MailingStreet"),
	("zip", "MailingPostalCode"),
	("city", "MailingCity"),
	("phone", "Phone"),
	("mobile", "MobilePhone"),
	("email", "Email"),
	("function", "Title"),
];

#[must_use]
pub fn flow() -> RecordFlow {
	RecordFlow::bidirectional(
		RECORD_TYPE,
		REMOTE_OBJECT,
		Arc::new(ContactExportMapper),
		Arc::new(ContactImportMapper),
	)
	.with_import_hooks(Arc::new(ContactImportHooks))
}

struct ContactExportMapper;

#[async_trait]
impl ExportMapper for ContactExportMapper {
	async fn map(
		&self,
		ctx: &MappingContext<'_>,
		record: &LocalRecord,
	) -> Result<MappedData, Error> {
		let mut data = MappedData::new();

		let name = record.str_field("name").ok_or_else(|| Error::Mapping {
			field: "name".to_string(),
			reason: "contact has no name".to_string(),
		})?;
		data.insert("LastName", name);

		for (local, remote) in DIRECT {
			if let Some(value) = record.str_field(local) {
				data.insert(*remote, value);
			}
		}

		if let Some(code) = record.str_field("country_id") {
			if ctx.reference().has_country(code) {
				data.insert("MailingCountryCode", code.to_uppercase());
			}
		}
		if let (Some(country), Some(state)) =
			(record.str_field("country_id"), record.str_field("state_id"))
		{
			if ctx.reference().state_name(country, state).is_some() {
				data.insert("MailingState", state.to_uppercase());
			}
		}

		if let Some(title) = record.str_field("title") {
			if let Some(salutation) = ctx.reference().salutation(title) {
				data.insert("Salutation", salutation);
			}
		}

		// the contact's account must be bound before the contact can refer
		// to it; an unbound account is exported on the spot
		if let Some(parent) = record.str_field("parent_id") {
			let parent_id = Uuid::parse_str(parent).map_err(|_| Error::Mapping {
				field: "parent_id".to_string(),
				reason: format!("'{parent}' is not a valid local id"),
			})?;

			let account_id = ctx
				.require_remote(&RecordType::new(account::RECORD_TYPE), parent_id)
				.await?;
			data.insert("AccountId", account_id.as_str());
		}

		Ok(data)
	}
}

struct ContactImportMapper;

#[async_trait]
impl ImportMapper for ContactImportMapper {
	async fn map(&self, ctx: &MappingContext<'_>, record: &Value) -> Result<MappedData, Error> {
		let mut data = MappedData::new();

		let last_name = record
			.get("LastName")
			.and_then(Value::as_str)
			.ok_or_else(|| Error::Mapping {
				field: "LastName".to_string(),
				reason: "remote contact has no last name".to_string(),
			})?;
		let compound_name = match record.get("FirstName").and_then(Value::as_str) {
			Some(first_name) => format!("{last_name} {first_name}"),
			None => last_name.to_string(),
		};
		data.insert_on_create("name", compound_name);
		data.insert_on_create("is_company", false);
		data.insert_on_create("backend_id", ctx.backend_id().to_string());

		for (local, remote) in DIRECT {
			if let Some(value) = record.get(*remote).and_then(Value::as_str) {
				data.insert(*local, value);
			}
		}

		if let Some(code) = record.get("MailingCountryCode").and_then(Value::as_str) {
			if ctx.reference().has_country(code) {
				data.insert("country_id", code.to_uppercase());

				if let Some(state) = record.get("MailingState").and_then(Value::as_str) {
					if ctx.reference().state_name(code, state).is_some() {
						data.insert("state_id", state.to_uppercase());
					}
				}
			}
		}

		if let Some(salutation) = record.get("Salutation").and_then(Value::as_str) {
			if let Some(title) = ctx.reference().title(salutation) {
				data.insert("title", title);
			}
		}

		data.insert("customer", true);
		data.insert("active", true);

		if let Some(account_id) = record.get("AccountId").and_then(Value::as_str) {
			let account = ctx
				.to_local(
					&RecordType::new(account::RECORD_TYPE),
					&RemoteId::new(account_id),
				)
				.await?
				.ok_or_else(|| Error::DependencyNotResolved {
					record_type: RecordType::new(account::RECORD_TYPE),
					reference: account_id.to_string(),
				})?;
			data.insert("parent_id", account.local_id.to_string());
		}

		Ok(data)
	}
}

struct ContactImportHooks;

#[async_trait]
impl ImportHooks for ContactImportHooks {
	/// Makes sure the contact's account exists locally, importing it first
	/// when it has never been seen.
	async fn before_import(
		&self,
		ctx: &MappingContext<'_>,
		remote_record: &Value,
	) -> Result<(), Error> {
		let Some(account_id) = remote_record.get("AccountId").and_then(Value::as_str) else {
			return Ok(());
		};

		ctx.require_local(
			&RecordType::new(account::RECORD_TYPE),
			&RemoteId::new(account_id),
		)
		.await
		.map(|_| ())
	}
}
