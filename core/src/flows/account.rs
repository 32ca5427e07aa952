use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
	context::MappingContext,
	error::Error,
	mapper::{ExportMapper, ImportMapper, MappedData},
	registry::RecordFlow,
	store::LocalRecord,
};

pub const RECORD_TYPE: &str = "account";
pub const REMOTE_OBJECT: &str = "Account";

// (local field, remote field)
const DIRECT: &[(&str, &str)] = &[
	("street", "BillingStreet"),
	("zip", "BillingPostalCode"),
	("city", "BillingCity"),
	("phone", "Phone"),
	("website", "Website"),
];

#[must_use]
pub fn flow() -> RecordFlow {
	RecordFlow::bidirectional(
		RECORD_TYPE,
		REMOTE_OBJECT,
		Arc::new(AccountExportMapper),
		Arc::new(AccountImportMapper),
	)
}

struct AccountExportMapper;

#[async_trait]
impl ExportMapper for AccountExportMapper {
	async fn map(
		&self,
		ctx: &MappingContext<'_>,
		record: &LocalRecord,
	) -> Result<MappedData, Error> {
		let mut data = MappedData::new();

		let name = record.str_field("name").ok_or_else(|| Error::Mapping {
			field: "name".to_string(),
			reason: "account has no name".to_string(),
		})?;
		data.insert("Name", name);

		for (local, remote) in DIRECT {
			if let Some(value) = record.str_field(local) {
				data.insert(*remote, value);
			}
		}

		if let Some(code) = record.str_field("country_id") {
			if ctx.reference().has_country(code) {
				data.insert("BillingCountryCode", code.to_uppercase());
			}
		}
		if let (Some(country), Some(state)) =
			(record.str_field("country_id"), record.str_field("state_id"))
		{
			if ctx.reference().state_name(country, state).is_some() {
				data.insert("BillingState", state.to_uppercase());
			}
		}

		Ok(data)
	}
}

struct AccountImportMapper;

#[async_trait]
impl ImportMapper for AccountImportMapper {
	async fn map(&self, ctx: &MappingContext<'_>, record: &Value) -> Result<MappedData, Error> {
		let mut data = MappedData::new();

		let name = record
			.get("Name")
			.and_then(Value::as_str)
			.ok_or_else(|| Error::Mapping {
				field: "Name".to_string(),
				reason: "remote account has no name".to_string(),
			})?;
		data.insert("name", name);

		for (local, remote) in DIRECT {
			if let Some(value) = record.get(*remote).and_then(Value::as_str) {
				data.insert(*local, value);
			}
		}

		if let Some(code) = record.get("BillingCountryCode").and_then(Value::as_str) {
			if ctx.reference().has_country(code) {
				data.insert("country_id", code.to_uppercase());

				if let Some(state) = record.get("BillingState").and_then(Value::as_str) {
					if ctx.reference().state_name(code, state).is_some() {
						data.insert("state_id", state.to_uppercase());
					}
				}
			}
		}

		data.insert("customer", true);
		data.insert("active", true);
		data.insert_on_create("is_company", true);
		data.insert_on_create("backend_id", ctx.backend_id().to_string());

		Ok(data)
	}
}
