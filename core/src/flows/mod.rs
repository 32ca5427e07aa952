pub mod account;
pub mod contact;

use crate::{error::Error, registry::SyncRegistry};

/// Registry with the record flows shipped in-tree.
pub fn default_registry() -> Result<SyncRegistry, Error> {
	SyncRegistry::builder()
		.flow(account::flow())
		.flow(contact::flow())
		.build()
}
