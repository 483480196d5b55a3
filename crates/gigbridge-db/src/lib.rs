pub mod database;
pub mod migrations;
pub mod registry;
pub mod store;
pub mod upgrade;

pub use database::{Database, Scheme};
pub use store::{BridgeStore, BridgeUser, MessageRecord, Portal};
pub use upgrade::{UpgradeStep, UpgradeTable};
