//! Infrastructure implementations for the GreenCare pipeline: the agent
//! gateway client and the file-backed profile/turn stores.

pub mod config_service;
pub mod gateway;
pub mod paths;
pub mod profile_store;
pub mod turn_store;

pub use gateway::GatewayClient;
pub use paths::GreencarePaths;
pub use profile_store::TomlProfileStore;
pub use turn_store::JsonTurnStore;
