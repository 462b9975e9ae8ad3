pub mod config_store;
pub mod defaults;
pub mod llm;
pub mod runtime_controller;
pub mod secrets;

pub use config_store::ConfigStore;
pub use llm::ChatResponseProvider;
pub use runtime_controller::build_controller_from_config;
