pub mod auth_methods;
pub mod config_store;
pub mod raw_config;
