pub mod session_state_entity;
pub mod session_state_fs_adapter;
pub mod session_state_fs_adapter_trait;
pub mod session_state_repository;
