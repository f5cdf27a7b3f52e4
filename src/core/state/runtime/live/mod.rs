pub mod change_signal;
pub mod lines;
pub mod live_object_index;
pub mod live_state_store;
pub mod resource_kind;
pub mod tracked_object;
