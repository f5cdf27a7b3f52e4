pub mod client;
pub mod kubeconfig;
pub mod persistence;
pub mod state;
pub mod util;
