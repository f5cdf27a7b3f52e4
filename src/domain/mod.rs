pub mod cluster;
pub mod dashboard;
