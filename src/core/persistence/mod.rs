pub mod session;
pub mod storage_path;
