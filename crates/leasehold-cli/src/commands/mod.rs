pub mod config;
pub mod lock;
pub mod log;
pub mod status;
