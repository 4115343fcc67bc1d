mod config_dir;
mod error;
mod logger;
mod session_body;
