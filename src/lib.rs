pub mod audio;
pub mod config;
pub mod connection;
pub mod error;
pub mod format;
pub mod logging;
pub mod monitor;
pub mod output;
pub mod probe;
pub mod version;
