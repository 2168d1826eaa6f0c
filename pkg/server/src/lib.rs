pub mod config;
pub mod connection;
pub mod services;

pub use config::{Cli, ClusterConfig};
pub use services::Services;
