mod config;

pub use config::{load_config, load_config_from, BundlerConfig, Config, PersistenceConfig};
