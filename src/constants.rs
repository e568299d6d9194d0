//! # Application Constants
//!
//! This module contains application-wide constants: the identity used to
//! derive platform directories, the compiled-in setting defaults, and the
//! sizing of the logging pipeline.
//!
//! ## Source Naming
//!
//! Every setting can be supplied through an environment variable or the local
//! env file as `<ENV_PREFIX><FIELD_NAME>`, e.g. `APP_LOG_LEVEL=debug`.

/// Application name, used for platform directories and the log file name
pub const APP_NAME: &str = "tomatempo";

/// Application author, used on platforms that group app data by vendor
pub const APP_AUTHOR: &str = "André Carvalho";

/// Prefix shared by every environment variable and env-file key
pub const ENV_PREFIX: &str = "APP_";

/// Env file consulted after real environment variables
pub const ENV_FILE: &str = ".env";

/// Delimiter between parent and child key for nested settings sections
pub const ENV_NESTED_DELIMITER: &str = "__";

/// Default database connection string (local file-based store)
pub const DEFAULT_DATABASE_URL: &str = "sqlite:///./data.db";

/// Default capacity of the bounded log queue
pub const DEFAULT_LOG_QUEUE_CAPACITY: usize = 1024;

/// Location of the declarative logging document shipped with the repository
pub const LOGGING_CONFIG_FILE: &str = "config/logging.toml";

/// File name of the JSON-lines log inside the logs directory
pub fn log_file_name(app_name: &str) -> String {
    format!("log_{app_name}.jsonl")
}
