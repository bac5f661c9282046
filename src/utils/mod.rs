//! Shared helpers: logging setup, hook deadlines, timestamps, env lookups

pub mod env;
pub mod logging;
pub mod time;
pub mod timeout;

pub use env::{env_bool, env_int, env_opt};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
pub use logging::{init_logging, init_logging_from_config};
pub use time::{current_timestamp, current_timestamp_nanos};
pub use timeout::with_optional_timeout;
