pub mod parser;
pub mod types;
pub mod validator;

pub use parser::{parse_config, parse_config_str, substitute_env_vars};
pub use types::{StateConfig, StoreKind, SyncConfig};
pub use validator::validate_config;
