//! Configuration loader and schema types.
//!
//! Settings come from an optional TOML file and `REPRISE__*` environment
//! variables, layered over the struct defaults.

mod load;
mod schema;

pub use load::{default_config_path, default_state_path, resolve_config_path};
pub use schema::*;
