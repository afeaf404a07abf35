//! Sources, format loaders and include factories for `config_resolver`.
//!
//! The resolver core never touches files, the process environment or a
//! serialization grammar. This crate provides the adapters that do:
//!
//! | Adapter | Kind | Delivers |
//! |---------|------|----------|
//! | [`MapSource`] | source | in-memory pairs |
//! | [`EnvironmentSource`] | source | prefixed environment variables as pairs |
//! | [`FileSource`] | source | file bytes, format from the extension |
//! | [`StringSource`] | source | in-memory text in a named format |
//! | [`JsonLoader`] / [`TomlLoader`] | loader | trees |
//! | [`PropertiesLoader`] | loader | `key=value` lines as pairs |
//! | [`MapSourceFactory`] / [`EnvSourceFactory`] / [`FileSourceFactory`] | include factory | payloads for `$include` |
//!
//! [`default_loaders`] registers every loader, which is what most callers
//! want.

pub mod env_source;
pub mod factories;
pub mod file_source;
pub mod loaders;
pub mod map_source;

pub use env_source::EnvironmentSource;
pub use factories::{EnvSourceFactory, FileSourceFactory, MapSourceFactory};
pub use file_source::{FileSource, StringSource};
pub use loaders::{default_loaders, JsonLoader, PropertiesLoader, TomlLoader};
pub use map_source::MapSource;
