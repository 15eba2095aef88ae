//! Environment sources for optbind parsers.
//!
//! The parser engine never reads the process environment directly. It asks an
//! [`EnvSource`] to [`load_all`](EnvSource::load_all) once per run and then
//! resolves options through [`lookup`](EnvSource::lookup).
//!
//! - [`EnvLoader`] — process environment plus dotenv-style files.
//! - [`MapEnv`] — a fixed in-memory table, useful for embedding and tests.
//!
//! # Example
//!
//! ```
//! use optbind_env::{EnvSource, MapEnv};
//!
//! let mut env = MapEnv::from_iter([("PORT", "8080")]);
//! env.load_all().unwrap();
//! assert_eq!(env.lookup("PORT"), Some("8080"));
//! assert_eq!(env.lookup("HOST"), None);
//! ```

mod error;
mod loader;

pub use error::{EnvError, Result};
pub use loader::{EnvLoader, EnvSource, MapEnv};
