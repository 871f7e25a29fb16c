//! Utilities shared by apiset tests.
//!
//! [`ClassFixture`] builds class files in memory without a Java toolchain. With the
//! `fixture-fs` feature the fixtures can be laid out on disk as class directories or jars, the
//! way the CLI consumes them.

pub mod env;
mod fixtures;

pub use env::{env_lock, EnvVarGuard};
pub use fixtures::*;

#[cfg(feature = "fixture-fs")]
mod fixture_fs;

#[cfg(feature = "fixture-fs")]
pub use fixture_fs::*;
