//! Configuration loading and data types.

pub(crate) mod loader;
pub(crate) mod types;

pub(crate) use loader::load;
