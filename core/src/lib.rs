#![forbid(unsafe_code)]

//! Shared building blocks of `boxr`: the box capability contract, request
//! path handling and the path policy deciding what a box may serve.

mod error;

pub mod catchall;
pub mod path;
pub mod pattern;
pub mod policy;
pub mod resource;

pub use error::{AGGREGATE_SEPARATOR, Error, Result};
