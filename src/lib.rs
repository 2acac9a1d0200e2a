#![forbid(unsafe_code)]

//! `boxr` serves static resources from composable boxes.
//!
//! - `boxes`: the box capability traits plus in-memory and directory boxes
//! - `overlay`: an ordered stack of boxes searched first match wins
//! - `resolve`: request resolution under a path policy

pub mod boxes;
pub mod overlay;
pub mod resolve;

pub use boxr_core::policy::PathPolicy;
pub use boxr_core::{Error, Result};
pub use overlay::OverlayBox;
pub use resolve::{Resolved, Resolver};
