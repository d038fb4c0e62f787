//! Domain types and capability traits shared by the conversation engine.

pub mod domain;

pub use domain::*;
