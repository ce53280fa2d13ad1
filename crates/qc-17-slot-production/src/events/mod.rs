//! Event schemas published by the slot session

pub mod outbound;

pub use outbound::*;
