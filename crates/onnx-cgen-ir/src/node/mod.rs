//! Per-operator attribute resolution.

pub mod builder;
pub mod conv;
pub mod conv_integer;
