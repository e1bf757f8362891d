//! Input converters: one module per input type.

pub mod sample;
