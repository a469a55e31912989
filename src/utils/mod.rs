//! Shared helpers: input limits, identifier handling and confidence clamping.

pub mod validation;
