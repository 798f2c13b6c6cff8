//! Utility functions.

pub mod passcode;
pub mod validation;
