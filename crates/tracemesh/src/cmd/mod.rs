//! Command implementations for the tracemesh CLI

pub mod check;
pub mod replay;
