//! CLI command implementations

pub mod check;
pub mod inspect;
pub mod show;
pub mod simulate;
