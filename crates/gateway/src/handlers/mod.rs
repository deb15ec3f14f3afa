//! API handlers module

pub mod health;
pub mod knowledge;
pub mod query;
pub mod sessions;
