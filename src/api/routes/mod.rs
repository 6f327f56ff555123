//! Route handlers, one module per resource

pub mod health;
pub mod hosts;
pub mod reports;
