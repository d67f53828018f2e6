//! SeaORM entity definitions for the cadence database schema.

pub mod event;
pub mod prelude;
