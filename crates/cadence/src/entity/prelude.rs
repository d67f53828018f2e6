//! Common re-exports for convenient entity usage.

pub use super::event::{
    ActiveModel as EventActiveModel, Column as EventColumn, Entity as EventEntity,
    Model as EventModel,
};
