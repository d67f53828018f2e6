//! Event entity: one stored repository activity record.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A persisted event row.
///
/// Rows are append-only. There is no uniqueness constraint on
/// `(repo, event_id)`; duplicates are filtered before insertion.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "events")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub row_id: Uuid,
    /// Upstream event id.
    pub event_id: i64,
    /// Activity classification, e.g. `PushEvent`.
    pub event_type: String,
    /// When the event happened upstream (UTC).
    pub created_at: DateTimeUtc,
    /// Repository name (final segment of the repository URL).
    pub repo: String,
    /// When this row was written.
    pub fetched_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
