//! The canonical event record shared by the sync engine, the store and the
//! statistics engine.

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::event;

/// One activity record on a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Upstream identifier, used as the dedup key.
    pub id: i64,
    /// Activity classification.
    #[serde(rename = "type")]
    pub event_type: String,
    pub created_at: DateTime<Utc>,
    /// Repository name, without the owner.
    pub repo: String,
}

impl Event {
    pub fn new(
        id: i64,
        event_type: impl Into<String>,
        created_at: DateTime<Utc>,
        repo: impl Into<String>,
    ) -> Self {
        Self {
            id,
            event_type: event_type.into(),
            created_at,
            repo: repo.into(),
        }
    }

    /// Build a new row for this event, stamped with `fetched_at`.
    pub fn to_active_model(&self, fetched_at: DateTime<Utc>) -> event::ActiveModel {
        event::ActiveModel {
            row_id: Set(Uuid::new_v4()),
            event_id: Set(self.id),
            event_type: Set(self.event_type.clone()),
            created_at: Set(self.created_at),
            repo: Set(self.repo.clone()),
            fetched_at: Set(fetched_at),
        }
    }
}

impl From<event::Model> for Event {
    fn from(model: event::Model) -> Self {
        Self {
            id: model.event_id,
            event_type: model.event_type,
            created_at: model.created_at,
            repo: model.repo,
        }
    }
}
