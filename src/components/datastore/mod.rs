mod actor;
pub mod models;

pub use actor::{DatastoreHandle, SupabaseActor};
pub use models::EventPatch;

use crate::components::calendar::models::Event;
use crate::error::AppResult;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Persistence of harvested events
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Bulk insert new events
    async fn insert(&self, events: &[Event]) -> AppResult<()>;

    /// Partial update of one persisted event
    async fn update(&self, id: i64, patch: &EventPatch) -> AppResult<()>;

    /// All persisted events of one date, with their ids
    async fn query(&self, date: NaiveDate) -> AppResult<Vec<Event>>;
}
