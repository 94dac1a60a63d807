//! Record store contract
//!
//! Lookups distinguish three outcomes: `Ok(Some(_))` found, `Ok(None)` not
//! found, `Err(_)` the store failed. Keyed mutations report whether a row was
//! affected instead of failing when the key is missing.

use async_trait::async_trait;

use crate::core::StoreError;

use super::model::{Birthday, ConversationId};
use super::query::Filter;

#[async_trait]
pub trait BirthdayStore: Send + Sync {
    /// Persist a new record. Fails with `DuplicateKey` if the name is taken in that conversation.
    async fn create(&self, birthday: &Birthday) -> Result<(), StoreError>;

    async fn find_by_name(
        &self,
        conversation_id: ConversationId,
        name: &str,
    ) -> Result<Option<Birthday>, StoreError>;

    /// Every record on this day of the year, across all conversations. Unordered.
    async fn find_on_calendar_day(&self, day: u32, month: u32) -> Result<Vec<Birthday>, StoreError>;

    /// Records of one conversation matching `filter`, ordered by (month, day)
    async fn search(
        &self,
        conversation_id: ConversationId,
        filter: &Filter,
    ) -> Result<Vec<Birthday>, StoreError>;

    async fn rename(
        &self,
        conversation_id: ConversationId,
        old_name: &str,
        new_name: &str,
    ) -> Result<bool, StoreError>;

    async fn reschedule(
        &self,
        conversation_id: ConversationId,
        name: &str,
        day: u32,
        month: u32,
    ) -> Result<bool, StoreError>;

    async fn delete(&self, conversation_id: ConversationId, name: &str) -> Result<bool, StoreError>;
}
