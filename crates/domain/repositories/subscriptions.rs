use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity};

/// Conditions a store reports through `anyhow::Error` that callers classify by downcast.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("subscription {0} not found")]
    NotFound(i64),
    #[error("an active subscription already covers this period, wait till it ends or extend it")]
    AlreadyExists,
}

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    /// Inserts the subscription unless an active one for the same user and service
    /// overlaps it, in which case it fails with [`StoreError::AlreadyExists`].
    async fn create(&self, insert_subscription_entity: InsertSubscriptionEntity) -> Result<i64>;

    /// Active (not deleted) subscription by id.
    async fn find_by_id(&self, subscription_id: i64) -> Result<Option<SubscriptionEntity>>;

    async fn list_by_user_id(&self, user_id: Uuid) -> Result<Vec<SubscriptionEntity>>;

    /// Every row, soft-deleted ones included.
    async fn list_all(&self) -> Result<Vec<SubscriptionEntity>>;

    async fn soft_delete(&self, subscription_id: i64) -> Result<()>;

    /// Appends the period that follows `subscription_id` as of `now` and returns its id.
    async fn renew_or_extend(&self, subscription_id: i64, now: DateTime<Utc>) -> Result<i64>;

    /// Sum of prices of periods fully inside `[from, to]`.
    async fn total_cost(
        &self,
        user_id: Uuid,
        service_name: String,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64>;

    async fn overlap_check(&self, candidate: InsertSubscriptionEntity) -> Result<()>;
}
