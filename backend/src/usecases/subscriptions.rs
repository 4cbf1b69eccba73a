use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use crates::domain::{
    entities::subscriptions::InsertSubscriptionEntity,
    repositories::subscriptions::{StoreError, SubscriptionRepository},
    value_objects::{
        month_year::{next_month, parse_month_year},
        subscriptions::{AdminSubscriptionDto, CostQuery, InsertSubscriptionModel, SubscriptionDto},
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("subscription not found")]
    NotFound,
    #[error("subscription already exists: {0}")]
    AlreadyExists(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SubscriptionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SubscriptionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            SubscriptionError::NotFound => StatusCode::NOT_FOUND,
            SubscriptionError::AlreadyExists(_) => StatusCode::CONFLICT,
            SubscriptionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn from_store(err: anyhow::Error) -> Self {
        match err.downcast_ref::<StoreError>() {
            Some(StoreError::AlreadyExists) => SubscriptionError::AlreadyExists(err.to_string()),
            Some(StoreError::NotFound(_)) => SubscriptionError::NotFound,
            None => SubscriptionError::Internal(err),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionError>;

pub struct SubscriptionUseCase<T>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    subscription_repo: Arc<T>,
}

impl<T> SubscriptionUseCase<T>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    pub fn new(subscription_repo: Arc<T>) -> Self {
        Self { subscription_repo }
    }

    pub async fn create(&self, model: InsertSubscriptionModel) -> UseCaseResult<i64> {
        info!(
            user_id = %model.user_id,
            service_name = %model.service_name,
            "subscriptions: create requested"
        );

        let insert_subscription_entity = Self::validate(model).inspect_err(|err| {
            warn!(
                status = err.status_code().as_u16(),
                error = %err,
                "subscriptions: create rejected"
            );
        })?;
        let user_id = insert_subscription_entity.user_id;

        // Early rejection only; `create` repeats the check atomically with the insert.
        self.subscription_repo
            .overlap_check(insert_subscription_entity.clone())
            .await
            .map_err(|err| Self::log_store_error(err, user_id, "overlap check failed"))?;

        let id = self
            .subscription_repo
            .create(insert_subscription_entity)
            .await
            .map_err(|err| Self::log_store_error(err, user_id, "failed to create subscription"))?;

        info!(%user_id, subscription_id = id, "subscriptions: subscription created");
        Ok(id)
    }

    pub async fn get_by_id(&self, subscription_id: i64) -> UseCaseResult<SubscriptionDto> {
        info!(subscription_id, "subscriptions: loading subscription");

        let subscription = self
            .subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(|err| {
                error!(subscription_id, db_error = ?err, "subscriptions: failed to load subscription");
                SubscriptionError::Internal(err)
            })?;

        match subscription {
            Some(subscription) => Ok(subscription.into()),
            None => {
                info!(subscription_id, "subscriptions: subscription not found");
                Err(SubscriptionError::NotFound)
            }
        }
    }

    pub async fn list_by_user_id(&self, user_id: Uuid) -> UseCaseResult<Vec<SubscriptionDto>> {
        info!(%user_id, "subscriptions: listing subscriptions for user");

        let subscriptions = self
            .subscription_repo
            .list_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to list user subscriptions");
                SubscriptionError::Internal(err)
            })?;

        let count = subscriptions.len();
        info!(%user_id, count, "subscriptions: user subscriptions loaded");
        Ok(subscriptions.into_iter().map(SubscriptionDto::from).collect())
    }

    pub async fn list_all(&self) -> UseCaseResult<Vec<AdminSubscriptionDto>> {
        info!("subscriptions: admin listing all subscriptions");

        let subscriptions = self.subscription_repo.list_all().await.map_err(|err| {
            error!(db_error = ?err, "subscriptions: failed to list all subscriptions");
            SubscriptionError::Internal(err)
        })?;

        Ok(subscriptions.into_iter().map(AdminSubscriptionDto::from).collect())
    }

    /// Soft delete. Unknown ids succeed without effect.
    pub async fn delete(&self, subscription_id: i64) -> UseCaseResult<()> {
        info!(subscription_id, "subscriptions: delete requested");

        self.subscription_repo
            .soft_delete(subscription_id)
            .await
            .map_err(|err| {
                error!(subscription_id, db_error = ?err, "subscriptions: failed to delete subscription");
                SubscriptionError::Internal(err)
            })?;

        info!(subscription_id, "subscriptions: subscription marked deleted");
        Ok(())
    }

    pub async fn renew_or_extend(&self, subscription_id: i64) -> UseCaseResult<i64> {
        self.renew_or_extend_at(subscription_id, Utc::now()).await
    }

    pub async fn renew_or_extend_at(
        &self,
        subscription_id: i64,
        now: DateTime<Utc>,
    ) -> UseCaseResult<i64> {
        info!(subscription_id, %now, "subscriptions: renew requested");

        let new_id = self
            .subscription_repo
            .renew_or_extend(subscription_id, now)
            .await
            .map_err(|err| {
                let err = SubscriptionError::from_store(err);
                match &err {
                    SubscriptionError::Internal(inner) => error!(
                        subscription_id,
                        db_error = ?inner,
                        "subscriptions: failed to renew subscription"
                    ),
                    _ => warn!(
                        subscription_id,
                        status = err.status_code().as_u16(),
                        error = %err,
                        "subscriptions: renew rejected"
                    ),
                }
                err
            })?;

        info!(subscription_id, new_id, "subscriptions: subscription renewed");
        Ok(new_id)
    }

    pub async fn total_cost(&self, user_id: Uuid, query: CostQuery) -> UseCaseResult<i64> {
        let service_name = query
            .service_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| SubscriptionError::InvalidInput("invalid service name".to_string()))?;
        let from = parse_month_year(query.from.as_deref().unwrap_or_default())
            .map_err(|err| SubscriptionError::InvalidInput(format!("invalid start date: {err}")))?;
        let to = parse_month_year(query.to.as_deref().unwrap_or_default())
            .map_err(|err| SubscriptionError::InvalidInput(format!("invalid end date: {err}")))?;

        info!(%user_id, service_name = %service_name, %from, %to, "subscriptions: computing total cost");

        let total = self
            .subscription_repo
            .total_cost(user_id, service_name, from, to)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to compute total cost");
                SubscriptionError::Internal(err)
            })?;

        Ok(total)
    }

    fn validate(model: InsertSubscriptionModel) -> UseCaseResult<InsertSubscriptionEntity> {
        let service_name = model.service_name.trim().to_string();
        if service_name.is_empty() {
            return Err(SubscriptionError::InvalidInput(
                "service_name must not be empty".to_string(),
            ));
        }
        if model.price < 0 {
            return Err(SubscriptionError::InvalidInput(
                "price must not be negative".to_string(),
            ));
        }

        let start_date = parse_month_year(&model.start_date)
            .map_err(|err| SubscriptionError::InvalidInput(format!("invalid start date: {err}")))?;
        let end_date = match model.end_date.as_deref() {
            Some(raw) if !raw.is_empty() => parse_month_year(raw)
                .map_err(|err| SubscriptionError::InvalidInput(format!("invalid end date: {err}")))?,
            _ => next_month(start_date)
                .map_err(|err| SubscriptionError::InvalidInput(err.to_string()))?,
        };

        if end_date <= start_date {
            return Err(SubscriptionError::InvalidInput(
                "end date must be after start date".to_string(),
            ));
        }

        Ok(InsertSubscriptionEntity {
            service_name,
            price: model.price,
            user_id: model.user_id,
            start_date,
            end_date,
        })
    }

    fn log_store_error(err: anyhow::Error, user_id: Uuid, context: &str) -> SubscriptionError {
        let err = SubscriptionError::from_store(err);
        match &err {
            SubscriptionError::Internal(inner) => {
                error!(%user_id, db_error = ?inner, "subscriptions: {context}")
            }
            _ => warn!(
                %user_id,
                status = err.status_code().as_u16(),
                error = %err,
                "subscriptions: {context}"
            ),
        }
        err
    }
}
