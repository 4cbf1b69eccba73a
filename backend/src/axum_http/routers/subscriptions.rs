use crate::{
    axum_http::{
        admin_guard::AdminAccess,
        error_responses::{AppError, json_response},
    },
    config::config_model::AdminSecret,
    usecases::subscriptions::SubscriptionUseCase,
};
use axum::{
    Extension, Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Response,
    routing::{get, post},
};
use crates::{
    domain::{
        repositories::subscriptions::SubscriptionRepository,
        value_objects::subscriptions::{
            CreatedSubscriptionResponse, InsertSubscriptionModel, MessageResponse,
            RenewedSubscriptionResponse,
        },
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::subscriptions::SubscriptionPostgres,
    },
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub fn routes(db_pool: Arc<PgPoolSquad>, admin_secret: AdminSecret) -> Router {
    let subscriptions_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let subscriptions_usecase = SubscriptionUseCase::new(Arc::new(subscriptions_repository));

    router(Arc::new(subscriptions_usecase), admin_secret)
}

pub fn router<T>(usecase: Arc<SubscriptionUseCase<T>>, admin_secret: AdminSecret) -> Router
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/", post(create::<T>).get(list_all::<T>))
        .route("/user/:user_id", get(list_by_user_id::<T>))
        .route(
            "/:id",
            get(get_by_id::<T>)
                .post(renew_or_extend::<T>)
                .patch(delete::<T>)
                .delete(delete::<T>),
        )
        .layer(Extension(admin_secret))
        .with_state(usecase)
}

pub(crate) fn parse_subscription_id(raw: &str) -> Result<i64, AppError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::InvalidInput("invalid subscription id".to_string())),
    }
}

pub(crate) fn parse_user_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::InvalidInput("invalid user id".to_string()))
}

pub async fn create<T>(
    State(usecase): State<Arc<SubscriptionUseCase<T>>>,
    payload: Result<Json<InsertSubscriptionModel>, JsonRejection>,
) -> Result<Response, AppError>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    let Json(model) = payload.map_err(|rejection| AppError::Decode(rejection.body_text()))?;

    let id = usecase.create(model).await?;

    Ok(json_response(
        StatusCode::CREATED,
        &CreatedSubscriptionResponse {
            message: "subscription created successfully".to_string(),
            id,
        },
    ))
}

pub async fn list_all<T>(
    _admin: AdminAccess,
    State(usecase): State<Arc<SubscriptionUseCase<T>>>,
) -> Result<Response, AppError>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    let subscriptions = usecase.list_all().await?;
    Ok(json_response(StatusCode::OK, &subscriptions))
}

pub async fn list_by_user_id<T>(
    State(usecase): State<Arc<SubscriptionUseCase<T>>>,
    Path(raw_user_id): Path<String>,
) -> Result<Response, AppError>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    let user_id = parse_user_id(&raw_user_id)?;
    let subscriptions = usecase.list_by_user_id(user_id).await?;
    Ok(json_response(StatusCode::OK, &subscriptions))
}

pub async fn get_by_id<T>(
    State(usecase): State<Arc<SubscriptionUseCase<T>>>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    let id = parse_subscription_id(&raw_id)?;
    let subscription = usecase.get_by_id(id).await?;
    Ok(json_response(StatusCode::OK, &subscription))
}

pub async fn renew_or_extend<T>(
    State(usecase): State<Arc<SubscriptionUseCase<T>>>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    let id = parse_subscription_id(&raw_id)?;
    let new_id = usecase.renew_or_extend(id).await?;

    Ok(json_response(
        StatusCode::CREATED,
        &RenewedSubscriptionResponse {
            message: "subscription renewed successfully".to_string(),
            new_id,
        },
    ))
}

pub async fn delete<T>(
    State(usecase): State<Arc<SubscriptionUseCase<T>>>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    let id = parse_subscription_id(&raw_id)?;
    usecase.delete(id).await?;
    info!(subscription_id = id, "subscriptions: delete handled");

    Ok(json_response(
        StatusCode::OK,
        &MessageResponse {
            message: "subscription deleted successfully".to_string(),
        },
    ))
}
