use crate::{
    axum_http::{
        error_responses::{AppError, json_response},
        routers::subscriptions::parse_user_id,
    },
    usecases::subscriptions::SubscriptionUseCase,
};
use axum::{
    Router,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::Response,
    routing::get,
};
use crates::{
    domain::{
        repositories::subscriptions::SubscriptionRepository,
        value_objects::subscriptions::{CostQuery, TotalCostResponse},
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::subscriptions::SubscriptionPostgres,
    },
};
use std::sync::Arc;

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let subscriptions_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let subscriptions_usecase = SubscriptionUseCase::new(Arc::new(subscriptions_repository));

    router(Arc::new(subscriptions_usecase))
}

pub fn router<T>(usecase: Arc<SubscriptionUseCase<T>>) -> Router
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/:user_id", get(total_cost::<T>))
        .with_state(usecase)
}

/// `GET /costs/{user_id}?service_name=..&from=MM-YYYY&to=MM-YYYY`
pub async fn total_cost<T>(
    State(usecase): State<Arc<SubscriptionUseCase<T>>>,
    Path(raw_user_id): Path<String>,
    query: Result<Query<CostQuery>, QueryRejection>,
) -> Result<Response, AppError>
where
    T: SubscriptionRepository + Send + Sync + 'static,
{
    let user_id = parse_user_id(&raw_user_id)?;
    let Query(query) = query.map_err(|rejection| AppError::Decode(rejection.body_text()))?;

    let total_cost = usecase.total_cost(user_id, query).await?;

    Ok(json_response(StatusCode::OK, &TotalCostResponse { total_cost }))
}
