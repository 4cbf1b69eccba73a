use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    PgConnection, RunQueryDsl,
    dsl::sum,
    insert_into,
    pg::Pg,
    prelude::*,
    sql_query,
    sql_types::Text,
    update,
};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::{
    domain::{
        entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
        repositories::subscriptions::{StoreError, SubscriptionRepository},
        value_objects::renewal::{Period, next_period},
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::subscriptions},
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

/// Rows that are not soft-deleted.
fn active() -> subscriptions::BoxedQuery<'static, Pg> {
    subscriptions::table
        .filter(subscriptions::deleted.eq(false))
        .into_boxed()
}

/// Active rows for the same user and service whose half-open period intersects the candidate's.
fn overlapping(candidate: &InsertSubscriptionEntity) -> subscriptions::BoxedQuery<'static, Pg> {
    active()
        .filter(subscriptions::user_id.eq(candidate.user_id))
        .filter(subscriptions::service_name.eq(candidate.service_name.clone()))
        .filter(subscriptions::end_date.gt(candidate.start_date))
        .filter(subscriptions::start_date.lt(candidate.end_date))
}

/// Active rows of one user and service whose period lies entirely inside `[from, to]`.
fn contained_in(
    user_id: Uuid,
    service_name: String,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> subscriptions::BoxedQuery<'static, Pg> {
    active()
        .filter(subscriptions::user_id.eq(user_id))
        .filter(subscriptions::service_name.eq(service_name))
        .filter(subscriptions::start_date.ge(from))
        .filter(subscriptions::end_date.le(to))
}

fn count_overlapping(conn: &mut PgConnection, candidate: &InsertSubscriptionEntity) -> QueryResult<i64> {
    overlapping(candidate).count().get_result::<i64>(conn)
}

fn period_lock_key(user_id: Uuid, service_name: &str) -> String {
    format!("subscriptions:{user_id}:{service_name}")
}

/// Serializes writers of one (user, service) pair until the surrounding transaction ends.
/// Writers of other pairs never wait on each other.
fn lock_user_service(conn: &mut PgConnection, user_id: Uuid, service_name: &str) -> QueryResult<()> {
    sql_query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind::<Text, _>(period_lock_key(user_id, service_name))
        .execute(conn)?;
    Ok(())
}

/// Must run inside a transaction so the lock covers both the check and the insert.
fn insert_if_free(conn: &mut PgConnection, candidate: &InsertSubscriptionEntity) -> Result<i64> {
    lock_user_service(conn, candidate.user_id, &candidate.service_name)?;

    if count_overlapping(conn, candidate)? > 0 {
        bail!(StoreError::AlreadyExists);
    }

    let id = insert_into(subscriptions::table)
        .values(candidate)
        .returning(subscriptions::id)
        .get_result::<i64>(conn)?;

    Ok(id)
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn create(&self, insert_subscription_entity: InsertSubscriptionEntity) -> Result<i64> {
        // Diesel is synchronous; run DB work on the blocking threadpool to avoid
        // stalling Tokio under load.
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<i64> {
            let mut conn = db_pool.get()?;

            conn.transaction::<i64, anyhow::Error, _>(|tx| {
                insert_if_free(tx, &insert_subscription_entity)
            })
        })
        .await??)
    }

    async fn find_by_id(&self, subscription_id: i64) -> Result<Option<SubscriptionEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<SubscriptionEntity>> {
            let mut conn = db_pool.get()?;

            let result = active()
                .filter(subscriptions::id.eq(subscription_id))
                .select(SubscriptionEntity::as_select())
                .first::<SubscriptionEntity>(&mut conn)
                .optional()?;

            Ok(result)
        })
        .await??)
    }

    async fn list_by_user_id(&self, user_id: Uuid) -> Result<Vec<SubscriptionEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Vec<SubscriptionEntity>> {
            let mut conn = db_pool.get()?;

            let results = active()
                .filter(subscriptions::user_id.eq(user_id))
                .order(subscriptions::id.asc())
                .select(SubscriptionEntity::as_select())
                .load::<SubscriptionEntity>(&mut conn)?;

            Ok(results)
        })
        .await??)
    }

    async fn list_all(&self) -> Result<Vec<SubscriptionEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Vec<SubscriptionEntity>> {
            let mut conn = db_pool.get()?;

            let results = subscriptions::table
                .order(subscriptions::id.asc())
                .select(SubscriptionEntity::as_select())
                .load::<SubscriptionEntity>(&mut conn)?;

            Ok(results)
        })
        .await??)
    }

    async fn soft_delete(&self, subscription_id: i64) -> Result<()> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<()> {
            let mut conn = db_pool.get()?;

            update(subscriptions::table.filter(subscriptions::id.eq(subscription_id)))
                .set(subscriptions::deleted.eq(true))
                .execute(&mut conn)?;

            Ok(())
        })
        .await??)
    }

    async fn renew_or_extend(&self, subscription_id: i64, now: DateTime<Utc>) -> Result<i64> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<i64> {
            let mut conn = db_pool.get()?;

            conn.transaction::<i64, anyhow::Error, _>(|tx| {
                let current = active()
                    .filter(subscriptions::id.eq(subscription_id))
                    .select(SubscriptionEntity::as_select())
                    .first::<SubscriptionEntity>(tx)
                    .optional()?;

                let Some(current) = current else {
                    bail!(StoreError::NotFound(subscription_id));
                };

                let period = next_period(
                    Period {
                        start: current.start_date,
                        end: current.end_date,
                    },
                    now,
                )?;

                let renewed = InsertSubscriptionEntity {
                    service_name: current.service_name,
                    price: current.price,
                    user_id: current.user_id,
                    start_date: period.start,
                    end_date: period.end,
                };

                insert_if_free(tx, &renewed)
            })
        })
        .await??)
    }

    async fn total_cost(
        &self,
        user_id: Uuid,
        service_name: String,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<i64> {
            let mut conn = db_pool.get()?;

            // SUM over no rows is NULL.
            let total = contained_in(user_id, service_name, from, to)
                .select(sum(subscriptions::price))
                .first::<Option<i64>>(&mut conn)?;

            Ok(total.unwrap_or(0))
        })
        .await??)
    }

    async fn overlap_check(&self, candidate: InsertSubscriptionEntity) -> Result<()> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<()> {
            let mut conn = db_pool.get()?;

            if count_overlapping(&mut conn, &candidate)? > 0 {
                bail!(StoreError::AlreadyExists);
            }

            Ok(())
        })
        .await??)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use diesel::debug_query;

    fn month(year: i32, month: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap()
    }

    fn sql(query: subscriptions::BoxedQuery<'static, Pg>) -> String {
        debug_query::<Pg, _>(&query).to_string()
    }

    #[test]
    fn active_rows_exclude_soft_deleted() {
        let sql = sql(active());

        assert!(sql.contains(r#""subscriptions"."deleted" = $1"#), "{sql}");
        assert!(sql.ends_with("binds: [false]"), "{sql}");
    }

    #[test]
    fn overlap_is_half_open_on_both_ends() {
        let sql = sql(overlapping(&InsertSubscriptionEntity {
            service_name: "Netflix".to_string(),
            price: 999,
            user_id: Uuid::nil(),
            start_date: month(2025, 2),
            end_date: month(2025, 3),
        }));

        assert!(sql.contains(r#""subscriptions"."deleted" = $1"#), "{sql}");
        assert!(sql.contains(r#""subscriptions"."user_id" = $2"#), "{sql}");
        assert!(sql.contains(r#""subscriptions"."service_name" = $3"#), "{sql}");
        // An existing row that ends exactly where the candidate starts does not overlap.
        assert!(sql.contains(r#""subscriptions"."end_date" > $4"#), "{sql}");
        assert!(sql.contains(r#""subscriptions"."start_date" < $5"#), "{sql}");
    }

    #[test]
    fn cost_only_counts_fully_contained_periods() {
        let sql = sql(contained_in(
            Uuid::nil(),
            "Netflix".to_string(),
            month(2025, 1),
            month(2025, 6),
        ));

        assert!(sql.contains(r#""subscriptions"."deleted" = $1"#), "{sql}");
        assert!(sql.contains(r#""subscriptions"."start_date" >= $4"#), "{sql}");
        assert!(sql.contains(r#""subscriptions"."end_date" <= $5"#), "{sql}");
    }

    #[test]
    fn lock_key_separates_users_and_services() {
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert_eq!(period_lock_key(user, "Netflix"), period_lock_key(user, "Netflix"));
        assert_ne!(period_lock_key(user, "Netflix"), period_lock_key(other, "Netflix"));
        assert_ne!(period_lock_key(user, "Netflix"), period_lock_key(user, "Spotify"));
    }
}
