use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::subscriptions::SubscriptionEntity;
use crate::domain::value_objects::month_year::format_month_year;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsertSubscriptionModel {
    pub service_name: String,
    pub price: i32,
    pub user_id: Uuid,
    /// `MM-YYYY`
    pub start_date: String,
    /// `MM-YYYY`, defaults to one month after `start_date`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionDto {
    pub id: i64,
    pub service_name: String,
    pub price: i32,
    pub user_id: Uuid,
    pub start_date: String,
    pub end_date: String,
}

impl From<SubscriptionEntity> for SubscriptionDto {
    fn from(value: SubscriptionEntity) -> Self {
        Self {
            id: value.id,
            start_date: format_month_year(&value.start_date),
            end_date: format_month_year(&value.end_date),
            service_name: value.service_name,
            price: value.price,
            user_id: value.user_id,
        }
    }
}

/// Admin view, includes soft-deleted rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminSubscriptionDto {
    pub id: i64,
    pub service_name: String,
    pub price: i32,
    pub user_id: Uuid,
    pub start_date: String,
    pub end_date: String,
    pub deleted: bool,
}

impl From<SubscriptionEntity> for AdminSubscriptionDto {
    fn from(value: SubscriptionEntity) -> Self {
        Self {
            id: value.id,
            start_date: format_month_year(&value.start_date),
            end_date: format_month_year(&value.end_date),
            service_name: value.service_name,
            price: value.price,
            user_id: value.user_id,
            deleted: value.deleted,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CostQuery {
    pub service_name: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatedSubscriptionResponse {
    pub message: String,
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenewedSubscriptionResponse {
    pub message: String,
    pub new_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TotalCostResponse {
    #[serde(rename = "total cost")]
    pub total_cost: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entity(deleted: bool) -> SubscriptionEntity {
        SubscriptionEntity {
            id: 7,
            service_name: "Yandex Plus".to_string(),
            price: 400,
            user_id: Uuid::nil(),
            start_date: Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap(),
            deleted,
        }
    }

    #[test]
    fn user_dto_renders_month_year_dates() {
        let dto = SubscriptionDto::from(entity(false));
        assert_eq!(dto.start_date, "07-2025");
        assert_eq!(dto.end_date, "10-2025");

        let json = serde_json::to_value(&dto).unwrap();
        assert!(json.get("deleted").is_none());
    }

    #[test]
    fn admin_dto_exposes_deleted_flag() {
        let dto = AdminSubscriptionDto::from(entity(true));
        assert!(dto.deleted);
        assert_eq!(serde_json::to_value(&dto).unwrap()["deleted"], true);
    }

    #[test]
    fn end_date_is_optional_on_create() {
        let model: InsertSubscriptionModel = serde_json::from_str(
            r#"{"service_name":"Netflix","price":999,"user_id":"60601fee-2bf1-4721-ae6f-7636e79a0cba","start_date":"07-2025"}"#,
        )
        .unwrap();
        assert_eq!(model.end_date, None);
    }

    #[test]
    fn total_cost_uses_spaced_key() {
        let json = serde_json::to_string(&TotalCostResponse { total_cost: 1200 }).unwrap();
        assert_eq!(json, r#"{"total cost":1200}"#);
    }
}
