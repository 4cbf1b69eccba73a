pub mod month_year;
pub mod renewal;
pub mod subscriptions;
