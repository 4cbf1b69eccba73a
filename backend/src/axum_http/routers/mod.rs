pub mod costs;
pub mod subscriptions;
