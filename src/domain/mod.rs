pub mod accounts;
pub mod models;
pub mod posts;
pub mod subscribers;
pub mod users;
