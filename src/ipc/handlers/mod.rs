pub mod assets;
pub mod assignments;
pub mod auth;
pub mod backup_exchange;
pub mod core;
pub mod courses;
pub mod fields;
pub mod users;
