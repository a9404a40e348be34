//! HTTP route handlers.

pub mod auth;
pub mod families;
pub mod health;
pub mod restaurants;
pub mod users;
pub mod visits;
