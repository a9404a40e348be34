//! Domain layer for the Dining Journal backend.
//!
//! This crate contains:
//! - Domain models (User, Family, Restaurant, Visit) and request DTOs
//! - Pure read-side services (visit statistics, restaurant list filtering)
//! - The visit recorder, which orchestrates a visit write over a storage trait

pub mod models;
pub mod services;
