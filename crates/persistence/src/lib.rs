//! Persistence layer for the Dining Journal backend.
//!
//! This crate contains:
//! - Database connection management and migrations
//! - Entity definitions (database row mappings)
//! - Repository implementations, including the transactional visit store

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
