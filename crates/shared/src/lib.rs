//! Shared utilities for the Dining Journal backend.
//!
//! This crate provides functionality used across the other crates:
//! - Token hashing and secure random token generation
//! - Password hashing with Argon2id
//! - JWT issuing and validation for user sessions
//! - Reusable field validators for request DTOs

pub mod crypto;
pub mod jwt;
pub mod password;
pub mod validation;
