//! Repository implementations for database operations.

pub mod family;
pub mod restaurant;
pub mod user;
pub mod visit;

pub use family::FamilyRepository;
pub use restaurant::{RestaurantInput, RestaurantPatch, RestaurantRepository};
pub use user::UserRepository;
pub use visit::{store_error, VisitRepository};
