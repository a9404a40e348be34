//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod family;
pub mod restaurant;
pub mod user;
pub mod visit;

pub use family::{FamilyEntity, FamilyMemberWithUserEntity, FamilyMembershipEntity, FamilyRoleDb};
pub use restaurant::RestaurantEntity;
pub use user::{UserEntity, UserSessionEntity};
pub use visit::{
    DishEntity, VisitAttendeeEntity, VisitEntity, VisitFactsEntity,
};
