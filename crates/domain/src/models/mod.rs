//! Domain models for the Dining Journal.

pub mod family;
pub mod invite;
pub mod restaurant;
pub mod user;
pub mod visit;

pub use family::{Family, FamilyMember, FamilyMembership, FamilyRole};
pub use invite::{generate_invite_code, normalize_invite_code, InvalidInviteCode};
pub use restaurant::{Restaurant, RestaurantDetail, RestaurantSummary};
pub use user::{User, UserProfile};
pub use visit::{Dish, RecordVisitRequest, Visit, VisitAttendee, VisitDetail};
