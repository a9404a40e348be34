//! Domain services for the Dining Journal.
//!
//! Read-side services are pure functions over loaded records; the visit
//! recorder drives writes through the [`VisitStore`] trait.

pub mod restaurant_listing;
pub mod visit_recorder;
pub mod visit_stats;

pub use restaurant_listing::{filter_and_sort, RestaurantListQuery, RestaurantSort};
pub use visit_recorder::{
    DishWrite, RecordVisitError, RecordedVisit, StoreError, VisitLimits, VisitRecorder,
    VisitStore, VisitWrite,
};
pub use visit_stats::{aggregate_restaurant, stats_by_restaurant, RestaurantStats, VisitFacts};
