//! In-memory filtering and sorting of the restaurant list.

use icu_collator::{Collator, CollatorOptions};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::models::RestaurantSummary;

/// Cuisine filter value meaning "every cuisine".
pub const ALL_CUISINES: &str = "All";

/// Sort order for the restaurant list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestaurantSort {
    /// Keep the order the restaurants arrived in (newest first from storage).
    #[default]
    Recent,
    /// Highest average rating first; unrated restaurants last.
    Rating,
    /// Most visited first.
    Visits,
    /// Alphabetical.
    Name,
}

/// Query string of `GET /api/v1/restaurants`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RestaurantListQuery {
    pub search: Option<String>,
    pub cuisine: Option<String>,
    #[serde(default)]
    pub sort: RestaurantSort,
}

impl RestaurantListQuery {
    fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    fn cuisine_filter(&self) -> Option<String> {
        self.cuisine
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case(ALL_CUISINES))
            .map(str::to_lowercase)
    }
}

thread_local! {
    // Root-locale collation: accents and case are secondary to the base letters.
    static NAME_COLLATOR: Option<Collator> =
        Collator::try_new(&Default::default(), CollatorOptions::new()).ok();
}

fn compare_names(collator: Option<&Collator>, x: &str, y: &str) -> Ordering {
    let primary = match collator {
        Some(collator) => collator.compare(x, y),
        None => x.to_lowercase().cmp(&y.to_lowercase()),
    };
    primary.then_with(|| x.cmp(y))
}

fn contains_term(field: Option<&str>, term: &str) -> bool {
    field.is_some_and(|value| value.to_lowercase().contains(term))
}

fn matches(summary: &RestaurantSummary, search: Option<&str>, cuisine: Option<&str>) -> bool {
    let restaurant = &summary.restaurant;

    if let Some(cuisine) = cuisine {
        let same = restaurant
            .cuisine
            .as_deref()
            .is_some_and(|c| c.trim().to_lowercase() == cuisine);
        if !same {
            return false;
        }
    }

    match search {
        None => true,
        Some(term) => {
            contains_term(Some(&restaurant.name), term)
                || contains_term(restaurant.cuisine.as_deref(), term)
                || contains_term(restaurant.address.as_deref(), term)
        }
    }
}

fn compare(
    a: &RestaurantSummary,
    b: &RestaurantSummary,
    sort: RestaurantSort,
    collator: Option<&Collator>,
) -> Ordering {
    match sort {
        RestaurantSort::Recent => Ordering::Equal,
        RestaurantSort::Rating => match (a.stats.avg_rating, b.stats.avg_rating) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        RestaurantSort::Visits => b.stats.visit_count.cmp(&a.stats.visit_count),
        RestaurantSort::Name => compare_names(collator, &a.restaurant.name, &b.restaurant.name),
    }
}

/// Applies the search text, cuisine filter and sort order.
///
/// The input is left untouched. Sorting is stable, so restaurants with equal
/// keys keep their relative input order.
pub fn filter_and_sort(
    restaurants: &[RestaurantSummary],
    query: &RestaurantListQuery,
) -> Vec<RestaurantSummary> {
    let search = query.search_term();
    let cuisine = query.cuisine_filter();

    let mut selected: Vec<RestaurantSummary> = restaurants
        .iter()
        .filter(|r| matches(r, search.as_deref(), cuisine.as_deref()))
        .cloned()
        .collect();

    NAME_COLLATOR.with(|collator| {
        selected.sort_by(|a, b| compare(a, b, query.sort, collator.as_ref()));
    });
    selected
}
