//! Read-side statistics over a restaurant's visits.
//!
//! Statistics are derived on every read and never stored.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::visit::round_to_cents;
use crate::models::Visit;

/// The fields of a visit that feed the statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisitFacts {
    pub overall_rating: Option<i16>,
    pub total_bill: Option<Decimal>,
    pub date: NaiveDate,
}

impl From<&Visit> for VisitFacts {
    fn from(visit: &Visit) -> Self {
        Self {
            overall_rating: visit.overall_rating,
            total_bill: visit.total_bill,
            date: visit.date,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RestaurantStats {
    pub visit_count: i64,
    /// Mean of the ratings that were given; `None` when nobody rated.
    pub avg_rating: Option<f64>,
    /// Mean of the recorded bills in cents precision; `None` when no bill
    /// was recorded.
    pub avg_price: Option<Decimal>,
    pub last_visit: Option<NaiveDate>,
}

/// Reduces a set of visits to restaurant statistics.
///
/// The result does not depend on the order of `visits`.
pub fn aggregate_restaurant<I>(visits: I) -> RestaurantStats
where
    I: IntoIterator<Item = VisitFacts>,
{
    let mut visit_count = 0i64;
    let mut rating_sum = 0i64;
    let mut rating_count = 0i64;
    let mut bill_sum = Decimal::ZERO;
    let mut bill_count = 0u32;
    let mut last_visit: Option<NaiveDate> = None;

    for visit in visits {
        visit_count += 1;
        if let Some(rating) = visit.overall_rating {
            rating_sum += i64::from(rating);
            rating_count += 1;
        }
        if let Some(bill) = visit.total_bill {
            bill_sum += bill;
            bill_count += 1;
        }
        last_visit = last_visit.max(Some(visit.date));
    }

    RestaurantStats {
        visit_count,
        avg_rating: (rating_count > 0).then(|| rating_sum as f64 / rating_count as f64),
        avg_price: (bill_count > 0).then(|| round_to_cents(bill_sum / Decimal::from(bill_count))),
        last_visit,
    }
}

/// Groups visit facts by restaurant and aggregates each group.
///
/// Restaurants with no visits do not appear; callers fall back to
/// `RestaurantStats::default()`.
pub fn stats_by_restaurant<I>(rows: I) -> HashMap<Uuid, RestaurantStats>
where
    I: IntoIterator<Item = (Uuid, VisitFacts)>,
{
    let mut grouped: HashMap<Uuid, Vec<VisitFacts>> = HashMap::new();
    for (restaurant_id, facts) in rows {
        grouped.entry(restaurant_id).or_default().push(facts);
    }

    grouped
        .into_iter()
        .map(|(id, visits)| (id, aggregate_restaurant(visits)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn money(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    fn facts(rating: Option<i16>, bill: Option<&str>, date: NaiveDate) -> VisitFacts {
        VisitFacts {
            overall_rating: rating,
            total_bill: bill.map(money),
            date,
        }
    }

    #[test]
    fn test_empty_visit_set() {
        let stats = aggregate_restaurant(Vec::new());
        assert_eq!(stats, RestaurantStats::default());
        assert_eq!(stats.visit_count, 0);
        assert_eq!(stats.avg_rating, None);
        assert_eq!(stats.avg_price, None);
        assert_eq!(stats.last_visit, None);
    }

    #[test]
    fn test_golden_dragon_scenario() {
        let stats = aggregate_restaurant(vec![
            facts(Some(4), None, day(1)),
            facts(Some(5), None, day(2)),
            facts(None, None, day(3)),
        ]);

        assert_eq!(stats.visit_count, 3);
        assert_eq!(stats.avg_rating, Some(4.5));
    }

    #[test]
    fn test_unrated_restaurant_is_not_zero_stars() {
        let stats = aggregate_restaurant(vec![
            facts(None, Some("40"), day(1)),
            facts(None, None, day(2)),
        ]);

        assert_eq!(stats.visit_count, 2);
        assert_eq!(stats.avg_rating, None);
        assert_eq!(stats.avg_price, Some(money("40")));
    }

    #[test]
    fn test_avg_price_ignores_missing_bills() {
        let stats = aggregate_restaurant(vec![
            facts(Some(3), Some("80"), day(1)),
            facts(Some(3), None, day(2)),
            facts(Some(3), Some("120"), day(3)),
        ]);

        assert_eq!(stats.avg_price, Some(money("100")));
    }

    #[test]
    fn test_avg_price_sums_exactly_and_rounds_to_cents() {
        let stats = aggregate_restaurant(vec![
            facts(None, Some("0.10"), day(1)),
            facts(None, Some("0.20"), day(2)),
        ]);
        assert_eq!(stats.avg_price, Some(money("0.15")));

        let stats = aggregate_restaurant(vec![
            facts(None, Some("10"), day(1)),
            facts(None, Some("10"), day(2)),
            facts(None, Some("20"), day(3)),
        ]);
        assert_eq!(stats.avg_price, Some(money("13.33")));
    }

    #[test]
    fn test_last_visit_is_latest_date_not_last_element() {
        let stats = aggregate_restaurant(vec![
            facts(None, None, day(20)),
            facts(None, None, day(5)),
            facts(None, None, day(11)),
        ]);

        assert_eq!(stats.last_visit, Some(day(20)));
    }

    #[test]
    fn test_order_independent() {
        let visits = vec![
            facts(Some(1), Some("0.10"), day(4)),
            facts(Some(4), Some("0.20"), day(9)),
            facts(None, Some("0.30"), day(2)),
            facts(Some(5), Some("9999999999.99"), day(7)),
            facts(Some(2), None, day(1)),
        ];

        let expected = aggregate_restaurant(visits.clone());

        let mut reversed = visits.clone();
        reversed.reverse();
        assert_eq!(aggregate_restaurant(reversed), expected);

        for shift in 1..visits.len() {
            let mut rotated = visits.clone();
            rotated.rotate_left(shift);
            assert_eq!(aggregate_restaurant(rotated), expected);
        }
    }

    #[test]
    fn test_stats_by_restaurant_groups_rows() {
        let golden = Uuid::new_v4();
        let taqueria = Uuid::new_v4();

        let stats = stats_by_restaurant(vec![
            (golden, facts(Some(4), Some("60"), day(1))),
            (taqueria, facts(Some(2), Some("20"), day(3))),
            (golden, facts(Some(5), None, day(8))),
        ]);

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[&golden].visit_count, 2);
        assert_eq!(stats[&golden].avg_rating, Some(4.5));
        assert_eq!(stats[&golden].last_visit, Some(day(8)));
        assert_eq!(stats[&taqueria].avg_price, Some(money("20")));
    }
}
