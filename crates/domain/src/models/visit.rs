//! Visit domain models: one dining occasion with its dishes and attendees.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Visit {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub family_id: Uuid,
    pub date: NaiveDate,
    pub overall_rating: Option<i16>,
    pub value_for_money: Option<i16>,
    pub total_bill: Option<Decimal>,
    pub number_of_people: Option<i32>,
    /// `None` means the family has not decided.
    pub would_recommend: Option<bool>,
    pub notes: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Visit {
    pub fn price_per_person(&self) -> Option<Decimal> {
        price_per_person(self.total_bill, self.number_of_people)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Dish {
    pub id: Uuid,
    pub visit_id: Uuid,
    pub name: String,
    pub rating: Option<i16>,
    pub price: Option<Decimal>,
    pub notes: Option<String>,
    pub position: i32,
}

/// A family member who was at the visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VisitAttendee {
    pub user_id: Uuid,
    pub display_name: String,
}

/// A visit with its children, as returned to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct VisitDetail {
    #[serde(flatten)]
    pub visit: Visit,
    pub price_per_person: Option<Decimal>,
    pub dishes: Vec<Dish>,
    pub attendees: Vec<VisitAttendee>,
}

impl VisitDetail {
    pub fn new(visit: Visit, dishes: Vec<Dish>, attendees: Vec<VisitAttendee>) -> Self {
        Self {
            price_per_person: visit.price_per_person(),
            visit,
            dishes,
            attendees,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct DishInput {
    #[validate(
        length(min = 1, max = 200, message = "Dish name must be between 1 and 200 characters"),
        custom(function = "shared::validation::validate_not_blank")
    )]
    pub name: String,

    #[validate(range(min = 1, max = 5, message = "Dish rating must be between 1 and 5"))]
    pub rating: Option<i16>,

    #[validate(custom(function = "shared::validation::validate_amount"))]
    pub price: Option<Decimal>,

    #[validate(length(max = 1000, message = "Dish notes must be at most 1000 characters"))]
    pub notes: Option<String>,
}

/// Body of a visit create or edit request.
///
/// An edit replaces the visit's dishes and attendees with the submitted sets.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RecordVisitRequest {
    pub date: NaiveDate,

    #[validate(range(min = 1, max = 5, message = "Overall rating must be between 1 and 5"))]
    pub overall_rating: Option<i16>,

    #[validate(range(min = 1, max = 5, message = "Value for money must be between 1 and 5"))]
    pub value_for_money: Option<i16>,

    #[validate(custom(function = "shared::validation::validate_amount"))]
    pub total_bill: Option<Decimal>,

    #[validate(range(min = 1, message = "Number of people must be at least 1"))]
    pub number_of_people: Option<i32>,

    pub would_recommend: Option<bool>,

    #[validate(length(max = 5000, message = "Notes must be at most 5000 characters"))]
    pub notes: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub dishes: Vec<DishInput>,

    #[serde(default)]
    pub attendee_user_ids: Vec<Uuid>,
}

/// Bill split per head, rounded to cents. Needs both a bill and a head count.
pub fn price_per_person(total_bill: Option<Decimal>, number_of_people: Option<i32>) -> Option<Decimal> {
    match (total_bill, number_of_people) {
        (Some(bill), Some(people)) if people > 0 => Some(round_to_cents(bill / Decimal::from(people))),
        _ => None,
    }
}

/// Half-cents round away from zero.
pub fn round_to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(text: &str) -> Decimal {
        text.parse().unwrap()
    }

    fn request() -> RecordVisitRequest {
        RecordVisitRequest {
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            overall_rating: Some(4),
            value_for_money: Some(3),
            total_bill: Some(money("100")),
            number_of_people: Some(4),
            would_recommend: Some(true),
            notes: None,
            dishes: vec![DishInput {
                name: "Peking duck".to_string(),
                rating: Some(5),
                price: Some(money("38.50")),
                notes: None,
            }],
            attendee_user_ids: vec![],
        }
    }

    #[test]
    fn test_price_per_person() {
        assert_eq!(price_per_person(Some(money("100")), Some(4)), Some(money("25")));
        assert_eq!(price_per_person(Some(money("100")), Some(3)), Some(money("33.33")));
        assert_eq!(price_per_person(Some(money("10")), Some(6)), Some(money("1.67")));
        assert_eq!(price_per_person(Some(money("0.25")), Some(10)), Some(money("0.03")));
        assert_eq!(price_per_person(None, Some(4)), None);
        assert_eq!(price_per_person(Some(money("100")), None), None);
        assert_eq!(price_per_person(Some(money("100")), Some(0)), None);
    }

    #[test]
    fn test_valid_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_request_without_ratings_is_valid() {
        let mut req = request();
        req.overall_rating = None;
        req.value_for_money = None;
        req.total_bill = None;
        req.number_of_people = None;
        req.would_recommend = None;
        req.dishes.clear();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_zero_people_rejected() {
        let mut req = request();
        req.number_of_people = Some(0);
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("number_of_people"));
    }

    #[test]
    fn test_out_of_range_ratings_rejected() {
        for bad in [0, 6, -1] {
            let mut req = request();
            req.overall_rating = Some(bad);
            assert!(req.validate().is_err(), "rating {} accepted", bad);

            let mut req = request();
            req.value_for_money = Some(bad);
            assert!(req.validate().is_err(), "value {} accepted", bad);
        }
    }

    #[test]
    fn test_negative_bill_rejected() {
        let mut req = request();
        req.total_bill = Some(money("-1"));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_invalid_dish_rejected() {
        let mut req = request();
        req.dishes[0].rating = Some(9);
        assert!(req.validate().is_err());

        let mut req = request();
        req.dishes[0].name = "  ".to_string();
        assert!(req.validate().is_err());

        let mut req = request();
        req.dishes[0].price = Some(money("-3"));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let req: RecordVisitRequest =
            serde_json::from_str(r#"{"date": "2024-06-01", "overall_rating": 5}"#).unwrap();
        assert!(req.dishes.is_empty());
        assert_eq!(req.total_bill, None);
        assert!(req.attendee_user_ids.is_empty());
        assert_eq!(req.would_recommend, None);
    }

    #[test]
    fn test_amounts_deserialize_without_binary_drift() {
        let req: RecordVisitRequest = serde_json::from_str(
            r#"{"date": "2024-06-01", "total_bill": 0.3, "dishes": [{"name": "Tea", "price": 0.1}]}"#,
        )
        .unwrap();
        assert_eq!(req.total_bill, Some(money("0.3")));
        assert_eq!(req.dishes[0].price, Some(money("0.1")));
    }

    #[test]
    fn test_detail_carries_price_per_person() {
        let visit = Visit {
            id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            family_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            overall_rating: None,
            value_for_money: None,
            total_bill: Some(money("100")),
            number_of_people: Some(4),
            would_recommend: None,
            notes: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let detail = VisitDetail::new(visit, vec![], vec![]);
        assert_eq!(detail.price_per_person, Some(money("25")));

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["price_per_person"], 25.0);
        assert_eq!(json["date"], "2024-06-01");
    }
}
