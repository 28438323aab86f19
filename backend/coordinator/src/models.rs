//! Domain records shared by the store layer, the lifecycle engine and the API.
//!
//! Status values are persisted as short lowercase strings; the `*Row` structs
//! are the raw shapes read from SQLite and are converted into the typed
//! records before leaving the store layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, ServiceError};

/// Unit used when a donor does not say what the quantity is counted in.
pub const DEFAULT_QUANTITY_UNIT: &str = "portions";

/// Largest quantity a single donation may declare. Keeps `SUM()` over the
/// whole table far below `i64::MAX`.
pub const MAX_APPROX_QUANTITY: i64 = 1_000_000;

// ─────────────────────────────────────────────────────────
// Status domains
// ─────────────────────────────────────────────────────────

/// Lifecycle status of a donation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    /// Posted and waiting for a volunteer.
    Available,
    /// Claimed by exactly one volunteer.
    Accepted,
    /// Picked up and delivered by the claiming volunteer.
    Completed,
    /// Withdrawn by the donor before anyone claimed it.
    Cancelled,
}

impl DonationStatus {
    /// Statuses counted as "active" in reporting.
    pub const ACTIVE: [DonationStatus; 2] = [Self::Available, Self::Accepted];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Accepted => "accepted",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for DonationStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "available" => Ok(Self::Available),
            "accepted" => Ok(Self::Accepted),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ServiceError::Validation(format!(
                "unknown donation status `{other}`"
            ))),
        }
    }
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single claim record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceptanceStatus {
    Active,
    Completed,
}

impl AcceptanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for AcceptanceStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(ServiceError::Validation(format!(
                "unknown acceptance status `{other}`"
            ))),
        }
    }
}

/// Events that drive a donation through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A volunteer claims the donation.
    Claim,
    /// The claiming volunteer marks the pickup as done.
    Fulfill,
    /// The donor withdraws the donation.
    Cancel,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Claim => "claim",
            Self::Fulfill => "fulfill",
            Self::Cancel => "cancel",
        })
    }
}

// ─────────────────────────────────────────────────────────
// Donations
// ─────────────────────────────────────────────────────────

/// A donation together with its ordered photo URLs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: String,
    pub donor_id: String,
    pub food_type: String,
    pub approx_quantity: i64,
    pub quantity_unit: String,
    pub area: String,
    pub pickup_address: String,
    pub preferred_pickup_time: Option<DateTime<Utc>>,
    pub contact_number: String,
    pub status: DonationStatus,
    pub suggested_volunteer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub photos: Vec<String>,
}

/// A donation as stored in / read from the `donations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DonationRow {
    pub id: String,
    pub donor_id: String,
    pub food_type: String,
    pub approx_quantity: i64,
    pub quantity_unit: String,
    pub area: String,
    pub pickup_address: String,
    pub preferred_pickup_time: Option<DateTime<Utc>>,
    pub contact_number: String,
    pub status: String,
    pub suggested_volunteer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DonationRow {
    pub fn into_donation(self, photos: Vec<String>) -> Result<Donation> {
        let status = self.status.parse().map_err(|_| {
            ServiceError::CorruptRecord(format!(
                "donation {} has status `{}`",
                self.id, self.status
            ))
        })?;
        Ok(Donation {
            id: self.id,
            donor_id: self.donor_id,
            food_type: self.food_type,
            approx_quantity: self.approx_quantity,
            quantity_unit: self.quantity_unit,
            area: self.area,
            pickup_address: self.pickup_address,
            preferred_pickup_time: self.preferred_pickup_time,
            contact_number: self.contact_number,
            status,
            suggested_volunteer_id: self.suggested_volunteer_id,
            created_at: self.created_at,
            accepted_at: self.accepted_at,
            completed_at: self.completed_at,
            photos,
        })
    }
}

/// Attributes a donor supplies when posting a donation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDonation {
    pub food_type: String,
    pub approx_quantity: i64,
    #[serde(default)]
    pub quantity_unit: Option<String>,
    pub area: String,
    pub pickup_address: String,
    #[serde(default)]
    pub preferred_pickup_time: Option<DateTime<Utc>>,
    pub contact_number: String,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub suggested_volunteer_id: Option<String>,
}

impl NewDonation {
    /// Reject blank required fields and non-positive quantities.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("foodType", &self.food_type),
            ("area", &self.area),
            ("pickupAddress", &self.pickup_address),
            ("contactNumber", &self.contact_number),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ServiceError::Validation(format!("{field} is required")));
            }
        }
        if !(1..=MAX_APPROX_QUANTITY).contains(&self.approx_quantity) {
            return Err(ServiceError::Validation(format!(
                "approxQuantity must be between 1 and {MAX_APPROX_QUANTITY}"
            )));
        }
        if self.photos.iter().any(|url| url.trim().is_empty()) {
            return Err(ServiceError::Validation(
                "photo URLs must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    /// The quantity unit to persist, falling back to [`DEFAULT_QUANTITY_UNIT`].
    pub fn quantity_unit_or_default(&self) -> &str {
        match self.quantity_unit.as_deref().map(str::trim) {
            Some(unit) if !unit.is_empty() => unit,
            _ => DEFAULT_QUANTITY_UNIT,
        }
    }
}

/// Case-folded form of an area, used for case-insensitive matching.
pub fn area_key(area: &str) -> String {
    area.trim().to_lowercase()
}

// ─────────────────────────────────────────────────────────
// Listing
// ─────────────────────────────────────────────────────────

/// Ordering applied to donation listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Preferred pickup time ascending; donations without one go last.
    PickupTime,
    /// Area ascending.
    Area,
    /// Newest first.
    #[default]
    CreatedAt,
}

impl FromStr for SortKey {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pickup_time" => Ok(Self::PickupTime),
            "area" => Ok(Self::Area),
            "created_at" | "createdAt" => Ok(Self::CreatedAt),
            other => Err(ServiceError::Validation(format!(
                "unknown sort key `{other}`"
            ))),
        }
    }
}

/// Filter, sort and page window for [`crate::db::donations::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    /// Case-insensitive substring match on the area.
    pub area: Option<String>,
    pub status: DonationStatus,
    pub sort: SortKey,
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            area: None,
            status: DonationStatus::Available,
            sort: SortKey::default(),
            page: 1,
            limit: 10,
        }
    }
}

impl ListFilter {
    /// Number of rows to skip for the requested page.
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }
}

// ─────────────────────────────────────────────────────────
// Acceptances
// ─────────────────────────────────────────────────────────

/// The durable record of one volunteer's claim on one donation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Acceptance {
    pub id: String,
    pub donation_id: String,
    pub volunteer_id: String,
    pub status: AcceptanceStatus,
    pub accepted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AcceptanceRow {
    pub id: String,
    pub donation_id: String,
    pub volunteer_id: String,
    pub status: String,
    pub accepted_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<AcceptanceRow> for Acceptance {
    type Error = ServiceError;

    fn try_from(row: AcceptanceRow) -> Result<Self> {
        let status = row.status.parse().map_err(|_| {
            ServiceError::CorruptRecord(format!(
                "acceptance {} has status `{}`",
                row.id, row.status
            ))
        })?;
        Ok(Acceptance {
            id: row.id,
            donation_id: row.donation_id,
            volunteer_id: row.volunteer_id,
            status,
            accepted_at: row.accepted_at,
            completed_at: row.completed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewDonation {
        NewDonation {
            food_type: "Rice and curry".into(),
            approx_quantity: 20,
            area: "Koramangala".into(),
            pickup_address: "12 Main Rd".into(),
            contact_number: "555-0100".into(),
            ..Default::default()
        }
    }

    #[test]
    fn donation_status_round_trips_through_str() {
        for status in [
            DonationStatus::Available,
            DonationStatus::Accepted,
            DonationStatus::Completed,
            DonationStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<DonationStatus>().unwrap(), status);
        }
        assert!("claimed".parse::<DonationStatus>().is_err());
    }

    #[test]
    fn sort_key_accepts_camel_case_alias() {
        assert_eq!("createdAt".parse::<SortKey>().unwrap(), SortKey::CreatedAt);
        assert_eq!("pickup_time".parse::<SortKey>().unwrap(), SortKey::PickupTime);
        assert_eq!("area".parse::<SortKey>().unwrap(), SortKey::Area);
        assert!("distance".parse::<SortKey>().is_err());
    }

    #[test]
    fn quantity_unit_defaults_to_portions() {
        let mut new = sample();
        assert_eq!(new.quantity_unit_or_default(), "portions");
        new.quantity_unit = Some("  ".into());
        assert_eq!(new.quantity_unit_or_default(), "portions");
        new.quantity_unit = Some("kg".into());
        assert_eq!(new.quantity_unit_or_default(), "kg");
    }

    #[test]
    fn validate_rejects_blank_fields_and_bad_quantity() {
        assert!(sample().validate().is_ok());

        let mut blank_area = sample();
        blank_area.area = "   ".into();
        assert!(matches!(
            blank_area.validate(),
            Err(ServiceError::Validation(msg)) if msg == "area is required"
        ));

        let mut zero = sample();
        zero.approx_quantity = 0;
        assert!(zero.validate().is_err());

        let mut at_cap = sample();
        at_cap.approx_quantity = MAX_APPROX_QUANTITY;
        assert!(at_cap.validate().is_ok());

        let mut huge = sample();
        huge.approx_quantity = i64::MAX;
        assert!(matches!(huge.validate(), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn area_key_folds_non_ascii_case() {
        assert_eq!(area_key("  ÉCOLE Nord "), "école nord");
        assert_eq!(area_key("Straße"), "straße");
    }

    #[test]
    fn offset_is_zero_based_from_one_based_page() {
        let filter = ListFilter {
            page: 3,
            limit: 10,
            ..Default::default()
        };
        assert_eq!(filter.offset(), 20);
        assert_eq!(ListFilter::default().offset(), 0);
    }

    #[test]
    fn new_donation_deserializes_camel_case() {
        let json = serde_json::json!({
            "foodType": "Bread",
            "approxQuantity": 5,
            "area": "X",
            "pickupAddress": "1 Road",
            "contactNumber": "1",
            "photos": ["https://img/1.jpg"]
        });
        let new: NewDonation = serde_json::from_value(json).unwrap();
        assert_eq!(new.food_type, "Bread");
        assert_eq!(new.photos, vec!["https://img/1.jpg".to_string()]);
        assert!(new.quantity_unit.is_none());
    }
}
