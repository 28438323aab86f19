//! Donation lifecycle engine.
//!
//! Owns the state machine and is the only writer of status and timestamp
//! fields on donations and acceptances:
//!
//! ```text
//! available ──claim──► accepted ──fulfill──► completed
//!     └──cancel──► cancelled
//! ```
//!
//! Each transition is one SQLite transaction. The donation's status is
//! changed with a compare-and-swap (`UPDATE … WHERE status = <expected>`),
//! so two concurrent claims can never both see `available`; the acceptance
//! write joins the same transaction, and any early return drops the
//! transaction un-committed, which rolls it back. The engine holds no locks
//! of its own.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db;
use crate::errors::{Result, ServiceError};
use crate::models::{
    Acceptance, AcceptanceStatus, Donation, DonationStatus, LifecycleEvent, ListFilter,
    NewDonation,
};

/// The transition table. Anything not listed is rejected.
pub fn next_status(from: DonationStatus, event: LifecycleEvent) -> Result<DonationStatus> {
    match (from, event) {
        (DonationStatus::Available, LifecycleEvent::Claim) => Ok(DonationStatus::Accepted),
        (DonationStatus::Accepted, LifecycleEvent::Fulfill) => Ok(DonationStatus::Completed),
        (DonationStatus::Available, LifecycleEvent::Cancel) => Ok(DonationStatus::Cancelled),
        (from, event) => Err(ServiceError::InvalidTransition { from, event }),
    }
}

// ─────────────────────────────────────────────────────────
// Creation & reads
// ─────────────────────────────────────────────────────────

/// Post a new donation on behalf of `donor_id`. It starts out `available`.
pub async fn create_donation(
    pool: &SqlitePool,
    donor_id: &str,
    new: NewDonation,
) -> Result<Donation> {
    new.validate()?;

    let donation = Donation {
        id: Uuid::new_v4().to_string(),
        donor_id: donor_id.to_string(),
        quantity_unit: new.quantity_unit_or_default().to_string(),
        food_type: new.food_type.trim().to_string(),
        approx_quantity: new.approx_quantity,
        area: new.area.trim().to_string(),
        pickup_address: new.pickup_address.trim().to_string(),
        preferred_pickup_time: new.preferred_pickup_time,
        contact_number: new.contact_number.trim().to_string(),
        status: DonationStatus::Available,
        suggested_volunteer_id: new.suggested_volunteer_id,
        created_at: Utc::now(),
        accepted_at: None,
        completed_at: None,
        photos: new.photos,
    };

    let mut tx = pool.begin().await?;
    db::donations::insert(&mut tx, &donation).await?;
    tx.commit().await?;

    info!(
        "Donation {} posted by donor {} ({} {} in {})",
        donation.id, donor_id, donation.approx_quantity, donation.quantity_unit, donation.area
    );
    Ok(donation)
}

pub async fn get_donation(pool: &SqlitePool, donation_id: &str) -> Result<Donation> {
    let mut conn = pool.acquire().await?;
    db::donations::get(&mut conn, donation_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("donation {donation_id}")))
}

pub async fn list_donations(pool: &SqlitePool, filter: &ListFilter) -> Result<Vec<Donation>> {
    if filter.page == 0 {
        return Err(ServiceError::Validation("page must be at least 1".to_string()));
    }
    if filter.limit == 0 {
        return Err(ServiceError::Validation("limit must be at least 1".to_string()));
    }
    let mut conn = pool.acquire().await?;
    db::donations::list(&mut conn, filter).await
}

/// Claim history of a donation, oldest first.
pub async fn list_acceptances(pool: &SqlitePool, donation_id: &str) -> Result<Vec<Acceptance>> {
    let mut conn = pool.acquire().await?;
    if db::donations::status_and_owner(&mut conn, donation_id)
        .await?
        .is_none()
    {
        return Err(ServiceError::NotFound(format!("donation {donation_id}")));
    }
    db::acceptances::list_for_donation(&mut conn, donation_id).await
}

// ─────────────────────────────────────────────────────────
// Transitions
// ─────────────────────────────────────────────────────────

/// Claim an `available` donation for `volunteer_id`.
///
/// Linearizable against other claims on the same donation: exactly one
/// caller wins, every other caller gets [`ServiceError::DonationUnavailable`]
/// (also returned for unknown ids). No retries are attempted here.
pub async fn accept_donation(
    pool: &SqlitePool,
    donation_id: &str,
    volunteer_id: &str,
) -> Result<Acceptance> {
    let from = DonationStatus::Available;
    let to = next_status(from, LifecycleEvent::Claim)?;
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    let claimed =
        db::donations::compare_and_set_status(&mut tx, donation_id, from, to, None, now).await?;
    if claimed == 0 {
        debug!("Claim on donation {donation_id} by volunteer {volunteer_id} lost: not available");
        return Err(ServiceError::DonationUnavailable);
    }

    let acceptance = Acceptance {
        id: Uuid::new_v4().to_string(),
        donation_id: donation_id.to_string(),
        volunteer_id: volunteer_id.to_string(),
        status: AcceptanceStatus::Active,
        accepted_at: now,
        completed_at: None,
    };
    db::acceptances::insert(&mut tx, &acceptance).await?;

    tx.commit().await?;

    info!("Donation {donation_id} claimed by volunteer {volunteer_id}");
    Ok(acceptance)
}

/// Mark a claimed donation as delivered.
///
/// Only the volunteer holding the active claim may do this; anyone else,
/// including the same volunteer after a successful completion, gets
/// [`ServiceError::NotAuthorized`]. The donation and its acceptance move to
/// `completed` together or not at all.
pub async fn complete_donation(
    pool: &SqlitePool,
    donation_id: &str,
    volunteer_id: &str,
) -> Result<()> {
    let from = DonationStatus::Accepted;
    let to = next_status(from, LifecycleEvent::Fulfill)?;
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    let Some(acceptance) =
        db::acceptances::complete_active(&mut tx, donation_id, volunteer_id, now).await?
    else {
        warn!("Volunteer {volunteer_id} holds no active claim on donation {donation_id}");
        return Err(ServiceError::NotAuthorized);
    };

    let updated =
        db::donations::compare_and_set_status(&mut tx, donation_id, from, to, None, now).await?;
    if updated == 0 {
        // An active claim whose donation is not `accepted`; leave both untouched.
        let current = db::donations::status_and_owner(&mut tx, donation_id).await?;
        return Err(match current {
            Some((status, _)) => ServiceError::InvalidTransition {
                from: status,
                event: LifecycleEvent::Fulfill,
            },
            None => ServiceError::NotFound(format!("donation {donation_id}")),
        });
    }

    tx.commit().await?;

    info!(
        "Donation {donation_id} completed by volunteer {volunteer_id} (acceptance {})",
        acceptance.id
    );
    Ok(())
}

/// Withdraw an unclaimed donation. Only its donor may do this.
pub async fn cancel_donation(
    pool: &SqlitePool,
    donation_id: &str,
    donor_id: &str,
) -> Result<Donation> {
    let from = DonationStatus::Available;
    let to = next_status(from, LifecycleEvent::Cancel)?;
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    let updated = db::donations::compare_and_set_status(
        &mut tx,
        donation_id,
        from,
        to,
        Some(donor_id),
        now,
    )
    .await?;
    if updated == 0 {
        let current = db::donations::status_and_owner(&mut tx, donation_id).await?;
        return Err(match current {
            None => ServiceError::NotFound(format!("donation {donation_id}")),
            Some((_, owner)) if owner != donor_id => ServiceError::NotAuthorized,
            Some((status, _)) => ServiceError::InvalidTransition {
                from: status,
                event: LifecycleEvent::Cancel,
            },
        });
    }

    let donation = db::donations::get(&mut tx, donation_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("donation {donation_id}")))?;
    tx.commit().await?;

    info!("Donation {donation_id} cancelled by donor {donor_id}");
    Ok(donation)
}
