//! Acceptance store — one row per (donation, volunteer) claim.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::errors::Result;
use crate::models::{Acceptance, AcceptanceRow};

const ACCEPTANCE_COLUMNS: &str =
    "id, donation_id, volunteer_id, status, accepted_at, completed_at";

pub async fn insert(conn: &mut SqliteConnection, acceptance: &Acceptance) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO acceptances
            (id, donation_id, volunteer_id, status, accepted_at, completed_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&acceptance.id)
    .bind(&acceptance.donation_id)
    .bind(&acceptance.volunteer_id)
    .bind(acceptance.status.as_str())
    .bind(acceptance.accepted_at)
    .bind(acceptance.completed_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Mark `volunteer_id`'s active claim on `donation_id` completed.
///
/// Conditional on the claim still being `active`; returns the updated record,
/// or `None` when the volunteer holds no active claim on the donation.
pub async fn complete_active(
    conn: &mut SqliteConnection,
    donation_id: &str,
    volunteer_id: &str,
    at: DateTime<Utc>,
) -> Result<Option<Acceptance>> {
    let row = sqlx::query_as::<_, AcceptanceRow>(&format!(
        r#"
        UPDATE acceptances
        SET    status = 'completed', completed_at = ?1
        WHERE  donation_id = ?2 AND volunteer_id = ?3 AND status = 'active'
        RETURNING {ACCEPTANCE_COLUMNS}
        "#
    ))
    .bind(at)
    .bind(donation_id)
    .bind(volunteer_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(Acceptance::try_from).transpose()
}

/// Every claim ever recorded for a donation, oldest first.
pub async fn list_for_donation(
    conn: &mut SqliteConnection,
    donation_id: &str,
) -> Result<Vec<Acceptance>> {
    let rows = sqlx::query_as::<_, AcceptanceRow>(&format!(
        "SELECT {ACCEPTANCE_COLUMNS} FROM acceptances WHERE donation_id = ?1 ORDER BY accepted_at ASC, id ASC"
    ))
    .bind(donation_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(Acceptance::try_from).collect()
}
