//! Donation store — rows in `donations` and their ordered `donation_photos`.
//!
//! Pure data access: no lifecycle rules live here. Status changes go through
//! [`compare_and_set_status`], which only touches a row whose stored status
//! still equals the expected one.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::errors::Result;
use crate::metrics::AreaStat;
use crate::models::{area_key, Donation, DonationRow, DonationStatus, ListFilter, SortKey};

const DONATION_COLUMNS: &str = r#"
    id, donor_id, food_type, approx_quantity, quantity_unit, area,
    pickup_address, preferred_pickup_time, contact_number, status,
    suggested_volunteer_id, created_at, accepted_at, completed_at
"#;

// ─────────────────────────────────────────────────────────
// Writes
// ─────────────────────────────────────────────────────────

/// Insert a donation row and its photos, in order.
///
/// Run inside a transaction so a failed photo insert leaves no orphan row.
pub async fn insert(conn: &mut SqliteConnection, donation: &Donation) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO donations
            (id, donor_id, food_type, approx_quantity, quantity_unit, area,
             pickup_address, preferred_pickup_time, contact_number, status,
             suggested_volunteer_id, created_at, accepted_at, completed_at, area_key)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
    )
    .bind(&donation.id)
    .bind(&donation.donor_id)
    .bind(&donation.food_type)
    .bind(donation.approx_quantity)
    .bind(&donation.quantity_unit)
    .bind(&donation.area)
    .bind(&donation.pickup_address)
    .bind(donation.preferred_pickup_time)
    .bind(&donation.contact_number)
    .bind(donation.status.as_str())
    .bind(&donation.suggested_volunteer_id)
    .bind(donation.created_at)
    .bind(donation.accepted_at)
    .bind(donation.completed_at)
    .bind(area_key(&donation.area))
    .execute(&mut *conn)
    .await?;

    for (position, url) in donation.photos.iter().enumerate() {
        sqlx::query("INSERT INTO donation_photos (donation_id, position, url) VALUES (?1, ?2, ?3)")
            .bind(&donation.id)
            .bind(position as i64)
            .bind(url)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Move a donation from `expected` to `next` if, and only if, its stored
/// status is still `expected` (and, when `donor_id` is given, it belongs to
/// that donor).
///
/// `accepted_at` / `completed_at` are stamped with `at` when `next` is
/// `accepted` / `completed`. Returns the number of rows changed: `0` means
/// the guard did not hold (or the donation does not exist).
pub async fn compare_and_set_status(
    conn: &mut SqliteConnection,
    id: &str,
    expected: DonationStatus,
    next: DonationStatus,
    donor_id: Option<&str>,
    at: DateTime<Utc>,
) -> Result<u64> {
    let affected = sqlx::query(
        r#"
        UPDATE donations
        SET    status       = ?1,
               accepted_at  = CASE WHEN ?1 = 'accepted'  THEN ?2 ELSE accepted_at  END,
               completed_at = CASE WHEN ?1 = 'completed' THEN ?2 ELSE completed_at END
        WHERE  id = ?3
          AND  status = ?4
          AND  (?5 IS NULL OR donor_id = ?5)
        "#,
    )
    .bind(next.as_str())
    .bind(at)
    .bind(id)
    .bind(expected.as_str())
    .bind(donor_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    Ok(affected)
}

// ─────────────────────────────────────────────────────────
// Reads
// ─────────────────────────────────────────────────────────

/// Point lookup by id, photos included.
pub async fn get(conn: &mut SqliteConnection, id: &str) -> Result<Option<Donation>> {
    let row = sqlx::query_as::<_, DonationRow>(&format!(
        "SELECT {DONATION_COLUMNS} FROM donations WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let photos = photos_for(conn, &[row.id.clone()])
                .await?
                .remove(&row.id)
                .unwrap_or_default();
            Ok(Some(row.into_donation(photos)?))
        }
        None => Ok(None),
    }
}

/// Current status and owning donor of a donation, if it exists.
pub async fn status_and_owner(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<(DonationStatus, String)>> {
    let row: Option<(String, String)> =
        sqlx::query_as("SELECT status, donor_id FROM donations WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    row.map(|(status, donor)| -> Result<(DonationStatus, String)> {
        Ok((status.parse()?, donor))
    })
    .transpose()
}

/// Filtered, sorted, paginated listing with photos attached.
pub async fn list(conn: &mut SqliteConnection, filter: &ListFilter) -> Result<Vec<Donation>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {DONATION_COLUMNS} FROM donations WHERE status = "
    ));
    qb.push_bind(filter.status.as_str());

    if let Some(area) = filter.area.as_deref().map(area_key).filter(|a| !a.is_empty()) {
        // Both sides are already folded; LIKE's own folding is ASCII-only.
        qb.push(" AND area_key LIKE ")
            .push_bind(format!("%{}%", escape_like(&area)))
            .push(" ESCAPE '\\'");
    }

    qb.push(" ORDER BY ")
        .push(order_clause(filter.sort))
        .push(" LIMIT ")
        .push_bind(i64::from(filter.limit))
        .push(" OFFSET ")
        .push_bind(filter.offset());

    let rows = qb
        .build_query_as::<DonationRow>()
        .fetch_all(&mut *conn)
        .await?;

    let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
    let mut photos = photos_for(conn, &ids).await?;

    rows.into_iter()
        .map(|row| {
            let urls = photos.remove(&row.id).unwrap_or_default();
            row.into_donation(urls)
        })
        .collect()
}

fn order_clause(sort: SortKey) -> &'static str {
    match sort {
        SortKey::PickupTime => {
            "preferred_pickup_time IS NULL, preferred_pickup_time ASC, created_at DESC, id ASC"
        }
        SortKey::Area => "area ASC, created_at DESC, id ASC",
        SortKey::CreatedAt => "created_at DESC, id ASC",
    }
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Photo URLs for each of `ids`, in insertion order.
async fn photos_for(
    conn: &mut SqliteConnection,
    ids: &[String],
) -> Result<HashMap<String, Vec<String>>> {
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    if ids.is_empty() {
        return Ok(grouped);
    }

    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT donation_id, url FROM donation_photos WHERE donation_id IN (",
    );
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.as_str());
    }
    separated.push_unseparated(") ORDER BY donation_id, position");

    let rows: Vec<(String, String)> = qb.build_query_as().fetch_all(&mut *conn).await?;
    for (donation_id, url) in rows {
        grouped.entry(donation_id).or_default().push(url);
    }
    Ok(grouped)
}

// ─────────────────────────────────────────────────────────
// Aggregates
// ─────────────────────────────────────────────────────────

/// `(count, summed quantity)` over donations in `status`.
pub async fn count_and_sum_by_status(
    conn: &mut SqliteConnection,
    status: DonationStatus,
) -> Result<(i64, i64)> {
    let row: (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(approx_quantity), 0) FROM donations WHERE status = ?1",
    )
    .bind(status.as_str())
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}

/// Number of donations whose status is any of `statuses`.
pub async fn count_in_statuses(
    conn: &mut SqliteConnection,
    statuses: &[DonationStatus],
) -> Result<i64> {
    if statuses.is_empty() {
        return Ok(0);
    }
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM donations WHERE status IN (");
    let mut separated = qb.separated(", ");
    for status in statuses {
        separated.push_bind(status.as_str());
    }
    separated.push_unseparated(")");

    let (count,): (i64,) = qb.build_query_as().fetch_one(&mut *conn).await?;
    Ok(count)
}

/// Per-area count and summed quantity over donations in `status`, by area.
///
/// Areas with no matching donation do not appear.
pub async fn area_breakdown(
    conn: &mut SqliteConnection,
    status: DonationStatus,
) -> Result<Vec<AreaStat>> {
    let rows = sqlx::query_as::<_, AreaStat>(
        r#"
        SELECT   area,
                 COUNT(*)                            AS donations_count,
                 COALESCE(SUM(approx_quantity), 0)   AS meals_served
        FROM     donations
        WHERE    status = ?1
        GROUP BY area
        ORDER BY area ASC
        "#,
    )
    .bind(status.as_str())
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// `(total count, summed quantity, completed count)` for one donor, any status.
pub async fn donor_summary(conn: &mut SqliteConnection, donor_id: &str) -> Result<(i64, i64, i64)> {
    let row: (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COALESCE(SUM(approx_quantity), 0),
               COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0)
        FROM   donations
        WHERE  donor_id = ?1
        "#,
    )
    .bind(donor_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}
