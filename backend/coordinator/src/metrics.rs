//! Reporting metrics derived from the donation store.
//!
//! Read-only. Each report's queries run inside one read transaction so the
//! numbers come from a single snapshot, even while claims and completions
//! are committing concurrently.

use serde::Serialize;
use sqlx::SqlitePool;

use crate::db;
use crate::errors::Result;
use crate::models::DonationStatus;

/// Completed-donation totals for one area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AreaStat {
    pub area: String,
    pub donations_count: i64,
    pub meals_served: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    /// Quantity summed over completed donations.
    pub total_meals_served: i64,
    /// Donations still `available` or `accepted`.
    pub active_donations: i64,
    pub completed_donations: i64,
    /// One entry per area with at least one completed donation, by area.
    pub area_stats: Vec<AreaStat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorStatsReport {
    pub total_donations: i64,
    pub total_meals_shared: i64,
    pub completed_donations: i64,
}

pub async fn get_metrics(pool: &SqlitePool) -> Result<MetricsReport> {
    let mut tx = pool.begin().await?;

    let (completed_donations, total_meals_served) =
        db::donations::count_and_sum_by_status(&mut tx, DonationStatus::Completed).await?;
    let active_donations =
        db::donations::count_in_statuses(&mut tx, &DonationStatus::ACTIVE).await?;
    let area_stats = db::donations::area_breakdown(&mut tx, DonationStatus::Completed).await?;

    tx.commit().await?;

    Ok(MetricsReport {
        total_meals_served,
        active_donations,
        completed_donations,
        area_stats,
    })
}

/// Totals for one donor. A donor with no donations gets all zeros.
pub async fn get_donor_stats(pool: &SqlitePool, donor_id: &str) -> Result<DonorStatsReport> {
    let mut conn = pool.acquire().await?;
    let (total_donations, total_meals_shared, completed_donations) =
        db::donations::donor_summary(&mut conn, donor_id).await?;

    Ok(DonorStatsReport {
        total_donations,
        total_meals_shared,
        completed_donations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_pool;
    use crate::lifecycle;
    use crate::models::{NewDonation, MAX_APPROX_QUANTITY};

    async fn post(pool: &SqlitePool, donor: &str, area: &str, quantity: i64) -> String {
        let new = NewDonation {
            food_type: "Chapati".into(),
            approx_quantity: quantity,
            area: area.into(),
            pickup_address: "1 Temple St".into(),
            contact_number: "555-0123".into(),
            ..Default::default()
        };
        lifecycle::create_donation(pool, donor, new).await.unwrap().id
    }

    async fn deliver(pool: &SqlitePool, id: &str) {
        lifecycle::accept_donation(pool, id, "vol-1").await.unwrap();
        lifecycle::complete_donation(pool, id, "vol-1").await.unwrap();
    }

    #[tokio::test]
    async fn metrics_sum_completed_and_group_by_area() {
        let (_dir, pool) = test_pool().await;
        let a = post(&pool, "donor-1", "X", 10).await;
        let b = post(&pool, "donor-2", "X", 5).await;
        post(&pool, "donor-1", "Y", 7).await;
        deliver(&pool, &a).await;
        deliver(&pool, &b).await;

        let report = get_metrics(&pool).await.unwrap();
        assert_eq!(
            report,
            MetricsReport {
                total_meals_served: 15,
                active_donations: 1,
                completed_donations: 2,
                area_stats: vec![AreaStat {
                    area: "X".into(),
                    donations_count: 2,
                    meals_served: 15,
                }],
            }
        );
    }

    #[tokio::test]
    async fn metrics_count_accepted_as_active_and_ignore_cancelled() {
        let (_dir, pool) = test_pool().await;
        let claimed = post(&pool, "donor-1", "X", 3).await;
        let withdrawn = post(&pool, "donor-1", "Y", 4).await;
        post(&pool, "donor-1", "Z", 2).await;
        lifecycle::accept_donation(&pool, &claimed, "vol-1").await.unwrap();
        lifecycle::cancel_donation(&pool, &withdrawn, "donor-1").await.unwrap();

        let report = get_metrics(&pool).await.unwrap();
        assert_eq!(report.active_donations, 2);
        assert_eq!(report.completed_donations, 0);
        assert_eq!(report.total_meals_served, 0);
        assert!(report.area_stats.is_empty());
    }

    #[tokio::test]
    async fn reports_survive_largest_allowed_quantities() {
        let (_dir, pool) = test_pool().await;
        let a = post(&pool, "donor-1", "X", MAX_APPROX_QUANTITY).await;
        let b = post(&pool, "donor-1", "X", MAX_APPROX_QUANTITY).await;
        deliver(&pool, &a).await;
        deliver(&pool, &b).await;

        let report = get_metrics(&pool).await.unwrap();
        assert_eq!(report.total_meals_served, 2 * MAX_APPROX_QUANTITY);
        assert_eq!(report.area_stats[0].meals_served, 2 * MAX_APPROX_QUANTITY);

        let stats = get_donor_stats(&pool, "donor-1").await.unwrap();
        assert_eq!(stats.total_meals_shared, 2 * MAX_APPROX_QUANTITY);
    }

    #[tokio::test]
    async fn donor_stats_cover_every_status() {
        let (_dir, pool) = test_pool().await;
        let first = post(&pool, "donor-1", "X", 10).await;
        post(&pool, "donor-1", "X", 6).await;
        post(&pool, "donor-2", "X", 99).await;
        deliver(&pool, &first).await;

        let stats = get_donor_stats(&pool, "donor-1").await.unwrap();
        assert_eq!(
            stats,
            DonorStatsReport {
                total_donations: 2,
                total_meals_shared: 16,
                completed_donations: 1,
            }
        );
    }

    #[tokio::test]
    async fn donor_without_donations_gets_zeros() {
        let (_dir, pool) = test_pool().await;
        let stats = get_donor_stats(&pool, "nobody").await.unwrap();
        assert_eq!(
            stats,
            DonorStatsReport {
                total_donations: 0,
                total_meals_shared: 0,
                completed_donations: 0,
            }
        );
    }

    #[test]
    fn report_serializes_with_camel_case_keys() {
        let report = MetricsReport {
            total_meals_served: 15,
            active_donations: 1,
            completed_donations: 2,
            area_stats: vec![AreaStat {
                area: "X".into(),
                donations_count: 2,
                meals_served: 15,
            }],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["totalMealsServed"], 15);
        assert_eq!(json["areaStats"][0]["donationsCount"], 2);
        assert_eq!(json["areaStats"][0]["mealsServed"], 15);
    }
}
