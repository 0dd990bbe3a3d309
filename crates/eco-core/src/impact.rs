use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Pool, Sqlite};
use thiserror::Error;

/// Running platform-wide totals. Single row, created lazily.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ImpactTotals {
    pub total_meals_saved: f64,
    pub total_food_waste_kg: f64,
    pub total_ewaste_items: f64,
    pub total_co2_saved_kg: f64,
    pub total_volunteers_active: f64,
    pub total_donations: f64,
}

/// Signed adjustment to the wired aggregate fields. The reserved
/// volunteer/donation totals are not part of any delta.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImpactDelta {
    pub meals_saved: f64,
    pub food_waste_kg: f64,
    pub ewaste_items: f64,
    pub co2_saved_kg: f64,
}

impl ImpactDelta {
    pub const ZERO: ImpactDelta = ImpactDelta {
        meals_saved: 0.0,
        food_waste_kg: 0.0,
        ewaste_items: 0.0,
        co2_saved_kg: 0.0,
    };

    pub fn is_zero(&self) -> bool {
        self.meals_saved == 0.0
            && self.food_waste_kg == 0.0
            && self.ewaste_items == 0.0
            && self.co2_saved_kg == 0.0
    }

    pub fn inverse(&self) -> ImpactDelta {
        ImpactDelta {
            meals_saved: -self.meals_saved,
            food_waste_kg: -self.food_waste_kg,
            ewaste_items: -self.ewaste_items,
            co2_saved_kg: -self.co2_saved_kg,
        }
    }

    /// Field-wise `self - old`, the adjustment for an edit while claimed.
    pub fn minus(&self, old: &ImpactDelta) -> ImpactDelta {
        ImpactDelta {
            meals_saved: self.meals_saved - old.meals_saved,
            food_waste_kg: self.food_waste_kg - old.food_waste_kg,
            ewaste_items: self.ewaste_items - old.ewaste_items,
            co2_saved_kg: self.co2_saved_kg - old.co2_saved_kg,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("empty delta")]
    EmptyDelta,
    #[error("impact store unavailable: {0}")]
    StoreUnavailable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImpactOutcome {
    Applied(ImpactTotals),
    Skipped(SkipReason),
}

/// Sole owner of the aggregate record. Handlers go through `apply` and
/// `read`; nothing else touches the impact table.
#[derive(Clone)]
pub struct ImpactLedger {
    pool: Pool<Sqlite>,
    service_name: &'static str,
}

const TOTALS_COLUMNS: &str = "total_meals_saved, total_food_waste_kg, total_ewaste_items, \
     total_co2_saved_kg, total_volunteers_active, total_donations";

impl ImpactLedger {
    pub fn new(pool: Pool<Sqlite>, service_name: &'static str) -> Self {
        Self { pool, service_name }
    }

    /// Find-or-create read of the aggregate record.
    pub async fn read(&self) -> Result<ImpactTotals, sqlx::Error> {
        self.ensure_row().await?;
        sqlx::query_as::<_, ImpactTotals>(&format!(
            "SELECT {TOTALS_COLUMNS} FROM impact WHERE id = 1"
        ))
        .fetch_one(&self.pool)
        .await
    }

    /// Applies a signed delta, clamping each touched field at zero.
    ///
    /// Never fails: accounting is best-effort, so storage errors are logged
    /// and reported as `Skipped`, and the caller's operation proceeds.
    pub async fn apply(&self, delta: ImpactDelta) -> ImpactOutcome {
        if delta.is_zero() {
            crate::metrics::inc_impact_delta_skipped(self.service_name, "empty_delta");
            return ImpactOutcome::Skipped(SkipReason::EmptyDelta);
        }

        match self.apply_inner(delta).await {
            Ok(totals) => {
                crate::metrics::inc_impact_delta_applied(self.service_name);
                ImpactOutcome::Applied(totals)
            }
            Err(err) => {
                tracing::warn!(error = %err, "impact delta dropped");
                crate::metrics::inc_impact_delta_skipped(self.service_name, "store_unavailable");
                ImpactOutcome::Skipped(SkipReason::StoreUnavailable(err.to_string()))
            }
        }
    }

    async fn apply_inner(&self, delta: ImpactDelta) -> Result<ImpactTotals, sqlx::Error> {
        self.ensure_row().await?;
        // Single statement keeps the increment atomic; MAX floors each
        // field independently after the addition.
        sqlx::query_as::<_, ImpactTotals>(&format!(
            "UPDATE impact SET \
                 total_meals_saved = MAX(total_meals_saved + ?, 0), \
                 total_food_waste_kg = MAX(total_food_waste_kg + ?, 0), \
                 total_ewaste_items = MAX(total_ewaste_items + ?, 0), \
                 total_co2_saved_kg = MAX(total_co2_saved_kg + ?, 0), \
                 updated_at = unixepoch() \
             WHERE id = 1 \
             RETURNING {TOTALS_COLUMNS}"
        ))
        .bind(delta.meals_saved)
        .bind(delta.food_waste_kg)
        .bind(delta.ewaste_items)
        .bind(delta.co2_saved_kg)
        .fetch_one(&self.pool)
        .await
    }

    async fn ensure_row(&self) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO impact (id) VALUES (1)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_ledger() -> (TempDir, ImpactLedger) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("eco.db").display());
        let pool = crate::db::connect(&url).await.unwrap();
        crate::migrations::run(&pool).await.unwrap();
        (dir, ImpactLedger::new(pool, "eco-test"))
    }

    #[tokio::test]
    async fn read_creates_zero_record() {
        let (_dir, ledger) = test_ledger().await;
        let totals = ledger.read().await.unwrap();
        assert_eq!(totals.total_meals_saved, 0.0);
        assert_eq!(totals.total_donations, 0.0);
    }

    #[tokio::test]
    async fn empty_delta_is_skipped() {
        let (_dir, ledger) = test_ledger().await;
        let outcome = ledger.apply(ImpactDelta::ZERO).await;
        assert_eq!(outcome, ImpactOutcome::Skipped(SkipReason::EmptyDelta));
    }

    #[tokio::test]
    async fn apply_accumulates_and_returns_totals() {
        let (_dir, ledger) = test_ledger().await;

        let delta = ImpactDelta {
            meals_saved: 5.0,
            food_waste_kg: 2.0,
            ..ImpactDelta::ZERO
        };
        match ledger.apply(delta).await {
            ImpactOutcome::Applied(totals) => {
                assert_eq!(totals.total_meals_saved, 5.0);
                assert_eq!(totals.total_food_waste_kg, 2.0);
            }
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn negative_delta_clamps_each_field_independently() {
        let (_dir, ledger) = test_ledger().await;

        ledger
            .apply(ImpactDelta {
                meals_saved: 5.0,
                food_waste_kg: 2.0,
                ..ImpactDelta::ZERO
            })
            .await;

        let outcome = ledger
            .apply(ImpactDelta {
                meals_saved: -10.0,
                food_waste_kg: -1.0,
                ..ImpactDelta::ZERO
            })
            .await;

        match outcome {
            ImpactOutcome::Applied(totals) => {
                assert_eq!(totals.total_meals_saved, 0.0);
                assert_eq!(totals.total_food_waste_kg, 1.0);
            }
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn claim_edit_delete_sequence_nets_to_zero() {
        let (_dir, ledger) = test_ledger().await;

        let claimed = ImpactDelta {
            meals_saved: 5.0,
            food_waste_kg: 2.0,
            ..ImpactDelta::ZERO
        };
        ledger.apply(claimed).await;

        let edited = ImpactDelta {
            meals_saved: 8.0,
            food_waste_kg: 2.0,
            ..ImpactDelta::ZERO
        };
        ledger.apply(edited.minus(&claimed)).await;

        let totals = ledger.read().await.unwrap();
        assert_eq!(totals.total_meals_saved, 8.0);

        ledger.apply(edited.inverse()).await;
        let totals = ledger.read().await.unwrap();
        assert_eq!(totals.total_meals_saved, 0.0);
        assert_eq!(totals.total_food_waste_kg, 0.0);
    }

    #[tokio::test]
    async fn store_failure_reports_skipped_not_error() {
        let (_dir, ledger) = test_ledger().await;
        let pool = ledger.pool.clone();
        pool.close().await;

        let outcome = ledger
            .apply(ImpactDelta {
                meals_saved: 1.0,
                ..ImpactDelta::ZERO
            })
            .await;

        assert!(matches!(
            outcome,
            ImpactOutcome::Skipped(SkipReason::StoreUnavailable(_))
        ));
    }
}
