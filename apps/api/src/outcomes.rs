//! Where bid outcomes go once `/ai/rate/feedback` accepts them.
//!
//! Nothing reads these back inside the service; they are kept for offline
//! training of the learned win model.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use crate::models::outcome::RateOutcomeRecord;

#[async_trait]
pub trait OutcomeSink: Send + Sync {
    async fn record(&self, outcome: RateOutcomeRecord) -> Result<()>;

    fn backend(&self) -> &'static str;
}

/// Appends to the `rate_outcomes` table.
pub struct PgOutcomeSink {
    pool: PgPool,
}

impl PgOutcomeSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutcomeSink for PgOutcomeSink {
    async fn record(&self, outcome: RateOutcomeRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO rate_outcomes
                (id, job_id, freelancer_id, proposed_rate, outcome, final_rate, client_feedback, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(outcome.id)
        .bind(&outcome.job_id)
        .bind(&outcome.freelancer_id)
        .bind(outcome.proposed_rate)
        .bind(outcome.outcome.as_str())
        .bind(outcome.final_rate)
        .bind(&outcome.client_feedback)
        .bind(outcome.recorded_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("inserting outcome {} for job {}", outcome.id, outcome.job_id))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

/// Logs outcomes when no database is configured.
pub struct TracingOutcomeSink;

#[async_trait]
impl OutcomeSink for TracingOutcomeSink {
    async fn record(&self, outcome: RateOutcomeRecord) -> Result<()> {
        info!(
            outcome_id = %outcome.id,
            job_id = %outcome.job_id,
            freelancer_id = %outcome.freelancer_id,
            proposed_rate = outcome.proposed_rate,
            final_rate = ?outcome.final_rate,
            outcome = outcome.outcome.as_str(),
            "Bid outcome (not persisted)"
        );
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "log"
    }
}
