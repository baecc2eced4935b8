//! Expense storage behind the tool handlers.
//!
//! Tools never talk to a database directly; they hold an
//! [`ExpenseStore`] so the backend is swappable and tests can run against
//! the in-memory implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

pub type Result<T> = std::result::Result<T, StoreError>;

/// One recorded expense. Plain spendings have no category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub amount: f64,
    pub category: Option<String>,
    pub date: DateTime<Utc>,
}

/// One spending-limit entry. The latest entry is the active limit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LimitRecord {
    pub limit: f64,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("expense store backend error: {message}")]
    #[diagnostic(code(ledgerweave::store::backend))]
    Backend { message: String },
}

/// Storage capability the finance tools depend on.
///
/// Uncategorized spendings and categorized expenses are kept in separate
/// collections; weekly summaries read expenses only, while budget alerts
/// consider both.
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    /// Record an uncategorized spending.
    async fn insert_spending(&self, amount: f64) -> Result<()>;
    /// Record a categorized expense.
    async fn insert_expense(&self, amount: f64, category: &str) -> Result<()>;
    /// Categorized expenses recorded at or after `since`.
    async fn expenses_since(&self, since: DateTime<Utc>) -> Result<Vec<ExpenseRecord>>;
    /// Total across both collections at or after `since`.
    async fn total_since(&self, since: DateTime<Utc>) -> Result<f64>;
    /// Record a new spending limit.
    async fn insert_limit(&self, limit: f64) -> Result<()>;
    /// The most recently set limit, if any.
    async fn latest_limit(&self) -> Result<Option<f64>>;
}

#[derive(Default)]
struct Collections {
    spendings: Vec<ExpenseRecord>,
    expenses: Vec<ExpenseRecord>,
    limits: Vec<LimitRecord>,
}

/// In-memory store for tests, demos, and single-process runs.
#[derive(Default)]
pub struct InMemoryExpenseStore {
    collections: RwLock<Collections>,
}

impl InMemoryExpenseStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExpenseStore for InMemoryExpenseStore {
    async fn insert_spending(&self, amount: f64) -> Result<()> {
        self.collections.write().await.spendings.push(ExpenseRecord {
            amount,
            category: None,
            date: Utc::now(),
        });
        Ok(())
    }

    async fn insert_expense(&self, amount: f64, category: &str) -> Result<()> {
        self.collections.write().await.expenses.push(ExpenseRecord {
            amount,
            category: Some(category.to_string()),
            date: Utc::now(),
        });
        Ok(())
    }

    async fn expenses_since(&self, since: DateTime<Utc>) -> Result<Vec<ExpenseRecord>> {
        Ok(self
            .collections
            .read()
            .await
            .expenses
            .iter()
            .filter(|e| e.date >= since)
            .cloned()
            .collect())
    }

    async fn total_since(&self, since: DateTime<Utc>) -> Result<f64> {
        let collections = self.collections.read().await;
        let total = collections
            .spendings
            .iter()
            .chain(collections.expenses.iter())
            .filter(|e| e.date >= since)
            .map(|e| e.amount)
            .sum();
        Ok(total)
    }

    async fn insert_limit(&self, limit: f64) -> Result<()> {
        self.collections.write().await.limits.push(LimitRecord {
            limit,
            date: Utc::now(),
        });
        Ok(())
    }

    async fn latest_limit(&self) -> Result<Option<f64>> {
        Ok(self
            .collections
            .read()
            .await
            .limits
            .last()
            .map(|r| r.limit))
    }
}
