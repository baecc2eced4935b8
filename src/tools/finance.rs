//! The built-in finance tool set.
//!
//! Five tools over an [`ExpenseStore`]: record a spending, summarize the
//! past week, log a categorized expense, generate tips, and set a spending
//! limit. Two of them ([`LogExpense`], [`ProvideTips`]) make their own model
//! call through the injected [`ChatModel`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{Map, Value, json};

use crate::llm::ChatModel;
use crate::message::Message;
use crate::store::{ExpenseRecord, ExpenseStore};

use super::schema::{ArgSchema, ArgType};
use super::{Tool, ToolError, ToolOutput, ToolRegistry};

/// Category label used when the model returns nothing usable.
const UNCATEGORIZED: &str = "uncategorized";

fn require_f64(args: &Map<String, Value>, name: &str, tool: &str) -> Result<f64, ToolError> {
    args.get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolError::Validation {
            tool: tool.to_string(),
            message: format!("argument '{name}' must be a number"),
        })
}

/// Weekly per-category totals, first-seen category order.
fn summarize_by_category(expenses: &[ExpenseRecord]) -> Vec<(String, f64)> {
    let mut totals: Vec<(String, f64)> = Vec::new();
    for expense in expenses {
        let category = expense
            .category
            .as_deref()
            .unwrap_or(UNCATEGORIZED)
            .to_string();
        if let Some(entry) = totals.iter_mut().find(|(c, _)| *c == category) {
            entry.1 += expense.amount;
        } else {
            totals.push((category, expense.amount));
        }
    }
    totals
}

/// Budget check shared by the recording tools: when a limit is set and the
/// running weekly total exceeds it, produce an alert entry.
async fn budget_alert(store: &dyn ExpenseStore) -> Result<Option<Value>, ToolError> {
    let Some(limit) = store.latest_limit().await? else {
        return Ok(None);
    };
    let week_ago = Utc::now() - Duration::days(7);
    let total = store.total_since(week_ago).await?;
    if total > limit {
        Ok(Some(json!({
            "message": format!("Weekly spending of ${total} exceeds your limit of ${limit}."),
            "limit": limit,
            "total": total,
            "date": Utc::now().to_rfc3339(),
        })))
    } else {
        Ok(None)
    }
}

/// Records an uncategorized spending amount.
pub struct SaveSpending {
    store: Arc<dyn ExpenseStore>,
}

impl SaveSpending {
    #[must_use]
    pub fn new(store: Arc<dyn ExpenseStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SaveSpending {
    fn name(&self) -> &str {
        "save_spending"
    }

    fn description(&self) -> &str {
        "Saves the amount of money the user spent."
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::new().required("amount", ArgType::Number, "The amount of money spent.")
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let amount = require_f64(args, "amount", self.name())?;
        self.store.insert_spending(amount).await?;

        let mut output =
            ToolOutput::text(format!("Successfully saved your spending of ${amount}."))
                .with_expense(json!({
                    "amount": amount,
                    "date": Utc::now().to_rfc3339(),
                }));
        if let Some(alert) = budget_alert(self.store.as_ref()).await? {
            output = output.with_alert(alert);
        }
        Ok(output)
    }
}

/// Summarizes categorized expenses from the past seven days.
pub struct CheckPastWeekSpending {
    store: Arc<dyn ExpenseStore>,
}

impl CheckPastWeekSpending {
    #[must_use]
    pub fn new(store: Arc<dyn ExpenseStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CheckPastWeekSpending {
    fn name(&self) -> &str {
        "check_past_week_spending"
    }

    fn description(&self) -> &str {
        "Summarizes the user's spending over the past week by category."
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::new()
    }

    async fn call(&self, _args: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let week_ago = Utc::now() - Duration::days(7);
        let expenses = self.store.expenses_since(week_ago).await?;
        if expenses.is_empty() {
            return Ok(ToolOutput::text(
                "You have no recorded expenses for the past week.",
            ));
        }

        let lines: Vec<String> = summarize_by_category(&expenses)
            .into_iter()
            .map(|(category, total)| format!("You spent ${total} on {category}."))
            .collect();
        Ok(ToolOutput::text(format!(
            "Here's your spending summary for the past week:\n{}",
            lines.join("\n")
        )))
    }
}

/// Records an expense, asking the model to assign a category.
pub struct LogExpense {
    store: Arc<dyn ExpenseStore>,
    model: Arc<dyn ChatModel>,
}

impl LogExpense {
    #[must_use]
    pub fn new(store: Arc<dyn ExpenseStore>, model: Arc<dyn ChatModel>) -> Self {
        Self { store, model }
    }
}

#[async_trait]
impl Tool for LogExpense {
    fn name(&self) -> &str {
        "log_expense"
    }

    fn description(&self) -> &str {
        "Logs an expense and assigns it a category."
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::new().required("amount", ArgType::Number, "The amount of the expense.")
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let amount = require_f64(args, "amount", self.name())?;

        let reply = self
            .model
            .invoke(&[
                Message::system(
                    "Assign a short spending category to the expense described by the \
                     conversation. Reply with the category name only.",
                ),
                Message::user(&format!("What category does an expense of ${amount} fall under?")),
            ])
            .await?;
        let trimmed = reply.content.trim();
        let category = if trimmed.is_empty() {
            UNCATEGORIZED.to_string()
        } else {
            trimmed.to_lowercase()
        };

        self.store.insert_expense(amount, &category).await?;

        let mut output = ToolOutput::text(format!(
            "Successfully logged your expense of ${amount} in category {category}."
        ))
        .with_expense(json!({
            "amount": amount,
            "category": category,
            "date": Utc::now().to_rfc3339(),
        }))
        .with_spending_category(json!(category));
        if let Some(alert) = budget_alert(self.store.as_ref()).await? {
            output = output.with_alert(alert);
        }
        Ok(output)
    }
}

/// Generates personalized tips from the past week's spending data.
pub struct ProvideTips {
    store: Arc<dyn ExpenseStore>,
    model: Arc<dyn ChatModel>,
}

impl ProvideTips {
    #[must_use]
    pub fn new(store: Arc<dyn ExpenseStore>, model: Arc<dyn ChatModel>) -> Self {
        Self { store, model }
    }
}

#[async_trait]
impl Tool for ProvideTips {
    fn name(&self) -> &str {
        "provide_tips"
    }

    fn description(&self) -> &str {
        "Provides personalized financial tips based on recent spending."
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::new()
    }

    async fn call(&self, _args: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let week_ago = Utc::now() - Duration::days(7);
        let expenses = self.store.expenses_since(week_ago).await?;

        let data = if expenses.is_empty() {
            "- No expenses recorded this week.".to_string()
        } else {
            summarize_by_category(&expenses)
                .into_iter()
                .map(|(category, total)| format!("- Spent ${total} on {category}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let reply = self
            .model
            .invoke(&[Message::user(&format!(
                "Based on the following spending data, provide personalized financial tips:\n{data}"
            ))])
            .await?;
        Ok(ToolOutput::text(reply.content))
    }
}

/// Sets a new spending limit. Limits are append-only; the newest wins.
pub struct SetSpendingLimit {
    store: Arc<dyn ExpenseStore>,
}

impl SetSpendingLimit {
    #[must_use]
    pub fn new(store: Arc<dyn ExpenseStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for SetSpendingLimit {
    fn name(&self) -> &str {
        "set_spending_limit"
    }

    fn description(&self) -> &str {
        "Sets the user's weekly spending limit."
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::new().required("limit", ArgType::Number, "The spending limit amount.")
    }

    async fn call(&self, args: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let limit = require_f64(args, "limit", self.name())?;
        self.store.insert_limit(limit).await?;
        Ok(
            ToolOutput::text(format!("Successfully set a spending limit of ${limit}."))
                .with_spending_limit(json!({
                    "limit": limit,
                    "date": Utc::now().to_rfc3339(),
                })),
        )
    }
}

/// Builds the standard five-tool registry in its canonical order.
#[must_use]
pub fn finance_tools(store: Arc<dyn ExpenseStore>, model: Arc<dyn ChatModel>) -> ToolRegistry {
    ToolRegistry::new()
        .with_tool(Arc::new(SaveSpending::new(Arc::clone(&store))))
        .with_tool(Arc::new(CheckPastWeekSpending::new(Arc::clone(&store))))
        .with_tool(Arc::new(LogExpense::new(
            Arc::clone(&store),
            Arc::clone(&model),
        )))
        .with_tool(Arc::new(ProvideTips::new(Arc::clone(&store), model)))
        .with_tool(Arc::new(SetSpendingLimit::new(store)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;
    use crate::store::InMemoryExpenseStore;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn save_spending_confirms_and_emits_expense_delta() {
        let store = Arc::new(InMemoryExpenseStore::new());
        let tool = SaveSpending::new(store);
        let output = tool.call(&args(json!({"amount": 100.0}))).await.expect("call");
        assert_eq!(output.text, "Successfully saved your spending of $100.");
        assert_eq!(output.expenses.len(), 1);
        assert_eq!(output.expenses[0]["amount"], json!(100.0));
        assert!(output.alerts.is_empty());
    }

    #[tokio::test]
    async fn save_spending_raises_alert_over_limit() {
        let store: Arc<dyn ExpenseStore> = Arc::new(InMemoryExpenseStore::new());
        store.insert_limit(50.0).await.expect("limit");
        let tool = SaveSpending::new(Arc::clone(&store));
        let output = tool.call(&args(json!({"amount": 80.0}))).await.expect("call");
        assert_eq!(output.alerts.len(), 1);
        assert_eq!(output.alerts[0]["limit"], json!(50.0));
    }

    #[tokio::test]
    async fn weekly_summary_groups_by_category() {
        let store: Arc<dyn ExpenseStore> = Arc::new(InMemoryExpenseStore::new());
        store.insert_expense(20.0, "food").await.expect("insert");
        store.insert_expense(15.0, "food").await.expect("insert");
        store.insert_expense(40.0, "transport").await.expect("insert");

        let tool = CheckPastWeekSpending::new(store);
        let output = tool.call(&Map::new()).await.expect("call");
        assert_eq!(
            output.text,
            "Here's your spending summary for the past week:\n\
             You spent $35 on food.\n\
             You spent $40 on transport."
        );
    }

    #[tokio::test]
    async fn weekly_summary_handles_empty_store() {
        let store = Arc::new(InMemoryExpenseStore::new());
        let tool = CheckPastWeekSpending::new(store);
        let output = tool.call(&Map::new()).await.expect("call");
        assert_eq!(output.text, "You have no recorded expenses for the past week.");
    }

    #[tokio::test]
    async fn log_expense_uses_model_assigned_category() {
        let store: Arc<dyn ExpenseStore> = Arc::new(InMemoryExpenseStore::new());
        let model = Arc::new(ScriptedModel::new(vec![Message::assistant("Food")]));
        let tool = LogExpense::new(Arc::clone(&store), model);

        let output = tool.call(&args(json!({"amount": 25.0}))).await.expect("call");
        assert_eq!(
            output.text,
            "Successfully logged your expense of $25 in category food."
        );
        assert_eq!(output.spending_categories, vec![json!("food")]);

        let week_ago = Utc::now() - Duration::days(7);
        let stored = store.expenses_since(week_ago).await.expect("query");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].category.as_deref(), Some("food"));
    }

    #[tokio::test]
    async fn provide_tips_feeds_summary_to_model() {
        let store: Arc<dyn ExpenseStore> = Arc::new(InMemoryExpenseStore::new());
        store.insert_expense(60.0, "dining").await.expect("insert");
        let model = Arc::new(ScriptedModel::new(vec![Message::assistant(
            "Cook at home more often.",
        )]));
        let tool = ProvideTips::new(store, model);

        let output = tool.call(&Map::new()).await.expect("call");
        assert_eq!(output.text, "Cook at home more often.");
    }

    #[tokio::test]
    async fn set_spending_limit_appends_new_entry() {
        let store: Arc<dyn ExpenseStore> = Arc::new(InMemoryExpenseStore::new());
        let tool = SetSpendingLimit::new(Arc::clone(&store));

        let output = tool.call(&args(json!({"limit": 500.0}))).await.expect("call");
        assert_eq!(output.text, "Successfully set a spending limit of $500.");
        assert_eq!(output.spending_limits.len(), 1);

        tool.call(&args(json!({"limit": 300.0}))).await.expect("call");
        assert_eq!(store.latest_limit().await.expect("query"), Some(300.0));
    }

    #[test]
    fn registry_lists_tools_in_canonical_order() {
        let store: Arc<dyn ExpenseStore> = Arc::new(InMemoryExpenseStore::new());
        let model: Arc<dyn ChatModel> = Arc::new(ScriptedModel::new(vec![]));
        let registry = finance_tools(store, model);
        assert_eq!(
            registry.names(),
            [
                "save_spending",
                "check_past_week_spending",
                "log_expense",
                "provide_tips",
                "set_spending_limit",
            ]
        );
    }
}
