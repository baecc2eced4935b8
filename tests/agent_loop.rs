//! End-to-end loop tests: model, router, tools, barrier, checkpointing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use ledgerweave::agent::{AgentError, FinanceAgent};
use ledgerweave::llm::ScriptedModel;
use ledgerweave::message::{Message, ToolCallRequest};
use ledgerweave::runtimes::runner::RunnerError;
use ledgerweave::runtimes::{
    AppRunner, Checkpoint, Checkpointer, CheckpointerError, CheckpointerType, SessionInit,
};
use ledgerweave::state::AgentState;
use ledgerweave::store::{ExpenseStore, InMemoryExpenseStore};
use ledgerweave::tools::schema::ArgSchema;
use ledgerweave::tools::{Tool, ToolError, ToolOutput, ToolRegistry};

fn tool_call_reply(name: &str, args: serde_json::Value) -> Message {
    Message::assistant_with_tool_calls("", vec![ToolCallRequest::new("c1", name, args)])
}

async fn agent_with_script(responses: Vec<Message>) -> FinanceAgent {
    FinanceAgent::builder()
        .with_model(Arc::new(ScriptedModel::new(responses)))
        .build()
        .await
        .expect("build agent")
}

#[tokio::test]
async fn plain_reply_ends_after_one_model_turn() {
    let agent = agent_with_script(vec![Message::assistant(
        "FINAL ANSWER: I can help you track spending.",
    )])
    .await;

    let reply = agent.call_agent("hello", "t-plain").await.expect("call");
    assert_eq!(reply, "FINAL ANSWER: I can help you track spending.");
}

#[tokio::test]
async fn tool_call_loops_back_to_the_model() {
    let store: Arc<dyn ExpenseStore> = Arc::new(InMemoryExpenseStore::new());
    let agent = FinanceAgent::builder()
        .with_model(Arc::new(ScriptedModel::new(vec![
            tool_call_reply("save_spending", json!({"amount": 100.0})),
            Message::assistant("FINAL ANSWER: saved $100 for you."),
        ])))
        .with_store(Arc::clone(&store))
        .build()
        .await
        .expect("build agent");

    let reply = agent
        .call_agent("I spent $100", "t-save")
        .await
        .expect("call");
    assert_eq!(reply, "FINAL ANSWER: saved $100 for you.");

    // The tool really hit the store.
    let week_ago = chrono::Utc::now() - chrono::Duration::days(7);
    let total = store.total_since(week_ago).await.expect("total");
    assert!((total - 100.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn unknown_tool_is_reported_back_and_loop_continues() {
    let agent = agent_with_script(vec![
        tool_call_reply("wire_transfer", json!({})),
        Message::assistant("FINAL ANSWER: I can't do that."),
    ])
    .await;

    let reply = agent.call_agent("send money", "t-unknown").await.expect("call");
    assert_eq!(reply, "FINAL ANSWER: I can't do that.");
}

#[tokio::test]
async fn step_limit_cuts_a_non_converging_loop() {
    let script: Vec<Message> = (0..4)
        .map(|_| tool_call_reply("check_past_week_spending", json!({})))
        .collect();
    let agent = FinanceAgent::builder()
        .with_model(Arc::new(ScriptedModel::new(script)))
        .with_step_limit(2)
        .build()
        .await
        .expect("build agent");

    let err = agent
        .call_agent("loop forever", "t-limit")
        .await
        .expect_err("must hit the bound");
    match err {
        AgentError::Runner(RunnerError::StepLimitExceeded { limit }) => assert_eq!(limit, 2),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn final_answer_sentinel_does_not_keep_the_loop_alive() {
    // A reply with tool calls routes to tools even if its text claims to be
    // final; the next plain reply ends the run.
    let agent = agent_with_script(vec![
        Message::assistant_with_tool_calls(
            "FINAL ANSWER: checking first",
            vec![ToolCallRequest::new(
                "c1",
                "check_past_week_spending",
                json!({}),
            )],
        ),
        Message::assistant("nothing recorded"),
    ])
    .await;

    let reply = agent.call_agent("summary please", "t-sentinel").await.expect("call");
    assert_eq!(reply, "nothing recorded");
}

#[tokio::test]
async fn thread_resumes_across_runners_with_shared_checkpointer() {
    let agent = agent_with_script(vec![Message::assistant("FINAL ANSWER: noted.")]).await;
    let checkpointer = CheckpointerType::InMemory
        .build(None)
        .await
        .expect("build checkpointer");

    let mut first = AppRunner::with_shared_checkpointer(
        Arc::clone(agent.app()),
        Some(Arc::clone(&checkpointer)),
        15,
    );
    let init = first
        .create_session("t-resume".to_string(), AgentState::new_with_user_message("hi"))
        .await
        .expect("create");
    assert_eq!(init, SessionInit::Fresh);
    first.run_until_complete("t-resume").await.expect("run");

    // A brand-new runner over the same store resumes the thread and appends
    // the new user message to the restored conversation.
    let mut second = AppRunner::with_shared_checkpointer(
        Arc::clone(agent.app()),
        Some(checkpointer),
        15,
    );
    let init = second
        .create_session(
            "t-resume".to_string(),
            AgentState::new_with_user_message("hi again"),
        )
        .await
        .expect("create");
    assert!(matches!(init, SessionInit::Resumed { .. }));

    let session = second.get_session("t-resume").expect("session");
    let messages = session.state.messages.get();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].content, "hi");
    assert_eq!(messages[1].content, "FINAL ANSWER: noted.");
    assert_eq!(messages[2].content, "hi again");
}

#[tokio::test]
async fn call_agent_resumes_the_same_thread() {
    let agent = agent_with_script(vec![
        Message::assistant("FINAL ANSWER: first turn."),
        Message::assistant("FINAL ANSWER: second turn."),
    ])
    .await;

    let first = agent.call_agent("turn one", "t-two-turns").await.expect("first");
    assert_eq!(first, "FINAL ANSWER: first turn.");
    let second = agent.call_agent("turn two", "t-two-turns").await.expect("second");
    assert_eq!(second, "FINAL ANSWER: second turn.");
}

/// Checkpointer whose saves start failing after `allow` successes.
struct BrokenSaves {
    allow: usize,
    saves: AtomicUsize,
}

impl BrokenSaves {
    fn after(allow: usize) -> Arc<Self> {
        Arc::new(Self {
            allow,
            saves: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Checkpointer for BrokenSaves {
    async fn save(&self, _checkpoint: Checkpoint) -> Result<(), CheckpointerError> {
        if self.saves.fetch_add(1, Ordering::SeqCst) >= self.allow {
            return Err(CheckpointerError::Backend {
                message: "disk full".to_string(),
            });
        }
        Ok(())
    }

    async fn load_latest(&self, _session_id: &str) -> Result<Option<Checkpoint>, CheckpointerError> {
        Ok(None)
    }

    async fn list_sessions(&self) -> Result<Vec<String>, CheckpointerError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn failed_initial_checkpoint_save_is_fatal() {
    let agent = agent_with_script(vec![Message::assistant("FINAL ANSWER: ok.")]).await;
    let mut runner = AppRunner::with_shared_checkpointer(
        Arc::clone(agent.app()),
        Some(BrokenSaves::after(0)),
        15,
    );

    let err = runner
        .create_session("t-broken".to_string(), AgentState::new_with_user_message("hi"))
        .await
        .expect_err("save must fail");
    assert!(matches!(err, RunnerError::Checkpointer(_)));
}

#[tokio::test]
async fn failed_step_checkpoint_save_aborts_instead_of_answering() {
    let agent = agent_with_script(vec![Message::assistant("FINAL ANSWER: ok.")]).await;
    let mut runner = AppRunner::with_shared_checkpointer(
        Arc::clone(agent.app()),
        Some(BrokenSaves::after(1)),
        15,
    );

    runner
        .create_session("t-broken".to_string(), AgentState::new_with_user_message("hi"))
        .await
        .expect("initial save allowed");
    let err = runner
        .run_until_complete("t-broken")
        .await
        .expect_err("step save must fail the run");
    assert!(matches!(err, RunnerError::Checkpointer(_)));
}

/// Tool whose backend drops out on the first call and recovers afterwards.
#[derive(Default)]
struct FlakyBackendTool {
    tripped: AtomicBool,
}

#[async_trait]
impl Tool for FlakyBackendTool {
    fn name(&self) -> &str {
        "flaky_backend"
    }

    fn description(&self) -> &str {
        "Writes to a backend that sometimes drops out."
    }

    fn schema(&self) -> ArgSchema {
        ArgSchema::new()
    }

    async fn call(&self, _args: &Map<String, Value>) -> Result<ToolOutput, ToolError> {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            return Err(ToolError::Handler {
                tool: "flaky_backend".to_string(),
                message: "backend briefly unavailable".to_string(),
            });
        }
        Ok(ToolOutput::text("stored"))
    }
}

#[tokio::test]
async fn thread_recovers_after_tool_handler_fatal() {
    let agent = FinanceAgent::builder()
        .with_model(Arc::new(ScriptedModel::new(vec![
            tool_call_reply("flaky_backend", json!({})),
            tool_call_reply("flaky_backend", json!({})),
            Message::assistant("FINAL ANSWER: stored on the second try."),
        ])))
        .with_registry(ToolRegistry::new().with_tool(Arc::new(FlakyBackendTool::default())))
        .build()
        .await
        .expect("build agent");

    // First turn dies in the tool handler.
    let err = agent
        .call_agent("store it", "t-flaky")
        .await
        .expect_err("handler failure is fatal");
    assert!(matches!(err, AgentError::Runner(RunnerError::Node { .. })));

    // The failure cost only that turn: the next one restarts at the model
    // node, retries the tool, and finishes.
    let reply = agent
        .call_agent("try again", "t-flaky")
        .await
        .expect("thread takes a fresh turn");
    assert_eq!(reply, "FINAL ANSWER: stored on the second try.");
}

#[tokio::test]
async fn separate_threads_do_not_share_state() {
    let agent = agent_with_script(vec![
        Message::assistant("FINAL ANSWER: a."),
        Message::assistant("FINAL ANSWER: b."),
    ])
    .await;

    agent.call_agent("hi", "t-a").await.expect("thread a");
    let checkpointer = CheckpointerType::InMemory.build(None).await.expect("cp");
    let mut runner = AppRunner::with_shared_checkpointer(
        Arc::clone(agent.app()),
        Some(checkpointer),
        15,
    );
    let init = runner
        .create_session("t-b".to_string(), AgentState::new_with_user_message("hi"))
        .await
        .expect("create");
    assert_eq!(init, SessionInit::Fresh);
}
