//! Question answering with stand-in model collaborators

mod common;

use async_trait::async_trait;
use common::{agent, create_hr_database};
use hr_query_engine::agent::{CANNOT_ANSWER_MESSAGE, UPSTREAM_MESSAGE};
use hr_query_engine::{
    ChatResponder, DbNeed, EngineError, ExecutionOutcome, IntentClassifier, Models, RoleProfile,
    SqlGenerator,
};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Answers every call with canned text and records the prompts it saw.
struct ScriptedModel {
    need: DbNeed,
    sql_reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(need: DbNeed, sql_reply: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            need,
            sql_reply: sql_reply.map(str::to_string),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn models(self: &Arc<Self>) -> Models {
        Models {
            generator: self.clone(),
            classifier: self.clone(),
            chat: self.clone(),
        }
    }
}

#[async_trait]
impl SqlGenerator for ScriptedModel {
    async fn generate_sql(&self, prompt: &str) -> hr_query_engine::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.sql_reply
            .clone()
            .ok_or_else(|| EngineError::UpstreamUnavailable("model timed out".to_string()))
    }
}

#[async_trait]
impl IntentClassifier for ScriptedModel {
    async fn classify(&self, _question: &str) -> hr_query_engine::Result<DbNeed> {
        Ok(self.need)
    }
}

#[async_trait]
impl ChatResponder for ScriptedModel {
    async fn respond(&self, question: &str) -> hr_query_engine::Result<String> {
        Ok(format!("Policy answer for: {}", question))
    }
}

fn staff(employee_id: i64, team: &str, department: &str) -> RoleProfile {
    RoleProfile {
        employee_id,
        name: "Tester".to_string(),
        rank_name: "Staff".to_string(),
        department_name: Some(department.to_string()),
        team_name: Some(team.to_string()),
        team_leader: false,
    }
}

#[tokio::test]
async fn test_policy_question_goes_to_chat() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = create_hr_database(&dir)?;
    let model = ScriptedModel::new(DbNeed::NoDb, None);

    let reply = agent(&path)
        .with_models(model.models())
        .answer("How many days of parental leave do we get?", &staff(7, "T2", "Dev"))
        .await;

    assert_eq!(
        reply.text,
        "Policy answer for: How many days of parental leave do we get?"
    );
    assert!(reply.outcome.is_none());
    assert!(model.prompts.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_data_question_is_scoped_to_caller() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = create_hr_database(&dir)?;
    let model = ScriptedModel::new(
        DbNeed::NeedDb,
        Some("Here you go:\n```sql\nSELECT employee_name FROM hrdatabase_employee\n```"),
    );

    let reply = agent(&path)
        .with_models(model.models())
        .answer("List everyone's names", &staff(7, "T2", "Dev"))
        .await;

    match &reply.outcome {
        Some(ExecutionOutcome::Rows(rows)) => assert_eq!(rows.len(), 1),
        other => panic!("expected rows, got {:?}", other),
    }
    assert!(reply.text.contains("Yoon Jiwoo"));

    let prompts = model.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("hrdatabase_employee(employee_id, employee_name"));
    assert!(prompts[0].contains("List everyone's names"));
    Ok(())
}

#[tokio::test]
async fn test_team_leader_sees_their_team() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = create_hr_database(&dir)?;
    let model = ScriptedModel::new(
        DbNeed::NeedDb,
        Some("### SQL: SELECT employee_name FROM hrdatabase_employee"),
    );
    let mut leader = staff(5, "T2", "Dev");
    leader.team_leader = true;

    let reply = agent(&path)
        .with_models(model.models())
        .answer("Who is on my team?", &leader)
        .await;

    match &reply.outcome {
        Some(ExecutionOutcome::Rows(rows)) => assert_eq!(rows.len(), 3),
        other => panic!("expected rows, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn test_generator_refusal() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = create_hr_database(&dir)?;
    let model = ScriptedModel::new(DbNeed::NeedDb, Some("cannot_generate_sql"));

    let reply = agent(&path)
        .with_models(model.models())
        .answer("What will the stock price be tomorrow?", &staff(7, "T2", "Dev"))
        .await;

    assert_eq!(reply.text, CANNOT_ANSWER_MESSAGE);
    assert!(reply.outcome.is_none());
    Ok(())
}

#[tokio::test]
async fn test_generator_outage_is_user_safe() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = create_hr_database(&dir)?;
    let model = ScriptedModel::new(DbNeed::NeedDb, None);

    let reply = agent(&path)
        .with_models(model.models())
        .answer("How many late days do I have?", &staff(7, "T2", "Dev"))
        .await;

    assert_eq!(reply.text, UPSTREAM_MESSAGE);
    assert!(matches!(reply.error, Some(EngineError::UpstreamUnavailable(_))));
    Ok(())
}

#[tokio::test]
async fn test_restricted_table_is_refused_below_all_access() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = create_hr_database(&dir)?;
    let model = ScriptedModel::new(DbNeed::NeedDb, Some("SELECT * FROM executives_salary"));

    let reply = agent(&path)
        .with_models(model.models())
        .answer("What do executives earn?", &staff(7, "T2", "Dev"))
        .await;

    assert!(reply.outcome.is_none());
    assert!(matches!(reply.error, Some(EngineError::Refused(_))));
    Ok(())
}
