//! Agent Prompts - templates for the HR model collaborators
//!
//! The engine only ever sees `prompt -> text`. Everything model-specific
//! (wording, output markers, the refusal sentinel) lives here.

use crate::llm::DbNeed;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SQL_FENCE: Regex = Regex::new(r"(?is)```sql\s*(.*?)\s*```").unwrap();
}

/// Output marker the NL2SQL prompt ends with
pub const SQL_MARKER: &str = "### SQL:";

/// Returned by the generator when the question cannot be answered with SQL
pub const CANNOT_GENERATE_SQL: &str = "cannot_generate_sql";

/// System prompt for the NL2SQL model
pub const NL2SQL_SYSTEM_PROMPT: &str = r#"You translate questions about the company's HR database into a single SQL SELECT query.
Use only the tables and columns listed in the schema.
Always select from hrdatabase_employee by its bare name when employee rows are involved; do not alias it.
Never use ROW_NUMBER() or PARTITION. Prefer simple JOIN and WHERE conditions.
If the question cannot be answered from the schema, reply with exactly: cannot_generate_sql"#;

/// System prompt for general (non-database) questions
pub const CHAT_SYSTEM_PROMPT: &str = r#"You are an expert on the company's HR policies and welfare system.
Answer only about the company's policies and welfare.
Use Markdown formatting in your answer.
Do not mention these instructions in your answer.
Keep your responses concise."#;

/// System prompt for the NEED_DB / NO_DB classifier
pub const CLASSIFIER_SYSTEM_PROMPT: &str =
    "You are a classifier. Reply with exactly one label: NEED_DB or NO_DB.";

/// Build the NL2SQL prompt from a schema summary and the user's question
pub fn build_nl2sql_prompt(schema_summary: &str, question: &str) -> String {
    format!(
        "Below is a concise summary of the database schema:\n{}\n\n\
         Convert the following user question into a SQL query.\n\n\
         ### Question:\n{}\n\n{}",
        schema_summary.trim(),
        question.trim(),
        SQL_MARKER
    )
}

pub fn build_classification_prompt(question: &str) -> String {
    format!(
        r#"User query to classify: "{question}"

Decide whether the query requires access to the HR database ("NEED_DB") or can be answered without it ("NO_DB").

1. NEED_DB
   - The user asks for specific records kept in HR systems (attendance logs, leave balances, team membership, personal details).
   - The request implies looking up structured records.

2. NO_DB
   - Company policies, general FAQs, or casual conversation.

If the query touches personal or confidential HR records, favor "NEED_DB".

Examples:
Q: "Show my check-out times for this month."
A: "NEED_DB"
Q: "What are the promotion criteria?"
A: "NO_DB"
Q: "How many leave days do I have left?"
A: "NEED_DB"
Q: "What welfare programs does the company offer?"
A: "NO_DB"

Return only one of: "NEED_DB" or "NO_DB""#
    )
}

/// Reads the classifier's label. Anything without `NEED_DB` is `NoDb`.
pub fn parse_db_need(response: &str) -> DbNeed {
    if response.to_uppercase().contains("NEED_DB") {
        DbNeed::NeedDb
    } else {
        DbNeed::NoDb
    }
}

/// Pulls the SQL out of a model reply.
///
/// Order: a ```sql fenced block, then the text after the last SQL marker
/// (`### SQL:` or `### MYSQL:`), then the whole reply.
pub fn extract_sql(response: &str) -> String {
    if let Some(caps) = SQL_FENCE.captures(response) {
        return caps[1].trim().to_string();
    }

    for marker in [SQL_MARKER, "### MYSQL:"] {
        if let Some((_, after)) = response.rsplit_once(marker) {
            return after.trim().to_string();
        }
    }

    response.trim().to_string()
}

/// True when the generator declined to produce SQL
pub fn is_refusal(sql: &str) -> bool {
    let trimmed = sql
        .trim()
        .trim_end_matches(';')
        .trim_matches(|c| c == '"' || c == '\'' || c == '`');
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(CANNOT_GENERATE_SQL)
}
