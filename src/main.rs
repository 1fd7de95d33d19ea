use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hr_query_engine::{
    AccessLevel, CallerContext, EngineConfig, HrAgent, LlmClient, Models, PipelineReply,
    RoleProfile, SqliteStore,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hrq")]
#[command(about = "Access-scoped, self-healing SQL for the HR database")]
struct Cli {
    /// JSON configuration file (environment variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides config and HRQ_DATABASE_PATH)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Print the structured outcome as JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scope and execute raw SQL for a caller
    Query {
        sql: String,

        /// SELF_ONLY, TEAM_ACCESS, DEPARTMENT_ACCESS or ALL_ACCESS
        #[arg(short, long)]
        level: String,

        #[arg(long)]
        employee_id: i64,

        #[arg(long)]
        team: Option<String>,

        #[arg(long)]
        department: Option<String>,

        /// Defaults to the configured executor.max_retries
        #[arg(long)]
        max_retries: Option<u32>,
    },

    /// Answer a natural-language question through the language model
    Ask {
        question: String,

        #[arg(long)]
        employee_id: i64,

        #[arg(long, default_value = "")]
        name: String,

        #[arg(long, default_value = "")]
        rank: String,

        #[arg(long)]
        team: Option<String>,

        #[arg(long)]
        department: Option<String>,

        #[arg(long)]
        team_leader: bool,
    },

    /// Print the tables and columns of the database
    Schema,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(path) = cli.database {
        config.database.path = path;
    }

    info!("Using database {}", config.database.path.display());
    let store = Arc::new(SqliteStore::new(&config.database.path));

    match cli.command {
        Command::Query {
            sql,
            level,
            employee_id,
            team,
            department,
            max_retries,
        } => {
            let level: AccessLevel = level.parse()?;
            let caller = CallerContext {
                employee_id,
                team_name: team,
                department_name: department,
            };
            let retries = max_retries.unwrap_or(config.executor.max_retries);

            let agent = HrAgent::new(config, store);
            let reply = agent.run_scoped_sql(&sql, &caller, level, retries);
            print_reply(&reply, cli.json)
        }
        Command::Ask {
            question,
            employee_id,
            name,
            rank,
            team,
            department,
            team_leader,
        } => {
            let llm = Arc::new(LlmClient::from_config(&config.llm)?);
            let models = Models {
                generator: llm.clone(),
                classifier: llm.clone(),
                chat: llm,
            };
            let profile = RoleProfile {
                employee_id,
                name,
                rank_name: rank,
                department_name: department,
                team_name: team,
                team_leader,
            };

            let agent = HrAgent::new(config, store).with_models(models);
            info!("Access level: {}", agent.access_level(&profile));
            let reply = agent.answer(&question, &profile).await;
            print_reply(&reply, cli.json)
        }
        Command::Schema => {
            let agent = HrAgent::new(config, store);
            let catalog = agent.schema()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&catalog)?);
            } else {
                println!("{}", catalog.summary());
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_reply(reply: &PipelineReply, json: bool) -> Result<ExitCode> {
    if json {
        let value = serde_json::json!({
            "text": reply.text,
            "outcome": reply.outcome,
            "executed_sql": reply.executed_sql,
            "attempts": reply.attempts,
            "error": reply.error.as_ref().map(|e| e.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", reply.text);
    }

    let succeeded = reply.error.is_none()
        && reply.outcome.as_ref().map_or(true, |outcome| outcome.is_success());
    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
