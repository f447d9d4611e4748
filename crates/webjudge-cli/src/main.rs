//! WebJudge CLI
//!
//! The `webjudge` command grades a web-browsing agent's run against its task.
//!
//! ## Commands
//!
//! - `evaluate`: grade a payload file, or assemble one from screenshots and a trace file
//! - `extract`: show the constraints a task decomposes into
//! - `rubric`: print the scoring rubric

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing::{info, Level};

use webjudge_core::reasoning::config::ENV_API_KEY;
use webjudge_core::{
    CallContext, CancelHandle, EvaluationOutcome, ReasoningConfig, RubricCategory, Verdict,
    WebJudge, SUCCESS_THRESHOLD,
};

/// Exit status for a graded result.
const EXIT_GRADED: u8 = 0;
/// Exit status for a structured evaluation error.
const EXIT_ERROR: u8 = 1;
/// Exit status for a `FAILURE` verdict under `--fail-on-failure`.
const EXIT_VERDICT_FAILURE: u8 = 2;

#[derive(Parser)]
#[command(name = "webjudge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Grade web-browsing agents against their task", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    service: ServiceArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Reasoning-service overrides; anything unset falls back to `WEBJUDGE_*` variables.
#[derive(Args, Debug, Default)]
struct ServiceArgs {
    /// API key for the reasoning service
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Model name
    #[arg(long, global = true)]
    model: Option<String>,

    /// Base URL of the generative-language API
    #[arg(long, global = true)]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an agent run
    Evaluate {
        /// Payload file (JSON with task_prompt, action_budget, evidence_bundle)
        #[arg(short, long, conflicts_with_all = ["task", "budget", "screenshot", "trace"])]
        payload: Option<PathBuf>,

        /// Task given to the agent
        #[arg(short, long)]
        task: Option<String>,

        /// Maximum number of actions the agent was allowed
        #[arg(short, long)]
        budget: Option<u64>,

        /// Screenshot files, in the order they were taken
        #[arg(short, long)]
        screenshot: Vec<PathBuf>,

        /// Action log file, one action per line
        #[arg(long)]
        trace: Option<PathBuf>,

        /// Overall deadline for the evaluation in seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Exit with status 2 when the verdict is FAILURE
        #[arg(long)]
        fail_on_failure: bool,
    },

    /// Show the constraints a task decomposes into
    Extract {
        /// Task description
        #[arg(short, long)]
        task: String,
    },

    /// Print the scoring rubric
    Rubric,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    webjudge_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Evaluate {
            payload,
            task,
            budget,
            screenshot,
            trace,
            deadline_secs,
            fail_on_failure,
        } => {
            let payload = match payload {
                Some(path) => read_payload(&path)?,
                None => assemble_payload(task.as_deref(), budget, &screenshot, trace.as_deref())?,
            };
            let judge = build_judge(&cli.service)?;
            cmd_evaluate(&judge, &payload, deadline_secs, fail_on_failure).await
        }
        Commands::Extract { task } => {
            let judge = build_judge(&cli.service)?;
            cmd_extract(&judge, &task).await
        }
        Commands::Rubric => {
            print!("{}", render_rubric());
            Ok(ExitCode::from(EXIT_GRADED))
        }
    }
}

fn load_config(args: &ServiceArgs) -> Result<ReasoningConfig> {
    let mut config = ReasoningConfig::from_lookup(|var| {
        if var == ENV_API_KEY {
            if let Some(key) = &args.api_key {
                return Some(key.clone());
            }
        }
        std::env::var(var).ok()
    })
    .context("Failed to configure reasoning service")?;

    if let Some(model) = &args.model {
        config = config.with_model(model);
    }
    if let Some(base_url) = &args.base_url {
        config = config.with_base_url(base_url);
    }
    Ok(config)
}

fn build_judge(args: &ServiceArgs) -> Result<WebJudge> {
    let config = load_config(args)?;
    WebJudge::from_config(config).context("Failed to create reasoning client")
}

fn read_payload(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Payload is not valid JSON: {}", path.display()))
}

/// Build a payload from individual arguments.
///
/// Absent arguments are left out so the engine reports them as missing fields.
fn assemble_payload(
    task: Option<&str>,
    budget: Option<u64>,
    screenshots: &[PathBuf],
    trace: Option<&Path>,
) -> Result<Value> {
    let mut payload = Map::new();
    if let Some(task) = task {
        payload.insert("task_prompt".into(), json!(task));
    }
    if let Some(budget) = budget {
        payload.insert("action_budget".into(), json!(budget));
    }

    let mut evidence = Map::new();
    if !screenshots.is_empty() {
        let paths: Vec<String> = screenshots.iter().map(|p| p.display().to_string()).collect();
        evidence.insert("screenshots".into(), json!(paths));
    }
    if let Some(trace) = trace {
        let log = std::fs::read_to_string(trace)
            .with_context(|| format!("Failed to read action trace: {}", trace.display()))?;
        evidence.insert("action_trace".into(), json!(log));
    }
    payload.insert("evidence_bundle".into(), Value::Object(evidence));

    Ok(Value::Object(payload))
}

async fn cmd_evaluate(
    judge: &WebJudge,
    payload: &Value,
    deadline_secs: Option<u64>,
    fail_on_failure: bool,
) -> Result<ExitCode> {
    let (handle, signal) = CancelHandle::new();
    let mut ctx = CallContext::unbounded().with_cancel(signal);
    if let Some(secs) = deadline_secs {
        ctx = ctx.with_timeout(Duration::from_secs(secs));
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling evaluation");
            handle.cancel();
        }
    });

    let outcome = judge.evaluate_with(payload, &ctx).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(ExitCode::from(exit_status(&outcome, fail_on_failure)))
}

fn exit_status(outcome: &EvaluationOutcome, fail_on_failure: bool) -> u8 {
    match outcome {
        EvaluationOutcome::Error(_) => EXIT_ERROR,
        EvaluationOutcome::Graded(result)
            if fail_on_failure && result.final_verdict == Verdict::Failure =>
        {
            EXIT_VERDICT_FAILURE
        }
        EvaluationOutcome::Graded(_) => EXIT_GRADED,
    }
}

async fn cmd_extract(judge: &WebJudge, task: &str) -> Result<ExitCode> {
    let constraints = judge
        .extractor()
        .try_extract(task, &CallContext::unbounded())
        .await
        .context("Constraint extraction failed")?;

    if constraints.is_empty() {
        eprintln!("Could not deconstruct task into key points.");
        return Ok(ExitCode::from(EXIT_ERROR));
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "constraints": constraints }))?
    );
    Ok(ExitCode::from(EXIT_GRADED))
}

fn render_rubric() -> String {
    let mut out = String::from("Category               Points  Scoring\n");
    for category in RubricCategory::ALL {
        let scoring = match category.allowed_scores() {
            Some(values) => values
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" / "),
            None => format!("0-{} (proportional)", category.max_points()),
        };
        out.push_str(&format!(
            "{:<22} {:>6}  {}\n",
            category.label(),
            category.max_points(),
            scoring
        ));
    }
    out.push_str(&format!(
        "\nSUCCESS when the total is above {SUCCESS_THRESHOLD} and constraint adherence is above 0.\n\
         A violated critical constraint sets constraint adherence to 0.\n"
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use webjudge_core::{ErrorResponse, GradingResult};

    #[test]
    fn test_cli_parses_payload_mode() {
        let cli = Cli::try_parse_from(["webjudge", "evaluate", "--payload", "run.json"]).unwrap();
        match cli.command {
            Commands::Evaluate { payload, .. } => {
                assert_eq!(payload, Some(PathBuf::from("run.json")))
            }
            _ => panic!("expected evaluate"),
        }
    }

    #[test]
    fn test_cli_rejects_payload_with_task() {
        let result = Cli::try_parse_from([
            "webjudge",
            "evaluate",
            "--payload",
            "run.json",
            "--task",
            "find a fridge",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_collects_repeated_screenshots() {
        let cli = Cli::try_parse_from([
            "webjudge",
            "--json",
            "evaluate",
            "--task",
            "find a fridge",
            "--budget",
            "10",
            "--screenshot",
            "a.png",
            "--screenshot",
            "b.png",
            "--trace",
            "trace.txt",
            "--fail-on-failure",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Evaluate {
                screenshot,
                budget,
                fail_on_failure,
                ..
            } => {
                assert_eq!(screenshot.len(), 2);
                assert_eq!(budget, Some(10));
                assert!(fail_on_failure);
            }
            _ => panic!("expected evaluate"),
        }
    }

    #[test]
    fn test_cli_accepts_budget_beyond_u32() {
        let cli =
            Cli::try_parse_from(["webjudge", "evaluate", "--budget", "5000000000"]).unwrap();
        match cli.command {
            Commands::Evaluate { budget, .. } => {
                let payload = assemble_payload(None, budget, &[], None).unwrap();
                assert_eq!(payload["action_budget"], 5_000_000_000u64);
            }
            _ => panic!("expected evaluate"),
        }
    }

    #[test]
    fn test_assemble_payload_reads_trace() {
        let dir = tempfile::tempdir().unwrap();
        let trace = dir.path().join("trace.txt");
        std::fs::write(&trace, "open site\nsearch\n").unwrap();

        let payload = assemble_payload(
            Some("Find a fridge"),
            Some(10),
            &[PathBuf::from("one.png"), PathBuf::from("two.png")],
            Some(&trace),
        )
        .unwrap();

        assert_eq!(payload["task_prompt"], "Find a fridge");
        assert_eq!(payload["action_budget"], 10);
        assert_eq!(payload["evidence_bundle"]["screenshots"], json!(["one.png", "two.png"]));
        assert_eq!(payload["evidence_bundle"]["action_trace"], "open site\nsearch\n");
    }

    #[test]
    fn test_assemble_payload_omits_absent_fields() {
        let payload = assemble_payload(None, None, &[], None).unwrap();
        assert!(payload.get("task_prompt").is_none());
        assert_eq!(payload["evidence_bundle"], json!({}));
    }

    #[test]
    fn test_read_payload_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(read_payload(&path).is_err());
    }

    #[test]
    fn test_exit_status() {
        let error = EvaluationOutcome::Error(ErrorResponse {
            status: "error".into(),
            message: "Could not deconstruct task into key points.".into(),
        });
        let failure = EvaluationOutcome::Graded(GradingResult::sentinel());

        assert_eq!(exit_status(&error, false), EXIT_ERROR);
        assert_eq!(exit_status(&failure, false), EXIT_GRADED);
        assert_eq!(exit_status(&failure, true), EXIT_VERDICT_FAILURE);
    }

    #[test]
    fn test_load_config_prefers_flags() {
        let args = ServiceArgs {
            api_key: Some("flag-key".into()),
            model: Some("gemini-test".into()),
            base_url: Some("http://localhost:8080".into()),
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.api_key, "flag-key");
        assert_eq!(config.model, "gemini-test");
        assert_eq!(config.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_render_rubric_lists_categories() {
        let table = render_rubric();
        for category in RubricCategory::ALL {
            assert!(table.contains(category.label()));
        }
        assert!(table.contains("0 / 5 / 10"));
        assert!(table.contains("above 80"));
    }
}
