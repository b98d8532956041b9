use anyhow::{bail, Context, Result};
use indicatif::ProgressBar;
use serde_json::json;
use snowflow::cli::commands::{
    CheckCommand, DeleteCommand, ExportCommand, HistoryCommand, ListCommand, RunCommand, SaveCommand,
    ValidateCommand,
};
use snowflow::cli::output::*;
use snowflow::cli::{Cli, Command};
use snowflow::core::PipelineDocument;
use snowflow::engine::{EngineClientConfig, HttpEngineClient};
use snowflow::execution::{CoordinatorConfig, ExecutionCoordinator, RunEvent, CONTENT_KEY};
use snowflow::graph::{self, preflight, ConnectionValidator, GraphStore};
use snowflow::persistence::{AuditEvent, InMemoryPersistence, PersistenceBackend};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, &cli).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Check(cmd) => check_connection(cmd),
        Command::Save(cmd) => save_pipeline(cmd).await?,
        Command::List(cmd) => list_pipelines(cmd).await?,
        Command::Export(cmd) => export_pipeline(cmd).await?,
        Command::Delete(cmd) => delete_pipeline(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

/// Local store for saved pipelines and history
async fn open_store() -> Result<Arc<dyn PersistenceBackend>> {
    #[cfg(feature = "sqlite")]
    {
        let store = snowflow::persistence::SqliteStore::with_default_path().await?;
        Ok(Arc::new(store))
    }
    #[cfg(not(feature = "sqlite"))]
    {
        tracing::warn!("Built without sqlite support, nothing will be kept after exit");
        Ok(Arc::new(InMemoryPersistence::new()))
    }
}

async fn run_pipeline(cmd: &RunCommand, cli: &Cli) -> Result<()> {
    let document = PipelineDocument::from_file(&cmd.file).context("Failed to load pipeline document")?;

    let mut store = GraphStore::new(document.name.as_str());
    store
        .replace_all(&document.nodes, &document.edges, &document.name)
        .context("Pipeline document is not a valid graph")?;
    let node_count = store.nodes().len();

    println!(
        "{} Loaded pipeline: {} ({} steps)",
        INFO,
        style(&document.name).bold(),
        node_count
    );

    // Set up persistence
    let history: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        open_store().await?
    };

    let mut engine_config = EngineClientConfig::new();
    if let Some(url) = &cli.engine_url {
        engine_config = engine_config.with_endpoint(url.as_str());
    }
    let engine = HttpEngineClient::new(engine_config).context("Failed to create engine client")?;

    let graph = graph::shared(store);
    let coordinator = ExecutionCoordinator::new(
        graph.clone(),
        Arc::new(engine),
        CoordinatorConfig::new().with_settle_delay(Duration::from_millis(cmd.settle_ms)),
    );

    // Progress bar while streaming, plain lines otherwise
    let progress = (!cmd.blocking).then(|| create_progress_bar(node_count));
    let handler_progress = progress.clone();
    coordinator
        .add_event_handler(move |event| report_event(event, handler_progress.as_ref()))
        .await;

    println!();
    let result = if cmd.blocking {
        coordinator.run_blocking(cmd.prompt.as_deref()).await
    } else {
        coordinator.start(cmd.prompt.as_deref()).await
    };
    if let Some(progress) = &progress {
        progress.finish_and_clear();
    }

    let snapshot = coordinator.snapshot().await;
    if snapshot.state.is_terminal() {
        println!("\n{} Run {}", INFO, format_run_state(snapshot.state));
        for (node_id, state) in &snapshot.nodes {
            println!("  {} {}", format_node_state(*state), node_id);
        }
    }

    match &result {
        Err(e) if e.is_local() => {}
        _ => {
            let details = match &result {
                Ok(summary) => json!({
                    "success": true,
                    "executed_nodes": summary.executed_nodes,
                    "simulated_nodes": summary.simulated_nodes,
                }),
                Err(e) => json!({ "success": false, "error": e.to_string() }),
            };
            history
                .record_event(
                    &AuditEvent::new("workflow_run", "workflow", snapshot.run_id.to_string(), &document.name)
                        .with_details(details),
                )
                .await?;
        }
    }

    match result {
        Ok(summary) => {
            for message in &summary.messages {
                println!("{} {}", INFO, message);
            }
            let graph = graph.read().await;
            for node_id in &summary.patched_nodes {
                let content = graph
                    .node(node_id)
                    .and_then(|n| n.data.get(CONTENT_KEY))
                    .and_then(|v| v.as_str());
                if let Some(content) = content {
                    println!("\n{}", style(format!("[{}]", node_id)).bold());
                    println!("{}", format_output(content, 40));
                }
            }
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(&document.name).bold(),
                style("successfully").green()
            );
            Ok(())
        }
        Err(e) => {
            println!("\n{}", format_run_error(&e));
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn report_event(event: &RunEvent, progress: Option<&ProgressBar>) {
    match (event, progress) {
        (RunEvent::NodeActive { node_id, .. }, Some(progress)) => progress.set_message(node_id.clone()),
        (RunEvent::NodeCompleted { node_id, .. }, Some(progress)) => {
            progress.inc(1);
            progress.println(format_run_event(event));
            progress.set_message(format!("{} done", node_id));
        }
        (_, Some(progress)) => progress.println(format_run_event(event)),
        (_, None) => println!("{}", format_run_event(event)),
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let pipeline = PipelineDocument::from_file(&cmd.file)
        .context("Failed to load pipeline document")?
        .into_pipeline();
    let report = preflight(&pipeline);

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for issue in report.errors.iter().chain(&report.warnings) {
            println!("{}", format_issue(issue));
        }
    }

    if report.is_valid() {
        println!(
            "{} {} is ready to run ({} steps, {} warnings)",
            CHECK,
            style(&pipeline.name).bold(),
            style(pipeline.nodes.len()).cyan(),
            style(report.warnings.len()).yellow()
        );
        Ok(())
    } else {
        println!("{} Validation failed with {} errors", CROSS, report.errors.len());
        std::process::exit(1);
    }
}

fn check_connection(cmd: &CheckCommand) {
    let verdict = ConnectionValidator::explain(cmd.source, cmd.target);
    println!("{}", format_verdict(cmd.source, cmd.target, &verdict));
    if !verdict.accepted {
        std::process::exit(1);
    }
}

async fn save_pipeline(cmd: &SaveCommand) -> Result<()> {
    let mut pipeline = PipelineDocument::from_file(&cmd.file)
        .context("Failed to load pipeline document")?
        .into_pipeline();
    if let Some(name) = &cmd.name {
        pipeline.name = name.clone();
    }

    // Refuse documents the editor could not have produced
    GraphStore::new(pipeline.name.as_str())
        .replace_all(&pipeline.nodes, &pipeline.edges, &pipeline.name)
        .context("Pipeline document is not a valid graph")?;

    let store = open_store().await?;
    store.save_pipeline(&pipeline).await?;
    store
        .record_event(
            &AuditEvent::new("workflow_saved", "workflow", &pipeline.name, &pipeline.name)
                .with_details(json!({ "nodes": pipeline.nodes.len(), "edges": pipeline.edges.len() })),
        )
        .await?;

    println!("{} Saved {}", CHECK, style(&pipeline.name).bold());
    Ok(())
}

async fn list_pipelines(cmd: &ListCommand) -> Result<()> {
    let store = open_store().await?;
    let pipelines = store.list_pipelines().await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&json!({ "pipelines": pipelines }))?);
        return Ok(());
    }

    if pipelines.is_empty() {
        println!("{} No saved pipelines", INFO);
        return Ok(());
    }

    println!("{} Saved pipelines:", INFO);
    for summary in &pipelines {
        println!("  {}", format_pipeline_summary(summary));
    }
    Ok(())
}

async fn export_pipeline(cmd: &ExportCommand) -> Result<()> {
    let store = open_store().await?;
    let Some(pipeline) = store.load_pipeline(&cmd.name).await? else {
        bail!("No saved pipeline named '{}'", cmd.name);
    };

    PipelineDocument::export(&pipeline)
        .write_to(&cmd.out)
        .with_context(|| format!("Failed to export '{}'", cmd.name))?;
    store
        .record_event(
            &AuditEvent::new("workflow_exported", "workflow", &pipeline.name, &pipeline.name)
                .with_details(json!({ "path": cmd.out })),
        )
        .await?;

    println!("{} Exported {} to {}", CHECK, style(&pipeline.name).bold(), style(&cmd.out).dim());
    Ok(())
}

async fn delete_pipeline(cmd: &DeleteCommand) -> Result<()> {
    let store = open_store().await?;
    if !store.delete_pipeline(&cmd.name).await? {
        println!("{} No saved pipeline named '{}'", WARN, cmd.name);
        return Ok(());
    }
    store
        .record_event(&AuditEvent::new("workflow_deleted", "workflow", &cmd.name, &cmd.name))
        .await?;

    println!("{} Deleted {}", CHECK, style(&cmd.name).bold());
    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_store().await?;
    let events = store.list_events(cmd.limit).await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&json!({ "events": events }))?);
        return Ok(());
    }

    if events.is_empty() {
        println!("{} No activity recorded", INFO);
        return Ok(());
    }

    println!("{} Recent activity (showing latest {}):", INFO, cmd.limit);
    for event in &events {
        println!("  {}", format_audit_event(event));
    }
    Ok(())
}
