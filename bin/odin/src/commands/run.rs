//! `odin run`: replay a conversation document.

use crate::cli::RunArgs;
use crate::commands::backend;
use crate::config::OdinConfig;
use crate::error::CliError;
use crate::fetch::fetch;
use odin_conversation::{
    Orchestrator, RunErrorKind, RunOptions, RunReport, TracingSink, builtin_tools,
};
use odin_document::Document;
use odin_core::Result;
use tracing::info;

/// Fetches, parses, and runs the document named by `args`.
///
/// # Errors
///
/// Returns an error if the document cannot be read or parsed, the backend
/// cannot be created, or the run fails.
pub async fn execute(args: RunArgs, config: &OdinConfig) -> Result<(), CliError> {
    let report = run_document(&args, config).await?;
    info!(
        run_id = %report.run_id,
        thread_id = %report.thread_id,
        processed = report.processed,
        skipped = report.skipped,
        outputs = report.outputs.len(),
        "run completed"
    );
    Ok(())
}

async fn run_document(args: &RunArgs, config: &OdinConfig) -> Result<RunReport, CliError> {
    let backend = backend(&config.backend)?;

    let text = fetch(&args.source).await.map_err(|e| CliError::Fetch {
        source: args.source.clone(),
        reason: e.to_string(),
    })?;
    let document = Document::parse(&text).map_err(|e| CliError::Run {
        kind: RunErrorKind::Parse,
        reason: e.to_string(),
    })?;

    let orchestrator = Orchestrator::new(backend, builtin_tools(&args.output))
        .with_sink(TracingSink)
        .with_min_level(config.log.min_level)
        .with_thread_log(config.log.thread_log);
    let options = RunOptions::new(&args.output).with_echo(!args.quiet);

    orchestrator
        .run(&document, args.variables.as_slice(), &options)
        .await
        .map_err(|failure| {
            CliError::Run {
                kind: failure.kind,
                reason: failure.to_string(),
            }
            .into()
        })
}
