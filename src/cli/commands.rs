//! Command implementations for the QueryLens CLI.

use std::sync::Arc;

use tracing::info;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::{CacheScope, EvaluationMode, LensConfig};
use crate::error::{QueryLensError, Result};
use crate::plugin::QueryLensPlugin;
use crate::server;
use crate::session::{LensEngine, LensRequest, MemoryChannel};

/// Execute a CLI command.
pub async fn execute_command(args: LensArgs) -> Result<()> {
    let config = load_config(&args)?;
    match &args.command {
        Command::Serve(serve_args) => serve(serve_args, config).await,
        Command::Refine(refine_args) => refine(refine_args, config).await,
        Command::PrintConfig(resource_args) => print_config(resource_args, config),
    }
}

/// The configuration file named on the command line, or defaults.
fn load_config(args: &LensArgs) -> Result<LensConfig> {
    match &args.config {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            LensConfig::load(path)
        }
        None => Ok(LensConfig::default()),
    }
}

/// Apply resource flags on top of `config`.
pub fn apply_overrides(mut config: LensConfig, args: &ResourceArgs) -> Result<LensConfig> {
    let resources = &mut config.resources;
    for (slot, value) in [
        (&mut resources.model, &args.model),
        (&mut resources.collection, &args.collection),
        (&mut resources.ontology, &args.ontology),
        (&mut resources.embeddings, &args.embeddings),
        (&mut resources.concept_mapping, &args.concept_mapping),
    ] {
        if value.is_some() {
            slot.clone_from(value);
        }
    }
    if let Some(mode) = args.mode {
        config.evaluation.mode = match mode {
            ModeArg::Collection => EvaluationMode::Collection,
            ModeArg::JudgedPool => EvaluationMode::JudgedPool,
        };
    }
    if let Some(dir) = &args.cache_dir {
        config.evaluation.cache_scope = CacheScope::Shared;
        config.evaluation.cache_dir = Some(dir.clone());
    }
    config.validate()?;
    Ok(config)
}

async fn serve(args: &ServeArgs, config: LensConfig) -> Result<()> {
    let mut config = apply_overrides(config, &args.resources)?;
    if let Some(bind) = &args.bind {
        config.server.bind.clone_from(bind);
    }
    if let Some(route) = &args.route {
        config.server.route.clone_from(route);
    }

    let engine = LensEngine::from_config(config)?;
    server::serve(Arc::new(QueryLensPlugin::new(Arc::new(engine)))).await
}

/// Run one request through an in-memory session and print every response.
async fn refine(args: &RefineArgs, config: LensConfig) -> Result<()> {
    let config = apply_overrides(config, &args.resources)?;
    let engine = LensEngine::from_config(config)?;
    let session = engine.open_session(args.relevant.iter().cloned());

    let (mut channel, mut client) = MemoryChannel::pair();
    client.send(&LensRequest::new(
        args.query.clone(),
        args.language.as_deref(),
    ))?;
    client.close();

    let task = tokio::spawn(async move { session.run(&mut channel).await });

    let mut printer = ResponsePrinter::new(args.output_format);
    while let Some(response) = client.recv().await? {
        printer.print(&response)?;
    }

    task.await
        .map_err(|e| QueryLensError::other(format!("session task failed: {e}")))?
}

fn print_config(args: &ResourceArgs, config: LensConfig) -> Result<()> {
    let config = apply_overrides(config, args)?;
    print!("{}", config.to_toml()?);
    Ok(())
}
