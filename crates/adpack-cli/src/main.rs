//! adpack CLI: serve the creative API, or run the offline checks.

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use adpack_core::config::{PipelineConfig, PublishPolicy, ServiceConfig};
use adpack_core::format::AspectRatio;
use adpack_core::id::WorkspaceId;
use adpack_core::prelude::VariantTag;
use adpack_exec::{Engine, InitRequest};
use adpack_io::{HttpGenerationClient, HttpRenderClient, StaticDirectory};
use adpack_server::AppState;
use adpack_stages::rewrite_claim;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "adpack")]
#[command(about = "Creative production pipeline: copy, blueprints, compliance, render, export", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve(ServeArgs),

    /// Run the claim guardrail on one or more texts
    CheckClaims {
        /// Texts to check
        #[arg(required = true)]
        texts: Vec<String>,

        /// Print findings as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a YAML init request
    Validate {
        /// Path to the request YAML file
        #[arg(short, long)]
        request: PathBuf,
    },

    /// Show the format x variant matrix one init produces, with cost units
    Explain {
        /// Optional request YAML; its duration is used for the CTA window
        #[arg(short, long)]
        request: Option<PathBuf>,

        /// Variants per format (overrides config)
        #[arg(long)]
        variants: Option<usize>,
    },
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Bind host (overrides ADPACK_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides ADPACK_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Workspace directory JSON file (overrides ADPACK_DIRECTORY_PATH)
    #[arg(long)]
    directory: Option<String>,

    /// Concurrent stages per workspace
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Blueprint variants per aspect ratio
    #[arg(long)]
    variants: Option<usize>,

    /// Deadline for every external call (ms)
    #[arg(long)]
    stage_timeout_ms: Option<u64>,

    /// always_escalate | auto_publish_when_approved
    #[arg(long)]
    publish_policy: Option<PublishPolicy>,
}

/// Request file: an init body, optionally with the workspace it targets.
#[derive(Debug, Deserialize)]
struct RequestDoc {
    #[serde(default)]
    workspace_id: Option<WorkspaceId>,
    #[serde(flatten)]
    request: InitRequest,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Serve(args) => serve(args),
        Commands::CheckClaims { texts, json } => check_claims(&texts, json),
        Commands::Validate { request } => validate_request(&request).map(|doc| {
            println!("✓ Request is valid");
            println!("  Offer: {}", doc.request.input.offer);
            if let Some(ws) = doc.workspace_id {
                println!("  Workspace: {ws}");
            }
        }),
        Commands::Explain { request, variants } => explain(request.as_ref(), variants),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Flags win over environment, environment over defaults.
fn apply_overrides(pipeline: &mut PipelineConfig, service: &mut ServiceConfig, args: &ServeArgs) {
    if let Some(host) = &args.host {
        service.host = host.clone();
    }
    if let Some(port) = args.port {
        service.port = port;
    }
    if let Some(path) = &args.directory {
        service.directory_path = Some(path.clone());
    }
    if let Some(n) = args.max_concurrent {
        pipeline.max_concurrent_per_workspace = n;
    }
    if let Some(n) = args.variants {
        pipeline.variants_per_format = n;
    }
    if let Some(ms) = args.stage_timeout_ms {
        pipeline.stage_timeout_ms = ms;
    }
    if let Some(policy) = args.publish_policy {
        pipeline.publish_policy = policy;
    }
}

fn serve(args: ServeArgs) -> CliResult<()> {
    let mut pipeline = PipelineConfig::from_env();
    let mut service = ServiceConfig::from_env();
    apply_overrides(&mut pipeline, &mut service, &args);
    pipeline.validate()?;

    let generation = HttpGenerationClient::new(
        service.generation_url.as_deref().unwrap_or_default(),
        service.generation_api_key.clone(),
        service.generation_model.clone(),
    )?;
    let renderer = HttpRenderClient::new(
        service.render_url.as_deref().unwrap_or_default(),
        service.render_api_key.clone(),
    )?;
    let directory = match &service.directory_path {
        Some(path) => StaticDirectory::load(path)?,
        None => {
            tracing::warn!("no workspace directory configured; every request will be unauthorized");
            StaticDirectory::new()
        }
    };
    tracing::info!(
        entries = directory.len(),
        ceiling = pipeline.max_concurrent_per_workspace,
        policy = ?pipeline.publish_policy,
        "starting adpack"
    );

    let engine = Engine::in_memory(pipeline, Arc::new(generation), Arc::new(renderer))?;
    let state = AppState::new(engine, Arc::new(directory));
    let addr = service.bind_addr();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(adpack_server::serve(&addr, state))?;
    Ok(())
}

fn check_claims(texts: &[String], json: bool) -> CliResult<()> {
    let results: Vec<_> = texts.iter().map(|t| rewrite_claim(t)).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    for (input, result) in texts.iter().zip(&results) {
        if result.findings.is_empty() {
            println!("✓ {input}");
            continue;
        }
        println!("✗ {input}");
        if result.modified {
            println!("  → {}", result.text);
        }
        for f in &result.findings {
            match &f.replacement {
                Some(r) => println!("    {:?} '{}' → '{}': {}", f.outcome, f.term, r, f.reason),
                None => println!("    {:?} '{}': {}", f.outcome, f.term, f.reason),
            }
        }
    }
    Ok(())
}

fn parse_request(yaml: &str) -> CliResult<RequestDoc> {
    let doc: RequestDoc = serde_yaml::from_str(yaml)?;
    doc.request.input.validate()?;
    Ok(doc)
}

fn validate_request(path: &PathBuf) -> CliResult<RequestDoc> {
    let yaml = fs::read_to_string(path)?;
    parse_request(&yaml)
}

fn explain(request: Option<&PathBuf>, variants: Option<usize>) -> CliResult<()> {
    let mut cfg = PipelineConfig::from_env();
    if let Some(n) = variants {
        cfg.variants_per_format = n;
    }
    cfg.validate()?;
    let duration_s = match request {
        Some(path) => validate_request(path)?.request.input.duration_s,
        None => adpack_core::job::JobInput::new(adpack_core::job::Objective::Sale, "-").duration_s,
    };
    print!("{}", explain_text(&cfg, duration_s));
    Ok(())
}

fn explain_text(cfg: &PipelineConfig, duration_s: u32) -> String {
    let mut out = String::new();
    let blueprints = cfg.blueprints_per_job();
    // copy + one call per blueprint + compliance
    let calls = blueprints as u64 + 2;

    let _ = writeln!(out, "Creative Plan");
    let _ = writeln!(out, "=============");
    let _ = writeln!(out);
    let _ = writeln!(out, "Duration: {duration_s}s");
    let _ = writeln!(out, "Blueprints: {blueprints}");
    let _ = writeln!(out);
    let _ = writeln!(out, "Format Matrix:");
    for ratio in AspectRatio::ALL {
        let (w, h) = ratio.dimensions();
        let z = ratio.safe_zone();
        let tags: Vec<String> = (0..cfg.variants_per_format)
            .filter_map(VariantTag::from_index)
            .map(|v| v.to_string())
            .collect();
        let _ = writeln!(
            out,
            "  {ratio} ({w}x{h}) variants [{}] safe zone t{} b{} l{} r{} cta+{}",
            tags.join(", "),
            z.top,
            z.bottom,
            z.left,
            z.right,
            z.cta_margin
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Cost Units:");
    let _ = writeln!(
        out,
        "  Init: {calls} generation calls = {} cents",
        calls * cfg.generation_call_cost_cents
    );
    let _ = writeln!(
        out,
        "  Render (one variant): {} formats = {} cents (+{} per thumbnail)",
        AspectRatio::ALL.len(),
        AspectRatio::ALL.len() as u64 * cfg.render_cost_cents,
        cfg.thumbnail_cost_cents
    );
    let _ = writeln!(out, "  Publish policy: {:?}", cfg.publish_policy);
    out
}
