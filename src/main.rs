//! `showrun` CLI - Generate narrated videos from a topic string

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use showrun::{
    serve, AppState, ConfigError, ConfigTree, FfmpegRenderer, Orchestrator, Override, PipelineRun,
    ProviderRegistry, StageOutcome,
};

#[derive(Parser)]
#[command(name = "showrun")]
#[command(about = "Topic-to-video pipeline: research, script, voice, render")]
#[command(version)]
struct Cli {
    /// Config file (default: ./pipeline.json, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one video and exit
    #[command(group(ArgGroup::new("source").required(true).args(["topic", "topic_file"])))]
    Generate {
        /// Topic to cover, e.g. "Claude 4 just launched"
        #[arg(long)]
        topic: Option<String>,

        /// JSON file with a topic and per-topic overrides
        #[arg(long)]
        topic_file: Option<PathBuf>,

        /// Config override as PATH=VALUE, repeatable (e.g. video.style=minimal_white)
        #[arg(long = "set", value_name = "PATH=VALUE")]
        set: Vec<String>,
    },

    /// Run the HTTP server
    Serve {
        /// Config override as PATH=VALUE, repeatable
        #[arg(long = "set", value_name = "PATH=VALUE")]
        set: Vec<String>,
    },

    /// Print the effective configuration as JSON
    Config {
        /// Config override as PATH=VALUE, repeatable
        #[arg(long = "set", value_name = "PATH=VALUE")]
        set: Vec<String>,
    },
}

/// Topic file shape for `generate --topic-file`.
#[derive(Debug, Deserialize)]
struct TopicFile {
    topic: String,
    #[serde(default)]
    overrides: serde_json::Map<String, serde_json::Value>,
}

#[tokio::main]
async fn main() {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            if e.downcast_ref::<ConfigError>().is_some() {
                eprintln!("❌ configuration error: {e}");
                2
            } else {
                eprintln!("❌ {e:#}");
                1
            }
        }
    };
    std::process::exit(code);
}

async fn dispatch(cli: Cli) -> Result<i32> {
    let tree = ConfigTree::discover(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate { topic, topic_file, set } => {
            cmd_generate(&tree, topic, topic_file, &set).await
        }
        Commands::Serve { set } => cmd_serve(tree, &set).await,
        Commands::Config { set } => cmd_config(&tree, &set),
    }
}

async fn cmd_generate(
    tree: &ConfigTree,
    topic: Option<String>,
    topic_file: Option<PathBuf>,
    set: &[String],
) -> Result<i32> {
    let (topic, topic_overrides) = match topic_file {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("read topic file {}", path.display()))?;
            let file: TopicFile = serde_json::from_str(&text)
                .with_context(|| format!("parse topic file {}", path.display()))?;
            (file.topic, Override::from_map(&file.overrides))
        }
        None => (topic.unwrap_or_default(), Vec::new()),
    };
    if topic.trim().is_empty() {
        bail!("topic is empty");
    }

    let cli_overrides = parse_overrides(set)?;
    let cfg = tree.resolve(&topic_overrides, &cli_overrides, &[])?;

    println!("🎬 Generating video for: {topic}");
    println!("   persona: {}  style: {}", cfg.script.persona, cfg.video.style);
    println!(
        "   providers: llm={} search={} voice={}",
        cfg.llm.provider, cfg.search.provider, cfg.voice.provider
    );

    let orchestrator =
        Orchestrator::new(ProviderRegistry::with_defaults(), Arc::new(FfmpegRenderer::new()));
    let run = orchestrator.run(topic.trim(), Arc::new(cfg)).await?;
    print_run(&run);

    if run.succeeded() {
        Ok(0)
    } else {
        Ok(1)
    }
}

async fn cmd_serve(tree: ConfigTree, set: &[String]) -> Result<i32> {
    let cli_overrides = parse_overrides(set)?;
    // Resolve once up front so a bad override stops the server from binding.
    let cfg = tree.resolve(&[], &cli_overrides, &[])?;

    let orchestrator = Arc::new(Orchestrator::new(
        ProviderRegistry::with_defaults(),
        Arc::new(FfmpegRenderer::new()),
    ));
    let state = AppState {
        tree: Arc::new(tree),
        cli_overrides: Arc::new(cli_overrides),
        orchestrator,
    };

    println!("🚀 showrun server on http://{}:{}", cfg.server.host, cfg.server.port);
    serve(state, &cfg.server.host, cfg.server.port).await?;
    Ok(0)
}

fn cmd_config(tree: &ConfigTree, set: &[String]) -> Result<i32> {
    let cli_overrides = parse_overrides(set)?;
    let cfg = tree.resolve(&[], &cli_overrides, &[])?;
    println!("{}", serde_json::to_string_pretty(&cfg)?);
    Ok(0)
}

fn parse_overrides(set: &[String]) -> Result<Vec<Override>, ConfigError> {
    set.iter().map(|s| Override::parse(s)).collect()
}

fn print_run(run: &PipelineRun) {
    println!();
    for result in &run.results {
        let icon = match &result.outcome {
            StageOutcome::Succeeded { .. } => "✅",
            StageOutcome::Failed { transient: true, .. } => "🔁",
            StageOutcome::Failed { .. } => "❌",
        };
        let gate = match result.quality_passed {
            Some(true) => "  [gate ok]",
            Some(false) => "  [gate failed]",
            None => "",
        };
        println!(
            "{icon} {}/7 {:<9} attempt {}  {}ms{gate}",
            result.stage.position(),
            result.stage.to_string(),
            result.attempt,
            result.elapsed_ms
        );
    }

    println!();
    if let Some(video) = run.video() {
        println!("📹 Video: {} ({:.1}s)", video.path.display(), video.duration_seconds);
    }
    if let Some(meta) = run.metadata() {
        println!("📝 Metadata: {}", meta.metadata_path.display());
        println!("   Title: {}", meta.title);
        println!("   Tags: {}", meta.tags.join(", "));
    }
    match &run.status {
        showrun::RunStatus::Completed => println!("✨ Run {} completed", run.id),
        showrun::RunStatus::Failed { failure } => {
            println!("💥 Run {} failed: {}", run.id, failure.message);
        }
        _ => {}
    }
}
