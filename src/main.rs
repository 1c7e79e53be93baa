use clap::Parser;
use heal_webdriver::{
    run_flow_file, ConnectionMode, EmbeddingConfig, ExecutorOptions, RunnerOptions,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the flow file (JSON)
    flow_file: PathBuf,

    /// Run Chrome without a visible window
    #[arg(long)]
    headless: bool,

    /// Pass --no-sandbox to Chrome (Linux AppArmor workaround)
    #[arg(long)]
    no_sandbox: bool,

    /// Chrome executable to launch instead of the system installation
    #[arg(long)]
    chrome_path: Option<String>,

    /// Attach to a Chrome already listening on this remote debugging port
    #[arg(long, conflicts_with_all = ["headless", "no_sandbox", "chrome_path"])]
    debug_port: Option<u16>,

    /// Bearer credential for the embedding service
    #[arg(long, env = "TOGETHER_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Base URL of an OpenAI-compatible embeddings API
    #[arg(long, env = "EMBEDDING_API_URL", default_value = EmbeddingConfig::DEFAULT_BASE_URL)]
    embedding_url: String,

    /// Embedding model name
    #[arg(long, env = "EMBEDDING_MODEL", default_value = EmbeddingConfig::DEFAULT_MODEL)]
    embedding_model: String,

    /// Fallback candidates to try per failed step, closest first
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    fallback_candidates: u16,

    /// Exit with status 2 when any step remains unresolved
    #[arg(long)]
    strict: bool,

    /// Write the run report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let connection = match args.debug_port {
        Some(port) => ConnectionMode::DebugPort(port),
        None => ConnectionMode::Sandboxed {
            chrome_path: args.chrome_path.clone(),
            no_sandbox: args.no_sandbox,
            headless: args.headless,
        },
    };

    let options = RunnerOptions {
        connection,
        embedding: EmbeddingConfig::new(args.api_key.clone())
            .with_base_url(args.embedding_url.clone())
            .with_model(args.embedding_model.clone()),
        executor: ExecutorOptions {
            fallback_candidates: args.fallback_candidates as usize,
        },
    };

    let report = match run_flow_file(&args.flow_file, &options).await {
        Ok(report) => report,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            return ExitCode::from(1);
        }
    };

    if let Some(path) = &args.report {
        if let Err(e) = report.write_json(path).await {
            log::error!("Failed to write report to {}: {:#}", path.display(), e);
        }
    }

    for result in report.unresolved() {
        log::warn!(
            "Unresolved step {} ({} {}): {}",
            result.step,
            result.action,
            result.target,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }

    if args.strict && !report.is_success() {
        return ExitCode::from(2);
    }
    ExitCode::SUCCESS
}
