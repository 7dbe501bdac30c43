#![deny(warnings)]

use anyhow::Context;
use clap::Parser;
use emotion_analysis_core::analyze::{Analyzer, FixedAnalyzer, HttpAnalysisClient};
use emotion_analysis_core::config::{
    resolve_api_base_url, resolve_optional_string, AnalysisConfig, Env, RequestTimeout, StdEnv,
    UploadLimit, DEFAULT_MAX_UPLOAD_MB, DEFAULT_REPORT_FORMAT, ENV_API_BASE_URL, ENV_EXPORT_DIR,
};
use emotion_analysis_core::emotion::AnalysisResult;
use emotion_analysis_core::playback::PlaybackRegistry;
use emotion_analysis_core::report::{self, ReportFormat};
use emotion_analysis_core::session::AnalysisSession;
use emotion_analysis_core::store::{AnalysisSnapshot, AnalysisStore};
use emotion_analysis_core::upload::AudioFile;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "emotion-analysis")]
#[command(about = "Upload audio to an emotion-recognition backend and report the results")]
struct Args {
    /// Audio files to analyze, in order.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    #[arg(long, env = ENV_API_BASE_URL)]
    api_url: Option<String>,

    /// Per-request timeout. Unset means wait for the backend indefinitely.
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[arg(long, env = ENV_EXPORT_DIR)]
    export_dir: Option<String>,

    #[arg(long, default_value = DEFAULT_REPORT_FORMAT)]
    format: String,

    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_MB)]
    max_upload_mb: u64,

    /// Answer with a canned prediction instead of calling the backend.
    #[arg(long, default_value_t = false)]
    offline: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let env = StdEnv;
    let offline = args.offline;
    let files = args.files.clone();
    let cfg = build_config(args, &env)?;

    tracing::info!(
        api_url = %cfg.api_base_url.as_url(),
        timeout_secs = cfg.request_timeout.map(|t| t.secs),
        offline,
        "config loaded"
    );

    let playback = PlaybackRegistry::new();
    let store = Arc::new(AnalysisStore::new());
    if offline {
        let session = AnalysisSession::new(FixedAnalyzer::demo(playback), store);
        run(&session, &cfg, files).await
    } else {
        let client = HttpAnalysisClient::new(&cfg, playback)?;
        let session = AnalysisSession::new(client, store);
        run(&session, &cfg, files).await
    }
}

async fn run<A: Analyzer>(
    session: &AnalysisSession<A>,
    cfg: &AnalysisConfig,
    files: Vec<PathBuf>,
) -> anyhow::Result<()> {
    let total = files.len();
    let mut failed = 0usize;

    for path in files {
        let file = match AudioFile::from_path(&path).await {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(error = %e, "skipping file");
                failed += 1;
                continue;
            }
        };
        if let Err(e) = file.validate(cfg.upload_limit) {
            tracing::warn!(error = %e, "invalid upload");
            failed += 1;
            continue;
        }

        match session.submit(file).await {
            Ok(result) => {
                print_result(&result);
                if let Some(dir) = &cfg.export_dir {
                    match export(&result, cfg.report_format, dir).await {
                        Ok(written) => println!("  report: {}", written.display()),
                        Err(e) => {
                            eprintln!("{}: report export failed: {e:#}", path.display());
                            failed += 1;
                        }
                    }
                }
            }
            Err(e) => {
                eprintln!("{}: analysis failed: {e}", path.display());
                failed += 1;
            }
        }
    }

    print_history(&session.store().snapshot());

    if failed > 0 {
        anyhow::bail!("{failed} of {total} analyses failed");
    }
    Ok(())
}

async fn export(
    result: &AnalysisResult,
    format: ReportFormat,
    dir: &Path,
) -> anyhow::Result<PathBuf> {
    let report = report::serialize(result, format)
        .with_context(|| format!("cannot export {}", result.filename()))?;
    Ok(report.write_to_dir(dir).await?)
}

fn print_result(result: &AnalysisResult) {
    println!(
        "{}: {} ({}% confidence), duration {}, processed in {}",
        result.filename(),
        result.primary_emotion(),
        result.confidence(),
        result.duration(),
        result.processing_time()
    );
    if result.has_ranking_discrepancy() {
        println!("  note: backend ranked another emotion above the reported one");
    }
    for score in result.all_emotions() {
        println!("  {:<12} {:>3}%", score.emotion, score.confidence);
    }
}

fn print_history(snapshot: &AnalysisSnapshot) {
    if snapshot.recent_len() == 0 {
        println!("No analyses yet.");
        return;
    }
    println!("Recent analyses:");
    for result in snapshot.recent_analyses() {
        println!(
            "  {}  {:<32} {:<10} {:>3}%",
            result.timestamp().format("%Y-%m-%d %H:%M:%S"),
            result.filename(),
            result.primary_emotion(),
            result.confidence()
        );
    }
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(
            level
                .parse()
                .with_context(|| format!("invalid --log-level: {level}"))?,
        )
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_config(args: Args, env: &impl Env) -> anyhow::Result<AnalysisConfig> {
    let api_base_url = resolve_api_base_url(args.api_url, env)?;
    let request_timeout = args.timeout_secs.map(RequestTimeout::new).transpose()?;
    let upload_limit = UploadLimit::from_megabytes(args.max_upload_mb)?;
    let report_format: ReportFormat = args.format.parse()?;
    let export_dir = resolve_optional_string(args.export_dir, ENV_EXPORT_DIR, env).map(PathBuf::from);

    Ok(AnalysisConfig {
        api_base_url,
        request_timeout,
        upload_limit,
        export_dir,
        report_format,
    })
}
