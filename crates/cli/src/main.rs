// TrustGrid CLI - headless ingestion and trust scoring
// stdout carries JSON only; logs and errors go to stderr

mod exit_codes;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use trustgrid_config::{ConfigError, PipelineConfig};
use trustgrid_core::{SourceType, TriggerRequest, UploadedFile};
use trustgrid_pipeline::{ErrorBody, Pipeline, ReportSlot, RunError, DEFAULT_PREVIEW_LIMIT};

use exit_codes::{
    category_exit_code, EXIT_CONFIG_INVALID, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "tgrid")]
#[command(about = "Ingest a dataset, clean it, and score how far it can be trusted")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one ingestion and print the trigger response as JSON
    #[command(after_help = "\
Examples:
  tgrid run --source-type csv_upload --file listings.csv
  tgrid run --source-type zip_upload --file photos.zip --no-records
  tgrid run --source-type api --url https://example.com/listings --from 2026-01-01 --to 2026-01-31
  TGRID_API_KEY=... tgrid run --source-type api --url https://example.com/listings
  tgrid run --source-type scraping --url https://example.com/table.html --out report.json")]
    Run {
        /// Source kind (csv_upload, json_upload, xlsx_upload, pdf_upload, docx_upload,
        /// xml_upload, parquet_upload, zip_upload, universal_upload, api, scraping)
        #[arg(long)]
        source_type: SourceType,

        /// File to upload (upload sources)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Source URL (api, scraping)
        #[arg(long)]
        url: Option<String>,

        /// API key sent as bearer token and x-api-key
        #[arg(long, env = "TGRID_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Start date inclusive (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// End date inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Config file (default: ~/.config/trustgrid/pipeline.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write the response here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,

        /// Omit the record preview from the response
        #[arg(long)]
        no_records: bool,

        /// Number of records included in the preview
        #[arg(long, default_value_t = DEFAULT_PREVIEW_LIMIT)]
        preview: usize,
    },

    /// Inspect pipeline configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Parse and validate a config file
    Check {
        /// Config file (default: ~/.config/trustgrid/pipeline.toml)
        path: Option<PathBuf>,
    },

    /// Print the effective config as TOML
    Show {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            source_type,
            file,
            url,
            api_key,
            from,
            to,
            config,
            out,
            no_records,
            preview,
        } => {
            let args = RunArgs {
                source_type,
                file,
                url,
                api_key,
                from,
                to,
            };
            let preview = if no_records { 0 } else { preview };
            cmd_run(args, config.as_deref(), out.as_deref(), preview)
        }
        Commands::Config { command } => match command {
            ConfigCommands::Check { path } => cmd_config_check(path.as_deref()),
            ConfigCommands::Show { config } => cmd_config_show(config.as_deref()),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

/// Logs go to stderr, filtered by `TGRID_LOG` (default `info`).
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("TGRID_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn config(err: ConfigError) -> Self {
        let code = match err {
            ConfigError::Io(_) => EXIT_IO,
            ConfigError::Parse(_) | ConfigError::Validation(_) => EXIT_CONFIG_INVALID,
        };
        Self { code, message: err.to_string(), hint: None }
    }

    pub fn run(err: &RunError) -> Self {
        let hint = match err.category() {
            "source_unreachable" => Some("check --url and --api-key (or TGRID_API_KEY)".to_string()),
            "timeout" => Some("raise fetch.run_budget_secs in the config".to_string()),
            _ => None,
        };
        Self {
            code: category_exit_code(err.category()),
            message: err.to_string(),
            hint,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// run
// ============================================================================

struct RunArgs {
    source_type: SourceType,
    file: Option<PathBuf>,
    url: Option<String>,
    api_key: Option<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

impl RunArgs {
    fn into_request(self) -> Result<TriggerRequest, CliError> {
        if self.source_type.is_upload() && self.url.is_some() && self.file.is_none() {
            return Err(CliError::args(format!("{} takes --file, not --url", self.source_type)));
        }

        let mut req = TriggerRequest::new(self.source_type).with_dates(self.from, self.to);
        if let Some(url) = self.url {
            req = req.with_url(url);
        }
        if let Some(key) = self.api_key.filter(|k| !k.trim().is_empty()) {
            req = req.with_api_key(key);
        }
        if let Some(path) = self.file {
            let bytes = std::fs::read(&path)
                .map_err(|e| CliError::io(format!("{}: {}", path.display(), e)))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            req = req.with_file(UploadedFile::new(name, bytes));
        }
        Ok(req)
    }
}

fn cmd_run(args: RunArgs, config: Option<&Path>, out: Option<&Path>, preview: usize) -> Result<(), CliError> {
    let config = PipelineConfig::load(config).map_err(CliError::config)?;
    let req = args.into_request()?;
    let pipeline = Pipeline::new(config).map_err(|e| CliError::run(&e))?;
    let slot = ReportSlot::new().with_preview_limit(preview);

    match slot.trigger(&pipeline, &req) {
        Ok(run) => {
            let json = serde_json::to_string_pretty(&run.response(slot.preview_limit()))
                .map_err(|e| CliError::io(format!("cannot serialize response: {}", e)))?;
            emit(&json, out)
        }
        Err(err) => {
            let body = serde_json::to_string_pretty(&ErrorBody::from(&err))
                .map_err(|e| CliError::io(format!("cannot serialize error: {}", e)))?;
            emit(&body, out)?;
            Err(CliError::run(&err))
        }
    }
}

fn emit(json: &str, out: Option<&Path>) -> Result<(), CliError> {
    match out {
        Some(path) => std::fs::write(path, format!("{}\n", json))
            .map_err(|e| CliError::io(format!("{}: {}", path.display(), e))),
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            writeln!(lock, "{}", json).map_err(|e| CliError::io(format!("stdout: {}", e)))
        }
    }
}

// ============================================================================
// config
// ============================================================================

fn cmd_config_check(path: Option<&Path>) -> Result<(), CliError> {
    let shown = path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(PipelineConfig::config_path);
    if path.is_none() && !shown.exists() {
        return Err(CliError::io(format!("{}: no config file", shown.display()))
            .with_hint("pass a path, or run `tgrid config show` for the built-in defaults"));
    }
    PipelineConfig::load(Some(&shown)).map_err(CliError::config)?;
    println!("ok: {}", shown.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<(), CliError> {
    let config = PipelineConfig::load(path).map_err(CliError::config)?;
    let text = config.to_toml().map_err(CliError::config)?;
    print!("{}", text);
    Ok(())
}
