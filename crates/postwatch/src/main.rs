//! postwatch - terminal client for the crawl and ad-detection backend.
//!
//! Runs live prediction sessions (streamed crawl results followed by the
//! numbered prediction list), triggers batch processing, and lists
//! collected records.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing::debug;

use postwatch::error::UserAction;
use postwatch::logging::{self, LogOptions};
use postwatch::settings::{self, AppConfig, LogFormat};
use postwatch::{
    ApiClient, ChannelClient, JsonRenderer, Notifier, Renderer, SessionController, StderrNotifier,
    TerminalRenderer,
};

fn main() -> ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(err) => {
            let _ = writeln!(io::stderr(), "Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if let Command::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, settings::APP_NAME, &mut io::stdout());
        return Ok(ExitCode::SUCCESS);
    }

    let config_path = settings::resolve_config_path(cli.common.config.as_deref())?;
    let config = settings::load_config(&config_path)?.with_server_override(cli.common.server.clone());

    let level = logging::effective_level(
        cli.common.quiet,
        cli.common.verbose,
        cli.common.debug,
        cli.common.trace,
        &config.logging.level,
    );
    let format = if cli.common.log_json {
        LogFormat::Json
    } else {
        config.logging.format
    };
    logging::init_logging(&LogOptions {
        level,
        format,
        no_color: cli.common.no_color,
    });
    debug!("config file: {}", config_path.display());

    match cli.command {
        Command::Config { command } => handle_config(command, &config, config_path),
        command => async_main(command, config, cli.common.json),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn async_main(command: Command, config: AppConfig, json: bool) -> Result<ExitCode> {
    let renderer: Box<dyn Renderer> = if json {
        Box::new(JsonRenderer::stdout())
    } else {
        Box::new(TerminalRenderer::stdout())
    };
    let notifier = StderrNotifier;
    let api = ApiClient::new(config.base_url(), config.request_timeout())
        .context("creating HTTP client")?;

    let ok = match command {
        Command::Predict { query } => {
            handle_predict(&query.join(" "), api, &config, renderer.as_ref(), &notifier).await
        }
        Command::Process => handle_process(&api, renderer.as_ref(), &notifier).await,
        Command::List => handle_list(&api, renderer.as_ref(), &notifier).await,
        Command::Config { .. } | Command::Completions { .. } => true,
    };

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[derive(Debug, Parser)]
#[command(
    name = "postwatch",
    author,
    version,
    about = "Terminal client for the postwatch crawl and ad-detection backend.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Backend base URL (overrides server.base_url)
    #[arg(long, short = 's', value_name = "URL", global = true, env = "POSTWATCH_SERVER_URL")]
    server: Option<String>,
    /// Output machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
    /// Emit logs as JSON
    #[arg(long = "log-json", global = true)]
    log_json: bool,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
    /// Disable ANSI colors in log output
    #[arg(long = "no-color", global = true)]
    no_color: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a prediction, streaming crawl results while it runs
    Predict {
        /// Search query (words are joined with spaces)
        query: Vec<String>,
    },
    /// Trigger batch processing of the next record
    Process,
    /// List all collected records
    List,
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn handle_config(command: ConfigCommand, config: &AppConfig, path: PathBuf) -> Result<ExitCode> {
    match command {
        ConfigCommand::Show => {
            let text = toml::to_string_pretty(config).context("serializing config to TOML")?;
            print!("{text}");
        }
        ConfigCommand::Path => println!("{}", path.display()),
        ConfigCommand::Init { force } => {
            settings::write_default_config(&path, force)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn handle_predict(
    query: &str,
    api: ApiClient,
    config: &AppConfig,
    renderer: &dyn Renderer,
    notifier: &dyn Notifier,
) -> bool {
    let controller = SessionController::new(
        Arc::new(api),
        ChannelClient::websocket(),
        config.session_config(),
    );
    match controller.start(query, renderer, notifier).await {
        Ok(report) => {
            debug!(
                "session {} done: {} live, {} ignored, channel {:?}",
                report.id, report.live_events, report.ignored_events, report.channel_end
            );
            true
        }
        // Already reported through the notifier by the controller.
        Err(_) => false,
    }
}

async fn handle_process(api: &ApiClient, renderer: &dyn Renderer, notifier: &dyn Notifier) -> bool {
    match api.process_data().await {
        Ok(record) => {
            renderer.record(&record);
            true
        }
        Err(e) => {
            notifier.report_failure(UserAction::Process, &e);
            false
        }
    }
}

async fn handle_list(api: &ApiClient, renderer: &dyn Renderer, notifier: &dyn Notifier) -> bool {
    match api.list_records().await {
        Ok(records) => {
            debug!("retrieved {} record(s)", records.len());
            renderer.records(&records);
            true
        }
        Err(e) => {
            notifier.report_failure(UserAction::List, &e);
            false
        }
    }
}
