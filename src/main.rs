use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use model_fallback::controller::ControllerEvent;
use model_fallback::logging::{init_logging, LoggingConfig};
use model_fallback::ui::ReportRenderer;
use model_fallback::{BackendRanking, CommandAdapter, FallbackController, FallbackSettings, RunMode};

/// Escalation behaviour selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliMode {
    /// Rotate through backends and exit with a diagnostic when exhausted
    Auto,
    /// Like auto, but ask the operator whether to start over on escalation
    #[value(alias = "master")]
    Supervised,
}

impl From<CliMode> for RunMode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Auto => RunMode::Auto,
            CliMode::Supervised => RunMode::Supervised,
        }
    }
}

/// Output format for the final report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable banner with the backend output or diagnostic
    #[default]
    Text,
    /// The execution report as JSON
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "model-fallback")]
#[command(version)]
#[command(about = "Run a prompt with automatic fallback across ranked model backends")]
struct Cli {
    /// Prompt to send to the backend
    prompt: String,

    /// Operation mode: auto (with fallback) or supervised (operator may restart on escalation)
    #[arg(long, short, value_enum)]
    mode: Option<CliMode>,

    /// Show progress (-v), logs (-vv, -vvv, -vvvv)
    #[arg(long, short, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Suppress everything except the final result
    #[arg(long, short)]
    quiet: bool,

    /// Per-call timeout in seconds (overrides settings)
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Settings file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Inference command to invoke (overrides settings)
    #[arg(long = "command", value_name = "PROGRAM")]
    agent_command: Option<String>,

    /// Output format
    #[arg(long, default_value = "text", value_enum)]
    format: OutputFormat,

    /// Disable colors (also respects NO_COLOR environment variable)
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let use_color = !cli.no_color
        && std::env::var("NO_COLOR").is_err()
        && cli.format == OutputFormat::Text;
    init_logging(LoggingConfig::from_flags(cli.verbose, cli.quiet).with_ansi(use_color));

    let settings = match build_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let adapter =
        CommandAdapter::new(settings.command.clone()).with_leading_args(settings.args.clone());
    let renderer = ReportRenderer::new().with_color(use_color);

    let show_progress = cli.verbose > 0;
    let supervised = settings.mode == RunMode::Supervised;
    let event_renderer = renderer.clone();
    let mut controller = FallbackController::new(BackendRanking::default(), adapter, &settings)
        .on_event(move |event| match event {
            // The operator needs the report before being asked to retry.
            ControllerEvent::Escalated { report } if supervised => {
                eprint!("{}", event_renderer.render_diagnostic(report));
            }
            _ if show_progress => {
                if let Some(line) = event_renderer.render_event(event) {
                    eprintln!("{}", line);
                }
            }
            _ => {}
        });

    let report = controller.run(&cli.prompt).await;

    match cli.format {
        OutputFormat::Text => print!("{}", renderer.render_execution(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(ExitCode::from(report.exit_code()))
}

/// Layers command-line overrides on top of loaded settings.
fn build_settings(cli: &Cli) -> Result<FallbackSettings, Box<dyn std::error::Error>> {
    let mut settings = FallbackSettings::load(cli.config.as_deref())?;
    if let Some(command) = &cli.agent_command {
        // Leading args belong to the configured command, not an override.
        settings = settings.with_command(command.clone());
        settings.args.clear();
    }
    if let Some(timeout) = cli.timeout {
        settings = settings.with_timeout_secs(timeout);
    }
    if let Some(mode) = cli.mode {
        settings = settings.with_mode(mode.into());
    }
    settings.validate()?;
    Ok(settings)
}
