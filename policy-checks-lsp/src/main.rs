use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tower_lsp::{LspService, Server};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use policy_checks_lsp::access_analyzer::client::AccessAnalyzerClient;
use policy_checks_lsp::backend::PolicyChecksBackend;
use policy_checks_lsp::config::Config;
use policy_checks_lsp::document::{DocumentType, PolicyDocument, PolicyType};
use policy_checks_lsp::logger::{LogLevel, LoggerKind, MemoryLogger, TracingLogger, set_logger};
use policy_checks_lsp::notifications::RecordingNotifier;
use policy_checks_lsp::policy_checks::{PolicyChecks, ValidationRequest, read_reference_document};
use policy_checks_lsp::reports::ValidationReport;
use policy_checks_lsp::state::GlobalState;
use policy_checks_lsp::utils::truncate_string;
use policy_checks_lsp::validators::runner::TokioCommandRunner;

/// Project configuration file picked up from the working directory
const PROJECT_CONFIG_FILE: &str = "policy-checks.toml";

/// Longest notice printed in summary output
const MAX_SUMMARY_MESSAGE_CHARS: usize = 240;

#[derive(Parser)]
#[command(name = "policy-checks-lsp")]
#[command(about = "Language server for IAM policy checks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Summary,
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the LSP server (default behavior)
    Lsp,
    /// Validate one document and exit with code 1 if errors are found
    Validate {
        /// Path to the policy, Terraform plan or CloudFormation template
        #[arg(short, long)]
        file: PathBuf,

        /// Document type: "JSON Policy Language", "Terraform Plan" or "CloudFormation"
        #[arg(short, long)]
        document_type: String,

        /// Policy type for JSON policies: identity, resource or service-control
        #[arg(short, long, default_value = "identity")]
        policy_type: String,

        /// AWS region (defaults to the config file, then AWS_REGION)
        #[arg(long)]
        region: Option<String>,

        /// tf-policy-validator configuration file
        #[arg(long)]
        tf_config: Option<String>,

        /// CloudFormation parameter file
        #[arg(long)]
        cfn_parameters: Option<String>,

        /// Configuration file (defaults to ./policy-checks.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "summary")]
        output: OutputFormat,
    },
    /// Print a reference policy document (empty if it cannot be read)
    Reference {
        /// Path to the reference policy
        #[arg(short, long)]
        path: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Some(Commands::Validate {
            file,
            document_type,
            policy_type,
            region,
            tf_config,
            cfn_parameters,
            config,
            output,
        }) => {
            let options = ValidateOptions {
                file,
                document_type,
                policy_type,
                region,
                tf_config,
                cfn_parameters,
                config,
                output,
            };
            match run_validate(options).await {
                Ok(code) => code,
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Some(Commands::Reference { path }) => {
            print!("{}", read_reference_document(&path).await);
            ExitCode::SUCCESS
        }
        Some(Commands::Lsp) | None => {
            run_lsp().await;
            ExitCode::SUCCESS
        }
    }
}

async fn run_lsp() {
    tracing::info!("Starting policy checks LSP server");

    let reference_log = Arc::new(MemoryLogger::new(LogLevel::Info));
    set_logger(Some(reference_log.clone()), LoggerKind::Main);
    let state = Arc::new(GlobalState::load_default());

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(move |client| {
        PolicyChecksBackend::new(client)
            .with_state(state)
            .with_reference_log(reference_log)
    });
    Server::new(stdin, stdout, socket).serve(service).await;
}

struct ValidateOptions {
    file: PathBuf,
    document_type: String,
    policy_type: String,
    region: Option<String>,
    tf_config: Option<String>,
    cfn_parameters: Option<String>,
    config: Option<PathBuf>,
    output: OutputFormat,
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    match explicit {
        Some(path) => Config::from_toml_file(path),
        None => {
            let default_path = Path::new(PROJECT_CONFIG_FILE);
            if default_path.exists() {
                Config::from_toml_file(default_path)
            } else {
                Ok(Config::default())
            }
        }
    }
}

async fn run_validate(options: ValidateOptions) -> anyhow::Result<ExitCode> {
    let document_type = DocumentType::parse(&options.document_type)
        .with_context(|| format!("unknown document type '{}'", options.document_type))?;
    let policy_type = PolicyType::parse(&options.policy_type)
        .with_context(|| format!("unknown policy type '{}'", options.policy_type))?;

    let mut config = load_config(options.config.as_deref())?;
    if options.region.is_some() {
        config.policy_checks.region = options.region;
    }
    set_logger(
        Some(Arc::new(TracingLogger::new(config.log_level()))),
        LoggerKind::Main,
    );

    let document = PolicyDocument::load(&options.file, document_type)
        .await
        .with_context(|| format!("reading {}", options.file.display()))?;

    let validator = AccessAnalyzerClient::new(config.region())?
        .with_endpoint(config.access_analyzer.endpoint.clone())
        .with_profile(config.access_analyzer.profile.clone());
    let checks = PolicyChecks::new(config, Arc::new(validator), Arc::new(TokioCommandRunner));

    eprintln!(
        "Validating {} as {}...",
        options.file.display(),
        document_type
    );

    let request = ValidationRequest {
        document,
        policy_type,
        tf_config_path: options.tf_config,
        cfn_parameter_path: options.cfn_parameters,
    };
    let notifier = RecordingNotifier::new();
    let outcome = checks.validate_policy(&request, &notifier).await;

    let report = ValidationReport::new(
        options.file.display().to_string(),
        document_type,
        outcome,
        notifier.notices(),
    );

    match options.output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("serializing report")?;
            println!("{}", json);
        }
        OutputFormat::Markdown => println!("{}", report.to_markdown()),
        OutputFormat::Summary => {
            for line in report.to_summary().lines() {
                println!("{}", truncate_string(line, MAX_SUMMARY_MESSAGE_CHARS));
            }
        }
    }

    if report.has_errors() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
