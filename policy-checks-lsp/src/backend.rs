use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use reqwest::Client as HttpClient;
use serde::Serialize;
use serde_json::Value;
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::access_analyzer::PolicyValidator;
use crate::access_analyzer::client::AccessAnalyzerClient;
use crate::access_analyzer::http_client::create_shared_client;
use crate::commands::{self, ReferenceDocumentArgs, ValidatePolicyArgs, first_argument};
use crate::config::Config;
use crate::document::{DocumentType, PolicyDocument};
use crate::logger::{LogLevel, Logger, LoggerKind, MemoryLogger, get_logger, get_logger_of, set_logger};
use crate::notifications::{
    ConfigurationChanged, ConfigurationChangedParams, InputPathChanged, InputPathChangedParams,
    LspNotifier, Notifier, RecordingNotifier, TeeNotifier,
};
use crate::policy_checks::{PolicyChecks, ValidationRequest, read_reference_document};
use crate::reports::ValidationReport;
use crate::state::GlobalState;
use crate::validators::runner::{CommandRunner, TokioCommandRunner};

/// Open document as last synced by the client
struct DocumentState {
    text: String,
    version: i32,
}

pub struct PolicyChecksBackend {
    client: Client,
    /// Configuration
    config: RwLock<Config>,
    /// Open documents (full text sync)
    documents: DashMap<Url, DocumentState>,
    /// Shared HTTP client for Access Analyzer
    http_client: Arc<HttpClient>,
    /// Replaces the Access Analyzer client when set
    validator: Option<Arc<dyn PolicyValidator>>,
    runner: Arc<dyn CommandRunner>,
    state: Arc<GlobalState>,
    /// Backs the "show reference log" command
    reference_log: Option<Arc<MemoryLogger>>,
}

impl PolicyChecksBackend {
    pub fn new(client: Client) -> Self {
        Self::with_http_client(client, None)
    }

    pub fn with_http_client(client: Client, http_client: Option<Arc<HttpClient>>) -> Self {
        let http_client = http_client.unwrap_or_else(|| {
            create_shared_client().unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {:#}", e);
                Arc::new(HttpClient::new())
            })
        });

        Self {
            client,
            config: RwLock::new(Config::default()),
            documents: DashMap::new(),
            http_client,
            validator: None,
            runner: Arc::new(TokioCommandRunner),
            state: Arc::new(GlobalState::in_memory()),
            reference_log: None,
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn PolicyValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_state(mut self, state: Arc<GlobalState>) -> Self {
        self.state = state;
        self
    }

    pub fn with_reference_log(mut self, logger: Arc<MemoryLogger>) -> Self {
        self.reference_log = Some(logger);
        self
    }

    fn config_snapshot(&self) -> Config {
        self.config
            .read()
            .map(|config| config.clone())
            .unwrap_or_default()
    }

    /// Policy checks bound to the current configuration
    fn policy_checks(&self) -> PolicyChecks {
        let config = self.config_snapshot();
        let validator = match &self.validator {
            Some(validator) => Arc::clone(validator),
            None => Arc::new(
                AccessAnalyzerClient::with_client(Arc::clone(&self.http_client), config.region())
                    .with_endpoint(config.access_analyzer.endpoint.clone())
                    .with_profile(config.access_analyzer.profile.clone()),
            ),
        };
        PolicyChecks::new(config, validator, Arc::clone(&self.runner))
    }

    /// Use the open buffer if there is one, else read the file
    async fn resolve_document(
        &self,
        uri: &Url,
        path: Option<&Path>,
        document_type: DocumentType,
    ) -> std::result::Result<PolicyDocument, String> {
        if let Some(doc) = self.documents.get(uri) {
            tracing::debug!("Using open buffer for {} (version {})", uri, doc.version);
            let path = path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(uri.as_str()));
            return Ok(PolicyDocument::new(path, doc.text.clone(), document_type));
        }
        let Some(path) = path else {
            return Err(format!("{} is not open and has no file on disk", uri));
        };
        PolicyDocument::load(path, document_type)
            .await
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))
    }

    fn apply_log_level(level: LogLevel) {
        get_logger().set_log_level(level);
        get_logger_of(LoggerKind::DebugConsole).set_log_level(level);
    }

    async fn validate_policy(&self, arguments: &[Value]) -> Result<Option<Value>> {
        let args = first_argument::<ValidatePolicyArgs>(arguments)
            .and_then(ValidatePolicyArgs::parse)
            .map_err(Error::invalid_params)?;

        let document = match self
            .resolve_document(&args.uri, args.path.as_deref(), args.document_type)
            .await
        {
            Ok(document) => document,
            Err(message) => {
                get_logger().error(&message);
                self.client.show_message(MessageType::ERROR, &message).await;
                return Ok(None);
            }
        };

        let request = ValidationRequest {
            document,
            policy_type: args.policy_type,
            tf_config_path: args.tf_config_path.clone(),
            cfn_parameter_path: args.cfn_parameter_path.clone(),
        };

        let lsp_notifier = LspNotifier::new(self.client.clone());
        let recorder = RecordingNotifier::new();
        let notifier = TeeNotifier::new(vec![&lsp_notifier as &dyn Notifier, &recorder]);

        let outcome = self
            .policy_checks()
            .validate_policy(&request, &notifier)
            .await;

        let report = ValidationReport::new(
            args.display_name(),
            args.document_type,
            outcome,
            recorder.notices(),
        );
        Ok(to_response(&report))
    }

    async fn toggle_code_suggestions(&self) -> Option<Value> {
        let enabled = commands::toggle_code_suggestions(&self.state).await;
        if let Err(e) = self.client.inlay_hint_refresh().await {
            tracing::debug!("Inlay hint refresh not delivered: {}", e);
        }
        Some(Value::Bool(enabled))
    }

    async fn show_introduction(&self) -> Option<Value> {
        let uri = match Url::parse(commands::LEARN_MORE_URI) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!("Invalid learn-more URI: {}", e);
                return None;
            }
        };
        let params = ShowDocumentParams {
            uri,
            external: Some(true),
            take_focus: None,
            selection: None,
        };
        match self.client.show_document(params).await {
            Ok(shown) => Some(Value::Bool(shown)),
            Err(e) => {
                get_logger().warn(&format!("Failed to open introduction: {}", e));
                Some(Value::Bool(false))
            }
        }
    }

    fn reference_log_lines(&self) -> Vec<String> {
        self.reference_log
            .as_ref()
            .map(|logger| logger.lines())
            .unwrap_or_default()
    }
}

/// Mirrors facade output to the client's log via `window/logMessage`
struct ClientLogger {
    client: Client,
    level: RwLock<LogLevel>,
}

impl Logger for ClientLogger {
    fn log(&self, level: LogLevel, message: &str) {
        if !self.log_level_enabled(level) {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let client = self.client.clone();
        let message_type = match level {
            LogLevel::Error => MessageType::ERROR,
            LogLevel::Warn => MessageType::WARNING,
            LogLevel::Info => MessageType::INFO,
            LogLevel::Verbose | LogLevel::Debug => MessageType::LOG,
        };
        let message = message.to_string();
        handle.spawn(async move {
            client.log_message(message_type, message).await;
        });
    }

    fn set_log_level(&self, level: LogLevel) {
        if let Ok(mut current) = self.level.write() {
            *current = level;
        }
    }

    fn log_level_enabled(&self, level: LogLevel) -> bool {
        self.level
            .read()
            .map(|current| level.compare(*current) <= 0)
            .unwrap_or(true)
    }
}

/// Serialize a command result, logging instead of failing the request
fn to_response<T: Serialize>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(value) => Some(value),
        Err(e) => {
            get_logger().error(&format!("Failed to serialize command result: {}", e));
            None
        }
    }
}

/// Settings may arrive bare or nested under the server name
fn extract_settings(settings: Value) -> Value {
    match settings {
        Value::Object(mut map) if map.contains_key("policy-checks") => map
            .remove("policy-checks")
            .unwrap_or(Value::Object(Default::default())),
        other => other,
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for PolicyChecksBackend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        // Parse configuration from initialization options
        let config = Config::from_init_options(params.initialization_options.map(extract_settings));
        tracing::info!("Configuration: {:?}", config);
        Self::apply_log_level(config.log_level());

        // Store the configuration
        if let Ok(mut cfg) = self.config.write() {
            *cfg = config;
        }

        Ok(InitializeResult {
            server_info: Some(ServerInfo {
                name: "policy-checks-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: commands::ALL_COMMANDS
                        .iter()
                        .map(|c| c.to_string())
                        .collect(),
                    ..Default::default()
                }),
                ..Default::default()
            },
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let level = self.config_snapshot().log_level();
        set_logger(
            Some(Arc::new(ClientLogger {
                client: self.client.clone(),
                level: RwLock::new(level),
            })),
            LoggerKind::DebugConsole,
        );

        self.client
            .log_message(MessageType::INFO, "Policy checks LSP initialized")
            .await;
        tracing::info!("Policy checks LSP initialized");
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("Policy checks LSP shutting down");
        set_logger(None, LoggerKind::DebugConsole);
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("Document opened: {}", uri);

        let path = uri
            .to_file_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| uri.path().to_string());
        self.documents.insert(
            uri,
            DocumentState {
                text: params.text_document.text,
                version: params.text_document.version,
            },
        );

        self.client
            .send_notification::<InputPathChanged>(InputPathChangedParams { path })
            .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;

        // With FULL sync, we get the entire document content
        if let Some(change) = params.content_changes.into_iter().next() {
            tracing::debug!("Document changed: {}", uri);
            self.documents.insert(
                uri,
                DocumentState {
                    text: change.text,
                    version: params.text_document.version,
                },
            );
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!("Document closed: {}", uri);
        self.documents.remove(&uri);
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let new_config = Config::from_init_options(Some(extract_settings(params.settings)));
        Self::apply_log_level(new_config.log_level());

        let changes = match self.config.write() {
            Ok(mut cfg) => {
                let changes = new_config.changes_since(&cfg);
                *cfg = new_config;
                changes
            }
            Err(_) => {
                tracing::warn!("Configuration lock poisoned, ignoring change");
                return;
            }
        };

        for change in changes {
            tracing::debug!("Setting changed: {} = {}", change.key, change.value);
            self.client
                .send_notification::<ConfigurationChanged>(ConfigurationChangedParams {
                    key: change.key.to_string(),
                    value: change.value,
                })
                .await;
        }
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        get_logger_of(LoggerKind::DebugConsole)
            .debug(&format!("Executing command {}", params.command));

        match params.command.as_str() {
            commands::POLICY_CHECKS => {
                let data = self.policy_checks().init().await;
                Ok(to_response(&data))
            }
            commands::GET_REFERENCE_DOCUMENT => {
                let args = first_argument::<ReferenceDocumentArgs>(&params.arguments)
                    .map_err(Error::invalid_params)?;
                Ok(Some(Value::String(
                    read_reference_document(&args.path).await,
                )))
            }
            commands::VALIDATE_POLICY => self.validate_policy(&params.arguments).await,
            commands::TOGGLE_CODE_SUGGESTIONS => Ok(self.toggle_code_suggestions().await),
            commands::ENABLE_CODE_SUGGESTIONS => {
                commands::enable_code_suggestions(&self.state).await;
                Ok(None)
            }
            commands::SHOW_INTRODUCTION => Ok(self.show_introduction().await),
            commands::SHOW_REFERENCE_LOG => Ok(Some(Value::from(self.reference_log_lines()))),
            _ => {
                tracing::warn!("Unknown command: {}", params.command);
                Ok(None)
            }
        }
    }
}
