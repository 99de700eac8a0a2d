//! User-facing notices (info / warning / error)

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tower_lsp::Client;
use tower_lsp::lsp_types::MessageType;
use tower_lsp::lsp_types::notification::Notification;

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

impl NoticeLevel {
    pub fn as_message_type(&self) -> MessageType {
        match self {
            NoticeLevel::Info => MessageType::INFO,
            NoticeLevel::Warning => MessageType::WARNING,
            NoticeLevel::Error => MessageType::ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Sink for notices produced by a validation
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, level: NoticeLevel, message: String);

    async fn show_information(&self, message: String) {
        self.notify(NoticeLevel::Info, message).await;
    }

    async fn show_warning(&self, message: String) {
        self.notify(NoticeLevel::Warning, message).await;
    }

    async fn show_error(&self, message: String) {
        self.notify(NoticeLevel::Error, message).await;
    }
}

/// Sends notices to the editor via `window/showMessage`
pub struct LspNotifier {
    client: Client,
}

impl LspNotifier {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Notifier for LspNotifier {
    async fn notify(&self, level: NoticeLevel, message: String) {
        self.client
            .show_message(level.as_message_type(), message)
            .await;
    }
}

/// Keeps notices in memory (CLI output, command responses, tests)
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|notices| notices.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, level: NoticeLevel) -> usize {
        self.notices
            .lock()
            .map(|notices| notices.iter().filter(|n| n.level == level).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, level: NoticeLevel, message: String) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(Notice { level, message });
        }
    }
}

/// Fans a notice out to several notifiers, in order
pub struct TeeNotifier<'a> {
    targets: Vec<&'a dyn Notifier>,
}

impl<'a> TeeNotifier<'a> {
    pub fn new(targets: Vec<&'a dyn Notifier>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl Notifier for TeeNotifier<'_> {
    async fn notify(&self, level: NoticeLevel, message: String) {
        for target in &self.targets {
            target.notify(level, message.clone()).await;
        }
    }
}

/// `aws/policyChecks/configurationChanged`: a policy-checks setting changed
pub enum ConfigurationChanged {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationChangedParams {
    pub key: String,
    pub value: String,
}

impl Notification for ConfigurationChanged {
    type Params = ConfigurationChangedParams;
    const METHOD: &'static str = "aws/policyChecks/configurationChanged";
}

/// `aws/policyChecks/inputPathChanged`: the document the user is working on changed
pub enum InputPathChanged {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPathChangedParams {
    pub path: String,
}

impl Notification for InputPathChanged {
    type Params = InputPathChangedParams;
    const METHOD: &'static str = "aws/policyChecks/inputPathChanged";
}
