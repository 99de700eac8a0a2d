use zed_extension_api::{self as zed, LanguageServerId, Result, settings::LspSettings};

const SERVER_NAME: &str = "policy-checks-lsp";

struct PolicyChecksExtension {
    cached_binary_path: Option<String>,
}

impl PolicyChecksExtension {
    fn language_server_binary_path(
        &mut self,
        language_server_id: &LanguageServerId,
        worktree: &zed::Worktree,
    ) -> Result<String> {
        // Explicit path from the user's LSP settings wins
        if let Some(path) = LspSettings::for_worktree(SERVER_NAME, worktree)
            .ok()
            .and_then(|settings| settings.binary)
            .and_then(|binary| binary.path)
        {
            return Ok(path);
        }

        // Return cached path if valid
        if let Some(path) = &self.cached_binary_path
            && std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
        {
            return Ok(path.clone());
        }

        let (platform, _) = zed::current_platform();
        let binary_name = match platform {
            zed::Os::Mac | zed::Os::Linux => SERVER_NAME.to_string(),
            zed::Os::Windows => format!("{SERVER_NAME}.exe"),
        };

        if let Some(path) = worktree.which(&binary_name) {
            zed::log(&format!("Using {binary_name} from PATH: {path}"));
            self.cached_binary_path = Some(path.clone());
            return Ok(path);
        }

        zed::set_language_server_installation_status(
            language_server_id,
            &zed::LanguageServerInstallationStatus::Failed(format!(
                "{binary_name} not found on PATH"
            )),
        );
        Err(format!(
            "{binary_name} not found; install it with `cargo install policy-checks-lsp`"
        ))
    }
}

impl zed::Extension for PolicyChecksExtension {
    fn new() -> Self {
        Self {
            cached_binary_path: None,
        }
    }

    fn language_server_command(
        &mut self,
        language_server_id: &LanguageServerId,
        worktree: &zed::Worktree,
    ) -> Result<zed::Command> {
        let binary_path = self.language_server_binary_path(language_server_id, worktree)?;

        let args = LspSettings::for_worktree(SERVER_NAME, worktree)
            .ok()
            .and_then(|settings| settings.binary)
            .and_then(|binary| binary.arguments)
            .unwrap_or_else(|| vec!["lsp".to_string()]);

        Ok(zed::Command {
            command: binary_path,
            args,
            env: worktree.shell_env(),
        })
    }

    fn language_server_initialization_options(
        &mut self,
        _language_server_id: &LanguageServerId,
        worktree: &zed::Worktree,
    ) -> Result<Option<zed::serde_json::Value>> {
        // Forwarded as-is; the server unwraps a nested `policy-checks` key
        Ok(LspSettings::for_worktree(SERVER_NAME, worktree)
            .ok()
            .and_then(|settings| settings.initialization_options))
    }

    fn language_server_workspace_configuration(
        &mut self,
        _language_server_id: &LanguageServerId,
        worktree: &zed::Worktree,
    ) -> Result<Option<zed::serde_json::Value>> {
        Ok(LspSettings::for_worktree(SERVER_NAME, worktree)
            .ok()
            .and_then(|settings| settings.settings))
    }
}

zed::register_extension!(PolicyChecksExtension);
