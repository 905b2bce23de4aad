use std::path::{Path, PathBuf};

pub const CONFIG_DIR_ENV: &str = "LLMLAB_CONFIG_DIR";
pub const AGENTS_DIR_ENV: &str = "LLMLAB_AGENTS_DIR";
pub const SWITCH_TOOL_ENV: &str = "LLMLAB_SWITCH_TOOL";
pub const AUTHORIZED_USERS_ENV: &str = "LLMLAB_AUTHORIZED_USERS";

const ENDPOINTS_FILE: &str = "endpoints.json";
const MODELS_FILE: &str = "models.json";
const ROOMS_FILE: &str = "rooms.json";

/// Explicit values from the command line. They win over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_dir: Option<PathBuf>,
    pub agents_dir: Option<PathBuf>,
    pub switch_tool: Option<PathBuf>,
    pub authorized_users: Vec<String>,
}

/// Resolved locations and policy inputs for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabConfig {
    pub config_dir: PathBuf,
    pub agents_dir: PathBuf,
    pub switch_tool: PathBuf,
    pub authorized_users: Vec<String>,
}

impl LabConfig {
    pub fn resolve(overrides: ConfigOverrides) -> Self {
        let config_dir = overrides
            .config_dir
            .or_else(|| env_path(CONFIG_DIR_ENV))
            .unwrap_or_else(default_config_dir);
        let agents_dir = overrides
            .agents_dir
            .or_else(|| env_path(AGENTS_DIR_ENV))
            .unwrap_or_else(default_agents_dir);
        let switch_tool = overrides
            .switch_tool
            .or_else(|| env_path(SWITCH_TOOL_ENV))
            .unwrap_or_else(|| config_dir.join("bin").join("llm-switch"));

        let mut authorized_users = overrides.authorized_users;
        if let Ok(value) = std::env::var(AUTHORIZED_USERS_ENV) {
            authorized_users.extend(split_users(&value));
        }
        authorized_users.sort();
        authorized_users.dedup();

        Self {
            config_dir,
            agents_dir,
            switch_tool,
            authorized_users,
        }
    }

    /// Everything under one directory; used by tests and portable installs.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            config_dir: root.to_path_buf(),
            agents_dir: root.join("agents"),
            switch_tool: root.join("bin").join("llm-switch"),
            authorized_users: Vec::new(),
        }
    }

    pub fn endpoints_path(&self) -> PathBuf {
        self.config_dir.join(ENDPOINTS_FILE)
    }

    pub fn models_path(&self) -> PathBuf {
        self.config_dir.join(MODELS_FILE)
    }

    pub fn rooms_path(&self) -> PathBuf {
        self.config_dir.join(ROOMS_FILE)
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn split_users(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .map(str::trim)
        .filter(|user| !user.is_empty())
        .map(str::to_string)
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("llmlab"))
        .unwrap_or_else(|| PathBuf::from(".").join(".llmlab"))
}

fn default_agents_dir() -> PathBuf {
    dirs::home_dir()
        .map(|dir| dir.join(".openclaw").join("agents"))
        .unwrap_or_else(|| PathBuf::from(".").join(".openclaw").join("agents"))
}
