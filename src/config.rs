use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// 設定ファイルやstateファイルを配置するディレクトリ名。
const APP_DIR: &str = ".toggl2slack";

/// Slack, Togglの認証情報をまとめた設定。
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    pub slack_token: String,
    pub slack_channel: String,
    pub toggl_token: String,
}

impl Config {
    /// JSON形式の設定ファイルを読み込む。
    ///
    /// # Arguments
    ///
    /// * `path` - 設定ファイルのパス
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}

/// デフォルトの設定ファイルのパス(`~/.toggl2slack/config.json`)を返す。
pub fn default_config_path() -> Result<PathBuf> {
    app_dir().map(|dir| dir.join("config.json"))
}

/// デフォルトのstateファイルのパス(`~/.toggl2slack/data.json`)を返す。
pub fn default_state_path() -> Result<PathBuf> {
    app_dir().map(|dir| dir.join("data.json"))
}

fn app_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Failed to find home directory")?;
    Ok(home.join(APP_DIR))
}
