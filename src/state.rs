use std::{
    collections::BTreeSet,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// 通知済みのタイムエントリーIDを記録する。
///
/// 開始通知と終了通知を別々の集合で管理する。集合なので同じIDを複数回登録しても1つにまとまる。
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct NotificationState {
    #[serde(rename = "Start", default, deserialize_with = "null_as_empty")]
    start_notified: BTreeSet<i64>,
    #[serde(rename = "Stop", default, deserialize_with = "null_as_empty")]
    stop_notified: BTreeSet<i64>,
}

impl NotificationState {
    pub fn is_start_notified(&self, id: i64) -> bool {
        self.start_notified.contains(&id)
    }

    pub fn is_stop_notified(&self, id: i64) -> bool {
        self.stop_notified.contains(&id)
    }

    /// 開始通知済みとして記録する。新たに追加した場合は`true`を返す。
    pub fn mark_start_notified(&mut self, id: i64) -> bool {
        self.start_notified.insert(id)
    }

    /// 終了通知済みとして記録する。新たに追加した場合は`true`を返す。
    pub fn mark_stop_notified(&mut self, id: i64) -> bool {
        self.stop_notified.insert(id)
    }
}

/// 過去に書き出されたファイルでは空の集合が`null`になっていることがある。
fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeSet<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeSet<i64>>::deserialize(deserializer)?.unwrap_or_default())
}

/// `NotificationState`をJSONファイルとして保存する。
///
/// 書き込みはこのストアを持つ1つのループからのみ行う前提で、ファイルロックは行わない。
#[derive(Clone, Debug)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// 新しい`StateStore`を返す。
    ///
    /// # Arguments
    ///
    /// * `path` - stateファイルのパス
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// stateファイルを読み込む。
    ///
    /// ファイルが存在しない場合はエラーにせず、空の`NotificationState`を返す。
    pub fn load(&self) -> Result<NotificationState> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(NotificationState::default())
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to read state file: {}", self.path.display())
                })
            }
        };
        let state = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse state file: {}", self.path.display()))?;

        Ok(state)
    }

    /// stateファイルを上書き保存する。親ディレクトリが存在しなければ作成する。
    pub fn save(&self, state: &NotificationState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create state directory: {}", parent.display())
            })?;
        }
        let contents = serde_json::to_string(state).context("Failed to serialize state")?;
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))?;

        Ok(())
    }
}
