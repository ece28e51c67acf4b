use chrono::{DateTime, Utc};

/// Togglのタイムエントリー。
#[derive(Clone, Debug, PartialEq)]
pub struct TimeEntry {
    pub id: i64,
    pub description: String,
    /// 秒単位の経過時間。計測中のエントリーは負の値になる。
    pub duration: i64,
    pub start: DateTime<Utc>,
}

impl TimeEntry {
    /// 計測中であれば`true`を返す。
    pub fn is_running(&self) -> bool {
        self.duration < 0
    }
}
