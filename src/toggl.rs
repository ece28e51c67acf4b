use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
#[cfg(test)]
use mockall::automock;
use reqwest::{header::CONTENT_TYPE, Client};
use serde::Deserialize;

use crate::time_entry::TimeEntry;

/// Toggl API v9のエンドポイント。
pub const DEFAULT_API_URL: &str = "https://api.track.toggl.com/api/v9";

/// タイムエントリーの取得元。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TimeEntrySource: Send + Sync {
    /// 現在のタイムエントリーを取得する。
    ///
    /// 返す順序はAPIが返した順序のままとする。
    async fn fetch_entries(&self) -> Result<Vec<TimeEntry>>;
}

/// Toggl APIのレスポンスをデシリアライズするための構造体。
#[derive(Debug, Deserialize)]
struct TogglTimeEntry {
    id: i64,
    description: Option<String>,
    start: DateTime<Utc>,
    duration: i64,
}

impl From<TogglTimeEntry> for TimeEntry {
    fn from(entry: TogglTimeEntry) -> Self {
        Self {
            id: entry.id,
            description: entry.description.unwrap_or_default(),
            duration: entry.duration,
            start: entry.start,
        }
    }
}

/// Toggl APIと通信するためのクライアント。
///
/// # Examples
///
/// ```
/// let client = TogglClient::new(Client::new(), &config.toggl_token, DEFAULT_API_URL);
/// let time_entries = client.fetch_entries().await?;
/// ```
pub struct TogglClient {
    client: Client,
    api_url: String,
    api_token: String,
}

impl TogglClient {
    /// 新しい`TogglClient`を返す。
    ///
    /// # Arguments
    ///
    /// * `client` - HTTPクライアント。タイムアウトはこちらで設定しておく
    /// * `api_token` - TogglのAPIトークン
    /// * `api_url` - Toggl APIのベースURL
    pub fn new(client: Client, api_token: &str, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
        }
    }
}

#[async_trait]
impl TimeEntrySource for TogglClient {
    async fn fetch_entries(&self) -> Result<Vec<TimeEntry>> {
        let toggl_time_entries = self
            .client
            .get(format!("{}/me/time_entries", self.api_url))
            .basic_auth(&self.api_token, Some("api_token"))
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to send request to Toggl API at {}", self.api_url))?
            .error_for_status()
            .context("Request returned an error status")?
            .json::<Vec<TogglTimeEntry>>()
            .await
            .context("Failed to deserialize response")?;
        debug!("length of time entries: {}", toggl_time_entries.len());

        Ok(toggl_time_entries.into_iter().map(TimeEntry::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use chrono::{TimeZone, Utc};
    use reqwest::Client;
    use rstest::rstest;

    use super::{TimeEntrySource, TogglClient};
    use crate::time_entry::TimeEntry;

    fn basic_auth_header(token: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:api_token", token)))
    }

    /// レスポンスのタイムエントリーがAPIの順序のまま変換されることを確認する。
    #[tokio::test]
    async fn test_fetch_entries() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/me/time_entries")
            .match_header("authorization", basic_auth_header("toggl-token").as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"id": 2, "workspace_id": 10, "description": "Task B", "start": "2024-01-01T10:00:00+00:00", "stop": null, "duration": -1704103200},
                    {"id": 1, "workspace_id": 10, "description": null, "start": "2024-01-01T09:00:00Z", "stop": "2024-01-01T09:30:00Z", "duration": 1800}
                ]"#,
            )
            .create_async()
            .await;

        let client = TogglClient::new(Client::new(), "toggl-token", &server.url());
        let entries = client.fetch_entries().await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            entries,
            vec![
                TimeEntry {
                    id: 2,
                    description: "Task B".to_string(),
                    duration: -1704103200,
                    start: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
                },
                TimeEntry {
                    id: 1,
                    description: String::new(),
                    duration: 1800,
                    start: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
                },
            ]
        );
        assert!(entries[0].is_running());
        assert!(!entries[1].is_running());
    }

    /// エラーステータスや不正なレスポンスの場合はエラーになることを確認する。
    #[rstest]
    #[case::unauthorized(403, "Incorrect username and/or password")]
    #[case::server_error(500, "")]
    #[case::not_a_list(200, r#"{"id": 1}"#)]
    #[case::missing_id(200, r#"[{"description": "x", "start": "2024-01-01T09:00:00Z", "duration": 1}]"#)]
    #[tokio::test]
    async fn test_fetch_entries_error(#[case] status: usize, #[case] body: &str) {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/me/time_entries")
            .with_status(status)
            .with_body(body)
            .create_async()
            .await;

        let client = TogglClient::new(Client::new(), "toggl-token", &server.url());
        let result = client.fetch_entries().await;

        assert!(result.is_err());
    }

    /// 接続できない場合はエラーになることを確認する。
    #[tokio::test]
    async fn test_fetch_entries_unreachable() {
        let client = TogglClient::new(Client::new(), "toggl-token", "http://127.0.0.1:1");

        assert!(client.fetch_entries().await.is_err());
    }
}
