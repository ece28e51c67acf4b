use anyhow::{bail, Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Slack Web APIのエンドポイント。
pub const DEFAULT_API_URL: &str = "https://slack.com/api";

/// メッセージの送信先。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// メッセージを送信する。失敗してもリトライはしない。
    async fn post_message(&self, text: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
}

/// `chat.postMessage`のレスポンス。HTTPステータスが200でも`ok`が`false`なら失敗している。
#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
}

/// 1つのチャンネルへメッセージを送るSlackクライアント。
pub struct SlackClient {
    client: Client,
    api_url: String,
    token: String,
    channel: String,
}

impl SlackClient {
    /// 新しい`SlackClient`を返す。
    ///
    /// # Arguments
    ///
    /// * `client` - HTTPクライアント
    /// * `token` - Slackのbotトークン
    /// * `channel` - 送信先のチャンネルIDまたはチャンネル名
    /// * `api_url` - Slack Web APIのベースURL
    pub fn new(client: Client, token: &str, channel: &str, api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            channel: channel.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for SlackClient {
    async fn post_message(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.api_url))
            .bearer_auth(&self.token)
            .json(&PostMessageRequest {
                channel: &self.channel,
                text,
            })
            .send()
            .await
            .with_context(|| format!("Failed to send request to Slack API at {}", self.api_url))?
            .error_for_status()
            .context("Request returned an error status")?
            .json::<PostMessageResponse>()
            .await
            .context("Failed to deserialize response")?;

        if !response.ok {
            bail!(
                "Slack rejected message to {}: {}",
                self.channel,
                response.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }

        Ok(())
    }
}
