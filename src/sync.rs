use std::{future::Future, time::Duration};

use anyhow::{Context, Result};
use log::{debug, error, info};
use tokio::time::{interval, MissedTickBehavior};

use crate::{slack::Notifier, state::StateStore, time_entry::TimeEntry, toggl::TimeEntrySource};

/// 1回のポーリングで送信した通知の集計。
#[derive(Debug, Default, PartialEq)]
pub struct PassSummary {
    pub entries: usize,
    pub started: usize,
    pub stopped: usize,
}

/// Togglのタイムエントリーを取得し、開始/終了をSlackへ通知する。
///
/// 通知を送るたびにstateファイルを読み直して保存するので、途中で失敗しても
/// 送信済みの通知だけが記録された状態になる。
pub struct Syncer<S, N> {
    source: S,
    notifier: N,
    store: StateStore,
}

impl<S: TimeEntrySource, N: Notifier> Syncer<S, N> {
    /// 新しい`Syncer`を返す。
    pub fn new(source: S, notifier: N, store: StateStore) -> Self {
        Self {
            source,
            notifier,
            store,
        }
    }

    /// 1回分のポーリングを行う。
    ///
    /// エラーが発生した時点で残りのタイムエントリーは処理せずに返す。
    pub async fn run_pass(&self) -> Result<PassSummary> {
        info!("Fetch toggl time entries");
        let entries = self
            .source
            .fetch_entries()
            .await
            .context("Failed to fetch time entries")?;

        let mut summary = PassSummary {
            entries: entries.len(),
            ..Default::default()
        };
        for entry in &entries {
            if self.notify_start(entry).await? {
                summary.started += 1;
            }
            if self.notify_stop(entry).await? {
                summary.stopped += 1;
            }
        }

        Ok(summary)
    }

    /// 未通知であれば開始通知を送る。送信した場合は`true`を返す。
    async fn notify_start(&self, entry: &TimeEntry) -> Result<bool> {
        let mut state = self.store.load().context("Failed to load state")?;
        if state.is_start_notified(entry.id) {
            return Ok(false);
        }

        info!("Post start message: id={}, started at {}", entry.id, entry.start);
        self.notifier
            .post_message(&start_message(entry))
            .await
            .with_context(|| format!("Failed to post start message for entry {}", entry.id))?;
        state.mark_start_notified(entry.id);
        self.store.save(&state).context("Failed to save state")?;

        Ok(true)
    }

    /// 終了済みかつ未通知であれば終了通知を送る。送信した場合は`true`を返す。
    async fn notify_stop(&self, entry: &TimeEntry) -> Result<bool> {
        let mut state = self.store.load().context("Failed to load state")?;
        if entry.is_running() || state.is_stop_notified(entry.id) {
            return Ok(false);
        }

        info!("Post stop message: id={}, duration={}s", entry.id, entry.duration);
        self.notifier
            .post_message(&stop_message(entry))
            .await
            .with_context(|| format!("Failed to post stop message for entry {}", entry.id))?;
        state.mark_stop_notified(entry.id);
        self.store.save(&state).context("Failed to save state")?;

        Ok(true)
    }

    /// `every`間隔でポーリングを繰り返す。
    ///
    /// 最初のポーリングはすぐに行う。ポーリングの失敗はログに出力して次の間隔で再試行する。
    /// `shutdown`が完了するとポーリングの合間で終了する。
    pub async fn run<F>(&self, every: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down");
                    return;
                }
                _ = ticker.tick() => {}
            }

            match self.run_pass().await {
                Ok(summary) => debug!(
                    "Pass finished: {} entries, {} started, {} stopped",
                    summary.entries, summary.started, summary.stopped
                ),
                Err(err) => error!("{:#}", err),
            }
        }
    }
}

fn start_message(entry: &TimeEntry) -> String {
    format!(":start: {}", entry.description)
}

fn stop_message(entry: &TimeEntry) -> String {
    format!(":stop: {}", entry.description)
}
