use std::{future, path::Path, path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use fern::colors::{Color, ColoredLevelConfig};
use log::{error, info, LevelFilter};
use reqwest::Client;

mod config;
mod slack;
mod state;
mod sync;
mod time_entry;
mod toggl;

use config::Config;
use slack::SlackClient;
use state::StateStore;
use sync::Syncer;
use toggl::TogglClient;

/// Toggl APIとSlack APIへのリクエストのタイムアウト。
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Togglのタイムエントリーの開始/終了をSlackへ通知するアプリケーション。
///
/// # Examples
/// ```
/// $ cargo run
/// $ cargo run -- --once --log-level debug
/// $ cargo run -- --interval 60 --log-file ~/.toggl2slack/toggl2slack.log
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(
        short = 'c',
        long = "config",
        help = "Path to the config file [default: ~/.toggl2slack/config.json]"
    )]
    config: Option<PathBuf>,

    #[clap(
        short = 's',
        long = "state",
        help = "Path to the state file [default: ~/.toggl2slack/data.json]"
    )]
    state: Option<PathBuf>,

    #[clap(
        short = 'i',
        long = "interval",
        help = "Polling interval in seconds",
        default_value = "20",
        parse(try_from_str = parse_interval),
    )]
    interval: Duration,

    #[clap(long = "once", help = "Run a single polling pass and exit")]
    once: bool,

    #[clap(long = "log-level", help = "Log level", default_value = "info")]
    log_level: LevelFilter,

    #[clap(long = "log-file", help = "Also append logs to this file")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logger(args.log_level, args.log_file.as_deref()).context("Failed to set up logger")?;

    let config_path = match args.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    let config = Config::load(&config_path)?;
    let state_path = match args.state {
        Some(path) => path,
        None => config::default_state_path()?,
    };
    let store = StateStore::new(state_path);
    info!("State file: {}", store.path().display());

    let syncer = build_syncer(&config, store)?;

    if args.once {
        let summary = syncer.run_pass().await?;
        info!(
            "Done: {} entries, {} started, {} stopped",
            summary.entries, summary.started, summary.stopped
        );
        return Ok(());
    }

    info!("Polling every {} seconds", args.interval.as_secs());
    syncer.run(args.interval, shutdown_signal()).await;

    Ok(())
}

/// 設定から`Syncer`を組み立てる。
fn build_syncer(config: &Config, store: StateStore) -> Result<Syncer<TogglClient, SlackClient>> {
    let client = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;
    let toggl = TogglClient::new(client.clone(), &config.toggl_token, toggl::DEFAULT_API_URL);
    let slack = SlackClient::new(
        client,
        &config.slack_token,
        &config.slack_channel,
        slack::DEFAULT_API_URL,
    );

    Ok(Syncer::new(toggl, slack, store))
}

/// Ctrl-Cを受け取ると完了する。シグナルを待ち受けられない場合は完了しない。
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        future::pending::<()>().await;
    }
}

/// 標準出力と、指定されていればファイルへログを出力する。
fn setup_logger(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue);
    let stdout = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .chain(std::io::stdout());

    let mut dispatch = fern::Dispatch::new()
        .level(level)
        .level_for("hyper", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .chain(stdout);
    if let Some(path) = log_file {
        let file = fern::log_file(path)
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .format(|out, message, record| {
                    out.finish(format_args!(
                        "[{} {} {}] {}",
                        Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        record.target(),
                        message
                    ))
                })
                .chain(file),
        );
    }
    dispatch.apply()?;

    Ok(())
}

/// ポーリング間隔を秒数としてパースする。
fn parse_interval(s: &str) -> Result<Duration> {
    let secs: u64 = s
        .parse()
        .with_context(|| format!("Failed to parse interval: {}", s))?;
    if secs == 0 {
        bail!("Interval must be greater than 0");
    }

    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use log::LevelFilter;
    use rstest::rstest;

    use super::{parse_interval, Args};

    #[rstest]
    #[case("1", Duration::from_secs(1))]
    #[case("20", Duration::from_secs(20))]
    #[case("3600", Duration::from_secs(3600))]
    fn test_parse_interval(#[case] input: &str, #[case] expected: Duration) {
        assert_eq!(parse_interval(input).unwrap(), expected);
    }

    #[rstest]
    #[case::zero("0")]
    #[case::negative("-5")]
    #[case::not_a_number("twenty")]
    fn test_parse_interval_invalid(#[case] input: &str) {
        assert!(parse_interval(input).is_err());
    }

    /// 引数を省略した場合のデフォルト値を確認する。
    #[test]
    fn test_args_default() {
        let args = Args::try_parse_from(["toggl2slack"]).unwrap();

        assert_eq!(args.config, None);
        assert_eq!(args.state, None);
        assert_eq!(args.interval, Duration::from_secs(20));
        assert!(!args.once);
        assert_eq!(args.log_level, LevelFilter::Info);
        assert_eq!(args.log_file, None);
    }

    #[test]
    fn test_args_custom() {
        let args = Args::try_parse_from([
            "toggl2slack",
            "--config",
            "/tmp/config.json",
            "--state",
            "/tmp/data.json",
            "--interval",
            "60",
            "--once",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(args.config.unwrap().to_str(), Some("/tmp/config.json"));
        assert_eq!(args.state.unwrap().to_str(), Some("/tmp/data.json"));
        assert_eq!(args.interval, Duration::from_secs(60));
        assert!(args.once);
        assert_eq!(args.log_level, LevelFilter::Debug);
    }

    #[test]
    fn test_args_zero_interval() {
        assert!(Args::try_parse_from(["toggl2slack", "--interval", "0"]).is_err());
    }
}
