//! # cvnet-app
//!
//! CVNET 게이트웨이 CLI 진입점.
//! 설정 로드, 로깅 초기화, 로그인 후 서브커맨드 한 번 실행.

mod commands;

use anyhow::Result;
use clap::Parser;
use cvnet_core::config::GatewayConfig;
use cvnet_core::config_manager::ConfigLoader;
use cvnet_network::CvnetClient;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::commands::Action;

/// CVNET 홈 게이트웨이 클라이언트
///
/// 방문자/입출차 조회, 검침, 장치 제어 명령 전송
#[derive(Parser, Debug)]
#[command(name = "cvnet")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리의 cvnet/config.json)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 게이트웨이 URL (설정 파일 값을 덮어씀)
    #[arg(long, short = 's')]
    base_url: Option<String>,

    /// 로그인 ID
    #[arg(long, short = 'u', env = "CVNET_USERNAME")]
    username: String,

    /// 로그인 비밀번호
    #[arg(long, short = 'p', env = "CVNET_PASSWORD", hide_env_values = true)]
    password: String,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    action: Action,
}

fn load_config(args: &Args) -> Result<GatewayConfig> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::with_path(path.clone()),
        None => ConfigLoader::new()?,
    };
    let mut config = loader.load()?;
    if let Some(base_url) = &args.base_url {
        config.server.base_url = base_url.clone();
    }
    debug!("설정 경로: {}", loader.config_path().display());
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 로깅은 stderr로 (stdout은 JSON 결과 전용)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&args)?;
    info!("CVNET 게이트웨이: {}", config.server.base_url);

    let client = CvnetClient::new(config)?;
    client.login(&args.username, &args.password).await?;

    let result = commands::run(&client, args.action).await;
    client.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn publish_arguments_parse() {
        let args = parse(&[
            "cvnet", "-u", "user", "-p", "pw", "publish", "18", "--number", "2", "--onoff", "1",
        ]);
        match args.action {
            Action::Publish {
                address,
                request,
                number,
                onoff,
                ..
            } => {
                assert_eq!(address, "18");
                assert_eq!(request, "control");
                assert_eq!(number.as_deref(), Some("2"));
                assert_eq!(onoff.as_deref(), Some("1"));
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn list_rows_default_to_config() {
        let args = parse(&["cvnet", "-u", "user", "-p", "pw", "cars"]);
        assert!(matches!(args.action, Action::Cars { page: 1, rows: 0 }));
    }

    #[test]
    fn base_url_flag_overrides_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"server":{"base_url":"http://from-file"}}"#).unwrap();

        let args = parse(&[
            "cvnet",
            "-u",
            "user",
            "-p",
            "pw",
            "-c",
            path.to_str().unwrap(),
            "diagnostics",
        ]);
        assert_eq!(load_config(&args).unwrap().server.base_url, "http://from-file");

        let args = parse(&[
            "cvnet",
            "-u",
            "user",
            "-p",
            "pw",
            "-c",
            path.to_str().unwrap(),
            "-s",
            "http://override",
            "diagnostics",
        ]);
        assert_eq!(load_config(&args).unwrap().server.base_url, "http://override");
    }
}
