//! 서브커맨드 정의와 실행.
//!
//! 모든 호출은 `GatewayClient` 포트를 거치며 결과는 JSON으로 stdout에 출력한다.

use anyhow::{Context, Result};
use clap::Subcommand;
use cvnet_core::models::control::Command;
use cvnet_core::ports::gateway::GatewayClient;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Subcommand, Debug)]
pub enum Action {
    /// 부재중 방문자 목록
    Visitors {
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// 페이지당 행 수 (0이면 설정값)
        #[arg(long, default_value_t = 0)]
        rows: u32,
    },

    /// 차량 입출차 목록
    Cars {
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// 페이지당 행 수 (0이면 설정값)
        #[arg(long, default_value_t = 0)]
        rows: u32,
    },

    /// 방문자 이미지를 파일로 저장
    Image {
        /// 방문자 기록의 이미지 파일 이름
        file_name: String,

        /// 저장 경로
        #[arg(long, short = 'o')]
        output: PathBuf,
    },

    /// 검침 정보
    Telemeter,

    /// 제어 버스로 명령 전송
    Publish {
        /// 논리 주소 (예: 18 = 조명, 22 = 난방)
        address: String,

        #[arg(long, default_value = "control")]
        request: String,

        #[arg(long)]
        number: Option<String>,

        #[arg(long)]
        onoff: Option<String>,

        #[arg(long)]
        brightness: Option<String>,

        #[arg(long)]
        zone: Option<String>,

        #[arg(long)]
        temp: Option<String>,
    },

    /// 주소의 현재 상태 조회
    Status {
        /// 논리 주소
        address: String,
    },

    /// 세션 진단 정보
    Diagnostics,
}

/// publish 인자를 명령으로 변환 (지정된 필드만 채움)
pub fn build_command(
    request: &str,
    number: Option<String>,
    onoff: Option<String>,
    brightness: Option<String>,
    zone: Option<String>,
    temp: Option<String>,
) -> Command {
    Command {
        number,
        onoff,
        brightness,
        zone,
        temp,
        ..Command::new(request)
    }
}

pub async fn run(client: &dyn GatewayClient, action: Action) -> Result<()> {
    match action {
        Action::Visitors { page, rows } => {
            let visitors = client.list_visitors(page, rows).await?;
            info!("방문자 {}명", visitors.len());
            print_json(&visitors)
        }
        Action::Cars { page, rows } => {
            let page = client.list_car_entries(page, rows).await?;
            info!("입출차 {}건 (다음 페이지: {})", page.records.len(), page.has_next);
            print_json(&page)
        }
        Action::Image { file_name, output } => {
            match client.fetch_visitor_image(&file_name).await? {
                Some(bytes) => {
                    tokio::fs::write(&output, &bytes)
                        .await
                        .with_context(|| format!("이미지 저장 실패: {}", output.display()))?;
                    print_json(&json!({
                        "found": true,
                        "path": output.display().to_string(),
                        "bytes": bytes.len(),
                    }))
                }
                None => {
                    warn!("이미지 없음: {file_name}");
                    print_json(&json!({ "found": false }))
                }
            }
        }
        Action::Telemeter => print_json(&client.telemeter().await?),
        Action::Publish {
            address,
            request,
            number,
            onoff,
            brightness,
            zone,
            temp,
        } => {
            let command = build_command(&request, number, onoff, brightness, zone, temp);
            let ack = client.publish(&address, &command).await?;
            print_json(&ack)
        }
        Action::Status { address } => {
            let reply = client.status_snapshot(&address).await;
            if reply.is_none() {
                warn!("상태 응답 없음: {address}");
            }
            print_json(&reply)
        }
        Action::Diagnostics => print_json(&client.session_diagnostics()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_command_keeps_only_given_fields() {
        let cmd = build_command("control", Some("2".into()), Some("1".into()), None, None, None);
        assert_eq!(cmd.request, "control");
        assert_eq!(cmd.number.as_deref(), Some("2"));
        assert_eq!(cmd.onoff.as_deref(), Some("1"));
        assert!(cmd.brightness.is_none());
        assert!(cmd.id.is_none());
    }
}
