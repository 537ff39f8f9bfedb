//! 설정 파일 로드.
//!
//! 플랫폼별 설정 디렉토리(또는 지정 경로)의 JSON 파일에서 설정을 읽는다.
//! 파일이 없으면 기본 설정을 사용하며, 아무것도 디스크에 쓰지 않는다.

use crate::config::GatewayConfig;
use crate::error::CoreError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// 설정 파일 이름
const CONFIG_FILE_NAME: &str = "config.json";

/// 앱 디렉토리 이름
const APP_DIR_NAME: &str = "cvnet";

/// 설정 로더
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// 플랫폼 기본 경로 기반 로더
    pub fn new() -> Result<Self, CoreError> {
        Ok(Self::with_path(Self::config_dir()?.join(CONFIG_FILE_NAME)))
    }

    /// 지정된 경로 기반 로더
    pub fn with_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// 설정 파일 경로 반환
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 설정 로드: 파일이 없으면 기본값
    pub fn load(&self) -> Result<GatewayConfig, CoreError> {
        if !self.config_path.exists() {
            info!(
                "설정 파일 없음, 기본 설정 사용: {}",
                self.config_path.display()
            );
            return Ok(GatewayConfig::default());
        }

        let content = fs::read_to_string(&self.config_path).map_err(|e| {
            CoreError::Config(format!(
                "설정 파일 읽기 실패: {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        let config: GatewayConfig = serde_json::from_str(&content).map_err(|e| {
            CoreError::Config(format!(
                "설정 파일 파싱 실패: {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        debug!("설정 파일 로드 완료: {}", self.config_path.display());
        Ok(config)
    }

    /// 플랫폼별 설정 디렉토리 경로
    pub fn config_dir() -> Result<PathBuf, CoreError> {
        #[cfg(target_os = "macos")]
        {
            // macOS: ~/Library/Application Support/cvnet/
            let home = std::env::var("HOME")
                .map_err(|_| CoreError::Config("HOME 환경 변수를 찾을 수 없습니다".to_string()))?;
            Ok(PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join(APP_DIR_NAME))
        }

        #[cfg(target_os = "windows")]
        {
            // Windows: %APPDATA%\cvnet\
            let appdata = std::env::var("APPDATA").map_err(|_| {
                CoreError::Config("APPDATA 환경 변수를 찾을 수 없습니다".to_string())
            })?;
            Ok(PathBuf::from(appdata).join(APP_DIR_NAME))
        }

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            // Linux: $XDG_CONFIG_HOME/cvnet/ 또는 ~/.config/cvnet/
            if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
                return Ok(PathBuf::from(xdg).join(APP_DIR_NAME));
            }
            let home = std::env::var("HOME")
                .map_err(|_| CoreError::Config("HOME 환경 변수를 찾을 수 없습니다".to_string()))?;
            Ok(PathBuf::from(home).join(".config").join(APP_DIR_NAME))
        }
    }
}
