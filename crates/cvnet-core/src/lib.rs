//! # cvnet-core
//!
//! CVNET 게이트웨이 도메인 모델, 포트(trait) 정의, 에러 타입, 설정.
//! 네트워크 어댑터와 외부 협력자(폴러, 명령 디스패처)가 공유하는
//! 타입과 인터페이스를 제공한다.
//!
//! ## 구조
//!
//! - [`models`]: 방문자/입출차/검침/제어 명령 구조체 (serde)
//! - [`ports`]: 게이트웨이 클라이언트 포트 (async_trait)
//! - [`error`]: 핵심 에러 타입 (thiserror)
//! - [`config`]: 게이트웨이 설정 구조체
//! - [`config_manager`]: 설정 파일 로드

pub mod config;
pub mod config_manager;
pub mod error;
pub mod models;
pub mod ports;
