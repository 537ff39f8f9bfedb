//! 포트 인터페이스 (trait).
//!
//! 폴링 스케줄러, 명령 디스패처, UI 엔티티 같은 외부 협력자는
//! 이 trait만 보고 게이트웨이를 사용한다. 구현은 `cvnet-network` crate.
//!
//! 모든 async trait은 `async_trait` 매크로를 사용하여
//! object safety를 보장한다 (`Arc<dyn GatewayClient>`로 와이어링).

pub mod gateway;
