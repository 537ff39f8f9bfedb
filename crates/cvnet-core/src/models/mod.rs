//! CVNET 도메인 모델.
//!
//! 게이트웨이 REST/SockJS 응답에서 추출한 레코드와 제어 명령 타입을 정의한다.
//! 벤더 서버는 같은 필드를 문자열/숫자로 섞어 보내므로 역직렬화는 관대하게 한다.

pub mod car_entry;
pub mod control;
mod lenient;
pub mod session;
pub mod telemeter;
pub mod visitor;
