//! # FSR (Flow Stream Reassembly)
//!
//! pcap 기반 플로우 세션 스트림 재조립 엔진
//!
//! ## 핵심 특징
//! - **플로우 디멀티플렉싱**: 전송계층 4-튜플 기반, 방향 무관 플로우 키
//! - **세션 버퍼**: TCP 핸드셰이크로 생성, 종료 패킷으로 정리, UDP 누적
//! - **부분 소비 프로토콜**: Consumer가 소비한 prefix만 제거, 잔여 바이트 유지
//! - **협조적 캡처 루프**: 패킷 단위 취소 신호 확인, 단일 태스크 처리
//! - **라이브/리플레이**: `live://` 인터페이스 캡처, `replay://` 캡처 파일 재생

pub mod capture;
pub mod config;
pub mod engine;
pub mod error;
pub mod flow;
pub mod packet;
pub mod session;
pub mod source;
pub mod stats;

pub use config::{Config, UdpSessionPolicy};
pub use engine::{PacketReceiver, ReassemblyEngine, StreamConsumer};
pub use error::{ConsumeError, Error, Result};
pub use flow::FlowKey;
pub use packet::{DecodedPacket, Endpoint, LinkLayer, Proto, Transport};
pub use session::{SessionBuffer, SessionTable};
pub use source::DataSource;
pub use stats::EngineStats;

/// 세션 버퍼 초기 용량 (바이트)
pub const DEFAULT_SESSION_BUFFER_CAPACITY: usize = 1024 * 1024;

/// 세션 버퍼 최대 크기 (바이트, 초과 시 플로우 정리)
pub const DEFAULT_MAX_SESSION_BYTES: usize = 16 * 1024 * 1024;

/// 패킷 채널 기본 용량
pub const DEFAULT_PACKET_CHANNEL_CAPACITY: usize = 1024;

/// 라이브 캡처 기본 snaplen (바이트)
pub const DEFAULT_SNAPLEN: i32 = 65535;
