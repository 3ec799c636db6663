//! 엔진 설정

use crate::{
    DEFAULT_MAX_SESSION_BYTES, DEFAULT_PACKET_CHANNEL_CAPACITY, DEFAULT_SESSION_BUFFER_CAPACITY,
    DEFAULT_SNAPLEN,
};

/// UDP 세션 버퍼 생성 정책
///
/// 이 엔진은 UDP 플로우의 수명주기를 정의하지 않으므로 버퍼 생성 시점이
/// 본질적으로 모호하다. 정책을 명시적으로 선택하게 한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdpSessionPolicy {
    /// 외부에서 미리 등록된 플로우만 누적. 미등록 플로우의 페이로드는
    /// 빈 뷰로 Consumer에 전달된다.
    RequireRegistration,

    /// 첫 페이로드 도착 시 버퍼를 생성
    CreateOnFirstPayload,
}

/// FSR 엔진 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 세션 버퍼 초기 용량 (바이트)
    pub session_buffer_capacity: usize,

    /// 세션 버퍼 최대 크기 (바이트). Consumer가 계속 실패하면 버퍼가
    /// 무한히 자랄 수 있으므로, 초과한 플로우는 경고와 함께 정리된다.
    pub max_session_bytes: usize,

    /// UDP 세션 버퍼 생성 정책
    pub udp_session_policy: UdpSessionPolicy,

    /// 캡처 태스크 -> 엔진 패킷 채널 용량
    pub packet_channel_capacity: usize,

    /// 취소 신호 폴링 간격 (밀리초)
    pub shutdown_poll_interval_ms: u64,

    /// 라이브 캡처 snaplen (바이트)
    pub snaplen: i32,

    /// 라이브 캡처 promiscuous 모드
    pub promiscuous: bool,

    /// 라이브 캡처 읽기 타임아웃 (밀리초)
    pub read_timeout_ms: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_buffer_capacity: DEFAULT_SESSION_BUFFER_CAPACITY,
            max_session_bytes: DEFAULT_MAX_SESSION_BYTES,
            udp_session_policy: UdpSessionPolicy::RequireRegistration,
            packet_channel_capacity: DEFAULT_PACKET_CHANNEL_CAPACITY,
            shutdown_poll_interval_ms: 10,
            snaplen: DEFAULT_SNAPLEN,
            promiscuous: true,
            read_timeout_ms: 100,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 고트래픽 라이브 캡처용 설정
    pub fn high_throughput() -> Self {
        Self {
            session_buffer_capacity: 4 * 1024 * 1024,  // 4MB
            max_session_bytes: 64 * 1024 * 1024,       // 64MB
            packet_channel_capacity: 8192,
            shutdown_poll_interval_ms: 50,
            read_timeout_ms: 10,
            ..Self::default()
        }
    }

    /// 저사양 기기용 설정
    pub fn low_spec() -> Self {
        Self {
            session_buffer_capacity: 64 * 1024,        // 64KB
            max_session_bytes: 2 * 1024 * 1024,        // 2MB
            packet_channel_capacity: 256,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_requires_registration() {
        let config = Config::default();
        assert_eq!(
            config.udp_session_policy,
            UdpSessionPolicy::RequireRegistration
        );
        assert!(config.max_session_bytes >= config.session_buffer_capacity);
    }
}
