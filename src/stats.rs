//! 엔진 통계

use std::time::{Duration, Instant};

/// 재조립 엔진 카운터
///
/// 루프를 도는 단일 태스크만 기록한다. 복구 가능한 조건(미지원 전송계층,
/// 핸드셰이크 미관측 페이로드, Consumer 실패)은 에러 대신 여기에 드러난다.
#[derive(Debug, Clone)]
pub struct EngineStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 처리한 총 패킷 수
    pub packets_total: u64,

    /// TCP 세그먼트 수
    pub tcp_segments: u64,

    /// UDP 데이터그램 수
    pub udp_datagrams: u64,

    /// 건너뛴 미지원 전송계층 패킷 수
    pub unsupported_transport: u64,

    /// 핸드셰이크로 열린 세션 수
    pub sessions_opened: u64,

    /// 종료 패킷으로 닫힌 세션 수
    pub sessions_closed: u64,

    /// 핸드셰이크 미관측으로 폐기된 TCP 페이로드 수
    pub orphan_tcp_payloads: u64,

    /// 버퍼에 누적된 총 바이트
    pub bytes_buffered: u64,

    /// Consumer가 소비한 총 바이트
    pub bytes_consumed: u64,

    /// Consumer 실패 횟수 (EndOfStream 제외)
    pub consumer_errors: u64,

    /// 최대 크기 초과로 정리된 세션 수
    pub oversized_sessions: u64,
}

impl EngineStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            packets_total: 0,
            tcp_segments: 0,
            udp_datagrams: 0,
            unsupported_transport: 0,
            sessions_opened: 0,
            sessions_closed: 0,
            orphan_tcp_payloads: 0,
            bytes_buffered: 0,
            bytes_consumed: 0,
            consumer_errors: 0,
            oversized_sessions: 0,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 누적 처리율 (bytes/sec, 버퍼 기준)
    pub fn buffer_throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.bytes_buffered as f64 / elapsed
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Packets: {} (tcp {}, udp {}, other {}) | Sessions: +{}/-{} | Buffered: {} B | Consumed: {} B | Orphans: {} | Consumer errors: {} | Oversized: {}",
            self.elapsed().as_secs_f64(),
            self.packets_total,
            self.tcp_segments,
            self.udp_datagrams,
            self.unsupported_transport,
            self.sessions_opened,
            self.sessions_closed,
            self.bytes_buffered,
            self.bytes_consumed,
            self.orphan_tcp_payloads,
            self.consumer_errors,
            self.oversized_sessions,
        )
    }
}

impl Default for EngineStats {
    fn default() -> Self {
        Self::new()
    }
}
