//! 플로우 재조립 엔진
//!
//! 디코딩된 패킷 시퀀스를 소비하면서 세션 테이블을 유지하고, 누적 버퍼를
//! Consumer에 전달한다. 루프는 단일 태스크이며 유일한 대기 지점은
//! "다음 패킷 또는 취소 신호"다. Consumer 호출은 동기·블로킹이므로 느린
//! Consumer는 캡처를 직접 역압한다.
//!
//! 패킷별 처리 규칙:
//! - TCP SYN+ACK: 해당 플로우의 버퍼를 새로 만든다 (기존 버퍼 폐기)
//! - TCP FIN+ACK: 버퍼 삭제
//! - TCP 빈 페이로드: 건너뜀 (순수 제어 패킷)
//! - TCP 페이로드: 버퍼가 있으면 추가, 없으면 폐기 (핸드셰이크 미관측)
//! - UDP: 정책에 따라 생성/누적, 미등록이면 빈 뷰 전달
//! - 그 외 전송계층: 로그 후 건너뜀

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::{Config, UdpSessionPolicy};
use crate::error::{ConsumeError, Result};
use crate::flow::FlowKey;
use crate::packet::{DecodedPacket, Endpoint, Proto, Transport};
use crate::session::SessionTable;
use crate::stats::EngineStats;

/// 캡처 태스크 -> 엔진 패킷 채널 수신기 타입
///
/// `Err` 항목(디코딩 실패 등)은 루프를 치명적으로 종료시킨다.
pub type PacketReceiver = mpsc::Receiver<Result<DecodedPacket>>;

/// 스트림 Consumer 콜백
///
/// (소스, 목적지, 누적 버퍼 뷰)를 받아 앞에서부터 소비한 바이트 수를
/// 돌려준다. 뷰는 호출 동안만 유효하다. [`ConsumeError::EndOfStream`]을
/// 반환하면 루프가 정상 종료되고, 그 외 에러는 로그 후 버퍼를 유지한 채
/// 계속된다 (다음 페이로드 도착 시 같은 바이트가 다시 전달됨).
pub type StreamConsumer =
    Box<dyn FnMut(&Endpoint, &Endpoint, &[u8]) -> std::result::Result<usize, ConsumeError> + Send>;

/// 패킷 하나 처리 후 루프 제어
enum Step {
    Continue,
    Finished,
}

/// 플로우 재조립 엔진
///
/// 세션 테이블을 인스턴스로 소유하므로 독립 엔진 여러 개를 띄울 수 있다.
pub struct ReassemblyEngine {
    config: Config,
    sessions: SessionTable,
    consumer: Option<StreamConsumer>,
    stats: EngineStats,
    shutdown: Arc<AtomicBool>,
}

impl ReassemblyEngine {
    /// 새 엔진 생성
    pub fn new(config: Config) -> Self {
        let sessions = SessionTable::new(config.session_buffer_capacity);
        Self {
            config,
            sessions,
            consumer: None,
            stats: EngineStats::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Consumer 등록 (빌더 스타일)
    pub fn with_consumer(mut self, consumer: StreamConsumer) -> Self {
        self.consumer = Some(consumer);
        self
    }

    /// Consumer 등록/교체
    pub fn set_consumer(&mut self, consumer: StreamConsumer) {
        self.consumer = Some(consumer);
    }

    /// 외부에서 루프를 멈출 취소 핸들
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// UDP 플로우 사전 등록 ([`UdpSessionPolicy::RequireRegistration`]용)
    pub fn register_udp_session(&mut self, a: (std::net::Ipv4Addr, u16), b: (std::net::Ipv4Addr, u16)) {
        let key = FlowKey::new(Proto::Udp, a, b);
        self.sessions.open_if_absent(key);
    }

    /// 현재 통계 스냅샷
    pub fn stats(&self) -> EngineStats {
        self.stats.clone()
    }

    /// 활성 세션 수
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// 캡처 루프 실행
    ///
    /// 채널이 닫히거나(캡처 소진), Consumer가 EndOfStream을 반환하거나,
    /// 취소 신호가 설정되면 `Ok(())`로 끝난다. 디코딩 실패 항목과 캡처
    /// 읽기 실패는 에러로 전파된다.
    pub async fn run(&mut self, mut packets: PacketReceiver) -> Result<()> {
        let poll = Duration::from_millis(self.config.shutdown_poll_interval_ms.max(1));

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("shutdown signal observed, stopping capture loop");
                return Ok(());
            }

            let item = match tokio::time::timeout(poll, packets.recv()).await {
                Ok(Some(item)) => item,
                Ok(None) => {
                    info!("packet source exhausted, stopping capture loop");
                    return Ok(());
                }
                // 타임아웃: 취소 신호 재확인
                Err(_) => continue,
            };

            match self.handle_packet(item?)? {
                Step::Continue => {}
                Step::Finished => {
                    info!("consumer signalled end of stream");
                    return Ok(());
                }
            }
        }
    }

    fn handle_packet(&mut self, pkt: DecodedPacket) -> Result<Step> {
        self.stats.packets_total += 1;

        match &pkt.transport {
            Transport::Tcp {
                src_port,
                dst_port,
                syn,
                ack,
                fin,
                payload,
            } => {
                self.stats.tcp_segments += 1;

                let key = FlowKey::new(
                    Proto::Tcp,
                    (pkt.src_ip, *src_port),
                    (pkt.dst_ip, *dst_port),
                );
                let src = Endpoint::new(Proto::Tcp, pkt.src_ip, *src_port);
                let dst = Endpoint::new(Proto::Tcp, pkt.dst_ip, *dst_port);

                // 3-way 핸드셰이크의 SYN+ACK: 버퍼를 처음부터 다시 시작
                if *syn && *ack {
                    self.sessions.open(key);
                    self.stats.sessions_opened += 1;
                    debug!("session opened: {} <-> {}", src, dst);
                    return Ok(Step::Continue);
                }

                // 세션 종료: 테이블 정리
                if *fin && *ack {
                    if self.sessions.close(&key) {
                        self.stats.sessions_closed += 1;
                        debug!("session closed: {} <-> {}", src, dst);
                    }
                    return Ok(Step::Continue);
                }

                // 순수 제어 패킷 (bare ACK 등)
                if payload.is_empty() {
                    return Ok(Step::Continue);
                }

                match self.sessions.get_mut(&key) {
                    Some(buffer) => {
                        buffer.extend(payload);
                        self.stats.bytes_buffered += payload.len() as u64;
                    }
                    // 캡처가 스트림 중간부터 시작된 경우
                    None => {
                        self.stats.orphan_tcp_payloads += 1;
                        debug!("핸드셰이크 미관측 플로우 페이로드 폐기: {} -> {}", src, dst);
                        return Ok(Step::Continue);
                    }
                }

                if self.evict_if_oversized(&key, &src, &dst) {
                    return Ok(Step::Continue);
                }

                self.deliver(&src, &dst, &key)
            }

            Transport::Udp {
                src_port,
                dst_port,
                payload,
            } => {
                self.stats.udp_datagrams += 1;

                let key = FlowKey::new(
                    Proto::Udp,
                    (pkt.src_ip, *src_port),
                    (pkt.dst_ip, *dst_port),
                );
                let src = Endpoint::new(Proto::Udp, pkt.src_ip, *src_port);
                let dst = Endpoint::new(Proto::Udp, pkt.dst_ip, *dst_port);

                match self.config.udp_session_policy {
                    UdpSessionPolicy::CreateOnFirstPayload => {
                        let buffer = self.sessions.open_if_absent(key);
                        buffer.extend(payload);
                        self.stats.bytes_buffered += payload.len() as u64;
                    }
                    UdpSessionPolicy::RequireRegistration => {
                        if let Some(buffer) = self.sessions.get_mut(&key) {
                            buffer.extend(payload);
                            self.stats.bytes_buffered += payload.len() as u64;
                        }
                        // 미등록 플로우: 누적 없이 빈 뷰가 전달된다
                    }
                }

                if self.evict_if_oversized(&key, &src, &dst) {
                    return Ok(Step::Continue);
                }

                self.deliver(&src, &dst, &key)
            }

            Transport::Other { protocol } => {
                self.stats.unsupported_transport += 1;
                debug!("지원하지 않는 전송 계층: protocol={}", protocol);
                Ok(Step::Continue)
            }
        }
    }

    /// 버퍼가 최대 크기를 넘은 플로우를 정리. 정리했으면 true.
    fn evict_if_oversized(&mut self, key: &FlowKey, src: &Endpoint, dst: &Endpoint) -> bool {
        let oversized = self
            .sessions
            .get(key)
            .map(|b| b.len() > self.config.max_session_bytes)
            .unwrap_or(false);

        if oversized {
            self.sessions.close(key);
            self.stats.oversized_sessions += 1;
            warn!(
                "세션 버퍼 최대 크기({} B) 초과, 플로우 정리: {} <-> {}",
                self.config.max_session_bytes, src, dst
            );
        }

        oversized
    }

    /// 누적 버퍼를 Consumer에 전달하고 소비 결과를 반영
    fn deliver(&mut self, src: &Endpoint, dst: &Endpoint, key: &FlowKey) -> Result<Step> {
        let Some(consumer) = self.consumer.as_mut() else {
            return Ok(Step::Continue);
        };

        let view: &[u8] = match self.sessions.get(key) {
            Some(buffer) => buffer.as_bytes(),
            None => &[],
        };

        match consumer(src, dst, view) {
            Err(ConsumeError::EndOfStream) => Ok(Step::Finished),
            Err(e) => {
                // 버퍼는 잘리지 않는다. 다음 페이로드 도착 시 재전달.
                self.stats.consumer_errors += 1;
                warn!("{} -> {} consumer 실패: {}", src, dst, e);
                Ok(Step::Continue)
            }
            Ok(consumed) => {
                if let Some(buffer) = self.sessions.get_mut(key) {
                    let n = consumed.min(buffer.len());
                    buffer.consume(n);
                    self.stats.bytes_consumed += n as u64;
                }
                Ok(Step::Continue)
            }
        }
    }
}
