//! 세션 버퍼와 세션 테이블
//!
//! - SessionBuffer: 플로우 하나의 아직 소비되지 않은 바이트 스트림
//! - SessionTable: FlowKey -> SessionBuffer 매핑, 엔진 인스턴스가 소유
//!
//! 버퍼는 소비된 prefix 제거 외에는 줄어들지 않고, 순서가 바뀌지 않는다.
//! Consumer에는 호출 한 번 동안만 유효한 빌린 뷰로 전달된다.

use std::collections::HashMap;

use bytes::{Buf, BytesMut};

use crate::flow::FlowKey;

/// 플로우 하나의 누적 바이트 버퍼
#[derive(Debug)]
pub struct SessionBuffer {
    data: BytesMut,
}

impl SessionBuffer {
    /// 초기 용량을 지정해 빈 버퍼 생성
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
        }
    }

    /// 페이로드를 끝에 추가
    pub fn extend(&mut self, payload: &[u8]) {
        self.data.extend_from_slice(payload);
    }

    /// 소비된 prefix 제거. `n`이 길이를 넘으면 전체를 비운다.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.data.len());
        self.data.advance(n);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// 플로우 키 -> 세션 버퍼 테이블
///
/// 재조립 루프를 도는 단일 태스크만 변경한다. 엔트리는 TCP 핸드셰이크(또는
/// 설정에 따라 UDP 첫 페이로드/외부 등록)로 생성되고, TCP 종료 시 물리적으로
/// 삭제된다.
#[derive(Debug)]
pub struct SessionTable {
    sessions: HashMap<FlowKey, SessionBuffer>,
    buffer_capacity: usize,
}

impl SessionTable {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            buffer_capacity,
        }
    }

    /// 새 빈 버퍼를 생성. 기존 버퍼가 있으면 버린다 (스트림 시작점 동기화).
    pub fn open(&mut self, key: FlowKey) {
        self.sessions
            .insert(key, SessionBuffer::with_capacity(self.buffer_capacity));
    }

    /// 버퍼가 없을 때만 생성하고 가변 참조 반환
    pub fn open_if_absent(&mut self, key: FlowKey) -> &mut SessionBuffer {
        self.sessions
            .entry(key)
            .or_insert_with(|| SessionBuffer::with_capacity(self.buffer_capacity))
    }

    /// 플로우 종료. 엔트리가 있었으면 true.
    pub fn close(&mut self, key: &FlowKey) -> bool {
        self.sessions.remove(key).is_some()
    }

    pub fn get(&self, key: &FlowKey) -> Option<&SessionBuffer> {
        self.sessions.get(key)
    }

    pub fn get_mut(&mut self, key: &FlowKey) -> Option<&mut SessionBuffer> {
        self.sessions.get_mut(key)
    }

    pub fn contains(&self, key: &FlowKey) -> bool {
        self.sessions.contains_key(key)
    }

    /// 활성 플로우 수
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Proto;
    use std::net::Ipv4Addr;

    fn key(port: u16) -> FlowKey {
        FlowKey::new(
            Proto::Tcp,
            (Ipv4Addr::new(10, 0, 0, 1), port),
            (Ipv4Addr::new(10, 0, 0, 2), 80),
        )
    }

    #[test]
    fn test_residual_then_append_order() {
        // "AB"에서 1바이트 소비 후 "CD" 추가 -> "BCD"
        let mut buf = SessionBuffer::with_capacity(16);
        buf.extend(b"AB");
        buf.consume(1);
        buf.extend(b"CD");
        assert_eq!(buf.as_bytes(), b"BCD");
    }

    #[test]
    fn test_consume_full_drains() {
        let mut buf = SessionBuffer::with_capacity(16);
        buf.extend(b"xyz");
        buf.consume(3);
        assert!(buf.is_empty());

        buf.extend(b"more");
        assert_eq!(buf.as_bytes(), b"more");
    }

    #[test]
    fn test_consume_past_end_clamps() {
        let mut buf = SessionBuffer::with_capacity(16);
        buf.extend(b"ab");
        buf.consume(100);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_open_discards_prior_buffer() {
        let mut table = SessionTable::new(16);
        table.open(key(1));
        table.get_mut(&key(1)).unwrap().extend(b"stale");

        table.open(key(1));
        assert!(table.get(&key(1)).unwrap().is_empty());
    }

    #[test]
    fn test_close_removes_entry() {
        let mut table = SessionTable::new(16);
        table.open(key(1));
        assert!(table.close(&key(1)));
        assert!(!table.contains(&key(1)));
        assert!(!table.close(&key(1)));
    }

    #[test]
    fn test_flow_isolation() {
        let mut table = SessionTable::new(16);
        table.open(key(1));
        table.open(key(2));

        table.get_mut(&key(1)).unwrap().extend(b"one");
        table.get_mut(&key(2)).unwrap().extend(b"two");

        assert_eq!(table.get(&key(1)).unwrap().as_bytes(), b"one");
        assert_eq!(table.get(&key(2)).unwrap().as_bytes(), b"two");
    }
}
