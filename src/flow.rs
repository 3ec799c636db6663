//! 방향 무관 플로우 식별자
//!
//! 전송계층 4-튜플(프로토콜, 소스 주소+포트, 목적지 주소+포트)에서 결정적으로
//! 유도된다. 두 엔드포인트를 정규 순서로 정렬해서 같은 논리 연결의 양방향
//! 패킷이 항상 같은 키로 수렴한다. 충돌 해소는 하지 않는다.

use std::net::Ipv4Addr;

use crate::packet::Proto;

/// 플로우 식별자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    proto: Proto,
    lo: (Ipv4Addr, u16),
    hi: (Ipv4Addr, u16),
}

impl FlowKey {
    /// 4-튜플에서 키 생성. (a, b)와 (b, a)는 같은 키가 된다.
    pub fn new(proto: Proto, a: (Ipv4Addr, u16), b: (Ipv4Addr, u16)) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self { proto, lo, hi }
    }

    pub fn proto(&self) -> Proto {
        self.proto
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, last)
    }

    #[test]
    fn test_direction_agnostic() {
        let forward = FlowKey::new(Proto::Tcp, (addr(1), 40000), (addr(2), 80));
        let reverse = FlowKey::new(Proto::Tcp, (addr(2), 80), (addr(1), 40000));
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_distinct_flows_differ() {
        let f1 = FlowKey::new(Proto::Tcp, (addr(1), 40000), (addr(2), 80));
        let f2 = FlowKey::new(Proto::Tcp, (addr(1), 40001), (addr(2), 80));
        assert_ne!(f1, f2);
    }

    #[test]
    fn test_proto_separates_keys() {
        let tcp = FlowKey::new(Proto::Tcp, (addr(1), 5000), (addr(2), 5001));
        let udp = FlowKey::new(Proto::Udp, (addr(1), 5000), (addr(2), 5001));
        assert_ne!(tcp, udp);
    }

    #[test]
    fn test_same_addr_different_ports() {
        let a = FlowKey::new(Proto::Udp, (addr(1), 1), (addr(1), 2));
        let b = FlowKey::new(Proto::Udp, (addr(1), 2), (addr(1), 1));
        assert_eq!(a, b);
    }
}
