//! 디코딩된 패킷 모델
//!
//! 캡처 어댑터가 프레임마다 한 번 생성하는 닫힌 전송계층 변형(TCP/UDP/Other)과
//! 엔드포인트 표현. 네트워크 계층은 IPv4만 지원하며, IPv4가 아니거나 슬라이스
//! 불가능한 프레임은 [`Error::InvalidNetworkLayer`]로 엔진 루프를 종료시킨다.

use std::fmt;
use std::net::Ipv4Addr;

use bytes::Bytes;
use etherparse::{NetSlice, SlicedPacket, TransportSlice};

use crate::error::{Error, Result};

/// 전송계층 프로토콜
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Proto {
    Tcp,
    Udp,
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proto::Tcp => write!(f, "tcp"),
            Proto::Udp => write!(f, "udp"),
        }
    }
}

/// 전송계층 엔드포인트 (프로토콜 + 주소 + 포트)
///
/// 패킷마다 계산되어 Consumer에 전달될 뿐, 엔진에 저장되지 않는다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub proto: Proto,
    pub addr: Ipv4Addr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(proto: Proto, addr: Ipv4Addr, port: u16) -> Self {
        Self { proto, addr, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.addr, self.port, self.proto)
    }
}

/// 전송계층 내용 (패킷마다 한 번 분류)
#[derive(Debug, Clone)]
pub enum Transport {
    Tcp {
        src_port: u16,
        dst_port: u16,
        syn: bool,
        ack: bool,
        fin: bool,
        payload: Bytes,
    },
    Udp {
        src_port: u16,
        dst_port: u16,
        payload: Bytes,
    },
    /// TCP/UDP가 아닌 전송계층. 로그 후 건너뛴다.
    Other { protocol: u8 },
}

/// 링크 계층 종류 (pcap datalink 기준)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    Ethernet,
    /// BSD loopback: 4바이트 패밀리 헤더 뒤에 IP
    NullLoopback,
    /// 링크 헤더 없이 바로 IPv4
    RawIp,
}

/// 디코딩된 단일 패킷
#[derive(Debug, Clone)]
pub struct DecodedPacket {
    /// 도착 시각 (epoch 마이크로초)
    pub timestamp_us: u64,

    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,

    pub transport: Transport,
}

impl DecodedPacket {
    /// 원시 프레임을 디코딩
    pub fn decode(link: LinkLayer, timestamp_us: u64, data: &[u8]) -> Result<Self> {
        let sliced = match link {
            LinkLayer::Ethernet => SlicedPacket::from_ethernet(data)
                .map_err(|e| Error::InvalidNetworkLayer(e.to_string()))?,
            LinkLayer::RawIp => SlicedPacket::from_ip(data)
                .map_err(|e| Error::InvalidNetworkLayer(e.to_string()))?,
            LinkLayer::NullLoopback => {
                if data.len() < 4 {
                    return Err(Error::InvalidNetworkLayer("짧은 loopback 프레임".into()));
                }
                SlicedPacket::from_ip(&data[4..])
                    .map_err(|e| Error::InvalidNetworkLayer(e.to_string()))?
            }
        };

        let ipv4 = match sliced.net {
            Some(NetSlice::Ipv4(ipv4)) => ipv4,
            _ => {
                return Err(Error::InvalidNetworkLayer(
                    "IPv4 네트워크 계층 없음".into(),
                ))
            }
        };

        let src_ip = ipv4.header().source_addr();
        let dst_ip = ipv4.header().destination_addr();

        let transport = match sliced.transport {
            Some(TransportSlice::Tcp(tcp)) => Transport::Tcp {
                src_port: tcp.source_port(),
                dst_port: tcp.destination_port(),
                syn: tcp.syn(),
                ack: tcp.ack(),
                fin: tcp.fin(),
                payload: Bytes::copy_from_slice(tcp.payload()),
            },
            Some(TransportSlice::Udp(udp)) => Transport::Udp {
                src_port: udp.source_port(),
                dst_port: udp.destination_port(),
                payload: Bytes::copy_from_slice(udp.payload()),
            },
            _ => Transport::Other {
                protocol: ipv4.payload().ip_number.0,
            },
        };

        Ok(Self {
            timestamp_us,
            src_ip,
            dst_ip,
            transport,
        })
    }

    /// 소스/목적지 엔드포인트 쌍 (TCP/UDP 한정)
    pub fn endpoints(&self) -> Option<(Endpoint, Endpoint)> {
        match &self.transport {
            Transport::Tcp {
                src_port, dst_port, ..
            } => Some((
                Endpoint::new(Proto::Tcp, self.src_ip, *src_port),
                Endpoint::new(Proto::Tcp, self.dst_ip, *dst_port),
            )),
            Transport::Udp {
                src_port, dst_port, ..
            } => Some((
                Endpoint::new(Proto::Udp, self.src_ip, *src_port),
                Endpoint::new(Proto::Udp, self.dst_ip, *dst_port),
            )),
            Transport::Other { .. } => None,
        }
    }
}
