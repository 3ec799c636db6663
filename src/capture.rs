//! 캡처 어댑터
//!
//! 해석된 데이터 소스를 pcap 핸들로 열고, BPF 필터 적용 후 블로킹 읽기
//! 태스크에서 프레임을 디코딩해 엔진 채널로 밀어넣는다. 라이브 캡처는
//! 무한, 리플레이는 파일 소진 시 채널이 닫히며 루프가 정상 종료된다.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pcap::{Activated, Capture, Linktype};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::PacketReceiver;
use crate::error::{Error, Result};
use crate::packet::{DecodedPacket, LinkLayer};
use crate::source::DataSource;

/// pcap datalink -> 지원 링크 계층 매핑
fn link_layer(linktype: Linktype) -> Result<LinkLayer> {
    match linktype {
        Linktype::ETHERNET => Ok(LinkLayer::Ethernet),
        Linktype::NULL | Linktype::LOOP => Ok(LinkLayer::NullLoopback),
        Linktype::RAW | Linktype::IPV4 => Ok(LinkLayer::RawIp),
        other => Err(Error::UnsupportedLinkLayer { linktype: other.0 }),
    }
}

/// 데이터 소스를 캡처 핸들로 연다
pub fn open(source: &DataSource, config: &Config) -> Result<Capture<dyn Activated>> {
    match source {
        DataSource::Live(name) => {
            info!("opening live capture on {}", name);
            let cap = Capture::from_device(name.as_str())
                .map_err(Error::CaptureOpen)?
                .snaplen(config.snaplen)
                .promisc(config.promiscuous)
                .timeout(config.read_timeout_ms)
                .open()
                .map_err(Error::CaptureOpen)?;
            Ok(cap.into())
        }
        DataSource::Replay(path) => {
            info!("opening capture file {:?}", path);
            let cap = Capture::from_file(path).map_err(Error::CaptureOpen)?;
            Ok(cap.into())
        }
    }
}

/// 필터를 적용하고 캡처 읽기 태스크를 시작한다
///
/// 필터 적용 실패와 미지원 링크 계층은 시작 시점의 치명적 에러다.
/// 이후의 디코딩 실패는 `Err` 항목으로 채널에 전달되어 엔진 루프를
/// 종료시킨다.
pub fn start(
    mut cap: Capture<dyn Activated>,
    filter: &str,
    config: &Config,
    shutdown: Arc<AtomicBool>,
) -> Result<PacketReceiver> {
    if !filter.is_empty() {
        cap.filter(filter, true).map_err(Error::FilterApply)?;
    }

    let link = link_layer(cap.get_datalink())?;
    debug!("datalink: {:?}", link);

    let (tx, rx) = mpsc::channel(config.packet_channel_capacity);

    tokio::task::spawn_blocking(move || {
        loop {
            if shutdown.load(Ordering::SeqCst) {
                debug!("capture task stopping on shutdown signal");
                break;
            }

            match cap.next_packet() {
                Ok(packet) => {
                    let ts = &packet.header.ts;
                    let timestamp_us =
                        ts.tv_sec as u64 * 1_000_000 + ts.tv_usec as u64;

                    let item = DecodedPacket::decode(link, timestamp_us, packet.data);
                    let fatal = item.is_err();

                    if tx.blocking_send(item).is_err() {
                        // 엔진이 먼저 종료됨
                        break;
                    }
                    if fatal {
                        break;
                    }
                }
                // 라이브 캡처 읽기 타임아웃: 취소 신호 재확인
                Err(pcap::Error::TimeoutExpired) => continue,
                // 리플레이 파일 소진: 채널을 닫아 정상 종료
                Err(pcap::Error::NoMorePackets) => {
                    debug!("capture exhausted");
                    break;
                }
                Err(e) => {
                    warn!("캡처 읽기 실패: {}", e);
                    let _ = tx.blocking_send(Err(Error::CaptureRead(e)));
                    break;
                }
            }
        }
    });

    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ReassemblyEngine;
    use crate::error::ConsumeError;
    use crate::source;
    use etherparse::PacketBuilder;
    use std::sync::Mutex;

    #[test]
    fn test_link_layer_mapping() {
        assert_eq!(link_layer(Linktype::ETHERNET).unwrap(), LinkLayer::Ethernet);
        assert_eq!(link_layer(Linktype::NULL).unwrap(), LinkLayer::NullLoopback);
        assert_eq!(link_layer(Linktype::RAW).unwrap(), LinkLayer::RawIp);
        assert!(matches!(
            link_layer(Linktype(147)),
            Err(Error::UnsupportedLinkLayer { linktype: 147 })
        ));
    }

    #[test]
    fn test_open_missing_replay_file_fails() {
        let source = DataSource::Replay("/no/such/capture.pcap".into());
        let err = open(&source, &Config::default()).err().unwrap();
        assert!(matches!(err, Error::CaptureOpen(_)));
    }

    /// 이더넷 TCP 프레임 생성 헬퍼
    fn tcp_frame(
        src: ([u8; 4], u16),
        dst: ([u8; 4], u16),
        syn: bool,
        fin: bool,
        payload: &[u8],
    ) -> Vec<u8> {
        let builder =
            PacketBuilder::ethernet2([1; 6], [2; 6]).ipv4(src.0, dst.0, 64);
        let mut tcp = builder.tcp(src.1, dst.1, 0, 65535).ack(0);
        if syn {
            tcp = tcp.syn();
        }
        if fin {
            tcp = tcp.fin();
        }
        let mut frame = Vec::with_capacity(tcp.size(payload.len()));
        tcp.write(&mut frame, payload).unwrap();
        frame
    }

    /// 핸드셰이크 + 페이로드 2개 + 종료를 담은 pcap 파일 생성
    fn write_test_pcap(path: &std::path::Path) {
        let cap = Capture::dead(Linktype::ETHERNET).unwrap();
        let mut savefile = cap.savefile(path).unwrap();

        let client = ([10, 0, 0, 1], 40000u16);
        let server = ([10, 0, 0, 2], 8080u16);

        let frames = vec![
            tcp_frame(server, client, true, false, b""),
            tcp_frame(client, server, false, false, b"GET /"),
            tcp_frame(server, client, false, false, b" 200 OK"),
            tcp_frame(client, server, false, true, b""),
        ];

        for (i, data) in frames.iter().enumerate() {
            let header = pcap::PacketHeader {
                ts: libc::timeval {
                    tv_sec: 1_700_000_000 + i as libc::time_t,
                    tv_usec: 0,
                },
                caplen: data.len() as u32,
                len: data.len() as u32,
            };
            savefile.write(&pcap::Packet::new(&header, data));
        }
        savefile.flush().unwrap();
    }

    #[tokio::test]
    async fn test_replay_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.pcap");
        write_test_pcap(&path);

        let descriptor = format!("replay://{}", path.display());
        let data_source = source::resolve(&descriptor).unwrap();

        let config = Config::default();
        let log = Arc::new(Mutex::new(Vec::<Vec<u8>>::new()));
        let log2 = log.clone();
        let mut engine = ReassemblyEngine::new(config.clone()).with_consumer(Box::new(
            move |_src, _dst, view| {
                log2.lock().unwrap().push(view.to_vec());
                Ok::<usize, ConsumeError>(view.len())
            },
        ));

        let cap = open(&data_source, &config).unwrap();
        let rx = start(cap, "tcp", &config, engine.shutdown_handle()).unwrap();
        engine.run(rx).await.unwrap();

        let calls = log.lock().unwrap();
        assert_eq!(calls.as_slice(), &[b"GET /".to_vec(), b" 200 OK".to_vec()]);

        let stats = engine.stats();
        assert_eq!(stats.sessions_opened, 1);
        assert_eq!(stats.sessions_closed, 1);
        assert_eq!(stats.bytes_consumed, 12);
    }
}
