//! 데이터 소스 디스크립터 해석
//!
//! `{live|replay}://{locator}` 형식의 문자열을 구체적 캡처 소스로 변환한다.
//! live 모드에서 locator가 로컬 인터페이스에 바인딩된 IP 주소면 그 인터페이스
//! 이름으로 치환한다. 치환 실패 시 원본 문자열을 그대로 넘기고, 진짜로
//! 유효하지 않은 이름의 거부는 캡처 어댑터 책임이다.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};

static DATA_SOURCE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn data_source_pattern() -> &'static Regex {
    DATA_SOURCE_PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<mode>[a-z]+)://(?P<source>.+)$").expect("고정 패턴")
    })
}

/// 해석된 캡처 소스
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// 라이브 인터페이스 캡처 (인터페이스 이름)
    Live(String),

    /// 저장된 캡처 파일 재생
    Replay(PathBuf),
}

/// 디스크립터 문자열 해석
pub fn resolve(descriptor: &str) -> Result<DataSource> {
    let caps = data_source_pattern()
        .captures(descriptor)
        .ok_or_else(|| Error::MalformedDescriptor {
            descriptor: descriptor.to_string(),
        })?;

    let mode = &caps["mode"];
    let source = &caps["source"];

    match mode {
        "live" => Ok(DataSource::Live(resolve_live_locator(source)?)),
        "replay" => Ok(DataSource::Replay(PathBuf::from(source))),
        _ => Err(Error::UnknownSourceMode {
            mode: mode.to_string(),
        }),
    }
}

/// IP 주소 locator를 소유 인터페이스 이름으로 치환
///
/// 인터페이스 조회는 캐시 없는 시스템 호출이다. IP가 아니거나 어떤
/// 인터페이스도 소유하지 않으면 원본을 그대로 돌려준다.
fn resolve_live_locator(source: &str) -> Result<String> {
    let ip: IpAddr = match source.parse() {
        Ok(ip) => ip,
        Err(_) => return Ok(source.to_string()),
    };

    let devices = pcap::Device::list().map_err(Error::InterfaceEnumeration)?;

    for device in devices {
        if device.addresses.iter().any(|a| a.addr == ip) {
            debug!("locator {} -> 인터페이스 {}", source, device.name);
            return Ok(device.name);
        }
    }

    Ok(source.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_passes_path_through() {
        let source = resolve("replay:///tmp/capture.pcap").unwrap();
        assert_eq!(source, DataSource::Replay(PathBuf::from("/tmp/capture.pcap")));
    }

    #[test]
    fn test_live_non_ip_passes_through() {
        // IP가 아닌 locator는 인터페이스 이름으로 간주
        let source = resolve("live://eth0").unwrap();
        assert_eq!(source, DataSource::Live("eth0".to_string()));
    }

    #[test]
    fn test_malformed_descriptor() {
        for descriptor in ["eth0", "live:/eth0", "://eth0", "live://", "LIVE://eth0"] {
            let err = resolve(descriptor).unwrap_err();
            assert!(
                matches!(err, Error::MalformedDescriptor { .. }),
                "{descriptor} -> {err:?}"
            );
        }
    }

    #[test]
    fn test_unknown_mode() {
        let err = resolve("ftp://eth0").unwrap_err();
        match err {
            Error::UnknownSourceMode { mode } => assert_eq!(mode, "ftp"),
            other => panic!("예상 밖 에러: {:?}", other),
        }
    }
}
