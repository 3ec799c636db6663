//! 에러 타입 정의

use thiserror::Error;

/// FSR 엔진 에러 타입
///
/// 치명적(루프 종료) 조건만 에러로 표현한다. 패킷 단위로 복구 가능한
/// 조건(미지원 전송계층, 핸드셰이크 미관측 페이로드 등)은 로그로만 남긴다.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("유효하지 않은 데이터 소스: {descriptor}")]
    MalformedDescriptor { descriptor: String },

    #[error("알 수 없는 소스 모드: {mode}")]
    UnknownSourceMode { mode: String },

    #[error("인터페이스 조회 실패: {0}")]
    InterfaceEnumeration(#[source] pcap::Error),

    #[error("캡처 열기 실패: {0}")]
    CaptureOpen(#[source] pcap::Error),

    #[error("필터 적용 실패: {0}")]
    FilterApply(#[source] pcap::Error),

    #[error("캡처 읽기 실패: {0}")]
    CaptureRead(#[source] pcap::Error),

    #[error("지원하지 않는 링크 계층: {linktype}")]
    UnsupportedLinkLayer { linktype: i32 },

    #[error("유효한 IPv4 패킷이 아님: {0}")]
    InvalidNetworkLayer(String),
}

/// Consumer 콜백 에러
#[derive(Error, Debug)]
pub enum ConsumeError {
    /// 스트림 종료 신호. 캡처 루프를 정상 종료시키는 유일한 수단이다.
    #[error("스트림 종료")]
    EndOfStream,

    /// 그 외 실패. 루프는 계속되고 버퍼는 잘리지 않는다.
    #[error("{0}")]
    Failed(String),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
