//! FSR 덤프 도구 - Flow Stream Reassembly
//!
//! 데이터 소스를 캡처해 재조립된 플로우 스트림을 로그로 출력한다.
//!
//! 사용법:
//!   cargo run --release --bin fsr-dump -- --source live://eth0 [OPTIONS]
//!
//! 예시:
//!   # 로컬 IP로 인터페이스 자동 해석
//!   cargo run --release --bin fsr-dump -- -s live://192.168.0.10 -f "tcp port 8080"
//!
//!   # 캡처 파일 재생
//!   cargo run --release --bin fsr-dump -- -s replay://session.pcap

use std::sync::atomic::Ordering;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use fsr::{capture, source, Config, ConsumeError, ReassemblyEngine, UdpSessionPolicy};

/// 덤프 도구 설정
struct DumpConfig {
    source: String,
    filter: String,
    udp_auto: bool,
    preview_bytes: usize,
    verbose: bool,
    config: Config,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            source: String::new(),
            filter: String::new(),
            udp_auto: false,
            preview_bytes: 64,
            verbose: false,
            config: Config::default(),
        }
    }
}

fn parse_args() -> DumpConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = DumpConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--source" | "-s" => {
                if i + 1 < args.len() {
                    config.source = args[i + 1].clone();
                    i += 1;
                }
            }
            "--filter" | "-f" => {
                if i + 1 < args.len() {
                    config.filter = args[i + 1].clone();
                    i += 1;
                }
            }
            "--preview" | "-p" => {
                if i + 1 < args.len() {
                    config.preview_bytes = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--max-session" => {
                if i + 1 < args.len() {
                    config.config.max_session_bytes =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--udp-auto" | "-u" => {
                config.udp_auto = true;
                config.config.udp_session_policy = UdpSessionPolicy::CreateOnFirstPayload;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--help" | "-h" => {
                println!(
                    r#"FSR Dump - Flow Stream Reassembly 덤프 도구

플로우별로 재조립된 바이트 스트림을 로그로 출력한다.

사용법:
  cargo run --release --bin fsr-dump -- --source <DESCRIPTOR> [OPTIONS]

옵션:
  -s, --source <DESC>     데이터 소스 (live://<iface|ip> 또는 replay://<path>)
  -f, --filter <BPF>      BPF 필터 표현식 (기본: 없음)
  -p, --preview <N>       스트림 미리보기 바이트 수 (기본: 64)
  -u, --udp-auto          UDP 첫 페이로드에서 세션 자동 생성
  --max-session <BYTES>   세션 버퍼 최대 크기 (기본: 16MB)
  -v, --verbose           디버그 로그 출력
  -h, --help              이 도움말 출력

예시:
  # 라이브 캡처 (인터페이스 이름)
  cargo run --release --bin fsr-dump -- -s live://eth0 -f "tcp port 80"

  # 로컬 IP로 인터페이스 자동 해석
  cargo run --release --bin fsr-dump -- -s live://192.168.0.10

  # 캡처 파일 재생
  cargo run --release --bin fsr-dump -- -s replay://session.pcap
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

/// 미리보기용 출력 가능 문자 변환
fn printable_preview(data: &[u8], limit: usize) -> String {
    data.iter()
        .take(limit)
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dump_config = parse_args();

    // 로깅 설정
    let level = if dump_config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if dump_config.source.is_empty() {
        eprintln!("--source 가 필요합니다. --help 참고");
        std::process::exit(1);
    }

    info!("FSR Dump starting...");
    info!("Source: {}", dump_config.source);
    if !dump_config.filter.is_empty() {
        info!("Filter: {}", dump_config.filter);
    }

    if dump_config.udp_auto {
        info!("UDP session auto-create enabled");
    }

    let data_source = source::resolve(&dump_config.source)?;
    info!("Resolved source: {:?}", data_source);

    let preview = dump_config.preview_bytes;
    let mut engine = ReassemblyEngine::new(dump_config.config.clone()).with_consumer(Box::new(
        move |src, dst, view| {
            info!(
                "{} -> {} | {} bytes | {}",
                src,
                dst,
                view.len(),
                printable_preview(view, preview)
            );
            Ok::<usize, ConsumeError>(view.len())
        },
    ));

    // Ctrl-C -> 취소 신호
    let shutdown = engine.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down...");
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    let cap = capture::open(&data_source, &dump_config.config)?;
    let packets = capture::start(
        cap,
        &dump_config.filter,
        &dump_config.config,
        engine.shutdown_handle(),
    )?;

    engine.run(packets).await?;

    info!("{}", engine.stats().summary());
    Ok(())
}
