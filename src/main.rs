// 커맨드라인 진입점 - 위치 인자만 사용 (플래그 없음)
// 사용법: audio2mp4 <입력 디렉토리> <출력 디렉토리> [배경 이미지 | -] [확장자]

use audio2mp4::{AudioToMp4Converter, ConverterConfig};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("사용법: {} <입력 디렉토리> <출력 디렉토리> [배경 이미지 | -] [확장자]", args[0]);
        eprintln!("  배경 이미지 자리에 '-'를 주면 검정 단색 배경");
        eprintln!("  확장자를 주면 해당 포맷만 변환 (예: .mp3)");
        return ExitCode::FAILURE;
    }

    let mut config = ConverterConfig::new(&args[1], &args[2]);
    if let Some(image) = args.get(3).filter(|a| a.as_str() != "-") {
        config.background_image = Some(PathBuf::from(image));
    }

    let converter = match AudioToMp4Converter::new(config) {
        Ok(c) => c,
        Err(e) => {
            log::error!("[오류] 변환기 생성 실패: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let (attempted, succeeded) = match args.get(4) {
        Some(ext) => converter.convert_by_extension(ext),
        None => converter.convert_all(),
    };

    // 시도한 파일 중 하나라도 실패하면 비정상 종료 코드
    if attempted > 0 && succeeded < attempted {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
