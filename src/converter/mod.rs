// 오디오 → MP4 일괄 변환기
// 입력 디렉토리의 오디오 파일(MP3/WAV)을 정적 배경 + 원본 오디오의 MP4로 변환

use crate::background::BackgroundFrame;
use crate::encoding::audio_input::AudioInput;
use crate::encoding::encoder::Mp4Encoder;
use ffmpeg_next as ffmpeg;
use log::{error, info, warn};
use std::path::{Path, PathBuf};

/// H.264 품질 (고정 - 변환기는 인코딩 파라미터 튜닝을 노출하지 않음)
const DEFAULT_CRF: u32 = 23;

/// 지원 오디오 포맷 (닫힌 집합)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
}

impl AudioFormat {
    /// 지원 포맷 전체
    pub const ALL: [AudioFormat; 2] = [AudioFormat::Mp3, AudioFormat::Wav];

    /// 확장자 문자열 파싱 (앞의 점 유무/대소문자 무관)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "wav" => Some(AudioFormat::Wav),
            _ => None,
        }
    }

    /// 정규 확장자 (점 포함)
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => ".mp3",
            AudioFormat::Wav => ".wav",
        }
    }

    /// 파일명이 이 포맷인지 (확장자 대소문자 무관)
    pub fn matches(&self, file_name: &str) -> bool {
        file_name.to_lowercase().ends_with(self.extension())
    }
}

/// 변환기 설정 (생성 후 불변)
pub struct ConverterConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// 배경 이미지 경로 (None이면 검정 배경)
    pub background_image: Option<PathBuf>,
    /// 비디오 해상도 (width, height)
    pub video_size: (u32, u32),
    /// 비디오 프레임레이트
    pub fps: u32,
}

impl ConverterConfig {
    /// 기본 설정: 1920x1080 / 24fps / 배경 이미지 없음
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            background_image: None,
            video_size: (1920, 1080),
            fps: 24,
        }
    }
}

/// 오디오 → MP4 변환기
pub struct AudioToMp4Converter {
    config: ConverterConfig,
}

impl AudioToMp4Converter {
    /// 변환기 생성 - 출력 디렉토리가 없으면 생성 (중간 경로 포함)
    pub fn new(config: ConverterConfig) -> Result<Self, String> {
        std::fs::create_dir_all(&config.output_dir)
            .map_err(|e| format!("Failed to create output dir {}: {}", config.output_dir.display(), e))?;
        Ok(Self { config })
    }

    /// 입력 디렉토리에서 후보 파일 나열 (디렉토리 열거 순서, 정렬 보장 없음)
    /// - filter가 있으면 해당 포맷만, 없으면 지원 포맷 전체
    /// - 하위 디렉토리와 비오디오 파일은 무시
    pub fn list_candidates(&self, filter: Option<AudioFormat>) -> Result<Vec<String>, String> {
        let entries = std::fs::read_dir(&self.config.input_dir)
            .map_err(|e| format!("Failed to read input dir {}: {}", self.config.input_dir.display(), e))?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| format!("Failed to read dir entry: {}", e))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().into_owned();
            let matched = match filter {
                Some(format) => format.matches(&file_name),
                None => AudioFormat::ALL.iter().any(|f| f.matches(&file_name)),
            };
            if matched {
                candidates.push(file_name);
            }
        }
        Ok(candidates)
    }

    /// 단일 오디오 파일을 MP4로 변환
    /// 실패는 로그로 남기고 false 반환 - 배치 전체를 중단하지 않음
    pub fn convert_one(&self, file_name: &str) -> bool {
        let output_name = output_file_name(file_name);
        info!("[변환 중] {} → {}", file_name, output_name);

        match self.convert_inner(file_name, &output_name) {
            Ok(()) => {
                info!("[완료] {}", output_name);
                true
            }
            Err(e) => {
                error!("[오류] {} 변환 실패: {}", file_name, e);
                false
            }
        }
    }

    /// 변환 파이프라인 본체
    /// 디코더/인코더 리소스는 전부 Drop 기반 - 에러 경로 포함 모든 경로에서 해제됨
    fn convert_inner(&self, file_name: &str, output_name: &str) -> Result<(), String> {
        let input_path = self.config.input_dir.join(file_name);
        let output_path = self.config.output_dir.join(output_name);

        // 1. 오디오 열기 + 길이 확인
        let mut audio = AudioInput::open(&input_path)?;
        let duration_ms = audio.duration_ms();
        if duration_ms <= 0 {
            return Err("Audio duration unavailable".to_string());
        }

        // 2. 배경 클립 준비 (이미지 또는 단색, 전체 길이 동안 유지)
        let (width, height) = self.config.video_size;
        let background = BackgroundFrame::prepare(
            self.config.background_image.as_deref(),
            (width, height),
        )?;

        // 3. 인코더 생성 + 헤더 작성
        let fps = self.config.fps as f64;
        let mut encoder = Mp4Encoder::new(
            &output_path,
            width,
            height,
            fps,
            DEFAULT_CRF,
            audio.parameters(),
            audio.time_base(),
        )?;
        encoder.write_header()?;

        // 4. 배경 프레임을 오디오 길이만큼 반복 인코딩하며 오디오 패킷 카피를 교차 기록
        let frame_duration_ms = 1000.0 / fps;
        let total_frames = ((duration_ms as f64) / frame_duration_ms).ceil() as i64;
        // 프레임 타임스탬프보다 앞서 읽힌 오디오 패킷 보관
        let mut pending_packet: Option<ffmpeg::Packet> = None;

        for frame_index in 0..total_frames {
            let timestamp_ms = (frame_index as f64 * frame_duration_ms) as i64;

            encoder.encode_frame(&background.data, background.width, background.height)?;

            // 현재 프레임 시각까지의 오디오 패킷을 기록 (먹서 버퍼 폭주 방지)
            loop {
                let packet = match pending_packet.take().or_else(|| audio.next_packet()) {
                    Some(p) => p,
                    None => break,
                };
                if audio.packet_time_ms(&packet) > timestamp_ms {
                    pending_packet = Some(packet);
                    break;
                }
                encoder.write_audio_packet(packet)?;
            }
        }

        // 5. 남은 오디오 패킷 전부 기록
        while let Some(packet) = pending_packet.take().or_else(|| audio.next_packet()) {
            encoder.write_audio_packet(packet)?;
        }

        // 6. 인코딩 완료 (flush + trailer)
        encoder.finish()?;

        Ok(())
    }

    /// 지원하는 모든 오디오 파일 변환
    /// 반환: (시도한 파일 수, 성공한 파일 수)
    pub fn convert_all(&self) -> (usize, usize) {
        self.convert_batch(None)
    }

    /// 특정 확장자의 파일만 변환
    /// 지원하지 않는 확장자면 에러 로그 후 아무 작업도 하지 않음
    pub fn convert_by_extension(&self, extension: &str) -> (usize, usize) {
        let format = match AudioFormat::from_extension(extension) {
            Some(f) => f,
            None => {
                let supported: Vec<&str> = AudioFormat::ALL.iter().map(|f| f.extension()).collect();
                error!("[오류] 지원하지 않는 확장자입니다: {}", extension);
                error!("[오류] 지원 형식: {}", supported.join(", "));
                return (0, 0);
            }
        };
        self.convert_batch(Some(format))
    }

    /// 배치 변환 루프 (convert_all / convert_by_extension 공용)
    fn convert_batch(&self, filter: Option<AudioFormat>) -> (usize, usize) {
        let candidates = match self.list_candidates(filter) {
            Ok(c) => c,
            Err(e) => {
                error!("[오류] 입력 디렉토리 조회 실패: {}", e);
                return (0, 0);
            }
        };

        if candidates.is_empty() {
            warn!("[변환] {}", no_candidates_message(filter));
            return (0, 0);
        }

        info!("[변환] 총 {}개의 파일을 변환합니다...", candidates.len());

        let mut success_count = 0;
        for file_name in &candidates {
            if self.convert_one(file_name) {
                success_count += 1;
            }
        }

        info!("[변환] 완료! 성공: {}/{}", success_count, candidates.len());
        (candidates.len(), success_count)
    }
}

/// 후보 없음 메시지 - 확장자 필터 여부에 따라 구분
fn no_candidates_message(filter: Option<AudioFormat>) -> String {
    match filter {
        Some(format) => format!("변환할 {} 파일이 없습니다 (0 files)", format.extension()),
        None => "변환할 오디오 파일이 없습니다 (0 files)".to_string(),
    }
}

/// 출력 파일명 유도 - 확장자를 .mp4로 교체
pub fn output_file_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    format!("{}.mp4", stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_converter(input: &Path, output: &Path) -> AudioToMp4Converter {
        AudioToMp4Converter::new(ConverterConfig::new(input, output)).unwrap()
    }

    /// 테스트용 무음 PCM WAV 합성 (16-bit mono 8kHz)
    fn write_silence_wav(path: &Path, millis: u32) {
        let sample_rate = 8000u32;
        let samples = sample_rate * millis / 1000;
        let data_len = samples * 2; // 16-bit mono

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes()); // byte rate
        bytes.extend_from_slice(&2u16.to_le_bytes()); // block align
        bytes.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        bytes.resize(bytes.len() + data_len as usize, 0);

        fs::write(path, bytes).unwrap();
    }

    /// H.264 인코더가 없는 ffmpeg 빌드에서는 성공 경로 테스트 불가
    fn h264_available() -> bool {
        ffmpeg::init().is_ok()
            && ffmpeg::encoder::find(ffmpeg::codec::Id::H264).is_some()
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(AudioFormat::from_extension(".mp3"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_extension("mp3"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_extension(".WAV"), Some(AudioFormat::Wav));
        assert_eq!(AudioFormat::from_extension("wav"), Some(AudioFormat::Wav));
        assert_eq!(AudioFormat::from_extension(".flac"), None);
        assert_eq!(AudioFormat::from_extension(""), None);
    }

    #[test]
    fn test_format_matches_case_insensitive() {
        assert!(AudioFormat::Mp3.matches("song.mp3"));
        assert!(AudioFormat::Mp3.matches("SONG.MP3"));
        assert!(!AudioFormat::Mp3.matches("song.wav"));
        assert!(!AudioFormat::Mp3.matches("song.mp3.txt"));
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("song.mp3"), "song.mp4");
        assert_eq!(output_file_name("a.b.wav"), "a.b.mp4");
        assert_eq!(output_file_name("SONG.WAV"), "SONG.mp4");
    }

    #[test]
    fn test_new_creates_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("nested/deep/out");
        fs::create_dir_all(&input).unwrap();

        let _converter = make_converter(&input, &output);
        assert!(output.is_dir());
    }

    #[test]
    fn test_list_candidates_filters_and_ignores_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::create_dir_all(&input).unwrap();

        fs::write(input.join("a.mp3"), b"").unwrap();
        fs::write(input.join("b.WAV"), b"").unwrap();
        fs::write(input.join("c.txt"), b"").unwrap();
        fs::create_dir(input.join("d.mp3")).unwrap(); // 디렉토리는 후보 아님

        let converter = make_converter(&input, &output);

        let mut all = converter.list_candidates(None).unwrap();
        all.sort();
        assert_eq!(all, vec!["a.mp3", "b.WAV"]);

        let only_wav = converter.list_candidates(Some(AudioFormat::Wav)).unwrap();
        assert_eq!(only_wav, vec!["b.WAV"]);

        let only_mp3 = converter.list_candidates(Some(AudioFormat::Mp3)).unwrap();
        assert_eq!(only_mp3, vec!["a.mp3"]);
    }

    #[test]
    fn test_list_candidates_missing_input_dir() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("does_not_exist");
        let output = dir.path().join("out");

        let converter = make_converter(&input, &output);
        assert!(converter.list_candidates(None).is_err());
    }

    #[test]
    fn test_convert_all_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::create_dir_all(&input).unwrap();

        let converter = make_converter(&input, &output);
        assert_eq!(converter.convert_all(), (0, 0));
        assert_eq!(fs::read_dir(&output).unwrap().count(), 0);
    }

    #[test]
    fn test_convert_by_unsupported_extension_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("a.mp3"), b"").unwrap();

        let converter = make_converter(&input, &output);
        assert_eq!(converter.convert_by_extension(".flac"), (0, 0));
        // 출력 디렉토리는 건드리지 않음
        assert_eq!(fs::read_dir(&output).unwrap().count(), 0);
    }

    #[test]
    fn test_no_candidates_message_names_filtered_extension() {
        assert_eq!(
            no_candidates_message(Some(AudioFormat::Wav)),
            "변환할 .wav 파일이 없습니다 (0 files)"
        );
        assert_eq!(
            no_candidates_message(None),
            "변환할 오디오 파일이 없습니다 (0 files)"
        );
    }

    #[test]
    fn test_convert_all_mixed_batch_writes_valid_outputs() {
        if !h264_available() {
            eprintln!("H.264 인코더 없음 - 성공 경로 테스트 건너뜀");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::create_dir_all(&input).unwrap();

        write_silence_wav(&input.join("good.wav"), 100);
        fs::write(input.join("bad.wav"), b"definitely not riff data").unwrap();

        let mut config = ConverterConfig::new(&input, &output);
        config.video_size = (320, 240); // 테스트 시간 단축
        let converter = AudioToMp4Converter::new(config).unwrap();

        // 손상 파일은 실패 집계, 정상 파일은 변환되어 디스크에 존재
        assert_eq!(converter.convert_all(), (2, 1));

        let produced = output.join("good.mp4");
        assert!(produced.is_file());
        assert!(fs::metadata(&produced).unwrap().len() > 0);
        assert!(!output.join("bad.mp4").exists());
    }

    #[test]
    fn test_convert_one_output_naming_on_real_run() {
        if !h264_available() {
            eprintln!("H.264 인코더 없음 - 성공 경로 테스트 건너뜀");
            return;
        }

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::create_dir_all(&input).unwrap();

        write_silence_wav(&input.join("My Song.WAV"), 50);

        let mut config = ConverterConfig::new(&input, &output);
        config.video_size = (320, 240);
        let converter = AudioToMp4Converter::new(config).unwrap();

        assert!(converter.convert_one("My Song.WAV"));
        assert!(output.join("My Song.mp4").is_file());
    }

    #[test]
    fn test_convert_one_corrupt_file_fails_without_abort() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("bad.wav"), b"definitely not riff data").unwrap();

        let converter = make_converter(&input, &output);
        assert!(!converter.convert_one("bad.wav"));

        // 배치도 실패를 집계만 하고 계속 진행
        assert_eq!(converter.convert_all(), (1, 0));
    }
}
