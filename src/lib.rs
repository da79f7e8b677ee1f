// audio2mp4 - 오디오 파일(MP3/WAV)을 정적 배경의 MP4 비디오로 일괄 변환
// ffmpeg-next 기반: 배경 프레임 H.264 인코딩 + 오디오 스트림 카피

pub mod background;
pub mod converter;
pub mod encoding;

pub use converter::{AudioFormat, AudioToMp4Converter, ConverterConfig};

use std::path::PathBuf;

/// MP3 파일 일괄 변환 래퍼
/// 반환: (시도한 파일 수, 성공한 파일 수)
pub fn convert_mp3_to_mp4(
    input_dir: impl Into<PathBuf>,
    output_dir: impl Into<PathBuf>,
    background_image: Option<PathBuf>,
) -> Result<(usize, usize), String> {
    convert_extension_to_mp4(input_dir, output_dir, background_image, ".mp3")
}

/// WAV 파일 일괄 변환 래퍼
pub fn convert_wav_to_mp4(
    input_dir: impl Into<PathBuf>,
    output_dir: impl Into<PathBuf>,
    background_image: Option<PathBuf>,
) -> Result<(usize, usize), String> {
    convert_extension_to_mp4(input_dir, output_dir, background_image, ".wav")
}

fn convert_extension_to_mp4(
    input_dir: impl Into<PathBuf>,
    output_dir: impl Into<PathBuf>,
    background_image: Option<PathBuf>,
    extension: &str,
) -> Result<(usize, usize), String> {
    let mut config = ConverterConfig::new(input_dir, output_dir);
    config.background_image = background_image;

    let converter = AudioToMp4Converter::new(config)?;
    Ok(converter.convert_by_extension(extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapper_on_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&input).unwrap();

        let result = convert_mp3_to_mp4(&input, &output, None);
        assert_eq!(result, Ok((0, 0)));
        assert!(output.is_dir());
    }
}
