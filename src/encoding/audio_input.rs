// 오디오 입력 - FFmpeg으로 오디오 파일을 열어 길이 조회 + 패킷 단위 읽기
// 스트림 카피 먹싱용이므로 디코딩/리샘플링 없이 압축 패킷만 꺼낸다

use ffmpeg_next as ffmpeg;
use std::path::Path;

/// 오디오 입력 파일 (스트림 카피 소스)
pub struct AudioInput {
    input_ctx: ffmpeg::format::context::Input,
    audio_stream_index: usize,
    parameters: ffmpeg::codec::Parameters,
    time_base: ffmpeg::Rational,
    duration_ms: i64,
    /// 오디오 스트림 타임베이스 (PTS→ms 변환용)
    time_base_num: i32,
    time_base_den: i32,
}

impl AudioInput {
    /// 오디오 파일 열기
    pub fn open(file_path: &Path) -> Result<Self, String> {
        ffmpeg::init().map_err(|e| format!("FFmpeg init failed: {}", e))?;

        let input_ctx = ffmpeg::format::input(file_path)
            .map_err(|e| format!("Failed to open audio file: {}", e))?;

        // 오디오 스트림 찾기
        let audio_stream = input_ctx
            .streams()
            .best(ffmpeg::media::Type::Audio)
            .ok_or("No audio stream found")?;

        let audio_stream_index = audio_stream.index();
        let parameters = audio_stream.parameters();
        let time_base = audio_stream.time_base();
        let time_base_num = time_base.numerator();
        let time_base_den = time_base.denominator();

        // Duration 계산
        let duration_ms = if audio_stream.duration() > 0 {
            (audio_stream.duration() * i64::from(time_base_num) * 1000)
                / i64::from(time_base_den)
        } else if input_ctx.duration() > 0 {
            input_ctx.duration() / 1000 // AV_TIME_BASE(μs) → ms
        } else {
            0
        };

        Ok(Self {
            input_ctx,
            audio_stream_index,
            parameters,
            time_base,
            duration_ms,
            time_base_num,
            time_base_den,
        })
    }

    /// 다음 오디오 패킷 읽기 (다른 스트림의 패킷은 건너뜀, EOF면 None)
    pub fn next_packet(&mut self) -> Option<ffmpeg::Packet> {
        for (stream, packet) in self.input_ctx.packets() {
            if stream.index() == self.audio_stream_index {
                return Some(packet);
            }
        }
        None
    }

    /// PTS를 밀리초로 변환 (오디오 스트림 타임베이스 기준)
    #[inline]
    pub fn pts_to_ms(&self, pts: i64) -> i64 {
        (pts * i64::from(self.time_base_num) * 1000) / i64::from(self.time_base_den)
    }

    /// 패킷의 타임스탬프(ms) - PTS 없으면 DTS, 둘 다 없으면 0
    pub fn packet_time_ms(&self, packet: &ffmpeg::Packet) -> i64 {
        packet.pts().or(packet.dts()).map_or(0, |ts| self.pts_to_ms(ts))
    }

    /// 오디오 스트림 코덱 파라미터 (출력 스트림 카피용)
    pub fn parameters(&self) -> ffmpeg::codec::Parameters {
        self.parameters.clone()
    }

    /// 오디오 스트림 타임베이스
    pub fn time_base(&self) -> ffmpeg::Rational {
        self.time_base
    }

    /// 전체 길이 (ms)
    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_open_missing_file() {
        let result = AudioInput::open(&PathBuf::from("no_such_dir/no_such_file.mp3"));
        assert!(result.is_err());
    }

    #[test]
    fn test_open_non_audio_file() {
        // RIFF 헤더 없는 가짜 WAV는 열기 단계에서 실패해야 함
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.wav");
        std::fs::write(&path, b"this is not a wav file at all").unwrap();

        let result = AudioInput::open(&path);
        assert!(result.is_err());
    }
}
