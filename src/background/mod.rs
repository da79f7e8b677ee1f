// 배경 클립 - 비디오 전체 길이 동안 유지되는 정적 배경 프레임
// 배경 이미지가 있으면 디코딩 + 리사이즈, 없으면 단색(검정) 프레임 합성

use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling;
use std::path::Path;

/// 정적 배경 프레임 (RGBA)
pub struct BackgroundFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl BackgroundFrame {
    /// 배경 프레임 준비
    /// - image_path가 있고 파일이 존재하면 이미지 사용
    /// - 없거나 경로가 존재하지 않으면 검정 단색 프레임 (에러 아님)
    /// - 이미지 디코딩 실패는 에러로 전파 (해당 파일 변환 실패 처리)
    pub fn prepare(image_path: Option<&Path>, size: (u32, u32)) -> Result<Self, String> {
        match image_path {
            Some(path) if path.exists() => Self::from_image(path, size),
            _ => Ok(Self::solid(size, [0, 0, 0])),
        }
    }

    /// 단색 배경 프레임 합성
    pub fn solid(size: (u32, u32), rgb: [u8; 3]) -> Self {
        let (width, height) = size;
        let pixel_count = (width * height) as usize;
        let mut data = Vec::with_capacity(pixel_count * 4);
        for _ in 0..pixel_count {
            data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
        Self { width, height, data }
    }

    /// 이미지 파일 디코딩 → 출력 해상도 RGBA 프레임
    /// 정지 이미지는 단일 비디오 프레임으로 디코딩됨 (png/jpeg/bmp 등)
    fn from_image(path: &Path, size: (u32, u32)) -> Result<Self, String> {
        ffmpeg::init().map_err(|e| format!("FFmpeg init failed: {}", e))?;

        let (target_width, target_height) = size;

        let mut input_ctx = ffmpeg::format::input(path)
            .map_err(|e| format!("Failed to open image: {}", e))?;

        let video_stream = input_ctx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or("No image stream found")?;

        let video_stream_index = video_stream.index();
        let codec_params = video_stream.parameters();

        let context = ffmpeg::codec::context::Context::from_parameters(codec_params)
            .map_err(|e| format!("Failed to create image context: {}", e))?;
        let mut decoder = context.decoder().video()
            .map_err(|e| format!("Failed to get image decoder: {}", e))?;

        // 첫 프레임 디코딩 (정지 이미지는 패킷 1개)
        let mut decoded = ffmpeg::frame::Video::empty();
        let mut got_frame = false;

        for (stream, packet) in input_ctx.packets() {
            if stream.index() != video_stream_index {
                continue;
            }
            decoder.send_packet(&packet)
                .map_err(|e| format!("Failed to send image packet: {}", e))?;
            if decoder.receive_frame(&mut decoded).is_ok() {
                got_frame = true;
                break;
            }
        }

        // 디코더 버퍼에 남은 프레임 flush
        if !got_frame {
            decoder.send_eof()
                .map_err(|e| format!("Failed to flush image decoder: {}", e))?;
            got_frame = decoder.receive_frame(&mut decoded).is_ok();
        }

        if !got_frame {
            return Err("No frame decoded from image".to_string());
        }

        // 출력 해상도로 리사이즈 + RGBA 변환 (정지 배경은 1회뿐이므로 LANCZOS 고품질)
        let mut scaler = scaling::Context::get(
            decoded.format(),
            decoded.width(),
            decoded.height(),
            Pixel::RGBA,
            target_width,
            target_height,
            scaling::Flags::LANCZOS,
        )
        .map_err(|e| format!("Failed to create scaler: {}", e))?;

        let mut rgba_frame = ffmpeg::frame::Video::empty();
        scaler.run(&decoded, &mut rgba_frame)
            .map_err(|e| format!("Scaler failed: {}", e))?;

        // stride 제거하고 연속 RGBA 버퍼로 복사
        let linesize = rgba_frame.stride(0);
        let src = rgba_frame.data(0);
        let row_size = target_width as usize * 4;
        let mut data = vec![0u8; target_height as usize * row_size];
        for y in 0..target_height as usize {
            let src_offset = y * linesize;
            let dst_offset = y * row_size;
            data[dst_offset..dst_offset + row_size]
                .copy_from_slice(&src[src_offset..src_offset + row_size]);
        }

        Ok(Self {
            width: target_width,
            height: target_height,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_solid_frame_size_and_color() {
        let frame = BackgroundFrame::solid((320, 240), [0, 0, 0]);

        assert_eq!(frame.width, 320);
        assert_eq!(frame.height, 240);
        assert_eq!(frame.data.len(), 320 * 240 * 4);

        // 전체 픽셀이 불투명 검정
        for pixel in frame.data.chunks_exact(4) {
            assert_eq!(pixel, [0, 0, 0, 255]);
        }
    }

    #[test]
    fn test_prepare_without_image_uses_solid() {
        let frame = BackgroundFrame::prepare(None, (640, 480)).unwrap();
        assert_eq!(frame.data.len(), 640 * 480 * 4);
        assert_eq!(&frame.data[..4], [0, 0, 0, 255]);
    }

    #[test]
    fn test_prepare_missing_image_falls_back_to_solid() {
        // 존재하지 않는 경로는 에러가 아니라 단색 배경으로 대체
        let missing = PathBuf::from("no_such_dir/background.png");
        let frame = BackgroundFrame::prepare(Some(&missing), (640, 480)).unwrap();

        assert_eq!(frame.width, 640);
        assert_eq!(frame.height, 480);
        assert_eq!(&frame.data[..4], [0, 0, 0, 255]);
    }
}
