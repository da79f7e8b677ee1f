// 인코딩 모듈
// H.264 비디오 + 오디오 스트림 카피 → MP4 컨테이너

pub mod audio_input;
pub mod encoder;
