use crate::audio::format::*;

#[test]
fn test_audio_format_bytes() {
    let format = AudioFormat::CD_QUALITY;

    assert_eq!(format.bytes_per_frame(), 4); // 2 bytes * 2 channels
    assert_eq!(format.bytes_per_second(), 176_400); // 44100 * 4
}

#[test]
fn test_duration_conversion() {
    let format = AudioFormat::CD_QUALITY;

    let duration = std::time::Duration::from_secs(1);
    let frames = format.duration_to_frames(duration);

    assert_eq!(frames, 44100);
}

#[test]
fn test_sample_format_bytes() {
    assert_eq!(SampleFormat::I16.bytes_per_sample(), 2);
    assert_eq!(SampleFormat::I24.bytes_per_sample(), 3);
    assert_eq!(SampleFormat::I32.bytes_per_sample(), 4);
    assert_eq!(SampleFormat::F32.bytes_per_sample(), 4);
}
