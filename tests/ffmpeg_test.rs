use audio_relay::api::error::AppError;
use audio_relay::services::converter::{FfmpegConverter, MediaConverter, output_path_for};
use std::io::Write;

/// 0.1s of 16-bit mono silence at 8 kHz as a WAV file
fn silent_wav() -> Vec<u8> {
    let samples: u32 = 800;
    let data_len = samples * 2;
    let mut wav = Vec::new();
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&8000u32.to_le_bytes());
    wav.extend_from_slice(&16000u32.to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(wav.len() + data_len as usize, 0);
    wav
}

#[tokio::test]
#[ignore]
async fn test_real_ffmpeg_converts_and_rejects_garbage() {
    // Requires ffmpeg on PATH
    let converter = FfmpegConverter::new("ffmpeg");

    // 1. Valid audio converts to a non-empty mp3
    let mut input = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(".m4a")
        .tempfile()
        .unwrap();
    input.write_all(&silent_wav()).unwrap();
    input.flush().unwrap();

    let output = converter.convert(input.path()).await.expect("conversion failed");
    assert_eq!(output, output_path_for(input.path()));
    let size = std::fs::metadata(&output).unwrap().len();
    assert!(size > 0, "converted file should not be empty");
    std::fs::remove_file(&output).unwrap();

    // 2. Garbage input fails with ffmpeg's diagnostic and leaves no output
    let mut garbage = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(".m4a")
        .tempfile()
        .unwrap();
    garbage.write_all(b"definitely not audio").unwrap();
    garbage.flush().unwrap();

    match converter.convert(garbage.path()).await {
        Err(AppError::Conversion(msg)) => {
            println!("ffmpeg said: {}", msg);
            assert!(!msg.is_empty());
        }
        other => panic!("Expected conversion error, got {:?}", other),
    }
    assert!(!output_path_for(garbage.path()).exists());
}
