//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::io::Cursor;

use biopsy::voice::{SAMPLE_RATE, VadRecorder, VadSettings, VadState, rms, samples_to_wav};

/// Generate sine wave audio samples
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

/// Feed audio in recorder-sized chunks, returning whether recording ended
fn feed(recorder: &mut VadRecorder, chunk_size: usize, audio: &[f32]) -> bool {
    audio
        .chunks(chunk_size)
        .any(|chunk| recorder.push_chunk(chunk))
}

#[test]
fn test_speech_then_pause_ends_recording() {
    let settings = VadSettings::default();
    let chunk_size = settings.chunk_size();
    let mut recorder = VadRecorder::new(settings);

    assert!(!feed(&mut recorder, chunk_size, &generate_silence(0.6)));
    assert_eq!(recorder.state(), VadState::Waiting);

    assert!(!feed(
        &mut recorder,
        chunk_size,
        &generate_sine_samples(220.0, 4.0, 0.3)
    ));
    assert_eq!(recorder.state(), VadState::Speaking);

    assert!(feed(&mut recorder, chunk_size, &generate_silence(3.0)));

    let audio = recorder.finish();
    // Speech plus pre-roll plus hangover and the silence window
    assert!(audio.len() > SAMPLE_RATE as usize * 4);
    assert!(audio.len() < SAMPLE_RATE as usize * 7);
}

#[test]
fn test_short_speech_waits_for_min_duration() {
    let settings = VadSettings::default();
    let chunk_size = settings.chunk_size();
    let mut recorder = VadRecorder::new(settings);

    feed(&mut recorder, chunk_size, &generate_silence(0.6));
    feed(&mut recorder, chunk_size, &generate_sine_samples(220.0, 0.5, 0.3));

    // 2.5s of silence meets the silence window but not the 3.5s minimum
    assert!(!feed(&mut recorder, chunk_size, &generate_silence(2.5)));
    assert!(feed(&mut recorder, chunk_size, &generate_silence(1.0)));
}

#[test]
fn test_silence_only_hits_max_duration() {
    let settings = VadSettings {
        max_seconds: 2.0,
        ..VadSettings::default()
    };
    let chunk_size = settings.chunk_size();
    let mut recorder = VadRecorder::new(settings);

    assert!(feed(&mut recorder, chunk_size, &generate_silence(5.0)));
    let audio = recorder.finish();

    // Only the pre-roll survives
    assert!(!audio.is_empty());
    assert!(audio.len() <= chunk_size * 12);
    assert!(rms(&audio) < 1e-6);
}

#[test]
fn test_noisy_room_raises_threshold() {
    let settings = VadSettings::default();
    let chunk_size = settings.chunk_size();
    let mut recorder = VadRecorder::new(settings);

    feed(&mut recorder, chunk_size, &generate_sine_samples(50.0, 0.6, 0.02));
    assert!(recorder.threshold() > 0.006);

    // Background hum alone never starts speech
    feed(&mut recorder, chunk_size, &generate_sine_samples(50.0, 1.0, 0.02));
    assert_eq!(recorder.state(), VadState::Waiting);
}

#[test]
fn test_recording_to_wav() {
    let samples = generate_sine_samples(440.0, 0.5, 0.5);
    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len() as usize, samples.len());
}
