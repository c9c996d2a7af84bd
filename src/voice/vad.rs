//! Voice activity end-pointing
//!
//! [`VadRecorder`] consumes fixed-size chunks and decides when the user has
//! finished speaking. It calibrates a noise floor first, then waits for
//! speech above an adaptive threshold, keeping a short pre-roll so the first
//! syllable is not cut. After speech starts, a brief hangover absorbs short
//! dips before silence is counted.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::AudioCapture;
use crate::Result;

/// Noise floor multiplier for the adaptive threshold
const NOISE_FACTOR: f32 = 3.0;

/// Margin added above the scaled noise floor
const NOISE_MARGIN: f32 = 0.0015;

/// Audio returned when nothing at all was captured
const EMPTY_FALLBACK_SECONDS: f32 = 0.5;

/// End-pointing parameters
#[derive(Debug, Clone, PartialEq)]
pub struct VadSettings {
    pub sample_rate: u32,
    pub max_seconds: f32,
    /// Silence after speech that ends the recording
    pub silence_seconds: f32,
    /// Recording never stops on silence before this
    pub min_record_seconds: f32,
    /// Fixed threshold, also the lower bound of the adaptive one
    pub rms_threshold: f32,
    pub adaptive_threshold: bool,
    pub calibration_seconds: f32,
    pub pre_roll_seconds: f32,
    pub hangover_seconds: f32,
    pub chunk_ms: u32,
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            sample_rate: super::SAMPLE_RATE,
            max_seconds: 60.0,
            silence_seconds: 2.0,
            min_record_seconds: 3.5,
            rms_threshold: 0.006,
            adaptive_threshold: true,
            calibration_seconds: 0.6,
            pre_roll_seconds: 0.35,
            hangover_seconds: 0.35,
            chunk_ms: 30,
        }
    }
}

impl VadSettings {
    /// Samples per chunk
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn chunk_size(&self) -> usize {
        (f64::from(self.sample_rate) * f64::from(self.chunk_ms) / 1000.0) as usize
    }

    /// Whole chunks that fit in `seconds`
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn chunks(&self, seconds: f32) -> usize {
        if self.chunk_ms == 0 {
            return 0;
        }
        (f64::from(seconds) * 1000.0 / f64::from(self.chunk_ms)) as usize
    }
}

/// Where the recorder is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    /// Measuring background noise
    Calibrating,
    /// Waiting for speech to start
    Waiting,
    /// Speech started, counting silence
    Speaking,
    /// Recording finished
    Done,
}

/// Chunk-driven utterance recorder
#[derive(Debug)]
pub struct VadRecorder {
    settings: VadSettings,
    state: VadState,

    calibration_chunks: usize,
    max_chunks: usize,
    min_chunks: usize,
    silence_chunks_needed: usize,
    hangover_chunks: usize,

    noise: Vec<f32>,
    threshold: f32,
    pre_roll: VecDeque<Vec<f32>>,
    pre_roll_chunks: usize,
    frames: Vec<f32>,

    /// Chunks seen after calibration
    chunk_index: usize,
    silent_chunks: usize,
    hangover_left: usize,
}

impl VadRecorder {
    #[must_use]
    pub fn new(settings: VadSettings) -> Self {
        let calibration_chunks = settings.chunks(settings.calibration_seconds);
        let max_chunks = settings.chunks(settings.max_seconds);
        let min_chunks = settings.chunks(settings.min_record_seconds);
        let silence_chunks_needed = settings.chunks(settings.silence_seconds);
        let pre_roll_chunks = settings.chunks(settings.pre_roll_seconds).max(1);
        let hangover_chunks = settings.chunks(settings.hangover_seconds).max(1);

        let mut recorder = Self {
            threshold: settings.rms_threshold,
            state: VadState::Calibrating,
            settings,
            calibration_chunks,
            max_chunks,
            min_chunks,
            silence_chunks_needed,
            hangover_chunks,
            noise: Vec::with_capacity(calibration_chunks),
            pre_roll: VecDeque::with_capacity(pre_roll_chunks),
            pre_roll_chunks,
            frames: Vec::new(),
            chunk_index: 0,
            silent_chunks: 0,
            hangover_left: 0,
        };

        if calibration_chunks == 0 {
            recorder.finish_calibration();
        }
        recorder
    }

    #[must_use]
    pub const fn state(&self) -> VadState {
        self.state
    }

    /// Speech threshold in effect (final once calibration is over)
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self.state, VadState::Done)
    }

    /// Feed one chunk, returning `true` once recording is complete
    pub fn push_chunk(&mut self, chunk: &[f32]) -> bool {
        match self.state {
            VadState::Done => return true,
            VadState::Calibrating => {
                self.noise.push(rms(chunk));
                self.remember(chunk);
                if self.noise.len() >= self.calibration_chunks {
                    self.finish_calibration();
                }
                return false;
            }
            VadState::Waiting | VadState::Speaking => {}
        }

        if self.chunk_index >= self.max_chunks {
            self.state = VadState::Done;
            return true;
        }

        let index = self.chunk_index;
        self.chunk_index += 1;
        self.remember(chunk);
        let loud = rms(chunk) >= self.threshold;

        if self.state == VadState::Waiting {
            if loud {
                self.state = VadState::Speaking;
                self.frames.extend(self.pre_roll.drain(..).flatten());
                self.silent_chunks = 0;
                self.hangover_left = self.hangover_chunks;
                tracing::trace!(chunk = index, "speech started");
            }
        } else {
            self.frames.extend_from_slice(chunk);

            if loud {
                self.silent_chunks = 0;
                self.hangover_left = self.hangover_chunks;
            } else if self.hangover_left > 0 {
                self.hangover_left -= 1;
            } else {
                self.silent_chunks += 1;
            }

            if index >= self.min_chunks && self.silent_chunks >= self.silence_chunks_needed {
                tracing::debug!(chunks = index + 1, "end of speech");
                self.state = VadState::Done;
            }
        }

        if self.chunk_index >= self.max_chunks {
            self.state = VadState::Done;
        }
        self.is_done()
    }

    /// Recorded audio
    ///
    /// If speech never started the pre-roll is returned, or half a second
    /// of silence when not even that was captured.
    #[must_use]
    pub fn finish(self) -> Vec<f32> {
        if !self.frames.is_empty() {
            return self.frames;
        }

        let pre_roll: Vec<f32> = self.pre_roll.into_iter().flatten().collect();
        if !pre_roll.is_empty() {
            return pre_roll;
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let len = (self.settings.sample_rate as f32 * EMPTY_FALLBACK_SECONDS) as usize;
        vec![0.0; len]
    }

    /// Record one utterance from a started capture
    ///
    /// Gives up after the maximum duration plus calibration time even if the
    /// device stops delivering audio.
    ///
    /// # Errors
    ///
    /// Returns error if the capture cannot be started
    pub async fn record(mut self, capture: &mut AudioCapture) -> Result<Vec<f32>> {
        let chunk_size = self.settings.chunk_size().max(1);
        let deadline = Duration::from_secs_f32(
            self.settings.max_seconds + self.settings.calibration_seconds + 2.0,
        );

        capture.take_buffer();
        capture.start()?;

        let start = Instant::now();
        let mut pending: Vec<f32> = Vec::new();

        'outer: while start.elapsed() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
            pending.extend(capture.take_buffer());

            while pending.len() >= chunk_size {
                let rest = pending.split_off(chunk_size);
                let done = self.push_chunk(&pending);
                pending = rest;
                if done {
                    break 'outer;
                }
            }
        }

        capture.stop();

        if !self.is_done() {
            tracing::warn!("recording deadline reached");
        }
        Ok(self.finish())
    }

    fn finish_calibration(&mut self) {
        let floor = median(&mut self.noise);
        if self.settings.adaptive_threshold {
            self.threshold = self
                .settings
                .rms_threshold
                .max(floor.mul_add(NOISE_FACTOR, NOISE_MARGIN));
        }
        self.state = VadState::Waiting;
        tracing::debug!(noise_floor = floor, threshold = self.threshold, "noise calibrated");
    }

    fn remember(&mut self, chunk: &[f32]) {
        if self.pre_roll.len() == self.pre_roll_chunks {
            self.pre_roll.pop_front();
        }
        self.pre_roll.push_back(chunk.to_vec());
    }
}

/// Root mean square of a chunk
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

fn median(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        f32::midpoint(values[mid - 1], values[mid])
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> VadSettings {
        VadSettings {
            sample_rate: 1000,
            max_seconds: 3.0,
            silence_seconds: 0.2,
            min_record_seconds: 0.5,
            chunk_ms: 100,
            calibration_seconds: 0.2,
            pre_roll_seconds: 0.2,
            hangover_seconds: 0.1,
            ..VadSettings::default()
        }
    }

    fn quiet() -> Vec<f32> {
        vec![0.001; 100]
    }

    fn loud() -> Vec<f32> {
        vec![0.2; 100]
    }

    #[test]
    fn test_rms_and_median() {
        assert!(rms(&[0.0; 10]) < f32::EPSILON);
        assert!((rms(&[0.5; 10]) - 0.5).abs() < 1e-6);
        assert!(rms(&[]) < f32::EPSILON);

        assert!((median(&mut [3.0, 1.0, 2.0]) - 2.0).abs() < f32::EPSILON);
        assert!((median(&mut [4.0, 1.0, 2.0, 3.0]) - 2.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_calibration_raises_threshold() {
        let mut recorder = VadRecorder::new(settings());
        assert_eq!(recorder.state(), VadState::Calibrating);

        recorder.push_chunk(&vec![0.01; 100]);
        recorder.push_chunk(&vec![0.01; 100]);
        assert_eq!(recorder.state(), VadState::Waiting);
        assert!((recorder.threshold() - 0.0315).abs() < 1e-5);
    }

    #[test]
    fn test_fixed_threshold_floor() {
        let mut recorder = VadRecorder::new(settings());
        recorder.push_chunk(&quiet());
        recorder.push_chunk(&quiet());
        assert!((recorder.threshold() - 0.006).abs() < 1e-6);
    }

    #[test]
    fn test_stops_after_silence_and_min_duration() {
        let mut recorder = VadRecorder::new(settings());
        recorder.push_chunk(&quiet());
        recorder.push_chunk(&quiet());

        assert!(!recorder.push_chunk(&loud()));
        assert_eq!(recorder.state(), VadState::Speaking);
        for _ in 0..3 {
            assert!(!recorder.push_chunk(&loud()));
        }

        // One hangover chunk, then two silent chunks
        assert!(!recorder.push_chunk(&quiet()));
        assert!(!recorder.push_chunk(&quiet()));
        assert!(recorder.push_chunk(&quiet()));
        assert!(recorder.is_done());

        let audio = recorder.finish();
        // Pre-roll holds one calibration chunk and the first loud chunk
        assert_eq!(audio.len(), 2 * 100 + 6 * 100);
    }

    #[test]
    fn test_short_pause_does_not_stop_before_min_duration() {
        let mut recorder = VadRecorder::new(settings());
        recorder.push_chunk(&quiet());
        recorder.push_chunk(&quiet());

        recorder.push_chunk(&loud());
        for _ in 0..3 {
            assert!(!recorder.push_chunk(&quiet()));
        }
        assert_eq!(recorder.state(), VadState::Speaking);
    }

    #[test]
    fn test_max_duration_without_speech_returns_pre_roll() {
        let mut recorder = VadRecorder::new(settings());
        let mut pushes = 0;
        while !recorder.push_chunk(&quiet()) {
            pushes += 1;
            assert!(pushes < 100);
        }

        let audio = recorder.finish();
        assert_eq!(audio.len(), 2 * 100);
    }

    #[test]
    fn test_nothing_captured_yields_half_second() {
        let recorder = VadRecorder::new(settings());
        assert_eq!(recorder.finish().len(), 500);
    }

    #[test]
    fn test_default_chunk_size() {
        assert_eq!(VadSettings::default().chunk_size(), 480);
    }
}
