//! Audible feedback: a pitch that falls as latency rises, and a two-note
//! chirp on connection errors.
use std::io::{self, Write};
use std::time::Duration;

use crate::probe::ProbeOutcome;

const TONE_CEILING_HZ: f64 = 1100.0;
const TONE_LENGTH: Duration = Duration::from_millis(100);
const CHIRP_NOTES_HZ: [f32; 2] = [6000.0, 4000.0];
const CHIRP_LENGTH: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub duration: Duration,
    pub volume: f32,
}

impl Tone {
    pub fn is_silent(&self) -> bool {
        self.frequency_hz <= 0.0 || self.volume <= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSettings {
    pub latency_tone: bool,
    pub error_chirp: bool,
    pub volume: f32,
}

impl AudioSettings {
    pub fn is_enabled(&self) -> bool {
        self.latency_tone || self.error_chirp
    }
}

/// Tones to play after a probe. Latencies of a second or more map to 0 Hz.
pub fn plan(outcome: ProbeOutcome, settings: &AudioSettings) -> Vec<Tone> {
    match outcome {
        ProbeOutcome::Success(ms) if settings.latency_tone => {
            let frequency_hz = if ms < 1000.0 {
                (TONE_CEILING_HZ - ms).trunc() as f32
            } else {
                0.0
            };
            vec![Tone {
                frequency_hz,
                duration: TONE_LENGTH,
                volume: settings.volume,
            }]
        }
        ProbeOutcome::Failure if settings.error_chirp => CHIRP_NOTES_HZ
            .iter()
            .map(|&frequency_hz| Tone {
                frequency_hz,
                duration: CHIRP_LENGTH,
                volume: settings.volume,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Plays tones synchronously. Called from a blocking thread.
pub trait TonePlayer: Send + Sync {
    fn play(&self, tones: &[Tone]);
}

/// Rings the terminal bell once for every audible tone.
#[derive(Debug, Default)]
pub struct BellPlayer;

impl TonePlayer for BellPlayer {
    fn play(&self, tones: &[Tone]) {
        let mut err = io::stderr();
        for tone in tones {
            if !tone.is_silent() {
                let _ = err.write_all(b"\x07");
            }
            std::thread::sleep(tone.duration);
        }
        let _ = err.flush();
    }
}

#[cfg(feature = "audio")]
pub use sine::SinePlayer;

#[cfg(feature = "audio")]
mod sine {
    use super::{Tone, TonePlayer};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{FromSample, Sample, SampleFormat, SizedSample};
    use std::error::Error;
    use std::f32::consts::PI;
    use tracing::warn;

    /// Sine waves on the default output device.
    #[derive(Debug, Default)]
    pub struct SinePlayer;

    impl TonePlayer for SinePlayer {
        fn play(&self, tones: &[Tone]) {
            if let Err(e) = play_tones(tones) {
                warn!(error = %e, "Failed to play tone.");
            }
        }
    }

    fn play_tones(tones: &[Tone]) -> Result<(), Box<dyn Error>> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or("no audio output device")?;
        let supported = device.default_output_config()?;
        let format = supported.sample_format();
        let config = supported.config();

        for tone in tones {
            if tone.is_silent() {
                std::thread::sleep(tone.duration);
                continue;
            }
            let stream = match format {
                SampleFormat::F32 => sine_stream::<f32>(&device, &config, tone)?,
                SampleFormat::F64 => sine_stream::<f64>(&device, &config, tone)?,
                SampleFormat::I8 => sine_stream::<i8>(&device, &config, tone)?,
                SampleFormat::I16 => sine_stream::<i16>(&device, &config, tone)?,
                SampleFormat::I32 => sine_stream::<i32>(&device, &config, tone)?,
                SampleFormat::U8 => sine_stream::<u8>(&device, &config, tone)?,
                SampleFormat::U16 => sine_stream::<u16>(&device, &config, tone)?,
                SampleFormat::U32 => sine_stream::<u32>(&device, &config, tone)?,
                other => return Err(format!("unsupported sample format {other:?}").into()),
            };
            stream.play()?;
            std::thread::sleep(tone.duration);
        }
        Ok(())
    }

    fn sine_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        tone: &Tone,
    ) -> Result<cpal::Stream, cpal::BuildStreamError>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = config.channels as usize;
        let mut wave = SineWave::new(tone, config.sample_rate.0 as f32);
        device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| wave.fill(data, channels),
            |e| warn!(error = %e, "Audio stream error."),
            None,
        )
    }

    /// Phase-continuous sine oscillator writing interleaved frames.
    struct SineWave {
        phase: f32,
        step: f32,
        volume: f32,
    }

    impl SineWave {
        fn new(tone: &Tone, sample_rate: f32) -> Self {
            Self {
                phase: 0.0,
                step: tone.frequency_hz * 2.0 * PI / sample_rate,
                volume: tone.volume,
            }
        }

        fn fill<T: SizedSample + FromSample<f32>>(&mut self, data: &mut [T], channels: usize) {
            for frame in data.chunks_mut(channels) {
                let value = <T as Sample>::from_sample(self.phase.sin() * self.volume);
                self.phase = (self.phase + self.step) % (2.0 * PI);
                for sample in frame.iter_mut() {
                    *sample = value;
                }
            }
        }
    }

}

/// Picks the best player compiled into this build.
pub fn default_player() -> Box<dyn TonePlayer> {
    #[cfg(feature = "audio")]
    {
        Box::new(SinePlayer)
    }
    #[cfg(not(feature = "audio"))]
    {
        Box::new(BellPlayer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(latency_tone: bool, error_chirp: bool) -> AudioSettings {
        AudioSettings {
            latency_tone,
            error_chirp,
            volume: 0.1,
        }
    }

    #[test]
    fn test_pitch_falls_with_latency() {
        let fast = plan(ProbeOutcome::Success(20.4), &settings(true, false));
        let slow = plan(ProbeOutcome::Success(600.0), &settings(true, false));
        assert_eq!(fast[0].frequency_hz, 1079.0);
        assert_eq!(slow[0].frequency_hz, 500.0);
        assert_eq!(fast[0].duration, Duration::from_millis(100));
    }

    #[test]
    fn test_slow_reply_is_silent() {
        let tones = plan(ProbeOutcome::Success(1000.0), &settings(true, false));
        assert_eq!(tones.len(), 1);
        assert!(tones[0].is_silent());
    }

    #[test]
    fn test_error_chirp_only_when_enabled() {
        assert!(plan(ProbeOutcome::Failure, &settings(true, false)).is_empty());
        let chirp = plan(ProbeOutcome::Failure, &settings(false, true));
        let notes: Vec<f32> = chirp.iter().map(|t| t.frequency_hz).collect();
        assert_eq!(notes, vec![6000.0, 4000.0]);
        assert!(chirp.iter().all(|t| t.duration == Duration::from_millis(50)));
    }

    #[test]
    fn test_success_silent_without_latency_tone() {
        assert!(plan(ProbeOutcome::Success(5.0), &settings(false, true)).is_empty());
        assert!(!settings(false, false).is_enabled());
    }
}
