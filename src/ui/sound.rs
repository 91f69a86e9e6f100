/// Sound cues: short procedural effects via rodio, one per game event.
///
/// Buffers are synthesized once at startup and replayed fire-and-forget.
/// Built without the "sound" feature, `SoundEngine` is a silent stub with
/// the same API.

use crate::sim::event::GameEvent;

/// Which cue an event maps to, if any.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Cue {
    Collect,
    Trigger,
    Teleport,
    Blocked,
    GameOver,
    LevelComplete,
}

impl Cue {
    pub fn for_event(event: &GameEvent) -> Option<Cue> {
        match event {
            GameEvent::Collect { .. } => Some(Cue::Collect),
            GameEvent::Trigger { .. } => Some(Cue::Trigger),
            GameEvent::Teleport { .. } => Some(Cue::Teleport),
            GameEvent::Blocked { .. } => Some(Cue::Blocked),
            GameEvent::GameOver { .. } => Some(Cue::GameOver),
            GameEvent::LevelComplete { .. } => Some(Cue::LevelComplete),
            _ => None,
        }
    }
}

#[cfg(feature = "sound")]
mod inner {
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink};

    use super::Cue;
    use crate::sim::event::GameEvent;

    const SAMPLE_RATE: u32 = 22050;
    const TAU: f32 = std::f32::consts::TAU;

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        collect: Arc<Vec<u8>>,
        trigger: Arc<Vec<u8>>,
        teleport: Arc<Vec<u8>>,
        blocked: Arc<Vec<u8>>,
        game_over: Arc<Vec<u8>>,
        complete: Arc<Vec<u8>>,
    }

    impl SoundEngine {
        /// `None` when no audio device is available.
        pub fn new() -> Option<Self> {
            let (stream, handle) = OutputStream::try_default().ok()?;
            Some(SoundEngine {
                _stream: stream,
                handle,
                collect: Arc::new(make_wav(&gen_collect())),
                trigger: Arc::new(make_wav(&gen_trigger())),
                teleport: Arc::new(make_wav(&gen_teleport())),
                blocked: Arc::new(make_wav(&gen_blocked())),
                game_over: Arc::new(make_wav(&gen_game_over())),
                complete: Arc::new(make_wav(&gen_complete())),
            })
        }

        pub fn play(&self, cue: Cue) {
            let buf = match cue {
                Cue::Collect => &self.collect,
                Cue::Trigger => &self.trigger,
                Cue::Teleport => &self.teleport,
                Cue::Blocked => &self.blocked,
                Cue::GameOver => &self.game_over,
                Cue::LevelComplete => &self.complete,
            };
            let Ok(sink) = Sink::try_new(&self.handle) else { return };
            if let Ok(src) = rodio::Decoder::new(Cursor::new(buf.as_ref().clone())) {
                sink.append(src);
                sink.detach();
            }
        }

        pub fn play_event(&self, event: &GameEvent) {
            if let Some(cue) = Cue::for_event(event) {
                self.play(cue);
            }
        }
    }

    // ════════════════════════════════════════════════════════════
    //  Waveforms (mono f32 samples)
    // ════════════════════════════════════════════════════════════

    fn tone(freq: f32, secs: f32, volume: f32, samples: &mut Vec<f32>) {
        let n = (SAMPLE_RATE as f32 * secs) as usize;
        for i in 0..n {
            let t = i as f32 / SAMPLE_RATE as f32;
            let env = 1.0 - (i as f32 / n as f32).powf(0.5);
            let wave = (t * freq * TAU).sin() * 0.75 + (t * freq * 2.0 * TAU).sin() * 0.25;
            samples.push(wave * env * volume);
        }
    }

    /// Two quick rising notes.
    fn gen_collect() -> Vec<f32> {
        let mut s = Vec::new();
        tone(880.0, 0.05, 0.25, &mut s);
        tone(1320.0, 0.08, 0.25, &mut s);
        s
    }

    /// Short square-ish click.
    fn gen_trigger() -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * 0.04) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - i as f32 / n as f32;
                (t * 520.0 * TAU).sin().signum() * env * 0.15
            })
            .collect()
    }

    /// Upward sweep.
    fn gen_teleport() -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * 0.25) as usize;
        let mut phase = 0.0_f32;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                phase += (300.0 + t * 1500.0) / SAMPLE_RATE as f32;
                (phase * TAU).sin() * (1.0 - t) * 0.25
            })
            .collect()
    }

    /// Low noisy thud.
    fn gen_blocked() -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * 0.1) as usize;
        let mut rng: u32 = 0x5eed;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let ti = i as f32 / SAMPLE_RATE as f32;
                rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
                let noise = (rng >> 16) as f32 / 32768.0 - 1.0;
                ((ti * 110.0 * TAU).sin() * 0.6 + noise * 0.4) * (1.0 - t).powi(2) * 0.35
            })
            .collect()
    }

    /// Falling minor line.
    fn gen_game_over() -> Vec<f32> {
        let mut s = Vec::new();
        for freq in [392.0_f32, 311.0, 262.0, 196.0] {
            tone(freq, 0.14, 0.3, &mut s);
        }
        s
    }

    /// Major arpeggio with a held top note.
    fn gen_complete() -> Vec<f32> {
        let mut s = Vec::new();
        for freq in [523.0_f32, 659.0, 784.0] {
            tone(freq, 0.09, 0.3, &mut s);
        }
        tone(1047.0, 0.3, 0.3, &mut s);
        s
    }

    // ════════════════════════════════════════════════════════════
    //  16-bit PCM WAV container
    // ════════════════════════════════════════════════════════════

    fn make_wav(samples: &[f32]) -> Vec<u8> {
        const CHANNELS: u16 = 1;
        const BITS: u16 = 16;
        let data_size = samples.len() as u32 * 2;
        let mut buf = Vec::with_capacity(44 + data_size as usize);

        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data_size).to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&CHANNELS.to_le_bytes());
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&(SAMPLE_RATE * CHANNELS as u32 * BITS as u32 / 8).to_le_bytes());
        buf.extend_from_slice(&(CHANNELS * BITS / 8).to_le_bytes());
        buf.extend_from_slice(&BITS.to_le_bytes());

        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());
        for &s in samples {
            buf.extend_from_slice(&((s.clamp(-1.0, 1.0) * 32767.0) as i16).to_le_bytes());
        }
        buf
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn wav_header_matches_payload() {
            let samples = gen_collect();
            let wav = make_wav(&samples);
            assert_eq!(&wav[0..4], b"RIFF");
            assert_eq!(&wav[8..12], b"WAVE");
            assert_eq!(wav.len(), 44 + samples.len() * 2);
        }
    }
}

// ════════════════════════════════════════════════════════════
//  Public API (no-ops when the sound feature is off)
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play(&self, _cue: Cue) {}
    pub fn play_event(&self, _event: &GameEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::EntityKind;
    use crate::domain::grid::Pos;

    #[test]
    fn events_map_to_cues() {
        let at = Pos::new(1, 1);
        assert_eq!(Cue::for_event(&GameEvent::Collect { at, collected: 1 }), Some(Cue::Collect));
        assert_eq!(
            Cue::for_event(&GameEvent::GameOver { cause: EntityKind::Hazard, at }),
            Some(Cue::GameOver)
        );
        assert_eq!(Cue::for_event(&GameEvent::ProgramFinished { executed: 3 }), None);
    }
}
