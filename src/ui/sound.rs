/// Audio collaborator: maps engine events to procedural blips via rodio.
///
/// Every effect is synthesised into an in-memory WAV buffer once at start
/// and replayed fire-and-forget. Without the "sound" feature the engine is
/// a stub that ignores every call.

use tilestep::sim::event::GameEvent;

/// One sound effect.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Sfx {
    Jump,
    Shoot,
    EnemyKilled,
    Die,
    Pickup,
    Trigger,
    Clear,
}

impl Sfx {
    pub const ALL: [Sfx; 7] = [
        Sfx::Jump,
        Sfx::Shoot,
        Sfx::EnemyKilled,
        Sfx::Die,
        Sfx::Pickup,
        Sfx::Trigger,
        Sfx::Clear,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Which effect an event sounds like, if any.
pub fn sfx_for(event: &GameEvent) -> Option<Sfx> {
    match event {
        GameEvent::PlayerJumped => Some(Sfx::Jump),
        GameEvent::Shot { .. } => Some(Sfx::Shoot),
        GameEvent::EnemyKilled { .. } => Some(Sfx::EnemyKilled),
        GameEvent::PlayerDied => Some(Sfx::Die),
        GameEvent::Collected { .. } => Some(Sfx::Pickup),
        GameEvent::TriggerFired { .. } | GameEvent::PlatformActivated { .. } => Some(Sfx::Trigger),
        GameEvent::LevelComplete => Some(Sfx::Clear),
    }
}

#[cfg(feature = "sound")]
mod inner {
    use std::f32::consts::TAU;
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink};

    use super::Sfx;

    const SAMPLE_RATE: u32 = 22050;

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        buffers: Vec<Arc<Vec<u8>>>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = OutputStream::try_default().ok()?;
            let buffers = Sfx::ALL.iter().map(|&s| Arc::new(make_wav(&synth(s)))).collect();
            Some(SoundEngine { _stream: stream, handle, buffers })
        }

        pub fn play(&self, sfx: Sfx) {
            let Some(buf) = self.buffers.get(sfx.index()) else { return };
            if let Ok(sink) = Sink::try_new(&self.handle) {
                if let Ok(src) = rodio::Decoder::new(Cursor::new(buf.as_ref().clone())) {
                    sink.append(src);
                    sink.detach();
                }
            }
        }
    }

    fn synth(sfx: Sfx) -> Vec<f32> {
        match sfx {
            Sfx::Jump => sweep(300.0, 700.0, 0.12, 0.25),
            Sfx::Shoot => noise_burst(0.06, 0.25),
            Sfx::EnemyKilled => {
                let mut s = noise_burst(0.05, 0.3);
                s.extend(sweep(500.0, 150.0, 0.12, 0.3));
                s
            }
            Sfx::Die => notes(&[(440.0, 0.12), (370.0, 0.12), (311.0, 0.12), (261.0, 0.2)], 0.3),
            Sfx::Pickup => notes(&[(1047.0, 0.045), (1319.0, 0.045), (1568.0, 0.06)], 0.25),
            Sfx::Trigger => notes(&[(784.0, 0.06), (1047.0, 0.1)], 0.25),
            Sfx::Clear => notes(&[(523.0, 0.1), (659.0, 0.1), (784.0, 0.1), (1047.0, 0.3)], 0.3),
        }
    }

    // ════════════════════════════════════════════════════════════
    //  Waveform generators: mono f32 samples
    // ════════════════════════════════════════════════════════════

    fn sample_count(duration: f32) -> usize {
        (SAMPLE_RATE as f32 * duration) as usize
    }

    /// Note sequence, sine plus a touch of second harmonic, each note
    /// decaying to 70%.
    fn notes(seq: &[(f32, f32)], volume: f32) -> Vec<f32> {
        let mut out = Vec::new();
        for &(freq, dur) in seq {
            let n = sample_count(dur);
            out.extend((0..n).map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32) * 0.3;
                let wave = (t * freq * TAU).sin() * 0.7 + (t * freq * 2.0 * TAU).sin() * 0.3;
                wave * env * volume
            }));
        }
        fade_tail(&mut out);
        out
    }

    /// Linear pitch glide.
    fn sweep(from: f32, to: f32, duration: f32, volume: f32) -> Vec<f32> {
        let n = sample_count(duration);
        let mut phase = 0.0_f32;
        (0..n)
            .map(|i| {
                let k = i as f32 / n as f32;
                phase += (from + (to - from) * k) * TAU / SAMPLE_RATE as f32;
                phase.sin() * (1.0 - k) * volume
            })
            .collect()
    }

    /// LCG noise with a fast decay.
    fn noise_burst(duration: f32, volume: f32) -> Vec<f32> {
        let n = sample_count(duration);
        let mut rng: u32 = 0x2545_f491;
        (0..n)
            .map(|i| {
                rng = rng.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let noise = (rng >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0;
                noise * (1.0 - i as f32 / n as f32).powi(2) * volume
            })
            .collect()
    }

    fn fade_tail(samples: &mut [f32]) {
        let len = samples.len();
        let fade = len / 4;
        for (j, s) in samples[len - fade..].iter_mut().enumerate() {
            *s *= 1.0 - j as f32 / fade.max(1) as f32;
        }
    }

    // ════════════════════════════════════════════════════════════
    //  WAV encoder: 16-bit PCM mono
    // ════════════════════════════════════════════════════════════

    fn make_wav(samples: &[f32]) -> Vec<u8> {
        let bits: u16 = 16;
        let channels: u16 = 1;
        let block_align = channels * bits / 8;
        let byte_rate = SAMPLE_RATE * block_align as u32;
        let data_size = samples.len() as u32 * block_align as u32;

        let mut buf = Vec::with_capacity(44 + data_size as usize);
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data_size).to_le_bytes());
        buf.extend_from_slice(b"WAVEfmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&channels.to_le_bytes());
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&bits.to_le_bytes());
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());
        for &s in samples {
            buf.extend_from_slice(&((s.clamp(-1.0, 1.0) * 32767.0) as i16).to_le_bytes());
        }
        buf
    }
}

// ════════════════════════════════════════════════════════════
//  Public API, no-ops when the sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> {
        Some(SoundEngine)
    }
    pub fn play(&self, _sfx: Sfx) {}
}

/// Play whatever a step's events call for. Duplicate effects in one
/// frame play once.
pub fn play_events(sound: Option<&SoundEngine>, events: &[GameEvent]) {
    let Some(sound) = sound else { return };
    let mut played = [false; Sfx::ALL.len()];
    for sfx in events.iter().filter_map(sfx_for) {
        if !played[sfx.index()] {
            played[sfx.index()] = true;
            sound.play(sfx);
        }
    }
}
