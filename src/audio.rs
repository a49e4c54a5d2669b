//! Audio system using Web Audio API
//!
//! Procedurally generated cues, no external files. The simulation only
//! queues [`AudioCue`]s; this module turns them into oscillator envelopes.

use web_sys::{AudioContext, GainNode, OscillatorNode, OscillatorType};

use crate::sim::AudioCue;
use crate::tuning::ProjectileKind;

/// Welcome chime and lock arpeggio (C5 E5 G5 C6)
const CHIME_NOTES: [f32; 4] = [523.0, 659.0, 784.0, 1047.0];

/// Audio manager for the game
pub struct AudioManager {
    ctx: Option<AudioContext>,
    /// Running ambient drone, if any
    ambient: Vec<(OscillatorNode, GainNode)>,
    sfx_gain: f32,
    ambient_gain: f32,
}

impl Default for AudioManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioManager {
    pub fn new() -> Self {
        // Try to create audio context (may fail if not in secure context)
        let ctx = AudioContext::new().ok();
        if ctx.is_none() {
            log::warn!("Failed to create AudioContext - audio disabled");
        }
        Self {
            ctx,
            ambient: Vec::new(),
            sfx_gain: 0.8,
            ambient_gain: 0.4,
        }
    }

    /// Resume audio context (required after user gesture)
    pub fn resume(&self) {
        if let Some(ctx) = &self.ctx {
            let _ = ctx.resume();
        }
    }

    /// Suspend output (window lost focus)
    pub fn suspend(&self) {
        if let Some(ctx) = &self.ctx {
            let _ = ctx.suspend();
        }
    }

    /// Apply gains from the player's settings
    pub fn apply_settings(&mut self, settings: &crate::Settings) {
        self.sfx_gain = settings.sfx_gain();
        self.ambient_gain = settings.ambient_gain();
        if self.ambient_gain <= 0.0 {
            self.stop_ambient();
        }
    }

    /// Play one cue from the session outbox
    pub fn play(&mut self, cue: AudioCue) {
        let Some(ctx) = self.ctx.clone() else { return };

        // Resume context if suspended (browsers require user gesture)
        if ctx.state() == web_sys::AudioContextState::Suspended {
            let _ = ctx.resume();
        }

        match cue {
            AudioCue::AmbientStart => self.start_ambient(&ctx),
            AudioCue::AmbientStop => self.stop_ambient(),
            cue => {
                let vol = self.sfx_gain;
                if vol <= 0.0 {
                    return;
                }
                match cue {
                    AudioCue::Landing { intensity } => self.play_landing(&ctx, vol, intensity),
                    AudioCue::Stack { height } => self.play_stack(&ctx, vol, height),
                    AudioCue::Lock => self.play_lock(&ctx, vol),
                    AudioCue::LoseLife => self.play_lose_life(&ctx, vol),
                    AudioCue::GameOver => self.play_game_over(&ctx, vol),
                    AudioCue::Impact(kind) => self.play_impact(&ctx, vol, kind),
                    AudioCue::ProjectileSpawn => self.play_warning(&ctx, vol),
                    AudioCue::ProjectileLaunch(_) => self.play_launch(&ctx, vol),
                    AudioCue::AmbientStart | AudioCue::AmbientStop => {}
                }
            }
        }
    }

    // === Ambient ===

    /// Soft two-voice drone plus a welcoming chime
    fn start_ambient(&mut self, ctx: &AudioContext) {
        self.stop_ambient();
        let vol = self.ambient_gain;
        if vol <= 0.0 {
            return;
        }

        for freq in [130.8, 196.0] {
            if let Some((osc, gain)) = self.create_osc(ctx, freq, OscillatorType::Sine) {
                let t = ctx.current_time();
                gain.gain().set_value_at_time(0.001, t).ok();
                gain.gain()
                    .linear_ramp_to_value_at_time(vol * 0.04, t + 1.5)
                    .ok();
                osc.start().ok();
                self.ambient.push((osc, gain));
            }
        }

        for (i, freq) in CHIME_NOTES[..3].iter().enumerate() {
            self.play_bell(ctx, *freq, vol * 0.1, 0.1 + i as f64 * 0.2);
        }
    }

    fn stop_ambient(&mut self) {
        for (osc, gain) in self.ambient.drain(..) {
            if let Some(ctx) = &self.ctx {
                let t = ctx.current_time();
                gain.gain()
                    .exponential_ramp_to_value_at_time(0.001, t + 0.3)
                    .ok();
                osc.stop_with_when(t + 0.35).ok();
            } else {
                osc.stop().ok();
            }
        }
    }

    // === Sound generators ===

    /// Create an oscillator with gain envelope
    fn create_osc(
        &self,
        ctx: &AudioContext,
        freq: f32,
        osc_type: OscillatorType,
    ) -> Option<(OscillatorNode, GainNode)> {
        let osc = ctx.create_oscillator().ok()?;
        let gain = ctx.create_gain().ok()?;

        osc.set_type(osc_type);
        osc.frequency().set_value(freq);
        osc.connect_with_audio_node(&gain).ok()?;
        gain.connect_with_audio_node(&ctx.destination()).ok()?;

        Some((osc, gain))
    }

    /// Bell with an overtone, long tail
    fn play_bell(&self, ctx: &AudioContext, freq: f32, vol: f32, delay: f64) {
        let t = ctx.current_time() + delay;
        for (f, v) in [(freq, vol), (freq * 2.4, vol * 0.5)] {
            if let Some((osc, gain)) = self.create_osc(ctx, f, OscillatorType::Sine) {
                gain.gain().set_value_at_time(v, t).ok();
                gain.gain()
                    .exponential_ramp_to_value_at_time(0.001, t + 2.0)
                    .ok();
                osc.start_with_when(t).ok();
                osc.stop_with_when(t + 2.0).ok();
            }
        }
    }

    /// Landing - soft thump, brighter for big blocks
    fn play_landing(&self, ctx: &AudioContext, vol: f32, intensity: f32) {
        let Some((osc, gain)) = self.create_osc(ctx, 150.0, OscillatorType::Sine) else {
            return;
        };
        let t = ctx.current_time();

        gain.gain()
            .set_value_at_time(vol * 0.5 * intensity, t)
            .ok();
        gain.gain()
            .exponential_ramp_to_value_at_time(0.001, t + 0.1)
            .ok();
        osc.frequency()
            .set_value_at_time(150.0 + intensity * 50.0, t)
            .ok();
        osc.frequency()
            .exponential_ramp_to_value_at_time(60.0, t + 0.08)
            .ok();

        osc.start().ok();
        osc.stop_with_when(t + 0.12).ok();
    }

    /// Stack - rising blip, pitch follows height
    fn play_stack(&self, ctx: &AudioContext, vol: f32, height: u32) {
        let base = 300.0 + height.min(300) as f32;
        let Some((osc, gain)) = self.create_osc(ctx, base, OscillatorType::Sine) else {
            return;
        };
        let t = ctx.current_time();

        gain.gain().set_value_at_time(vol * 0.3, t).ok();
        gain.gain()
            .exponential_ramp_to_value_at_time(0.001, t + 0.15)
            .ok();
        osc.frequency().set_value_at_time(base * 1.25, t + 0.05).ok();

        osc.start().ok();
        osc.stop_with_when(t + 0.15).ok();
    }

    /// Lock - C major arpeggio with sleigh-bell shimmer
    fn play_lock(&self, ctx: &AudioContext, vol: f32) {
        for (i, freq) in CHIME_NOTES.iter().enumerate() {
            let delay = i as f64 * 0.08;
            if let Some((osc, gain)) = self.create_osc(ctx, *freq, OscillatorType::Sine) {
                let t = ctx.current_time() + delay;
                gain.gain().set_value_at_time(vol * 0.3, t).ok();
                gain.gain()
                    .exponential_ramp_to_value_at_time(0.001, t + 0.4)
                    .ok();
                osc.start_with_when(t).ok();
                osc.stop_with_when(t + 0.5).ok();
            }
        }

        for i in 0..5 {
            let freq = 2000.0 + i as f32 * 230.0;
            if let Some((osc, gain)) = self.create_osc(ctx, freq, OscillatorType::Sine) {
                let t = ctx.current_time() + i as f64 * 0.05;
                gain.gain().set_value_at_time(vol * 0.12, t).ok();
                gain.gain()
                    .exponential_ramp_to_value_at_time(0.001, t + 0.1)
                    .ok();
                osc.start_with_when(t).ok();
                osc.stop_with_when(t + 0.15).ok();
            }
        }
    }

    /// Lose life - descending "oof"
    fn play_lose_life(&self, ctx: &AudioContext, vol: f32) {
        let Some((osc, gain)) = self.create_osc(ctx, 300.0, OscillatorType::Sawtooth) else {
            return;
        };
        let t = ctx.current_time();

        gain.gain().set_value_at_time(vol * 0.35, t).ok();
        gain.gain()
            .exponential_ramp_to_value_at_time(0.001, t + 0.3)
            .ok();
        osc.frequency()
            .exponential_ramp_to_value_at_time(100.0, t + 0.2)
            .ok();

        osc.start().ok();
        osc.stop_with_when(t + 0.3).ok();
    }

    /// Game over - two descending tones
    fn play_game_over(&self, ctx: &AudioContext, vol: f32) {
        for (delay, from, to, level) in [(0.0, 400.0, 100.0, 0.45), (0.1, 300.0, 75.0, 0.35)] {
            if let Some((osc, gain)) = self.create_osc(ctx, from, OscillatorType::Sine) {
                let t = ctx.current_time() + delay;
                gain.gain().set_value_at_time(vol * level, t).ok();
                gain.gain()
                    .exponential_ramp_to_value_at_time(0.001, t + 0.9)
                    .ok();
                osc.frequency().set_value_at_time(from, t).ok();
                osc.frequency()
                    .exponential_ramp_to_value_at_time(to, t + 0.8)
                    .ok();
                osc.start_with_when(t).ok();
                osc.stop_with_when(t + 1.0).ok();
            }
        }
    }

    /// Impact - falling triangle tone, pitched per projectile kind
    fn play_impact(&self, ctx: &AudioContext, vol: f32, kind: ProjectileKind) {
        let (freq, duration) = impact_tone(kind);
        let t = ctx.current_time();

        if let Some((osc, gain)) = self.create_osc(ctx, freq, OscillatorType::Triangle) {
            gain.gain().set_value_at_time(vol * 0.35, t).ok();
            gain.gain()
                .exponential_ramp_to_value_at_time(0.001, t + duration)
                .ok();
            osc.frequency()
                .exponential_ramp_to_value_at_time(freq * 0.5, t + duration)
                .ok();
            osc.start().ok();
            osc.stop_with_when(t + duration).ok();
        }

        // Crack layered on top
        if let Some((osc, gain)) = self.create_osc(ctx, freq * 2.0, OscillatorType::Square) {
            gain.gain().set_value_at_time(vol * 0.08, t).ok();
            gain.gain()
                .exponential_ramp_to_value_at_time(0.001, t + duration * 0.5)
                .ok();
            osc.start().ok();
            osc.stop_with_when(t + duration * 0.5).ok();
        }
    }

    /// Wave warning - two-tone siren
    fn play_warning(&self, ctx: &AudioContext, vol: f32) {
        let Some((osc, gain)) = self.create_osc(ctx, 440.0, OscillatorType::Square) else {
            return;
        };
        let t = ctx.current_time();

        gain.gain().set_value_at_time(vol * 0.12, t).ok();
        gain.gain()
            .exponential_ramp_to_value_at_time(0.001, t + 0.5)
            .ok();
        osc.frequency().set_value_at_time(440.0, t).ok();
        osc.frequency().set_value_at_time(660.0, t + 0.12).ok();
        osc.frequency().set_value_at_time(440.0, t + 0.24).ok();
        osc.frequency().set_value_at_time(660.0, t + 0.36).ok();

        osc.start().ok();
        osc.stop_with_when(t + 0.5).ok();
    }

    /// Launch - short whistle down
    fn play_launch(&self, ctx: &AudioContext, vol: f32) {
        let Some((osc, gain)) = self.create_osc(ctx, 900.0, OscillatorType::Sine) else {
            return;
        };
        let t = ctx.current_time();

        gain.gain().set_value_at_time(vol * 0.1, t).ok();
        gain.gain()
            .exponential_ramp_to_value_at_time(0.001, t + 0.25)
            .ok();
        osc.frequency()
            .exponential_ramp_to_value_at_time(300.0, t + 0.25)
            .ok();

        osc.start().ok();
        osc.stop_with_when(t + 0.25).ok();
    }
}

/// Base pitch and length of a projectile's impact sound
fn impact_tone(kind: ProjectileKind) -> (f32, f64) {
    match kind {
        ProjectileKind::Coal => (100.0, 0.2),
        ProjectileKind::Iceball => (800.0, 0.15),
        ProjectileKind::Snowball => (200.0, 0.1),
        ProjectileKind::Hailstone => (600.0, 0.12),
        ProjectileKind::CandyCane => (1200.0, 0.1),
        ProjectileKind::Ornament => (1500.0, 0.25),
        ProjectileKind::GiftBox => (250.0, 0.18),
        ProjectileKind::Star => (1000.0, 0.2),
        ProjectileKind::Icicle => (900.0, 0.14),
        ProjectileKind::Mistletoe => (400.0, 0.12),
    }
}
