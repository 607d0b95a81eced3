//! Procedural producers that move control points every frame.

use std::time::{Duration, Instant};

use anyhow::Result;
use meshconfig::{DriverKind, EasingSetting};
use meshgrad::{AnimationState, SimplexNoise, TimeSample, Timing, TimingCurve};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::palette::is_border;

/// Noise frequency applied to base coordinates.
const NOISE_SCALE: f32 = 1.5;
/// Decorrelates the y channel from the x channel.
const NOISE_Y_OFFSET: f32 = 100.0;
/// Higher values follow the noise target more tightly.
const SMOOTHING: f32 = 8.0;

pub trait Driver: Send {
    fn name(&self) -> &'static str;

    /// Advances `state` to `time`. Callers tick and snapshot afterwards.
    fn step(&mut self, state: &mut AnimationState, time: &TimeSample) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub kind: DriverKind,
    pub seed: u64,
    pub speed: f32,
    pub intensity: f32,
    pub period: Duration,
    pub duration: Duration,
    pub easing: EasingSetting,
}

pub fn easing_curve(easing: EasingSetting) -> TimingCurve {
    match easing {
        EasingSetting::Linear => TimingCurve::Linear,
        EasingSetting::Smoothstep => TimingCurve::Smoothstep,
        EasingSetting::EaseInOut => TimingCurve::EaseInOut,
        EasingSetting::FastOutSlowIn => TimingCurve::FastOutSlowIn,
    }
}

pub fn build_driver(
    settings: &DriverSettings,
    width: u32,
    height: u32,
    base: Vec<[f32; 2]>,
) -> Box<dyn Driver> {
    match settings.kind {
        DriverKind::Static => Box::new(StaticDriver),
        DriverKind::Noise => Box::new(NoiseDriver::new(
            width,
            height,
            base,
            settings.seed,
            settings.speed,
            settings.intensity,
        )),
        DriverKind::Drift => Box::new(DriftDriver::new(
            width,
            height,
            base,
            settings.seed,
            settings.intensity,
            settings.period,
            Timing::new(settings.duration, easing_curve(settings.easing)),
        )),
    }
}

pub struct StaticDriver;

impl Driver for StaticDriver {
    fn name(&self) -> &'static str {
        "static"
    }

    fn step(&mut self, _state: &mut AnimationState, _time: &TimeSample) -> Result<()> {
        Ok(())
    }
}

/// Interior points chase a simplex-noise target around their base position.
pub struct NoiseDriver {
    noise: SimplexNoise,
    width: u32,
    height: u32,
    speed: f32,
    intensity: f32,
    base: Vec<[f32; 2]>,
    current: Vec<[f32; 2]>,
}

impl NoiseDriver {
    pub fn new(
        width: u32,
        height: u32,
        base: Vec<[f32; 2]>,
        seed: u64,
        speed: f32,
        intensity: f32,
    ) -> Self {
        Self {
            noise: SimplexNoise::new(seed),
            width,
            height,
            speed,
            intensity,
            current: base.clone(),
            base,
        }
    }

    fn target(&self, index: usize, seconds: f32) -> [f32; 2] {
        let base = self.base[index];
        if is_border(index, self.width, self.height) {
            return base;
        }
        let phase = seconds * self.speed + index as f32;
        let dx = self.noise.noise2(base[0] * NOISE_SCALE, phase) * self.intensity;
        let dy = self
            .noise
            .noise2(base[1] * NOISE_SCALE, phase + NOISE_Y_OFFSET)
            * self.intensity;
        [base[0] + dx, base[1] + dy]
    }

    pub fn current(&self) -> &[[f32; 2]] {
        &self.current
    }
}

impl Driver for NoiseDriver {
    fn name(&self) -> &'static str {
        "noise"
    }

    fn step(&mut self, state: &mut AnimationState, time: &TimeSample) -> Result<()> {
        let blend = (SMOOTHING * time.delta).clamp(0.0, 1.0);
        for index in 0..self.current.len() {
            let target = self.target(index, time.seconds);
            let point = &mut self.current[index];
            point[0] += (target[0] - point[0]) * blend;
            point[1] += (target[1] - point[1]) * blend;
        }
        state.snap_all_points(&self.current)?;
        Ok(())
    }
}

/// Every `period`, interior points ease toward a new random offset of their
/// base position.
pub struct DriftDriver {
    rng: StdRng,
    width: u32,
    height: u32,
    intensity: f32,
    period: Duration,
    timing: Timing,
    base: Vec<[f32; 2]>,
    next_retarget: Option<Instant>,
}

impl DriftDriver {
    pub fn new(
        width: u32,
        height: u32,
        base: Vec<[f32; 2]>,
        seed: u64,
        intensity: f32,
        period: Duration,
        timing: Timing,
    ) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            width,
            height,
            intensity,
            period,
            timing,
            base,
            next_retarget: None,
        }
    }
}

impl Driver for DriftDriver {
    fn name(&self) -> &'static str {
        "drift"
    }

    fn step(&mut self, state: &mut AnimationState, time: &TimeSample) -> Result<()> {
        let now = time.instant;
        if self.next_retarget.is_some_and(|deadline| now < deadline) {
            return Ok(());
        }
        for (index, base) in self.base.iter().enumerate() {
            if is_border(index, self.width, self.height) {
                continue;
            }
            let dx = self.rng.gen_range(-1.0f32..=1.0) * self.intensity;
            let dy = self.rng.gen_range(-1.0f32..=1.0) * self.intensity;
            let target = [(base[0] + dx).clamp(0.0, 1.0), (base[1] + dy).clamp(0.0, 1.0)];
            state.animate_to(index, target, self.timing, now)?;
        }
        self.next_retarget = Some(now + self.period);
        Ok(())
    }
}
