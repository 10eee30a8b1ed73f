use crate::error::{Error, Result};

/// An implementation of a time-decaying value
///
/// Exploration schedules evaluate their decay at the agent's current episode count.
pub trait Decay {
    /// Calculate value at time `t`
    fn evaluate(&self, t: f32) -> f32;
}

fn validate(rate: f32, vi: f32, vf: f32) -> Result<()> {
    ((rate >= 0.0 && vi >= vf) || (rate < 0.0 && vi <= vf))
        .then_some(())
        .ok_or_else(|| Error::InvalidDecay(format!("`vi - vf` must have same sign as `rate` (rate={rate}, vi={vi}, vf={vf})")))
}

/// A constant value
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Constant {
    value: f32,
}

impl Constant {
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl Decay for Constant {
    fn evaluate(&self, _t: f32) -> f32 {
        self.value
    }
}

/// v(t) = v<sub>f</sub> + (v<sub>i</sub> - v<sub>f</sub>) * e<sup>-rt</sup>
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Exponential {
    rate: f32,
    vi: f32,
    vf: f32,
}

impl Exponential {
    pub fn new(rate: f32, vi: f32, vf: f32) -> Result<Self> {
        validate(rate, vi, vf)?;
        Ok(Self { rate, vi, vf })
    }
}

impl Decay for Exponential {
    fn evaluate(&self, t: f32) -> f32 {
        let &Self { rate, vi, vf } = self;
        vf + (vi - vf) * (-rate * t).exp()
    }
}

/// v(t) = max(v<sub>i</sub> - rt, v<sub>f</sub>)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Linear {
    rate: f32,
    vi: f32,
    vf: f32,
}

impl Linear {
    pub fn new(rate: f32, vi: f32, vf: f32) -> Result<Self> {
        validate(rate, vi, vf)?;
        Ok(Self { rate, vi, vf })
    }
}

impl Decay for Linear {
    fn evaluate(&self, t: f32) -> f32 {
        let &Self { rate, vi, vf } = self;
        (vi - rate * t).max(vf)
    }
}
