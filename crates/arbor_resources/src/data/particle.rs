use arbor_core::Result;
use serde::Deserialize;

use super::{Elements, invalid, parse_json};
use crate::params::{PartEffParam, ResElem, ResParam};

/// A particle property that starts at a random value in
/// `[start_min, start_max]` and fades to `start * end_rate` over the particle's
/// life.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Channel {
    pub start_min: f32,
    pub start_max: f32,
    pub end_rate: f32,
}

impl Default for Channel {
    fn default() -> Self {
        Self::constant(0.0)
    }
}

impl Channel {
    #[must_use]
    pub const fn constant(value: f32) -> Self {
        Self {
            start_min: value,
            start_max: value,
            end_rate: 1.0,
        }
    }

    fn unit() -> Self {
        Self::constant(1.0)
    }

    /// Value at normalised age `t` (0 at birth, 1 at death) for the chosen
    /// start value.
    #[must_use]
    pub fn value_at(&self, start: f32, t: f32) -> f32 {
        start * (1.0 + (self.end_rate - 1.0) * t)
    }
}

/// Particle configuration used by Emitter nodes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ParticleEffectData {
    pub life_min: f32,
    pub life_max: f32,
    pub move_vel: Channel,
    pub rot_vel: Channel,
    #[serde(default = "Channel::unit")]
    pub size: Channel,
    #[serde(default = "Channel::unit")]
    pub col_r: Channel,
    #[serde(default = "Channel::unit")]
    pub col_g: Channel,
    #[serde(default = "Channel::unit")]
    pub col_b: Channel,
    #[serde(default = "Channel::unit")]
    pub col_a: Channel,
    #[serde(default = "Channel::unit")]
    pub drag: Channel,
}

impl Default for ParticleEffectData {
    fn default() -> Self {
        Self {
            life_min: 0.0,
            life_max: 0.0,
            move_vel: Channel::default(),
            rot_vel: Channel::default(),
            size: Channel::unit(),
            col_r: Channel::unit(),
            col_g: Channel::unit(),
            col_b: Channel::unit(),
            col_a: Channel::unit(),
            drag: Channel::unit(),
        }
    }
}

impl ParticleEffectData {
    pub(crate) fn parse(name: &str, bytes: &[u8]) -> Result<Self> {
        let mut effect: Self = parse_json(name, bytes)?;
        if effect.life_min < 0.0 || effect.life_max < effect.life_min {
            return Err(invalid(name, "life time range is invalid"));
        }
        for elem in CHANNELS {
            if let Some(ch) = effect.channel_mut(elem)
                && ch.start_max < ch.start_min
            {
                ch.start_max = ch.start_min;
            }
        }
        Ok(effect)
    }

    #[must_use]
    pub fn channel(&self, elem: ResElem) -> Option<&Channel> {
        Some(match elem {
            ResElem::ChanMoveVel => &self.move_vel,
            ResElem::ChanRotVel => &self.rot_vel,
            ResElem::ChanSize => &self.size,
            ResElem::ChanColR => &self.col_r,
            ResElem::ChanColG => &self.col_g,
            ResElem::ChanColB => &self.col_b,
            ResElem::ChanColA => &self.col_a,
            ResElem::ChanDrag => &self.drag,
            _ => return None,
        })
    }

    fn channel_mut(&mut self, elem: ResElem) -> Option<&mut Channel> {
        Some(match elem {
            ResElem::ChanMoveVel => &mut self.move_vel,
            ResElem::ChanRotVel => &mut self.rot_vel,
            ResElem::ChanSize => &mut self.size,
            ResElem::ChanColR => &mut self.col_r,
            ResElem::ChanColG => &mut self.col_g,
            ResElem::ChanColB => &mut self.col_b,
            ResElem::ChanColA => &mut self.col_a,
            ResElem::ChanDrag => &mut self.drag,
            _ => return None,
        })
    }
}

const CHANNELS: [ResElem; 8] = [
    ResElem::ChanMoveVel,
    ResElem::ChanRotVel,
    ResElem::ChanSize,
    ResElem::ChanColR,
    ResElem::ChanColG,
    ResElem::ChanColB,
    ResElem::ChanColA,
    ResElem::ChanDrag,
];

impl Elements for ParticleEffectData {
    fn elem_count(&self, elem: ResElem) -> usize {
        usize::from(elem == ResElem::Particle || elem.is_particle_channel())
    }

    fn get_float(&self, elem: ResElem, _index: usize, param: ResParam, _comp: usize) -> f32 {
        let ResParam::PartEff(param) = param else {
            return 0.0;
        };
        match param {
            PartEffParam::LifeMin => self.life_min,
            PartEffParam::LifeMax => self.life_max,
            PartEffParam::ChanStartMin => self.channel(elem).map_or(0.0, |c| c.start_min),
            PartEffParam::ChanStartMax => self.channel(elem).map_or(0.0, |c| c.start_max),
            PartEffParam::ChanEndRate => self.channel(elem).map_or(0.0, |c| c.end_rate),
        }
    }

    fn set_float(&mut self, elem: ResElem, _index: usize, param: ResParam, _comp: usize, value: f32) {
        let ResParam::PartEff(param) = param else {
            return;
        };
        match param {
            PartEffParam::LifeMin => self.life_min = value,
            PartEffParam::LifeMax => self.life_max = value,
            PartEffParam::ChanStartMin => {
                if let Some(c) = self.channel_mut(elem) {
                    c.start_min = value;
                }
            }
            PartEffParam::ChanStartMax => {
                if let Some(c) = self.channel_mut(elem) {
                    c.start_max = value;
                }
            }
            PartEffParam::ChanEndRate => {
                if let Some(c) = self.channel_mut(elem) {
                    c.end_rate = value;
                }
            }
        }
    }
}
