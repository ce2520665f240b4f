//! Particle simulation for Emitter nodes.
//!
//! Every emitter owns `max_count` particle slots. A dead slot is refilled while
//! the emission budget allows it and the slot has spawns left
//! (`respawn_count`, `-1` for unlimited). Particles move along a random
//! direction inside the spread cone around the emitter's -Z axis and are pushed
//! by the emitter force scaled by their drag.
//!
//! Random values come from the emitter's own seeded generator, so a simulation
//! replays identically for the same seed and time steps.

use arbor_core::{ArborError, BoundingBox, NodeHandle, Result};
use arbor_resources::{Channel, ParticleEffectData, ResourceManager};
use glam::{Affine3A, EulerRot, Quat, Vec3};
use rand::RngExt;

use crate::node::{EmitterData, NodeKind, NodeType};
use crate::scene::Scene;

/// State of one particle slot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Particle {
    /// Remaining life in seconds; dead when `<= 0`.
    pub life: f32,
    pub max_life: f32,
    /// Number of times this slot has been spawned.
    pub spawn_count: u32,
    pub position: Vec3,
    pub direction: Vec3,
    pub rotation: f32,
    pub size: f32,
    pub color: [f32; 4],

    move_vel0: f32,
    rot_vel0: f32,
    size0: f32,
    drag0: f32,
    color0: [f32; 4],
}

impl Particle {
    #[inline]
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.life > 0.0
    }

    /// Normalised age, 0 at birth and 1 at death.
    fn age(&self) -> f32 {
        if self.max_life > 0.0 {
            1.0 - self.life / self.max_life
        } else {
            1.0
        }
    }
}

impl EmitterData {
    fn has_spawns_left(&self, particle: &Particle) -> bool {
        self.respawn_count < 0 || i64::from(particle.spawn_count) < i64::from(self.respawn_count)
    }

    /// Advances the simulation by `dt` seconds.
    pub fn advance(&mut self, effect: &ParticleEffectData, world: &Affine3A, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        if self.particles.len() != self.max_count as usize {
            self.particles.resize(self.max_count as usize, Particle::default());
        }

        self.elapsed += dt;
        let mut budget = 0_u32;
        if self.elapsed >= self.delay {
            self.emission_accum += self.emission_rate * dt;
            budget = self.emission_accum.floor() as u32;
            self.emission_accum -= budget as f32;
        }

        let origin: Vec3 = world.translation.into();
        let half_spread = (self.spread_angle / 2.0).to_radians();

        for i in 0..self.particles.len() {
            let mut p = self.particles[i];

            if !p.is_alive() {
                if budget == 0 || !self.has_spawns_left(&p) {
                    continue;
                }
                budget -= 1;
                self.spawn(&mut p, effect, world, origin, half_spread);
                self.particles[i] = p;
                // Newborn particles start moving next step.
                continue;
            }

            p.life -= dt;
            if !p.is_alive() {
                p.life = 0.0;
                self.particles[i] = p;
                continue;
            }

            let t = p.age();
            let move_vel = effect.move_vel.value_at(p.move_vel0, t);
            let drag = effect.drag.value_at(p.drag0, t);
            p.position += (p.direction * move_vel + self.force * drag) * dt;
            p.rotation += effect.rot_vel.value_at(p.rot_vel0, t) * dt;
            p.size = effect.size.value_at(p.size0, t);
            p.color = [
                effect.col_r.value_at(p.color0[0], t),
                effect.col_g.value_at(p.color0[1], t),
                effect.col_b.value_at(p.color0[2], t),
                effect.col_a.value_at(p.color0[3], t),
            ];
            self.particles[i] = p;
        }
    }

    fn spawn(
        &mut self,
        p: &mut Particle,
        effect: &ParticleEffectData,
        world: &Affine3A,
        origin: Vec3,
        half_spread: f32,
    ) {
        let life = self.random_in(effect.life_min, effect.life_max);
        p.life = life.max(f32::EPSILON);
        p.max_life = p.life;
        p.spawn_count += 1;

        p.move_vel0 = self.sample(&effect.move_vel);
        p.rot_vel0 = self.sample(&effect.rot_vel);
        p.size0 = self.sample(&effect.size);
        p.drag0 = self.sample(&effect.drag);
        p.color0 = [
            self.sample(&effect.col_r),
            self.sample(&effect.col_g),
            self.sample(&effect.col_b),
            self.sample(&effect.col_a),
        ];

        let alpha = self.random_in(-half_spread, half_spread);
        let gamma = self.random_in(-half_spread, half_spread);
        let local_dir = Quat::from_euler(EulerRot::XYZ, alpha, 0.0, gamma) * Vec3::NEG_Z;
        p.direction = world.transform_vector3(local_dir).normalize_or_zero();

        p.position = origin;
        p.rotation = 0.0;
        p.size = p.size0;
        p.color = p.color0;
    }

    fn sample(&mut self, channel: &Channel) -> f32 {
        self.random_in(channel.start_min, channel.start_max)
    }

    /// Uniform value in `[min, max)`. Degenerate or non-finite ranges yield `min`.
    fn random_in(&mut self, min: f32, max: f32) -> f32 {
        let width = max - min;
        if width > 0.0 && width.is_finite() {
            min + width * self.rng.random::<f32>()
        } else {
            min
        }
    }

    /// `true` when no particle is alive and none can be spawned any more.
    #[must_use]
    pub fn has_finished(&self) -> bool {
        if self.respawn_count < 0 {
            return false;
        }
        self.particles
            .iter()
            .all(|p| !p.is_alive() && !self.has_spawns_left(p))
    }

    /// World-space bounds of all living particles, inflated by their size.
    #[must_use]
    pub fn particle_bounds(&self) -> BoundingBox {
        self.particles
            .iter()
            .filter(|p| p.is_alive())
            .fold(BoundingBox::EMPTY, |acc, p| {
                let half = Vec3::splat(p.size.abs() * 0.5);
                acc.union(&BoundingBox::new(p.position - half, p.position + half))
            })
    }

    #[must_use]
    pub fn alive_count(&self) -> usize {
        self.particles.iter().filter(|p| p.is_alive()).count()
    }
}

impl Scene {
    /// Advances the particle simulation of an Emitter by `dt` seconds.
    ///
    /// Emitters whose effect is not loaded do not simulate.
    pub fn advance_emitter_time(&mut self, rm: &ResourceManager, emitter: NodeHandle, dt: f32) -> Result<()> {
        self.expect_type(emitter, NodeType::Emitter)?;
        let node = self.node_mut(emitter)?;
        let world = *node.transform.world_matrix();
        let NodeKind::Emitter(data) = &mut node.kind else {
            return Err(ArborError::InvalidNode(emitter));
        };
        if rm.is_loaded(data.effect)
            && let Some(effect) = rm.particle_effect(data.effect)
        {
            data.advance(effect, &world, dt);
        }
        Ok(())
    }

    pub fn has_emitter_finished(&self, emitter: NodeHandle) -> Result<bool> {
        match &self.expect_type(emitter, NodeType::Emitter)?.kind {
            NodeKind::Emitter(data) => Ok(data.has_finished()),
            _ => Err(ArborError::InvalidNode(emitter)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::ResHandle;

    fn effect() -> ParticleEffectData {
        ParticleEffectData {
            life_min: 1.0,
            life_max: 2.0,
            move_vel: Channel::constant(1.0),
            ..ParticleEffectData::default()
        }
    }

    fn emitter(seed: u64, respawn_count: i32) -> EmitterData {
        let mut e = EmitterData::new(ResHandle::NONE, ResHandle::NONE, 8, respawn_count, seed);
        e.emission_rate = 10.0;
        e.spread_angle = 30.0;
        e
    }

    #[test]
    fn test_same_seed_replays_identically() {
        let mut a = emitter(7, -1);
        let mut b = emitter(7, -1);
        for _ in 0..20 {
            a.advance(&effect(), &Affine3A::IDENTITY, 0.1);
            b.advance(&effect(), &Affine3A::IDENTITY, 0.1);
        }
        assert_eq!(a.particles(), b.particles());
        assert!(a.alive_count() > 0);
    }

    #[test]
    fn test_delay_holds_back_emission() {
        let mut e = emitter(1, -1);
        e.delay = 1.0;
        e.advance(&effect(), &Affine3A::IDENTITY, 0.5);
        assert_eq!(e.alive_count(), 0);
        e.advance(&effect(), &Affine3A::IDENTITY, 0.6);
        assert!(e.alive_count() > 0);
    }

    #[test]
    fn test_finishes_after_single_spawn() {
        let mut e = emitter(3, 1);
        assert!(!e.has_finished());
        for _ in 0..60 {
            e.advance(&effect(), &Affine3A::IDENTITY, 0.1);
        }
        assert!(e.particles().iter().all(|p| p.spawn_count == 1));
        assert!(e.has_finished());

        assert!(!emitter(3, -1).has_finished());
    }

    #[test]
    fn test_unbounded_range_falls_back_to_min() {
        let mut e = emitter(9, -1);
        assert_eq!(e.random_in(-f32::MAX, f32::MAX), -f32::MAX);
        assert_eq!(e.random_in(2.0, 2.0), 2.0);
        let v = e.random_in(1.0, 3.0);
        assert!((1.0..3.0).contains(&v));
    }

    #[test]
    fn test_particles_move_away_from_origin() {
        let mut e = emitter(5, -1);
        e.spread_angle = 0.0;
        e.advance(&effect(), &Affine3A::IDENTITY, 0.1);
        e.advance(&effect(), &Affine3A::IDENTITY, 0.1);
        let p = e.particles().iter().find(|p| p.is_alive()).unwrap();
        assert!(p.position.z < 0.0);
        assert!(p.position.x.abs() < 1e-6);
    }
}
