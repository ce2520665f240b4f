use glam::{Affine3A, Vec3};

/// Axis-aligned bounding box.
///
/// An empty box has `min > max` on every axis so that `union` with any other
/// box yields the other box unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BoundingBox {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |bb, p| Self {
            min: bb.min.min(*p),
            max: bb.max.max(*p),
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    #[must_use]
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Grows the box by `amount` on every side.
    #[must_use]
    pub fn inflate(&self, amount: f32) -> Self {
        if self.is_empty() {
            return *self;
        }
        Self {
            min: self.min - Vec3::splat(amount),
            max: self.max + Vec3::splat(amount),
        }
    }

    /// Transforms all eight corners and returns their bounds.
    #[must_use]
    pub fn transform(&self, matrix: &Affine3A) -> Self {
        if self.is_empty() {
            return *self;
        }
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];

        let mut new_min = Vec3::splat(f32::INFINITY);
        let mut new_max = Vec3::splat(f32::NEG_INFINITY);

        for point in corners {
            let transformed = matrix.transform_point3(point);
            new_min = new_min.min(transformed);
            new_max = new_max.max(transformed);
        }

        Self { min: new_min, max: new_max }
    }

    #[must_use]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Slab test against the segment `origin + t * dir`, `t` in `[0, 1]`.
    ///
    /// Returns the entry parameter (0 when the origin is inside).
    #[must_use]
    pub fn intersect_segment(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        if self.is_empty() {
            return None;
        }
        let inv_dir = Vec3::new(
            if dir.x != 0.0 { 1.0 / dir.x } else { f32::INFINITY },
            if dir.y != 0.0 { 1.0 / dir.y } else { f32::INFINITY },
            if dir.z != 0.0 { 1.0 / dir.z } else { f32::INFINITY },
        );

        let t1 = (self.min - origin) * inv_dir;
        let t2 = (self.max - origin) * inv_dir;
        // 0 * inf produces NaN for axis-parallel rays starting on a slab boundary.
        let t_lo = t1.min(t2);
        let t_hi = t1.max(t2);
        let tmin = nan_to(t_lo.x, f32::NEG_INFINITY)
            .max(nan_to(t_lo.y, f32::NEG_INFINITY))
            .max(nan_to(t_lo.z, f32::NEG_INFINITY));
        let tmax = nan_to(t_hi.x, f32::INFINITY)
            .min(nan_to(t_hi.y, f32::INFINITY))
            .min(nan_to(t_hi.z, f32::INFINITY));

        if tmax >= tmin && tmax >= 0.0 && tmin <= 1.0 {
            Some(tmin.max(0.0))
        } else {
            None
        }
    }
}

#[inline]
fn nan_to(v: f32, fallback: f32) -> f32 {
    if v.is_nan() { fallback } else { v }
}

/// Möller–Trumbore ray/triangle test.
///
/// Returns the ray parameter `t` of the hit (unbounded above; callers clamp it to
/// their segment length). Back faces are hit as well.
#[must_use]
pub fn intersect_triangle(origin: Vec3, dir: Vec3, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<f32> {
    const EPS: f32 = 1e-7;
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let pvec = dir.cross(edge2);
    let det = edge1.dot(pvec);
    if det.abs() < EPS {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = origin - v0;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(edge1);
    let v = dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(qvec) * inv_det;
    (t >= 0.0).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_union_is_identity() {
        let bb = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(BoundingBox::EMPTY.union(&bb), bb);
        assert!(BoundingBox::EMPTY.is_empty());
        assert!(BoundingBox::EMPTY.transform(&Affine3A::IDENTITY).is_empty());
    }

    #[test]
    fn test_segment_hits_box_within_length() {
        let bb = BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let t = bb.intersect_segment(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -10.0));
        assert!((t.unwrap() - 0.4).abs() < 1e-6);

        // Too short to reach the box.
        assert!(bb.intersect_segment(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -2.0)).is_none());
    }

    #[test]
    fn test_triangle_hit_and_miss() {
        let (a, b, c) = (Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, -1.0, 0.0), Vec3::new(0.0, 1.0, 0.0));
        let t = intersect_triangle(Vec3::new(0.0, 0.0, 2.0), Vec3::NEG_Z, a, b, c);
        assert!((t.unwrap() - 2.0).abs() < 1e-6);
        assert!(intersect_triangle(Vec3::new(3.0, 0.0, 2.0), Vec3::NEG_Z, a, b, c).is_none());
    }
}
