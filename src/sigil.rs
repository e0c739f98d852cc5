//! Sigil constellations: N points placed around a centre from one field hash.
//!
//! Point indices are stable identifiers. The behavior machine focuses points
//! by index and the activation set stores indices, so generation order must
//! never change for a given seed.

use std::collections::BTreeSet;
use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};

use crate::error::{CompanionError, Result};
use crate::field::Field;

pub const DEFAULT_SIGIL_COUNT: usize = 7;

/// Points that fit in one 64-bit hash before another block is needed.
const POINTS_PER_BLOCK: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigilLayout {
    pub center_x: f64,
    pub center_y: f64,
    pub min_radius: f64,
    pub max_radius: f64,
}

impl Default for SigilLayout {
    fn default() -> Self {
        Self {
            center_x: 200.0,
            center_y: 200.0,
            min_radius: 60.0,
            max_radius: 160.0,
        }
    }
}

impl SigilLayout {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_radius >= 0.0 && self.min_radius <= self.max_radius) {
            return Err(CompanionError::config(format!(
                "sigil radius range {}..{} is invalid",
                self.min_radius, self.max_radius
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SigilPoint {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    pub hash: String,
}

/// Places `count` points from `field.hash(seed)`.
///
/// Point `i` reads an 8-bit angle slice at bit `i*8` and a 4-bit radius slice
/// at bit `i*8 + 4`. The slices overlap by four bits. Points past the eighth
/// read from `field.hash("{seed}#{block}")` for their block.
pub fn generate_sigil_points(
    field: &Field,
    seed: &str,
    count: usize,
    layout: &SigilLayout,
) -> Vec<SigilPoint> {
    let base = field.hash(seed);
    let span = layout.max_radius - layout.min_radius;

    (0..count)
        .map(|i| {
            let block = i / POINTS_PER_BLOCK;
            let h = if block == 0 {
                base
            } else {
                field.hash(&format!("{seed}#{block}"))
            };
            let slot = (i % POINTS_PER_BLOCK) as u32;

            let angle_bits = (h >> (slot * 8)) & 0xFF;
            let radius_bits = (h >> (slot * 8 + 4)) & 0xF;

            let theta = angle_bits as f64 / 256.0 * TAU;
            let r = layout.min_radius + radius_bits as f64 / 15.0 * span;

            SigilPoint {
                index: i,
                x: layout.center_x + r * theta.cos(),
                y: layout.center_y + r * theta.sin(),
                hash: format!("{:016x}", field.hash(&format!("{seed}:{i}"))),
            }
        })
        .collect()
}

/// A generated constellation plus which of its points the user has activated.
#[derive(Clone, Debug, PartialEq)]
pub struct SigilSet {
    points: Vec<SigilPoint>,
    activated: BTreeSet<usize>,
}

impl SigilSet {
    pub fn generate(field: &Field, count: usize, layout: &SigilLayout) -> Self {
        Self {
            points: generate_sigil_points(field, field.name(), count, layout),
            activated: BTreeSet::new(),
        }
    }

    pub fn points(&self) -> &[SigilPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SigilPoint> {
        self.points.get(index)
    }

    pub fn activated(&self) -> &BTreeSet<usize> {
        &self.activated
    }

    pub fn is_activated(&self, index: usize) -> bool {
        self.activated.contains(&index)
    }

    /// Returns `true` only when `index` exists and was not already active.
    pub fn activate(&mut self, index: usize) -> bool {
        index < self.points.len() && self.activated.insert(index)
    }

    pub fn all_activated(&self) -> bool {
        !self.points.is_empty() && self.activated.len() == self.points.len()
    }

    /// Restores activations from storage, dropping indices that no longer exist.
    pub fn restore_activated(&mut self, indices: impl IntoIterator<Item = usize>) {
        let len = self.points.len();
        self.activated = indices.into_iter().filter(|i| *i < len).collect();
    }

    pub fn clear_activated(&mut self) {
        self.activated.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> Field {
        Field::new("Nyx").unwrap()
    }

    #[test]
    fn same_inputs_give_bit_identical_points() {
        let f = field();
        let layout = SigilLayout::default();
        let a = generate_sigil_points(&f, "X", 7, &layout);
        let b = generate_sigil_points(&f, "X", 7, &layout);
        assert_eq!(a.len(), 7);
        for (p, q) in a.iter().zip(&b) {
            assert_eq!(p.x.to_bits(), q.x.to_bits());
            assert_eq!(p.y.to_bits(), q.y.to_bits());
            assert_eq!(p.hash, q.hash);
        }
    }

    #[test]
    fn points_lie_inside_the_radius_band() {
        let f = field();
        let layout = SigilLayout::default();
        for (i, p) in generate_sigil_points(&f, "X", 20, &layout).iter().enumerate() {
            assert_eq!(p.index, i);
            let r = ((p.x - layout.center_x).powi(2) + (p.y - layout.center_y).powi(2)).sqrt();
            assert!(r >= layout.min_radius - 1e-9 && r <= layout.max_radius + 1e-9);
        }
    }

    #[test]
    fn slices_match_the_hash_bits() {
        let f = field();
        let layout = SigilLayout {
            center_x: 0.0,
            center_y: 0.0,
            min_radius: 10.0,
            max_radius: 25.0,
        };
        let h = f.hash("X");
        let pts = generate_sigil_points(&f, "X", 3, &layout);
        let angle = ((h >> 16) & 0xFF) as f64 / 256.0 * TAU;
        let radius = 10.0 + ((h >> 20) & 0xF) as f64;
        assert!((pts[2].x - radius * angle.cos()).abs() < 1e-9);
        assert!((pts[2].y - radius * angle.sin()).abs() < 1e-9);
    }

    #[test]
    fn different_seed_moves_points() {
        let f = field();
        let layout = SigilLayout::default();
        let a = generate_sigil_points(&f, "X", 7, &layout);
        let b = generate_sigil_points(&f, "Y", 7, &layout);
        assert_ne!(a, b);
    }

    #[test]
    fn activation_is_bounded_and_idempotent() {
        let f = field();
        let mut set = SigilSet::generate(&f, 3, &SigilLayout::default());
        assert!(set.activate(1));
        assert!(!set.activate(1));
        assert!(!set.activate(3));
        assert!(set.is_activated(1));
        set.activate(0);
        set.activate(2);
        assert!(set.all_activated());

        set.restore_activated([0, 2, 9]);
        assert_eq!(set.activated().iter().copied().collect::<Vec<_>>(), vec![0, 2]);
        set.clear_activated();
        assert!(set.activated().is_empty());
    }

    #[test]
    fn inverted_layout_is_rejected() {
        let layout = SigilLayout {
            min_radius: 50.0,
            max_radius: 10.0,
            ..Default::default()
        };
        assert!(layout.validate().is_err());
        assert!(SigilLayout::default().validate().is_ok());
    }
}
