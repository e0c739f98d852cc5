use serde::{Deserialize, Serialize};

use crate::field::Field;
use crate::vitals::Vitals;

/// Number of leading cells of `pulse`/`ring` that feed the genome.
pub const GENOME_WINDOW: usize = 20;

/// The three genome axes, each in [0, 100].
///
/// `red60` is spine energy, `blue60` form integrity, `black60` the mystery
/// halo.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    pub red60: f64,
    pub blue60: f64,
    pub black60: f64,
}

impl Genome {
    pub fn new(red60: f64, blue60: f64, black60: f64) -> Self {
        Self {
            red60: red60.clamp(0.0, 100.0),
            blue60: blue60.clamp(0.0, 100.0),
            black60: black60.clamp(0.0, 100.0),
        }
    }

    /// Projects the field's digit sums and the current vitals into a genome.
    ///
    /// NOTE: each axis wraps with `% 100` before the `min(100, _)` clamp, so
    /// the clamp never bites and the response jumps back towards zero whenever
    /// the weighted sum crosses a multiple of 100. Kept as-is until the
    /// wrapping is confirmed as intended or not.
    pub fn derive(field: &Field, vitals: &Vitals) -> Self {
        let pulse_sum: f64 = field.pulse()[..GENOME_WINDOW]
            .iter()
            .map(|d| f64::from(*d))
            .sum();
        let ring_sum: f64 = field.ring()[..GENOME_WINDOW]
            .iter()
            .map(|d| f64::from(*d))
            .sum();

        let red60 = ((pulse_sum * 1.2 + vitals.energy * 0.7 + (100.0 - vitals.health) * 0.3)
            % 100.0)
            .min(100.0);
        let blue60 =
            ((ring_sum * 1.1 + vitals.curiosity * 0.6 + vitals.bond * 0.5) % 100.0).min(100.0);
        let black60 = (((pulse_sum + ring_sum) * 0.8 + vitals.energy * 0.4 + vitals.bond * 0.6)
            % 100.0)
            .min(100.0);

        Self {
            red60,
            blue60,
            black60,
        }
    }

    pub fn values(&self) -> [f64; 3] {
        [self.red60, self.blue60, self.black60]
    }

    pub fn mean(&self) -> f64 {
        (self.red60 + self.blue60 + self.black60) / 3.0
    }

    pub fn max(&self) -> f64 {
        self.red60.max(self.blue60).max(self.black60)
    }
}
