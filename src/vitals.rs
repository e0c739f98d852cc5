use serde::{Deserialize, Serialize};

pub const VITAL_MIN: f64 = 0.0;
pub const VITAL_MAX: f64 = 100.0;

fn clamp_vital(v: f64) -> f64 {
    if v.is_nan() {
        return VITAL_MIN;
    }
    v.clamp(VITAL_MIN, VITAL_MAX)
}

/// Every persisted meter, each in [0, 100].
///
/// `energy, curiosity, bond, health` feed the genome; `mood, energy, hunger,
/// hygiene` feed the emotion cascade. High `hunger` means hungry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vitals {
    pub energy: f64,
    pub curiosity: f64,
    pub bond: f64,
    pub health: f64,
    pub mood: f64,
    pub hunger: f64,
    pub hygiene: f64,
}

impl Default for Vitals {
    fn default() -> Self {
        Self {
            energy: 70.0,
            curiosity: 60.0,
            bond: 30.0,
            health: 90.0,
            mood: 65.0,
            hunger: 30.0,
            hygiene: 85.0,
        }
    }
}

/// Additive change to [`Vitals`]. Unset fields are zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitalsDelta {
    pub energy: f64,
    pub curiosity: f64,
    pub bond: f64,
    pub health: f64,
    pub mood: f64,
    pub hunger: f64,
    pub hygiene: f64,
}

impl VitalsDelta {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub fn scaled(&self, k: f64) -> Self {
        Self {
            energy: self.energy * k,
            curiosity: self.curiosity * k,
            bond: self.bond * k,
            health: self.health * k,
            mood: self.mood * k,
            hunger: self.hunger * k,
            hygiene: self.hygiene * k,
        }
    }
}

impl Vitals {
    /// The only mutation path: add `delta` and clamp every meter.
    pub fn apply(&mut self, delta: &VitalsDelta) {
        self.energy = clamp_vital(self.energy + delta.energy);
        self.curiosity = clamp_vital(self.curiosity + delta.curiosity);
        self.bond = clamp_vital(self.bond + delta.bond);
        self.health = clamp_vital(self.health + delta.health);
        self.mood = clamp_vital(self.mood + delta.mood);
        self.hunger = clamp_vital(self.hunger + delta.hunger);
        self.hygiene = clamp_vital(self.hygiene + delta.hygiene);
    }

    /// Re-clamps values that came from outside, e.g. an old save file.
    pub fn clamped(mut self) -> Self {
        self.apply(&VitalsDelta::default());
        self
    }
}
