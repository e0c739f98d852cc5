//! Trinity classification of a genome, and breeding two genomes into one.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::genome::Genome;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrinityAspect {
    /// red60
    Sun,
    /// blue60
    Shadow,
    /// black60
    Void,
}

impl TrinityAspect {
    pub fn value_in(self, genome: &Genome) -> f64 {
        match self {
            TrinityAspect::Sun => genome.red60,
            TrinityAspect::Shadow => genome.blue60,
            TrinityAspect::Void => genome.black60,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionTrait {
    Chaotic,
    Balanced,
    Cosmic,
    Radiant,
    Umbral,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvolutionState {
    pub primary_aspect: TrinityAspect,
    pub secondary_aspect: Option<TrinityAspect>,
    pub evolution_trait: EvolutionTrait,
    pub power: u8,
    pub mutations: Vec<String>,
}

impl EvolutionState {
    pub fn from_genome(genome: &Genome) -> Self {
        let primary_aspect = calculate_trinity_aspect(genome);
        let secondary_aspect = calculate_secondary_aspect(genome, primary_aspect);
        Self {
            primary_aspect,
            secondary_aspect,
            evolution_trait: calculate_evolution_trait(genome, primary_aspect, secondary_aspect),
            power: calculate_evolution_power(genome),
            mutations: generate_mutations(genome),
        }
    }
}

/// First aspect whose value is `>=` both others, checked sun, shadow, void.
pub fn calculate_trinity_aspect(genome: &Genome) -> TrinityAspect {
    let Genome {
        red60,
        blue60,
        black60,
    } = *genome;
    if red60 >= blue60.max(black60) {
        TrinityAspect::Sun
    } else if blue60 >= red60.max(black60) {
        TrinityAspect::Shadow
    } else {
        TrinityAspect::Void
    }
}

/// The runner-up qualifies when it reaches 80% of the primary.
pub fn calculate_secondary_aspect(
    genome: &Genome,
    primary: TrinityAspect,
) -> Option<TrinityAspect> {
    let others: [TrinityAspect; 2] = match primary {
        TrinityAspect::Sun => [TrinityAspect::Shadow, TrinityAspect::Void],
        TrinityAspect::Shadow => [TrinityAspect::Sun, TrinityAspect::Void],
        TrinityAspect::Void => [TrinityAspect::Sun, TrinityAspect::Shadow],
    };
    let runner_up = if others[0].value_in(genome) >= others[1].value_in(genome) {
        others[0]
    } else {
        others[1]
    };
    if runner_up.value_in(genome) >= primary.value_in(genome) * 0.8 {
        Some(runner_up)
    } else {
        None
    }
}

/// Largest absolute deviation of the three axes from their mean.
pub fn genome_spread(genome: &Genome) -> f64 {
    let mean = genome.mean();
    genome
        .values()
        .iter()
        .map(|v| (v - mean).abs())
        .fold(0.0, f64::max)
}

pub fn calculate_evolution_trait(
    genome: &Genome,
    primary: TrinityAspect,
    secondary: Option<TrinityAspect>,
) -> EvolutionTrait {
    let spread = genome_spread(genome);
    if spread > 30.0 {
        EvolutionTrait::Chaotic
    } else if spread < 15.0 {
        EvolutionTrait::Balanced
    } else if secondary.is_some() {
        EvolutionTrait::Cosmic
    } else {
        match primary {
            TrinityAspect::Sun => EvolutionTrait::Radiant,
            TrinityAspect::Shadow => EvolutionTrait::Umbral,
            TrinityAspect::Void => EvolutionTrait::Cosmic,
        }
    }
}

pub fn calculate_evolution_power(genome: &Genome) -> u8 {
    let p = (0.6 * genome.mean() + 0.4 * genome.max()).round();
    p.clamp(0.0, 100.0) as u8
}

pub fn generate_mutations(genome: &Genome) -> Vec<String> {
    let Genome {
        red60,
        blue60,
        black60,
    } = *genome;
    let rules: [(bool, &str); 9] = [
        (red60 > 90.0, "solar_flare"),
        (red60 < 10.0, "dim_core"),
        (blue60 > 90.0, "crystal_lattice"),
        (blue60 < 10.0, "fluid_form"),
        (black60 > 90.0, "event_horizon"),
        (black60 < 10.0, "clear_sight"),
        (red60 > 85.0 && blue60 > 85.0, "eclipse_born"),
        (blue60 > 85.0 && black60 > 85.0, "abyssal_mirror"),
        (red60 > 85.0 && black60 > 85.0, "twilight_ember"),
    ];
    rules
        .iter()
        .filter(|(hit, _)| *hit)
        .map(|(_, name)| name.to_string())
        .collect()
}

pub const MUTATION_SPREAD: f64 = 30.0;
pub const RARE_BOOST_CHANCE: f64 = 0.05;
pub const RARE_BOOST: f64 = 10.0;

/// Averages two parents per axis and adds uniform noise of ±15.
///
/// Exactly four values are drawn from `rng`, in this order: red, blue and
/// black noise, then the rare-boost check. The boost raises the axis holding
/// the highest single value across both parents by 10.
pub fn breed_genomes(a: &Genome, b: &Genome, rng: &mut impl Rng) -> Genome {
    let mut mutate = |x: f64, y: f64| {
        let r: f64 = rng.gen();
        ((x + y) / 2.0 + (r - 0.5) * MUTATION_SPREAD).clamp(0.0, 100.0)
    };
    let mut child = Genome {
        red60: mutate(a.red60, b.red60),
        blue60: mutate(a.blue60, b.blue60),
        black60: mutate(a.black60, b.black60),
    };

    let boost: f64 = rng.gen();
    if boost < RARE_BOOST_CHANCE {
        let dominant = dominant_aspect(a, b);
        let axis = match dominant {
            TrinityAspect::Sun => &mut child.red60,
            TrinityAspect::Shadow => &mut child.blue60,
            TrinityAspect::Void => &mut child.black60,
        };
        *axis = (*axis + RARE_BOOST).min(100.0);
    }
    child
}

fn dominant_aspect(a: &Genome, b: &Genome) -> TrinityAspect {
    let best = |g: &Genome| {
        let aspect = calculate_trinity_aspect(g);
        (aspect, aspect.value_in(g))
    };
    let (aa, av) = best(a);
    let (ba, bv) = best(b);
    if av >= bv {
        aa
    } else {
        ba
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Offspring {
    pub name: String,
    pub genome: Genome,
    pub parents: [String; 2],
    pub birth_date: DateTime<Utc>,
}

impl Offspring {
    pub fn evolution(&self) -> EvolutionState {
        EvolutionState::from_genome(&self.genome)
    }
}

/// First half of `a` joined to the second half of `b`, by characters.
pub fn splice_names(a: &str, b: &str) -> String {
    let a_chars: Vec<char> = a.trim().chars().collect();
    let b_chars: Vec<char> = b.trim().chars().collect();
    let head = a_chars.len().div_ceil(2);
    let tail = b_chars.len() / 2;
    a_chars[..head]
        .iter()
        .chain(b_chars[tail..].iter())
        .collect()
}
