//! Autonomous behavior: a timed, probabilistic state machine.
//!
//! The machine holds at most one pending transition. Every state entry clears
//! the slot before arming it again, so two cleanup paths re-entering `idle`
//! can never leave two live timers behind. Time is supplied by the caller in
//! milliseconds; nothing here sleeps or spawns.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CompanionError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiMode {
    Idle,
    Observing,
    Focusing,
    Playing,
    Dreaming,
}

impl AiMode {
    pub const ALL: [AiMode; 5] = [
        AiMode::Idle,
        AiMode::Observing,
        AiMode::Focusing,
        AiMode::Playing,
        AiMode::Dreaming,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AiMode::Idle => "idle",
            AiMode::Observing => "observing",
            AiMode::Focusing => "focusing",
            AiMode::Playing => "playing",
            AiMode::Dreaming => "dreaming",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DurationRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// `min + r * (max - min)` for `r` in [0, 1).
    pub fn sample(&self, r: f64) -> u64 {
        let span = self.max_ms.saturating_sub(self.min_ms) as f64;
        self.min_ms + (r.clamp(0.0, 1.0) * span) as u64
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub idle: DurationRange,
    pub observing: DurationRange,
    pub focusing: DurationRange,
    pub playing: DurationRange,
    pub dreaming: DurationRange,
    pub dream_chance: f64,
    pub observe_chance: f64,
    pub focus_chance: f64,
    /// Dreaming is only considered while energy is below this.
    pub dream_energy_below: f64,
    /// Focusing is only considered while curiosity is above this.
    pub focus_curiosity_above: f64,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            idle: DurationRange::new(3_000, 8_000),
            observing: DurationRange::new(2_000, 5_000),
            focusing: DurationRange::new(1_500, 3_000),
            playing: DurationRange::new(3_000, 6_000),
            dreaming: DurationRange::new(8_000, 15_000),
            dream_chance: 0.15,
            observe_chance: 0.3,
            focus_chance: 0.35,
            dream_energy_below: 30.0,
            focus_curiosity_above: 40.0,
        }
    }
}

impl BehaviorConfig {
    pub fn duration(&self, mode: AiMode) -> DurationRange {
        match mode {
            AiMode::Idle => self.idle,
            AiMode::Observing => self.observing,
            AiMode::Focusing => self.focusing,
            AiMode::Playing => self.playing,
            AiMode::Dreaming => self.dreaming,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for mode in AiMode::ALL {
            let d = self.duration(mode);
            if d.min_ms > d.max_ms {
                return Err(CompanionError::config(format!(
                    "{} duration min {}ms exceeds max {}ms",
                    mode.as_str(),
                    d.min_ms,
                    d.max_ms
                )));
            }
            if d.min_ms == 0 {
                return Err(CompanionError::config(format!(
                    "{} duration must be at least 1ms",
                    mode.as_str()
                )));
            }
        }
        for (name, p) in [
            ("dream_chance", self.dream_chance),
            ("observe_chance", self.observe_chance),
            ("focus_chance", self.focus_chance),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(CompanionError::config(format!(
                    "{name} must be within [0, 1], got {p}"
                )));
            }
        }
        if self.observe_chance + self.focus_chance > 1.0 {
            return Err(CompanionError::config(
                "observe_chance + focus_chance must not exceed 1",
            ));
        }
        Ok(())
    }

    /// Branch taken from `idle` for one draw `r`.
    ///
    /// Thresholds are cumulative on the single draw and checked in the order
    /// dream, observe, focus, stay idle.
    pub fn choose_from_idle(&self, r: f64, inputs: &BehaviorInputs) -> AiMode {
        if inputs.energy < self.dream_energy_below && r < self.dream_chance {
            AiMode::Dreaming
        } else if r < self.observe_chance {
            AiMode::Observing
        } else if inputs.curiosity > self.focus_curiosity_above
            && r < self.focus_chance + self.observe_chance
        {
            AiMode::Focusing
        } else {
            AiMode::Idle
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiState {
    pub mode: AiMode,
    pub focused_sigil: Option<usize>,
    pub since_ms: u64,
}

impl Default for AiState {
    fn default() -> Self {
        Self {
            mode: AiMode::Idle,
            focused_sigil: None,
            since_ms: 0,
        }
    }
}

/// What the machine reads from the companion when a timer fires.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BehaviorInputs {
    pub energy: f64,
    pub curiosity: f64,
    pub sigil_count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BehaviorEvent {
    ModeChanged { from: AiMode, to: AiMode, at_ms: u64 },
    FocusChanged(Option<usize>),
    Play { sigil: Option<usize> },
    DreamComplete { dreams: u64 },
    Whisper(String),
}

const OBSERVE_WHISPERS: [&str; 4] = [
    "I was watching the light move.",
    "Something shifted at the edge of the field.",
    "The sigils hum when you are not looking.",
    "I noticed you noticing me.",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Timer {
    due_ms: u64,
    mode: AiMode,
}

#[derive(Clone, Debug)]
pub struct BehaviorMachine {
    config: BehaviorConfig,
    state: AiState,
    timer: Option<Timer>,
    dreams: u64,
    observations: u64,
}

impl BehaviorMachine {
    pub fn new(config: BehaviorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: AiState::default(),
            timer: None,
            dreams: 0,
            observations: 0,
        })
    }

    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    pub fn state(&self) -> &AiState {
        &self.state
    }

    pub fn mode(&self) -> AiMode {
        self.state.mode
    }

    pub fn dream_count(&self) -> u64 {
        self.dreams
    }

    pub fn set_dream_count(&mut self, dreams: u64) {
        self.dreams = dreams;
    }

    /// Due time of the single pending transition, if one is armed.
    pub fn pending_due_ms(&self) -> Option<u64> {
        self.timer.map(|t| t.due_ms)
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    pub fn cancel(&mut self) {
        self.timer = None;
    }

    /// Enters `idle` and arms the first idle window.
    pub fn start(&mut self, now_ms: u64, rng: &mut impl Rng) -> Vec<BehaviorEvent> {
        let mut events = Vec::new();
        self.enter(AiMode::Idle, now_ms, rng, &mut events);
        events
    }

    /// Cancels whatever is pending, drops any focus and restarts in `idle`.
    pub fn reset(&mut self, now_ms: u64, rng: &mut impl Rng) -> Vec<BehaviorEvent> {
        self.cancel();
        let mut events = Vec::new();
        if self.state.focused_sigil.take().is_some() {
            events.push(BehaviorEvent::FocusChanged(None));
        }
        self.enter(AiMode::Idle, now_ms, rng, &mut events);
        events
    }

    /// Fires every transition due at or before `now_ms`, in due order.
    ///
    /// Each follow-up is scheduled from the due time of the timer that fired,
    /// so a late call replays the same sequence a punctual one would have.
    pub fn advance(
        &mut self,
        now_ms: u64,
        inputs: &BehaviorInputs,
        rng: &mut impl Rng,
    ) -> Vec<BehaviorEvent> {
        let mut events = Vec::new();
        while let Some(timer) = self.timer {
            if timer.due_ms > now_ms {
                break;
            }
            self.timer = None;
            if timer.mode != self.state.mode {
                continue;
            }
            self.fire(timer, inputs, rng, &mut events);
        }
        events
    }

    fn fire(
        &mut self,
        timer: Timer,
        inputs: &BehaviorInputs,
        rng: &mut impl Rng,
        events: &mut Vec<BehaviorEvent>,
    ) {
        let at = timer.due_ms;
        match timer.mode {
            AiMode::Idle => {
                let r: f64 = rng.gen();
                let next = self.config.choose_from_idle(r, inputs);
                self.enter(next, at, rng, events);
            }
            AiMode::Observing => {
                let line = OBSERVE_WHISPERS[(self.observations as usize) % OBSERVE_WHISPERS.len()];
                self.observations += 1;
                events.push(BehaviorEvent::Whisper(line.to_string()));
                self.enter(AiMode::Idle, at, rng, events);
            }
            AiMode::Focusing => {
                let target = if inputs.sigil_count > 0 {
                    Some(rng.gen_range(0..inputs.sigil_count))
                } else {
                    None
                };
                self.state.focused_sigil = target;
                events.push(BehaviorEvent::FocusChanged(target));
                events.push(BehaviorEvent::Play { sigil: target });
                self.enter(AiMode::Playing, at, rng, events);
            }
            AiMode::Playing => {
                if self.state.focused_sigil.take().is_some() {
                    events.push(BehaviorEvent::FocusChanged(None));
                }
                self.enter(AiMode::Idle, at, rng, events);
            }
            AiMode::Dreaming => {
                self.dreams += 1;
                debug!(dreams = self.dreams, "dream complete");
                events.push(BehaviorEvent::DreamComplete {
                    dreams: self.dreams,
                });
                self.enter(AiMode::Idle, at, rng, events);
            }
        }
    }

    fn enter(
        &mut self,
        mode: AiMode,
        now_ms: u64,
        rng: &mut impl Rng,
        events: &mut Vec<BehaviorEvent>,
    ) {
        self.timer = None;

        let from = self.state.mode;
        self.state.mode = mode;
        self.state.since_ms = now_ms;

        let duration = self.config.duration(mode).sample(rng.gen());
        self.timer = Some(Timer {
            due_ms: now_ms.saturating_add(duration),
            mode,
        });

        if from != mode {
            debug!(from = from.as_str(), to = mode.as_str(), at_ms = now_ms, "ai mode");
            events.push(BehaviorEvent::ModeChanged {
                from,
                to: mode,
                at_ms: now_ms,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn inputs(energy: f64, curiosity: f64) -> BehaviorInputs {
        BehaviorInputs {
            energy,
            curiosity,
            sigil_count: 7,
        }
    }

    fn forced(dream: f64, observe: f64, focus: f64) -> BehaviorConfig {
        BehaviorConfig {
            dream_chance: dream,
            observe_chance: observe,
            focus_chance: focus,
            ..Default::default()
        }
    }

    fn fire_next(
        m: &mut BehaviorMachine,
        i: &BehaviorInputs,
        rng: &mut SmallRng,
    ) -> Vec<BehaviorEvent> {
        let due = m.pending_due_ms().expect("machine should be armed");
        m.advance(due, i, rng)
    }

    #[test]
    fn idle_branches_follow_cumulative_order() {
        let cfg = BehaviorConfig::default();
        // dream wins over observe when tired
        assert_eq!(cfg.choose_from_idle(0.05, &inputs(10.0, 90.0)), AiMode::Dreaming);
        // same draw observes when rested
        assert_eq!(cfg.choose_from_idle(0.05, &inputs(80.0, 90.0)), AiMode::Observing);
        // focus band is [observe, observe + focus)
        assert_eq!(cfg.choose_from_idle(0.5, &inputs(80.0, 90.0)), AiMode::Focusing);
        assert_eq!(cfg.choose_from_idle(0.64, &inputs(80.0, 90.0)), AiMode::Focusing);
        assert_eq!(cfg.choose_from_idle(0.66, &inputs(80.0, 90.0)), AiMode::Idle);
        // incurious companions never focus
        assert_eq!(cfg.choose_from_idle(0.5, &inputs(80.0, 40.0)), AiMode::Idle);
        // a tired draw above the dream threshold still observes
        assert_eq!(cfg.choose_from_idle(0.2, &inputs(10.0, 0.0)), AiMode::Observing);
    }

    #[test]
    fn inverted_duration_fails_validation() {
        let cfg = BehaviorConfig {
            playing: DurationRange::new(5_000, 1_000),
            ..Default::default()
        };
        let err = BehaviorMachine::new(cfg).unwrap_err();
        assert!(err.to_string().contains("playing"));
    }

    #[test]
    fn probabilities_are_validated() {
        assert!(forced(1.5, 0.1, 0.1).validate().is_err());
        assert!(forced(0.1, 0.7, 0.5).validate().is_err());
        assert!(forced(0.1, 0.5, 0.5).validate().is_ok());
        let zero = BehaviorConfig {
            idle: DurationRange::new(0, 10),
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn duration_sample_stays_in_range() {
        let d = DurationRange::new(100, 200);
        assert_eq!(d.sample(0.0), 100);
        assert!(d.sample(0.999_999) <= 200);
        assert_eq!(DurationRange::new(50, 50).sample(0.7), 50);
    }

    #[test]
    fn focus_then_play_then_back_to_idle() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut m = BehaviorMachine::new(forced(0.0, 0.0, 1.0)).unwrap();
        let i = inputs(80.0, 90.0);
        m.start(0, &mut rng);

        let ev = fire_next(&mut m, &i, &mut rng);
        assert_eq!(m.mode(), AiMode::Focusing);
        assert!(matches!(
            ev.as_slice(),
            [BehaviorEvent::ModeChanged { from: AiMode::Idle, to: AiMode::Focusing, .. }]
        ));

        let ev = fire_next(&mut m, &i, &mut rng);
        assert_eq!(m.mode(), AiMode::Playing);
        let focus = m.state().focused_sigil.expect("playing should focus a sigil");
        assert!(focus < 7);
        assert!(ev.contains(&BehaviorEvent::FocusChanged(Some(focus))));
        assert!(ev.contains(&BehaviorEvent::Play { sigil: Some(focus) }));

        let ev = fire_next(&mut m, &i, &mut rng);
        assert_eq!(m.mode(), AiMode::Idle);
        assert_eq!(m.state().focused_sigil, None);
        assert!(ev.contains(&BehaviorEvent::FocusChanged(None)));
    }

    #[test]
    fn play_without_sigils_has_no_focus() {
        let mut rng = SmallRng::seed_from_u64(8);
        let mut m = BehaviorMachine::new(forced(0.0, 0.0, 1.0)).unwrap();
        let i = BehaviorInputs {
            energy: 80.0,
            curiosity: 90.0,
            sigil_count: 0,
        };
        m.start(0, &mut rng);
        fire_next(&mut m, &i, &mut rng);
        let ev = fire_next(&mut m, &i, &mut rng);
        assert_eq!(m.mode(), AiMode::Playing);
        assert!(ev.contains(&BehaviorEvent::Play { sigil: None }));
    }

    #[test]
    fn dreams_complete_and_count() {
        let mut rng = SmallRng::seed_from_u64(9);
        let mut m = BehaviorMachine::new(forced(1.0, 0.0, 0.0)).unwrap();
        let tired = inputs(10.0, 0.0);
        m.start(0, &mut rng);
        fire_next(&mut m, &tired, &mut rng);
        assert_eq!(m.mode(), AiMode::Dreaming);
        let ev = fire_next(&mut m, &tired, &mut rng);
        assert_eq!(m.mode(), AiMode::Idle);
        assert!(ev.contains(&BehaviorEvent::DreamComplete { dreams: 1 }));
        assert_eq!(m.dream_count(), 1);
    }

    #[test]
    fn observing_whispers_then_idles() {
        let mut rng = SmallRng::seed_from_u64(10);
        let mut m = BehaviorMachine::new(forced(0.0, 1.0, 0.0)).unwrap();
        let i = inputs(80.0, 10.0);
        m.start(0, &mut rng);
        fire_next(&mut m, &i, &mut rng);
        assert_eq!(m.mode(), AiMode::Observing);
        let ev = fire_next(&mut m, &i, &mut rng);
        assert_eq!(m.mode(), AiMode::Idle);
        assert!(ev.iter().any(|e| matches!(e, BehaviorEvent::Whisper(_))));
    }

    #[test]
    fn idle_self_loop_rearms_without_mode_event() {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut m = BehaviorMachine::new(forced(0.0, 0.0, 0.0)).unwrap();
        let i = inputs(80.0, 90.0);
        m.start(0, &mut rng);
        let first_due = m.pending_due_ms().unwrap();
        let ev = fire_next(&mut m, &i, &mut rng);
        assert!(ev.is_empty());
        assert_eq!(m.mode(), AiMode::Idle);
        assert!(m.pending_due_ms().unwrap() > first_due);
    }

    #[test]
    fn restarting_replaces_the_pending_timer() {
        let mut rng = SmallRng::seed_from_u64(12);
        let mut m = BehaviorMachine::new(BehaviorConfig::default()).unwrap();
        m.start(0, &mut rng);
        m.start(50_000, &mut rng);
        assert!(m.pending_due_ms().unwrap() >= 53_000);
        // nothing fires for the first window any more
        let ev = m.advance(10_000, &inputs(80.0, 90.0), &mut rng);
        assert!(ev.is_empty());
        m.reset(60_000, &mut rng);
        assert!(m.pending_due_ms().unwrap() >= 63_000);
    }

    #[test]
    fn reset_clears_focus() {
        let mut rng = SmallRng::seed_from_u64(13);
        let mut m = BehaviorMachine::new(forced(0.0, 0.0, 1.0)).unwrap();
        let i = inputs(80.0, 90.0);
        m.start(0, &mut rng);
        fire_next(&mut m, &i, &mut rng);
        fire_next(&mut m, &i, &mut rng);
        assert!(m.state().focused_sigil.is_some());
        let now = m.state().since_ms + 1;
        let ev = m.reset(now, &mut rng);
        assert_eq!(m.mode(), AiMode::Idle);
        assert_eq!(m.state().focused_sigil, None);
        assert!(ev.contains(&BehaviorEvent::FocusChanged(None)));
    }

    #[test]
    fn cancelled_machine_does_nothing() {
        let mut rng = SmallRng::seed_from_u64(14);
        let mut m = BehaviorMachine::new(BehaviorConfig::default()).unwrap();
        m.start(0, &mut rng);
        m.cancel();
        assert!(!m.is_armed());
        assert!(m.advance(u64::MAX, &inputs(10.0, 90.0), &mut rng).is_empty());
    }

    #[test]
    fn a_thousand_firings_always_return_to_idle() {
        let mut rng = SmallRng::seed_from_u64(0xC0FFEE);
        let mut m = BehaviorMachine::new(BehaviorConfig::default()).unwrap();
        m.start(0, &mut rng);

        let mut away_from_idle = 0;
        let mut visited = std::collections::BTreeSet::new();
        for step in 0..1000u32 {
            // alternate tired/rested so every branch gets exercised
            let energy = if step % 3 == 0 { 10.0 } else { 80.0 };
            let i = inputs(energy, 90.0);
            fire_next(&mut m, &i, &mut rng);
            assert!(m.is_armed());
            visited.insert(m.mode());

            if m.mode() == AiMode::Idle {
                away_from_idle = 0;
            } else {
                away_from_idle += 1;
                // focusing -> playing -> idle is the longest excursion
                assert!(away_from_idle <= 2, "stuck in {:?}", m.mode());
            }
            if m.mode() != AiMode::Playing {
                assert_eq!(m.state().focused_sigil, None);
            }
        }
        assert_eq!(visited.len(), AiMode::ALL.len());
    }

    #[test]
    fn late_advance_replays_every_due_transition() {
        let cfg = BehaviorConfig::default();
        let i = inputs(20.0, 90.0);

        let mut rng_a = SmallRng::seed_from_u64(99);
        let mut punctual = BehaviorMachine::new(cfg.clone()).unwrap();
        punctual.start(0, &mut rng_a);
        let mut stepwise = Vec::new();
        while punctual.pending_due_ms().unwrap() <= 120_000 {
            stepwise.extend(fire_next(&mut punctual, &i, &mut rng_a));
        }

        let mut rng_b = SmallRng::seed_from_u64(99);
        let mut late = BehaviorMachine::new(cfg).unwrap();
        late.start(0, &mut rng_b);
        let batched = late.advance(120_000, &i, &mut rng_b);

        assert_eq!(stepwise, batched);
        assert_eq!(punctual.state(), late.state());
    }
}
