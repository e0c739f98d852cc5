//! Direct-manipulation reactions and their combo detection.
//!
//! Each handler returns a [`Response`]: what the companion shows, the vitals
//! change to apply, and the action name to remember. The tracker only keeps
//! the timestamps combo detection needs.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::vitals::VitalsDelta;

pub const POKE_COMBO_WINDOW_MS: u64 = 500;
pub const POKE_COMBO_COUNT: usize = 3;
pub const SHAKE_WINDOW_MS: u64 = 300;
pub const SHAKE_DIZZY_INTENSITY: f64 = 0.7;
pub const FAST_DRAG_VELOCITY: f64 = 1_500.0;
pub const LONG_HOLD_MS: u64 = 2_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Poke,
    Tickle,
    Purr,
    Glide,
    Dizzy,
    Wobble,
    Surprised,
    Relieved,
    Bounce,
    Giggle,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub kind: ReactionKind,
    /// In [0, 1].
    pub intensity: f64,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub reaction: Reaction,
    pub delta: VitalsDelta,
    pub action: &'static str,
}

impl Response {
    fn new(
        kind: ReactionKind,
        intensity: f64,
        message: &str,
        delta: VitalsDelta,
        action: &'static str,
    ) -> Self {
        Self {
            reaction: Reaction {
                kind,
                intensity: intensity.clamp(0.0, 1.0),
                message: message.to_string(),
            },
            delta,
            action,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct InteractionTracker {
    pokes: VecDeque<u64>,
    last_shake_ms: Option<u64>,
    grabbed_at_ms: Option<u64>,
}

impl InteractionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Three pokes inside 500ms turn into a tickle.
    pub fn poke(&mut self, now_ms: u64) -> Response {
        while let Some(&first) = self.pokes.front() {
            if now_ms.saturating_sub(first) > POKE_COMBO_WINDOW_MS {
                self.pokes.pop_front();
            } else {
                break;
            }
        }
        self.pokes.push_back(now_ms);

        if self.pokes.len() >= POKE_COMBO_COUNT {
            self.pokes.clear();
            return Response::new(
                ReactionKind::Tickle,
                0.8,
                "Hee! That tickles!",
                VitalsDelta {
                    mood: 8.0,
                    energy: -2.0,
                    bond: 1.0,
                    ..Default::default()
                },
                "tickle",
            );
        }

        Response::new(
            ReactionKind::Poke,
            0.3,
            "Hm?",
            VitalsDelta {
                curiosity: 2.0,
                mood: -1.0,
                ..Default::default()
            },
            "poke",
        )
    }

    pub fn pet(&mut self) -> Response {
        Response::new(
            ReactionKind::Purr,
            0.5,
            "*hums softly*",
            VitalsDelta {
                mood: 5.0,
                bond: 3.0,
                ..Default::default()
            },
            "pet",
        )
    }

    pub fn drag(&mut self, velocity: f64) -> Response {
        let speed = velocity.abs();
        let intensity = speed / (FAST_DRAG_VELOCITY * 2.0);
        if speed > FAST_DRAG_VELOCITY {
            Response::new(
                ReactionKind::Dizzy,
                intensity,
                "Too fast, too fast!",
                VitalsDelta {
                    mood: -3.0,
                    energy: -1.0,
                    ..Default::default()
                },
                "drag",
            )
        } else {
            Response::new(
                ReactionKind::Glide,
                intensity,
                "Wheee...",
                VitalsDelta {
                    curiosity: 2.0,
                    mood: 1.0,
                    ..Default::default()
                },
                "drag",
            )
        }
    }

    /// A strong shake, or two shakes within 300ms, makes it dizzy.
    pub fn shake(&mut self, intensity: f64, now_ms: u64) -> Response {
        let sustained = self
            .last_shake_ms
            .map(|t| now_ms.saturating_sub(t) <= SHAKE_WINDOW_MS)
            .unwrap_or(false);
        self.last_shake_ms = Some(now_ms);

        if sustained || intensity > SHAKE_DIZZY_INTENSITY {
            Response::new(
                ReactionKind::Dizzy,
                intensity.max(SHAKE_DIZZY_INTENSITY),
                "The world is spinning...",
                VitalsDelta {
                    mood: -5.0,
                    energy: -3.0,
                    ..Default::default()
                },
                "shake",
            )
        } else {
            Response::new(
                ReactionKind::Wobble,
                intensity,
                "Whoa!",
                VitalsDelta {
                    curiosity: 1.0,
                    ..Default::default()
                },
                "shake",
            )
        }
    }

    pub fn grab(&mut self, now_ms: u64) -> Response {
        self.grabbed_at_ms = Some(now_ms);
        Response::new(
            ReactionKind::Surprised,
            0.4,
            "Oh! Up we go.",
            VitalsDelta {
                curiosity: 1.0,
                ..Default::default()
            },
            "grab",
        )
    }

    /// Releasing after a long hold is a relief; a quick release is a bounce.
    pub fn release(&mut self, now_ms: u64) -> Response {
        let held = self
            .grabbed_at_ms
            .take()
            .map(|t| now_ms.saturating_sub(t))
            .unwrap_or(0);
        if held > LONG_HOLD_MS {
            Response::new(
                ReactionKind::Relieved,
                0.4,
                "Solid ground again.",
                VitalsDelta {
                    bond: 1.0,
                    ..Default::default()
                },
                "release",
            )
        } else {
            Response::new(
                ReactionKind::Bounce,
                0.3,
                "Boing!",
                VitalsDelta {
                    mood: 2.0,
                    ..Default::default()
                },
                "release",
            )
        }
    }

    pub fn tickle(&mut self) -> Response {
        Response::new(
            ReactionKind::Giggle,
            0.7,
            "Hahaha, stop!",
            VitalsDelta {
                mood: 6.0,
                energy: -2.0,
                ..Default::default()
            },
            "tickle",
        )
    }

    pub fn is_held(&self) -> bool {
        self.grabbed_at_ms.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_quick_pokes_become_a_tickle() {
        let mut t = InteractionTracker::new();
        assert_eq!(t.poke(1_000).reaction.kind, ReactionKind::Poke);
        assert_eq!(t.poke(1_200).reaction.kind, ReactionKind::Poke);
        let r = t.poke(1_400);
        assert_eq!(r.reaction.kind, ReactionKind::Tickle);
        assert_eq!(r.action, "tickle");
        // combo resets
        assert_eq!(t.poke(1_450).reaction.kind, ReactionKind::Poke);
    }

    #[test]
    fn slow_pokes_never_combo() {
        let mut t = InteractionTracker::new();
        for i in 0..10 {
            assert_eq!(t.poke(i * 600).reaction.kind, ReactionKind::Poke);
        }
    }

    #[test]
    fn poke_window_is_inclusive_of_500ms() {
        let mut t = InteractionTracker::new();
        t.poke(0);
        t.poke(250);
        assert_eq!(t.poke(500).reaction.kind, ReactionKind::Tickle);
    }

    #[test]
    fn rapid_shakes_make_it_dizzy() {
        let mut t = InteractionTracker::new();
        assert_eq!(t.shake(0.3, 0).reaction.kind, ReactionKind::Wobble);
        assert_eq!(t.shake(0.3, 250).reaction.kind, ReactionKind::Dizzy);
        assert_eq!(t.shake(0.3, 1_000).reaction.kind, ReactionKind::Wobble);
        assert_eq!(t.shake(0.9, 5_000).reaction.kind, ReactionKind::Dizzy);
    }

    #[test]
    fn drag_speed_picks_reaction() {
        let mut t = InteractionTracker::new();
        let slow = t.drag(300.0);
        assert_eq!(slow.reaction.kind, ReactionKind::Glide);
        assert!((slow.reaction.intensity - 0.1).abs() < 1e-12);
        let fast = t.drag(-9_000.0);
        assert_eq!(fast.reaction.kind, ReactionKind::Dizzy);
        assert_eq!(fast.reaction.intensity, 1.0);
    }

    #[test]
    fn hold_duration_changes_release() {
        let mut t = InteractionTracker::new();
        t.grab(0);
        assert!(t.is_held());
        assert_eq!(t.release(3_000).reaction.kind, ReactionKind::Relieved);
        assert!(!t.is_held());
        t.grab(4_000);
        assert_eq!(t.release(4_100).reaction.kind, ReactionKind::Bounce);
        // release without grab is a plain bounce
        assert_eq!(t.release(9_000).reaction.kind, ReactionKind::Bounce);
    }

    #[test]
    fn pet_and_tickle_raise_mood() {
        let mut t = InteractionTracker::new();
        assert!(t.pet().delta.mood > 0.0);
        assert!(t.tickle().delta.mood > 0.0);
    }
}
