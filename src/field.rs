//! The seeded generative field behind one named companion.
//!
//! A [`Field`] is built from three fixed 60-digit constants plus the
//! companion's name. It owns the derived `pulse` and `ring` digit sequences,
//! a shared xorshift128+ cursor, and a stateless positional hash. Subsystems
//! that need reproducible randomness independent of call order should take a
//! [`SubStream`] from [`Field::stream`] instead of drawing from the shared
//! cursor.

use std::fmt::Write as _;

use num_bigint::BigUint;
use rand::RngCore;
use tracing::debug;

use crate::error::{CompanionError, Result};
use crate::math::{self, mix64, truncate64};

pub const SEQUENCE_LEN: usize = 60;

pub const RED_CONSTANT: &str = "314159265358979323846264338327950288419716939937510582097494";
pub const BLUE_CONSTANT: &str = "271828182845904523536028747135266249775724709369995957496696";
pub const BLACK_CONSTANT: &str = "161803398874989484820458683436563811772030917980576286213544";

/// Xored into the seed word before mixing the second state word.
const STATE_SALT: u64 = 0x9E37_79B9_7F4A_7C15;
/// Replaces an all-zero xorshift state, which would be a fixed point.
const FALLBACK_STATE: u64 = 0x5EED_DEAD_BEEF_CAFE;

pub type Digits = [u8; SEQUENCE_LEN];

/// The three parsed digit constants shared by every field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constants {
    red: Digits,
    blue: Digits,
    black: Digits,
    interleaved: String,
}

impl Constants {
    pub fn parse(red: &str, blue: &str, black: &str) -> Result<Self> {
        let red_digits = parse_digits("red", red)?;
        let blue_digits = parse_digits("blue", blue)?;
        let black_digits = parse_digits("black", black)?;

        let mut interleaved = String::with_capacity(SEQUENCE_LEN * 3);
        for ((r, b), k) in red.chars().zip(blue.chars()).zip(black.chars()) {
            interleaved.push(r);
            interleaved.push(b);
            interleaved.push(k);
        }

        Ok(Self {
            red: red_digits,
            blue: blue_digits,
            black: black_digits,
            interleaved,
        })
    }

    pub fn builtin() -> Result<Self> {
        Self::parse(RED_CONSTANT, BLUE_CONSTANT, BLACK_CONSTANT)
    }

    pub fn red(&self) -> &Digits {
        &self.red
    }

    pub fn blue(&self) -> &Digits {
        &self.blue
    }

    pub fn black(&self) -> &Digits {
        &self.black
    }
}

fn parse_digits(name: &'static str, s: &str) -> Result<Digits> {
    let mut out = [0u8; SEQUENCE_LEN];
    let mut count = 0usize;
    for (position, ch) in s.chars().enumerate() {
        let d = ch
            .to_digit(10)
            .ok_or(CompanionError::InvalidDigit { name, ch, position })?;
        if position < SEQUENCE_LEN {
            out[position] = d as u8;
        }
        count += 1;
    }
    if count != SEQUENCE_LEN {
        return Err(CompanionError::ConstantLength {
            name,
            found: count,
            expected: SEQUENCE_LEN,
        });
    }
    Ok(out)
}

/// Packs an arbitrary string into hex with a base-31 rolling accumulator,
/// emitting the accumulator every eight characters (and once more for a
/// trailing partial chunk).
fn pack_hex(s: &str) -> String {
    let mut acc: u32 = 0;
    let mut out = String::new();
    let mut pending = false;
    for (i, ch) in s.chars().enumerate() {
        acc = acc.wrapping_mul(31).wrapping_add(ch as u32);
        pending = true;
        if i % 8 == 7 {
            let _ = write!(out, "{acc:08x}");
            pending = false;
        }
    }
    if pending || out.is_empty() {
        let _ = write!(out, "{acc:08x}");
    }
    out
}

/// xorshift128+ generator. This is the field's shared cursor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Xorshift128Plus {
    s0: u64,
    s1: u64,
}

impl Xorshift128Plus {
    pub fn from_words(s0: u64, s1: u64) -> Self {
        if s0 == 0 && s1 == 0 {
            return Self {
                s0: FALLBACK_STATE,
                s1: mix64(FALLBACK_STATE),
            };
        }
        Self { s0, s1 }
    }

    fn step(&mut self) -> u64 {
        let mut x = self.s0;
        let y = self.s1;
        self.s0 = y;
        x ^= x << 23;
        self.s1 = x ^ y ^ (x >> 17) ^ (y >> 26);
        self.s1.wrapping_add(y)
    }

    /// Next value in [0, 1), from the top 53 bits of the 64-bit sum.
    pub fn next_f64(&mut self) -> f64 {
        unit_f64(self.step())
    }
}

impl RngCore for Xorshift128Plus {
    fn next_u32(&mut self) -> u32 {
        (self.step() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.step()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        fill_from_words(dest, || self.step());
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Counter-based generator: the n-th output is `hash(label + n)`.
///
/// Its sequence depends only on the field seed, the label and how many values
/// this stream itself has produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubStream {
    seed: u64,
    label: String,
    counter: u64,
}

impl SubStream {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    fn draw(&mut self) -> u64 {
        let v = hash_with_seed(self.seed, &format!("{}{}", self.label, self.counter));
        self.counter = self.counter.wrapping_add(1);
        v
    }
}

impl RngCore for SubStream {
    fn next_u32(&mut self) -> u32 {
        (self.draw() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.draw()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        fill_from_words(dest, || self.draw());
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

fn fill_from_words(dest: &mut [u8], mut next: impl FnMut() -> u64) {
    for chunk in dest.chunks_mut(8) {
        let bytes = next().to_le_bytes();
        chunk.copy_from_slice(&bytes[..chunk.len()]);
    }
}

fn unit_f64(x: u64) -> f64 {
    (x >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
}

/// Positional hash of `msg` starting from `seed`. Integer-only.
pub fn hash_with_seed(seed: u64, msg: &str) -> u64 {
    let mut h = mix64(seed ^ STATE_SALT);
    let mut len = 0u64;
    for (i, ch) in msg.chars().enumerate() {
        let weight = (i as u64).wrapping_add(1);
        let folded = (ch as u64)
            .wrapping_mul(weight)
            .wrapping_add(weight.wrapping_mul(STATE_SALT));
        h = mix64(h ^ folded);
        len = weight;
    }
    mix64(h ^ len)
}

/// Deterministic generative context for one name.
#[derive(Clone, Debug)]
pub struct Field {
    name: String,
    pulse: Digits,
    ring: Digits,
    seed_int: BigUint,
    seed_word: u64,
    rng: Xorshift128Plus,
}

impl Field {
    pub fn new(name: &str) -> Result<Self> {
        let constants = Constants::builtin()?;
        Ok(Self::with_constants(name, &constants))
    }

    pub fn with_constants(name: &str, constants: &Constants) -> Self {
        let red = &constants.red;
        let blue = &constants.blue;
        let black = &constants.black;

        let mut pulse = [0u8; SEQUENCE_LEN];
        let mut ring = [0u8; SEQUENCE_LEN];
        for i in 0..SEQUENCE_LEN {
            pulse[i] =
                (red[i] ^ black[(i * 7) % SEQUENCE_LEN] ^ blue[(i * 13) % SEQUENCE_LEN]) % 10;
            ring[i] = (red[i] + black[i] + blue[i]) % 10;
        }

        let mut seed_source = constants.interleaved.clone();
        seed_source.push_str(name);
        let hex = pack_hex(&seed_source);
        let seed_int = BigUint::parse_bytes(hex.as_bytes(), 16).unwrap_or_default();
        let seed_word = truncate64(&seed_int);

        let rng = Xorshift128Plus::from_words(mix64(seed_word), mix64(seed_word ^ STATE_SALT));

        debug!(companion = name, seed_word, "field initialised");

        Self {
            name: name.to_string(),
            pulse,
            ring,
            seed_int,
            seed_word,
            rng,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pulse(&self) -> &Digits {
        &self.pulse
    }

    pub fn ring(&self) -> &Digits {
        &self.ring
    }

    pub fn seed_int(&self) -> &BigUint {
        &self.seed_int
    }

    pub fn seed_word(&self) -> u64 {
        self.seed_word
    }

    /// Advances the shared cursor. Output depends on every earlier draw.
    pub fn prng(&mut self) -> f64 {
        self.rng.next_f64()
    }

    /// The shared cursor, for APIs that take `impl Rng`.
    pub fn rng_mut(&mut self) -> &mut Xorshift128Plus {
        &mut self.rng
    }

    pub fn hash(&self, msg: &str) -> u64 {
        hash_with_seed(self.seed_word, msg)
    }

    pub fn stream(&self, label: &str) -> SubStream {
        SubStream {
            seed: self.seed_word,
            label: label.to_string(),
            counter: 0,
        }
    }

    pub fn fib(&self, n: i64) -> BigUint {
        math::fib(n)
    }

    pub fn lucas(&self, n: i64) -> BigUint {
        math::lucas(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn same_name_gives_identical_sequences_and_hashes() {
        let a = Field::new("Nyx").unwrap();
        let b = Field::new("Nyx").unwrap();
        assert_eq!(a.pulse(), b.pulse());
        assert_eq!(a.ring(), b.ring());
        assert_eq!(a.seed_int(), b.seed_int());
        for msg in ["", "a", "sigil", "a much longer message with spaces"] {
            assert_eq!(a.hash(msg), b.hash(msg));
        }
    }

    #[test]
    fn sequences_do_not_depend_on_name_but_seed_does() {
        let a = Field::new("Nyx").unwrap();
        let b = Field::new("Orin").unwrap();
        assert_eq!(a.pulse(), b.pulse());
        assert_eq!(a.ring(), b.ring());
        assert_ne!(a.seed_word(), b.seed_word());
        assert_ne!(a.hash("sigil"), b.hash("sigil"));
    }

    #[test]
    fn derived_digits_follow_the_constant_formulas() {
        let c = Constants::builtin().unwrap();
        let f = Field::with_constants("x", &c);
        for i in 0..SEQUENCE_LEN {
            assert!(f.pulse()[i] <= 9 && f.ring()[i] <= 9);
            assert_eq!(
                f.pulse()[i],
                (c.red()[i] ^ c.black()[(i * 7) % 60] ^ c.blue()[(i * 13) % 60]) % 10
            );
            assert_eq!(f.ring()[i], (c.red()[i] + c.black()[i] + c.blue()[i]) % 10);
        }
        // 3 + 2 + 1
        assert_eq!(f.ring()[0], 6);
    }

    #[test]
    fn non_digit_constant_fails_fast() {
        let mut bad = RED_CONSTANT.to_string();
        bad.replace_range(5..6, "x");
        let err = Constants::parse(&bad, BLUE_CONSTANT, BLACK_CONSTANT).unwrap_err();
        assert!(matches!(
            err,
            CompanionError::InvalidDigit { name: "red", ch: 'x', position: 5 }
        ));
    }

    #[test]
    fn short_constant_is_rejected() {
        let err = Constants::parse(RED_CONSTANT, "12345", BLACK_CONSTANT).unwrap_err();
        assert!(matches!(err, CompanionError::ConstantLength { found: 5, .. }));
    }

    #[test]
    fn hash_is_unaffected_by_prng_consumption() {
        let mut f = Field::new("Nyx").unwrap();
        let before = f.hash("focus");
        for _ in 0..1000 {
            f.prng();
        }
        assert_eq!(f.hash("focus"), before);
    }

    #[test]
    fn prng_is_in_unit_interval_and_replayable() {
        let mut a = Field::new("Nyx").unwrap();
        let mut b = Field::new("Nyx").unwrap();
        let mut prev = f64::NAN;
        let mut repeats = 0;
        for _ in 0..100_000 {
            let x = a.prng();
            assert!((0.0..1.0).contains(&x));
            assert_eq!(x, b.prng());
            if x == prev {
                repeats += 1;
            }
            prev = x;
        }
        assert_eq!(repeats, 0);
    }

    #[test]
    fn prng_order_matters_for_interleaved_consumers() {
        let mut a = Field::new("Nyx").unwrap();
        let mut b = Field::new("Nyx").unwrap();
        let _ = b.prng();
        assert_ne!(a.prng(), b.prng());
    }

    #[test]
    fn sub_streams_are_independent_of_each_other() {
        let f = Field::new("Nyx").unwrap();
        let mut breeding = f.stream("breeding");
        let mut behavior = f.stream("behavior");
        let first: u64 = breeding.next_u64();
        for _ in 0..10 {
            behavior.next_u64();
        }
        let mut replay = f.stream("breeding");
        assert_eq!(replay.next_u64(), first);
        assert_eq!(breeding.counter(), 1);
        assert_eq!(first, f.hash("breeding0"));

        let x: f64 = breeding.gen();
        assert!((0.0..1.0).contains(&x));
    }

    #[test]
    fn pack_hex_handles_partial_chunks() {
        assert_eq!(pack_hex("").len(), 8);
        assert_eq!(pack_hex("abcdefgh").len(), 8);
        assert_eq!(pack_hex("abcdefghi").len(), 16);
    }

    #[test]
    fn field_exposes_fibonacci() {
        let f = Field::new("Nyx").unwrap();
        assert_eq!(f.fib(10), BigUint::from(55u32));
        assert_eq!(f.lucas(0), BigUint::from(2u32));
    }

    #[test]
    fn fill_bytes_covers_odd_lengths() {
        let mut f = Field::new("Nyx").unwrap();
        let mut buf = [0u8; 13];
        f.rng_mut().fill_bytes(&mut buf);
        assert!(buf.iter().any(|b| *b != 0));
    }
}
