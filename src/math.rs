//! Integer mixing and Fibonacci/Lucas arithmetic.
//!
//! Everything here is pure and total. Hashing uses integer operations only so
//! results are identical on every platform.

use num_bigint::BigUint;
use num_traits::{One, Zero};

/// Murmur3 `fmix64` finalizer. Bijective on `u64`, so only `0` maps to `0`.
pub fn mix64(x: u64) -> u64 {
    let mut k = x;
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

/// Lowest 64 bits of an arbitrary-width integer.
pub fn truncate64(x: &BigUint) -> u64 {
    x.iter_u64_digits().next().unwrap_or(0)
}

/// [`mix64`] over a big integer, reduced to 64 bits by truncation first.
pub fn mix64_big(x: &BigUint) -> u64 {
    mix64(truncate64(x))
}

/// Fast-doubling Fibonacci pair `(F(n), F(n+1))`.
///
/// Negative and zero `n` both yield `(0, 1)`.
pub fn fib_fast(n: i64) -> (BigUint, BigUint) {
    if n <= 0 {
        return (BigUint::zero(), BigUint::one());
    }
    fib_pair(n as u64)
}

fn fib_pair(n: u64) -> (BigUint, BigUint) {
    if n == 0 {
        return (BigUint::zero(), BigUint::one());
    }
    let (a, b) = fib_pair(n >> 1);
    // F(2k) = F(k) * (2F(k+1) - F(k)); 2F(k+1) >= F(k) always holds.
    let two_b = &b << 1usize;
    let c = &a * (two_b - &a);
    // F(2k+1) = F(k)^2 + F(k+1)^2
    let d = &a * &a + &b * &b;
    if n & 1 == 0 {
        (c, d)
    } else {
        let next = &c + &d;
        (d, next)
    }
}

pub fn fib(n: i64) -> BigUint {
    fib_fast(n).0
}

/// Lucas number `L(n) = 2F(n+1) - F(n)`, with `L(0) = 2` and `L(n<0) = 2`.
pub fn lucas(n: i64) -> BigUint {
    if n <= 0 {
        return BigUint::from(2u32);
    }
    let (f, f1) = fib_fast(n);
    (f1 << 1usize) - f
}
