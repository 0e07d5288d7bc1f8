//! Random seed generation for workflow nodes.
//!
//! ComfyUI samplers take an integer `seed` input. When the caller does
//! not pin one, the merge engine injects a fresh 15-digit seed so each
//! run produces a different image.

use rand::Rng;

/// Number of decimal digits in a generated seed.
pub const SEED_DIGITS: u32 = 15;

/// Generate a random positive seed with exactly [`SEED_DIGITS`] decimal
/// digits.
///
/// The first digit is drawn from 1-9, so the value never has a leading
/// zero and always falls in `[10^14, 10^15)`.
pub fn generate_seed() -> u64 {
    let mut rng = rand::rng();
    let lo = 10u64.pow(SEED_DIGITS - 1);
    let hi = 10u64.pow(SEED_DIGITS);
    rng.random_range(lo..hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_has_fifteen_digits() {
        for _ in 0..1000 {
            let seed = generate_seed();
            assert!(seed >= 100_000_000_000_000, "seed {seed} too small");
            assert!(seed < 1_000_000_000_000_000, "seed {seed} too large");
            assert_eq!(seed.to_string().len(), 15);
        }
    }

    #[test]
    fn seed_never_starts_with_zero() {
        for _ in 0..1000 {
            let first = generate_seed().to_string().chars().next().unwrap();
            assert_ne!(first, '0');
        }
    }
}
