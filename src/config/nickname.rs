//! Fallback nickname generator.
//!
//! Used when the config names no nickname. Produces `CrabNNNNN`-style nicks
//! from a short stem and a number, always within the 9-character limit
//! most networks still enforce.

use rand::RngExt;

const STEMS: &[&str] = &["Crab", "Wire", "Claw", "Reef", "Tide", "Shell", "Kelp", "Krill"];

/// Longest nick the generator produces.
const MAX_LEN: usize = 9;

/// Generate a random nickname like `Reef4821`.
pub fn generate_nickname() -> String {
    let mut rng = rand::rng();
    let stem = STEMS[rng.random_range(0..STEMS.len())];
    let digits = MAX_LEN - stem.len();
    let num = rng.random_range(0..10u32.pow(digits as u32));
    format!("{}{:0width$}", stem, num, width = digits)
}
