//! Seeded dice rolls that are decided once, at origination.
//!
//! A roll is random only on the machine that makes it. The result is baked
//! into the emitted [`Command`] as plain chat text, so peers and replays see
//! the same numbers without re-rolling.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use rewind_core::command::Command;

/// Result of one roll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceRoll {
    pub player: String,
    pub sides: u32,
    pub values: Vec<u32>,
}

impl DiceRoll {
    /// Sum of the dice. Widened so large dice cannot overflow.
    pub fn total(&self) -> u64 {
        self.values.iter().map(|&v| u64::from(v)).sum()
    }

    /// Chat line announcing the roll.
    pub fn report(&self) -> String {
        let values: Vec<String> = self.values.iter().map(u32::to_string).collect();
        format!(
            "*** {}d{} = {} ({}) *** <{}>",
            self.values.len(),
            self.sides,
            values.join(","),
            self.total(),
            self.player
        )
    }

    /// The unit to send and log for this roll.
    pub fn to_command(&self) -> Command {
        Command::display_text(&self.report())
    }
}

/// Deterministic dice source.
#[derive(Debug, Clone)]
pub struct DiceRoller {
    rng: Pcg64,
}

impl DiceRoller {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    /// Roll `count` dice with `sides` faces each. A zero-sided die always
    /// shows zero.
    pub fn roll(&mut self, player: &str, count: usize, sides: u32) -> DiceRoll {
        let values = (0..count)
            .map(|_| {
                if sides == 0 {
                    0
                } else {
                    self.rng.gen_range(1..=sides)
                }
            })
            .collect();
        DiceRoll {
            player: player.to_owned(),
            sides,
            values,
        }
    }
}
