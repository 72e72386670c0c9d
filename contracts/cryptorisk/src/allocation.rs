//! Two-round board allocation.
//!
//! Round 1 hands every territory to a seat, one word per territory, capping
//! each seat at 11 territories. Round 2 spends the remaining troops one word
//! at a time until every player totals exactly 30.

use crate::map::{Owners, TERRITORIES, TERRITORY_COUNT};
use crate::PLAYER_COUNT;

pub const TROOPS_PER_PLAYER: u32 = 30;
pub const TOTAL_TROOPS: u32 = TROOPS_PER_PLAYER * PLAYER_COUNT;

/// ceil(42 / 4)
pub const MAX_TERRITORIES_PER_PLAYER: u32 = (TERRITORY_COUNT + PLAYER_COUNT - 1) / PLAYER_COUNT;

/// Words consumed by each round.
pub const SEED_WORDS: u32 = TERRITORY_COUNT;
pub const FINALIZE_WORDS: u32 = TOTAL_TROOPS - TERRITORY_COUNT;

/// Assign an owner to every territory. `words` must hold `SEED_WORDS` words.
pub(crate) fn seed_owners(words: &[u64]) -> Owners {
    let mut owners = [0u32; TERRITORIES];
    let mut held = [0u32; PLAYER_COUNT as usize];

    let mut t = 0usize;
    while t < TERRITORIES {
        let mut seat = (words[t] % PLAYER_COUNT as u64) as u32;
        while held[seat as usize] >= MAX_TERRITORIES_PER_PLAYER {
            seat = (seat + 1) % PLAYER_COUNT;
        }
        owners[t] = seat;
        held[seat as usize] += 1;
        t += 1;
    }
    owners
}

/// Troop counts after round 2. Every territory starts with the one troop
/// placed in round 1; `words` must hold `FINALIZE_WORDS` words.
pub(crate) fn finalize_troops(owners: &Owners, words: &[u64]) -> [u32; TERRITORIES] {
    let mut troops = [1u32; TERRITORIES];
    let mut totals = [0u32; PLAYER_COUNT as usize];
    for &owner in owners.iter() {
        totals[owner as usize] += 1;
    }

    let mut w = 0usize;
    while w < FINALIZE_WORDS as usize {
        let mut t = (words[w] % TERRITORY_COUNT as u64) as usize;
        // Some player is always below the limit while draws remain.
        while totals[owners[t] as usize] >= TROOPS_PER_PLAYER {
            t = (t + 1) % TERRITORIES;
        }
        troops[t] += 1;
        totals[owners[t] as usize] += 1;
        w += 1;
    }
    troops
}
