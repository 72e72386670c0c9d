//! Dice battles.
//!
//! A battle consumes `BATTLE_WORDS` words: the first three are attacker dice,
//! the last two defender dice. Only as many of each as the battle allows are
//! rolled. Dice are compared highest against highest; ties go to the defender.

pub const MAX_ATTACK_DICE: u32 = 3;
pub const MAX_DEFENSE_DICE: u32 = 2;
pub const BATTLE_WORDS: u32 = MAX_ATTACK_DICE + MAX_DEFENSE_DICE;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct DiceRoll {
    /// Faces sorted high to low; only the first `attacker_count` are rolled.
    pub attacker: [u32; MAX_ATTACK_DICE as usize],
    pub attacker_count: u32,
    pub defender: [u32; MAX_DEFENSE_DICE as usize],
    pub defender_count: u32,
    pub attacker_losses: u32,
    pub defender_losses: u32,
}

/// Attacker dice: limited by the troops committed and by the one troop that
/// must stay behind on the source territory.
pub(crate) fn attack_dice(committed: u32, source_troops: u32) -> u32 {
    MAX_ATTACK_DICE
        .min(committed)
        .min(source_troops.saturating_sub(1))
}

pub(crate) fn defense_dice(defending: u32) -> u32 {
    MAX_DEFENSE_DICE.min(defending)
}

pub(crate) fn face(word: u64) -> u32 {
    (word % 6) as u32 + 1
}

pub(crate) fn roll_dice(words: &[u64], attacker_count: u32, defender_count: u32) -> DiceRoll {
    let mut attacker = [0u32; MAX_ATTACK_DICE as usize];
    let mut defender = [0u32; MAX_DEFENSE_DICE as usize];

    for (i, die) in attacker.iter_mut().enumerate().take(attacker_count as usize) {
        *die = face(words[i]);
    }
    for (i, die) in defender.iter_mut().enumerate().take(defender_count as usize) {
        *die = face(words[MAX_ATTACK_DICE as usize + i]);
    }

    // Unrolled slots hold 0 and sort to the end.
    attacker.sort_unstable_by(|a, b| b.cmp(a));
    defender.sort_unstable_by(|a, b| b.cmp(a));

    let mut attacker_losses = 0;
    let mut defender_losses = 0;
    let pairs = attacker_count.min(defender_count) as usize;
    let mut i = 0;
    while i < pairs {
        if attacker[i] > defender[i] {
            defender_losses += 1;
        } else {
            attacker_losses += 1;
        }
        i += 1;
    }

    DiceRoll {
        attacker,
        attacker_count,
        defender,
        defender_count,
        attacker_losses,
        defender_losses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dice_counts() {
        assert_eq!(attack_dice(3, 10), 3);
        assert_eq!(attack_dice(5, 10), 3);
        assert_eq!(attack_dice(2, 10), 2);
        assert_eq!(attack_dice(3, 3), 2);
        assert_eq!(attack_dice(3, 1), 0);
        assert_eq!(defense_dice(1), 1);
        assert_eq!(defense_dice(7), 2);
    }

    #[test]
    fn faces_range_one_to_six() {
        assert_eq!(face(0), 1);
        assert_eq!(face(5), 6);
        assert_eq!(face(6), 1);
        assert_eq!(face(u64::MAX), (u64::MAX % 6) as u32 + 1);
    }

    #[test]
    fn attacker_sweeps_with_higher_dice() {
        let roll = roll_dice(&[5, 5, 5, 0, 0], 3, 2);
        assert_eq!(roll.attacker, [6, 6, 6]);
        assert_eq!(roll.defender, [1, 1]);
        assert_eq!(roll.attacker_losses, 0);
        assert_eq!(roll.defender_losses, 2);
    }

    #[test]
    fn ties_go_to_defender() {
        let roll = roll_dice(&[0, 0, 0, 0, 0], 3, 2);
        assert_eq!(roll.attacker_losses, 2);
        assert_eq!(roll.defender_losses, 0);

        let roll = roll_dice(&[3, 2, 0, 3, 1], 2, 2);
        // 4,3 against 4,2: first tied, second won
        assert_eq!(roll.attacker_losses, 1);
        assert_eq!(roll.defender_losses, 1);
    }

    #[test]
    fn dice_compared_highest_first() {
        // attacker rolls 2,6,4 -> 6,4,2; defender rolls 5,3 -> 5,3
        let roll = roll_dice(&[1, 5, 3, 4, 2], 3, 2);
        assert_eq!(roll.attacker, [6, 4, 2]);
        assert_eq!(roll.defender, [5, 3]);
        assert_eq!(roll.defender_losses, 2);
    }

    #[test]
    fn unrolled_dice_ignored() {
        // one defender die: only one pair is compared
        let roll = roll_dice(&[0, 0, 0, 5, 5], 3, 1);
        assert_eq!(roll.defender, [6, 0]);
        assert_eq!(roll.attacker_losses + roll.defender_losses, 1);
        assert_eq!(roll.attacker_losses, 1);
    }

    #[test]
    fn every_roll_costs_someone_a_troop() {
        let mut word = 0u64;
        for a in 1..=3 {
            for d in 1..=2 {
                for _ in 0..50 {
                    word = word.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
                    let words = [word, word >> 7, word >> 13, word >> 19, word >> 29];
                    let roll = roll_dice(&words, a, d);
                    assert_eq!(roll.attacker_losses + roll.defender_losses, a.min(d));
                }
            }
        }
    }
}
