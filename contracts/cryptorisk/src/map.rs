//! Static world map: 42 territories in 6 continents.
//!
//! Territory ids are grouped by continent, so each continent is a contiguous
//! id range. Adjacency follows the classic board and is symmetric.

use crate::{NO_PLAYER, PLAYER_COUNT};

pub const TERRITORY_COUNT: u32 = 42;
pub const CONTINENT_COUNT: u32 = 6;

pub(crate) const TERRITORIES: usize = TERRITORY_COUNT as usize;

/// Ownership snapshot of the whole board, indexed by territory id.
pub(crate) type Owners = [u32; TERRITORIES];

/// Half-open id range `[start, end)` of each continent.
pub(crate) const CONTINENT_BOUNDS: [(u32, u32); CONTINENT_COUNT as usize] = [
    (0, 9),   // North America
    (9, 13),  // South America
    (13, 20), // Europe
    (20, 26), // Africa
    (26, 38), // Asia
    (38, 42), // Australia
];

/// Reinforcement bonus for holding a whole continent.
pub const CONTINENT_BONUS: [u32; CONTINENT_COUNT as usize] = [5, 2, 5, 3, 7, 2];

/// Minimum reinforcements per turn.
pub const MIN_REINFORCEMENTS: u32 = 3;

const ADJACENCY: [&[u32]; TERRITORIES] = [
    // North America
    &[1, 3, 29],          // 0  Alaska
    &[0, 2, 3, 4],        // 1  Northwest Territory
    &[1, 4, 5, 13],       // 2  Greenland
    &[0, 1, 4, 6],        // 3  Alberta
    &[1, 2, 3, 5, 6, 7],  // 4  Ontario
    &[2, 4, 7],           // 5  Quebec
    &[3, 4, 7, 8],        // 6  Western United States
    &[4, 5, 6, 8],        // 7  Eastern United States
    &[6, 7, 9],           // 8  Central America
    // South America
    &[8, 10, 11],         // 9  Venezuela
    &[9, 11, 12],         // 10 Peru
    &[9, 10, 12, 20],     // 11 Brazil
    &[10, 11],            // 12 Argentina
    // Europe
    &[2, 14, 15],             // 13 Iceland
    &[13, 15, 16, 19],        // 14 Scandinavia
    &[13, 14, 16, 17],        // 15 Great Britain
    &[14, 15, 17, 18, 19],    // 16 Northern Europe
    &[15, 16, 18, 20],        // 17 Western Europe
    &[16, 17, 19, 20, 21, 35], // 18 Southern Europe
    &[14, 16, 18, 26, 33, 35], // 19 Ukraine
    // Africa
    &[11, 17, 18, 21, 22, 23], // 20 North Africa
    &[18, 20, 22, 35],         // 21 Egypt
    &[20, 21, 23, 24, 25, 35], // 22 East Africa
    &[20, 22, 24],             // 23 Congo
    &[22, 23, 25],             // 24 South Africa
    &[22, 24],                 // 25 Madagascar
    // Asia
    &[19, 27, 33, 34],         // 26 Ural
    &[26, 28, 30, 31, 34],     // 27 Siberia
    &[27, 29, 30],             // 28 Yakutsk
    &[0, 28, 30, 31, 32],      // 29 Kamchatka
    &[27, 28, 29, 31],         // 30 Irkutsk
    &[27, 29, 30, 32, 34],     // 31 Mongolia
    &[29, 31],                 // 32 Japan
    &[19, 26, 34, 35, 36],     // 33 Afghanistan
    &[26, 27, 31, 33, 36, 37], // 34 China
    &[18, 19, 21, 22, 33, 36], // 35 Middle East
    &[33, 34, 35, 37],         // 36 India
    &[34, 36, 38],             // 37 Siam
    // Australia
    &[37, 39, 40],             // 38 Indonesia
    &[38, 40, 41],             // 39 New Guinea
    &[38, 39, 41],             // 40 Western Australia
    &[39, 40],                 // 41 Eastern Australia
];

pub(crate) fn neighbors(territory: u32) -> &'static [u32] {
    ADJACENCY[territory as usize]
}

pub(crate) fn are_adjacent(a: u32, b: u32) -> bool {
    neighbors(a).contains(&b)
}

pub(crate) fn continent_of(territory: u32) -> u32 {
    let mut c = 0usize;
    while c < CONTINENT_BOUNDS.len() {
        let (start, end) = CONTINENT_BOUNDS[c];
        if territory >= start && territory < end {
            return c as u32;
        }
        c += 1;
    }
    CONTINENT_COUNT
}

/// Sole owner of every territory in `continent`, or `NO_PLAYER` if contested.
pub(crate) fn continent_owner(owners: &Owners, continent: u32) -> u32 {
    let (start, end) = CONTINENT_BOUNDS[continent as usize];
    let first = owners[start as usize];
    let mut t = start + 1;
    while t < end {
        if owners[t as usize] != first {
            return NO_PLAYER;
        }
        t += 1;
    }
    if first < PLAYER_COUNT {
        first
    } else {
        NO_PLAYER
    }
}

pub(crate) fn territories_owned(owners: &Owners, player: u32) -> u32 {
    owners.iter().filter(|&&owner| owner == player).count() as u32
}

/// Troops a player receives at the start of their turn: a third of their
/// territories (at least 3) plus every held continent's bonus.
pub(crate) fn reinforcements_for(owners: &Owners, player: u32) -> u32 {
    let base = (territories_owned(owners, player) / 3).max(MIN_REINFORCEMENTS);
    let mut bonus = 0;
    let mut c = 0u32;
    while c < CONTINENT_COUNT {
        if continent_owner(owners, c) == player {
            bonus += CONTINENT_BONUS[c as usize];
        }
        c += 1;
    }
    base + bonus
}

/// Whether `to` can be reached from `from` walking only through territories
/// owned by `player`.
pub(crate) fn connected_through(owners: &Owners, player: u32, from: u32, to: u32) -> bool {
    if owners[from as usize] != player || owners[to as usize] != player {
        return false;
    }

    let mut visited = [false; TERRITORIES];
    let mut queue = [0u32; TERRITORIES];
    let mut head = 0usize;
    let mut tail = 0usize;

    visited[from as usize] = true;
    queue[tail] = from;
    tail += 1;

    while head < tail {
        let current = queue[head];
        head += 1;
        if current == to {
            return true;
        }
        for &next in neighbors(current) {
            let n = next as usize;
            if !visited[n] && owners[n] == player {
                visited[n] = true;
                queue[tail] = next;
                tail += 1;
            }
        }
    }
    false
}
