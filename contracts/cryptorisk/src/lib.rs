#![no_std]

//! # Cryptorisk
//!
//! A four-player territory-conquest game on the classic 42-territory world map.
//!
//! ## Game flow
//! 1. Four players `enter_lobby` paying at least the entrance fee. The fourth
//!    join fills the lobby and requests 42 random words from the coordinator.
//! 2. Round 1 fulfillment assigns every territory an owner (one troop each).
//! 3. `perform_upkeep` requests 78 more words; round 2 fulfillment spreads the
//!    remaining troops so every player holds exactly 30. Turn 1 opens for seat 0.
//! 4. Each turn: `deploy` once, then any number of `attack`s (each waits for a
//!    5-word dice fulfillment), `finish_attack`, and `fortify` or `end_turn`.
//! 5. A conquest must be followed by `troop_transfer_after_attack` before the
//!    player can attack again or end the attack phase.
//! 6. The game ends when one player owns all 42 territories.
//!
//! ## Randomness
//! Words come from an external coordinator through `fulfill_random_words`.
//! A session has at most one request in flight; every other action that
//! depends on it fails with `RandomnessNotReady` until it is fulfilled.

use soroban_sdk::{
    contract, contractclient, contracterror, contractevent, contractimpl, contracttype, vec,
    Address, BytesN, Env, IntoVal, Vec,
};

mod allocation;
mod combat;
mod map;

pub use allocation::{FINALIZE_WORDS, MAX_TERRITORIES_PER_PLAYER, SEED_WORDS, TROOPS_PER_PLAYER};
pub use combat::BATTLE_WORDS;
pub use map::{CONTINENT_BONUS, CONTINENT_COUNT, TERRITORY_COUNT};

use map::{Owners, TERRITORIES};

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract Events
// ═══════════════════════════════════════════════════════════════════════════════

#[contractevent]
pub struct EvPlayerJoinedLobby {
    pub session_id: u32,
    pub player: Address,
    pub seat: u32,
}

#[contractevent]
pub struct EvRandomnessRequested {
    pub session_id: u32,
    pub request_id: u64,
    pub purpose: RandomnessPurpose,
}

/// Emitted when the round-1 words have been applied to the board.
#[contractevent]
pub struct EvReceivedRandomWords {
    pub session_id: u32,
    pub request_id: u64,
    pub word_count: u32,
}

#[contractevent]
pub struct EvGameSetupComplete {
    pub session_id: u32,
    pub first_player: Address,
}

#[contractevent]
pub struct EvPlayerDeploying {
    pub session_id: u32,
    pub player: Address,
    pub territory: u32,
    pub troops: u32,
}

#[contractevent]
pub struct EvPlayerAttacking {
    pub session_id: u32,
    pub player: Address,
    pub from: u32,
    pub to: u32,
    pub troops: u32,
}

/// Faces are sorted high to low.
#[contractevent]
pub struct EvDiceRolled {
    pub session_id: u32,
    pub attacker_dice: Vec<u32>,
    pub defender_dice: Vec<u32>,
    pub attacker_losses: u32,
    pub defender_losses: u32,
}

#[contractevent]
pub struct EvTerritoryConquered {
    pub session_id: u32,
    pub territory: u32,
    pub new_owner: u32,
    pub previous_owner: u32,
}

#[contractevent]
pub struct EvTroopsTransferred {
    pub session_id: u32,
    pub from: u32,
    pub to: u32,
    pub troops: u32,
}

#[contractevent]
pub struct EvPlayerFortifying {
    pub session_id: u32,
    pub player: Address,
    pub from: u32,
    pub to: u32,
    pub troops: u32,
}

#[contractevent]
pub struct EvTurnEnded {
    pub session_id: u32,
    pub player: u32,
    pub next_player: u32,
    pub turn_number: u32,
}

#[contractevent]
pub struct EvGameOver {
    pub session_id: u32,
    pub winner: Address,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  External trait interfaces
// ═══════════════════════════════════════════════════════════════════════════════

#[contractclient(name = "RandomnessCoordinatorClient")]
pub trait RandomnessCoordinator {
    fn request_random_words(env: Env, consumer: Address, num_words: u32) -> u64;
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum CryptoriskError {
    GameNotFound = 1,
    InsufficientPayment = 2,
    AlreadyJoined = 3,
    LobbyFull = 4,
    IndexOutOfRange = 5,
    RandomnessNotReady = 6,
    UnknownRequest = 7,
    NotYourTurn = 8,
    NotOwner = 9,
    InsufficientTroops = 10,
    NotAdjacent = 11,
    PendingTransferRequired = 12,
    WrongPhase = 13,
    CannotAttackOwnTerritory = 14,
    NotConnected = 15,
    NoPendingTransfer = 16,
    InvalidTroopCount = 17,
    NotEnoughRandomWords = 18,
    GameAlreadyEnded = 19,
    AdminNotSet = 20,
    CoordinatorNotSet = 21,
    EntranceFeeNotSet = 22,
    RequestsInFlight = 23,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  States
// ═══════════════════════════════════════════════════════════════════════════════

pub const PLAYER_COUNT: u32 = 4;

/// Owner of an unowned territory and of a contested continent.
pub const NO_PLAYER: u32 = PLAYER_COUNT;

/// No territory attacked yet this turn.
pub const NO_TERRITORY: u32 = TERRITORY_COUNT;

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum LobbyState {
    Open = 0,
    Full = 1,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum AllocationPhase {
    /// Lobby still filling.
    NotStarted = 0,
    /// Waiting for the round-1 words.
    Seeding = 1,
    /// Owners assigned; waiting for `perform_upkeep`.
    Seeded = 2,
    /// Waiting for the round-2 words.
    Finalizing = 3,
    Complete = 4,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum TurnPhase {
    AwaitingDeploy = 0,
    AwaitingAttack = 1,
    AwaitingFortifyOrEnd = 2,
}

#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RandomnessPurpose {
    AllocationSeed,
    AllocationFinalize,
    Battle,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Game state & storage keys
// ═══════════════════════════════════════════════════════════════════════════════

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Territory {
    pub owner: u32,
    pub troops: u32,
    pub continent: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContinentInfo {
    pub id: u32,
    /// Sole owner, or `NO_PLAYER` when contested.
    pub owner: u32,
    pub troop_bonus: u32,
}

/// A conquered territory waiting for `troop_transfer_after_attack`.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Conquest {
    pub from: u32,
    pub to: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PendingConquest {
    Clear,
    Transfer(Conquest),
}

/// An attack waiting for its dice.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Battle {
    pub from: u32,
    pub to: u32,
    pub troops: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PendingBattle {
    Clear,
    Rolling(Battle),
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TurnState {
    pub active_player: u32,
    pub phase: TurnPhase,
    /// Troops still available to `deploy` this turn.
    pub reinforcements: u32,
    pub pending_conquest: PendingConquest,
    /// Target of the latest attack this turn, or `NO_TERRITORY`.
    pub last_target: u32,
    /// 0 until allocation completes.
    pub turn_number: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session {
    pub lobby_state: LobbyState,
    // Seat order is join order
    pub players: Vec<Address>,
    pub entrance_fee: i128,
    pub pot: i128,
    pub allocation: AllocationPhase,
    // Indexed by territory id; empty until round 1
    pub territories: Vec<Territory>,
    pub seed_words: Vec<u64>,
    pub turn: TurnState,
    pub battle: PendingBattle,
    pub awaiting_request: Option<u64>,
    pub last_request_id: Option<u64>,
    pub winner: Option<u32>,
}

/// Correlates a coordinator request id with the session waiting for it.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingRequest {
    pub session_id: u32,
    pub purpose: RandomnessPurpose,
}

#[contracttype]
#[derive(Clone)]
enum StorageKey {
    Session(u32),
    Request(u64),
    Admin,
    CoordinatorAddress,
    EntranceFee,
    OpenRequests,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Constants
// ═══════════════════════════════════════════════════════════════════════════════

// Ledger rate is approximately 5 seconds per ledger on Stellar
const LEDGER_RATE_SECS: u32 = 5;

// TTL expressed in human-readable time units (30 days)
const TTL_SECONDS: u32 = 30 * 24 * 60 * 60;

/// TTL for session storage in ledgers: 30 * 24 * 60 * 60 / 5 = 518,400 ledgers
const SESSION_TTL_LEDGERS: u32 = TTL_SECONDS / LEDGER_RATE_SECS;

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract
// ═══════════════════════════════════════════════════════════════════════════════

#[contract]
pub struct CryptoriskContract;

#[contractimpl]
impl CryptoriskContract {
    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Constructor & Lobby
    // ───────────────────────────────────────────────────────────────────────────

    pub fn __constructor(env: Env, admin: Address, coordinator: Address, entrance_fee: i128) {
        env.storage()
            .instance()
            .set(&StorageKey::Admin, &admin);
        env.storage()
            .instance()
            .set(&StorageKey::CoordinatorAddress, &coordinator);
        env.storage()
            .instance()
            .set(&StorageKey::EntranceFee, &entrance_fee);
    }

    /// Take a seat in `session_id`, opening the session on first entry.
    /// The fee is fixed when the session opens; later fee changes only affect
    /// new sessions.
    pub fn enter_lobby(
        env: Env,
        session_id: u32,
        player: Address,
        payment: i128,
    ) -> Result<(), CryptoriskError> {
        player.require_auth_for_args(vec![
            &env,
            session_id.into_val(&env),
            payment.into_val(&env),
        ]);

        let mut session = match Self::try_read_session(&env, session_id) {
            Some(session) => session,
            None => Self::open_session(&env)?,
        };

        if payment < session.entrance_fee {
            return Err(CryptoriskError::InsufficientPayment);
        }
        if session.lobby_state == LobbyState::Full {
            return Err(CryptoriskError::LobbyFull);
        }
        if session.players.contains(&player) {
            return Err(CryptoriskError::AlreadyJoined);
        }

        let seat = session.players.len();
        session.players.push_back(player.clone());
        session.pot = session.pot.saturating_add(payment);

        EvPlayerJoinedLobby {
            session_id,
            player,
            seat,
        }.publish(&env);

        if session.players.len() == PLAYER_COUNT {
            session.lobby_state = LobbyState::Full;
            Self::request_randomness(
                &env,
                session_id,
                &mut session,
                RandomnessPurpose::AllocationSeed,
                SEED_WORDS,
            )?;
            session.allocation = AllocationPhase::Seeding;
        }

        Self::write_session(&env, session_id, &session);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Randomness
    // ───────────────────────────────────────────────────────────────────────────

    /// Whether the session is waiting for `perform_upkeep` to start round 2.
    pub fn check_upkeep(env: Env, session_id: u32) -> bool {
        match Self::try_read_session(&env, session_id) {
            Some(session) => {
                session.allocation == AllocationPhase::Seeded && session.awaiting_request.is_none()
            }
            None => false,
        }
    }

    /// Request the round-2 words. Anyone may call this once round 1 is in.
    pub fn perform_upkeep(env: Env, session_id: u32) -> Result<(), CryptoriskError> {
        let mut session = Self::read_session(&env, session_id)?;
        if session.allocation != AllocationPhase::Seeded {
            return Err(CryptoriskError::WrongPhase);
        }

        Self::request_randomness(
            &env,
            session_id,
            &mut session,
            RandomnessPurpose::AllocationFinalize,
            FINALIZE_WORDS,
        )?;
        session.allocation = AllocationPhase::Finalizing;

        Self::write_session(&env, session_id, &session);
        Ok(())
    }

    /// Coordinator callback. Each request id is accepted once, and only while
    /// its session is still waiting for it.
    pub fn fulfill_random_words(
        env: Env,
        request_id: u64,
        words: Vec<u64>,
    ) -> Result<(), CryptoriskError> {
        let coordinator = Self::load_coordinator(&env)?;
        coordinator.require_auth();

        let key = StorageKey::Request(request_id);
        let pending: PendingRequest = env
            .storage()
            .temporary()
            .get(&key)
            .ok_or(CryptoriskError::UnknownRequest)?;

        let session_id = pending.session_id;
        let mut session = Self::read_session(&env, session_id)?;
        if session.awaiting_request != Some(request_id) {
            return Err(CryptoriskError::UnknownRequest);
        }

        env.storage().temporary().remove(&key);
        Self::track_open_requests(&env, false);
        session.awaiting_request = None;

        match pending.purpose {
            RandomnessPurpose::AllocationSeed => {
                Self::seed_board(&env, session_id, request_id, &mut session, &words)?
            }
            RandomnessPurpose::AllocationFinalize => {
                Self::finalize_board(&env, session_id, &mut session, &words)?
            }
            RandomnessPurpose::Battle => Self::resolve_battle(&env, session_id, &mut session, &words)?,
        }

        Self::write_session(&env, session_id, &session);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Turn actions
    // ───────────────────────────────────────────────────────────────────────────

    /// Place reinforcements on an owned territory. One deploy per turn;
    /// whatever is left of the pool is forfeited.
    pub fn deploy(
        env: Env,
        session_id: u32,
        player: Address,
        territory: u32,
        troops: u32,
    ) -> Result<(), CryptoriskError> {
        player.require_auth();

        let mut session = Self::read_session(&env, session_id)?;
        let mut turn = Self::require_turn(&session, &player)?;
        if turn.phase != TurnPhase::AwaitingDeploy {
            return Err(CryptoriskError::WrongPhase);
        }

        let mut tile = Self::tile(&session, territory)?;
        if tile.owner != turn.active_player {
            return Err(CryptoriskError::NotOwner);
        }
        if troops == 0 {
            return Err(CryptoriskError::InvalidTroopCount);
        }
        if troops > turn.reinforcements {
            return Err(CryptoriskError::InsufficientTroops);
        }

        tile.troops += troops;
        session.territories.set(territory, tile);

        turn.reinforcements = 0;
        turn.phase = TurnPhase::AwaitingAttack;
        session.turn = turn;

        EvPlayerDeploying {
            session_id,
            player,
            territory,
            troops,
        }.publish(&env);

        Self::write_session(&env, session_id, &session);
        Ok(())
    }

    /// Commit `troops` from `from` against an adjacent enemy territory and
    /// request the dice. The battle resolves in `fulfill_random_words`.
    pub fn attack(
        env: Env,
        session_id: u32,
        player: Address,
        from: u32,
        to: u32,
        troops: u32,
    ) -> Result<(), CryptoriskError> {
        player.require_auth();

        let mut session = Self::read_session(&env, session_id)?;
        let mut turn = Self::require_turn(&session, &player)?;
        if turn.phase != TurnPhase::AwaitingAttack {
            return Err(CryptoriskError::WrongPhase);
        }
        Self::require_no_pending_attack(&session, &turn)?;

        let source = Self::tile(&session, from)?;
        let target = Self::tile(&session, to)?;
        if source.owner != turn.active_player {
            return Err(CryptoriskError::NotOwner);
        }
        if target.owner == turn.active_player {
            return Err(CryptoriskError::CannotAttackOwnTerritory);
        }
        if !map::are_adjacent(from, to) {
            return Err(CryptoriskError::NotAdjacent);
        }
        if troops == 0 || troops >= source.troops {
            return Err(CryptoriskError::InsufficientTroops);
        }

        Self::request_randomness(
            &env,
            session_id,
            &mut session,
            RandomnessPurpose::Battle,
            BATTLE_WORDS,
        )?;
        session.battle = PendingBattle::Rolling(Battle { from, to, troops });
        turn.last_target = to;
        session.turn = turn;

        EvPlayerAttacking {
            session_id,
            player,
            from,
            to,
            troops,
        }.publish(&env);

        Self::write_session(&env, session_id, &session);
        Ok(())
    }

    /// Move troops into the territory just conquered. Must precede any
    /// further attack.
    pub fn troop_transfer_after_attack(
        env: Env,
        session_id: u32,
        player: Address,
        troops: u32,
    ) -> Result<(), CryptoriskError> {
        player.require_auth();

        let mut session = Self::read_session(&env, session_id)?;
        let mut turn = Self::require_turn(&session, &player)?;
        let conquest = match turn.pending_conquest.clone() {
            PendingConquest::Transfer(conquest) => conquest,
            // Latest target still enemy-held: dice pending or defender held
            PendingConquest::Clear if turn.last_target != NO_TERRITORY => {
                if Self::tile(&session, turn.last_target)?.owner != turn.active_player {
                    return Err(CryptoriskError::NotOwner);
                }
                return Err(CryptoriskError::NoPendingTransfer);
            }
            PendingConquest::Clear => return Err(CryptoriskError::NoPendingTransfer),
        };

        let mut source = Self::tile(&session, conquest.from)?;
        let mut target = Self::tile(&session, conquest.to)?;
        Self::check_movable(&source, troops)?;

        source.troops -= troops;
        target.troops += troops;
        session.territories.set(conquest.from, source);
        session.territories.set(conquest.to, target);

        turn.pending_conquest = PendingConquest::Clear;
        session.turn = turn;

        EvTroopsTransferred {
            session_id,
            from: conquest.from,
            to: conquest.to,
            troops,
        }.publish(&env);

        Self::write_session(&env, session_id, &session);
        Ok(())
    }

    pub fn finish_attack(env: Env, session_id: u32, player: Address) -> Result<(), CryptoriskError> {
        player.require_auth();

        let mut session = Self::read_session(&env, session_id)?;
        let mut turn = Self::require_turn(&session, &player)?;
        if turn.phase != TurnPhase::AwaitingAttack {
            return Err(CryptoriskError::WrongPhase);
        }
        Self::require_no_pending_attack(&session, &turn)?;

        turn.phase = TurnPhase::AwaitingFortifyOrEnd;
        session.turn = turn;

        Self::write_session(&env, session_id, &session);
        Ok(())
    }

    /// Move troops between two owned territories joined by a chain of owned
    /// territories. Ends the turn.
    pub fn fortify(
        env: Env,
        session_id: u32,
        player: Address,
        from: u32,
        to: u32,
        troops: u32,
    ) -> Result<(), CryptoriskError> {
        player.require_auth();

        let mut session = Self::read_session(&env, session_id)?;
        let turn = Self::require_turn(&session, &player)?;
        if turn.phase != TurnPhase::AwaitingFortifyOrEnd {
            return Err(CryptoriskError::WrongPhase);
        }

        let mut source = Self::tile(&session, from)?;
        let mut target = Self::tile(&session, to)?;
        let seat = turn.active_player;
        if source.owner != seat || target.owner != seat {
            return Err(CryptoriskError::NotOwner);
        }
        if from == to || !map::connected_through(&Self::owners(&session), seat, from, to) {
            return Err(CryptoriskError::NotConnected);
        }
        Self::check_movable(&source, troops)?;

        source.troops -= troops;
        target.troops += troops;
        session.territories.set(from, source);
        session.territories.set(to, target);

        EvPlayerFortifying {
            session_id,
            player,
            from,
            to,
            troops,
        }.publish(&env);

        Self::advance_turn(&env, session_id, &mut session, &turn);
        Self::write_session(&env, session_id, &session);
        Ok(())
    }

    /// End the turn without fortifying.
    pub fn end_turn(env: Env, session_id: u32, player: Address) -> Result<(), CryptoriskError> {
        player.require_auth();

        let mut session = Self::read_session(&env, session_id)?;
        let turn = Self::require_turn(&session, &player)?;
        if turn.phase == TurnPhase::AwaitingDeploy {
            return Err(CryptoriskError::WrongPhase);
        }
        Self::require_no_pending_attack(&session, &turn)?;

        Self::advance_turn(&env, session_id, &mut session, &turn);
        Self::write_session(&env, session_id, &session);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Read
    // ───────────────────────────────────────────────────────────────────────────

    pub fn get_player(env: Env, session_id: u32, index: u32) -> Result<Address, CryptoriskError> {
        Self::try_read_session(&env, session_id)
            .and_then(|session| session.players.get(index))
            .ok_or(CryptoriskError::IndexOutOfRange)
    }

    pub fn get_number_of_players(env: Env, session_id: u32) -> u32 {
        Self::try_read_session(&env, session_id)
            .map(|session| session.players.len())
            .unwrap_or(0)
    }

    pub fn get_lobby_state(env: Env, session_id: u32) -> LobbyState {
        Self::try_read_session(&env, session_id)
            .map(|session| session.lobby_state)
            .unwrap_or(LobbyState::Open)
    }

    /// Fee charged to sessions opened from now on.
    pub fn get_entrance_fee(env: Env) -> Result<i128, CryptoriskError> {
        Self::load_entrance_fee(&env)
    }

    pub fn get_territories(
        env: Env,
        session_id: u32,
        territory: u32,
    ) -> Result<Territory, CryptoriskError> {
        let session = Self::read_board(&env, session_id)?;
        Self::tile(&session, territory)
    }

    pub fn get_continent_info(
        env: Env,
        session_id: u32,
    ) -> Result<Vec<ContinentInfo>, CryptoriskError> {
        let session = Self::read_board(&env, session_id)?;
        let owners = Self::owners(&session);

        let mut info = Vec::new(&env);
        let mut c: u32 = 0;
        while c < CONTINENT_COUNT {
            info.push_back(ContinentInfo {
                id: c,
                owner: map::continent_owner(&owners, c),
                troop_bonus: CONTINENT_BONUS[c as usize],
            });
            c += 1;
        }
        Ok(info)
    }

    pub fn get_player_turn(env: Env, session_id: u32) -> Result<Address, CryptoriskError> {
        let session = Self::read_board(&env, session_id)?;
        session
            .players
            .get(session.turn.active_player)
            .ok_or(CryptoriskError::IndexOutOfRange)
    }

    pub fn get_turn_state(env: Env, session_id: u32) -> Result<TurnState, CryptoriskError> {
        let session = Self::read_board(&env, session_id)?;
        Ok(session.turn)
    }

    /// One of the round-1 words, available once round 1 has been fulfilled.
    pub fn get_random_words_array_index(
        env: Env,
        session_id: u32,
        index: u32,
    ) -> Result<u64, CryptoriskError> {
        let session = Self::try_read_session(&env, session_id)
            .ok_or(CryptoriskError::RandomnessNotReady)?;
        if session.seed_words.is_empty() {
            return Err(CryptoriskError::RandomnessNotReady);
        }
        session
            .seed_words
            .get(index)
            .ok_or(CryptoriskError::IndexOutOfRange)
    }

    /// Most recent coordinator request issued for the session.
    pub fn get_request_id(env: Env, session_id: u32) -> Result<u64, CryptoriskError> {
        let session = Self::read_session(&env, session_id)?;
        session.last_request_id.ok_or(CryptoriskError::UnknownRequest)
    }

    pub fn get_session(env: Env, session_id: u32) -> Result<Session, CryptoriskError> {
        Self::read_session(&env, session_id)
    }

    pub fn get_winner(env: Env, session_id: u32) -> Result<Option<Address>, CryptoriskError> {
        let session = Self::read_session(&env, session_id)?;
        Ok(session.winner.and_then(|seat| session.players.get(seat)))
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Admin
    // ───────────────────────────────────────────────────────────────────────────

    pub fn get_admin(env: Env) -> Result<Address, CryptoriskError> {
        Self::load_admin(&env)
    }

    pub fn set_admin(env: Env, new_admin: Address) -> Result<(), CryptoriskError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();
        env.storage()
            .instance()
            .set(&StorageKey::Admin, &new_admin);
        Ok(())
    }

    pub fn get_coordinator(env: Env) -> Result<Address, CryptoriskError> {
        Self::load_coordinator(&env)
    }

    /// Only allowed while no request is waiting on the current coordinator.
    pub fn set_coordinator(env: Env, new_coordinator: Address) -> Result<(), CryptoriskError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();
        if Self::open_requests(&env) > 0 {
            return Err(CryptoriskError::RequestsInFlight);
        }
        env.storage()
            .instance()
            .set(&StorageKey::CoordinatorAddress, &new_coordinator);
        Ok(())
    }

    pub fn set_entrance_fee(env: Env, new_fee: i128) -> Result<(), CryptoriskError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();
        env.storage()
            .instance()
            .set(&StorageKey::EntranceFee, &new_fee);
        Ok(())
    }

    pub fn upgrade(env: Env, new_wasm_hash: BytesN<32>) -> Result<(), CryptoriskError> {
        let admin = Self::load_admin(&env)?;
        admin.require_auth();
        env.deployer().update_current_contract_wasm(new_wasm_hash);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Randomness requests
    // ═══════════════════════════════════════════════════════════════════════════

    fn request_randomness(
        env: &Env,
        session_id: u32,
        session: &mut Session,
        purpose: RandomnessPurpose,
        num_words: u32,
    ) -> Result<u64, CryptoriskError> {
        let coordinator = RandomnessCoordinatorClient::new(env, &Self::load_coordinator(env)?);
        let request_id =
            coordinator.request_random_words(&env.current_contract_address(), &num_words);

        let key = StorageKey::Request(request_id);
        env.storage()
            .temporary()
            .set(&key, &PendingRequest { session_id, purpose });
        env.storage()
            .temporary()
            .extend_ttl(&key, SESSION_TTL_LEDGERS, SESSION_TTL_LEDGERS);
        Self::track_open_requests(env, true);

        session.awaiting_request = Some(request_id);
        session.last_request_id = Some(request_id);

        EvRandomnessRequested {
            session_id,
            request_id,
            purpose,
        }.publish(env);

        Ok(request_id)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Allocation
    // ═══════════════════════════════════════════════════════════════════════════

    fn seed_board(
        env: &Env,
        session_id: u32,
        request_id: u64,
        session: &mut Session,
        words: &Vec<u64>,
    ) -> Result<(), CryptoriskError> {
        if session.allocation != AllocationPhase::Seeding {
            return Err(CryptoriskError::WrongPhase);
        }
        let seed = take_words::<{ SEED_WORDS as usize }>(words)?;
        let owners = allocation::seed_owners(&seed);

        let mut territories = Vec::new(env);
        let mut t: u32 = 0;
        while t < TERRITORY_COUNT {
            territories.push_back(Territory {
                owner: owners[t as usize],
                troops: 1,
                continent: map::continent_of(t),
            });
            t += 1;
        }
        session.territories = territories;
        session.seed_words = words.clone();
        session.allocation = AllocationPhase::Seeded;

        EvReceivedRandomWords {
            session_id,
            request_id,
            word_count: words.len(),
        }.publish(env);

        Ok(())
    }

    fn finalize_board(
        env: &Env,
        session_id: u32,
        session: &mut Session,
        words: &Vec<u64>,
    ) -> Result<(), CryptoriskError> {
        if session.allocation != AllocationPhase::Finalizing {
            return Err(CryptoriskError::WrongPhase);
        }
        let draws = take_words::<{ FINALIZE_WORDS as usize }>(words)?;
        let owners = Self::owners(session);
        let troops = allocation::finalize_troops(&owners, &draws);

        let mut t: u32 = 0;
        while t < TERRITORY_COUNT {
            let mut tile = Self::tile(session, t)?;
            tile.troops = troops[t as usize];
            session.territories.set(t, tile);
            t += 1;
        }
        session.allocation = AllocationPhase::Complete;
        session.turn = Self::open_turn(&owners, 0, 1);

        let first_player = session
            .players
            .get(0)
            .ok_or(CryptoriskError::IndexOutOfRange)?;
        EvGameSetupComplete {
            session_id,
            first_player,
        }.publish(env);

        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Combat
    // ═══════════════════════════════════════════════════════════════════════════

    fn resolve_battle(
        env: &Env,
        session_id: u32,
        session: &mut Session,
        words: &Vec<u64>,
    ) -> Result<(), CryptoriskError> {
        let battle = match session.battle.clone() {
            PendingBattle::Rolling(battle) => battle,
            PendingBattle::Clear => return Err(CryptoriskError::UnknownRequest),
        };
        let mut turn = session.turn.clone();
        let dice_words = take_words::<{ BATTLE_WORDS as usize }>(words)?;

        let mut source = Self::tile(session, battle.from)?;
        let mut target = Self::tile(session, battle.to)?;
        let attacker_count = combat::attack_dice(battle.troops, source.troops);
        let defender_count = combat::defense_dice(target.troops);
        let roll = combat::roll_dice(&dice_words, attacker_count, defender_count);

        source.troops -= roll.attacker_losses;
        target.troops -= roll.defender_losses;

        let mut attacker_dice = Vec::new(env);
        for face in roll.attacker.iter().take(roll.attacker_count as usize) {
            attacker_dice.push_back(*face);
        }
        let mut defender_dice = Vec::new(env);
        for face in roll.defender.iter().take(roll.defender_count as usize) {
            defender_dice.push_back(*face);
        }
        EvDiceRolled {
            session_id,
            attacker_dice,
            defender_dice,
            attacker_losses: roll.attacker_losses,
            defender_losses: roll.defender_losses,
        }.publish(env);

        let conquered = target.troops == 0;
        if conquered {
            let previous_owner = target.owner;
            target.owner = turn.active_player;
            turn.pending_conquest = PendingConquest::Transfer(Conquest {
                from: battle.from,
                to: battle.to,
            });

            EvTerritoryConquered {
                session_id,
                territory: battle.to,
                new_owner: turn.active_player,
                previous_owner,
            }.publish(env);
        }

        session.territories.set(battle.from, source);
        session.territories.set(battle.to, target);
        session.battle = PendingBattle::Clear;

        if conquered
            && map::territories_owned(&Self::owners(session), turn.active_player) == TERRITORY_COUNT
        {
            let winner = session
                .players
                .get(turn.active_player)
                .ok_or(CryptoriskError::IndexOutOfRange)?;
            session.winner = Some(turn.active_player);
            EvGameOver {
                session_id,
                winner,
            }.publish(env);
        }

        session.turn = turn;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Turn order
    // ═══════════════════════════════════════════════════════════════════════════

    fn open_turn(owners: &Owners, seat: u32, turn_number: u32) -> TurnState {
        TurnState {
            active_player: seat,
            phase: TurnPhase::AwaitingDeploy,
            reinforcements: map::reinforcements_for(owners, seat),
            pending_conquest: PendingConquest::Clear,
            last_target: NO_TERRITORY,
            turn_number,
        }
    }

    /// Hand the turn to the next seat that still holds territory.
    fn advance_turn(env: &Env, session_id: u32, session: &mut Session, turn: &TurnState) {
        let owners = Self::owners(session);
        let mut next = turn.active_player;
        let mut step: u32 = 1;
        while step <= PLAYER_COUNT {
            let seat = (turn.active_player + step) % PLAYER_COUNT;
            if map::territories_owned(&owners, seat) > 0 {
                next = seat;
                break;
            }
            step += 1;
        }

        let turn_number = turn.turn_number.saturating_add(1);
        session.turn = Self::open_turn(&owners, next, turn_number);

        EvTurnEnded {
            session_id,
            player: turn.active_player,
            next_player: next,
            turn_number,
        }.publish(env);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Phase guards
    // ═══════════════════════════════════════════════════════════════════════════

    /// Current turn, if `player` is the one to move.
    fn require_turn(session: &Session, player: &Address) -> Result<TurnState, CryptoriskError> {
        if session.winner.is_some() {
            return Err(CryptoriskError::GameAlreadyEnded);
        }
        if session.allocation != AllocationPhase::Complete {
            return Err(CryptoriskError::RandomnessNotReady);
        }
        match session.players.get(session.turn.active_player) {
            Some(active) if active == *player => Ok(session.turn.clone()),
            _ => Err(CryptoriskError::NotYourTurn),
        }
    }

    fn require_no_pending_attack(session: &Session, turn: &TurnState) -> Result<(), CryptoriskError> {
        if let PendingBattle::Rolling(_) = session.battle {
            return Err(CryptoriskError::RandomnessNotReady);
        }
        if let PendingConquest::Transfer(_) = turn.pending_conquest {
            return Err(CryptoriskError::PendingTransferRequired);
        }
        Ok(())
    }

    /// At least one troop moves and at least one stays behind.
    fn check_movable(source: &Territory, troops: u32) -> Result<(), CryptoriskError> {
        if troops == 0 {
            return Err(CryptoriskError::InvalidTroopCount);
        }
        if troops >= source.troops {
            return Err(CryptoriskError::InsufficientTroops);
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Board access
    // ═══════════════════════════════════════════════════════════════════════════

    fn tile(session: &Session, territory: u32) -> Result<Territory, CryptoriskError> {
        if territory >= TERRITORY_COUNT {
            return Err(CryptoriskError::IndexOutOfRange);
        }
        session
            .territories
            .get(territory)
            .ok_or(CryptoriskError::RandomnessNotReady)
    }

    fn owners(session: &Session) -> Owners {
        let mut owners = [NO_PLAYER; TERRITORIES];
        for (t, tile) in session.territories.iter().enumerate().take(TERRITORIES) {
            owners[t] = tile.owner;
        }
        owners
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Storage
    // ═══════════════════════════════════════════════════════════════════════════

    fn open_session(env: &Env) -> Result<Session, CryptoriskError> {
        Ok(Session {
            lobby_state: LobbyState::Open,
            players: Vec::new(env),
            entrance_fee: Self::load_entrance_fee(env)?,
            pot: 0,
            allocation: AllocationPhase::NotStarted,
            territories: Vec::new(env),
            seed_words: Vec::new(env),
            turn: Self::open_turn(&[NO_PLAYER; TERRITORIES], 0, 0),
            battle: PendingBattle::Clear,
            awaiting_request: None,
            last_request_id: None,
            winner: None,
        })
    }

    fn try_read_session(env: &Env, session_id: u32) -> Option<Session> {
        env.storage()
            .temporary()
            .get(&StorageKey::Session(session_id))
    }

    fn read_session(env: &Env, session_id: u32) -> Result<Session, CryptoriskError> {
        Self::try_read_session(env, session_id).ok_or(CryptoriskError::GameNotFound)
    }

    /// Session whose allocation has completed.
    fn read_board(env: &Env, session_id: u32) -> Result<Session, CryptoriskError> {
        let session = Self::try_read_session(env, session_id)
            .ok_or(CryptoriskError::RandomnessNotReady)?;
        if session.allocation != AllocationPhase::Complete {
            return Err(CryptoriskError::RandomnessNotReady);
        }
        Ok(session)
    }

    fn write_session(env: &Env, session_id: u32, session: &Session) {
        let key = StorageKey::Session(session_id);
        env.storage().temporary().set(&key, session);
        env.storage()
            .temporary()
            .extend_ttl(&key, SESSION_TTL_LEDGERS, SESSION_TTL_LEDGERS);
        // Keep instance storage (admin, coordinator, fee) alive
        env.storage()
            .instance()
            .extend_ttl(SESSION_TTL_LEDGERS, SESSION_TTL_LEDGERS);
    }

    fn load_admin(env: &Env) -> Result<Address, CryptoriskError> {
        env.storage()
            .instance()
            .get(&StorageKey::Admin)
            .ok_or(CryptoriskError::AdminNotSet)
    }

    fn load_coordinator(env: &Env) -> Result<Address, CryptoriskError> {
        env.storage()
            .instance()
            .get(&StorageKey::CoordinatorAddress)
            .ok_or(CryptoriskError::CoordinatorNotSet)
    }

    fn load_entrance_fee(env: &Env) -> Result<i128, CryptoriskError> {
        env.storage()
            .instance()
            .get(&StorageKey::EntranceFee)
            .ok_or(CryptoriskError::EntranceFeeNotSet)
    }

    /// Requests issued to the current coordinator and not yet fulfilled.
    fn open_requests(env: &Env) -> u32 {
        env.storage()
            .instance()
            .get(&StorageKey::OpenRequests)
            .unwrap_or(0)
    }

    fn track_open_requests(env: &Env, issued: bool) {
        let open = Self::open_requests(env);
        let open = if issued {
            open.saturating_add(1)
        } else {
            open.saturating_sub(1)
        };
        env.storage()
            .instance()
            .set(&StorageKey::OpenRequests, &open);
    }
}

/// Copy the first `N` words out of the host vector.
fn take_words<const N: usize>(words: &Vec<u64>) -> Result<[u64; N], CryptoriskError> {
    if words.len() < N as u32 {
        return Err(CryptoriskError::NotEnoughRandomWords);
    }
    let mut out = [0u64; N];
    let mut i = 0;
    while i < N {
        out[i] = words.get_unchecked(i as u32);
        i += 1;
    }
    Ok(out)
}
