#![no_std]

//! # Mock VRF Coordinator
//!
//! Development stand-in for a verifiable randomness service. Consumers ask
//! for `num_words` random words and get a request id back immediately; the
//! words arrive later, when someone calls `fulfill_random_words`, through the
//! consumer's own `fulfill_random_words(request_id, words)` entry point.
//!
//! ## Word derivation
//! Words are deterministic so that local games and tests are reproducible:
//!
//! ```text
//! word[i] = first 8 bytes (big-endian) of keccak256(request_id_be8 || i_be4)
//! ```
//!
//! `fulfill_with_words` lets a test pick the words itself.
//!
//! ## Guarantees
//! - Request ids start at 1 and increase by one per request.
//! - A request is fulfilled at most once; fulfilling an unknown or already
//!   fulfilled id fails with `NonexistentRequest`.

use soroban_sdk::{
    contract, contractclient, contracterror, contractevent, contractimpl, contracttype,
    Address, Bytes, Env, Vec,
};

// ═══════════════════════════════════════════════════════════════════════════════
//  Events
// ═══════════════════════════════════════════════════════════════════════════════

#[contractevent]
pub struct EvRandomWordsRequested {
    pub request_id: u64,
    pub consumer: Address,
    pub num_words: u32,
}

#[contractevent]
pub struct EvRandomWordsFulfilled {
    pub request_id: u64,
    pub consumer: Address,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Consumer interface
// ═══════════════════════════════════════════════════════════════════════════════

/// Callback every randomness consumer must expose.
#[contractclient(name = "RandomnessConsumerClient")]
pub trait RandomnessConsumer {
    fn fulfill_random_words(env: Env, request_id: u64, words: Vec<u64>);
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Errors & storage
// ═══════════════════════════════════════════════════════════════════════════════

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum CoordinatorError {
    NonexistentRequest = 1,
    InvalidNumWords = 2,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RandomnessRequest {
    pub consumer: Address,
    pub num_words: u32,
}

#[contracttype]
#[derive(Clone)]
enum DataKey {
    NextRequestId,
    Request(u64),
}

/// Upper bound on words per request.
pub const MAX_NUM_WORDS: u32 = 500;

// Ledger rate is approximately 5 seconds per ledger on Stellar
const LEDGER_RATE_SECS: u32 = 5;

// Pending requests live for 7 days
const REQUEST_TTL_SECONDS: u32 = 7 * 24 * 60 * 60;
const REQUEST_TTL_LEDGERS: u32 = REQUEST_TTL_SECONDS / LEDGER_RATE_SECS;

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract
// ═══════════════════════════════════════════════════════════════════════════════

#[contract]
pub struct MockVrfCoordinator;

#[contractimpl]
impl MockVrfCoordinator {
    /// Register a request for `num_words` words on behalf of `consumer`.
    /// A contract calling this for itself is authorized implicitly.
    pub fn request_random_words(
        env: Env,
        consumer: Address,
        num_words: u32,
    ) -> Result<u64, CoordinatorError> {
        consumer.require_auth();

        if num_words == 0 || num_words > MAX_NUM_WORDS {
            return Err(CoordinatorError::InvalidNumWords);
        }

        let request_id: u64 = env
            .storage()
            .instance()
            .get(&DataKey::NextRequestId)
            .unwrap_or(1);
        env.storage()
            .instance()
            .set(&DataKey::NextRequestId, &(request_id + 1));

        let key = DataKey::Request(request_id);
        env.storage().persistent().set(
            &key,
            &RandomnessRequest {
                consumer: consumer.clone(),
                num_words,
            },
        );
        env.storage()
            .persistent()
            .extend_ttl(&key, REQUEST_TTL_LEDGERS, REQUEST_TTL_LEDGERS);

        EvRandomWordsRequested {
            request_id,
            consumer,
            num_words,
        }.publish(&env);

        Ok(request_id)
    }

    /// Fulfill a request with words derived from its id.
    pub fn fulfill_random_words(env: Env, request_id: u64) -> Result<(), CoordinatorError> {
        let request = Self::take_request(&env, request_id)?;

        let mut words = Vec::new(&env);
        let mut i: u32 = 0;
        while i < request.num_words {
            words.push_back(Self::derive_word(&env, request_id, i));
            i += 1;
        }

        Self::deliver(&env, request_id, &request, &words);
        Ok(())
    }

    /// Fulfill a request with caller-chosen words. The word count must match
    /// the count that was requested.
    pub fn fulfill_with_words(
        env: Env,
        request_id: u64,
        words: Vec<u64>,
    ) -> Result<(), CoordinatorError> {
        let request = Self::take_request(&env, request_id)?;
        if words.len() != request.num_words {
            return Err(CoordinatorError::InvalidNumWords);
        }

        Self::deliver(&env, request_id, &request, &words);
        Ok(())
    }

    /// Look up a request that has not been fulfilled yet.
    pub fn get_request(env: Env, request_id: u64) -> Option<RandomnessRequest> {
        env.storage()
            .persistent()
            .get(&DataKey::Request(request_id))
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Internal
    // ───────────────────────────────────────────────────────────────────────────

    fn take_request(env: &Env, request_id: u64) -> Result<RandomnessRequest, CoordinatorError> {
        let key = DataKey::Request(request_id);
        let request: RandomnessRequest = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(CoordinatorError::NonexistentRequest)?;
        env.storage().persistent().remove(&key);
        Ok(request)
    }

    fn deliver(env: &Env, request_id: u64, request: &RandomnessRequest, words: &Vec<u64>) {
        let consumer = RandomnessConsumerClient::new(env, &request.consumer);
        consumer.fulfill_random_words(&request_id, words);

        EvRandomWordsFulfilled {
            request_id,
            consumer: request.consumer.clone(),
        }.publish(env);
    }

    fn derive_word(env: &Env, request_id: u64, index: u32) -> u64 {
        let mut preimage = Bytes::from_array(env, &request_id.to_be_bytes());
        preimage.append(&Bytes::from_array(env, &index.to_be_bytes()));
        let digest = env.crypto().keccak256(&preimage).to_array();

        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(word)
    }
}

#[cfg(test)]
mod test;
