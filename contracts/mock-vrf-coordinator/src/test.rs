#![cfg(test)]

use crate::{CoordinatorError, MockVrfCoordinator, MockVrfCoordinatorClient, MAX_NUM_WORDS};
use soroban_sdk::testutils::Ledger as _;
use soroban_sdk::{contract, contractimpl, contracttype, vec, Address, Env, Vec};

// ════════════════════════════════════════════════════════════════════════════
//  Mock consumer (records the words it receives)
// ════════════════════════════════════════════════════════════════════════════

#[contracttype]
#[derive(Clone)]
enum ConsumerKey {
    Words(u64),
    Deliveries,
}

#[contract]
pub struct MockConsumer;

#[contractimpl]
impl MockConsumer {
    pub fn fulfill_random_words(env: Env, request_id: u64, words: Vec<u64>) {
        env.storage().instance().set(&ConsumerKey::Words(request_id), &words);
        let count: u32 = env.storage().instance().get(&ConsumerKey::Deliveries).unwrap_or(0);
        env.storage().instance().set(&ConsumerKey::Deliveries, &(count + 1));
    }

    pub fn get_words(env: Env, request_id: u64) -> Option<Vec<u64>> {
        env.storage().instance().get(&ConsumerKey::Words(request_id))
    }

    pub fn get_deliveries(env: Env) -> u32 {
        env.storage().instance().get(&ConsumerKey::Deliveries).unwrap_or(0)
    }
}

// ════════════════════════════════════════════════════════════════════════════
//  Helpers
// ════════════════════════════════════════════════════════════════════════════

fn setup() -> (
    Env,
    MockVrfCoordinatorClient<'static>,
    MockConsumerClient<'static>,
    Address,
) {
    let env = Env::default();
    env.mock_all_auths();

    env.ledger().set(soroban_sdk::testutils::LedgerInfo {
        timestamp: 1_700_000_000,
        protocol_version: 25,
        sequence_number: 100,
        network_id: Default::default(),
        base_reserve: 10,
        min_temp_entry_ttl: u32::MAX / 2,
        min_persistent_entry_ttl: u32::MAX / 2,
        max_entry_ttl: u32::MAX / 2,
    });

    let coordinator_id = env.register(MockVrfCoordinator, ());
    let coordinator = MockVrfCoordinatorClient::new(&env, &coordinator_id);

    let consumer_id = env.register(MockConsumer, ());
    let consumer = MockConsumerClient::new(&env, &consumer_id);

    (env, coordinator, consumer, consumer_id)
}

fn assert_coordinator_error<T, E>(
    result: &Result<Result<T, E>, Result<CoordinatorError, soroban_sdk::InvokeError>>,
    expected: CoordinatorError,
) {
    match result {
        Err(Ok(actual)) => assert_eq!(*actual, expected),
        Err(Err(invoke_err)) => panic!("Expected {:?}, got invoke error: {:?}", expected, invoke_err),
        Ok(_) => panic!("Expected error {:?}, but operation succeeded", expected),
    }
}

// ════════════════════════════════════════════════════════════════════════════
//  Requests
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn request_ids_start_at_one_and_increase() {
    let (_env, coordinator, _consumer, consumer_id) = setup();

    assert_eq!(coordinator.request_random_words(&consumer_id, &3), 1);
    assert_eq!(coordinator.request_random_words(&consumer_id, &3), 2);
    assert_eq!(coordinator.request_random_words(&consumer_id, &1), 3);

    let pending = coordinator.get_request(&2).unwrap();
    assert_eq!(pending.consumer, consumer_id);
    assert_eq!(pending.num_words, 3);
}

#[test]
fn zero_or_too_many_words_rejected() {
    let (_env, coordinator, _consumer, consumer_id) = setup();

    let result = coordinator.try_request_random_words(&consumer_id, &0);
    assert_coordinator_error(&result, CoordinatorError::InvalidNumWords);

    let result = coordinator.try_request_random_words(&consumer_id, &(MAX_NUM_WORDS + 1));
    assert_coordinator_error(&result, CoordinatorError::InvalidNumWords);
}

// ════════════════════════════════════════════════════════════════════════════
//  Fulfillment
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn fulfill_delivers_requested_word_count() {
    let (_env, coordinator, consumer, consumer_id) = setup();
    let request_id = coordinator.request_random_words(&consumer_id, &42);

    coordinator.fulfill_random_words(&request_id);

    let words = consumer.get_words(&request_id).unwrap();
    assert_eq!(words.len(), 42);
    assert_eq!(consumer.get_deliveries(), 1);
    assert!(coordinator.get_request(&request_id).is_none());
}

#[test]
fn derived_words_depend_only_on_request_id() {
    let (_env_a, coordinator_a, consumer_a, consumer_a_id) = setup();
    let (_env_b, coordinator_b, consumer_b, consumer_b_id) = setup();

    let id_a = coordinator_a.request_random_words(&consumer_a_id, &5);
    let id_b = coordinator_b.request_random_words(&consumer_b_id, &5);
    coordinator_a.fulfill_random_words(&id_a);
    coordinator_b.fulfill_random_words(&id_b);

    assert_eq!(consumer_a.get_words(&id_a), consumer_b.get_words(&id_b));

    let id_next = coordinator_a.request_random_words(&consumer_a_id, &5);
    coordinator_a.fulfill_random_words(&id_next);
    assert_ne!(consumer_a.get_words(&id_a), consumer_a.get_words(&id_next));
}

#[test]
fn override_words_are_delivered_verbatim() {
    let (env, coordinator, consumer, consumer_id) = setup();
    let request_id = coordinator.request_random_words(&consumer_id, &3);

    let words = vec![&env, 7u64, 0u64, u64::MAX];
    coordinator.fulfill_with_words(&request_id, &words);

    assert_eq!(consumer.get_words(&request_id).unwrap(), words);
}

#[test]
fn override_with_wrong_length_rejected_and_request_kept() {
    let (env, coordinator, consumer, consumer_id) = setup();
    let request_id = coordinator.request_random_words(&consumer_id, &3);

    let result =
        coordinator.try_fulfill_with_words(&request_id, &vec![&env, 1u64, 2u64]);
    assert_coordinator_error(&result, CoordinatorError::InvalidNumWords);

    assert!(coordinator.get_request(&request_id).is_some());
    assert_eq!(consumer.get_deliveries(), 0);
}

#[test]
fn unknown_request_rejected() {
    let (_env, coordinator, _consumer, _consumer_id) = setup();
    let result = coordinator.try_fulfill_random_words(&0);
    assert_coordinator_error(&result, CoordinatorError::NonexistentRequest);
    let result = coordinator.try_fulfill_random_words(&1);
    assert_coordinator_error(&result, CoordinatorError::NonexistentRequest);
}

#[test]
fn request_fulfilled_only_once() {
    let (_env, coordinator, consumer, consumer_id) = setup();
    let request_id = coordinator.request_random_words(&consumer_id, &2);

    coordinator.fulfill_random_words(&request_id);
    let result = coordinator.try_fulfill_random_words(&request_id);
    assert_coordinator_error(&result, CoordinatorError::NonexistentRequest);
    assert_eq!(consumer.get_deliveries(), 1);
}
