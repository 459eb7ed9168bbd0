use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::DEFAULT_MAX_RESAMPLE_ATTEMPTS;
use crate::database::Database;
use crate::errors::{FlashcardsError, Result};
use crate::models::{Card, Deck};

pub mod random;

pub use random::RandomScheduler;

pub const RANDOM_ALGORITHM: &str = "random";

/// A scheduling policy bound to one deck.
///
/// `next_card` never writes to the store. `process_test_result` is the only
/// place a policy records reviews or touches the deck's state.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Identifier the policy is registered under; stamped on every review it records
    fn algorithm(&self) -> &'static str;

    /// The deck snapshot the scheduler works from
    fn deck(&self) -> &Deck;

    async fn next_card(&mut self) -> Result<Card>;

    async fn process_test_result(&mut self, card: &Card, result: Value) -> Result<()>;

    /// Refresh the deck snapshot from the store
    async fn reload_deck(&mut self) -> Result<()>;
}

/// Knobs that belong to the running process rather than to a deck
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    pub seed: Option<u64>,
    pub max_resample_attempts: usize,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            seed: None,
            max_resample_attempts: DEFAULT_MAX_RESAMPLE_ATTEMPTS,
        }
    }
}

pub type SchedulerConstructor = fn(Database, Deck, SchedulerOptions) -> Box<dyn Scheduler>;

// Registering a policy is one more row here
const SCHEDULERS: &[(&str, SchedulerConstructor)] = &[(RANDOM_ALGORITHM, RandomScheduler::boxed)];

pub fn list_available() -> BTreeSet<&'static str> {
    SCHEDULERS.iter().map(|(name, _)| *name).collect()
}

pub fn resolve(algorithm: &str) -> Result<SchedulerConstructor> {
    SCHEDULERS
        .iter()
        .find(|(name, _)| *name == algorithm)
        .map(|(_, constructor)| *constructor)
        .ok_or_else(|| FlashcardsError::UnknownAlgorithm {
            algorithm: algorithm.to_string(),
            available: list_available().into_iter().map(String::from).collect(),
        })
}

/// Instantiate the policy named by `deck.algorithm`, bound to the deck
pub fn for_deck(db: Database, deck: Deck) -> Result<Box<dyn Scheduler>> {
    for_deck_with_options(db, deck, SchedulerOptions::default())
}

pub fn for_deck_with_options(
    db: Database,
    deck: Deck,
    options: SchedulerOptions,
) -> Result<Box<dyn Scheduler>> {
    let constructor = resolve(&deck.algorithm)?;
    Ok(constructor(db, deck, options))
}
