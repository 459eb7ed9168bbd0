use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use uuid::Uuid;

use super::{Scheduler, SchedulerOptions, RANDOM_ALGORITHM};
use crate::database::Database;
use crate::errors::{FlashcardsError, Result};
use crate::log_scheduler_event;
use crate::models::{Card, Deck, DeckState};

/// Uniform random pick over the deck.
///
/// Deck parameters:
/// - `unseen_first`: while some cards have never been reviewed, pick among those only
/// - `never_repeat`: never hand out `state.last_reviewed_card` again when another card exists
pub struct RandomScheduler {
    db: Database,
    deck: Deck,
    rng: StdRng,
    max_resample_attempts: usize,
}

impl RandomScheduler {
    pub fn new(db: Database, deck: Deck) -> Self {
        Self::with_options(db, deck, SchedulerOptions::default())
    }

    pub fn with_options(db: Database, deck: Deck, options: SchedulerOptions) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            db,
            deck,
            rng,
            max_resample_attempts: options.max_resample_attempts,
        }
    }

    pub(super) fn boxed(db: Database, deck: Deck, options: SchedulerOptions) -> Box<dyn Scheduler> {
        Box::new(Self::with_options(db, deck, options))
    }

    /// Restart the random sequence from `seed`
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn pick(&mut self, mut cards: Vec<Card>) -> Card {
        let index = self.rng.gen_range(0..cards.len());
        cards.swap_remove(index)
    }

    fn pick_avoiding(&mut self, cards: Vec<Card>, avoid: Uuid) -> Result<Card> {
        for _ in 0..self.max_resample_attempts {
            let index = self.rng.gen_range(0..cards.len());
            if cards[index].id != avoid {
                return Ok(cards[index].clone());
            }
        }

        log_scheduler_event!(
            warn,
            RANDOM_ALGORITHM,
            deck_id = self.deck.id,
            "resampling exhausted"
        );
        Err(FlashcardsError::InternalConsistency(format!(
            "Could not avoid repeating card {} in deck {} after {} attempts",
            avoid, self.deck.id, self.max_resample_attempts
        )))
    }
}

#[async_trait]
impl Scheduler for RandomScheduler {
    fn algorithm(&self) -> &'static str {
        RANDOM_ALGORITHM
    }

    fn deck(&self) -> &Deck {
        &self.deck
    }

    async fn next_card(&mut self) -> Result<Card> {
        let mut cards = self.db.get_cards_for_deck(self.deck.id).await?;

        if cards.is_empty() {
            return Err(FlashcardsError::EmptyDeck(self.deck.id));
        }
        if cards.len() == 1 {
            return Ok(cards.remove(0));
        }

        if self.deck.parameters.unseen_first() {
            let unseen = self.db.get_unseen_cards_for_deck(self.deck.id).await?;
            if !unseen.is_empty() {
                let card = self.pick(unseen);
                log_scheduler_event!(
                    pick,
                    RANDOM_ALGORITHM,
                    deck_id = self.deck.id,
                    card_id = card.id,
                    "unseen"
                );
                return Ok(card);
            }
        }

        let card = match self.deck.state.last_reviewed_card {
            Some(last) if self.deck.parameters.never_repeat() => self.pick_avoiding(cards, last)?,
            _ => self.pick(cards),
        };

        log_scheduler_event!(
            pick,
            RANDOM_ALGORITHM,
            deck_id = self.deck.id,
            card_id = card.id,
            "uniform"
        );
        Ok(card)
    }

    async fn process_test_result(&mut self, card: &Card, result: Value) -> Result<()> {
        if card.deck_id != self.deck.id {
            return Err(FlashcardsError::CardNotInDeck {
                card_id: card.id,
                card_deck_id: card.deck_id,
                deck_id: self.deck.id,
            });
        }

        let changes = DeckState {
            last_reviewed_card: Some(card.id),
            ..DeckState::default()
        };

        let (review, state) = self
            .db
            .record_review(self.deck.id, card.id, result, RANDOM_ALGORITHM, &changes)
            .await?;

        log_scheduler_event!(
            review,
            RANDOM_ALGORITHM,
            deck_id = self.deck.id,
            card_id = card.id,
            result = review.result
        );

        self.deck.state = state;
        Ok(())
    }

    async fn reload_deck(&mut self) -> Result<()> {
        self.deck = self
            .db
            .get_deck(self.deck.id)
            .await?
            .ok_or_else(|| FlashcardsError::not_found("Deck", self.deck.id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateCardRequest, CreateDeckRequest, CreateFactRequest, DeckParameters};
    use serde_json::json;

    async fn setup_deck(parameters: DeckParameters, card_count: usize) -> (Database, Deck, Vec<Card>) {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let mut request = CreateDeckRequest::new("Capitals", RANDOM_ALGORITHM);
        request.parameters = parameters;
        let deck = db.create_deck(request).await.unwrap();

        let mut cards = Vec::new();
        for i in 0..card_count {
            let question = db
                .create_fact(CreateFactRequest {
                    value: format!("Question {}", i),
                    format: "text".to_string(),
                })
                .await
                .unwrap();
            let answer = db
                .create_fact(CreateFactRequest {
                    value: format!("Answer {}", i),
                    format: "text".to_string(),
                })
                .await
                .unwrap();
            let card = db
                .create_card(CreateCardRequest {
                    deck_id: deck.id,
                    question_id: question.id,
                    answer_id: answer.id,
                })
                .await
                .unwrap();
            cards.push(card);
        }

        (db, deck, cards)
    }

    fn seeded(db: Database, deck: Deck, seed: u64) -> RandomScheduler {
        RandomScheduler::with_options(
            db,
            deck,
            SchedulerOptions {
                seed: Some(seed),
                ..SchedulerOptions::default()
            },
        )
    }

    #[tokio::test]
    async fn test_empty_deck() {
        let (db, deck, _) = setup_deck(DeckParameters::default(), 0).await;
        let deck_id = deck.id;
        let mut scheduler = RandomScheduler::new(db, deck);

        match scheduler.next_card().await {
            Err(FlashcardsError::EmptyDeck(id)) => assert_eq!(id, deck_id),
            other => panic!("Expected EmptyDeck, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_single_card_with_never_repeat() {
        let parameters = DeckParameters {
            never_repeat: Some(true),
            ..DeckParameters::default()
        };
        let (db, deck, cards) = setup_deck(parameters, 1).await;
        let mut scheduler = RandomScheduler::new(db, deck);

        for _ in 0..3 {
            let card = scheduler.next_card().await.unwrap();
            assert_eq!(card, cards[0]);
            scheduler.process_test_result(&card, json!(true)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_same_seed_same_sequence() {
        let (db, deck, _) = setup_deck(DeckParameters::default(), 3).await;
        let mut first = seeded(db.clone(), deck.clone(), 7);
        let mut second = seeded(db, deck, 7);

        for _ in 0..10 {
            let a = first.next_card().await.unwrap();
            let b = second.next_card().await.unwrap();
            assert_eq!(a.id, b.id);
        }
    }

    #[tokio::test]
    async fn test_reseed_restarts_sequence() {
        let (db, deck, _) = setup_deck(DeckParameters::default(), 3).await;
        let mut scheduler = seeded(db, deck, 42);

        let mut first_run = Vec::new();
        for _ in 0..5 {
            first_run.push(scheduler.next_card().await.unwrap().id);
        }

        scheduler.reseed(42);
        for expected in first_run {
            assert_eq!(scheduler.next_card().await.unwrap().id, expected);
        }
    }

    #[tokio::test]
    async fn test_process_test_result_updates_state() {
        let (db, deck, cards) = setup_deck(DeckParameters::default(), 2).await;
        let mut scheduler = RandomScheduler::new(db.clone(), deck.clone());

        scheduler
            .process_test_result(&cards[1], json!({"correct": false}))
            .await
            .unwrap();

        assert_eq!(scheduler.deck().state.last_reviewed_card, Some(cards[1].id));

        let stored = db.get_deck(deck.id).await.unwrap().unwrap();
        assert_eq!(stored.state.last_reviewed_card, Some(cards[1].id));

        let reviews = db.get_reviews_for_card(cards[1].id).await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].algorithm, deck.algorithm);
        assert_eq!(reviews[0].result, json!({"correct": false}));
        assert_eq!(reviews[0].card_id, Some(cards[1].id));
    }

    #[tokio::test]
    async fn test_foreign_card_rejected() {
        let (db, deck, _) = setup_deck(DeckParameters::default(), 2).await;
        let mut other_request = CreateDeckRequest::new("Other", RANDOM_ALGORITHM);
        other_request.description = Some("Another deck".to_string());
        let other_deck = db.create_deck(other_request).await.unwrap();
        let fact = db
            .create_fact(CreateFactRequest {
                value: "Stray".to_string(),
                format: "text".to_string(),
            })
            .await
            .unwrap();
        let foreign = db
            .create_card(CreateCardRequest {
                deck_id: other_deck.id,
                question_id: fact.id,
                answer_id: fact.id,
            })
            .await
            .unwrap();

        let mut scheduler = RandomScheduler::new(db.clone(), deck.clone());
        let result = scheduler.process_test_result(&foreign, json!(true)).await;

        assert!(matches!(
            result,
            Err(FlashcardsError::CardNotInDeck { card_id, .. }) if card_id == foreign.id
        ));
        assert_eq!(db.count_reviews_for_card(foreign.id).await.unwrap(), 0);
        assert_eq!(scheduler.deck().state.last_reviewed_card, None);
        let stored = db.get_deck(deck.id).await.unwrap().unwrap();
        assert_eq!(stored.state.last_reviewed_card, None);
    }

    #[tokio::test]
    async fn test_resample_exhaustion_is_reported() {
        let parameters = DeckParameters {
            never_repeat: Some(true),
            ..DeckParameters::default()
        };
        let (db, deck, cards) = setup_deck(parameters, 2).await;
        let mut scheduler = RandomScheduler::with_options(
            db,
            deck,
            SchedulerOptions {
                seed: Some(1),
                max_resample_attempts: 0,
            },
        );
        scheduler
            .process_test_result(&cards[0], json!(true))
            .await
            .unwrap();

        let result = scheduler.next_card().await;
        assert!(matches!(
            result,
            Err(FlashcardsError::InternalConsistency(_))
        ));
    }

    #[tokio::test]
    async fn test_reload_deck_picks_up_changes() {
        let (db, deck, _) = setup_deck(DeckParameters::default(), 2).await;
        let mut scheduler = RandomScheduler::new(db.clone(), deck.clone());

        db.update_deck(
            deck.id,
            crate::models::UpdateDeckRequest {
                parameters: Some(DeckParameters {
                    unseen_first: Some(true),
                    ..DeckParameters::default()
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(!scheduler.deck().parameters.unseen_first());
        scheduler.reload_deck().await.unwrap();
        assert!(scheduler.deck().parameters.unseen_first());

        db.delete_deck(deck.id).await.unwrap();
        assert!(matches!(
            scheduler.reload_deck().await,
            Err(FlashcardsError::NotFound(_))
        ));
    }
}
