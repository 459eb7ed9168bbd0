use serde_json::Value;

use crate::database::Database;
use crate::errors::Result;
use crate::models::{Card, Deck};
use crate::schedulers::{self, Scheduler, SchedulerOptions};
use crate::log_study_event;

/// Drives one learner through a deck: report how the last card went, get the next one
pub struct StudySession {
    scheduler: Box<dyn Scheduler>,
}

impl StudySession {
    pub fn new(db: Database, deck: Deck) -> Result<Self> {
        Self::with_options(db, deck, SchedulerOptions::default())
    }

    pub fn with_options(db: Database, deck: Deck, options: SchedulerOptions) -> Result<Self> {
        let scheduler = schedulers::for_deck_with_options(db, deck, options)?;
        log_study_event!(
            start,
            deck_id = scheduler.deck().id,
            algorithm = scheduler.algorithm()
        );
        Ok(Self { scheduler })
    }

    /// Record `result` for `studied_card` when one is given, then return the next card.
    ///
    /// A missing result is recorded as JSON `null`.
    pub async fn advance(&mut self, studied_card: Option<&Card>, result: Option<Value>) -> Result<Card> {
        if let Some(card) = studied_card {
            self.scheduler
                .process_test_result(card, result.unwrap_or(Value::Null))
                .await?;
        }

        let next = self.scheduler.next_card().await?;
        log_study_event!(
            advance,
            deck_id = self.scheduler.deck().id,
            studied = studied_card.map(|card| card.id),
            next = next.id
        );
        Ok(next)
    }

    pub fn deck(&self) -> &Deck {
        self.scheduler.deck()
    }

    pub fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    pub fn scheduler_mut(&mut self) -> &mut dyn Scheduler {
        self.scheduler.as_mut()
    }
}
