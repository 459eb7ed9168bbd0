use anyhow::Result;
use tracing::info;

use flashcards_core::logging::init_logging;
use flashcards_core::{
    for_deck_with_options, log_system_event, resolve, Config, Database, Scheduler,
};

const PAGE_SIZE: i64 = 100;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    config.validate()?;

    let _guard = init_logging(&config.logging)?;
    log_system_event!(startup, component = "status", "Reading flashcard study status");

    let db = Database::new(&config.database.url).await?;
    info!("Database opened");

    let mut offset = 0;
    let mut total_decks = 0;
    println!(
        "{:<32} {:<12} {:>8} {:>8}  {}",
        "DECK", "ALGORITHM", "CARDS", "UNSEEN", "NEXT"
    );
    loop {
        let decks = db.get_all_decks(offset, PAGE_SIZE).await?;
        if decks.is_empty() {
            break;
        }

        for deck in &decks {
            let cards = db.count_cards_for_deck(deck.id).await?;
            let unseen = db.count_unseen_cards(deck.id).await?;
            let algorithm = match resolve(&deck.algorithm) {
                Ok(_) => deck.algorithm.clone(),
                Err(_) => format!("{} (?)", deck.algorithm),
            };

            // next_card only reads, so previewing leaves the deck untouched
            let mut next = String::from("-");
            if cards > 0 {
                if let Ok(mut scheduler) =
                    for_deck_with_options(db.clone(), deck.clone(), config.scheduler.options())
                {
                    next = match scheduler.next_card().await {
                        Ok(card) => match db.card_question(&card).await? {
                            Some(fact) => fact.value,
                            None => format!("card {} (question missing)", card.id),
                        },
                        Err(e) => format!("({})", e),
                    };
                }
            }

            println!(
                "{:<32} {:<12} {:>8} {:>8}  {}",
                deck.name, algorithm, cards, unseen, next
            );
        }

        total_decks += decks.len();
        offset += PAGE_SIZE;
    }

    if total_decks == 0 {
        println!("No decks found in {}", config.database.url);
    } else {
        println!("\n{} deck(s); (?) marks an algorithm with no registered scheduler", total_decks);
    }

    Ok(())
}
