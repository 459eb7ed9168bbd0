use flashcards_core::{
    Card, CreateCardRequest, CreateDeckRequest, CreateFactRequest, Database, Deck, FlashcardsError,
    Scheduler, SchedulerOptions, StudySession,
};
use serde_json::{json, Value};

async fn setup(name: &str, parameters: Value, card_count: usize) -> (Database, Deck, Vec<Card>) {
    let db = Database::new("sqlite::memory:").await.unwrap();
    let mut request = CreateDeckRequest::new(name, "random");
    request.parameters = serde_json::from_value(parameters).unwrap();
    let deck = db.create_deck(request).await.unwrap();

    let mut cards = Vec::new();
    for i in 0..card_count {
        let question = db
            .create_fact(CreateFactRequest {
                value: format!("Q{}", i),
                format: "text".to_string(),
            })
            .await
            .unwrap();
        let answer = db
            .create_fact(CreateFactRequest {
                value: format!("A{}", i),
                format: "text".to_string(),
            })
            .await
            .unwrap();
        cards.push(
            db.create_card(CreateCardRequest {
                deck_id: deck.id,
                question_id: question.id,
                answer_id: answer.id,
            })
            .await
            .unwrap(),
        );
    }
    (db, deck, cards)
}

#[tokio::test]
async fn test_study_loop_never_repeats() {
    let (db, deck, _) = setup("Loop", json!({"never_repeat": true}), 2).await;
    let options = SchedulerOptions {
        seed: Some(99),
        ..SchedulerOptions::default()
    };
    let mut session = StudySession::with_options(db.clone(), deck.clone(), options).unwrap();

    let mut current = session.advance(None, None).await.unwrap();
    for round in 0..10 {
        let next = session
            .advance(Some(&current), Some(json!({"round": round})))
            .await
            .unwrap();
        assert_ne!(next.id, current.id);
        current = next;
    }

    assert_eq!(db.get_all_reviews(0, 100).await.unwrap().len(), 10);
    let stored = db.get_deck(deck.id).await.unwrap().unwrap();
    assert_eq!(stored.state, session.deck().state);
}

#[tokio::test]
async fn test_unseen_first_session_covers_deck() {
    let (db, deck, cards) = setup("Coverage", json!({"unseen_first": true}), 4).await;
    let mut session = StudySession::new(db.clone(), deck.clone()).unwrap();

    let mut studied = Vec::new();
    let mut current = session.advance(None, None).await.unwrap();
    for _ in 0..cards.len() - 1 {
        studied.push(current.id);
        current = session.advance(Some(&current), Some(json!(true))).await.unwrap();
        assert!(!studied.contains(&current.id));
    }

    session.advance(Some(&current), Some(json!(true))).await.unwrap();
    assert_eq!(db.count_unseen_cards(deck.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_deck_session() {
    let (db, deck, _) = setup("Nothing", json!({}), 0).await;
    let mut session = StudySession::new(db, deck).unwrap();

    assert!(matches!(
        session.advance(None, None).await,
        Err(FlashcardsError::EmptyDeck(_))
    ));
}

#[tokio::test]
async fn test_foreign_card_stops_advance() {
    let (db, deck, _) = setup("Mine", json!({}), 2).await;
    let (_, _, foreign_cards) = setup("Theirs", json!({}), 1).await;
    let mut session = StudySession::new(db.clone(), deck.clone()).unwrap();

    let result = session.advance(Some(&foreign_cards[0]), Some(json!(true))).await;
    assert!(matches!(result, Err(FlashcardsError::CardNotInDeck { .. })));
    assert!(db.get_all_reviews(0, 100).await.unwrap().is_empty());
    assert_eq!(session.deck().state.last_reviewed_card, None);
}

#[tokio::test]
async fn test_reload_through_session() {
    let (db, deck, cards) = setup("Reload", json!({}), 1).await;
    let mut session = StudySession::new(db.clone(), deck.clone()).unwrap();

    db.update_deck(
        deck.id,
        flashcards_core::UpdateDeckRequest {
            description: Some(Some("Edited elsewhere".to_string())),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    session.scheduler_mut().reload_deck().await.unwrap();
    assert_eq!(session.deck().description.as_deref(), Some("Edited elsewhere"));
    assert_eq!(session.advance(None, None).await.unwrap().id, cards[0].id);
}
