use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub algorithm: String, // Scheduler identifier, see schedulers::list_available()
    pub parameters: DeckParameters,
    pub state: DeckState,
}

/// Scheduler configuration stored on a deck.
///
/// Keys the schedulers know about are typed; everything else lands in `extra`
/// and is written back untouched. A recognized key holding a value of the wrong
/// type reads as absent and stays in `extra` as it was.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct DeckParameters {
    /// Pick among cards that were never reviewed, if any
    pub unseen_first: Option<bool>,
    /// Never pick the same card twice in a row when the deck has more than one card
    pub never_repeat: Option<bool>,
    pub extra: Map<String, Value>,
}

impl DeckParameters {
    pub fn unseen_first(&self) -> bool {
        self.unseen_first.unwrap_or(false)
    }

    pub fn never_repeat(&self) -> bool {
        self.never_repeat.unwrap_or(false)
    }
}

impl From<Map<String, Value>> for DeckParameters {
    fn from(mut extra: Map<String, Value>) -> Self {
        Self {
            unseen_first: take_typed(&mut extra, "unseen_first", Value::as_bool),
            never_repeat: take_typed(&mut extra, "never_repeat", Value::as_bool),
            extra,
        }
    }
}

impl From<DeckParameters> for Map<String, Value> {
    fn from(parameters: DeckParameters) -> Self {
        let mut map = parameters.extra;
        if let Some(unseen_first) = parameters.unseen_first {
            map.insert("unseen_first".to_string(), Value::Bool(unseen_first));
        }
        if let Some(never_repeat) = parameters.never_repeat {
            map.insert("never_repeat".to_string(), Value::Bool(never_repeat));
        }
        map
    }
}

/// Scheduler-owned memory stored on a deck. Same leniency rules as [`DeckParameters`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct DeckState {
    pub last_reviewed_card: Option<Uuid>,
    pub extra: Map<String, Value>,
}

impl From<Map<String, Value>> for DeckState {
    fn from(mut extra: Map<String, Value>) -> Self {
        let last_reviewed_card = take_typed(&mut extra, "last_reviewed_card", |value| {
            value.as_str().and_then(|id| Uuid::parse_str(id).ok())
        });
        Self {
            last_reviewed_card,
            extra,
        }
    }
}

impl From<DeckState> for Map<String, Value> {
    fn from(state: DeckState) -> Self {
        let mut map = state.extra;
        if let Some(card_id) = state.last_reviewed_card {
            map.insert("last_reviewed_card".to_string(), Value::String(card_id.to_string()));
        }
        map
    }
}

/// Move `key` out of `map` when `read` understands it; otherwise leave it in place
fn take_typed<T>(map: &mut Map<String, Value>, key: &str, read: impl Fn(&Value) -> Option<T>) -> Option<T> {
    let typed = map.get(key).and_then(read)?;
    map.remove(key);
    Some(typed)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub id: Uuid,
    pub value: String,  // Plain text, markdown, a URL, a path...
    pub format: String, // How to read `value`: "text", "markdown", "image", "url"...
}

/// A card holds no content: it joins a deck with a question and an answer fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub deck_id: Uuid,
    pub question_id: Uuid,
    pub answer_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub card_id: Option<Uuid>,
    pub result: Value, // Shape depends on `algorithm`
    pub algorithm: String,
    pub datetime: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

/// Entities that can carry tags, each backed by its own association table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Taggable {
    Deck,
    Card,
    Fact,
}

impl Taggable {
    pub(crate) fn link_table(&self) -> &'static str {
        match self {
            Taggable::Deck => "deck_tags",
            Taggable::Card => "card_tags",
            Taggable::Fact => "fact_tags",
        }
    }

    pub(crate) fn entity_column(&self) -> &'static str {
        match self {
            Taggable::Deck => "deck_id",
            Taggable::Card => "card_id",
            Taggable::Fact => "fact_id",
        }
    }

    pub(crate) fn entity_table(&self) -> &'static str {
        match self {
            Taggable::Deck => "decks",
            Taggable::Card => "cards",
            Taggable::Fact => "facts",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagLink {
    pub entity: Taggable,
    pub entity_id: Uuid,
    pub tag_id: Uuid,
}

/// Which side of a card a context fact is shown with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextSide {
    Question,
    Answer,
}

impl ContextSide {
    pub(crate) fn link_table(&self) -> &'static str {
        match self {
            ContextSide::Question => "card_question_contexts",
            ContextSide::Answer => "card_answer_contexts",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardContext {
    pub card_id: Uuid,
    pub fact_id: Uuid,
    pub side: ContextSide,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRelation {
    pub original_fact_id: Uuid,
    pub related_fact_id: Uuid,
    pub relationship: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRelation {
    pub original_card_id: Uuid,
    pub related_card_id: Uuid,
    pub relationship: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeckRequest {
    pub name: String,
    pub description: Option<String>,
    pub algorithm: String,
    #[serde(default)]
    pub parameters: DeckParameters,
    #[serde(default)]
    pub state: DeckState,
}

impl CreateDeckRequest {
    pub fn new(name: &str, algorithm: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            algorithm: algorithm.to_string(),
            parameters: DeckParameters::default(),
            state: DeckState::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDeckRequest {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub algorithm: Option<String>,
    pub parameters: Option<DeckParameters>,
    pub state: Option<DeckState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFactRequest {
    pub value: String,
    pub format: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateFactRequest {
    pub value: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCardRequest {
    pub deck_id: Uuid,
    pub question_id: Uuid,
    pub answer_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCardRequest {
    pub deck_id: Option<Uuid>,
    pub question_id: Option<Uuid>,
    pub answer_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parameters_defaults_when_keys_missing() {
        let parameters: DeckParameters = serde_json::from_value(json!({})).unwrap();
        assert!(!parameters.unseen_first());
        assert!(!parameters.never_repeat());
        assert!(parameters.extra.is_empty());
    }

    #[test]
    fn test_parameters_recognized_keys() {
        let parameters: DeckParameters =
            serde_json::from_value(json!({"unseen_first": true, "never_repeat": false})).unwrap();
        assert!(parameters.unseen_first());
        assert_eq!(parameters.never_repeat, Some(false));
    }

    #[test]
    fn test_parameters_unknown_keys_preserved() {
        let raw = json!({"never_repeat": true, "new_cards_per_day": 20, "theme": "dark"});
        let parameters: DeckParameters = serde_json::from_value(raw.clone()).unwrap();

        assert!(parameters.never_repeat());
        assert_eq!(parameters.extra.get("new_cards_per_day"), Some(&json!(20)));
        assert_eq!(serde_json::to_value(&parameters).unwrap(), raw);
    }

    #[test]
    fn test_parameters_wrong_type_reads_as_default() {
        let parameters: DeckParameters =
            serde_json::from_value(json!({"unseen_first": "yes"})).unwrap();
        assert_eq!(parameters.unseen_first, None);
        assert!(!parameters.unseen_first());
    }

    #[test]
    fn test_parameters_wrong_type_survives_serialization() {
        let raw = json!({"unseen_first": "yes", "never_repeat": true});
        let parameters: DeckParameters = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(parameters.extra.get("unseen_first"), Some(&json!("yes")));
        assert_eq!(serde_json::to_value(&parameters).unwrap(), raw);
    }

    #[test]
    fn test_typed_value_replaces_stale_raw_value() {
        let mut parameters: DeckParameters =
            serde_json::from_value(json!({"unseen_first": "yes"})).unwrap();
        parameters.unseen_first = Some(true);

        assert_eq!(
            serde_json::to_value(&parameters).unwrap(),
            json!({"unseen_first": true})
        );
    }

    #[test]
    fn test_state_round_trip_keeps_extra_keys() {
        let card_id = Uuid::new_v4();
        let raw = json!({"last_reviewed_card": card_id.to_string(), "streak": 3});
        let state: DeckState = serde_json::from_value(raw.clone()).unwrap();

        assert_eq!(state.last_reviewed_card, Some(card_id));
        assert_eq!(serde_json::to_value(&state).unwrap(), raw);
    }

    #[test]
    fn test_state_invalid_card_pointer_reads_as_absent() {
        let state: DeckState =
            serde_json::from_value(json!({"last_reviewed_card": 42})).unwrap();
        assert_eq!(state.last_reviewed_card, None);

        let state: DeckState =
            serde_json::from_value(json!({"last_reviewed_card": "not-a-uuid"})).unwrap();
        assert_eq!(state.last_reviewed_card, None);
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({"last_reviewed_card": "not-a-uuid"})
        );
    }

    #[test]
    fn test_empty_parameters_serialize_to_empty_object() {
        let value = serde_json::to_value(DeckParameters::default()).unwrap();
        assert_eq!(value, json!({}));
    }
}
