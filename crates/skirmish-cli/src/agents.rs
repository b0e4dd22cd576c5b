//! Stand-in agents served in-process by `skirmish run`.

use serde_json::Value;
use skirmish_core::codec::StateValue;
use skirmish_core::domain::ActionToken;
use skirmish_core::ports::Decider;

fn turn_of(observation: &StateValue) -> Option<i64> {
    observation
        .get("turn")
        .and_then(StateValue::as_plain)
        .and_then(Value::as_i64)
}

fn sonobuoys(observation: &StateValue) -> usize {
    match observation.get("sonobuoys") {
        Some(StateValue::List(items)) => items.len(),
        _ => 0,
    }
}

/// Drops one sonobuoy per turn, then ends its phase.
pub fn pelican() -> impl Decider + 'static {
    let mut last_turn = None;
    move |observation: &StateValue| {
        let turn = turn_of(observation);
        if last_turn == Some(turn) {
            return ActionToken::End;
        }
        last_turn = Some(turn);
        let deployed = sonobuoys(observation);
        ActionToken::Move(format!("drop_sonobuoy_{deployed}"))
    }
}

/// Keeps diving until its move limit ends the phase.
pub fn panther() -> impl Decider + 'static {
    |observation: &StateValue| match turn_of(observation) {
        Some(_) => ActionToken::Move("dive".into()),
        None => ActionToken::Error,
    }
}
