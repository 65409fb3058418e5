use super::non_blank;
use crate::error::{EtlError, EtlResult};
use crate::staging::EventRecord;
use crate::warehouse::schema::USERS;
use crate::warehouse::UserRow;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct UserState {
    first_name: Option<String>,
    last_name: Option<String>,
    gender: Option<String>,
    level: Option<String>,
}

fn overwrite(slot: &mut Option<String>, value: &Option<String>) {
    if let Some(v) = non_blank(value) {
        *slot = Some(v.to_string());
    }
}

/// One row per user id, carrying the attributes of the user's latest event.
///
/// Events are replayed in (ts, sessionId, itemInSession, staging order);
/// missing attributes never erase a value seen earlier.
pub fn build_users(events: &[EventRecord]) -> EtlResult<Vec<UserRow>> {
    let mut ordered: Vec<&EventRecord> = events.iter().filter(|e| e.user_id.is_some()).collect();
    // stable, so staging order breaks the remaining ties
    ordered.sort_by_key(|e| (e.ts, e.session_id, e.item_in_session));

    let mut users: BTreeMap<i64, UserState> = BTreeMap::new();
    for event in ordered {
        let Some(user_id) = event.user_id else {
            continue;
        };
        let state = users.entry(user_id).or_default();
        overwrite(&mut state.first_name, &event.first_name);
        overwrite(&mut state.last_name, &event.last_name);
        overwrite(&mut state.gender, &event.gender);
        overwrite(&mut state.level, &event.level);
    }

    let without_level: Vec<i64> = users
        .iter()
        .filter(|(_, state)| state.level.is_none())
        .map(|(id, _)| *id)
        .collect();
    if !without_level.is_empty() {
        return Err(EtlError::transform(
            USERS,
            format!("{} users have no subscription level", without_level.len()),
            without_level.iter().map(|id| format!("userId={}", id)),
        ));
    }

    Ok(users
        .into_iter()
        .filter_map(|(user_id, state)| {
            Some(UserRow {
                user_id,
                first_name: state.first_name,
                last_name: state.last_name,
                gender: state.gender,
                level: state.level?,
            })
        })
        .collect())
}
