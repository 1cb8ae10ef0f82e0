//! Nearest-agent matching.
//!
//! Pure functions over already-loaded records; the dispatch service feeds
//! them the pending queue and the available pool from inside its
//! transaction and performs the writes.

use crate::models::client::Client;
use crate::models::user::User;

/// Index of the positioned agent closest to `client`.
///
/// Agents without a known position are never selected. On equal distance
/// the earlier agent in `agents` wins.
#[must_use]
pub fn select_nearest(client: &Client, agents: &[User]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (index, agent) in agents.iter().enumerate() {
        let distance = client.distance_from(agent.current_latitude, agent.current_longitude);
        if distance.is_infinite() {
            continue;
        }
        if best.is_none_or(|(_, nearest)| distance < nearest) {
            best = Some((index, distance));
        }
    }

    best.map(|(index, _)| index)
}

/// Pair each client with at most one agent, in queue order.
///
/// `clients` must already be in matching order and `agents` in tie-break
/// order. An agent leaves the pool once paired. A client with no
/// positioned agent left is skipped; matching stops when the pool is
/// empty.
#[must_use]
pub fn plan(clients: &[Client], mut agents: Vec<User>) -> Vec<(User, Client)> {
    let mut pairs = Vec::new();

    for client in clients {
        if agents.is_empty() {
            break;
        }
        if let Some(index) = select_nearest(client, &agents) {
            let agent = agents.remove(index);
            pairs.push((agent, client.clone()));
        }
    }

    pairs
}
