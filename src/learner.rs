// src/learner.rs
//
// SARSA update rule.
//
// On-policy: `next_action` must be the action the policy actually selected
// for `next_state` (and which the session will carry into the next tick),
// never the greedy argmax. Substituting the greedy action would turn this
// into Q-learning and change convergence behaviour.

use crate::qtable::{bucket, QTable};
use crate::types::Action;

/// Apply one SARSA update for the transition (s, a, r, s', a').
///
/// `q[s][a] += alpha * (reward + gamma * q[s'][a'] - q[s][a])`
///
/// A single update is bounded by its inputs; values may still drift without
/// bound over many steps, which is accepted.
#[allow(clippy::too_many_arguments)]
pub fn sarsa_update(
    table: &mut QTable,
    state: f64,
    action: Action,
    reward: f64,
    next_state: f64,
    next_action: Action,
    alpha: f64,
    gamma: f64,
) {
    let s = bucket(state);
    let next_s = bucket(next_state);

    let next_q = table.get(next_s, next_action);
    let q = table.get(s, action);

    table.set(s, action, q + alpha * (reward + gamma * next_q - q));
}
