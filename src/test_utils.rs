//! Small example nets shared by the unit tests of the individual analyzers.

use crate::petri_net::{PetriNet, Place};

/// Initialize env_logger for tests. Safe to call multiple times.
pub fn init_logger() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Trace)
        .is_test(true)
        .try_init();
}

/// Terse net constructor: places as `(id, initial tokens)`, transition ids, and
/// `(source, target)` arcs. Panics on ill-formed input, which in a test is a bug
/// in the test itself.
pub fn net(places: &[(&str, u8)], transitions: &[&str], arcs: &[(&str, &str)]) -> PetriNet {
    let places = places
        .iter()
        .map(|(id, initial)| Place::new(id, *initial != 0))
        .collect();
    let transitions = transitions.iter().map(|t| t.to_string()).collect();
    let arcs: Vec<(String, String)> = arcs
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
    PetriNet::new(places, transitions, &arcs).expect("test net must be well-formed")
}

/// A deadlock-free two-state system: `empty --produce--> full --consume--> empty`.
///
/// Exactly two reachable markings, every one of them with an enabled transition.
pub fn producer_consumer() -> PetriNet {
    net(
        &[("empty", 1), ("full", 0)],
        &["produce", "consume"],
        &[
            ("empty", "produce"),
            ("produce", "full"),
            ("full", "consume"),
            ("consume", "empty"),
        ],
    )
}

/// Two dining philosophers, each taking their left fork first.
///
/// Philosopher `i` cycles `think_i -> hold_i -> eat_i -> think_i`, picking up
/// `fork_i` when starting to hold and the other fork when starting to eat. The
/// marking `{hold_1, hold_2}` (both forks taken, neither philosopher able to take
/// the second) is reachable and dead.
pub fn dining_philosophers() -> PetriNet {
    net(
        &[
            ("think_1", 1),
            ("think_2", 1),
            ("hold_1", 0),
            ("hold_2", 0),
            ("eat_1", 0),
            ("eat_2", 0),
            ("fork_1", 1),
            ("fork_2", 1),
        ],
        &[
            "take_left_1",
            "take_left_2",
            "take_right_1",
            "take_right_2",
            "release_1",
            "release_2",
        ],
        &[
            ("think_1", "take_left_1"),
            ("fork_1", "take_left_1"),
            ("take_left_1", "hold_1"),
            ("think_2", "take_left_2"),
            ("fork_2", "take_left_2"),
            ("take_left_2", "hold_2"),
            ("hold_1", "take_right_1"),
            ("fork_2", "take_right_1"),
            ("take_right_1", "eat_1"),
            ("hold_2", "take_right_2"),
            ("fork_1", "take_right_2"),
            ("take_right_2", "eat_2"),
            ("eat_1", "release_1"),
            ("release_1", "think_1"),
            ("release_1", "fork_1"),
            ("release_1", "fork_2"),
            ("eat_2", "release_2"),
            ("release_2", "think_2"),
            ("release_2", "fork_2"),
            ("release_2", "fork_1"),
        ],
    )
}

/// A single token cycling through `n` places. Exactly `n` reachable markings and
/// never a deadlock (for `n >= 1` the token can always move on).
pub fn token_ring(n: usize) -> PetriNet {
    assert!(n >= 1);
    let place_ids: Vec<String> = (0..n).map(|i| format!("r{i}")).collect();
    let transition_ids: Vec<String> = (0..n).map(|i| format!("t{i}")).collect();

    let places: Vec<(&str, u8)> = place_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), u8::from(i == 0)))
        .collect();
    let transitions: Vec<&str> = transition_ids.iter().map(|t| t.as_str()).collect();

    let mut arcs: Vec<(&str, &str)> = Vec::new();
    for i in 0..n {
        arcs.push((place_ids[i].as_str(), transition_ids[i].as_str()));
        arcs.push((transition_ids[i].as_str(), place_ids[(i + 1) % n].as_str()));
    }

    net(&places, &transitions, &arcs)
}
