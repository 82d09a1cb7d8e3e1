use log::info;
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use crate::petri_net::{Marking, PetriNet};

/// Explicit-state breadth-first enumeration of the reachable markings.
///
/// This is the cross-check oracle for the symbolic engine: it visits every
/// reachable marking one by one, so it only scales to small nets, but its result
/// is trivially trustworthy. The driver asserts that its count equals
/// `ReachableStates::count`.
pub struct ExplicitReachability<'a> {
    net: &'a PetriNet,
}

impl<'a> ExplicitReachability<'a> {
    pub fn new(net: &'a PetriNet) -> ExplicitReachability<'a> {
        ExplicitReachability { net }
    }

    /// Enumerate all markings reachable from `M0` in BFS order.
    pub fn compute(&self) -> ExplicitStates {
        let start = Instant::now();

        let initial = self.net.initial_marking();
        let mut seen: HashSet<Marking> = HashSet::new();
        let mut queue: VecDeque<Marking> = VecDeque::new();
        let mut markings = Vec::new();

        seen.insert(initial.clone());
        markings.push(initial.clone());
        queue.push_back(initial);

        while let Some(marking) = queue.pop_front() {
            for t in 0..self.net.num_transitions() {
                if !self.net.enabled(&marking, t) {
                    continue;
                }
                let successor = self.net.fire(&marking, t);
                if seen.insert(successor.clone()) {
                    markings.push(successor.clone());
                    queue.push_back(successor);
                }
            }
        }

        let elapsed = start.elapsed();
        info!(
            "explicit reachability finished: {} markings ({:.4}s)",
            markings.len(),
            elapsed.as_secs_f64()
        );
        ExplicitStates { markings, elapsed }
    }
}

/// The enumerated reachable set, in BFS discovery order.
#[derive(Clone, Debug)]
pub struct ExplicitStates {
    markings: Vec<Marking>,
    elapsed: Duration,
}

impl ExplicitStates {
    pub fn markings(&self) -> &[Marking] {
        &self.markings
    }

    pub fn count(&self) -> usize {
        self.markings.len()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}
