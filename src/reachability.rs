use biodivine_lib_bdd::Bdd;
use debug_ignore::DebugIgnore;
use log::{debug, info};
use num_bigint::BigInt;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::petri_net::PetriNet;
use crate::symbolic_domain::MarkingDomain;

/// Resource limits for the symbolic fixed point (default: unbounded).
///
/// The procedure itself always terminates on a finite net; these limits exist to
/// abort runs whose BDDs outgrow the available memory before that happens.
#[derive(Clone, Debug)]
pub struct ReachabilityConfig {
    /// Abort if the fixed point needs more than this many image computations.
    pub max_iterations: usize,
    /// Abort if the reachable-set BDD exceeds this many nodes.
    pub max_symbolic_size: usize,
}

impl Default for ReachabilityConfig {
    fn default() -> ReachabilityConfig {
        ReachabilityConfig {
            max_iterations: usize::MAX,
            max_symbolic_size: usize::MAX,
        }
    }
}

/// Fatal failures of the symbolic engine. No partial reachable set is ever returned.
#[derive(Error, Debug)]
pub enum ReachabilityError {
    #[error("BDD size limit exceeded: {size} nodes (limit {limit})")]
    SymbolicSizeExceeded { size: usize, limit: usize },
    #[error("iteration limit exceeded after {0} iterations")]
    IterationLimitExceeded(usize),
}

/// The symbolic reachability engine of one net.
///
/// Owns the [MarkingDomain] (and with it all BDD variables) for the duration of the
/// analysis; the deadlock detector later borrows both. Construction encodes the
/// initial marking and the full transition relation; [SymbolicReachability::compute]
/// then iterates the image operator to the fixed point.
pub struct SymbolicReachability<'a> {
    net: &'a PetriNet,
    domain: MarkingDomain,
    initial: Bdd,
    transition_relation: Bdd,
}

impl<'a> SymbolicReachability<'a> {
    pub fn new(net: &'a PetriNet) -> SymbolicReachability<'a> {
        let domain = MarkingDomain::new(net);
        let initial = domain.encode_marking(&net.initial_marking());
        let transition_relation = encode_transition_relation(net, &domain);
        SymbolicReachability {
            net,
            domain,
            initial,
            transition_relation,
        }
    }

    pub fn net(&self) -> &'a PetriNet {
        self.net
    }

    pub fn domain(&self) -> &MarkingDomain {
        &self.domain
    }

    /// The conjunctive clause encoding `M0`.
    pub fn initial(&self) -> &Bdd {
        &self.initial
    }

    /// The relation `Identity \/ \/_t tau_t` over both variable halves.
    pub fn transition_relation(&self) -> &Bdd {
        &self.transition_relation
    }

    /// One-step successors of `set`, as a current-state function:
    /// `unprime(exists current. set /\ T)`.
    pub fn post_image(&self, set: &Bdd) -> Bdd {
        let product = set.and(&self.transition_relation);
        let next_only = product.exists(self.domain.current_variables());
        self.domain.unprime(&next_only)
    }

    /// Run the symbolic BFS to the fixed point and return the reachable set with
    /// its exact marking count and diagnostics.
    pub fn compute(
        &self,
        config: &ReachabilityConfig,
    ) -> Result<ReachableStates, ReachabilityError> {
        let start = Instant::now();
        let initial_formula = self
            .initial
            .to_boolean_expression(self.domain.variables())
            .to_string();

        info!(
            "start symbolic reachability: {} places, {} transitions",
            self.net.num_places(),
            self.net.num_transitions()
        );

        let mut reached = self.initial.clone();
        let mut iterations = 0usize;
        loop {
            if iterations >= config.max_iterations {
                return Err(ReachabilityError::IterationLimitExceeded(iterations));
            }
            iterations += 1;

            let image = self.post_image(&reached);
            // Thanks to the identity clause the image is a superset of `reached`,
            // so "no new markings" is exactly the fixed point R_new = R.
            if image.imp(&reached).is_true() {
                break;
            }
            reached = reached.or(&image);

            if reached.size() > config.max_symbolic_size {
                return Err(ReachabilityError::SymbolicSizeExceeded {
                    size: reached.size(),
                    limit: config.max_symbolic_size,
                });
            }
            debug!(
                "[iteration:{}] reachable set increased to (markings={}, nodes={})",
                iterations,
                self.domain.count_markings(&reached),
                reached.size()
            );
        }

        let count = self.domain.count_markings(&reached);
        let final_formula = reached
            .to_boolean_expression(self.domain.variables())
            .to_string();
        let elapsed = start.elapsed();
        info!(
            "symbolic reachability finished: {} markings in {} iterations ({:.4}s)",
            count,
            iterations,
            elapsed.as_secs_f64()
        );

        Ok(ReachableStates {
            set: DebugIgnore(reached),
            count,
            iterations,
            elapsed,
            initial_formula,
            final_formula,
        })
    }
}

/// `Identity \/ \/_t tau_t`. The identity clause keeps the image operator
/// reflexive, so the fixed-point iteration is monotone even on nets where no
/// transition can fire.
fn encode_transition_relation(net: &PetriNet, domain: &MarkingDomain) -> Bdd {
    let mut relation = domain.variables().mk_false();
    for t in 0..net.num_transitions() {
        relation = relation.or(&encode_transition(net, domain, t));
    }
    relation.or(domain.identity_relation())
}

/// `tau_t = Guard /\ Post /\ Frame`:
/// every input place is marked now, every output place is marked next, every
/// consumed-only place is empty next, and every untouched place keeps its value.
fn encode_transition(net: &PetriNet, domain: &MarkingDomain, t: usize) -> Bdd {
    let transition = &net.transitions()[t];
    let mut tau = domain.variables().mk_true();

    for &p in transition.pre() {
        tau = tau.and(&domain.current_literal(p, true));
    }
    for &p in transition.post() {
        tau = tau.and(&domain.next_literal(p, true));
    }
    for &p in transition.pre() {
        if !transition.post().contains(&p) {
            tau = tau.and(&domain.next_literal(p, false));
        }
    }
    for p in 0..net.num_places() {
        if !transition.pre().contains(&p) && !transition.post().contains(&p) {
            tau = tau.and(&domain.frame_relation(p));
        }
    }
    tau
}

/// The result of one reachability fixed point: the set `R`, its exact size, and
/// the diagnostics the console report displays.
#[derive(Clone, Debug)]
pub struct ReachableStates {
    set: DebugIgnore<Bdd>,
    count: BigInt,
    iterations: usize,
    elapsed: Duration,
    initial_formula: String,
    final_formula: String,
}

impl ReachableStates {
    /// The BDD of reachable markings, a function of current-state variables only.
    pub fn set(&self) -> &Bdd {
        &self.set.0
    }

    /// Exact number of reachable markings.
    pub fn count(&self) -> &BigInt {
        &self.count
    }

    /// Number of image computations, including the one that detected convergence.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Boolean formula of the initial marking, for diagnostics.
    pub fn initial_formula(&self) -> &str {
        &self.initial_formula
    }

    /// Boolean formula of the final reachable set, for diagnostics.
    pub fn final_formula(&self) -> &str {
        &self.final_formula
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::petri_net::Marking;
    use crate::test_utils::{init_logger, net, producer_consumer};

    #[test]
    fn producer_consumer_has_two_markings() {
        init_logger();
        let net = producer_consumer();
        let symbolic = SymbolicReachability::new(&net);
        let reachable = symbolic.compute(&ReachabilityConfig::default()).unwrap();

        assert_eq!(reachable.count(), &2.into());
        // M0 is always reachable.
        assert!(symbolic
            .domain()
            .contains(reachable.set(), &net.initial_marking()));
    }

    #[test]
    fn no_transition_net_reaches_only_m0() {
        let net = net(&[("p1", 1), ("p2", 0)], &[], &[]);
        let symbolic = SymbolicReachability::new(&net);
        let reachable = symbolic.compute(&ReachabilityConfig::default()).unwrap();

        assert_eq!(reachable.count(), &1.into());
        assert_eq!(
            symbolic.domain().decode_markings(reachable.set()),
            vec![net.initial_marking()]
        );
        assert_eq!(reachable.iterations(), 1);
    }

    #[test]
    fn self_loop_stays_in_place() {
        let net = net(&[("p", 1)], &["t"], &[("p", "t"), ("t", "p")]);
        let symbolic = SymbolicReachability::new(&net);
        let reachable = symbolic.compute(&ReachabilityConfig::default()).unwrap();

        assert_eq!(reachable.count(), &1.into());
    }

    #[test]
    fn reachable_set_is_closed_under_firing() {
        let net = producer_consumer();
        let symbolic = SymbolicReachability::new(&net);
        let reachable = symbolic.compute(&ReachabilityConfig::default()).unwrap();

        for marking in symbolic.domain().decode_markings(reachable.set()) {
            for t in 0..net.num_transitions() {
                if net.enabled(&marking, t) {
                    let successor = net.fire(&marking, t);
                    assert!(symbolic.domain().contains(reachable.set(), &successor));
                }
            }
        }
    }

    #[test]
    fn fixed_point_is_idempotent() {
        let net = producer_consumer();
        let symbolic = SymbolicReachability::new(&net);
        let first = symbolic.compute(&ReachabilityConfig::default()).unwrap();
        let second = symbolic.compute(&ReachabilityConfig::default()).unwrap();

        assert_eq!(first.set(), second.set());
        assert_eq!(first.count(), second.count());
    }

    #[test]
    fn post_image_of_initial_marking() {
        // empty --produce--> full: the image of {10} is {10, 01} (identity included).
        let net = producer_consumer();
        let symbolic = SymbolicReachability::new(&net);

        let image = symbolic.post_image(symbolic.initial());
        let markings = symbolic.domain().decode_markings(&image);
        assert_eq!(markings.len(), 2);

        let full_idx = net.place_index("full").unwrap();
        let mut produced = Marking::empty(2);
        produced.set(full_idx, true);
        assert!(markings.contains(&net.initial_marking()));
        assert!(markings.contains(&produced));
    }

    #[test]
    fn iteration_limit_is_fatal() {
        let net = producer_consumer();
        let symbolic = SymbolicReachability::new(&net);
        let config = ReachabilityConfig {
            max_iterations: 0,
            ..Default::default()
        };
        assert!(matches!(
            symbolic.compute(&config),
            Err(ReachabilityError::IterationLimitExceeded(_))
        ));
    }

    #[test]
    fn size_limit_is_fatal() {
        // The philosopher net produces a reachable set of more than one node.
        let net = crate::test_utils::dining_philosophers();
        let symbolic = SymbolicReachability::new(&net);
        let config = ReachabilityConfig {
            max_symbolic_size: 1,
            ..Default::default()
        };
        assert!(matches!(
            symbolic.compute(&config),
            Err(ReachabilityError::SymbolicSizeExceeded { .. })
        ));
    }
}
