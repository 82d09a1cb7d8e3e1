use good_lp::{
    constraint, microlp, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use log::{debug, info};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::petri_net::{Marking, PetriNet};
use crate::reachability::{ReachabilityError, ReachableStates, SymbolicReachability};

/// Default bound on the number of propose-and-check rounds.
pub const DEFAULT_MAX_ATTEMPTS: usize = 50;

/// Fatal failures of the deadlock detector. Exhausting the attempt budget is *not*
/// an error; it is reported through [DeadlockStatus::AttemptsExhausted].
#[derive(Error, Debug)]
pub enum DeadlockError {
    #[error("ILP solver failed: {0}")]
    Solver(String),
    #[error("ILP solver returned non-binary value {value} for place `{place}`")]
    NonBinarySolution { place: String, value: f64 },
}

/// Terminal outcome of one detector run. [fmt::Display] renders the exact status
/// strings of the report contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeadlockStatus {
    /// A reachable dead marking was certified.
    Found,
    /// The structural ILP is (or became) infeasible: no reachable dead marking exists.
    NoReachableDeadlock,
    /// The attempt budget ran out with candidates still unchecked.
    AttemptsExhausted(usize),
    /// The symbolic reachable set was never produced, so nothing could be validated.
    BddComputationFailed(String),
}

impl fmt::Display for DeadlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeadlockStatus::Found => write!(f, "Deadlock FOUND"),
            DeadlockStatus::NoReachableDeadlock => write!(f, "No reachable deadlock found"),
            DeadlockStatus::AttemptsExhausted(n) => {
                write!(f, "No deadlock found after {n} attempts")
            }
            DeadlockStatus::BddComputationFailed(reason) => {
                write!(f, "BDD computation failed: {reason}")
            }
        }
    }
}

/// The detector verdict: at most one certified dead marking, the status, and the
/// time spent proposing and validating candidates.
#[derive(Clone, Debug)]
pub struct DeadlockReport {
    pub marking: Option<Marking>,
    pub elapsed: Duration,
    pub status: DeadlockStatus,
}

impl DeadlockReport {
    /// The report used when the symbolic engine failed and no reachable set exists
    /// to validate candidates against.
    pub fn computation_failed(error: &ReachabilityError) -> DeadlockReport {
        DeadlockReport {
            marking: None,
            elapsed: Duration::ZERO,
            status: DeadlockStatus::BddComputationFailed(error.to_string()),
        }
    }
}

/// Hybrid ILP + symbolic deadlock detector.
///
/// The ILP part knows only net *structure*: its feasible points are the markings in
/// which every transition is disabled, reachable or not. The symbolic part knows
/// only *reachability*. The propose-check-refine loop combines them: solve the ILP,
/// test the candidate against the reachable set, and on failure exclude exactly that
/// candidate with a no-good cut before solving again.
pub struct DeadlockDetector<'a> {
    symbolic: &'a SymbolicReachability<'a>,
    max_attempts: usize,
}

impl<'a> DeadlockDetector<'a> {
    /// Create a detector borrowing the symbolic engine (and its marking domain).
    pub fn new(symbolic: &'a SymbolicReachability<'a>) -> DeadlockDetector<'a> {
        DeadlockDetector {
            symbolic,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> DeadlockDetector<'a> {
        self.max_attempts = max_attempts;
        self
    }

    /// Search for a reachable dead marking within the attempt budget.
    ///
    /// Solver failures are fatal; every other outcome is a [DeadlockStatus].
    pub fn detect(&self, reachable: &ReachableStates) -> Result<DeadlockReport, DeadlockError> {
        let start = Instant::now();
        let net = self.symbolic.net();

        // A transition without input places is enabled in every marking, so no dead
        // marking can exist and the ILP would only restate that as infeasibility.
        if let Some(t) = net.transitions().iter().find(|t| t.pre().is_empty()) {
            info!(
                "transition `{}` has no input places and is always enabled",
                t.id
            );
            return Ok(DeadlockReport {
                marking: None,
                elapsed: start.elapsed(),
                status: DeadlockStatus::NoReachableDeadlock,
            });
        }

        let mut ilp = DeadMarkingIlp::new(net);
        let mut attempts = 0;
        while attempts < self.max_attempts {
            attempts += 1;

            let Some(candidate) = ilp.solve()? else {
                info!("structural ILP infeasible after {} attempts", attempts - 1);
                return Ok(DeadlockReport {
                    marking: None,
                    elapsed: start.elapsed(),
                    status: DeadlockStatus::NoReachableDeadlock,
                });
            };

            debug!(
                "[attempt:{}] structurally dead candidate {:?}",
                attempts,
                net.named_marking(&candidate)
            );

            if self.symbolic.domain().contains(reachable.set(), &candidate) {
                info!("reachable dead marking certified on attempt {}", attempts);
                return Ok(DeadlockReport {
                    marking: Some(candidate),
                    elapsed: start.elapsed(),
                    status: DeadlockStatus::Found,
                });
            }

            debug!("[attempt:{}] candidate unreachable, adding no-good cut", attempts);
            ilp.exclude(candidate);
        }

        Ok(DeadlockReport {
            marking: None,
            elapsed: start.elapsed(),
            status: DeadlockStatus::AttemptsExhausted(self.max_attempts),
        })
    }
}

/// The 0/1 program whose feasible points are the structurally dead markings.
///
/// One binary variable per place. For every transition `t`:
/// `sum_{p in Pre(t)} m_p <= |Pre(t)| - 1`, i.e. at least one input place is empty.
/// No-good cuts accumulate monotonically; the model itself is rebuilt from them on
/// every solve because solving consumes it.
struct DeadMarkingIlp<'a> {
    net: &'a PetriNet,
    cuts: Vec<Marking>,
}

impl<'a> DeadMarkingIlp<'a> {
    fn new(net: &'a PetriNet) -> DeadMarkingIlp<'a> {
        DeadMarkingIlp {
            net,
            cuts: Vec::new(),
        }
    }

    /// Forbid exactly this marking in all later solves:
    /// `sum_{p: m(p)=0} m_p + sum_{p: m(p)=1} (1 - m_p) >= 1`.
    fn exclude(&mut self, marking: Marking) {
        self.cuts.push(marking);
    }

    /// Solve the current program. `Ok(None)` means infeasible, i.e. every
    /// structurally dead marking has been excluded (or none existed).
    fn solve(&self) -> Result<Option<Marking>, DeadlockError> {
        let mut problem = ProblemVariables::new();
        let vars: Vec<Variable> = (0..self.net.num_places())
            .map(|_| problem.add(variable().binary()))
            .collect();

        // Any feasible point will do: the objective is the constant zero.
        let objective: Expression = std::iter::empty::<Expression>().sum();
        let mut model = problem.minimise(objective).using(microlp);

        for t in self.net.transitions() {
            let occupied: Expression = t.pre().iter().map(|p| Expression::from(vars[*p])).sum();
            model = model.with(constraint::leq(occupied, t.pre().len() as f64 - 1.0));
        }

        for cut in &self.cuts {
            let ones = cut.marked_places().count() as f64;
            let disagreement: Expression = (0..self.net.num_places())
                .map(|p| {
                    if cut.is_marked(p) {
                        -Expression::from(vars[p])
                    } else {
                        Expression::from(vars[p])
                    }
                })
                .sum();
            model = model.with(constraint::geq(disagreement, 1.0 - ones));
        }

        let solution = match model.solve() {
            Ok(solution) => solution,
            Err(ResolutionError::Infeasible) => return Ok(None),
            Err(error) => return Err(DeadlockError::Solver(error.to_string())),
        };

        let mut marking = Marking::empty(self.net.num_places());
        for (p, var) in vars.iter().enumerate() {
            // The backend may report a binary variable as e.g. 0.999999; round it.
            // Anything that is not 0 or 1 after rounding breaks the solver contract.
            let value = solution.value(*var).round();
            if value != 0.0 && value != 1.0 {
                return Err(DeadlockError::NonBinarySolution {
                    place: self.net.places()[p].id.clone(),
                    value,
                });
            }
            marking.set(p, value == 1.0);
        }
        Ok(Some(marking))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reachability::ReachabilityConfig;
    use crate::test_utils::{dining_philosophers, init_logger, net, producer_consumer};

    fn analyze(net: &PetriNet, max_attempts: usize) -> DeadlockReport {
        let symbolic = SymbolicReachability::new(net);
        let reachable = symbolic.compute(&ReachabilityConfig::default()).unwrap();
        DeadlockDetector::new(&symbolic)
            .with_max_attempts(max_attempts)
            .detect(&reachable)
            .unwrap()
    }

    #[test]
    fn dining_philosophers_deadlock_is_found() {
        init_logger();
        let net = dining_philosophers();
        let symbolic = SymbolicReachability::new(&net);
        let reachable = symbolic.compute(&ReachabilityConfig::default()).unwrap();
        let report = DeadlockDetector::new(&symbolic).detect(&reachable).unwrap();

        assert_eq!(report.status, DeadlockStatus::Found);
        let witness = report.marking.expect("a witness must accompany Found");
        // The witness itself is solver-dependent; its certificate is not.
        assert!(net.is_dead(&witness));
        assert!(symbolic.domain().contains(reachable.set(), &witness));

        // The classic both-philosophers-hold-one-fork marking is reachable and dead.
        let mut classic = Marking::empty(net.num_places());
        classic.set(net.place_index("hold_1").unwrap(), true);
        classic.set(net.place_index("hold_2").unwrap(), true);
        assert!(net.is_dead(&classic));
        assert!(symbolic.domain().contains(reachable.set(), &classic));
    }

    #[test]
    fn producer_consumer_has_no_deadlock() {
        let net = producer_consumer();
        let symbolic = SymbolicReachability::new(&net);
        let reachable = symbolic.compute(&ReachabilityConfig::default()).unwrap();
        let report = DeadlockDetector::new(&symbolic).detect(&reachable).unwrap();

        assert_eq!(report.status, DeadlockStatus::NoReachableDeadlock);
        assert!(report.marking.is_none());

        // The flip side of the verdict: every reachable marking can fire something.
        for marking in symbolic.domain().decode_markings(reachable.set()) {
            assert!(!net.is_dead(&marking));
        }
    }

    #[test]
    fn always_enabled_transition_short_circuits() {
        // `t0` has no input places, so it can fire in every marking.
        let net = net(&[("p", 0)], &["t0"], &[("t0", "p")]);
        let report = analyze(&net, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(report.status, DeadlockStatus::NoReachableDeadlock);
        assert!(report.marking.is_none());
    }

    #[test]
    fn empty_transition_set_makes_m0_dead() {
        let net = net(&[("p1", 1), ("p2", 0)], &[], &[]);
        let report = analyze(&net, DEFAULT_MAX_ATTEMPTS);

        assert_eq!(report.status, DeadlockStatus::Found);
        // M0 is the only reachable marking, so it must be the witness.
        assert_eq!(report.marking, Some(net.initial_marking()));
    }

    #[test]
    fn reachable_all_empty_marking_is_a_deadlock() {
        // With no transitions and no tokens, the empty marking is genuinely dead.
        let net = net(&[("p", 0)], &[], &[]);
        let report = analyze(&net, DEFAULT_MAX_ATTEMPTS);

        assert_eq!(report.status, DeadlockStatus::Found);
        assert!(report.marking.unwrap().is_all_empty());
    }

    #[test]
    fn unreachable_dead_marking_is_cut_away() {
        // Two places cycling one token. The only structurally dead marking is 00,
        // which is unreachable, so the first candidate gets cut and the ILP turns
        // infeasible.
        let net = net(
            &[("p1", 1), ("p2", 0)],
            &["t12", "t21"],
            &[("p1", "t12"), ("t12", "p2"), ("p2", "t21"), ("t21", "p1")],
        );
        let report = analyze(&net, DEFAULT_MAX_ATTEMPTS);

        assert_eq!(report.status, DeadlockStatus::NoReachableDeadlock);
        assert!(report.marking.is_none());
    }

    #[test]
    fn attempt_budget_exhaustion_is_reported() {
        // A three-place token ring plus two never-marked slack places: four
        // structurally dead (all-ring-empty) candidates, none reachable.
        let net = net(
            &[("a", 1), ("b", 0), ("c", 0), ("d", 0), ("e", 0)],
            &["tab", "tbc", "tca"],
            &[
                ("a", "tab"),
                ("tab", "b"),
                ("b", "tbc"),
                ("tbc", "c"),
                ("c", "tca"),
                ("tca", "a"),
            ],
        );
        let report = analyze(&net, 2);

        assert_eq!(report.status, DeadlockStatus::AttemptsExhausted(2));
        assert!(report.marking.is_none());
    }

    #[test]
    fn status_strings_match_report_contract() {
        assert_eq!(DeadlockStatus::Found.to_string(), "Deadlock FOUND");
        assert_eq!(
            DeadlockStatus::NoReachableDeadlock.to_string(),
            "No reachable deadlock found"
        );
        assert_eq!(
            DeadlockStatus::AttemptsExhausted(2).to_string(),
            "No deadlock found after 2 attempts"
        );
        assert_eq!(
            DeadlockStatus::BddComputationFailed("node table overflow".to_string()).to_string(),
            "BDD computation failed: node table overflow"
        );
    }
}
