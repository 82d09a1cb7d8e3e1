//! Symbolic analysis of 1-safe Petri nets.
//!
//! The crate answers two questions about a net `(P, T, F, M0)`:
//!
//! 1. Which markings are reachable from `M0`? The [reachability] module encodes
//!    markings and the transition relation as BDDs (via `biodivine-lib-bdd`) and
//!    computes the reachable set as a symbolic fixed point, so the answer is a
//!    Boolean function rather than an explicit list. The [explicit] module provides
//!    a plain breadth-first enumeration of the same set, usable as a cross-check
//!    oracle on small nets.
//! 2. Is a *dead* marking (no transition enabled) reachable? The [deadlock] module
//!    characterizes structurally dead markings as the feasible points of a 0/1
//!    integer program and validates ILP candidates against the symbolic reachable
//!    set, excluding spurious ones with no-good cuts until a witness is certified
//!    or the program becomes infeasible.
//!
//! Nets are read from PNML documents by [xml_parsing::pnml], or built directly
//! through [petri_net::PetriNet].
//!
//! ```
//! use biodivine_lib_petri_nets::{
//!     parse_pnml, DeadlockDetector, ReachabilityConfig, SymbolicReachability,
//! };
//!
//! let net = parse_pnml(
//!     r#"<pnml><net id="n">
//!         <place id="ready"><initialMarking><text>1</text></initialMarking></place>
//!         <place id="done"/>
//!         <transition id="finish"/>
//!         <arc source="ready" target="finish"/>
//!         <arc source="finish" target="done"/>
//!     </net></pnml>"#
//!         .as_bytes(),
//! )
//! .unwrap();
//!
//! let symbolic = SymbolicReachability::new(&net);
//! let reachable = symbolic.compute(&ReachabilityConfig::default()).unwrap();
//! assert_eq!(reachable.count(), &2.into());
//!
//! let report = DeadlockDetector::new(&symbolic).detect(&reachable).unwrap();
//! assert_eq!(report.status.to_string(), "Deadlock FOUND");
//! ```

pub mod deadlock;
pub mod explicit;
pub mod petri_net;
pub mod reachability;
pub mod symbolic_domain;
pub mod test_utils;
pub mod xml_parsing;

pub use deadlock::{
    DeadlockDetector, DeadlockError, DeadlockReport, DeadlockStatus, DEFAULT_MAX_ATTEMPTS,
};
pub use explicit::{ExplicitReachability, ExplicitStates};
pub use petri_net::{Marking, NetError, PetriNet, Place, Transition};
pub use reachability::{
    ReachabilityConfig, ReachabilityError, ReachableStates, SymbolicReachability,
};
pub use symbolic_domain::MarkingDomain;
pub use xml_parsing::pnml::{load_pnml, parse_pnml};
pub use xml_parsing::PnmlError;
