use biodivine_lib_bdd::{
    Bdd, BddPartialValuation, BddVariable, BddVariableSet, BddVariableSetBuilder,
};
use num_bigint::BigInt;
use std::ops::Shr;

use crate::petri_net::{Marking, PetriNet};

/// `MarkingDomain` is the encoder/decoder between [Marking] values and `Bdd` objects,
/// and the owner of the symbolic variables of one analysis.
///
/// For every place `p` (visited in the canonical sorted order) it allocates a pair of
/// Boolean variables: a *current-state* variable `p` and a *next-state* variable `p'`.
/// The pairs are interleaved (`p0, p0', p1, p1', ...`), which keeps a relation over
/// current and next variables local in the BDD ordering. Only the variable *pair*
/// layout is promised; nothing outside this type may rely on raw variable indices.
///
/// A set of markings is a `Bdd` over the current-state variables only. A transition
/// relation is a `Bdd` over both halves. The domain is created once per net and
/// borrowed by every analyzer, so independent nets never share a variable set.
#[derive(Clone, Debug)]
pub struct MarkingDomain {
    variables: BddVariableSet,
    current: Vec<BddVariable>,
    next: Vec<BddVariable>,
    identity: Bdd,
}

impl MarkingDomain {
    /// Allocate the variable pairs for all places of `net`.
    pub fn new(net: &PetriNet) -> MarkingDomain {
        let mut builder = BddVariableSetBuilder::new();
        let mut current = Vec::with_capacity(net.num_places());
        let mut next = Vec::with_capacity(net.num_places());
        for place in net.places() {
            current.push(builder.make_variable(place.id.as_str()));
            next.push(builder.make_variable(format!("{}'", place.id).as_str()));
        }
        let variables = builder.build();

        // The identity relation `/\_p (p <=> p')`. It doubles as the frame clause
        // source and as the substitution glue in `unprime`.
        let mut identity = variables.mk_true();
        for (x, x_next) in current.iter().zip(next.iter()) {
            let pair = variables.mk_var(*x).iff(&variables.mk_var(*x_next));
            identity = identity.and(&pair);
        }

        MarkingDomain {
            variables,
            current,
            next,
            identity,
        }
    }

    pub fn variables(&self) -> &BddVariableSet {
        &self.variables
    }

    pub fn num_places(&self) -> usize {
        self.current.len()
    }

    /// Current-state variables in canonical place order.
    pub fn current_variables(&self) -> &[BddVariable] {
        &self.current
    }

    /// Next-state variables in canonical place order.
    pub fn next_variables(&self) -> &[BddVariable] {
        &self.next
    }

    /// The relation `/\_p (p <=> p')` stating that a step changes nothing.
    pub fn identity_relation(&self) -> &Bdd {
        &self.identity
    }

    /// A literal over the current-state variable of `place`.
    pub fn current_literal(&self, place: usize, value: bool) -> Bdd {
        self.variables.mk_literal(self.current[place], value)
    }

    /// A literal over the next-state variable of `place`.
    pub fn next_literal(&self, place: usize, value: bool) -> Bdd {
        self.variables.mk_literal(self.next[place], value)
    }

    /// The relation `p <=> p'` for one place, i.e. "this place does not change".
    pub fn frame_relation(&self, place: usize) -> Bdd {
        self.current_literal(place, true)
            .iff(&self.next_literal(place, true))
    }

    /// Encode a single marking as the conjunctive clause over the current-state
    /// variables which is satisfied by exactly this marking.
    pub fn encode_marking(&self, marking: &Marking) -> Bdd {
        let mut valuation = BddPartialValuation::empty();
        for (place, var) in self.current.iter().enumerate() {
            valuation.set_value(*var, marking.is_marked(place));
        }
        self.variables.mk_conjunctive_clause(&valuation)
    }

    /// True if `marking` satisfies the marking set `set`.
    pub fn contains(&self, set: &Bdd, marking: &Marking) -> bool {
        !set.and(&self.encode_marking(marking)).is_false()
    }

    /// Decode all markings of a marking set.
    ///
    /// *Contract:* `set` must not depend on next-state variables. The result follows
    /// the valuation order of the underlying BDD, which is deterministic.
    pub fn decode_markings(&self, set: &Bdd) -> Vec<Marking> {
        // Pin the (unconstrained) next-state variables to `false` so that every
        // marking shows up as exactly one satisfying valuation.
        let pinned: Vec<(BddVariable, bool)> = self.next.iter().map(|v| (*v, false)).collect();
        let set = set.exists(&self.next).select(&pinned);

        set.sat_valuations()
            .map(|valuation| {
                Marking::from_bits(self.current.iter().map(|v| valuation.value(*v)).collect())
            })
            .collect()
    }

    /// The exact number of markings in a marking set.
    ///
    /// The cardinality of the raw BDD ranges over both variable halves, so every
    /// marking is counted once per valuation of the next-state variables; shifting
    /// by their number recovers the true count.
    pub fn count_markings(&self, set: &Bdd) -> BigInt {
        set.exact_cardinality().shr(self.next.len())
    }

    /// Substitute `p' -> p` simultaneously for all places, turning a next-state
    /// function into the same function over current-state variables.
    ///
    /// *Contract:* `set` must not depend on current-state variables (they were
    /// quantified out by the image step). The substitution is the relational
    /// product with the identity relation; no satisfying-assignment enumeration
    /// is involved.
    pub fn unprime(&self, set: &Bdd) -> Bdd {
        set.and(&self.identity).exists(&self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::petri_net::{Marking, PetriNet, Place};

    fn two_place_net() -> PetriNet {
        PetriNet::new(
            vec![Place::new("a", true), Place::new("b", false)],
            vec![],
            &[],
        )
        .unwrap()
    }

    #[test]
    fn variable_pairs_are_interleaved() {
        let net = two_place_net();
        let domain = MarkingDomain::new(&net);

        let all = domain.variables().variables();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0], domain.current_variables()[0]);
        assert_eq!(all[1], domain.next_variables()[0]);
        assert_eq!(all[2], domain.current_variables()[1]);
        assert_eq!(all[3], domain.next_variables()[1]);
    }

    #[test]
    fn encode_decode_round_trip() {
        let net = two_place_net();
        let domain = MarkingDomain::new(&net);

        let m = Marking::from_bits(vec![true, false]);
        let encoded = domain.encode_marking(&m);

        assert_eq!(domain.count_markings(&encoded), 1.into());
        assert_eq!(domain.decode_markings(&encoded), vec![m.clone()]);
        assert!(domain.contains(&encoded, &m));
        assert!(!domain.contains(&encoded, &Marking::from_bits(vec![false, false])));
    }

    #[test]
    fn decode_enumerates_every_marking_once() {
        let net = two_place_net();
        let domain = MarkingDomain::new(&net);

        // `a`, unconstrained in `b`: two markings.
        let set = domain.current_literal(0, true);
        let decoded = domain.decode_markings(&set);
        assert_eq!(decoded.len(), 2);
        assert!(decoded.contains(&Marking::from_bits(vec![true, false])));
        assert!(decoded.contains(&Marking::from_bits(vec![true, true])));
        assert_eq!(domain.count_markings(&set), 2.into());
    }

    #[test]
    fn unprime_renames_next_state_functions() {
        let net = two_place_net();
        let domain = MarkingDomain::new(&net);

        // f = a' & !b', a function of next-state variables only.
        let f = domain
            .next_literal(0, true)
            .and(&domain.next_literal(1, false));
        let expected = domain
            .current_literal(0, true)
            .and(&domain.current_literal(1, false));
        assert_eq!(domain.unprime(&f), expected);
    }

    #[test]
    fn independent_nets_have_independent_domains() {
        let net = two_place_net();
        let first = MarkingDomain::new(&net);
        let second = MarkingDomain::new(&net);

        let m = Marking::from_bits(vec![true, true]);
        // Same net, same layout: the encodings agree without any shared state.
        assert_eq!(first.encode_marking(&m), second.encode_marking(&m));
    }
}
