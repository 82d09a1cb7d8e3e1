use std::collections::{BTreeMap, HashMap, HashSet};

use log::warn;
use thiserror::Error;

/// Errors produced when assembling a [PetriNet] from raw places, transitions and arcs.
///
/// The analyzers assume a well-formed net, so every structural defect is rejected here,
/// before any analysis object is built.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum NetError {
    #[error("duplicate place id `{0}`")]
    DuplicatePlace(String),
    #[error("duplicate transition id `{0}`")]
    DuplicateTransition(String),
    #[error("id `{0}` is used both as a place and as a transition")]
    SharedId(String),
    #[error("arc ({0} -> {1}) references an undefined node")]
    UndefinedArcEndpoint(String, String),
    #[error("arc ({0} -> {1}) must connect a place and a transition")]
    InvalidArcKind(String, String),
}

/// One place of a 1-safe net: an identifier, an optional human-readable name,
/// and the initial token count (0 or 1).
#[derive(Clone, Debug)]
pub struct Place {
    pub id: String,
    pub name: Option<String>,
    pub initial: bool,
}

impl Place {
    pub fn new(id: &str, initial: bool) -> Place {
        Place {
            id: id.to_string(),
            name: None,
            initial,
        }
    }

    pub fn with_name(id: &str, initial: bool, name: &str) -> Place {
        Place {
            id: id.to_string(),
            name: Some(name.to_string()),
            initial,
        }
    }

    /// The name shown in reports. Falls back to the id when the PNML source
    /// did not carry a name label.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// One transition together with its input and output place sets,
/// stored as sorted indices into the canonical place order.
#[derive(Clone, Debug)]
pub struct Transition {
    pub id: String,
    pre: Vec<usize>,
    post: Vec<usize>,
}

impl Transition {
    /// Indices of places connected by an arc into this transition.
    pub fn pre(&self) -> &[usize] {
        &self.pre
    }

    /// Indices of places connected by an arc out of this transition.
    pub fn post(&self) -> &[usize] {
        &self.post
    }
}

/// An immutable 1-safe Petri net `(P, T, F, M0)`.
///
/// Places are kept sorted by identifier. This order is *the* canonical order of the
/// whole crate: markings are bit vectors indexed by it and the BDD variable ordering
/// is derived from it, so results are stable across runs on the same net.
///
/// All analyzers borrow the net; none of them extends it (composition instead of
/// the inheritance hierarchy the problem is sometimes formulated with).
#[derive(Clone, Debug)]
pub struct PetriNet {
    places: Vec<Place>,
    transitions: Vec<Transition>,
    place_index: HashMap<String, usize>,
}

impl PetriNet {
    /// Validate and assemble a net. `arcs` are `(source id, target id)` pairs with
    /// unit weight; duplicated arcs collapse into one.
    pub fn new(
        mut places: Vec<Place>,
        transitions: Vec<String>,
        arcs: &[(String, String)],
    ) -> Result<PetriNet, NetError> {
        places.sort_by(|a, b| a.id.cmp(&b.id));

        let mut place_index = HashMap::new();
        for (i, place) in places.iter().enumerate() {
            if place_index.insert(place.id.clone(), i).is_some() {
                return Err(NetError::DuplicatePlace(place.id.clone()));
            }
        }

        let mut transition_index = HashMap::new();
        for (i, id) in transitions.iter().enumerate() {
            if place_index.contains_key(id) {
                return Err(NetError::SharedId(id.clone()));
            }
            if transition_index.insert(id.clone(), i).is_some() {
                return Err(NetError::DuplicateTransition(id.clone()));
            }
        }

        enum Node {
            Place(usize),
            Transition(usize),
        }
        let classify = |id: &String| {
            place_index
                .get(id)
                .map(|p| Node::Place(*p))
                .or_else(|| transition_index.get(id).map(|t| Node::Transition(*t)))
        };

        let mut pre: Vec<HashSet<usize>> = vec![HashSet::new(); transitions.len()];
        let mut post: Vec<HashSet<usize>> = vec![HashSet::new(); transitions.len()];
        for (source, target) in arcs {
            match (classify(source), classify(target)) {
                (Some(Node::Place(p)), Some(Node::Transition(t))) => {
                    pre[t].insert(p);
                }
                (Some(Node::Transition(t)), Some(Node::Place(p))) => {
                    post[t].insert(p);
                }
                (None, _) | (_, None) => {
                    return Err(NetError::UndefinedArcEndpoint(
                        source.clone(),
                        target.clone(),
                    ));
                }
                _ => {
                    // Both endpoints exist, but they are of the same kind.
                    return Err(NetError::InvalidArcKind(source.clone(), target.clone()));
                }
            }
        }

        let transitions: Vec<Transition> = transitions
            .into_iter()
            .zip(pre.into_iter().zip(post))
            .map(|(id, (pre, post))| {
                let mut pre: Vec<usize> = pre.into_iter().collect();
                let mut post: Vec<usize> = post.into_iter().collect();
                pre.sort_unstable();
                post.sort_unstable();
                Transition { id, pre, post }
            })
            .collect();

        let net = PetriNet {
            places,
            transitions,
            place_index,
        };
        for orphan in net.orphan_nodes() {
            warn!("node `{orphan}` is not connected to any arc");
        }
        Ok(net)
    }

    pub fn num_places(&self) -> usize {
        self.places.len()
    }

    pub fn num_transitions(&self) -> usize {
        self.transitions.len()
    }

    /// Places in the canonical (sorted-by-id) order.
    pub fn places(&self) -> &[Place] {
        &self.places
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Position of a place in the canonical order.
    pub fn place_index(&self, id: &str) -> Option<usize> {
        self.place_index.get(id).copied()
    }

    pub fn initial_marking(&self) -> Marking {
        Marking(self.places.iter().map(|p| p.initial).collect())
    }

    /// True if every input place of transition `t` carries a token.
    pub fn enabled(&self, marking: &Marking, t: usize) -> bool {
        self.transitions[t].pre.iter().all(|p| marking.0[*p])
    }

    /// Fire transition `t` in `marking`: consume every input token, produce every
    /// output token. The caller must check [PetriNet::enabled] first.
    pub fn fire(&self, marking: &Marking, t: usize) -> Marking {
        let mut next = marking.clone();
        for p in &self.transitions[t].pre {
            next.0[*p] = false;
        }
        for p in &self.transitions[t].post {
            next.0[*p] = true;
        }
        next
    }

    /// True if no transition is enabled in `marking`.
    pub fn is_dead(&self, marking: &Marking) -> bool {
        (0..self.transitions.len()).all(|t| !self.enabled(marking, t))
    }

    /// Render a marking as an id-keyed 0/1 assignment, the shape used in reports.
    pub fn named_marking(&self, marking: &Marking) -> BTreeMap<String, u8> {
        self.places
            .iter()
            .zip(marking.0.iter())
            .map(|(place, value)| (place.id.clone(), u8::from(*value)))
            .collect()
    }

    fn orphan_nodes(&self) -> Vec<&str> {
        let mut connected = HashSet::new();
        for t in &self.transitions {
            if !t.pre.is_empty() || !t.post.is_empty() {
                connected.insert(t.id.as_str());
            }
            for p in t.pre.iter().chain(&t.post) {
                connected.insert(self.places[*p].id.as_str());
            }
        }
        self.places
            .iter()
            .map(|p| p.id.as_str())
            .chain(self.transitions.iter().map(|t| t.id.as_str()))
            .filter(|id| !connected.contains(id))
            .collect()
    }
}

/// A marking of a 1-safe net: one bit per place, indexed by the canonical place
/// order of the owning [PetriNet]. Place identifiers never appear here, so markings
/// stay cheap to hash and compare in the explicit search.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Marking(Vec<bool>);

impl Marking {
    pub fn from_bits(bits: Vec<bool>) -> Marking {
        Marking(bits)
    }

    pub fn empty(num_places: usize) -> Marking {
        Marking(vec![false; num_places])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no place carries a token.
    pub fn is_all_empty(&self) -> bool {
        self.0.iter().all(|b| !b)
    }

    pub fn is_marked(&self, place: usize) -> bool {
        self.0[place]
    }

    pub fn set(&mut self, place: usize, value: bool) {
        self.0[place] = value;
    }

    pub fn bits(&self) -> &[bool] {
        &self.0
    }

    /// Indices of the marked places.
    pub fn marked_places(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, bit)| bit.then_some(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arcs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn canonical_place_order_is_sorted() {
        let net = PetriNet::new(
            vec![Place::new("z", true), Place::new("a", false)],
            vec!["t".to_string()],
            &arcs(&[("z", "t"), ("t", "a")]),
        )
        .unwrap();

        assert_eq!(net.places()[0].id, "a");
        assert_eq!(net.places()[1].id, "z");
        assert_eq!(net.place_index("z"), Some(1));

        let m0 = net.initial_marking();
        assert!(!m0.is_marked(0));
        assert!(m0.is_marked(1));
    }

    #[test]
    fn firing_moves_tokens() {
        let net = PetriNet::new(
            vec![Place::new("p", true), Place::new("q", false)],
            vec!["t".to_string()],
            &arcs(&[("p", "t"), ("t", "q")]),
        )
        .unwrap();

        let m0 = net.initial_marking();
        assert!(net.enabled(&m0, 0));
        let m1 = net.fire(&m0, 0);
        assert!(!m1.is_marked(net.place_index("p").unwrap()));
        assert!(m1.is_marked(net.place_index("q").unwrap()));
        assert!(!net.enabled(&m1, 0));
        assert!(net.is_dead(&m1));
    }

    #[test]
    fn self_loop_keeps_token() {
        // Pre and Post overlap: the token is consumed and immediately reproduced.
        let net = PetriNet::new(
            vec![Place::new("p", true)],
            vec!["t".to_string()],
            &arcs(&[("p", "t"), ("t", "p")]),
        )
        .unwrap();

        let m0 = net.initial_marking();
        assert_eq!(net.fire(&m0, 0), m0);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let result = PetriNet::new(
            vec![Place::new("p", false), Place::new("p", true)],
            vec![],
            &[],
        );
        assert_eq!(result.unwrap_err(), NetError::DuplicatePlace("p".into()));

        let result = PetriNet::new(
            vec![Place::new("p", false)],
            vec!["t".to_string(), "t".to_string()],
            &[],
        );
        assert_eq!(
            result.unwrap_err(),
            NetError::DuplicateTransition("t".into())
        );

        let result = PetriNet::new(vec![Place::new("x", false)], vec!["x".to_string()], &[]);
        assert_eq!(result.unwrap_err(), NetError::SharedId("x".into()));
    }

    #[test]
    fn rejects_malformed_arcs() {
        let places = vec![Place::new("p", false), Place::new("q", false)];
        let transitions = vec!["t".to_string(), "u".to_string()];

        let result = PetriNet::new(places.clone(), transitions.clone(), &arcs(&[("p", "ghost")]));
        assert_eq!(
            result.unwrap_err(),
            NetError::UndefinedArcEndpoint("p".into(), "ghost".into())
        );

        let result = PetriNet::new(places.clone(), transitions.clone(), &arcs(&[("p", "q")]));
        assert_eq!(
            result.unwrap_err(),
            NetError::InvalidArcKind("p".into(), "q".into())
        );

        let result = PetriNet::new(places, transitions, &arcs(&[("t", "u")]));
        assert_eq!(
            result.unwrap_err(),
            NetError::InvalidArcKind("t".into(), "u".into())
        );
    }

    #[test]
    fn orphan_nodes_are_accepted() {
        // Unconnected nodes only produce a warning; rejection is reserved for
        // structural defects.
        let net = PetriNet::new(
            vec![Place::new("p", true), Place::new("lonely", false)],
            vec!["t".to_string(), "idle".to_string()],
            &arcs(&[("p", "t")]),
        )
        .unwrap();

        assert_eq!(net.num_places(), 2);
        assert_eq!(net.num_transitions(), 2);
        assert!(net.place_index("lonely").is_some());
        let idle = net.transitions().iter().find(|t| t.id == "idle").unwrap();
        assert!(idle.pre().is_empty());
        assert!(idle.post().is_empty());
    }

    #[test]
    fn duplicate_arcs_collapse() {
        let net = PetriNet::new(
            vec![Place::new("p", true)],
            vec!["t".to_string()],
            &arcs(&[("p", "t"), ("p", "t")]),
        )
        .unwrap();
        assert_eq!(net.transitions()[0].pre(), &[0]);
    }
}
