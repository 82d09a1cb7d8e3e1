//! Event-driven parsing of PNML documents into [crate::petri_net::PetriNet] values.

use thiserror::Error;

use crate::petri_net::NetError;

pub mod pnml;
pub mod utils;

/// Everything that can go wrong between a PNML byte stream and a validated net.
///
/// The analyzers never see malformed input; every defect is rejected here.
#[derive(Error, Debug)]
pub enum PnmlError {
    #[error("cannot read PNML file: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] xml::reader::Error),
    #[error("missing <{0}> element")]
    MissingElement(&'static str),
    #[error("<{element}> is missing the `{attribute}` attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    #[error("initial marking of place `{place}` is `{value}`, expected 0 or 1 in a 1-safe net")]
    NonSafeMarking { place: String, value: String },
    #[error(transparent)]
    Net(#[from] NetError),
}
