use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use xml::reader::{EventReader, XmlEvent};

use super::utils::expect_attribute;
use super::PnmlError;
use crate::petri_net::{PetriNet, Place};

/// Which `<text>` payload the parser is currently collecting.
#[derive(PartialEq, Eq)]
enum TextTarget {
    None,
    PlaceName,
    InitialMarking,
}

/// Read a PNML file from disk.
pub fn load_pnml(path: impl AsRef<Path>) -> Result<PetriNet, PnmlError> {
    let file = File::open(path)?;
    parse_pnml(BufReader::new(file))
}

/// Parse a PNML document into a validated [PetriNet].
///
/// The net content may sit directly under `<net>` or inside `<page>` elements; both
/// dialects occur in the wild and the event stream makes them look the same. Only
/// the structural subset used by 1-safe nets is read: place ids, optional place
/// names, initial markings, transition ids and unit-weight arcs. Everything else
/// (graphics, tool annotations) is skipped.
pub fn parse_pnml<R: Read>(input: R) -> Result<PetriNet, PnmlError> {
    let mut xml = EventReader::new(input);

    let mut saw_net = false;
    let mut places: Vec<Place> = Vec::new();
    let mut transitions: Vec<String> = Vec::new();
    let mut arcs: Vec<(String, String)> = Vec::new();

    let mut current_place: Option<Place> = None;
    let mut target = TextTarget::None;
    let mut in_text = false;
    let mut buffer = String::new();

    loop {
        match xml.next()? {
            XmlEvent::StartElement {
                name, attributes, ..
            } => match name.local_name.as_str() {
                "net" => saw_net = true,
                "place" => {
                    let id = expect_attribute(&attributes, "place", "id")?;
                    current_place = Some(Place {
                        id,
                        name: None,
                        initial: false,
                    });
                }
                "transition" => {
                    transitions.push(expect_attribute(&attributes, "transition", "id")?);
                }
                "arc" => {
                    let source = expect_attribute(&attributes, "arc", "source")?;
                    let sink = expect_attribute(&attributes, "arc", "target")?;
                    arcs.push((source, sink));
                }
                "name" if current_place.is_some() => {
                    target = TextTarget::PlaceName;
                    buffer.clear();
                }
                "initialMarking" if current_place.is_some() => {
                    target = TextTarget::InitialMarking;
                    buffer.clear();
                }
                "text" if target != TextTarget::None => in_text = true,
                _ => (),
            },
            XmlEvent::Characters(text) => {
                if in_text {
                    buffer.push_str(&text);
                }
            }
            XmlEvent::EndElement { name } => match name.local_name.as_str() {
                "text" => in_text = false,
                "name" => {
                    if target == TextTarget::PlaceName {
                        target = TextTarget::None;
                        if let Some(place) = current_place.as_mut() {
                            let label = buffer.trim();
                            if !label.is_empty() {
                                place.name = Some(label.to_string());
                            }
                        }
                    }
                }
                "initialMarking" => {
                    if target == TextTarget::InitialMarking {
                        target = TextTarget::None;
                        if let Some(place) = current_place.as_mut() {
                            place.initial = match buffer.trim() {
                                // An empty payload counts as "no tokens", like a
                                // missing element.
                                "" | "0" => false,
                                "1" => true,
                                other => {
                                    return Err(PnmlError::NonSafeMarking {
                                        place: place.id.clone(),
                                        value: other.to_string(),
                                    });
                                }
                            };
                        }
                    }
                }
                "place" => {
                    if let Some(place) = current_place.take() {
                        places.push(place);
                    }
                }
                _ => (),
            },
            XmlEvent::EndDocument => break,
            _ => (),
        }
    }

    if !saw_net {
        return Err(PnmlError::MissingElement("net"));
    }

    Ok(PetriNet::new(places, transitions, &arcs)?)
}
