use xml::attribute::OwnedAttribute;

use super::PnmlError;

/// Look up an attribute by local name.
pub fn attribute_value(attributes: &[OwnedAttribute], name: &str) -> Option<String> {
    attributes
        .iter()
        .find(|attribute| attribute.name.local_name == name)
        .map(|attribute| attribute.value.clone())
}

/// Like [attribute_value], but a missing attribute is a parse error of `element`.
pub fn expect_attribute(
    attributes: &[OwnedAttribute],
    element: &'static str,
    attribute: &'static str,
) -> Result<String, PnmlError> {
    attribute_value(attributes, attribute).ok_or(PnmlError::MissingAttribute {
        element,
        attribute,
    })
}
