//! Document property scrubbing (`docProps/core.xml`, `docProps/app.xml`).

use crate::package::Package;
use crate::xml::XmlPart;
use unmark_core::Result;

const CORE_PROPS: &str = "docProps/core.xml";
const APP_PROPS: &str = "docProps/app.xml";

/// Core properties blanked to an empty string.
const CORE_TEXT_FIELDS: &[&[u8]] = &[
    b"creator",
    b"lastModifiedBy",
    b"title",
    b"subject",
    b"description",
    b"keywords",
    b"category",
];

/// Core properties holding W3CDTF dates; an empty value is invalid there.
const CORE_DATE_FIELDS: &[&[u8]] = &[b"created", b"modified"];

const EPOCH: &str = "1970-01-01T00:00:00Z";

/// Extended properties blanked to an empty string.
const APP_TEXT_FIELDS: &[&[u8]] = &[b"Company", b"Manager"];

/// Blank author, title and company metadata.
///
/// Returns whether any property part was present.
pub fn scrub_metadata(package: &mut Package) -> Result<bool> {
    let mut touched = false;

    if let Some(bytes) = package.get(CORE_PROPS) {
        let mut part = XmlPart::parse(CORE_PROPS, bytes)?;
        let mut changed = 0;
        for field in CORE_TEXT_FIELDS {
            changed += part.set_element_text(field, "")?;
        }
        for field in CORE_DATE_FIELDS {
            changed += part.set_element_text(field, EPOCH)?;
        }
        log::debug!("Scrubbed {} core properties", changed);
        package.set(CORE_PROPS, part.serialize(&[])?);
        touched = true;
    }

    if let Some(bytes) = package.get(APP_PROPS) {
        let mut part = XmlPart::parse(APP_PROPS, bytes)?;
        let mut changed = 0;
        for field in APP_TEXT_FIELDS {
            changed += part.set_element_text(field, "")?;
        }
        log::debug!("Scrubbed {} extended properties", changed);
        package.set(APP_PROPS, part.serialize(&[])?);
        touched = true;
    }

    Ok(touched)
}
