//! EPUB archive assembly
//!
//! [`ArchiveBuilder`] turns an ordered list of entries into the bytes of an
//! EPUB container (a ZIP with strict internal rules):
//!
//! - the `mimetype` entry must exist, be first, and be stored uncompressed
//! - every other entry is deflated at maximum level unless explicitly stored
//! - a package descriptor entry requires a `META-INF/container.xml` entry
//!   referencing it
//!
//! Violations are [`ArchiveError`]s; no partial output is ever produced.
//! Entry bytes are written exactly as supplied.

use crate::error::{ArchiveError, Result};
use crate::types::{ArchiveEntry, FileBody, PACKAGE_DESCRIPTOR_TYPE};
use std::io::{Cursor, Write};
use zip::CompressionMethod;
use zip::write::FileOptions;

/// Archive path of the container cross-reference entry
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Archive path of the iBooks display-options entry
pub const DISPLAY_OPTIONS_PATH: &str = "META-INF/com.apple.ibooks.display-options.xml";

/// Literal content of the `mimetype` entry
pub const MIMETYPE_CONTENT: &str = "application/epub+zip";

/// Static display-options content enabling specified fonts
pub const DISPLAY_OPTIONS_CONTENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<display_options>
  <platform name="*">
    <option name="specified-fonts">true</option>
  </platform>
</display_options>"#;

/// Container XML referencing the package descriptor at `opf_path`
pub fn container_xml(opf_path: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{opf_path}" media-type="{PACKAGE_DESCRIPTOR_TYPE}"/>
  </rootfiles>
</container>"#
    )
}

/// The mandatory first entry of every archive
pub fn mimetype_entry() -> ArchiveEntry {
    ArchiveEntry::stored(
        "mimetype",
        FileBody::Text(MIMETYPE_CONTENT.to_string()),
        "text/plain",
    )
}

/// The static iBooks display-options entry
pub fn display_options_entry() -> ArchiveEntry {
    ArchiveEntry::new(
        DISPLAY_OPTIONS_PATH,
        FileBody::Text(DISPLAY_OPTIONS_CONTENT.to_string()),
        "application/xml",
    )
}

/// Assembles ordered entries into EPUB container bytes
pub struct ArchiveBuilder;

impl ArchiveBuilder {
    /// Build the archive, validating ordering and cross-reference invariants
    pub fn build(entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
        Self::validate(entries)?;

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));

        for entry in entries {
            let options = if entry.path == "mimetype" || entry.store_uncompressed {
                FileOptions::default().compression_method(CompressionMethod::Stored)
            } else {
                FileOptions::default()
                    .compression_method(CompressionMethod::Deflated)
                    .compression_level(Some(9))
            };
            writer
                .start_file(&entry.path, options)
                .map_err(|e| ArchiveError::WriteFailed(format!("{}: {}", entry.path, e)))?;
            writer
                .write_all(entry.body.as_bytes())
                .map_err(|e| ArchiveError::WriteFailed(format!("{}: {}", entry.path, e)))?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| ArchiveError::WriteFailed(e.to_string()))?;
        Ok(cursor.into_inner())
    }

    fn validate(entries: &[ArchiveEntry]) -> Result<()> {
        let position = entries.iter().position(|e| e.path == "mimetype");
        match position {
            None => return Err(ArchiveError::MissingMimetype.into()),
            Some(0) => {}
            Some(position) => return Err(ArchiveError::MimetypeNotFirst { position }.into()),
        }

        if let Some(descriptor) = entries
            .iter()
            .find(|e| e.media_type == PACKAGE_DESCRIPTOR_TYPE)
        {
            let has_container = entries.iter().any(|e| e.path == CONTAINER_PATH);
            if !has_container {
                return Err(ArchiveError::MissingContainer {
                    path: descriptor.path.clone(),
                }
                .into());
            }
        }

        Ok(())
    }
}
