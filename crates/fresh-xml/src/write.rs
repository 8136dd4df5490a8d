//! Serialization to the canonical pretty-printed wire format.
//!
//! Output always starts with a UTF-8 declaration, indents nested elements by
//! two spaces, keeps text-only elements on one line and writes elements with
//! mixed content inline so no character data is altered.

use std::fs;
use std::path::Path;

use xot::output::{Indentation, xml::Parameters};

use crate::document::Document;
use crate::error::{DocumentError, Result};

const DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

impl Document {
    /// Serialize the document to a `String`.
    pub fn to_xml_string(&self) -> Result<String> {
        let body = self
            .xot
            .serialize_xml_string(
                Parameters {
                    indentation: Some(Indentation::default()),
                    ..Default::default()
                },
                self.node,
            )
            .map_err(DocumentError::serialize)?;
        let mut out = String::with_capacity(DECLARATION.len() + body.len() + 1);
        out.push_str(DECLARATION);
        out.push_str(body.trim());
        out.push('\n');
        Ok(out)
    }

    /// Serialize the document to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_xml_string().map(String::into_bytes)
    }

    /// Serialize and write the document, creating parent directories.
    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| DocumentError::Serialize {
                    message: format!("create {}: {err}", parent.display()),
                })?;
            }
        }
        fs::write(path, bytes).map_err(|err| DocumentError::Serialize {
            message: format!("write {}: {err}", path.display()),
        })
    }
}
