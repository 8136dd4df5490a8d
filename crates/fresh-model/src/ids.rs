use std::path::Path;

/// Enrichment namespace for elements added during migration.
pub const FRESH_NS: &str = "urn:fresh-enrichment:v1";

/// Prefix bound to [`FRESH_NS`].
pub const FRESH_PREFIX: &str = "fresh";

/// Document identifier: the part of the file name before the first `_`.
///
/// Names without an underscore fall back to the file stem, so `123.xml`
/// and `123_study.xml` both yield `123`.
pub fn document_id_from_filename(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split_once('_') {
        Some((id, _)) => id.to_string(),
        None => path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_prefix_before_underscore() {
        assert_eq!(
            document_id_from_filename(Path::new("in/123_heart_study.xml")),
            "123"
        );
    }

    #[test]
    fn id_without_underscore_is_stem() {
        assert_eq!(document_id_from_filename(Path::new("456.xml")), "456");
    }
}
