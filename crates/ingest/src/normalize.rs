use crate::types::{Document, RawRow};

/// Turn one raw row into a document, dropping missing and empty cells.
///
/// Returns `None` when nothing survives; such rows are skipped, not errors.
/// Values are kept verbatim: no trimming, no type coercion.
///
/// ```rust
/// use ingest::{normalize, RawRow};
///
/// let mut row = RawRow::new();
/// row.insert("a".into(), Some("1".into()));
/// row.insert("b".into(), Some("".into()));
/// row.insert("c".into(), None);
///
/// let doc = normalize(row).unwrap();
/// assert_eq!(doc.len(), 1);
/// assert_eq!(doc.get("a"), Some("1"));
/// ```
pub fn normalize(raw: RawRow) -> Option<Document> {
    let doc: Document = raw
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect();

    if doc.is_empty() {
        None
    } else {
        Some(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, Option<&str>)]) -> RawRow {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    #[test]
    fn strips_empty_and_missing_fields() {
        let doc = normalize(row(&[("a", Some("1")), ("b", Some("")), ("c", None)]))
            .expect("one field survives");
        let expected: Document = [("a", "1")].into_iter().collect();
        assert_eq!(doc, expected);
    }

    #[test]
    fn all_empty_row_yields_nothing() {
        assert!(normalize(row(&[("a", Some("")), ("b", None)])).is_none());
        assert!(normalize(RawRow::new()).is_none());
    }

    #[test]
    fn whitespace_values_are_kept_verbatim() {
        let doc = normalize(row(&[("name", Some("  Ada ")), ("note", Some(" "))])).unwrap();
        assert_eq!(doc.get("name"), Some("  Ada "));
        assert_eq!(doc.get("note"), Some(" "));
    }

    #[test]
    fn header_order_preserved() {
        let doc = normalize(row(&[
            ("Name", Some("Bobby")),
            ("Age", Some("30")),
            ("Gender", None),
            ("Blood Type", Some("B-")),
        ]))
        .unwrap();
        let keys: Vec<_> = doc.keys().collect();
        assert_eq!(keys, vec!["Name", "Age", "Blood Type"]);
    }
}
