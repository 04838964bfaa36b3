//! Snapshot of a zone's existing A records
//!
//! Loaded once at the start of a cycle and never refreshed within it. All
//! create/update decisions of a cycle are made against this one snapshot.

use crate::model::DnsRecord;
use crate::validate::normalize_record_name;
use std::collections::HashMap;

/// Name and content of an indexed record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    /// Record name as stored by the provider
    pub name: String,
    /// Current content
    pub content: String,
}

/// Result of looking up a hostname in the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMatch<'a> {
    /// Identifier of the record to reconcile
    pub id: &'a str,
    /// The record's entry
    pub entry: &'a RecordEntry,
    /// Other records with the same name, in listing order
    pub shadowed: Vec<&'a str>,
}

/// Read-only index of existing records
#[derive(Debug, Clone, Default)]
pub struct RecordIndex {
    /// Record id → entry
    records: HashMap<String, RecordEntry>,

    /// Normalized name → record ids, in listing order
    by_name: HashMap<String, Vec<String>>,
}

impl RecordIndex {
    /// Build an index from a record listing
    ///
    /// Listing order is preserved per name so that the "first found" record
    /// is stable for a given provider response. A repeated record id keeps
    /// its first entry.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = DnsRecord>,
    {
        let mut index = Self::default();
        for record in records {
            if index.records.contains_key(&record.id) {
                continue;
            }
            index
                .by_name
                .entry(normalize_record_name(&record.name))
                .or_default()
                .push(record.id.clone());
            index.records.insert(
                record.id,
                RecordEntry {
                    name: record.name,
                    content: record.content,
                },
            );
        }
        index
    }

    /// Number of indexed records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get a record by identifier
    pub fn get(&self, id: &str) -> Option<&RecordEntry> {
        self.records.get(id)
    }

    /// Find the record to reconcile for a fully-qualified name
    ///
    /// Both the query and the stored names are normalized. When several
    /// records share the name, the first listed one is returned and the rest
    /// are reported as shadowed.
    pub fn find_by_name(&self, fqdn: &str) -> Option<NameMatch<'_>> {
        let ids = self.by_name.get(&normalize_record_name(fqdn))?;
        let (first, rest) = ids.split_first()?;
        let entry = self.records.get(first)?;

        Some(NameMatch {
            id: first,
            entry,
            shadowed: rest.iter().map(String::as_str).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_name() {
        let index = RecordIndex::from_records(vec![
            DnsRecord::new("r1", "a.example.com", "1.1.1.1"),
            DnsRecord::new("r2", "b.example.com", "2.2.2.2"),
        ]);

        assert_eq!(index.len(), 2);
        let found = index.find_by_name("a.example.com").unwrap();
        assert_eq!(found.id, "r1");
        assert_eq!(found.entry.content, "1.1.1.1");
        assert!(found.shadowed.is_empty());
        assert!(index.find_by_name("c.example.com").is_none());
    }

    #[test]
    fn test_stored_names_are_normalized() {
        let index = RecordIndex::from_records(vec![DnsRecord::new(
            "r1",
            "Laptop-01.Example.COM.",
            "1.1.1.1",
        )]);

        let found = index.find_by_name("laptop-01.example.com").unwrap();
        assert_eq!(found.id, "r1");
        assert_eq!(found.entry.name, "Laptop-01.Example.COM.");
    }

    #[test]
    fn test_duplicates_pick_first_listed() {
        let index = RecordIndex::from_records(vec![
            DnsRecord::new("r1", "a.example.com", "1.1.1.1"),
            DnsRecord::new("r2", "A.example.com", "3.3.3.3"),
            DnsRecord::new("r3", "a.example.com", "4.4.4.4"),
        ]);

        let found = index.find_by_name("a.example.com").unwrap();
        assert_eq!(found.id, "r1");
        assert_eq!(found.shadowed, vec!["r2", "r3"]);
    }

    #[test]
    fn test_repeated_id_keeps_first() {
        let index = RecordIndex::from_records(vec![
            DnsRecord::new("r1", "a.example.com", "1.1.1.1"),
            DnsRecord::new("r1", "a.example.com", "9.9.9.9"),
        ]);

        assert_eq!(index.len(), 1);
        assert_eq!(index.get("r1").unwrap().content, "1.1.1.1");
        assert!(index.find_by_name("a.example.com").unwrap().shadowed.is_empty());
    }
}
