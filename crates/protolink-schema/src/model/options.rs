//! Declaration options: raw elements plus their linked form.
//!
//! Raw [`OptionElement`]s are kept verbatim so the schema can be written back
//! out. Linking resolves each element's name to a [`ProtoMember`] on the
//! options type (or an extension of it) and converts its value into a
//! [`LinkedValue`] keyed by members all the way down. Elements that share a
//! top-level member merge into one [`OptionEntry`].

use crate::element::{find_option, OptionElement, OptionValue};
use crate::mark_set::MarkSet;
use crate::proto_type::{ProtoMember, ProtoType};

#[derive(Debug, Clone, PartialEq)]
pub enum LinkedValue {
    String(String),
    Bool(bool),
    Number(String),
    Enum(String),
    List(Vec<LinkedValue>),
    Message(Vec<(ProtoMember, LinkedValue)>),
}

impl LinkedValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            LinkedValue::String(s) | LinkedValue::Number(s) | LinkedValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            LinkedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Field value of a message-typed option, by simple or qualified name.
    pub fn field(&self, name: &str) -> Option<&LinkedValue> {
        match self {
            LinkedValue::Message(pairs) => pairs
                .iter()
                .find(|(m, _)| m.member() == name || m.simple_name() == name)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn to_option_value(&self) -> OptionValue {
        match self {
            LinkedValue::String(s) => OptionValue::String(s.clone()),
            LinkedValue::Bool(b) => OptionValue::Boolean(*b),
            LinkedValue::Number(n) => OptionValue::Number(n.clone()),
            LinkedValue::Enum(e) => OptionValue::Enum(e.clone()),
            LinkedValue::List(items) => OptionValue::List(items.iter().map(LinkedValue::to_option_value).collect()),
            LinkedValue::Message(pairs) => OptionValue::Map(
                pairs
                    .iter()
                    .map(|(member, value)| {
                        let key = if member.is_extension() {
                            format!("[{}]", member.member())
                        } else {
                            member.member().to_string()
                        };
                        (key, value.to_option_value())
                    })
                    .collect(),
            ),
        }
    }

    fn collect_members(&self, out: &mut Vec<ProtoMember>) {
        match self {
            LinkedValue::Message(pairs) => {
                for (member, value) in pairs {
                    out.push(member.clone());
                    value.collect_members(out);
                }
            }
            LinkedValue::List(items) => {
                for item in items {
                    item.collect_members(out);
                }
            }
            _ => {}
        }
    }

    fn merge(&mut self, other: LinkedValue) {
        match (self, other) {
            (LinkedValue::Message(pairs), LinkedValue::Message(incoming)) => {
                for (member, value) in incoming {
                    match pairs.iter_mut().find(|(m, _)| *m == member) {
                        Some((_, existing)) => existing.merge(value),
                        None => pairs.push((member, value)),
                    }
                }
            }
            (slot, other) => *slot = other,
        }
    }

    fn retain(&self, marks: &mut MarkSet<'_>) -> LinkedValue {
        match self {
            LinkedValue::Message(pairs) => {
                let mut kept = Vec::new();
                for (member, value) in pairs {
                    if marks.contains_member(member) {
                        kept.push((member.clone(), value.retain(marks)));
                    }
                }
                LinkedValue::Message(kept)
            }
            LinkedValue::List(items) => LinkedValue::List(items.iter().map(|item| item.retain(marks)).collect()),
            other => other.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionEntry {
    pub(crate) member: ProtoMember,
    pub(crate) value: LinkedValue,
    /// Indices of the raw elements this entry was linked from.
    pub(crate) elements: Vec<usize>,
}

impl OptionEntry {
    pub fn member(&self) -> &ProtoMember {
        &self.member
    }

    pub fn value(&self) -> &LinkedValue {
        &self.value
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    option_type: ProtoType,
    elements: Vec<OptionElement>,
    entries: Option<Vec<OptionEntry>>,
}

impl Options {
    pub fn new(option_type: &str, elements: Vec<OptionElement>) -> Self {
        Self {
            option_type: ProtoType::named(option_type),
            elements,
            entries: None,
        }
    }

    pub fn option_type(&self) -> &ProtoType {
        &self.option_type
    }

    pub fn elements(&self) -> &[OptionElement] {
        &self.elements
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn is_linked(&self) -> bool {
        self.entries.is_some()
    }

    /// Linked entries; empty until linked.
    pub fn entries(&self) -> &[OptionEntry] {
        self.entries.as_deref().unwrap_or(&[])
    }

    pub fn get(&self, member: &ProtoMember) -> Option<&LinkedValue> {
        self.entries()
            .iter()
            .find(|e| &e.member == member)
            .map(|e| &e.value)
    }

    /// Linked value by member name (`packed`, `my.pkg.ext`).
    pub fn get_named(&self, name: &str) -> Option<&LinkedValue> {
        self.entries()
            .iter()
            .find(|e| e.member.member() == name)
            .map(|e| &e.value)
    }

    /// Raw element value by option name; available before linking.
    pub fn element_value(&self, name: &str) -> Option<&OptionValue> {
        find_option(&self.elements, name)
    }

    pub fn element_bool(&self, name: &str) -> Option<bool> {
        self.element_value(name).and_then(OptionValue::as_bool)
    }

    pub fn element_str(&self, name: &str) -> Option<&str> {
        self.element_value(name).and_then(OptionValue::as_str)
    }

    /// Every member referenced by the linked entries, nested ones included.
    pub fn members(&self) -> Vec<ProtoMember> {
        let mut out = Vec::new();
        for entry in self.entries() {
            out.push(entry.member.clone());
            entry.value.collect_members(&mut out);
        }
        out
    }

    pub(crate) fn set_entries(&mut self, entries: Vec<OptionEntry>) {
        self.entries = Some(entries);
    }

    /// Adds `entry`, merging it into an existing entry for the same member.
    pub(crate) fn merge_entry(entries: &mut Vec<OptionEntry>, entry: OptionEntry) {
        match entries.iter_mut().find(|e| e.member == entry.member) {
            Some(existing) => {
                existing.value.merge(entry.value);
                existing.elements.extend(entry.elements);
            }
            None => entries.push(entry),
        }
    }

    /// Drops everything; dependency declarations keep no options.
    pub(crate) fn retain_linked(&self) -> Options {
        Options {
            option_type: self.option_type.clone(),
            elements: Vec::new(),
            entries: None,
        }
    }

    pub(crate) fn retain_all(&self, marks: &mut MarkSet<'_>) -> Options {
        let Some(entries) = &self.entries else {
            return self.clone();
        };

        // Per raw element: which entry owns it. Unowned elements pass through.
        let mut owner: Vec<Option<usize>> = vec![None; self.elements.len()];
        for (entry_index, entry) in entries.iter().enumerate() {
            for &i in &entry.elements {
                if let Some(slot) = owner.get_mut(i) {
                    *slot = Some(entry_index);
                }
            }
        }

        let mut retained: Vec<Option<LinkedValue>> = Vec::with_capacity(entries.len());
        for entry in entries {
            retained.push(
                marks
                    .contains_member(&entry.member)
                    .then(|| entry.value.retain(marks)),
            );
        }

        let mut elements = Vec::new();
        let mut positions: Vec<Vec<usize>> = vec![Vec::new(); entries.len()];
        for (i, element) in self.elements.iter().enumerate() {
            let Some(entry_index) = owner[i] else {
                elements.push(element.clone());
                continue;
            };
            let entry = &entries[entry_index];
            let Some(value) = &retained[entry_index] else {
                continue;
            };
            if *value == entry.value {
                positions[entry_index].push(elements.len());
                elements.push(element.clone());
            } else if positions[entry_index].is_empty() {
                // Nested members were pruned; rebuild one element from what is left.
                positions[entry_index].push(elements.len());
                elements.push(OptionElement {
                    name: entry.member.member().to_string(),
                    value: value.to_option_value(),
                    is_parenthesized: entry.member.is_extension(),
                });
            }
        }

        let kept_entries = entries
            .iter()
            .zip(retained)
            .zip(positions)
            .filter_map(|((entry, value), elements)| {
                value.map(|value| OptionEntry {
                    member: entry.member.clone(),
                    value,
                    elements,
                })
            })
            .collect();

        Options {
            option_type: self.option_type.clone(),
            elements,
            entries: Some(kept_entries),
        }
    }

    pub fn to_elements(&self) -> Vec<OptionElement> {
        self.elements.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(text: &str) -> ProtoMember {
        ProtoMember::parse(text).expect("member")
    }

    #[test]
    fn merging_entries_unions_message_values() {
        let mut entries = Vec::new();
        Options::merge_entry(
            &mut entries,
            OptionEntry {
                member: member("google.protobuf.FieldOptions#a.range"),
                value: LinkedValue::Message(vec![(member("a.Range#min"), LinkedValue::Number("1".into()))]),
                elements: vec![0],
            },
        );
        Options::merge_entry(
            &mut entries,
            OptionEntry {
                member: member("google.protobuf.FieldOptions#a.range"),
                value: LinkedValue::Message(vec![(member("a.Range#max"), LinkedValue::Number("9".into()))]),
                elements: vec![1],
            },
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].elements, vec![0, 1]);
        assert_eq!(entries[0].value.field("max").and_then(LinkedValue::as_str), Some("9"));

        let mut options = Options::new("google.protobuf.FieldOptions", vec![]);
        options.set_entries(entries);
        assert_eq!(
            options.members(),
            vec![
                member("google.protobuf.FieldOptions#a.range"),
                member("a.Range#min"),
                member("a.Range#max"),
            ]
        );
    }

    #[test]
    fn raw_elements_are_queryable_before_linking() {
        let options = Options::new(
            "google.protobuf.FieldOptions",
            vec![
                OptionElement::new("packed", OptionValue::Boolean(true)),
                OptionElement::extension("wire.since", OptionValue::string("1.2")),
            ],
        );
        assert!(!options.is_linked());
        assert_eq!(options.element_bool("packed"), Some(true));
        assert_eq!(options.element_str("wire.since"), Some("1.2"));
        assert!(options.entries().is_empty());
    }
}
