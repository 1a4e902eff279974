//! Identifier rule sets: which types to emit and which declarations to keep.
//!
//! A rule is an identifier (`a.b.C`, `a.b.C#member`) or a wildcard
//! (`a.b.*`, `*`). Matching is most-precise-first: an identifier is looked
//! up as-is, then its owner type, then `pkg.*` for each enclosing package
//! segment, then `*`. The first rule hit decides, so `a.b.C` in one set
//! beats `a.*` in the other whichever order they were declared in.
//!
//! Notes:
//! - Both rule sets remember which rules ever matched so callers can warn
//!   about rules that never applied.
//! - Nested types walk through their enclosing type's wildcard:
//!   `a.b.C.D` → `a.b.C.*` → `a.b.*` → `a.*` → `*`.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Deserialize;
use tracing::debug;

use crate::descriptor::{SINCE_OPTION, UNTIL_OPTION};
use crate::error::RulesError;
use crate::model::Options;
use crate::proto_type::{ProtoMember, ProtoType};

// ============================================================================
// Matching
// ============================================================================

/// The next less precise rule for `identifier`, or `None` after `*`.
pub(crate) fn enclosing(identifier: &str) -> Option<String> {
    if let Some(hash) = identifier.rfind('#') {
        return Some(identifier[..hash].to_string());
    }
    if identifier == "*" {
        return None;
    }
    let base = identifier.strip_suffix(".*").unwrap_or(identifier);
    match base.rfind('.') {
        Some(dot) => Some(format!("{}.*", &base[..dot])),
        None => Some("*".to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RuleMatch {
    First(String),
    Second(String),
    Neither,
}

pub(crate) fn precise_match(identifier: &str, first: &BTreeSet<String>, second: &BTreeSet<String>) -> RuleMatch {
    let mut rule = Some(identifier.to_string());
    while let Some(candidate) = rule {
        if first.contains(&candidate) {
            return RuleMatch::First(candidate);
        }
        if second.contains(&candidate) {
            return RuleMatch::Second(candidate);
        }
        rule = enclosing(&candidate);
    }
    RuleMatch::Neither
}

fn conflicts(kind: &'static str, a: &BTreeSet<String>, b: &BTreeSet<String>) -> Result<(), RulesError> {
    let identifiers: Vec<String> = a.intersection(b).cloned().collect();
    if identifiers.is_empty() {
        Ok(())
    } else {
        Err(RulesError::ConflictingRules { kind, identifiers })
    }
}

// ============================================================================
// Emitting rules
// ============================================================================

/// Which types a code generator should emit.
#[derive(Debug, Clone, Default)]
pub struct EmittingRules {
    includes: BTreeSet<String>,
    excludes: BTreeSet<String>,
    used_includes: BTreeSet<String>,
    used_excludes: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EmittingRulesBuilder {
    includes: BTreeSet<String>,
    excludes: BTreeSet<String>,
}

impl EmittingRulesBuilder {
    pub fn include(mut self, identifier: impl Into<String>) -> Self {
        self.includes.insert(identifier.into());
        self
    }

    pub fn includes<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.includes.extend(identifiers.into_iter().map(Into::into));
        self
    }

    pub fn exclude(mut self, identifier: impl Into<String>) -> Self {
        self.excludes.insert(identifier.into());
        self
    }

    pub fn excludes<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes.extend(identifiers.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Result<EmittingRules, RulesError> {
        conflicts("includes and excludes", &self.includes, &self.excludes)?;
        Ok(EmittingRules {
            includes: self.includes,
            excludes: self.excludes,
            ..EmittingRules::default()
        })
    }
}

impl EmittingRules {
    pub fn builder() -> EmittingRulesBuilder {
        EmittingRulesBuilder::default()
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    pub fn includes(&mut self, ty: &ProtoType) -> bool {
        self.includes_identifier(&ty.to_string())
    }

    /// The most precise rule decides; with no matching rule, everything is
    /// included only when there are no include rules at all.
    pub fn includes_identifier(&mut self, identifier: &str) -> bool {
        match precise_match(identifier, &self.includes, &self.excludes) {
            RuleMatch::First(rule) => {
                self.used_includes.insert(rule);
                true
            }
            RuleMatch::Second(rule) => {
                self.used_excludes.insert(rule);
                false
            }
            RuleMatch::Neither => self.includes.is_empty(),
        }
    }

    pub fn unused_includes(&self) -> Vec<String> {
        self.includes.difference(&self.used_includes).cloned().collect()
    }

    pub fn unused_excludes(&self) -> Vec<String> {
        self.excludes.difference(&self.used_excludes).cloned().collect()
    }
}

// ============================================================================
// Pruning rules
// ============================================================================

/// Which declarations survive pruning: roots (and everything they reach)
/// minus prunes, optionally filtered by `since`/`until`/`only` versions.
#[derive(Debug, Clone, Default)]
pub struct PruningRules {
    roots: BTreeSet<String>,
    prunes: BTreeSet<String>,
    since: Option<String>,
    until: Option<String>,
    only: Option<String>,
    used_roots: BTreeSet<String>,
    used_prunes: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PruningRulesBuilder {
    roots: BTreeSet<String>,
    prunes: BTreeSet<String>,
    since: Option<String>,
    until: Option<String>,
    only: Option<String>,
}

impl PruningRulesBuilder {
    pub fn add_root(mut self, identifier: impl Into<String>) -> Self {
        self.roots.insert(identifier.into());
        self
    }

    pub fn add_roots<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roots.extend(identifiers.into_iter().map(Into::into));
        self
    }

    pub fn prune(mut self, identifier: impl Into<String>) -> Self {
        self.prunes.insert(identifier.into());
        self
    }

    pub fn prunes<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prunes.extend(identifiers.into_iter().map(Into::into));
        self
    }

    pub fn since(mut self, version: impl Into<String>) -> Self {
        self.since = Some(version.into());
        self
    }

    pub fn until(mut self, version: impl Into<String>) -> Self {
        self.until = Some(version.into());
        self
    }

    pub fn only(mut self, version: impl Into<String>) -> Self {
        self.only = Some(version.into());
        self
    }

    pub fn build(self) -> Result<PruningRules, RulesError> {
        conflicts("roots and prunes", &self.roots, &self.prunes)?;
        if self.only.is_some() && (self.since.is_some() || self.until.is_some()) {
            return Err(RulesError::VersionConflict);
        }
        if let (Some(since), Some(until)) = (&self.since, &self.until) {
            if compare_versions(since, until) == Ordering::Greater {
                return Err(RulesError::InvertedVersionRange {
                    since: since.clone(),
                    until: until.clone(),
                });
            }
        }
        Ok(PruningRules {
            roots: self.roots,
            prunes: self.prunes,
            since: self.since,
            until: self.until,
            only: self.only,
            ..PruningRules::default()
        })
    }
}

impl PruningRules {
    pub fn builder() -> PruningRulesBuilder {
        PruningRulesBuilder::default()
    }

    /// No roots, no prunes and no version constraints: pruning is a no-op.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
            && self.prunes.is_empty()
            && self.since.is_none()
            && self.until.is_none()
            && self.only.is_none()
    }

    pub fn roots(&self) -> &BTreeSet<String> {
        &self.roots
    }

    pub fn prunes(&self) -> &BTreeSet<String> {
        &self.prunes
    }

    pub fn since(&self) -> Option<&str> {
        self.since.as_deref()
    }

    pub fn until(&self) -> Option<&str> {
        self.until.as_deref()
    }

    pub fn only(&self) -> Option<&str> {
        self.only.as_deref()
    }

    pub fn is_root_type(&mut self, ty: &ProtoType) -> bool {
        self.is_root(&ty.to_string())
    }

    pub fn is_root_member(&mut self, member: &ProtoMember) -> bool {
        self.is_root(&member.to_string())
    }

    /// With no roots everything not pruned is a root; otherwise the most
    /// precise matching rule must be a root.
    pub fn is_root(&mut self, identifier: &str) -> bool {
        match precise_match(identifier, &self.roots, &self.prunes) {
            RuleMatch::First(rule) => {
                self.used_roots.insert(rule);
                true
            }
            RuleMatch::Second(rule) => {
                self.used_prunes.insert(rule);
                false
            }
            RuleMatch::Neither => self.roots.is_empty(),
        }
    }

    pub fn prunes_type(&mut self, ty: &ProtoType) -> bool {
        self.prunes_identifier(&ty.to_string())
    }

    pub fn prunes_member(&mut self, member: &ProtoMember) -> bool {
        self.prunes_identifier(&member.to_string())
    }

    /// True if the most precise matching rule is a prune.
    pub fn prunes_identifier(&mut self, identifier: &str) -> bool {
        match precise_match(identifier, &self.prunes, &self.roots) {
            RuleMatch::First(rule) => {
                self.used_prunes.insert(rule);
                true
            }
            RuleMatch::Second(_) | RuleMatch::Neither => false,
        }
    }

    /// Version filter for fields and constants annotated with `wire.since`
    /// and `wire.until` (a half-open range `[since, until)`).
    pub fn is_field_retained(&self, options: &Options) -> bool {
        let since = options.element_str(SINCE_OPTION);
        let until = options.element_str(UNTIL_OPTION);
        self.is_retained_version(since, until)
    }

    pub fn is_retained_version(&self, since: Option<&str>, until: Option<&str>) -> bool {
        if let Some(only) = &self.only {
            let after_since = since.map_or(true, |s| compare_versions(s, only) != Ordering::Greater);
            let before_until = until.map_or(true, |u| compare_versions(u, only) == Ordering::Greater);
            return after_since && before_until;
        }
        if let (Some(rule_since), Some(field_until)) = (&self.since, until) {
            if compare_versions(field_until, rule_since) != Ordering::Greater {
                return false;
            }
        }
        if let (Some(rule_until), Some(field_since)) = (&self.until, since) {
            if compare_versions(field_since, rule_until) != Ordering::Less {
                return false;
            }
        }
        true
    }

    pub fn unused_roots(&self) -> Vec<String> {
        self.roots.difference(&self.used_roots).cloned().collect()
    }

    pub fn unused_prunes(&self) -> Vec<String> {
        self.prunes.difference(&self.used_prunes).cloned().collect()
    }

    pub(crate) fn log_unused(&self) {
        for rule in self.unused_roots() {
            debug!(%rule, "root rule matched nothing");
        }
        for rule in self.unused_prunes() {
            debug!(%rule, "prune rule matched nothing");
        }
    }
}

/// Dotted versions compare segment-wise, numerically where both segments
/// are numbers. Missing segments count as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.trim().split('.');
    let mut right = b.trim().split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (l, r) => {
                let l = l.unwrap_or("0");
                let r = r.unwrap_or("0");
                let ordering = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

// ============================================================================
// Config
// ============================================================================

/// Serde mirror of [`PruningRules`] for JSON/TOML configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PruningRulesConfig {
    pub roots: Vec<String>,
    pub prunes: Vec<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub only: Option<String>,
}

impl PruningRulesConfig {
    pub fn into_rules(self) -> Result<PruningRules, RulesError> {
        let mut builder = PruningRules::builder().add_roots(self.roots).prunes(self.prunes);
        if let Some(since) = self.since {
            builder = builder.since(since);
        }
        if let Some(until) = self.until {
            builder = builder.until(until);
        }
        if let Some(only) = self.only {
            builder = builder.only(only);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{OptionElement, OptionValue};

    #[test]
    fn enclosing_walk() {
        let mut chain = vec!["a.b.C#m".to_string()];
        while let Some(next) = chain.last().and_then(|last| enclosing(last)) {
            chain.push(next);
        }
        assert_eq!(chain, vec!["a.b.C#m", "a.b.C", "a.b.*", "a.*", "*"]);
        assert_eq!(enclosing("a.b.C.D").as_deref(), Some("a.b.C.*"));
        assert_eq!(enclosing("a.b.C#pkg.ext").as_deref(), Some("a.b.C"));
    }

    #[test]
    fn most_precise_rule_wins() {
        let mut rules = EmittingRules::builder()
            .include("a.*")
            .exclude("a.b.*")
            .include("a.b.Keep")
            .build()
            .expect("rules");
        assert!(rules.includes(&ProtoType::named("a.Foo")));
        assert!(!rules.includes(&ProtoType::named("a.b.Foo")));
        assert!(rules.includes(&ProtoType::named("a.b.Keep")));
        assert!(!rules.includes(&ProtoType::named("z.Other")));
        assert!(rules.unused_includes().is_empty());
    }

    #[test]
    fn empty_emitting_rules_include_everything() {
        let mut rules = EmittingRules::default();
        assert!(rules.includes(&ProtoType::named("any.Thing")));
        let mut excludes_only = EmittingRules::builder().exclude("x.*").build().expect("rules");
        assert!(excludes_only.includes(&ProtoType::named("y.Y")));
        assert!(!excludes_only.includes(&ProtoType::named("x.X")));
    }

    #[test]
    fn conflicting_rules_are_rejected() {
        let err = EmittingRules::builder().include("a.B").exclude("a.B").build().expect_err("conflict");
        assert!(err.to_string().contains("a.B"));
        let err = PruningRules::builder().add_root("x.*").prune("x.*").build().expect_err("conflict");
        assert!(matches!(err, RulesError::ConflictingRules { .. }));
        let err = PruningRules::builder().since("1").only("2").build().expect_err("conflict");
        assert_eq!(err, RulesError::VersionConflict);
    }

    #[test]
    fn roots_and_prunes() {
        let mut rules = PruningRules::builder()
            .add_root("a.*")
            .prune("a.Secret")
            .prune("a.Public#internal")
            .build()
            .expect("rules");
        assert!(rules.is_root_type(&ProtoType::named("a.Public")));
        assert!(!rules.is_root_type(&ProtoType::named("a.Secret")));
        assert!(!rules.is_root_type(&ProtoType::named("b.Other")));
        let internal = ProtoMember::parse("a.Public#internal").expect("member");
        assert!(rules.prunes_member(&internal));
        assert!(!rules.prunes_member(&ProtoMember::parse("a.Public#id").expect("member")));
        assert!(rules.unused_prunes().is_empty());

        let mut everything = PruningRules::default();
        assert!(everything.is_empty());
        assert!(everything.is_root_type(&ProtoType::named("x.Y")));
    }

    #[test]
    fn version_filters() {
        let field = |since: Option<&str>, until: Option<&str>| {
            let mut elements = Vec::new();
            if let Some(s) = since {
                elements.push(OptionElement::extension(SINCE_OPTION, OptionValue::string(s)));
            }
            if let Some(u) = until {
                elements.push(OptionElement::extension(UNTIL_OPTION, OptionValue::string(u)));
            }
            Options::new("google.protobuf.FieldOptions", elements)
        };

        let since = PruningRules::builder().since("5").build().expect("rules");
        assert!(since.is_field_retained(&field(None, None)));
        assert!(!since.is_field_retained(&field(None, Some("5"))));
        assert!(since.is_field_retained(&field(None, Some("6"))));

        let until = PruningRules::builder().until("5").build().expect("rules");
        assert!(until.is_field_retained(&field(Some("4"), None)));
        assert!(!until.is_field_retained(&field(Some("5"), None)));

        let only = PruningRules::builder().only("10").build().expect("rules");
        assert!(only.is_field_retained(&field(Some("9"), Some("11"))));
        assert!(only.is_field_retained(&field(Some("10"), None)));
        assert!(!only.is_field_retained(&field(None, Some("10"))));
        assert!(!only.is_field_retained(&field(Some("11"), None)));
    }

    #[test]
    fn versions_compare_numerically() {
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_versions("2", "2.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.2", "1.2.1"), Ordering::Less);
    }

    #[test]
    fn config_builds_rules() {
        let config: PruningRulesConfig =
            serde_json::from_str(r#"{ "roots": ["a.*"], "prunes": ["a.B"], "since": "3" }"#).expect("config");
        let rules = config.into_rules().expect("rules");
        assert_eq!(rules.since(), Some("3"));
        assert!(rules.roots().contains("a.*"));
    }
}
