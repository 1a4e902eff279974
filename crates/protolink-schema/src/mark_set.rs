//! Reachability marks for pruning.
//!
//! A type is contained if it was marked itself or any of its members were;
//! that way a message can survive as a shell holding only the fields that
//! something actually reached. Pruning rules are consulted on every mark so
//! a pruned identifier can never be marked by accident.
//!
//! Notes:
//! - Members named explicitly as roots win over prunes of their owning type.
//!   Their directly referenced types are force-marked by the pruner so the
//!   member stays well-typed.

use std::collections::{HashMap, HashSet};

use crate::proto_type::{ProtoMember, ProtoType};
use crate::rules::PruningRules;

pub struct MarkSet<'r> {
    rules: &'r mut PruningRules,
    types: HashSet<ProtoType>,
    members: HashMap<ProtoType, HashSet<ProtoMember>>,
    root_members: HashSet<ProtoMember>,
}

impl<'r> MarkSet<'r> {
    pub fn new(rules: &'r mut PruningRules) -> Self {
        Self {
            rules,
            types: HashSet::new(),
            members: HashMap::new(),
            root_members: HashSet::new(),
        }
    }

    pub fn rules(&self) -> &PruningRules {
        &*self.rules
    }

    pub fn rules_mut(&mut self) -> &mut PruningRules {
        &mut *self.rules
    }

    /// Records `member` as an explicit root and marks it. Returns true if it
    /// was not marked before.
    pub fn root(&mut self, member: &ProtoMember) -> bool {
        self.root_members.insert(member.clone());
        self.members
            .entry(member.ty().clone())
            .or_default()
            .insert(member.clone())
    }

    pub fn is_root_member(&self, member: &ProtoMember) -> bool {
        self.root_members.contains(member)
    }

    /// Marks a declared type. Scalars, maps and pruned types are refused.
    pub fn mark_type(&mut self, ty: &ProtoType) -> bool {
        if !ty.is_named() || self.rules.prunes_type(ty) {
            return false;
        }
        self.types.insert(ty.clone())
    }

    /// Marks a declared type even if it is pruned.
    pub fn force_mark_type(&mut self, ty: &ProtoType) -> bool {
        ty.is_named() && self.types.insert(ty.clone())
    }

    pub fn mark_member(&mut self, member: &ProtoMember) -> bool {
        if self.rules.prunes_member(member) && !self.root_members.contains(member) {
            return false;
        }
        self.members
            .entry(member.ty().clone())
            .or_default()
            .insert(member.clone())
    }

    pub fn contains_type(&mut self, ty: &ProtoType) -> bool {
        match ty {
            ProtoType::Scalar(_) => true,
            ProtoType::Map { value, .. } => self.contains_type(value),
            ProtoType::Named(_) => {
                self.types.contains(ty) || self.members.get(ty).is_some_and(|m| !m.is_empty())
            }
        }
    }

    pub fn contains_member(&mut self, member: &ProtoMember) -> bool {
        if self.root_members.contains(member) {
            return true;
        }
        if self.rules.prunes_type(member.ty()) {
            return false;
        }
        self.members
            .get(member.ty())
            .is_some_and(|members| members.contains(member))
    }

    /// True if a field or rpc `member` may keep pointing at `ty`: the type
    /// must survive, and pruned types are only tolerated behind root members.
    pub fn retains_reference(&mut self, member: &ProtoMember, ty: &ProtoType) -> bool {
        if !self.contains_type(ty) {
            return false;
        }
        let target = match ty {
            ProtoType::Map { value, .. } => value.as_ref(),
            other => other,
        };
        if !target.is_named() || self.root_members.contains(member) {
            return true;
        }
        !self.rules.prunes_type(target)
    }

    pub fn marked_type_count(&self) -> usize {
        self.types.len()
    }

    pub fn marked_member_count(&self) -> usize {
        self.members.values().map(HashSet::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(text: &str) -> ProtoMember {
        ProtoMember::parse(text).expect("member")
    }

    #[test]
    fn types_are_contained_through_their_members() {
        let mut rules = PruningRules::default();
        let mut marks = MarkSet::new(&mut rules);
        let ty = ProtoType::named("a.Shell");
        assert!(!marks.contains_type(&ty));
        assert!(marks.mark_member(&member("a.Shell#kept")));
        assert!(!marks.mark_member(&member("a.Shell#kept")));
        assert!(marks.contains_type(&ty));
        assert!(marks.contains_member(&member("a.Shell#kept")));
        assert!(!marks.contains_member(&member("a.Shell#other")));
        assert!(marks.contains_type(&ProtoType::INT32));
    }

    #[test]
    fn pruned_identifiers_fail_closed() {
        let mut rules = PruningRules::builder()
            .prune("a.Gone")
            .prune("a.Kept#secret")
            .build()
            .expect("rules");
        let mut marks = MarkSet::new(&mut rules);
        assert!(!marks.mark_type(&ProtoType::named("a.Gone")));
        assert!(!marks.mark_member(&member("a.Gone#field")));
        assert!(!marks.mark_member(&member("a.Kept#secret")));
        assert!(marks.mark_type(&ProtoType::named("a.Kept")));

        assert!(marks.force_mark_type(&ProtoType::named("a.Gone")));
        assert!(marks.contains_type(&ProtoType::named("a.Gone")));
        assert!(!marks.retains_reference(&member("a.Kept#gone"), &ProtoType::named("a.Gone")));
    }

    #[test]
    fn root_members_override_type_prunes() {
        let mut rules = PruningRules::builder().prune("a.Hidden").build().expect("rules");
        let mut marks = MarkSet::new(&mut rules);
        let root = member("a.Hidden#exposed");
        assert!(marks.root(&root));
        assert!(marks.is_root_member(&root));
        assert!(marks.contains_member(&root));
        assert!(!marks.contains_member(&member("a.Hidden#other")));
        assert!(marks.force_mark_type(&ProtoType::named("a.Pruned")));
        assert!(marks.retains_reference(&root, &ProtoType::named("a.Pruned")));
        assert_eq!(marks.marked_member_count(), 1);
    }
}
