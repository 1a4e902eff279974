use std::collections::HashSet;

use proptest::prelude::*;
use protolink_schema::*;

const MAX_NODES: usize = 12;
const MAX_MESSAGES: usize = 8;
const MAX_FIELDS: usize = 4;

// ============================================================================
// Graphs
// ============================================================================

fn graph_strategy() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (1usize..=MAX_NODES).prop_flat_map(|n| (Just(n), prop::collection::vec((0..n, 0..n), 0..n * 2)))
}

fn edges_from(edges: &[(usize, usize)]) -> impl Fn(&usize) -> Vec<usize> + '_ {
    move |node| edges.iter().filter(|(from, _)| from == node).map(|(_, to)| *to).collect()
}

// ============================================================================
// Schemas
// ============================================================================

/// Messages `M0..Mn`, each with fields pointing at arbitrary messages
/// (self references and cycles included), plus a subset of them as roots.
fn schema_strategy() -> impl Strategy<Value = (Vec<Vec<usize>>, Vec<usize>)> {
    (1usize..=MAX_MESSAGES).prop_flat_map(|n| {
        (
            prop::collection::vec(prop::collection::vec(0..n, 0..=MAX_FIELDS), n),
            prop::collection::vec(0..n, 0..=n),
        )
    })
}

fn build_schema(references: &[Vec<usize>]) -> Schema {
    let mut file = ProtoFileElement::new("p.proto").package("p");
    for (i, targets) in references.iter().enumerate() {
        let mut message = MessageElement::new(format!("M{i}"));
        for (f, target) in targets.iter().enumerate() {
            message = message.field(FieldElement::optional(format!("M{target}"), format!("f{f}"), f as i32 + 1));
        }
        file = file.message(message);
    }
    Linker::new(MemoryLoader::new())
        .link(vec![file])
        .expect("generated schema links")
}

fn root_rules(roots: &[usize]) -> PruningRules {
    PruningRules::builder()
        .add_roots(roots.iter().map(|r| format!("p.M{r}")))
        .build()
        .expect("roots only")
}

fn type_names(schema: &Schema) -> HashSet<String> {
    schema.types().into_iter().map(|t| t.ty().to_string()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn topological_order_exists_exactly_when_there_are_no_cycles((n, edges) in graph_strategy()) {
        let checker = DagChecker::new(0..n, edges_from(&edges));
        let graph = DirectedAcyclicGraph::new(0..n, edges_from(&edges));
        prop_assert_eq!(checker.check().is_empty(), graph.topological_order().is_ok());
    }

    #[test]
    fn topological_order_puts_targets_first((n, edges) in graph_strategy()) {
        // Only edges to lower nodes, so the graph is acyclic.
        let forward: Vec<(usize, usize)> = edges.into_iter().filter(|(from, to)| to < from).collect();
        let graph = DirectedAcyclicGraph::new(0..n, edges_from(&forward));
        let order = graph.topological_order().expect("acyclic");
        prop_assert_eq!(order.len(), n);
        let position = |node: usize| order.iter().position(|&o| o == node).expect("every node is ordered");
        for (from, to) in &forward {
            prop_assert!(position(*to) < position(*from));
        }
    }

    #[test]
    fn cycles_only_contain_mutually_reachable_nodes((n, edges) in graph_strategy()) {
        let checker = DagChecker::new(0..n, edges_from(&edges));
        let graph = DirectedAcyclicGraph::new(0..n, edges_from(&edges));
        for cycle in checker.check() {
            for a in &cycle {
                let reachable = graph.transitive_nodes(a);
                for b in &cycle {
                    prop_assert!(a == b || reachable.contains(b));
                }
            }
        }
    }

    #[test]
    fn rules_cover_members_and_nested_wildcards(
        package in "[a-z]{1,6}",
        outer in "[A-Z][a-z]{0,6}",
        inner in "[A-Z][a-z]{0,6}",
        member in "[a-z]{1,6}",
    ) {
        let root = format!("{package}.{outer}");
        let nested = format!("{root}.{inner}");
        let nested_member = format!("{nested}#{member}");
        let root_member = format!("{root}#{member}");
        let sibling_package = format!("{package}x.{outer}");

        let mut rules = PruningRules::builder()
            .add_root(root.clone())
            .build()
            .expect("rules");
        prop_assert!(rules.is_root(&root_member), "{} should be covered by {}", root_member, root);
        // Nested types walk to `Outer.*`, never to `Outer` itself.
        prop_assert!(!rules.is_root(&nested), "{} should not be covered by {}", nested, root);
        prop_assert!(!rules.is_root(&sibling_package), "{} should not be covered by {}", sibling_package, root);

        let mut nested_roots = PruningRules::builder()
            .add_root(format!("{root}.*"))
            .build()
            .expect("rules");
        prop_assert!(nested_roots.is_root(&nested_member), "{} should be a root", nested_member);
        prop_assert!(!nested_roots.is_root(&root), "{} should not be a root", root);

        let mut wildcard = PruningRules::builder()
            .prune(format!("{package}.*"))
            .build()
            .expect("rules");
        prop_assert!(wildcard.prunes_identifier(&nested_member), "{} should be pruned", nested_member);
    }

    #[test]
    fn pruning_only_removes((references, roots) in schema_strategy()) {
        let schema = build_schema(&references);
        let pruned = schema.prune(&mut root_rules(&roots));

        let before = type_names(&schema);
        let after = type_names(&pruned);
        prop_assert!(after.is_subset(&before));
        for root in &roots {
            let name = format!("p.M{root}");
            prop_assert!(after.contains(&name), "root {} was pruned", name);
        }
    }

    #[test]
    fn more_roots_retain_more(
        (references, roots) in schema_strategy(),
        extra in prop::collection::vec(0usize..MAX_MESSAGES, 0..4),
    ) {
        // Empty roots retain everything, so start from at least one.
        let fewer: Vec<usize> = if roots.is_empty() { vec![0] } else { roots };
        let mut more = fewer.clone();
        more.extend(extra.into_iter().filter(|r| *r < references.len()));

        let schema = build_schema(&references);
        let small = type_names(&schema.prune(&mut root_rules(&fewer)));
        let large = type_names(&schema.prune(&mut root_rules(&more)));
        prop_assert!(small.is_subset(&large));
    }

    #[test]
    fn pruned_schemas_are_closed_and_stable((references, roots) in schema_strategy()) {
        let schema = build_schema(&references);
        let pruned = schema.prune(&mut root_rules(&roots));

        let after = type_names(&pruned);
        for ty in pruned.types() {
            let Some(message) = ty.as_message() else { continue };
            for field in message.fields() {
                let target = field.ty().expect("linked").to_string();
                prop_assert!(after.contains(&target), "{} references pruned {}", message.ty(), target);
            }
        }

        let again = pruned.prune(&mut root_rules(&roots));
        prop_assert_eq!(type_names(&again), after);
    }
}
