//! Pruning: roots and prunes, member-level retention, version filters and
//! import minimization.

use protolink_schema::*;

fn shop() -> ProtoFileElement {
    ProtoFileElement::new("a.proto")
        .package("a")
        .message(
            MessageElement::new("A")
                .field(FieldElement::optional("B", "b", 1))
                .field(FieldElement::optional("int32", "x", 2)),
        )
        .message(MessageElement::new("B").field(FieldElement::optional("C", "c", 1)))
        .message(MessageElement::new("C").field(FieldElement::optional("string", "s", 1)))
        .message(MessageElement::new("Unrelated"))
        .message(
            MessageElement::new("Outer")
                .nested_message(MessageElement::new("Inner"))
                .field(FieldElement::optional("int32", "y", 1)),
        )
        .enum_type(EnumElement::new("E").constant("E_ZERO", 0).constant("E_ONE", 1))
        .service(
            ServiceElement::new("S")
                .rpc(RpcElement::new("Get", "A", "B"))
                .rpc(RpcElement::new("Other", "Unrelated", "Unrelated")),
        )
}

fn link(dependencies: Vec<ProtoFileElement>, sources: Vec<ProtoFileElement>) -> Schema {
    Linker::new(MemoryLoader::with_files(dependencies))
        .link(sources)
        .expect("link")
}

fn rules(roots: &[&str], prunes: &[&str]) -> PruningRules {
    PruningRules::builder()
        .add_roots(roots.iter().copied())
        .prunes(prunes.iter().copied())
        .build()
        .expect("rules")
}

fn field_names(schema: &Schema, message: &str) -> Vec<String> {
    schema
        .get_message(message)
        .map(|m| m.fields().iter().map(|f| f.name().to_string()).collect())
        .unwrap_or_default()
}

// ============================================================================
// Roots and prunes
// ============================================================================

#[test]
fn test_root_type_keeps_everything_it_reaches() {
    let schema = link(vec![], vec![shop()]);
    let pruned = schema.prune(&mut rules(&["a.A"], &[]));

    assert_eq!(field_names(&pruned, "a.A"), vec!["b", "x"]);
    assert!(pruned.get_message("a.B").is_some());
    assert!(pruned.get_message("a.C").is_some());
    assert!(pruned.get_message("a.Unrelated").is_none());
    assert!(pruned.get_enum("a.E").is_none());
    assert!(pruned.get_service_named("a.S").is_none());
}

#[test]
fn test_pruned_types_take_their_fields_with_them() {
    let schema = link(vec![], vec![shop()]);
    let pruned = schema.prune(&mut rules(&["a.A"], &["a.B"]));

    assert_eq!(field_names(&pruned, "a.A"), vec!["x"]);
    assert!(pruned.get_message("a.B").is_none());
    assert!(pruned.get_message("a.C").is_none());
}

#[test]
fn test_rooted_members_keep_their_types_even_when_pruned() {
    let schema = link(vec![], vec![shop()]);
    let pruned = schema.prune(&mut rules(&["a.A#b"], &["a.B"]));

    assert_eq!(field_names(&pruned, "a.A"), vec!["b"]);
    let b = pruned.get_message("a.B").expect("kept for a.A#b");
    assert!(b.fields().is_empty());
    assert!(pruned.get_message("a.C").is_none());
}

#[test]
fn test_pruned_members_are_dropped_from_rooted_types() {
    let schema = link(vec![], vec![shop()]);
    let pruned = schema.prune(&mut rules(&["a.A"], &["a.A#b", "a.E#E_ONE"]));

    assert_eq!(field_names(&pruned, "a.A"), vec!["x"]);
    assert!(pruned.get_message("a.B").is_none());
}

#[test]
fn test_enum_constants_can_be_pruned_individually() {
    let schema = link(vec![], vec![shop()]);
    let pruned = schema.prune(&mut rules(&["a.E"], &["a.E#E_ONE"]));

    let constants: Vec<&str> = pruned
        .get_enum("a.E")
        .expect("enum")
        .constants()
        .iter()
        .map(EnumConstant::name)
        .collect();
    assert_eq!(constants, vec!["E_ZERO"]);
}

#[test]
fn test_nested_roots_leave_an_enclosing_shell() {
    let schema = link(vec![], vec![shop()]);
    let pruned = schema.prune(&mut rules(&["a.Outer.Inner"], &[]));

    assert!(pruned.get_message("a.Outer.Inner").is_some());
    assert!(pruned.get_message("a.Outer").is_none());
    assert!(matches!(pruned.get_type_named("a.Outer"), Some(Type::Enclosing(_))));
}

#[test]
fn test_rooted_rpcs_keep_their_request_and_response() {
    let schema = link(vec![], vec![shop()]);
    let pruned = schema.prune(&mut rules(&["a.S#Get"], &[]));

    let service = pruned.get_service_named("a.S").expect("service");
    let rpcs: Vec<&str> = service.rpcs().iter().map(Rpc::name).collect();
    assert_eq!(rpcs, vec!["Get"]);
    assert!(pruned.get_message("a.A").is_some());
    assert!(pruned.get_message("a.B").is_some());
    assert!(pruned.get_message("a.Unrelated").is_none());
}

#[test]
fn test_empty_rules_change_nothing() {
    let schema = link(vec![], vec![shop()]);
    let pruned = schema.prune(&mut PruningRules::default());
    assert_eq!(pruned, schema);
}

#[test]
fn test_unused_rules_are_remembered() {
    let schema = link(vec![], vec![shop()]);
    let mut rules = rules(&["a.A", "a.Missing"], &["b.*"]);
    schema.prune(&mut rules);

    assert_eq!(rules.unused_roots(), vec!["a.Missing".to_string()]);
    assert_eq!(rules.unused_prunes(), vec!["b.*".to_string()]);
}

// ============================================================================
// Versions
// ============================================================================

fn wire_extensions() -> ProtoFileElement {
    ProtoFileElement::new("wire/extensions.proto")
        .package("wire")
        .import(descriptor::DESCRIPTOR_PROTO)
        .extend(
            ExtendElement::new("google.protobuf.FieldOptions")
                .field(FieldElement::optional("string", "since", 1076))
                .field(FieldElement::optional("string", "until", 1077)),
        )
}

fn versioned() -> ProtoFileElement {
    let since = |v: &str| OptionElement::extension("wire.since", OptionValue::string(v));
    let until = |v: &str| OptionElement::extension("wire.until", OptionValue::string(v));
    ProtoFileElement::new("v.proto")
        .package("v")
        .import("wire/extensions.proto")
        .message(
            MessageElement::new("Versioned")
                .field(FieldElement::optional("int32", "always", 1))
                .field(FieldElement::optional("int32", "old", 2).option(until("2.0")))
                .field(FieldElement::optional("int32", "new", 3).option(since("3.0"))),
        )
}

fn versioned_fields(rules: PruningRulesBuilder) -> Vec<String> {
    let schema = link(vec![wire_extensions()], vec![versioned()]);
    let pruned = schema.prune(&mut rules.build().expect("rules"));
    field_names(&pruned, "v.Versioned")
}

#[test]
fn test_version_filters_drop_fields_outside_the_range() {
    assert_eq!(versioned_fields(PruningRules::builder()), vec!["always", "old", "new"]);
    assert_eq!(versioned_fields(PruningRules::builder().since("2.0")), vec!["always", "new"]);
    assert_eq!(versioned_fields(PruningRules::builder().until("3.0")), vec!["always", "old"]);
    assert_eq!(versioned_fields(PruningRules::builder().until("3.1")), vec!["always", "old", "new"]);
    assert_eq!(versioned_fields(PruningRules::builder().only("2.5")), vec!["always"]);
    assert_eq!(versioned_fields(PruningRules::builder().only("1.0")), vec!["always", "old"]);
}

// ============================================================================
// Extensions and options
// ============================================================================

fn extended() -> Vec<ProtoFileElement> {
    vec![
        ProtoFileElement::new("a.proto")
            .package("a")
            .message(MessageElement::new("Target").extension_range(100, 200))
            .message(MessageElement::new("Holder").field(FieldElement::optional("Target", "target", 1))),
        ProtoFileElement::new("ext.proto")
            .package("ext")
            .import("a.proto")
            .extend(ExtendElement::new("a.Target").field(FieldElement::optional("int32", "extra", 100))),
    ]
}

#[test]
fn test_extensions_survive_only_when_reached() {
    let schema = link(vec![], extended());

    let reached = schema.prune(&mut rules(&["a.Holder"], &[]));
    let target = reached.get_message("a.Target").expect("target");
    assert!(target.extension_fields().is_empty());
    assert!(reached.proto_file("ext.proto").is_some_and(|f| f.extends().is_empty()));

    let rooted = schema.prune(&mut rules(&["a.Target"], &[]));
    let target = rooted.get_message("a.Target").expect("target");
    assert_eq!(target.extension_fields().len(), 1);
    assert_eq!(target.extension_fields()[0].qualified_name(), "ext.extra");
}

fn option_files() -> (ProtoFileElement, ProtoFileElement) {
    let options = ProtoFileElement::new("acme/options.proto")
        .package("acme")
        .import(descriptor::DESCRIPTOR_PROTO)
        .extend(
            ExtendElement::new("google.protobuf.FieldOptions")
                .field(FieldElement::optional("bool", "secret", 60_002)),
        );
    let user = ProtoFileElement::new("acme/user.proto")
        .package("acme")
        .import("acme/options.proto")
        .message(
            MessageElement::new("User")
                .field(
                    FieldElement::optional("string", "password", 1)
                        .option(OptionElement::extension("acme.secret", OptionValue::Boolean(true))),
                )
                .field(FieldElement::optional("string", "name", 2)),
        );
    (options, user)
}

#[test]
fn test_options_keep_their_extension_declarations() {
    let (options, user) = option_files();
    let schema = link(vec![options], vec![user]);

    let pruned = schema.prune(&mut rules(&["acme.User"], &[]));
    assert_eq!(pruned.proto_file("acme/options.proto").map(|f| f.extends().len()), Some(1));
    let password = pruned.get_message("acme.User").and_then(|m| m.field("password")).expect("password");
    assert_eq!(password.options().get_named("acme.secret"), Some(&LinkedValue::Bool(true)));

    let pruned = schema.prune(&mut rules(&["acme.User"], &["google.protobuf.FieldOptions#acme.secret"]));
    let password = pruned.get_message("acme.User").and_then(|m| m.field("password")).expect("password");
    assert_eq!(password.options().get_named("acme.secret"), None);
    assert!(pruned
        .proto_file("acme/options.proto")
        .map_or(true, |f| f.extends().is_empty()));
}

// ============================================================================
// Imports
// ============================================================================

fn importing() -> Vec<ProtoFileElement> {
    vec![
        ProtoFileElement::new("a.proto")
            .package("a")
            .import("b.proto")
            .import("c.proto")
            .message(MessageElement::new("A").field(FieldElement::optional("b.B", "b", 1)))
            .message(MessageElement::new("Keep")),
        ProtoFileElement::new("b.proto").package("b").message(MessageElement::new("B")),
        ProtoFileElement::new("c.proto").package("c").message(MessageElement::new("C")),
    ]
}

fn imports_of(schema: &Schema, path: &str) -> Vec<String> {
    schema
        .proto_file(path)
        .map(|f| f.imports().to_vec())
        .unwrap_or_default()
}

#[test]
fn test_imports_follow_what_survives() {
    let schema = link(vec![], importing());

    let with_a = schema.prune(&mut rules(&["a.A", "c.*"], &[]));
    assert_eq!(imports_of(&with_a, "a.proto"), vec!["b.proto", "c.proto"]);

    // c.proto was never used by a.proto; it stays while it has content.
    let without_a = schema.prune(&mut rules(&["a.Keep", "c.*"], &[]));
    assert_eq!(imports_of(&without_a, "a.proto"), vec!["c.proto"]);

    let only_keep = schema.prune(&mut rules(&["a.Keep"], &[]));
    assert!(imports_of(&only_keep, "a.proto").is_empty());
}
