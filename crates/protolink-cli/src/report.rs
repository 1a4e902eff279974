//! Terminal output for link and prune runs.

use colored::Colorize;
use protolink_schema::{ProtoFile, PruningRules, Schema, SchemaError};

/// One line per file, dependencies before the files that import them.
pub fn summary_lines(schema: &Schema) -> Vec<String> {
    let files: Vec<&ProtoFile> = match schema.dependency_order() {
        Ok(files) => files,
        // Cycles were already reported by linking; fall back to path order.
        Err(_) => schema.files().iter().collect(),
    };
    files
        .into_iter()
        .map(|file| {
            format!(
                "{} ({} types, {} services, {} extends)",
                file.path(),
                file.all_types().len(),
                file.services().len(),
                file.extends().len()
            )
        })
        .collect()
}

pub fn print_summary(verb: &str, schema: &Schema) {
    println!("{} {} files", verb.green().bold(), schema.files().len());
    for line in summary_lines(schema) {
        println!("  {line}");
    }
}

pub fn print_errors(err: &SchemaError) {
    for message in &err.errors {
        eprintln!("{} {}", "error:".red().bold(), message);
        eprintln!();
    }
}

pub fn unused_rule_lines(rules: &PruningRules) -> Vec<String> {
    let roots = rules.unused_roots().into_iter().map(|r| format!("unused root {r}"));
    let prunes = rules.unused_prunes().into_iter().map(|r| format!("unused prune {r}"));
    roots.chain(prunes).collect()
}

pub fn print_unused_rules(rules: &PruningRules) {
    for line in unused_rule_lines(rules) {
        eprintln!("{} {}", "warning:".yellow().bold(), line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protolink_schema::{FieldElement, Linker, MemoryLoader, MessageElement, ProtoFileElement};

    fn schema() -> Schema {
        let b = ProtoFileElement::new("b.proto").package("b").message(MessageElement::new("B"));
        let a = ProtoFileElement::new("a.proto")
            .package("a")
            .import("b.proto")
            .message(MessageElement::new("A").field(FieldElement::optional("b.B", "b", 1)));
        Linker::new(MemoryLoader::with_files([b])).link(vec![a]).expect("link")
    }

    #[test]
    fn summary_lists_dependencies_first() {
        let lines = summary_lines(&schema());
        let position = |prefix: &str| lines.iter().position(|l| l.starts_with(prefix)).expect(prefix);
        assert!(position("b.proto") < position("a.proto"));
        assert!(lines.contains(&"a.proto (1 types, 0 services, 0 extends)".to_string()));
    }

    #[test]
    fn unused_rules_are_listed() {
        let schema = schema();
        let mut rules = PruningRules::builder()
            .add_root("a.A")
            .add_root("a.Gone")
            .prune("z.*")
            .build()
            .expect("rules");
        schema.prune(&mut rules);
        assert_eq!(unused_rule_lines(&rules), vec!["unused root a.Gone", "unused prune z.*"]);
    }
}
