//! Import and package cycle detection.
//!
//! Import cycles are always errors. Package cycles (package `a` imports
//! package `b` which imports `a`, across different files) are errors unless
//! the linker is configured to permit them. Each reported cycle lists the
//! import statements that form it so the user can see which edge to cut.

use std::collections::{BTreeMap, BTreeSet};

use crate::graph::{DagChecker, DirectedAcyclicGraph};
use crate::model::ProtoFile;

const DEFAULT_PACKAGE: &str = "<default>";

/// The parts of a file cycle detection needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileImports {
    pub path: String,
    pub package: String,
    pub imports: Vec<String>,
    pub public_imports: Vec<String>,
}

impl FileImports {
    pub fn of(file: &ProtoFile) -> FileImports {
        FileImports {
            path: file.path().to_string(),
            package: cycle_package_name(file),
            imports: file.imports().to_vec(),
            public_imports: file.public_imports().to_vec(),
        }
    }

    fn direct_imports(&self) -> impl Iterator<Item = &String> {
        self.imports.iter().chain(&self.public_imports)
    }
}

/// `go_package` if set, else the declared package, else `<default>`.
pub fn cycle_package_name(file: &ProtoFile) -> String {
    file.go_package()
        .or(file.package_name())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_PACKAGE.to_string())
}

pub struct CycleChecker {
    files: BTreeMap<String, FileImports>,
}

impl CycleChecker {
    pub fn new(files: impl IntoIterator<Item = FileImports>) -> Self {
        Self {
            files: files.into_iter().map(|f| (f.path.clone(), f)).collect(),
        }
    }

    /// One message per import cycle.
    pub fn check_import_cycles(&self) -> Vec<String> {
        let checker = DagChecker::new(self.files.keys().cloned(), |path: &String| {
            self.files
                .get(path)
                .map(|f| {
                    f.direct_imports()
                        .filter(|i| self.files.contains_key(*i))
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        });

        let mut cycles: Vec<BTreeSet<String>> = checker
            .check()
            .into_iter()
            .map(|cycle| cycle.into_iter().collect())
            .collect();
        cycles.sort();

        cycles
            .iter()
            .map(|cycle| {
                let mut message = String::from("imports form a cycle:");
                for path in cycle {
                    message.push_str(&format!("\n  {path}:"));
                    if let Some(file) = self.files.get(path) {
                        for import in file.direct_imports().filter(|i| cycle.contains(*i)) {
                            message.push_str(&format!("\n    import \"{import}\";"));
                        }
                    }
                }
                message
            })
            .collect()
    }

    /// One message per package cycle.
    pub fn check_package_cycles(&self) -> Vec<String> {
        let public_graph = DirectedAcyclicGraph::new(self.files.keys().cloned(), |path: &String| {
            self.files
                .get(path)
                .map(|f| {
                    f.public_imports
                        .iter()
                        .filter(|i| self.files.contains_key(*i))
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        });

        // package -> imported package -> file -> import statements
        let mut edges: BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeSet<String>>>> = BTreeMap::new();
        for (path, file) in &self.files {
            let from = edges.entry(file.package.clone()).or_default();
            for import in file.direct_imports().filter(|i| self.files.contains_key(*i)) {
                let mut reached: BTreeSet<String> = public_graph.transitive_nodes(import).into_iter().collect();
                reached.insert(import.clone());
                for target in reached {
                    let Some(target_file) = self.files.get(&target) else {
                        continue;
                    };
                    if target_file.package == file.package {
                        continue;
                    }
                    from.entry(target_file.package.clone())
                        .or_default()
                        .entry(path.clone())
                        .or_default()
                        .insert(import.clone());
                }
            }
        }

        let checker = DagChecker::new(edges.keys().cloned(), |package: &String| {
            edges
                .get(package)
                .map(|targets| targets.keys().cloned().collect::<Vec<_>>())
                .unwrap_or_default()
        });

        let mut cycles: Vec<BTreeSet<String>> = checker
            .check()
            .into_iter()
            .map(|cycle| cycle.into_iter().collect())
            .collect();
        cycles.sort();

        cycles
            .iter()
            .map(|cycle| {
                let mut message = String::from("packages form a cycle:");
                for package in cycle {
                    let Some(targets) = edges.get(package) else {
                        continue;
                    };
                    for (target, files) in targets.iter().filter(|(t, _)| cycle.contains(*t)) {
                        message.push_str(&format!("\n  {package} imports {target}"));
                        for (path, imports) in files {
                            message.push_str(&format!("\n    {path}:"));
                            for import in imports {
                                message.push_str(&format!("\n      import \"{import}\";"));
                            }
                        }
                    }
                }
                message
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, package: &str, imports: &[&str], public_imports: &[&str]) -> FileImports {
        FileImports {
            path: path.to_string(),
            package: package.to_string(),
            imports: imports.iter().map(|s| s.to_string()).collect(),
            public_imports: public_imports.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn reports_import_cycles_with_their_statements() {
        let checker = CycleChecker::new(vec![
            file("a.proto", "a", &["b.proto"], &[]),
            file("b.proto", "b", &["c.proto", "x.proto"], &[]),
            file("c.proto", "c", &["a.proto"], &[]),
            file("x.proto", "x", &[], &[]),
        ]);
        assert_eq!(
            checker.check_import_cycles(),
            vec![concat!(
                "imports form a cycle:\n",
                "  a.proto:\n",
                "    import \"b.proto\";\n",
                "  b.proto:\n",
                "    import \"c.proto\";\n",
                "  c.proto:\n",
                "    import \"a.proto\";"
            )
            .to_string()]
        );
    }

    #[test]
    fn self_import_is_a_cycle() {
        let checker = CycleChecker::new(vec![file("a.proto", "a", &["a.proto"], &[])]);
        assert_eq!(checker.check_import_cycles().len(), 1);
    }

    #[test]
    fn reports_package_cycles_without_import_cycles() {
        let checker = CycleChecker::new(vec![
            file("a/one.proto", "a", &["b/one.proto"], &[]),
            file("a/two.proto", "a", &[], &[]),
            file("b/one.proto", "b", &["a/two.proto"], &[]),
        ]);
        assert!(checker.check_import_cycles().is_empty());
        assert_eq!(
            checker.check_package_cycles(),
            vec![concat!(
                "packages form a cycle:\n",
                "  a imports b\n",
                "    a/one.proto:\n",
                "      import \"b/one.proto\";\n",
                "  b imports a\n",
                "    b/one.proto:\n",
                "      import \"a/two.proto\";"
            )
            .to_string()]
        );
    }

    #[test]
    fn public_imports_extend_package_edges() {
        // a imports b/re.proto, which publicly re-exports c/leaf.proto; c imports a.
        let checker = CycleChecker::new(vec![
            file("a/a.proto", "a", &["b/re.proto"], &[]),
            file("b/re.proto", "b", &[], &["c/leaf.proto"]),
            file("c/leaf.proto", "c", &[], &[]),
            file("c/back.proto", "c", &["a/a.proto"], &[]),
        ]);
        let cycles = checker.check_package_cycles();
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].contains("a imports c"));
        assert!(cycles[0].contains("c imports a"));
    }
}
