//! Section extraction and cross-document merging.
//!
//! A section is one of the reserved top-level keys of a scenario document. A
//! section may name another document through its `values` key; the same-named
//! section of that document is resolved (recursively) and merged in. Merging
//! never overwrites: a key defined on both sides is an authoring error.

use std::path::{Path, PathBuf};

use runbook_types::{Mapping, Node, SectionName};
use tracing::debug;

use crate::{
    error::ScenarioError,
    loader::{DocumentLoader, normalize_path, resolve_values_path},
};

/// Reserved key naming a document whose same-named section is merged in.
pub const VALUES_KEY: &str = "values";

/// Resolves `section` out of `root`, following `values` pointers.
///
/// `origin` is the path `root` was loaded from; relative `values` file names
/// are resolved against its directory.
pub fn resolve_section(
    root: &Node,
    section: SectionName,
    origin: &Path,
    loader: &dyn DocumentLoader,
) -> Result<Mapping, ScenarioError> {
    let mut chain = vec![normalize_path(origin)];
    resolve_chained(root, section, origin, loader, &mut chain)
}

fn resolve_chained(
    root: &Node,
    section: SectionName,
    origin: &Path,
    loader: &dyn DocumentLoader,
    chain: &mut Vec<PathBuf>,
) -> Result<Mapping, ScenarioError> {
    let local = extract_section(root, section);

    let Some(pointer) = local.get(VALUES_KEY) else {
        return Ok(local);
    };
    let Some(file_name) = pointer.as_str() else {
        return Err(ScenarioError::InvalidValuesPointer {
            section,
            origin: origin.to_path_buf(),
        });
    };

    let values_path = resolve_values_path(origin, file_name);
    let identity = normalize_path(&values_path);
    if chain.contains(&identity) {
        return Err(ScenarioError::ValuesCycle { section, path: values_path });
    }
    debug!(%section, origin = %origin.display(), values = %values_path.display(), "merging referenced values document");

    let referenced_root = loader.load(&values_path);
    chain.push(identity);
    let referenced = resolve_chained(&referenced_root, section, &values_path, loader, chain)?;
    chain.pop();

    merge_sections(&local, &referenced, section, &values_path)
}

/// Pulls the named section out of a document root as a keyed map.
///
/// The first matching top-level key wins. A list-valued section is wrapped as
/// `{ "steps": <list> }` whatever its name; anything else yields an empty map.
pub fn extract_section(root: &Node, section: SectionName) -> Mapping {
    let Some(entries) = root.as_map() else {
        return Mapping::new();
    };
    let Some((_, value)) = entries.iter().find(|(key, _)| key.as_str() == section.as_str()) else {
        return Mapping::new();
    };

    match value {
        Node::Map(map) => map.clone(),
        Node::List(_) => {
            let mut wrapped = Mapping::new();
            wrapped.insert(SectionName::Steps.as_str().to_string(), value.clone());
            wrapped
        }
        Node::Scalar(_) => Mapping::new(),
    }
}

/// Merges a local section with a referenced one into a new map.
///
/// Entries keep their order: local entries first, then referenced ones. The
/// `values` key of either side is dropped. A key present on both sides is a
/// [`ScenarioError::DuplicateKey`].
pub fn merge_sections(local: &Mapping, referenced: &Mapping, section: SectionName, origin: &Path) -> Result<Mapping, ScenarioError> {
    let mut merged = Mapping::with_capacity(local.len() + referenced.len());

    for (key, value) in local.iter().filter(|(key, _)| key.as_str() != VALUES_KEY) {
        merged.insert(key.clone(), value.clone());
    }
    for (key, value) in referenced.iter().filter(|(key, _)| key.as_str() != VALUES_KEY) {
        if merged.contains_key(key) {
            return Err(ScenarioError::DuplicateKey {
                section,
                key: key.clone(),
                origin: origin.to_path_buf(),
            });
        }
        merged.insert(key.clone(), value.clone());
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, fs};

    use super::*;
    use crate::loader::{FsLoader, parse_document};

    /// In-memory loader keyed by path, for merge tests without touching disk.
    struct MapLoader(HashMap<PathBuf, &'static str>);

    impl DocumentLoader for MapLoader {
        fn load(&self, path: &Path) -> Node {
            self.0
                .get(path)
                .map(|content| parse_document(content).expect("fixture parses"))
                .unwrap_or_else(Node::empty_map)
        }
    }

    fn mapping(entries: &[(&str, &str)]) -> Mapping {
        entries.iter().map(|(key, value)| (key.to_string(), Node::from(*value))).collect()
    }

    #[test]
    fn merge_with_disjoint_keys_is_union() {
        let local = mapping(&[("region", "eu"), ("values", "prod.yaml")]);
        let referenced = mapping(&[("tier", "gold")]);

        let merged = merge_sections(&local, &referenced, SectionName::Settings, Path::new("prod.yaml")).expect("merge");
        let keys: Vec<_> = merged.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["region", "tier"]);
    }

    #[test]
    fn merge_with_overlapping_key_fails() {
        let local = mapping(&[("region", "eu")]);
        let referenced = mapping(&[("region", "us")]);

        let error = merge_sections(&local, &referenced, SectionName::Settings, Path::new("prod.yaml")).expect_err("duplicate");
        match error {
            ScenarioError::DuplicateKey { section, key, .. } => {
                assert_eq!(section, SectionName::Settings);
                assert_eq!(key, "region");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn merge_does_not_mutate_inputs() {
        let local = mapping(&[("a", "1"), ("values", "x.yaml")]);
        let referenced = mapping(&[("b", "2")]);
        let _ = merge_sections(&local, &referenced, SectionName::Secrets, Path::new("x.yaml")).expect("merge");
        assert_eq!(local.len(), 2);
        assert_eq!(referenced.len(), 1);
    }

    #[test]
    fn list_section_is_wrapped_under_steps() {
        let root = parse_document("steps:\n  - action: restart\n").expect("parse");
        let section = extract_section(&root, SectionName::Steps);
        assert_eq!(section.len(), 1);
        assert!(matches!(section.get("steps"), Some(Node::List(items)) if items.len() == 1));
    }

    #[test]
    fn list_shaped_settings_are_wrapped_under_steps() {
        let root = parse_document("settings:\n  - a\n").expect("parse");
        let section = extract_section(&root, SectionName::Settings);
        let keys: Vec<_> = section.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["steps"]);
    }

    #[test]
    fn section_names_are_case_sensitive() {
        let root = parse_document("Settings:\n  region: eu\n").expect("parse");
        assert!(extract_section(&root, SectionName::Settings).is_empty());
    }

    #[test]
    fn missing_section_is_empty() {
        let root = parse_document("settings:\n  region: eu\n").expect("parse");
        let resolved = resolve_section(&root, SectionName::Secrets, Path::new("main.yaml"), &FsLoader).expect("resolve");
        assert!(resolved.is_empty());
    }

    #[test]
    fn values_pointer_merges_transitively() {
        let loader = MapLoader(HashMap::from([
            (PathBuf::from("/cfg/env.yaml"), "settings:\n  region: eu\n  values: shared.yaml\n"),
            (PathBuf::from("/cfg/shared.yaml"), "settings:\n  tier: gold\n"),
        ]));
        let root = parse_document("settings:\n  app: billing\n  values: env.yaml\n").expect("parse");

        let resolved = resolve_section(&root, SectionName::Settings, Path::new("/cfg/main.yaml"), &loader).expect("resolve");
        let keys: Vec<_> = resolved.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["app", "region", "tier"]);
    }

    #[test]
    fn values_only_merge_the_same_section() {
        let loader = MapLoader(HashMap::from([(
            PathBuf::from("/cfg/env.yaml"),
            "settings:\n  region: eu\nsecrets:\n  token: abc\n",
        )]));
        let root = parse_document("secrets:\n  values: env.yaml\n").expect("parse");

        let resolved = resolve_section(&root, SectionName::Secrets, Path::new("/cfg/main.yaml"), &loader).expect("resolve");
        assert_eq!(resolved, mapping(&[("token", "abc")]));
    }

    #[test]
    fn missing_values_file_contributes_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let main = temp_dir.path().join("main.yaml");
        fs::write(&main, "settings:\n  region: eu\n  values: absent.yaml\n").unwrap();

        let root = FsLoader.load(&main);
        let resolved = resolve_section(&root, SectionName::Settings, &main, &FsLoader).expect("resolve");
        assert_eq!(resolved, mapping(&[("region", "eu")]));
    }

    #[test]
    fn values_cycle_is_reported() {
        let loader = MapLoader(HashMap::from([
            (PathBuf::from("/cfg/a.yaml"), "settings:\n  a: 1\n  values: b.yaml\n"),
            (PathBuf::from("/cfg/b.yaml"), "settings:\n  b: 2\n  values: a.yaml\n"),
        ]));
        let root = loader.load(Path::new("/cfg/a.yaml"));

        let error = resolve_section(&root, SectionName::Settings, Path::new("/cfg/a.yaml"), &loader).expect_err("cycle");
        assert!(matches!(error, ScenarioError::ValuesCycle { .. }), "unexpected error: {error}");
    }

    #[test]
    fn values_cycle_through_parent_directories_is_reported() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cfg = temp_dir.path().join("cfg");
        fs::create_dir(&cfg).unwrap();
        fs::write(cfg.join("a.yaml"), "settings:\n  a: 1\n  values: ../cfg/b.yaml\n").unwrap();
        fs::write(cfg.join("b.yaml"), "settings:\n  b: 2\n  values: ../cfg/a.yaml\n").unwrap();

        let origin = cfg.join("a.yaml");
        let root = FsLoader.load(&origin);
        let error = resolve_section(&root, SectionName::Settings, &origin, &FsLoader).expect_err("cycle");
        assert!(matches!(error, ScenarioError::ValuesCycle { .. }), "unexpected error: {error}");
    }

    #[test]
    fn non_string_values_pointer_is_rejected() {
        let root = parse_document("settings:\n  values: [a.yaml]\n").expect("parse");
        let error = resolve_section(&root, SectionName::Settings, Path::new("main.yaml"), &FsLoader).expect_err("invalid pointer");
        assert!(matches!(error, ScenarioError::InvalidValuesPointer { .. }));
    }

    #[test]
    fn steps_in_both_documents_collide() {
        let loader = MapLoader(HashMap::from([(
            PathBuf::from("/cfg/more.yaml"),
            "steps:\n  - action: restart\n",
        )]));
        let root = parse_document("steps:\n  values: more.yaml\n  steps:\n    - action: restart\n").expect("parse");

        let error = resolve_section(&root, SectionName::Steps, Path::new("/cfg/main.yaml"), &loader).expect_err("duplicate");
        assert!(matches!(error, ScenarioError::DuplicateKey { ref key, .. } if key == "steps"));
    }
}
