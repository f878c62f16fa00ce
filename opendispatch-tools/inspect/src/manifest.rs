//! Hierarchy manifests.
//!
//! A manifest names classes, methods and overriders in TOML, with no code
//! behind them:
//!
//! ```toml
//! [registry]
//! hash = "minimal_perfect"
//!
//! [[class]]
//! name = "Animal"
//! abstract = true
//!
//! [[class]]
//! name = "Dog"
//! bases = ["Animal"]
//!
//! [[method]]
//! name = "encounter"
//! params = ["Animal", "Animal"]
//!
//! [[method.overrider]]
//! params = ["Dog", "Animal"]
//! ```
//!
//! Class identifiers are derived from the names with
//! [`TypeId::from_name`], so a manifest resolves the same way every run.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use opendispatch::compiler::MethodDecl;
use opendispatch::{ClassDecl, RegistryConfig, TypeId};
use serde::Deserialize;
use thiserror::Error;

/// Errors reading or checking a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{context} names unknown class `{class}`")]
    UnknownClass { context: String, class: String },

    #[error("overrider `{overrider}` of `{method}` has {found} parameters, expected {expected}")]
    Arity {
        method: String,
        overrider: String,
        expected: usize,
        found: usize,
    },

    #[error("method `{0}` has no virtual parameters")]
    NoParams(String),
}

/// A parsed manifest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Registry settings, the same table a host program would load.
    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default, rename = "class")]
    pub classes: Vec<ClassEntry>,

    #[serde(default, rename = "method")]
    pub methods: Vec<MethodEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassEntry {
    pub name: String,

    #[serde(default)]
    pub bases: Vec<String>,

    /// Extra names for the same class.
    #[serde(default)]
    pub aliases: Vec<String>,

    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodEntry {
    pub name: String,

    /// Declared class of each virtual parameter.
    pub params: Vec<String>,

    #[serde(default, rename = "overrider")]
    pub overriders: Vec<OverriderEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverriderEntry {
    /// Defaults to `method(Class, ...)`.
    #[serde(default)]
    pub name: Option<String>,

    pub params: Vec<String>,
}

impl Manifest {
    pub fn from_toml_str(source: &str) -> Result<Self, ManifestError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Resolve names to identifiers and check every reference.
    pub fn declarations(&self) -> Result<(Vec<ClassDecl>, Vec<MethodDecl>), ManifestError> {
        let mut known: IndexMap<&str, TypeId> = IndexMap::new();
        for class in &self.classes {
            let id = TypeId::from_name(&class.name);
            known.insert(&class.name, id);
            for alias in &class.aliases {
                known.insert(alias, id);
            }
        }

        let lookup = |context: &dyn Fn() -> String, name: &str| {
            known
                .get(name)
                .copied()
                .ok_or_else(|| ManifestError::UnknownClass {
                    context: context(),
                    class: name.to_string(),
                })
        };

        let mut classes = Vec::with_capacity(self.classes.len());
        for class in &self.classes {
            let mut decl = ClassDecl::new(TypeId::from_name(&class.name), class.name.clone());
            for alias in &class.aliases {
                decl = decl.with_alias(TypeId::from_name(alias));
            }
            for base in &class.bases {
                decl = decl.with_base(lookup(&|| format!("class `{}`", class.name), base)?);
            }
            if class.is_abstract {
                decl = decl.make_abstract();
            }
            classes.push(decl);
        }

        let mut methods = Vec::with_capacity(self.methods.len());
        for method in &self.methods {
            if method.params.is_empty() {
                return Err(ManifestError::NoParams(method.name.clone()));
            }
            let params = method
                .params
                .iter()
                .map(|p| lookup(&|| format!("method `{}`", method.name), p))
                .collect::<Result<Vec<_>, _>>()?;
            let mut decl = MethodDecl::new(method.name.clone(), params);

            for overrider in &method.overriders {
                let name = overrider
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("{}({})", method.name, overrider.params.join(", ")));
                if overrider.params.len() != method.params.len() {
                    return Err(ManifestError::Arity {
                        method: method.name.clone(),
                        overrider: name,
                        expected: method.params.len(),
                        found: overrider.params.len(),
                    });
                }
                let params = overrider
                    .params
                    .iter()
                    .map(|p| lookup(&|| format!("overrider `{name}`"), p))
                    .collect::<Result<Vec<_>, _>>()?;
                decl = decl.with_overrider(name, params);
            }
            methods.push(decl);
        }

        Ok((classes, methods))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opendispatch::{HashStrategy, LookupStrategy};

    const ANIMALS: &str = r#"
[registry]
lookup = "map"

[[class]]
name = "Animal"
abstract = true

[[class]]
name = "Dog"
bases = ["Animal"]
aliases = ["Hound"]

[[method]]
name = "meet"
params = ["Animal", "Animal"]

[[method.overrider]]
params = ["Animal", "Animal"]

[[method.overrider]]
name = "chase"
params = ["Hound", "Animal"]
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::from_toml_str(ANIMALS).unwrap();
        assert_eq!(manifest.registry.lookup, LookupStrategy::Map);
        assert_eq!(manifest.registry.hash, HashStrategy::FastPerfect);
        assert_eq!(manifest.classes.len(), 2);
        assert!(manifest.classes[0].is_abstract);
        assert_eq!(manifest.methods[0].overriders.len(), 2);
    }

    #[test]
    fn test_declarations_resolve_aliases() {
        let (classes, methods) = Manifest::from_toml_str(ANIMALS).unwrap().declarations().unwrap();
        let dog = TypeId::from_name("Dog");
        let animal = TypeId::from_name("Animal");
        assert_eq!(classes[1].ids, vec![dog, TypeId::from_name("Hound")]);
        assert_eq!(classes[1].bases, vec![animal]);

        let meet = &methods[0];
        assert_eq!(meet.overriders[0].name, "meet(Animal, Animal)");
        assert_eq!(meet.overriders[1].name, "chase");
        assert_eq!(meet.overriders[1].params, vec![TypeId::from_name("Hound"), animal]);
    }

    #[test]
    fn test_unknown_class() {
        let manifest = Manifest::from_toml_str(
            r#"
[[class]]
name = "Cat"
bases = ["Feline"]
"#,
        )
        .unwrap();
        let err = manifest.declarations().unwrap_err();
        assert_eq!(err.to_string(), "class `Cat` names unknown class `Feline`");
    }

    #[test]
    fn test_overrider_arity() {
        let manifest = Manifest::from_toml_str(
            r#"
[[class]]
name = "A"

[[method]]
name = "f"
params = ["A", "A"]

[[method.overrider]]
params = ["A"]
"#,
        )
        .unwrap();
        assert!(matches!(
            manifest.declarations(),
            Err(ManifestError::Arity { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn test_method_without_params() {
        let manifest = Manifest::from_toml_str("[[method]]\nname = \"f\"\nparams = []\n").unwrap();
        assert!(matches!(manifest.declarations(), Err(ManifestError::NoParams(name)) if name == "f"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            Manifest::from_toml_str("[[class]]\nname = \"A\"\nparent = \"B\"\n"),
            Err(ManifestError::Parse(_))
        ));
    }
}
