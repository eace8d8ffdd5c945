use std::collections::HashMap;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;

use crate::config::ClassifyConfig;
use crate::types::{FileRole, Language};

fn build_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!("ignoring invalid glob '{pattern}': {e}"),
        }
    }
    builder.build().unwrap_or_else(|e| {
        warn!("failed to build glob set: {e}");
        GlobSet::empty()
    })
}

/// Infers language and role for files whose manifest entry omits them.
pub struct FileClassifier {
    public_interface: GlobSet,
    exclude: GlobSet,
    extensions: HashMap<String, Language>,
}

impl FileClassifier {
    pub fn new(config: &ClassifyConfig) -> Self {
        Self {
            public_interface: build_globset(&config.public_interface),
            exclude: build_globset(&config.exclude),
            extensions: HashMap::new(),
        }
    }

    /// Map file extensions (without the dot) to a language. Later
    /// registrations do not override earlier ones.
    pub fn register(&mut self, language: Language, extensions: &[&str]) {
        for ext in extensions {
            self.extensions
                .entry(ext.to_lowercase())
                .or_insert(language);
        }
    }

    fn normalize(path: &Path) -> String {
        path.to_string_lossy().replace('\\', "/")
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        self.exclude.is_match(Self::normalize(path))
    }

    pub fn language(&self, path: &Path) -> Option<Language> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        self.extensions.get(&ext).copied()
    }

    pub fn role(&self, path: &Path) -> FileRole {
        if self.public_interface.is_match(Self::normalize(path)) {
            FileRole::PublicInterface
        } else {
            FileRole::Implementation
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> FileClassifier {
        let mut classifier = FileClassifier::new(&ClassifyConfig {
            exclude: vec!["**/vendor/**".to_string()],
            ..ClassifyConfig::default()
        });
        classifier.register(Language::C, &["c", "h"]);
        classifier.register(Language::Cpp, &["cpp", "hpp", "h"]);
        classifier.register(Language::Python, &["py"]);
        classifier
    }

    #[test]
    fn test_language_by_extension() {
        let c = classifier();
        assert_eq!(c.language(Path::new("src/vector.c")), Some(Language::C));
        assert_eq!(c.language(Path::new("src/shape.HPP")), Some(Language::Cpp));
        assert_eq!(c.language(Path::new("app/main.py")), Some(Language::Python));
        assert_eq!(c.language(Path::new("README.md")), None);
    }

    #[test]
    fn test_first_registration_wins() {
        let c = classifier();
        assert_eq!(c.language(Path::new("vector.h")), Some(Language::C));
    }

    #[test]
    fn test_role_from_globs() {
        let c = classifier();
        assert_eq!(c.role(Path::new("src/vector.h")), FileRole::PublicInterface);
        assert_eq!(c.role(Path::new("include/api/types.inc")), FileRole::PublicInterface);
        assert_eq!(c.role(Path::new("src/vector.c")), FileRole::Implementation);
        assert_eq!(c.role(Path::new("src\\win\\api.h")), FileRole::PublicInterface);
    }

    #[test]
    fn test_excluded_paths() {
        let c = classifier();
        assert!(c.is_excluded(Path::new("third/vendor/lib.c")));
        assert!(!c.is_excluded(Path::new("src/lib.c")));
    }

    #[test]
    fn test_invalid_glob_is_ignored() {
        let c = FileClassifier::new(&ClassifyConfig {
            public_interface: vec!["[".to_string(), "**/*.h".to_string()],
            exclude: vec![],
        });
        assert_eq!(c.role(Path::new("a.h")), FileRole::PublicInterface);
    }
}
