use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Language families with a structural extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Java,
    C,
    Cpp,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::Python, Language::Java, Language::C, Language::Cpp];

    /// Short tag used in manifests and reports.
    pub fn tag(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl std::str::FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "java" => Ok(Language::Java),
            "c" => Ok(Language::C),
            "cpp" | "c++" | "cxx" | "cc" => Ok(Language::Cpp),
            _ => Err(anyhow::anyhow!("unsupported language: {s}")),
        }
    }
}

/// Whether a file declares a public interface (headers) or implements one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileRole {
    #[serde(alias = "header")]
    PublicInterface,
    #[default]
    #[serde(alias = "source")]
    Implementation,
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileRole::PublicInterface => write!(f, "public-interface"),
            FileRole::Implementation => write!(f, "implementation"),
        }
    }
}

/// Visibility bucket for methods and fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Private,
    Protected,
    Public,
    Package,
}

/// Member counts split by visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityCounts {
    pub private: usize,
    pub protected: usize,
    pub public: usize,
    pub package: usize,
}

impl VisibilityCounts {
    pub fn record(&mut self, visibility: Visibility) {
        match visibility {
            Visibility::Private => self.private += 1,
            Visibility::Protected => self.protected += 1,
            Visibility::Public => self.public += 1,
            Visibility::Package => self.package += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.private + self.protected + self.public + self.package
    }

    /// Members hidden from outside callers (private + protected).
    pub fn encapsulated(&self) -> usize {
        self.private + self.protected
    }

    pub fn merge(&mut self, other: &VisibilityCounts) {
        self.private += other.private;
        self.protected += other.protected;
        self.public += other.public;
        self.package += other.package;
    }
}

/// One file handed over by source partitioning.
///
/// `language` and `role` may be omitted and are then inferred from `path`;
/// `source` may be omitted when the file can be read from disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    #[serde(default)]
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<FileRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Coarse test coverage bucket reported by the metadata collector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageEstimate {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl CoverageEstimate {
    /// Bucket a test-to-code file ratio.
    pub fn from_counts(test_files: usize, code_files: usize) -> Self {
        if test_files == 0 {
            return CoverageEstimate::None;
        }
        let ratio = test_files as f64 / code_files.max(1) as f64;
        if ratio >= 0.5 {
            CoverageEstimate::High
        } else if ratio >= 0.2 {
            CoverageEstimate::Medium
        } else {
            CoverageEstimate::Low
        }
    }
}

impl fmt::Display for CoverageEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageEstimate::None => write!(f, "none"),
            CoverageEstimate::Low => write!(f, "low"),
            CoverageEstimate::Medium => write!(f, "medium"),
            CoverageEstimate::High => write!(f, "high"),
        }
    }
}

/// Project hygiene signals. Every field is optional on the wire and a
/// missing signal reads as zero/false.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HygieneSignals {
    pub has_tests: bool,
    pub has_readme: bool,
    pub has_ci_cd: bool,
    pub has_docker: bool,
    pub is_git_repo: bool,
    pub total_commits: u64,
    pub test_coverage_estimate: CoverageEstimate,
    pub directory_depth: usize,
    pub config_file_count: usize,
    pub largest_file_size: u64,
    pub languages: BTreeMap<String, usize>,
    pub test_file_count: usize,
    pub code_file_count: usize,
    pub doc_file_count: usize,
}

impl HygieneSignals {
    /// Test-to-code file ratio, `None` when no code files were reported.
    pub fn test_ratio(&self) -> Option<f64> {
        if self.code_file_count == 0 {
            return None;
        }
        Some(self.test_file_count as f64 / self.code_file_count as f64)
    }
}

/// Everything needed to analyze one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectInput {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub files: Vec<SourceFile>,
    #[serde(default)]
    pub hygiene: HygieneSignals,
}

impl ProjectInput {
    /// SHA-256 over the ordered inputs. Equal digests mean equal scores.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update([0]);
        hasher.update(self.path.as_bytes());
        for file in &self.files {
            hasher.update([0]);
            hasher.update(file.path.to_string_lossy().as_bytes());
            hasher.update([0]);
            hasher.update(file.language.as_deref().unwrap_or("").as_bytes());
            hasher.update([0]);
            hasher.update(file.role.map(|r| r.to_string()).unwrap_or_default().as_bytes());
            hasher.update([0]);
            hasher.update(file.source.as_deref().unwrap_or("").as_bytes());
        }
        if let Ok(hygiene) = serde_json::to_vec(&self.hygiene) {
            hasher.update(hygiene);
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parse() {
        assert_eq!("python".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("PY".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("c++".parse::<Language>().unwrap(), Language::Cpp);
        assert_eq!("c".parse::<Language>().unwrap(), Language::C);
        assert!("go".parse::<Language>().is_err());
    }

    #[test]
    fn test_file_role_serde_aliases() {
        let role: FileRole = serde_json::from_str("\"header\"").unwrap();
        assert_eq!(role, FileRole::PublicInterface);
        let role: FileRole = serde_json::from_str("\"public-interface\"").unwrap();
        assert_eq!(role, FileRole::PublicInterface);
        assert_eq!(
            serde_json::to_string(&FileRole::Implementation).unwrap(),
            "\"implementation\""
        );
    }

    #[test]
    fn test_missing_hygiene_defaults_to_zero() {
        let hygiene: HygieneSignals = serde_json::from_str(r#"{"has_readme": true}"#).unwrap();
        assert!(hygiene.has_readme);
        assert!(!hygiene.has_ci_cd);
        assert_eq!(hygiene.total_commits, 0);
        assert_eq!(hygiene.test_coverage_estimate, CoverageEstimate::None);
        assert!(hygiene.test_ratio().is_none(), "no code files means no ratio");
    }

    #[test]
    fn test_coverage_estimate_buckets() {
        assert_eq!(CoverageEstimate::from_counts(0, 10), CoverageEstimate::None);
        assert_eq!(CoverageEstimate::from_counts(1, 10), CoverageEstimate::Low);
        assert_eq!(CoverageEstimate::from_counts(2, 10), CoverageEstimate::Medium);
        assert_eq!(CoverageEstimate::from_counts(5, 10), CoverageEstimate::High);
    }

    #[test]
    fn test_visibility_counts() {
        let mut counts = VisibilityCounts::default();
        counts.record(Visibility::Private);
        counts.record(Visibility::Protected);
        counts.record(Visibility::Public);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.encapsulated(), 2);
    }

    #[test]
    fn test_digest_is_stable_and_input_sensitive() {
        let mut input = ProjectInput {
            name: "demo".to_string(),
            path: "/tmp/demo".to_string(),
            files: vec![SourceFile {
                path: PathBuf::from("a.py"),
                language: Some("python".to_string()),
                role: None,
                source: Some("x = 1\n".to_string()),
            }],
            hygiene: HygieneSignals::default(),
        };
        let first = input.digest();
        assert_eq!(first, input.digest());
        input.hygiene.has_readme = true;
        assert_ne!(first, input.digest());
    }
}
