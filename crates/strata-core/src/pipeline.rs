use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analyzer::StructuralExtractor;
use crate::classify::FileClassifier;
use crate::complexity::{ComplexityAnalyzer, ComplexityInsight, ComplexityReport};
use crate::config::Config;
use crate::error::ExtractionError;
use crate::facts::{aggregate, StructuralFacts};
use crate::graph::InheritanceGraph;
use crate::patterns::detect_patterns;
use crate::scoring::{analyze_project_with, ProjectScore};
use crate::types::{FileRole, Language, ProjectInput, SourceFile};

/// A file that contributed nothing because extraction failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub language: String,
    pub reason: String,
}

/// Full analysis output for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectAnalysis {
    pub project_name: String,
    pub project_path: String,
    pub input_digest: String,
    pub facts: BTreeMap<Language, StructuralFacts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<ComplexityReport>,
    pub score: ProjectScore,
    #[serde(default)]
    pub failures: Vec<FileFailure>,
}

/// Extracted per-file data before the fold.
struct FileOutcome {
    language: Option<Language>,
    facts: Option<StructuralFacts>,
    insights: Option<Vec<ComplexityInsight>>,
    failure: Option<FileFailure>,
}

impl FileOutcome {
    fn skipped() -> Self {
        Self {
            language: None,
            facts: None,
            insights: None,
            failure: None,
        }
    }
}

/// Resolve inheritance depth and design patterns on aggregated facts.
pub fn finalize_facts(mut facts: StructuralFacts) -> StructuralFacts {
    let graph = InheritanceGraph::from_edges(&facts.inheritance);
    for cycle in graph.find_cycles() {
        warn!("cyclic inheritance between {}", cycle.join(", "));
    }
    facts.inheritance_depth = facts.inheritance_depth.max(graph.max_depth());
    facts.design_patterns = detect_patterns(&facts);
    facts
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs extractors and complexity analyzers over a project's files and
/// scores the result.
pub struct AnalysisPipeline {
    extractors: Vec<Box<dyn StructuralExtractor>>,
    complexity: Vec<Box<dyn ComplexityAnalyzer>>,
    config: Config,
    classifier: FileClassifier,
    source_root: Option<PathBuf>,
}

impl AnalysisPipeline {
    pub fn new(
        extractors: Vec<Box<dyn StructuralExtractor>>,
        complexity: Vec<Box<dyn ComplexityAnalyzer>>,
        config: Config,
    ) -> Self {
        let mut classifier = FileClassifier::new(&config.classify);
        for extractor in &extractors {
            classifier.register(extractor.language(), extractor.file_extensions());
        }
        Self {
            extractors,
            complexity,
            config,
            classifier,
            source_root: None,
        }
    }

    /// Directory that relative file paths are read from. Paths stay relative
    /// for classification, digests and reports.
    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_root = Some(root.into());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn extractor_for(&self, language: Language) -> Option<&dyn StructuralExtractor> {
        self.extractors
            .iter()
            .find(|e| e.language() == language)
            .map(|e| e.as_ref())
    }

    fn complexity_for(&self, language: Language) -> Option<&dyn ComplexityAnalyzer> {
        self.complexity
            .iter()
            .find(|c| c.language() == language)
            .map(|c| c.as_ref())
    }

    /// Run `work` with panic isolation and the per-file time budget.
    ///
    /// The budget is checked once `work` returns: a slow file runs to
    /// completion and its result is then discarded as `TimedOut`. Nothing is
    /// interrupted mid-parse.
    fn guarded<T>(
        &self,
        path: &Path,
        work: impl FnOnce() -> Result<T, ExtractionError>,
    ) -> Result<T, ExtractionError> {
        let budget = Duration::from_millis(self.config.analysis.time_budget_ms);
        let started = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(work)).map_err(|payload| {
            ExtractionError::Panicked {
                path: path.to_path_buf(),
                message: panic_message(payload.as_ref()),
            }
        })??;
        let elapsed = started.elapsed();
        if elapsed > budget {
            return Err(ExtractionError::TimedOut {
                path: path.to_path_buf(),
                elapsed,
                budget,
            });
        }
        Ok(result)
    }

    fn resolve_language(&self, file: &SourceFile) -> Result<Option<Language>, ExtractionError> {
        match &file.language {
            Some(tag) => tag
                .parse::<Language>()
                .map(Some)
                .map_err(|_| ExtractionError::Unsupported {
                    tag: tag.clone(),
                    path: file.path.clone(),
                }),
            None => Ok(self.classifier.language(&file.path)),
        }
    }

    fn load_source(&self, file: &SourceFile) -> Result<String, ExtractionError> {
        let content = match &file.source {
            Some(source) => source.clone(),
            None => {
                let disk_path = match &self.source_root {
                    Some(root) if file.path.is_relative() => root.join(&file.path),
                    _ => file.path.clone(),
                };
                std::fs::read_to_string(&disk_path)
                    .map_err(|source| ExtractionError::Io { path: disk_path, source })?
            }
        };
        let limit = self.config.analysis.max_file_bytes;
        if content.len() > limit {
            return Err(ExtractionError::TooLarge {
                path: file.path.clone(),
                size: content.len(),
                limit,
            });
        }
        Ok(content)
    }

    fn process_file(&self, file: &SourceFile) -> FileOutcome {
        if self.classifier.is_excluded(&file.path) {
            debug!(path = %file.path.display(), "excluded by config");
            return FileOutcome::skipped();
        }

        let tag = file.language.clone().unwrap_or_default();
        let fail = |language: Option<Language>, err: ExtractionError| {
            warn!("{err}");
            FileOutcome {
                language,
                facts: language.map(|_| StructuralFacts::failed(err.to_string())),
                insights: None,
                failure: Some(FileFailure {
                    path: file.path.clone(),
                    language: language.map(|l| l.to_string()).unwrap_or_else(|| tag.clone()),
                    reason: err.to_string(),
                }),
            }
        };

        let language = match self.resolve_language(file) {
            Ok(Some(language)) => language,
            Ok(None) => {
                debug!(path = %file.path.display(), "no extractor for file, skipping");
                return FileOutcome::skipped();
            }
            Err(err) => return fail(None, err),
        };
        let Some(extractor) = self.extractor_for(language) else {
            let err = ExtractionError::Unsupported {
                tag: language.to_string(),
                path: file.path.clone(),
            };
            return fail(None, err);
        };

        let content = match self.load_source(file) {
            Ok(content) => content,
            Err(err) => return fail(Some(language), err),
        };
        let role = file.role.unwrap_or_else(|| self.classifier.role(&file.path));

        let insights = self.complexity_for(language).and_then(|analyzer| {
            match self.guarded(&file.path, || analyzer.analyze(&file.path, &content)) {
                Ok(insights) => Some(insights),
                Err(err) => {
                    debug!("complexity pass skipped: {err}");
                    None
                }
            }
        });

        match self.guarded(&file.path, || extractor.extract(&file.path, &content, role)) {
            Ok(facts) => FileOutcome {
                language: Some(language),
                facts: Some(facts),
                insights,
                failure: None,
            },
            Err(err) => FileOutcome {
                insights,
                ..fail(Some(language), err)
            },
        }
    }

    /// Analyze one project: extract every file, fold per language, resolve
    /// depth and patterns, run the complexity report and score.
    pub fn analyze(&self, input: &ProjectInput) -> ProjectAnalysis {
        let started = Instant::now();
        let outcomes: Vec<FileOutcome> = if self.config.analysis.parallel {
            input.files.par_iter().map(|f| self.process_file(f)).collect()
        } else {
            input.files.iter().map(|f| self.process_file(f)).collect()
        };

        let mut per_language: BTreeMap<Language, Vec<StructuralFacts>> = BTreeMap::new();
        let mut report = ComplexityReport::new();
        let mut failures = Vec::new();
        let mut hygiene = input.hygiene.clone();

        for outcome in outcomes {
            if let (Some(language), Some(facts)) = (outcome.language, outcome.facts) {
                per_language.entry(language).or_default().push(facts);
            }
            if let Some(insights) = outcome.insights {
                report.add_file(insights);
            }
            if let Some(failure) = outcome.failure {
                if failure.language.parse::<Language>().is_err() && !failure.language.is_empty() {
                    *hygiene.languages.entry(failure.language.clone()).or_insert(0) += 1;
                }
                failures.push(failure);
            }
        }

        let facts: BTreeMap<Language, StructuralFacts> = per_language
            .into_iter()
            .map(|(language, files)| (language, finalize_facts(aggregate(&files))))
            .collect();

        let complexity = (report.total_files_analyzed > 0).then(|| {
            report.sort();
            report.calculate_score();
            report
        });

        let score = analyze_project_with(&facts, complexity.as_ref(), &hygiene, &self.config.scoring);

        info!(
            project = %input.name,
            files = input.files.len(),
            failed = failures.len(),
            composite = score.composite_score,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis complete"
        );

        ProjectAnalysis {
            project_name: input.name.clone(),
            project_path: input.path.clone(),
            input_digest: input.digest(),
            facts,
            complexity,
            score,
            failures,
        }
    }
}

/// Extract a single file outside a pipeline, downgrading any error to a
/// failed facts record.
pub fn extract_or_failed(
    extractor: &dyn StructuralExtractor,
    path: &Path,
    content: &str,
    role: FileRole,
) -> StructuralFacts {
    extractor
        .extract(path, content, role)
        .unwrap_or_else(|err| StructuralFacts::failed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ParsedFile;
    use crate::types::HygieneSignals;

    /// Fake extractor: counts `class` lines, panics on "boom", fails on "!!".
    struct LineExtractor;

    impl StructuralExtractor for LineExtractor {
        fn language(&self) -> Language {
            Language::Java
        }

        fn file_extensions(&self) -> &[&str] {
            &["java"]
        }

        fn parse_file(&self, path: &Path, content: &str) -> Result<ParsedFile, ExtractionError> {
            Err(ExtractionError::Parse {
                language: Language::Java,
                path: path.to_path_buf(),
                message: format!("unused: {}", content.len()),
            })
        }

        fn extract_facts(&self, _parsed: &ParsedFile, _role: FileRole) -> StructuralFacts {
            StructuralFacts::default()
        }

        fn extract(
            &self,
            path: &Path,
            content: &str,
            _role: FileRole,
        ) -> Result<StructuralFacts, ExtractionError> {
            if content.contains("boom") {
                panic!("extractor blew up");
            }
            if content.contains("!!") {
                return Err(ExtractionError::Parse {
                    language: Language::Java,
                    path: path.to_path_buf(),
                    message: "bad token".to_string(),
                });
            }
            let mut facts = StructuralFacts {
                files_analyzed: 1,
                ..Default::default()
            };
            for line in content.lines() {
                if let Some(rest) = line.strip_prefix("class ") {
                    facts.total_classes += 1;
                    let mut parts = rest.split(" extends ");
                    let name = parts.next().unwrap_or_default().trim().to_string();
                    facts.type_names.insert(name.clone());
                    if let Some(parent) = parts.next() {
                        facts.classes_with_inheritance += 1;
                        facts.add_edge(parent.trim(), name);
                    }
                }
            }
            Ok(facts)
        }
    }

    fn file(path: &str, source: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from(path),
            language: None,
            role: None,
            source: Some(source.to_string()),
        }
    }

    fn pipeline(parallel: bool) -> AnalysisPipeline {
        let mut config = Config::default();
        config.analysis.parallel = parallel;
        AnalysisPipeline::new(vec![Box::new(LineExtractor)], vec![], config)
    }

    fn input(files: Vec<SourceFile>) -> ProjectInput {
        ProjectInput {
            name: "demo".to_string(),
            path: "/demo".to_string(),
            files,
            hygiene: HygieneSignals::default(),
        }
    }

    #[test]
    fn test_relative_paths_read_from_source_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/A.java"), "class A\n").unwrap();
        let on_disk = SourceFile {
            source: None,
            ..file("src/A.java", "")
        };

        let analysis = pipeline(false)
            .with_source_root(dir.path())
            .analyze(&input(vec![on_disk.clone()]));
        assert!(analysis.failures.is_empty(), "{:?}", analysis.failures);
        assert_eq!(analysis.facts[&Language::Java].total_classes, 1);
        assert_eq!(analysis.input_digest, input(vec![on_disk.clone()]).digest());

        let missing = pipeline(false).analyze(&input(vec![on_disk]));
        assert_eq!(missing.failures.len(), 1, "no root: resolved against the working directory");
        assert_eq!(missing.failures[0].path, PathBuf::from("src/A.java"));
    }

    #[test]
    fn test_failures_are_isolated() {
        let project = input(vec![
            file("A.java", "class Base\nclass Child extends Base\n"),
            file("B.java", "boom"),
            file("C.java", "!!"),
        ]);
        let analysis = pipeline(true).analyze(&project);
        let java = &analysis.facts[&Language::Java];
        assert_eq!(java.total_classes, 2);
        assert_eq!(java.files_analyzed, 1);
        assert_eq!(java.files_failed, 2);
        assert_eq!(java.inheritance_depth, 1);
        assert_eq!(analysis.failures.len(), 2);
        assert!(analysis.failures.iter().any(|f| f.reason.contains("panicked")));
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let files: Vec<SourceFile> = (0..20)
            .map(|i| file(&format!("F{i}.java"), &format!("class T{i} extends T{}\n", i + 1)))
            .collect();
        let a = pipeline(true).analyze(&input(files.clone()));
        let b = pipeline(false).analyze(&input(files));
        assert_eq!(a.facts, b.facts);
        assert_eq!(a.score, b.score);
        assert_eq!(a.facts[&Language::Java].inheritance_depth, 20);
    }

    #[test]
    fn test_unsupported_language_reported() {
        let mut go = file("main.go", "package main");
        go.language = Some("go".to_string());
        let analysis = pipeline(true).analyze(&input(vec![go, file("notes.txt", "hello")]));
        assert_eq!(analysis.failures.len(), 1, "unknown extensions are skipped silently");
        assert_eq!(analysis.failures[0].language, "go");
        assert!(analysis
            .score
            .justifications
            .code_architecture
            .contains("go: analysis unavailable"));
    }

    #[test]
    fn test_oversized_file_rejected() {
        let mut p = pipeline(false);
        p.config.analysis.max_file_bytes = 8;
        let analysis = p.analyze(&input(vec![file("Big.java", "class Enormous\n")]));
        assert_eq!(analysis.facts[&Language::Java].files_failed, 1);
        assert!(analysis.failures[0].reason.contains("byte limit"));
    }

    #[test]
    fn test_time_budget_downgrades() {
        let mut p = pipeline(false);
        p.config.analysis.time_budget_ms = 0;
        let mut finished = false;
        let result = p.guarded(Path::new("slow.java"), || {
            std::thread::sleep(Duration::from_millis(5));
            finished = true;
            Ok(())
        });
        assert!(matches!(result, Err(ExtractionError::TimedOut { .. })));
        assert!(finished, "work runs to completion before the budget is checked");
    }

    #[test]
    fn test_excluded_files_skipped() {
        let mut config = Config::default();
        config.classify.exclude = vec!["vendor/**".to_string()];
        let p = AnalysisPipeline::new(vec![Box::new(LineExtractor)], vec![], config);
        let analysis = p.analyze(&input(vec![file("vendor/X.java", "class X\n")]));
        assert!(analysis.facts.is_empty());
    }

    #[test]
    fn test_extract_or_failed() {
        let facts = extract_or_failed(&LineExtractor, Path::new("x.java"), "!!", FileRole::Implementation);
        assert!(facts.is_failed());
    }
}
