use anyhow::{Result, bail};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::engine::clustering::{self, replay_partition};
use crate::engine::coupling::{self, weight_entries, weighted_edges};
use crate::engine::dendrogram::DendrogramTree;
use crate::engine::discovery;
use crate::engine::facts::FactCollector;
use crate::engine::modules::{extract_from_tree, max_modules};
use crate::error::{ErrorCode, LensError};
use crate::models::cluster::{ClusteringResult, ClustersResult};
use crate::models::coupling::{CouplingWeights, PairReport, WeightsResult};
use crate::models::dendrogram::DendrogramResult;
use crate::models::fact::FactsResult;
use crate::models::module::{CutMode, ModulesResult};

// ---------------------------------------------------------------------------
// AppService: project loading shared by CLI and session
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct AppService {
    glob: Option<String>,
}

impl AppService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict discovery to files matching `glob` (relative to the source root).
    pub fn with_glob(glob: Option<String>) -> Self {
        Self { glob }
    }

    /// Validate and canonicalize a directory path. Returns the canonical path.
    fn validate_dir(&self, dir: &str) -> Result<PathBuf> {
        let canonical = std::fs::canonicalize(dir).map_err(|_| {
            warn!(dir = dir, "validate_dir: directory not found");
            LensError::new(
                ErrorCode::FileNotFound,
                format!("Directory not found: {dir}"),
            )
        })?;
        if !canonical.is_dir() {
            bail!(LensError::new(
                ErrorCode::InvalidRequest,
                format!("Not a directory: {dir}"),
            ));
        }
        Ok(canonical)
    }

    /// Extract class facts from every Java file of the project at `dir`.
    pub fn collect_facts(&self, dir: &str) -> Result<FactsResult> {
        debug!(dir = dir, glob = ?self.glob, "collect_facts called");
        let project = self.validate_dir(dir)?;
        let result = collect_from(&project, self.glob.as_deref())?;
        debug!(
            dir = dir,
            files = result.files_scanned,
            classes = result.classes.len(),
            parse_errors = result.parse_errors,
            "collect_facts completed"
        );
        Ok(result)
    }

    /// Run the whole pipeline once: facts, weights, clustering and tree.
    pub fn analyze(&self, dir: &str) -> Result<Analysis> {
        debug!(dir = dir, glob = ?self.glob, "analyze called");
        let facts = self.collect_facts(dir)?;
        let analysis = Analysis::from_facts(facts)?;
        debug!(
            dir = dir,
            classes = analysis.weights.classes().len(),
            merges = analysis.clustering.merges.len(),
            "analyze completed"
        );
        Ok(analysis)
    }
}

fn collect_from(project: &Path, glob: Option<&str>) -> Result<FactsResult> {
    let root = discovery::detect_source_root(project);
    let files = discovery::collect_java_files(&root, glob)?;
    let mut collector = FactCollector::new();
    collector.collect_files(&files)?;
    Ok(collector.finish())
}

// ---------------------------------------------------------------------------
// Analysis: immutable per-run results, queried by every command
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Analysis {
    facts: FactsResult,
    weights: CouplingWeights,
    clustering: ClusteringResult,
    tree: DendrogramTree,
}

impl Analysis {
    pub fn from_facts(facts: FactsResult) -> Result<Self> {
        let weights = coupling::build_weights(&facts.classes);
        let clustering = clustering::cluster(&weights);
        let tree = DendrogramTree::from_merges(&clustering.merges)?;
        Ok(Self {
            facts,
            weights,
            clustering,
            tree,
        })
    }

    pub fn facts(&self) -> &FactsResult {
        &self.facts
    }

    pub fn weights(&self) -> &CouplingWeights {
        &self.weights
    }

    pub fn clustering(&self) -> &ClusteringResult {
        &self.clustering
    }

    pub fn tree(&self) -> &DendrogramTree {
        &self.tree
    }

    /// Every pair plus the edges heavier than `min_percent` % of the heaviest.
    pub fn weights_report(&self, min_percent: f64) -> Result<WeightsResult> {
        debug!(min_percent = min_percent, "weights_report called");
        if !min_percent.is_finite() || min_percent < 0.0 {
            bail!(LensError::new(
                ErrorCode::InvalidRequest,
                format!("min_percent must be a non-negative number, got {min_percent}"),
            ));
        }
        Ok(WeightsResult {
            total_calls: self.weights.total_calls(),
            classes: self.weights.classes().into_iter().collect(),
            pairs: weight_entries(&self.weights),
            edges: weighted_edges(&self.weights, min_percent),
        })
    }

    pub fn pair(&self, a: &str, b: &str) -> Result<PairReport> {
        debug!(a = a, b = b, "pair called");
        coupling::pair_report(&self.facts.classes, self.weights.total_calls(), a, b)
    }

    /// Partition after `steps` merges; `None` replays the whole sequence.
    pub fn clusters(&self, steps: Option<usize>) -> ClustersResult {
        let merges = &self.clustering.merges;
        let steps = steps.unwrap_or(merges.len()).min(merges.len());
        debug!(steps = steps, "clusters called");

        let classes = self.weights.classes();
        let clusters = if steps == merges.len() {
            self.clustering.clusters.clone()
        } else {
            replay_partition(&classes, merges, steps)
        };
        ClustersResult {
            class_count: classes.len(),
            steps,
            clusters,
            merges: merges.clone(),
        }
    }

    pub fn dendrogram(&self) -> DendrogramResult {
        let root = self.tree.root();
        DendrogramResult {
            class_count: self.tree.class_count(),
            leaves: root
                .map(|r| self.tree.leaves(r).into_iter().map(String::from).collect())
                .unwrap_or_default(),
            root: root.map(|r| self.tree.to_view(r)),
        }
    }

    pub fn modules(&self, cp: f64, mode: CutMode) -> Result<ModulesResult> {
        debug!(cp = cp, mode = %mode, "modules called");
        if !cp.is_finite() {
            warn!(cp = cp, "modules: rejected non-finite cut point");
            bail!(LensError::new(
                ErrorCode::InvalidRequest,
                format!("cp must be a finite number, got {cp}"),
            ));
        }
        let class_count = self.tree.class_count();
        let modules = extract_from_tree(&self.tree, &self.weights, cp, mode);
        debug!(cp = cp, modules = modules.len(), "modules completed");
        Ok(ModulesResult {
            cp,
            mode,
            class_count,
            max_modules: max_modules(class_count),
            modules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fact::{CallFact, ClassFact, MethodFact};

    fn class(name: &str, receivers: &[&str]) -> ClassFact {
        let mut fact = ClassFact::new(name);
        fact.methods.push(MethodFact {
            name: "run".into(),
            params: 0,
            lines: 1,
            calls: receivers
                .iter()
                .map(|r| CallFact {
                    method: "m".into(),
                    receiver: r.to_string(),
                    line: 0,
                })
                .collect(),
        });
        fact
    }

    fn analysis(classes: Vec<ClassFact>) -> Analysis {
        Analysis::from_facts(FactsResult {
            files_scanned: classes.len(),
            parse_errors: 0,
            classes,
        })
        .unwrap()
    }

    #[test]
    fn scenario_a_end_to_end() {
        let a = analysis(vec![
            class("A", &["B"]),
            class("B", &["C"]),
            class("C", &[]),
        ]);

        assert_eq!(a.weights().get("A", "B"), 0.5);
        assert_eq!(a.weights().get("B", "C"), 0.5);
        assert_eq!(a.weights().get("A", "C"), 0.0);

        let clusters = a.clusters(None);
        assert_eq!(clusters.steps, 2);
        assert_eq!(clusters.clusters.len(), 1);

        let one_step = a.clusters(Some(1));
        assert_eq!(one_step.clusters.len(), 2);
        assert_eq!(a.clusters(Some(50)).steps, 2);

        let dendrogram = a.dendrogram();
        assert_eq!(dendrogram.class_count, 3);
        assert_eq!(dendrogram.leaves, vec!["A", "B", "C"]);
    }

    #[test]
    fn modules_validate_cp() {
        let a = analysis(vec![class("A", &["B"]), class("B", &[])]);
        for cp in [f64::NAN, f64::INFINITY] {
            let err = a.modules(cp, CutMode::Similarity).unwrap_err();
            assert_eq!(
                err.downcast_ref::<LensError>().unwrap().code,
                ErrorCode::InvalidRequest
            );
        }
        let result = a.modules(0.5, CutMode::Similarity).unwrap();
        assert_eq!(result.class_count, 2);
        assert_eq!(result.max_modules, 1);
        assert_eq!(result.modules.len(), 1);
    }

    #[test]
    fn empty_project_yields_empty_results() {
        let a = analysis(Vec::new());
        assert!(a.clusters(None).clusters.is_empty());
        assert!(a.dendrogram().root.is_none());
        assert!(a.modules(0.05, CutMode::Similarity).unwrap().modules.is_empty());
        assert!(a.weights_report(0.0).unwrap().pairs.is_empty());
    }

    #[test]
    fn weights_report_rejects_bad_threshold() {
        let a = analysis(vec![class("A", &["B"]), class("B", &[])]);
        assert!(a.weights_report(-1.0).is_err());
        assert!(a.weights_report(f64::NAN).is_err());
        assert_eq!(a.weights_report(0.0).unwrap().edges.len(), 1);
    }

    #[test]
    fn missing_directory_is_file_not_found() {
        let err = AppService::new()
            .analyze("/nonexistent/project/dir")
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<LensError>().unwrap().code,
            ErrorCode::FileNotFound
        );
    }

    #[test]
    fn analyze_reads_a_project_tree() {
        let dir = tempfile::TempDir::new().unwrap();
        let src = dir.path().join("src/main/java/p");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("A.java"), "package p; class A { void m() { B.go(); } }").unwrap();
        std::fs::write(src.join("B.java"), "package p; class B { static void go() {} }").unwrap();

        let analysis = AppService::new()
            .analyze(dir.path().to_str().unwrap())
            .unwrap();
        assert_eq!(analysis.facts().files_scanned, 2);
        assert_eq!(analysis.weights().get("A", "B"), 1.0);
        assert_eq!(analysis.pair("a", "B").unwrap().calls_a_to_b, 1);
        assert_eq!(analysis.pair("a", "B").unwrap().total_calls, 1);
    }

    #[test]
    fn maven_tests_do_not_change_weights() {
        let dir = tempfile::TempDir::new().unwrap();
        let main = dir.path().join("src/main/java/p");
        let test = dir.path().join("src/test/java/p");
        std::fs::create_dir_all(&main).unwrap();
        std::fs::create_dir_all(&test).unwrap();
        std::fs::write(main.join("A.java"), "package p; class A { void m() { B.go(); } }").unwrap();
        std::fs::write(main.join("B.java"), "package p; class B { static void go() {} }").unwrap();
        std::fs::write(
            test.join("ATest.java"),
            "package p; class ATest { void t() { A.make(); B.go(); B.go(); } }",
        )
        .unwrap();

        let analysis = AppService::new()
            .analyze(dir.path().to_str().unwrap())
            .unwrap();
        assert_eq!(analysis.facts().files_scanned, 2);
        assert_eq!(analysis.weights().total_calls(), 1);
        assert!(analysis.pair("ATest", "A").is_err());
    }
}
