use anyhow::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Conventional Java source roots, most specific first.
const SOURCE_ROOTS: &[&str] = &["src/main/java", "src/java", "src"];

/// The first conventional source root present under `project`, else `project`.
///
/// Only one root is scanned, so a Maven `src/test/java` tree never reaches the
/// analysis.
pub fn detect_source_root(project: &Path) -> PathBuf {
    SOURCE_ROOTS
        .iter()
        .map(|rel| project.join(rel))
        .find(|p| p.is_dir())
        .unwrap_or_else(|| project.to_path_buf())
}

/// Collect `.java` files under `root` using the `ignore` crate (.gitignore aware),
/// sorted by canonical path.
pub fn collect_java_files(root: &Path, glob_pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    use ignore::WalkBuilder;

    let mut builder = WalkBuilder::new(root);
    builder.hidden(true).git_ignore(true).git_global(true);

    if let Some(pattern) = glob_pattern {
        let mut overrides = ignore::overrides::OverrideBuilder::new(root);
        overrides.add(pattern)?;
        builder.overrides(overrides.build()?);
    }

    let mut files: BTreeSet<PathBuf> = BTreeSet::new();
    for entry in builder.build() {
        let entry = entry?;
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let path = entry.into_path();
        if path.extension().is_some_and(|ext| ext == "java") {
            let canonical = std::fs::canonicalize(&path).unwrap_or(path);
            files.insert(canonical);
        }
    }

    debug!(root = %root.display(), files = files.len(), "java files collected");
    Ok(files.into_iter().collect())
}
