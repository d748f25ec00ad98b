//! Deciding between resubmitting a rescue dag and planning anew.

use std::path::Path;

use tracing::debug;

/// `<basename>.dag`.
pub fn dag_filename(basename: &str) -> String {
    format!("{basename}.dag")
}

/// `<dag>.rescueNNN`.
pub fn rescue_filename(dag: &str, attempt: u32) -> String {
    format!("{dag}.rescue{attempt:03}")
}

/// True when the dag in `dir` should be resubmitted instead of planned.
///
/// That is the case while the dag exists and its `tries`-th rescue dag
/// does not.
pub fn should_submit_rescue(dir: &Path, dag: &str, tries: u32) -> bool {
    if tries < 1 {
        return false;
    }
    let dag_path = dir.join(dag);
    debug!(path = %dag_path.display(), "checking for existing dag");
    if !dag_path.exists() {
        return false;
    }
    let rescue = dir.join(rescue_filename(dag, tries));
    debug!(path = %rescue.display(), "checking for last rescue dag");
    !rescue.exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_names() {
        assert_eq!(dag_filename("black-0"), "black-0.dag");
        assert_eq!(rescue_filename("black-0.dag", 7), "black-0.dag.rescue007");
    }

    #[test]
    fn test_rescue_decision() {
        let dir = TempDir::new().unwrap();
        assert!(!should_submit_rescue(dir.path(), "w.dag", 2));

        std::fs::write(dir.path().join("w.dag"), "").unwrap();
        assert!(!should_submit_rescue(dir.path(), "w.dag", 0));
        assert!(should_submit_rescue(dir.path(), "w.dag", 2));

        std::fs::write(dir.path().join("w.dag.rescue001"), "").unwrap();
        assert!(should_submit_rescue(dir.path(), "w.dag", 2));
        std::fs::write(dir.path().join("w.dag.rescue002"), "").unwrap();
        assert!(!should_submit_rescue(dir.path(), "w.dag", 2));
    }
}
