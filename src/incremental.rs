// Public utilities for incremental batch processing: derive output and
// report paths from a source document and decide whether work is already done.

use std::path::{Path, PathBuf};

/// Document stem with the `.form.json` suffix removed.
fn document_stem(source_path: &Path) -> String {
    let name = source_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown");
    name.strip_suffix(".form.json").unwrap_or(name).to_string()
}

/// Generate the filled-document output path for a source document:
/// `visit.form.json` becomes `visit_filled.form.json` in the same directory.
pub fn generate_output_path(source_path: &Path) -> PathBuf {
    let mut output_path = source_path.to_path_buf();
    output_path.set_file_name(format!("{}_filled.form.json", document_stem(source_path)));
    output_path
}

/// Generate the markdown report path for a source document:
/// `visit.form.json` becomes `visit_report.md` in the same directory.
pub fn generate_report_path(source_path: &Path) -> PathBuf {
    let mut report_path = source_path.to_path_buf();
    report_path.set_file_name(format!("{}_report.md", document_stem(source_path)));
    report_path
}

/// Check whether the filled output already exists for a source document.
pub fn output_exists<P: AsRef<Path>>(source_path: P) -> bool {
    generate_output_path(source_path.as_ref()).exists()
}

/// Decide whether a document needs processing: an existing output skips the
/// document unless `overwrite_all` forces a rerun.
pub fn should_process_document<P: AsRef<Path>>(source_path: P, overwrite_all: bool) -> bool {
    if overwrite_all {
        return true;
    }
    !output_exists(source_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_path_generation() {
        let output = generate_output_path(Path::new("forms/visit.form.json"));
        assert_eq!(output, PathBuf::from("forms/visit_filled.form.json"));
    }

    #[test]
    fn test_report_path_generation() {
        let report = generate_report_path(Path::new("forms/visit.form.json"));
        assert_eq!(report, PathBuf::from("forms/visit_report.md"));
    }

    #[test]
    fn test_paths_for_unconventional_names() {
        let output = generate_output_path(Path::new("notes.json"));
        assert_eq!(output, PathBuf::from("notes.json_filled.form.json"));
    }

    #[test]
    fn test_should_process_respects_existing_output() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("visit.form.json");
        std::fs::write(&source, "{}").unwrap();

        assert!(should_process_document(&source, false));

        let output = generate_output_path(&source);
        std::fs::write(&output, "{}").unwrap();

        assert!(!should_process_document(&source, false));
        assert!(should_process_document(&source, true));
    }
}
