use anyhow::Result;
use futures::stream::{Stream, StreamExt};
use glob::glob;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Suffix of filled output documents; discovery must never feed these back
/// into processing.
const FILLED_SUFFIX: &str = "_filled.form.json";

/// Configuration for document discovery behavior
#[derive(Debug, Clone, Default)]
pub struct DiscoveryConfig {
    /// Whether to fail fast on first error or continue processing
    pub fail_fast: bool,
}

/// Result of document discovery validation
#[derive(Debug, Clone)]
pub struct FileValidation {
    pub path: PathBuf,
    pub error: Option<String>,
}

/// Discovers all documents matching `**/*.form.json` recursively under the
/// given root directory, excluding previously written `*_filled.form.json`
/// outputs. Returns an async stream of validated paths.
pub fn discover_documents(
    root_dir: impl AsRef<Path>,
    config: DiscoveryConfig,
) -> impl Stream<Item = Result<FileValidation>> {
    let root_path = root_dir.as_ref().to_path_buf();

    futures::stream::unfold(
        DiscoveryState::new(root_path, config),
        |mut state| async move { state.next_document().await.map(|result| (result, state)) },
    )
}

/// Internal state for document discovery iteration
struct DiscoveryState {
    root_dir: PathBuf,
    config: DiscoveryConfig,
    glob_iter: Option<glob::Paths>,
}

impl DiscoveryState {
    fn new(root_dir: PathBuf, config: DiscoveryConfig) -> Self {
        Self {
            root_dir,
            config,
            glob_iter: None,
        }
    }

    async fn next_document(&mut self) -> Option<Result<FileValidation>> {
        if self.glob_iter.is_none() {
            let pattern = format!("{}/**/*.form.json", self.root_dir.display());
            debug!("Starting document discovery with pattern: {}", pattern);

            match glob(&pattern) {
                Ok(paths) => {
                    self.glob_iter = Some(paths);
                    info!("Document discovery initialized for root: {}", self.root_dir.display());
                }
                Err(e) => {
                    return Some(Err(anyhow::anyhow!("Failed to create glob pattern: {}", e)));
                }
            }
        }

        let glob_iter = self.glob_iter.as_mut()?;
        loop {
            match glob_iter.next() {
                Some(Ok(path)) => {
                    if is_filled_output(&path) {
                        debug!("Skipping filled output: {}", path.display());
                        continue;
                    }
                    debug!("Found document: {}", path.display());
                    return Some(self.validate_document(path).await);
                }
                Some(Err(e)) => {
                    let error_msg = format!("Glob iteration error: {e}");
                    warn!("{}", error_msg);

                    if self.config.fail_fast {
                        return Some(Err(anyhow::anyhow!(error_msg)));
                    }
                    // non-fatal glob errors: continue to the next entry
                }
                None => {
                    info!("Document discovery completed");
                    return None;
                }
            }
        }
    }

    async fn validate_document(&self, path: PathBuf) -> Result<FileValidation> {
        debug!("Validating document: {}", path.display());

        match fs::metadata(&path).await {
            Ok(metadata) => {
                if !metadata.is_file() {
                    let error = format!("Path is not a file: {}", path.display());
                    warn!("{}", error);
                    return Ok(FileValidation { path, error: Some(error) });
                }
            }
            Err(e) => {
                let error = format!("Cannot access document {}: {}", path.display(), e);
                warn!("{}", error);

                if self.config.fail_fast {
                    return Err(anyhow::anyhow!(error));
                }
                return Ok(FileValidation { path, error: Some(error) });
            }
        }

        // JSON validation happens naturally when the document is loaded
        Ok(FileValidation { path, error: None })
    }
}

fn is_filled_output(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(FILLED_SUFFIX))
}

/// Collect all discovered documents into a Vec for easier processing
pub async fn collect_discovered_documents(
    root_dir: impl AsRef<Path>,
    config: DiscoveryConfig,
) -> Result<Vec<FileValidation>> {
    let mut documents = Vec::new();
    let mut stream = Box::pin(discover_documents(root_dir, config));

    while let Some(result) = stream.next().await {
        documents.push(result?);
    }

    info!("Discovered {} document(s) total", documents.len());
    let valid_count = documents.iter().filter(|f| f.error.is_none()).count();
    let invalid_count = documents.len() - valid_count;

    if invalid_count > 0 {
        warn!("Found {} document(s) with validation issues", invalid_count);
    }

    info!("Document discovery summary: {} valid, {} invalid", valid_count, invalid_count);

    Ok(documents)
}

/// Convenience function returning only valid document paths
pub async fn find_form_documents<P: AsRef<Path>>(root_dir: P) -> Result<Vec<PathBuf>> {
    let config = DiscoveryConfig::default();
    let validations = collect_discovered_documents(root_dir, config).await?;

    Ok(validations
        .into_iter()
        .filter(|v| v.error.is_none())
        .map(|v| v.path)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_file(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
        let file_path = dir.join(name);
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file_path, content).await?;
        Ok(file_path)
    }

    #[tokio::test]
    async fn test_discover_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let config = DiscoveryConfig::default();

        let documents = collect_discovered_documents(temp_dir.path(), config).await.unwrap();
        assert_eq!(documents.len(), 0);
    }

    #[tokio::test]
    async fn test_discover_matching_documents() {
        let temp_dir = TempDir::new().unwrap();
        let config = DiscoveryConfig::default();

        create_test_file(temp_dir.path(), "consent.form.json", "{}").await.unwrap();
        create_test_file(temp_dir.path(), "nested/visit.form.json", "{}").await.unwrap();
        create_test_file(temp_dir.path(), "notes.json", "{}").await.unwrap();
        create_test_file(temp_dir.path(), "readme.txt", "nope").await.unwrap();

        let documents = collect_discovered_documents(temp_dir.path(), config).await.unwrap();
        assert_eq!(documents.len(), 2);
        assert!(documents.iter().all(|d| d.error.is_none()));

        let names: Vec<String> = documents
            .iter()
            .map(|d| d.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert!(names.contains(&"consent.form.json".to_string()));
        assert!(names.contains(&"visit.form.json".to_string()));
    }

    #[tokio::test]
    async fn test_filled_outputs_are_excluded() {
        let temp_dir = TempDir::new().unwrap();
        let config = DiscoveryConfig::default();

        create_test_file(temp_dir.path(), "consent.form.json", "{}").await.unwrap();
        create_test_file(temp_dir.path(), "consent_filled.form.json", "{}").await.unwrap();

        let documents = collect_discovered_documents(temp_dir.path(), config).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(
            documents[0].path.file_name().unwrap().to_string_lossy(),
            "consent.form.json"
        );
    }

    #[tokio::test]
    async fn test_find_form_documents_returns_paths_only() {
        let temp_dir = TempDir::new().unwrap();

        let created = create_test_file(temp_dir.path(), "a/b.form.json", "{}").await.unwrap();
        let paths = find_form_documents(temp_dir.path()).await.unwrap();
        assert_eq!(paths, vec![created]);
    }
}
