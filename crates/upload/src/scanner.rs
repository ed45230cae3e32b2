//! Input adapters that turn local paths into [`FileSource`]s.
//!
//! A scanned folder behaves like a folder drop: every relative path starts
//! with the folder's own name and uses `/` as separator, even on Windows.
//! Content is left on disk and read when the transfer starts.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::UploadError;
use crate::types::{FileContent, FileSource};

/// Recursively scans `dir` and returns one source per regular file.
///
/// Entries are visited in name order so a scan always queues files the same
/// way.
pub fn scan_folder(dir: &Path) -> Result<Vec<FileSource>, UploadError> {
    let dir = dir.canonicalize()?;
    let root_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut files = Vec::new();
    walk_dir(&dir, &dir, &root_name, &mut files)?;

    debug!(dir = %dir.display(), files = files.len(), "scanned folder");
    Ok(files)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    root_name: &str,
    files: &mut Vec<FileSource>,
) -> Result<(), UploadError> {
    let mut entries = std::fs::read_dir(current)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let metadata = entry.metadata()?;

        if metadata.is_dir() {
            walk_dir(root, &path, root_name, files)?;
        } else if metadata.is_file() {
            let rel_path = path.strip_prefix(root).map_err(std::io::Error::other)?;

            // Normalize to forward slashes.
            let rel_str = rel_path.to_string_lossy().replace('\\', "/");
            let relative_path = if root_name.is_empty() {
                rel_str
            } else {
                format!("{root_name}/{rel_str}")
            };

            files.push(FileSource {
                name: entry.file_name().to_string_lossy().into_owned(),
                relative_path,
                size_bytes: metadata.len(),
                content: FileContent::Disk(path),
            });
        }
    }

    Ok(())
}

/// Source for one individually picked file (empty relative path).
pub fn file_source(path: &Path) -> Result<FileSource, UploadError> {
    let metadata = std::fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(UploadError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} is not a file", path.display()),
        )));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(FileSource {
        name,
        relative_path: String::new(),
        size_bytes: metadata.len(),
        content: FileContent::Disk(path.to_path_buf()),
    })
}

/// Expands a mixed list of files and folders, preserving argument order.
pub fn collect_sources(paths: &[PathBuf]) -> Result<Vec<FileSource>, UploadError> {
    let mut sources = Vec::new();
    for path in paths {
        if path.is_dir() {
            sources.extend(scan_folder(path)?);
        } else {
            sources.push(file_source(path)?);
        }
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// `<tmp>/reports/{q1.pdf, notes.txt, archive/2023/q4.pdf}`
    fn create_test_tree() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("reports");

        fs::create_dir_all(root.join("archive").join("2023")).unwrap();
        fs::write(root.join("q1.pdf"), b"PDF-Q1").unwrap();
        fs::write(root.join("notes.txt"), b"NOTES").unwrap();
        fs::write(
            root.join("archive").join("2023").join("q4.pdf"),
            b"PDF-Q4-2023",
        )
        .unwrap();

        (dir, root)
    }

    #[test]
    fn scan_prefixes_folder_name() {
        let (_dir, root) = create_test_tree();
        let files = scan_folder(&root).unwrap();

        let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "reports/archive/2023/q4.pdf",
                "reports/notes.txt",
                "reports/q1.pdf"
            ]
        );
        assert!(files.iter().all(|f| f.root_directory() == "reports"));
    }

    #[test]
    fn scan_records_names_and_sizes() {
        let (_dir, root) = create_test_tree();
        let files = scan_folder(&root).unwrap();

        let q4 = &files[0];
        assert_eq!(q4.name, "q4.pdf");
        assert_eq!(q4.size_bytes, b"PDF-Q4-2023".len() as u64);
        assert_eq!(q4.key().as_str(), "reports/archive/2023/q4.pdf");
    }

    #[tokio::test]
    async fn scanned_content_reads_from_disk() {
        let (_dir, root) = create_test_tree();
        let files = scan_folder(&root).unwrap();
        let q1 = files.iter().find(|f| f.name == "q1.pdf").unwrap();
        assert_eq!(q1.content.read().await.unwrap(), b"PDF-Q1");
    }

    #[test]
    fn scan_empty_dir() {
        let dir = TempDir::new().unwrap();
        assert!(scan_folder(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn scan_nonexistent_dir() {
        let result = scan_folder(Path::new("/nonexistent/path/that/does/not/exist"));
        assert!(matches!(result, Err(UploadError::Io(_))));
    }

    #[test]
    fn single_file_has_no_relative_path() {
        let (_dir, root) = create_test_tree();
        let file = file_source(&root.join("notes.txt")).unwrap();

        assert_eq!(file.name, "notes.txt");
        assert!(file.relative_path.is_empty());
        assert_eq!(file.key().as_str(), "notes.txt");
        assert_eq!(file.root_directory(), "root");
        assert_eq!(file.size_bytes, 5);
    }

    #[test]
    fn file_source_rejects_directory() {
        let (_dir, root) = create_test_tree();
        assert!(file_source(&root).is_err());
    }

    #[test]
    fn collect_mixes_files_and_folders() {
        let (dir, root) = create_test_tree();
        let loose = dir.path().join("memo.txt");
        fs::write(&loose, b"MEMO").unwrap();

        let sources = collect_sources(&[loose, root]).unwrap();

        let keys: Vec<String> = sources.iter().map(|s| s.key().to_string()).collect();
        assert_eq!(
            keys,
            [
                "memo.txt",
                "reports/archive/2023/q4.pdf",
                "reports/notes.txt",
                "reports/q1.pdf"
            ]
        );
    }
}
