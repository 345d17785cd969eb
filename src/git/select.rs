//! File selection: decides which files of a checkout are worth indexing.
//!
//! A file is kept when it is not on the ignore list, its extension is not a
//! known binary format, its extension is on the configured allow-list (or it is
//! one of the extensionless convention files such as `README`), and it is at
//! most 1 MiB. Ignored directories are pruned during the walk so their
//! subtrees are never visited.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::models::FileStats;

/// Files larger than this are never indexed.
pub const MAX_FILE_SIZE_BYTES: u64 = 1024 * 1024;

const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    "__pycache__",
    ".pytest_cache",
    "venv",
    "env",
    ".env",
    "ENV",
    "build",
    "dist",
    "target",
    "out",
    ".next",
    ".nuxt",
    ".vscode",
    ".idea",
    "coverage",
    ".coverage",
    "htmlcov",
    ".tox",
    ".mypy_cache",
    "vendor",
    "logs",
    "tmp",
    "temp",
    ".tmp",
    ".DS_Store",
];

const IGNORED_FILES: &[&str] = &[
    ".gitignore",
    ".dockerignore",
    ".env",
    ".env.example",
    "package-lock.json",
    "yarn.lock",
    "poetry.lock",
    "Cargo.lock",
    "Gemfile.lock",
    "composer.lock",
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
];

const BINARY_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".pdf", ".zip", ".tar", ".gz", ".rar",
    ".7z", ".exe", ".dll", ".so", ".dylib", ".a", ".mp3", ".mp4", ".avi", ".mov", ".wmv",
    ".woff", ".woff2", ".ttf", ".eot", ".otf",
];

/// Extensionless files kept regardless of the allow-list (matched upper-cased).
const CONVENTION_FILES: &[&str] = &["README", "LICENSE", "CHANGELOG", "CONTRIBUTING"];

#[derive(Debug, Clone)]
pub struct FileSelector {
    supported_extensions: HashSet<String>,
}

impl FileSelector {
    /// `supported_extensions` are matched case-insensitively and may omit the dot.
    pub fn new<I, S>(supported_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let supported_extensions = supported_extensions
            .into_iter()
            .map(|e| {
                let e = e.as_ref().trim().to_lowercase();
                if e.starts_with('.') {
                    e
                } else {
                    format!(".{e}")
                }
            })
            .collect();
        Self {
            supported_extensions,
        }
    }

    pub fn supported_extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.supported_extensions.iter().cloned().collect();
        exts.sort();
        exts
    }

    /// Whether a file should be indexed. Never fails: an unreadable file is
    /// simply excluded. Symlinks are never included, whatever they point at.
    pub fn is_included(&self, path: &Path) -> bool {
        let name = file_name(path);
        if IGNORED_FILES.contains(&name.as_str()) {
            return false;
        }

        let ext = lowercase_suffix(path);
        if BINARY_EXTENSIONS.contains(&ext.as_str()) {
            return false;
        }

        if !self.supported_extensions.contains(&ext)
            && !CONVENTION_FILES.contains(&name.to_uppercase().as_str())
        {
            return false;
        }

        match std::fs::symlink_metadata(path) {
            Ok(meta) => meta.file_type().is_file() && meta.len() <= MAX_FILE_SIZE_BYTES,
            Err(_) => false,
        }
    }

    /// Whether the walk should descend into this directory.
    pub fn is_included_directory(&self, path: &Path) -> bool {
        !IGNORED_DIRS.contains(&file_name(path).as_str())
    }

    /// All included files under `root`, sorted by path.
    pub fn list_included_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !self.is_pruned(e))
            .filter_map(|e| e.ok())
            .filter(|e| !e.file_type().is_dir())
            .map(DirEntry::into_path)
            .filter(|p| self.is_included(p))
            .collect();

        files.sort();
        files
    }

    /// Counts of what a checkout contains versus what would be indexed.
    pub fn file_stats(&self, root: &Path) -> FileStats {
        let total_files = WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .count();

        let processable = self.list_included_files(root);

        let mut extension_counts = BTreeMap::new();
        let mut total_bytes = 0u64;
        for path in &processable {
            let ext = lowercase_suffix(path);
            let key = if ext.is_empty() {
                "no_extension".to_string()
            } else {
                ext
            };
            *extension_counts.entry(key).or_insert(0) += 1;
            total_bytes += std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        }

        FileStats {
            total_files,
            processable_files: processable.len(),
            total_size_mb: super::round_mb(total_bytes),
            extension_counts,
            supported_extensions: self.supported_extensions(),
        }
    }

    fn is_pruned(&self, entry: &DirEntry) -> bool {
        // The walk root is always visited, whatever it is called.
        entry.depth() > 0 && entry.file_type().is_dir() && !self.is_included_directory(entry.path())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// `.ext` in lowercase, or empty when the file has no extension.
/// Dotfiles such as `.bashrc` have no extension.
fn lowercase_suffix(path: &Path) -> String {
    match path.extension() {
        Some(ext) if !ext.is_empty() => format!(".{}", ext.to_string_lossy().to_lowercase()),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_extensions;
    use crate::config::DEFAULT_SUPPORTED_EXTENSIONS;
    use std::fs;

    fn selector() -> FileSelector {
        FileSelector::new(parse_extensions(DEFAULT_SUPPORTED_EXTENSIONS))
    }

    fn write(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_supported_extension_included() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "main.py", b"print('hi')");
        assert!(selector().is_included(&path));
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "Main.PY", b"print('hi')");
        assert!(selector().is_included(&path));
    }

    #[test]
    fn test_unsupported_extension_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "notes.docx", b"...");
        assert!(!selector().is_included(&path));
    }

    #[test]
    fn test_ignored_file_names_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let lock = write(dir.path(), "package-lock.json", b"{}");
        let cargo_lock = write(dir.path(), "Cargo.lock", b"");
        assert!(!selector().is_included(&lock));
        assert!(!selector().is_included(&cargo_lock));
    }

    #[test]
    fn test_binary_extension_excluded_even_if_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "logo.svg", b"<svg/>");
        let selector = FileSelector::new([".svg", ".py"]);
        assert!(!selector.is_included(&path));
    }

    #[test]
    fn test_convention_files_without_extension_included() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["README", "LICENSE", "Changelog", "contributing"] {
            let path = write(dir.path(), name, b"text");
            assert!(selector().is_included(&path), "{name}");
        }
        let other = write(dir.path(), "Makefile", b"all:");
        assert!(!selector().is_included(&other));
    }

    #[test]
    fn test_large_file_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let big = vec![b'a'; (MAX_FILE_SIZE_BYTES + 1) as usize];
        let path = write(dir.path(), "big.txt", &big);
        assert!(!selector().is_included(&path));

        let exact = vec![b'a'; MAX_FILE_SIZE_BYTES as usize];
        let path = write(dir.path(), "exact.txt", &exact);
        assert!(selector().is_included(&path));
    }

    #[test]
    fn test_missing_file_excluded_not_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!selector().is_included(&dir.path().join("ghost.py")));
    }

    #[test]
    fn test_ignored_directories() {
        let s = selector();
        assert!(!s.is_included_directory(Path::new("repo/.git")));
        assert!(!s.is_included_directory(Path::new("repo/node_modules")));
        assert!(s.is_included_directory(Path::new("repo/src")));
    }

    #[test]
    fn test_list_prunes_ignored_dirs_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "src/b.rs", b"fn b() {}");
        write(root, "src/a.rs", b"fn a() {}");
        write(root, "README.md", b"# readme");
        write(root, "node_modules/pkg/index.js", b"module.exports = 1");
        write(root, ".git/config", b"[core]");
        write(root, "target/debug/out.rs", b"fn x() {}");
        write(root, "image.png", b"\x89PNG");

        let files = selector().list_included_files(root);
        let rel: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(rel, vec!["README.md", "src/a.rs", "src/b.rs"]);
    }

    #[test]
    fn test_list_does_not_prune_root_with_ignored_name() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("build");
        write(&root, "main.go", b"package main");
        let files = selector().list_included_files(&root);
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_file_stats() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "a.py", b"x = 1");
        write(root, "b.py", b"y = 2");
        write(root, "LICENSE", b"MIT");
        write(root, "logo.png", b"\x89PNG");

        let stats = selector().file_stats(root);
        assert_eq!(stats.total_files, 4);
        assert_eq!(stats.processable_files, 3);
        assert_eq!(stats.extension_counts.get(".py"), Some(&2));
        assert_eq!(stats.extension_counts.get("no_extension"), Some(&1));
        assert!(stats.supported_extensions.contains(&".py".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_never_included() {
        let dir = tempfile::tempdir().unwrap();
        let outside = write(dir.path(), "outside/secrets.txt", b"OPENAI_API_KEY=sk-leaked");
        let root = dir.path().join("repo");
        write(&root, "main.py", b"print('hi')");
        std::os::unix::fs::symlink(&outside, root.join("notes.txt")).unwrap();
        std::os::unix::fs::symlink("../outside", root.join("linked")).unwrap();
        std::os::unix::fs::symlink("main.py", root.join("alias.py")).unwrap();

        let s = selector();
        assert!(!s.is_included(&root.join("notes.txt")));
        assert!(!s.is_included(&root.join("alias.py")));

        let files = s.list_included_files(&root);
        assert_eq!(files, vec![root.join("main.py")]);
    }
}
