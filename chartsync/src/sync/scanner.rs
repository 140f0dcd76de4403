use std::cmp::Ordering;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

pub const CHART_EXTENSIONS: &[&str] = &[".tja"];
pub const AUDIO_EXTENSIONS: &[&str] = &[".ogg"];

pub const KNOWN_CATEGORIES: &[&str] = &[
    "01 Pop",
    "02 Anime",
    "03 Vocaloid",
    "04 Children and Folk",
    "05 Variety",
    "06 Classical",
    "07 Game Music",
    "08 Live Festival Mode",
    "09 Namco Original",
    "10 Taiko Towers",
    "11 Dan Dojo",
];

static NUMBERED_CATEGORY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{2}\s").expect("category pattern is valid")
});

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("catalog root {0} does not exist or is not a directory")]
    RootMissing(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub category: String,
    pub name: String,
    pub dir: PathBuf,
    pub chart: Option<PathBuf>,
    pub audio: Option<PathBuf>,
}

impl Candidate {
    pub fn key(&self) -> String {
        song_key(&self.category, &self.name)
    }
}

pub fn song_key(category: &str, name: &str) -> String {
    format!("{category}/{name}")
}

pub fn is_valid_category(name: &str) -> bool {
    NUMBERED_CATEGORY.is_match(name) || KNOWN_CATEGORIES.contains(&name)
}

/// Digits first, then ASCII letters, then everything else.
fn name_class(name: &str) -> u8 {
    match name.chars().next() {
        Some(c) if c.is_ascii_digit() => 0,
        Some(c) if c.is_ascii_alphabetic() => 1,
        _ => 2,
    }
}

pub fn compare_song_names(a: &str, b: &str) -> Ordering {
    name_class(a).cmp(&name_class(b)).then_with(|| a.cmp(b))
}

pub fn scan_catalog(root: &Path) -> Result<Vec<Candidate>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::RootMissing(root.to_path_buf()));
    }

    let mut categories = list_dir_names(root, |path| path.is_dir())?
        .into_iter()
        .filter(|name| !name.starts_with('.') && is_valid_category(name))
        .collect::<Vec<_>>();
    categories.sort();

    if categories.is_empty() {
        tracing::warn!(root = %root.display(), "no valid category directories under catalog root");
    }

    let mut candidates = Vec::new();
    for category in categories {
        let category_dir = root.join(&category);
        let mut songs = list_dir_names(&category_dir, |path| path.is_dir())?;
        songs.sort_by(|a, b| compare_song_names(a, b));
        tracing::debug!(category = %category, songs = songs.len(), "scanned category");

        for name in songs {
            let dir = category_dir.join(&name);
            let chart = find_first_with_ext(&dir, CHART_EXTENSIONS);
            let audio = find_first_with_ext(&dir, AUDIO_EXTENSIONS);
            candidates.push(Candidate {
                category: category.clone(),
                name,
                dir,
                chart,
                audio,
            });
        }
    }
    Ok(candidates)
}

pub fn find_first_with_ext(dir: &Path, exts: &[&str]) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries.flatten().map(|entry| entry.path()).find(|path| {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let lower = name.to_lowercase();
        path.is_file() && exts.iter().any(|ext| lower.ends_with(ext))
    })
}

fn list_dir_names(
    dir: &Path,
    keep: impl Fn(&Path) -> bool,
) -> Result<Vec<String>, ScanError> {
    let io_err = |source: io::Error| ScanError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        if !keep(&path) {
            continue;
        }
        // Non UTF-8 names cannot form a key the server understands.
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}
