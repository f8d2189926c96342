use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::corpus::is_ignored_name;
use crate::model::VariantTag;

/// Maps a checked-out tree to a technology variant. Never fails.
pub trait VariantClassifier: Send + Sync {
    fn classify(&self, root: &Path) -> VariantTag;
}

/// Classifier driven by well-known marker files.
///
/// Checks, in order: `pubspec.yaml` (flutter), a `package.json` depending on
/// `react-native`, a `*.csproj` mentioning Xamarin, `app/build.gradle(.kts)`
/// (android), and a `*.xcodeproj` bundle (ios).
#[derive(Debug, Clone)]
pub struct FileTreeClassifier {
    /// How deep to look for `*.csproj` files and `*.xcodeproj` bundles.
    pub search_depth: usize,
}

impl Default for FileTreeClassifier {
    fn default() -> Self {
        Self { search_depth: 3 }
    }
}

impl VariantClassifier for FileTreeClassifier {
    fn classify(&self, root: &Path) -> VariantTag {
        let tag = if root.join("pubspec.yaml").is_file() {
            "flutter"
        } else if depends_on_react_native(&root.join("package.json")) {
            "react-native"
        } else if self.has_xamarin_project(root) {
            "xamarin"
        } else if root.join("app/build.gradle").is_file()
            || root.join("app/build.gradle.kts").is_file()
        {
            "android"
        } else if self.has_xcode_project(root) {
            "ios"
        } else {
            VariantTag::UNKNOWN
        };
        debug!(root = %root.display(), variant = tag, "classified tree");
        VariantTag::new(tag)
    }
}

impl FileTreeClassifier {
    fn walk<'a>(&self, root: &'a Path) -> impl Iterator<Item = walkdir::DirEntry> + 'a {
        WalkDir::new(root)
            .max_depth(self.search_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !(e.file_type().is_dir()
                        && is_ignored_name(&e.file_name().to_string_lossy()))
            })
            .filter_map(Result::ok)
    }

    fn has_xamarin_project(&self, root: &Path) -> bool {
        self.walk(root)
            .filter(|e| e.file_type().is_file() && has_extension(e.path(), "csproj"))
            .any(|e| {
                fs::read_to_string(e.path()).map(|text| text.contains("Xamarin")).unwrap_or(false)
            })
    }

    fn has_xcode_project(&self, root: &Path) -> bool {
        self.walk(root).any(|e| e.file_type().is_dir() && has_extension(e.path(), "xcodeproj"))
    }
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case(wanted))
}

fn depends_on_react_native(manifest: &Path) -> bool {
    let Ok(text) = fs::read_to_string(manifest) else {
        return false;
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => ["dependencies", "devDependencies", "peerDependencies"]
            .iter()
            .any(|section| json.get(section).and_then(|deps| deps.get("react-native")).is_some()),
        Err(_) => text.contains("\"react-native\""),
    }
}
