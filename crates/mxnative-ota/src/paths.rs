// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OTA root confinement.
//
// Caller-supplied names (package file, extraction dir, manifest bundle path)
// are always interpreted relative to the OTA root. A leading `/` or `./` is
// tolerated; `..` and drive prefixes are refused.

use std::path::{Component, Path, PathBuf};

use mxnative_core::types::OtaManifest;

/// Name of the OTA root directory inside the platform's app data directory.
pub const OTA_DIR_NAME: &str = "Ota";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaPaths {
    root: PathBuf,
}

impl OtaPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(OtaManifest::FILE_NAME)
    }

    /// Create the OTA root if it does not exist yet.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// Absolute path of `relative` under the root.
    ///
    /// `None` if the path would escape the root or names the root itself.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(relative).components() {
            match component {
                Component::RootDir | Component::CurDir => {}
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::ParentDir | Component::Prefix(_) => return None,
            }
        }
        (depth > 0).then_some(resolved)
    }

    /// `/`-separated path of `absolute` relative to the root.
    pub fn relative(&self, absolute: &Path) -> Option<String> {
        let stripped = absolute.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = stripped
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        (!parts.is_empty()).then(|| parts.join("/"))
    }

    /// Whether `path` is the OTA root itself.
    pub fn is_root(&self, path: &Path) -> bool {
        path == self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> OtaPaths {
        OtaPaths::new("/data/app/Ota")
    }

    #[test]
    fn relative_names_resolve_under_root() {
        let paths = paths();
        assert_eq!(
            paths.resolve("bundle-1"),
            Some(PathBuf::from("/data/app/Ota/bundle-1"))
        );
        assert_eq!(
            paths.resolve("./bundle-1/index.android.bundle"),
            Some(PathBuf::from("/data/app/Ota/bundle-1/index.android.bundle"))
        );
        assert_eq!(
            paths.resolve("/abc.zip"),
            Some(PathBuf::from("/data/app/Ota/abc.zip"))
        );
    }

    #[test]
    fn escapes_and_root_are_refused() {
        let paths = paths();
        assert_eq!(paths.resolve("../outside"), None);
        assert_eq!(paths.resolve("bundle/../../x"), None);
        assert_eq!(paths.resolve(""), None);
        assert_eq!(paths.resolve("./"), None);
        assert_eq!(paths.resolve("/"), None);
    }

    #[test]
    fn relative_round_trip() {
        let paths = paths();
        let abs = paths.resolve("deep/er/index.ios.bundle").expect("resolve");
        assert_eq!(paths.relative(&abs).as_deref(), Some("deep/er/index.ios.bundle"));
        assert_eq!(paths.relative(Path::new("/elsewhere/x")), None);
        assert_eq!(paths.relative(paths.root()), None);
        assert!(paths.is_root(Path::new("/data/app/Ota")));
        assert_eq!(paths.manifest_path(), PathBuf::from("/data/app/Ota/manifest.json"));
    }
}
