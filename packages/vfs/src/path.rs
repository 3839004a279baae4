//! Normalized absolute paths inside a backing.

use std::fmt;

/// Errors related to path parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The key or path string was empty.
    #[error("empty path")]
    Empty,

    /// A component between two separators was empty (`a//b`, trailing `/`).
    #[error("empty component at position {position} in '{path}'")]
    EmptyComponent { path: String, position: usize },

    /// `.` and `..` would make the key mapping non-injective.
    #[error("reserved component '{component}' in '{path}'")]
    ReservedComponent { path: String, component: String },
}

/// An absolute path in a backing.
///
/// Keys map to paths by one injective rule: prefix the key with the root
/// separator. `pkg/Main` becomes `/pkg/Main`, `META-INF/MANIFEST.MF` becomes
/// `/META-INF/MANIFEST.MF`. Unlike a shell path nothing is resolved, so two
/// distinct keys never share a path.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct VfsPath {
    components: Vec<String>,
}

impl VfsPath {
    /// The root directory.
    pub fn root() -> Self {
        Self::default()
    }

    /// Map an entry key to its canonical path.
    ///
    /// ```rust
    /// use classfs_vfs::VfsPath;
    ///
    /// let p = VfsPath::from_key("com/example/Widget").unwrap();
    /// assert_eq!(p.to_string(), "/com/example/Widget");
    ///
    /// assert!(VfsPath::from_key("").is_err());
    /// assert!(VfsPath::from_key("a//b").is_err());
    /// assert!(VfsPath::from_key("../escape").is_err());
    /// ```
    pub fn from_key(key: &str) -> Result<Self, PathError> {
        if key.is_empty() {
            return Err(PathError::Empty);
        }

        let mut components = Vec::new();
        for (position, component) in key.split('/').enumerate() {
            Self::validate_component(key, component, position)?;
            components.push(component.to_string());
        }

        Ok(Self { components })
    }

    /// Parse an absolute path string as produced by `Display`.
    ///
    /// A single leading `/` is accepted and stripped; the remainder must be a
    /// valid key. `"/"` parses to the root.
    pub fn parse(s: &str) -> Result<Self, PathError> {
        match s.strip_prefix('/').unwrap_or(s) {
            "" => Ok(Self::root()),
            rest => Self::from_key(rest),
        }
    }

    fn validate_component(path: &str, component: &str, position: usize) -> Result<(), PathError> {
        if component.is_empty() {
            return Err(PathError::EmptyComponent {
                path: path.to_string(),
                position,
            });
        }
        if component == "." || component == ".." {
            return Err(PathError::ReservedComponent {
                path: path.to_string(),
                component: component.to_string(),
            });
        }
        Ok(())
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Path components, root first.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Same as [`is_root`](Self::is_root).
    pub fn is_empty(&self) -> bool {
        self.is_root()
    }

    /// The last component, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// The containing directory. The root has no parent.
    pub fn parent(&self) -> Option<VfsPath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    /// Every proper ancestor except the root, outermost first.
    ///
    /// `/a/b/c` yields `/a` then `/a/b`.
    pub fn ancestors(&self) -> impl Iterator<Item = VfsPath> + '_ {
        (1..self.components.len()).map(move |end| Self {
            components: self.components[..end].to_vec(),
        })
    }

    /// Sibling path with `suffix` appended to the last component.
    ///
    /// This is how history slots are addressed: `/pkg/A` with suffix `.hst0`
    /// is `/pkg/A.hst0`.
    #[must_use]
    pub fn with_suffix(&self, suffix: &str) -> VfsPath {
        let mut components = self.components.clone();
        match components.last_mut() {
            Some(last) => last.push_str(suffix),
            None => components.push(suffix.to_string()),
        }
        Self { components }
    }

    /// Check if this path lies under `prefix` (or equals it).
    pub fn has_prefix(&self, prefix: &VfsPath) -> bool {
        prefix.components.len() <= self.components.len()
            && prefix.components == self.components[..prefix.components.len()]
    }

    /// The key this path was built from (the path without its root separator).
    pub fn key(&self) -> String {
        self.components.join("/")
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.components.join("/"))
    }
}
