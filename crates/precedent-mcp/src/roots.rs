// precedent-mcp/src/roots.rs
// ============================================================================
// Module: Roots & Project Inference
// Description: Session-scoped roots caching and project name derivation.
// Purpose: Scope reads and writes to the caller's working repository.
// Dependencies: git2, url
// ============================================================================

//! ## Overview
//! On `trace` and on repository-filter resolution the server asks the MCP
//! client for its filesystem roots (bounded by a three-second timeout) and
//! caches the answer per session, empty answers included, so a client that
//! does not support roots is asked exactly once. The first `file://` root
//! yields a project name: the basename of the `origin` remote for git
//! working trees, otherwise the directory basename; filesystem roots
//! resolve to nothing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use url::Url;

// ============================================================================
// SECTION: Roots Client
// ============================================================================

/// Transport-side capability to request `roots/list` from the client.
///
/// Implementations bound the request to three seconds and return `None`
/// when the client does not answer in time or does not support roots.
pub trait RootsClient: Send + Sync {
    /// Requests the client's roots as URI strings.
    fn list_roots(&self) -> Option<Vec<String>>;
}

/// Roots client for transports that cannot call back into the client.
pub struct NoopRootsClient;

impl RootsClient for NoopRootsClient {
    fn list_roots(&self) -> Option<Vec<String>> {
        None
    }
}

// ============================================================================
// SECTION: Roots Cache
// ============================================================================

/// Per-session cache of inferred project names.
///
/// Empty results are cached too, memoizing "not supported".
pub struct RootsCache {
    /// Inferred project per session id.
    entries: RwLock<HashMap<String, Option<String>>>,
}

impl Default for RootsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RootsCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the cached inference for a session, when one exists.
    #[must_use]
    pub fn get(&self, session_id: &str) -> Option<Option<String>> {
        self.entries.read().ok()?.get(session_id).cloned()
    }

    /// Stores an inference for a session.
    pub fn put(&self, session_id: &str, project: Option<String>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(session_id.to_string(), project);
        }
    }

    /// Resolves the project for a session, asking the client on a miss.
    #[must_use]
    pub fn resolve(&self, session_id: &str, client: &dyn RootsClient) -> Option<String> {
        if let Some(cached) = self.get(session_id) {
            return cached;
        }
        let project = client.list_roots().and_then(|roots| infer_project(&roots));
        self.put(session_id, project.clone());
        project
    }
}

// ============================================================================
// SECTION: Project Inference
// ============================================================================

/// Derives a project name from the first `file://` root.
#[must_use]
pub fn infer_project(roots: &[String]) -> Option<String> {
    let path = roots.iter().find_map(|root| {
        let url = Url::parse(root).ok()?;
        (url.scheme() == "file").then(|| url.to_file_path().ok())?
    })?;
    project_from_path(&path)
}

/// Derives a project name from a filesystem path.
#[must_use]
pub fn project_from_path(path: &Path) -> Option<String> {
    if let Some(project) = git_origin_basename(path) {
        return Some(project);
    }
    path.file_name().map(|name| name.to_string_lossy().into_owned()).filter(|name| !name.is_empty())
}

/// Returns the basename of the `origin` remote for a git working tree.
fn git_origin_basename(path: &Path) -> Option<String> {
    let repo = git2::Repository::discover(path).ok()?;
    let remote = repo.find_remote("origin").ok()?;
    let url = remote.url()?;
    let trimmed = url.trim_end_matches('/');
    let basename = trimmed.rsplit(['/', ':']).next()?;
    let name = basename.strip_suffix(".git").unwrap_or(basename);
    (!name.is_empty()).then(|| name.to_string())
}

/// Resolves the repository filter for read tools.
///
/// Precedence: explicit value, `*` disables, inferred project, none.
#[must_use]
pub fn resolve_repo_filter(
    explicit: Option<&str>,
    cache: &RootsCache,
    session_id: &str,
    client: &dyn RootsClient,
) -> Option<String> {
    match explicit {
        Some("*") => None,
        Some(repo) if !repo.trim().is_empty() => Some(repo.to_string()),
        _ => cache.resolve(session_id, client),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::NoopRootsClient;
    use super::RootsCache;
    use super::RootsClient;
    use super::infer_project;
    use super::project_from_path;
    use super::resolve_repo_filter;

    struct FixedRoots(Vec<String>);

    impl RootsClient for FixedRoots {
        fn list_roots(&self) -> Option<Vec<String>> {
            Some(self.0.clone())
        }
    }

    #[test]
    fn plain_directories_use_their_basename() {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = project_from_path(dir.path());
        let expected = dir.path().file_name().map(|name| name.to_string_lossy().into_owned());
        assert_eq!(project, expected);
    }

    #[test]
    fn filesystem_root_resolves_to_nothing() {
        assert_eq!(project_from_path(Path::new("/")), None);
    }

    #[test]
    fn non_file_roots_are_ignored() {
        assert_eq!(infer_project(&["https://example.com/repo".to_string()]), None);
        assert_eq!(infer_project(&[]), None);
    }

    #[test]
    fn empty_results_are_cached_once() {
        let cache = RootsCache::new();
        assert_eq!(cache.resolve("session-1", &NoopRootsClient), None);
        // A second resolution must hit the cache, not the client.
        assert_eq!(cache.get("session-1"), Some(None));
    }

    #[test]
    fn explicit_repo_beats_inference_and_star_disables() {
        let cache = RootsCache::new();
        let dir = tempfile::tempdir().expect("tempdir");
        let client = FixedRoots(vec![format!("file://{}", dir.path().display())]);
        assert_eq!(
            resolve_repo_filter(Some("explicit"), &cache, "s", &client).as_deref(),
            Some("explicit")
        );
        assert_eq!(resolve_repo_filter(Some("*"), &cache, "s", &client), None);
        let inferred = resolve_repo_filter(None, &cache, "s", &client);
        assert_eq!(
            inferred,
            dir.path().file_name().map(|name| name.to_string_lossy().into_owned())
        );
    }
}
