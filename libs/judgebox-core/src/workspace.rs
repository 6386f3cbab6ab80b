/// Workspace Manager - per-submission filesystem footprint
///
/// Every submission gets its own directory `<root>/<uuid>/` holding the source
/// file and, for compiled languages, the build artifact. The shared root is
/// created once and never removed; submissions only ever write below their
/// own directory, which is what keeps concurrent requests apart.
///
/// A [`Workspace`] deletes its directory when dropped, so a failed or
/// cancelled request still cleans up after itself.

use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ExecutionError;
use crate::types::{Language, Submission};

const FALLBACK_JAVA_CLASS: &str = "Main";

lazy_static! {
    static ref PUBLIC_CLASS: Regex = Regex::new(
        r"\bpublic\s+(?:(?:final|abstract|strictfp|sealed|non-sealed)\s+)*class\s+([A-Za-z_$][A-Za-z0-9_$]*)"
    )
    .expect("valid public class regex");
    static ref ANY_CLASS: Regex =
        Regex::new(r"\bclass\s+([A-Za-z_$][A-Za-z0-9_$]*)").expect("valid class regex");
}

#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    /// Create the manager, making sure the shared root exists.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ExecutionError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            ExecutionError::InternalError(format!(
                "Failed to create workspace root {}: {}",
                root.display(),
                e
            ))
        })?;
        // Compiled artifacts are launched from inside the workspace, so the path must be absolute
        let root = std::fs::canonicalize(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write the submission's source into a fresh workspace.
    pub async fn materialize(&self, submission: &Submission) -> Result<Workspace, ExecutionError> {
        if submission.source_code.trim().is_empty() {
            return Err(ExecutionError::InvalidInput("Code is required".to_string()));
        }

        let id = Uuid::new_v4();
        let directory = self.root.join(id.to_string());
        let language = submission.language;

        let file_stem = match language {
            Language::Java => extract_java_class_name(&submission.source_code),
            _ => id.to_string(),
        };
        let source_path = directory.join(format!("{}.{}", file_stem, language.source_extension()));
        let artifact_path = match language {
            Language::Cpp => Some(directory.join(executable_name(&id.to_string()))),
            _ => None,
        };

        tokio::fs::create_dir_all(&directory).await.map_err(|e| {
            ExecutionError::InternalError(format!(
                "Failed to create workspace {}: {}",
                directory.display(),
                e
            ))
        })?;

        // Guard exists before the write so a failed write still removes the directory
        let workspace = Workspace {
            id,
            language,
            directory,
            source_path,
            artifact_path,
            cleaned: false,
        };

        tokio::fs::write(&workspace.source_path, submission.source_code.as_bytes())
            .await
            .map_err(|e| {
                ExecutionError::InternalError(format!(
                    "Failed to write source file {}: {}",
                    workspace.source_path.display(),
                    e
                ))
            })?;

        debug!(
            workspace_id = %workspace.id,
            source = %workspace.source_path.display(),
            "Workspace materialized"
        );

        Ok(workspace)
    }
}

/// Isolated filesystem footprint of one submission
#[derive(Debug)]
pub struct Workspace {
    id: Uuid,
    language: Language,
    directory: PathBuf,
    source_path: PathBuf,
    artifact_path: Option<PathBuf>,
    cleaned: bool,
}

impl Workspace {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn artifact_path(&self) -> Option<&Path> {
        self.artifact_path.as_deref()
    }

    /// File name without extension. For Java this is the entry-point class.
    pub fn source_stem(&self) -> String {
        self.source_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| FALLBACK_JAVA_CLASS.to_string())
    }

    pub fn is_cleaned(&self) -> bool {
        self.cleaned
    }

    /// Remove everything this workspace created. Safe to call more than once;
    /// failures are logged and swallowed.
    pub async fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;

        match tokio::fs::remove_dir_all(&self.directory).await {
            Ok(()) => debug!(workspace_id = %self.id, "Workspace cleaned"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                workspace_id = %self.id,
                directory = %self.directory.display(),
                error = %e,
                "Failed to clean workspace"
            ),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }

        let directory = std::mem::take(&mut self.directory);
        let id = self.id;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = tokio::fs::remove_dir_all(&directory).await {
                        if e.kind() != std::io::ErrorKind::NotFound {
                            warn!(workspace_id = %id, error = %e, "Failed to clean dropped workspace");
                        }
                    }
                });
            }
            Err(_) => {
                if let Err(e) = std::fs::remove_dir_all(&directory) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(workspace_id = %id, error = %e, "Failed to clean dropped workspace");
                    }
                }
            }
        }
    }
}

/// Find the class `java` must be pointed at.
///
/// First top-level `public class`, then any top-level `class`, then `Main`.
/// Comments and string literals are blanked out first so they cannot produce
/// a match, and anything inside braces is ignored so nested classes never do.
pub fn extract_java_class_name(source: &str) -> String {
    let code = top_level_only(&strip_comments_and_literals(source));

    PUBLIC_CLASS
        .captures(&code)
        .or_else(|| ANY_CLASS.captures(&code))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| FALLBACK_JAVA_CLASS.to_string())
}

fn strip_comments_and_literals(source: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str,
        Char,
    }

    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                    out.push(' ');
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                    out.push(' ');
                }
                '"' => {
                    state = State::Str;
                    out.push(' ');
                }
                '\'' => {
                    state = State::Char;
                    out.push(' ');
                }
                _ => out.push(c),
            },
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                    out.push('\n');
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                    out.push(' ');
                }
            }
            State::Str | State::Char => {
                let close = if state == State::Str { '"' } else { '\'' };
                if c == '\\' {
                    chars.next();
                } else if c == close {
                    state = State::Code;
                    out.push(' ');
                } else if c == '\n' {
                    // unterminated literal, resync on the next line
                    state = State::Code;
                    out.push('\n');
                }
            }
        }
    }

    out
}

/// Blank out everything nested inside `{ }`. Expects comments and literals
/// to be stripped already, so every brace left is structural.
fn top_level_only(code: &str) -> String {
    let mut depth = 0usize;
    code.chars()
        .map(|c| match c {
            '{' => {
                depth += 1;
                ' '
            }
            '}' => {
                depth = depth.saturating_sub(1);
                ' '
            }
            '\n' => '\n',
            _ if depth > 0 => ' ',
            _ => c,
        })
        .collect()
}

fn executable_name(stem: &str) -> String {
    if cfg!(windows) {
        format!("{}.exe", stem)
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn manager() -> (tempfile::TempDir, WorkspaceManager) {
        let dir = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(dir.path().join("codes")).unwrap();
        (dir, manager)
    }

    fn entries(root: &Path) -> usize {
        std::fs::read_dir(root).unwrap().count()
    }

    #[test]
    fn test_java_public_class() {
        let src = "import java.util.*;\npublic class Solution {\n  public static void main(String[] a) {}\n}";
        assert_eq!(extract_java_class_name(src), "Solution");
    }

    #[test]
    fn test_java_public_class_wins_over_earlier_class() {
        let src = "class Helper {}\npublic final class Entry { }";
        assert_eq!(extract_java_class_name(src), "Entry");
    }

    #[test]
    fn test_java_fallbacks() {
        assert_eq!(extract_java_class_name("class Foo { }"), "Foo");
        assert_eq!(extract_java_class_name("interface X {}"), "Main");
        assert_eq!(extract_java_class_name(""), "Main");
    }

    #[test]
    fn test_java_ignores_comments_and_strings() {
        let src = r#"
// public class Commented {}
/* public class Blocked {} */
public class Real {
    String s = "public class Quoted";
    char c = '"';
    public static class Inner {}
}
"#;
        assert_eq!(extract_java_class_name(src), "Real");
    }

    #[test]
    fn test_java_nested_public_class_is_not_entry_point() {
        let src = "class Main {\n public static class Pair { int a; }\n public static void main(String[] a){System.out.println(1);} }";
        assert_eq!(extract_java_class_name(src), "Main");

        let src = "class Outer {\n  public class Inner {}\n}\nclass Second {}";
        assert_eq!(extract_java_class_name(src), "Outer");
    }

    #[test]
    fn test_java_braces_in_literals_do_not_shift_depth() {
        let src = "class A { String s = \"}}\"; char c = '{'; }\npublic class B { }";
        assert_eq!(extract_java_class_name(src), "B");
    }

    #[test]
    fn test_java_does_not_match_identifier_suffix() {
        assert_eq!(extract_java_class_name("int subclass = 1;\nclass Ok {}"), "Ok");
    }

    #[tokio::test]
    async fn test_materialize_cpp() {
        let (_tmp, manager) = manager();
        let submission = Submission::new(Language::Cpp, "int main() {}", "");

        let mut ws = manager.materialize(&submission).await.unwrap();
        let id = ws.id().to_string();

        assert_eq!(ws.directory(), manager.root().join(&id));
        assert_eq!(ws.source_path(), ws.directory().join(format!("{}.cpp", id)));
        assert_eq!(
            ws.artifact_path().unwrap(),
            ws.directory().join(executable_name(&id))
        );
        assert_eq!(
            std::fs::read_to_string(ws.source_path()).unwrap(),
            "int main() {}"
        );

        ws.cleanup().await;
        assert!(!ws.directory().exists());
        assert!(manager.root().exists());
    }

    #[tokio::test]
    async fn test_materialize_java_uses_class_name() {
        let (_tmp, manager) = manager();
        let submission = Submission::new(Language::Java, "public class Solution { }", "");

        let mut ws = manager.materialize(&submission).await.unwrap();
        assert_eq!(ws.source_path().file_name().unwrap(), "Solution.java");
        assert_eq!(ws.source_stem(), "Solution");
        assert!(ws.artifact_path().is_none());
        ws.cleanup().await;

        let fallback = Submission::new(Language::Java, "interface Nothing {}", "");
        let mut ws = manager.materialize(&fallback).await.unwrap();
        assert_eq!(ws.source_path().file_name().unwrap(), "Main.java");
        ws.cleanup().await;
    }

    #[tokio::test]
    async fn test_materialize_rejects_empty_source() {
        let (_tmp, manager) = manager();
        let submission = Submission::new(Language::Python, "  \n\t", "");

        let err = manager.materialize(&submission).await.unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidInput(_)));
        assert_eq!(entries(manager.root()), 0);
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let (_tmp, manager) = manager();
        let submission = Submission::new(Language::Python, "print(1)", "");

        let mut ws = manager.materialize(&submission).await.unwrap();
        ws.cleanup().await;
        ws.cleanup().await;
        assert!(ws.is_cleaned());
        assert_eq!(entries(manager.root()), 0);
    }

    #[test]
    fn test_drop_outside_runtime_cleans_up() {
        let (_tmp, manager) = manager();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let submission = Submission::new(Language::Python, "print(1)", "");

        let ws = runtime.block_on(manager.materialize(&submission)).unwrap();
        let dir = ws.directory().to_path_buf();
        assert!(dir.exists());
        drop(runtime);

        drop(ws);
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_concurrent_workspaces_never_collide() {
        let (_tmp, manager) = manager();
        let n = 32;

        let mut handles = Vec::new();
        for i in 0..n {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                let submission = Submission::new(Language::Java, format!("public class Main {{ int x = {}; }}", i), "");
                manager.materialize(&submission).await.unwrap()
            }));
        }

        let mut workspaces = Vec::new();
        for handle in handles {
            workspaces.push(handle.await.unwrap());
        }

        let dirs: HashSet<PathBuf> = workspaces.iter().map(|w| w.directory().to_path_buf()).collect();
        assert_eq!(dirs.len(), n);
        assert_eq!(entries(manager.root()), n);

        for ws in &mut workspaces {
            ws.cleanup().await;
        }
        assert_eq!(entries(manager.root()), 0);
    }
}
