//! Static file serving.
//!
//! Serves the document root at `/`. Deliberately thin: GET and HEAD only,
//! `index.html` for directory paths, content type guessed from the file
//! extension. Traversal components are rejected before any filesystem
//! access.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::Response;

use crate::error::ServerError;
use crate::state::AppState;

/// Fallback handler serving files from the document root.
pub(crate) async fn serve(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> Result<Response, ServerError> {
    if method != Method::GET && method != Method::HEAD {
        return Err(ServerError::MethodNotAllowed);
    }

    let resolved = resolve_request_path(&state.root, uri.path())?;

    let file_path = match tokio::fs::metadata(&resolved).await {
        Ok(metadata) if metadata.is_dir() => resolved.join("index.html"),
        _ => resolved,
    };

    let content = match tokio::fs::read(&file_path).await {
        Ok(content) => content,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Err(ServerError::NotFound);
        }
        Err(error) => return Err(ServerError::Io(error)),
    };

    let mime = mime_guess::from_path(&file_path).first_or_octet_stream();
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime.as_ref())
        .body(Body::from(content))
        .unwrap())
}

/// Resolve a request path against the document root.
///
/// Walks the path component by component so `..`, absolute segments, and
/// embedded null bytes never reach the filesystem. The root URL resolves
/// to the root directory itself; the directory check above turns that into
/// `index.html`.
fn resolve_request_path(root: &Path, request_path: &str) -> Result<PathBuf, ServerError> {
    let trimmed = request_path.trim_start_matches('/');

    let mut resolved = root.to_path_buf();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(name) => {
                if name.to_string_lossy().contains('\0') {
                    return Err(ServerError::PathTraversal);
                }
                resolved.push(name);
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ServerError::PathTraversal);
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn resolves_simple_paths() {
        let root = Path::new("/srv/site");

        assert_eq!(
            resolve_request_path(root, "/css/site.css").unwrap(),
            PathBuf::from("/srv/site/css/site.css")
        );
        assert_eq!(
            resolve_request_path(root, "/").unwrap(),
            PathBuf::from("/srv/site")
        );
    }

    #[test]
    fn current_dir_components_are_skipped() {
        let root = Path::new("/srv/site");

        assert_eq!(
            resolve_request_path(root, "/./css/./site.css").unwrap(),
            PathBuf::from("/srv/site/css/site.css")
        );
    }

    #[test]
    fn parent_components_are_rejected() {
        let root = Path::new("/srv/site");

        assert!(matches!(
            resolve_request_path(root, "/../secret"),
            Err(ServerError::PathTraversal)
        ));
        assert!(matches!(
            resolve_request_path(root, "/css/../../secret"),
            Err(ServerError::PathTraversal)
        ));
    }
}
