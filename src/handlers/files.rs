use std::{
    io,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use askama::Template;
use axum::{
    body::Body,
    extract::{Request, State},
    response::{Html, IntoResponse, Response},
};
use http::{Method, StatusCode};
use tower::ServiceExt as _;
use tracing::error;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// One line of a directory listing
#[derive(Debug, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub href: String,
}

#[derive(Template)]
#[template(path = "listing.html")]
struct ListingTemplate<'a> {
    entries: &'a [Entry],
}

/// Map a request path onto `root`, refusing anything that would climb above it
pub fn resolve_path(root: &Path, request_path: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(request_path).ok()?;
    let mut resolved = root.to_path_buf();
    for component in Path::new(decoded.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(resolved)
}

/// Directory entries sorted by name, sub-directories suffixed with `/`
pub async fn read_entries(dir: &Path) -> io::Result<Vec<Entry>> {
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
        let mut name = entry.file_name().to_string_lossy().into_owned();
        let mut href = urlencoding::encode(&name).into_owned();
        if is_dir {
            name.push('/');
            href.push('/');
        }
        entries.push(Entry { name, href });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

async fn render_listing(dir: &Path) -> AppResult<Html<String>> {
    let entries = match read_entries(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            return Err(AppError::Forbidden);
        }
        Err(err) => {
            error!(%err, ?dir, "failed to read directory");
            return Err(AppError::InternalError(String::from(
                "Error reading directory",
            )));
        }
    };
    let template = ListingTemplate { entries: &entries };
    match template.render() {
        Ok(html) => Ok(Html(html)),
        Err(err) => {
            error!(%err, "failed to render listing");
            Err(AppError::InternalError(String::new()))
        }
    }
}

/// Directory that should be answered with a listing rather than by `ServeDir`
async fn listing_target(root: &Path, method: &Method, path: &str) -> Option<PathBuf> {
    if !matches!(*method, Method::GET | Method::HEAD) {
        return None;
    }
    if !path.ends_with('/') {
        return None;
    }
    let dir = resolve_path(root, path)?;
    let is_dir = tokio::fs::metadata(&dir).await.is_ok_and(|m| m.is_dir());
    let has_index = tokio::fs::metadata(dir.join("index.html"))
        .await
        .is_ok_and(|m| m.is_file());
    (is_dir && !has_index).then_some(dir)
}

/// `ServeDir` answers 404 for files it may not open, report those as 403
async fn is_forbidden(root: &Path, path: &str) -> bool {
    let Some(target) = resolve_path(root, path) else {
        return false;
    };
    matches!(
        tokio::fs::File::open(&target).await,
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied
    )
}

pub async fn serve_files(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    if let Some(dir) = listing_target(&state.root, &method, &path).await {
        return render_listing(&dir).await.into_response();
    }
    let response = match state.files.clone().oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };
    if response.status() == StatusCode::NOT_FOUND && is_forbidden(&state.root, &path).await {
        return AppError::Forbidden.into_response();
    }
    response
}
