//! Request handlers.

use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::http::{Method, Request, Response, Status};

/// Turns a parsed request into a response.
pub trait Handler: Send + Sync {
    /// Produce the response for `request`.
    fn handle(&self, request: &Request) -> impl Future<Output = Response> + Send;
}

/// Serves and stores files under one root directory.
///
/// - `GET` on a directory lists its entries, one name per line.
/// - `GET` on a file returns its contents, or 404.
/// - `POST` writes the body to the file and answers 201.
/// - Any path that would leave the root is 403.
#[derive(Debug, Clone)]
pub struct FileHandler {
    root: PathBuf,
}

impl FileHandler {
    /// Serve the directory at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The served directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path onto the root, or `None` if it escapes.
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let mut relative = PathBuf::new();
        for component in Path::new(request_path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !relative.pop() {
                        return None;
                    }
                }
                Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(self.root.join(relative))
    }

    async fn get(&self, path: &Path) -> io::Result<Response> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Response::new(Status::NotFound)),
            Err(err) => return Err(err),
        };

        if metadata.is_dir() {
            let mut names = Vec::new();
            let mut entries = tokio::fs::read_dir(path).await?;
            while let Some(entry) = entries.next_entry().await? {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                if entry.file_type().await?.is_dir() {
                    name.push('/');
                }
                names.push(name);
            }
            names.sort();
            let mut listing = names.join("\r\n");
            if !listing.is_empty() {
                listing.push_str("\r\n");
            }
            return Ok(Response::new(Status::Ok).with_body(listing));
        }

        let contents = tokio::fs::read(path).await?;
        Ok(Response::new(Status::Ok).with_body(contents))
    }

    async fn post(&self, path: &Path, body: &[u8]) -> io::Result<Response> {
        if path == self.root || tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir()) {
            return Ok(Response::new(Status::BadRequest));
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, body).await?;
        Ok(Response::new(Status::Created))
    }
}

impl Handler for FileHandler {
    async fn handle(&self, request: &Request) -> Response {
        let Some(path) = self.resolve(&request.path) else {
            warn!(path = %request.path, "request escapes the served directory");
            return Response::new(Status::Forbidden);
        };
        debug!(method = %request.method, path = %path.display(), "serving");

        let result = match request.method {
            Method::Get => self.get(&path).await,
            Method::Post => self.post(&path, request.body.as_deref().unwrap_or_default()).await,
        };
        result.unwrap_or_else(|err| {
            warn!(error = %err, path = %path.display(), "file operation failed");
            match err.kind() {
                io::ErrorKind::PermissionDenied => Response::new(Status::Forbidden),
                _ => Response::new(Status::InternalServerError),
            }
        })
    }
}
