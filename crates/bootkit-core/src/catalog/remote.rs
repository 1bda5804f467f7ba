//! Package server client and catalog sync loop.

use async_trait::async_trait;
use bootkit_schema::{SyncPage, SyncRequest, SyncToken};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};

use super::{CatalogDb, CatalogError};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("could not reach package server: {0}")]
    Connection(String),

    #[error("package server returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("unexpected response from package server: {0}")]
    Protocol(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl SyncError {
    /// Whether the failure came from talking to the server rather than from
    /// the local database.
    pub fn is_connection(&self) -> bool {
        !matches!(self, Self::Catalog(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

/// User guidance printed when a sync cannot reach the server.
pub fn connection_guidance(err: &SyncError) -> String {
    match err {
        SyncError::Connection(_) => format!(
            "{err}\nCould not connect to the package server. Check your network \
             connection or proxy settings and try again."
        ),
        SyncError::Status { status, .. } if *status >= 500 => format!(
            "{err}\nThe package server is having trouble. Try again in a few minutes."
        ),
        _ => err.to_string(),
    }
}

/// Source of catalog sync pages.
#[async_trait]
pub trait PackageServer: Send + Sync {
    /// Fetch the changes since `token` (everything when `None`).
    async fn sync_page(&self, token: Option<&SyncToken>) -> Result<SyncPage, SyncError>;
}

/// [`PackageServer`] speaking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPackageServer {
    client: Client,
    base_url: String,
}

impl HttpPackageServer {
    /// Client for the server at `base_url`.
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn sync_url(&self) -> String {
        format!("{}/sync", self.base_url)
    }
}

#[async_trait]
impl PackageServer for HttpPackageServer {
    async fn sync_page(&self, token: Option<&SyncToken>) -> Result<SyncPage, SyncError> {
        let url = self.sync_url();
        let body = SyncRequest {
            sync_token: token.cloned(),
        };

        let resp = self
            .client
            .post(&url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(SyncError::Status {
                status: resp.status().as_u16(),
                url,
            });
        }

        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| SyncError::Protocol(e.to_string()))
    }
}

/// Pull pages from `server` into `db` until the server reports it is up to
/// date. Returns the number of pages applied.
pub async fn sync_from_remote(
    db: &CatalogDb,
    server: &dyn PackageServer,
    since: Option<SyncToken>,
) -> Result<usize, SyncError> {
    let mut token = since;
    let mut pages = 0;

    loop {
        let page = server.sync_page(token.as_ref()).await?;
        db.apply_page(&page)?;
        pages += 1;
        debug!(page = pages, token = page.sync_token.as_str(), "sync page");

        let done = page.up_to_date;
        token = Some(page.sync_token);
        if done {
            break;
        }
    }

    info!(pages, path = %db.path().display(), "catalog synced");
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use tempfile::TempDir;

    fn page_json(token: &str, up_to_date: bool) -> String {
        format!(
            r#"{{
                "releases": [{{"track": "STABLE", "version": "{token}", "tool": "tool@1.0.0", "packages": {{}}}}],
                "versions": [],
                "builds": [],
                "syncToken": "{token}",
                "upToDate": {up_to_date}
            }}"#
        )
    }

    #[tokio::test]
    async fn follows_pages_until_up_to_date() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", "/sync")
            .match_body(mockito::Matcher::Json(serde_json::json!({"syncToken": null})))
            .with_status(200)
            .with_body(page_json("p1", false))
            .create_async()
            .await;
        let second = server
            .mock("POST", "/sync")
            .match_body(mockito::Matcher::Json(serde_json::json!({"syncToken": "p1"})))
            .with_status(200)
            .with_body(page_json("p2", true))
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let db = CatalogDb::open(&dir.path().join("c.db")).unwrap();
        let remote = HttpPackageServer::new(Client::new(), &server.url());

        let pages = sync_from_remote(&db, &remote, None).await.unwrap();
        assert_eq!(pages, 2);
        first.assert_async().await;
        second.assert_async().await;

        assert!(db.release_version("STABLE", "p1").unwrap().is_some());
        assert!(db.release_version("STABLE", "p2").unwrap().is_some());
        assert_eq!(db.sync_token().unwrap(), Some(SyncToken("p2".into())));
    }

    #[tokio::test]
    async fn server_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sync")
            .with_status(503)
            .create_async()
            .await;

        let remote = HttpPackageServer::new(Client::new(), &server.url());
        let err = remote.sync_page(None).await.unwrap_err();
        assert!(matches!(err, SyncError::Status { status: 503, .. }));
        assert!(err.is_connection());
        assert!(connection_guidance(&err).contains("Try again"));
    }

    #[tokio::test]
    async fn garbage_body_is_protocol_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/sync")
            .with_status(200)
            .with_body("<html>captive portal</html>")
            .create_async()
            .await;

        let remote = HttpPackageServer::new(Client::new(), &server.url());
        assert!(matches!(
            remote.sync_page(None).await,
            Err(SyncError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_server_is_connection_error() {
        // Port 9 (discard) on localhost is closed on test machines.
        let remote = HttpPackageServer::new(Client::new(), "http://127.0.0.1:9");
        let err = remote.sync_page(None).await.unwrap_err();
        assert!(matches!(err, SyncError::Connection(_)));
    }
}
