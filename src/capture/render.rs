//! Document assembly and page loading.
//!
//! Assembles the full HTML document (markup plus inlined CSS) and loads it
//! into a browser tab through a disposable localhost server. The server is
//! NOT a daemon: it binds a random port, serves exactly one request, and
//! shuts down. The assembled document string is also the input to content
//! hashing, so assembly is deterministic for identical inputs.

use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use headless_chrome::Tab;
use log::debug;
use tiny_http::{Header, Response, Server};

use crate::capture::types::{CaptureError, CaptureResult, CssBuilder};

/// Assemble the full document: skeleton, inlined CSS blocks, markup.
///
/// Deterministic: byte-identical inputs produce a byte-identical document.
pub fn render_document(markup: &str, css_blocks: &[String]) -> String {
    let mut styles = String::new();
    for block in css_blocks {
        styles.push_str("<style>");
        styles.push_str(block);
        styles.push_str("</style>");
    }
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">{}</head><body>{}</body></html>",
        styles, markup
    )
}

/// Assemble the final document, invoking the CSS builder only when paths
/// were configured. `None` skips the build step entirely.
pub fn assemble_document(
    markup: &str,
    css_paths: Option<&[String]>,
    builder: &dyn CssBuilder,
) -> CaptureResult<String> {
    let css_blocks = match css_paths {
        Some(paths) => {
            // Some builders tree-shake against the markup, so they get the
            // CSS-less document to scan
            let bare = render_document(markup, &[]);
            builder.build(&bare, paths)?
        }
        None => Vec::new(),
    };
    Ok(render_document(markup, &css_blocks))
}

/// Default CSS builder: reads each configured path verbatim.
///
/// No tree-shaking, no preprocessing. Component pipelines with their own
/// build step implement [`CssBuilder`] themselves.
pub struct FileCssBuilder;

impl CssBuilder for FileCssBuilder {
    fn build(&self, _document: &str, css_paths: &[String]) -> CaptureResult<Vec<String>> {
        css_paths
            .iter()
            .map(|path| {
                std::fs::read_to_string(path)
                    .map_err(|e| CaptureError::Css(format!("{}: {}", path, e)))
            })
            .collect()
    }
}

/// Disposable localhost server holding one document
pub struct DocumentServer {
    server: Server,
    port: u16,
    html: String,
}

impl DocumentServer {
    /// Bind a random loopback port
    pub fn new(html: String) -> CaptureResult<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let server = Server::from_listener(listener, None)
            .map_err(|e| CaptureError::Render(e.to_string()))?;
        Ok(Self { server, port, html })
    }

    /// URL the browser should navigate to
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Serve exactly one request, then return
    pub fn serve_once(&self, timeout: Duration) -> CaptureResult<()> {
        if let Ok(Some(request)) = self.server.recv_timeout(timeout) {
            let header =
                Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=UTF-8"[..])
                    .map_err(|_| CaptureError::Render("invalid header".to_string()))?;
            let response = Response::from_string(&self.html).with_header(header);
            request
                .respond(response)
                .map_err(|e| CaptureError::Render(e.to_string()))?;
        }
        Ok(())
    }

    /// Wake a thread parked in [`DocumentServer::serve_once`]
    pub fn unblock(&self) {
        self.server.unblock();
    }
}

/// Running disposable server. Dropping the guard wakes the serving thread
/// and joins it, so a navigation failure never strands the thread in its
/// accept wait.
pub struct ServerGuard {
    server: Arc<DocumentServer>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ServerGuard {
    /// URL the browser should navigate to
    pub fn url(&self) -> String {
        self.server.url()
    }
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Spawn a disposable server for `html`.
///
/// The background thread exits after one request, a 30s timeout, or the
/// guard being dropped, whichever comes first.
pub fn start_document_server(html: String) -> CaptureResult<ServerGuard> {
    let server = Arc::new(DocumentServer::new(html)?);
    let url = server.url();
    debug!("serving document at {}", url);

    let thread = {
        let server = Arc::clone(&server);
        thread::spawn(move || {
            let _ = server.serve_once(Duration::from_secs(30));
        })
    };

    Ok(ServerGuard {
        server,
        thread: Some(thread),
    })
}

/// Load an assembled document into a tab and wait for it to settle
pub fn load_document(tab: &Arc<Tab>, html: String) -> CaptureResult<()> {
    let server = start_document_server(html)?;

    tab.navigate_to(&server.url())
        .map_err(|e| CaptureError::Browser(e.to_string()))?;
    tab.wait_until_navigated()
        .map_err(|e| CaptureError::Browser(e.to_string()))?;

    // Guard drop wakes and joins the server thread, on the error paths too
    Ok(())
}
