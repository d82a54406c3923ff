//! Test doubles shared by unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::fetch::{FetchError, HttpClient, HttpResponse};

/// A canned reply for one URL
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    result: Result<HttpResponse, String>,
    delay: Option<Duration>,
}

impl ScriptedResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            result: Ok(HttpResponse::new(200, body)),
            delay: None,
        }
    }

    /// A full-size page with the given status
    pub fn status(status: u16) -> Self {
        Self {
            result: Ok(HttpResponse::new(status, page_of_len(500))),
            delay: None,
        }
    }

    pub fn network_error(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// `HttpClient` answering from a routing table and recording every request
#[derive(Debug, Default)]
pub struct ScriptedClient {
    routes: HashMap<String, ScriptedResponse>,
    fallback: Option<ScriptedResponse>,
    requested: Mutex<Vec<String>>,
    credentialed: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, response: ScriptedResponse) -> Self {
        self.routes.insert(url.to_string(), response);
        self
    }

    /// Reply used for any URL without a route
    pub fn fallback(mut self, response: ScriptedResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    pub fn credentialed_requests(&self) -> usize {
        self.credentialed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn get(&self, url: &str, retain_credentials: bool) -> Result<HttpResponse, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        if retain_credentials {
            self.credentialed.fetch_add(1, Ordering::SeqCst);
        }

        let scripted = self
            .routes
            .get(url)
            .or(self.fallback.as_ref())
            .cloned()
            .unwrap_or_else(|| ScriptedResponse::network_error("no route"));

        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }

        scripted.result.map_err(|message| FetchError::Network {
            url: url.to_string(),
            message,
        })
    }
}

/// An HTML page of exactly `len` bytes with no rating data in it
pub fn page_of_len(len: usize) -> String {
    let shell = "<html><body></body></html>";
    let mut page = String::with_capacity(len.max(shell.len()));
    page.push_str("<html><body>");
    while page.len() + "</body></html>".len() < len {
        page.push(' ');
    }
    page.push_str("</body></html>");
    page
}

/// Pads a fragment into a page comfortably above the minimum response size
pub fn padded_page(fragment: &str) -> String {
    format!("<html><head><title>Search</title></head><body>{}{}</body></html>", fragment, " ".repeat(256))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_of_len_is_exact() {
        assert_eq!(page_of_len(200).len(), 200);
        assert_eq!(page_of_len(300).len(), 300);
    }
}
