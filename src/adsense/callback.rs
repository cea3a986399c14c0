use crate::error::{AppError, Result};
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Request, Response, Server};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use url::Url;

const CALLBACK_PATH: &str = "/";
const FAVICON_PATH: &str = "/favicon.ico";

/// What a request to the redirect endpoint turned out to be.
#[derive(Debug, PartialEq)]
enum Callback {
    Code(String),
    Denied(String),
    Favicon,
    Unexpected(&'static str),
}

fn classify(request_url: &str, expected_state: &str) -> Callback {
    let Ok(url) = Url::parse(&format!("http://localhost{}", request_url)) else {
        return Callback::Unexpected("unparseable URL");
    };

    if url.path() == FAVICON_PATH {
        return Callback::Favicon;
    }
    if url.path() != CALLBACK_PATH {
        return Callback::Unexpected("unknown path");
    }

    let param = |name: &str| {
        url.query_pairs()
            .find(|(key, value)| key == name && !value.is_empty())
            .map(|(_, value)| value.into_owned())
    };

    let state_matches = param("state").is_some_and(|state| state == expected_state);

    match (param("code"), param("error")) {
        (Some(code), _) if state_matches => Callback::Code(code),
        (None, Some(error)) if state_matches => Callback::Denied(error),
        (None, None) => Callback::Unexpected("no code in request"),
        _ => Callback::Unexpected("state mismatch"),
    }
}

/// Short-lived local HTTP server that receives the OAuth redirect.
///
/// Requests are served on a dedicated thread until one carries the
/// authorization code (or a consent error). That outcome is handed over to
/// [`CallbackListener::wait_for_code`] through a oneshot channel and the
/// server is dropped.
pub(super) struct CallbackListener {
    redirect_url: String,
    receiver: oneshot::Receiver<Result<String>>,
    handle: JoinHandle<()>,
}

impl CallbackListener {
    /// Bind to an ephemeral loopback port and start serving.
    pub(super) fn start(expected_state: String) -> Result<Self> {
        let server = Server::http("127.0.0.1:0")
            .map_err(|e| AppError::Auth(format!("Failed to start callback listener: {}", e)))?;
        let addr = server.server_addr().to_ip().ok_or_else(|| {
            AppError::Auth("Callback listener is not bound to an IP address".to_string())
        })?;
        let redirect_url = format!("http://{}{}", addr, CALLBACK_PATH);
        debug!(redirect_url = %redirect_url, "Callback listener started");

        let (sender, receiver) = oneshot::channel();
        let handle = thread::Builder::new()
            .name("oauth-callback".to_string())
            .spawn(move || serve(server, &expected_state, sender))?;

        Ok(Self {
            redirect_url,
            receiver,
            handle,
        })
    }

    pub(super) fn redirect_url(&self) -> &str {
        &self.redirect_url
    }

    /// Block until the browser is redirected back with a code. There is no
    /// timeout.
    pub(super) async fn wait_for_code(self) -> Result<String> {
        let outcome = self.receiver.await.map_err(|_| {
            AppError::Auth("Callback listener stopped before receiving a code".to_string())
        })?;

        let handle = self.handle;
        if tokio::task::spawn_blocking(move || handle.join())
            .await
            .map_or(true, |joined| joined.is_err())
        {
            warn!("Callback listener thread did not shut down cleanly");
        }

        outcome
    }
}

fn serve(server: Server, expected_state: &str, sender: oneshot::Sender<Result<String>>) {
    for request in server.incoming_requests() {
        match classify(request.url(), expected_state) {
            Callback::Favicon => respond(request, 404, "Not Found"),
            Callback::Unexpected(reason) => {
                warn!(url = request.url(), reason, "Ignoring unexpected callback request");
                respond(request, 500, "Internal Server Error");
            }
            Callback::Code(code) => {
                respond(request, 200, "Authorized.\n");
                let _ = sender.send(Ok(code));
                return;
            }
            Callback::Denied(error) => {
                respond(request, 200, &format!("Authorization failed: {}\n", error));
                let _ = sender.send(Err(AppError::Auth(format!(
                    "Authorization was not granted: {}",
                    error
                ))));
                return;
            }
        }
    }
}

fn respond(request: Request, status: u16, body: &str) {
    let mut response = Response::from_string(body).with_status_code(status);
    if let Ok(header) = Header::from_bytes("Content-Type", "text/plain; charset=utf-8") {
        response.add_header(header);
    }

    if let Err(e) = request.respond(response) {
        warn!("Failed to answer callback request: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        let cases = [
            ("/?code=4/abc&state=st", Callback::Code("4/abc".to_string())),
            ("/?state=st&code=x%2Fy&scope=z", Callback::Code("x/y".to_string())),
            ("/favicon.ico", Callback::Favicon),
            ("/?error=access_denied&state=st", Callback::Denied("access_denied".to_string())),
            ("/?error=access_denied", Callback::Unexpected("state mismatch")),
            ("/?error=access_denied&state=other", Callback::Unexpected("state mismatch")),
            ("/", Callback::Unexpected("no code in request")),
            ("/?code=&state=st", Callback::Unexpected("no code in request")),
            ("/?code=abc", Callback::Unexpected("state mismatch")),
            ("/?code=abc&state=other", Callback::Unexpected("state mismatch")),
            ("/robots.txt?code=abc&state=st", Callback::Unexpected("unknown path")),
        ];

        for (url, expected) in cases {
            assert_eq!(classify(url, "st"), expected, "classifying {url}");
        }
    }

    #[tokio::test]
    async fn test_listener_survives_probes_and_delivers_code() {
        let listener = CallbackListener::start("st".to_string()).unwrap();
        let base = listener.redirect_url().to_string();
        let http = reqwest::Client::new();

        let favicon = http.get(format!("{}favicon.ico", base)).send().await.unwrap();
        assert_eq!(favicon.status().as_u16(), 404);

        let bare = http.get(&base).send().await.unwrap();
        assert_eq!(bare.status().as_u16(), 500);

        let forged = http
            .get(format!("{}?code=abc&state=forged", base))
            .send()
            .await
            .unwrap();
        assert_eq!(forged.status().as_u16(), 500);

        let callback = http
            .get(format!("{}?code=4%2Fxyz&state=st", base))
            .send()
            .await
            .unwrap();
        assert_eq!(callback.status().as_u16(), 200);
        assert_eq!(callback.text().await.unwrap(), "Authorized.\n");

        assert_eq!(listener.wait_for_code().await.unwrap(), "4/xyz");
    }

    #[tokio::test]
    async fn test_listener_reports_denied_consent() {
        let listener = CallbackListener::start("st".to_string()).unwrap();
        let url = format!("{}?error=access_denied&state=st", listener.redirect_url());

        let response = reqwest::get(url).await.unwrap();
        assert_eq!(response.status().as_u16(), 200);

        let err = listener.wait_for_code().await.unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
        assert!(err.to_string().contains("access_denied"));
    }

    #[tokio::test]
    async fn test_listener_ignores_error_without_state() {
        let listener = CallbackListener::start("st".to_string()).unwrap();
        let base = listener.redirect_url().to_string();
        let http = reqwest::Client::new();

        let stray = http
            .get(format!("{}?error=whatever", base))
            .send()
            .await
            .unwrap();
        assert_eq!(stray.status().as_u16(), 500);

        let callback = http
            .get(format!("{}?code=abc&state=st", base))
            .send()
            .await
            .unwrap();
        assert_eq!(callback.status().as_u16(), 200);

        assert_eq!(listener.wait_for_code().await.unwrap(), "abc");
    }
}
