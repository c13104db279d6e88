//! Message delivery backends.

use anyhow::{anyhow, Context, Result};
use std::time::Duration;

use super::message::AlertMessage;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers one rendered message to one recipient.
pub trait MessageTransport: Send + Sync {
    fn deliver(&self, message: &AlertMessage) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// POSTs each message as JSON. Any non-2xx response is a delivery failure.
pub struct WebhookTransport {
    url: String,
    agent: ureq::Agent,
}

impl WebhookTransport {
    pub fn new(url: &str) -> Result<Self> {
        let parsed = url::Url::parse(url).with_context(|| format!("parse webhook url {}", url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(anyhow!(
                "unsupported webhook scheme '{}'; expected http(s)",
                parsed.scheme()
            ));
        }
        let agent = ureq::AgentBuilder::new().timeout(WEBHOOK_TIMEOUT).build();
        Ok(Self {
            url: url.to_string(),
            agent,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl MessageTransport for WebhookTransport {
    fn deliver(&self, message: &AlertMessage) -> Result<()> {
        let body = serde_json::to_string(message).context("serialize alert message")?;
        let response = match self
            .agent
            .post(&self.url)
            .set("Content-Type", "application/json")
            .send_string(&body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                return Err(anyhow!("webhook {} answered HTTP {}", self.url, code))
            }
            Err(err) => {
                return Err(anyhow::Error::new(err).context(format!("post to webhook {}", self.url)))
            }
        };
        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(anyhow!("webhook {} answered HTTP {}", self.url, status));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

/// Writes the message summary to the log instead of sending it.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogTransport;

impl MessageTransport for LogTransport {
    fn deliver(&self, message: &AlertMessage) -> Result<()> {
        log::info!(
            "alert for {} <{}>: {} (attachment {}, sha256 {})",
            message.recipient_name,
            message.recipient_address,
            message.subject,
            message.attachment.display(),
            message.attachment_sha256
        );
        log::debug!("alert body: {}", message.html_body);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::path::PathBuf;
    use std::thread;

    fn message() -> AlertMessage {
        AlertMessage {
            recipient_name: "Alice".to_string(),
            recipient_address: "alice@example.com".to_string(),
            subject: "Movement detected".to_string(),
            html_body: "<p>hi</p>".to_string(),
            attachment: PathBuf::from("images/moveimg_x.png"),
            attachment_sha256: "00".repeat(32),
        }
    }

    /// One-shot HTTP server answering with `status`; returns the request body.
    fn serve_once(status: u16) -> Result<(String, thread::JoinHandle<String>)> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let url = format!("http://{}/hook", listener.local_addr()?);
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("read header");
                let trimmed = line.trim_end();
                if trimmed.is_empty() {
                    break;
                }
                if let Some((key, value)) = trimmed.split_once(':') {
                    if key.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().expect("content length");
                    }
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).expect("read body");
            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {} X\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                status
            )
            .expect("write response");
            String::from_utf8(body).expect("utf8 body")
        });
        Ok((url, handle))
    }

    #[test]
    fn webhook_posts_json() -> Result<()> {
        let (url, server) = serve_once(204)?;
        WebhookTransport::new(&url)?.deliver(&message())?;
        let body: serde_json::Value = serde_json::from_str(&server.join().expect("server"))?;
        assert_eq!(body["recipient_address"], "alice@example.com");
        assert_eq!(body["subject"], "Movement detected");
        Ok(())
    }

    #[test]
    fn webhook_error_status_fails() -> Result<()> {
        let (url, server) = serve_once(500)?;
        let err = WebhookTransport::new(&url)?
            .deliver(&message())
            .err()
            .expect("HTTP 500");
        assert!(err.to_string().contains("500"));
        server.join().expect("server");
        Ok(())
    }

    #[test]
    fn webhook_rejects_non_http_urls() {
        assert!(WebhookTransport::new("mailto:alice@example.com").is_err());
    }

    #[test]
    fn log_transport_always_succeeds() -> Result<()> {
        LogTransport.deliver(&message())
    }
}
