//! starchat – terminal rendition of the site's chat widget.
//!
//! Reads one message per line from stdin, posts it to a running
//! starchat-server and prints the streamed reply as it arrives.
//!
//! Environment:
//! - `STARCHAT_URL`: server base URL (default `http://127.0.0.1:3000`)
//! - `STARCHAT_LOG`: tracing filter (default `warn`)

use std::io::Write;

use anyhow::{Context, Result};
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde_json::{Value, json};
use starchat_coze::{Frame, Transcript};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = std::env::var("STARCHAT_LOG").unwrap_or_else(|_| "warn".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(
            filter
                .parse::<tracing_subscriber::EnvFilter>()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let base = std::env::var("STARCHAT_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_owned());
    let endpoint = format!("{}/api/chat", base.trim_end_matches('/'));
    let user_id = format!("user_{}", chrono::Utc::now().timestamp_millis());
    let http = reqwest::Client::new();
    let mut transcript = Transcript::new();

    println!("Connected to {base}. Type a message and press Enter; Ctrl-D quits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();
    let chat = Chat {
        http: &http,
        endpoint: &endpoint,
        user_id: &user_id,
    };
    while let Some(line) = lines.next_line().await? {
        chat.turn(&mut transcript, &line, &mut stdout).await?;
    }

    debug!(messages = transcript.len(), "session ended");
    Ok(())
}

/// Where and as whom messages are posted.
struct Chat<'a> {
    http: &'a reqwest::Client,
    endpoint: &'a str,
    user_id: &'a str,
}

impl Chat<'_> {
    /// Handle one input line: record it, stream the reply into `out` and
    /// settle the assistant entry. Blank lines are ignored.
    async fn turn(
        &self,
        transcript: &mut Transcript,
        line: &str,
        out: &mut impl Write,
    ) -> Result<()> {
        let Some(message) = transcript.push_user(line) else {
            return Ok(());
        };
        let index = transcript.begin_assistant();

        write!(out, "bot> ")?;
        out.flush()?;

        if let Err(e) = self.ask(&message, transcript, index, out).await {
            transcript.fail(index, &e.to_string());
        }
        // A reply that ended without a terminator still counts as finished.
        transcript.finish(index);

        if let Some(reply) = transcript.messages().get(index) {
            if reply.content.starts_with('❌') {
                write!(out, "{}", reply.content)?;
            }
        }
        writeln!(out)?;
        Ok(())
    }

    /// Post one message and render the streamed reply into `transcript`.
    async fn ask(
        &self,
        message: &str,
        transcript: &mut Transcript,
        index: usize,
        out: &mut impl Write,
    ) -> Result<()> {
        let endpoint = self.endpoint;
        let resp = self
            .http
            .post(endpoint)
            .json(&json!({ "message": message, "userId": self.user_id, "stream": true }))
            .send()
            .await
            .with_context(|| format!("could not reach {endpoint}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body: Value = resp.json().await.unwrap_or(Value::Null);
            let error = body["error"].as_str().unwrap_or("request failed").to_owned();
            anyhow::bail!("{error} ({status})");
        }

        let mut events = std::pin::pin!(resp.bytes_stream().eventsource());
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| anyhow::anyhow!("reply stream broke off: {e}"))?;
            let Some(frame) = Frame::parse(&event.data) else {
                warn!(data = %event.data, "ignoring unrecognised frame");
                continue;
            };
            if let Frame::Content(delta) = &frame {
                write!(out, "{delta}")?;
                out.flush()?;
            }
            if transcript.apply(index, frame) {
                break;
            }
        }
        Ok(())
    }
}
