use std::env;
use std::time::Duration;

use chrono::Utc;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::CozeError;
use crate::reply::normalize_reply;
use crate::stream::{DeltaStream, decode_events};
use crate::types::{ChatObject, ChatRequest, EnterMessage, Envelope};

pub const DEFAULT_BASE_URL: &str = "https://api.coze.cn";
pub const DEFAULT_POLL_ATTEMPTS: usize = 30;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Builder for [`CozeClient`].
///
/// # Example
/// ```rust,no_run
/// # async fn run() -> Result<(), starchat_coze::CozeError> {
/// use std::time::Duration;
/// use starchat_coze::CozeClient;
///
/// let client = CozeClient::builder("https://api.coze.cn", "pat_xxx", "7390000000000")
///     .set_poll_attempts(10)
///     .set_poll_interval(Duration::from_millis(500))
///     .build()?;
/// let reply = client.chat_and_wait("hello", None).await?;
/// println!("{reply}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CozeClientBuilder {
    base_url: String,
    token: String,
    bot_id: String,
    poll_attempts: usize,
    poll_interval: Duration,
    timeout: Duration,
    proxy: Option<String>,
    no_proxy: bool,
}

impl CozeClientBuilder {
    /// Maximum number of status polls for non-streaming chats (default: `30`).
    pub fn set_poll_attempts(mut self, attempts: usize) -> Self {
        self.poll_attempts = attempts;
        self
    }

    /// Delay before each status poll (default: one second).
    pub fn set_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Timeout applied to each non-streaming request (default: 60 s).
    /// Streams are not subject to it.
    pub fn set_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the HTTP/HTTPS proxy URL.
    pub fn set_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self.no_proxy = false;
        self
    }

    /// Connect directly, ignoring both the configured and the system proxy.
    pub fn no_proxy(mut self) -> Self {
        self.proxy = None;
        self.no_proxy = true;
        self
    }

    pub fn build(self) -> Result<CozeClient, CozeError> {
        if self.token.trim().is_empty() {
            return Err(CozeError::Config("API token is empty".into()));
        }
        if self.bot_id.trim().is_empty() {
            return Err(CozeError::Config("bot id is empty".into()));
        }
        if self.poll_attempts == 0 {
            return Err(CozeError::Config("poll attempts must be at least 1".into()));
        }

        let mut builder = Client::builder()
            .user_agent(concat!("starchat-coze/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10));

        if self.no_proxy {
            builder = builder.no_proxy();
        } else if let Some(ref proxy_url) = self.proxy {
            match reqwest::Proxy::all(proxy_url) {
                Ok(p) => builder = builder.proxy(p),
                Err(e) => warn!(proxy = %proxy_url, error = %e, "ignoring invalid proxy URL"),
            }
        }

        Ok(CozeClient {
            base_url: self.base_url.trim_end_matches('/').to_owned(),
            token: self.token,
            bot_id: self.bot_id,
            poll_attempts: self.poll_attempts,
            poll_interval: self.poll_interval,
            timeout: self.timeout,
            http: builder.build()?,
        })
    }
}

/// Client for the Coze v3 chat API.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct CozeClient {
    base_url: String,
    token: String,
    bot_id: String,
    pub(crate) poll_attempts: usize,
    pub(crate) poll_interval: Duration,
    timeout: Duration,
    http: Client,
}

impl CozeClient {
    /// Start building a client.
    ///
    /// The proxy is read from `HTTP_PROXY` / `HTTPS_PROXY` when set.
    pub fn builder(
        base_url: impl Into<String>,
        token: impl Into<String>,
        bot_id: impl Into<String>,
    ) -> CozeClientBuilder {
        let proxy = env::var("HTTP_PROXY")
            .ok()
            .or_else(|| env::var("HTTPS_PROXY").ok());

        CozeClientBuilder {
            base_url: base_url.into(),
            token: token.into(),
            bot_id: bot_id.into(),
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            proxy,
            no_proxy: false,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn bot_id(&self) -> &str {
        &self.bot_id
    }

    /// Build the upstream body for one user message.
    ///
    /// A missing or blank `user_id` is replaced by `user_<unix millis>`.
    pub fn chat_request(&self, message: &str, user_id: Option<&str>, stream: bool) -> ChatRequest {
        let user_id = user_id
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("user_{}", Utc::now().timestamp_millis()));

        ChatRequest {
            bot_id: self.bot_id.clone(),
            user_id,
            stream,
            auto_save_history: true,
            additional_messages: vec![EnterMessage::user_text(message)],
        }
    }

    /// Start a streaming chat and return the decoded reply stream.
    pub async fn open_stream(
        &self,
        message: &str,
        user_id: Option<&str>,
    ) -> Result<DeltaStream, CozeError> {
        let body = self.chat_request(message, user_id, true);
        debug!(user_id = %body.user_id, "opening Coze chat stream");

        let resp = self
            .post_chat(&body)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let resp = check_status(resp).await?;

        Ok(decode_events(resp.bytes_stream()))
    }

    /// Start a non-streaming chat. The returned chat is usually still
    /// `in_progress`; see [`CozeClient::chat_and_wait`].
    pub async fn create_chat(
        &self,
        message: &str,
        user_id: Option<&str>,
    ) -> Result<ChatObject, CozeError> {
        let body = self.chat_request(message, user_id, false);
        debug!(user_id = %body.user_id, "creating Coze chat");

        let resp = self
            .post_chat(&body)
            .header(ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await?;
        let chat: ChatObject = require_data(read_envelope(resp).await?)?;
        debug!(chat_id = %chat.id, conversation_id = %chat.conversation_id, status = ?chat.status, "chat created");
        Ok(chat)
    }

    /// `GET /v3/chat/retrieve`.
    pub async fn retrieve_chat(
        &self,
        conversation_id: &str,
        chat_id: &str,
    ) -> Result<ChatObject, CozeError> {
        let resp = self
            .get("/v3/chat/retrieve", conversation_id, chat_id)
            .send()
            .await?;
        require_data(read_envelope(resp).await?)
    }

    /// `GET /v3/chat/message/list`. The raw `data` value is returned so that
    /// [`crate::reply`] can cope with its varying shape.
    pub async fn list_messages(
        &self,
        conversation_id: &str,
        chat_id: &str,
    ) -> Result<Value, CozeError> {
        let resp = self
            .get("/v3/chat/message/list", conversation_id, chat_id)
            .send()
            .await?;
        let envelope: Envelope<Value> = read_envelope(resp).await?;
        Ok(envelope.data.unwrap_or(Value::Null))
    }

    /// Create a non-streaming chat, poll until it completes and return the
    /// normalized reply text.
    pub async fn chat_and_wait(
        &self,
        message: &str,
        user_id: Option<&str>,
    ) -> Result<String, CozeError> {
        let chat = self.create_chat(message, user_id).await?;
        let chat = self.wait_for_completion(chat).await?;
        let data = self.list_messages(&chat.conversation_id, &chat.id).await?;
        Ok(normalize_reply(Some(&data)))
    }

    // ── private helpers ──────────────────────────────────────────────────────

    fn post_chat(&self, body: &ChatRequest) -> RequestBuilder {
        self.http
            .post(format!("{}/v3/chat", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(CONTENT_TYPE, "application/json")
            .json(body)
    }

    fn get(&self, path: &str, conversation_id: &str, chat_id: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/json")
            .query(&[("conversation_id", conversation_id), ("chat_id", chat_id)])
            .timeout(self.timeout)
    }
}

/// Turn a non-2xx response into [`CozeError::Status`] carrying its body text.
async fn check_status(resp: Response) -> Result<Response, CozeError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), body = %body, "Coze API error");
    Err(CozeError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn read_envelope<T: DeserializeOwned>(resp: Response) -> Result<Envelope<T>, CozeError> {
    let resp = check_status(resp).await?;
    let bytes = resp.bytes().await?;
    let envelope: Envelope<T> = serde_json::from_slice(&bytes)?;
    if envelope.code != 0 {
        warn!(code = envelope.code, msg = %envelope.msg, "Coze API returned an error code");
        return Err(CozeError::Api {
            code: envelope.code,
            msg: envelope.msg,
        });
    }
    Ok(envelope)
}

fn require_data<T>(envelope: Envelope<T>) -> Result<T, CozeError> {
    envelope.data.ok_or_else(|| CozeError::InvalidResponse {
        message: "response envelope has no data".into(),
    })
}
