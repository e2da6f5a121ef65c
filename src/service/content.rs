use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::models::{Attachment, FileSet};
use super::templates;
use crate::config::ModelSettings;
use crate::errors::ContentError;
use crate::util::{decode_data_uri, extract_fenced_block, truncate_chars};

const SEED_LEN: usize = 5;
const MAX_ATTACHMENT_CHARS: usize = 4_000;

/// Produces the site files for a task. Implementations never fail: when the
/// preferred source is unusable they return the deterministic fallback.
#[async_trait]
pub trait SiteContentProvider: Send + Sync {
    async fn synthesize(
        &self,
        brief: &str,
        checks: &[String],
        task_id: &str,
        attachments: &[Attachment],
    ) -> FileSet;
}

/// Deterministic id derived from a task id: its last five characters, or its
/// length zero-padded to five digits when shorter. Path separators become `-`.
pub fn derive_seed(task_id: &str) -> String {
    let count = task_id.chars().count();
    let raw = if count >= SEED_LEN {
        task_id.chars().skip(count - SEED_LEN).collect::<String>()
    } else {
        format!("{:05}", count)
    };
    raw.replace(['/', '\\'], "-")
}

/// The two-file template used whenever generated content is unavailable.
pub fn fallback_files(seed: &str) -> FileSet {
    let mut files = FileSet::new();
    files.insert("index.html", templates::fallback_index_html());
    files.insert("script.js", templates::fallback_script_js(seed));
    files
}

/// Always serves the fallback template.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackContentProvider;

#[async_trait]
impl SiteContentProvider for FallbackContentProvider {
    async fn synthesize(
        &self,
        _brief: &str,
        _checks: &[String],
        task_id: &str,
        _attachments: &[Attachment],
    ) -> FileSet {
        fallback_files(&derive_seed(task_id))
    }
}

// ── Model-backed provider ─────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Asks an OpenAI-compatible chat endpoint for the site, once per task.
pub struct ModelContentProvider {
    http: reqwest::Client,
    settings: ModelSettings,
}

impl ModelContentProvider {
    pub fn new(settings: ModelSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;
        Ok(Self { http, settings })
    }

    async fn complete(&self, prompt: &str) -> Result<String, ContentError> {
        let key = self
            .settings
            .api_key
            .as_ref()
            .ok_or(ContentError::NotConfigured)?;
        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let body = ChatRequest {
            model: &self.settings.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.settings.temperature,
        };
        let resp = self
            .http
            .post(url)
            .bearer_auth(key.expose())
            .json(&body)
            .send()
            .await
            .map_err(ContentError::Request)?;
        if !resp.status().is_success() {
            return Err(ContentError::Status {
                status: resp.status().as_u16(),
            });
        }
        let parsed: ChatResponse = resp.json().await.map_err(ContentError::Request)?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(ContentError::EmptyResponse)
    }

    async fn generate(
        &self,
        brief: &str,
        checks: &[String],
        seed: &str,
        attachments: &[Attachment],
    ) -> Result<FileSet, ContentError> {
        let prompt = build_prompt(brief, checks, seed, attachments);
        let text = self.complete(&prompt).await?;
        parse_model_output(&text)
    }
}

#[async_trait]
impl SiteContentProvider for ModelContentProvider {
    async fn synthesize(
        &self,
        brief: &str,
        checks: &[String],
        task_id: &str,
        attachments: &[Attachment],
    ) -> FileSet {
        let seed = derive_seed(task_id);
        match self.generate(brief, checks, &seed, attachments).await {
            Ok(files) => {
                tracing::info!(task = %task_id, files = files.len(), "using model-generated site");
                files
            }
            Err(ContentError::NotConfigured) => {
                tracing::debug!(task = %task_id, "no model configured, using fallback site");
                fallback_files(&seed)
            }
            Err(e) => {
                tracing::warn!(task = %task_id, error = %e, "content generation failed, using fallback site");
                fallback_files(&seed)
            }
        }
    }
}

/// Prompt sent to the model. Embeds brief, checks, seed, required DOM ids
/// and whatever attachment context can be inlined.
pub fn build_prompt(brief: &str, checks: &[String], seed: &str, attachments: &[Attachment]) -> String {
    let checks_list = if checks.is_empty() {
        "(none)".to_string()
    } else {
        checks
            .iter()
            .map(|c| format!("- {}", c))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut prompt = format!(
        "You are a code generator. Output ONLY a minified HTML+JS app (two files):\n\
         - A Bootstrap 5 index.html that includes <script src=\"./script.js\">, in a ```html block\n\
         - A script.js that satisfies this brief and checks, in a ```js block\n\
         Brief: {brief}\n\
         Checks:\n{checks_list}\n\
         Seed: {seed}\n\
         IDs required if GitHub brief: form id=\"github-user-{seed}\", #github-created-at, \
         #github-account-age, #github-status (aria-live polite).\n"
    );

    if !attachments.is_empty() {
        prompt.push_str("Attachments:\n");
        for attachment in attachments {
            prompt.push_str(&describe_attachment(attachment));
            prompt.push('\n');
        }
    }
    prompt
}

fn describe_attachment(attachment: &Attachment) -> String {
    match decode_data_uri(&attachment.url) {
        Some((bytes, mime)) if is_textual(&mime) => {
            let text = String::from_utf8_lossy(&bytes);
            format!(
                "- {} ({}):\n{}",
                attachment.name,
                mime,
                truncate_chars(&text, MAX_ATTACHMENT_CHARS)
            )
        }
        Some((bytes, mime)) => format!(
            "- {} ({}, {} bytes, embedded as a data URI)",
            attachment.name,
            mime,
            bytes.len()
        ),
        None => format!("- {}: {}", attachment.name, attachment.url),
    }
}

fn is_textual(mime: &str) -> bool {
    let mime = mime.to_ascii_lowercase();
    mime.starts_with("text/")
        || mime.ends_with("json")
        || mime.ends_with("xml")
        || mime == "application/javascript"
}

/// Split model output into `index.html` and `script.js`. Fails unless the
/// text mentions both an HTML document and `script.js`, and a JavaScript
/// block can be found.
pub fn parse_model_output(text: &str) -> Result<FileSet, ContentError> {
    if !text.contains("<html") {
        return Err(ContentError::Malformed("no <html> document".into()));
    }
    if !text.contains("script.js") {
        return Err(ContentError::Malformed("no reference to script.js".into()));
    }

    let html = extract_fenced_block(text, &["html"])
        .or_else(|| {
            let start = text.find("<!doctype").or_else(|| text.find("<!DOCTYPE")).or_else(|| text.find("<html"))?;
            let end = text[start..].find("</html>")? + start + "</html>".len();
            Some(text[start..end].to_string())
        })
        .filter(|html| html.contains("<html") && html.contains("script.js"))
        .ok_or_else(|| ContentError::Malformed("could not extract index.html".into()))?;

    let js = extract_fenced_block(text, &["js", "javascript"])
        .filter(|js| !js.trim().is_empty())
        .ok_or_else(|| ContentError::Malformed("could not extract script.js".into()))?;

    let mut files = FileSet::new();
    files.insert("index.html", html);
    files.insert("script.js", js);
    Ok(files)
}
