//! Title Summarizer: post-stream conversation labels.

use wc_domain::config::ChatConfig;
use wc_domain::error::Result;
use wc_domain::model::{Thread, ThreadUpdate};
use wc_providers::TitleSummarizer;
use wc_store::ChatStore;

/// First line of `text`, cut at a word boundary with "..." when longer
/// than `max_chars`.
pub fn fallback_title(text: &str, max_chars: usize) -> String {
    let line = text.trim().lines().next().unwrap_or("").trim();
    if line.chars().count() <= max_chars {
        return line.to_string();
    }

    // One extra char so a word ending exactly at the limit is kept whole.
    let window: String = line.chars().take(max_chars + 1).collect();
    let head = match window.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => window[..idx].trim_end().to_string(),
        _ => line.chars().take(max_chars).collect(),
    };
    format!("{head}...")
}

/// Normalize a summarizer reply. `None` when nothing usable is left.
pub fn clean_title(raw: &str, max_chars: usize) -> Option<String> {
    let line = raw.trim().lines().next()?.trim();
    let line = line
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim_start_matches("Title:")
        .trim();
    if line.is_empty() {
        return None;
    }
    Some(fallback_title(line, max_chars))
}

pub fn should_retitle(chat: &ChatConfig, thread: &Thread, created: bool) -> bool {
    created
        || thread
            .title
            .as_deref()
            .map_or(true, |t| chat.is_placeholder_title(t))
}

/// Retitle a conversation from the assistant's reply when it is new or
/// still carries a placeholder title. Summarization failures fall back to
/// [`fallback_title`] silently. Returns the title written, if any.
pub async fn maybe_retitle(
    store: &dyn ChatStore,
    summarizer: &dyn TitleSummarizer,
    chat: &ChatConfig,
    thread_id: &str,
    created: bool,
    assistant_text: &str,
) -> Result<Option<String>> {
    let Some(thread) = store.get_thread(thread_id).await? else {
        return Ok(None);
    };
    if !should_retitle(chat, &thread, created) {
        return Ok(None);
    }

    let max = chat.title_max_chars;
    let fallback = fallback_title(assistant_text, max);
    let title = match summarizer.summarize_title(assistant_text, max).await {
        Ok(raw) => clean_title(&raw, max).unwrap_or(fallback),
        Err(e) => {
            tracing::debug!(thread_id, error = %e, "title summary failed, using fallback");
            fallback
        }
    };

    if title.is_empty()
        || chat.is_placeholder_title(&title)
        || thread.title.as_deref() == Some(title.as_str())
    {
        return Ok(None);
    }

    store
        .update_thread(
            thread_id,
            ThreadUpdate {
                title: Some(title.clone()),
                ..Default::default()
            },
        )
        .await?;
    tracing::info!(thread_id, title = %title, "thread retitled");
    Ok(Some(title))
}
