//! Rendering boundary for cached posts.

use std::io::Write;
use std::sync::Mutex;

use crate::channel::{parent_feed, Channel, ChannelKind};
use crate::models::Post;

/// Consumer of ordered posts.
pub trait DisplayAdapter: Send + Sync {
    /// Append `posts`, already in display order, to the channel's output.
    fn render(&self, channel: &Channel, posts: &[Post]);

    /// Remove previously rendered output of `channel`.
    fn clear(&self, channel: &Channel);
}

/// Plain-text rendering of posts to any writer.
pub struct TextDisplay<W: Write + Send> {
    out: Mutex<W>,
    cdn_base: String,
}

impl<W: Write + Send> TextDisplay<W> {
    pub fn new(out: W, cdn_base: impl Into<String>) -> Self {
        Self {
            out: Mutex::new(out),
            cdn_base: cdn_base.into(),
        }
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// One text block for `post`: title, source, image, summary and breadcrumb.
///
/// Forum views link up to the parent feed; feed views link to the post's
/// forum.
#[must_use]
pub fn format_post(post: &Post, kind: ChannelKind, cdn_base: &str) -> String {
    let mut lines = vec![format!(
        "#{} {}",
        post.identity().unwrap_or_default(),
        post.title
    )];

    if let Some(host) = post.source_host() {
        lines.push(format!("  Source: {host}"));
    }
    if !post.url.is_empty() {
        lines.push(format!("  {}", post.url));
    }
    if let Some(image) = post.image_url(cdn_base) {
        match (post.width, post.height) {
            (Some(w), Some(h)) => lines.push(format!("  [image {w}x{h}] {image}")),
            _ => lines.push(format!("  [image] {image}")),
        }
    }
    if !post.content.is_empty() {
        lines.push(format!("  {}", post.content));
    }

    let crumb = post.forum.as_deref().and_then(|forum| match kind {
        ChannelKind::RangeScan => parent_feed(forum).map(|feed| format!("/feed/{feed}")),
        ChannelKind::TokenScan => Some(format!("/forum/{forum}")),
    });
    if let Some(crumb) = crumb {
        lines.push(format!("  -> {crumb}"));
    }

    lines.join("\n")
}

impl<W: Write + Send> DisplayAdapter for TextDisplay<W> {
    fn render(&self, channel: &Channel, posts: &[Post]) {
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for post in posts {
            if post.identity().is_none() {
                continue;
            }
            let block = format_post(post, channel.kind(), &self.cdn_base);
            if let Err(e) = writeln!(out, "{block}\n") {
                tracing::warn!(channel = %channel, error = %e, "Failed to write post");
                return;
            }
        }
    }

    fn clear(&self, channel: &Channel) {
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let _ = writeln!(out, "== {channel} ==");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Post {
        Post {
            id: Some(1001),
            forum: Some("Gaming".to_string()),
            url: "https://www.example.com/story".to_string(),
            title: "A story".to_string(),
            content: "Summary".to_string(),
            img: Some("img.webp".to_string()),
            width: Some(640),
            height: Some(360),
            ..Post::default()
        }
    }

    #[test]
    fn test_format_post_in_forum() {
        let text = format_post(&sample(), ChannelKind::RangeScan, "https://cdn.example.com");
        assert!(text.starts_with("#1001 A story"));
        assert!(text.contains("Source: www.example.com"));
        assert!(text.contains("[image 640x360] https://cdn.example.com/Gaming/2/img.webp"));
        assert!(text.contains("-> /feed/Entertainment"));
    }

    #[test]
    fn test_format_post_in_feed_links_forum() {
        let text = format_post(&sample(), ChannelKind::TokenScan, "https://cdn.example.com");
        assert!(text.contains("-> /forum/Gaming"));
    }

    #[test]
    fn test_text_display_skips_invalid_posts() {
        let display = TextDisplay::new(Vec::new(), "https://cdn.example.com");
        let channel = Channel::forum("Gaming").unwrap();
        display.clear(&channel);
        display.render(&channel, &[Post::default(), sample()]);

        let output = String::from_utf8(display.into_inner()).unwrap();
        assert!(output.starts_with("== forum/Gaming =="));
        assert_eq!(output.matches('#').count(), 1);
    }
}
