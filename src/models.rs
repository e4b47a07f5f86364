use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::constants::IMAGE_BUCKET_SIZE;

/// A post as served by the forum and feed APIs.
///
/// Posts are cached verbatim; once an identity has been admitted to a
/// channel's cache its record is never replaced.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Post {
    /// Identity of the post, unique within a channel.
    #[serde(
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<i64>,
    /// Forum the post belongs to.
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub forum: Option<String>,
    /// URL the post links to.
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    /// Summary or description included with the post.
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: String,
    /// Fully qualified URL of the original image.
    #[serde(
        rename = "origImg",
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub orig_img: Option<String>,
    /// File name of an image hosted on the CDN.
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub img: Option<String>,
    #[serde(
        rename = "w",
        default,
        deserialize_with = "lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub width: Option<u32>,
    #[serde(
        rename = "h",
        default,
        deserialize_with = "lenient_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub height: Option<u32>,
}

impl Post {
    /// The post's identity, if it is a usable cache key.
    ///
    /// Missing, zero and negative identities are rejected.
    #[must_use]
    pub fn identity(&self) -> Option<i64> {
        self.id.filter(|id| *id > 0)
    }

    /// Resolve the image to display for this post.
    ///
    /// A remote image URL wins. Otherwise an internal image is resolved
    /// against `{cdn}/{forum}/{bucket}/{img}`, which needs both an identity
    /// and a forum.
    #[must_use]
    pub fn image_url(&self, cdn_base: &str) -> Option<String> {
        if let Some(orig) = self.orig_img.as_deref().filter(|s| !s.is_empty()) {
            return Some(orig.to_string());
        }

        let img = self.img.as_deref().filter(|s| !s.is_empty())?;
        let id = self.identity()?;
        let forum = self.forum.as_deref()?;

        Some(format!(
            "{}/{}/{}/{}",
            cdn_base.trim_end_matches('/'),
            forum,
            image_bucket(id),
            img
        ))
    }

    /// Host name of the linked page, e.g. `www.npr.org`.
    #[must_use]
    pub fn source_host(&self) -> Option<String> {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(ToString::to_string))
    }
}

/// CDN bucket holding the image of post `id`: `ceil(id / 1000)`.
///
/// Identities that are not positive have no bucket and map to 0.
#[must_use]
pub fn image_bucket(id: i64) -> i64 {
    if id <= 0 {
        return 0;
    }
    (id - 1) / IMAGE_BUCKET_SIZE + 1
}

/// Decode a list of posts one entry at a time.
///
/// Entries that are not post objects are dropped without affecting the rest
/// of the batch.
#[must_use]
pub fn posts_from_values(values: Vec<Value>) -> Vec<Post> {
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Post>(value) {
            Ok(post) => Some(post),
            Err(e) => {
                debug!(error = %e, "Skipping malformed post");
                None
            }
        })
        .collect()
}

/// Deserialize a post list that may be null or contain malformed entries.
pub(crate) fn lenient_posts<'de, D>(deserializer: D) -> Result<Vec<Post>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(posts_from_values(values))
}

/// Accept an integer given as a JSON number, a numeric string, or null.
///
/// Anything unparseable reads as absent.
pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_i64(deserializer)?.and_then(|n| u32::try_from(n).ok()))
}

/// Accept text given as a string or a number; null and other shapes read as
/// absent.
fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}
