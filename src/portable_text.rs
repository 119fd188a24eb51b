//! Representation of the Sanity documents that constitute the website: posts, their
//! Portable Text descriptions and image references.
//!
//! Reference doc: https://github.com/portabletext/portabletext

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

//-------------------------------------------------------------------------------------------------
// Posts

/// A post, as returned by the detail query.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub title: String,
    pub slug: Slug,
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "deser_null_default")]
    pub description: Vec<Node>,
    pub video_url: Option<String>,
    #[serde(default, deserialize_with = "deser_null_default")]
    pub tech_stack: Vec<String>,
    #[serde(default, deserialize_with = "deser_lenient")]
    pub thumbnail: Option<ImageRef>,
}

/// A post projected to the fields needed by the listing page. The slug may be missing on
/// drafts or half-edited records, callers skip those.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub title: String,
    pub slug: Option<Slug>,
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "deser_null_default")]
    pub tech_stack: Vec<String>,
    #[serde(default, deserialize_with = "deser_lenient")]
    pub thumbnail: Option<ImageRef>,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        PostSummary {
            title: post.title.clone(),
            slug: Some(post.slug.clone()),
            summary: post.summary.clone(),
            tech_stack: post.tech_stack.clone(),
            thumbnail: post.thumbnail.clone(),
        }
    }
}

/// A slug. Sanity stores it as `{ "_type": "slug", "current": "..." }` but queries often
/// project it to a plain string, so both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slug(pub String);

impl Slug {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Slug {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Plain(String),
            Object { current: String },
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Plain(s) => Slug(s),
            Repr::Object { current } => Slug(current),
        })
    }
}

// A value that doesn't have the expected shape is dropped rather than failing the whole record.
fn deser_lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(err) => {
            warn!("Ignoring malformed field: {}", err);
            None
        }
    }))
}

// GROQ projections yield `null` for absent fields, which `#[serde(default)]` alone rejects.
fn deser_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

//-------------------------------------------------------------------------------------------------
// Images

/// An image field. The asset is missing when it was removed from the field in the studio:
/// Sanity keeps the crop and hotspot around.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageRef {
    pub asset: Option<AssetRef>,
    pub alt: Option<String>,
    pub crop: Option<Crop>,
    pub hotspot: Option<Hotspot>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AssetRef {
    #[serde(rename = "_ref")]
    pub reference: String,
}

/// Crop fractions, relative to the image size, removed from each side.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Crop {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Default for Crop {
    fn default() -> Self {
        Crop { top: 0.0, bottom: 0.0, left: 0.0, right: 0.0 }
    }
}

/// Focus area of an image, as a centre point and size relative to the image size.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Hotspot {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for Hotspot {
    fn default() -> Self {
        Hotspot { x: 0.5, y: 0.5, width: 1.0, height: 1.0 }
    }
}

//-------------------------------------------------------------------------------------------------
// Portable Text

/// A top-level entry of a rich text document.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Block(Block),
    Image(ImageRef),
    /// Any other object type. Kept around so that a rule table can still render it.
    Unknown { type_name: String, value: Value },
}

impl Node {
    pub fn type_name(&self) -> &str {
        match self {
            Node::Block(_) => "block",
            Node::Image(_) => "image",
            Node::Unknown { type_name, .. } => type_name,
        }
    }

    pub fn as_list_item(&self) -> Option<&Block> {
        match self {
            Node::Block(block) if block.list_item.is_some() => Some(block),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let type_name = value.get("_type").and_then(Value::as_str).unwrap_or_default().to_string();

        match type_name.as_str() {
            "block" => serde_json::from_value(value).map(Node::Block).map_err(serde::de::Error::custom),
            "image" => match serde_json::from_value(value.clone()) {
                Ok(image) => Ok(Node::Image(image)),
                Err(err) => {
                    warn!("Malformed image in document: {}", err);
                    Ok(Node::Unknown { type_name, value })
                }
            },
            _ => Ok(Node::Unknown { type_name, value }),
        }
    }
}

/// A paragraph-level node: a paragraph, a heading, a quote or a list item.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    #[serde(rename = "_key")]
    pub key: Option<String>,
    pub style: Option<String>,
    /// List type (`bullet` or `number`) if this block is a list item.
    pub list_item: Option<String>,
    pub level: Option<u32>,
    #[serde(default)]
    pub children: Vec<Inline>,
    #[serde(default)]
    pub mark_defs: Vec<MarkDef>,
}

impl Block {
    pub fn style(&self) -> &str {
        self.style.as_deref().unwrap_or("normal")
    }

    /// List nesting level, starting at 1.
    pub fn level(&self) -> u32 {
        self.level.unwrap_or(1)
    }

    pub fn mark_def(&self, key: &str) -> Option<&MarkDef> {
        self.mark_defs.iter().find(|def| def.key == key)
    }
}

/// An inline child of a block.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Span(Span),
    Unknown { type_name: String, value: Value },
}

impl<'de> Deserialize<'de> for Inline {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let type_name = value.get("_type").and_then(Value::as_str).unwrap_or("span").to_string();

        if type_name == "span" {
            serde_json::from_value(value).map(Inline::Span).map_err(serde::de::Error::custom)
        } else {
            Ok(Inline::Unknown { type_name, value })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Span {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub marks: Vec<String>,
}

/// An annotation definition, referenced by its key from span marks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarkDef {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(rename = "_type")]
    pub type_name: String,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl MarkDef {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn href(&self) -> Option<&str> {
        self.field("href")
    }
}
