/// Content-based file classification.
///
/// Files are classified by inspecting their leading bytes, never by their
/// name or extension. A [`ContentSniffer`] turns file content into a
/// human-readable type description, and [`classify_description`] decides
/// whether that description denotes an image.
///
/// # Examples
///
/// ```
/// use make_cbz::classify::{Classification, classify_description};
///
/// assert_eq!(
///     classify_description(Some("Image data, image/png"), "image"),
///     Classification::Image
/// );
/// assert_eq!(
///     classify_description(Some("Document data, application/pdf"), "image"),
///     Classification::NonImage
/// );
/// assert_eq!(classify_description(None, "image"), Classification::Unknown);
/// ```
use serde::Serialize;
use std::io;
use std::path::Path;

/// Result of classifying a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// The content was identified as an image.
    Image,
    /// The content was identified as something other than an image.
    NonImage,
    /// The content could not be identified.
    Unknown,
}

impl Classification {
    pub fn is_image(&self) -> bool {
        matches!(self, Classification::Image)
    }

    /// Short label used in listings.
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Image => "image",
            Classification::NonImage => "other",
            Classification::Unknown => "unknown",
        }
    }
}

/// Produces a human-readable type description from file content.
pub trait ContentSniffer {
    /// Describes the content of the file at `path`.
    ///
    /// Returns `Ok(None)` when the content is not recognised.
    fn describe(&self, path: &Path) -> io::Result<Option<String>>;
}

/// Sniffer backed by the `infer` crate's magic-number matchers.
///
/// Only the head of each file is read.
#[derive(Debug, Clone, Copy, Default)]
pub struct InferSniffer;

impl ContentSniffer for InferSniffer {
    fn describe(&self, path: &Path) -> io::Result<Option<String>> {
        let kind = infer::get_from_path(path)?;
        Ok(kind.map(|kind| {
            format!(
                "{} data, {}",
                matcher_label(kind.matcher_type()),
                kind.mime_type()
            )
        }))
    }
}

fn matcher_label(matcher: infer::MatcherType) -> &'static str {
    use infer::MatcherType;
    match matcher {
        MatcherType::App => "Application",
        MatcherType::Archive => "Archive",
        MatcherType::Audio => "Audio",
        MatcherType::Book => "Book",
        MatcherType::Doc => "Document",
        MatcherType::Font => "Font",
        MatcherType::Image => "Image",
        MatcherType::Text => "Text",
        MatcherType::Video => "Video",
        _ => "Custom",
    }
}

/// Maps a type description to a [`Classification`].
///
/// A description containing `token` (compared case-insensitively) is an
/// image. A missing description is [`Classification::Unknown`].
pub fn classify_description(description: Option<&str>, token: &str) -> Classification {
    match description {
        None => Classification::Unknown,
        Some(desc) if desc.to_lowercase().contains(&token.to_lowercase()) => {
            Classification::Image
        }
        Some(_) => Classification::NonImage,
    }
}

/// Classifies files by sniffing their content.
pub struct Classifier {
    sniffer: Box<dyn ContentSniffer>,
    token: String,
}

impl Classifier {
    /// Creates a classifier with the default `infer`-backed sniffer.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_sniffer(InferSniffer, token)
    }

    /// Creates a classifier with a custom sniffer.
    pub fn with_sniffer(sniffer: impl ContentSniffer + 'static, token: impl Into<String>) -> Self {
        Self {
            sniffer: Box::new(sniffer),
            token: token.into(),
        }
    }

    /// Sniffs and classifies the file at `path`.
    pub fn classify(&self, path: &Path) -> io::Result<Classification> {
        let description = self.sniffer.describe(path)?;
        Ok(classify_description(description.as_deref(), &self.token))
    }
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
