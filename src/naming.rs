//! Derivative filename convention.
//!
//! A derivative of `photo.jpg` at 300×200 is named `photo-300x200.jpg`: the
//! dimensions are spliced in before the extension, and the extension keeps its
//! original case. Only a trailing extension of 3–4 ASCII letters counts, so
//! stems may contain dots (`my.holiday.png` → `my.holiday-300x200.png`).
//!
//! [`DerivativePattern`] is the inverse check used by orphan cleanup: does a
//! sibling file have the `<stem>-<digits>x<digits><ext>` shape of a generated
//! derivative of a given source?

use regex::Regex;
use std::sync::LazyLock;

static EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\.[a-z]{3,4})$").expect("valid extension regex"));

/// Split a filename into `(stem, extension)` where the extension includes the
/// dot. `None` when there is no 3–4 letter extension.
///
/// ```
/// # use rethumb::naming::split_extension;
/// assert_eq!(split_extension("a.b.JPEG"), Some(("a.b", ".JPEG")));
/// assert_eq!(split_extension("archive.gz"), None);
/// ```
pub fn split_extension(filename: &str) -> Option<(&str, &str)> {
    let m = EXTENSION.find(filename)?;
    Some((&filename[..m.start()], m.as_str()))
}

/// Derivative filename for a source filename and target dimensions.
///
/// A filename without a recognizable extension is returned unchanged.
///
/// ```
/// # use rethumb::naming::derivative_filename;
/// assert_eq!(derivative_filename("dawn.JPG", 300, 275), "dawn-300x275.JPG");
/// ```
pub fn derivative_filename(source_filename: &str, width: u32, height: u32) -> String {
    match split_extension(source_filename) {
        Some((stem, ext)) => format!("{stem}-{width}x{height}{ext}"),
        None => source_filename.to_string(),
    }
}

/// Matcher for generated-derivative filenames of one source image.
///
/// Stem and extension are matched literally and case-sensitively; only the
/// `-<digits>x<digits>` suffix is variable.
#[derive(Debug, Clone)]
pub struct DerivativePattern {
    regex: Regex,
}

impl DerivativePattern {
    /// Build the pattern for a source filename (bare name, no directory).
    /// `None` when the source has no 3–4 letter extension.
    pub fn for_source(source_filename: &str) -> Option<Self> {
        let (stem, ext) = split_extension(source_filename)?;
        let pattern = format!(
            "^{}-[0-9]+x[0-9]+{}$",
            regex::escape(stem),
            regex::escape(ext)
        );
        let regex = Regex::new(&pattern).ok()?;
        Some(Self { regex })
    }

    /// Whether `filename` (bare name) looks like a generated derivative.
    pub fn matches(&self, filename: &str) -> bool {
        self.regex.is_match(filename)
    }
}
