//! The fixed set of image types this tool manages.
//!
//! Classification is by file extension only: `gif`, `jpeg`/`jpg` and `png`
//! (case-insensitive). Anything else is not an image for our purposes.

use image::ImageFormat;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Gif,
    Jpeg,
    Png,
}

const EXTENSIONS: &[(&str, ImageKind)] = &[
    ("gif", ImageKind::Gif),
    ("jpeg", ImageKind::Jpeg),
    ("jpg", ImageKind::Jpeg),
    ("png", ImageKind::Png),
];

impl ImageKind {
    /// Classify a filename (or relative path) by the text after its last dot.
    ///
    /// ```
    /// # use rethumb::imaging::ImageKind;
    /// assert_eq!(ImageKind::from_filename("2020/01/Photo.JPG"), Some(ImageKind::Jpeg));
    /// assert_eq!(ImageKind::from_filename("notes.pdf"), None);
    /// ```
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        EXTENSIONS
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(ext))
            .map(|(_, kind)| *kind)
    }

    pub fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Gif => "image/gif",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn format(self) -> ImageFormat {
        match self {
            Self::Gif => ImageFormat::Gif,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}
