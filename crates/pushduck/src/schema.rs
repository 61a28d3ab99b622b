//! Per-file upload constraints.
//!
//! A [`FileSchema`] describes what a route accepts: file or image kind,
//! size bounds, MIME/extension allowlists, image formats, declarative
//! dimensions, and how many files a single batch may carry. Validation
//! never panics or errors out of band: every violation is reported in the
//! [`ValidationResult`] so a batch can carry per-file outcomes.

use pushduck_common::{format_size, parse_size, FileDescriptor, ImageDimensions, SchemaSummary};

/// S3 single-PUT ceiling; no schema may allow more.
pub const MAX_SINGLE_UPLOAD_BYTES: u64 = 5 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchemaKind {
    #[default]
    File,
    Image,
}

impl SchemaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::File => "file",
            SchemaKind::Image => "image",
        }
    }
}

/// One violation, with a stable machine code and a human message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub code: &'static str,
    pub message: String,
}

/// Outcome of validating one file descriptor.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// All messages joined for the per-file error string.
    pub fn message(&self) -> String {
        self.errors
            .iter()
            .map(|issue| issue.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Constraints for files accepted by one route.
#[derive(Debug, Clone, Default)]
pub struct FileSchema {
    kind: SchemaKind,
    pub(crate) max_size: Option<u64>,
    pub(crate) min_size: Option<u64>,
    /// Exact MIME types, `family/*` wildcards, or bare extensions.
    pub(crate) types: Vec<String>,
    /// Image subtypes (`jpeg`, `png`, ...); only meaningful for images.
    pub(crate) formats: Vec<String>,
    pub(crate) dimensions: Option<ImageDimensions>,
    pub(crate) min_count: Option<usize>,
    pub(crate) max_count: Option<usize>,
    /// Size literals that failed to parse; surfaced when the router builds.
    pub(crate) invalid_sizes: Vec<String>,
}

impl FileSchema {
    /// Any file kind.
    pub fn file() -> Self {
        Self::default()
    }

    /// Image kind: additionally requires an `image/*` MIME type.
    pub fn image() -> Self {
        Self {
            kind: SchemaKind::Image,
            ..Self::default()
        }
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    /// Maximum size as a human literal (`"5MB"`). Invalid literals are
    /// reported when the router is built, not here.
    #[must_use]
    pub fn max_file_size(mut self, size: &str) -> Self {
        match parse_size(size) {
            Ok(bytes) => self.max_size = Some(bytes),
            Err(_) => self.invalid_sizes.push(size.to_string()),
        }
        self
    }

    #[must_use]
    pub fn max_file_size_bytes(mut self, bytes: u64) -> Self {
        self.max_size = Some(bytes);
        self
    }

    #[must_use]
    pub fn min_file_size(mut self, size: &str) -> Self {
        match parse_size(size) {
            Ok(bytes) => self.min_size = Some(bytes),
            Err(_) => self.invalid_sizes.push(size.to_string()),
        }
        self
    }

    /// Allowed types: exact MIME (`image/png`), wildcard (`image/*`) or bare
    /// extension (`pdf`). Matching is case-insensitive.
    #[must_use]
    pub fn types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Image formats (`jpeg`, `png`, `webp`, ...). `jpg` and `jpeg` are
    /// interchangeable.
    #[must_use]
    pub fn formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.formats = formats.into_iter().map(Into::into).collect();
        self
    }

    /// Declarative dimension constraints, echoed to clients; never enforced
    /// server-side (the server only sees metadata).
    #[must_use]
    pub fn dimensions(mut self, dimensions: ImageDimensions) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Bounds on how many files one request may carry.
    #[must_use]
    pub fn count(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_count = min;
        self.max_count = max;
        self
    }

    /// Validate one file descriptor against this schema.
    pub fn validate(&self, file: &FileDescriptor) -> ValidationResult {
        let mut result = ValidationResult::default();

        let max = self.max_size.unwrap_or(MAX_SINGLE_UPLOAD_BYTES);
        if file.size > max {
            result.errors.push(ValidationIssue {
                code: "FILE_TOO_LARGE",
                message: format!("File exceeds {}", format_size(max)),
            });
        }
        if let Some(min) = self.min_size {
            if file.size < min {
                result.errors.push(ValidationIssue {
                    code: "FILE_TOO_SMALL",
                    message: format!("File is smaller than {}", format_size(min)),
                });
            }
        }

        if self.kind == SchemaKind::Image && !file.content_type.starts_with("image/") {
            result.errors.push(ValidationIssue {
                code: "NOT_AN_IMAGE",
                message: format!(
                    "File type '{}' is not an image (image/* required)",
                    file.content_type
                ),
            });
        }

        if !self.types.is_empty() && !self.matches_types(file) {
            result.errors.push(ValidationIssue {
                code: "UNSUPPORTED_FILE_TYPE",
                message: format!(
                    "File type '{}' is not allowed (allowed: {})",
                    file.content_type,
                    self.types.join(", ")
                ),
            });
        }

        if self.kind == SchemaKind::Image && !self.formats.is_empty() {
            let subtype = file
                .content_type
                .split_once('/')
                .map(|(_, subtype)| subtype)
                .unwrap_or("");
            if !self.formats.iter().any(|f| format_matches(f, subtype)) {
                result.errors.push(ValidationIssue {
                    code: "UNSUPPORTED_IMAGE_FORMAT",
                    message: format!(
                        "Image format '{subtype}' is not allowed (allowed: {})",
                        self.formats.join(", ")
                    ),
                });
            }
        }

        result
    }

    fn matches_types(&self, file: &FileDescriptor) -> bool {
        let declared = file.content_type.to_ascii_lowercase();
        let extension = file
            .name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        self.types.iter().any(|allowed| {
            let allowed = allowed.to_ascii_lowercase();
            match allowed.split_once('/') {
                // `family/*` wildcard or exact MIME; either needs a declared type.
                Some((family, "*")) => declared.split_once('/').is_some_and(|(f, _)| f == family),
                Some(_) => !declared.is_empty() && declared == allowed,
                // Bare extension entry.
                None => !extension.is_empty() && extension == allowed.trim_start_matches('.'),
            }
        })
    }

    /// The public facets exposed by the `GET` route listing.
    pub fn summary(&self) -> SchemaSummary {
        SchemaSummary {
            kind: self.kind.as_str().to_string(),
            max_size: self.max_size,
            min_size: self.min_size,
            types: self.types.clone(),
            formats: self.formats.clone(),
            dimensions: self.dimensions,
        }
    }
}

fn format_matches(allowed: &str, subtype: &str) -> bool {
    let allowed = allowed.to_ascii_lowercase();
    let subtype = subtype.to_ascii_lowercase();
    // jpg and jpeg name the same format.
    let canon = |s: &str| if s == "jpg" { "jpeg".to_string() } else { s.to_string() };
    canon(&allowed) == canon(&subtype)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(size: u64) -> FileDescriptor {
        FileDescriptor {
            name: "photo.png".to_string(),
            size,
            content_type: "image/png".to_string(),
        }
    }

    #[test]
    fn test_size_limits() {
        let schema = FileSchema::file().max_file_size("5MB").min_file_size("1KB");

        assert!(schema.validate(&png(2 * 1024 * 1024)).is_ok());

        let too_big = schema.validate(&png(10_000_000));
        assert!(!too_big.is_ok());
        assert!(too_big.message().contains("5MB"));

        let too_small = schema.validate(&png(10));
        assert_eq!(too_small.errors[0].code, "FILE_TOO_SMALL");
    }

    #[test]
    fn test_default_cap_is_the_single_put_limit() {
        let schema = FileSchema::file();
        let huge = FileDescriptor {
            name: "huge.bin".to_string(),
            size: MAX_SINGLE_UPLOAD_BYTES + 1,
            content_type: "application/octet-stream".to_string(),
        };
        assert_eq!(schema.validate(&huge).errors[0].code, "FILE_TOO_LARGE");
    }

    #[test]
    fn test_exact_mime_match() {
        let schema = FileSchema::file().types(["image/png", "image/jpeg"]);
        assert!(schema.validate(&png(1)).is_ok());

        let pdf = FileDescriptor {
            name: "doc.pdf".to_string(),
            size: 1,
            content_type: "application/pdf".to_string(),
        };
        let result = schema.validate(&pdf);
        assert_eq!(result.errors[0].code, "UNSUPPORTED_FILE_TYPE");
        assert!(result.message().contains("application/pdf"));
    }

    #[test]
    fn test_wildcard_mime_match() {
        let schema = FileSchema::file().types(["image/*"]);
        assert!(schema.validate(&png(1)).is_ok());

        let webp = FileDescriptor {
            name: "x.webp".to_string(),
            size: 1,
            content_type: "image/webp".to_string(),
        };
        assert!(schema.validate(&webp).is_ok());

        let text = FileDescriptor {
            name: "x.txt".to_string(),
            size: 1,
            content_type: "text/plain".to_string(),
        };
        assert!(!schema.validate(&text).is_ok());
    }

    #[test]
    fn test_extension_match_when_type_is_empty() {
        let schema = FileSchema::file().types(["pdf", "csv"]);
        let untyped = FileDescriptor {
            name: "report.PDF".to_string(),
            size: 1,
            content_type: String::new(),
        };
        assert!(schema.validate(&untyped).is_ok());

        let wrong = FileDescriptor {
            name: "report.exe".to_string(),
            size: 1,
            content_type: String::new(),
        };
        assert!(!schema.validate(&wrong).is_ok());
    }

    #[test]
    fn test_image_kind_requires_image_mime() {
        let schema = FileSchema::image();
        let pdf = FileDescriptor {
            name: "doc.pdf".to_string(),
            size: 1,
            content_type: "application/pdf".to_string(),
        };
        assert_eq!(schema.validate(&pdf).errors[0].code, "NOT_AN_IMAGE");
    }

    #[test]
    fn test_image_formats_with_jpg_alias() {
        let schema = FileSchema::image().formats(["jpg", "png"]);

        let jpeg = FileDescriptor {
            name: "a.jpg".to_string(),
            size: 1,
            content_type: "image/jpeg".to_string(),
        };
        assert!(schema.validate(&jpeg).is_ok());

        let gif = FileDescriptor {
            name: "a.gif".to_string(),
            size: 1,
            content_type: "image/gif".to_string(),
        };
        assert_eq!(
            schema.validate(&gif).errors[0].code,
            "UNSUPPORTED_IMAGE_FORMAT"
        );
    }

    #[test]
    fn test_multiple_violations_are_all_reported() {
        let schema = FileSchema::image().max_file_size("1KB").types(["image/png"]);
        let bad = FileDescriptor {
            name: "movie.mp4".to_string(),
            size: 10_000_000,
            content_type: "video/mp4".to_string(),
        };
        let result = schema.validate(&bad);
        assert_eq!(result.errors.len(), 3);
        assert!(result.message().contains("; "));
    }

    #[test]
    fn test_invalid_size_literal_is_remembered() {
        let schema = FileSchema::file().max_file_size("five megabytes");
        assert_eq!(schema.invalid_sizes, vec!["five megabytes"]);
    }

    #[test]
    fn test_summary_exposes_public_facets() {
        let schema = FileSchema::image()
            .max_file_size("5MB")
            .types(["image/png", "image/jpeg"]);
        let summary = schema.summary();
        assert_eq!(summary.kind, "image");
        assert_eq!(summary.max_size, Some(5 * 1024 * 1024));
        assert_eq!(summary.types.len(), 2);
    }
}
