use serde::Serialize;
use thiserror::Error;

use crate::documents::models::DocumentKind;

/// Hard upload limit: 5 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 5_242_880;

/// Declared types that say nothing about the format. For these the
/// filename extension decides.
const GENERIC_MIME_TYPES: &[&str] = &["application/octet-stream", "binary/octet-stream"];

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("Unsupported file type '{declared}'; accepted types are PDF, DOC and DOCX")]
    UnsupportedType { declared: String },

    #[error("File is {size_bytes} bytes; the limit is {limit_bytes} bytes")]
    TooLarge { size_bytes: u64, limit_bytes: u64 },

    #[error("File is empty")]
    Empty,
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::UnsupportedType { .. } => "UNSUPPORTED_TYPE",
            ValidationError::TooLarge { .. } => "TOO_LARGE",
            ValidationError::Empty => "EMPTY_FILE",
        }
    }
}

/// What the caller tells us about an upload.
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub filename: String,
    pub mime_type: Option<String>,
}

/// A submission that passed validation and may become a Document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedUpload {
    pub filename: String,
    pub kind: DocumentKind,
    pub size_bytes: u64,
}

/// Validates type first, then size. `size_bytes` is the number of bytes
/// actually received, not a caller-declared length.
pub fn validate_upload(
    meta: &UploadMetadata,
    size_bytes: u64,
) -> Result<AcceptedUpload, ValidationError> {
    let kind = check_declared_type(meta)?;

    check_received_size(size_bytes)?;
    if size_bytes == 0 {
        return Err(ValidationError::Empty);
    }

    Ok(AcceptedUpload {
        filename: sanitize_filename(&meta.filename, kind),
        kind,
        size_bytes,
    })
}

/// The type half of `validate_upload`, usable before any bytes are read.
pub fn check_declared_type(meta: &UploadMetadata) -> Result<DocumentKind, ValidationError> {
    resolve_kind(&meta.filename, meta.mime_type.as_deref())
}

/// Fails once `received` bytes exceed the limit. Streaming readers call this
/// per chunk and stop at the first error.
pub fn check_received_size(received: u64) -> Result<(), ValidationError> {
    if received > MAX_UPLOAD_BYTES {
        return Err(ValidationError::TooLarge {
            size_bytes: received,
            limit_bytes: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

fn resolve_kind(filename: &str, mime_type: Option<&str>) -> Result<DocumentKind, ValidationError> {
    let declared = mime_type.map(str::trim).filter(|m| !m.is_empty());

    match declared {
        Some(mime) if !is_generic(mime) => {
            DocumentKind::from_mime(mime).ok_or_else(|| ValidationError::UnsupportedType {
                declared: mime.to_string(),
            })
        }
        _ => DocumentKind::from_filename(filename).ok_or_else(|| {
            ValidationError::UnsupportedType {
                declared: filename
                    .rsplit_once('.')
                    .map(|(_, ext)| format!(".{ext}"))
                    .unwrap_or_else(|| "unknown".to_string()),
            }
        }),
    }
}

fn is_generic(mime: &str) -> bool {
    GENERIC_MIME_TYPES
        .iter()
        .any(|generic| generic.eq_ignore_ascii_case(mime))
}

/// Keeps only the final path component; browsers on some platforms send
/// full client paths.
pub fn sanitize_filename(raw: &str, kind: DocumentKind) -> String {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>();

    if name.is_empty() || name == "." || name == ".." {
        format!("document.{}", kind.extension())
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(filename: &str, mime: Option<&str>) -> UploadMetadata {
        UploadMetadata {
            filename: filename.to_string(),
            mime_type: mime.map(String::from),
        }
    }

    #[test]
    fn test_streaming_checks() {
        assert_eq!(
            check_declared_type(&meta("cv.docx", Some("application/octet-stream"))),
            Ok(DocumentKind::Docx)
        );
        assert!(matches!(
            check_declared_type(&meta("setup.exe", Some("application/x-msdownload"))),
            Err(ValidationError::UnsupportedType { .. })
        ));

        assert!(check_received_size(MAX_UPLOAD_BYTES).is_ok());
        assert_eq!(
            check_received_size(MAX_UPLOAD_BYTES + 1),
            Err(ValidationError::TooLarge {
                size_bytes: MAX_UPLOAD_BYTES + 1,
                limit_bytes: MAX_UPLOAD_BYTES
            })
        );
    }

    #[test]
    fn test_accepts_pdf_under_limit() {
        let accepted = validate_upload(&meta("resume.pdf", Some("application/pdf")), 200 * 1024)
            .unwrap();
        assert_eq!(accepted.kind, DocumentKind::Pdf);
        assert_eq!(accepted.filename, "resume.pdf");
    }

    #[test]
    fn test_rejects_executable() {
        let err = validate_upload(
            &meta("resume.exe", Some("application/x-msdownload")),
            1024,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnsupportedType {
                declared: "application/x-msdownload".to_string()
            }
        );
        assert_eq!(err.code(), "UNSUPPORTED_TYPE");
    }

    #[test]
    fn test_declared_type_wins_over_extension() {
        let err = validate_upload(&meta("resume.pdf", Some("image/png")), 1024).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedType { .. }));
    }

    #[test]
    fn test_generic_type_falls_back_to_extension() {
        let accepted =
            validate_upload(&meta("CV.DOCX", Some("application/octet-stream")), 10).unwrap();
        assert_eq!(accepted.kind, DocumentKind::Docx);

        let accepted = validate_upload(&meta("cv.doc", None), 10).unwrap();
        assert_eq!(accepted.kind, DocumentKind::Doc);

        let err = validate_upload(&meta("resume.exe", None), 10).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnsupportedType {
                declared: ".exe".to_string()
            }
        );
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let docx = Some(DocumentKind::Docx.mime_type());
        assert!(validate_upload(&meta("resume.docx", docx), MAX_UPLOAD_BYTES).is_ok());

        let err = validate_upload(&meta("resume.docx", docx), MAX_UPLOAD_BYTES + 1).unwrap_err();
        assert_eq!(err.code(), "TOO_LARGE");

        let six_mb = 6 * 1024 * 1024;
        assert_eq!(
            validate_upload(&meta("resume.docx", docx), six_mb).unwrap_err(),
            ValidationError::TooLarge {
                size_bytes: six_mb,
                limit_bytes: MAX_UPLOAD_BYTES
            }
        );
    }

    #[test]
    fn test_type_is_checked_before_size() {
        let err = validate_upload(&meta("movie.exe", None), MAX_UPLOAD_BYTES * 2).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedType { .. }));
    }

    #[test]
    fn test_rejects_empty_file() {
        let err = validate_upload(&meta("resume.pdf", Some("application/pdf")), 0).unwrap_err();
        assert_eq!(err, ValidationError::Empty);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(
            sanitize_filename("C:\\Users\\me\\resume.pdf", DocumentKind::Pdf),
            "resume.pdf"
        );
        assert_eq!(
            sanitize_filename("../../etc/cv.doc", DocumentKind::Doc),
            "cv.doc"
        );
        assert_eq!(sanitize_filename("  ", DocumentKind::Docx), "document.docx");
    }
}
