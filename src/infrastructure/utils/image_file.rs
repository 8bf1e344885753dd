use derive_more::Display;

const ALLOWED_IMAGE_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "image/svg+xml",
    "image/bmp",
    "image/x-icon",
    "image/vnd.microsoft.icon",
];

/// Checks an upload for emptiness, size and sniffed image type, returning the
/// detected MIME type.
pub fn inspect_image(bytes: &[u8], max_size: usize) -> Result<&'static str, ImageFileError> {
    if bytes.is_empty() {
        return Err(ImageFileError::EmptyFile);
    }
    if bytes.len() > max_size {
        return Err(ImageFileError::FileTooLarge(max_size));
    }

    match infer::get(bytes) {
        Some(kind) if ALLOWED_IMAGE_TYPES.contains(&kind.mime_type()) => Ok(kind.mime_type()),
        Some(kind) => Err(ImageFileError::InvalidType(kind.mime_type().to_string())),
        None if looks_like_svg(bytes) => Ok("image/svg+xml"),
        None => Err(ImageFileError::UnknownType),
    }
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    String::from_utf8_lossy(head).contains("<svg")
}

#[derive(Debug, Display, PartialEq)]
pub enum ImageFileError {
    #[display("File is empty.")]
    EmptyFile,

    #[display("File size exceeds maximum allowed ({_0} bytes).")]
    FileTooLarge(usize),

    #[display("Invalid MIME type: {_0}")]
    InvalidType(String),

    #[display("Could not detect an image type.")]
    UnknownType,
}
