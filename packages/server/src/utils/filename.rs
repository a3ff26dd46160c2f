/// Longest accepted display name, in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 255;

/// Result of validating a user-supplied display name.
#[derive(Debug, PartialEq, Eq)]
pub enum DisplayNameError {
    /// Name is empty or whitespace-only.
    Empty,
    /// Name is longer than [`MAX_DISPLAY_NAME_LEN`] characters.
    TooLong,
    /// Name contains null bytes.
    NullByte,
    /// Name contains control characters (CR, LF, etc.).
    ControlCharacter,
}

impl DisplayNameError {
    /// Returns a human-readable error message.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "Name cannot be empty",
            Self::TooLong => "Name must be at most 255 characters",
            Self::NullByte => "Invalid name: null bytes are not allowed",
            Self::ControlCharacter => "Invalid name: control characters are not allowed",
        }
    }
}

/// Validates a display name and returns it trimmed.
///
/// The name is opaque text, never a path: separators and dots are kept as-is.
pub fn validate_display_name(name: &str) -> Result<&str, DisplayNameError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(DisplayNameError::Empty);
    }

    if trimmed.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(DisplayNameError::TooLong);
    }

    if trimmed.contains('\0') {
        return Err(DisplayNameError::NullByte);
    }

    // Reject control characters to prevent
    // HTTP header injection (e.g. CRLF in Content-Disposition).
    if trimmed.chars().any(char::is_control) {
        return Err(DisplayNameError::ControlCharacter);
    }

    Ok(trimmed)
}

/// Build the `Content-Disposition` value pinned into upload signatures.
///
/// The output is pure ASCII: a sanitized `filename` for old clients plus an
/// RFC 5987 `filename*` carrying the exact UTF-8 name.
pub fn content_disposition_value(filename: &str) -> String {
    let ascii_safe: String = filename
        .chars()
        .filter(|c| (c.is_ascii_graphic() || *c == ' ') && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii_safe = ascii_safe.trim();
    let ascii_name = if ascii_safe.is_empty() {
        "download"
    } else {
        ascii_safe
    };

    // RFC 5987 percent-encoding for filename*.
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => String::from(b as char),
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!("attachment; filename=\"{ascii_name}\"; filename*=UTF-8''{encoded}")
}
