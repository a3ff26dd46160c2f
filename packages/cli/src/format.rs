const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Human-readable size with a 1024 base, e.g. `1.5 KB`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rendered = format!("{value:.1}");
    let rendered = rendered.strip_suffix(".0").unwrap_or(&rendered);
    format!("{rendered} {}", UNITS[unit])
}

/// Cut `text` to `width` chars, ending with `...` when shortened.
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    }
}

fn join_extension(stem: &str, ext: Option<&str>) -> String {
    match ext {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    }
}

/// Name for an upload: the stem can be replaced by a timestamp, the extension by a new format's.
pub fn upload_name(file_name: &str, new_ext: Option<&str>, stamp: Option<&str>) -> String {
    let (stem, ext) = split_extension(file_name);
    join_extension(stamp.unwrap_or(stem), new_ext.or(ext))
}

/// Name for a converted copy: `photo.webp` for a new format, `photo-copy.jpg` otherwise.
pub fn copy_name(name: &str, new_ext: Option<&str>) -> String {
    let (stem, ext) = split_extension(name);
    match new_ext {
        Some(new_ext) => join_extension(stem, Some(new_ext)),
        None => join_extension(&format!("{stem}-copy"), ext),
    }
}
