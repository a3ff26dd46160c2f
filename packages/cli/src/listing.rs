use clap::ValueEnum;

use crate::client::Image;
use crate::format::{format_bytes, truncate};

const KEY_WIDTH: usize = 38;

/// Client-side ordering for `imgood ls`. Without one the server order (newest first) is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    /// Object key
    Key,
    /// Display name
    Name,
    Size,
    Date,
}

pub fn sort_images(images: &mut [Image], by: SortKey, desc: bool) {
    images.sort_by(|a, b| {
        let ord = match by {
            SortKey::Key => a.oss_key.cmp(&b.oss_key),
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::Size => a.file_size.cmp(&b.file_size),
            SortKey::Date => a.created_at.cmp(&b.created_at),
        }
        .then_with(|| a.oss_key.cmp(&b.oss_key));
        if desc { ord.reverse() } else { ord }
    });
}

pub fn render_rows(images: &[Image], urls: bool) -> Vec<String> {
    let mut rows = Vec::with_capacity(images.len() + 1);
    let header = format!("{:<40} {:>10} {:<20} {}", "KEY", "SIZE", "CREATED", "NAME");
    rows.push(if urls { format!("{header}  URL") } else { header });

    for image in images {
        let size = format_bytes(u64::try_from(image.file_size).unwrap_or_default());
        let row = format!(
            "{:<40} {:>10} {:<20} {}",
            truncate(&image.oss_key, KEY_WIDTH),
            size,
            image.created_at.format("%Y-%m-%d %H:%M:%S"),
            image.name
        );
        rows.push(if urls {
            format!("{row}  {}", image.url)
        } else {
            row
        });
    }
    rows
}
