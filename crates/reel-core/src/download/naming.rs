//! Local file naming for saved artifacts.

use std::path::{Path, PathBuf};

use crate::job::JobId;

/// Used when a suggested name sanitizes to nothing.
const FALLBACK_NAME: &str = "video.mp4";

/// Suffix of the file a save writes into before the atomic rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Default name offered for a job's artifact.
pub fn suggested_file_name(job_id: &JobId) -> String {
    sanitize_file_name(&format!("ai_video_{job_id}.mp4"))
}

/// Make a name safe to create in a local directory.
///
/// Path separators, NUL and control characters become `_` (runs collapse),
/// leading/trailing dots, spaces and underscores are dropped, and the result
/// is cut to 255 bytes on a char boundary.
pub fn sanitize_file_name(name: &str) -> String {
    const NAME_MAX: usize = 255;

    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let unsafe_char = matches!(c, '\0' | '/' | '\\') || c.is_control() || c.is_whitespace();
        if !unsafe_char {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_' || c == ' ');
    let mut take = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    let name = &trimmed[..take];
    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// `video.mp4` → `video.mp4.part`.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}
