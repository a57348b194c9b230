//! Utility functions

/// Maximum filename length after sanitization
const MAX_FILENAME_LEN: usize = 200;

/// Sanitize a filename for saving to disk
///
/// Replaces characters that are invalid on common filesystems with `-`,
/// collapses whitespace runs, trims, and truncates to 200 characters.
pub fn sanitize_filename(filename: &str) -> String {
    let replaced: String = filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '-',
            c => c,
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");

    collapsed.chars().take(MAX_FILENAME_LEN).collect()
}
