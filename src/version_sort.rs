//! Version-aware ordering of archive entries.
//!
//! Embedded digit runs compare as numbers, so `page2` sorts before `page10`.

use regex::Regex;
use std::cmp::Ordering;
use std::path::Path;
use std::sync::LazyLock;

static RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+|\D+").expect("static run pattern is valid"));

/// Compares two strings, treating runs of ASCII digits as numbers.
///
/// Non-digit runs compare bytewise. Digit runs compare by value (leading
/// zeros ignored), then by length so that `1` < `01`. Strings that are equal
/// under these rules fall back to plain ordering.
///
/// # Examples
///
/// ```
/// use make_cbz::version_sort::version_cmp;
/// use std::cmp::Ordering;
///
/// assert_eq!(version_cmp("page2.png", "page10.png"), Ordering::Less);
/// assert_eq!(version_cmp("v1.10", "v1.9"), Ordering::Greater);
/// ```
pub fn version_cmp(a: &str, b: &str) -> Ordering {
    let mut left = RUNS.find_iter(a).map(|m| m.as_str());
    let mut right = RUNS.find_iter(b).map(|m| m.as_str());

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (is_digits(x), is_digits(y)) {
                    (true, true) => numeric_cmp(x, y),
                    _ => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn is_digits(run: &str) -> bool {
    run.bytes().all(|b| b.is_ascii_digit())
}

// Arbitrary-length comparison without parsing into an integer type.
fn numeric_cmp(x: &str, y: &str) -> Ordering {
    let xs = x.trim_start_matches('0');
    let ys = y.trim_start_matches('0');
    xs.len()
        .cmp(&ys.len())
        .then_with(|| xs.cmp(ys))
        .then_with(|| x.len().cmp(&y.len()))
}

/// Compares two relative paths by their `/`-joined string form.
pub fn path_version_cmp(a: &Path, b: &Path) -> Ordering {
    version_cmp(&slash_path(a), &slash_path(b))
}

/// Renders a relative path with `/` separators, as stored in zip entries.
///
/// Components that are not valid UTF-8 are rendered lossily; callers building
/// entry names filter such paths out first.
pub fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
