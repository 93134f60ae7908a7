//! File name helpers used to suggest output names.

/// Split a file name into its stem and extension.
///
/// The extension is whatever follows the last dot, if non-empty. A single trailing
/// dot is ignored, so `"notes."` has stem `"notes"` and no extension, and `".txt"`
/// has an empty stem.
pub fn parse_file_name(file_name: &str) -> (&str, Option<&str>) {
    let trimmed = file_name.strip_suffix('.').unwrap_or(file_name);
    match trimmed.rfind('.') {
        Some(dot) if dot + 1 < trimmed.len() => (&trimmed[..dot], Some(&trimmed[dot + 1..])),
        _ => (trimmed, None),
    }
}

/// Append `.extension` to `name`. An empty or missing extension leaves it unchanged.
pub fn add_extension(name: &str, extension: Option<&str>) -> String {
    match extension {
        Some(ext) if !ext.is_empty() => format!("{name}.{ext}"),
        _ => name.to_string(),
    }
}

/// Replace the extension of `name` (everything from the last dot), or append one.
///
/// An empty or missing extension strips the current one instead.
pub fn change_extension(name: &str, extension: Option<&str>) -> String {
    let stem = name.rfind('.').map_or(name, |dot| &name[..dot]);
    match extension {
        Some(ext) if !ext.is_empty() => format!("{stem}.{ext}"),
        _ => stem.to_string(),
    }
}
