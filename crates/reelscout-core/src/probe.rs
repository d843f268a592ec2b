use std::fs;
use std::path::Path;

/// Look for an already-downloaded file for `pk` in `dir`.
///
/// The idempotence key is the filename prefix: downloads are always named
/// `<pk>.<ext>`, so any entry whose name starts with the decimal pk is
/// treated as that item's file. Returns the bare filename of the first
/// match, in directory-entry order.
pub fn existing_for(pk: u64, dir: &Path) -> Option<String> {
    let prefix = pk.to_string();
    let entries = fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        if !entry.path().is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with(&prefix) {
            return Some(name.to_string());
        }
    }
    None
}

/// Album variant: the item is considered present when the pk-named
/// subdirectory exists and is non-empty.
pub fn existing_album_dir(pk: u64, dir: &Path) -> bool {
    let sub = dir.join(pk.to_string());
    if !sub.is_dir() {
        return false;
    }
    fs::read_dir(&sub)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
