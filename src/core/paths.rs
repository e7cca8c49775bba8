//! Shared path manipulation utilities.
//!
//! Entity paths are computed, never stored redundantly: each node joins its
//! parent's path with its own folder component. The helpers here keep that
//! composition, the rename token substitution, and the inheritance-relative
//! paths in one place.

use std::path::{Component, Path, PathBuf};

/// Join a single relative filename against an entity path, resolving `.`/`..`
/// components syntactically.
pub fn realize_path(base: &Path, relative: &str) -> PathBuf {
    normalize_syntactic(&base.join(from_forward_slashes(relative)))
}

/// Join many relative filenames against an entity path.
///
/// Same shape in, same shape out: a slice of relatives yields a vec of
/// absolutes in the same order.
pub fn realize_paths<S: AsRef<str>>(base: &Path, relatives: &[S]) -> Vec<PathBuf> {
    relatives
        .iter()
        .map(|rel| realize_path(base, rel.as_ref()))
        .collect()
}

/// Resolve `.` and `..` components without touching the filesystem.
pub fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                } else {
                    components.push(component);
                }
            }
        }
    }
    components.into_iter().collect()
}

/// Split a relative path into its components as strings.
pub fn split_components(relative: &str) -> Vec<String> {
    from_forward_slashes(relative)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Express `target` relative to `base` (both absolute), inserting `..`
/// components where needed. Used for inherited metadata files that live
/// above the scan directory.
pub fn relative_to(target: &Path, base: &Path) -> PathBuf {
    let target = normalize_syntactic(target);
    let base = normalize_syntactic(base);
    let target_parts: Vec<_> = target.components().collect();
    let base_parts: Vec<_> = base.components().collect();

    let common = target_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common..base_parts.len() {
        result.push("..");
    }
    for part in &target_parts[common..] {
        result.push(part);
    }
    result
}

/// Replace every occurrence of each `old` token with the matching `new`
/// token. The slices correlate one-to-one.
pub fn multi_replace(input: &str, old: &[&str], new: &[&str]) -> String {
    debug_assert_eq!(old.len(), new.len());
    let mut out = input.to_string();
    for (from, to) in old.iter().zip(new.iter()) {
        out = out.replace(from, to);
    }
    out
}

/// Prepare a no-folder session's path fragment for token substitution.
///
/// Files of a folderless session carry only the subject token, so the
/// missing session token is injected (`sub-2` becomes `sub-2_ses-none`)
/// before [`multi_replace`] swaps the old ids for the new ones. A combined
/// directory segment is split back into two path segments.
pub fn fix_folderless(no_folder: bool, fragment: &str, old_sub: &str, old_ses: &str) -> String {
    if !no_folder {
        return fragment.to_string();
    }
    let combined = format!("{old_sub}_{old_ses}");
    let fragment = fragment.replace(old_sub, &combined);
    fragment.replace(&format!("{combined}/"), &format!("{old_sub}/{old_ses}/"))
}

/// Change all path separators in a relative path to `/` for manifest rows
/// and map output.
pub fn to_forward_slashes(relative: &str) -> String {
    relative.replace('\\', "/")
}

fn from_forward_slashes(relative: &str) -> PathBuf {
    if std::path::MAIN_SEPARATOR == '/' {
        PathBuf::from(relative)
    } else {
        PathBuf::from(relative.replace('/', std::path::MAIN_SEPARATOR_STR))
    }
}
