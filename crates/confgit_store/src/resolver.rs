//! Profile hierarchy loading and resolution.
//!
//! Loading walks the checked-out branch: the profiles root is scanned on
//! the default branch first and the version branch second (the version
//! branch wins duplicates), grouping folders recurse with their name
//! joined into the profile id, and profile leaves are recognized by the
//! directory suffix. Resolution then visits each profile's declared
//! parents depth-first, memoized per pass, with an in-progress stack so a
//! cyclic declaration fails instead of recursing forever.

use std::collections::BTreeMap;

use confgit_repo::Repository;

use crate::error::{StoreError, StoreResult};
use crate::properties::{configuration_name, parse_properties};
use crate::types::{
    Profile, Version, ATTRIBUTE_PARENTS, PROFILE_FOLDER_SUFFIX, PROFILE_METADATA_FILE,
    PROFILES_ROOT, VERSION_ATTRIBUTES_FILE,
};

#[derive(Debug, Clone)]
struct UnresolvedProfile {
    attributes: BTreeMap<String, String>,
    parents: Vec<String>,
    file_configurations: BTreeMap<String, Vec<u8>>,
    configurations: BTreeMap<String, BTreeMap<String, String>>,
    last_modified: String,
}

/// Loads and fully resolves one version from the repository.
///
/// Requires the caller to hold the write lock: both branches are checked
/// out in turn, which moves the shared working tree.
pub(crate) fn load_version(
    repo: &dyn Repository,
    default_branch: &str,
    version_id: &str,
) -> StoreResult<Version> {
    let mut unresolved = BTreeMap::new();
    repo.checkout(default_branch)?;
    collect_profiles(repo, &mut unresolved)?;
    repo.checkout(version_id)?;
    collect_profiles(repo, &mut unresolved)?;

    let attributes = match repo.read_file(VERSION_ATTRIBUTES_FILE)? {
        Some(bytes) => parse_properties(&bytes),
        None => BTreeMap::new(),
    };

    let mut resolved = BTreeMap::new();
    let mut in_progress = Vec::new();
    for profile_id in unresolved.keys().cloned().collect::<Vec<_>>() {
        resolve_profile(
            version_id,
            &profile_id,
            &unresolved,
            &mut resolved,
            &mut in_progress,
        )?;
    }

    let mut version = Version::new(version_id, attributes);
    for profile in resolved.into_values() {
        version.insert_profile(profile);
    }
    Ok(version)
}

fn collect_profiles(
    repo: &dyn Repository,
    unresolved: &mut BTreeMap<String, UnresolvedProfile>,
) -> StoreResult<()> {
    for entry in repo.list_dir(PROFILES_ROOT)? {
        if entry.is_dir {
            let path = format!("{PROFILES_ROOT}/{}", entry.name);
            collect_directory(repo, &path, &entry.name, "", unresolved)?;
        }
    }
    Ok(())
}

fn collect_directory(
    repo: &dyn Repository,
    dir_path: &str,
    dir_name: &str,
    prefix: &str,
    unresolved: &mut BTreeMap<String, UnresolvedProfile>,
) -> StoreResult<()> {
    let Some(stem) = dir_name.strip_suffix(PROFILE_FOLDER_SUFFIX) else {
        // A grouping folder: its name joins the ids of nested profiles.
        let nested_prefix = format!("{prefix}{dir_name}-");
        for entry in repo.list_dir(dir_path)? {
            if entry.is_dir {
                let path = format!("{dir_path}/{}", entry.name);
                collect_directory(repo, &path, &entry.name, &nested_prefix, unresolved)?;
            }
        }
        return Ok(());
    };

    let profile_id = format!("{prefix}{stem}");
    let mut files = BTreeMap::new();
    collect_files(repo, dir_path, "", &mut files)?;

    let metadata = files.get(PROFILE_METADATA_FILE).ok_or_else(|| {
        StoreError::internal(format!(
            "missing profile metadata file in {dir_path}/{PROFILE_METADATA_FILE}"
        ))
    })?;
    let attributes = parse_properties(metadata);
    let parents: Vec<String> = attributes
        .get(ATTRIBUTE_PARENTS)
        .map(|spec| spec.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    let mut configurations = BTreeMap::new();
    for (path, contents) in &files {
        if let Some(name) = configuration_name(path) {
            configurations.insert(name.to_string(), parse_properties(contents));
        }
    }

    let last_modified = repo
        .last_commit_touching(dir_path)?
        .map(|commit| commit.short().to_string())
        .unwrap_or_default();

    unresolved.insert(
        profile_id,
        UnresolvedProfile {
            attributes,
            parents,
            file_configurations: files,
            configurations,
            last_modified,
        },
    );
    Ok(())
}

fn collect_files(
    repo: &dyn Repository,
    root: &str,
    relative: &str,
    out: &mut BTreeMap<String, Vec<u8>>,
) -> StoreResult<()> {
    let dir = if relative.is_empty() {
        root.to_string()
    } else {
        format!("{root}/{relative}")
    };
    for entry in repo.list_dir(&dir)? {
        let child = if relative.is_empty() {
            entry.name.clone()
        } else {
            format!("{relative}/{}", entry.name)
        };
        if entry.is_dir {
            collect_files(repo, root, &child, out)?;
        } else if let Some(contents) = repo.read_file(&format!("{root}/{child}"))? {
            out.insert(child, contents);
        }
    }
    Ok(())
}

fn resolve_profile(
    version_id: &str,
    profile_id: &str,
    unresolved: &BTreeMap<String, UnresolvedProfile>,
    resolved: &mut BTreeMap<String, Profile>,
    in_progress: &mut Vec<String>,
) -> StoreResult<()> {
    if resolved.contains_key(profile_id) {
        return Ok(());
    }
    if in_progress.iter().any(|id| id == profile_id) {
        let mut chain = in_progress.join(" -> ");
        chain.push_str(" -> ");
        chain.push_str(profile_id);
        return Err(StoreError::CyclicInheritance {
            profile_id: profile_id.to_string(),
            chain,
        });
    }

    let raw = unresolved
        .get(profile_id)
        .ok_or_else(|| StoreError::profile_not_found(version_id, profile_id))?;

    in_progress.push(profile_id.to_string());
    for parent_id in &raw.parents {
        resolve_profile(version_id, parent_id, unresolved, resolved, in_progress)?;
    }
    in_progress.pop();

    // Ancestors first, declaration order, then the profile's own values:
    // whole files replace, structured maps merge per key.
    let mut file_configurations = BTreeMap::new();
    let mut configurations: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for parent_id in &raw.parents {
        let parent = &resolved[parent_id];
        file_configurations.extend(parent.file_configurations.clone());
        for (name, map) in &parent.configurations {
            configurations
                .entry(name.clone())
                .or_default()
                .extend(map.clone());
        }
    }
    file_configurations.extend(raw.file_configurations.clone());
    for (name, map) in &raw.configurations {
        configurations
            .entry(name.clone())
            .or_default()
            .extend(map.clone());
    }

    resolved.insert(
        profile_id.to_string(),
        Profile {
            id: profile_id.to_string(),
            version: version_id.to_string(),
            attributes: raw.attributes.clone(),
            parents: raw.parents.clone(),
            file_configurations,
            configurations,
            last_modified: raw.last_modified.clone(),
        },
    );
    Ok(())
}
