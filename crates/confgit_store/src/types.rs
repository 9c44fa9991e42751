//! Versions, profiles and the on-branch layout conventions.
//!
//! A version is one branch. Inside a version branch, profiles live under
//! [`PROFILES_ROOT`]; a directory is a profile when its name carries
//! [`PROFILE_FOLDER_SUFFIX`], otherwise it only groups nested profiles.
//! Hierarchical profile ids map onto that nesting: id `net-dns` lives in
//! `profiles/net/dns.profile`.

use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Directory at the branch root that holds all profile directories.
pub const PROFILES_ROOT: &str = "profiles";

/// Directory-name suffix that marks a profile directory.
pub const PROFILE_FOLDER_SUFFIX: &str = ".profile";

/// File inside each profile directory holding the profile attributes;
/// its presence marks the directory as a live profile.
pub const PROFILE_METADATA_FILE: &str = "profile.attributes";

/// File at the branch root holding version attributes.
pub const VERSION_ATTRIBUTES_FILE: &str = "version.attributes";

/// Profile attribute declaring the ordered, space-separated parent ids.
pub const ATTRIBUTE_PARENTS: &str = "parents";

/// The branch directory of a profile id.
///
/// Every `-` in the id opens a nesting level; the leaf directory carries
/// the profile suffix.
pub fn profile_directory(profile_id: &str) -> String {
    format!(
        "{PROFILES_ROOT}/{}{PROFILE_FOLDER_SUFFIX}",
        profile_id.replace('-', "/")
    )
}

/// Orders version ids by dot-separated segments, numerically where both
/// segments are numeric (`1.2` before `1.10`), lexicographically otherwise.
pub fn compare_version_ids(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ordering = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(n), Ok(m)) => n.cmp(&m),
                    _ => x.cmp(y),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

/// A fully resolved profile: its own configuration with every ancestor
/// merged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Profile id.
    pub id: String,
    /// Owning version id.
    pub version: String,
    /// Profile attributes, parsed from the metadata file.
    pub attributes: BTreeMap<String, String>,
    /// Declared parent ids, in declaration order.
    pub parents: Vec<String>,
    /// File configurations: relative path to file content. Files merge
    /// per path; a child's file replaces an ancestor's file wholesale.
    pub file_configurations: BTreeMap<String, Vec<u8>>,
    /// Structured configurations derived from properties files, keyed by
    /// configuration name. These merge per key within each name.
    pub configurations: BTreeMap<String, BTreeMap<String, String>>,
    /// Abbreviated id of the last commit touching the profile directory.
    pub last_modified: String,
}

impl Profile {
    /// The bytes of one file configuration.
    pub fn file_configuration(&self, path: &str) -> Option<&[u8]> {
        self.file_configurations.get(path).map(Vec::as_slice)
    }

    /// One structured configuration map.
    pub fn configuration(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.configurations.get(name)
    }
}

/// A fully resolved version: attributes plus its resolved profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    id: String,
    attributes: BTreeMap<String, String>,
    profiles: BTreeMap<String, Profile>,
}

impl Version {
    /// Creates a version with no profiles.
    pub fn new(id: impl Into<String>, attributes: BTreeMap<String, String>) -> Self {
        Self {
            id: id.into(),
            attributes,
            profiles: BTreeMap::new(),
        }
    }

    /// The version id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The version attributes.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Adds a resolved profile.
    pub fn insert_profile(&mut self, profile: Profile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Looks up a resolved profile.
    pub fn profile(&self, profile_id: &str) -> Option<&Profile> {
        self.profiles.get(profile_id)
    }

    /// Whether the version contains a profile.
    pub fn has_profile(&self, profile_id: &str) -> bool {
        self.profiles.contains_key(profile_id)
    }

    /// Sorted profile ids.
    pub fn profile_ids(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    /// Iterates the resolved profiles in id order.
    pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values()
    }
}

/// Write-side description of a profile, with parents embedded so a whole
/// hierarchy can be materialized in one operation.
#[derive(Debug, Clone, Default)]
pub struct ProfileSpec {
    /// Owning version id.
    pub version: String,
    /// Profile id.
    pub id: String,
    /// Profile attributes (the parents attribute is derived from
    /// `parents` and overrides any explicit entry).
    pub attributes: BTreeMap<String, String>,
    /// File configurations to write, relative to the profile directory.
    pub file_configurations: BTreeMap<String, Vec<u8>>,
    /// Parent profiles, materialized before this one.
    pub parents: Vec<ProfileSpec>,
}

impl ProfileSpec {
    /// Creates an empty spec.
    pub fn new(version: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            id: id.into(),
            ..Self::default()
        }
    }

    /// Adds a file configuration.
    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.file_configurations.insert(path.into(), contents.into());
        self
    }

    /// Adds an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Adds a parent profile.
    pub fn with_parent(mut self, parent: ProfileSpec) -> Self {
        self.parents.push(parent);
        self
    }

    /// The declared parent ids, in order.
    pub fn parent_ids(&self) -> Vec<String> {
        self.parents.iter().map(|p| p.id.clone()).collect()
    }
}

/// Write-side description of a version with an embedded profile graph.
#[derive(Debug, Clone, Default)]
pub struct VersionSpec {
    /// Version id.
    pub id: String,
    /// Version attributes.
    pub attributes: BTreeMap<String, String>,
    /// Profiles to materialize.
    pub profiles: Vec<ProfileSpec>,
}

impl VersionSpec {
    /// Creates an empty spec.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Adds an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Adds a profile.
    pub fn with_profile(mut self, profile: ProfileSpec) -> Self {
        self.profiles.push(profile);
        self
    }
}
