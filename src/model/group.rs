//! Confirmed exact-duplicate groups.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::PathBuf;

use super::{FileRecord, Hashes};
use crate::error::InvalidArgument;

/// A verified set of two or more files sharing identical content.
///
/// Every member has the same `size` and the same fast digest. Member order
/// is scan insertion order; the first member is conventionally the
/// "original" but that is a display/selection concern, not stored state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GroupFields")]
pub struct DuplicateGroup {
    /// Store id, `None` until saved
    pub id: Option<i64>,
    /// Fast digest shared by all members
    pub fast_hash: String,
    /// File size in bytes (shared by all members)
    pub size: u64,
    /// Member files in insertion order
    members: Vec<FileRecord>,
}

/// Serialized shape of [`DuplicateGroup`], validated through
/// [`DuplicateGroup::new`] on the way in.
#[derive(Deserialize)]
struct GroupFields {
    id: Option<i64>,
    fast_hash: String,
    size: u64,
    members: Vec<FileRecord>,
}

impl TryFrom<GroupFields> for DuplicateGroup {
    type Error = InvalidArgument;

    fn try_from(fields: GroupFields) -> Result<Self, Self::Error> {
        let group = Self::new(fields.fast_hash, fields.size, fields.members)?;
        Ok(Self {
            id: fields.id,
            ..group
        })
    }
}

impl DuplicateGroup {
    /// Create a new duplicate group.
    ///
    /// The caller vouches that every member has `fast_hash`; use
    /// [`DuplicateGroup::from_hashed`] when the per-member hashes are at hand.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if there are fewer than two members, a
    /// member's size differs from `size`, a path appears twice, or the hash
    /// is empty.
    pub fn new(
        fast_hash: impl Into<String>,
        size: u64,
        members: Vec<FileRecord>,
    ) -> Result<Self, InvalidArgument> {
        let fast_hash = fast_hash.into();
        if fast_hash.is_empty() {
            return Err(InvalidArgument::new("duplicate group needs a fast hash"));
        }
        if members.len() < 2 {
            return Err(InvalidArgument::new(format!(
                "a duplicate group must have at least 2 members, got {}",
                members.len()
            )));
        }
        if let Some(bad) = members.iter().find(|m| m.size != size) {
            return Err(InvalidArgument::new(format!(
                "member {} has size {} but the group size is {}",
                bad.path.display(),
                bad.size,
                size
            )));
        }
        let mut seen = HashSet::with_capacity(members.len());
        if let Some(dup) = members.iter().find(|m| !seen.insert(&m.path)) {
            return Err(InvalidArgument::new(format!(
                "member {} appears more than once",
                dup.path.display()
            )));
        }

        Ok(Self {
            id: None,
            fast_hash,
            size,
            members,
        })
    }

    /// Create a group from members paired with their computed hashes.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArgument`] if the fast digests disagree, or for any
    /// reason listed on [`DuplicateGroup::new`].
    pub fn from_hashed(members: Vec<(FileRecord, Hashes)>) -> Result<Self, InvalidArgument> {
        let (first_file, first_hashes) = members
            .first()
            .ok_or_else(|| InvalidArgument::new("a duplicate group must have at least 2 members"))?;
        let fast_hash = first_hashes.fast.clone();
        let size = first_file.size;

        if let Some((bad, hashes)) = members.iter().find(|(_, h)| h.fast != fast_hash) {
            return Err(InvalidArgument::new(format!(
                "member {} has fast hash {} but the group hash is {}",
                bad.path.display(),
                hashes.fast,
                fast_hash
            )));
        }

        Self::new(fast_hash, size, members.into_iter().map(|(f, _)| f).collect())
    }

    /// Copy of this group carrying the given store id.
    #[must_use]
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Member files in insertion order.
    #[must_use]
    pub fn members(&self) -> &[FileRecord] {
        &self.members
    }

    /// Consume the group and return its members.
    #[must_use]
    pub fn into_members(self) -> Vec<FileRecord> {
        self.members
    }

    /// Number of files in this group (always at least 2).
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false`; groups are never constructed empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of duplicate copies (total - 1 original).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.members.len() - 1
    }

    /// Total wasted space: `size * (member_count - 1)`.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * self.duplicate_count() as u64
    }

    /// Total size of all files in this group.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.size * self.members.len() as u64
    }

    /// The first member in insertion order.
    #[must_use]
    pub fn original(&self) -> &FileRecord {
        &self.members[0]
    }

    /// Every member except the first.
    #[must_use]
    pub fn duplicates(&self) -> &[FileRecord] {
        &self.members[1..]
    }

    /// Get just the paths of files in this group.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.members.iter().map(|f| f.path.clone()).collect()
    }

    /// Members reordered by a caller-supplied comparator (stable).
    #[must_use]
    pub fn sorted_members_by<F>(&self, compare: F) -> Vec<FileRecord>
    where
        F: FnMut(&FileRecord, &FileRecord) -> Ordering,
    {
        let mut members = self.members.clone();
        members.sort_by(compare);
        members
    }
}
