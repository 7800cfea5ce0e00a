//! Duplicate groups and their membership.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::files::file_from_row;
use super::{path_to_sql, to_millis, Store, StoreError};
use crate::model::{DuplicateGroup, FileRecord};

const GROUP_SELECT: &str = "SELECT g.id, g.fast, g.size, f.id, f.path, f.size, f.mtime, f.is_directory
     FROM duplicate_groups g
     JOIN duplicate_members m ON g.id = m.group_id
     JOIN files f ON m.file_id = f.id";

const GROUP_ORDER: &str = "ORDER BY g.id, m.position";

struct GroupRow {
    group_id: i64,
    fast: String,
    size: u64,
    member: FileRecord,
}

fn group_row(row: &Row<'_>) -> rusqlite::Result<GroupRow> {
    Ok(GroupRow {
        group_id: row.get(0)?,
        fast: row.get(1)?,
        size: row.get(2)?,
        member: file_from_row(row, 3)?,
    })
}

/// Fold rows ordered by group id into groups.
///
/// Contiguous rows sharing a group id form one group; the open group is
/// flushed when the id changes and once more after the last row. Groups
/// that no longer satisfy the group invariants (a member was deleted or
/// rescanned with a new size) are skipped.
fn assemble<I>(rows: I) -> Result<Vec<DuplicateGroup>, StoreError>
where
    I: IntoIterator<Item = rusqlite::Result<GroupRow>>,
{
    struct Open {
        id: i64,
        fast: String,
        size: u64,
        members: Vec<FileRecord>,
    }

    fn flush(open: Open, out: &mut Vec<DuplicateGroup>) {
        match DuplicateGroup::new(open.fast, open.size, open.members) {
            Ok(group) => out.push(group.with_id(open.id)),
            Err(e) => log::debug!("Skipping stale group {}: {}", open.id, e),
        }
    }

    let mut groups = Vec::new();
    let mut current: Option<Open> = None;

    for row in rows {
        let row = row?;
        match current.as_mut() {
            Some(open) if open.id == row.group_id => open.members.push(row.member),
            _ => {
                if let Some(done) = current.take() {
                    flush(done, &mut groups);
                }
                current = Some(Open {
                    id: row.group_id,
                    fast: row.fast,
                    size: row.size,
                    members: vec![row.member],
                });
            }
        }
    }
    if let Some(done) = current {
        flush(done, &mut groups);
    }

    Ok(groups)
}

fn insert_group(conn: &Connection, group: &DuplicateGroup) -> Result<i64, StoreError> {
    let group_id: i64 = conn.query_row(
        "INSERT INTO duplicate_groups (fast, size, created_at) VALUES (?1, ?2, ?3) RETURNING id",
        params![group.fast_hash, group.size, to_millis(&Utc::now())],
        |row| row.get(0),
    )?;

    let mut lookup = conn.prepare_cached("SELECT id FROM files WHERE path = ?1")?;
    let mut insert = conn.prepare_cached(
        "INSERT INTO duplicate_members (group_id, file_id, position) VALUES (?1, ?2, ?3)",
    )?;
    for (position, member) in group.members().iter().enumerate() {
        let file_id: i64 = lookup
            .query_row([path_to_sql(&member.path)], |row| row.get(0))
            .optional()?
            .ok_or_else(|| StoreError::MissingMember(member.path.clone()))?;
        insert.execute(params![group_id, file_id, position as i64])?;
    }

    Ok(group_id)
}

impl Store {
    /// Save a group and its members in one transaction.
    ///
    /// Members are matched to stored files by path. If any member is not a
    /// recorded file, nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingMember`] for an unknown member, or any
    /// SQLite error; the transaction is rolled back in both cases.
    pub fn save_group(&self, group: &DuplicateGroup) -> Result<DuplicateGroup, StoreError> {
        let tx = self.conn().unchecked_transaction()?;
        let id = insert_group(&tx, group)?;
        tx.commit()?;
        Ok(group.clone().with_id(id))
    }

    /// Replace every stored group with `groups` in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; the previous groups stay intact.
    pub fn replace_groups(&self, groups: &[DuplicateGroup]) -> Result<Vec<DuplicateGroup>, StoreError> {
        let tx = self.conn().unchecked_transaction()?;
        let removed = tx.execute("DELETE FROM duplicate_groups", [])?;
        let saved = groups
            .iter()
            .map(|group| insert_group(&tx, group).map(|id| group.clone().with_id(id)))
            .collect::<Result<Vec<_>, StoreError>>()?;
        tx.commit()?;
        log::debug!("Replaced {} stored groups with {}", removed, saved.len());
        Ok(saved)
    }

    /// Every stored group in id order, members in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn all_groups(&self) -> Result<Vec<DuplicateGroup>, StoreError> {
        let sql = format!("{GROUP_SELECT} {GROUP_ORDER}");
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([], group_row)?;
        assemble(rows)
    }

    /// Stored groups whose fast hash is `fast`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn groups_by_hash(&self, fast: &str) -> Result<Vec<DuplicateGroup>, StoreError> {
        let sql = format!("{GROUP_SELECT} WHERE g.fast = ?1 {GROUP_ORDER}");
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map([fast], group_row)?;
        assemble(rows)
    }

    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_group(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self
            .conn()
            .execute("DELETE FROM duplicate_groups WHERE id = ?1", [id])?
            > 0)
    }

    /// Remove every group; returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_all_groups(&self) -> Result<usize, StoreError> {
        Ok(self.conn().execute("DELETE FROM duplicate_groups", [])?)
    }

    /// Remove groups left with fewer than two members; returns how many.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn prune_groups(&self) -> Result<usize, StoreError> {
        let removed = self.conn().execute(
            "DELETE FROM duplicate_groups WHERE id IN (
                 SELECT g.id FROM duplicate_groups g
                 LEFT JOIN duplicate_members m ON g.id = m.group_id
                 GROUP BY g.id
                 HAVING COUNT(m.file_id) < 2
             )",
            [],
        )?;
        if removed > 0 {
            log::debug!("Pruned {} groups with fewer than 2 members", removed);
        }
        Ok(removed)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn group_count(&self) -> Result<u64, StoreError> {
        Ok(self
            .conn()
            .query_row("SELECT COUNT(*) FROM duplicate_groups", [], |row| row.get(0))?)
    }
}
