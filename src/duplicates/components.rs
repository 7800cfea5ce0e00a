//! Connected-components grouping shared by the exact and near matchers.
//!
//! Matchers reduce their comparisons to a list of edges between item
//! indices; [`connected_components`] merges them transitively so that
//! `a ~ b` and `b ~ c` put `a`, `b` and `c` in one group.

/// Disjoint-set forest with path halving and union by size.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    /// Representative of the set containing `x`.
    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the sets containing `a` and `b`; false if already merged.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }
}

/// Groups of item indices connected by `edges`.
///
/// Members are sorted ascending and groups are ordered by their smallest
/// member. Singletons are dropped. Edges naming an index `>= n` are
/// ignored.
#[must_use]
pub fn connected_components<I>(n: usize, edges: I) -> Vec<Vec<usize>>
where
    I: IntoIterator<Item = (usize, usize)>,
{
    let mut sets = UnionFind::new(n);
    for (a, b) in edges {
        if a < n && b < n {
            sets.union(a, b);
        } else {
            log::trace!("Ignoring out-of-range edge ({a}, {b}) for {n} items");
        }
    }

    // Walking indices in order yields members sorted and groups ordered by
    // their first member.
    let mut slot_of_root: Vec<Option<usize>> = vec![None; n];
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for index in 0..n {
        let root = sets.find(index);
        match slot_of_root[root] {
            Some(slot) => groups[slot].push(index),
            None => {
                slot_of_root[root] = Some(groups.len());
                groups.push(vec![index]);
            }
        }
    }

    groups.retain(|group| group.len() > 1);
    groups
}

/// Group `items` by a pairwise equivalence predicate.
///
/// Compares every pair once, so this suits small inputs or cheap
/// predicates; callers with an index structure should build edges
/// themselves and use [`connected_components`].
#[must_use]
pub fn group_by<T, F>(items: &[T], mut related: F) -> Vec<Vec<usize>>
where
    F: FnMut(&T, &T) -> bool,
{
    let mut edges = Vec::new();
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            if related(&items[i], &items[j]) {
                edges.push((i, j));
            }
        }
    }
    connected_components(items.len(), edges)
}
