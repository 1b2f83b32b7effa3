//! Disjoint-set forest used to group transitively overlapping clusters

use rustc_hash::FxHashMap;

/// Union-Find (Disjoint Set Union) with path compression and union by rank
///
/// Elements are arbitrary integer ids. [`groups`](UnionFind::groups) is
/// deterministic: groups come out in the insertion order of their first
/// member, and members keep insertion order inside a group.
#[derive(Debug, Clone, Default)]
pub struct UnionFind {
    /// Insertion order of the elements
    elements: Vec<usize>,
    parent: FxHashMap<usize, usize>,
    rank: FxHashMap<usize, u32>,
}

impl UnionFind {
    /// Create a forest where every element is its own singleton set
    ///
    /// Repeated ids are ignored after their first occurrence.
    pub fn new(elements: impl IntoIterator<Item = usize>) -> Self {
        let mut uf = Self::default();
        for elem in elements {
            uf.insert(elem);
        }
        uf
    }

    /// Add a singleton set; no-op if the element is already known
    pub fn insert(&mut self, elem: usize) {
        if self.parent.contains_key(&elem) {
            return;
        }
        self.elements.push(elem);
        self.parent.insert(elem, elem);
        self.rank.insert(elem, 0);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Find the root of `x`, compressing the path on the way
    ///
    /// Unknown elements are their own root.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while let Some(&parent) = self.parent.get(&root) {
            if parent == root {
                break;
            }
            root = parent;
        }

        let mut node = x;
        while node != root {
            let Some(next) = self.parent.insert(node, root) else {
                break;
            };
            node = next;
        }

        root
    }

    /// Merge the sets containing `x` and `y`
    pub fn union(&mut self, x: usize, y: usize) {
        let root_x = self.find(x);
        let root_y = self.find(y);

        if root_x == root_y {
            return;
        }

        let rank_x = self.rank.get(&root_x).copied().unwrap_or(0);
        let rank_y = self.rank.get(&root_y).copied().unwrap_or(0);

        match rank_x.cmp(&rank_y) {
            std::cmp::Ordering::Greater => {
                self.parent.insert(root_y, root_x);
            }
            std::cmp::Ordering::Less => {
                self.parent.insert(root_x, root_y);
            }
            std::cmp::Ordering::Equal => {
                self.parent.insert(root_y, root_x);
                self.rank.insert(root_x, rank_x + 1);
            }
        }
    }

    /// Group elements by root as `(root, members)` pairs
    pub fn groups(&mut self) -> Vec<(usize, Vec<usize>)> {
        let mut slot_of_root: FxHashMap<usize, usize> = FxHashMap::default();
        let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();

        for i in 0..self.elements.len() {
            let elem = self.elements[i];
            let root = self.find(elem);
            let slot = *slot_of_root.entry(root).or_insert_with(|| {
                groups.push((root, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(elem);
        }

        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_find() {
        let mut uf = UnionFind::new([0, 1, 2, 3, 4]);

        uf.union(0, 1);
        assert_eq!(uf.find(0), uf.find(1));

        uf.union(2, 3);
        assert_eq!(uf.find(2), uf.find(3));

        // Merges two groups
        uf.union(0, 2);
        assert_eq!(uf.find(0), uf.find(2));
        assert_eq!(uf.find(1), uf.find(3));

        assert_ne!(uf.find(4), uf.find(0));

        let groups = uf.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].1, vec![0, 1, 2, 3]);
        assert_eq!(groups[1].1, vec![4]);
    }

    #[test]
    fn test_groups_follow_first_member_order() {
        let mut uf = UnionFind::new([7, 3, 9, 1]);
        uf.union(1, 9);
        let groups: Vec<Vec<usize>> = uf.groups().into_iter().map(|(_, g)| g).collect();
        assert_eq!(groups, vec![vec![7], vec![3], vec![9, 1]]);
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let n = 100_000;
        let mut uf = UnionFind::new(0..n);
        for i in 1..n {
            uf.union(i, i - 1);
        }
        let root = uf.find(0);
        assert_eq!(uf.find(n - 1), root);
        assert_eq!(uf.groups().len(), 1);
    }

    #[test]
    fn test_duplicate_insert_is_ignored() {
        let uf = UnionFind::new([1, 1, 2]);
        assert_eq!(uf.len(), 2);
    }
}
