//! Substructure matching: VF2 backtracking of a [`Query`] into a [`Mol`].
//!
//! Query atoms are tried most-constrained-first (highest degree) to prune
//! early; target candidates are scanned in node-index order, so enumeration
//! is deterministic for a fixed molecule and query.

use std::collections::BTreeSet;

use petgraph::graph::NodeIndex;

use crate::mol::Mol;
use crate::smarts::Query;

/// One embedding of the query: `mapping[i]` is the target atom matched by
/// query atom `i`.
pub type Mapping = Vec<NodeIndex>;

/// All embeddings of `query` in `mol`, including symmetry-equivalent ones.
pub fn find_all(mol: &Mol, query: &Query) -> Vec<Mapping> {
    if query.atom_count() == 0 {
        return vec![Vec::new()];
    }
    let mut order: Vec<usize> = (0..query.atom_count()).collect();
    order.sort_by(|&a, &b| query.degree(b).cmp(&query.degree(a)));

    let mut state = Vf2 {
        mol,
        query,
        order,
        query_map: vec![None; query.atom_count()],
        target_used: vec![false; mol.atom_count()],
        results: Vec::new(),
    };
    state.recurse(0);
    state.results
}

/// Embeddings collapsed by the set of target atoms they cover, keeping the
/// first enumerated representative of each set (RDKit's uniquified matches).
pub fn unique_matches(mol: &Mol, query: &Query) -> Vec<Mapping> {
    let mut seen: BTreeSet<Vec<usize>> = BTreeSet::new();
    let mut out = Vec::new();
    for mapping in find_all(mol, query) {
        let mut key: Vec<usize> = mapping.iter().map(|n| n.index()).collect();
        key.sort_unstable();
        if seen.insert(key) {
            out.push(mapping);
        }
    }
    out
}

/// Count of matches selected greedily so that no two share a target atom.
pub fn count_disjoint_matches(mol: &Mol, query: &Query) -> usize {
    let mut taken = vec![false; mol.atom_count()];
    let mut count = 0usize;
    for mapping in unique_matches(mol, query) {
        if mapping.iter().any(|n| taken[n.index()]) {
            continue;
        }
        for n in &mapping {
            taken[n.index()] = true;
        }
        count += 1;
    }
    count
}

struct Vf2<'a> {
    mol: &'a Mol,
    query: &'a Query,
    order: Vec<usize>,
    query_map: Vec<Option<NodeIndex>>,
    target_used: Vec<bool>,
    results: Vec<Mapping>,
}

impl Vf2<'_> {
    fn recurse(&mut self, depth: usize) {
        if depth == self.order.len() {
            let mapping = (0..self.query.atom_count())
                .map(|q| self.query_map[q].expect("fully mapped"))
                .collect();
            self.results.push(mapping);
            return;
        }

        let query_idx = self.order[depth];
        for t_idx in 0..self.target_used.len() {
            if self.target_used[t_idx] {
                continue;
            }
            let target = NodeIndex::new(t_idx);
            if !self.is_feasible(query_idx, target) {
                continue;
            }

            self.query_map[query_idx] = Some(target);
            self.target_used[t_idx] = true;
            self.recurse(depth + 1);
            self.query_map[query_idx] = None;
            self.target_used[t_idx] = false;
        }
    }

    fn is_feasible(&self, query_idx: usize, target: NodeIndex) -> bool {
        if !self.query.atoms[query_idx].matches(self.mol.atom(target)) {
            return false;
        }
        for (q_neighbor, q_bond) in self.query.neighbors(query_idx) {
            if let Some(t_mapped) = self.query_map[q_neighbor] {
                match self.mol.bond_between(target, t_mapped) {
                    Some(edge) => {
                        if !q_bond.matches(self.mol.bond(edge)) {
                            return false;
                        }
                    }
                    None => return false,
                }
            }
        }
        true
    }
}
