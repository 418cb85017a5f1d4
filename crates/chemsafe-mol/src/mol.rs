//! Molecular graph: atoms and bonds on an undirected petgraph graph.
//!
//! `Mol` is built fresh per analysis call by the SMILES decoder and discarded
//! afterwards. Implicit hydrogens are counts on atoms, not graph nodes; after
//! decoding, `hydrogen_count` is the single source of truth for how many Hs
//! an atom carries.

use std::collections::BTreeMap;

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};

use crate::element::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BondOrder {
    #[default]
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    /// Contribution of this bond to an atom's consumed valence. Aromatic
    /// bonds count 1 here; the aromatic system's extra π electron is added
    /// once per aromatic atom during implicit-H assignment.
    pub fn valence_units(self) -> u8 {
        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Atom {
    pub atomic_num: u8,
    pub formal_charge: i8,
    /// Mass number; 0 means natural abundance.
    pub isotope: u16,
    /// Implicit (suppressed) hydrogens on this atom.
    pub hydrogen_count: u8,
    pub is_aromatic: bool,
}

impl Atom {
    pub fn element(&self) -> Option<&'static Element> {
        Element::from_atomic_num(self.atomic_num)
    }

    pub fn symbol(&self) -> &'static str {
        self.element().map(|e| e.symbol).unwrap_or("?")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bond {
    pub order: BondOrder,
}

/// Undirected molecular graph.
#[derive(Debug, Clone, Default)]
pub struct Mol {
    graph: UnGraph<Atom, Bond>,
}

impl Mol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_atom(&mut self, atom: Atom) -> NodeIndex {
        self.graph.add_node(atom)
    }

    pub fn add_bond(&mut self, a: NodeIndex, b: NodeIndex, bond: Bond) -> EdgeIndex {
        self.graph.add_edge(a, b, bond)
    }

    pub fn atom(&self, idx: NodeIndex) -> &Atom {
        &self.graph[idx]
    }

    pub fn atom_mut(&mut self, idx: NodeIndex) -> &mut Atom {
        &mut self.graph[idx]
    }

    pub fn bond(&self, idx: EdgeIndex) -> &Bond {
        &self.graph[idx]
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn atoms(&self) -> impl Iterator<Item = NodeIndex> {
        self.graph.node_indices()
    }

    pub fn bonds(&self) -> impl Iterator<Item = EdgeIndex> {
        self.graph.edge_indices()
    }

    pub fn endpoints(&self, edge: EdgeIndex) -> (NodeIndex, NodeIndex) {
        self.graph.edge_endpoints(edge).expect("edge in graph")
    }

    pub fn neighbors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors(idx)
    }

    pub fn bond_between(&self, a: NodeIndex, b: NodeIndex) -> Option<EdgeIndex> {
        self.graph.find_edge(a, b)
    }

    pub fn bonds_of(&self, idx: NodeIndex) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edges(idx).map(|e| petgraph::visit::EdgeRef::id(&e))
    }

    pub fn degree(&self, idx: NodeIndex) -> usize {
        self.graph.neighbors(idx).count()
    }

    /// Element symbol → total atom count, explicit atoms plus implicit
    /// hydrogens (folded into "H").
    pub fn element_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for idx in self.atoms() {
            let atom = self.atom(idx);
            *counts.entry(atom.symbol()).or_insert(0) += 1;
            if atom.hydrogen_count > 0 {
                *counts.entry("H").or_insert(0) += atom.hydrogen_count as usize;
            }
        }
        counts
    }

    /// Molecular formula in Hill order: C first, H second, then the
    /// remaining elements alphabetically.
    pub fn formula(&self) -> String {
        let counts = self.element_counts();
        let mut out = String::new();
        let mut push = |sym: &str, n: usize| {
            if n == 0 {
                return;
            }
            out.push_str(sym);
            if n > 1 {
                out.push_str(&n.to_string());
            }
        };
        let c = counts.get("C").copied().unwrap_or(0);
        let h = counts.get("H").copied().unwrap_or(0);
        if c > 0 {
            push("C", c);
            push("H", h);
        }
        for (&sym, &n) in &counts {
            if c > 0 && (sym == "C" || sym == "H") {
                continue;
            }
            push(sym, n);
        }
        // Net charge annotation for ions, e.g. N3- for azide.
        let charge: i32 = self.atoms().map(|i| self.atom(i).formal_charge as i32).sum();
        match charge {
            0 => {}
            1 => out.push('+'),
            -1 => out.push('-'),
            n if n > 1 => out.push_str(&format!("+{n}")),
            n => out.push_str(&format!("-{}", -n)),
        }
        out
    }

    /// Molecular weight in g/mol, including implicit hydrogens.
    pub fn weight(&self) -> f64 {
        let h_weight = Element::from_symbol("H").expect("H in table").weight;
        self.atoms()
            .map(|idx| {
                let atom = self.atom(idx);
                let w = atom.element().map(|e| e.weight).unwrap_or(0.0);
                w + atom.hydrogen_count as f64 * h_weight
            })
            .sum()
    }

    /// Sum of bond valence units consumed at `idx` (implicit Hs excluded).
    pub fn bond_valence(&self, idx: NodeIndex) -> u8 {
        self.bonds_of(idx).map(|e| self.bond(e).order.valence_units()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn carbon(h: u8) -> Atom {
        Atom { atomic_num: 6, hydrogen_count: h, ..Default::default() }
    }

    #[test]
    fn formula_hill_order() {
        let mut mol = Mol::new();
        let c = mol.add_atom(carbon(3));
        let o = mol.add_atom(Atom { atomic_num: 8, hydrogen_count: 1, ..Default::default() });
        mol.add_bond(c, o, Bond::default());
        assert_eq!(mol.formula(), "CH4O");
    }

    #[test]
    fn formula_without_carbon_is_alphabetical() {
        let mut mol = Mol::new();
        let n = mol.add_atom(Atom { atomic_num: 7, hydrogen_count: 3, ..Default::default() });
        let _ = n;
        assert_eq!(mol.formula(), "H3N");
    }

    #[test]
    fn weight_counts_implicit_hydrogens() {
        let mut mol = Mol::new();
        mol.add_atom(carbon(4));
        let w = mol.weight();
        assert!((w - 16.043).abs() < 1e-6, "methane weight, got {w}");
    }

    #[test]
    fn charge_annotated_in_formula() {
        let mut mol = Mol::new();
        mol.add_atom(Atom { atomic_num: 7, formal_charge: -1, ..Default::default() });
        assert_eq!(mol.formula(), "N-");
    }

    #[test]
    fn bond_valence_sums_orders() {
        let mut mol = Mol::new();
        let a = mol.add_atom(carbon(0));
        let b = mol.add_atom(carbon(0));
        let c = mol.add_atom(carbon(0));
        mol.add_bond(a, b, Bond { order: BondOrder::Double });
        mol.add_bond(b, c, Bond { order: BondOrder::Single });
        assert_eq!(mol.bond_valence(b), 3);
    }
}
