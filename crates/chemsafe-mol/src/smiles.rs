//! SMILES decoding.
//!
//! Hand-rolled single-pass parser over the practical SMILES subset seen in
//! synthesis plans: organic-subset atoms, aromatic lowercase atoms, bracket
//! atoms (isotope / explicit H / formal charge), branches, ring-bond
//! closures (including `%nn`), `.` disconnections and the bond symbols
//! `- = # : / \` (directional bonds are read as single; stereochemistry is
//! out of scope).
//!
//! Implicit hydrogens are assigned from default valences at the end of the
//! parse. An atom written bare whose consumed valence fits no default
//! valence is rejected, so malformed notation never yields a partial graph.

use petgraph::graph::NodeIndex;
use std::collections::HashMap;

use crate::element::Element;
use crate::mol::{Atom, Bond, BondOrder, Mol};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SmilesError {
    #[error("empty SMILES input")]
    EmptyInput,
    #[error("unexpected character {ch:?} at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unknown element symbol {0:?}")]
    UnknownElement(String),
    #[error("element {0:?} cannot be aromatic")]
    NotAromatic(String),
    #[error("unclosed bracket atom")]
    UnclosedBracket,
    #[error("unbalanced parenthesis")]
    UnbalancedParen,
    #[error("ring bond {0} never closed")]
    UnclosedRing(u16),
    #[error("ring bond {0} closed with conflicting bond orders")]
    ConflictingRingBond(u16),
    #[error("bond with no preceding atom")]
    DanglingBond,
    #[error("branch with no preceding atom")]
    DanglingBranch,
    #[error("atom {symbol} exceeds its allowed valence ({valence})")]
    BadValence { symbol: &'static str, valence: u8 },
}

/// Largest formal-charge magnitude accepted in a bracket atom (the
/// OpenSMILES limit).
const MAX_CHARGE_MAGNITUDE: u32 = 15;

/// Decode a SMILES string into a molecular graph.
pub fn parse(input: &str) -> Result<Mol, SmilesError> {
    Parser::new(input.trim())?.run()
}

/// Whether `input` decodes to a valid molecular graph.
pub fn is_valid(input: &str) -> bool {
    parse(input).is_ok()
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    mol: Mol,
    /// Atom the next bond attaches to; `None` right after `.` or at start.
    prev: Option<NodeIndex>,
    /// Saved `prev` values for open branches.
    stack: Vec<NodeIndex>,
    /// Open ring-bond labels → (atom, bond symbol written at the opening).
    rings: HashMap<u16, (NodeIndex, Option<BondOrder>)>,
    /// Pending explicit bond symbol for the next atom or ring closure.
    pending: Option<BondOrder>,
    /// Atoms whose H count was fixed by a bracket (skip implicit assignment).
    explicit_h: Vec<bool>,
}

impl Parser {
    fn new(input: &str) -> Result<Self, SmilesError> {
        if input.is_empty() {
            return Err(SmilesError::EmptyInput);
        }
        Ok(Self {
            chars: input.chars().collect(),
            pos: 0,
            mol: Mol::new(),
            prev: None,
            stack: Vec::new(),
            rings: HashMap::new(),
            pending: None,
            explicit_h: Vec::new(),
        })
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn run(mut self) -> Result<Mol, SmilesError> {
        while let Some(ch) = self.peek() {
            match ch {
                'A'..='Z' | 'b' | 'c' | 'n' | 'o' | 'p' | 's' => self.parse_bare_atom()?,
                '[' => self.parse_bracket_atom()?,
                '-' | '=' | '#' | ':' | '/' | '\\' => {
                    if self.prev.is_none() {
                        return Err(SmilesError::DanglingBond);
                    }
                    self.pending = Some(bond_symbol(ch));
                    self.pos += 1;
                }
                '(' => {
                    let prev = self.prev.ok_or(SmilesError::DanglingBranch)?;
                    self.stack.push(prev);
                    self.pos += 1;
                }
                ')' => {
                    let restored = self.stack.pop().ok_or(SmilesError::UnbalancedParen)?;
                    self.prev = Some(restored);
                    self.pos += 1;
                }
                '.' => {
                    if self.pending.is_some() {
                        return Err(SmilesError::DanglingBond);
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                '0'..='9' | '%' => self.parse_ring_bond()?,
                _ => {
                    return Err(SmilesError::UnexpectedChar { ch, pos: self.pos });
                }
            }
        }
        if !self.stack.is_empty() {
            return Err(SmilesError::UnbalancedParen);
        }
        if let Some((&label, _)) = self.rings.iter().next() {
            return Err(SmilesError::UnclosedRing(label));
        }
        if self.pending.is_some() {
            return Err(SmilesError::DanglingBond);
        }
        if self.mol.atom_count() == 0 {
            return Err(SmilesError::EmptyInput);
        }
        self.assign_implicit_hydrogens()?;
        Ok(self.mol)
    }

    fn parse_bare_atom(&mut self) -> Result<(), SmilesError> {
        let start = self.pos;
        let first = self.bump().expect("peeked");
        let aromatic = first.is_ascii_lowercase();

        let mut symbol = String::new();
        symbol.push(first.to_ascii_uppercase());
        // Two-letter organic-subset symbols (Cl, Br) are the only bare
        // multi-char atoms.
        if let Some(next) = self.peek() {
            if (first == 'C' && next == 'l') || (first == 'B' && next == 'r') {
                symbol.push(next);
                self.pos += 1;
            }
        }

        let element = Element::from_symbol(&symbol)
            .filter(|e| e.organic_subset)
            .ok_or_else(|| SmilesError::UnexpectedChar { ch: first, pos: start })?;
        if aromatic && !element.aromatic {
            return Err(SmilesError::NotAromatic(symbol));
        }

        let idx = self.push_atom(Atom {
            atomic_num: element.atomic_num,
            is_aromatic: aromatic,
            ..Default::default()
        });
        self.explicit_h.push(false);
        debug_assert_eq!(self.explicit_h.len(), idx.index() + 1);
        Ok(())
    }

    fn parse_bracket_atom(&mut self) -> Result<(), SmilesError> {
        self.pos += 1; // consume '['

        let isotope = self.read_number().unwrap_or(0);

        let mut symbol = String::new();
        match self.peek() {
            Some(ch) if ch.is_ascii_alphabetic() => {
                symbol.push(ch);
                self.pos += 1;
            }
            _ => return Err(SmilesError::UnclosedBracket),
        }
        let aromatic = symbol.chars().next().map(|c| c.is_ascii_lowercase()).unwrap_or(false);
        if let Some(next) = self.peek() {
            // A following lowercase letter extends the symbol (Cl, Br, Na, …)
            // unless it is itself a feature character.
            if next.is_ascii_lowercase() && !matches!(next, 'h' | '@') {
                let mut two = symbol.clone();
                two.push(next);
                let cand = two.to_uppercase_first();
                if Element::from_symbol(&cand).is_some() {
                    symbol = two;
                    self.pos += 1;
                }
            }
        }
        let lookup = symbol.to_uppercase_first();
        let element =
            Element::from_symbol(&lookup).ok_or(SmilesError::UnknownElement(lookup.clone()))?;
        if aromatic && !element.aromatic {
            return Err(SmilesError::NotAromatic(lookup));
        }

        let mut hydrogen_count = 0u8;
        let mut formal_charge = 0i8;
        loop {
            match self.peek() {
                Some('@') => {
                    // Chirality tags are accepted and ignored.
                    self.pos += 1;
                }
                Some('H') => {
                    self.pos += 1;
                    hydrogen_count = self.read_number().unwrap_or(1) as u8;
                }
                Some('+') => {
                    self.pos += 1;
                    formal_charge = self.read_signed_charge(1);
                }
                Some('-') => {
                    self.pos += 1;
                    formal_charge = self.read_signed_charge(-1);
                }
                Some(':') => {
                    // Atom-map class, irrelevant here.
                    self.pos += 1;
                    let _ = self.read_number();
                }
                Some(']') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(SmilesError::UnclosedBracket),
            }
        }

        let idx = self.push_atom(Atom {
            atomic_num: element.atomic_num,
            formal_charge,
            isotope: isotope as u16,
            hydrogen_count,
            is_aromatic: aromatic,
        });
        self.explicit_h.push(true);
        debug_assert_eq!(self.explicit_h.len(), idx.index() + 1);
        Ok(())
    }

    /// `+` / `-` already consumed; reads `++`, `+2` style tails. Magnitude
    /// is capped at [`MAX_CHARGE_MAGNITUDE`] so pathological input cannot
    /// overflow the `i8` charge field.
    fn read_signed_charge(&mut self, sign: i8) -> i8 {
        let magnitude = if let Some(n) = self.read_number() {
            n.min(MAX_CHARGE_MAGNITUDE)
        } else {
            let repeat_ch = if sign > 0 { '+' } else { '-' };
            let mut m = 1u32;
            while self.peek() == Some(repeat_ch) {
                m = (m + 1).min(MAX_CHARGE_MAGNITUDE);
                self.pos += 1;
            }
            m
        };
        sign * magnitude as i8
    }

    fn read_number(&mut self) -> Option<u32> {
        let mut value: Option<u32> = None;
        while let Some(ch) = self.peek() {
            if let Some(d) = ch.to_digit(10) {
                value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(d));
                self.pos += 1;
            } else {
                break;
            }
        }
        value
    }

    fn parse_ring_bond(&mut self) -> Result<(), SmilesError> {
        let here = self.prev.ok_or(SmilesError::DanglingBond)?;
        let label: u16 = if self.peek() == Some('%') {
            self.pos += 1;
            let d1 = self.bump().and_then(|c| c.to_digit(10));
            let d2 = self.bump().and_then(|c| c.to_digit(10));
            match (d1, d2) {
                (Some(a), Some(b)) => (a * 10 + b) as u16,
                _ => {
                    return Err(SmilesError::UnexpectedChar {
                        ch: self.chars.get(self.pos.saturating_sub(1)).copied().unwrap_or('%'),
                        pos: self.pos,
                    })
                }
            }
        } else {
            self.bump().and_then(|c| c.to_digit(10)).expect("digit peeked") as u16
        };

        let written = self.pending.take();
        match self.rings.remove(&label) {
            Some((other, opened_with)) => {
                let order = match (opened_with, written) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(SmilesError::ConflictingRingBond(label))
                    }
                    (Some(a), _) => a,
                    (None, Some(b)) => b,
                    (None, None) => {
                        if self.mol.atom(here).is_aromatic && self.mol.atom(other).is_aromatic {
                            BondOrder::Aromatic
                        } else {
                            BondOrder::Single
                        }
                    }
                };
                self.mol.add_bond(other, here, Bond { order });
            }
            None => {
                self.rings.insert(label, (here, written));
            }
        }
        Ok(())
    }

    fn push_atom(&mut self, atom: Atom) -> NodeIndex {
        let aromatic = atom.is_aromatic;
        let idx = self.mol.add_atom(atom);
        if let Some(prev) = self.prev {
            let order = match self.pending.take() {
                Some(order) => order,
                None => {
                    if aromatic && self.mol.atom(prev).is_aromatic {
                        BondOrder::Aromatic
                    } else {
                        BondOrder::Single
                    }
                }
            };
            self.mol.add_bond(prev, idx, Bond { order });
        }
        self.prev = Some(idx);
        idx
    }

    /// Fill `hydrogen_count` for bare atoms from default valences. Aromatic
    /// atoms other than O/S consume one extra valence unit for the shared
    /// π system, which reproduces benzene (1 H per CH), pyridine (0 H on n)
    /// and furan/thiophene (0 H on o/s) without kekulizing.
    fn assign_implicit_hydrogens(&mut self) -> Result<(), SmilesError> {
        let indices: Vec<NodeIndex> = self.mol.atoms().collect();
        for idx in indices {
            if self.explicit_h[idx.index()] {
                continue;
            }
            let atom = self.mol.atom(idx);
            let element = atom.element().ok_or_else(|| {
                SmilesError::UnknownElement(format!("Z={}", atom.atomic_num))
            })?;
            let mut used = self.mol.bond_valence(idx);
            if atom.is_aromatic && !matches!(element.symbol, "O" | "S") {
                used += 1;
            }
            match element.implicit_valence_for(used) {
                Some(valence) => {
                    self.mol.atom_mut(idx).hydrogen_count = valence - used;
                }
                None => {
                    return Err(SmilesError::BadValence {
                        symbol: element.symbol,
                        valence: used,
                    });
                }
            }
        }
        Ok(())
    }
}

fn bond_symbol(ch: char) -> BondOrder {
    match ch {
        '=' => BondOrder::Double,
        '#' => BondOrder::Triple,
        ':' => BondOrder::Aromatic,
        // '-', '/' and '\' all decode as single bonds.
        _ => BondOrder::Single,
    }
}

trait UppercaseFirst {
    fn to_uppercase_first(&self) -> String;
}

impl UppercaseFirst for String {
    fn to_uppercase_first(&self) -> String {
        let mut chars = self.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: usize) -> NodeIndex {
        NodeIndex::new(i)
    }

    #[test]
    fn methane() {
        let mol = parse("C").unwrap();
        assert_eq!(mol.atom_count(), 1);
        assert_eq!(mol.atom(n(0)).hydrogen_count, 4);
    }

    #[test]
    fn ethene_bond_order() {
        let mol = parse("C=C").unwrap();
        let edge = mol.bond_between(n(0), n(1)).unwrap();
        assert_eq!(mol.bond(edge).order, BondOrder::Double);
        assert_eq!(mol.atom(n(0)).hydrogen_count, 2);
    }

    #[test]
    fn branches_restore_attachment_point() {
        // Isobutane: central carbon bonded to three methyls.
        let mol = parse("CC(C)C").unwrap();
        assert_eq!(mol.degree(n(1)), 3);
        assert_eq!(mol.atom(n(1)).hydrogen_count, 1);
    }

    #[test]
    fn benzene_ring_closure_and_hydrogens() {
        let mol = parse("c1ccccc1").unwrap();
        assert_eq!(mol.atom_count(), 6);
        assert_eq!(mol.bond_count(), 6);
        for idx in mol.atoms() {
            assert!(mol.atom(idx).is_aromatic);
            assert_eq!(mol.atom(idx).hydrogen_count, 1);
        }
        let ring_edge = mol.bond_between(n(0), n(5)).unwrap();
        assert_eq!(mol.bond(ring_edge).order, BondOrder::Aromatic);
    }

    #[test]
    fn pyridine_and_furan_heteroatom_hydrogens() {
        let pyridine = parse("c1ccncc1").unwrap();
        let n_idx = pyridine.atoms().find(|&i| pyridine.atom(i).atomic_num == 7).unwrap();
        assert_eq!(pyridine.atom(n_idx).hydrogen_count, 0);

        let furan = parse("c1ccoc1").unwrap();
        let o_idx = furan.atoms().find(|&i| furan.atom(i).atomic_num == 8).unwrap();
        assert_eq!(furan.atom(o_idx).hydrogen_count, 0);
    }

    #[test]
    fn bracket_atom_charge_and_hydrogens() {
        let mol = parse("[NH4+]").unwrap();
        let atom = mol.atom(n(0));
        assert_eq!(atom.atomic_num, 7);
        assert_eq!(atom.formal_charge, 1);
        assert_eq!(atom.hydrogen_count, 4);
    }

    #[test]
    fn nitro_group_decodes() {
        let mol = parse("C[N+](=O)[O-]").unwrap();
        assert_eq!(mol.atom_count(), 4);
        let nitrogen = n(1);
        assert_eq!(mol.atom(nitrogen).formal_charge, 1);
        assert_eq!(mol.atom(nitrogen).hydrogen_count, 0);
        assert_eq!(mol.bond_valence(nitrogen), 4);
    }

    #[test]
    fn disconnected_components() {
        let mol = parse("[Na+].[Cl-]").unwrap();
        assert_eq!(mol.atom_count(), 2);
        assert_eq!(mol.bond_count(), 0);
    }

    #[test]
    fn percent_ring_labels() {
        let mol = parse("C%12CCCCC%12").unwrap();
        assert_eq!(mol.bond_count(), 6);
    }

    #[test]
    fn tnt_formula_and_weight() {
        let mol = parse("Cc1c(cc(cc1[N+](=O)[O-])[N+](=O)[O-])[N+](=O)[O-]").unwrap();
        assert_eq!(mol.formula(), "C7H5N3O6");
        assert!((mol.weight() - 227.13).abs() < 0.05);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse("").is_err());
        assert!(parse("   ").is_err());
        assert!(matches!(parse("C1CC"), Err(SmilesError::UnclosedRing(1))));
        assert!(matches!(parse("C(C"), Err(SmilesError::UnbalancedParen)));
        assert!(matches!(parse("CC)"), Err(SmilesError::UnbalancedParen)));
        assert!(matches!(parse("[N"), Err(SmilesError::UnclosedBracket)));
        assert!(matches!(parse("C="), Err(SmilesError::DanglingBond)));
        assert!(matches!(parse("=C"), Err(SmilesError::DanglingBond)));
        assert!(matches!(parse("[Xx]"), Err(SmilesError::UnknownElement(_))));
    }

    #[test]
    fn rejects_overbonded_bare_atom() {
        assert!(matches!(
            parse("C(C)(C)(C)(C)C"),
            Err(SmilesError::BadValence { symbol: "C", .. })
        ));
    }

    #[test]
    fn extreme_charges_are_clamped() {
        let mol = parse("[N+200]").unwrap();
        assert_eq!(mol.atom(n(0)).formal_charge, 15);
        let mol = parse(&format!("[O{}]", "-".repeat(200))).unwrap();
        assert_eq!(mol.atom(n(0)).formal_charge, -15);
    }

    #[test]
    fn directional_bonds_read_as_single() {
        let mol = parse("F/C=C/F").unwrap();
        assert_eq!(mol.bond_count(), 3);
        let edge = mol.bond_between(n(0), n(1)).unwrap();
        assert_eq!(mol.bond(edge).order, BondOrder::Single);
    }
}
