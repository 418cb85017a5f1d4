//! Substructure query expressions (SMARTS subset).
//!
//! The hazard library only needs a small slice of SMARTS: bracket atoms
//! constraining element / aromaticity / formal charge / explicit H count,
//! bare organic-subset atoms, branches, ring closures, and the bond symbols
//! `- = # :`. An unwritten bond matches single or aromatic, per SMARTS
//! defaults. Anything outside the subset fails compilation, which the
//! analyzer treats as a per-pattern skip, not a fatal error.

use std::collections::HashMap;

use crate::element::Element;
use crate::mol::{Atom, Bond, BondOrder};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SmartsError {
    #[error("empty SMARTS pattern")]
    EmptyPattern,
    #[error("unsupported SMARTS construct {ch:?} at position {pos}")]
    Unsupported { ch: char, pos: usize },
    #[error("unknown element symbol {0:?} in SMARTS")]
    UnknownElement(String),
    #[error("unclosed bracket expression")]
    UnclosedBracket,
    #[error("unbalanced parenthesis")]
    UnbalancedParen,
    #[error("ring bond {0} never closed")]
    UnclosedRing(u16),
}

/// Constraints one query atom places on a target atom.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryAtom {
    pub atomic_num: Option<u8>,
    pub aromatic: Option<bool>,
    pub formal_charge: Option<i8>,
    pub hydrogen_count: Option<u8>,
}

impl QueryAtom {
    pub fn matches(&self, atom: &Atom) -> bool {
        if let Some(z) = self.atomic_num {
            if atom.atomic_num != z {
                return false;
            }
        }
        if let Some(aromatic) = self.aromatic {
            if atom.is_aromatic != aromatic {
                return false;
            }
        }
        if let Some(charge) = self.formal_charge {
            if atom.formal_charge != charge {
                return false;
            }
        }
        if let Some(h) = self.hydrogen_count {
            if atom.hydrogen_count != h {
                return false;
            }
        }
        true
    }
}

/// Constraint a query bond places on a target bond.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryBond {
    /// `None` = unwritten bond: single or aromatic.
    pub order: Option<BondOrder>,
}

impl QueryBond {
    pub fn matches(&self, bond: &Bond) -> bool {
        match self.order {
            Some(order) => bond.order == order,
            None => matches!(bond.order, BondOrder::Single | BondOrder::Aromatic),
        }
    }
}

/// A compiled substructure query: a small graph of atom/bond constraints.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub atoms: Vec<QueryAtom>,
    /// (atom index, atom index, bond constraint)
    pub bonds: Vec<(usize, usize, QueryBond)>,
}

impl Query {
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn neighbors(&self, idx: usize) -> impl Iterator<Item = (usize, QueryBond)> + '_ {
        self.bonds.iter().filter_map(move |&(a, b, q)| {
            if a == idx {
                Some((b, q))
            } else if b == idx {
                Some((a, q))
            } else {
                None
            }
        })
    }

    pub fn degree(&self, idx: usize) -> usize {
        self.neighbors(idx).count()
    }

    /// Compile a SMARTS-subset expression.
    pub fn compile(pattern: &str) -> Result<Query, SmartsError> {
        let chars: Vec<char> = pattern.trim().chars().collect();
        if chars.is_empty() {
            return Err(SmartsError::EmptyPattern);
        }

        let mut query = Query::default();
        let mut pos = 0usize;
        let mut prev: Option<usize> = None;
        let mut stack: Vec<usize> = Vec::new();
        let mut rings: HashMap<u16, (usize, QueryBond)> = HashMap::new();
        let mut pending: Option<BondOrder> = None;

        while pos < chars.len() {
            let ch = chars[pos];
            match ch {
                '[' => {
                    let (atom, consumed) = parse_bracket(&chars[pos..])?;
                    pos += consumed;
                    let idx = query.atoms.len();
                    query.atoms.push(atom);
                    if let Some(p) = prev {
                        query.bonds.push((p, idx, QueryBond { order: pending.take() }));
                    }
                    prev = Some(idx);
                }
                'A'..='Z' | 'b' | 'c' | 'n' | 'o' | 'p' | 's' => {
                    let aromatic = ch.is_ascii_lowercase();
                    let mut symbol = ch.to_ascii_uppercase().to_string();
                    if let Some(&next) = chars.get(pos + 1) {
                        if (ch == 'C' && next == 'l') || (ch == 'B' && next == 'r') {
                            symbol.push(next);
                            pos += 1;
                        }
                    }
                    pos += 1;
                    let element = Element::from_symbol(&symbol)
                        .ok_or(SmartsError::UnknownElement(symbol))?;
                    let idx = query.atoms.len();
                    query.atoms.push(QueryAtom {
                        atomic_num: Some(element.atomic_num),
                        aromatic: Some(aromatic),
                        ..Default::default()
                    });
                    if let Some(p) = prev {
                        query.bonds.push((p, idx, QueryBond { order: pending.take() }));
                    }
                    prev = Some(idx);
                }
                '-' | '=' | '#' | ':' => {
                    pending = Some(match ch {
                        '=' => BondOrder::Double,
                        '#' => BondOrder::Triple,
                        ':' => BondOrder::Aromatic,
                        _ => BondOrder::Single,
                    });
                    pos += 1;
                }
                '(' => {
                    let p = prev.ok_or(SmartsError::UnbalancedParen)?;
                    stack.push(p);
                    pos += 1;
                }
                ')' => {
                    prev = Some(stack.pop().ok_or(SmartsError::UnbalancedParen)?);
                    pos += 1;
                }
                '0'..='9' => {
                    let here = prev.ok_or(SmartsError::Unsupported { ch, pos })?;
                    let label = ch.to_digit(10).expect("digit") as u16;
                    let written = QueryBond { order: pending.take() };
                    match rings.remove(&label) {
                        Some((other, opened)) => {
                            let bond = if opened.order.is_some() { opened } else { written };
                            query.bonds.push((other, here, bond));
                        }
                        None => {
                            rings.insert(label, (here, written));
                        }
                    }
                    pos += 1;
                }
                _ => return Err(SmartsError::Unsupported { ch, pos }),
            }
        }

        if !stack.is_empty() {
            return Err(SmartsError::UnbalancedParen);
        }
        if let Some((&label, _)) = rings.iter().next() {
            return Err(SmartsError::UnclosedRing(label));
        }
        if query.atoms.is_empty() {
            return Err(SmartsError::EmptyPattern);
        }
        Ok(query)
    }
}

/// Parse one `[...]` atom expression; returns the atom and chars consumed.
fn parse_bracket(chars: &[char]) -> Result<(QueryAtom, usize), SmartsError> {
    debug_assert_eq!(chars[0], '[');
    let mut i = 1usize;
    let mut atom = QueryAtom::default();

    // Element symbol (required in this subset; wildcards are unsupported).
    let first = *chars.get(i).ok_or(SmartsError::UnclosedBracket)?;
    if !first.is_ascii_alphabetic() {
        return Err(SmartsError::Unsupported { ch: first, pos: i });
    }
    let aromatic = first.is_ascii_lowercase();
    let mut symbol = first.to_ascii_uppercase().to_string();
    i += 1;
    if let Some(&next) = chars.get(i) {
        if next.is_ascii_lowercase() && next != 'h' {
            let mut two = symbol.clone();
            two.push(next);
            if Element::from_symbol(&two).is_some() {
                symbol = two;
                i += 1;
            }
        }
    }
    let element = Element::from_symbol(&symbol).ok_or(SmartsError::UnknownElement(symbol))?;
    atom.atomic_num = Some(element.atomic_num);
    // SMARTS: an uppercase symbol is an aliphatic constraint, lowercase
    // aromatic — inside brackets as much as outside.
    atom.aromatic = Some(aromatic);

    loop {
        let ch = *chars.get(i).ok_or(SmartsError::UnclosedBracket)?;
        match ch {
            ']' => {
                i += 1;
                break;
            }
            'H' => {
                i += 1;
                let (n, used) = read_digits(&chars[i..]);
                i += used;
                atom.hydrogen_count = Some(n.unwrap_or(1) as u8);
            }
            '+' | '-' => {
                let sign: i8 = if ch == '+' { 1 } else { -1 };
                i += 1;
                let (n, used) = read_digits(&chars[i..]);
                i += used;
                let mut magnitude = n.unwrap_or(1) as i8;
                while n.is_none() && chars.get(i) == Some(&ch) {
                    magnitude += 1;
                    i += 1;
                }
                atom.formal_charge = Some(sign * magnitude);
            }
            _ => return Err(SmartsError::Unsupported { ch, pos: i }),
        }
    }

    Ok((atom, i))
}

fn read_digits(chars: &[char]) -> (Option<u32>, usize) {
    let mut value: Option<u32> = None;
    let mut used = 0usize;
    while let Some(d) = chars.get(used).and_then(|c| c.to_digit(10)) {
        value = Some(value.unwrap_or(0) * 10 + d);
        used += 1;
    }
    (value, used)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nitro_pattern_compiles() {
        let q = Query::compile("[N+](=O)[O-]").unwrap();
        assert_eq!(q.atom_count(), 3);
        assert_eq!(q.atoms[0].formal_charge, Some(1));
        assert_eq!(q.atoms[2].formal_charge, Some(-1));
        let double = q.bonds.iter().find(|&&(a, b, _)| (a, b) == (0, 1)).unwrap();
        assert_eq!(double.2.order, Some(BondOrder::Double));
    }

    #[test]
    fn bare_atom_is_aliphatic_constraint() {
        let q = Query::compile("N#N").unwrap();
        assert_eq!(q.atoms[0].aromatic, Some(false));
        assert_eq!(q.bonds[0].2.order, Some(BondOrder::Triple));
    }

    #[test]
    fn bracket_without_charge_leaves_charge_free() {
        let q = Query::compile("[O]-[O]").unwrap();
        assert_eq!(q.atoms[0].formal_charge, None);
        assert_eq!(q.atoms[0].atomic_num, Some(8));
        assert_eq!(q.atoms[0].aromatic, Some(false));
    }

    #[test]
    fn explicit_h_count() {
        let q = Query::compile("[NH]-[NH]").unwrap();
        assert_eq!(q.atoms[0].hydrogen_count, Some(1));
        assert_eq!(q.atoms[1].hydrogen_count, Some(1));
    }

    #[test]
    fn branch_structure() {
        let q = Query::compile("[C]([N+](=O)[O-])[N+](=O)[O-]").unwrap();
        assert_eq!(q.atom_count(), 7);
        assert_eq!(q.degree(0), 2);
    }

    #[test]
    fn rejects_unsupported_constructs() {
        assert!(matches!(Query::compile(""), Err(SmartsError::EmptyPattern)));
        assert!(matches!(Query::compile("[*]"), Err(SmartsError::Unsupported { .. })));
        assert!(matches!(Query::compile("[N+"), Err(SmartsError::UnclosedBracket)));
        assert!(matches!(Query::compile("C(C"), Err(SmartsError::UnbalancedParen)));
        assert!(matches!(Query::compile("[Zz]"), Err(SmartsError::UnknownElement(_))));
    }
}
