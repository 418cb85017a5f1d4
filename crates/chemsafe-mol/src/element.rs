//! Compact element table.
//!
//! Covers the elements that show up in lab-scale organic synthesis plans.
//! An element outside this table makes the notation undecodable, which the
//! analyzer reports as invalid input rather than guessing at weights.

/// One row of the element table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub symbol: &'static str,
    pub atomic_num: u8,
    /// Standard atomic weight (g/mol).
    pub weight: f64,
    /// Default valences used for implicit-hydrogen assignment. Empty means
    /// "no implicit hydrogens" (metals, noble gases).
    pub valences: &'static [u8],
    /// Member of the SMILES organic subset (writable without brackets).
    pub organic_subset: bool,
    /// May appear as a lowercase aromatic atom.
    pub aromatic: bool,
}

const ELEMENTS: &[Element] = &[
    Element { symbol: "H",  atomic_num: 1,  weight: 1.008,   valences: &[1],       organic_subset: false, aromatic: false },
    Element { symbol: "B",  atomic_num: 5,  weight: 10.811,  valences: &[3],       organic_subset: true,  aromatic: true },
    Element { symbol: "C",  atomic_num: 6,  weight: 12.011,  valences: &[4],       organic_subset: true,  aromatic: true },
    Element { symbol: "N",  atomic_num: 7,  weight: 14.007,  valences: &[3, 5],    organic_subset: true,  aromatic: true },
    Element { symbol: "O",  atomic_num: 8,  weight: 15.999,  valences: &[2],       organic_subset: true,  aromatic: true },
    Element { symbol: "F",  atomic_num: 9,  weight: 18.998,  valences: &[1],       organic_subset: true,  aromatic: false },
    Element { symbol: "Na", atomic_num: 11, weight: 22.990,  valences: &[],        organic_subset: false, aromatic: false },
    Element { symbol: "Mg", atomic_num: 12, weight: 24.305,  valences: &[],        organic_subset: false, aromatic: false },
    Element { symbol: "Al", atomic_num: 13, weight: 26.982,  valences: &[],        organic_subset: false, aromatic: false },
    Element { symbol: "Si", atomic_num: 14, weight: 28.086,  valences: &[4],       organic_subset: false, aromatic: false },
    Element { symbol: "P",  atomic_num: 15, weight: 30.974,  valences: &[3, 5],    organic_subset: true,  aromatic: true },
    Element { symbol: "S",  atomic_num: 16, weight: 32.065,  valences: &[2, 4, 6], organic_subset: true,  aromatic: true },
    Element { symbol: "Cl", atomic_num: 17, weight: 35.453,  valences: &[1],       organic_subset: true,  aromatic: false },
    Element { symbol: "K",  atomic_num: 19, weight: 39.098,  valences: &[],        organic_subset: false, aromatic: false },
    Element { symbol: "Ca", atomic_num: 20, weight: 40.078,  valences: &[],        organic_subset: false, aromatic: false },
    Element { symbol: "Ti", atomic_num: 22, weight: 47.867,  valences: &[],        organic_subset: false, aromatic: false },
    Element { symbol: "Cr", atomic_num: 24, weight: 51.996,  valences: &[],        organic_subset: false, aromatic: false },
    Element { symbol: "Mn", atomic_num: 25, weight: 54.938,  valences: &[],        organic_subset: false, aromatic: false },
    Element { symbol: "Fe", atomic_num: 26, weight: 55.845,  valences: &[],        organic_subset: false, aromatic: false },
    Element { symbol: "Ni", atomic_num: 28, weight: 58.693,  valences: &[],        organic_subset: false, aromatic: false },
    Element { symbol: "Cu", atomic_num: 29, weight: 63.546,  valences: &[],        organic_subset: false, aromatic: false },
    Element { symbol: "Zn", atomic_num: 30, weight: 65.38,   valences: &[],        organic_subset: false, aromatic: false },
    Element { symbol: "Br", atomic_num: 35, weight: 79.904,  valences: &[1],       organic_subset: true,  aromatic: false },
    Element { symbol: "Pd", atomic_num: 46, weight: 106.42,  valences: &[],        organic_subset: false, aromatic: false },
    Element { symbol: "Ag", atomic_num: 47, weight: 107.868, valences: &[],        organic_subset: false, aromatic: false },
    Element { symbol: "Sn", atomic_num: 50, weight: 118.710, valences: &[2, 4],    organic_subset: false, aromatic: false },
    Element { symbol: "I",  atomic_num: 53, weight: 126.904, valences: &[1],       organic_subset: true,  aromatic: false },
    Element { symbol: "Pt", atomic_num: 78, weight: 195.084, valences: &[],        organic_subset: false, aromatic: false },
    Element { symbol: "Hg", atomic_num: 80, weight: 200.592, valences: &[],        organic_subset: false, aromatic: false },
    Element { symbol: "Pb", atomic_num: 82, weight: 207.2,   valences: &[2, 4],    organic_subset: false, aromatic: false },
];

impl Element {
    pub fn from_symbol(symbol: &str) -> Option<&'static Element> {
        ELEMENTS.iter().find(|e| e.symbol == symbol)
    }

    pub fn from_atomic_num(atomic_num: u8) -> Option<&'static Element> {
        ELEMENTS.iter().find(|e| e.atomic_num == atomic_num)
    }

    /// Smallest default valence that can absorb `used` bonds, if any.
    pub fn implicit_valence_for(&self, used: u8) -> Option<u8> {
        self.valences.iter().copied().find(|&v| v >= used)
    }
}
