//! Periodic table lookup used by the SMILES and SMARTS parsers.

use lazy_static::lazy_static;
use std::collections::HashMap;

/// A chemical element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element {
    pub atomic_number: u8,
    pub symbol: &'static str,
    /// Allowed neutral valences, lowest first. Empty for elements we don't
    /// assign implicit hydrogens to (metals, noble gases).
    pub valences: &'static [u8],
}

macro_rules! elements {
    ($(($n:expr, $sym:expr, [$($v:expr),*])),* $(,)?) => {
        [$(Element { atomic_number: $n, symbol: $sym, valences: &[$($v),*] }),*]
    };
}

/// Index 0 is the SMILES wildcard `*`.
static ELEMENTS: [Element; 119] = elements![
    (0, "*", []),
    (1, "H", [1]), (2, "He", []), (3, "Li", [1]), (4, "Be", [2]),
    (5, "B", [3]), (6, "C", [4]), (7, "N", [3]), (8, "O", [2]),
    (9, "F", [1]), (10, "Ne", []), (11, "Na", [1]), (12, "Mg", [2]),
    (13, "Al", [3]), (14, "Si", [4]), (15, "P", [3, 5, 7]), (16, "S", [2, 4, 6]),
    (17, "Cl", [1]), (18, "Ar", []), (19, "K", [1]), (20, "Ca", [2]),
    (21, "Sc", []), (22, "Ti", []), (23, "V", []), (24, "Cr", []),
    (25, "Mn", []), (26, "Fe", []), (27, "Co", []), (28, "Ni", []),
    (29, "Cu", []), (30, "Zn", []), (31, "Ga", [3]), (32, "Ge", [4]),
    (33, "As", [3, 5, 7]), (34, "Se", [2, 4, 6]), (35, "Br", [1]), (36, "Kr", []),
    (37, "Rb", [1]), (38, "Sr", [2]), (39, "Y", []), (40, "Zr", []),
    (41, "Nb", []), (42, "Mo", []), (43, "Tc", []), (44, "Ru", []),
    (45, "Rh", []), (46, "Pd", []), (47, "Ag", []), (48, "Cd", []),
    (49, "In", [3]), (50, "Sn", [2, 4]), (51, "Sb", [3, 5, 7]), (52, "Te", [2, 4, 6]),
    (53, "I", [1, 3, 5]), (54, "Xe", []), (55, "Cs", [1]), (56, "Ba", [2]),
    (57, "La", []), (58, "Ce", []), (59, "Pr", []), (60, "Nd", []),
    (61, "Pm", []), (62, "Sm", []), (63, "Eu", []), (64, "Gd", []),
    (65, "Tb", []), (66, "Dy", []), (67, "Ho", []), (68, "Er", []),
    (69, "Tm", []), (70, "Yb", []), (71, "Lu", []), (72, "Hf", []),
    (73, "Ta", []), (74, "W", []), (75, "Re", []), (76, "Os", []),
    (77, "Ir", []), (78, "Pt", []), (79, "Au", []), (80, "Hg", []),
    (81, "Tl", [3]), (82, "Pb", [2, 4]), (83, "Bi", [3, 5, 7]), (84, "Po", [2, 4, 6]),
    (85, "At", [1, 3, 5]), (86, "Rn", []), (87, "Fr", [1]), (88, "Ra", [2]),
    (89, "Ac", []), (90, "Th", []), (91, "Pa", []), (92, "U", []),
    (93, "Np", []), (94, "Pu", []), (95, "Am", []), (96, "Cm", []),
    (97, "Bk", []), (98, "Cf", []), (99, "Es", []), (100, "Fm", []),
    (101, "Md", []), (102, "No", []), (103, "Lr", []), (104, "Rf", []),
    (105, "Db", []), (106, "Sg", []), (107, "Bh", []), (108, "Hs", []),
    (109, "Mt", []), (110, "Ds", []), (111, "Rg", []), (112, "Cn", []),
    (113, "Nh", []), (114, "Fl", []), (115, "Mc", []), (116, "Lv", []),
    (117, "Ts", []), (118, "Og", []),
];

lazy_static! {
    static ref BY_SYMBOL: HashMap<&'static str, &'static Element> =
        ELEMENTS.iter().map(|e| (e.symbol, e)).collect();
}

impl Element {
    /// Look up an element by its case-sensitive symbol ("C", "Cl", "*").
    pub fn from_symbol(symbol: &str) -> Option<&'static Element> {
        BY_SYMBOL.get(symbol).copied()
    }

    /// Look up an element by atomic number; 0 is the wildcard.
    pub fn from_atomic_number(n: u8) -> Option<&'static Element> {
        ELEMENTS.get(n as usize)
    }

    /// Symbols that may be written lowercase (aromatic) in SMILES.
    pub fn from_aromatic_symbol(symbol: &str) -> Option<&'static Element> {
        match symbol {
            "b" | "c" | "n" | "o" | "p" | "s" | "se" | "as" | "te" => {
                let mut upper = symbol.to_string();
                upper[..1].make_ascii_uppercase();
                Element::from_symbol(&upper)
            }
            _ => None,
        }
    }

    /// Valences of the element isoelectronic with this one at `charge`,
    /// so that N+ is checked like C and O- like F.
    pub fn valences_with_charge(&self, charge: i8) -> &'static [u8] {
        if charge == 0 {
            return self.valences;
        }
        let shifted = self.atomic_number as i16 - charge as i16;
        if !(1..=118).contains(&shifted) {
            return &[];
        }
        // Only shift within the same row of the p-block.
        let same_row = |a: i16, b: i16| row_of(a) == row_of(b);
        if !same_row(self.atomic_number as i16, shifted) {
            return &[];
        }
        ELEMENTS[shifted as usize].valences
    }

    pub fn is_hydrogen(&self) -> bool {
        self.atomic_number == 1
    }
}

fn row_of(n: i16) -> u8 {
    match n {
        1..=2 => 1,
        3..=10 => 2,
        11..=18 => 3,
        19..=36 => 4,
        37..=54 => 5,
        55..=86 => 6,
        _ => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_symbol_and_number() {
        let cl = Element::from_symbol("Cl").unwrap();
        assert_eq!(cl.atomic_number, 17);
        assert_eq!(Element::from_atomic_number(17), Some(cl));
        assert_eq!(Element::from_atomic_number(104).unwrap().symbol, "Rf");
        assert!(Element::from_symbol("Xx").is_none());
        assert!(Element::from_symbol("cl").is_none());
    }

    #[test]
    fn aromatic_symbols() {
        assert_eq!(Element::from_aromatic_symbol("c").unwrap().atomic_number, 6);
        assert_eq!(Element::from_aromatic_symbol("se").unwrap().atomic_number, 34);
        assert!(Element::from_aromatic_symbol("f").is_none());
    }

    #[test]
    fn charged_valences_follow_isoelectronic_element() {
        let n = Element::from_symbol("N").unwrap();
        assert_eq!(n.valences_with_charge(1), &[4]);
        let o = Element::from_symbol("O").unwrap();
        assert_eq!(o.valences_with_charge(-1), &[1]);
        let c = Element::from_symbol("C").unwrap();
        assert_eq!(c.valences_with_charge(-1), &[3]);
    }
}
