//! MACCS structural keys, 166 bits.
//!
//! Each key is a SMARTS pattern plus a count threshold; the key is set when
//! the pattern has more unique matches than the threshold. Key `k` lives at
//! index `k - 1`.

use super::{BitVector, Fingerprint};
use crate::molecule::Molecule;
use crate::parse::SmartsPattern;
use lazy_static::lazy_static;
use tracing::*;

pub const MACCS_KEY_COUNT: usize = 166;

/// Keys computed directly rather than by pattern.
const SPECIAL: &str = "?";
const AROMATIC_RINGS_KEY: usize = 125;
const FRAGMENTS_KEY: usize = 166;

const MACCS_SMARTS: [(&str, usize); MACCS_KEY_COUNT] = [
    (SPECIAL, 0),                                               // 1: isotope, never set
    ("[#104]", 0),                                              // 2
    ("[#32,#33,#34,#50,#51,#52,#82,#83,#84]", 0),               // 3
    ("[Ac,Th,Pa,U,Np,Pu,Am,Cm,Bk,Cf,Es,Fm,Md,No,Lr]", 0),       // 4: actinides
    ("[Sc,Ti,Y,Zr,Hf]", 0),                                     // 5
    ("[La,Ce,Pr,Nd,Pm,Sm,Eu,Gd,Tb,Dy,Ho,Er,Tm,Yb,Lu]", 0),      // 6: lanthanides
    ("[V,Cr,Mn,Nb,Mo,Tc,Ta,W,Re]", 0),                          // 7
    ("[!#6;!#1]1~*~*~*~1", 0),                                  // 8
    ("[Fe,Co,Ni,Ru,Rh,Pd,Os,Ir,Pt]", 0),                        // 9
    ("[Be,Mg,Ca,Sr,Ba,Ra]", 0),                                 // 10
    ("*1~*~*~*~1", 0),                                          // 11: 4-ring
    ("[Cu,Zn,Ag,Cd,Au,Hg]", 0),                                 // 12
    ("[#8]~[#7](~[#6])~[#6]", 0),                               // 13
    ("[#16]-[#16]", 0),                                         // 14
    ("[#8]~[#6](~[#8])~[#8]", 0),                               // 15
    ("[!#6;!#1]1~*~*~1", 0),                                    // 16
    ("[#6]#[#6]", 0),                                           // 17
    ("[#5,#13,#31,#49,#81]", 0),                                // 18
    ("*1~*~*~*~*~*~*~1", 0),                                    // 19: 7-ring
    ("[#14]", 0),                                               // 20
    ("[#6]=[#6](~[!#6;!#1])~[!#6;!#1]", 0),                     // 21
    ("*1~*~*~1", 0),                                            // 22: 3-ring
    ("[#7]~[#6](~[#8])~[#8]", 0),                               // 23
    ("[#7]-[#8]", 0),                                           // 24
    ("[#7]~[#6](~[#7])~[#7]", 0),                               // 25
    ("[#6]=;@[#6](@*)@*", 0),                                   // 26
    ("[I]", 0),                                                 // 27
    ("[!#6;!#1]~[CH2]~[!#6;!#1]", 0),                           // 28
    ("[#15]", 0),                                               // 29
    ("[#6]~[!#6;!#1](~[#6])(~[#6])~*", 0),                      // 30
    ("[!#6;!#1]~[F,Cl,Br,I]", 0),                               // 31
    ("[#6]~[#16]~[#7]", 0),                                     // 32
    ("[#7]~[#16]", 0),                                          // 33
    ("[CH2]=*", 0),                                             // 34
    ("[Li,Na,K,Rb,Cs,Fr]", 0),                                  // 35
    ("[#16R]", 0),                                              // 36
    ("[#7]~[#6](~[#8])~[#7]", 0),                               // 37
    ("[#7]~[#6](~[#6])~[#7]", 0),                               // 38
    ("[#8]~[#16](~[#8])~[#8]", 0),                              // 39
    ("[#16]-[#8]", 0),                                          // 40
    ("[#6]#[#7]", 0),                                           // 41
    ("F", 0),                                                   // 42
    ("[!#6;!#1;!H0]~*~[!#6;!#1;!H0]", 0),                       // 43
    ("[!#1;!#6;!#7;!#8;!#9;!#14;!#15;!#16;!#17;!#35;!#53]", 0), // 44: other elements
    ("[#6]=[#6]~[#7]", 0),                                      // 45
    ("Br", 0),                                                  // 46
    ("[#16]~*~[#7]", 0),                                        // 47
    ("[#8]~[!#6;!#1](~[#8])(~[#8])", 0),                        // 48
    ("[!+0]", 0),                                               // 49: charge
    ("[#6]=[#6](~[#6])~[#6]", 0),                               // 50
    ("[#6]~[#16]~[#8]", 0),                                     // 51
    ("[#7]~[#7]", 0),                                           // 52
    ("[!#6;!#1;!H0]~*~*~*~[!#6;!#1;!H0]", 0),                   // 53
    ("[!#6;!#1;!H0]~*~*~[!#6;!#1;!H0]", 0),                     // 54
    ("[#8]~[#16]~[#8]", 0),                                     // 55
    ("[#8]~[#7](~[#8])~[#6]", 0),                               // 56
    ("[#8R]", 0),                                               // 57
    ("[!#6;!#1]~[#16]~[!#6;!#1]", 0),                           // 58
    ("[#16]!:*:*", 0),                                          // 59
    ("[#16]=[#8]", 0),                                          // 60
    ("*~[#16](~*)~*", 0),                                       // 61
    ("*@*!@*@*", 0),                                            // 62
    ("[#7]=[#8]", 0),                                           // 63
    ("*@*!@[#16]", 0),                                          // 64
    ("c:n", 0),                                                 // 65
    ("[#6]~[#6](~[#6])(~[#6])~*", 0),                           // 66
    ("[!#6;!#1]~[#16]", 0),                                     // 67
    ("[!#6;!#1;!H0]~[!#6;!#1;!H0]", 0),                         // 68
    ("[!#6;!#1]~[!#6;!#1;!H0]", 0),                             // 69
    ("[!#6;!#1]~[#7]~[!#6;!#1]", 0),                            // 70
    ("[#7]~[#8]", 0),                                           // 71
    ("[#8]~*~*~[#8]", 0),                                       // 72
    ("[#16]=*", 0),                                             // 73
    ("[CH3]~*~[CH3]", 0),                                       // 74
    ("*!@[#7]@*", 0),                                           // 75
    ("[#6]=[#6](~*)~*", 0),                                     // 76
    ("[#7]~*~[#7]", 0),                                         // 77
    ("[#6]=[#7]", 0),                                           // 78
    ("[#7]~*~*~[#7]", 0),                                       // 79
    ("[#7]~*~*~*~[#7]", 0),                                     // 80
    ("[#16]~*(~*)~*", 0),                                       // 81
    ("*~[CH2]~[!#6;!#1;!H0]", 0),                               // 82
    ("[!#6;!#1]1~*~*~*~*~1", 0),                                // 83
    ("[NH2]", 0),                                               // 84
    ("[#6]~[#7](~[#6])~[#6]", 0),                               // 85
    ("[C;H2,H3][!#6;!#1][C;H2,H3]", 0),                         // 86
    ("[F,Cl,Br,I]!@*@*", 0),                                    // 87
    ("[#16]", 0),                                               // 88
    ("[#8]~*~*~*~[#8]", 0),                                     // 89
    (
        "[$([!#6;!#1;!H0]~*~*~[CH2]~*),$([!#6;!#1;!H0;R]1@[R]@[R]@[CH2;R]1),\
         $([!#6;!#1;!H0]~[R]1@[R]@[CH2;R]1)]",
        0,
    ), // 90
    (
        "[$([!#6;!#1;!H0]~*~*~*~[CH2]~*),$([!#6;!#1;!H0;R]1@[R]@[R]@[R]@[CH2;R]1),\
         $([!#6;!#1;!H0]~[R]1@[R]@[R]@[CH2;R]1),$([!#6;!#1;!H0]~*~[R]1@[R]@[CH2;R]1)]",
        0,
    ), // 91
    ("[#8]~[#6](~[#7])~[#6]", 0), // 92
    ("[!#6;!#1]~[CH3]", 0),       // 93
    ("[!#6;!#1]~[#7]", 0),        // 94
    ("[#7]~*~*~[#8]", 0),         // 95
    ("*1~*~*~*~*~1", 0),          // 96: 5-ring
    ("[#7]~*~*~*~[#8]", 0),       // 97
    ("[!#6;!#1]1~*~*~*~*~*~1", 0), // 98
    ("[#6]=[#6]", 0),             // 99
    ("*~[CH2]~[#7]", 0),          // 100
    (
        "[$([R]@1@[R]@[R]@[R]@[R]@[R]@[R]@[R]1),\
         $([R]@1@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]1),\
         $([R]@1@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]1),\
         $([R]@1@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]1),\
         $([R]@1@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]1),\
         $([R]@1@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]1),\
         $([R]@1@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]@[R]1)]",
        0,
    ), // 101: rings of 8 to 14 atoms
    ("[!#6;!#1]~[#8]", 0),                   // 102
    ("Cl", 0),                               // 103
    ("[!#6;!#1;!H0]~*~[CH2]~*", 0),          // 104
    ("*@*(@*)@*", 0),                        // 105
    ("[!#6;!#1]~*(~[!#6;!#1])~[!#6;!#1]", 0), // 106
    ("[F,Cl,Br,I]~*(~*)~*", 0),              // 107
    ("[CH3]~*~*~*~[CH2]~*", 0),              // 108
    ("*~[CH2]~[#8]", 0),                     // 109
    ("[#7]~[#6]~[#8]", 0),                   // 110
    ("[#7]~*~[CH2]~*", 0),                   // 111
    ("*~*(~*)(~*)~*", 0),                    // 112
    ("[#8]!:*:*", 0),                        // 113
    ("[CH3]~[CH2]~*", 0),                    // 114
    ("[CH3]~*~[CH2]~*", 0),                  // 115
    ("[$([CH3]~*~*~[CH2]~*),$([CH3]~*1~*~[CH2]1)]", 0), // 116
    ("[#7]~*~[#8]", 0),                      // 117
    ("[$(*~[CH2]~[CH2]~*),$(*1~[CH2]~[CH2]1)]", 1), // 118
    ("[#7]=*", 0),                           // 119
    ("[!#6;R]", 1),                          // 120
    ("[#7;R]", 0),                           // 121
    ("*~[#7](~*)~*", 0),                     // 122
    ("[#8]~[#6]~[#8]", 0),                   // 123
    ("[!#6;!#1]~[!#6;!#1]", 0),              // 124
    (SPECIAL, 0),                            // 125: more than one aromatic ring
    ("*!@[#8]!@*", 0),                       // 126
    ("*@*!@[#8]", 1),                        // 127
    (
        "[$(*~[CH2]~*~*~*~[CH2]~*),$([R]1@[CH2;R]@[R]@[R]@[R]@[CH2;R]1),\
         $(*~[CH2]~[R]1@[R]@[R]@[CH2;R]1),$(*~[CH2]~*~[R]1@[R]@[CH2;R]1)]",
        0,
    ), // 128
    (
        "[$(*~[CH2]~*~*~[CH2]~*),$([R]1@[CH2]@[R]@[R]@[CH2;R]1),$(*~[CH2]~[R]1@[R]@[CH2;R]1)]",
        0,
    ), // 129
    ("[!#6;!#1]~[!#6;!#1]", 1),   // 130
    ("[!#6;!#1;!H0]", 1),         // 131
    ("[#8]~*~[CH2]~*", 0),        // 132
    ("*@*!@[#7]", 0),             // 133
    ("[F,Cl,Br,I]", 0),           // 134: halogen
    ("[#7]!:*:*", 0),             // 135
    ("[#8]=*", 1),                // 136
    ("[!C;!c;R]", 0),             // 137: heterocycle
    ("[!#6;!#1]~[CH2]~*", 1),     // 138
    ("[O;!H0]", 0),               // 139
    ("[#8]", 3),                  // 140
    ("[CH3]", 2),                 // 141
    ("[#7]", 1),                  // 142
    ("*@*!@[#8]", 0),             // 143
    ("*!:*:*!:*", 0),             // 144
    ("*1~*~*~*~*~*~1", 1),        // 145: 6-ring, more than one
    ("[#8]", 2),                  // 146
    ("[$(*~[CH2]~[CH2]~*),$([R]1@[CH2;R]@[CH2;R]1)]", 0), // 147
    ("*~[!#6;!#1](~*)~*", 0),     // 148
    ("[C;H3,H4]", 1),             // 149
    ("*!@*@*!@*", 0),             // 150
    ("[#7;!H0]", 0),              // 151
    ("[#8]~[#6](~[#6])~[#6]", 0), // 152
    ("[!#6;!#1]~[CH2]~*", 0),     // 153
    ("[#6]=[#8]", 0),             // 154
    ("*!@[CH2]!@*", 0),           // 155
    ("[#7]~*(~*)~*", 0),          // 156
    ("[#6]-[#8]", 0),             // 157
    ("[#6]-[#7]", 0),             // 158
    ("[#8]", 1),                  // 159
    ("[C;H3,H4]", 0),             // 160
    ("[#7]", 0),                  // 161
    ("a", 0),                     // 162: aromatic atom
    ("*1~*~*~*~*~*~1", 0),        // 163: 6-ring
    ("[#8]", 0),                  // 164
    ("[R]", 0),                   // 165: ring atom
    (SPECIAL, 0),                 // 166: more than one fragment
];

lazy_static! {
    /// Compiled key patterns; `None` for the special keys.
    static ref MACCS_PATTERNS: Vec<Option<(SmartsPattern, usize)>> = MACCS_SMARTS
        .iter()
        .enumerate()
        .map(|(index, (smarts, threshold))| {
            if *smarts == SPECIAL {
                return None;
            }
            match SmartsPattern::parse(smarts) {
                Ok(pattern) => Some((pattern, *threshold)),
                Err(e) => {
                    error!("MACCS key {} has an invalid pattern: {e:?}", index + 1);
                    None
                }
            }
        })
        .collect();
}

/// Computes the 166-bit MACCS fingerprint of `molecule`.
pub fn maccs_fingerprint(molecule: &Molecule) -> Fingerprint {
    let mut bits = BitVector::new(MACCS_KEY_COUNT);
    for (index, entry) in MACCS_PATTERNS.iter().enumerate() {
        if let Some((pattern, threshold)) = entry {
            if pattern.count_unique_matches(molecule, threshold + 1) > *threshold {
                bits.set(index);
            }
        }
    }
    if molecule.aromatic_ring_count() > 1 {
        bits.set(AROMATIC_RINGS_KEY - 1);
    }
    if molecule.fragment_count() > 1 {
        bits.set(FRAGMENTS_KEY - 1);
    }
    Fingerprint::Bits(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_smiles;

    fn keys(smiles: &str) -> Vec<usize> {
        let molecule = parse_smiles(smiles).unwrap();
        match maccs_fingerprint(&molecule) {
            Fingerprint::Bits(bits) => {
                assert_eq!(bits.len(), MACCS_KEY_COUNT);
                bits.on_bits().map(|index| index + 1).collect()
            }
            Fingerprint::Counts(_) => panic!("MACCS keys are bits"),
        }
    }

    #[test]
    fn every_pattern_compiles() {
        for (index, (smarts, _)) in MACCS_SMARTS.iter().enumerate() {
            if *smarts != SPECIAL {
                assert!(
                    SmartsPattern::parse(smarts).is_ok(),
                    "key {} failed to parse: {smarts}",
                    index + 1
                );
            }
        }
        assert_eq!(MACCS_PATTERNS.iter().filter(|p| p.is_none()).count(), 3);
    }

    #[test]
    fn ethanol() {
        let on = keys("CCO");
        assert!(on.contains(&164)); // O
        assert!(on.contains(&139)); // OH
        assert!(on.contains(&157)); // C-O
        assert!(on.contains(&160)); // CH3
        assert!(on.contains(&114)); // CH3CH2A
        assert!(!on.contains(&162));
        assert!(!on.contains(&165));
        assert!(!on.contains(&159)); // only one O
    }

    #[test]
    fn benzene() {
        let on = keys("c1ccccc1");
        assert_eq!(on, [162, 163, 165]);
    }

    #[test]
    fn thresholds() {
        // two oxygens: more than one, but not more than two
        let on = keys("OCCO");
        assert!(on.contains(&159));
        assert!(!on.contains(&146));
        let on = keys("OC(O)C(O)CO");
        assert!(on.contains(&140));
        assert!(on.contains(&146));
    }

    #[test]
    fn special_keys() {
        assert!(keys("CC.O").contains(&166));
        assert!(!keys("CCO").contains(&166));
        assert!(keys("c1ccc2ccccc2c1").contains(&125));
        assert!(!keys("c1ccccc1").contains(&125));
        assert!(!keys("[13CH4]").contains(&1));
    }

    #[test]
    fn heteroatoms_and_rings() {
        let on = keys("c1ccncc1");
        assert!(on.contains(&65)); // c:n
        assert!(on.contains(&121)); // N heterocycle
        assert!(on.contains(&137));
        assert!(on.contains(&161));
        let on = keys("C1CC1");
        assert!(on.contains(&22));
        assert!(!on.contains(&163));
        let on = keys("[Na+].[Cl-]");
        assert!(on.contains(&35));
        assert!(on.contains(&49));
        assert!(on.contains(&134));
        assert!(on.contains(&166));
    }

    #[test]
    fn deterministic() {
        let a = parse_smiles("CC(=O)Nc1ccc(O)cc1").unwrap();
        assert_eq!(maccs_fingerprint(&a), maccs_fingerprint(&a));
    }
}
