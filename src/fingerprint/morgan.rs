use super::{BitVector, CountVector, Fingerprint, FingerprintError, MorganOptions};
use crate::molecule::{Bond, Molecule};
use petgraph::graph::NodeIndex;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// FNV-1a with fixed-width, little-endian integer writes, so identifiers
/// don't depend on the platform or the standard library's hasher.
struct FnvHasher(u64);

impl Default for FnvHasher {
    fn default() -> Self {
        FnvHasher(FNV_OFFSET)
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= *byte as u64;
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    fn write_u8(&mut self, i: u8) {
        self.write(&[i]);
    }

    fn write_u16(&mut self, i: u16) {
        self.write(&i.to_le_bytes());
    }

    fn write_u32(&mut self, i: u32) {
        self.write(&i.to_le_bytes());
    }

    fn write_u64(&mut self, i: u64) {
        self.write(&i.to_le_bytes());
    }

    fn write_usize(&mut self, i: usize) {
        self.write_u64(i as u64);
    }

    fn write_i8(&mut self, i: i8) {
        self.write_u8(i as u8);
    }
}

/// Computes a 32-bit identifier for any hashable object.
fn compute_hash<T: Hash>(t: &T) -> u32 {
    let mut hasher = FnvHasher::default();
    t.hash(&mut hasher);
    let h = hasher.finish();
    (h ^ (h >> 32)) as u32
}

fn bond_code(bond: Bond) -> u8 {
    match bond {
        Bond::Single => 1,
        Bond::Double => 2,
        Bond::Triple => 3,
        Bond::Aromatic => 12,
    }
}

/// Radius-0 identifier of an atom.
fn initial_invariant(molecule: &Molecule, atom: NodeIndex) -> u32 {
    let a = molecule.atom(atom);
    compute_hash(&(
        a.atomic_number(),
        molecule.total_degree(atom) as u32,
        molecule.total_hydrogens(atom),
        a.charge,
        a.isotope.unwrap_or(0),
        molecule.rings().is_ring_atom(atom),
    ))
}

/// Every identifier emitted for `molecule` up to `radius`, in emission
/// order. Duplicate environments are dropped; duplicate identifiers from
/// distinct environments are kept.
pub fn morgan_identifiers(molecule: &Molecule, radius: u32) -> Vec<u32> {
    let n = molecule.atom_count();
    let words = molecule.bond_count().div_ceil(64).max(1);

    let mut ids: Vec<u32> = molecule.atoms().map(|a| initial_invariant(molecule, a)).collect();
    let mut emitted = ids.clone();

    // Bonds covered by each atom's environment so far.
    let mut envs: Vec<Vec<u64>> = vec![vec![0; words]; n];
    let mut dead = vec![false; n];
    let mut seen: HashSet<Vec<u64>> = HashSet::new();

    for layer in 1..=radius {
        let mut next_ids = ids.clone();
        let mut next_envs = envs.clone();
        let mut layer_entries: Vec<(Vec<u64>, u32, usize)> = Vec::new();

        for atom in molecule.atoms() {
            let i = atom.index();
            let mut neighbors: Vec<(u8, u32)> = Vec::new();
            let mut env = envs[i].clone();
            for (other, edge, bond) in molecule.neighbors(atom) {
                neighbors.push((bond_code(bond), ids[other.index()]));
                env[edge.index() / 64] |= 1 << (edge.index() % 64);
                env.iter_mut().zip(&envs[other.index()]).for_each(|(x, y)| *x |= y);
            }
            neighbors.sort();

            next_ids[i] = compute_hash(&(layer, ids[i], neighbors));
            if dead[i] {
                next_envs[i] = env;
                continue;
            }
            if env == envs[i] {
                // Nothing new within reach; later layers would only repeat it.
                dead[i] = true;
            } else {
                layer_entries.push((env.clone(), next_ids[i], i));
            }
            next_envs[i] = env;
        }

        layer_entries.sort();
        for (env, id, atom) in layer_entries {
            if seen.insert(env) {
                emitted.push(id);
            } else {
                dead[atom] = true;
            }
        }

        ids = next_ids;
        envs = next_envs;
    }
    emitted
}

/// Morgan (circular, ECFP-style) fingerprint.
///
/// Each identifier sets bit `id % fp_size`, or increments it when
/// `options.use_count` is on. A zero `fp_size` is an error.
pub fn morgan_fingerprint(
    molecule: &Molecule,
    options: &MorganOptions,
) -> Result<Fingerprint, FingerprintError> {
    let size = options.fp_size;
    if size == 0 {
        return Err(FingerprintError::ZeroSize);
    }
    let identifiers = morgan_identifiers(molecule, options.radius);
    if options.use_count {
        let mut counts = CountVector::new(size);
        for id in identifiers {
            counts.increment(id as usize % size);
        }
        Ok(Fingerprint::Counts(counts))
    } else {
        let mut bits = BitVector::new(size);
        for id in identifiers {
            bits.set(id as usize % size);
        }
        Ok(Fingerprint::Bits(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_smiles;

    fn options(radius: u32, use_count: bool) -> MorganOptions {
        MorganOptions {
            radius,
            fp_size: 2048,
            use_count,
        }
    }

    #[test]
    fn hash_is_stable() {
        // Fixed FNV-1a output for a fixed input.
        let mut hasher = FnvHasher::default();
        hasher.write(b"a");
        assert_eq!(hasher.finish(), 0xaf63dc4c8601ec8c);
        assert_eq!(compute_hash(&(6u8, 4u32)), compute_hash(&(6u8, 4u32)));
        assert_ne!(compute_hash(&(6u8, 4u32)), compute_hash(&(7u8, 4u32)));
    }

    #[test]
    fn radius_zero_is_one_id_per_atom() {
        let mol = parse_smiles("CCO").unwrap();
        let ids = morgan_identifiers(&mol, 0);
        assert_eq!(ids.len(), 3);
        // the two carbons differ in hydrogen count
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn symmetric_atoms_share_identifiers() {
        let mol = parse_smiles("c1ccccc1").unwrap();
        let ids = morgan_identifiers(&mol, 0);
        assert!(ids.iter().all(|id| *id == ids[0]));

        // one distinct identifier per radius for benzene
        let mut ids = morgan_identifiers(&mol, 2);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn label_consistency_across_atom_order() {
        let a = parse_smiles("OCC(=O)N").unwrap();
        let b = parse_smiles("NC(=O)CO").unwrap();
        let mut ids_a = morgan_identifiers(&a, 2);
        let mut ids_b = morgan_identifiers(&b, 2);
        ids_a.sort();
        ids_b.sort();
        assert_eq!(ids_a, ids_b);
        assert_eq!(
            morgan_fingerprint(&a, &options(2, true)).unwrap(),
            morgan_fingerprint(&b, &options(2, true)).unwrap()
        );
    }

    #[test]
    fn isolated_atoms_stop_after_radius_zero() {
        let mol = parse_smiles("[Na+].[Cl-]").unwrap();
        assert_eq!(morgan_identifiers(&mol, 3).len(), 2);
    }

    #[test]
    fn count_dominates_presence() {
        let mol = parse_smiles("CC(C)Cc1ccc(cc1)C(C)C(=O)O").unwrap();
        let bits = morgan_fingerprint(&mol, &options(2, false)).unwrap().to_array();
        let counts = morgan_fingerprint(&mol, &options(2, true)).unwrap().to_array();
        assert_eq!(bits.len(), 2048);
        assert_eq!(counts.len(), 2048);
        assert!(bits.iter().all(|v| *v <= 1));
        assert!(bits.iter().zip(counts.iter()).all(|(b, c)| c >= b));
        assert!(counts.iter().any(|c| *c > 1));
    }

    #[test]
    fn larger_radius_adds_bits() {
        let mol = parse_smiles("CCCCCCCC").unwrap();
        let small = morgan_fingerprint(&mol, &options(1, false)).unwrap();
        let large = morgan_fingerprint(&mol, &options(3, false)).unwrap();
        let (Fingerprint::Bits(small), Fingerprint::Bits(large)) = (small, large) else {
            panic!("expected bits");
        };
        assert!(large.count_ones() > small.count_ones());
        assert!(small.on_bits().all(|bit| large.get(bit)));
    }

    #[test]
    fn zero_size_is_an_error() {
        let mol = parse_smiles("CCO").unwrap();
        let options = MorganOptions {
            fp_size: 0,
            ..MorganOptions::default()
        };
        assert_eq!(morgan_fingerprint(&mol, &options), Err(FingerprintError::ZeroSize));
    }
}
