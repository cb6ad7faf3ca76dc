//! Ring perception: which bonds and atoms are cyclic, and a smallest set of
//! smallest rings (SSSR) for ring-size queries.

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeSet, VecDeque};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RingInfo {
    ring_bond: Vec<bool>,
    ring_atom: Vec<bool>,
    /// Each ring lists its atoms in path order.
    sssr: Vec<Vec<NodeIndex>>,
}

impl RingInfo {
    pub fn perceive<N, E>(graph: &UnGraph<N, E>) -> Self {
        let ring_bond: Vec<bool> = graph
            .edge_references()
            .map(|e| connected_without(graph, e.source(), e.target(), e.id(), None))
            .collect();

        let mut ring_atom = vec![false; graph.node_count()];
        for e in graph.edge_references() {
            if ring_bond[e.id().index()] {
                ring_atom[e.source().index()] = true;
                ring_atom[e.target().index()] = true;
            }
        }

        let sssr = smallest_rings(graph, &ring_bond);
        Self {
            ring_bond,
            ring_atom,
            sssr,
        }
    }

    pub fn is_ring_bond(&self, bond: EdgeIndex) -> bool {
        self.ring_bond.get(bond.index()).copied().unwrap_or(false)
    }

    pub fn is_ring_atom(&self, atom: NodeIndex) -> bool {
        self.ring_atom.get(atom.index()).copied().unwrap_or(false)
    }

    pub fn sssr(&self) -> &[Vec<NodeIndex>] {
        &self.sssr
    }

    /// How many SSSR rings contain `atom`.
    pub fn ring_count(&self, atom: NodeIndex) -> usize {
        self.sssr.iter().filter(|r| r.contains(&atom)).count()
    }

    pub fn smallest_ring_size(&self, atom: NodeIndex) -> Option<usize> {
        self.sssr.iter().filter(|r| r.contains(&atom)).map(Vec::len).min()
    }
}

/// BFS from `from` to `to` that never crosses `skip`. When `ring_only` is
/// given, only bonds flagged there are walked.
fn connected_without<N, E>(
    graph: &UnGraph<N, E>,
    from: NodeIndex,
    to: NodeIndex,
    skip: EdgeIndex,
    ring_only: Option<&[bool]>,
) -> bool {
    shortest_path_without(graph, from, to, skip, ring_only).is_some()
}

fn shortest_path_without<N, E>(
    graph: &UnGraph<N, E>,
    from: NodeIndex,
    to: NodeIndex,
    skip: EdgeIndex,
    ring_only: Option<&[bool]>,
) -> Option<Vec<NodeIndex>> {
    let mut parent: Vec<Option<NodeIndex>> = vec![None; graph.node_count()];
    let mut seen = vec![false; graph.node_count()];
    let mut queue = VecDeque::new();
    seen[from.index()] = true;
    queue.push_back(from);

    while let Some(atom) = queue.pop_front() {
        if atom == to {
            let mut path = vec![to];
            let mut cur = to;
            while let Some(p) = parent[cur.index()] {
                path.push(p);
                cur = p;
            }
            path.reverse();
            return Some(path);
        }
        for e in graph.edges(atom) {
            if e.id() == skip {
                continue;
            }
            if let Some(flags) = ring_only {
                if !flags[e.id().index()] {
                    continue;
                }
            }
            let next = if e.source() == atom { e.target() } else { e.source() };
            if !seen[next.index()] {
                seen[next.index()] = true;
                parent[next.index()] = Some(atom);
                queue.push_back(next);
            }
        }
    }
    None
}

fn smallest_rings<N, E>(graph: &UnGraph<N, E>, ring_bond: &[bool]) -> Vec<Vec<NodeIndex>> {
    let components = petgraph::algo::connected_components(graph);
    let cyclomatic = (graph.edge_count() + components).saturating_sub(graph.node_count());
    if cyclomatic == 0 {
        return Vec::new();
    }

    // One shortest cycle through every ring bond.
    let mut seen = BTreeSet::new();
    let mut candidates = Vec::new();
    for e in graph.edge_references() {
        if !ring_bond[e.id().index()] {
            continue;
        }
        let path = shortest_path_without(graph, e.source(), e.target(), e.id(), Some(ring_bond));
        if let Some(path) = path {
            let mut key = path.clone();
            key.sort();
            if seen.insert(key) {
                candidates.push(path);
            }
        }
    }
    candidates.sort_by_key(Vec::len);

    // Keep the candidates whose bond sets are independent over GF(2).
    let words = graph.edge_count().div_ceil(64);
    let mut basis: Vec<(usize, Vec<u64>)> = Vec::new();
    let mut rings = Vec::new();
    for ring in candidates {
        if rings.len() == cyclomatic {
            break;
        }
        let mut bits = vec![0u64; words];
        for (i, a) in ring.iter().enumerate() {
            let b = ring[(i + 1) % ring.len()];
            if let Some(e) = graph.find_edge(*a, b) {
                bits[e.index() / 64] |= 1 << (e.index() % 64);
            }
        }
        for (pivot, row) in &basis {
            if bits[pivot / 64] & (1 << (pivot % 64)) != 0 {
                bits.iter_mut().zip(row).for_each(|(x, y)| *x ^= y);
            }
        }
        let pivot = bits
            .iter()
            .enumerate()
            .find(|(_, w)| **w != 0)
            .map(|(i, w)| i * 64 + w.trailing_zeros() as usize);
        if let Some(pivot) = pivot {
            basis.push((pivot, bits));
            rings.push(ring);
        }
    }
    rings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_smiles;

    #[test]
    fn chain_has_no_rings() {
        let mol = parse_smiles("CCCCO").unwrap();
        let rings = mol.rings();
        assert!(rings.sssr().is_empty());
        assert!(mol.atoms().all(|a| !rings.is_ring_atom(a)));
    }

    #[test]
    fn biphenyl_link_is_not_a_ring_bond() {
        let mol = parse_smiles("c1ccccc1-c1ccccc1").unwrap();
        let rings = mol.rings();
        assert_eq!(rings.sssr().len(), 2);
        let (link, _) = mol.bond_between(NodeIndex::new(5), NodeIndex::new(6)).unwrap();
        assert!(!rings.is_ring_bond(link));
        assert!(rings.is_ring_atom(NodeIndex::new(5)));
    }

    #[test]
    fn fused_rings() {
        // naphthalene
        let mol = parse_smiles("c1ccc2ccccc2c1").unwrap();
        let rings = mol.rings();
        assert_eq!(rings.sssr().len(), 2);
        assert!(rings.sssr().iter().all(|r| r.len() == 6));
        // ring fusion atoms sit in both rings
        assert_eq!(rings.ring_count(NodeIndex::new(3)), 2);
        assert_eq!(rings.ring_count(NodeIndex::new(0)), 1);
    }

    #[test]
    fn smallest_ring_size_per_atom() {
        let mol = parse_smiles("C1CC1CC1CCCCC1").unwrap();
        let rings = mol.rings();
        assert_eq!(rings.smallest_ring_size(NodeIndex::new(0)), Some(3));
        assert_eq!(rings.smallest_ring_size(NodeIndex::new(3)), None);
        assert_eq!(rings.smallest_ring_size(NodeIndex::new(6)), Some(6));
    }

    #[test]
    fn bicyclic_cage() {
        // bicyclo[2.2.2]octane: three equal paths, two independent rings
        let mol = parse_smiles("C1CC2CCC1CC2").unwrap();
        assert_eq!(mol.rings().sssr().len(), 2);
    }
}
