//! Substructure search: backtracking subgraph monomorphism of a SMARTS
//! pattern into a molecule.

use crate::molecule::{Bond, Molecule};
use crate::parse::{AtomExpr, AtomPrimitive, BondExpr, BondPrimitive, PatternGraph, SmartsPattern};
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::BTreeSet;
use std::ops::ControlFlow;

/// One embedding: entry `i` is the molecule atom matched by pattern atom `i`.
pub type Mapping = Vec<NodeIndex>;

impl SmartsPattern {
    pub fn is_match(&self, molecule: &Molecule) -> bool {
        let mut found = false;
        Matcher::new(self, molecule).search(None, &mut |_| {
            found = true;
            ControlFlow::Break(())
        });
        found
    }

    /// Does the pattern match with its first atom on `atom`? This is how
    /// recursive `$(...)` primitives are evaluated.
    pub fn matches_at(&self, molecule: &Molecule, atom: NodeIndex) -> bool {
        let mut found = false;
        Matcher::new(self, molecule).search(Some(atom), &mut |_| {
            found = true;
            ControlFlow::Break(())
        });
        found
    }

    /// All matches, keeping one mapping per distinct set of molecule atoms.
    pub fn unique_matches(&self, molecule: &Molecule) -> Vec<Mapping> {
        let mut seen = BTreeSet::new();
        let mut matches = Vec::new();
        Matcher::new(self, molecule).search(None, &mut |mapping| {
            let mut key = mapping.to_vec();
            key.sort();
            if seen.insert(key) {
                matches.push(mapping.to_vec());
            }
            ControlFlow::Continue(())
        });
        matches
    }

    /// Number of distinct atom sets matched, counting no further than `limit`.
    pub fn count_unique_matches(&self, molecule: &Molecule, limit: usize) -> usize {
        let mut seen = BTreeSet::new();
        if limit == 0 {
            return 0;
        }
        Matcher::new(self, molecule).search(None, &mut |mapping| {
            let mut key = mapping.to_vec();
            key.sort();
            seen.insert(key);
            if seen.len() >= limit {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        seen.len()
    }
}

struct Matcher<'a> {
    pattern: &'a PatternGraph,
    molecule: &'a Molecule,
    /// Pattern atoms in visiting order, each with an already visited
    /// neighbour when it has one.
    order: Vec<(NodeIndex, Option<NodeIndex>)>,
    mapping: Vec<Option<NodeIndex>>,
    used: Vec<bool>,
}

impl<'a> Matcher<'a> {
    fn new(pattern: &'a SmartsPattern, molecule: &'a Molecule) -> Self {
        let graph = pattern.graph();
        let mut order = Vec::with_capacity(graph.node_count());
        let mut visited = vec![false; graph.node_count()];
        for root in graph.node_indices() {
            if visited[root.index()] {
                continue;
            }
            visited[root.index()] = true;
            order.push((root, None));
            let mut head = order.len() - 1;
            while head < order.len() {
                let (atom, _) = order[head];
                let mut next: Vec<NodeIndex> = graph.neighbors(atom).collect();
                next.sort();
                for n in next {
                    if !visited[n.index()] {
                        visited[n.index()] = true;
                        order.push((n, Some(atom)));
                    }
                }
                head += 1;
            }
        }

        Self {
            pattern: graph,
            molecule,
            order,
            mapping: vec![None; graph.node_count()],
            used: vec![false; molecule.atom_count()],
        }
    }

    fn search(
        &mut self,
        anchor: Option<NodeIndex>,
        visit: &mut dyn FnMut(&[NodeIndex]) -> ControlFlow<()>,
    ) {
        if self.order.is_empty() {
            return;
        }
        let _ = self.extend(0, anchor, visit);
    }

    fn extend(
        &mut self,
        depth: usize,
        anchor: Option<NodeIndex>,
        visit: &mut dyn FnMut(&[NodeIndex]) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        if depth == self.order.len() {
            let mapping: Mapping = self.mapping.iter().flatten().copied().collect();
            return visit(&mapping);
        }

        let (query, parent) = self.order[depth];
        let mapped_parent = parent.and_then(|p| self.mapping[p.index()]);
        let candidates: Vec<NodeIndex> = match (mapped_parent, anchor) {
            (Some(host), _) => self.molecule.graph().neighbors(host).collect(),
            (None, Some(anchor)) if depth == 0 => vec![anchor],
            (None, _) => self.molecule.atoms().collect(),
        };

        for candidate in candidates {
            if self.used[candidate.index()] || !self.feasible(query, candidate) {
                continue;
            }
            self.mapping[query.index()] = Some(candidate);
            self.used[candidate.index()] = true;
            let flow = self.extend(depth + 1, anchor, visit);
            self.mapping[query.index()] = None;
            self.used[candidate.index()] = false;
            if flow.is_break() {
                return flow;
            }
        }
        ControlFlow::Continue(())
    }

    /// Atom expression holds, and every pattern bond back to an already
    /// mapped atom exists in the molecule and satisfies its bond expression.
    fn feasible(&self, query: NodeIndex, candidate: NodeIndex) -> bool {
        if !atom_matches(&self.pattern[query], self.molecule, candidate) {
            return false;
        }
        self.pattern.edges(query).all(|edge| {
            let other = if edge.source() == query { edge.target() } else { edge.source() };
            match self.mapping[other.index()] {
                None => true,
                Some(host) => match self.molecule.bond_between(candidate, host) {
                    Some((id, bond)) => bond_matches(edge.weight(), self.molecule, id, bond),
                    None => false,
                },
            }
        })
    }
}

pub fn atom_matches(expr: &AtomExpr, molecule: &Molecule, atom: NodeIndex) -> bool {
    let a = molecule.atom(atom);
    expr.eval(&mut |primitive| match primitive {
        AtomPrimitive::Any => true,
        AtomPrimitive::Aromatic => a.aromatic,
        AtomPrimitive::Aliphatic => !a.aromatic,
        AtomPrimitive::Element {
            atomic_number,
            aromatic,
        } => a.atomic_number() == *atomic_number && aromatic.map_or(true, |ar| ar == a.aromatic),
        AtomPrimitive::TotalHydrogens(n) => molecule.total_hydrogens(atom) == *n,
        AtomPrimitive::Degree(n) => molecule.degree(atom) == *n as usize,
        AtomPrimitive::Connectivity(n) => molecule.total_degree(atom) == *n as usize,
        AtomPrimitive::InRing => molecule.rings().is_ring_atom(atom),
        AtomPrimitive::RingCount(n) => molecule.rings().ring_count(atom) == *n as usize,
        AtomPrimitive::SmallestRing(n) => {
            molecule.rings().smallest_ring_size(atom) == Some(*n as usize)
        }
        AtomPrimitive::Charge(c) => a.charge == *c,
        AtomPrimitive::Recursive(pattern) => pattern.matches_at(molecule, atom),
    })
}

pub fn bond_matches(expr: &BondExpr, molecule: &Molecule, id: EdgeIndex, bond: Bond) -> bool {
    expr.eval(&mut |primitive| match primitive {
        BondPrimitive::Single => bond == Bond::Single,
        BondPrimitive::Double => bond == Bond::Double,
        BondPrimitive::Triple => bond == Bond::Triple,
        BondPrimitive::Aromatic => bond == Bond::Aromatic,
        BondPrimitive::Any => true,
        BondPrimitive::Ring => molecule.rings().is_ring_bond(id),
    })
}

#[cfg(test)]
mod tests {
    use crate::parse::SmartsPattern;
    use crate::parse_smiles;
    use anyhow::Result;

    fn count(smarts: &str, smiles: &str) -> Result<usize> {
        let pattern = SmartsPattern::parse(smarts)?;
        let molecule = parse_smiles(smiles)?;
        Ok(pattern.unique_matches(&molecule).len())
    }

    fn hit(smarts: &str, smiles: &str) -> Result<bool> {
        Ok(SmartsPattern::parse(smarts)?.is_match(&parse_smiles(smiles)?))
    }

    #[test]
    fn single_atom_counts() -> Result<()> {
        assert_eq!(count("[#8]", "OCC(=O)O")?, 3);
        assert_eq!(count("[CH3]", "CC(C)C")?, 3);
        assert_eq!(count("[C;H3,H4]", "C")?, 1);
        assert_eq!(count("[NH2]", "NCCN")?, 2);
        assert_eq!(count("a", "c1ccccc1C")?, 6);
        Ok(())
    }

    #[test]
    fn bonds_and_aromaticity() -> Result<()> {
        assert!(hit("c:n", "c1ccncc1")?);
        assert!(!hit("c:n", "c1ccccc1")?);
        assert!(hit("[#6]=[#8]", "CC(=O)C")?);
        assert!(!hit("[#6]=[#8]", "CCO")?);
        assert!(hit("[#6]#[#7]", "CC#N")?);
        assert!(hit("[#7]-[#8]", "CNO")?);
        Ok(())
    }

    #[test]
    fn ring_queries() -> Result<()> {
        assert_eq!(count("*1~*~*~*~*~*~1", "C1CCCCC1")?, 1);
        assert_eq!(count("*1~*~*~*~*~*~1", "c1ccc2ccccc2c1")?, 2);
        assert!(!hit("*1~*~*~*~*~1", "C1CCCCC1")?);
        assert!(!hit("*!@*", "C1CCCCC1")?);
        assert!(hit("*!@*", "CC1CCCCC1")?);
        assert!(hit("[#16R]", "c1ccsc1")?);
        assert!(!hit("[#16R]", "CSC")?);
        assert!(hit("[!C;!c;R]", "C1CCOC1")?);
        Ok(())
    }

    #[test]
    fn recursive_primitives() -> Result<()> {
        // every atom that starts a *-CH2-CH2-* path
        assert_eq!(count("[$(*~[CH2]~[CH2]~*)]", "CCCCC")?, 4);
        assert_eq!(count("[$(*~[CH2]~[CH2]~*),$([R]1@[CH2;R]@[CH2;R]1)]", "C1CC1")?, 3);
        assert!(!hit("[$(*~[CH2]~[CH2]~*)]", "CCC")?);
        Ok(())
    }

    #[test]
    fn charges_and_hydrogens() -> Result<()> {
        assert!(hit("[!+0]", "[NH4+]")?);
        assert!(!hit("[!+0]", "CCN")?);
        assert!(hit("[O;!H0]", "CCO")?);
        assert!(!hit("[O;!H0]", "COC")?);
        Ok(())
    }

    #[test]
    fn counting_stops_at_limit() -> Result<()> {
        let pattern = SmartsPattern::parse("[#6]")?;
        let molecule = parse_smiles("CCCCCC")?;
        assert_eq!(pattern.count_unique_matches(&molecule, 2), 2);
        assert_eq!(pattern.count_unique_matches(&molecule, 100), 6);
        assert_eq!(pattern.count_unique_matches(&molecule, 0), 0);
        Ok(())
    }

    #[test]
    fn anchored_match() -> Result<()> {
        let pattern = SmartsPattern::parse("[#8]~[#6]")?;
        let molecule = parse_smiles("CCO")?;
        let hits: Vec<bool> = molecule.atoms().map(|a| pattern.matches_at(&molecule, a)).collect();
        assert_eq!(hits, [false, false, true]);
        Ok(())
    }
}
