use crate::element::Element;
use crate::ring::RingInfo;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

/// An atom in a parsed molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom {
    pub element: Element,
    pub aromatic: bool,
    pub charge: i8,
    pub isotope: Option<u16>,
    /// Hydrogens carried by this atom (bracket count or implicit), not
    /// counting any hydrogen that is still its own node in the graph.
    pub hydrogens: u8,
    /// Written as a bracket atom in the source SMILES.
    pub bracket: bool,
}

impl Atom {
    pub fn new(element: Element) -> Self {
        Self {
            element,
            aromatic: false,
            charge: 0,
            isotope: None,
            hydrogens: 0,
            bracket: false,
        }
    }

    pub fn aromatic(element: Element) -> Self {
        Self {
            aromatic: true,
            ..Self::new(element)
        }
    }

    pub fn atomic_number(&self) -> u8 {
        self.element.atomic_number
    }

    pub fn symbol(&self) -> &'static str {
        self.element.symbol
    }

    pub fn is_hydrogen(&self) -> bool {
        self.element.is_hydrogen()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bond {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl Bond {
    /// Contribution to an atom's explicit valence. Aromatic bonds count as
    /// single here; the extra electron is handled by kekulization.
    pub fn valence(&self) -> u8 {
        match self {
            Bond::Single | Bond::Aromatic => 1,
            Bond::Double => 2,
            Bond::Triple => 3,
        }
    }
}

pub type MoleculeGraph = UnGraph<Atom, Bond>;

/// A parsed molecule: the atom/bond graph plus perceived ring information.
#[derive(Debug, Clone)]
pub struct Molecule {
    graph: MoleculeGraph,
    smiles: String,
    rings: RingInfo,
}

impl Molecule {
    /// Wrap a finished graph, perceiving its rings.
    pub fn new(graph: MoleculeGraph, smiles: impl Into<String>) -> Self {
        let rings = RingInfo::perceive(&graph);
        Self::from_parts(graph, smiles, rings)
    }

    pub(crate) fn from_parts(
        graph: MoleculeGraph,
        smiles: impl Into<String>,
        rings: RingInfo,
    ) -> Self {
        Self {
            graph,
            smiles: smiles.into(),
            rings,
        }
    }

    pub fn graph(&self) -> &MoleculeGraph {
        &self.graph
    }

    /// The SMILES text this molecule was parsed from.
    pub fn smiles(&self) -> &str {
        &self.smiles
    }

    pub fn rings(&self) -> &RingInfo {
        &self.rings
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn atoms(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn atom(&self, atom: NodeIndex) -> &Atom {
        &self.graph[atom]
    }

    pub fn bond(&self, bond: EdgeIndex) -> Bond {
        self.graph[bond]
    }

    pub fn bond_between(&self, a: NodeIndex, b: NodeIndex) -> Option<(EdgeIndex, Bond)> {
        self.graph.find_edge(a, b).map(|e| (e, self.graph[e]))
    }

    /// Neighbours of `atom` together with the connecting bond.
    pub fn neighbors(
        &self,
        atom: NodeIndex,
    ) -> impl Iterator<Item = (NodeIndex, EdgeIndex, Bond)> + '_ {
        self.graph.edges(atom).map(move |e| {
            let other = if e.source() == atom { e.target() } else { e.source() };
            (other, e.id(), *e.weight())
        })
    }

    /// Explicit connections in the graph.
    pub fn degree(&self, atom: NodeIndex) -> usize {
        self.graph.edges(atom).count()
    }

    /// Hydrogens on `atom`, whether folded into the atom or still explicit nodes.
    pub fn total_hydrogens(&self, atom: NodeIndex) -> u8 {
        let explicit = self
            .graph
            .neighbors(atom)
            .filter(|n| self.graph[*n].is_hydrogen())
            .count();
        let explicit = u8::try_from(explicit).unwrap_or(u8::MAX);
        self.graph[atom].hydrogens.saturating_add(explicit)
    }

    /// Explicit connections plus carried hydrogens.
    pub fn total_degree(&self, atom: NodeIndex) -> usize {
        self.degree(atom) + self.graph[atom].hydrogens as usize
    }

    pub fn fragment_count(&self) -> usize {
        petgraph::algo::connected_components(&self.graph)
    }

    /// Number of smallest rings whose bonds are all aromatic.
    pub fn aromatic_ring_count(&self) -> usize {
        self.rings
            .sssr()
            .iter()
            .filter(|ring| {
                ring.iter().enumerate().all(|(i, a)| {
                    let b = ring[(i + 1) % ring.len()];
                    matches!(self.bond_between(*a, b), Some((_, Bond::Aromatic)))
                })
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_smiles;

    #[test]
    fn counts_hydrogens_and_degree() {
        let mol = parse_smiles("CC(=O)O").unwrap();
        let carbonyl = NodeIndex::new(1);
        assert_eq!(mol.degree(carbonyl), 3);
        assert_eq!(mol.total_hydrogens(carbonyl), 0);
        assert_eq!(mol.total_hydrogens(NodeIndex::new(0)), 3);
        assert_eq!(mol.total_degree(NodeIndex::new(0)), 4);
    }

    #[test]
    fn fragments_and_aromatic_rings() {
        let mol = parse_smiles("c1ccc2ccccc2c1.[Na+].[Cl-]").unwrap();
        assert_eq!(mol.fragment_count(), 3);
        assert_eq!(mol.aromatic_ring_count(), 2);

        let mol = parse_smiles("C1CCCCC1").unwrap();
        assert_eq!(mol.fragment_count(), 1);
        assert_eq!(mol.aromatic_ring_count(), 0);
    }

    #[test]
    fn neighbors_report_bonds() {
        let mol = parse_smiles("C=CC#N").unwrap();
        let bonds: Vec<Bond> = mol.neighbors(NodeIndex::new(2)).map(|(_, _, b)| b).collect();
        assert_eq!(bonds.len(), 2);
        assert!(bonds.contains(&Bond::Single));
        assert!(bonds.contains(&Bond::Triple));
    }
}
