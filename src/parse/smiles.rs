use super::Res;
use crate::element::Element;
use crate::molecule::{Atom, Bond, Bond::*, Molecule, MoleculeGraph};
use crate::ring::RingInfo;
use anyhow::{Context, Result};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, one_of, satisfy},
    combinator::{all_consuming, map, map_res, opt, recognize, verify},
    multi::many1,
    sequence::{pair, preceded},
};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::BTreeMap;
use thiserror::Error;

/// Upper bound on search steps when looking for a Kekulé structure.
const KEKULIZE_BUDGET: usize = 100_000;

/// Largest formal charge magnitude a bracket atom may carry.
const MAX_CHARGE: i8 = 15;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmilesError {
    #[error("Empty SMILES string")]
    Empty,
    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
    #[error("Branch start '(' at position {0} without a current atom")]
    BranchNoCurrentAtom(usize),
    #[error("Branch end ')' at position {0} without a matching '('")]
    BranchEndNoStart(usize),
    #[error("Branch opened at position {0} is never closed")]
    UnclosedBranch(usize),
    #[error("Bond '{0}' at position {1} has no atom to attach to")]
    DanglingBond(char, usize),
    #[error("Bad ring closure number at position {0}")]
    BadRingNumber(usize),
    #[error("Ring closure {0} at position {1} without a current atom")]
    RingClosureNoCurrentAtom(u16, usize),
    #[error("Ring closure {0} at position {1} duplicates an existing bond")]
    DuplicateBond(u16, usize),
    #[error("Ring closure {0} at position {1} has conflicting bond symbols")]
    ConflictingRingBond(u16, usize),
    #[error("Ring closure {0} opened at position {1} is never closed")]
    UnclosedRing(u16, usize),
    #[error("Unclosed bracket '[' at position {0}")]
    UnclosedBracket(usize),
    #[error("Malformed bracket atom '[{0}]' at position {1}")]
    BadBracketAtom(String, usize),
    #[error("Unknown element '{0}' at position {1}")]
    UnknownElement(String, usize),
    #[error("Aromatic atom {symbol} (atom {index}) is not in a ring")]
    AromaticOutsideRing { symbol: &'static str, index: usize },
    #[error("Explicit valence {valence} for atom {index} ({symbol}) is greater than permitted")]
    Valence {
        symbol: &'static str,
        index: usize,
        valence: u32,
    },
    #[error("Cannot kekulize the aromatic system containing atom {0}")]
    Kekulize(usize),
}

/// Parses a SMILES string into a [`Molecule`].
///
/// Anything after the first whitespace is treated as a title and ignored.
/// Plain explicit hydrogens are folded into their neighbour, implicit
/// hydrogens are assigned from default valences, and the aromatic system
/// must admit a Kekulé structure.
pub fn parse_smiles(smiles: &str) -> Result<Molecule> {
    parse_smiles_helper(smiles).context(format!("Failed to parse SMILES string {smiles}"))
}

fn parse_smiles_helper(smiles: &str) -> Result<Molecule, SmilesError> {
    let smiles = smiles
        .trim_start()
        .split(|c: char| c.is_whitespace())
        .next()
        .unwrap_or_default();
    if smiles.is_empty() {
        return Err(SmilesError::Empty);
    }
    let graph = read_graph(smiles)?;
    finish(graph, smiles)
}

struct RingOpening {
    atom: NodeIndex,
    bond: Option<Bond>,
    position: usize,
}

/// The character loop: atoms, bonds, branches and ring closures.
fn read_graph(smiles: &str) -> Result<MoleculeGraph, SmilesError> {
    let chars: Vec<char> = smiles.chars().collect();
    let mut graph = MoleculeGraph::default();
    let mut current: Option<NodeIndex> = None;
    let mut pending: Option<(char, Bond, usize)> = None;
    let mut branch_stack: Vec<(NodeIndex, usize)> = Vec::new();
    let mut ring_map: BTreeMap<u16, RingOpening> = BTreeMap::new();

    let dangling = |(c, _, at): (char, Bond, usize)| SmilesError::DanglingBond(c, at);

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '(' => {
                let atom = current.ok_or(SmilesError::BranchNoCurrentAtom(i))?;
                if let Some(bond) = pending {
                    return Err(dangling(bond));
                }
                branch_stack.push((atom, i));
                i += 1;
            }
            ')' => {
                if let Some(bond) = pending {
                    return Err(dangling(bond));
                }
                let (atom, _) = branch_stack.pop().ok_or(SmilesError::BranchEndNoStart(i))?;
                current = Some(atom);
                i += 1;
            }
            '-' | '=' | '#' | ':' | '/' | '\\' => {
                if let Some(bond) = pending {
                    return Err(dangling(bond));
                }
                if current.is_none() {
                    return Err(SmilesError::DanglingBond(c, i));
                }
                let bond = match c {
                    '=' => Double,
                    '#' => Triple,
                    ':' => Aromatic,
                    // Directional bonds only carry stereo, which we don't perceive.
                    _ => Single,
                };
                pending = Some((c, bond, i));
                i += 1;
            }
            '.' => {
                if let Some(bond) = pending {
                    return Err(dangling(bond));
                }
                current = None;
                i += 1;
            }
            '%' | '0'..='9' => {
                let (number, next) = if c == '%' {
                    let digits: String = chars
                        .get(i + 1..i + 3)
                        .map(|d| d.iter().collect())
                        .unwrap_or_default();
                    if digits.len() != 2 || !digits.chars().all(|d| d.is_ascii_digit()) {
                        return Err(SmilesError::BadRingNumber(i));
                    }
                    let number = digits.parse::<u16>().map_err(|_| SmilesError::BadRingNumber(i))?;
                    (number, i + 3)
                } else {
                    ((c as u8 - b'0') as u16, i + 1)
                };
                let atom = current.ok_or(SmilesError::RingClosureNoCurrentAtom(number, i))?;
                let bond = pending.take().map(|(_, bond, _)| bond);
                match ring_map.remove(&number) {
                    Some(open) => close_ring(&mut graph, open, atom, bond, number, i)?,
                    None => {
                        ring_map.insert(
                            number,
                            RingOpening {
                                atom,
                                bond,
                                position: i,
                            },
                        );
                    }
                }
                i = next;
            }
            '[' => {
                let end = chars[i..]
                    .iter()
                    .position(|&x| x == ']')
                    .map(|p| i + p)
                    .ok_or(SmilesError::UnclosedBracket(i))?;
                let content: String = chars[i + 1..end].iter().collect();
                let atom = read_bracket_atom(&content, i)?;
                current = Some(attach(&mut graph, current, &mut pending, atom));
                i = end + 1;
            }
            _ => {
                let (atom, width) = organic_atom(&chars[i..]).ok_or_else(|| {
                    if c.is_ascii_alphabetic() {
                        SmilesError::UnknownElement(c.to_string(), i)
                    } else {
                        SmilesError::UnexpectedChar(c, i)
                    }
                })?;
                current = Some(attach(&mut graph, current, &mut pending, atom));
                i += width;
            }
        }
    }

    if let Some(bond) = pending {
        return Err(dangling(bond));
    }
    if let Some((_, at)) = branch_stack.first() {
        return Err(SmilesError::UnclosedBranch(*at));
    }
    if let Some((number, open)) = ring_map.iter().next() {
        return Err(SmilesError::UnclosedRing(*number, open.position));
    }
    Ok(graph)
}

/// Two aromatic atoms written next to each other share an aromatic bond.
fn implicit_bond(a: &Atom, b: &Atom) -> Bond {
    if a.aromatic && b.aromatic {
        Aromatic
    } else {
        Single
    }
}

fn attach(
    graph: &mut MoleculeGraph,
    current: Option<NodeIndex>,
    pending: &mut Option<(char, Bond, usize)>,
    atom: Atom,
) -> NodeIndex {
    let new_atom = graph.add_node(atom);
    if let Some(prev_atom) = current {
        let bond = match pending.take() {
            Some((_, bond, _)) => bond,
            None => implicit_bond(&graph[prev_atom], &atom),
        };
        graph.add_edge(prev_atom, new_atom, bond);
    }
    new_atom
}

fn close_ring(
    graph: &mut MoleculeGraph,
    open: RingOpening,
    atom: NodeIndex,
    bond: Option<Bond>,
    number: u16,
    position: usize,
) -> Result<(), SmilesError> {
    if open.atom == atom || graph.find_edge(open.atom, atom).is_some() {
        return Err(SmilesError::DuplicateBond(number, position));
    }
    let bond = match (open.bond, bond) {
        (Some(a), Some(b)) if a != b => {
            return Err(SmilesError::ConflictingRingBond(number, position))
        }
        (Some(bond), _) | (None, Some(bond)) => bond,
        (None, None) => implicit_bond(&graph[open.atom], &graph[atom]),
    };
    graph.add_edge(open.atom, atom, bond);
    Ok(())
}

/// Organic-subset atoms and the `*` wildcard. Returns the atom and how many
/// characters it took.
fn organic_atom(rest: &[char]) -> Option<(Atom, usize)> {
    let lookup = |symbol: &str| Element::from_symbol(symbol).copied();
    match rest {
        ['C', 'l', ..] => Some((Atom::new(lookup("Cl")?), 2)),
        ['B', 'r', ..] => Some((Atom::new(lookup("Br")?), 2)),
        [c @ ('B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I' | '*'), ..] => {
            Some((Atom::new(lookup(&c.to_string())?), 1))
        }
        [c @ ('b' | 'c' | 'n' | 'o' | 'p' | 's'), ..] => {
            let element = Element::from_aromatic_symbol(&c.to_string())?;
            Some((Atom::aromatic(*element), 1))
        }
        _ => None,
    }
}

#[derive(Debug, PartialEq, Eq)]
struct BracketAtom<'a> {
    isotope: Option<u16>,
    symbol: &'a str,
    aromatic: bool,
    hydrogens: u8,
    charge: i8,
}

fn read_bracket_atom(content: &str, position: usize) -> Result<Atom, SmilesError> {
    let (_, parsed) = all_consuming(bracket_atom)(content)
        .map_err(|_| SmilesError::BadBracketAtom(content.to_string(), position))?;
    let element = if parsed.aromatic {
        Element::from_aromatic_symbol(parsed.symbol)
    } else {
        Element::from_symbol(parsed.symbol)
    }
    .ok_or_else(|| SmilesError::UnknownElement(parsed.symbol.to_string(), position + 1))?;

    Ok(Atom {
        element: *element,
        aromatic: parsed.aromatic,
        charge: parsed.charge,
        isotope: parsed.isotope,
        hydrogens: parsed.hydrogens,
        bracket: true,
    })
}

/// `isotope? symbol chirality? hcount? charge? class?`
fn bracket_atom(input: &str) -> Res<BracketAtom> {
    let (input, isotope) = opt(map_res(digit1, str::parse::<u16>))(input)?;
    let (input, (symbol, aromatic)) = bracket_symbol(input)?;
    let (input, _) = opt(chirality)(input)?;
    // A single digit at most: `[CH12]` is not a hydrogen count of 12.
    let (input, hydrogens) = opt(preceded(
        char('H'),
        map(opt(satisfy(|c| c.is_ascii_digit())), |d| {
            d.map_or(1, |d| d as u8 - b'0')
        }),
    ))(input)?;
    let (input, charge) = opt(charge)(input)?;
    let (input, _) = opt(preceded(char(':'), digit1))(input)?;
    Ok((
        input,
        BracketAtom {
            isotope,
            symbol,
            aromatic,
            hydrogens: hydrogens.unwrap_or(0),
            charge: charge.unwrap_or(0),
        },
    ))
}

fn bracket_symbol(input: &str) -> Res<(&str, bool)> {
    alt((
        map(tag("*"), |s| (s, false)),
        map(alt((tag("se"), tag("as"), tag("te"))), |s| (s, true)),
        map(recognize(one_of("bcnops")), |s| (s, true)),
        map(
            alt((
                verify(
                    recognize(pair(
                        satisfy(|c| c.is_ascii_uppercase()),
                        satisfy(|c| c.is_ascii_lowercase()),
                    )),
                    |s: &str| Element::from_symbol(s).is_some(),
                ),
                recognize(satisfy(|c| c.is_ascii_uppercase())),
            )),
            |s| (s, false),
        ),
    ))(input)
}

fn chirality(input: &str) -> Res<&str> {
    recognize(pair(
        alt((tag("@@"), tag("@"))),
        opt(pair(
            alt((tag("TH"), tag("AL"), tag("SP"), tag("TB"), tag("OH"))),
            digit1,
        )),
    ))(input)
}

/// `+`, `-`, `++`, `+2`, `-3` and so on, up to a magnitude of 15.
pub(super) fn charge(input: &str) -> Res<i8> {
    verify(
        alt((
            map(
                pair(one_of("+-"), map_res(digit1, str::parse::<i8>)),
                |(sign, n)| if sign == '-' { -n } else { n },
            ),
            map_res(many1(char('+')), |v| i8::try_from(v.len())),
            map_res(many1(char('-')), |v| i8::try_from(v.len()).map(|n| -n)),
        )),
        |c: &i8| c.abs() <= MAX_CHARGE,
    )(input)
}

/// Everything after the graph is read: hydrogens, rings, aromaticity checks.
fn finish(graph: MoleculeGraph, smiles: &str) -> Result<Molecule, SmilesError> {
    let mut graph = fold_hydrogens(graph);
    let rings = RingInfo::perceive(&graph);

    let edges: Vec<_> = graph.edge_indices().collect();
    for edge in edges {
        if graph[edge] == Aromatic && !rings.is_ring_bond(edge) {
            graph[edge] = Single;
        }
    }
    for atom in graph.node_indices() {
        if graph[atom].aromatic && !rings.is_ring_atom(atom) {
            return Err(SmilesError::AromaticOutsideRing {
                symbol: graph[atom].symbol(),
                index: atom.index(),
            });
        }
    }

    let needy = assign_hydrogens(&mut graph)?;
    kekulize(&graph, &needy)?;
    Ok(Molecule::from_parts(graph, smiles, rings))
}

/// Neutral, non-isotopic hydrogens with a single bond to a heavy atom
/// become part of that atom's hydrogen count.
fn fold_hydrogens(mut graph: MoleculeGraph) -> MoleculeGraph {
    let folds: Vec<(NodeIndex, NodeIndex)> = graph
        .node_indices()
        .filter_map(|h| {
            let atom = &graph[h];
            let plain = atom.charge == 0 && atom.isotope.is_none() && atom.hydrogens == 0;
            if !atom.is_hydrogen() || !plain {
                return None;
            }
            let mut edges = graph.edges(h);
            let edge = edges.next()?;
            if edges.next().is_some() || *edge.weight() != Single {
                return None;
            }
            let heavy = if edge.source() == h { edge.target() } else { edge.source() };
            (!graph[heavy].is_hydrogen()).then_some((h, heavy))
        })
        .collect();
    if folds.is_empty() {
        return graph;
    }

    let mut removed = vec![false; graph.node_count()];
    for (h, heavy) in folds {
        removed[h.index()] = true;
        graph[heavy].hydrogens = graph[heavy].hydrogens.saturating_add(1);
    }
    graph.filter_map(
        |idx, atom| (!removed[idx.index()]).then_some(*atom),
        |_, bond| Some(*bond),
    )
}

/// Fills in implicit hydrogens and checks valences. Returns, per atom,
/// whether it needs a double bond in the Kekulé form.
fn assign_hydrogens(graph: &mut MoleculeGraph) -> Result<Vec<bool>, SmilesError> {
    let mut needy = vec![false; graph.node_count()];
    for idx in graph.node_indices() {
        let used: u32 = graph.edges(idx).map(|e| e.weight().valence() as u32).sum();
        let atom = &mut graph[idx];
        let valences = atom.element.valences_with_charge(atom.charge);
        let (Some(&first), Some(&max)) = (valences.first(), valences.last()) else {
            continue;
        };
        let (first, max) = (first as u32, max as u32);
        let base = used + atom.hydrogens as u32;
        let too_high = SmilesError::Valence {
            symbol: atom.symbol(),
            index: idx.index(),
            valence: base,
        };

        match (atom.bracket, atom.aromatic) {
            (false, false) => {
                let target = valences
                    .iter()
                    .map(|&v| v as u32)
                    .find(|&v| v >= base)
                    .ok_or(too_high)?;
                atom.hydrogens += (target - base) as u8;
            }
            (false, true) if first > base => {
                atom.hydrogens += (first - base - 1) as u8;
                needy[idx.index()] = true;
            }
            (true, true) if first > base => needy[idx.index()] = true,
            _ if base > max => return Err(too_high),
            _ => {}
        }
    }
    Ok(needy)
}

/// Every atom that needs a double bond must get exactly one, along
/// aromatic bonds to another such atom.
fn kekulize(graph: &MoleculeGraph, needy: &[bool]) -> Result<(), SmilesError> {
    let partners: Vec<Vec<usize>> = graph
        .node_indices()
        .map(|atom| {
            if !needy[atom.index()] {
                return Vec::new();
            }
            graph
                .edges(atom)
                .filter(|e| *e.weight() == Aromatic)
                .map(|e| (if e.source() == atom { e.target() } else { e.source() }).index())
                .filter(|&other| needy[other])
                .collect()
        })
        .collect();

    let mut matched = vec![false; needy.len()];
    let mut budget = KEKULIZE_BUDGET;
    if perfect_matching(&partners, needy, &mut matched, &mut budget) {
        return Ok(());
    }
    let stuck = (0..needy.len())
        .filter(|&i| needy[i])
        .min_by_key(|&i| partners[i].len())
        .unwrap_or_default();
    Err(SmilesError::Kekulize(stuck))
}

fn perfect_matching(
    partners: &[Vec<usize>],
    needy: &[bool],
    matched: &mut [bool],
    budget: &mut usize,
) -> bool {
    if *budget == 0 {
        return false;
    }
    *budget -= 1;

    // Most constrained atom first.
    let next = (0..needy.len())
        .filter(|&i| needy[i] && !matched[i])
        .min_by_key(|&i| partners[i].iter().filter(|&&j| !matched[j]).count());
    let Some(atom) = next else {
        return true;
    };

    matched[atom] = true;
    for &other in &partners[atom] {
        if matched[other] {
            continue;
        }
        matched[other] = true;
        if perfect_matching(partners, needy, matched, budget) {
            return true;
        }
        matched[other] = false;
    }
    matched[atom] = false;
    false
}
