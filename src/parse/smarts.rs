//! A SMARTS subset: atom and bond expressions with `!`, `&`, `,` and `;`,
//! ring and connectivity primitives, and recursive `$(...)` atoms.

use super::smiles::charge;
use super::Res;
use crate::element::Element;
use anyhow::{Context, Result};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, one_of, satisfy},
    combinator::{all_consuming, map, map_res, opt, recognize, verify},
    error::{Error as NomError, ErrorKind},
    multi::many0,
    sequence::{pair, preceded, terminated},
};
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmartsError {
    #[error("Empty SMARTS pattern")]
    Empty,
    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
    #[error("Malformed atom expression '[{0}]' at position {1}")]
    BadAtomExpr(String, usize),
    #[error("Malformed bond expression '{0}' at position {1}")]
    BadBondExpr(String, usize),
    #[error("Unclosed bracket '[' at position {0}")]
    UnclosedBracket(usize),
    #[error("Branch start '(' at position {0} without a current atom")]
    BranchNoCurrentAtom(usize),
    #[error("Branch end ')' at position {0} without a matching '('")]
    BranchEndNoStart(usize),
    #[error("Branch opened at position {0} is never closed")]
    UnclosedBranch(usize),
    #[error("Bond at position {0} has no atom to attach to")]
    DanglingBond(usize),
    #[error("Ring closure {0} at position {1} without a current atom")]
    RingClosureNoCurrentAtom(u16, usize),
    #[error("Ring closure {0} opened at position {1} is never closed")]
    UnclosedRing(u16, usize),
}

/// A boolean expression over primitives, shared by atom and bond queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<P> {
    Primitive(P),
    Not(Box<Expr<P>>),
    And(Box<Expr<P>>, Box<Expr<P>>),
    Or(Box<Expr<P>>, Box<Expr<P>>),
}

impl<P> Expr<P> {
    fn and(a: Self, b: Self) -> Self {
        Expr::And(Box::new(a), Box::new(b))
    }

    fn or(a: Self, b: Self) -> Self {
        Expr::Or(Box::new(a), Box::new(b))
    }

    fn not(a: Self) -> Self {
        Expr::Not(Box::new(a))
    }

    /// Evaluate with `test` deciding each primitive.
    pub fn eval(&self, test: &mut impl FnMut(&P) -> bool) -> bool {
        match self {
            Expr::Primitive(p) => test(p),
            Expr::Not(e) => !e.eval(test),
            Expr::And(a, b) => a.eval(test) && b.eval(test),
            Expr::Or(a, b) => a.eval(test) || b.eval(test),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AtomPrimitive {
    Any,
    Aromatic,
    Aliphatic,
    /// `C`, `c` or `#6`; `aromatic` is `None` for the atomic-number form.
    Element { atomic_number: u8, aromatic: Option<bool> },
    TotalHydrogens(u8),
    Degree(u8),
    Connectivity(u8),
    InRing,
    RingCount(u8),
    SmallestRing(u8),
    Charge(i8),
    Recursive(Box<SmartsPattern>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondPrimitive {
    Single,
    Double,
    Triple,
    Aromatic,
    Any,
    Ring,
}

pub type AtomExpr = Expr<AtomPrimitive>;
pub type BondExpr = Expr<BondPrimitive>;

impl BondExpr {
    /// A bond written without a symbol: single or aromatic.
    pub fn implicit() -> Self {
        Expr::or(
            Expr::Primitive(BondPrimitive::Single),
            Expr::Primitive(BondPrimitive::Aromatic),
        )
    }
}

pub type PatternGraph = UnGraph<AtomExpr, BondExpr>;

/// A compiled SMARTS query.
#[derive(Debug, Clone)]
pub struct SmartsPattern {
    graph: PatternGraph,
    source: String,
}

impl SmartsPattern {
    pub fn parse(smarts: &str) -> Result<Self> {
        parse_smarts_helper(smarts).context(format!("Failed to parse SMARTS pattern {smarts}"))
    }

    pub fn graph(&self) -> &PatternGraph {
        &self.graph
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }
}

impl PartialEq for SmartsPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl FromStr for SmartsPattern {
    type Err = SmartsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_smarts_helper(s)
    }
}

impl fmt::Display for SmartsPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

struct RingOpening {
    atom: NodeIndex,
    bond: Option<BondExpr>,
    position: usize,
}

fn parse_smarts_helper(smarts: &str) -> Result<SmartsPattern, SmartsError> {
    let smarts = smarts.trim();
    if smarts.is_empty() {
        return Err(SmartsError::Empty);
    }

    let chars: Vec<char> = smarts.chars().collect();
    let mut graph = PatternGraph::default();
    let mut current: Option<NodeIndex> = None;
    let mut pending: Option<(BondExpr, usize)> = None;
    let mut branch_stack: Vec<(NodeIndex, usize)> = Vec::new();
    let mut ring_map: BTreeMap<u16, RingOpening> = BTreeMap::new();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '(' => {
                let atom = current.ok_or(SmartsError::BranchNoCurrentAtom(i))?;
                if let Some((_, at)) = pending {
                    return Err(SmartsError::DanglingBond(at));
                }
                branch_stack.push((atom, i));
                i += 1;
            }
            ')' => {
                if let Some((_, at)) = pending {
                    return Err(SmartsError::DanglingBond(at));
                }
                let (atom, _) = branch_stack.pop().ok_or(SmartsError::BranchEndNoStart(i))?;
                current = Some(atom);
                i += 1;
            }
            '-' | '=' | '#' | ':' | '~' | '@' | '!' | ';' | '&' | ',' => {
                if current.is_none() || pending.is_some() {
                    return Err(SmartsError::DanglingBond(i));
                }
                let end = chars[i..]
                    .iter()
                    .position(|c| !"-=#:~@!;&,".contains(*c))
                    .map_or(chars.len(), |p| i + p);
                let text: String = chars[i..end].iter().collect();
                let (_, bond) = all_consuming(bond_expr)(text.as_str())
                    .map_err(|_| SmartsError::BadBondExpr(text.clone(), i))?;
                pending = Some((bond, i));
                i = end;
            }
            '.' => {
                if let Some((_, at)) = pending {
                    return Err(SmartsError::DanglingBond(at));
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
                    let number = digits
                        .parse::<u16>()
                        .map_err(|_| SmartsError::UnexpectedChar(c, i))?;
                    (number, i + 3)
                } else {
                    ((c as u8 - b'0') as u16, i + 1)
                };
                let atom = current.ok_or(SmartsError::RingClosureNoCurrentAtom(number, i))?;
                let bond = pending.take().map(|(bond, _)| bond);
                match ring_map.remove(&number) {
                    Some(open) => {
                        let bond = match (open.bond, bond) {
                            (Some(a), Some(b)) => Expr::and(a, b),
                            (Some(a), None) | (None, Some(a)) => a,
                            (None, None) => BondExpr::implicit(),
                        };
                        graph.add_edge(open.atom, atom, bond);
                    }
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
                let end = matching_bracket(&chars, i).ok_or(SmartsError::UnclosedBracket(i))?;
                let content: String = chars[i + 1..end].iter().collect();
                let (_, expr) = all_consuming(atom_expr)(content.as_str())
                    .map_err(|_| SmartsError::BadAtomExpr(content.clone(), i))?;
                current = Some(attach(&mut graph, current, &mut pending, expr));
                i = end + 1;
            }
            _ => {
                let (expr, width) =
                    shorthand_atom(&chars[i..]).ok_or(SmartsError::UnexpectedChar(c, i))?;
                current = Some(attach(&mut graph, current, &mut pending, expr));
                i += width;
            }
        }
    }

    if let Some((_, at)) = pending {
        return Err(SmartsError::DanglingBond(at));
    }
    if let Some((_, at)) = branch_stack.first() {
        return Err(SmartsError::UnclosedBranch(*at));
    }
    if let Some((number, open)) = ring_map.iter().next() {
        return Err(SmartsError::UnclosedRing(*number, open.position));
    }
    Ok(SmartsPattern {
        graph,
        source: smarts.to_string(),
    })
}

fn attach(
    graph: &mut PatternGraph,
    current: Option<NodeIndex>,
    pending: &mut Option<(BondExpr, usize)>,
    expr: AtomExpr,
) -> NodeIndex {
    let new_atom = graph.add_node(expr);
    if let Some(prev_atom) = current {
        let bond = pending
            .take()
            .map_or_else(BondExpr::implicit, |(bond, _)| bond);
        graph.add_edge(prev_atom, new_atom, bond);
    }
    new_atom
}

/// Index of the `]` closing the `[` at `start`, skipping nested brackets
/// inside recursive expressions.
fn matching_bracket(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in chars.iter().enumerate().skip(start) {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Atoms written outside brackets: organic symbols, `*`, `a` and `A`.
fn shorthand_atom(rest: &[char]) -> Option<(AtomExpr, usize)> {
    let element = |symbol: &str, aromatic: bool| {
        Element::from_symbol(symbol).map(|e| {
            Expr::Primitive(AtomPrimitive::Element {
                atomic_number: e.atomic_number,
                aromatic: Some(aromatic),
            })
        })
    };
    match rest {
        ['C', 'l', ..] => Some((element("Cl", false)?, 2)),
        ['B', 'r', ..] => Some((element("Br", false)?, 2)),
        [c @ ('B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I'), ..] => {
            Some((element(&c.to_string(), false)?, 1))
        }
        [c @ ('b' | 'c' | 'n' | 'o' | 'p' | 's'), ..] => {
            Some((element(&c.to_ascii_uppercase().to_string(), true)?, 1))
        }
        ['*', ..] => Some((Expr::Primitive(AtomPrimitive::Any), 1)),
        ['a', ..] => Some((Expr::Primitive(AtomPrimitive::Aromatic), 1)),
        ['A', ..] => Some((Expr::Primitive(AtomPrimitive::Aliphatic), 1)),
        _ => None,
    }
}

// Operator precedence, loosest first: `;` then `,` then `&` (or
// juxtaposition) then `!`.

fn low_and<P>(input: &str, primitive: fn(&str) -> Res<P>) -> Res<Expr<P>> {
    let (input, first) = or_expr(input, primitive)?;
    let (input, rest) = many0(preceded(char(';'), |i| or_expr(i, primitive)))(input)?;
    Ok((input, rest.into_iter().fold(first, Expr::and)))
}

fn or_expr<P>(input: &str, primitive: fn(&str) -> Res<P>) -> Res<Expr<P>> {
    let (input, first) = high_and(input, primitive)?;
    let (input, rest) = many0(preceded(char(','), |i| high_and(i, primitive)))(input)?;
    Ok((input, rest.into_iter().fold(first, Expr::or)))
}

fn high_and<P>(input: &str, primitive: fn(&str) -> Res<P>) -> Res<Expr<P>> {
    let (input, first) = not_expr(input, primitive)?;
    let (input, rest) = many0(preceded(opt(char('&')), |i| not_expr(i, primitive)))(input)?;
    Ok((input, rest.into_iter().fold(first, Expr::and)))
}

fn not_expr<P>(input: &str, primitive: fn(&str) -> Res<P>) -> Res<Expr<P>> {
    if let Some(rest) = input.strip_prefix('!') {
        let (rest, inner) = not_expr(rest, primitive)?;
        return Ok((rest, Expr::not(inner)));
    }
    map(primitive, Expr::Primitive)(input)
}

fn atom_expr(input: &str) -> Res<AtomExpr> {
    low_and(input, atom_primitive)
}

fn bond_expr(input: &str) -> Res<BondExpr> {
    low_and(input, bond_primitive)
}

fn bond_primitive(input: &str) -> Res<BondPrimitive> {
    map(one_of("-=#:~@"), |c| match c {
        '-' => BondPrimitive::Single,
        '=' => BondPrimitive::Double,
        '#' => BondPrimitive::Triple,
        ':' => BondPrimitive::Aromatic,
        '@' => BondPrimitive::Ring,
        _ => BondPrimitive::Any,
    })(input)
}

fn count(input: &str) -> Res<Option<u8>> {
    opt(map_res(digit1, str::parse::<u8>))(input)
}

fn atom_primitive(input: &str) -> Res<AtomPrimitive> {
    use AtomPrimitive as A;

    let element = |aromatic: bool| {
        move |symbol: &str| {
            let lookup = if aromatic {
                Element::from_aromatic_symbol(symbol)
            } else {
                Element::from_symbol(symbol)
            };
            lookup
                .map(|e| A::Element {
                    atomic_number: e.atomic_number,
                    aromatic: Some(aromatic),
                })
                .ok_or(ErrorKind::Verify)
        }
    };

    alt((
        map(char('*'), |_| A::Any),
        map(preceded(char('#'), map_res(digit1, str::parse::<u8>)), |n| A::Element {
            atomic_number: n,
            aromatic: None,
        }),
        map_res(preceded(tag("$("), terminated(balanced, char(')'))), |inner: &str| {
            parse_smarts_helper(inner).map(|p| A::Recursive(Box::new(p)))
        }),
        map_res(
            verify(
                recognize(pair(
                    satisfy(|c| c.is_ascii_uppercase()),
                    satisfy(|c| c.is_ascii_lowercase()),
                )),
                |s: &str| Element::from_symbol(s).is_some(),
            ),
            element(false),
        ),
        map(preceded(char('H'), count), |n| A::TotalHydrogens(n.unwrap_or(1))),
        map_res(alt((tag("se"), tag("as"))), element(true)),
        map_res(recognize(one_of("bcnops")), element(true)),
        map_res(
            verify(recognize(satisfy(|c| c.is_ascii_uppercase())), |s: &str| {
                Element::from_symbol(s).is_some()
            }),
            element(false),
        ),
        map(char('a'), |_| A::Aromatic),
        map(char('A'), |_| A::Aliphatic),
        map(preceded(char('D'), count), |n| A::Degree(n.unwrap_or(1))),
        map(preceded(char('X'), count), |n| A::Connectivity(n.unwrap_or(1))),
        map(preceded(char('R'), count), |n| n.map_or(A::InRing, A::RingCount)),
        map(preceded(char('r'), count), |n| n.map_or(A::InRing, A::SmallestRing)),
        map(charge, A::Charge),
    ))(input)
}

/// Text up to the `)` that balances an already consumed `(`.
fn balanced(input: &str) -> Res<&str> {
    let mut depth = 0usize;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' if depth == 0 => return Ok((&input[i..], &input[..i])),
            ')' => depth -= 1,
            _ => {}
        }
    }
    Err(nom::Err::Error(NomError::new(input, ErrorKind::TakeUntil)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use AtomPrimitive as A;

    fn atom(text: &str) -> AtomExpr {
        all_consuming(atom_expr)(text).unwrap().1
    }

    fn prim(p: AtomPrimitive) -> AtomExpr {
        Expr::Primitive(p)
    }

    #[test]
    fn atom_primitives() {
        assert_eq!(atom("#6"), prim(A::Element { atomic_number: 6, aromatic: None }));
        assert_eq!(atom("c"), prim(A::Element { atomic_number: 6, aromatic: Some(true) }));
        assert_eq!(atom("Cl"), prim(A::Element { atomic_number: 17, aromatic: Some(false) }));
        assert_eq!(atom("Hg"), prim(A::Element { atomic_number: 80, aromatic: Some(false) }));
        assert_eq!(atom("H2"), prim(A::TotalHydrogens(2)));
        assert_eq!(atom("R"), prim(A::InRing));
        assert_eq!(atom("R2"), prim(A::RingCount(2)));
        assert_eq!(atom("r6"), prim(A::SmallestRing(6)));
        assert_eq!(atom("+0"), prim(A::Charge(0)));
        assert_eq!(atom("-"), prim(A::Charge(-1)));
        assert_eq!(atom("X4"), prim(A::Connectivity(4)));
    }

    #[test]
    fn operator_precedence() {
        // `C;H2,H3` is C and (H2 or H3)
        let expected = Expr::and(
            prim(A::Element { atomic_number: 6, aromatic: Some(false) }),
            Expr::or(prim(A::TotalHydrogens(2)), prim(A::TotalHydrogens(3))),
        );
        assert_eq!(atom("C;H2,H3"), expected);

        // `!#6;!#1` is (not C) and (not H)
        let expected = Expr::and(
            Expr::not(prim(A::Element { atomic_number: 6, aromatic: None })),
            Expr::not(prim(A::Element { atomic_number: 1, aromatic: None })),
        );
        assert_eq!(atom("!#6;!#1"), expected);

        // juxtaposition binds like `&`
        assert_eq!(atom("#16R"), atom("#16&R"));
        assert_eq!(atom("CH2"), atom("C&H2"));
    }

    #[test]
    fn pattern_graph() {
        let pattern: SmartsPattern = "[#8]~[#6](~[#8])~[#8]".parse().unwrap();
        assert_eq!(pattern.atom_count(), 4);
        assert_eq!(pattern.graph().edge_count(), 3);

        let ring: SmartsPattern = "*1~*~*~*~1".parse().unwrap();
        assert_eq!(ring.atom_count(), 4);
        assert_eq!(ring.graph().edge_count(), 4);

        let bare: SmartsPattern = "c:n".parse().unwrap();
        assert_eq!(
            bare.graph().edge_weights().next(),
            Some(&Expr::Primitive(BondPrimitive::Aromatic))
        );

        let implicit: SmartsPattern = "CC".parse().unwrap();
        assert_eq!(implicit.graph().edge_weights().next(), Some(&BondExpr::implicit()));
    }

    #[test]
    fn bond_expressions() {
        let pattern: SmartsPattern = "[#6]=;@[#6](@*)@*".parse().unwrap();
        let first = pattern.graph().edge_weights().next().unwrap();
        assert_eq!(
            first,
            &Expr::and(
                Expr::Primitive(BondPrimitive::Double),
                Expr::Primitive(BondPrimitive::Ring)
            )
        );
        let negated: SmartsPattern = "*!@*".parse().unwrap();
        assert_eq!(
            negated.graph().edge_weights().next(),
            Some(&Expr::not(Expr::Primitive(BondPrimitive::Ring)))
        );
    }

    #[test]
    fn recursive_atoms() {
        let pattern: SmartsPattern =
            "[$(*~[CH2]~[CH2]~*),$([R]1@[CH2;R]@[CH2;R]1)]".parse().unwrap();
        assert_eq!(pattern.atom_count(), 1);
        match pattern.graph().node_weights().next() {
            Some(Expr::Or(a, b)) => {
                assert!(matches!(**a, Expr::Primitive(A::Recursive(ref p)) if p.atom_count() == 4));
                assert!(matches!(**b, Expr::Primitive(A::Recursive(ref p)) if p.atom_count() == 3));
            }
            other => panic!("unexpected expression {other:?}"),
        }
    }

    #[test]
    fn ring_closure_bond_at_opening() {
        let pattern: SmartsPattern = "[R]@1@[R]@[R]1".parse().unwrap();
        assert_eq!(pattern.graph().edge_count(), 3);
        assert!(pattern
            .graph()
            .edge_weights()
            .all(|b| *b == Expr::Primitive(BondPrimitive::Ring)));
    }

    #[test]
    fn errors() {
        assert_eq!("".parse::<SmartsPattern>(), Err(SmartsError::Empty));
        assert_eq!("[#6".parse::<SmartsPattern>(), Err(SmartsError::UnclosedBracket(0)));
        assert_eq!("*1~*".parse::<SmartsPattern>(), Err(SmartsError::UnclosedRing(1, 1)));
        assert_eq!("[Q]".parse::<SmartsPattern>(), Err(SmartsError::BadAtomExpr("Q".into(), 0)));
        assert!(SmartsPattern::parse("C(C").is_err());
    }
}
