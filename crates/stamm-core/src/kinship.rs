//! Query-time kinship graph.
//!
//! A [`KinshipGraph`] is built from one [`KinshipSnapshot`] and answers tree,
//! immediate-family and shortest-path queries over it. It holds no reference
//! to the store, so each query sees exactly the snapshot it was built from.
//!
//! Edges are parent, child and spouse; sibling relations are derived from
//! shared family membership and are never traversed. Adjacency uses ordered
//! sets so every traversal visits neighbours in ascending id order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  person::{Family, FamilyChild, FamilyId, Person, PersonId, Sex},
};

/// Deepest tree a caller may request.
pub const MAX_GENERATIONS: u32 = 10;

// ─── Input ───────────────────────────────────────────────────────────────────

/// Everything the graph needs, read in one transaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KinshipSnapshot {
  pub persons:  Vec<Person>,
  pub families: Vec<Family>,
  pub children: Vec<FamilyChild>,
}

// ─── Output ──────────────────────────────────────────────────────────────────

/// How one person is related to another. Read "`b` is the `relation` of `a`".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
  Parent,
  Child,
  Spouse,
  /// Child of the same family row.
  Sibling,
  /// Child of a different family row sharing at least one parent.
  HalfSibling,
}

impl Relation {
  /// The relation seen from the other side.
  pub fn inverse(self) -> Self {
    match self {
      Self::Parent => Self::Child,
      Self::Child => Self::Parent,
      other => other,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRef {
  pub id:   PersonId,
  pub xref: String,
  pub name: String,
  pub sex:  Sex,
}

impl From<&Person> for PersonRef {
  fn from(p: &Person) -> Self {
    Self { id: p.id, xref: p.xref.clone(), name: p.display_name(), sex: p.sex }
  }
}

/// One node of an ancestor or descendant tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
  pub person:         PersonRef,
  /// Distance from the root; the root is generation 0.
  pub generation:     u32,
  /// The person already appears higher up this branch. Not expanded.
  pub cycle_terminus: bool,
  /// Parents for an ancestor tree, children for a descendant tree.
  pub branches:       Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyView {
  pub person:        PersonRef,
  pub parents:       Vec<PersonRef>,
  pub spouses:       Vec<PersonRef>,
  pub children:      Vec<PersonRef>,
  pub siblings:      Vec<PersonRef>,
  pub half_siblings: Vec<PersonRef>,
}

/// A shortest relationship path. `relationship_labels[i]` is what
/// `nodes[i + 1]` is to `nodes[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KinshipPath {
  pub found:               bool,
  pub nodes:               Vec<PersonRef>,
  pub relationship_labels: Vec<Relation>,
}

impl KinshipPath {
  fn not_found() -> Self { Self { found: false, nodes: Vec::new(), relationship_labels: Vec::new() } }
}

// ─── Graph ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Direction {
  Up,
  Down,
}

type Adjacency = BTreeMap<PersonId, BTreeSet<PersonId>>;

#[derive(Debug, Default)]
pub struct KinshipGraph {
  persons:         BTreeMap<PersonId, Person>,
  parents:         Adjacency,
  children:        Adjacency,
  spouses:         Adjacency,
  /// Family rows each person is a child in.
  child_of:        BTreeMap<PersonId, BTreeSet<FamilyId>>,
  family_children: BTreeMap<FamilyId, BTreeSet<PersonId>>,
}

fn link(adj: &mut Adjacency, from: PersonId, to: PersonId) {
  adj.entry(from).or_default().insert(to);
}

impl KinshipGraph {
  pub fn new(snapshot: KinshipSnapshot) -> Self {
    let mut graph = Self {
      persons: snapshot.persons.into_iter().map(|p| (p.id, p)).collect(),
      ..Self::default()
    };

    let mut family_spouses: BTreeMap<FamilyId, Vec<PersonId>> = BTreeMap::new();
    for family in &snapshot.families {
      let spouses: Vec<PersonId> =
        family.spouses().filter(|id| graph.persons.contains_key(id)).collect();
      if let [a, b] = spouses[..]
        && a != b
      {
        link(&mut graph.spouses, a, b);
        link(&mut graph.spouses, b, a);
      }
      family_spouses.insert(family.id, spouses);
    }

    for fc in &snapshot.children {
      if !graph.persons.contains_key(&fc.child_id) {
        continue;
      }
      graph.child_of.entry(fc.child_id).or_default().insert(fc.family_id);
      graph.family_children.entry(fc.family_id).or_default().insert(fc.child_id);
      for &parent in family_spouses.get(&fc.family_id).into_iter().flatten() {
        link(&mut graph.parents, fc.child_id, parent);
        link(&mut graph.children, parent, fc.child_id);
      }
    }

    graph
  }

  pub fn contains(&self, id: PersonId) -> bool { self.persons.contains_key(&id) }

  pub fn person(&self, id: PersonId) -> Option<&Person> { self.persons.get(&id) }

  fn adjacent<'a>(adj: &'a Adjacency, id: PersonId) -> impl Iterator<Item = PersonId> + 'a {
    adj.get(&id).into_iter().flatten().copied()
  }

  fn refs(&self, ids: impl IntoIterator<Item = PersonId>) -> Vec<PersonRef> {
    ids.into_iter().filter_map(|id| self.persons.get(&id)).map(PersonRef::from).collect()
  }

  // ── Direct relations ──────────────────────────────────────────────────

  fn siblings_of(&self, id: PersonId) -> BTreeSet<PersonId> {
    self
      .child_of
      .get(&id)
      .into_iter()
      .flatten()
      .filter_map(|f| self.family_children.get(f))
      .flatten()
      .copied()
      .filter(|&other| other != id)
      .collect()
  }

  fn half_siblings_of(&self, id: PersonId) -> BTreeSet<PersonId> {
    let full = self.siblings_of(id);
    Self::adjacent(&self.parents, id)
      .flat_map(|p| Self::adjacent(&self.children, p))
      .filter(|&other| other != id && !full.contains(&other))
      .collect()
  }

  /// What `b` is to `a`, if they are directly related. Precedence when
  /// several apply: parent, child, spouse, sibling, half-sibling.
  pub fn relation(&self, a: PersonId, b: PersonId) -> Option<Relation> {
    let has = |adj: &Adjacency| adj.get(&a).is_some_and(|s| s.contains(&b));
    if a == b {
      None
    } else if has(&self.parents) {
      Some(Relation::Parent)
    } else if has(&self.children) {
      Some(Relation::Child)
    } else if has(&self.spouses) {
      Some(Relation::Spouse)
    } else if self.siblings_of(a).contains(&b) {
      Some(Relation::Sibling)
    } else if self.half_siblings_of(a).contains(&b) {
      Some(Relation::HalfSibling)
    } else {
      None
    }
  }

  /// Parents, spouses, children, siblings and half-siblings. `None` for an
  /// unknown person.
  pub fn family(&self, id: PersonId) -> Option<FamilyView> {
    let person = self.persons.get(&id)?;
    Some(FamilyView {
      person:        person.into(),
      parents:       self.refs(Self::adjacent(&self.parents, id)),
      spouses:       self.refs(Self::adjacent(&self.spouses, id)),
      children:      self.refs(Self::adjacent(&self.children, id)),
      siblings:      self.refs(self.siblings_of(id)),
      half_siblings: self.refs(self.half_siblings_of(id)),
    })
  }

  // ── Trees ─────────────────────────────────────────────────────────────

  pub fn ancestors(&self, id: PersonId, generations: u32) -> Result<Option<TreeNode>> {
    self.tree(id, generations, Direction::Up)
  }

  pub fn descendants(&self, id: PersonId, generations: u32) -> Result<Option<TreeNode>> {
    self.tree(id, generations, Direction::Down)
  }

  fn tree(&self, id: PersonId, generations: u32, dir: Direction) -> Result<Option<TreeNode>> {
    if !(1..=MAX_GENERATIONS).contains(&generations) {
      return Err(Error::InvalidGenerations { requested: generations, max: MAX_GENERATIONS });
    }
    let Some(root) = self.persons.get(&id) else { return Ok(None) };
    let mut path = BTreeSet::new();
    Ok(Some(self.expand(root, 0, generations, dir, &mut path)))
  }

  /// `path` holds the ids on the branch from the root to `person`; it is
  /// restored before returning so sibling branches may revisit the same
  /// people.
  fn expand(
    &self,
    person: &Person,
    generation: u32,
    max: u32,
    dir: Direction,
    path: &mut BTreeSet<PersonId>,
  ) -> TreeNode {
    let mut node = TreeNode {
      person: person.into(),
      generation,
      cycle_terminus: false,
      branches: Vec::new(),
    };
    if generation >= max {
      return node;
    }

    let adj = match dir {
      Direction::Up => &self.parents,
      Direction::Down => &self.children,
    };
    path.insert(person.id);
    for next in Self::adjacent(adj, person.id) {
      let Some(next) = self.persons.get(&next) else { continue };
      if path.contains(&next.id) {
        node.branches.push(TreeNode {
          person:         next.into(),
          generation:     generation + 1,
          cycle_terminus: true,
          branches:       Vec::new(),
        });
      } else {
        node.branches.push(self.expand(next, generation + 1, max, dir, path));
      }
    }
    path.remove(&person.id);
    node
  }

  // ── Shortest path ─────────────────────────────────────────────────────

  fn neighbours(&self, id: PersonId) -> BTreeSet<PersonId> {
    Self::adjacent(&self.parents, id)
      .chain(Self::adjacent(&self.children, id))
      .chain(Self::adjacent(&self.spouses, id))
      .collect()
  }

  /// Shortest path over parent/child/spouse edges. `None` for an unknown
  /// person; an unreachable pair is `found: false`.
  ///
  /// The search always runs from the lower id, so `path(a, b)` and
  /// `path(b, a)` are exact reverses of one another.
  pub fn path(&self, a: PersonId, b: PersonId) -> Option<KinshipPath> {
    if !self.contains(a) || !self.contains(b) {
      return None;
    }
    let Some(mut ids) = self.shortest(a.min(b), a.max(b)) else {
      return Some(KinshipPath::not_found());
    };
    if a > b {
      ids.reverse();
    }

    let relationship_labels = ids
      .windows(2)
      .filter_map(|pair| match self.relation(pair[0], pair[1]) {
        Some(r @ (Relation::Parent | Relation::Child | Relation::Spouse)) => Some(r),
        _ => None,
      })
      .collect();
    Some(KinshipPath { found: true, nodes: self.refs(ids), relationship_labels })
  }

  /// Level-synchronous bidirectional BFS, forward side first. Each level is
  /// expanded in ascending id order and the search stops at the first node
  /// both sides have reached, which is on a shortest path.
  fn shortest(&self, src: PersonId, dst: PersonId) -> Option<Vec<PersonId>> {
    if src == dst {
      return Some(vec![src]);
    }
    let mut fwd = Frontier::new(src);
    let mut bwd = Frontier::new(dst);
    while !fwd.level.is_empty() && !bwd.level.is_empty() {
      if let Some(meet) = fwd.advance(self, &bwd) {
        return Some(join(&fwd, &bwd, meet));
      }
      if let Some(meet) = bwd.advance(self, &fwd) {
        return Some(join(&fwd, &bwd, meet));
      }
    }
    None
  }
}

impl From<KinshipSnapshot> for KinshipGraph {
  fn from(snapshot: KinshipSnapshot) -> Self { Self::new(snapshot) }
}

/// One side of the bidirectional search.
struct Frontier {
  /// Visited ids and the id each was reached from.
  prev:  BTreeMap<PersonId, Option<PersonId>>,
  level: Vec<PersonId>,
}

impl Frontier {
  fn new(start: PersonId) -> Self {
    Self { prev: BTreeMap::from([(start, None)]), level: vec![start] }
  }

  fn advance(&mut self, graph: &KinshipGraph, other: &Frontier) -> Option<PersonId> {
    let mut next = Vec::new();
    for &u in &self.level {
      for v in graph.neighbours(u) {
        if self.prev.contains_key(&v) {
          continue;
        }
        self.prev.insert(v, Some(u));
        if other.prev.contains_key(&v) {
          return Some(v);
        }
        next.push(v);
      }
    }
    next.sort_unstable();
    self.level = next;
    None
  }

  /// Ids from `id` back to this side's start.
  fn trail(&self, id: PersonId) -> Vec<PersonId> {
    let mut out = vec![id];
    let mut cur = id;
    while let Some(Some(p)) = self.prev.get(&cur) {
      out.push(*p);
      cur = *p;
    }
    out
  }
}

fn join(fwd: &Frontier, bwd: &Frontier, meet: PersonId) -> Vec<PersonId> {
  let mut ids = fwd.trail(meet);
  ids.reverse();
  ids.extend(bwd.trail(meet).into_iter().skip(1));
  ids
}
