//! Read-only kinship queries.
//!
//! Each query takes a fresh snapshot from the store and builds its own
//! [`KinshipGraph`], so concurrent queries never share mutable state and a
//! query never observes a half-applied load.

use std::sync::Arc;

use stamm_core::{
  kinship::{FamilyView, KinshipGraph, KinshipPath, MAX_GENERATIONS, TreeNode},
  person::PersonId,
  store::GenealogyStore,
};
use tracing::debug;

use crate::{Error, Result};

pub struct KinshipService<S> {
  store: Arc<S>,
}

impl<S> Clone for KinshipService<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S> KinshipService<S>
where
  S: GenealogyStore,
{
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  async fn graph(&self) -> Result<KinshipGraph> {
    let snapshot = self.store.kinship_snapshot().await.map_err(Error::store)?;
    debug!(
      persons = snapshot.persons.len(),
      families = snapshot.families.len(),
      links = snapshot.children.len(),
      "kinship snapshot"
    );
    Ok(KinshipGraph::new(snapshot))
  }

  fn check_generations(generations: u32) -> Result<()> {
    if (1..=MAX_GENERATIONS).contains(&generations) {
      Ok(())
    } else {
      Err(Error::InvalidGenerations { requested: generations, max: MAX_GENERATIONS })
    }
  }

  /// Ancestor tree of `id`, `generations` deep.
  pub async fn ancestors(&self, id: PersonId, generations: u32) -> Result<TreeNode> {
    Self::check_generations(generations)?;
    self.graph().await?.ancestors(id, generations)?.ok_or(Error::PersonNotFound(id))
  }

  /// Descendant tree of `id`, `generations` deep.
  pub async fn descendants(&self, id: PersonId, generations: u32) -> Result<TreeNode> {
    Self::check_generations(generations)?;
    self.graph().await?.descendants(id, generations)?.ok_or(Error::PersonNotFound(id))
  }

  /// Parents, spouses, children and siblings of `id`.
  pub async fn family(&self, id: PersonId) -> Result<FamilyView> {
    self.graph().await?.family(id).ok_or(Error::PersonNotFound(id))
  }

  /// Shortest relationship path from `a` to `b`. Unconnected people give
  /// `found: false`.
  pub async fn path(&self, a: PersonId, b: PersonId) -> Result<KinshipPath> {
    let graph = self.graph().await?;
    for id in [a, b] {
      if !graph.contains(id) {
        return Err(Error::PersonNotFound(id));
      }
    }
    graph.path(a, b).ok_or(Error::PersonNotFound(a))
  }
}
