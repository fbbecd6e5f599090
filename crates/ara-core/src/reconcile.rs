//! Nested-collection reconciliation: desired state → minimal row operations.
//!
//! An audit update carries the complete desired contents of each nested
//! collection. The planners here diff that against the persisted rows and
//! return the deletes, in-place updates and inserts that make the stored
//! collection equal to the payload. They are pure; the store executes the
//! plan inside one transaction.

use std::{collections::HashSet, hash::Hash};

use crate::{
  Error, Result,
  audit::{
    AuditedPage, EnvironmentInput, PageInput, Recipient, RecipientInput,
    TestEnvironment, Tool, ToolInput,
  },
};

/// Row operations that converge a persisted collection onto a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan<T> {
  /// Ids of persisted rows absent from the payload.
  pub delete: Vec<i64>,
  /// Persisted rows to overwrite in place, by id.
  pub update: Vec<(i64, T)>,
  pub insert: Vec<T>,
}

impl<T> Default for Plan<T> {
  fn default() -> Self {
    Self { delete: Vec::new(), update: Vec::new(), insert: Vec::new() }
  }
}

// ─── Natural keys ────────────────────────────────────────────────────────────

/// The fields of a collection item covered by its per-audit uniqueness
/// constraint.
pub trait NaturalKey {
  type Key: Eq + Hash;
  fn natural_key(&self) -> Self::Key;
}

/// A row that already has a database id.
pub trait Persisted {
  fn id(&self) -> i64;
}

impl NaturalKey for Recipient {
  type Key = String;
  fn natural_key(&self) -> String { self.email.clone() }
}

impl NaturalKey for RecipientInput {
  type Key = String;
  fn natural_key(&self) -> String { self.email.clone() }
}

impl Persisted for Recipient {
  fn id(&self) -> i64 { self.id }
}

impl NaturalKey for Tool {
  type Key = (String, String);
  fn natural_key(&self) -> Self::Key { (self.name.clone(), self.url.clone()) }
}

impl NaturalKey for ToolInput {
  type Key = (String, String);
  fn natural_key(&self) -> Self::Key { (self.name.clone(), self.url.clone()) }
}

impl Persisted for Tool {
  fn id(&self) -> i64 { self.id }
}

impl NaturalKey for TestEnvironment {
  type Key = (String, String, String, String);
  fn natural_key(&self) -> Self::Key {
    (
      self.platform.clone(),
      self.operating_system.clone(),
      self.assistive_technology.clone(),
      self.browser.clone(),
    )
  }
}

impl NaturalKey for EnvironmentInput {
  type Key = (String, String, String, String);
  fn natural_key(&self) -> Self::Key {
    (
      self.platform.clone(),
      self.operating_system.clone(),
      self.assistive_technology.clone(),
      self.browser.clone(),
    )
  }
}

impl Persisted for TestEnvironment {
  fn id(&self) -> i64 { self.id }
}

/// Plan a collection whose rows are identified by their natural key
/// (recipients, tools, environments).
///
/// When two payload items share a natural key the later one wins.
pub fn plan_by_key<E, I>(existing: &[E], incoming: Vec<I>) -> Plan<I>
where
  E: NaturalKey + Persisted,
  I: NaturalKey<Key = E::Key>,
{
  let incoming = last_wins(incoming, |item| Some(item.natural_key()));
  let wanted: HashSet<E::Key> =
    incoming.iter().map(NaturalKey::natural_key).collect();

  let mut plan = Plan {
    delete: existing
      .iter()
      .filter(|row| !wanted.contains(&row.natural_key()))
      .map(Persisted::id)
      .collect(),
    ..Plan::default()
  };

  for item in incoming {
    let key = item.natural_key();
    match existing.iter().find(|row| row.natural_key() == key) {
      Some(row) => plan.update.push((row.id(), item)),
      None => plan.insert.push(item),
    }
  }
  plan
}

// ─── Pages ───────────────────────────────────────────────────────────────────

/// A page payload item with its resolved position in the audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedPage {
  pub position: u32,
  pub name:     String,
  pub url:      String,
}

/// Plan the user pages of an audit. Pages are identified by id: items with an
/// id update that page, items without one are created, and persisted pages
/// whose id is absent from the payload are deleted (with their results).
///
/// Fails with [`Error::UnknownPage`] when an item carries an id that is not
/// one of `existing`. Positions follow payload order after duplicate ids have
/// been collapsed (later item wins).
pub fn plan_pages(
  existing: &[AuditedPage],
  incoming: Vec<PageInput>,
) -> Result<Plan<PlacedPage>> {
  let incoming = last_wins(incoming, |page| page.id);

  let known: HashSet<i64> = existing.iter().map(|p| p.id).collect();
  if let Some(id) = incoming.iter().filter_map(|p| p.id).find(|id| !known.contains(id)) {
    return Err(Error::UnknownPage(id));
  }

  let kept: HashSet<i64> = incoming.iter().filter_map(|p| p.id).collect();
  let mut plan = Plan {
    delete: existing
      .iter()
      .map(|p| p.id)
      .filter(|id| !kept.contains(id))
      .collect(),
    ..Plan::default()
  };

  for (position, page) in incoming.into_iter().enumerate() {
    let placed = PlacedPage {
      position: position as u32,
      name:     page.name,
      url:      page.url,
    };
    match page.id {
      Some(id) => plan.update.push((id, placed)),
      None => plan.insert.push(placed),
    }
  }
  Ok(plan)
}

/// Drop every item that is followed by a later item with the same key.
/// Items whose key is `None` are always kept. Order is otherwise preserved.
fn last_wins<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
  K: Eq + Hash,
  F: Fn(&T) -> Option<K>,
{
  let mut seen = HashSet::new();
  let mut kept: Vec<T> = items
    .into_iter()
    .rev()
    .filter(|item| key(item).is_none_or(|k| seen.insert(k)))
    .collect();
  kept.reverse();
  kept
}
