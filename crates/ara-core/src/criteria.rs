//! The criteria catalog: static reference data listing every topic and
//! criterion an audit can be scored against.
//!
//! The catalog is built once at startup and shared read-only. It is never
//! persisted per audit; stored results only reference `(topic, criterion)`
//! numbers.

use serde::{Deserialize, Serialize};

use crate::{Result, audit::AuditType};

/// A `(topic, criterion)` pair, e.g. `4.13`.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CriterionRef {
  pub topic:     u8,
  pub criterion: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
  pub number:     u8,
  /// The smallest audit type that includes this criterion.
  pub audit_type: AuditType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
  pub number:   u8,
  pub title:    String,
  pub criteria: Vec<Criterion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
  pub topics: Vec<Topic>,
}

// ─── Built-in RGAA 4.1 data ──────────────────────────────────────────────────

/// `(topic number, title, criterion count)`.
const RGAA_TOPICS: &[(u8, &str, u8)] = &[
  (1, "Images", 9),
  (2, "Cadres", 2),
  (3, "Couleurs", 3),
  (4, "Multimédia", 13),
  (5, "Tableaux", 8),
  (6, "Liens", 2),
  (7, "Scripts", 5),
  (8, "Éléments obligatoires", 10),
  (9, "Structuration de l'information", 4),
  (10, "Présentation de l'information", 14),
  (11, "Formulaires", 13),
  (12, "Navigation", 11),
  (13, "Consultation", 12),
];

const RGAA_FAST: &[(u8, u8)] = &[
  (1, 1), (1, 2), (1, 3), (2, 1), (3, 1), (3, 2), (4, 1), (5, 6), (6, 1),
  (7, 1), (7, 3), (8, 2), (8, 5), (8, 6), (8, 7), (9, 1), (10, 7), (11, 1),
  (11, 2), (11, 9), (12, 1), (12, 6), (12, 7), (12, 8), (13, 1),
];

const RGAA_COMPLEMENTARY: &[(u8, u8)] = &[
  (1, 4), (1, 5), (1, 6), (3, 3), (4, 2), (4, 3), (4, 8), (4, 10), (5, 1),
  (5, 7), (6, 2), (7, 2), (7, 4), (8, 3), (8, 4), (9, 2), (9, 3), (10, 1),
  (10, 2), (10, 4), (10, 11), (11, 10), (12, 9), (12, 11), (13, 3),
];

impl Catalog {
  /// The built-in RGAA 4.1 catalog (106 criteria; 25 for a fast audit and 50
  /// for a complementary one).
  pub fn rgaa() -> Self {
    let topics = RGAA_TOPICS
      .iter()
      .map(|&(topic, title, count)| Topic {
        number:   topic,
        title:    title.to_owned(),
        criteria: (1..=count)
          .map(|number| {
            let audit_type = if RGAA_FAST.contains(&(topic, number)) {
              AuditType::Fast
            } else if RGAA_COMPLEMENTARY.contains(&(topic, number)) {
              AuditType::Complementary
            } else {
              AuditType::Full
            };
            Criterion { number, audit_type }
          })
          .collect(),
      })
      .collect();
    Self { topics }
  }

  /// Load a catalog from its JSON representation.
  pub fn from_json(json: &str) -> Result<Self> { Ok(serde_json::from_str(json)?) }

  /// Every criterion that applies to `audit_type`, in catalog order.
  pub fn criteria(
    &self,
    audit_type: AuditType,
  ) -> impl Iterator<Item = CriterionRef> + '_ {
    self.topics.iter().flat_map(move |t| {
      t.criteria
        .iter()
        .filter(move |c| c.audit_type <= audit_type)
        .map(move |c| CriterionRef { topic: t.number, criterion: c.number })
    })
  }

  pub fn count(&self, audit_type: AuditType) -> usize {
    self.criteria(audit_type).count()
  }

  pub fn contains(&self, audit_type: AuditType, criterion: CriterionRef) -> bool {
    self
      .topic(criterion.topic)
      .and_then(|t| t.criteria.iter().find(|c| c.number == criterion.criterion))
      .is_some_and(|c| c.audit_type <= audit_type)
  }

  pub fn topic(&self, number: u8) -> Option<&Topic> {
    self.topics.iter().find(|t| t.number == number)
  }
}
