//! Payload checks performed before anything reaches the store.
//!
//! Structural problems (missing fields, wrong types) are already rejected by
//! the JSON extractor; these cover the semantic rules the types cannot express.

use ara_core::{
  Error, Result,
  audit::{AuditMetadata, AuditType, AuditUpdate, NewAudit, PageInput, RecipientInput},
  criteria::{Catalog, CriterionRef},
  result::ResultUpdate,
};

pub fn new_audit(input: &NewAudit) -> Result<()> {
  metadata(&input.metadata)?;
  recipients(&input.recipients)?;
  pages(&input.pages)
}

pub fn audit_update(update: &AuditUpdate) -> Result<()> {
  metadata(&update.metadata)?;
  recipients(&update.recipients)?;
  pages(&update.pages)?;
  if update.tools.iter().any(|t| t.name.trim().is_empty()) {
    return Err(Error::Invalid("tool name must not be empty".into()));
  }
  Ok(())
}

fn metadata(meta: &AuditMetadata) -> Result<()> {
  if meta.procedure_name.trim().is_empty() {
    return Err(Error::Invalid("procedure_name must not be empty".into()));
  }
  Ok(())
}

fn recipients(recipients: &[RecipientInput]) -> Result<()> {
  if recipients.iter().any(|r| r.email.trim().is_empty()) {
    return Err(Error::Invalid("recipient email must not be empty".into()));
  }
  Ok(())
}

fn pages(pages: &[PageInput]) -> Result<()> {
  if pages.is_empty() {
    return Err(Error::Invalid("an audit needs at least one page".into()));
  }
  for (i, page) in pages.iter().enumerate() {
    if page.name.trim().is_empty() || page.url.trim().is_empty() {
      return Err(Error::Invalid(format!("page {i} needs a name and a url")));
    }
  }
  Ok(())
}

/// The criterion must be scored under `audit_type`.
pub fn criterion(catalog: &Catalog, audit_type: AuditType, c: CriterionRef) -> Result<()> {
  if catalog.contains(audit_type, c) {
    Ok(())
  } else {
    Err(Error::UnknownCriterion { topic: c.topic, criterion: c.criterion })
  }
}

pub fn result_updates(
  catalog: &Catalog,
  audit_type: AuditType,
  updates: &[ResultUpdate],
) -> Result<()> {
  updates
    .iter()
    .try_for_each(|u| criterion(catalog, audit_type, u.criterion_ref()))
}

#[cfg(test)]
mod tests {
  use ara_core::result::CriterionStatus;

  use super::*;

  fn audit() -> NewAudit {
    NewAudit {
      metadata:   AuditMetadata::new(AuditType::Fast, "Démarche"),
      recipients: vec![],
      pages:      vec![PageInput::new("Accueil", "https://example.org")],
    }
  }

  #[test]
  fn accepts_minimal_audit() {
    assert!(new_audit(&audit()).is_ok());
  }

  #[test]
  fn rejects_blank_procedure_name() {
    let mut input = audit();
    input.metadata.procedure_name = "   ".into();
    assert!(matches!(new_audit(&input), Err(Error::Invalid(_))));
  }

  #[test]
  fn rejects_missing_pages() {
    let mut input = audit();
    input.pages.clear();
    assert!(matches!(new_audit(&input), Err(Error::Invalid(_))));

    let mut input = audit();
    input.pages[0].url = String::new();
    assert!(matches!(new_audit(&input), Err(Error::Invalid(_))));
  }

  #[test]
  fn rejects_blank_recipient_email_on_create() {
    let mut input = audit();
    input.recipients.push(RecipientInput { name: "Bob".into(), email: " ".into() });
    assert!(matches!(new_audit(&input), Err(Error::Invalid(_))));
  }

  #[test]
  fn rejects_blank_recipient_email() {
    let input = audit();
    let update = AuditUpdate {
      metadata:     input.metadata,
      recipients:   vec![RecipientInput { name: "Bob".into(), email: "".into() }],
      tools:        vec![],
      environments: vec![],
      pages:        input.pages,
    };
    assert!(matches!(audit_update(&update), Err(Error::Invalid(_))));
  }

  #[test]
  fn criteria_outside_audit_type_are_rejected() {
    let catalog = Catalog::rgaa();
    let update = |topic, criterion| ResultUpdate {
      page_id: 1,
      topic,
      criterion,
      status: CriterionStatus::Compliant,
      compliant_comment: None,
      not_compliant_comment: None,
      not_applicable_comment: None,
      user_impact: None,
      quick_win: false,
    };

    assert!(result_updates(&catalog, AuditType::Fast, &[update(1, 1)]).is_ok());
    // 1.4 is only part of complementary and full audits.
    assert!(matches!(
      result_updates(&catalog, AuditType::Fast, &[update(1, 1), update(1, 4)]),
      Err(Error::UnknownCriterion { topic: 1, criterion: 4 })
    ));
    assert!(result_updates(&catalog, AuditType::Complementary, &[update(1, 4)]).is_ok());
    assert!(result_updates(&catalog, AuditType::Full, &[update(14, 1)]).is_err());
  }
}
