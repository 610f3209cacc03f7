//! Repair, integrity, quality and cascading delete commands.

use orgloom::models::{OrgScope, RecordKind};
use orgloom::services::{ServiceContainer, check_data_integrity, cleanup_missing_topic_ids};

use super::{CmdResult, EntitiesAction, IntegrityAction, NotesAction, RepairAction, print_json};

/// Repair command.
pub fn cmd_repair(container: &ServiceContainer, action: RepairAction) -> CmdResult {
    match action {
        RepairAction::Sync { org } => {
            let report = container.repair().repair_all(&OrgScope::parse(&org))?;
            print_json(&report)
        },
        RepairAction::Consistency { org, fix } => {
            let repair = container.repair();
            let inconsistencies = repair.check_consistency(&OrgScope::parse(&org))?;
            if fix {
                let result = repair.repair_inconsistencies(&inconsistencies);
                print_json(&serde_json::json!({
                    "inconsistencies": inconsistencies,
                    "repair": result,
                }))
            } else {
                print_json(&inconsistencies)
            }
        },
        RepairAction::Topics { org } => {
            let store = container.documents();
            let report = cleanup_missing_topic_ids(store.as_ref(), &OrgScope::parse(&org))?;
            print_json(&report)
        },
    }
}

/// Integrity command.
pub fn cmd_integrity(container: &ServiceContainer, action: IntegrityAction) -> CmdResult {
    match action {
        IntegrityAction::Check { org } => {
            let store = container.documents();
            print_json(&check_data_integrity(store.as_ref(), &OrgScope::parse(&org))?)
        },
    }
}

/// Quality command.
///
/// Without `kind`, prints the comprehensive report.
pub fn cmd_quality(container: &ServiceContainer, org: &str, kind: Option<&str>) -> CmdResult {
    let scope = OrgScope::parse(org);
    let quality = container.quality();
    match kind {
        None => print_json(&quality.comprehensive_report(&scope)?),
        Some(kind) => {
            let kind = RecordKind::parse(kind).ok_or_else(|| {
                orgloom::Error::InvalidInput(format!("unknown record kind: {kind}"))
            })?;
            print_json(&quality.report(kind, &scope)?)
        },
    }
}

/// Entities command.
pub fn cmd_entities(container: &ServiceContainer, action: EntitiesAction) -> CmdResult {
    match action {
        EntitiesAction::Delete { ids } => {
            let result = container.deletion().delete_entities(&ids);
            print_json(&result)
        },
    }
}

/// Notes command.
pub fn cmd_notes(container: &ServiceContainer, action: NotesAction) -> CmdResult {
    match action {
        NotesAction::Delete { id } => {
            let result = container.deletion().delete_meeting_note_with_relations(&id)?;
            print_json(&result)
        },
    }
}
