//! Embedding regeneration and similarity search commands.
//!
//! Ctrl-C during `regenerate` cancels the run after the current item; the
//! partial progress is still printed.

use orgloom::models::{OrgScope, RecordKind, RegenerationProgress};
use orgloom::services::regeneration::{RegenerationMode, TargetKinds};
use orgloom::services::{CancellationToken, RegenerationRequest, ServiceContainer};

use super::{CmdResult, EmbeddingsAction, print_json};

/// Embeddings command.
pub fn cmd_embeddings(container: &ServiceContainer, action: EmbeddingsAction) -> CmdResult {
    match action {
        EmbeddingsAction::Regenerate {
            org,
            kind,
            all,
            force,
        } => {
            let request = RegenerationRequest {
                organization: OrgScope::parse(&org),
                kinds: TargetKinds::parse(&kind)?,
                mode: if all {
                    RegenerationMode::All
                } else {
                    RegenerationMode::Missing
                },
                force,
            };
            let service = container.regeneration()?;

            let cancel = CancellationToken::new();
            let handler_token = cancel.clone();
            ctrlc::set_handler(move || {
                tracing::warn!("Cancellation requested, stopping after the current item");
                handler_token.cancel();
            })?;

            let progress = service.run(&request, &cancel, &report_progress)?;
            print_json(&progress)
        },
        EmbeddingsAction::Missing { org } => {
            let counts = container
                .regeneration()?
                .count_missing(&OrgScope::parse(&org))?;
            print_json(&counts)
        },
    }
}

/// Search command.
pub fn cmd_search(
    container: &ServiceContainer,
    query: &str,
    kind: &str,
    org: &str,
    limit: usize,
) -> CmdResult {
    let kind = RecordKind::parse(kind)
        .ok_or_else(|| orgloom::Error::InvalidInput(format!("unknown record kind: {kind}")))?;
    let hits = container
        .chroma_sync()?
        .find_similar(kind, &OrgScope::parse(org), query, limit)?;
    print_json(&hits)
}

#[allow(clippy::print_stderr)]
fn report_progress(progress: &RegenerationProgress) {
    if let Some(entry) = progress.logs.last() {
        eprintln!("[{}/{}] {}", progress.current, progress.total, entry.message);
    }
}
