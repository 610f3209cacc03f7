//! Theme and diagram commands.

use orgloom::models::TypeFilter;
use orgloom::services::{DiagramData, ServiceContainer};

use super::{CmdResult, ThemeAction, print_json};

/// Themes command.
pub fn cmd_themes(container: &ServiceContainer, action: ThemeAction) -> CmdResult {
    let themes = container.themes();
    match action {
        ThemeAction::List => print_json(&themes.list_ordered()?),
        ThemeAction::Create { title, description } => {
            print_json(&themes.create(&title, description.as_deref())?)
        },
        ThemeAction::Reorder { active, over } => {
            // Expected order is the stored order.
            let expected: Vec<String> = themes
                .list_ordered()?
                .into_iter()
                .map(|t| t.id)
                .collect();
            print_json(&themes.reorder(&expected, &active, &over)?)
        },
        ThemeAction::Delete { id } => {
            let deleted = themes.delete(&id)?;
            print_json(&serde_json::json!({ "id": id, "deleted": deleted }))
        },
    }
}

/// Diagram command.
pub fn cmd_diagram(
    container: &ServiceContainer,
    theme: Option<&str>,
    type_filter: &str,
) -> CmdResult {
    let data = DiagramData::load(container.documents().as_ref())?;
    let diagram = container
        .diagram_builder()
        .build(&data, theme, &TypeFilter::parse(type_filter));
    print_json(&diagram)
}
