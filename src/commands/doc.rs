//! Raw document store commands.

use orgloom::models::{Collection, QueryConditions, fields_from_value};
use orgloom::services::ServiceContainer;

use super::{CmdResult, DocAction, parse_json, print_json};

/// Doc command.
pub fn cmd_doc(container: &ServiceContainer, action: DocAction) -> CmdResult {
    let store = container.documents();
    match action {
        DocAction::Get { collection, id } => {
            let collection: Collection = collection.parse()?;
            match store.get(collection, &id)? {
                Some(doc) => print_json(&doc.flattened()),
                None => Err(orgloom::Error::NotFound {
                    collection: collection.to_string(),
                    id,
                }
                .into()),
            }
        },
        DocAction::Set {
            collection,
            id,
            data,
        } => {
            let fields = fields_from_value(parse_json(&data)?)?;
            let doc = store.set(collection.parse()?, &id, fields)?;
            print_json(&doc.flattened())
        },
        DocAction::Update {
            collection,
            id,
            data,
        } => {
            let fields = fields_from_value(parse_json(&data)?)?;
            let doc = store.update(collection.parse()?, &id, fields)?;
            print_json(&doc.flattened())
        },
        DocAction::Delete { collection, id } => {
            let deleted = store.delete(collection.parse()?, &id)?;
            print_json(&serde_json::json!({ "id": id, "deleted": deleted }))
        },
        DocAction::Add { collection, data } => {
            let fields = fields_from_value(parse_json(&data)?)?;
            let doc = store.add(collection.parse()?, fields)?;
            print_json(&doc.flattened())
        },
        DocAction::List { collection } => {
            let docs = store.list(collection.parse()?)?;
            print_json(&docs.iter().map(orgloom::Document::flattened).collect::<Vec<_>>())
        },
        DocAction::Query {
            collection,
            conditions,
        } => {
            let conditions = QueryConditions::from_json(&parse_json(&conditions)?)?;
            let docs = store.query(collection.parse()?, &conditions)?;
            print_json(&docs.iter().map(orgloom::Document::flattened).collect::<Vec<_>>())
        },
    }
}
