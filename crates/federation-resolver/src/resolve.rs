use std::collections::{BTreeSet, HashSet};

use federation_core::{Action, ActionKind, EntityKey, StepDescriptor};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::ResolutionError;
use crate::map::{EntityBinding, FederationMap};
use crate::request::{MutationKind, MutationOperation, MutationRequest};

/// Resolves `request` into one step per operation, in declaration order.
///
/// # Errors
///
/// Returns the first [`ResolutionError`] encountered; no steps are produced
/// in that case.
pub fn resolve(
    request: &MutationRequest,
    map: &FederationMap,
) -> Result<Vec<StepDescriptor>, ResolutionError> {
    if request.operations.is_empty() {
        return Err(ResolutionError::EmptyMutation);
    }

    let mut response_keys = HashSet::new();
    let mut steps = Vec::with_capacity(request.operations.len());

    for (step_index, operation) in request.operations.iter().enumerate() {
        let response_key = operation.response_key().to_string();
        if !response_keys.insert(response_key.clone()) {
            return Err(ResolutionError::DuplicateResponseKey(response_key));
        }

        let binding = map.lookup(&operation.field, &operation.entity_type)?;
        let ids = entity_ids(operation, binding)?;
        let entity_keys: BTreeSet<EntityKey> = ids
            .iter()
            .map(|id| EntityKey::new(&operation.entity_type, id))
            .collect();

        let forward_action = Action::new(
            forward_kind(operation.kind),
            &operation.field,
            &operation.entity_type,
            json!({ "ids": ids, "input": operation.input }),
        );
        let compensating_action = compensation_for(operation, &ids);

        debug!(
            step = step_index,
            field = %operation.field,
            store = %binding.store,
            entities = entity_keys.len(),
            "resolved mutation step"
        );

        steps.push(StepDescriptor {
            step_index,
            target_store: binding.store.clone(),
            response_key,
            forward_action,
            compensating_action,
            entity_keys,
        });
    }

    Ok(steps)
}

fn forward_kind(kind: MutationKind) -> ActionKind {
    match kind {
        MutationKind::Create => ActionKind::Create,
        MutationKind::Update => ActionKind::Update,
        MutationKind::Delete => ActionKind::Delete,
        MutationKind::Read => ActionKind::Read,
    }
}

fn entity_ids(
    operation: &MutationOperation,
    binding: &EntityBinding,
) -> Result<Vec<String>, ResolutionError> {
    let mut ids = operation.ids.clone();

    if ids.is_empty() && operation.kind == MutationKind::Create {
        match operation.input.get(&binding.key_field) {
            Some(Value::String(id)) => ids.push(id.clone()),
            Some(Value::Number(id)) => ids.push(id.to_string()),
            _ => {}
        }
    }

    if ids.is_empty() {
        return Err(ResolutionError::MissingEntityKey {
            field: operation.field.clone(),
            entity_type: operation.entity_type.clone(),
            key_field: binding.key_field.clone(),
        });
    }
    Ok(ids)
}

/// Derives the undo action for a forward operation.
///
/// Updates and deletes are undone from the pre-image the forward action
/// returns, which the executor hands to the compensating adapter.
fn compensation_for(operation: &MutationOperation, ids: &[String]) -> Option<Action> {
    let entity = &operation.entity_type;
    let payload = json!({ "ids": ids });
    match operation.kind {
        MutationKind::Create => Some(Action::new(
            ActionKind::Delete,
            format!("delete{entity}"),
            entity,
            payload,
        )),
        MutationKind::Update => Some(Action::new(
            ActionKind::Revert,
            format!("revert{entity}"),
            entity,
            payload,
        )),
        MutationKind::Delete => Some(Action::new(
            ActionKind::Create,
            format!("restore{entity}"),
            entity,
            payload,
        )),
        MutationKind::Read => None,
    }
}

#[cfg(test)]
mod tests {
    use federation_core::StoreRef;

    use super::*;

    fn map() -> FederationMap {
        FederationMap::new()
            .bind("Order", StoreRef::local("orders"))
            .bind("User", StoreRef::subgraph("users"))
            .bind_with_key("Invoice", StoreRef::subgraph("billing"), "number")
    }

    #[test]
    fn empty_request_is_rejected() {
        let err = resolve(&MutationRequest::default(), &map()).expect_err("empty");

        assert_eq!(err, ResolutionError::EmptyMutation);
    }

    #[test]
    fn create_takes_entity_id_from_input() -> anyhow::Result<()> {
        let request = MutationRequest::new(vec![
            MutationOperation::new("createOrder", "Order", MutationKind::Create)
                .with_input(json!({"id": "o-1", "total": 10})),
        ]);

        let steps = resolve(&request, &map())?;

        assert_eq!(steps.len(), 1);
        assert_eq!(
            steps[0].entity_keys,
            BTreeSet::from([EntityKey::new("Order", "o-1")])
        );
        assert_eq!(steps[0].target_store, StoreRef::local("orders"));
        Ok(())
    }

    #[test]
    fn create_honours_custom_key_field() -> anyhow::Result<()> {
        let request = MutationRequest::new(vec![
            MutationOperation::new("createInvoice", "Invoice", MutationKind::Create)
                .with_input(json!({"number": 42})),
        ]);

        let steps = resolve(&request, &map())?;

        assert_eq!(
            steps[0].entity_keys,
            BTreeSet::from([EntityKey::new("Invoice", "42")])
        );
        Ok(())
    }

    #[test]
    fn update_without_ids_is_missing_entity_key() {
        let request = MutationRequest::new(vec![MutationOperation::new(
            "updateUser",
            "User",
            MutationKind::Update,
        )]);

        let err = resolve(&request, &map()).expect_err("no ids");

        assert!(matches!(err, ResolutionError::MissingEntityKey { .. }));
    }

    #[test]
    fn unresolvable_entity_fails_whole_request() {
        let request = MutationRequest::new(vec![
            MutationOperation::new("createOrder", "Order", MutationKind::Create)
                .with_input(json!({"id": "o-1"})),
            MutationOperation::new("createShipment", "Shipment", MutationKind::Create)
                .with_input(json!({"id": "s-1"})),
        ]);

        let err = resolve(&request, &map()).expect_err("unknown entity");

        assert!(matches!(err, ResolutionError::UnknownEntity { entity_type, .. } if entity_type == "Shipment"));
    }

    #[test]
    fn steps_preserve_declaration_order() -> anyhow::Result<()> {
        let request = MutationRequest::new(vec![
            MutationOperation::new("updateUser", "User", MutationKind::Update).with_ids(["u-1"]),
            MutationOperation::new("createOrder", "Order", MutationKind::Create)
                .with_input(json!({"id": "o-1"})),
            MutationOperation::new("user", "User", MutationKind::Read)
                .with_alias("refreshed")
                .with_ids(["u-1"]),
        ]);

        let steps = resolve(&request, &map())?;

        let indices: Vec<_> = steps.iter().map(|s| s.step_index).collect();
        let keys: Vec<_> = steps.iter().map(|s| s.response_key.as_str()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(keys, vec!["updateUser", "createOrder", "refreshed"]);
        StepDescriptor::validate_sequence(&steps)?;
        Ok(())
    }

    #[test]
    fn compensations_mirror_forward_kinds() -> anyhow::Result<()> {
        let request = MutationRequest::new(vec![
            MutationOperation::new("createOrder", "Order", MutationKind::Create)
                .with_input(json!({"id": "o-1"})),
            MutationOperation::new("updateUser", "User", MutationKind::Update).with_ids(["u-1"]),
            MutationOperation::new("deleteOrder", "Order", MutationKind::Delete)
                .with_alias("removed")
                .with_ids(["o-2"]),
            MutationOperation::new("user", "User", MutationKind::Read).with_ids(["u-1"]),
        ]);

        let steps = resolve(&request, &map())?;

        let kinds: Vec<_> = steps
            .iter()
            .map(|s| s.compensating_action.as_ref().map(|a| a.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                Some(ActionKind::Delete),
                Some(ActionKind::Revert),
                Some(ActionKind::Create),
                None,
            ]
        );
        assert_eq!(
            steps[0].compensating_action.as_ref().map(|a| a.operation.as_str()),
            Some("deleteOrder")
        );
        Ok(())
    }

    #[test]
    fn duplicate_response_keys_are_rejected() {
        let request = MutationRequest::new(vec![
            MutationOperation::new("updateUser", "User", MutationKind::Update).with_ids(["u-1"]),
            MutationOperation::new("updateUser", "User", MutationKind::Update).with_ids(["u-2"]),
        ]);

        let err = resolve(&request, &map()).expect_err("duplicate");

        assert_eq!(
            err,
            ResolutionError::DuplicateResponseKey("updateUser".to_string())
        );
    }
}
