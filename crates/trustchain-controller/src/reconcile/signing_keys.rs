//! Signing-key membership
//!
//! An Operator or Account advertises the public keys of its ready signing
//! keys in its own token. Membership is recomputed from the current listing
//! on every pass. Members that stay keep their recorded position so an
//! unchanged set never rewrites status.

use std::collections::BTreeSet;
use tracing::{debug, info};
use trustchain_core::selector::selects;
use trustchain_core::{
    HasConditions, LabelSelector, Object, ObjectMeta, Reason, ResourceKind, SigningKey, SigningKeyEmbeddedStatus,
};

use super::{downcast, ConditionError, Context, Outcome};
use crate::error::Result;
use crate::events::{Event, EventReason};

/// Recomputed membership of one owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipUpdate {
    pub members: Vec<SigningKeyEmbeddedStatus>,
    /// True when the member set differs from the previous one
    pub changed: bool,
}

/// Whether a signing key counts as an active member of `owner`
fn is_member(owner_kind: ResourceKind, owner: &ObjectMeta, signing_key: &SigningKey) -> bool {
    let owner_ref = match &signing_key.status.owner_ref {
        Some(owner_ref) => owner_ref,
        None => return false,
    };

    let namespace = owner_ref
        .namespace
        .as_deref()
        .unwrap_or(&signing_key.metadata.namespace);

    owner_ref.kind == owner_kind.as_str()
        && owner_ref.name == owner.name
        && namespace == owner.namespace
        && owner_ref.uid.as_deref().map_or(true, |uid| uid == owner.uid)
        && signing_key.is_ready()
        && signing_key.status.key_pair.is_some()
}

/// Compute the next membership from a listing of candidate signing keys
pub fn next_signing_keys(
    owner_kind: ResourceKind,
    owner: &ObjectMeta,
    previous: &[SigningKeyEmbeddedStatus],
    listing: &[SigningKey],
) -> MembershipUpdate {
    let mut desired: Vec<SigningKeyEmbeddedStatus> = listing
        .iter()
        .filter(|sk| is_member(owner_kind, owner, sk))
        .filter_map(|sk| {
            sk.status.key_pair.clone().map(|key_pair| SigningKeyEmbeddedStatus {
                name: sk.metadata.name.clone(),
                key_pair,
            })
        })
        .collect();
    desired.sort_by(|a, b| a.name.cmp(&b.name));

    let desired_set: BTreeSet<&SigningKeyEmbeddedStatus> = desired.iter().collect();
    let previous_set: BTreeSet<&SigningKeyEmbeddedStatus> = previous.iter().collect();
    let changed = desired_set != previous_set;

    let mut members: Vec<SigningKeyEmbeddedStatus> = previous
        .iter()
        .filter(|member| desired_set.contains(member))
        .cloned()
        .collect();
    for member in &desired {
        if !previous_set.contains(member) && !members.contains(member) {
            members.push(member.clone());
        }
    }

    MembershipUpdate { members, changed }
}

/// Resolve the signing keys selected for an owner
///
/// An unset selector selects every signing key in the owner's namespace. An
/// invalid selector blocks the stage until the spec is fixed.
pub async fn resolve_signing_keys<R: Object + ?Sized>(
    ctx: &Context,
    owner: &R,
    selector: Option<&LabelSelector>,
    previous: &[SigningKeyEmbeddedStatus],
) -> Result<Outcome<Vec<SigningKeyEmbeddedStatus>>> {
    if let Some(Err(e)) = selector.map(LabelSelector::validate) {
        ctx.events.record(Event::warning(
            owner,
            EventReason::InvalidSigningKeysSelector,
            format!("Invalid signing keys selector: {}", e),
        ));
        return Ok(Outcome::Blocked(ConditionError::failed(
            Reason::InvalidSigningKeysSelector,
            e.to_string(),
        )));
    }

    let meta = owner.metadata();
    let mut listing = Vec::new();
    for resource in ctx.store.list(ResourceKind::SigningKey, &meta.namespace).await? {
        let signing_key: SigningKey = downcast(resource, ResourceKind::SigningKey)?;
        if selects(selector, &signing_key.metadata.labels) {
            listing.push(signing_key);
        }
    }

    let update = next_signing_keys(owner.kind(), meta, previous, &listing);
    if update.changed {
        let names: Vec<&str> = update.members.iter().map(|m| m.name.as_str()).collect();
        info!(owner = %meta.key(), members = ?names, "Signing keys changed");
        ctx.events.record(Event::normal(
            owner,
            EventReason::SigningKeysChanged,
            format!("Signing keys are now [{}]", names.join(", ")),
        ));
    } else {
        debug!(owner = %meta.key(), count = update.members.len(), "Signing keys unchanged");
    }

    Ok(Outcome::Ready(update.members))
}
