//! Centralized authorization gate.
//!
//! Every handler and runtime component that touches a principal-scoped
//! resource goes through [`authorize`]. Missing resources yield `NotFound`;
//! resources owned by someone else yield `AccessDenied`.

use wc_domain::error::{Error, Result};
use wc_domain::model::{AssistantProfile, Attachment, Principal, ResourceKind, Thread};
use wc_store::ChatStore;

/// A resource the caller is allowed to use.
#[derive(Debug, Clone)]
pub enum Authorized {
    Thread(Thread),
    Attachment(Attachment),
    /// Assistant profiles are shared; any principal may use an existing one.
    Assistant(AssistantProfile),
}

pub async fn authorize(
    store: &dyn ChatStore,
    principal: &Principal,
    kind: ResourceKind,
    id: &str,
) -> Result<Authorized> {
    let id = id.trim();
    if id.is_empty() {
        return Err(Error::InvalidArgument(format!("{kind} id must not be empty")));
    }

    let resource = match kind {
        ResourceKind::Thread => {
            let thread = store
                .get_thread(id)
                .await?
                .ok_or_else(|| Error::not_found(kind, id))?;
            check_owner(principal, &thread.user_id, kind, id)?;
            Authorized::Thread(thread)
        }
        ResourceKind::Attachment => {
            let attachment = store
                .get_attachment(id)
                .await?
                .ok_or_else(|| Error::not_found(kind, id))?;
            check_owner(principal, &attachment.user_id, kind, id)?;
            Authorized::Attachment(attachment)
        }
        ResourceKind::Assistant => {
            let profile = store
                .get_assistant(id)
                .await?
                .ok_or_else(|| Error::not_found(kind, id))?;
            Authorized::Assistant(profile)
        }
    };
    Ok(resource)
}

fn check_owner(principal: &Principal, owner: &str, kind: ResourceKind, id: &str) -> Result<()> {
    if principal.owns(owner) {
        Ok(())
    } else {
        tracing::warn!(principal = %principal, %kind, id, "access denied");
        Err(Error::access_denied(kind, id))
    }
}

pub async fn thread(store: &dyn ChatStore, principal: &Principal, id: &str) -> Result<Thread> {
    match authorize(store, principal, ResourceKind::Thread, id).await? {
        Authorized::Thread(thread) => Ok(thread),
        other => Err(mismatch(ResourceKind::Thread, &other)),
    }
}

pub async fn attachment(
    store: &dyn ChatStore,
    principal: &Principal,
    id: &str,
) -> Result<Attachment> {
    match authorize(store, principal, ResourceKind::Attachment, id).await? {
        Authorized::Attachment(attachment) => Ok(attachment),
        other => Err(mismatch(ResourceKind::Attachment, &other)),
    }
}

pub async fn assistant(
    store: &dyn ChatStore,
    principal: &Principal,
    id: &str,
) -> Result<AssistantProfile> {
    match authorize(store, principal, ResourceKind::Assistant, id).await? {
        Authorized::Assistant(profile) => Ok(profile),
        other => Err(mismatch(ResourceKind::Assistant, &other)),
    }
}

fn mismatch(expected: ResourceKind, got: &Authorized) -> Error {
    Error::Other(format!("authorization gate returned {got:?} for a {expected} lookup"))
}
