// ABOUTME: Handler contract implemented by providers, and the invocation that drives it.
// ABOUTME: Decodes prior state, runs the handler with a context, and persists the staged action.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::state::{StateRecord, StateStore};
use crate::types::{ResourceId, ResourceType, ScopeId};

use super::context::{Context, ContextError, Done, Previous, Staged};
use super::error::{HandlerError, ReconcileError};
use super::phase::Phase;

/// Reconciliation logic for one resource type.
///
/// The handler must honour `ctx.phase()` and take exactly one terminal action
/// (`ctx.commit` for create/update, `ctx.destroyed` for delete) before
/// returning. In delete phase `props` are the properties recorded at the
/// last successful invocation.
///
/// # Example
///
/// ```ignore
/// struct Network;
///
/// #[async_trait]
/// impl Handler for Network {
///     type Props = NetworkProps;
///     type Output = NetworkOutput;
///
///     async fn reconcile(
///         &self,
///         ctx: &mut Context<NetworkProps, NetworkOutput>,
///         id: &ResourceId,
///         props: &NetworkProps,
///     ) -> Result<Done, HandlerError> {
///         match ctx.phase() {
///             Phase::Delete => Ok(ctx.destroyed()?),
///             _ => {
///                 let output = ensure_network(id, props).await?;
///                 Ok(ctx.commit(output)?)
///             }
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Desired state declared by the caller.
    type Props: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// State produced by a successful create or update.
    type Output: Serialize + DeserializeOwned + Send + Sync + 'static;

    async fn reconcile(
        &self,
        ctx: &mut Context<Self::Props, Self::Output>,
        id: &ResourceId,
        props: &Self::Props,
    ) -> Result<Done, HandlerError>;
}

/// One handler invocation against the store.
pub(crate) struct Invocation<'a> {
    pub store: &'a dyn StateStore,
    pub scope: &'a ScopeId,
    pub id: &'a ResourceId,
    pub resource_type: &'a ResourceType,
    pub phase: Phase,
    pub sequence: u64,
    pub force_refresh: bool,
}

/// Result of a successful invocation.
pub(crate) enum Applied<O> {
    Committed { output: O, value: serde_json::Value },
    Destroyed,
}

/// Run a handler and persist whatever terminal action it took.
///
/// Nothing is written unless the handler returns `Ok` with a valid terminal
/// action, so a failing handler leaves the store as it was.
pub(crate) async fn invoke<H: Handler>(
    handler: &H,
    invocation: Invocation<'_>,
    props: &H::Props,
    prior: Option<&StateRecord>,
) -> Result<Applied<H::Output>, ReconcileError> {
    let id = invocation.id;

    let props_value = serde_json::to_value(props).map_err(|source| ReconcileError::Encode {
        id: id.clone(),
        source,
    })?;

    let previous = prior.map(decode_previous::<H>).transpose()?;
    let properties_changed =
        invocation.force_refresh || prior.is_none_or(|record| record.properties != props_value);

    let mut ctx = Context::new(
        invocation.scope.clone(),
        id.clone(),
        invocation.resource_type.clone(),
        invocation.phase,
        previous,
        properties_changed,
    );

    let result = handler.reconcile(&mut ctx, id, props).await;
    let (staged, misuse) = ctx.into_parts();

    if let Some(source) = misuse {
        return Err(ReconcileError::InvalidContextUse {
            id: id.clone(),
            source,
        });
    }

    if let Err(source) = result {
        return Err(ReconcileError::Handler {
            id: id.clone(),
            resource_type: invocation.resource_type.clone(),
            phase: invocation.phase,
            source,
        });
    }

    match staged {
        Staged::Committed(output) => {
            let value = serde_json::to_value(&output).map_err(|source| ReconcileError::Encode {
                id: id.clone(),
                source,
            })?;
            let record = StateRecord {
                id: id.clone(),
                resource_type: invocation.resource_type.clone(),
                properties: props_value,
                output: value.clone(),
                phase: invocation.phase,
                sequence: invocation.sequence,
                updated_at: Utc::now(),
            };
            invocation.store.put(invocation.scope, record).await?;
            Ok(Applied::Committed { output, value })
        }
        Staged::Destroyed => {
            invocation.store.remove(invocation.scope, id).await?;
            Ok(Applied::Destroyed)
        }
        Staged::Pending => Err(ReconcileError::InvalidContextUse {
            id: id.clone(),
            source: ContextError::NoTerminalAction,
        }),
    }
}

fn decode_previous<H: Handler>(
    record: &StateRecord,
) -> Result<Previous<H::Props, H::Output>, ReconcileError> {
    let decode = |source: serde_json::Error| ReconcileError::StateDecode {
        id: record.id.clone(),
        source,
    };
    Ok(Previous {
        properties: serde_json::from_value(record.properties.clone()).map_err(decode)?,
        output: serde_json::from_value(record.output.clone()).map_err(decode)?,
    })
}

/// Type-erased handle used to delete a record knowing only its type tag.
pub(crate) trait ErasedHandler: Send + Sync {
    fn destroy<'a>(
        &'a self,
        store: &'a dyn StateStore,
        scope: &'a ScopeId,
        record: &'a StateRecord,
    ) -> BoxFuture<'a, Result<(), ReconcileError>>;
}

pub(crate) struct Typed<H>(pub Arc<H>);

impl<H: Handler> ErasedHandler for Typed<H> {
    fn destroy<'a>(
        &'a self,
        store: &'a dyn StateStore,
        scope: &'a ScopeId,
        record: &'a StateRecord,
    ) -> BoxFuture<'a, Result<(), ReconcileError>> {
        Box::pin(async move {
            let props: H::Props = serde_json::from_value(record.properties.clone()).map_err(
                |source| ReconcileError::StateDecode {
                    id: record.id.clone(),
                    source,
                },
            )?;

            let invocation = Invocation {
                store,
                scope,
                id: &record.id,
                resource_type: &record.resource_type,
                phase: Phase::Delete,
                sequence: record.sequence,
                force_refresh: false,
            };

            invoke(self.0.as_ref(), invocation, &props, Some(record))
                .await
                .map(|_| ())
        })
    }
}
