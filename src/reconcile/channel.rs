//! Alert-channel reconciler (spec §4.9): builds a live channel handle for
//! every `AlertChannel`, registers it with the dispatcher, and runs the
//! optional send-on-save test.
//!
//! Validation failures deregister the channel rather than leaving a stale
//! handle in place — a channel that stops validating should stop receiving
//! alerts, not keep using yesterday's config.

use std::sync::Arc;

use kube::api::{Api, ListParams, Patch, PatchParams};

use crate::crd::channel::{AlertChannel, ChannelStatus};
use crate::error::Result;

use super::ReconcileContext;

pub async fn run_once(ctx: &Arc<ReconcileContext>) -> Result<()> {
    let api: Api<AlertChannel> = Api::all(ctx.kube_client.clone());
    let channels = api
        .list(&ListParams::default())
        .await
        .map_err(|e| crate::error::PlatformError::Api(e.to_string()))?
        .items;

    for channel in channels {
        let namespace = channel.metadata.namespace.clone().unwrap_or_default();
        let name = channel.metadata.name.clone().unwrap_or_default();
        if let Err(error) = process_channel(ctx, &namespace, &name, &channel).await {
            tracing::warn!(%error, namespace = %namespace, channel = %name, "channel reconcile failed");
        }
    }

    Ok(())
}

async fn process_channel(
    ctx: &Arc<ReconcileContext>,
    namespace: &str,
    name: &str,
    channel: &AlertChannel,
) -> Result<()> {
    let api: Api<AlertChannel> = Api::namespaced(ctx.kube_client.clone(), namespace);

    let built = crate::dispatcher::channels::build_channel(
        name,
        namespace,
        &channel.spec,
        Arc::clone(&ctx.platform),
    );

    let mut status = channel.status.clone().unwrap_or_default();

    let handle = match built {
        Ok(handle) => handle,
        Err(error) => {
            ctx.dispatcher.remove(name);
            status.ready = false;
            status.reason = Some(error.to_string());
            patch_status(&api, name, status).await?;
            return Ok(());
        }
    };

    ctx.dispatcher
        .register(handle, channel.spec.rate_limiting.clone());
    status.ready = true;
    status.reason = None;

    if channel.spec.test_on_save {
        let now = chrono::Utc::now();
        match ctx.dispatcher.test_channel(name).await {
            Ok(()) => {
                status.last_test_result = Some("success".to_string());
                status.last_test_error = None;
            }
            Err(error) => {
                status.last_test_result = Some("failure".to_string());
                status.last_test_error = Some(error.to_string());
            }
        }
        status.last_test_time = Some(now);
    }

    patch_status(&api, name, status).await
}

async fn patch_status(api: &Api<AlertChannel>, name: &str, status: ChannelStatus) -> Result<()> {
    let patch = serde_json::json!({ "status": status });
    api.patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .map_err(|e| crate::error::PlatformError::Api(e.to_string()))?;
    Ok(())
}
