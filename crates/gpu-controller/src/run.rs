//! Wires the discovery catalog, pool, bootstrap, and preparation reconcilers
//! into one polling loop (spec §1 wiring note: "watchers/reconcile drivers
//! are set up once on controller start").
//!
//! This is a periodic-resync polling loop, not a `kube_runtime::Controller`
//! watch graph — simpler, and sufficient for the reconcile cadence this
//! binary needs.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::core::v1::Node;
use kube::{Api, Client, Resource, ResourceExt};

use gpu_api::{constants, GpuClusterPool, GpuDevice, GpuNodeState, GpuPool, GpuResourceClaim};
use gpu_bootstrap::reconcile_node_state;
use gpu_catalog::DeviceCatalog;
use gpu_prepare::{build_chain, reconcile_claim, Adapters};
use gpu_pool::reconcile_pool;
use gpu_runtime::chain::Chain;
use gpu_runtime::resource::ResourceWrapper;

/// Everything one reconcile pass over the whole cluster needs.
pub struct Controller {
    device_api: Api<GpuDevice>,
    pool_api: Api<GpuPool>,
    cluster_pool_api: Api<GpuClusterPool>,
    node_state_api: Api<GpuNodeState>,
    claim_api: Api<GpuResourceClaim>,
    node_api: Api<Node>,
    catalog: DeviceCatalog,
    adapters: Arc<Adapters>,
    prepare_chain: Chain<gpu_prepare::PrepareCtx>,
}

impl Controller {
    pub fn new(client: Client, adapters: Arc<Adapters>) -> Self {
        let device_api: Api<GpuDevice> = Api::all(client.clone());
        Controller {
            catalog: DeviceCatalog::new(device_api.clone()),
            device_api,
            pool_api: Api::all(client.clone()),
            cluster_pool_api: Api::all(client.clone()),
            node_state_api: Api::all(client.clone()),
            claim_api: Api::all(client.clone()),
            node_api: Api::all(client),
            adapters,
            prepare_chain: build_chain(),
        }
    }

    /// Runs every reconciler once, over every object currently on the
    /// server. Errors from one object are logged and do not abort the pass
    /// over the rest (a live controller's per-object requeue, collapsed here
    /// into "log and continue" since there is no work queue in this loop).
    pub async fn reconcile_once(&mut self) -> anyhow::Result<()> {
        self.catalog.refresh().await?;

        let pool_names = list_names(&self.pool_api).await?;
        let cluster_pool_names = list_names(&self.cluster_pool_api).await?;

        for name in &pool_names {
            let mut wrapper = ResourceWrapper::new(self.pool_api.clone(), name.clone());
            if let Err(e) = wrapper.fetch().await {
                tracing::warn!(pool = %name, error = %e, "fetching pool failed");
                continue;
            }
            let other_key = other_label_key(&cluster_pool_names, constants::CLUSTER_LABEL_PREFIX);
            if let Err(e) = reconcile_pool(&mut wrapper, &self.catalog, &self.device_api, &self.node_api, other_key).await {
                tracing::warn!(pool = %name, error = %e, "pool reconcile failed");
            }
        }

        for name in &cluster_pool_names {
            let mut wrapper = ResourceWrapper::new(self.cluster_pool_api.clone(), name.clone());
            if let Err(e) = wrapper.fetch().await {
                tracing::warn!(cluster_pool = %name, error = %e, "fetching cluster pool failed");
                continue;
            }
            let other_key = other_label_key(&pool_names, constants::NAMESPACED_LABEL_PREFIX);
            if let Err(e) = reconcile_pool(&mut wrapper, &self.catalog, &self.device_api, &self.node_api, other_key).await {
                tracing::warn!(cluster_pool = %name, error = %e, "cluster pool reconcile failed");
            }
        }

        for name in list_names(&self.node_state_api).await? {
            let mut wrapper = ResourceWrapper::new(self.node_state_api.clone(), name.clone());
            if let Err(e) = wrapper.fetch().await {
                tracing::warn!(node_state = %name, error = %e, "fetching node state failed");
                continue;
            }
            let observed_generation = wrapper.current().and_then(|c| c.meta().generation).unwrap_or(0);
            if let Err(e) = reconcile_node_state(&mut wrapper, &self.catalog, &self.device_api, observed_generation).await {
                tracing::warn!(node_state = %name, error = %e, "bootstrap reconcile failed");
            }
        }

        for name in list_names(&self.claim_api).await? {
            if let Err(e) = reconcile_claim(
                self.claim_api.clone(),
                &name,
                self.adapters.clone(),
                &self.prepare_chain,
            )
            .await
            {
                tracing::warn!(claim = %name, error = %e, "claim preparation reconcile failed");
            }
        }

        Ok(())
    }

    /// Reconciles every object on `resync_period`, forever.
    pub async fn run(mut self, resync_period: Duration) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(resync_period);
        loop {
            ticker.tick().await;
            if let Err(e) = self.reconcile_once().await {
                tracing::error!(error = %e, "reconcile pass failed");
            }
        }
    }
}

async fn list_names<T>(api: &Api<T>) -> Result<Vec<String>, kube::Error>
where
    T: kube::Resource<DynamicType = ()> + ResourceExt + Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    let list = api.list(&Default::default()).await?;
    Ok(list.items.iter().map(|obj| obj.name_any()).collect())
}

/// Closure mapping a pool name to the sibling-kind label key to strip if a
/// pool was switched from one kind to the other (spec §4.7). Only pools that
/// currently exist under the other kind get a key back.
fn other_label_key(other_kind_names: &[String], other_prefix: &'static str) -> impl Fn(&str) -> Option<String> + '_ {
    move |pool_name: &str| {
        let exists: HashSet<&str> = other_kind_names.iter().map(String::as_str).collect();
        exists
            .contains(pool_name)
            .then(|| gpu_api::node_label_key(other_prefix, pool_name))
    }
}
