use std::collections::BTreeSet;
use tracing::{debug, instrument};

use crate::connection::Connection;
use crate::context::Context;
use crate::errors::Result;
use crate::types::AlertmanagerStatus;

/// Ask the shared endpoint which peers form the cluster
///
/// Returns the peers' hosts; an instance without cluster information yields
/// an empty set.
#[instrument(name = "resolve_peers", skip_all, fields(url = %shared.base_url()))]
pub(crate) async fn resolve_peers(shared: &Connection, ctx: &Context) -> Result<BTreeSet<String>> {
    let status = shared.get_status(ctx).await?;
    let hosts = peer_hosts(&status);
    debug!(peers = hosts.len(), "resolved cluster peers");
    Ok(hosts)
}

/// Hosts of the peers listed in `status`.
///
/// Peers report their gossip `address:port`; only the host is kept since the
/// API is served on a different port. Entries without a usable host are
/// skipped, they show up transiently while membership changes.
pub(crate) fn peer_hosts(status: &AlertmanagerStatus) -> BTreeSet<String> {
    let Some(cluster) = &status.cluster else {
        return BTreeSet::new();
    };

    cluster
        .peers
        .iter()
        .filter_map(|peer| peer.address.as_deref())
        .map(|address| address.rsplit_once(':').map_or(address, |(host, _)| host))
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .collect()
}
