use async_trait::async_trait;
use haex_common::Result;
use tracing::debug;

use crate::protocol::{HostRequest, HostResponse};

/// The single call/response primitive connecting the SDK to the host.
///
/// Implementations own transport, framing and any timeout or cancellation.
/// A failure to reach the host is `Error::Gateway`; a refusal by the host is
/// `Error::Host`. The SDK never retries.
#[async_trait]
pub trait RequestGateway: Send + Sync {
    async fn request(&self, request: HostRequest) -> Result<HostResponse>;
}

pub(crate) async fn dispatch(
    gateway: &dyn RequestGateway,
    request: HostRequest,
) -> Result<HostResponse> {
    let method = request.method();
    debug!(method, "sending host request");
    let response = gateway.request(request).await;
    match &response {
        Ok(resp) => debug!(method, kind = resp.kind(), "host request completed"),
        Err(e) => debug!(method, error = %e, "host request failed"),
    }
    response
}
