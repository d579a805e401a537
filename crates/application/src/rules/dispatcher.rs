use async_trait::async_trait;
use tracing::info;

use domain::{ActionRequest, CommandDispatcher, ThingDescriptor};

/// Dispatcher that only logs. Used when running the gateway without peers
/// reachable and as the default seam in tests.
pub struct LoggingDispatcher;

#[async_trait]
impl CommandDispatcher for LoggingDispatcher {
    async fn dispatch(&self, target: &ThingDescriptor, request: &ActionRequest) {
        info!(
            thing_id = %target.id,
            action = %request.name,
            params = %request.params,
            "[LOG] dispatch"
        );
    }
}
