use aws_config::BehaviorVersion;
use aws_sdk_firehose::Client;

/// Builds the Firehose client from the ambient AWS configuration (environment,
/// profile or the Lambda execution role).
pub async fn firehose_client() -> Client {
    let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let client = Client::new(&config);
    tracing::trace!(
        "[Firehose] Client configured for region {:?}",
        client.config().region()
    );
    client
}
