use anyhow::Result;
use clap::Parser;
use firehose_newline::{aws, config::Config, FirehoseEvent, FirehoseTransform};
use lambda_runtime::{run, service_fn, LambdaEvent};
use tracing::level_filters::LevelFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::try_parse()?;

    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from(config.log_level))
        .with_target(false)
        .with_ansi(false)
        .without_time()
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    tracing::debug!("Log level set to {}", config.log_level);

    let transform = FirehoseTransform::new(aws::firehose_client().await);
    let transform = &transform;

    run(service_fn(
        move |event: LambdaEvent<FirehoseEvent>| async move { transform.handle(event).await },
    ))
    .await
    .map_err(|e| anyhow::anyhow!(e))
}
