use aws_lambda_events::{
    encodings::MillisecondTimestamp,
    event::firehose::{KinesisFirehoseRecordMetadata, KinesisFirehoseResponse},
};
use aws_sdk_firehose::Client;
use lambda_runtime::LambdaEvent;
use serde::{Deserialize, Serialize};
use tracing::instrument;

pub mod aws;
pub mod config;
pub mod transform;

pub use transform::{transform_batch, transform_record, TransformError};

/// `result` value for a record that was transformed.
pub const RESULT_OK: &str = "Ok";

/// A batch of records handed to the transformation function by the delivery stream.
///
/// Mirrors `aws_lambda_events::event::firehose::KinesisFirehoseEvent`, except
/// that payloads stay as the base64 text from the wire so decoding is done by
/// [`transform_record`]. The envelope fields are tracing context only.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirehoseEvent {
    #[serde(default)]
    pub invocation_id: Option<String>,
    #[serde(default)]
    pub delivery_stream_arn: Option<String>,
    #[serde(default)]
    pub source_kinesis_stream_arn: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    pub records: Vec<FirehoseEventRecord>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirehoseEventRecord {
    pub record_id: String,
    /// Base64 payload.
    pub data: String,
    #[serde(default)]
    pub approximate_arrival_timestamp: Option<MillisecondTimestamp>,
    #[serde(default)]
    pub kinesis_record_metadata: Option<KinesisFirehoseRecordMetadata>,
}

/// Lambda handler state. Built once per process and shared by every invocation.
pub struct FirehoseTransform {
    firehose: Client,
}

impl FirehoseTransform {
    pub fn new(firehose: Client) -> Self {
        Self { firehose }
    }

    pub fn firehose(&self) -> &Client {
        &self.firehose
    }

    #[instrument(
        name = "firehose_newline.handle",
        skip_all,
        fields(
            invocation_id = event.payload.invocation_id.as_deref().unwrap_or_default(),
            delivery_stream = event.payload.delivery_stream_arn.as_deref().unwrap_or_default(),
            records = event.payload.records.len(),
        )
    )]
    pub async fn handle(
        &self,
        event: LambdaEvent<FirehoseEvent>,
    ) -> Result<KinesisFirehoseResponse, lambda_runtime::Error> {
        let (event, _context) = event.into_parts();

        match transform_batch(&event.records) {
            Ok(response) => {
                tracing::trace!("[Firehose] Batch transformed successfully");
                Ok(response)
            }
            Err(e) => {
                tracing::error!("[Firehose] Batch transformation error: {e}");
                Err(e.into())
            }
        }
    }
}
