//! Newline framing for Firehose records.
//!
//! Every payload is decoded, terminated with `\n` and re-encoded so that the
//! objects Firehose writes downstream hold one record per line.

use std::{collections::HashMap, string::FromUtf8Error};

use aws_lambda_events::{
    encodings::Base64Data,
    event::firehose::{
        KinesisFirehoseResponse, KinesisFirehoseResponseRecord,
        KinesisFirehoseResponseRecordMetadata,
    },
};
use base64::{
    alphabet,
    engine::{GeneralPurpose, GeneralPurposeConfig},
    DecodeError, Engine as _,
};
use thiserror::Error;

use crate::{FirehoseEventRecord, RESULT_OK};

/// Standard alphabet with canonical padding, tolerating non-zero trailing bits.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// A record whose payload could not be transformed. Fails the whole batch.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("record {record_id}: payload is not valid base64: {source}")]
    Base64 {
        record_id: String,
        #[source]
        source: DecodeError,
    },

    #[error("record {record_id}: payload is not valid UTF-8: {source}")]
    Utf8 {
        record_id: String,
        #[source]
        source: FromUtf8Error,
    },
}

impl TransformError {
    pub fn record_id(&self) -> &str {
        match self {
            Self::Base64 { record_id, .. } | Self::Utf8 { record_id, .. } => record_id,
        }
    }
}

/// Transforms a batch, preserving length, order and record ids.
///
/// There is no partial result: the first record that fails to decode aborts
/// the batch.
pub fn transform_batch(
    records: &[FirehoseEventRecord],
) -> Result<KinesisFirehoseResponse, TransformError> {
    let response = KinesisFirehoseResponse {
        records: records
            .iter()
            .map(transform_record)
            .collect::<Result<Vec<_>, _>>()?,
    };

    tracing::info!("Processed {} records.", records.len());

    Ok(response)
}

pub fn transform_record(
    record: &FirehoseEventRecord,
) -> Result<KinesisFirehoseResponseRecord, TransformError> {
    let bytes = decode_payload(&record.data).map_err(|source| TransformError::Base64 {
        record_id: record.record_id.clone(),
        source,
    })?;
    let mut payload = String::from_utf8(bytes).map_err(|source| TransformError::Utf8 {
        record_id: record.record_id.clone(),
        source,
    })?;

    payload.push('\n');

    Ok(KinesisFirehoseResponseRecord {
        record_id: Some(record.record_id.clone()),
        result: Some(RESULT_OK.to_string()),
        data: Base64Data(payload.into_bytes()),
        metadata: KinesisFirehoseResponseRecordMetadata {
            partition_keys: HashMap::new(),
        },
    })
}

/// Bytes outside the base64 alphabet (line breaks, spaces, stray punctuation)
/// are skipped; padding must still be correct.
fn decode_payload(data: &str) -> Result<Vec<u8>, DecodeError> {
    let encoded: Vec<u8> = data
        .bytes()
        .filter(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
        .collect();
    PAYLOAD_ENGINE.decode(encoded)
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD;

    use super::*;

    fn record(id: &str, payload: &[u8]) -> FirehoseEventRecord {
        encoded_record(id, &STANDARD.encode(payload))
    }

    fn encoded_record(id: &str, data: &str) -> FirehoseEventRecord {
        FirehoseEventRecord {
            record_id: id.to_string(),
            data: data.to_string(),
            ..Default::default()
        }
    }

    fn decoded(record: &KinesisFirehoseResponseRecord) -> String {
        String::from_utf8(record.data.0.clone()).unwrap()
    }

    #[test]
    fn appends_newline_to_payload() {
        let output = transform_record(&record("1", b"hello")).unwrap();

        assert_eq!(output.record_id.as_deref(), Some("1"));
        assert_eq!(output.result.as_deref(), Some(RESULT_OK));
        assert_eq!(STANDARD.encode(&output.data.0), "aGVsbG8K");
        assert_eq!(decoded(&output), "hello\n");
    }

    #[test]
    fn skips_line_breaks_and_spaces_in_payload() {
        for data in ["aGVs\nbG8=", "aGVs bG8=", "aGVs\r\nbG8=\n"] {
            let output = transform_record(&encoded_record("1", data)).unwrap();

            assert_eq!(STANDARD.encode(&output.data.0), "aGVsbG8K");
        }
    }

    #[test]
    fn tolerates_non_zero_trailing_bits() {
        let output = transform_record(&encoded_record("1", "aGVsbG9=")).unwrap();

        assert_eq!(STANDARD.encode(&output.data.0), "aGVsbG8K");
    }

    #[test]
    fn payload_of_only_non_alphabet_bytes_is_empty() {
        let output = transform_record(&encoded_record("1", "%%%")).unwrap();

        assert_eq!(decoded(&output), "\n");
    }

    #[test]
    fn missing_padding_is_rejected() {
        let err = transform_record(&encoded_record("short", "aGVsbG8")).unwrap_err();

        assert!(matches!(err, TransformError::Base64 { .. }));
        assert_eq!(err.record_id(), "short");
    }

    #[test]
    fn empty_payload_becomes_single_newline() {
        let output = transform_record(&record("empty", b"")).unwrap();

        assert_eq!(decoded(&output), "\n");
    }

    #[test]
    fn existing_trailing_newline_is_kept() {
        let output = transform_record(&record("1", b"line\n")).unwrap();

        assert_eq!(decoded(&output), "line\n\n");
    }

    #[test]
    fn multibyte_text_survives() {
        let output = transform_record(&record("1", "héllo wörld ✓".as_bytes())).unwrap();

        assert_eq!(decoded(&output), "héllo wörld ✓\n");
    }

    #[test]
    fn batch_preserves_length_order_and_ids() {
        let input = vec![
            record("c", b"{\"n\":3}"),
            record("a", b"{\"n\":1}"),
            record("b", b"{\"n\":2}"),
        ];

        let output = transform_batch(&input).unwrap().records;

        assert_eq!(output.len(), input.len());
        let ids: Vec<_> = output.iter().map(|r| r.record_id.as_deref().unwrap()).collect();
        assert_eq!(ids, ["c", "a", "b"]);
        let payloads: Vec<_> = output.iter().map(decoded).collect();
        assert_eq!(payloads, ["{\"n\":3}\n", "{\"n\":1}\n", "{\"n\":2}\n"]);
        assert!(output.iter().all(|r| r.result.as_deref() == Some(RESULT_OK)));
    }

    #[test]
    fn empty_batch_yields_empty_output() {
        assert!(transform_batch(&[]).unwrap().records.is_empty());
    }

    #[test]
    fn transform_is_not_idempotent() {
        let once = transform_record(&record("1", b"P")).unwrap();
        let twice = transform_record(&record("1", &once.data.0)).unwrap();

        assert_eq!(decoded(&twice), "P\n\n");
    }

    #[test]
    fn invalid_base64_fails_whole_batch() {
        for position in 0..3 {
            let mut input = vec![record("0", b"a"), record("1", b"b"), record("2", b"c")];
            input[position].data = "aGVsbG8".to_string();

            let err = transform_batch(&input).unwrap_err();

            assert!(matches!(err, TransformError::Base64 { .. }));
            assert_eq!(err.record_id(), position.to_string());
        }
    }

    #[test]
    fn non_utf8_payload_fails_batch() {
        let input = vec![record("ok", b"fine"), record("bad", &[0xff, 0xfe, 0x00])];

        let err = transform_batch(&input).unwrap_err();

        assert!(matches!(err, TransformError::Utf8 { .. }));
        assert_eq!(err.record_id(), "bad");
        assert!(err.to_string().contains("record bad"));
    }
}
