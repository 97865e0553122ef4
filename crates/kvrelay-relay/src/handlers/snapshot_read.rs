use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use kvrelay_core::tuple::{encode_key, Key, KeyPart, RangeKey, RangeMode};
use kvrelay_engine::{EngineEntry, ListOptions, RangeSelector};
use kvrelay_proto::{KvEntry, ReadRangeOutput, SnapshotRead, SnapshotReadOutput, SnapshotReadStatus};

use super::proto_response;
use crate::auth::require_ephemeral_token;
use crate::error::RelayError;
use crate::state::ApiState;

/// `after` is promoted to an exact key by appending an empty byte-part —
/// the lexicographically-smallest key strictly greater than the prefix it
/// marks. `exact` and `before` pass through unchanged;
/// callers only promote `before` endpoints that land in the `end` position.
fn promote(range_key: &RangeKey) -> Result<Vec<u8>, RelayError> {
    match range_key.mode {
        RangeMode::After => {
            let mut parts = range_key.key.0.clone();
            parts.push(KeyPart::Bytes(Vec::new()));
            Ok(encode_key(&Key(parts))?)
        }
        _ => Ok(encode_key(&range_key.key)?),
    }
}

fn entry_to_kv_entry(entry: EngineEntry) -> Result<KvEntry, RelayError> {
    let envelope = kvrelay_engine::envelope_from_engine_value(&entry.value);
    let versionstamp = hex::decode(&entry.versionstamp)
        .map_err(|err| RelayError::Engine(kvrelay_engine::EngineError::Io(err.to_string())))?;
    Ok(KvEntry {
        key: entry.key,
        value: envelope.data,
        encoding: envelope.encoding.to_wire(),
        versionstamp,
    })
}

/// `POST /snapshot_read` (and its `/kv/` alias).
pub async fn handle(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RelayError> {
    require_ephemeral_token(&headers, &state.ephemeral_tokens)?;

    let request = SnapshotRead::decode(&body)?;
    let mut output = SnapshotReadOutput {
        ranges: Vec::with_capacity(request.ranges.len()),
        read_disabled: false,
        read_is_strongly_consistent: true,
        status: SnapshotReadStatus::Success,
    };

    for range in &request.ranges {
        let start = kvrelay_core::tuple::decode_range_key(&range.start)?;
        let end = kvrelay_core::tuple::decode_range_key(&range.end)?;
        if start.mode == RangeMode::Before {
            return Err(RelayError::UnsupportedSelector);
        }

        let start_key = promote(&start)?;
        let selector = match end.mode {
            RangeMode::Before => RangeSelector::Prefix { start_key, prefix: encode_key(&end.key)? },
            _ => RangeSelector::Range { start_key, end_key: promote(&end)? },
        };

        let options = ListOptions { limit: range.limit, reverse: range.reverse };
        let entries = state.engine.list(selector, options).await?;
        let values = entries
            .into_iter()
            .map(entry_to_kv_entry)
            .collect::<Result<Vec<_>, _>>()?;
        output.ranges.push(ReadRangeOutput { values });
    }

    Ok(proto_response(output.encode()))
}
