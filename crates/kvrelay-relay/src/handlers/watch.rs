use axum::body::Body;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use bytes::Bytes;
use futures::StreamExt;

use kvrelay_core::tuple::{decode_key, encode_key};
use kvrelay_proto::{KvEntry, Watch, WatchKeyOutput, WatchOutput};

use crate::auth::require_ephemeral_token;
use crate::error::RelayError;
use crate::state::ApiState;

fn entry_to_kv_entry(entry: kvrelay_engine::EngineEntry) -> Result<KvEntry, RelayError> {
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

/// Prepends a 4-byte little-endian length to a frame payload, the envelope
/// every `WatchOutput` is wrapped in on the wire.
fn frame(payload: Vec<u8>) -> Bytes {
    let mut framed = Vec::with_capacity(4 + payload.len());
    framed.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    framed.extend_from_slice(&payload);
    Bytes::from(framed)
}

/// `POST /kv/watch` — opens a streaming response body, one framed
/// `WatchOutput` per engine update batch. The stream ends when
/// the engine watch ends (client disconnect on the next yield point, or an
/// engine error); there is no back-channel and no re-open.
pub async fn handle(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RelayError> {
    require_ephemeral_token(&headers, &state.ephemeral_tokens)?;

    let request = Watch::decode(&body)?;
    let keys = request
        .keys
        .iter()
        .map(|k| {
            let key = decode_key(&k.key)?;
            encode_key(&key)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut batches = state.engine.watch(keys);

    let body = Body::from_stream(async_stream::stream! {
        while let Some(result) = batches.next().await {
            let batch = match result {
                Ok(batch) => batch,
                Err(_) => break,
            };

            let mut output = WatchOutput { status: 0, keys: Vec::with_capacity(batch.len()) };
            let mut decode_failed = false;
            for change in batch {
                let entry_if_changed = match change.entry.map(entry_to_kv_entry).transpose() {
                    Ok(entry) => entry,
                    Err(_) => {
                        decode_failed = true;
                        break;
                    }
                };
                output.keys.push(WatchKeyOutput { changed: change.changed, entry_if_changed });
            }
            if decode_failed {
                break;
            }

            yield Ok::<Bytes, std::convert::Infallible>(frame(output.encode()));
        }
    });

    Ok(Response::builder()
        .header(axum::http::header::CONTENT_TYPE, "application/x-kvrelay-stream")
        .body(body)
        .expect("static response parts are always valid"))
}
