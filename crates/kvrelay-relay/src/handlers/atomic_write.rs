use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use bytes::Bytes;

use kvrelay_core::tuple::{decode_key, encode_key};
use kvrelay_engine::{
    engine_value_from_envelope, counter_from_envelope, envelope_from_engine_value, CommitOutcome,
    EngineCheck, EngineEnqueue, EngineMutation, ValueEncoding, ValueEnvelope,
};
use kvrelay_proto::{
    AtomicWrite, AtomicWriteOutput, AtomicWriteStatus, Mutation, MutationType,
};

use super::proto_response;
use crate::auth::require_ephemeral_token;
use crate::error::RelayError;
use crate::state::ApiState;

/// Decodes a `Mutation`'s value into the envelope shape the engine boundary
/// expects; `SET`/counter mutations require one, `DELETE` never carries one.
fn mutation_envelope(mutation: &Mutation) -> Result<ValueEnvelope, RelayError> {
    let value = mutation
        .value
        .as_ref()
        .ok_or_else(|| RelayError::BadRequest("mutation is missing a value".to_string()))?;
    Ok(ValueEnvelope {
        data: value.data.clone(),
        encoding: ValueEncoding::from_wire(value.encoding)?,
    })
}

fn expire_in_ms(expire_at_ms: i64, now_ms: i64) -> Option<i64> {
    if expire_at_ms > 0 {
        Some(expire_at_ms - now_ms)
    } else {
        None
    }
}

/// `POST /atomic_write` (and its `/kv/` alias). Checks,
/// mutations, and enqueues are attached to one engine transaction in the
/// exact order they arrive, then committed as a unit.
pub async fn handle(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RelayError> {
    require_ephemeral_token(&headers, &state.ephemeral_tokens)?;

    let request = AtomicWrite::decode(&body)?;
    let now_ms = chrono::Utc::now().timestamp_millis();

    let mut txn = state.engine.atomic();

    for check in &request.checks {
        let key = decode_key(&check.key)?;
        let versionstamp = if check.versionstamp.is_empty() {
            None
        } else {
            Some(hex::encode(&check.versionstamp))
        };
        txn.check(EngineCheck { key: encode_key(&key)?, versionstamp });
    }

    for mutation in &request.mutations {
        let key = decode_key(&mutation.key)?;
        match mutation.mutation_type {
            MutationType::Set => {
                let envelope = mutation_envelope(mutation)?;
                txn.mutate(EngineMutation::Set {
                    key: encode_key(&key)?,
                    value: engine_value_from_envelope(&envelope)?,
                    expire_in_ms: expire_in_ms(mutation.expire_at_ms, now_ms),
                });
            }
            MutationType::Delete => {
                txn.mutate(EngineMutation::Delete { key: encode_key(&key)? });
            }
            MutationType::Sum => {
                let envelope = mutation_envelope(mutation)?;
                txn.mutate(EngineMutation::Sum {
                    key: encode_key(&key)?,
                    delta: counter_from_envelope(&envelope)?,
                });
            }
            MutationType::Max => {
                let envelope = mutation_envelope(mutation)?;
                txn.mutate(EngineMutation::Max {
                    key: encode_key(&key)?,
                    value: counter_from_envelope(&envelope)?,
                });
            }
            MutationType::Min => {
                let envelope = mutation_envelope(mutation)?;
                txn.mutate(EngineMutation::Min {
                    key: encode_key(&key)?,
                    value: counter_from_envelope(&envelope)?,
                });
            }
            MutationType::SetSuffixVersionstampedKey => {
                let envelope = mutation_envelope(mutation)?;
                txn.mutate(EngineMutation::SetSuffixVersionstamped {
                    key_prefix: encode_key(&key)?,
                    value: engine_value_from_envelope(&envelope)?,
                    expire_in_ms: expire_in_ms(mutation.expire_at_ms, now_ms),
                });
            }
            MutationType::Unspecified => {
                return Err(RelayError::BadRequest("unrecognized mutation type".to_string()));
            }
        }
    }

    for enqueue in &request.enqueues {
        let keys_if_undelivered = enqueue
            .keys_if_undelivered
            .iter()
            .map(|key_bytes| {
                let key = decode_key(key_bytes)?;
                encode_key(&key)
            })
            .collect::<Result<Vec<_>, _>>()?;
        txn.enqueue(EngineEnqueue {
            payload: enqueue.payload.clone(),
            delay_ms: if enqueue.deadline_ms > now_ms {
                Some(enqueue.deadline_ms - now_ms)
            } else {
                None
            },
            keys_if_undelivered,
            backoff_schedule: enqueue.backoff_schedule.clone(),
        });
    }

    let outcome = txn.commit().await?;
    let output = match outcome {
        CommitOutcome::Success { versionstamp } => AtomicWriteOutput {
            status: AtomicWriteStatus::Success,
            versionstamp: hex::decode(&versionstamp)
                .map_err(|err| RelayError::Engine(kvrelay_engine::EngineError::Io(err.to_string())))?,
            failed_checks: Vec::new(),
        },
        CommitOutcome::CheckFailure => AtomicWriteOutput {
            status: AtomicWriteStatus::CheckFailure,
            versionstamp: Vec::new(),
            failed_checks: Vec::new(),
        },
    };

    Ok(proto_response(output.encode()))
}
