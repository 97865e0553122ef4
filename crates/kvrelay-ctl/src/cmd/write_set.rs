//! `kvrelay-ctl write-set <hex-tuple-key> <hex-bytes>` — issues a one-mutation
//! `AtomicWrite` that sets the given key to the given byte value, with no
//! checks and no expiry.

use anyhow::{Context, Result};
use kvrelay_proto::messages::{AtomicWrite, AtomicWriteOutput, AtomicWriteStatus, KvValue, Mutation, MutationType};

use crate::cmd::http;

pub async fn run(base: &str, access_token: &str, hex_key: &str, hex_value: &str) -> Result<()> {
    let key = hex::decode(hex_key).context("<hex-tuple-key> must be valid hex")?;
    let value = hex::decode(hex_value).context("<hex-bytes> must be valid hex")?;
    let bootstrap = http::bootstrap(base, access_token).await?;

    let request = AtomicWrite {
        checks: Vec::new(),
        mutations: vec![Mutation {
            key,
            value: Some(KvValue { data: value, encoding: 3 }),
            mutation_type: MutationType::Set,
            expire_at_ms: 0,
        }],
        enqueues: Vec::new(),
    };

    let response = http::post_wire(base, "/kv/atomic_write", &bootstrap.token, request.encode()).await?;
    let output = AtomicWriteOutput::decode(&response).context("decoding atomic_write response")?;

    match output.status {
        AtomicWriteStatus::Success => {
            println!("ok, versionstamp={}", hex::encode(&output.versionstamp));
        }
        other => {
            println!("rejected: {other:?}");
        }
    }
    Ok(())
}
