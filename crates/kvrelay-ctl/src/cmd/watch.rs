//! `kvrelay-ctl watch <hex-tuple-key>...` — opens the streaming watch
//! endpoint and prints each `WatchOutput` frame as it arrives. Runs until the
//! connection closes or the process is interrupted.

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use futures::StreamExt;
use kvrelay_proto::messages::{Watch, WatchKey, WatchOutput};

use crate::cmd::http;

pub async fn run(base: &str, access_token: &str, hex_keys: &[String]) -> Result<()> {
    if hex_keys.is_empty() {
        bail!("watch requires at least one <hex-tuple-key>");
    }
    let keys = hex_keys
        .iter()
        .map(|hex_key| hex::decode(hex_key).map(|key| WatchKey { key }))
        .collect::<Result<Vec<_>, _>>()
        .context("<hex-tuple-key> must be valid hex")?;

    let bootstrap = http::bootstrap(base, access_token).await?;
    let request = Watch { keys };

    let response = reqwest::Client::new()
        .post(format!("{base}/kv/watch"))
        .bearer_auth(&bootstrap.token)
        .body(request.encode())
        .send()
        .await
        .with_context(|| format!("failed to connect to kvrelayd at {base} — is it running?"))?
        .error_for_status()
        .context("watch request rejected")?;

    let mut buffer = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk.context("reading watch stream")?);
        while let Some(frame) = take_frame(&mut buffer) {
            let output = WatchOutput::decode(&frame).context("decoding watch frame")?;
            print_watch_output(&output);
        }
    }
    println!("(stream closed)");
    Ok(())
}

/// Pulls one length-prefixed frame off the front of `buffer`, if a complete
/// one has arrived.
fn take_frame(buffer: &mut Vec<u8>) -> Option<Bytes> {
    if buffer.len() < 4 {
        return None;
    }
    let len = u32::from_le_bytes(buffer[0..4].try_into().expect("checked above")) as usize;
    if buffer.len() < 4 + len {
        return None;
    }
    let frame = Bytes::copy_from_slice(&buffer[4..4 + len]);
    buffer.drain(0..4 + len);
    Some(frame)
}

fn print_watch_output(output: &WatchOutput) {
    for key in &output.keys {
        match &key.entry_if_changed {
            Some(entry) if key.changed => println!(
                "changed: {}  versionstamp={}  value={}",
                hex::encode(&entry.key),
                hex::encode(&entry.versionstamp),
                hex::encode(&entry.value),
            ),
            _ if key.changed => println!("changed: (deleted)"),
            _ => println!("unchanged"),
        }
    }
}
