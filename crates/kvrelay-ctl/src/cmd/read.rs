//! `kvrelay-ctl read <hex-tuple-key>` — reads every stored entry whose key
//! has the given tuple key as a prefix, by issuing a one-range
//! `SnapshotRead` bounded below by the key itself and above by its
//! range-extended `After` marker.

use anyhow::{Context, Result};
use kvrelay_proto::messages::{ReadRange, SnapshotRead, SnapshotReadOutput};

use crate::cmd::http;

pub async fn run(base: &str, access_token: &str, hex_key: &str) -> Result<()> {
    let key = hex::decode(hex_key).context("<hex-tuple-key> must be valid hex")?;
    let bootstrap = http::bootstrap(base, access_token).await?;

    let mut end = key.clone();
    end.push(0x00);
    let request = SnapshotRead {
        ranges: vec![ReadRange { start: key, end, limit: 0, reverse: false }],
    };

    let response = http::post_wire(base, "/kv/snapshot_read", &bootstrap.token, request.encode()).await?;
    let output = SnapshotReadOutput::decode(&response).context("decoding snapshot_read response")?;

    let range = output.ranges.first().context("response had no ranges")?;
    if range.values.is_empty() {
        println!("(no entries)");
    }
    for entry in &range.values {
        println!(
            "{}  encoding={}  versionstamp={}  value={}",
            hex::encode(&entry.key),
            entry.encoding,
            hex::encode(&entry.versionstamp),
            hex::encode(&entry.value),
        );
    }
    Ok(())
}
