//! Newline-delimited JSON snapshot load/dump for `MemoryEngine` — an additive
//! convenience so `kvrelayd` can run standalone across restarts. Not part of
//! the wire-translation core: nothing here is reachable from an HTTP endpoint.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use kvrelay_engine::{EngineEntry, EngineValue, MemoryEngine};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct SnapshotLine {
    /// Hex-encoded tuple-key bytes.
    key: String,
    /// Hex-encoded value bytes.
    value: String,
    /// `ValueEncoding` discriminant: 1=V8, 2=LE64, 3=BYTES.
    encoding: u32,
}

fn engine_value_to_line(key: &[u8], value: &EngineValue) -> SnapshotLine {
    let (value_hex, encoding) = match value {
        EngineValue::Bytes(bytes) => (hex::encode(bytes), 3),
        EngineValue::Counter(counter) => (hex::encode(counter.to_le_bytes()), 2),
        EngineValue::Structured(blob) => (hex::encode(blob), 1),
    };
    SnapshotLine { key: hex::encode(key), value: value_hex, encoding }
}

fn line_to_engine_value(line: &SnapshotLine) -> Result<(Vec<u8>, EngineValue)> {
    let key = hex::decode(&line.key).context("snapshot line has invalid hex key")?;
    let data = hex::decode(&line.value).context("snapshot line has invalid hex value")?;
    let value = match line.encoding {
        3 => EngineValue::Bytes(data),
        2 => {
            let bytes: [u8; 8] = data
                .try_into()
                .map_err(|_| anyhow::anyhow!("LE64 snapshot value must be 8 bytes"))?;
            EngineValue::Counter(u64::from_le_bytes(bytes))
        }
        1 => EngineValue::Structured(data),
        other => return Err(anyhow::anyhow!("unknown snapshot value encoding {other}")),
    };
    Ok((key, value))
}

/// Loads a newline-delimited JSON snapshot into `engine`, returning the
/// number of entries seeded.
pub fn load(engine: &MemoryEngine, path: &Path) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut count = 0;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: SnapshotLine = serde_json::from_str(&line).context("parsing snapshot line")?;
        let (key, value) = line_to_engine_value(&parsed)?;
        engine.seed(key, value);
        count += 1;
    }
    Ok(count)
}

/// Writes `entries` to `path` as newline-delimited JSON.
pub fn write(path: &Path, entries: &[EngineEntry]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for entry in entries {
        let line = engine_value_to_line(&entry.key, &entry.value);
        serde_json::to_writer(&mut writer, &line)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn roundtrip_through_a_temp_file() {
        let engine = MemoryEngine::new();
        engine.seed(b"a".to_vec(), EngineValue::Bytes(b"hi".to_vec()));
        engine.seed(b"b".to_vec(), EngineValue::Counter(42));

        let dir = std::env::temp_dir();
        let path = dir.join(format!("kvrelay-snapshot-test-{}.ndjson", std::process::id()));

        write(&path, &engine.snapshot_entries()).unwrap();

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents.lines().count(), 2);

        let fresh = MemoryEngine::new();
        let loaded = load(&fresh, &path).unwrap();
        assert_eq!(loaded, 2);

        std::fs::remove_file(&path).ok();
    }
}
