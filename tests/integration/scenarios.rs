//! The six concrete end-to-end scenarios: empty read, set-then-read,
//! check-failure, counter accumulation, unsupported selector, watch-on-change.

use kvrelay_core::tuple::{encode_key, Key, KeyPart};
use kvrelay_proto::messages::{
    AtomicWrite, AtomicWriteOutput, AtomicWriteStatus, Check, KvValue, Mutation, MutationType,
    ReadRange, SnapshotRead, SnapshotReadOutput, SnapshotReadStatus, Watch, WatchKey, WatchOutput,
};

use crate::Harness;

fn after(mut bytes: Vec<u8>) -> Vec<u8> {
    bytes.push(0x00);
    bytes
}

fn before(mut bytes: Vec<u8>) -> Vec<u8> {
    bytes.push(0xFF);
    bytes
}

#[tokio::test]
async fn empty_snapshot_read() {
    let harness = Harness::spawn().await;
    let token = harness.bootstrap().await;

    let request = SnapshotRead {
        ranges: vec![ReadRange {
            start: vec![0x01, 0x00],
            end: vec![0x01, 0x00, 0xFF],
            limit: 0,
            reverse: false,
        }],
    };
    let response = harness.post_wire("/snapshot_read", &token, request.encode()).await;
    assert_eq!(response.status(), 200);

    let body = response.bytes().await.unwrap();
    let output = SnapshotReadOutput::decode(&body).unwrap();
    assert_eq!(output.ranges.len(), 1);
    assert!(output.ranges[0].values.is_empty());
    assert!(output.read_is_strongly_consistent);
    assert_eq!(output.status, SnapshotReadStatus::Success);

    harness.shutdown().await;
}

#[tokio::test]
async fn set_then_read() {
    let harness = Harness::spawn().await;
    let token = harness.bootstrap().await;

    let key = encode_key(&Key::new(vec![KeyPart::String("a".into()), KeyPart::Int(1.into())])).unwrap();

    let write = AtomicWrite {
        checks: Vec::new(),
        mutations: vec![Mutation {
            key: key.clone(),
            value: Some(KvValue { data: b"hi".to_vec(), encoding: 3 }),
            mutation_type: MutationType::Set,
            expire_at_ms: 0,
        }],
        enqueues: Vec::new(),
    };
    let response = harness.post_wire("/kv/atomic_write", &token, write.encode()).await;
    assert_eq!(response.status(), 200);
    let output = AtomicWriteOutput::decode(&response.bytes().await.unwrap()).unwrap();
    assert_eq!(output.status, AtomicWriteStatus::Success);
    assert_eq!(output.versionstamp.len(), 10);

    let a_prefix = encode_key(&Key::new(vec![KeyPart::String("a".into())])).unwrap();
    let read = SnapshotRead {
        ranges: vec![ReadRange {
            start: after(a_prefix.clone()),
            end: before(a_prefix),
            limit: 0,
            reverse: false,
        }],
    };
    let response = harness.post_wire("/kv/snapshot_read", &token, read.encode()).await;
    let output = SnapshotReadOutput::decode(&response.bytes().await.unwrap()).unwrap();
    assert_eq!(output.ranges.len(), 1);
    assert_eq!(output.ranges[0].values.len(), 1);

    let entry = &output.ranges[0].values[0];
    assert_eq!(entry.key, key);
    assert_eq!(entry.value, b"hi");
    assert_eq!(entry.encoding, 3);
    assert_eq!(entry.versionstamp.len(), 10);

    harness.shutdown().await;
}

#[tokio::test]
async fn check_failure_path() {
    let harness = Harness::spawn().await;
    let token = harness.bootstrap().await;

    let key = encode_key(&Key::new(vec![KeyPart::String("k".into())])).unwrap();

    let first = AtomicWrite {
        checks: Vec::new(),
        mutations: vec![Mutation {
            key: key.clone(),
            value: Some(KvValue { data: b"1".to_vec(), encoding: 3 }),
            mutation_type: MutationType::Set,
            expire_at_ms: 0,
        }],
        enqueues: Vec::new(),
    };
    let response = harness.post_wire("/kv/atomic_write", &token, first.encode()).await;
    let output = AtomicWriteOutput::decode(&response.bytes().await.unwrap()).unwrap();
    assert_eq!(output.status, AtomicWriteStatus::Success);

    let second = AtomicWrite {
        checks: vec![Check { key: key.clone(), versionstamp: vec![0u8; 10] }],
        mutations: vec![Mutation {
            key,
            value: Some(KvValue { data: b"2".to_vec(), encoding: 3 }),
            mutation_type: MutationType::Set,
            expire_at_ms: 0,
        }],
        enqueues: Vec::new(),
    };
    let response = harness.post_wire("/kv/atomic_write", &token, second.encode()).await;
    assert_eq!(response.status(), 200);
    let output = AtomicWriteOutput::decode(&response.bytes().await.unwrap()).unwrap();
    assert_eq!(output.status, AtomicWriteStatus::CheckFailure);
    assert!(output.versionstamp.is_empty());

    harness.shutdown().await;
}

#[tokio::test]
async fn counter_sum_accumulates() {
    let harness = Harness::spawn().await;
    let token = harness.bootstrap().await;

    let key = encode_key(&Key::new(vec![KeyPart::String("c".into())])).unwrap();
    let sum_five = AtomicWrite {
        checks: Vec::new(),
        mutations: vec![Mutation {
            key: key.clone(),
            value: Some(KvValue { data: 5u64.to_le_bytes().to_vec(), encoding: 2 }),
            mutation_type: MutationType::Sum,
            expire_at_ms: 0,
        }],
        enqueues: Vec::new(),
    };

    harness.post_wire("/kv/atomic_write", &token, sum_five.encode()).await;
    harness.post_wire("/kv/atomic_write", &token, sum_five.encode()).await;

    let exact = SnapshotRead {
        ranges: vec![ReadRange { start: key.clone(), end: after(key), limit: 0, reverse: false }],
    };
    let response = harness.post_wire("/kv/snapshot_read", &token, exact.encode()).await;
    let output = SnapshotReadOutput::decode(&response.bytes().await.unwrap()).unwrap();
    let entry = &output.ranges[0].values[0];
    assert_eq!(entry.encoding, 2);
    let counter = u64::from_le_bytes(entry.value.clone().try_into().unwrap());
    assert_eq!(counter, 10);

    harness.shutdown().await;
}

#[tokio::test]
async fn unsupported_selector_is_bad_request() {
    let harness = Harness::spawn().await;
    let token = harness.bootstrap().await;

    let request = SnapshotRead {
        ranges: vec![ReadRange {
            start: vec![0x01, 0x00, 0xFF],
            end: vec![0x01, 0x00, 0xFF],
            limit: 0,
            reverse: false,
        }],
    };
    let response = harness.post_wire("/snapshot_read", &token, request.encode()).await;
    assert_eq!(response.status(), 400);

    harness.shutdown().await;
}

#[tokio::test]
async fn watch_on_change() {
    let harness = Harness::spawn().await;
    let token = harness.bootstrap().await;

    let key = encode_key(&Key::new(vec![KeyPart::String("w".into())])).unwrap();
    let watch_request = Watch { keys: vec![WatchKey { key: key.clone() }] };

    let mut stream_response = reqwest::Client::new()
        .post(format!("{}/kv/watch", harness.base))
        .bearer_auth(&token)
        .body(watch_request.encode())
        .send()
        .await
        .unwrap();
    assert_eq!(stream_response.status(), 200);

    let write = AtomicWrite {
        checks: Vec::new(),
        mutations: vec![Mutation {
            key: key.clone(),
            value: Some(KvValue { data: b"x".to_vec(), encoding: 3 }),
            mutation_type: MutationType::Set,
            expire_at_ms: 0,
        }],
        enqueues: Vec::new(),
    };
    harness.post_wire("/kv/atomic_write", &token, write.encode()).await;

    let mut buffer = Vec::new();
    let output = loop {
        let chunk = stream_response.chunk().await.unwrap().expect("stream ended before a frame arrived");
        buffer.extend_from_slice(&chunk);
        if buffer.len() < 4 {
            continue;
        }
        let len = u32::from_le_bytes(buffer[0..4].try_into().unwrap()) as usize;
        if buffer.len() < 4 + len {
            continue;
        }
        break WatchOutput::decode(&buffer[4..4 + len]).unwrap();
    };

    assert_eq!(output.keys.len(), 1);
    assert!(output.keys[0].changed);
    let entry = output.keys[0].entry_if_changed.as_ref().expect("entry should be present after a set");
    assert_eq!(entry.key, key);
    assert_eq!(entry.value, b"x");

    harness.shutdown().await;
}
