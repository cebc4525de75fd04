//! Round-trip tests for the wire protocol.
//!
//! Each `#[case]` is isolated; nothing is shared between cases.

use replica_core::protocol::encode_frame;
use replica_core::{
    decode_task, encode_task, read_frame, write_frame, Attributes, RelativePath, SyncTask,
    MAX_FRAME_LEN,
};
use rstest::rstest;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn rel(s: &str) -> RelativePath {
    RelativePath::parse(s).expect("valid relative path")
}

fn binary_file() -> SyncTask {
    SyncTask::AddFile {
        relative_path: rel("bin/blob.dat"),
        attributes: Attributes::NORMAL | Attributes::READ_ONLY,
        content: (0..=255u8).cycle().take(4096).collect(),
    }
}

// ---------------------------------------------------------------------------
// decode(encode(task)) == task
// ---------------------------------------------------------------------------

#[rstest]
#[case::add_file(binary_file())]
#[case::empty_file(SyncTask::AddFile {
    relative_path: rel(".hidden"),
    attributes: Attributes::NORMAL | Attributes::HIDDEN,
    content: Vec::new(),
})]
#[case::add_dir(SyncTask::AddDir {
    relative_path: rel("b/c"),
    attributes: Attributes::DIRECTORY,
})]
#[case::rename(SyncTask::Rename {
    from_relative_path: rel("old.txt"),
    to_relative_path: rel("dir/new.txt"),
})]
#[case::delete(SyncTask::Delete { relative_path: rel("ünïcødé/файл.txt") })]
fn payload_roundtrip(#[case] task: SyncTask) {
    let payload = encode_task(&task).expect("encode");
    let decoded = decode_task(&payload).expect("decode");
    assert_eq!(decoded, task);
}

#[tokio::test]
async fn frames_roundtrip_through_a_stream_in_order() {
    let tasks = vec![
        SyncTask::AddDir {
            relative_path: rel("b"),
            attributes: Attributes::DIRECTORY,
        },
        binary_file(),
        SyncTask::Delete {
            relative_path: rel("b"),
        },
    ];

    let mut wire = Vec::new();
    for task in &tasks {
        write_frame(&mut wire, task).await.expect("write frame");
    }

    let mut reader = wire.as_slice();
    let mut decoded = Vec::new();
    while let Some(payload) = read_frame(&mut reader, MAX_FRAME_LEN).await.expect("read frame") {
        decoded.push(decode_task(&payload).expect("decode"));
    }
    assert_eq!(decoded, tasks);
}

#[test]
fn frame_length_counts_payload_bytes() {
    let task = binary_file();
    let payload = encode_task(&task).expect("encode");
    let frame = encode_frame(&payload).expect("frame");
    let announced = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    assert_eq!(announced, payload.len());
    assert_eq!(frame.len(), payload.len() + 4);
}
