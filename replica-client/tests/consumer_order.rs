use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use replica_client::scan::{scan_tree, seed_queue};
use replica_client::{
    run_consumer, ChangeEvent, ClientError, ConsumerStats, PendingOp, SyncQueue, TaskBuilder,
    TaskSink,
};
use replica_core::{Attributes, ProtocolError, RelativePath, SyncTask};
use tempfile::TempDir;

fn rel(s: &str) -> RelativePath {
    RelativePath::parse(s).expect("valid relative path")
}

/// Records tasks; optionally runs a hook after each one.
#[derive(Default)]
struct RecordingSink {
    tasks: Vec<SyncTask>,
    after_send: Option<Box<dyn FnMut(&SyncTask) + Send>>,
}

#[async_trait]
impl TaskSink for RecordingSink {
    async fn send(&mut self, task: SyncTask) -> Result<(), ClientError> {
        tokio::task::yield_now().await;
        if let Some(hook) = self.after_send.as_mut() {
            hook(&task);
        }
        self.tasks.push(task);
        Ok(())
    }
}

/// Fails every send, like a reset connection.
struct BrokenSink;

#[async_trait]
impl TaskSink for BrokenSink {
    async fn send(&mut self, _task: SyncTask) -> Result<(), ClientError> {
        Err(ClientError::Protocol(ProtocolError::Stream(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "peer gone",
        ))))
    }
}

/// Rejects one path as too large to frame; records everything else.
struct SizeLimitedSink {
    too_large: RelativePath,
    tasks: Vec<SyncTask>,
}

#[async_trait]
impl TaskSink for SizeLimitedSink {
    async fn send(&mut self, task: SyncTask) -> Result<(), ClientError> {
        if task.primary_path() == &self.too_large {
            return Err(ClientError::Protocol(ProtocolError::FrameTooLarge {
                len: 2 << 30,
                max: 1 << 30,
            }));
        }
        self.tasks.push(task);
        Ok(())
    }
}

#[tokio::test]
async fn initial_sync_of_small_tree_produces_dir_then_file() {
    let source = TempDir::new().expect("source");
    fs::write(source.path().join("a.txt"), "hi").expect("write a.txt");
    fs::create_dir(source.path().join("b")).expect("mkdir b");

    let (queue, rx) = SyncQueue::new();
    let scan = scan_tree(source.path()).expect("scan");
    assert_eq!(seed_queue(scan, &queue), 2);
    drop(queue);

    let builder = TaskBuilder::new(source.path());
    let mut sink = RecordingSink::default();
    let stats = run_consumer(rx, &builder, &mut sink).await.expect("consumer");

    assert_eq!(stats, ConsumerStats { sent: 2, dropped: 0 });
    assert_eq!(
        sink.tasks,
        vec![
            SyncTask::AddDir {
                relative_path: rel("b"),
                attributes: Attributes::DIRECTORY,
            },
            SyncTask::AddFile {
                relative_path: rel("a.txt"),
                attributes: Attributes::NORMAL,
                content: b"hi".to_vec(),
            },
        ]
    );
}

#[tokio::test]
async fn consumer_preserves_enqueue_order_from_concurrent_producer() {
    let (queue, rx) = SyncQueue::new();
    let producer_queue = queue.clone();
    drop(queue);

    let producer = tokio::spawn(async move {
        let mut expected = Vec::new();
        for i in 0..50 {
            let path = rel(&format!("f{i}"));
            producer_queue.enqueue(PendingOp::Live(ChangeEvent::Deleted(path.clone())));
            expected.push(SyncTask::Delete { relative_path: path });
            if i % 7 == 0 {
                tokio::task::yield_now().await;
            }
        }
        expected
    });

    let builder = TaskBuilder::new(PathBuf::from("/unused"));
    let mut sink = RecordingSink::default();
    let stats = run_consumer(rx, &builder, &mut sink).await.expect("consumer");

    let expected = producer.await.expect("producer");
    assert_eq!(stats.sent, 50);
    assert_eq!(sink.tasks, expected);
}

#[tokio::test]
async fn next_read_happens_only_after_previous_send_completes() {
    let source = TempDir::new().expect("source");
    fs::write(source.path().join("first.txt"), "one").expect("write");
    fs::write(source.path().join("second.txt"), "stale").expect("write");

    let (queue, rx) = SyncQueue::new();
    queue.enqueue(PendingOp::ScanFile(rel("first.txt")));
    queue.enqueue(PendingOp::ScanFile(rel("second.txt")));
    drop(queue);

    // The send of `first.txt` rewrites `second.txt`; the consumer must not
    // have read `second.txt` yet.
    let second = source.path().join("second.txt");
    let mut sink = RecordingSink {
        tasks: Vec::new(),
        after_send: Some(Box::new(move |task| {
            if task.primary_path().as_str() == "first.txt" {
                fs::write(&second, "fresh").expect("rewrite second");
            }
        })),
    };

    let builder = TaskBuilder::new(source.path());
    run_consumer(rx, &builder, &mut sink).await.expect("consumer");

    match &sink.tasks[1] {
        SyncTask::AddFile { content, .. } => assert_eq!(content, b"fresh"),
        other => panic!("unexpected task {other:?}"),
    }
}

#[tokio::test]
async fn vanished_entries_are_dropped_without_stopping_the_queue() {
    let source = TempDir::new().expect("source");
    fs::write(source.path().join("kept.txt"), "k").expect("write");

    let (queue, rx) = SyncQueue::new();
    queue.enqueue(PendingOp::ScanFile(rel("vanished.txt")));
    queue.enqueue(PendingOp::Live(ChangeEvent::Created(rel("kept.txt"))));
    drop(queue);

    let builder = TaskBuilder::new(source.path());
    let mut sink = RecordingSink::default();
    let stats = run_consumer(rx, &builder, &mut sink).await.expect("consumer");

    assert_eq!(stats, ConsumerStats { sent: 1, dropped: 1 });
    assert_eq!(sink.tasks[0].primary_path(), &rel("kept.txt"));
}

#[tokio::test]
async fn sink_failure_ends_the_session() {
    let (queue, rx) = SyncQueue::new();
    queue.enqueue(PendingOp::Live(ChangeEvent::Deleted(rel("x"))));
    queue.enqueue(PendingOp::Live(ChangeEvent::Deleted(rel("y"))));

    let builder = TaskBuilder::new(PathBuf::from("/unused"));
    let err = run_consumer(rx, &builder, &mut BrokenSink)
        .await
        .expect_err("broken sink");
    assert!(matches!(err, ClientError::Protocol(_)));
}

#[tokio::test]
async fn oversized_task_is_dropped_and_the_session_continues() {
    let source = TempDir::new().expect("source");
    fs::write(source.path().join("huge.bin"), "pretend this is enormous").expect("write");
    fs::write(source.path().join("small.txt"), "s").expect("write");

    let (queue, rx) = SyncQueue::new();
    queue.enqueue(PendingOp::ScanFile(rel("huge.bin")));
    queue.enqueue(PendingOp::ScanFile(rel("small.txt")));
    queue.enqueue(PendingOp::Live(ChangeEvent::Deleted(rel("gone.txt"))));
    drop(queue);

    let builder = TaskBuilder::new(source.path());
    let mut sink = SizeLimitedSink {
        too_large: rel("huge.bin"),
        tasks: Vec::new(),
    };
    let stats = run_consumer(rx, &builder, &mut sink).await.expect("session survives");

    assert_eq!(stats, ConsumerStats { sent: 2, dropped: 1 });
    let paths: Vec<&str> = sink.tasks.iter().map(|t| t.primary_path().as_str()).collect();
    assert_eq!(paths, ["small.txt", "gone.txt"]);
}
