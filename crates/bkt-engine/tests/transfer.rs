mod common;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bkt_engine::{
    Buckets, CancellationToken, Chunking, EngineConfig, EngineError, PullStatus, TransferOptions,
};
use common::{data, engine, init_tracing};
use proptest::prelude::*;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;

/// Yields `data` in full, then fails.
struct FailAfter {
    data: Vec<u8>,
    pos: usize,
}

impl AsyncRead for FailAfter {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.pos >= self.data.len() {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer reset")));
        }
        let n = buf.remaining().min(self.data.len() - self.pos);
        let start = self.pos;
        buf.put_slice(&self.data[start..start + n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}

/// Sink that rejects every write.
struct BrokenSink;

impl AsyncWrite for BrokenSink {
    fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::StorageFull, "disk full")))
    }

    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn round_trip_across_many_chunks() {
    let buckets = engine();
    let bytes = data(5_000, 4);
    let pushed = buckets.push_bytes("b/big.bin", &bytes).await.unwrap();
    assert_eq!(pushed.size, 5_000);
    assert_eq!(&buckets.pull_bytes("b/big.bin").await.unwrap()[..], &bytes[..]);
}

#[tokio::test]
async fn round_trip_with_content_defined_chunking() {
    init_tracing();
    let config = EngineConfig {
        chunking: Chunking::Zpaq { bits: 10 },
        ..EngineConfig::default()
    };
    let buckets = Buckets::in_memory(config).unwrap();
    let bytes = data(64 * 1024, 11);
    buckets.push_bytes("b/cdc.bin", &bytes).await.unwrap();
    assert_eq!(&buckets.pull_bytes("b/cdc.bin").await.unwrap()[..], &bytes[..]);
}

#[tokio::test]
async fn empty_file_round_trips() {
    let buckets = engine();
    let pushed = buckets.push_bytes("b/empty", b"").await.unwrap();
    assert_eq!(pushed.size, 0);
    assert!(buckets.pull_bytes("b/empty").await.unwrap().is_empty());
    assert!(!buckets.list_path("b/empty").await.unwrap().item.is_dir);
}

#[tokio::test]
async fn push_progress_is_cumulative_per_chunk() {
    let buckets = engine();
    let (tx, mut rx) = mpsc::channel(4);
    let collector = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(n) = rx.recv().await {
            seen.push(n);
        }
        seen
    });

    let options = TransferOptions::new().with_progress(tx);
    let mut reader = &data(50, 0)[..];
    buckets.push_path("b/f", &mut reader, &options).await.unwrap();
    drop(options);

    // 16-byte chunks.
    assert_eq!(collector.await.unwrap(), vec![16, 32, 48, 50]);
}

#[tokio::test]
async fn pull_progress_is_cumulative_per_chunk() {
    let buckets = engine();
    buckets.push_bytes("b/f", &data(40, 0)).await.unwrap();

    let (tx, mut rx) = mpsc::channel(8);
    let options = TransferOptions::new().with_progress(tx);
    let mut out = Vec::new();
    let status = buckets.pull_path("b/f", &mut out, &options).await.unwrap();
    drop(options);

    assert_eq!(status, PullStatus::Completed { bytes: 40 });
    let mut seen = Vec::new();
    while let Some(n) = rx.recv().await {
        seen.push(n);
    }
    assert_eq!(seen, vec![16, 32, 40]);
}

#[tokio::test]
async fn slow_progress_consumer_holds_back_push() {
    let buckets = engine();
    let (tx, mut rx) = mpsc::channel(1);
    let options = TransferOptions::new().with_progress(tx);

    let push = {
        let buckets = buckets.clone();
        tokio::spawn(async move {
            let bytes = data(64, 0);
            let mut reader = &bytes[..];
            buckets.push_path("b/f", &mut reader, &options).await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!push.is_finished());
    assert!(matches!(
        buckets.list_path("b").await,
        Err(EngineError::NoSuchBucket(_))
    ));

    let mut seen = Vec::new();
    while let Some(n) = rx.recv().await {
        seen.push(n);
    }
    assert_eq!(seen, vec![16, 32, 48, 64]);
    push.await.unwrap().unwrap();
    assert_eq!(buckets.list_path("b").await.unwrap().item.names(), vec!["f"]);
}

#[tokio::test]
async fn dropped_progress_receiver_does_not_fail_transfer() {
    let buckets = engine();
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let options = TransferOptions::new().with_progress(tx);
    let mut reader = &data(100, 0)[..];
    buckets.push_path("b/f", &mut reader, &options).await.unwrap();
}

#[tokio::test]
async fn pull_cancelled_mid_stream() {
    let buckets = engine();
    let bytes = data(16 * 10, 5);
    buckets.push_bytes("b/f", &bytes).await.unwrap();

    let token = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(1);
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            rx.recv().await;
            token.cancel();
            // Keep the channel open without draining it.
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(rx);
        })
    };

    let options = TransferOptions::new().with_progress(tx).with_cancel(token);
    let mut out = Vec::new();
    let status = buckets.pull_path("b/f", &mut out, &options).await.unwrap();
    canceller.abort();

    assert!(matches!(status, PullStatus::Cancelled { .. }));
    assert!(status.bytes() > 0);
    assert!(status.bytes() < bytes.len() as u64);
    assert_eq!(out.len() as u64, status.bytes());
    assert_eq!(&out[..], &bytes[..out.len()]);
}

#[tokio::test]
async fn cancelled_push_publishes_nothing() {
    let buckets = engine();
    buckets.push_bytes("b/existing", b"e").await.unwrap();

    let token = CancellationToken::new();
    let (tx, mut rx) = mpsc::channel(1);
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            rx.recv().await;
            token.cancel();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(rx);
        })
    };

    let options = TransferOptions::new().with_progress(tx).with_cancel(token);
    let mut reader = &data(200, 0)[..];
    let err = buckets.push_path("b/new", &mut reader, &options).await.unwrap_err();
    canceller.abort();

    assert!(matches!(err, EngineError::Cancelled));
    let listed = buckets.list_path("b").await.unwrap();
    assert_eq!(listed.item.names(), vec!["existing"]);
    assert_eq!(listed.root.unwrap().version, 1);
}

#[tokio::test]
async fn push_cancelled_before_start() {
    let buckets = engine();
    let token = CancellationToken::new();
    token.cancel();
    let options = TransferOptions::new().with_cancel(token);
    let mut reader = &b"abc"[..];
    let err = buckets.push_path("b/f", &mut reader, &options).await.unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
    assert!(matches!(
        buckets.list_path("b").await,
        Err(EngineError::NoSuchBucket(_))
    ));
}

#[tokio::test]
async fn source_read_error_aborts_without_commit() {
    let buckets = engine();
    buckets.push_bytes("b/f", b"original").await.unwrap();

    let mut reader = FailAfter {
        data: data(40, 0),
        pos: 0,
    };
    let err = buckets
        .push_path("b/f", &mut reader, &TransferOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SourceRead(_)));
    assert_eq!(&buckets.pull_bytes("b/f").await.unwrap()[..], b"original");
    assert_eq!(buckets.list_path("b").await.unwrap().root.unwrap().version, 1);
}

#[tokio::test]
async fn sink_write_error_surfaces() {
    let buckets = engine();
    buckets.push_bytes("b/f", b"data").await.unwrap();
    let err = buckets
        .pull_path("b/f", &mut BrokenSink, &TransferOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SinkWrite(_)));
}

#[tokio::test]
async fn pull_sees_root_captured_at_start() {
    let buckets = engine();
    buckets.push_bytes("b/f", &data(64, 1)).await.unwrap();

    let (tx, mut rx) = mpsc::channel(1);
    let options = TransferOptions::new().with_progress(tx);
    let pull = {
        let buckets = buckets.clone();
        tokio::spawn(async move {
            let mut out = Vec::new();
            buckets.pull_path("b/f", &mut out, &options).await.map(|_| out)
        })
    };

    // Let the pull start, then replace and remove the file underneath it.
    assert_eq!(rx.recv().await, Some(16));
    buckets.push_bytes("b/f", b"replaced").await.unwrap();
    buckets.remove_path("b/f").await.unwrap();
    while rx.recv().await.is_some() {}

    assert_eq!(pull.await.unwrap().unwrap(), data(64, 1));
}

#[tokio::test]
async fn push_dir_publishes_local_tree() {
    let buckets = engine();
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("assets/img")).unwrap();
    std::fs::write(dir.path().join("index.html"), b"<html></html>").unwrap();
    std::fs::write(dir.path().join("assets/img/logo.png"), data(90, 2)).unwrap();

    let site = buckets
        .push_dir("site", dir.path(), &TransferOptions::new())
        .await
        .unwrap();
    assert_eq!(site.version, 1);
    assert_eq!(site.size, 13 + 90);
    assert_eq!(
        buckets.list_path("site").await.unwrap().item.names(),
        vec!["assets", "index.html"]
    );
    assert_eq!(&buckets.pull_bytes("site/assets/img/logo.png").await.unwrap()[..], &data(90, 2)[..]);

    let nested = buckets
        .push_dir("b/mirror", dir.path(), &TransferOptions::new())
        .await
        .unwrap();
    assert_eq!(nested.file, site.root);
    assert_eq!(
        &buckets.pull_bytes("b/mirror/index.html").await.unwrap()[..],
        b"<html></html>"
    );
}

#[tokio::test]
async fn push_dir_replaces_existing_directory() {
    let buckets = engine();
    buckets.push_bytes("b/d/stale.txt", b"old").await.unwrap();
    buckets.push_bytes("b/keep", b"k").await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("fresh.txt"), b"new").unwrap();
    buckets
        .push_dir("b/d", dir.path(), &TransferOptions::new())
        .await
        .unwrap();

    assert_eq!(buckets.list_path("b/d").await.unwrap().item.names(), vec!["fresh.txt"]);
    assert_eq!(buckets.list_path("b").await.unwrap().item.names(), vec!["d", "keep"]);
}

#[tokio::test]
async fn push_empty_dir_as_bucket_is_rejected() {
    let buckets = engine();
    let dir = tempfile::tempdir().unwrap();
    let err = buckets
        .push_dir("b", dir.path(), &TransferOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidPath(_)));
}

#[tokio::test]
async fn push_dir_of_single_file_onto_bucket_is_rejected() {
    let buckets = engine();
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("f.txt");
    std::fs::write(&file, b"lonely").unwrap();

    let err = buckets
        .push_dir("b", &file, &TransferOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidPath(_)));
    assert!(buckets.store().is_empty());

    // Below the bucket a single file is fine.
    buckets
        .push_dir("b/f.txt", &file, &TransferOptions::new())
        .await
        .unwrap();
    assert_eq!(&buckets.pull_bytes("b/f.txt").await.unwrap()[..], b"lonely");
}

#[tokio::test]
async fn config_from_toml_drives_chunking() {
    init_tracing();
    let config = EngineConfig::from_toml_str(
        r#"
        max_links_per_node = 2

        [chunking]
        type = "fixed"
        size = 4
        "#,
    )
    .unwrap();
    let buckets = Buckets::in_memory(config).unwrap();
    let bytes = data(33, 8);
    buckets.push_bytes("b/f", &bytes).await.unwrap();
    assert_eq!(&buckets.pull_bytes("b/f").await.unwrap()[..], &bytes[..]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn pull_returns_exactly_what_was_pushed(bytes in prop::collection::vec(any::<u8>(), 0..600)) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let pulled = rt.block_on(async {
            let buckets = engine();
            buckets.push_bytes("b/p/f.bin", &bytes).await.unwrap();
            buckets.pull_bytes("b/p/f.bin").await.unwrap()
        });
        prop_assert_eq!(&pulled[..], &bytes[..]);
    }
}
