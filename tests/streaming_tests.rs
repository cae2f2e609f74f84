//! Integration tests for the streaming upload pipeline.
//!
//! The coordinator is driven with in-memory uploaders and compressors so
//! every multipart call, and the order it happened in, can be checked.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use bytes::Bytes;
use flate2::read::GzDecoder;
use proptest::prelude::*;
use tempfile::TempDir;

use s3_share::cloud::uploader::{CompletedPartInfo, Uploader};
use s3_share::compress::{Archiver, Compressor};
use s3_share::errors::{Result, ShareError};
use s3_share::progress::{ByteCounter, LogProgressReporter, NoopProgressReporter, ProgressReporter};
use s3_share::streaming::{ChunkWriter, Coordinator, HandoffQueue, QueueItem};

const BUCKET: &str = "test-bucket";
const KEY: &str = "test-key";
const UPLOAD_ID: &str = "test-upload-id";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Start { bucket: String, key: String },
    Part(i64),
    Complete(Vec<i64>),
    Abort { bucket: String, key: String, upload_id: String },
}

/// Uploader that keeps every call and every part body in memory.
#[derive(Default)]
struct RecordingUploader {
    calls: Mutex<Vec<Call>>,
    bodies: Mutex<Vec<Bytes>>,
    fail_on_part: Option<i64>,
}

impl RecordingUploader {
    fn failing_on_part(part_number: i64) -> Self {
        Self {
            fail_on_part: Some(part_number),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, matcher: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matcher(call)).count()
    }

    fn aborts(&self) -> usize {
        self.count(|call| matches!(call, Call::Abort { .. }))
    }

    fn completes(&self) -> usize {
        self.count(|call| matches!(call, Call::Complete(_)))
    }

    fn uploaded(&self) -> Vec<u8> {
        self.bodies
            .lock()
            .unwrap()
            .iter()
            .flat_map(|body| body.iter().copied())
            .collect()
    }

    fn part_lengths(&self) -> Vec<usize> {
        self.bodies.lock().unwrap().iter().map(Bytes::len).collect()
    }
}

impl Uploader for RecordingUploader {
    fn start_multipart_upload(&self, bucket: &str, key: &str) -> Result<String> {
        self.calls.lock().unwrap().push(Call::Start {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        Ok(UPLOAD_ID.to_string())
    }

    fn upload_part(
        &self,
        chunk: Bytes,
        bucket: &str,
        key: &str,
        part_number: i64,
        _upload_id: &str,
    ) -> Result<CompletedPartInfo> {
        if self.fail_on_part == Some(part_number) {
            return Err(ShareError::UploadPart {
                part_number,
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: "connection reset by peer".into(),
            });
        }
        self.calls.lock().unwrap().push(Call::Part(part_number));
        self.bodies.lock().unwrap().push(chunk);
        Ok(CompletedPartInfo {
            part_number,
            e_tag: format!("etag-{}", part_number),
        })
    }

    fn complete_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        _upload_id: &str,
        parts: &[CompletedPartInfo],
    ) -> Result<()> {
        let numbers = parts.iter().map(|p| p.part_number).collect();
        self.calls.lock().unwrap().push(Call::Complete(numbers));
        Ok(())
    }

    fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Abort {
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: upload_id.to_string(),
        });
        Ok(())
    }
}

/// What a scripted compressor does with its sink.
enum Script {
    /// Write each block, then close.
    Write(Vec<Vec<u8>>),
    /// Write each block, then fail with an input error.
    FailAfter(Vec<Vec<u8>>),
    /// Write each block and return without closing.
    Truncate(Vec<Vec<u8>>),
    /// Write each block, then panic.
    Panic(Vec<Vec<u8>>),
}

struct ScriptedCompressor {
    script: Script,
}

impl ScriptedCompressor {
    fn new(script: Script) -> Self {
        Self { script }
    }

    fn write_all(input: &Path, sink: &ChunkWriter, blocks: &[Vec<u8>]) -> Result<()> {
        for block in blocks {
            sink.write(block).map_err(|source| ShareError::CompressorOutput {
                path: input.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }
}

impl Compressor for ScriptedCompressor {
    fn compress(
        &self,
        input: &Path,
        sink: &ChunkWriter,
        _chunk_size: usize,
        progress: &dyn ProgressReporter,
    ) -> Result<()> {
        progress.start_compression(0);
        let result: Result<()> = match &self.script {
            Script::Write(blocks) => Self::write_all(input, sink, blocks).and_then(|_| {
                sink.close().map_err(|source| ShareError::CompressorOutput {
                    path: input.to_path_buf(),
                    source,
                })
            }),
            Script::FailAfter(blocks) => Self::write_all(input, sink, blocks).and_then(|()| {
                Err(ShareError::CompressorInput {
                    path: input.to_path_buf(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "disk read failed"),
                })
            }),
            Script::Truncate(blocks) => Self::write_all(input, sink, blocks),
            Script::Panic(blocks) => {
                Self::write_all(input, sink, blocks)?;
                panic!("compressor blew up");
            }
        };
        progress.finish_compression();
        result
    }

    fn key_suffix(&self) -> &'static str {
        ".bin"
    }

    fn total_size(&self, _input: &Path) -> Result<u64> {
        Ok(0)
    }
}

/// Reporter that counts phase notifications.
#[derive(Default)]
struct CountingProgress {
    upload_starts: AtomicUsize,
    upload_finishes: AtomicUsize,
    upload_total: ByteCounter,
    uploaded: ByteCounter,
}

impl ProgressReporter for CountingProgress {
    fn start_compression(&self, _total_bytes: u64) {}
    fn update_compression(&self, _delta: u64) {}
    fn finish_compression(&self) {}

    fn start_upload(&self, total_bytes: u64, initial_bytes: u64) {
        self.upload_starts.fetch_add(1, Ordering::SeqCst);
        self.upload_total.set(total_bytes);
        self.uploaded.set(initial_bytes);
    }

    fn update_upload(&self, delta: u64) {
        self.uploaded.add(delta);
    }

    fn finish_upload(&self) {
        self.upload_finishes.fetch_add(1, Ordering::SeqCst);
    }
}

fn blocks(parts: &[&str]) -> Vec<Vec<u8>> {
    parts.iter().map(|p| p.as_bytes().to_vec()).collect()
}

fn scripted(script: Script, uploader: Arc<RecordingUploader>) -> Coordinator {
    Coordinator::new(
        Arc::new(ScriptedCompressor::new(script)),
        uploader,
        Arc::new(NoopProgressReporter),
    )
    .with_chunk_size(4)
}

/// Test a clean run starts once, completes once with every part in order and never aborts
#[test]
fn test_successful_upload_completes_in_order() {
    let uploader = Arc::new(RecordingUploader::default());
    let coordinator = scripted(Script::Write(blocks(&["abcdef", "ghij", "k"])), uploader.clone());

    let key = coordinator
        .archive_and_upload(Path::new("input.txt"), BUCKET, Some(KEY))
        .unwrap();

    assert_eq!(key, KEY);
    assert_eq!(
        uploader.calls(),
        vec![
            Call::Start { bucket: BUCKET.to_string(), key: KEY.to_string() },
            Call::Part(1),
            Call::Part(2),
            Call::Part(3),
            Call::Complete(vec![1, 2, 3]),
        ]
    );
    assert_eq!(uploader.uploaded(), b"abcdefghijk");
    assert_eq!(uploader.part_lengths(), vec![4, 4, 3]);
    assert_eq!(coordinator.uploaded_bytes(), 11);
}

/// Test a compressor failure aborts exactly once and surfaces the compressor's error
#[test]
fn test_compressor_failure_aborts_upload() {
    let uploader = Arc::new(RecordingUploader::default());
    let coordinator = scripted(Script::FailAfter(blocks(&["abcdefgh"])), uploader.clone());

    let err = coordinator
        .archive_and_upload(Path::new("input.txt"), BUCKET, Some(KEY))
        .unwrap_err();

    assert!(matches!(err, ShareError::CompressorInput { .. }), "unexpected error: {err}");
    assert_eq!(uploader.completes(), 0);
    assert_eq!(uploader.aborts(), 1);
    assert!(uploader.calls().contains(&Call::Abort {
        bucket: BUCKET.to_string(),
        key: KEY.to_string(),
        upload_id: UPLOAD_ID.to_string(),
    }));
}

/// Test an empty stream is aborted rather than completed
#[test]
fn test_empty_stream_reports_no_parts() {
    let uploader = Arc::new(RecordingUploader::default());
    let coordinator = scripted(Script::Write(Vec::new()), uploader.clone());

    let err = coordinator
        .archive_and_upload(Path::new("empty.txt"), BUCKET, Some(KEY))
        .unwrap_err();

    match err {
        ShareError::NoParts { bucket, key } => {
            assert_eq!(bucket, BUCKET);
            assert_eq!(key, KEY);
        }
        other => panic!("Expected NoParts, got {other}"),
    }
    assert_eq!(uploader.completes(), 0);
    assert_eq!(uploader.aborts(), 1);
}

/// Test a failed part upload aborts and unblocks a producer waiting on a full queue
#[test]
fn test_part_failure_aborts_and_releases_producer() {
    let uploader = Arc::new(RecordingUploader::failing_on_part(2));
    let many = vec![b"abcd".to_vec(); 64];
    let coordinator = scripted(Script::Write(many), uploader.clone()).with_queue_depth(Some(1));

    let err = coordinator
        .archive_and_upload(Path::new("input.txt"), BUCKET, Some(KEY))
        .unwrap_err();

    match err {
        ShareError::UploadPart { part_number, .. } => assert_eq!(part_number, 2),
        other => panic!("Expected UploadPart, got {other}"),
    }
    // Only the first part made it before the failure.
    assert_eq!(uploader.part_lengths(), vec![4]);
    assert_eq!(coordinator.uploaded_bytes(), 4);
    assert_eq!(uploader.completes(), 0);
    assert_eq!(uploader.aborts(), 1);
}

/// Test a compressor that returns without closing the writer is treated as truncated
#[test]
fn test_unclosed_stream_is_truncated() {
    let uploader = Arc::new(RecordingUploader::default());
    let coordinator = scripted(Script::Truncate(blocks(&["abcdefgh"])), uploader.clone());

    let err = coordinator
        .archive_and_upload(Path::new("input.txt"), BUCKET, Some(KEY))
        .unwrap_err();

    assert!(matches!(err, ShareError::StreamTruncated));
    assert_eq!(uploader.completes(), 0);
    assert_eq!(uploader.aborts(), 1);
}

/// Test a panicking compressor is reported and the upload aborted
#[test]
fn test_producer_panic_aborts_upload() {
    let uploader = Arc::new(RecordingUploader::default());
    let coordinator = scripted(Script::Panic(blocks(&["abcdefgh"])), uploader.clone());

    let err = coordinator
        .archive_and_upload(Path::new("input.txt"), BUCKET, Some(KEY))
        .unwrap_err();

    assert!(matches!(err, ShareError::ProducerPanicked));
    assert_eq!(uploader.completes(), 0);
    assert_eq!(uploader.aborts(), 1);
}

/// Test the upload phase is finished exactly once on success and on failure
#[test]
fn test_finish_upload_called_on_every_path() {
    for script in [
        Script::Write(blocks(&["abcdef"])),
        Script::FailAfter(blocks(&["abcdef"])),
        Script::Write(Vec::new()),
    ] {
        let uploader = Arc::new(RecordingUploader::default());
        let progress = Arc::new(CountingProgress::default());
        let coordinator = Coordinator::new(
            Arc::new(ScriptedCompressor::new(script)),
            uploader,
            progress.clone(),
        )
        .with_chunk_size(4);

        let _ = coordinator.archive_and_upload(Path::new("input.txt"), BUCKET, Some(KEY));

        assert_eq!(progress.upload_starts.load(Ordering::SeqCst), 1);
        assert_eq!(progress.upload_finishes.load(Ordering::SeqCst), 1);
    }
}

/// Test the upload progress counter adds up to the uploaded bytes
#[test]
fn test_upload_progress_matches_uploaded_bytes() {
    let uploader = Arc::new(RecordingUploader::default());
    let progress = Arc::new(CountingProgress::default());
    let coordinator = Coordinator::new(
        Arc::new(ScriptedCompressor::new(Script::Write(blocks(&["0123456789", "abc"])))),
        uploader.clone(),
        progress.clone(),
    )
    .with_chunk_size(5);

    coordinator
        .archive_and_upload(Path::new("input.txt"), BUCKET, Some(KEY))
        .unwrap();

    assert_eq!(progress.uploaded.get(), 13);
    assert_eq!(uploader.part_lengths(), vec![5, 5, 3]);
}

/// Test the upload phase is not sized by the uncompressed input
#[test]
fn test_upload_total_is_unknown_for_compressed_stream() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("repetitive.txt");
    fs::write(&path, vec![b'a'; 1_000_000]).unwrap();

    let uploader = Arc::new(RecordingUploader::default());
    let progress = Arc::new(CountingProgress::default());
    let coordinator = Coordinator::new(Arc::new(Archiver::for_path(&path)), uploader.clone(), progress.clone())
        .with_chunk_size(256);

    coordinator.archive_and_upload(&path, BUCKET, Some(KEY)).unwrap();

    let uploaded = uploader.uploaded().len() as u64;
    assert!(uploaded < 1_000_000);
    assert_eq!(progress.upload_total.get(), 0);
    assert_eq!(progress.uploaded.get(), uploaded);
    assert_eq!(coordinator.uploaded_bytes(), uploaded);
}

/// Test default keys carry the compressor's suffix
#[test]
fn test_key_generation_uses_archiver_suffix() {
    let uploader: Arc<dyn Uploader> = Arc::new(RecordingUploader::default());
    let file = Coordinator::new(
        Arc::new(Archiver::select(false)),
        uploader.clone(),
        Arc::new(NoopProgressReporter),
    );
    let directory = Coordinator::new(
        Arc::new(Archiver::select(true)),
        uploader,
        Arc::new(NoopProgressReporter),
    );

    assert_eq!(file.resolve_key(Path::new("test.txt"), None), "test.txt.gz");
    assert_eq!(directory.resolve_key(Path::new("test.txt"), None), "test.txt.tar.gz");
    assert_eq!(file.resolve_key(Path::new("test.txt"), Some("")), "test.txt.gz");
    assert_eq!(file.resolve_key(Path::new("test.txt"), Some("custom.gz")), "custom.gz");
}

/// Test a real gzip upload decodes back to the original file
#[test]
fn test_gzip_file_end_to_end() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("notes.txt");
    let content: String = (0..500).map(|i| format!("line {} of the shared notes\n", i)).collect();
    fs::write(&path, &content).unwrap();

    let uploader = Arc::new(RecordingUploader::default());
    let progress = Arc::new(LogProgressReporter::new());
    let coordinator = Coordinator::new(Arc::new(Archiver::for_path(&path)), uploader.clone(), progress.clone())
        .with_chunk_size(64)
        .with_queue_depth(Some(2));

    let key = coordinator.archive_and_upload(&path, BUCKET, None).unwrap();
    assert_eq!(key, "notes.txt.gz");

    let lengths = uploader.part_lengths();
    assert!(lengths.len() > 1);
    let (last, full) = lengths.split_last().unwrap();
    assert!(full.iter().all(|&len| len == 64));
    assert!(*last > 0 && *last <= 64);

    let mut decoded = String::new();
    GzDecoder::new(&uploader.uploaded()[..])
        .read_to_string(&mut decoded)
        .unwrap();
    assert_eq!(decoded, content);
    assert_eq!(progress.compressed_bytes(), content.len() as u64);
    assert_eq!(progress.uploaded_bytes(), uploader.uploaded().len() as u64);
    assert_eq!(uploader.completes(), 1);
    assert_eq!(uploader.aborts(), 0);
}

/// Test a real directory upload unpacks to the same tree
#[test]
fn test_tar_gzip_directory_end_to_end() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("bundle");
    fs::create_dir_all(root.join("nested")).unwrap();
    fs::write(root.join("a.txt"), "alpha").unwrap();
    fs::write(root.join("nested").join("b.txt"), "bravo").unwrap();

    let uploader = Arc::new(RecordingUploader::default());
    let coordinator = Coordinator::new(
        Arc::new(Archiver::for_path(&root)),
        uploader.clone(),
        Arc::new(NoopProgressReporter),
    )
    .with_chunk_size(128)
    .with_queue_depth(None);

    let key = coordinator.archive_and_upload(&root, BUCKET, None).unwrap();
    assert_eq!(key, "bundle.tar.gz");

    let bytes = uploader.uploaded();
    let mut archive = tar::Archive::new(GzDecoder::new(&bytes[..]));
    let mut files = Vec::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        if entry.header().entry_type().is_file() {
            let name = entry.path().unwrap().into_owned();
            let mut body = String::new();
            entry.read_to_string(&mut body).unwrap();
            files.push((name, body));
        }
    }
    files.sort();

    assert_eq!(
        files,
        vec![
            (PathBuf::from("bundle/a.txt"), "alpha".to_string()),
            (PathBuf::from("bundle/nested/b.txt"), "bravo".to_string()),
        ]
    );
}

/// Test concurrent upload updates are never lost
#[test]
fn test_concurrent_progress_updates() {
    let progress = Arc::new(LogProgressReporter::new());
    progress.start_upload(8 * 1000 * 100, 0);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let progress = Arc::clone(&progress);
            thread::spawn(move || {
                for _ in 0..1000 {
                    progress.update_upload(100);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(progress.uploaded_bytes(), 8 * 1000 * 100);
}

fn drain(receiver: crossbeam::channel::Receiver<QueueItem>) -> (Vec<Bytes>, usize) {
    let mut chunks = Vec::new();
    let mut done = 0;
    for item in receiver.try_iter() {
        match item {
            QueueItem::Chunk(chunk) => chunks.push(chunk),
            QueueItem::Done => done += 1,
        }
    }
    (chunks, done)
}

proptest! {
    /// Any split of the input yields the same fixed-size chunks and one end marker
    #[test]
    fn prop_chunking_preserves_bytes(
        data in proptest::collection::vec(any::<u8>(), 0..2048),
        chunk_size in 1usize..300,
        splits in proptest::collection::vec(1usize..97, 1..20),
    ) {
        let (sender, receiver) = HandoffQueue::unbounded();
        let writer = ChunkWriter::new(sender, chunk_size);

        let mut offset = 0;
        let mut cuts = splits.iter().cycle();
        while offset < data.len() {
            let step = (*cuts.next().unwrap()).min(data.len() - offset);
            prop_assert_eq!(writer.write(&data[offset..offset + step]).unwrap(), step);
            offset += step;
        }
        writer.close().unwrap();
        writer.close().unwrap();
        drop(writer);

        let (chunks, done) = drain(receiver);
        prop_assert_eq!(done, 1);

        let joined: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
        prop_assert_eq!(&joined, &data);

        if let Some((last, full)) = chunks.split_last() {
            prop_assert!(full.iter().all(|c| c.len() == chunk_size));
            prop_assert!(!last.is_empty() && last.len() <= chunk_size);
        }
        prop_assert_eq!(chunks.len(), (data.len() + chunk_size - 1) / chunk_size);
    }
}
