use super::*;
use crate::error::Error;
use crate::transcription::NoOpTranscriber;
use crate::types::Event;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_cancels_jobs_and_rejects_new_ones() {
    let (downloader, _temp_dir) = create_downloader_with(
        |config| config.download.max_concurrent_jobs = 1,
        Arc::new(ScriptedEngine::new(Script::Hang)),
        Arc::new(NoOpTranscriber),
    );
    let handle = downloader.start_queue_processor();

    let running = downloader
        .submit(DownloadRequest::new("https://example.com/1"))
        .await
        .unwrap();
    let queued = downloader
        .submit(DownloadRequest::new("https://example.com/2"))
        .await
        .unwrap();
    wait_for_status(&downloader, running, Status::Starting).await;

    let mut events = downloader.subscribe();
    downloader.shutdown().await.unwrap();

    for id in [running, queued] {
        let snapshot = downloader.status(id).await.unwrap();
        assert_eq!(snapshot.status, Status::Error);
        assert_eq!(
            snapshot.result.unwrap().error().unwrap().error_kind,
            ErrorKind::Cancelled
        );
    }
    assert!(downloader.status(queued).await.unwrap().started_at.is_none());

    let mut saw_shutdown = false;
    while let Ok(event) = events.try_recv() {
        saw_shutdown |= matches!(event, Event::Shutdown);
    }
    assert!(saw_shutdown);

    let err = downloader
        .submit(DownloadRequest::new("https://example.com/3"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ShuttingDown));
    handle.abort();
}

#[tokio::test]
async fn shutdown_with_no_jobs_is_immediate() {
    let (downloader, _temp_dir) = create_test_downloader();

    tokio::time::timeout(std::time::Duration::from_secs(1), downloader.shutdown())
        .await
        .unwrap()
        .unwrap();
}
