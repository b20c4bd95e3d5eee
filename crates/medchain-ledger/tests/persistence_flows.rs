//! # Persistence and Record/Verify Flow Tests
//!
//! File-backed ledger and filesystem content store under a temporary data
//! directory: durability across reopen, stores sharing one directory, and
//! detection of out-of-band edits to both the ledger file and stored
//! objects.

use medchain_core::PayloadDraft;
use medchain_ledger::{
    ChainFault, ContentStore, FsContentStore, IntegrityService, LedgerConfig, LedgerError,
    LedgerStore, ObjectVerification, RecordRequest, LEDGER_FILE,
};

async fn service(
    config: &LedgerConfig,
) -> IntegrityService<medchain_ledger::FileBackend, FsContentStore> {
    let ledger = LedgerStore::open(config).await.unwrap();
    let content = FsContentStore::open(config.objects_dir()).await.unwrap();
    IntegrityService::new(ledger, content)
}

#[tokio::test]
async fn reopened_ledger_has_same_verifying_chain() {
    let dir = tempfile::tempdir().unwrap();
    let config = LedgerConfig::new(dir.path()).with_sync_writes(false);

    let before = {
        let store = LedgerStore::open(&config).await.unwrap();
        for i in 1..=5 {
            store
                .append(PayloadDraft::new(format!("o{i}"), format!("n{i}"), format!("d{i}")))
                .await
                .unwrap();
        }
        store.all_blocks().await.unwrap()
    };

    let store = LedgerStore::open(&config).await.unwrap();
    let after = store.all_blocks().await.unwrap();
    assert_eq!(before, after);
    assert!(store.verify().await.unwrap().valid);

    let next = store.append(PayloadDraft::new("o6", "n6", "d6")).await.unwrap();
    assert_eq!(next.index, 6);
    assert_eq!(next.prev_digest, after[4].digest);
}

#[tokio::test]
async fn stores_sharing_a_directory_extend_one_chain() {
    let dir = tempfile::tempdir().unwrap();
    let config = LedgerConfig::new(dir.path()).with_sync_writes(false);
    let first = LedgerStore::open(&config).await.unwrap();
    let second = LedgerStore::open(&config).await.unwrap();

    let b1 = first.append(PayloadDraft::new("o1", "n1", "d1")).await.unwrap();
    let b2 = second.append(PayloadDraft::new("o2", "n2", "d2")).await.unwrap();
    let b3 = first.append(PayloadDraft::new("o3", "n3", "d3")).await.unwrap();

    assert_eq!((b1.index, b2.index, b3.index), (1, 2, 3));
    assert_eq!(b2.prev_digest, b1.digest);
    assert_eq!(b3.prev_digest, b2.digest);
    assert_eq!(second.all_blocks().await.unwrap(), vec![b1, b2, b3]);
    assert!(second.verify().await.unwrap().valid);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_stores_on_one_directory_never_fork() {
    let dir = tempfile::tempdir().unwrap();
    let config = LedgerConfig::new(dir.path()).with_sync_writes(false);
    let stores = [
        LedgerStore::open(&config).await.unwrap(),
        LedgerStore::open(&config).await.unwrap(),
    ];

    let mut tasks = Vec::new();
    for (s, store) in stores.iter().enumerate() {
        for i in 0..10 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .append(PayloadDraft::new(format!("o{s}-{i}"), "n", format!("d{s}-{i}")))
                    .await
            }));
        }
    }

    let mut landed = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => landed += 1,
            Err(LedgerError::TipMoved { .. }) => {}
            Err(other) => panic!("unexpected append error: {other}"),
        }
    }
    assert!(landed > 0);

    let reopened = LedgerStore::open(&config).await.unwrap();
    let blocks = reopened.all_blocks().await.unwrap();
    assert_eq!(blocks.len(), landed);
    assert!(blocks.iter().zip(1u64..).all(|(b, i)| b.index == i));
    assert!(reopened.verify().await.unwrap().valid);
}

#[tokio::test]
async fn hand_edited_ledger_file_fails_verification() {
    let dir = tempfile::tempdir().unwrap();
    let config = LedgerConfig::new(dir.path()).with_sync_writes(false);
    {
        let store = LedgerStore::open(&config).await.unwrap();
        for i in 1..=3 {
            store
                .append(PayloadDraft::new(format!("o{i}"), format!("report-{i}.pdf"), format!("d{i}")))
                .await
                .unwrap();
        }
    }

    let path = config.ledger_dir().join(LEDGER_FILE);
    let contents = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, contents.replace("report-2.pdf", "report-X.pdf")).unwrap();

    let store = LedgerStore::open(&config).await.unwrap();
    let report = store.verify().await.unwrap();
    assert_eq!(report.errors, vec![ChainFault::DigestMismatch { index: 2 }]);
}

#[tokio::test]
async fn truncated_ledger_line_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let config = LedgerConfig::new(dir.path()).with_sync_writes(false);
    {
        let store = LedgerStore::open(&config).await.unwrap();
        store.append(PayloadDraft::new("o1", "n1", "d1")).await.unwrap();
    }
    let path = config.ledger_dir().join(LEDGER_FILE);
    let mut contents = std::fs::read_to_string(&path).unwrap();
    contents.push_str("{\"index\":2,");
    std::fs::write(&path, contents).unwrap();

    let err = LedgerStore::open(&config).await.unwrap_err();
    assert!(matches!(err, LedgerError::Corrupt { line: 2, .. }), "{err}");
}

#[tokio::test]
async fn recorded_file_verifies_until_rewritten() {
    let dir = tempfile::tempdir().unwrap();
    let config = LedgerConfig::new(dir.path()).with_sync_writes(false);
    let svc = service(&config).await;

    let receipt = svc
        .record_object(
            RecordRequest::new("blood-panel.pdf", b"%PDF-1.7 results".to_vec())
                .with_content_type("application/pdf")
                .with_subject("patient-7")
                .with_label("lab")
                .with_metadata("recordType", "lab"),
        )
        .await
        .unwrap();
    assert!(receipt.stored_name.ends_with("-blood-panel.pdf"));
    assert_eq!(receipt.block.index, 1);

    let outcome = svc.verify_object(&receipt.object_id).await.unwrap();
    assert!(outcome.is_verified());
    let outcome = svc.verify_object_by_name(&receipt.stored_name).await.unwrap();
    assert!(outcome.is_verified());

    let path = svc.content().object_path(&receipt.object_id).unwrap();
    std::fs::write(&path, b"%PDF-1.7 altered").unwrap();

    match svc.verify_object(&receipt.object_id).await.unwrap() {
        ObjectVerification::Modified { block, computed } => {
            assert_eq!(block.payload.content_digest, receipt.content_digest.to_hex());
            assert_ne!(computed, receipt.content_digest);
        }
        other => panic!("expected Modified, got {other:?}"),
    }
}

#[tokio::test]
async fn records_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = LedgerConfig::new(dir.path()).with_sync_writes(false);
    let receipt = {
        let svc = service(&config).await;
        svc.record_object(RecordRequest::new("xray.png", vec![0x89, b'P', b'N', b'G']))
            .await
            .unwrap()
    };

    let svc = service(&config).await;
    assert!(svc.verify_object(&receipt.object_id).await.unwrap().is_verified());
    let info = svc.content().info(&receipt.object_id).await.unwrap().unwrap();
    assert_eq!(info.name, receipt.stored_name);
    assert_eq!(info.content_type, "application/octet-stream");
}
