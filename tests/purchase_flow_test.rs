mod common;

use common::*;
use ppob_backend::external::ApiEnvelope;
use ppob_backend::models::TrxStatus;
use ppob_backend::store::LedgerStore;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn malformed_phone_reprompts_without_advancing() {
    let ledger = seeded_ledger(50000, vec![package("PKG1", "Combo 10GB", 30000, 27500)]).await;
    let remote = Arc::new(MockRemote::new());
    let dispatcher = dispatcher(ledger, remote);

    dispatcher.handle(choice("purchase_start")).await.unwrap();

    for bad in ["12345", "628781234567", "0878abc1234", "08781"] {
        let reply = dispatcher.handle(text(bad)).await.unwrap();
        assert!(reply.text.contains("Format nomor salah"), "{bad}: {}", reply.text);
        assert!(reply.options.is_empty());
    }

    // Still on AskPhone: a valid number advances to package selection.
    let reply = dispatcher.handle(text("087812345678")).await.unwrap();
    assert!(reply.text.contains("pilih paket"));
    assert_eq!(reply.options.len(), 1);
    assert_eq!(reply.options[0].data, "pkg_PKG1");
}

#[tokio::test]
async fn empty_catalog_terminates_flow() {
    let ledger = seeded_ledger(50000, vec![]).await;
    let remote = Arc::new(MockRemote::new());
    let dispatcher = dispatcher(ledger, remote);

    dispatcher.handle(choice("purchase_start")).await.unwrap();
    let reply = dispatcher.handle(text("087812345678")).await.unwrap();
    assert!(reply.text.contains("Gagal mengambil daftar paket"));

    // Flow terminated: free text now lands on the main menu, not AskPhone.
    let reply = dispatcher.handle(text("087812345678")).await.unwrap();
    assert!(reply.text.contains("menu"));
}

#[tokio::test]
async fn insufficient_balance_terminates_before_confirm() {
    let ledger = seeded_ledger(10000, vec![package("PKG2", "Combo 10GB", 30000, 27500)]).await;
    let remote = Arc::new(MockRemote::new());
    let dispatcher = dispatcher(ledger.clone(), remote.clone());

    dispatcher.handle(choice("purchase_start")).await.unwrap();
    dispatcher.handle(text("087812345678")).await.unwrap();
    let reply = dispatcher.handle(choice("pkg_PKG2")).await.unwrap();

    assert!(reply.text.contains("Saldo Anda (Rp10000) tidak cukup"));
    assert_eq!(remote.purchase_calls.load(Ordering::SeqCst), 0);
    assert!(ledger.transactions().await.is_empty());
    let balance = ledger.get_balance(USER_ID).await.unwrap().unwrap().balance;
    assert_eq!(balance, 10000);

    // Terminal: the confirm choice no longer applies.
    let reply = dispatcher.handle(choice("confirm_yes")).await.unwrap();
    assert!(reply.text.contains("Tombol tidak valid"));
}

#[tokio::test]
async fn successful_purchase_settles_and_logs() {
    let ledger = seeded_ledger(50000, vec![package("PKG1", "Combo 10GB", 30000, 27500)]).await;
    let remote = Arc::new(MockRemote::new());
    remote.set_purchase(ApiEnvelope::success(
        "Pembelian berhasil diproses",
        json!({"trx_id": "T1"}),
    ));
    let dispatcher = dispatcher(ledger.clone(), remote.clone());

    dispatcher.handle(choice("purchase_start")).await.unwrap();
    dispatcher.handle(text("087812345678")).await.unwrap();
    let reply = dispatcher.handle(choice("pkg_PKG1")).await.unwrap();
    assert!(reply.text.contains("Konfirmasi Pembelian"));
    assert!(reply.text.contains("Rp30000"));
    assert!(reply.text.contains("Rp20000")); // projected remaining balance

    let reply = dispatcher.handle(choice("confirm_yes")).await.unwrap();
    assert!(reply.text.contains("BERHASIL"));
    assert!(reply.text.contains("T1"));

    assert_eq!(remote.purchase_calls.load(Ordering::SeqCst), 1);
    let balance = ledger.get_balance(USER_ID).await.unwrap().unwrap().balance;
    assert_eq!(balance, 20000);

    let records = ledger.transactions().await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.status, TrxStatus::Success);
    assert_eq!(record.price, 30000);
    assert_eq!(record.transaction_id, "T1");
    assert_eq!(record.package_code, "PKG1");
    assert_eq!(record.destination, "087812345678");
    assert_eq!(record.user.as_deref(), Some("tester"));
}

#[tokio::test]
async fn remote_failure_logs_error_record_and_keeps_balance() {
    let ledger = seeded_ledger(50000, vec![package("PKG1", "Combo 10GB", 30000, 27500)]).await;
    let remote = Arc::new(MockRemote::new());
    remote.set_purchase(ApiEnvelope::failure("Stok paket habis"));
    let dispatcher = dispatcher(ledger.clone(), remote.clone());

    dispatcher.handle(choice("purchase_start")).await.unwrap();
    dispatcher.handle(text("087812345678")).await.unwrap();
    dispatcher.handle(choice("pkg_PKG1")).await.unwrap();
    let reply = dispatcher.handle(choice("confirm_yes")).await.unwrap();

    assert!(reply.text.contains("GAGAL"));
    assert!(reply.text.contains("Stok paket habis"));

    // Exactly one underlying attempt, no retry for non-token failures.
    assert_eq!(remote.purchase_calls.load(Ordering::SeqCst), 1);

    let balance = ledger.get_balance(USER_ID).await.unwrap().unwrap().balance;
    assert_eq!(balance, 50000);

    let records = ledger.transactions().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, TrxStatus::Error);
    assert_eq!(records[0].note, "Stok paket habis");
}

#[tokio::test]
async fn decline_at_confirm_has_no_side_effects() {
    let ledger = seeded_ledger(50000, vec![package("PKG1", "Combo 10GB", 30000, 27500)]).await;
    let remote = Arc::new(MockRemote::new());
    let dispatcher = dispatcher(ledger.clone(), remote.clone());

    dispatcher.handle(choice("purchase_start")).await.unwrap();
    dispatcher.handle(text("087812345678")).await.unwrap();
    dispatcher.handle(choice("pkg_PKG1")).await.unwrap();
    let reply = dispatcher.handle(choice("confirm_no")).await.unwrap();

    assert!(reply.text.contains("Dibatalkan"));
    assert_eq!(remote.purchase_calls.load(Ordering::SeqCst), 0);
    assert!(ledger.transactions().await.is_empty());
    let balance = ledger.get_balance(USER_ID).await.unwrap().unwrap().balance;
    assert_eq!(balance, 50000);
}

#[tokio::test]
async fn cancel_clears_session_completely() {
    let ledger = seeded_ledger(50000, vec![package("PKG1", "Combo 10GB", 30000, 27500)]).await;
    let remote = Arc::new(MockRemote::new());
    let dispatcher = dispatcher(ledger.clone(), remote);

    dispatcher.handle(choice("purchase_start")).await.unwrap();
    dispatcher.handle(text("087812345678")).await.unwrap();
    let reply = dispatcher.handle(cancel()).await.unwrap();
    assert!(reply.text.contains("Operasi dibatalkan"));
    assert!(ledger.transactions().await.is_empty());

    // No residual staged values: a package choice is invalid now, and a new
    // flow starts from the phone prompt.
    let reply = dispatcher.handle(choice("pkg_PKG1")).await.unwrap();
    assert!(reply.text.contains("Tombol tidak valid"));
    let reply = dispatcher.handle(choice("purchase_start")).await.unwrap();
    assert!(reply.text.contains("nomor XL/Axis tujuan"));
}

#[tokio::test]
async fn session_timeout_acts_like_cancellation() {
    let ledger = seeded_ledger(50000, vec![package("PKG1", "Combo 10GB", 30000, 27500)]).await;
    let remote = Arc::new(MockRemote::new());
    let dispatcher = dispatcher(ledger.clone(), remote);

    dispatcher.handle(choice("purchase_start")).await.unwrap();
    dispatcher.handle(text("087812345678")).await.unwrap();
    let reply = dispatcher.handle(session_timeout()).await.unwrap();
    assert!(reply.text.contains("Sesi berakhir"));

    assert!(ledger.transactions().await.is_empty());
    let reply = dispatcher.handle(choice("pkg_PKG1")).await.unwrap();
    assert!(reply.text.contains("Tombol tidak valid"));
}

#[tokio::test]
async fn unknown_package_selection_reprompts_in_place() {
    let ledger = seeded_ledger(50000, vec![package("PKG1", "Combo 10GB", 30000, 27500)]).await;
    let remote = Arc::new(MockRemote::new());
    let dispatcher = dispatcher(ledger, remote);

    dispatcher.handle(choice("purchase_start")).await.unwrap();
    dispatcher.handle(text("087812345678")).await.unwrap();
    let reply = dispatcher.handle(choice("pkg_NOPE")).await.unwrap();
    assert!(reply.text.contains("Paket tidak dikenal"));

    // The staged phone number survived; a valid selection still works.
    let reply = dispatcher.handle(choice("pkg_PKG1")).await.unwrap();
    assert!(reply.text.contains("Konfirmasi Pembelian"));
    assert!(reply.text.contains("087812345678"));
}
