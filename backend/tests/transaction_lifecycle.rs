//! End-to-end purchase lifecycle through a started session.

use kb_buyback::domain::commands::transactions::{
    DeleteTransactionCommand, UpdateTransactionCommand,
};
use kb_buyback::domain::{
    BuybackError, FeedStatus, ItemDraft, Session, TransactionDraft, ValidationError,
};
use kb_buyback::io::RecordingReceiptPrinter;
use kb_buyback::storage::csv::{CsvConnection, CsvGateway, HaltFlagRepository};
use kb_buyback::storage::{AnonymousIdentityProvider, InMemoryGateway, MemoryHaltFlag};
use shared::{ItemDetails, ItemType, Karat, PaymentMethod, Timeframe};
use std::sync::Arc;
use tempfile::TempDir;

struct Terminal {
    session: Session,
    gateway: Arc<InMemoryGateway>,
    printer: Arc<RecordingReceiptPrinter>,
}

impl Terminal {
    async fn start() -> Self {
        let gateway = Arc::new(InMemoryGateway::new());
        let printer = Arc::new(RecordingReceiptPrinter::new());
        let session = Session::new(
            gateway.clone(),
            Arc::new(AnonymousIdentityProvider::new()),
            Arc::new(MemoryHaltFlag::new(false)),
            printer.clone(),
            None,
        );
        session.start().await;
        session
            .transactions()
            .wait_for_feed(|feed| feed.status == FeedStatus::Live)
            .await;

        Self {
            session,
            gateway,
            printer,
        }
    }

    /// Run `action`, then wait for the push it causes
    async fn and_wait_for_push<F, T>(&self, action: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let revision = self.session.transactions().feed_state().revision;
        let result = action.await;
        self.session
            .transactions()
            .wait_for_revision(revision + 1)
            .await;
        result
    }
}

fn gold_draft(price: &str) -> TransactionDraft {
    TransactionDraft {
        customer_name: "Jane Doe".to_string(),
        customer_id: "D123-4567".to_string(),
        phone: "616-555-0142".to_string(),
        item_description: "Rope chain".to_string(),
        item: ItemDraft::Gold {
            weight: "5.5".to_string(),
            karat: Karat::K14,
        },
        price: price.to_string(),
        payment_method: PaymentMethod::Cash,
        signature_image: Some("data:image/png;base64,iVBORw0KGgo".to_string()),
        ..TransactionDraft::default()
    }
}

#[tokio::test]
async fn test_created_purchase_comes_back_through_the_feed() {
    let terminal = Terminal::start().await;

    let created = terminal
        .and_wait_for_push(terminal.session.transactions().create(gold_draft("100.00")))
        .await
        .unwrap();

    let stored = terminal.session.transactions().get(&created.id).unwrap();
    assert_eq!(stored, created.transaction);
    assert_eq!(stored.created_by, terminal.session.context().identity().unwrap().uid);
    assert_eq!(stored.last_modified, None);
}

#[tokio::test]
async fn test_gold_purchase_and_receipt_carry_the_entered_values() {
    let terminal = Terminal::start().await;
    let created = terminal
        .session
        .transactions()
        .create(gold_draft("100.00"))
        .await
        .unwrap();

    assert_eq!(terminal.gateway.len(), 1);
    assert_eq!(created.transaction.item_type(), ItemType::Gold);
    assert_eq!(created.transaction.price, 100.0);
    assert_eq!(
        created.transaction.item,
        ItemDetails::Gold {
            weight: 5.5,
            karat: Karat::K14
        }
    );

    let printed = terminal.printer.printed();
    assert_eq!(printed.len(), 1);
    let receipt = &printed[0];
    assert_eq!(receipt.amount, 100.0);
    assert_eq!(receipt.item_type, ItemType::Gold);
    assert_eq!(
        receipt.item_lines,
        vec![("Weight", "5.5g".to_string()), ("Karat", "14k".to_string())]
    );
    assert!(receipt.to_string().contains("AMOUNT PAID: $100.00"));
}

#[tokio::test]
async fn test_zero_price_is_rejected_before_the_store() {
    let terminal = Terminal::start().await;
    let calls_before = terminal.gateway.call_count();

    let err = terminal
        .session
        .transactions()
        .create(gold_draft("0"))
        .await
        .unwrap_err();

    assert_eq!(err, BuybackError::Validation(ValidationError::NonPositivePrice));
    assert_eq!(terminal.gateway.call_count(), calls_before);
    assert!(terminal.printer.printed().is_empty());
}

#[tokio::test]
async fn test_edit_preserves_id_and_date() {
    let terminal = Terminal::start().await;
    let transactions = terminal.session.transactions();
    let created = terminal
        .and_wait_for_push(transactions.create(gold_draft("100.00")))
        .await
        .unwrap();

    let mut edit = TransactionDraft::from_transaction(&created.transaction);
    edit.customer_name = "Jane Smith".to_string();
    edit.item = ItemDraft::Gold {
        weight: "6".to_string(),
        karat: Karat::K18,
    };
    edit.price = "130".to_string();

    terminal
        .and_wait_for_push(transactions.update(UpdateTransactionCommand {
            id: created.id.clone(),
            draft: edit,
        }))
        .await
        .unwrap();

    let stored = transactions.get(&created.id).unwrap();
    assert_eq!(stored.id, created.id);
    assert_eq!(stored.date, created.transaction.date);
    assert_eq!(stored.created_by, created.transaction.created_by);
    assert_eq!(stored.customer_name, "Jane Smith");
    assert_eq!(stored.price, 130.0);
    assert!(stored.last_modified.is_some());
    assert_eq!(stored.modified_by, Some(created.transaction.created_by.clone()));
}

#[tokio::test]
async fn test_wrong_delete_code_changes_nothing() {
    let terminal = Terminal::start().await;
    let transactions = terminal.session.transactions();
    let created = terminal
        .and_wait_for_push(transactions.create(gold_draft("100.00")))
        .await
        .unwrap();
    let before = transactions.snapshot();

    let err = transactions
        .delete(DeleteTransactionCommand {
            id: created.id.clone(),
            code: "1234".to_string(),
            confirmed: true,
        })
        .await
        .unwrap_err();

    assert_eq!(err, BuybackError::InvalidCode);
    assert_eq!(transactions.snapshot(), before);
    assert_eq!(terminal.gateway.len(), 1);
    assert_eq!(terminal.session.access().failed_attempts(), 0);

    terminal
        .and_wait_for_push(transactions.delete(DeleteTransactionCommand {
            id: created.id,
            code: "9812".to_string(),
            confirmed: true,
        }))
        .await
        .unwrap();
    assert!(transactions.snapshot().is_empty());
}

#[tokio::test]
async fn test_monthly_analytics_from_the_live_snapshot() {
    let terminal = Terminal::start().await;
    let transactions = terminal.session.transactions();

    for price in ["50", "75"] {
        terminal
            .and_wait_for_push(transactions.create(gold_draft(price)))
            .await
            .unwrap();
    }

    let monthly = transactions.analytics(Timeframe::Monthly);
    assert_eq!(monthly.count, 2);
    assert_eq!(monthly.total_spent_period, 125.0);
    assert_eq!(monthly.gold_grams_by_karat[&Karat::K14], 11.0);
}

#[tokio::test]
async fn test_file_backed_terminal_survives_a_restart() {
    let temp_dir = TempDir::new().unwrap();
    let connection = CsvConnection::new(temp_dir.path(), "lifecycle").unwrap();

    let open = || {
        Session::new(
            Arc::new(CsvGateway::new(connection.clone())),
            Arc::new(AnonymousIdentityProvider::new()),
            Arc::new(HaltFlagRepository::new(&connection)),
            Arc::new(RecordingReceiptPrinter::new()),
            None,
        )
    };

    let first = open();
    first.start().await;
    let created = first
        .transactions()
        .create(gold_draft("42.50"))
        .await
        .unwrap();
    for _ in 0..5 {
        first.access().submit("0000");
    }
    first.end().await;

    let second = open();
    assert_eq!(second.access().state(), shared::AccessState::Halted);
    second.start().await;
    second
        .transactions()
        .wait_for_feed(|feed| feed.status == FeedStatus::Live)
        .await;

    let stored = second.transactions().get(&created.id).unwrap();
    assert_eq!(stored.price, 42.5);
    assert_eq!(stored.date, created.transaction.date);
    second.end().await;
}
