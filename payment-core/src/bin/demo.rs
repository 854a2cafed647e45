//! Payment ledger demo binary
//!
//! Bootstraps the state accounts and two customers, then replays a short
//! batch of emissions, transfers and terminations through the controller.

use anyhow::Context;
use payment_core::{
    Account, AccountKind, Config, Currency, Customer, LedgerStore, SharedLedger, SpecialAccount,
    TaskController, TransferData,
};
use rust_decimal::Decimal;
use tokio::sync::oneshot;

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.filter));

    if config.logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn print_store(store: &mut LedgerStore) -> payment_core::Result<()> {
    println!("______________________________________________________");
    println!("Store Info:");
    println!("{}", store.to_pretty_json()?);
    println!("______________________________________________________");
    Ok(())
}

fn print_listing(store: &mut LedgerStore) -> payment_core::Result<()> {
    for customer_id in store.customers() {
        for account in store.accounts_of(customer_id) {
            tracing::info!(
                customer_id,
                num = %account.num,
                currency = %account.currency_code,
                status = ?account.status,
                balance = %account.balance,
                "Account"
            );
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("loading configuration")?;
    init_tracing(&config);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "Payment system started"
    );

    let ledger: SharedLedger = LedgerStore::new().into_shared();
    let controller = TaskController::new(ledger.clone(), &config.controller);

    let government = [
        Customer::new("0", "GOVERNMENT", AccountKind::EMISSION),
        Customer::new("0", "GOVERNMENT", AccountKind::TERMINATE),
    ];
    let customer1 = Customer::new("1", "Customer One", AccountKind::Ordinary);
    let customer2 = Customer::new("2", "Customer Two", AccountKind::Ordinary);

    for gov in government {
        controller
            .add(move |store| {
                store
                    .create_account(&gov, gov.account_prefix, Currency::BYN, Decimal::ZERO)
                    .map(drop)
            })
            .await?;
    }

    controller.add(|store| store.emit(Decimal::from(2_000_000))).await?;
    controller.add(|store| store.emit(Decimal::from(1_500_000))).await?;
    controller.add(print_store).await?;

    for (customer, currency, amount) in [
        (customer1.clone(), Currency::BYN, 1000),
        (customer2.clone(), Currency::USD, 550),
        (customer2.clone(), Currency::BYN, 1000),
    ] {
        controller
            .add(move |store| {
                let amount = Decimal::from(amount);
                store
                    .create_account(&customer, customer.account_prefix, currency, amount)
                    .map(drop)
            })
            .await?;
    }

    for special in [SpecialAccount::Emission, SpecialAccount::Terminate] {
        controller
            .add(move |store| store.get_special_account(special).map(drop))
            .await?;
    }

    let c2 = customer2.clone();
    controller
        .add(move |store| {
            let account = store.find_account(&c2, Currency::USD)?;
            store.close_account(&account)
        })
        .await?;

    let c1 = customer1.clone();
    controller
        .add(move |store| {
            store
                .create_account(&c1, c1.account_prefix, Currency::USD, Decimal::ZERO)
                .map(drop)
        })
        .await?;

    let c2 = customer2.clone();
    controller
        .add(move |store| {
            let source = store.find_account(&c2, Currency::BYN)?;
            store.terminate(&source, Decimal::from(200))
        })
        .await?;

    // rejected: destination number does not validate
    let c2 = customer2.clone();
    controller
        .add(move |store| {
            let source = store.find_account(&c2, Currency::BYN)?;
            store.transfer(&source, &Account::with_number("NOT_VALID"), Decimal::from(250))
        })
        .await?;

    let (c1, c2) = (customer1.clone(), customer2.clone());
    controller
        .add(move |store| {
            let source = store.find_account(&c2, Currency::BYN)?;
            let destination = store.find_account(&c1, Currency::BYN)?;
            store.transfer(&source, &destination, Decimal::from(300))
        })
        .await?;

    let (c1, c2) = (customer1.clone(), customer2.clone());
    controller
        .add(move |store| {
            let source = store.find_account(&c1, Currency::BYN)?;
            let destination = store.find_account(&c2, Currency::BYN)?;
            let payload = TransferData::new(source, destination, Decimal::ONE).encode()?;
            store.transfer_from_encoded(&payload)
        })
        .await?;

    controller.add(print_store).await?;
    controller.add(print_listing).await?;

    let (done_tx, done_rx) = oneshot::channel();
    let _worker = controller.run(done_tx)?;
    let summary = done_rx.await.context("worker stopped without signaling")?;

    tracing::info!(
        processed = summary.processed,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Payment system finished"
    );
    Ok(())
}
