use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use telecare::storage::keys;
use telecare::{
    BillingCycle, ClientConfig, FileStorage, MemoryStorage, PaymentsApi, PollEvent, PollState,
    PollerConfig, SignalingSession, StatusPoller, StorageAdapter,
};

#[derive(Parser, Debug)]
#[command(name = "telecare")]
#[command(about = "Client tools for the Telecare clinic platform")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a payment request for a membership plan and poll it to a
    /// terminal state
    Pay {
        /// Membership plan identifier
        #[arg(long)]
        plan: String,

        /// Billing cycle: monthly or yearly
        #[arg(long, default_value = "monthly")]
        cycle: BillingCycle,
    },

    /// Poll an existing payment to a terminal state
    Status {
        /// Transaction reference from a previous payment request
        #[arg(long)]
        transaction_ref: String,
    },

    /// Mark a pending payment as settled (administrative action)
    Confirm {
        #[arg(long)]
        transaction_ref: String,
    },

    /// Open a signaling session and relay stdin lines as chat messages
    Chat {
        /// Appointment the session is scoped to
        #[arg(long)]
        appointment: String,

        /// Sender user id (generated when omitted)
        #[arg(long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "telecare=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env();
    let storage = open_storage(&config);

    // The embedding application owns the token lifecycle; the CLI seeds
    // it from the environment.
    if let Ok(token) = std::env::var("TELECARE_TOKEN") {
        storage.set(keys::TOKEN, &token);
    }

    match cli.command {
        Command::Pay { plan, cycle } => {
            let api = PaymentsApi::new(&config, storage.clone());
            let request = match api.create_payment_request(&plan, cycle).await {
                Ok(request) => request,
                Err(err) => {
                    eprintln!("Failed to create payment request: {}", err);
                    std::process::exit(1);
                }
            };

            // Survives a restart so an interrupted transfer can be resumed
            // with `telecare status`.
            storage.set(
                keys::PENDING_PAYMENT,
                &serde_json::json!({
                    "transactionRef": request.transaction_ref.clone(),
                    "planId": plan,
                })
                .to_string(),
            );

            println!("Transfer {} VND", request.amount);
            println!("  Bank BIN:   {}", request.bank_bin);
            println!(
                "  Account:    {} ({})",
                request.account_number, request.account_name
            );
            println!("  Memo:       {}", request.description);
            println!("  QR payload: {}", request.qr_payload);
            if let Some(expires) = chrono::DateTime::from_timestamp(request.expires_at, 0) {
                println!("  Expires:    {}", expires);
            }
            println!();

            poll_to_terminal(api, request.transaction_ref).await;
            storage.remove(keys::PENDING_PAYMENT);
        }
        Command::Status { transaction_ref } => {
            let api = PaymentsApi::new(&config, storage);
            poll_to_terminal(api, transaction_ref).await;
        }
        Command::Confirm { transaction_ref } => {
            let api = PaymentsApi::new(&config, storage);
            match api.confirm_payment(&transaction_ref).await {
                Ok(()) => println!("Payment {} confirmed", transaction_ref),
                Err(err) => {
                    eprintln!("Failed to confirm payment: {}", err);
                    std::process::exit(1);
                }
            }
        }
        Command::Chat { appointment, user } => {
            run_chat(&config, storage, appointment, user).await;
        }
    }
}

fn open_storage(config: &ClientConfig) -> Arc<dyn StorageAdapter> {
    match config.storage_dir.as_deref().and_then(FileStorage::new) {
        Some(file) => Arc::new(file),
        None => Arc::new(MemoryStorage::new()),
    }
}

async fn poll_to_terminal(api: PaymentsApi, transaction_ref: String) {
    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut handle = StatusPoller::spawn(
        api,
        transaction_ref,
        PollerConfig::default(),
        move |event| {
            let _ = events_tx.send(event);
        },
    );

    let mut failed = false;
    while let Some(event) = events_rx.recv().await {
        let PollEvent::State(state) = event else {
            continue;
        };
        let terminal = state.is_terminal();
        match state {
            PollState::Checking => println!("Checking payment status..."),
            PollState::Pending => println!("Still pending, next check in 5s"),
            PollState::Completed(subscription) => {
                print!(
                    "Payment completed. Subscription {} ({}) active",
                    subscription.id, subscription.plan_id
                );
                match chrono::DateTime::from_timestamp(subscription.expires_at, 0) {
                    Some(expires) => println!(" until {}", expires),
                    None => println!(),
                }
            }
            PollState::Failed(reason) => {
                println!("Payment failed: {}", reason);
                failed = true;
            }
        }
        if terminal {
            break;
        }
    }

    handle.wait().await;
    if failed {
        std::process::exit(1);
    }
}

async fn run_chat(
    config: &ClientConfig,
    storage: Arc<dyn StorageAdapter>,
    appointment: String,
    user: Option<String>,
) {
    let user_id = user.unwrap_or_else(|| format!("cli-{}", uuid::Uuid::new_v4()));

    let session = SignalingSession::new(config, appointment, storage);
    if let Err(err) = session.connect().await {
        eprintln!("Failed to connect signaling session: {}", err);
        std::process::exit(1);
    }

    let _chat = session.on_chat(|message| {
        println!("[{}] {}", message.sender_id, message.body);
    });
    let _signals = session.on_signal(|signal| {
        println!("[{}] sent a video signal: {}", signal.sender_id, signal.data);
    });

    println!(
        "Connected as {}. Type a message and press enter; Ctrl-D quits.",
        user_id
    );

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if !line.is_empty() {
            session.send_chat(&user_id, line);
        }
    }

    session.close();
}
