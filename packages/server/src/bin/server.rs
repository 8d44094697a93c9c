//! Multiplayer quiz session server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin quizroom-server
//! cargo run --bin quizroom-server -- --host 0.0.0.0 --port 3000
//! cargo run --bin quizroom-server -- --question-source-url http://127.0.0.1:9000/generate
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use quizroom_server::{
    config::CoordinatorConfig,
    domain::{MessagePusher, ResultStore},
    infrastructure::{
        ConnectionRegistry, HttpQuestionGenerator, InMemoryResultStore, load_default_pool,
    },
    ui::{AppState, Server},
    usecase::{
        ConnectParticipantUseCase, DisconnectParticipantUseCase, PersistenceFailure,
        QuestionSequencer, RetryPolicy, RoomDeps, RoomStore, SessionFinalizer,
    },
};
use quizroom_shared::{
    logger::setup_logger,
    time::{Clock, SystemClock},
};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "quizroom-server")]
#[command(about = "Multiplayer quiz session coordinator", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Default log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Endpoint of the external question generator; the built-in pool is used when omitted
    #[arg(long)]
    question_source_url: Option<String>,

    /// Timeout of a single question generation request, in milliseconds
    #[arg(long, default_value = "2000")]
    question_source_timeout_ms: u64,

    /// Total time a quiz start may spend on question generation, in milliseconds
    #[arg(long, default_value = "5000")]
    question_generation_budget_ms: u64,

    /// Maximum members per room, host included
    #[arg(long, default_value = "8")]
    max_members: usize,

    /// Connected non-host members required to start (0 allows solo play)
    #[arg(long, default_value = "1")]
    min_players: usize,

    /// Pause between a question's results and the next question, in seconds
    #[arg(long, default_value = "3")]
    reveal_pause_secs: u64,

    /// Waiting rooms without activity are closed after this many seconds
    #[arg(long, default_value = "600")]
    idle_timeout_secs: u64,

    /// Finished rooms keep answering SessionClosed for this many seconds
    #[arg(long, default_value = "60")]
    finished_room_grace_secs: u64,

    /// Attempts per result record before it is reported for manual recovery
    #[arg(long, default_value = "3")]
    persist_max_attempts: u32,

    /// Base delay between persistence attempts, in milliseconds
    #[arg(long, default_value = "500")]
    persist_retry_backoff_ms: u64,

    /// Upper bound of a room's question count
    #[arg(long, default_value = "50")]
    max_question_count: u32,

    /// Upper bound of a room's time per question, in seconds
    #[arg(long, default_value = "120")]
    max_time_per_question_secs: u32,
}

impl Args {
    fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            max_members: self.max_members,
            min_players: self.min_players,
            reveal_pause: Duration::from_secs(self.reveal_pause_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            finished_room_grace: Duration::from_secs(self.finished_room_grace_secs),
            persist_max_attempts: self.persist_max_attempts,
            persist_retry_backoff: Duration::from_millis(self.persist_retry_backoff_ms),
            max_question_count: self.max_question_count,
            max_time_per_question_secs: self.max_time_per_question_secs,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    let config = args.coordinator_config();
    tracing::info!("Starting with {:?}", config);

    // Initialize dependencies in order:
    // 1. Question sources
    // 2. Connection registry and result store
    // 3. Session finalizer and room store
    // 4. UseCases
    // 5. Server

    // 1. Question sources
    let pool = match load_default_pool() {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            tracing::error!("Failed to load the question pool: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("Loaded {} questions", pool.len());
    let mut sequencer = QuestionSequencer::new(pool).with_generation_budget(
        Duration::from_millis(args.question_generation_budget_ms),
    );
    if let Some(url) = args.question_source_url.clone() {
        let timeout = Duration::from_millis(args.question_source_timeout_ms);
        match HttpQuestionGenerator::new(url.clone(), timeout) {
            Ok(generator) => {
                tracing::info!("Generating questions via {}", url);
                sequencer = sequencer.with_generator(Arc::new(generator));
            }
            Err(e) => {
                tracing::error!("Failed to set up the question generator: {}", e);
                std::process::exit(1);
            }
        }
    }

    // 2. Connection registry (WebSocket implementation) and result store
    let message_pusher: Arc<dyn MessagePusher> = Arc::new(ConnectionRegistry::new());
    let result_store: Arc<dyn ResultStore> = Arc::new(InMemoryResultStore::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // 3. Session finalizer and room store
    let (operator_tx, operator_rx) = mpsc::unbounded_channel();
    tokio::spawn(report_persistence_failures(operator_rx));
    let finalizer = SessionFinalizer::new(
        message_pusher.clone(),
        result_store.clone(),
        clock.clone(),
        RetryPolicy {
            max_attempts: config.persist_max_attempts,
            backoff: config.persist_retry_backoff,
        },
    )
    .with_operator_channel(operator_tx);
    let room_store = RoomStore::new(RoomDeps {
        config,
        message_pusher: message_pusher.clone(),
        sequencer: Arc::new(sequencer),
        finalizer: Arc::new(finalizer),
        clock: clock.clone(),
    });

    // 4. UseCases
    let connect_participant_usecase = Arc::new(ConnectParticipantUseCase::new(
        message_pusher.clone(),
        clock,
    ));
    let disconnect_participant_usecase = Arc::new(DisconnectParticipantUseCase::new(
        message_pusher,
        room_store.clone(),
    ));

    // 5. Create and run the server
    let server = Server::new(AppState {
        connect_participant_usecase,
        disconnect_participant_usecase,
        room_store,
        result_store,
    });
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Keeps the operator aware of how many results still need manual recovery
async fn report_persistence_failures(mut rx: mpsc::UnboundedReceiver<PersistenceFailure>) {
    let mut unpersisted = 0usize;
    while let Some(failure) = rx.recv().await {
        unpersisted += 1;
        tracing::warn!(
            target: "operator",
            room_id = %failure.record.room_id,
            points = failure.record.points,
            rank = failure.record.rank,
            "{} result(s) awaiting manual recovery",
            unpersisted
        );
    }
}
