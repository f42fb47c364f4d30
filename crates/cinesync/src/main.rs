use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use futures_util::StreamExt;
use serde_json::json;
use tokio::{signal, task::JoinHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinesync::mock_data::{seed_demo, DEMO_ADMIN};
use cinesync::resources::Seats;
use cinesync::{Catalog, CollectionCache, Config, FileKv, MemoryStore, Resource, Session};
use cinesync_client::{RealtimeClient, RestClient};
use cinesync_core::cinema::{CreateTicketSale, SeatStatus};
use cinesync_core::session::SessionError;
use cinesync_core::store::{ChangeFeed, Filter, RemoteStore, Select};

/// cinesync - Mirror the cinema tables and follow their changes live
#[derive(Parser, Debug)]
#[command(name = "cinesync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Use the seeded in-memory store instead of a remote project
    #[arg(long)]
    demo: bool,

    /// Project URL
    #[arg(long, env = "CINESYNC_URL")]
    url: Option<String>,

    /// API key sent with every request
    #[arg(long, env = "CINESYNC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Operator email; the account must hold the administrator role
    #[arg(long, env = "CINESYNC_EMAIL")]
    email: Option<String>,

    /// Operator password
    #[arg(long, env = "CINESYNC_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Keep the session after exit
    #[arg(long)]
    remember_me: bool,

    /// Seconds between simulated changes in demo mode (0 disables them)
    #[arg(long, default_value = "5")]
    simulate_secs: u64,
}

/// Where rows come from and where their changes are announced.
struct Backend {
    store: Arc<dyn RemoteStore>,
    feed: Arc<dyn ChangeFeed>,
    realtime: Option<RealtimeClient>,
    demo: Option<MemoryStore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cinesync=debug,cinesync_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env();
    config.url = cli.url.clone().or(config.url);
    config.api_key = cli.api_key.clone().or(config.api_key);

    let backend = if cli.demo {
        demo_backend().await?
    } else {
        remote_backend(&config)?
    };

    let session = match &config.session_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Using persisted session");
            Session::new(Arc::new(FileKv::new(path)))
        }
        None => Session::in_memory(),
    };
    let operator = authenticate(&cli, &session, backend.store.as_ref()).await?;
    tracing::info!(user_id = operator.id, name = %operator.full_name(), "Admin session ready");

    let catalog = Catalog::open(
        backend.store.clone(),
        backend.feed.as_ref(),
        config.cache_options(),
    )
    .await;
    log_dashboard(&catalog).await;

    let mut tasks = vec![
        log_transitions(&catalog.movies),
        log_transitions(&catalog.rooms),
        log_transitions(&catalog.seats),
        log_transitions(&catalog.showtimes),
        log_transitions(&catalog.tickets),
        log_transitions(&catalog.ticket_sales),
        log_transitions(&catalog.rentals),
        log_transitions(&catalog.users),
        log_transitions(&catalog.roles),
    ];
    if let Some(store) = backend.demo.clone() {
        if cli.simulate_secs > 0 {
            tasks.push(tokio::spawn(simulate_activity(
                store,
                catalog.clone(),
                operator.id,
                Duration::from_secs(cli.simulate_secs),
            )));
        }
    }

    shutdown_signal().await;

    catalog.dispose();
    if let Some(realtime) = &backend.realtime {
        realtime.shutdown();
    }
    for task in tasks {
        task.abort();
    }
    if !cli.remember_me {
        session.logout().await?;
    }

    tracing::info!("Stopped");
    Ok(())
}

async fn demo_backend() -> Result<Backend> {
    let store = MemoryStore::new();
    seed_demo(&store).await.context("failed to seed demo data")?;
    tracing::info!("Running against the in-memory demo store");
    Ok(Backend {
        store: Arc::new(store.clone()),
        feed: Arc::new(store.feed().clone()),
        realtime: None,
        demo: Some(store),
    })
}

fn remote_backend(config: &Config) -> Result<Backend> {
    let (Some(url), Some(api_key)) = (&config.url, &config.api_key) else {
        bail!("CINESYNC_URL and CINESYNC_API_KEY are required unless --demo is given");
    };
    let client = RestClient::new(url, api_key.as_str())?.with_schema(&config.schema);
    let realtime = RealtimeClient::connect(
        client.base_url(),
        api_key,
        config.schema.clone(),
        config.realtime(),
    )?;
    tracing::info!(url = %client.base_url(), schema = %config.schema, "Connecting to remote project");
    Ok(Backend {
        store: Arc::new(client),
        feed: Arc::new(realtime.clone()),
        realtime: Some(realtime),
        demo: None,
    })
}

/// Signs in when credentials are given, otherwise reuses a stored session.
/// Either way the operator must pass the admin gate.
async fn authenticate(
    cli: &Cli,
    session: &Session,
    store: &dyn RemoteStore,
) -> Result<cinesync_core::cinema::User> {
    let credentials = match (&cli.email, &cli.password) {
        (Some(email), Some(password)) => Some((email.as_str(), password.as_str())),
        _ if cli.demo && !session.is_authenticated().await? => Some(DEMO_ADMIN),
        _ => None,
    };
    if let Some((email, password)) = credentials {
        session
            .sign_in(store, email, password, cli.remember_me)
            .await?;
    }

    match session.authorize_admin().await {
        Ok(user) => Ok(user),
        Err(SessionError::NotAuthenticated) => {
            bail!("not signed in: pass --email and --password (or CINESYNC_EMAIL/CINESYNC_PASSWORD)")
        }
        Err(e) => Err(e.into()),
    }
}

/// Logs every snapshot a cache publishes until the cache is disposed.
fn log_transitions<R: Resource>(cache: &CollectionCache<R>) -> JoinHandle<()> {
    let table = cache.table();
    let mut snapshots = Box::pin(cache.stream());
    tokio::spawn(async move {
        let mut previous: Option<usize> = None;
        while let Some(snapshot) = snapshots.next().await {
            tracing::info!(table, count = snapshot.len(), previous = ?previous, "Snapshot");
            previous = Some(snapshot.len());
        }
        tracing::debug!(table, "Snapshot stream closed");
    })
}

async fn log_dashboard(catalog: &Catalog) {
    let now = Utc::now();

    match catalog.rooms.room_seat_stats().await {
        Ok(stats) => {
            for room in stats {
                tracing::info!(
                    room = %room.name,
                    seats = room.total_seats,
                    available = room.available,
                    occupied = room.occupied,
                    maintenance = room.maintenance,
                    "Room occupancy"
                );
            }
        }
        Err(e) => tracing::warn!(error = %e, "Room occupancy unavailable"),
    }

    match catalog.tickets.ticket_stats(now).await {
        Ok(stats) => tracing::info!(
            total = stats.total_tickets,
            sold_today = stats.sold_today,
            revenue = stats.total_revenue,
            most_popular = ?stats.most_popular,
            "Ticket sales"
        ),
        Err(e) => tracing::warn!(error = %e, "Ticket stats unavailable"),
    }

    match catalog.users.user_stats(now).await {
        Ok(stats) => tracing::info!(
            total = stats.total_users,
            workers = stats.workers,
            students = stats.students,
            active_today = stats.active_today,
            "Users"
        ),
        Err(e) => tracing::warn!(error = %e, "User stats unavailable"),
    }

    let rentals = catalog.rentals.rental_stats(now);
    tracing::info!(
        total = rentals.total_rentals,
        active = rentals.active_rentals,
        pending = rentals.pending_rentals,
        revenue_this_month = rentals.revenue_this_month,
        "Room rentals"
    );

    tracing::info!(
        upcoming_showtimes = catalog.showtimes.upcoming(now).len(),
        active_rooms = catalog.rooms.active_rooms().len(),
        "Schedule"
    );
}

/// Alternates between writes made by "another client" straight into the
/// store and writes made through the catalog.
async fn simulate_activity(store: MemoryStore, catalog: Catalog, operator_id: i64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;
    let mut round: u64 = 0;

    loop {
        interval.tick().await;
        round += 1;

        if round % 2 == 1 {
            let seats = catalog.seats.snapshot();
            let Some(seat) = seats.get((round as usize / 2) % seats.len().max(1)) else {
                continue;
            };
            let status = if seat.status == SeatStatus::Ocupado {
                SeatStatus::Disponible
            } else {
                SeatStatus::Ocupado
            };
            tracing::debug!(seat = %seat.label(), status = status.as_str(), "Simulating external write");
            if let Err(e) = store
                .update(
                    Seats::TABLE,
                    &[Filter::eq(Seats::PRIMARY_KEY, seat.id)],
                    json!({"estado_asiento": status.as_str()}),
                    &Select::all(),
                )
                .await
            {
                tracing::warn!(error = %e, "Simulated write failed");
            }
        } else {
            let Some(ticket) = catalog.tickets.snapshot().first().cloned() else {
                continue;
            };
            let sale = CreateTicketSale {
                user_id: operator_id,
                ticket_id: ticket.id,
                final_price: ticket.price_paid,
                attendance: "pendiente".to_string(),
                purchased_at: None,
            };
            if let Err(e) = catalog.ticket_sales.create(sale).await {
                tracing::warn!(error = %e, "Simulated sale failed");
            }
        }
    }
}

/// Wait for shutdown signals (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
