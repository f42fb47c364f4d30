//! cinesync-client CLI entry point.

use cinesync_client::cli::changes::ChangesAction;
use cinesync_client::cli::rows::{parse_filter, RowsAction};
use cinesync_client::cli::{Cli, Commands};
use cinesync_client::client::{RealtimeClient, RealtimeConfig, RestClient};
use cinesync_client::output;
use cinesync_core::store::{Filter, Order, Query, Select};
use clap::Parser;
use tokio_stream::{StreamExt, StreamMap};
use tracing_subscriber::EnvFilter;

fn parse_filters(args: &[String]) -> Result<Vec<Filter>, String> {
    args.iter().map(|arg| parse_filter(arg)).collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cinesync_client=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = RestClient::new(&cli.base_url, &cli.api_key)?.with_schema(&cli.schema);

    match cli.command {
        Commands::Rows(rows_cmd) => match rows_cmd.action {
            RowsAction::List {
                table,
                select,
                filters,
                order,
                limit,
            } => {
                let mut query = Query::new(&table).select(Select::columns([select]));
                for filter in parse_filters(&filters)? {
                    query = query.filter(filter);
                }
                if let Some(order) = order {
                    for key in order.split(',') {
                        query = query.order_by(key.parse::<Order>()?);
                    }
                }
                if let Some(limit) = limit {
                    query = query.limit(limit);
                }
                let rows = client.select_rows(&query).await?;
                println!("{}", output::format_rows(&table, &rows, cli.format));
            }
            RowsAction::Count { table, filters } => {
                let mut query = Query::new(&table);
                for filter in parse_filters(&filters)? {
                    query = query.filter(filter);
                }
                let count = client.count_rows(&query).await?;
                println!("{}", output::format_count(&table, count, cli.format));
            }
            RowsAction::Get { table, key, id } => {
                let row = client.get_row(&table, &key, id).await?;
                println!("{}", output::format_row(&row, cli.format));
            }
            RowsAction::Delete { table, key, id } => {
                client.delete_rows(&table, &[Filter::eq(&key, id)]).await?;
                if !cli.quiet {
                    println!("Deleted {table}.{key}={id}");
                }
            }
        },
        Commands::Changes(changes_cmd) => match changes_cmd.action {
            ChangesAction::Watch {
                tables,
                heartbeat_secs,
            } => {
                let config = RealtimeConfig {
                    heartbeat: std::time::Duration::from_secs(heartbeat_secs),
                    ..RealtimeConfig::default()
                };
                let realtime =
                    RealtimeClient::connect(client.base_url(), client.api_key(), &cli.schema, config)?;

                let mut streams = StreamMap::new();
                for table in &tables {
                    let stream = realtime.watch(table).await?;
                    streams.insert(table.clone(), Box::pin(stream));
                }
                if !cli.quiet {
                    eprintln!("Watching {}... (Ctrl+C to stop)", tables.join(", "));
                }

                loop {
                    tokio::select! {
                        next = streams.next() => match next {
                            Some((_, event)) => {
                                println!("{}", output::format_change(&event, None, cli.format));
                            }
                            None => break,
                        },
                        _ = tokio::signal::ctrl_c() => break,
                    }
                }
                realtime.shutdown();
            }
        },
    }

    Ok(())
}
