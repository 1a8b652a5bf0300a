use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use trade_assist_client::api::RestClient;
use trade_assist_client::config::AppConfig;
use trade_assist_client::models::{ListItem, ListKind, MoverDirection};
use trade_assist_client::panel::{PanelState, StockInfoPanel};
use trade_assist_client::provenance::classify;
use trade_assist_client::session::{SessionClock, compute_status, refresh_cadence};
use trade_assist_client::sync::sort::SortSpec;
use trade_assist_client::sync::{DisplayState, ListSynchronizer};
use trade_assist_client::utils::{self, fmt_countdown, fmt_pct};

#[derive(Parser)]
#[command(name = "trade-assist", about = "Trading assistant client", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Top movers, optionally grown page by page
    Movers {
        /// gainers, losers or both
        #[arg(short, long, default_value = "both")]
        direction: MoverDirection,

        /// Sort as key[:asc|desc] (change, abs_change, price, symbol)
        #[arg(short, long)]
        sort: Option<SortSpec>,

        /// How many pages to load before printing
        #[arg(short, long, default_value_t = 1)]
        pages: usize,

        /// Bypass server caches
        #[arg(short, long)]
        refresh: bool,
    },

    /// List saved watchlists
    Watchlists,

    /// Snapshot of one watchlist
    Watchlist {
        id: String,

        #[arg(short, long)]
        sort: Option<SortSpec>,
    },

    /// Screener opportunity feed
    Opportunities {
        #[arg(short, long)]
        sort: Option<SortSpec>,
    },

    /// Overview, fundamentals, news and options flow for one symbol
    Stock { symbol: String },

    /// Economic calendar and upcoming holidays
    Calendar {
        /// Day to show (default: today)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        #[arg(short, long, default_value = "US")]
        region: String,
    },

    /// Current market session phase
    Session {
        /// Keep printing on every clock tick
        #[arg(short, long)]
        watch: bool,
    },

    /// Ask the assistant a question
    Ask {
        question: Vec<String>,

        #[arg(short, long, default_value = "auto")]
        mode: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "trade_assist_client=info,warn",
        1 => "trade_assist_client=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Movers {
            direction,
            sort,
            pages,
            refresh,
        } => {
            let _t = utils::Timer::start("Movers");
            let client = Arc::new(RestClient::new(&config.api, &config.lists)?);
            let mut list = ListSynchronizer::new(client, ListKind::Movers { direction }, &config.lists);
            if let Some(spec) = sort {
                list.set_sort(spec);
            }

            if refresh {
                list.refresh().await;
            } else {
                list.load().await;
            }
            for _ in 1..pages {
                if !list.load_more().await {
                    break;
                }
            }
            print_list(&format!("Movers ({})", direction), &list);
        }

        Command::Watchlists => {
            let client = RestClient::new(&config.api, &config.lists)?;
            let lists = client.watchlists().await.context("Failed to fetch watchlists")?;
            if lists.data.is_empty() {
                println!("No watchlists.");
            } else {
                println!("{} watchlists ({}):", lists.data.len(), classify(lists.meta.as_ref()).label);
                for w in &lists.data {
                    println!("  {:<12} {:<24} {} symbols", w.id, w.name, w.symbols.len());
                }
            }
        }

        Command::Watchlist { id, sort } => {
            let client = Arc::new(RestClient::new(&config.api, &config.lists)?);
            let mut list = ListSynchronizer::new(client, ListKind::Watchlist { id: id.clone() }, &config.lists);
            if let Some(spec) = sort {
                list.set_sort(spec);
            }
            list.load().await;
            print_list(&format!("Watchlist {}", id), &list);
        }

        Command::Opportunities { sort } => {
            let client = Arc::new(RestClient::new(&config.api, &config.lists)?);
            let mut list = ListSynchronizer::new(client, ListKind::Opportunities, &config.lists);
            if let Some(spec) = sort {
                list.set_sort(spec);
            }
            list.load().await;
            print_list("Opportunities", &list);
        }

        Command::Stock { symbol } => {
            let _t = utils::Timer::start("Stock insights");
            let client = Arc::new(RestClient::new(&config.api, &config.lists)?);
            let mut panel = StockInfoPanel::new(client);
            match panel.load(&symbol).await {
                PanelState::Ready(insights) => {
                    println!("─────────────────────────────────");
                    println!("  {} ({})", insights.symbol, insights.provenance().label);
                    println!("─────────────────────────────────");
                    if let Some(o) = &insights.overview {
                        println!("  Name     : {}", o.data.name.as_deref().unwrap_or("—"));
                        println!("  Sector   : {}", o.data.sector.as_deref().unwrap_or("—"));
                    }
                    if let Some(f) = &insights.fundamentals {
                        println!("  P/E      : {}", f.data.pe_ratio.map_or("—".into(), |v| format!("{:.2}", v)));
                        println!("  EPS      : {}", f.data.eps.map_or("—".into(), |v| format!("{:.2}", v)));
                    }
                    if let Some(n) = &insights.news {
                        println!("  News     : {} items", n.data.items.len());
                        for item in n.data.items.iter().take(5) {
                            println!("    · {}", item.title);
                        }
                    }
                    if let Some(o) = &insights.options {
                        println!("  Options  : {} unusual contracts", o.data.len());
                    }
                    for (part, err) in &insights.failures {
                        warn!("{} unavailable: {}", part, err);
                    }
                }
                PanelState::Empty => println!("No data for {}.", symbol),
                PanelState::Errored { message, .. } => anyhow::bail!("{}: {}", symbol, message),
                PanelState::Loading => {}
            }
        }

        Command::Calendar { date, region } => {
            let client = RestClient::new(&config.api, &config.lists)?;
            let day = date.unwrap_or_else(|| Local::now().date_naive());
            let (economic, holidays) = tokio::join!(
                client.economic_calendar(day, &region),
                client.holidays(day.year(), &region),
            );
            match economic {
                Ok(env) => println!(
                    "Economic calendar {} {} ({}):\n{}",
                    day,
                    region,
                    classify(env.meta.as_ref()).label,
                    serde_json::to_string_pretty(&env.data)?
                ),
                Err(e) => warn!("Economic calendar unavailable: {}", e),
            }
            match holidays {
                Ok(env) => println!(
                    "Holidays {}:\n{}",
                    day.year(),
                    serde_json::to_string_pretty(&env.data)?
                ),
                Err(e) => warn!("Holidays unavailable: {}", e),
            }
        }

        Command::Session { watch } => {
            let tz = config.session.tz();
            let status = compute_status(Utc::now(), tz);
            print_session(&status, &config);
            if watch {
                let period = std::time::Duration::from_secs(config.session.tick_secs.max(1));
                let clock = SessionClock::spawn(tz, period);
                let mut rx = clock.subscribe();
                info!("Watching session every {:?} (Ctrl-C to stop)", period);
                loop {
                    tokio::select! {
                        changed = rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            let status = rx.borrow_and_update().clone();
                            print_session(&status, &config);
                        }
                        _ = tokio::signal::ctrl_c() => break,
                    }
                }
            }
        }

        Command::Ask { question, mode } => {
            let question = question.join(" ");
            if question.trim().is_empty() {
                anyhow::bail!("Empty question");
            }
            let client = RestClient::new(&config.api, &config.lists)?;
            let answer = client
                .ask(&question, &mode)
                .await
                .context("Assistant request failed")?;
            match answer.data.get("answer").and_then(|v| v.as_str()) {
                Some(text) => println!("{}", text),
                None => println!("{}", serde_json::to_string_pretty(&answer.data)?),
            }
        }
    }

    Ok(())
}

fn print_session(status: &trade_assist_client::session::SessionStatus, config: &AppConfig) {
    println!(
        "{:<14} {:<28} next {} (refresh every {}s, countdown {})",
        status.label,
        status.time_text,
        status.next_transition.format("%a %H:%M %Z"),
        refresh_cadence(status.phase, &config.session).as_secs(),
        fmt_countdown(status.until)
    );
}

fn print_list<S>(title: &str, list: &ListSynchronizer<S>)
where
    S: trade_assist_client::api::ListSource + ?Sized,
{
    match list.display_state() {
        DisplayState::Loading => println!("{}: still loading", title),
        DisplayState::Empty => println!("{}: no rows", title),
        DisplayState::Errored { message, stale_rows } => {
            warn!("{} failed: {}", title, message);
            if stale_rows {
                print_rows(title, list.items(), list);
            }
        }
        DisplayState::Ready => print_rows(title, list.items(), list),
    }
}

fn print_rows<S>(title: &str, rows: &[ListItem], list: &ListSynchronizer<S>)
where
    S: trade_assist_client::api::ListSource + ?Sized,
{
    println!("─────────────────────────────────");
    println!("  {} · sort {} · {}", title, list.sort(), list.provenance().label);
    println!("─────────────────────────────────");
    for item in rows {
        println!(
            "  {:<8} {:>10} {:>9}  {}",
            item.symbol,
            item.price.map_or("—".into(), |p| format!("{:.2}", p)),
            fmt_pct(item.change_percent),
            item.name.as_deref().unwrap_or("")
        );
    }
    println!("─────────────────────────────────");
    if list.has_more() {
        println!("  {} of {} shown, more available", rows.len(), list.total_len());
    } else {
        println!("  {} rows · end of list", rows.len());
    }
}
