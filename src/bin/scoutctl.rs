use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use scoutdb::canonical::Payload;
use scoutdb::{Config, Match, MatchKey, Store, Team};
use serde::Serialize;

#[derive(Parser)]
#[clap(about = "Inspect and update the scouting database")]
pub struct Cli {
    /// TOML config file.
    #[clap(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides the configured database.
    #[clap(long, global = true)]
    database_url: Option<String>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, ValueEnum)]
enum Table {
    Teams,
    Matches,
}

#[derive(Subcommand)]
enum Command {
    /// Show how a table is laid out, creating it if needed.
    Probe {
        table: Table,
        /// Ignore what is cached.
        #[clap(long, action)]
        fresh: bool,
    },
    /// Upsert a team from JSON (or `@path` to read a file).
    UpsertTeam { payload: String },
    /// Upsert a match record from JSON (or `@path` to read a file).
    UpsertMatch { payload: String },
    Team { team_number: i32 },
    Match { match_number: i32, team_number: i32 },
    Teams,
    Matches {
        #[clap(long)]
        team: Option<i32>,
    },
    /// Set a team's image reference. Clears it if no url is given.
    AttachImage {
        team_number: i32,
        url: Option<String>,
    },
}

fn read_payload(arg: &str) -> Result<Payload, Box<dyn std::error::Error>> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => arg.to_string(),
    };
    Ok(serde_json::from_str(&text)?)
}

fn print(value: &impl Serialize) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli, store: Store) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Probe { table, fresh } => {
            let info = match (table, fresh) {
                (Table::Teams, false) => store.probe::<Team>().await?,
                (Table::Teams, true) => store.reprobe::<Team>().await?,
                (Table::Matches, false) => store.probe::<Match>().await?,
                (Table::Matches, true) => store.reprobe::<Match>().await?,
            };
            println!("table: {}", info.table);
            println!("exists: {}", info.exists);
            println!("list column: {:?}", info.list_column_type);
            for column in &info.columns {
                println!("  {column}");
            }
        }
        Command::UpsertTeam { payload } => {
            let outcome = store.upsert_team(read_payload(&payload)?).await?;
            tracing::info!(
                strategy = %outcome.strategy,
                action = ?outcome.action,
                "stored team"
            );
            print(&outcome.stored)?;
        }
        Command::UpsertMatch { payload } => {
            let outcome = store.upsert_match(read_payload(&payload)?).await?;
            tracing::info!(
                strategy = %outcome.strategy,
                action = ?outcome.action,
                "stored match"
            );
            print(&outcome.stored)?;
        }
        Command::Team { team_number } => {
            print(&store.fetch_team(team_number).await?)?
        }
        Command::Match {
            match_number,
            team_number,
        } => {
            let key = MatchKey {
                match_number,
                team_number,
            };
            print(&store.fetch_match(key).await?)?
        }
        Command::Teams => print(&store.list_teams().await?)?,
        Command::Matches { team } => {
            print(&store.list_matches(team).await?)?
        }
        Command::AttachImage { team_number, url } => {
            match store.attach_team_image(team_number, url).await? {
                Some(team) => print(&team)?,
                None => return Err(format!("no team {team_number}").into()),
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(url) = cli.database_url.clone() {
        config.database_url = url;
    }

    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_max_level(config.level())
        .init();

    let result = match Store::from_config(&config) {
        Ok(store) => run(cli, store).await,
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
