use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use skirmish_core::app::{
    Buckets, MatchCoordinator, MatchRequest, PersistenceGateway, Scheduler, select_config,
    summarize, tournament_scores,
};
use skirmish_core::domain::{AgentId, Match, Role};
use skirmish_core::impls::{
    InMemoryBroker, InMemoryMatchStore, LocalBlobStore, ScriptedBoardFactory,
};
use skirmish_core::ports::{Broker, IdGenerator, Listing, MatchStore, SystemClock, UlidGenerator};
use skirmish_core::rpc::AgentServer;
use tokio_util::sync::CancellationToken;

use crate::agents;
use crate::config::{Cli, PickConfigArgs, ReportArgs, RunArgs, ScheduleArgs};

/// Records of every command live in one JSON file, loaded on start and
/// written back when the command changed something.
struct Records {
    store: Arc<InMemoryMatchStore>,
    ids: Arc<dyn IdGenerator>,
}

impl Records {
    fn open(path: &Path) -> anyhow::Result<Self> {
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(SystemClock));
        let store = Arc::new(InMemoryMatchStore::new(ids.clone(), Arc::new(SystemClock)));
        match std::fs::read_to_string(path) {
            Ok(raw) => store
                .load_json(&raw)
                .with_context(|| format!("record file {} is corrupt", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no record file yet, starting empty");
            }
            Err(e) => {
                return Err(e).with_context(|| format!("cannot read {}", path.display()));
            }
        }
        Ok(Self { store, ids })
    }

    fn save(&self, path: &Path) -> anyhow::Result<()> {
        let raw = self.store.to_json()?;
        std::fs::write(path, raw).with_context(|| format!("cannot write {}", path.display()))
    }
}

pub async fn schedule(cli: &Cli, args: &ScheduleArgs) -> anyhow::Result<()> {
    let records = Records::open(&cli.db_file)?;
    let scheduler = Scheduler::new(records.store.clone(), Arc::new(SystemClock));

    scheduler.create_agent(&args.pelican, Role::Pelican).await?;
    scheduler.create_agent(&args.panther, Role::Panther).await?;

    let mut request = MatchRequest::new(&args.pelican, &args.panther)
        .with_num_games(args.num_games)
        .with_game_config(&args.game_config);
    if args.reuse_existing {
        request = request.reuse_existing();
    }
    if args.tournament {
        let tournament = scheduler
            .create_tournament(&[args.pelican.as_str(), args.panther.as_str()])
            .await?;
        request = request.in_tournament(tournament.tournament_id);
    }
    let created = scheduler.create_match(request).await?;
    records.save(&cli.db_file)?;

    println!("{}", created.match_id);
    Ok(())
}

pub async fn run(cli: &Cli, args: &RunArgs) -> anyhow::Result<()> {
    let records = Records::open(&cli.db_file)?;
    let blobs = Arc::new(LocalBlobStore::new(&cli.blob_root));
    let broker = InMemoryBroker::new();

    // (A) agents answer on their request queues until the match is over
    let agents_done = CancellationToken::new();
    let pelican = tokio::spawn(
        AgentServer::new(shared(&broker), Role::Pelican, agents::pelican())
            .serve(agents_done.child_token()),
    );
    let panther = tokio::spawn(
        AgentServer::new(shared(&broker), Role::Panther, agents::panther())
            .serve(agents_done.child_token()),
    );

    // (B) the coordinator plays every game, Ctrl-C cancels it
    let mut boards = ScriptedBoardFactory::new(args.outcome);
    if let Some(turns) = args.turns {
        boards = boards.with_turns(turns);
    }
    let coordinator = MatchCoordinator::new(
        Arc::new(broker.clone()),
        PersistenceGateway::new(records.store.clone(), blobs),
        Arc::new(boards),
        records.ids.clone(),
        args.coordinator_settings(&cli.log_file),
    );
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling the match");
            on_signal.cancel();
        }
    });
    let outcome = coordinator.run(args.match_id, &cancel).await;

    // (C) stop the agents; games recorded before a failure are kept
    agents_done.cancel();
    for (role, handle) in [(Role::Pelican, pelican), (Role::Panther, panther)] {
        match handle.await {
            Ok(Ok(answered)) => tracing::info!(%role, answered, "agent finished"),
            Ok(Err(e)) => tracing::warn!(%role, error = %e, "agent failed"),
            Err(e) => tracing::warn!(%role, error = %e, "agent task aborted"),
        }
    }
    records.save(&cli.db_file)?;
    let report = outcome?;

    for (index, game) in report.games.iter().enumerate() {
        println!(
            "game {}: {} after {} turns",
            index + 1,
            game.result,
            game.num_turns
        );
    }
    if let Some(url) = &report.logfile_url {
        println!("logfile: {url}");
    }
    Ok(())
}

fn shared(broker: &InMemoryBroker) -> Arc<dyn Broker> {
    Arc::new(broker.clone())
}

#[derive(Debug, Serialize)]
struct MatchRow {
    match_id: String,
    pelican: String,
    panther: String,
    score: [usize; 2],
    winner: Option<String>,
    finished: bool,
    logfile_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct ScoreRow {
    tournament_id: String,
    agent: String,
    role: Role,
    wins: u32,
    played: u32,
}

pub async fn report(cli: &Cli, args: &ReportArgs) -> anyhow::Result<()> {
    let records = Records::open(&cli.db_file)?;
    let (matches, scores) = collect_report(records.store.as_ref()).await?;

    if args.json {
        let doc = serde_json::json!({ "matches": matches, "scores": scores });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }
    if matches.is_empty() {
        println!("no matches recorded");
    }
    for row in &matches {
        let state = if row.finished { "finished" } else { "pending" };
        let winner = row.winner.as_deref().unwrap_or("draw");
        println!(
            "{} {} vs {}: {}-{} ({state}, winner: {winner})",
            row.match_id, row.pelican, row.panther, row.score[0], row.score[1]
        );
    }
    for row in &scores {
        println!(
            "{} {} ({}): {}/{} games won",
            row.tournament_id, row.agent, row.role, row.wins, row.played
        );
    }
    Ok(())
}

/// Match rows and tournament standings. A failed match or tournament query is
/// an error; missing agent names only fall back to ids.
async fn collect_report(
    store: &dyn MatchStore,
) -> anyhow::Result<(Vec<MatchRow>, Vec<ScoreRow>)> {
    let names: HashMap<_, _> = store
        .list_agents()
        .await
        .or_empty("agents")
        .into_iter()
        .map(|a| (a.agent_id, (a.agent_name, a.agent_type)))
        .collect();
    let matches: Vec<MatchRow> = store
        .list_matches(None)
        .await
        .context("cannot list matches")?
        .iter()
        .map(|m| match_row(m, &names))
        .collect();

    let mut scores = Vec::new();
    let tournaments = store
        .list_tournaments()
        .await
        .context("cannot list tournaments")?;
    for tournament in tournaments {
        for score in tournament_scores(store, tournament.tournament_id).await? {
            scores.push(ScoreRow {
                tournament_id: tournament.tournament_id.to_string(),
                agent: score.agent_name,
                role: score.role,
                wins: score.wins,
                played: score.played,
            });
        }
    }
    Ok((matches, scores))
}

fn match_row(m: &Match, names: &HashMap<AgentId, (String, Role)>) -> MatchRow {
    let summary = summarize(m, names);
    MatchRow {
        match_id: summary.match_id.to_string(),
        pelican: summary.pelican,
        panther: summary.panther,
        score: [summary.pelican_score, summary.panther_score],
        winner: summary.winner,
        finished: summary.finished,
        logfile_url: m.logfile_url.clone(),
    }
}

pub async fn pick_config(cli: &Cli, args: &PickConfigArgs) -> anyhow::Result<()> {
    let blobs = LocalBlobStore::new(&cli.blob_root);
    let day = args.day.unwrap_or_else(|| chrono::Local::now().date_naive());
    let bucket = Buckets::default().config;
    let mut rng = StdRng::from_entropy();

    match select_config(&blobs, &bucket, day, &args.map_size, &mut rng).await? {
        Some(name) => println!("{name}"),
        None => anyhow::bail!(
            "no game configuration for {} in {}",
            args.map_size,
            blobs.root().join(&bucket).display()
        ),
    }
    Ok(())
}
