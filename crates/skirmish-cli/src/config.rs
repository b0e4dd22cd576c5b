use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use skirmish_core::app::{CoordinatorSettings, DEFAULT_NUM_GAMES};
use skirmish_core::domain::{DEFAULT_GAME_CONFIG, MatchId, WinCode};

#[derive(Debug, Parser)]
#[command(name = "skirmish")]
#[command(about = "Pelican/panther match orchestration")]
pub struct Cli {
    /// Record file shared by every command
    #[arg(long, env = "SKIRMISH_DB", default_value = "skirmish-db.json", global = true)]
    pub db_file: PathBuf,

    /// Root directory of the blob buckets (one subdirectory per bucket)
    #[arg(long, env = "SKIRMISH_BLOB_ROOT", default_value = "blobs", global = true)]
    pub blob_root: PathBuf,

    /// Run log; uploaded to the logfiles bucket when a match completes
    #[arg(long, default_value = "skirmish.log", global = true)]
    pub log_file: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the two agents (if needed) and a match; prints the match id
    Schedule(ScheduleArgs),
    /// Play every game of a match against in-process agents
    Run(RunArgs),
    /// Summarize recorded matches and tournaments
    Report(ReportArgs),
    /// Pick the game configuration for a day and map size
    PickConfig(PickConfigArgs),
}

#[derive(Debug, Args)]
pub struct ScheduleArgs {
    /// Pelican agent, as TEAM:TAG
    #[arg(long)]
    pub pelican: String,

    /// Panther agent, as TEAM:TAG
    #[arg(long)]
    pub panther: String,

    #[arg(long, default_value_t = DEFAULT_NUM_GAMES)]
    pub num_games: u32,

    /// Blob name of the game configuration
    #[arg(long, default_value = DEFAULT_GAME_CONFIG)]
    pub game_config: String,

    /// Reuse a match already scheduled between the same agents
    #[arg(long)]
    pub reuse_existing: bool,

    /// Put the match in a new tournament over both agents
    #[arg(long)]
    pub tournament: bool,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long, env = "MATCH_ID")]
    pub match_id: MatchId,

    #[arg(long, env = "RABBITMQ_HOST", default_value = "localhost")]
    pub broker_host: String,

    /// Play the games without writing anything to the stores
    #[arg(long, env = "NO_DB_TEST")]
    pub no_db_test: bool,

    /// Override the match's number of games
    #[arg(long, env = "NUM_GAMES")]
    pub num_games: Option<u32>,

    /// Override the match's game configuration
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<String>,

    #[arg(long, default_value = "videos")]
    pub video_dir: PathBuf,

    /// Per-call bound on agent replies; unbounded when omitted
    #[arg(long)]
    pub rpc_timeout_secs: Option<u64>,

    /// Fixed game length, instead of the config's maximum_turns
    #[arg(long)]
    pub turns: Option<u32>,

    /// Result every game ends with
    #[arg(long, default_value = "BINGO")]
    pub outcome: WinCode,
}

impl RunArgs {
    pub fn coordinator_settings(&self, log_file: &Path) -> CoordinatorSettings {
        CoordinatorSettings::default()
            .with_broker_host(&self.broker_host)
            .with_rpc_deadline(self.rpc_timeout_secs.map(Duration::from_secs))
            .with_video_dir(&self.video_dir)
            .with_log_path(log_file)
            .with_no_persistence(self.no_db_test)
            .with_num_games(self.num_games)
            .with_config(self.config_file.clone())
    }
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct PickConfigArgs {
    #[arg(long, default_value = "10x10")]
    pub map_size: String,

    /// YYYY-MM-DD; today when omitted
    #[arg(long)]
    pub day: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_become_coordinator_settings() {
        let cli = Cli::try_parse_from([
            "skirmish",
            "--log-file",
            "out/run.log",
            "run",
            "--match-id",
            "01ARZ3NDEKTSV4RRFFQ69G5FAV",
            "--num-games",
            "3",
            "--no-db-test",
            "--rpc-timeout-secs",
            "7",
        ])
        .unwrap();
        let Command::Run(args) = &cli.command else {
            panic!("expected the run command");
        };
        let settings = args.coordinator_settings(&cli.log_file);

        assert_eq!(settings.broker_host, "localhost");
        assert_eq!(settings.num_games_override, Some(3));
        assert!(settings.no_persistence);
        assert_eq!(settings.rpc_deadline, Some(Duration::from_secs(7)));
        assert_eq!(settings.log_path.as_deref(), Some(Path::new("out/run.log")));
        assert_eq!(settings.config_override, None);
        assert_eq!(args.outcome, WinCode::Bingo);
    }

    #[test]
    fn match_id_must_parse() {
        let parsed = Cli::try_parse_from(["skirmish", "run", "--match-id", "not-an-id"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn schedule_defaults() {
        let cli =
            Cli::try_parse_from(["skirmish", "schedule", "--pelican", "a:1", "--panther", "b:1"])
                .unwrap();
        let Command::Schedule(args) = cli.command else {
            panic!("expected the schedule command");
        };
        assert_eq!(args.num_games, DEFAULT_NUM_GAMES);
        assert_eq!(args.game_config, DEFAULT_GAME_CONFIG);
        assert!(!args.reuse_existing);
    }
}
