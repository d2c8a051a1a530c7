use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use trail_route::track::{self, Course};
use trail_route::traits::RegionCheckProvider;
use trail_route::{CancellationToken, Coordinate, RouteConstructor, RouteInput, TrailRouteConfig, TravelProfile};

#[derive(Parser)]
#[command(name = "trail-route", version, about = "Build routes inside the Busan service area")]
struct Cli {
    /// JSON configuration file (defaults target local services)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Construct a route between two places or two coordinates
    Route(RouteArgs),
    /// Summarize a GPX track log and optionally route between its ends
    Track {
        file: PathBuf,
        /// Also request a routed path from the first to the last point
        #[arg(long)]
        route: bool,
        #[arg(long, default_value = "walking")]
        profile: TravelProfile,
    },
    /// Check whether a `lat,lng` point lies inside the service region
    Check {
        #[arg(allow_hyphen_values = true)]
        point: Coordinate,
        /// Also ask the configured remote region endpoint
        #[arg(long)]
        remote: bool,
    },
}

#[derive(Args)]
struct RouteArgs {
    /// Start place name
    #[arg(long, requires = "to", conflicts_with = "start")]
    from: Option<String>,
    /// End place name
    #[arg(long, requires = "from")]
    to: Option<String>,
    /// Start coordinate as `lat,lng`
    #[arg(long, requires = "end", allow_hyphen_values = true)]
    start: Option<Coordinate>,
    /// End coordinate as `lat,lng`
    #[arg(long, requires = "start", allow_hyphen_values = true)]
    end: Option<Coordinate>,
    #[arg(long, default_value = "walking")]
    profile: TravelProfile,
    /// Overall deadline for the request in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl RouteArgs {
    fn input(&self) -> Result<RouteInput, Box<dyn Error>> {
        match (&self.from, &self.to, self.start, self.end) {
            (Some(from), Some(to), _, _) => Ok(RouteInput::Places {
                start_query: from.clone(),
                end_query: to.clone(),
                profile: self.profile,
            }),
            (_, _, Some(start), Some(end)) => Ok(RouteInput::Points {
                start,
                end,
                profile: self.profile,
            }),
            _ => Err("pass either --from/--to or --start/--end".into()),
        }
    }

    fn token(&self) -> CancellationToken {
        match self.timeout_secs {
            Some(secs) => CancellationToken::with_timeout(Duration::from_secs(secs)),
            None => CancellationToken::new(),
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn load_config(path: Option<&PathBuf>) -> Result<TrailRouteConfig, Box<dyn Error>> {
    let mut config = match path {
        Some(path) => TrailRouteConfig::from_file(path)?,
        None => TrailRouteConfig::default(),
    };
    config.apply_env();
    config.validate()?;
    Ok(config)
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(cli.config.as_ref())?;

    let output = match &cli.command {
        Command::Route(args) => {
            let constructor = RouteConstructor::from_config(&config)?;
            let result = constructor.construct_route(args.input()?, &args.token())?;
            serde_json::to_value(&result)?
        }
        Command::Track { file, route, profile } => {
            let xml = std::fs::read_to_string(file)?;
            let log = track::parse_gpx(&xml)?;
            let constructor = RouteConstructor::from_config(&config)?;
            let name = log
                .name
                .clone()
                .unwrap_or_else(|| file.display().to_string());
            let course = Course::from_track(name, log.points, constructor.region())?;
            let routed = if *route {
                let result = constructor.construct_course_route(course.points(), *profile, &CancellationToken::new())?;
                Some(serde_json::to_value(&result)?)
            } else {
                None
            };
            json!({
                "name": course.name(),
                "summary": course.summary(),
                "route": routed,
            })
        }
        Command::Check { point, remote } => {
            let region = config.region_bounds()?;
            let local = region.is_within_region(point);
            let remote = if *remote {
                let check = config
                    .remote_region_check(config.transport()?)
                    .ok_or("no region_check.base_url configured")?;
                Some(check.is_in_region(point, &CancellationToken::new())?)
            } else {
                None
            };
            json!({
                "point": point,
                "region": region.name(),
                "inside": local,
                "remote": remote,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
