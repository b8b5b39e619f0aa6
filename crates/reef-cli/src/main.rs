use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use reef_core::{
    Action, Catalog, Ecosystem, Fish, FishController, Observation, School, SimConfig,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Headless reef simulation. Prints a JSON run summary on stdout.
#[derive(Parser, Debug)]
#[command(name = "reef", version, about = "Run a headless underwater ecosystem")]
struct Cli {
    /// Simulation seed. Overrides the seed in `--config`; a random one is
    /// drawn only when neither is given.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 1000)]
    frames: usize,
    #[arg(long, default_value_t = 100)]
    sample_every: usize,
    /// Initial plants, spread over the central half of the world.
    #[arg(long, default_value_t = 50)]
    plants: usize,
    #[arg(long, default_value_t = 5)]
    fish: usize,
    /// JSON file with a full `SimConfig`; missing fields take defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON file with plant and fish species tables.
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Water temperature anomaly in degrees.
    #[arg(long)]
    temperature: Option<f32>,
}

/// Steers toward food when hungry and otherwise drifts along its heading.
struct Forager;

impl FishController for Forager {
    fn act(&mut self, fish: &Fish, observation: &Observation) -> Action {
        if observation.hunger < 0.3 {
            return Action {
                direction: fish.direction,
            };
        }
        Action {
            direction: Observation::ray_direction(observation.richest_ray()),
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    let catalog = match &cli.catalog {
        Some(path) => read_json::<Catalog>(path)?,
        None => Catalog::default(),
    };
    if cli.fish > 0 && catalog.fish.is_empty() {
        bail!("--fish {} requested but the catalog has no fish types", cli.fish);
    }

    let seed = config.seed;
    let mut school = School::new(&config);
    let mut eco = Ecosystem::try_new(config, catalog).context("building the ecosystem")?;
    if let Some(t) = cli.temperature {
        eco.thermal_mut().set_temperature(t);
    }
    populate(&mut eco, &mut school, &cli, seed);
    info!(
        seed,
        nodes = eco.store().node_count(),
        fish = school.len(),
        "reef populated"
    );

    let summary = eco
        .try_run_with(cli.frames, cli.sample_every, |eco| {
            school.update(eco, &mut Forager);
        })
        .context("running the simulation")?;

    info!(
        frames = summary.frames,
        nodes = summary.final_node_count,
        grown = summary.total_grown,
        bleached = summary.total_bleached,
        fish_alive = school.len(),
        fish_deaths = school.total_deaths(),
        "run finished"
    );
    println!("{}", summary.to_json()?);
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<SimConfig> {
    let mut config = match &cli.config {
        Some(path) => read_json::<SimConfig>(path)?,
        None => SimConfig {
            seed: rand::random(),
            ..SimConfig::default()
        },
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    Ok(config)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn populate(eco: &mut Ecosystem, school: &mut School, cli: &Cli, seed: u64) {
    let mut rng = ChaCha12Rng::seed_from_u64(seed.wrapping_add(7));
    let [cx, cy] = eco.config().bounds.center();
    let half_w = eco.config().bounds.width() / 4.0;
    let half_h = eco.config().bounds.height() / 4.0;
    let species = eco.catalog().plants.len();
    let fish_types = eco.catalog().fish.len();

    let mut placed = 0;
    for _ in 0..cli.plants {
        let x = cx + rng.random_range(-half_w..=half_w);
        let y = cy + rng.random_range(-half_h..=half_h);
        if eco.add_plant(x, y, rng.random_range(0..species)).is_some() {
            placed += 1;
        }
    }
    if placed < cli.plants {
        warn!(requested = cli.plants, placed, "node capacity reached while seeding plants");
    }

    for _ in 0..cli.fish {
        let x = cx + rng.random_range(-half_w..=half_w);
        let y = cy + rng.random_range(-half_h..=half_h);
        if school
            .spawn(eco, x, y, rng.random_range(0..fish_types))
            .is_none()
        {
            warn!("node capacity reached while spawning fish");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_file(name: &str, json: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("reef-cli-{}-{name}.json", std::process::id()));
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn config_file_seed_survives_without_flag() {
        let path = config_file("seed", r#"{ "seed": 4242 }"#);
        let cli = Cli::parse_from(["reef", "--config", path.to_str().unwrap()]);
        assert_eq!(load_config(&cli).unwrap().seed, 4242);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn seed_flag_overrides_config_file() {
        let path = config_file("override", r#"{ "seed": 4242 }"#);
        let cli = Cli::parse_from(["reef", "--config", path.to_str().unwrap(), "--seed", "9"]);
        assert_eq!(load_config(&cli).unwrap().seed, 9);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn seed_flag_alone_is_used() {
        let cli = Cli::parse_from(["reef", "--seed", "11"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.seed, 11);
        assert_eq!(config.bounds, SimConfig::default().bounds);
    }

    #[test]
    fn unreadable_config_is_an_error() {
        let cli = Cli::parse_from(["reef", "--config", "/nonexistent/reef.json"]);
        assert!(load_config(&cli).is_err());
    }
}
