use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use bemstd::io::{read_osm, write_osm};
use bemstd::schedule::{ParamOverrides, build_parametric_ruleset, check_timesteps_per_hour};
use bemstd::standards::{apply_standards_to_model, weather_file_for};
use bemstd::{Model, RulesConfig, StandardsData, eliminate_duplicates, eliminate_material_and_construction_duplicates};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "bemstd")]
#[command(about = "Standards rules for OpenStudio building energy models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Builds a ruleset from parametric schedule rows
    ExpandSchedule {
        /// Standards data file (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Schedule name
        #[arg(short, long)]
        name: String,

        /// Occupied period start [h]
        #[arg(long)]
        st: Option<f64>,

        /// Occupied period end [h]
        #[arg(long)]
        et: Option<f64>,

        /// Unoccupied value
        #[arg(long)]
        base: Option<f64>,

        /// Occupied value
        #[arg(long)]
        peak: Option<f64>,

        /// Timesteps per hour, must divide 60
        #[arg(short, long, default_value_t = 4)]
        timesteps: u32,

        /// Calendar year for the equivalent full load hours
        #[arg(short, long)]
        year: Option<i32>,

        /// Keep values of fractional schedules outside [0, 1]
        #[arg(long)]
        no_clamp: bool,

        /// Writes the ruleset to an OSM file instead of printing hourly values
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Merges duplicate materials and constructions
    Dedup {
        input: PathBuf,
        output: PathBuf,

        /// Only merge objects of this class
        #[arg(short, long)]
        class: Option<String>,
    },
    /// Applies standards loads, schedules and colors to all space types
    ApplySpaceTypes {
        input: PathBuf,
        output: PathBuf,

        /// Standards data file (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Building type used where a space type has none
        #[arg(short, long)]
        building_type: Option<String>,

        /// Rules configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Prints the representative weather file of a climate zone
    WeatherFile {
        climate_zone: String,

        /// Weather file used for NECB climate zones
        #[arg(long)]
        epw: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ExpandSchedule {
            data,
            name,
            st,
            et,
            base,
            peak,
            timesteps,
            year,
            no_clamp,
            out,
        } => {
            check_timesteps_per_hour(timesteps).context("Invalid --timesteps")?;
            let year = year.unwrap_or(RulesConfig::new().year);
            let data = StandardsData::load(&data)?;
            let overrides = ParamOverrides { st, et, base, peak };
            let ruleset =
                build_parametric_ruleset(&data.parametric_schedules, &name, &overrides, timesteps, !no_clamp)?;
            let eflh = ruleset.equivalent_full_load_hours(year)?;
            match out {
                Some(path) => {
                    let mut model = Model::new();
                    ruleset.to_records(&mut model)?;
                    write_osm(&path, &model)?;
                    info!("Schedule {name} saved to {}", path.display());
                    info!("{eflh:.1} equivalent full load hours in {year}");
                }
                None => {
                    for (hour, value) in ruleset.default_day.hourly_averages().iter().enumerate() {
                        println!("{hour:02}:00 {value:.4}");
                    }
                    println!("EFLH {year}: {eflh:.1}");
                }
            }
        }
        Commands::Dedup { input, output, class } => {
            let model = read_osm(&input)?;
            let (model, report) = match class {
                Some(class) => eliminate_duplicates(&model, &class)?,
                None => eliminate_material_and_construction_duplicates(&model)?,
            };
            print!("{report}");
            info!("Removed {} duplicate objects", report.len());
            write_osm(&output, &model)?;
        }
        Commands::ApplySpaceTypes {
            input,
            output,
            data,
            building_type,
            config,
        } => {
            let config = match config {
                Some(path) => RulesConfig::load(&path)?,
                None => RulesConfig::new(),
            };
            let data = StandardsData::load(&data)?;
            let mut model = read_osm(&input)?;
            let report = apply_standards_to_model(&mut model, &data, &config, building_type.as_deref())
                .with_context(|| format!("Failed to apply standards to {}", input.display()))?;
            print!("{report}");
            write_osm(&output, &model)?;
        }
        Commands::WeatherFile { climate_zone, epw } => match weather_file_for(&climate_zone, epw.as_deref()) {
            Some(file) => println!("{file}"),
            None => bail!("No weather file for climate zone {climate_zone}"),
        },
    }

    Ok(())
}
