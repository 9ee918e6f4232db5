use clap::{Parser, Subcommand};
use fleet_core::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "drones")]
#[command(about = "Medication delivery drone fleet", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new drone (always starts idle)
    Register {
        #[arg(long)]
        number: String,

        /// lightweight, middleweight, cruiserweight or heavyweight
        #[arg(long)]
        model: String,

        #[arg(long)]
        weight_limit: u32,

        #[arg(long, default_value_t = 100)]
        battery: u8,
    },

    /// Register a new medication
    AddMedication {
        #[arg(long)]
        code: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        weight: u32,
    },

    /// Load a medication onto an idle drone
    Load {
        #[arg(long)]
        drone: String,

        #[arg(long)]
        medication: String,
    },

    /// Medications loaded onto a drone
    Items { drone: String },

    /// Idle drones with enough battery to take a load
    Available,

    /// Battery level of a drone
    Battery { drone: String },

    /// Event log of a drone, newest first
    Logs { drone: String },

    /// Number of loads per drone, most first
    Amounts,

    /// Advance the fleet immediately
    Tick {
        #[arg(long, default_value_t = 1)]
        count: u32,
    },

    /// Run the periodic engine at the configured interval
    Run {
        /// Stop once at least this many ticks have completed
        #[arg(long)]
        ticks: u64,
    },

    /// Export the event log as CSV
    Export {
        #[arg(long)]
        out: PathBuf,
    },
}

type Service = DronesService<InMemoryDroneRegistry, InMemoryMedicationCatalog, JsonlEventLogStore>;

fn main() -> Result<()> {
    // Initialize logging
    fleet_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);

    // Held until the command finishes
    let _lock = FleetLock::acquire(&data_dir)?;
    let fleet = Fleet::open(&data_dir, config)?;

    if run_command(&fleet, cli.command)? {
        fleet.save()?;
    }
    Ok(())
}

/// The service over one data directory, plus where its snapshot lives
struct Fleet {
    service: Service,
    snapshot_path: PathBuf,
}

impl Fleet {
    fn open(data_dir: &Path, config: Config) -> Result<Self> {
        let snapshot_path = data_dir.join("fleet.json");
        let logs = JsonlEventLogStore::open(data_dir.join("event_log.jsonl"))?;

        let mut snapshot = FleetSnapshot::load(&snapshot_path)?;
        snapshot.roll_forward(&logs)?;
        let (registry, catalog) = snapshot.into_stores()?;

        let service =
            DronesService::new(Arc::new(registry), Arc::new(catalog), Arc::new(logs), config)?;
        Ok(Self {
            service,
            snapshot_path,
        })
    }

    fn save(&self) -> Result<()> {
        let service = &self.service;
        save_snapshot(
            service.registry(),
            service.catalog(),
            service.logs(),
            &self.snapshot_path,
        )
    }
}

fn save_snapshot(
    registry: &InMemoryDroneRegistry,
    catalog: &InMemoryMedicationCatalog,
    logs: &JsonlEventLogStore,
    path: &Path,
) -> Result<()> {
    FleetSnapshot::capture(registry, catalog, logs)?.save(path)
}

/// Execute one command; returns whether the fleet snapshot needs saving
fn run_command(fleet: &Fleet, command: Commands) -> Result<bool> {
    let service = &fleet.service;
    match command {
        Commands::Register {
            number,
            model,
            weight_limit,
            battery,
        } => {
            let drone = service.register_drone(DroneSpec {
                number,
                model: model.parse()?,
                weight_limit,
                battery_capacity: battery,
            })?;
            println!("✓ Registered drone {}", drone.number);
            print_drone(&drone);
            Ok(true)
        }

        Commands::AddMedication { code, name, weight } => {
            let medication = service.register_medication(Medication::new(code, name, weight))?;
            println!(
                "✓ Registered medication {} ({}, weight {})",
                medication.code, medication.name, medication.weight
            );
            Ok(true)
        }

        Commands::Load { drone, medication } => {
            let log = service.load_drone(&drone, &medication)?;
            println!("✓ Drone {} loaded with {}", log.drone_number, log.medication_code);
            print_log(&log);
            Ok(true)
        }

        Commands::Items { drone } => {
            for medication in service.check_medication_items(&drone)? {
                println!("{}\t{}\t{}", medication.code, medication.name, medication.weight);
            }
            Ok(false)
        }

        Commands::Available => {
            for drone in service.check_available_drones()? {
                print_drone(&drone);
            }
            Ok(false)
        }

        Commands::Battery { drone } => {
            println!("{}", service.check_battery_level(&drone)?);
            Ok(false)
        }

        Commands::Logs { drone } => {
            for log in service.check_logs(&drone)? {
                print_log(&log);
            }
            Ok(false)
        }

        Commands::Amounts => {
            for amount in service.check_drones_medication_items_amounts()? {
                println!("{}\t{}", amount.number, amount.amount);
            }
            Ok(false)
        }

        Commands::Tick { count } => {
            for _ in 0..count {
                report_tick(&service.tick());
                fleet.save()?;
            }
            println!("✓ Ran {} ticks", count);
            Ok(false)
        }

        Commands::Run { ticks } => {
            run_ticker(fleet, ticks)?;
            Ok(true)
        }

        Commands::Export { out } => {
            let count = export_logs_csv(service.logs(), &out)?;
            println!("✓ Exported {} log entries", count);
            println!("  CSV: {}", out.display());
            Ok(false)
        }
    }
}

fn run_ticker(fleet: &Fleet, ticks: u64) -> Result<()> {
    let service = &fleet.service;
    let interval = service.config().fleet.tick_interval();
    println!("Running {} ticks every {:?}...", ticks, interval);

    let (registry, catalog, logs) = service.stores();
    let path = fleet.snapshot_path.clone();
    let ticker = service.start_ticker_with(move |report| {
        report_tick(report);
        save_snapshot(&registry, &catalog, &logs, &path)
    })?;
    while ticker.completed_ticks() < ticks {
        std::thread::sleep(interval / 4);
    }
    let completed = ticker.stop();

    println!("✓ Ran {} ticks", completed);
    Ok(())
}

fn report_tick(report: &TickReport) {
    for skipped in &report.skipped {
        eprintln!("! Skipped drone {}: {}", skipped.number, skipped.reason);
    }
}

fn print_drone(drone: &Drone) {
    println!(
        "{}\t{}\t{}\t{}%\t{}",
        drone.number, drone.model, drone.weight_limit, drone.battery_capacity, drone.state
    );
}

fn print_log(log: &EventLog) {
    println!(
        "{}\t{}\t{}\t{}\t{}%\t{}",
        log.id,
        log.timestamp.to_rfc3339(),
        log.drone_number,
        log.state,
        log.battery_capacity,
        log.medication_code
    );
}
