use clap::{Parser, Subcommand};
use petkeeper_common::{FieldDomain, HostRevision, Location, OwnerIdentity, PetSpecies};
use petkeeper_kernel::{World, WorldEvent, known_revisions};
use petkeeper_persist::{IdentityResolver, KnownPlayers, PetStorage, SqlStoreConfig};
use petkeeper_pets::{PetConfig, PetContext};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "petkeeper", about = "CLI tool for petkeeper operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Service configuration file
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, supported host revisions and the active configuration
    Info,
    /// List pet species with their customizable fields
    Species,
    /// Run schema and identity migration on the configured stores
    Migrate,
    /// Print the stored record for one owner
    Show {
        /// Owner name or unique id
        #[arg(short, long)]
        owner: String,
    },
    /// Spawn and customize a pet on a simulated host
    Simulate {
        /// Host revision to boot
        #[arg(short, long, default_value = "v1_6_R3")]
        revision: HostRevision,
        /// Species to spawn
        #[arg(short, long, default_value = "skeleton")]
        species: PetSpecies,
        /// Number of ticks to run after spawning
        #[arg(short, long, default_value = "10")]
        ticks: u64,
        #[arg(short, long, default_value = "Alice")]
        owner: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = PetConfig::load(&cli.config)?;

    match cli.command {
        Commands::Info => {
            println!("petkeeper v{}", env!("CARGO_PKG_VERSION"));
            let supported: Vec<String> = petkeeper_compat::supported_revisions()
                .iter()
                .map(ToString::to_string)
                .collect();
            let bootable: Vec<String> = known_revisions().iter().map(ToString::to_string).collect();
            println!("adapters: {}", supported.join(", "));
            println!("host revisions: {}", bootable.join(", "));
            println!("commands: /{} /{}", config.command, config.admin_command());
            println!(
                "file store: {} ({})",
                enabled(config.file.enabled),
                config.file.path.display()
            );
            println!(
                "sql store: {} ({}, busy timeout {}ms)",
                enabled(config.sql.enabled),
                config.sql.path.display(),
                config.sql.busy_timeout_ms
            );
            println!(
                "identity migration: {}",
                enabled(config.migrate_legacy_identity)
            );
            println!("species: {}", PetSpecies::ALL.len());
        }
        Commands::Species => {
            for species in PetSpecies::ALL {
                let (width, height) = species.base_dimensions();
                println!(
                    "{:<14} host={:<9} id={:<3} size={:?} hitbox={width}x{height}",
                    species.display_name(),
                    species.host_name(),
                    species.registration_id(),
                    species.default_size(),
                );
                for spec in species.layout() {
                    println!(
                        "    {:<10} slot={:<2} domain={:<7} default={}",
                        spec.field, spec.slot, spec.domain, spec.default
                    );
                }
            }
        }
        Commands::Migrate => {
            let players = KnownPlayers::load(&config.players)?;
            println!("known players: {}", players.len());
            let resolver: Option<&dyn IdentityResolver> = if config.migrate_legacy_identity {
                Some(&players)
            } else {
                None
            };
            let mut storage = PetStorage::open(&config.file, &config.sql);
            let reports = storage.migrate(resolver)?;
            let json: Vec<serde_json::Value> = reports
                .into_iter()
                .map(|(backend, report)| serde_json::json!({ "backend": backend, "report": report }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
            for status in storage.status() {
                if let Some(reason) = status.degraded {
                    println!("{} store unavailable: {reason}", status.kind);
                }
            }
        }
        Commands::Show { owner } => {
            let owner = OwnerIdentity::parse(&owner);
            let mut storage = PetStorage::open(&config.file, &config.sql);
            match storage.load(&owner)? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => println!("no stored pet for {owner}"),
            }
        }
        Commands::Simulate {
            revision,
            species,
            ticks,
            owner,
        } => simulate(revision, species, ticks, owner)?,
    }

    Ok(())
}

fn enabled(flag: bool) -> &'static str {
    if flag { "enabled" } else { "disabled" }
}

/// Boot a throwaway host with stores in a temp dir, spawn one pet, push
/// every field to its maximum, then shut down and summarize what the host
/// observed.
fn simulate(revision: HostRevision, species: PetSpecies, ticks: u64, owner: String) -> anyhow::Result<()> {
    println!("Simulate: revision={revision}, species={species}, ticks={ticks}");

    let dir = tempfile::tempdir()?;
    let config = PetConfig {
        sql: SqlStoreConfig {
            enabled: true,
            ..SqlStoreConfig::default()
        },
        ..PetConfig::default()
    }
    .rooted_at(dir.path());

    let world = World::boot(&revision)?;
    let mut ctx = PetContext::start(config, world, None)?;
    println!("status: {:?}", ctx.status());

    let owner = OwnerIdentity::name(owner);
    ctx.owner_joined(owner.clone(), Location::at(glam::Vec3::new(0.0, 64.0, 0.0)));
    match ctx.create_pet(&owner, species) {
        Ok(()) => {
            for spec in species.layout() {
                let value = match spec.domain {
                    FieldDomain::Flag => 1,
                    FieldDomain::Range { max, .. } => max,
                };
                if let Err(err) = ctx.customize(&owner, spec.field, value) {
                    println!("customize {}={value}: {err}", spec.field);
                }
            }
            ctx.rename(&owner, Some(format!("{owner}'s pet")))?;
        }
        Err(err) => println!("create failed: {err}"),
    }

    for _ in 0..ticks {
        ctx.tick();
    }
    if let Some(pet) = ctx.pet(&owner) {
        let state = pet.state();
        println!(
            "pet: species={}, payload={:#x}, size={:?}, ready={}, idle sound={}",
            state.species(),
            state.payload(),
            state.size_category(),
            state.is_ready(),
            state.idle_sound()
        );
    }

    let (mut world, report) = ctx.shutdown()?;
    println!(
        "Shutdown: removed={}, failures={}, tick={}",
        report.sweep.removed,
        report.sweep.failures.len(),
        world.tick()
    );

    let mut summary: BTreeMap<&'static str, usize> = BTreeMap::new();
    for event in world.drain_events() {
        *summary.entry(event_kind(&event)).or_default() += 1;
    }
    for (kind, count) in summary {
        println!("  {kind:<16} {count}");
    }
    Ok(())
}

fn event_kind(event: &WorldEvent) -> &'static str {
    match event {
        WorldEvent::Constructed { .. } => "constructed",
        WorldEvent::Attached { .. } => "attached",
        WorldEvent::Destroyed { .. } => "destroyed",
        WorldEvent::Watched { .. } => "watched",
        WorldEvent::EquipmentChanged { .. } => "equipment",
        WorldEvent::Renamed { .. } => "renamed",
        WorldEvent::Mounted { .. } => "mounted",
        WorldEvent::Dismounted { .. } => "dismounted",
        WorldEvent::Stepped { .. } => "stepped",
    }
}
