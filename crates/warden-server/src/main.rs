//! Headless zone server.
//!
//! Runs one zone level against an in-memory world at a fixed tick rate and takes admin
//! commands from stdin. Zones are loaded from and saved to `WARDEN_DATA`.
//!
//! Environment:
//! - `WARDEN_CONFIG` - JSON config file (default `warden.json`, missing means defaults)
//! - `WARDEN_DATA` - zone save directory (default `zones`)
//! - `TARGET_TPS` - ticks per second (default 20)

mod command;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use command::{Command, HELP, parse_command};
use eyre::WrapErr;
use tracing::{error, info, warn};
use warden_harness::MemoryHost;
use warden_sync::{Host, LevelId, ZoneConfig, ZoneLevel, ZoneRealm};
use warden_zone::{Resolution, ZoneType};

const LEVEL: LevelId = LevelId(0);

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("warden_server=info".parse()?)
                .add_directive("warden_sync=info".parse()?)
                .add_directive("warden_zone=info".parse()?),
        )
        .init();

    let config_path = std::env::var("WARDEN_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("warden.json"));
    let data_dir = std::env::var("WARDEN_DATA")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("zones"));
    let target_tps: f32 = std::env::var("TARGET_TPS")
        .ok()
        .and_then(|tps| tps.parse().ok())
        .filter(|tps: &f32| *tps > 0.0)
        .unwrap_or(20.0);

    let config = load_config(&config_path)?;
    info!(path = %config_path.display(), ?config, "config loaded");

    std::fs::create_dir_all(&data_dir)
        .wrap_err_with(|| format!("creating data directory {}", data_dir.display()))?;
    let level = ZoneLevel::load(LEVEL, config, level_path(&data_dir, LEVEL))
        .wrap_err("loading zone level")?;
    let mut realm = ZoneRealm::new(config);
    realm.insert_level(level);

    let host = MemoryHost::new();

    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
    let ctrlc_tx = cmd_tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(Command::Quit);
    })
    .wrap_err("installing ctrl-c handler")?;
    thread::spawn(move || input_thread(&cmd_tx));

    info!(tps = target_tps, data = %data_dir.display(), "zone server running, type 'help' for commands");

    let server = Server {
        realm,
        host,
        data_dir,
    };
    let uptime_ms = server.run(&cmd_rx, target_tps)?;
    server.shutdown(uptime_ms)
}

struct Server {
    realm: ZoneRealm,
    host: MemoryHost,
    data_dir: PathBuf,
}

impl Server {
    /// Tick until a quit command arrives. Returns the uptime in milliseconds.
    fn run(&self, commands: &mpsc::Receiver<Command>, target_tps: f32) -> eyre::Result<u64> {
        let target_delta = Duration::from_secs_f32(1.0 / target_tps);
        let started = Instant::now();

        loop {
            let start = Instant::now();
            while let Ok(cmd) = commands.try_recv() {
                if !self.handle(cmd)? {
                    return Ok(elapsed_ms(started));
                }
            }
            self.tick(elapsed_ms(started));

            let elapsed = start.elapsed();
            if elapsed < target_delta {
                thread::sleep(target_delta - elapsed);
            }
        }
    }

    /// Apply one console command. Returns `false` on quit.
    fn handle(&self, cmd: Command) -> eyre::Result<bool> {
        match cmd {
            Command::Quit => {
                info!("shutting down");
                return Ok(false);
            }
            Command::Save => {
                let saved = self.realm.save_all(&self.data_dir);
                info!(saved, "levels saved");
            }
            cmd => execute(self.realm.level(LEVEL)?, Host::new(&self.host), cmd),
        }
        Ok(true)
    }

    fn tick(&self, now_ms: u64) {
        for (level, tick) in self.realm.tick(Host::new(&self.host), now_ms) {
            for (auth, transition) in &tick.transitions {
                info!(%level, %auth, ?transition, "player transition");
            }
        }
    }

    /// Apply queued barrier work and save every level.
    fn shutdown(self, uptime_ms: u64) -> eyre::Result<()> {
        if let Err(error) = self.realm.level(LEVEL)?.flush(Host::new(&self.host)) {
            warn!(%error, "failed to flush barrier work before exit");
        }
        let saved = self.realm.save_all(&self.data_dir);
        info!(saved, uptime_ms, "levels saved");
        Ok(())
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Read a config file. A missing file means defaults.
fn load_config(path: &Path) -> eyre::Result<ZoneConfig> {
    if !path.exists() {
        return Ok(ZoneConfig::default());
    }
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    let config: ZoneConfig = serde_json::from_str(&text)
        .wrap_err_with(|| format!("parsing config {}", path.display()))?;
    Ok(config.validated())
}

fn level_path(dir: &Path, level: LevelId) -> PathBuf {
    dir.join(format!("{level}.json"))
}

fn input_thread(tx: &mpsc::Sender<Command>) {
    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else {
            break;
        };
        let cmd = parse_command(&line);
        let is_quit = matches!(cmd, Command::Quit);
        if tx.send(cmd).is_err() || is_quit {
            break;
        }
    }
}

/// Run one admin command against a level and log the result.
fn execute(level: &ZoneLevel, host: Host<'_>, cmd: Command) {
    match cmd {
        Command::Create { zone_type, name } => {
            let id = level.create_zone(host, zone_type, name.as_deref(), None, None);
            info!(zone = %id, %zone_type, "zone created");
        }
        Command::Expand { zone, rect } => match level.expand_zone(host, zone, rect) {
            Ok(resolution) => log_resolution("expand", resolution.as_ref()),
            Err(error) => error!(%zone, %error, "expand failed"),
        },
        Command::Shrink { zone, rect } => match level.shrink_zone(host, zone, rect) {
            Ok(resolution) => log_resolution("shrink", resolution.as_ref()),
            Err(error) => error!(%zone, %error, "shrink failed"),
        },
        Command::Delete(zone) => match level.delete_zone(host, zone) {
            Ok(()) => info!(%zone, "zone deleted"),
            Err(error) => error!(%zone, %error, "delete failed"),
        },
        Command::Split(zone) => match level.split_zone(host, zone) {
            Ok(resolution) => log_resolution("split", Some(&resolution)),
            Err(error) => error!(%zone, %error, "split failed"),
        },
        Command::Rename { zone, name } => match level.rename_zone(host, zone, &name) {
            Ok(()) => info!(%zone, %name, "zone renamed"),
            Err(error) => error!(%zone, %error, "rename failed"),
        },
        Command::Clean { center, radius } => {
            match level.force_clean_around(host, center, radius) {
                Ok(removed) => info!(?center, radius, removed, "unclaimed barriers removed"),
                Err(error) => error!(?center, radius, %error, "clean failed"),
            }
        }
        Command::List => list_zones(level),
        Command::Help => {
            for line in HELP {
                info!("  {line}");
            }
        }
        Command::Unknown(line) => {
            if !line.is_empty() {
                info!("unknown command: '{line}'. Type 'help' for commands.");
            }
        }
        Command::Save | Command::Quit => {}
    }
}

fn log_resolution(action: &str, resolution: Option<&Resolution>) {
    let Some(resolution) = resolution else {
        info!(action, "nothing changed");
        return;
    };
    info!(
        action,
        survivor = ?resolution.survivor,
        changed = resolution.changed.len(),
        removed = resolution.removed.len(),
        "zone edit applied"
    );
}

fn list_zones(level: &ZoneLevel) {
    let (ops, placements) = level.pending_work();
    info!(zones = level.store().len(), ops, placements, "zones on {}", level.id());
    for zone_type in [ZoneType::Pvp, ZoneType::Protected] {
        for zone in level.store().zones_of_type(zone_type) {
            info!(
                zone = %zone.id,
                %zone_type,
                name = %zone.name,
                tiles = zone.tiles.len(),
                bounds = ?zone.bounds(),
                "  zone"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use warden_geom::TileRect;

    use super::*;

    #[test]
    fn test_missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("warden.json")).unwrap();
        assert_eq!(config, ZoneConfig::default());
    }

    #[test]
    fn test_config_file_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.json");
        std::fs::write(&path, r#"{ "batch_size": 0, "max_edge_tiles": 500 }"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.max_edge_tiles, 500);
    }

    #[test]
    fn test_bad_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.json");
        std::fs::write(&path, "batch_size = 3").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_console_commands_edit_level() {
        let host = MemoryHost::new();
        let level = ZoneLevel::new(LEVEL, ZoneConfig::default());

        execute(&level, Host::new(&host), parse_command("create pvp Arena"));
        let id = level.store().ids_of_type(ZoneType::Pvp)[0];
        execute(&level, Host::new(&host), parse_command(&format!("expand {} 0 0 4 4", id.0)));
        execute(&level, Host::new(&host), parse_command(&format!("rename {} Pit", id.0)));

        let zone = level.store().get(id).unwrap();
        assert_eq!(zone.name, "Pit");
        assert_eq!(zone.bounds(), Some(TileRect::new(0, 0, 4, 4)));

        execute(&level, Host::new(&host), parse_command(&format!("delete {}", id.0)));
        assert!(level.store().is_empty());
    }

    #[test]
    fn test_level_path_uses_level_name() {
        assert_eq!(
            level_path(Path::new("zones"), LevelId(3)),
            PathBuf::from("zones/level-3.json")
        );
    }
}
