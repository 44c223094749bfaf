use clap::Parser;
use client::game::{ClientGame, GameConfig};
use client::input::InputManager;
use client::network::{NetworkClient, NetworkConfig};
use client::presentation::{LogSoundSink, SoundSink};
use client::rendering::{HudState, Renderer};
use log::{error, info, warn};
use macroquad::prelude::{get_frame_time, next_frame, Conf};
use ::rand::rngs::StdRng;
use ::rand::{Rng, SeedableRng};
use shared::geometry::DEFAULT_TILE_SIZE;
use shared::{get_timestamp, sanitize_player_id, ChannelKind, StaticGeometry, TICK_RATE};
use std::path::PathBuf;

/// Longest stall the tick loop replays before skipping ahead
const MAX_CATCH_UP_MS: u64 = 250;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server base URL
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8000")]
    server: String,

    /// Player id announced to peers (random when omitted)
    #[arg(short = 'i', long, value_parser = parse_player_id)]
    player_id: Option<String>,

    /// Tile map file, one row per line with `#` for solid tiles
    #[arg(short = 'm', long)]
    map: Option<PathBuf>,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: usize,
}

/// Reduces the id to the key the server will store it under
fn parse_player_id(raw: &str) -> Result<String, String> {
    let id = sanitize_player_id(raw);
    if id.is_empty() {
        return Err(format!("'{}' leaves an empty id after its last '.' or '!'", raw));
    }
    Ok(id)
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Militia".to_string(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        ..Default::default()
    }
}

fn load_geometry(map: Option<&PathBuf>) -> Result<StaticGeometry, std::io::Error> {
    match map {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            let rows: Vec<&str> = text.lines().collect();
            Ok(StaticGeometry::from_tile_grid(
                &rows,
                DEFAULT_TILE_SIZE,
                DEFAULT_TILE_SIZE,
            ))
        }
        None => Ok(StaticGeometry::default_arena()),
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let player_id = args
        .player_id
        .unwrap_or_else(|| ::rand::thread_rng().gen_range(1000..=9999).to_string());
    let geometry = load_geometry(args.map.as_ref())?;

    info!("Starting client as player {}", player_id);
    info!("Connecting to: {}", args.server);
    info!("Controls: A/D to move, W to fly, S to drop, mouse to aim and fire, R to reload");

    let mut game = ClientGame::new(
        &player_id,
        geometry,
        GameConfig::default(),
        StdRng::from_entropy(),
    )?;
    let mut network = NetworkClient::start(NetworkConfig::new(&args.server), &player_id)?;
    let mut input = InputManager::new();
    let mut renderer = Renderer::new(args.width, args.height);
    let mut sounds = LogSoundSink;

    let tick_ms = 1000 / TICK_RATE as u64;
    let mut last_tick = get_timestamp();

    loop {
        if input.quit_requested() {
            break;
        }

        let now = get_timestamp();
        let frame = input.sample(renderer.camera());
        if now.saturating_sub(last_tick) > MAX_CATCH_UP_MS {
            last_tick = now - tick_ms;
        }
        while now.saturating_sub(last_tick) >= tick_ms {
            last_tick += tick_ms;
            let output = game.tick(&frame, network.roster(), last_tick)?;

            if let Err(e) = network.send_position(&output.position) {
                warn!("Dropped position update: {}", e);
            }
            if let Some(bullet) = &output.bullet {
                if let Err(e) = network.send_bullet(bullet) {
                    warn!("Dropped bullet spawn: {}", e);
                }
            }
            for cue in &output.sounds {
                sounds.dispatch(cue);
            }
            for event in &output.events {
                info!("{:?}", event);
            }
        }

        renderer.follow(game.local(), game.geometry());
        let remotes = network.roster().snapshot();
        let local = game.local();
        let hud = HudState {
            health: local.health,
            ammo: local.weapon.ammo,
            magazine: local.weapon.magazine,
            reloading: local.weapon.reloading,
            player_count: remotes.len() + 1,
            channels: ChannelKind::ALL
                .iter()
                .map(|kind| (*kind, network.channel_state(*kind)))
                .collect(),
        };
        renderer.render(
            game.geometry(),
            remotes.iter().chain(std::iter::once(local)),
            game.projectiles(),
            &hud,
            get_frame_time(),
        );

        next_frame().await;
    }

    network.stop();
    Ok(())
}

#[macroquad::main(window_conf)]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=debug for detailed logging");
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Args::parse()).await {
        error!("Client error: {}", e);
    }
}
