//! Command handlers
//!
//! Each subcommand opens the collaborators it needs (catalog, settings,
//! audio devices) and drives them to completion.

use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::audio::WavRecorder;
use crate::catalog::MediaCatalog;
use crate::cli::{Command, MediaKind};
use crate::error::SessionError;
use crate::format::{format_date, format_duration};
use crate::models::{MediaReference, MediaType, NewMediaItem};
use crate::playback::{PlaybackEngine, PlayerController};
use crate::settings::{DconfBackend, SettingsBackend, SettingsStore};

pub async fn run(command: Command, catalog_path: Option<PathBuf>) -> Result<()> {
    let catalog_path = catalog_path.unwrap_or_else(MediaCatalog::default_path);

    match command {
        Command::Record { seconds } => record(&catalog_path, seconds).await,
        Command::Import {
            path,
            kind,
            name,
            duration_ms,
        } => import(&catalog_path, &path, kind, name, duration_ms),
        Command::List { kind } => list(&catalog_path, kind),
        Command::Delete { id } => delete(&catalog_path, id),
        Command::Play { target } => play(&catalog_path, &target).await,
        Command::Volume { level } => volume(level),
    }
}

fn open_catalog(path: &Path) -> Result<MediaCatalog> {
    MediaCatalog::open(path)
        .with_context(|| format!("Failed to open catalog {:?}", path))
}

#[cfg(feature = "pipewire")]
async fn record(catalog_path: &Path, seconds: Option<u64>) -> Result<()> {
    use crate::audio::AudioCapture;
    use crate::capture::CaptureController;

    let mut catalog = open_catalog(catalog_path)?;
    let mut controller = CaptureController::new(AudioCapture::new(), &WavRecorder::new());
    let handle = controller.start_recording()?;
    println!("Recording... press Ctrl-C to stop");

    let limit = seconds.map(Duration::from_secs);
    let mut meter = tokio::time::interval(Duration::from_millis(500));
    let started = tokio::time::Instant::now();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = meter.tick() => {
                if limit.is_some_and(|limit| started.elapsed() >= limit) {
                    break;
                }
                let capture = controller.source();
                info!("{:.1}s captured, level {:.3}", capture.duration(), capture.level());
            }
        }
    }

    let reference = controller.stop_recording(&handle, &mut catalog)?;
    println!("Saved {}", reference);
    Ok(())
}

#[cfg(not(feature = "pipewire"))]
async fn record(_catalog_path: &Path, _seconds: Option<u64>) -> Result<()> {
    bail!("Recording needs PipeWire support; rebuild with --features pipewire")
}

fn import(
    catalog_path: &Path,
    path: &Path,
    kind: MediaKind,
    name: Option<String>,
    duration_ms: Option<u64>,
) -> Result<()> {
    let path = path
        .canonicalize()
        .with_context(|| format!("Cannot import {:?}", path))?;
    let media_type = MediaType::from(kind);

    let duration_ms = match (duration_ms, media_type) {
        (Some(ms), _) => ms,
        (None, MediaType::Audio) => match WavRecorder::load(&path) {
            Ok((samples, rate)) => {
                let seconds = WavRecorder::duration_seconds(samples.len(), rate);
                (seconds * 1000.0).round() as u64
            }
            Err(e) => {
                warn!("Could not read duration of {:?}: {}", path, e);
                0
            }
        },
        (None, _) => 0,
    };

    let name = name.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned())
    });

    let mut catalog = open_catalog(catalog_path)?;
    let item = NewMediaItem::new(path.to_string_lossy(), name, media_type)
        .with_duration_ms(duration_ms);
    let id = catalog.append(item)?;
    println!("Added {} #{}", media_type, id);
    Ok(())
}

fn list(catalog_path: &Path, kind: Option<MediaKind>) -> Result<()> {
    let catalog = open_catalog(catalog_path)?;
    let items = match kind {
        Some(kind) => catalog.query_by_type(kind.into()),
        None => catalog.all(),
    };

    if items.is_empty() {
        println!("No media");
        return Ok(());
    }
    for item in items {
        println!(
            "{:>4}  {:<5}  {}  {}  {}  {}",
            item.id,
            item.media_type,
            format_duration(item.duration_ms),
            format_date(&item.date),
            item.name,
            item.uri
        );
    }
    Ok(())
}

fn delete(catalog_path: &Path, id: u64) -> Result<()> {
    let mut catalog = open_catalog(catalog_path)?;
    if !catalog.delete(id)? {
        bail!("No media with id {}", id);
    }
    println!("Removed #{}", id);
    Ok(())
}

fn volume(level: Option<f32>) -> Result<()> {
    let mut settings = SettingsStore::new(DconfBackend);
    match level {
        Some(level) => {
            let applied = settings.set_volume(level)?;
            println!("Volume set to {}", applied);
        }
        None => println!("{}", settings.volume()),
    }
    Ok(())
}

/// Resolve a catalog id or a path into a playable reference
fn resolve_target(catalog: &MediaCatalog, target: &str) -> Result<MediaReference> {
    if let Ok(id) = target.parse::<u64>() {
        if let Some(item) = catalog.get(id) {
            return Ok(item.reference()?);
        }
    }
    Ok(MediaReference::new(target)?)
}

#[cfg(feature = "pipewire")]
async fn play(catalog_path: &Path, target: &str) -> Result<()> {
    use crate::audio::AudioPlayer;

    let catalog = open_catalog(catalog_path)?;
    let reference = resolve_target(&catalog, target)?;
    let mut settings = SettingsStore::new(DconfBackend);
    let controller = PlayerController::new(AudioPlayer::new(), &settings)?;

    println!("Playing {} (bg, fg, vol <0-1>, status, quit)", reference);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    run_player(controller, &mut settings, reference, stdin).await
}

#[cfg(not(feature = "pipewire"))]
async fn play(catalog_path: &Path, target: &str) -> Result<()> {
    let catalog = open_catalog(catalog_path)?;
    let reference = resolve_target(&catalog, target)?;
    bail!("Cannot play {}: rebuild with --features pipewire for audio output", reference)
}

/// A line typed at the player prompt
#[cfg_attr(not(feature = "pipewire"), allow(dead_code))]
#[derive(Debug, Clone, PartialEq)]
enum PlayerCommand {
    Background,
    Foreground,
    Volume(f32),
    Status,
    Quit,
}

#[cfg_attr(not(feature = "pipewire"), allow(dead_code))]
impl PlayerCommand {
    fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let command = match words.next()? {
            "bg" | "background" => Self::Background,
            "fg" | "foreground" => Self::Foreground,
            "vol" | "volume" => Self::Volume(words.next()?.parse().ok()?),
            "status" => Self::Status,
            "q" | "quit" => Self::Quit,
            _ => return None,
        };
        Some(command)
    }
}

/// Non-fatal session errors are reported and playback continues
#[cfg_attr(not(feature = "pipewire"), allow(dead_code))]
fn report(result: Result<(), SessionError>) -> Result<()> {
    match result {
        Err(SessionError::SessionClosed) => Err(SessionError::SessionClosed.into()),
        Err(e) => {
            eprintln!("{}", e);
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}

/// Play `reference` and follow lifecycle commands from `input` until the
/// stream ends, `quit` is entered or Ctrl-C is pressed.
#[cfg_attr(not(feature = "pipewire"), allow(dead_code))]
async fn run_player<E, B, R>(
    mut controller: PlayerController<E>,
    settings: &mut SettingsStore<B>,
    reference: MediaReference,
    input: R,
) -> Result<()>
where
    E: PlaybackEngine,
    B: SettingsBackend,
    R: AsyncBufRead + Unpin,
{
    controller.play(reference)?;

    let mut lines = input.lines();
    let mut input_open = true;
    let mut tick = tokio::time::interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            line = lines.next_line(), if input_open => {
                let Some(line) = line? else {
                    input_open = false;
                    continue;
                };
                match PlayerCommand::parse(&line) {
                    Some(PlayerCommand::Background) => report(controller.on_background())?,
                    Some(PlayerCommand::Foreground) => report(controller.on_foreground())?,
                    Some(PlayerCommand::Volume(level)) => {
                        let applied = controller.set_volume(settings, level)?;
                        report(controller.sync_volume().map(|_| ()))?;
                        println!("Volume {}", applied);
                    }
                    Some(PlayerCommand::Status) => println!("{:?}", controller.state()),
                    Some(PlayerCommand::Quit) => break,
                    None if line.trim().is_empty() => {}
                    None => eprintln!("Unknown command: {}", line.trim()),
                }
            }
            _ = tick.tick() => {
                if let Some(fault) = controller.take_engine_fault() {
                    report(Err(fault))?;
                }
                report(controller.sync_volume().map(|_| ()))?;
                if controller.is_finished() {
                    info!("End of stream");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    controller.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::session::tests::{Call, FakeEngine};
    use crate::settings::MemoryBackend;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_parse_player_commands() {
        assert_eq!(PlayerCommand::parse("bg"), Some(PlayerCommand::Background));
        assert_eq!(PlayerCommand::parse(" foreground "), Some(PlayerCommand::Foreground));
        assert_eq!(PlayerCommand::parse("vol 0.25"), Some(PlayerCommand::Volume(0.25)));
        assert_eq!(PlayerCommand::parse("vol"), None);
        assert_eq!(PlayerCommand::parse("vol loud"), None);
        assert_eq!(PlayerCommand::parse("quit"), Some(PlayerCommand::Quit));
        assert_eq!(PlayerCommand::parse("dance"), None);
    }

    #[tokio::test]
    async fn test_player_follows_lifecycle_commands() {
        let mut settings = SettingsStore::new(MemoryBackend::default());
        let (engine, calls) = FakeEngine::new();
        let controller = PlayerController::new(engine, &settings).unwrap();
        let input: &[u8] = b"bg\nbg\nfg\nvol 2\nstatus\nquit\n";

        run_player(
            controller,
            &mut settings,
            MediaReference::new("ref-1").unwrap(),
            input,
        )
        .await
        .unwrap();

        assert_eq!(
            *calls.borrow(),
            vec![
                Call::Volume(0.5),
                Call::Prepare("ref-1".to_string()),
                Call::Play,
                Call::Pause,
                Call::Play,
                Call::Volume(1.0),
                Call::Release,
            ]
        );
        assert_eq!(settings.volume().get(), 1.0);
    }

    #[tokio::test]
    async fn test_engine_fault_pauses_and_player_keeps_running() {
        let mut settings = SettingsStore::new(MemoryBackend::default());
        let (engine, calls) = FakeEngine::new();
        let fault = engine.fault.clone();
        *fault.borrow_mut() = Some("Failed to connect to PipeWire".to_string());
        let controller = PlayerController::new(engine, &settings).unwrap();
        let (reader, mut writer) = tokio::io::duplex(64);

        let player = run_player(
            controller,
            &mut settings,
            MediaReference::new("ref-1").unwrap(),
            tokio::io::BufReader::new(reader),
        );
        let commands = async {
            // Let a few ticks pass so the fault is picked up first
            tokio::time::sleep(Duration::from_millis(600)).await;
            writer.write_all(b"bg\nfg\nquit\n").await.unwrap();
        };
        let (result, ()) = tokio::join!(player, commands);

        result.unwrap();
        assert!(fault.borrow().is_none());
        // Paused by the fault, so neither bg nor fg touch the engine
        assert_eq!(
            *calls.borrow(),
            vec![
                Call::Volume(0.5),
                Call::Prepare("ref-1".to_string()),
                Call::Play,
                Call::Release,
            ]
        );
    }

    #[tokio::test]
    async fn test_unplayable_reference_releases_engine() {
        let mut settings = SettingsStore::new(MemoryBackend::default());
        let (engine, calls) = FakeEngine::rejecting("bad-ref");
        let controller = PlayerController::new(engine, &settings).unwrap();
        let input: &[u8] = b"quit\n";

        let result = run_player(
            controller,
            &mut settings,
            MediaReference::new("bad-ref").unwrap(),
            input,
        )
        .await;

        assert!(result.is_err());
        // Controller dropped on the error path still releases once
        let releases = calls
            .borrow()
            .iter()
            .filter(|c| **c == Call::Release)
            .count();
        assert_eq!(releases, 1);
    }

    #[test]
    fn test_resolve_target_prefers_catalog_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MediaCatalog::open(dir.path().join("catalog.json")).unwrap();
        let id = catalog
            .append(NewMediaItem::new("/music/a.wav", "A", MediaType::Audio))
            .unwrap();

        let by_id = resolve_target(&catalog, &id.to_string()).unwrap();
        assert_eq!(by_id.as_str(), "/music/a.wav");

        let by_path = resolve_target(&catalog, "/music/b.wav").unwrap();
        assert_eq!(by_path.as_str(), "/music/b.wav");

        assert!(resolve_target(&catalog, "  ").is_err());
    }

    #[test]
    fn test_import_reads_wav_duration() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_path = dir.path().join("catalog.json");
        let recorder = WavRecorder::new()
            .with_recordings_dir(dir.path())
            .with_sample_rate(8000);
        let wav = recorder.save(&vec![0.0; 12000]).unwrap();

        import(&catalog_path, &wav, MediaKind::Audio, None, None).unwrap();
        import(
            &catalog_path,
            &wav,
            MediaKind::Video,
            Some("clip".to_string()),
            Some(42),
        )
        .unwrap();

        let catalog = MediaCatalog::open(&catalog_path).unwrap();
        let audio = catalog.query_by_type(MediaType::Audio);
        assert_eq!(audio[0].duration_ms, 1500);
        let video = catalog.query_by_type(MediaType::Video);
        assert_eq!((video[0].name.as_str(), video[0].duration_ms), ("clip", 42));
    }

    #[test]
    fn test_import_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = import(
            &dir.path().join("catalog.json"),
            &dir.path().join("nope.jpg"),
            MediaKind::Image,
            None,
            None,
        );
        assert!(result.is_err());
    }
}
