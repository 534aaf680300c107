use crate::backend::{MediaResolver, NullBackend, PlaybackBackend, RodioBackend};
use crate::cache::{CachePolicy, HttpFetcher, OfflineCache};
use crate::config;
use crate::model::{MediaTable, Settings};
use crate::sequencer::{Sequencer, SequencerPolicy};
use crate::theme::ThemeStore;
use crate::ui::{self, ShellView};
use crate::view::{self, Control};
use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::fs::OpenOptions;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const BUSY_FLASH: Duration = Duration::from_secs(1);
const REDRAW_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Default, Clone)]
pub struct AppStartupOptions {
    pub config_dir: Option<PathBuf>,
    pub media_dir: Option<PathBuf>,
}

/// Everything a session is built from. Restarting builds a fresh backend
/// and sequencer from the same parts.
struct SessionParts {
    table: MediaTable,
    settings: Settings,
    policy: SequencerPolicy,
    media_dir: Option<PathBuf>,
    cache_root: PathBuf,
}

impl SessionParts {
    fn start(&self) -> Sequencer<Box<dyn PlaybackBackend>> {
        let backend = build_backend(build_resolver(
            &self.settings,
            &self.cache_root,
            self.media_dir.clone(),
        ));
        info!("starting session with {}", backend.name());
        Sequencer::new(self.table.clone(), backend, self.policy)
    }

    fn shell(&self) -> Shell {
        let mut shell = Shell::new();
        if let Some(status) = missing_media_source(self.media_dir.as_deref(), &self.settings) {
            warn!("{status}: set media_dir or media_base_url in settings.json");
            shell.set_status(status);
        }
        shell
    }
}

/// Status shown when no entry can ever resolve to audio.
fn missing_media_source(media_dir: Option<&Path>, settings: &Settings) -> Option<&'static str> {
    (media_dir.is_none() && settings.media_base_url.is_none())
        .then_some("No media source configured (use --media-dir)")
}

pub fn run_with_startup(options: AppStartupOptions) -> Result<()> {
    let root = startup_root(&options)?;
    init_logging(&root)?;

    let settings = config::load_settings(&root)?;
    let table = config::load_table(&root)?;
    let mut theme = ThemeStore::load(&config::preferences_path(&root));
    let parts = SessionParts {
        policy: SequencerPolicy::from(&settings),
        media_dir: options.media_dir.clone().or_else(|| settings.media_dir.clone()),
        cache_root: config::cache_root(&root),
        table,
        settings,
    };
    let mut sequencer = parts.start();

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut shell = parts.shell();
    let mut last_draw = Instant::now();

    let result: Result<()> = loop {
        let now = Instant::now();
        sequencer.pump_backend();
        sequencer.tick(now);
        shell.expire_busy(now);

        if sequencer.take_completion() {
            info!("playlist complete");
            shell.set_status("Nitnem complete");
        }
        if sequencer.take_dirty() {
            shell.follow(sequencer.current_index());
        }

        if shell.dirty || last_draw.elapsed() > REDRAW_INTERVAL {
            let playlist = view::project(&sequencer);
            let shell_view = ShellView {
                theme: theme.theme(),
                cursor: shell.cursor,
                status: &shell.status,
                busy: shell.busy_control(),
                backend_name: sequencer.backend().name(),
            };
            terminal.draw(|frame| ui::draw(frame, &playlist, &shell_view))?;
            shell.dirty = false;
            last_draw = Instant::now();
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        let Some(action) = action_for_key(key.code, key.modifiers) else {
            continue;
        };

        match apply_action(&mut shell, &mut sequencer, &mut theme, action, Instant::now()) {
            Flow::Continue => {}
            Flow::Quit => break Ok(()),
            Flow::Restart => {
                info!("restarting session");
                drop(sequencer);
                sequencer = parts.start();
                shell = parts.shell();
            }
            Flow::Copy(text) => match copy_to_clipboard(&text) {
                Ok(()) => shell.set_status(format!("Copied {text}")),
                Err(err) => {
                    warn!("clipboard copy failed: {err:#}");
                    shell.set_status(format!("clipboard error: {err:#}"));
                }
            },
        }
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

/// Fills the offline cache with the precache list and every remote media
/// url, then drops stale cache generations.
pub fn run_precache(options: AppStartupOptions) -> Result<()> {
    let root = startup_root(&options)?;
    init_logging(&root)?;

    let settings = config::load_settings(&root)?;
    let table = config::load_table(&root)?;
    let cache_root = config::cache_root(&root);

    let mut policy = CachePolicy::from(&settings);
    let resolver = build_resolver(&settings, &cache_root, None);
    policy.precache.extend(
        table
            .entries()
            .iter()
            .filter_map(|entry| resolver.media_url(&entry.id)),
    );

    let cache = OfflineCache::new(&cache_root, policy);
    let fetcher = HttpFetcher::default();
    let stored = cache
        .install(&fetcher)
        .with_context(|| format!("failed to install cache {}", cache.policy().generation))?;
    let removed = cache.activate().context("failed to activate cache")?;

    println!(
        "Cached {stored} resources into {} ({} old caches removed)",
        cache.policy().generation,
        removed.len()
    );
    Ok(())
}

fn startup_root(options: &AppStartupOptions) -> Result<PathBuf> {
    let root = match &options.config_dir {
        Some(dir) => config::normalize_path(dir),
        None => config::config_root()?,
    };
    config::ensure_config_dir(&root)?;
    Ok(root)
}

fn init_logging(root: &Path) -> Result<()> {
    let path = config::log_path(root);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .try_init()
        .context("failed to initialise logging")?;
    Ok(())
}

fn build_resolver(settings: &Settings, cache_root: &Path, media_dir: Option<PathBuf>) -> MediaResolver {
    let resolver = MediaResolver::new(media_dir);
    match &settings.media_base_url {
        Some(base_url) => resolver.with_remote(
            base_url,
            OfflineCache::new(cache_root, CachePolicy::from(settings)),
            HttpFetcher::default(),
        ),
        None => resolver,
    }
}

fn build_backend(resolver: MediaResolver) -> Box<dyn PlaybackBackend> {
    match RodioBackend::new(resolver) {
        Ok(backend) => Box::new(backend),
        Err(err) => {
            warn!("audio output unavailable, continuing silently: {err}");
            Box::new(NullBackend::new())
        }
    }
}

fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new().context("clipboard unavailable")?;
    clipboard
        .set_text(text.to_string())
        .context("failed to set clipboard text")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Play,
    Stop,
    Previous,
    Next,
    CursorUp,
    CursorDown,
    SelectCursor,
    ToggleTheme,
    CopySource,
    Restart,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
    Restart,
    Copy(String),
}

pub fn action_for_key(code: KeyCode, modifiers: KeyModifiers) -> Option<Action> {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('p') => Some(Action::Play),
        KeyCode::Char('s') => Some(Action::Stop),
        KeyCode::Left | KeyCode::Char('h') => Some(Action::Previous),
        KeyCode::Right | KeyCode::Char('l') => Some(Action::Next),
        KeyCode::Up => Some(Action::CursorUp),
        KeyCode::Down => Some(Action::CursorDown),
        KeyCode::Enter => Some(Action::SelectCursor),
        KeyCode::Char('t') => Some(Action::ToggleTheme),
        KeyCode::Char('y') => Some(Action::CopySource),
        KeyCode::Char('r') => Some(Action::Restart),
        _ => None,
    }
}

/// Terminal-side state that is not owned by the sequencer.
#[derive(Debug)]
pub struct Shell {
    pub cursor: usize,
    pub status: String,
    pub dirty: bool,
    busy: Option<(Control, Instant)>,
    last_index: usize,
}

impl Shell {
    pub fn new() -> Self {
        Self {
            cursor: 0,
            status: String::from("Press p to begin"),
            dirty: true,
            busy: None,
            last_index: 0,
        }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        self.dirty = true;
    }

    pub fn busy_control(&self) -> Option<Control> {
        self.busy.map(|(control, _)| control)
    }

    /// Moves the cursor onto the active row whenever the active row changes.
    pub fn follow(&mut self, current_index: usize) {
        if current_index != self.last_index {
            self.cursor = current_index;
            self.last_index = current_index;
        }
        self.dirty = true;
    }

    pub fn expire_busy(&mut self, now: Instant) {
        if let Some((_, since)) = self.busy
            && now.duration_since(since) >= BUSY_FLASH
        {
            self.busy = None;
            self.dirty = true;
        }
    }

    fn flash(&mut self, control: Control, now: Instant) {
        self.busy = Some((control, now));
        self.dirty = true;
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies one key action. Transport actions are ignored while their
/// control is disabled in the current projection.
pub fn apply_action<B: PlaybackBackend>(
    shell: &mut Shell,
    sequencer: &mut Sequencer<B>,
    theme: &mut ThemeStore,
    action: Action,
    now: Instant,
) -> Flow {
    let playlist = view::project(sequencer);

    let transport = match action {
        Action::Play => Some(Control::Play),
        Action::Stop => Some(Control::Stop),
        Action::Previous => Some(Control::Previous),
        Action::Next => Some(Control::Next),
        _ => None,
    };
    if let Some(control) = transport {
        if !playlist.controls.is_enabled(control) {
            return Flow::Continue;
        }
        shell.flash(control, now);
    }

    match action {
        Action::Play => {
            sequencer.play_sequence();
            shell.set_status(format!("Playing {}", sequencer.current_entry().title));
        }
        Action::Stop => {
            sequencer.stop_playback();
            shell.set_status("Stopped");
        }
        Action::Previous => sequencer.previous_video(),
        Action::Next => sequencer.next_video(),
        Action::CursorUp => {
            shell.cursor = shell.cursor.saturating_sub(1);
            shell.dirty = true;
        }
        Action::CursorDown => {
            shell.cursor = (shell.cursor + 1).min(sequencer.table().last_index());
            shell.dirty = true;
        }
        Action::SelectCursor => sequencer.select(shell.cursor),
        Action::ToggleTheme => match theme.toggle() {
            Ok(next) => shell.set_status(format!("Theme: {}", next.label())),
            Err(err) => {
                warn!("failed to save theme: {err:#}");
                shell.set_status(format!("theme error: {err:#}"));
            }
        },
        Action::CopySource => {
            if let Some(entry) = sequencer.table().get(shell.cursor) {
                return Flow::Copy(entry.source.clone());
            }
        }
        Action::Restart => {
            if playlist.complete {
                return Flow::Restart;
            }
        }
        Action::Quit => return Flow::Quit,
    }

    Flow::Continue
}
