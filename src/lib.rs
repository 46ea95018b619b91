pub mod api;
pub mod audio;
pub mod bridge;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
#[cfg(target_os = "macos")]
pub mod macos;
pub mod store;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

use api::client::CatalogClient;
use api::models::VideoRecord;
use audio::element::MediaElement;
use audio::engine::{CatalogViews, EngineOptions, PlaybackEngine, SharedEngine, ViewTracker};
use audio::player::AudioPlayer;
use audio::queue::PersistedQueueState;
use bridge::companion::{CompanionSurface, MpvCompanion};
use bridge::presence::{ControlSurface, FilePresence, LogPresence};
use bridge::ExternalControlBridge;
use config::AppConfig;
use events::EventBus;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use store::{Favorites, History, PreferenceStore, Settings, KEY_QUEUE};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// Builds a fresh companion window each time playback is detached.
pub type CompanionFactory = Box<dyn Fn() -> Box<dyn CompanionSurface> + Send + Sync>;

/// Every long-lived service, constructed once at startup and shared by
/// reference.
pub struct AppState<E: MediaElement = AudioPlayer> {
    pub config: Arc<AppConfig>,
    pub catalog: Arc<CatalogClient>,
    pub store: PreferenceStore,
    pub events: EventBus,
    pub engine: SharedEngine<E>,
    pub bridge: ExternalControlBridge<E>,
    pub favorites: Mutex<Favorites>,
    pub history: Arc<Mutex<History>>,
    pub settings: RwLock<Settings>,
    /// Records shown by the last listing command, numbered from 1.
    pub listing: Mutex<Vec<VideoRecord>>,
    pub presence_enabled: Arc<AtomicBool>,
    pub companion_factory: CompanionFactory,
}

impl<E: MediaElement> AppState<E> {
    pub fn new(
        config: Arc<AppConfig>,
        catalog: Arc<CatalogClient>,
        store: PreferenceStore,
        element: E,
        views: Arc<dyn ViewTracker>,
        companion_factory: CompanionFactory,
    ) -> Self {
        let events = EventBus::default();
        let settings = Settings::load(&store);
        let options = EngineOptions {
            adaptive_streaming: config.adaptive_streaming,
            skip_season8_intro: settings.skip_season8_intro,
        };

        let mut engine = PlaybackEngine::new(
            element,
            catalog.locators().clone(),
            views,
            store.clone(),
            events.clone(),
            options,
        );
        if let Some(saved) = store.get::<PersistedQueueState>(KEY_QUEUE) {
            log::info!("Restoring queue of {} records", saved.records.len());
            engine.restore_queue(saved);
        }
        let engine = engine.into_shared();

        Self {
            favorites: Mutex::new(Favorites::load(&store)),
            history: Arc::new(Mutex::new(History::load(&store))),
            settings: RwLock::new(settings),
            listing: Mutex::new(Vec::new()),
            presence_enabled: Arc::new(AtomicBool::new(store.presence_enabled())),
            bridge: ExternalControlBridge::new(Arc::clone(&engine)),
            engine,
            events,
            store,
            catalog,
            config,
            companion_factory,
        }
    }

    /// History recording, presence forwarding and the progress poller.
    pub fn spawn_background_tasks(&self, surfaces: Vec<Box<dyn ControlSurface>>) -> Vec<JoinHandle<()>> {
        vec![
            store::history::spawn_history_recorder(
                self.events.subscribe(),
                Arc::clone(&self.history),
                self.store.clone(),
            ),
            bridge::presence::spawn_presence_forwarder(
                self.events.subscribe(),
                surfaces,
                self.catalog.locators().clone(),
                Arc::clone(&self.presence_enabled),
            ),
            spawn_progress_poller(Arc::clone(&self.engine)),
        ]
    }

    /// Persist the queue so the next launch can restore it.
    pub async fn save_session(&self) {
        let queue = self.engine.lock().await.persisted_queue();
        self.store.persist(KEY_QUEUE, &queue);
    }
}

/// Publishes progress and notices local end-of-stream.
pub fn spawn_progress_poller<E: MediaElement>(engine: SharedEngine<E>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PROGRESS_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            engine.lock().await.tick().await;
        }
    })
}

fn install_panic_hook() {
    // Append so the first panic survives any that follow it.
    std::panic::set_hook(Box::new(|info| {
        use std::io::Write;
        let crash_dir = AppConfig::config_dir().unwrap_or_else(|_| std::env::temp_dir());
        let crash_path = crash_dir.join("crash.log");
        let _ = std::fs::create_dir_all(&crash_dir);
        let msg = format!(
            "PANIC at {}: {}\nBacktrace:\n{}\n---\n",
            info.location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_else(|| "unknown".into()),
            info.payload()
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| info.payload().downcast_ref::<String>().map(|s| s.as_str()))
                .unwrap_or("(no message)"),
            std::backtrace::Backtrace::force_capture(),
        );
        if let Ok(mut f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&crash_path)
        {
            let _ = f.write_all(msg.as_bytes());
        }
        eprintln!("{}", msg);
    }));
}

pub fn run() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("protoplayer=info"),
    )
    .init();
    install_panic_hook();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start the async runtime: {}", e);
            return;
        }
    };
    runtime.block_on(run_app());
}

async fn run_app() {
    let config = Arc::new(AppConfig::load_or_init());

    let store = PreferenceStore::open_default().unwrap_or_else(|e| {
        log::warn!("No preference directory ({}), preferences will not survive a restart", e);
        PreferenceStore::new(std::env::temp_dir().join("protoplayer-prefs"))
    });

    let catalog = match CatalogClient::new(Arc::clone(&config)) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            log::error!("Failed to create catalog client: {}", e);
            return;
        }
    };

    let player = AudioPlayer::new(catalog.http_client().clone());
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let program = config.companion_program.clone();
    let companion_factory: CompanionFactory = Box::new(move || -> Box<dyn CompanionSurface> {
        Box::new(MpvCompanion::new(program.clone(), signal_tx.clone()))
    });

    let state = Arc::new(AppState::new(
        Arc::clone(&config),
        Arc::clone(&catalog),
        store,
        player,
        Arc::new(CatalogViews(Arc::clone(&catalog))),
        companion_factory,
    ));

    let mut surfaces: Vec<Box<dyn ControlSurface>> = vec![Box::new(LogPresence)];
    if let Some(path) = &config.presence_file {
        surfaces.push(Box::new(FilePresence::new(path)));
    }
    #[cfg(target_os = "macos")]
    surfaces.push(Box::new(macos::now_playing::NowPlayingSurface));

    let mut tasks = state.spawn_background_tasks(surfaces);
    tasks.push(state.bridge.spawn_companion_listener(signal_rx));

    // Handler tokens must outlive the shell.
    #[cfg(target_os = "macos")]
    let _media_key_tokens = {
        let (tx, rx) = mpsc::unbounded_channel();
        let tokens = macos::media_keys::register_media_key_handlers(tx);
        tasks.push(state.bridge.spawn_remote_listener(rx));
        tokens
    };

    commands::run_shell(Arc::clone(&state)).await;

    state.save_session().await;
    state.engine.lock().await.stop();
    // Give presence a moment to clear before the tasks go away.
    tokio::time::sleep(Duration::from_millis(100)).await;
    for task in tasks {
        task.abort();
    }
    log::info!("Bye");
}
