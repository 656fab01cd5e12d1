use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio::signal::unix::{signal as unix_signal, SignalKind};
use tracing::{error, info, warn};

mod config;
mod error;
mod events;
mod mode;
mod services;
mod store;
mod utils;

use config::{Config, LoggingConfig};
use events::ChangeSource;
use mode::{Behavior, SwitchMethod};
use services::{
    create_capability_probe, create_device_gateway, create_keyboard_listener, create_session_monitor,
    create_window_detector, engine_channel, EngineHandle, EngineParts, EngineRuntime, EventBus,
    StatusReporter, SwitchEngine, TaskSource,
};
use store::{FileBackend, MemoryBackend, Preferences, RuleStore, SettingsBackend, SettingsStore};

#[derive(Parser, Debug)]
#[command(name = "fkey-switcher")]
#[command(about = "Переключение режима функциональных клавиш по активному приложению или жесту Fn")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "fkey.toml")]
    config: String,

    /// Режим сухого запуска (устройство и ввод эмулируются, состояние не сохраняется)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (перекрывает logging.level)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Запустить демон (по умолчанию)
    Run,
    /// Показать сохранённые правила
    Rules,
    /// Задать поведение для приложения (работающий демон применит его по SIGHUP)
    SetRule {
        /// Идентификатор приложения (класс окна в нижнем регистре)
        id: String,
        /// inferred | primary | secondary
        behavior: Behavior,
        /// Путь к исполняемому файлу
        #[arg(long, default_value = "")]
        path: PathBuf,
    },
    /// Показать режим устройства и настройки
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;
    init_tracing(&config.logging, args.log_level.as_deref())?;

    let state_path = match &config.state.path {
        Some(path) => path.clone(),
        None => FileBackend::default_path()?,
    };

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(Arc::new(config), state_path, args.dry_run).await,
        Command::Rules => {
            let rules = RuleStore::load(Arc::new(open_settings(&state_path, false)));
            if rules.is_empty() {
                println!("Правил нет ({})", state_path.display());
            }
            for rule in rules.all() {
                println!(
                    "{:<32} {:<18} {}",
                    rule.application_id,
                    rule.behavior.to_string(),
                    rule.bundle_location.display()
                );
            }
            Ok(())
        }
        Command::SetRule { id, behavior, path } => {
            let rules = RuleStore::load(Arc::new(open_settings(&state_path, args.dry_run)));
            let changed = rules.set(&id, behavior, &path)?;
            println!("{}: {}{}", id, behavior, if changed { "" } else { " (без изменений)" });
            Ok(())
        }
        Command::Status => {
            let settings = Arc::new(open_settings(&state_path, false));
            let preferences = Preferences::new(settings.clone());
            let gateway = create_device_gateway(&config, args.dry_run);

            match gateway.read() {
                Ok(mode) => println!("Режим устройства:      {}", mode),
                Err(e) => println!("Режим устройства:      недоступен ({})", e),
            }
            println!("Режим по умолчанию:    {}", preferences.default_mode());
            println!("Способ переключения:   {}", preferences.switch_method());
            println!("Включено:              {}", !preferences.is_disabled());
            println!("Правил:                {}", RuleStore::load(settings).len());

            let report = utils::permissions::check_permissions(&config);
            println!("Запись fnmode:         {}", report.fnmode_writable);
            println!("Чтение /dev/input:     {}", report.input_readable);
            Ok(())
        }
    }
}

/// В сухом запуске состояние читается с диска, но пишется только в память
fn open_settings(path: &Path, dry_run: bool) -> SettingsStore {
    let file = FileBackend::new(path);
    if dry_run {
        let document = file.read().unwrap_or_default();
        SettingsStore::open(Box::new(MemoryBackend::with_document(document)))
    } else {
        SettingsStore::open(Box::new(file))
    }
}

async fn run(config: Arc<Config>, state_path: PathBuf, dry_run: bool) -> Result<()> {
    info!("Запуск fkey-switcher v{}", env!("CARGO_PKG_VERSION"));
    if dry_run {
        warn!("Режим сухого запуска - реальные действия отключены");
    }
    info!("Файл состояния: {}", state_path.display());

    utils::permissions::check_permissions(&config);

    let settings = Arc::new(open_settings(&state_path, dry_run));
    let preferences = Preferences::new(settings.clone());
    let rules = Arc::new(RuleStore::load(settings));

    let bus = Arc::new(EventBus::new());
    let status = bus.subscribe(Arc::new(StatusReporter));

    let (handle, inbox) = engine_channel();

    let foreground = {
        let config = config.clone();
        let sender = handle.sender();
        TaskSource::new("foreground", move || {
            let detector = create_window_detector(&config, sender.clone(), dry_run);
            tokio::spawn(async move {
                if let Err(e) = detector.run().await {
                    error!("Ошибка в WindowDetector: {}", e);
                }
            })
        })
    };

    let gesture = {
        let config = config.clone();
        let sender = handle.sender();
        let max_delay = preferences.gesture_max_delay();
        TaskSource::new("gesture", move || {
            let listener = create_keyboard_listener(&config, sender.clone(), max_delay, dry_run);
            tokio::spawn(async move {
                match listener {
                    Ok(listener) => {
                        if let Err(e) = listener.run().await {
                            error!("Ошибка в KeyboardListener: {}", e);
                        }
                    }
                    Err(e) => warn!("KeyboardListener недоступен: {}", e),
                }
            })
        })
    };

    let engine = SwitchEngine::new(EngineParts {
        gateway: create_device_gateway(&config, dry_run),
        rules: rules.clone(),
        preferences,
        bus: bus.clone(),
        foreground: Box::new(foreground),
        gesture: Box::new(gesture),
    })
    .context("Не удалось прочитать режим функциональных клавиш")?;

    let probe = create_capability_probe(&config.input.device_path, dry_run);
    let runtime = EngineRuntime::new(engine, inbox, probe, config.capability.clone());
    let mut engine_task = tokio::spawn(runtime.run());

    let session_monitor = create_session_monitor(handle.sender(), dry_run);
    let session_task = tokio::spawn(async move {
        if let Err(e) = session_monitor.run().await {
            warn!("Мониторинг сессии недоступен: {}", e);
        }
    });

    info!("Все сервисы запущены");

    let mut sigterm = unix_signal(SignalKind::terminate())?;
    let mut sigusr1 = unix_signal(SignalKind::user_defined1())?;
    let mut sigusr2 = unix_signal(SignalKind::user_defined2())?;
    let mut sighup = unix_signal(SignalKind::hangup())?;

    loop {
        tokio::select! {
            result = signal::ctrl_c() => {
                if let Err(err) = result {
                    error!("Ошибка при ожидании сигнала завершения: {}", err);
                }
                info!("Получен сигнал завершения (Ctrl+C)");
                break;
            }
            _ = sigterm.recv() => {
                info!("Получен SIGTERM");
                break;
            }
            _ = sigusr1.recv() => {
                if let Err(e) = handle.toggle_enabled().await {
                    warn!("Не удалось переключить признак включения: {}", e);
                }
            }
            _ = sigusr2.recv() => {
                let result = match handle.snapshot().await {
                    Ok(state) => handle.set_switch_method(match state.switch_method {
                        SwitchMethod::WindowFollow => SwitchMethod::GlobalGesture,
                        SwitchMethod::GlobalGesture => SwitchMethod::WindowFollow,
                    }).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = result {
                    warn!("Не удалось сменить способ переключения: {}", e);
                }
            }
            _ = sighup.recv() => {
                info!("Получен SIGHUP: применяем правила и режим по умолчанию из {}", state_path.display());
                if let Err(e) = apply_stored_state(&handle, &rules, &state_path).await {
                    warn!("Не удалось применить сохранённое состояние: {}", e);
                }
            }
            result = &mut engine_task => {
                session_task.abort();
                return match result {
                    Ok(result) => result.context("Движок завершился с ошибкой"),
                    Err(e) => Err(anyhow::anyhow!("Задача движка аварийно завершилась: {}", e)),
                };
            }
        }
    }

    info!("Завершение работы...");
    session_task.abort();

    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        if let Err(e) = handle.shutdown().await {
            warn!("Ошибка при завершении движка: {}", e);
        }
        let _ = engine_task.await;
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }
    bus.unsubscribe(status);

    info!("fkey-switcher завершил работу");
    Ok(())
}

/// Передать движку правки файла состояния, сделанные другим процессом (`set-rule`)
async fn apply_stored_state(handle: &EngineHandle, live: &RuleStore, state_path: &Path) -> Result<()> {
    // копия в памяти: здесь файл только читается
    let settings = Arc::new(open_settings(state_path, true));
    let stored = RuleStore::load(settings.clone());
    let previous = live.all();
    let behavior_before = |id: &str| {
        previous
            .iter()
            .find(|rule| rule.application_id == id)
            .map(|rule| rule.behavior)
            .unwrap_or_default()
    };

    for rule in stored.all() {
        if behavior_before(&rule.application_id) != rule.behavior {
            handle
                .set_rule(rule.application_id, rule.bundle_location, rule.behavior, ChangeSource::RuleList)
                .await?;
        }
    }
    for rule in &previous {
        if stored.get(&rule.application_id).is_inferred() {
            handle
                .set_rule(
                    rule.application_id.clone(),
                    rule.bundle_location.clone(),
                    Behavior::Inferred,
                    ChangeSource::RuleList,
                )
                .await?;
        }
    }

    let default_mode = Preferences::new(settings).default_mode();
    if handle.snapshot().await?.default_mode != default_mode {
        handle.set_default_mode(default_mode).await?;
    }
    Ok(())
}

fn init_tracing(logging: &LoggingConfig, level_override: Option<&str>) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let directives = match level_override {
        Some(level) => level.to_string(),
        None => format!("{},{}", logging.level, logging.filter),
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&directives))?;

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "full" {
        registry.with(tracing_subscriber::fmt::layer()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    }

    Ok(())
}
