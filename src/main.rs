use std::{error::Error, fs, io, path::PathBuf, sync::Arc};

use chrono::{Datelike, NaiveTime, Timelike, Weekday};
use clap::{command, Parser, Subcommand};
use log::info;
use walking_alarm::{
    alarm::{Alarm, DaysOfWeek, Sound},
    clock::LocalClock,
    config::{Config, Theme},
    presenter::{spawn_presenter, TerminalPresenter},
    service::AlarmService,
    steps::{PedometerFile, SettingsPedometer},
    store::{AlarmList, AlarmStore},
    AppContext,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// write default settings and create the data folders
    Init {
        #[clap(long, short)]
        force: bool,
    },
    /// show every alarm with its index
    List,
    /// add an alarm, by default for today's weekday
    Add {
        #[clap(value_parser = parse_time)]
        time: NaiveTime,
        #[clap(long, short, value_parser = parse_weekday)]
        day: Vec<Weekday>,
    },
    Remove {
        index: usize,
    },
    Enable {
        index: usize,
    },
    Disable {
        index: usize,
    },
    /// turn one weekday of an alarm on, or off with --off
    Day {
        index: usize,
        #[clap(value_parser = parse_weekday)]
        day: Weekday,
        #[clap(long)]
        off: bool,
    },
    /// pick the tone an alarm plays
    Sound {
        index: usize,
        name: String,
        path: PathBuf,
    },
    /// change settings, prints them afterwards
    Settings {
        #[clap(long)]
        steps: Option<i64>,
        #[clap(long)]
        max_wait: Option<i64>,
        #[clap(long)]
        vibrate: Option<bool>,
        #[clap(long, value_parser = parse_theme)]
        theme: Option<Theme>,
        #[clap(long)]
        step_file: Option<PathBuf>,
    },
    /// record steps walked today in the pedometer file
    Walk {
        steps: u64,
    },
    /// run the alarm service in the foreground
    Run,
}

fn parse_time(time: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(time, "%H:%M").map_err(|e| format!("expected HH:MM: {e}"))
}

fn parse_weekday(day: &str) -> Result<Weekday, String> {
    day.parse().map_err(|_| format!("{day} is not a weekday"))
}

fn parse_theme(theme: &str) -> Result<Theme, String> {
    match theme.to_lowercase().as_str() {
        "dark" => Ok(Theme::Dark),
        "light" => Ok(Theme::Light),
        _ => Err(format!("unknown theme {theme}, use dark or light")),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    // initilize the logger
    simple_file_logger::init_logger!("walking_alarm").expect("couldn't initialize logger");

    let args = Args::parse();
    let config_path = Config::config_path();

    // init never reads the old settings so it can replace a broken file
    if let Some(Command::Init { force }) = args.command {
        if Config::init(&config_path, force)? {
            fs::create_dir_all(Config::sounds_path())?;
            println!("wrote {}", config_path.display());
        } else {
            println!("{} already exists, use --force to overwrite", config_path.display());
        }
        return Ok(());
    }

    let mut alarms = AlarmList::open(AlarmStore::new(Config::alarms_path()));
    let config = Config::load(&config_path)?;

    match args.command {
        Some(Command::Init { .. }) => {}
        Some(Command::List) => {
            if alarms.is_empty() {
                println!("no alarms");
            }
            for (i, alarm) in alarms.alarms().iter().enumerate() {
                println!(
                    "{i}: {} [{}] {} ({})",
                    alarm.name(&config.time_format),
                    if alarm.active { "on" } else { "off" },
                    alarm.days,
                    alarm.sound
                );
            }
        }
        Some(Command::Add { time, day }) => {
            let today = chrono::Local::now().weekday();
            let mut alarm = Alarm::new(time.hour(), time.minute(), today)
                .ok_or("invalid alarm time")?;
            if !day.is_empty() {
                alarm.days = DaysOfWeek::default();
                for day in day {
                    alarm.days.insert(day);
                }
            }
            let name = alarm.name(&config.time_format);
            if alarms.add(alarm)? {
                println!("added alarm {name}");
            } else {
                println!("an alarm at {name} already exists");
            }
        }
        Some(Command::Remove { index }) => {
            let removed = alarms.delete(index)?;
            println!("removed alarm {}", removed.name(&config.time_format));
        }
        Some(Command::Enable { index }) => alarms.set_active(index, true)?,
        Some(Command::Disable { index }) => alarms.set_active(index, false)?,
        Some(Command::Day { index, day, off }) => alarms.set_day(index, day, !off)?,
        Some(Command::Sound { index, name, path }) => {
            alarms.update_sound(index, Sound::new(name, path))?;
        }
        Some(Command::Settings {
            steps,
            max_wait,
            vibrate,
            theme,
            step_file,
        }) => {
            let mut config = config;
            if let Some(steps) = steps {
                config.steps_to_dismiss = Some(steps.into());
            }
            if let Some(max_wait) = max_wait {
                config.max_seconds_to_wait = Some(max_wait.into());
            }
            if let Some(vibrate) = vibrate {
                config.vibrate = vibrate;
            }
            if let Some(theme) = theme {
                config.theme = theme;
            }
            if step_file.is_some() {
                config.step_file = step_file;
            }
            config.save(&config_path)?;
            print!("{}", toml::to_string(&config)?);
        }
        Some(Command::Walk { steps }) => {
            let path = config.step_file.unwrap_or_else(Config::default_step_file);
            let today = PedometerFile::record(&path, chrono::Local::now().date_naive(), steps)?;
            println!("{} steps today", today.steps);
        }
        Some(Command::Run) | None => run(config_path),
    }
    Ok(())
}

fn run(config_path: PathBuf) {
    let (sender, events) = crossbeam_channel::unbounded();
    let ctx = AppContext::new(
        AlarmStore::new(Config::alarms_path()),
        config_path.clone(),
        sender,
        Arc::new(SettingsPedometer::new(config_path)),
        Arc::new(LocalClock),
    );
    let shared = ctx.shared.clone();
    let presenter =
        spawn_presenter(events, move || TerminalPresenter::new(io::stdout(), shared, true));
    info!("walking alarm running");
    println!("waiting for alarms, ctrl-c to quit");
    AlarmService::start(ctx).wait();
    if presenter.join().is_err() {
        log::error!("presenter thread panicked");
    }
}
