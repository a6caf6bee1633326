#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(clippy::use_self, rust_2018_idioms)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

use std::{path::PathBuf, sync::Arc};

use clock::Clock;
use communication::{Message, SharedState};
use crossbeam_channel::Sender;
use steps::StepSource;
use store::AlarmStore;

pub mod alarm;
pub mod clock;
pub mod communication;
pub mod config;
/// walking an alarm off
pub mod dismiss;
pub mod error;
pub mod monitor;
pub mod presenter;
pub mod service;
#[cfg(feature = "sound")]
pub mod sound;
pub mod steps;
pub mod store;

/// everything the alarm service needs, cheap to clone into worker threads
#[derive(Clone)]
pub struct AppContext {
    pub store: AlarmStore,
    /// settings are reread from here every time an alarm goes off
    pub config_path: PathBuf,
    pub shared: Arc<SharedState>,
    pub sender: Sender<Message>,
    pub steps: Arc<dyn StepSource>,
    pub clock: Arc<dyn Clock>,
}

impl AppContext {
    #[must_use]
    pub fn new(
        store: AlarmStore,
        config_path: PathBuf,
        sender: Sender<Message>,
        steps: Arc<dyn StepSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            config_path,
            shared: Arc::new(SharedState::new()),
            sender,
            steps,
            clock,
        }
    }
}
