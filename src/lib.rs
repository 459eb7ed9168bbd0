pub mod config;
pub mod database;
pub mod errors;
pub mod logging;
pub mod models;
pub mod schedulers;
pub mod study;

pub use config::Config;
pub use database::Database;
pub use errors::*;
pub use models::*;
pub use schedulers::{
    for_deck, for_deck_with_options, list_available, resolve, RandomScheduler, Scheduler,
    SchedulerConstructor, SchedulerOptions, RANDOM_ALGORITHM,
};
pub use study::StudySession;
