use crate::{
    availability::DEFAULT_DURATION_MINUTES, configuration::Configuration, types::TimeOfDay,
};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "salon_booking", version, about = "Appointment booking for a beauty salon")]
pub struct ConfigurationHandler {
    /// Password expected in the `x-admin-password` header of admin requests
    #[arg(long, env = "SALON_PASSWORD", default_value = "123")]
    password: String,

    #[arg(short, long, env = "SALON_PORT", default_value = "3000")]
    port: String,

    /// PostgreSQL connection. Without it appointments stay in memory
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// JSON snapshot used by the in-memory store
    #[arg(long, env = "SALON_DATA_FILE")]
    data_file: Option<PathBuf>,

    /// Minutes assumed for availability while no service is selected
    #[arg(long, env = "SALON_DEFAULT_DURATION", default_value_t = DEFAULT_DURATION_MINUTES,
          value_parser = clap::value_parser!(i32).range(1..))]
    default_duration: i32,

    #[arg(long, env = "SALON_FIRST_SLOT", default_value = "09:00")]
    first_slot: TimeOfDay,

    #[arg(long, env = "SALON_LAST_SLOT", default_value = "18:00")]
    last_slot: TimeOfDay,

    #[arg(long, env = "SALON_SLOT_INTERVAL", default_value_t = 30,
          value_parser = clap::value_parser!(i32).range(1..))]
    slot_interval: i32,
}

impl ConfigurationHandler {
    pub fn parse_arguments() -> Self {
        Self::parse()
    }
}

impl Configuration for ConfigurationHandler {
    fn password(&self) -> String {
        self.password.clone()
    }

    fn port(&self) -> String {
        self.port.clone()
    }

    fn database_url(&self) -> Option<String> {
        self.database_url.clone()
    }

    fn data_file(&self) -> Option<PathBuf> {
        self.data_file.clone()
    }

    fn default_duration_minutes(&self) -> i32 {
        self.default_duration
    }

    fn slot_menu_start(&self) -> TimeOfDay {
        self.first_slot
    }

    fn slot_menu_end(&self) -> TimeOfDay {
        self.last_slot
    }

    fn slot_interval_minutes(&self) -> i32 {
        self.slot_interval
    }
}
