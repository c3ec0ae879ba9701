use crate::types::TimeOfDay;
use std::path::PathBuf;

pub trait Configuration: Clone + Send + Sync + 'static {
    fn password(&self) -> String;
    fn port(&self) -> String;
    fn database_url(&self) -> Option<String>;
    fn data_file(&self) -> Option<PathBuf>;
    /// Duration assumed for availability while no service is selected.
    fn default_duration_minutes(&self) -> i32;
    fn slot_menu_start(&self) -> TimeOfDay;
    fn slot_menu_end(&self) -> TimeOfDay;
    fn slot_interval_minutes(&self) -> i32;
}
