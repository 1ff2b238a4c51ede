pub mod bank;
pub mod exam;
pub mod settings;
pub mod utils;

pub use bank::run_bank_command;
pub use settings::run_settings_command;
