pub mod cli;
pub mod settings;
pub mod server;
pub mod state;
pub mod telemetry;

pub use cli::*;
pub use settings::*;
pub use server::*;
pub use state::*;
