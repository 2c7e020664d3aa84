//! malsimd - HTTP front end for on-demand malaria simulations.
//!
//! Exposes `POST /api/run-simulation` and `GET /api/status` over a
//! [`malsim_core::SimulationService`].

pub mod cli;
pub mod http;

pub use cli::Cli;
pub use http::{router, AppState};
