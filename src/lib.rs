//! Client core for the trading assistant: selection state, helper routing,
//! list synchronisation, drag gestures, cache provenance and the market clock.

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod gesture;
pub mod models;
pub mod panel;
pub mod provenance;
pub mod router;
pub mod session;
pub mod sync;
pub mod utils;

pub use config::AppConfig;
pub use context::{Experience, HelperContext, HelperId, SelectionStore};
pub use error::{ApiError, ApiResult};
pub use router::{HelperRouter, PresentationMode, derive_presentation_mode};
pub use sync::ListSynchronizer;
