//! Client core for a pet-adoption community platform.
//!
//! - [`feed`] - the paginated posts feed kept consistent in memory
//! - [`api`] - HTTP client for the platform's posts endpoints
//! - [`config`] - `~/.config/petfeed/config.toml`
//! - [`util`] - CPF/CNPJ validation and URL checks

pub mod api;
pub mod config;
pub mod feed;
pub mod util;
