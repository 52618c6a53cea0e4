//! Configurable web-server assembly: config in, running axum server out.
//!
//! A [`ServerConfig`] describes everything the server should do; the
//! assembler turns it into a fixed-order middleware pipeline around the
//! caller's routes and a [`WebServer`] that binds, serves and shuts down
//! cleanly. Handlers reach the assembled machinery through request
//! extensions and extractors: [`Session`], [`Render`], [`CsrfToken`],
//! [`CurrentUser`], [`ParsedBody`], [`Translator`].

pub mod config;
pub mod error;
pub mod observability;
pub mod pathmatch;
pub mod pipeline;
pub mod server;
pub mod store;

pub use config::{EnvSnapshot, ServerConfig};
pub use error::{Error, Result};
pub use pipeline::body::ParsedBody;
pub use pipeline::context::Ajax;
pub use pipeline::csrf::CsrfToken;
pub use pipeline::flash::IncomingFlash;
pub use pipeline::i18n::{Locale, Translator};
pub use pipeline::passport::CurrentUser;
pub use pipeline::session::Session;
pub use pipeline::views::Render;
pub use pipeline::{plan, Stage};
pub use server::WebServer;
pub use store::{CacheStore, InMemoryStore};
