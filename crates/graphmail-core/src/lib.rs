//! # graphmail-core
//!
//! Send mail through Microsoft Graph with OAuth2 tokens managed by
//! `graphmail-oauth`.
//!
//! This crate provides:
//! - Configuration from builders or `GRAPHMAIL_*` environment variables
//! - Outbound message model with attachments and sender override
//! - Graph `sendMail` client
//! - `{{key}}` template rendering
//! - **Email facade** - plain, HTML, templated and bulk sends with
//!   transparent token refresh
//!
//! ```ignore
//! use graphmail_core::{Config, EmailService};
//!
//! let service = EmailService::new(Config::from_env()?).await?;
//! service
//!     .send_html_email("ann@contoso.com", "Welcome", "<p>Hello</p>")
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod error;
pub mod graph;
pub mod message;
pub mod service;
pub mod template;

pub use config::Config;
pub use error::{Error, Result};
pub use graph::{DEFAULT_GRAPH_BASE_URL, GraphClient};
pub use message::{Attachment, OutgoingMessage, Sender};
pub use service::{BulkSendReport, EmailService};
pub use template::render_template;

pub use graphmail_oauth::{AuthorizationRequest, GrantType, RedirectParams, TokenInfo, TokenStoreKind};
