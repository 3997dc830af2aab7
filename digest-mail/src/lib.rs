//! Digest email rendering and delivery.
//!
//! - [`linkify`]: raw post text to HTML with clickable links
//! - [`render`]: subject, HTML and plain-text bodies for one recipient
//! - [`transport`]: the [`MailTransport`] seam and its Resend implementation
pub mod linkify;
pub mod render;
pub mod transport;

pub use linkify::linkify;
pub use render::{DigestRenderer, EmailContent};
pub use transport::{MailError, MailTransport, ResendTransport, failure_notice, send_failure_notice};
