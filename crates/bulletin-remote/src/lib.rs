//! HTTP clients for the services Bulletin talks to: the transactional mail
//! API that delivers messages and the content platform that supplies
//! campaigns.

mod content;
mod mail;

pub mod error;

pub use content::HttpContentProvider;
pub use error::{Error, Result};
pub use mail::{HttpMailTransport, MailApiConfig};
