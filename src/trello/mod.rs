pub mod attachment;
pub mod client;
pub mod requests;
pub mod types;

pub use attachment::{AttachmentContent, AttachmentOptions, AttachmentPayload, AuthAttempt};
pub use client::{append_auth, TrelloClient, TrelloError};
pub use requests::{CardPosition, CardUpdate, NewCard};
pub use types::{Method, Query, QueryValue, RequestBody, RequestOptions};
