mod webhook_signature;

pub use webhook_signature::{SignatureCheck, SignatureError, WebhookSignatureFactory, WebhookSignatureService};
