//! Delivery of sync output to remote destinations.
//!
//! Two independent mechanisms:
//! - **SFTP**: uploads the finished artifact file to every configured server
//! - **HTTP**: posts record pages to every configured web back end, plus a
//!   connectivity probe that touches nothing else
//!
//! Every attempt is recorded in a [`DeliveryReport`]. HTTP fan-out is always
//! best-effort; SFTP follows the configured [`DeliveryPolicy`].

mod error;
pub mod http;
mod report;
pub mod sftp;

pub use error::{DeliveryError, DeliveryResult};
pub use http::{
    HttpConfig, HttpCredentials, HttpDelivery, HttpDestination, ProbeOutcome, ProbeResult,
    PROBE_PATH, SYNC_PATH,
};
pub use report::{DeliveryPolicy, DeliveryReport, DestinationOutcome, OutcomeStatus};
pub use sftp::{deliver_file, FileTransfer, HostKeyPolicy, SftpDestination, SftpTransfer};
