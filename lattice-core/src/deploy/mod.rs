// Deploy Module
// Tag-gated release decisions and the upload collaborator seam

pub mod gate;
pub mod upload;

pub use gate::{DeployDecision, DeployGate, RunTrigger};
pub use upload::{DryRunUploader, GithubUploader, ReleaseUploader, UploadError, UploadRequest};
