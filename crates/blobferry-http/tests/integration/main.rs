//! Integration tests for blobferry-http
//!
//! Uses wiremock to simulate an S3-compatible endpoint and verifies the
//! requests the adapter sends and how it interprets the replies.

mod common;

mod test_fetch;
mod test_job;
mod test_put;
mod test_stat;
