//! # Observability & Tracing
//!
//! The library only emits events; installing a subscriber is the application's job.
//! [`setup_tracing`] is the one-liner for binaries and ad-hoc debugging.
//!
//! ## What Gets Traced
//!
//! - **Requests**: every round trip runs inside a `request` span carrying `resource_type`,
//!   `method` and `path`, with `debug` events before and after.
//! - **Lifecycle outcomes**: `info` for accepted saves and destroys, `warn` for rejections
//!   (with the status and, for validation failures, the messages).
//! - **Associations**: `debug` when a fetch is skipped because the parent isn't persisted or
//!   its path can't be built.
//! - **Reconciliation**: `debug` for nested rows that could not be matched after a rejected save.
//!
//! ## Usage Examples
//!
//! ```bash
//! # Outcomes only
//! RUST_LOG=info cargo run
//!
//! # Every request and response status
//! RUST_LOG=jsonapi_orm=debug cargo run
//! ```
//!
//! With `RUST_LOG=debug` a rejected update looks like:
//!
//! ```text
//! DEBUG save:request: Sending request resource_type="User" method=Patch path="users/1"
//! DEBUG save:request: Received response status=422
//! WARN save: Save rejected with validation errors status=422 errors=name can't be blank
//! ```

/// Initializes a compact `fmt` subscriber filtered by `RUST_LOG`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false) // spans carry resource_type instead
        .compact()
        .init();
}
