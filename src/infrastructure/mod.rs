mod database;
pub mod metrics;
mod qr;
mod selfie;

// Re-export the factory functions for easy access
pub use database::{
    create_pg_pool, create_postgres_stores, init_database, init_database_with_retry_from_env,
};
pub use metrics::{create_noop_metrics, create_prom_metrics};
pub use qr::create_qr_token_issuer;
pub use selfie::{create_noop_selfie_verifier, create_reference_selfie_verifier};
