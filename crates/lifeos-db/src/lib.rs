//! Supabase (PostgREST) client for the relational store.

pub mod client;
pub mod error;
pub mod highlights;
pub mod retry;
pub mod users;
pub mod videos;

pub use client::{SupabaseClient, SupabaseConfig};
pub use error::{DbError, DbResult};
pub use retry::RetryConfig;
