//! services/api/src/adapters/mod.rs
//!
//! Concrete implementations of the core service ports: PostgreSQL storage,
//! the OpenAI-backed chat and summary services, and the Mercado Pago gateway.

pub mod chat_llm;
pub mod db;
pub mod mercadopago;
pub mod summary_llm;
