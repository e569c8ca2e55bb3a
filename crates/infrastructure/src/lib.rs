//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod argon2_password_hasher;
mod in_memory_cluster_client;
mod in_memory_data_store;
mod in_memory_definition_cache;
mod jwt_token_issuer;
mod kube_cluster_client;
mod postgres_data_store;
mod redis_definition_cache;

pub use argon2_password_hasher::Argon2PasswordHasher;
pub use in_memory_cluster_client::InMemoryClusterClient;
pub use in_memory_data_store::InMemoryDataStore;
pub use in_memory_definition_cache::InMemoryDefinitionCache;
pub use jwt_token_issuer::{JwtTokenIssuer, TOKEN_ISSUER};
pub use kube_cluster_client::KubeClusterClient;
pub use postgres_data_store::PostgresDataStore;
pub use redis_definition_cache::RedisDefinitionCache;
