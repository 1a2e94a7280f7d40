mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod pagination;
    pub mod pool;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod media {
    pub mod images;
}
pub mod api {
    pub mod handlers;
    pub mod routes;
}
mod config;
mod constants;
mod state;

pub use authentication::*;
pub use config::*;
pub use constants::*;
pub use database::*;
pub use media::*;
pub use state::*;
