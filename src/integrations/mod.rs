//! External service integrations.

pub mod evolution_client {
    pub use crate::evolution_client::*;
}

pub mod evolution_models {
    pub use crate::evolution_models::*;
}

pub mod analytics {
    pub use crate::analytics::*;
}
