// Domain-layer modules and shared errors/models
pub mod models {
    pub use crate::models::*;
}

pub mod validation {
    pub use crate::validation::*;
}

pub mod utm {
    pub use crate::utm::*;
}

pub mod cta {
    pub use crate::cta::*;
}

pub mod submission {
    pub use crate::submission::*;
}

pub mod errors {
    pub use crate::errors::*;
}

pub mod storage {
    pub use crate::storage::*;
}
