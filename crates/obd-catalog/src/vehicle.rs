//! Optional vehicle attributes attached to a request.

use serde::{Deserialize, Serialize};

/// Best-effort vehicle description. Every field is optional and an empty
/// context is a valid state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleContext {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<u16>,
    pub engine: Option<String>,
}

impl VehicleContext {
    pub fn is_empty(&self) -> bool {
        self.make.is_none() && self.model.is_none() && self.year.is_none() && self.engine.is_none()
    }

    /// Single-line description, e.g. `Toyota Corolla 2015 1.6L`.
    pub fn summary(&self) -> String {
        let year = self.year.map(|y| y.to_string());
        [
            self.make.as_deref(),
            self.model.as_deref(),
            year.as_deref(),
            self.engine.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
    }
}
