//! Vehicle Catalog
//!
//! The universe of known vehicle codes and the subset the backend can answer
//! questions about right now.
//!
//! # Design Philosophy
//!
//! The catalog degrades instead of failing. It starts out as the built-in list
//! of supported models, is replaced once by whatever the backend reports, and
//! keeps its previous contents if that fetch goes wrong. Users never see a
//! catalog error; they see the previous list.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::backend::ManualApi;
use crate::error::CatalogLoadError;

/// Vehicle codes the client knows about before talking to the backend
pub const DEFAULT_VEHICLES: [&str; 7] = [
    "GRANDEUR", "SANTAFE", "SONATA", "AVANTE", "KONA", "TUCSON", "PALISADE",
];

/// Human-readable model name for a vehicle code
///
/// Unknown codes are shown as-is.
#[must_use]
pub fn display_name(code: &str) -> &str {
    match code {
        "GRANDEUR" => "그랜저",
        "SANTAFE" => "싼타페",
        "SONATA" => "쏘나타",
        "AVANTE" => "아반떼",
        "KONA" => "코나",
        "TUCSON" => "투싼",
        "PALISADE" => "팰리세이드",
        other => other,
    }
}

/// A catalog entry as shown to the selection surface
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Vehicle code
    pub code: String,
    /// Whether a manual is loaded for this vehicle
    pub available: bool,
}

impl Vehicle {
    /// Human-readable model name
    #[must_use]
    pub fn display_name(&self) -> &str {
        display_name(&self.code)
    }
}

/// Body of `GET /vehicles`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleListing {
    /// Every vehicle code the backend recognises, in display order
    pub vehicles: Vec<String>,
    /// Codes whose manuals are currently loaded
    pub available_vehicles: Vec<String>,
}

/// Known vehicles and which of them are queryable
#[derive(Clone, Debug)]
pub struct VehicleCatalog {
    all: Vec<String>,
    available: HashSet<String>,
}

impl Default for VehicleCatalog {
    fn default() -> Self {
        Self {
            all: DEFAULT_VEHICLES.iter().map(ToString::to_string).collect(),
            available: DEFAULT_VEHICLES.iter().map(ToString::to_string).collect(),
        }
    }
}

impl VehicleCatalog {
    /// Fetch the listing from the backend and apply it
    ///
    /// On any failure the current contents are kept and the failure is logged.
    /// Returns the number of vehicles in the catalog afterwards.
    pub async fn load<A>(&mut self, api: &A) -> Result<usize, CatalogLoadError>
    where
        A: ManualApi + ?Sized,
    {
        let result = match api.vehicles().await {
            Ok(listing) => self.replace(listing),
            Err(e) => Err(e),
        };

        match &result {
            Ok(count) => {
                tracing::info!(
                    vehicles = count,
                    available = self.available_count(),
                    "Vehicle catalog loaded"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, vehicles = self.len(), "Keeping previous vehicle catalog");
            }
        }

        result
    }

    /// Replace the catalog with a fetched listing
    ///
    /// Duplicate codes keep their first position. Available codes that are not
    /// part of `vehicles` are dropped. An empty listing leaves the catalog as
    /// it was.
    pub fn replace(&mut self, listing: VehicleListing) -> Result<usize, CatalogLoadError> {
        let mut seen = HashSet::new();
        let all: Vec<String> = listing
            .vehicles
            .into_iter()
            .map(|code| code.trim().to_string())
            .filter(|code| !code.is_empty() && seen.insert(code.clone()))
            .collect();

        if all.is_empty() {
            return Err(CatalogLoadError::Empty);
        }

        let mut available = HashSet::new();
        for code in listing.available_vehicles {
            let code = code.trim().to_string();
            if seen.contains(&code) {
                available.insert(code);
            } else {
                tracing::warn!(vehicle = %code, "Available vehicle missing from listing, ignoring");
            }
        }

        self.all = all;
        self.available = available;
        Ok(self.all.len())
    }

    /// Whether `code` can be selected; false for unknown codes
    #[must_use]
    pub fn is_available(&self, code: &str) -> bool {
        self.available.contains(code)
    }

    /// Catalog entries in display order
    #[must_use]
    pub fn vehicles(&self) -> Vec<Vehicle> {
        self.all
            .iter()
            .map(|code| Vehicle {
                code: code.clone(),
                available: self.available.contains(code),
            })
            .collect()
    }

    /// Number of known vehicles
    #[must_use]
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// Whether the catalog is empty (never true after construction)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Number of selectable vehicles
    #[must_use]
    pub fn available_count(&self) -> usize {
        self.available.len()
    }
}
