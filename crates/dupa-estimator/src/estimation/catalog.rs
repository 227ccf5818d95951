use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Crew role billed per person-hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabourRate {
    pub role: String,
    pub persons: u32,
    pub hourly_rate: f64,
}

/// Equipment item billed per unit-hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRate {
    pub name: String,
    pub units: u32,
    pub hourly_rate: f64,
}

/// Material consumed in proportion to the repaired area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRate {
    pub name: String,
    pub unit: String,
    pub quantity_per_square_meter: f64,
    pub unit_cost: f64,
}

/// Immutable rate tables and constants feeding the cost engine.
///
/// A catalog is built once at startup, either from [`RateCatalog::standard`] or from a
/// JSON file via [`RateCatalog::from_path`], and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateCatalog {
    /// Square meters a full crew processes per hour.
    pub output_rate_per_hour: f64,
    pub minor_tools_surcharge_fraction: f64,
    pub vat_fraction: f64,
    pub labour: Vec<LabourRate>,
    pub equipment: Vec<EquipmentRate>,
    pub materials: Vec<MaterialRate>,
}

impl RateCatalog {
    /// Concrete pavement repair rates used by the reporting dashboard.
    pub fn standard() -> Self {
        Self {
            output_rate_per_hour: 70.0,
            minor_tools_surcharge_fraction: 0.05,
            vat_fraction: 0.05,
            labour: vec![
                labour("Construction Foreman", 1, 170.29),
                labour("Skilled Laborer", 4, 123.12),
                labour("Unskilled Laborer", 12, 94.96),
            ],
            equipment: vec![
                equipment("Transit Mixer (5 cu.m.)", 4, 1461.0),
                equipment("Concrete Vibrator", 2, 57.17),
                equipment("Batch Plant (30 cu.m.)", 1, 1759.5),
                equipment("Payloader (1.50 cu.m.)", 1, 1733.0),
                equipment("Screeder (5.5 hp)", 1, 545.0),
                equipment("Water Truck/Pump (16000 L)", 1, 2450.0),
                equipment("Concrete Saw (14' blade)", 1, 32.64),
                equipment("Bar Cutter", 1, 105.47),
            ],
            materials: vec![
                material("Reinforcing Steel Bar", "kg", 0.43, 70.2),
                material("Curing Compound", "L", 0.29, 70.0),
                material("Asphalt Sealant", "L", 0.12, 50.0),
                material("Steel Forms (Rental)", "m", 0.46, 50.0),
                material("Sand", "cu.m.", 0.1265, 615.0),
                material("Gravel", "cu.m.", 0.23, 1605.0),
                material("Cement", "bag", 2.19, 250.0),
                material("Concrete Saw Blade", "pc", 0.00015, 8000.0),
                material("Pipe Sleeve", "m", 0.0071, 383.33),
                material("Grease/Tar", "L", 0.0087, 300.0),
            ],
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_json::from_str(raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Checks every numeric constraint the engine relies on for non-negative output.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if !(self.output_rate_per_hour.is_finite() && self.output_rate_per_hour > 0.0) {
            return Err(CatalogError::OutputRate(self.output_rate_per_hour));
        }
        check_fraction("minor_tools_surcharge_fraction", self.minor_tools_surcharge_fraction)?;
        check_fraction("vat_fraction", self.vat_fraction)?;

        for rate in &self.labour {
            if rate.persons == 0 {
                return Err(CatalogError::ZeroHeadcount(rate.role.clone()));
            }
            check_positive(&rate.role, "hourly_rate", rate.hourly_rate)?;
        }
        for rate in &self.equipment {
            if rate.units == 0 {
                return Err(CatalogError::ZeroHeadcount(rate.name.clone()));
            }
            check_positive(&rate.name, "hourly_rate", rate.hourly_rate)?;
        }
        for rate in &self.materials {
            check_non_negative(
                &rate.name,
                "quantity_per_square_meter",
                rate.quantity_per_square_meter,
            )?;
            check_non_negative(&rate.name, "unit_cost", rate.unit_cost)?;
        }

        Ok(())
    }

    /// Crew composition labels such as "4 Skilled Laborers".
    pub fn crew_summary(&self) -> Vec<String> {
        self.labour
            .iter()
            .map(|rate| {
                let plural = if rate.persons > 1 { "s" } else { "" };
                format!("{} {}{}", rate.persons, rate.role, plural)
            })
            .collect()
    }
}

impl Default for RateCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn labour(role: &str, persons: u32, hourly_rate: f64) -> LabourRate {
    LabourRate {
        role: role.to_string(),
        persons,
        hourly_rate,
    }
}

fn equipment(name: &str, units: u32, hourly_rate: f64) -> EquipmentRate {
    EquipmentRate {
        name: name.to_string(),
        units,
        hourly_rate,
    }
}

fn material(name: &str, unit: &str, quantity_per_square_meter: f64, unit_cost: f64) -> MaterialRate {
    MaterialRate {
        name: name.to_string(),
        unit: unit.to_string(),
        quantity_per_square_meter,
        unit_cost,
    }
}

fn check_fraction(field: &'static str, value: f64) -> Result<(), CatalogError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CatalogError::Fraction { field, value })
    }
}

fn check_positive(entry: &str, field: &'static str, value: f64) -> Result<(), CatalogError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CatalogError::InvalidRate {
            entry: entry.to_string(),
            field,
            value,
        })
    }
}

fn check_non_negative(entry: &str, field: &'static str, value: f64) -> Result<(), CatalogError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(CatalogError::InvalidRate {
            entry: entry.to_string(),
            field,
            value,
        })
    }
}

/// Failure to load or validate a rate catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unable to read rate catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed rate catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("output_rate_per_hour must be positive, got {0}")]
    OutputRate(f64),
    #[error("{field} must lie within [0, 1], got {value}")]
    Fraction { field: &'static str, value: f64 },
    #[error("'{0}' must have at least one person or unit")]
    ZeroHeadcount(String),
    #[error("'{entry}' has invalid {field}: {value}")]
    InvalidRate {
        entry: String,
        field: &'static str,
        value: f64,
    },
}
