use std::sync::Arc;

use serde::Serialize;

use super::catalog::RateCatalog;
use super::measurement::SquareMeters;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabourLine {
    pub role: String,
    pub persons: u32,
    pub hours: f64,
    pub cost: f64,
}

impl LabourLine {
    pub fn detail(&self) -> String {
        format!("{}× {:.2} h", self.persons, self.hours)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquipmentLine {
    pub name: String,
    pub units: u32,
    pub hours: f64,
    pub cost: f64,
}

impl EquipmentLine {
    pub fn detail(&self) -> String {
        format!("{}× {:.2} h", self.units, self.hours)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterialLine {
    pub name: String,
    pub unit: String,
    pub quantity: f64,
    pub cost: f64,
}

impl MaterialLine {
    pub fn detail(&self) -> String {
        format!("{:.2} {}", self.quantity, self.unit)
    }
}

/// Labour, equipment and material costs derived from a single area.
///
/// Values are unrounded; rounding is left to whoever renders them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub area: SquareMeters,
    /// Crew-hours needed to process `area` at the catalog output rate.
    pub batches: f64,
    pub labour_lines: Vec<LabourLine>,
    pub labour_subtotal: f64,
    pub equipment_lines: Vec<EquipmentLine>,
    pub minor_tools_cost: f64,
    pub equipment_subtotal: f64,
    pub material_lines: Vec<MaterialLine>,
    pub material_subtotal: f64,
    pub vat: f64,
    pub grand_total: f64,
}

impl CostBreakdown {
    pub fn estimated_hours(&self) -> String {
        format!("{:.2}", self.batches)
    }
}

/// Stateless calculator applying a rate catalog to an area.
#[derive(Debug, Clone)]
pub struct CostEngine {
    catalog: Arc<RateCatalog>,
}

impl CostEngine {
    pub fn new(catalog: Arc<RateCatalog>) -> Self {
        Self { catalog }
    }

    pub fn standard() -> Self {
        Self::new(Arc::new(RateCatalog::standard()))
    }

    pub fn catalog(&self) -> &RateCatalog {
        &self.catalog
    }

    pub fn compute(&self, area: SquareMeters) -> CostBreakdown {
        let catalog = &*self.catalog;
        let area_value = area.value();
        let batches = area_value / catalog.output_rate_per_hour;

        let labour_lines: Vec<LabourLine> = catalog
            .labour
            .iter()
            .map(|rate| {
                let hours = f64::from(rate.persons) * batches;
                LabourLine {
                    role: rate.role.clone(),
                    persons: rate.persons,
                    hours,
                    cost: hours * rate.hourly_rate,
                }
            })
            .collect();
        let labour_subtotal: f64 = labour_lines.iter().map(|line| line.cost).sum();

        let equipment_lines: Vec<EquipmentLine> = catalog
            .equipment
            .iter()
            .map(|rate| {
                let hours = f64::from(rate.units) * batches;
                EquipmentLine {
                    name: rate.name.clone(),
                    units: rate.units,
                    hours,
                    cost: hours * rate.hourly_rate,
                }
            })
            .collect();
        let minor_tools_cost = labour_subtotal * catalog.minor_tools_surcharge_fraction;
        let equipment_subtotal =
            equipment_lines.iter().map(|line| line.cost).sum::<f64>() + minor_tools_cost;

        let material_lines: Vec<MaterialLine> = catalog
            .materials
            .iter()
            .map(|rate| {
                let quantity = rate.quantity_per_square_meter * area_value;
                MaterialLine {
                    name: rate.name.clone(),
                    unit: rate.unit.clone(),
                    quantity,
                    cost: quantity * rate.unit_cost,
                }
            })
            .collect();
        let material_subtotal: f64 = material_lines.iter().map(|line| line.cost).sum();

        let vat = (labour_subtotal + equipment_subtotal + material_subtotal) * catalog.vat_fraction;
        let grand_total = labour_subtotal + equipment_subtotal + material_subtotal + vat;

        CostBreakdown {
            area,
            batches,
            labour_lines,
            labour_subtotal,
            equipment_lines,
            minor_tools_cost,
            equipment_subtotal,
            material_lines,
            material_subtotal,
            vat,
            grand_total,
        }
    }
}

impl Default for CostEngine {
    fn default() -> Self {
        Self::standard()
    }
}
