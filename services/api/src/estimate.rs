use clap::Args;
use dupa_estimator::config::AppConfig;
use dupa_estimator::error::AppError;
use dupa_estimator::estimation::{CostBreakdown, CostEngine, InvalidInputPolicy, RateCatalog};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct EstimateArgs {
    /// Measured repair area in square meters
    #[arg(long)]
    pub(crate) area: String,
    /// Damage classification shown as the report heading
    #[arg(long, default_value = "Unclassified damage")]
    pub(crate) classification: String,
    /// JSON rate catalog overriding DUPA_RATE_CATALOG and the standard rates
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
    /// Treat an unparseable area as zero instead of failing
    #[arg(long)]
    pub(crate) coerce_invalid: bool,
    /// Emit the raw breakdown as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_estimate(args: EstimateArgs) -> Result<(), AppError> {
    let EstimateArgs {
        area,
        classification,
        catalog,
        coerce_invalid,
        json,
    } = args;

    let config = AppConfig::load()?;
    let catalog = match catalog.or(config.estimation.catalog_path) {
        Some(path) => RateCatalog::from_path(&path)?,
        None => RateCatalog::standard(),
    };
    let policy = if coerce_invalid {
        InvalidInputPolicy::CoerceToZero
    } else {
        config.estimation.invalid_input
    };

    let area = policy.resolve(&area)?;
    let engine = CostEngine::new(Arc::new(catalog));
    let breakdown = engine.compute(area);

    if json {
        let rendered =
            serde_json::to_string_pretty(&breakdown).map_err(|err| AppError::Io(err.into()))?;
        println!("{rendered}");
    } else {
        print!("{}", render_breakdown(&classification, engine.catalog(), &breakdown));
    }

    Ok(())
}

pub(crate) fn render_breakdown(
    classification: &str,
    catalog: &RateCatalog,
    breakdown: &CostBreakdown,
) -> String {
    let mut out = String::new();
    writeln!(out, "{classification}").expect("write classification");
    writeln!(
        out,
        "{} • {} h est.",
        breakdown.area,
        breakdown.estimated_hours()
    )
    .expect("write area");
    writeln!(out, "Crew: {}", catalog.crew_summary().join(", ")).expect("write crew");

    writeln!(out, "\nLabour").expect("write labour heading");
    for line in &breakdown.labour_lines {
        writeln!(out, "  • {}: {} → {}", line.role, line.detail(), money(line.cost))
            .expect("write labour line");
    }
    writeln!(out, "  Subtotal: {}", money(breakdown.labour_subtotal))
        .expect("write labour subtotal");

    writeln!(out, "\nEquipment").expect("write equipment heading");
    for line in &breakdown.equipment_lines {
        writeln!(out, "  • {}: {} → {}", line.name, line.detail(), money(line.cost))
            .expect("write equipment line");
    }
    writeln!(out, "  • Minor Tools: {}", money(breakdown.minor_tools_cost))
        .expect("write minor tools");
    writeln!(out, "  Subtotal: {}", money(breakdown.equipment_subtotal))
        .expect("write equipment subtotal");

    writeln!(out, "\nMaterials").expect("write materials heading");
    for line in &breakdown.material_lines {
        writeln!(out, "  • {}: {} → {}", line.name, line.detail(), money(line.cost))
            .expect("write material line");
    }
    writeln!(out, "  Subtotal: {}", money(breakdown.material_subtotal))
        .expect("write material subtotal");

    writeln!(out, "\nTotals").expect("write totals heading");
    writeln!(
        out,
        "  VAT ({}%): {}",
        catalog.vat_fraction * 100.0,
        money(breakdown.vat)
    )
    .expect("write vat");
    writeln!(out, "  Grand Total: {}", money(breakdown.grand_total)).expect("write grand total");
    out
}

fn money(value: f64) -> String {
    format!("₱{value:.2}")
}
