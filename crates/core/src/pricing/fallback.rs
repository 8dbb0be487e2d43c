//! Compiled-in price tables, served when the live source cannot be read.
//!
//! These rows also back the demo seed, so the live and degraded catalogs start
//! out identical and only differ by their [`PriceSource`](crate::domain::breakdown::PriceSource) tag.

use crate::pricing::provider::{
    AccessoryRow, ClosureRow, DeliveryMethodRow, FabricRow, LogoMethodRow, MoldChargeRow,
    PriceTableSet, PriceTierRow, ProductRow, RawTierPrices,
};

const NA: &str = "N/A";

fn cells(values: &[&str]) -> RawTierPrices {
    RawTierPrices::from_cells(values)
}

fn price_tier(name: &str, values: &[&str]) -> PriceTierRow {
    PriceTierRow { tier_name: name.to_string(), prices: cells(values) }
}

fn product(
    name: &str,
    panel_count: u8,
    profile: &str,
    bill_shape: &str,
    closures: &str,
    tier: &str,
) -> ProductRow {
    ProductRow {
        name: name.to_string(),
        panel_count: Some(panel_count.to_string()),
        profile: Some(profile.to_string()),
        bill_shape: Some(bill_shape.to_string()),
        closure_types: Some(closures.to_string()),
        price_tier: Some(tier.to_string()),
    }
}

fn fabric(name: &str, cost_type: Option<&str>, values: &[&str]) -> FabricRow {
    FabricRow {
        name: name.to_string(),
        cost_type: cost_type.map(ToString::to_string),
        prices: cells(values),
    }
}

fn logo(
    name: &str,
    application: &str,
    size: &str,
    values: &[&str],
    mold: Option<&str>,
) -> LogoMethodRow {
    LogoMethodRow {
        name: name.to_string(),
        application: Some(application.to_string()),
        size: Some(size.to_string()),
        prices: cells(values),
        mold_charge_type: mold.map(ToString::to_string),
    }
}

fn mold(name: &str, size: &str, charge: &str) -> MoldChargeRow {
    MoldChargeRow {
        name: name.to_string(),
        size: Some(size.to_string()),
        charge: Some(charge.to_string()),
    }
}

fn closure(name: &str, values: &[&str]) -> ClosureRow {
    ClosureRow { name: name.to_string(), prices: cells(values) }
}

fn accessory(name: &str, values: &[&str]) -> AccessoryRow {
    AccessoryRow { name: name.to_string(), prices: cells(values) }
}

fn delivery(name: &str, days: &str, values: &[&str]) -> DeliveryMethodRow {
    DeliveryMethodRow {
        name: name.to_string(),
        delivery_days: Some(days.to_string()),
        prices: cells(values),
    }
}

/// Cells run 48, 144, 576, 1152, 2880, 10000, 20000.
pub fn fallback_tables() -> PriceTableSet {
    PriceTableSet {
        price_tiers: vec![
            price_tier("Tier 1", &["5.00", "4.25", "4.00", "3.75", "3.50", "3.25", "3.00"]),
            price_tier("Tier 2", &["5.50", "4.75", "4.50", "4.25", "4.00", "3.75", "3.50"]),
            price_tier("Tier 3", &["6.00", "5.25", "5.00", "4.75", "4.50", "4.25", "4.00"]),
        ],
        products: vec![
            product("6P AirFrame HSCS", 6, "High", "Slight Curved", "Snapback, Fitted, Velcro", "Tier 1"),
            product("6P Bravo Flat", 6, "Mid", "Flat", "Snapback", "Tier 2"),
            product("5P Urban Classic MSCS", 5, "Mid", "Slight Curved", "", "Tier 2"),
            product("7P Elite Seven HSCS", 7, "High", "Slight Curved", "Snapback, Velcro, Buckle", "Tier 3"),
        ],
        fabrics: vec![
            fabric("Chino Twill", Some("Free"), &[]),
            fabric("Acrylic", None, &["1.25", "1.00", "0.90", "0.80", "0.70", "0.60", "0.50"]),
            fabric("Trucker Mesh", None, &["0.50", "0.40", "0.35", "0.30", "0.25", "0.20", "0.15"]),
            fabric("Suede Cotton", Some("Premium"), &["1.50", "1.25", "1.10", "1.00", "0.90", "0.80", "0.75"]),
            fabric("Polyester", None, &["0.80", "0.70", "0.60", "0.55", "0.50", "0.45", "0.40"]),
        ],
        logo_methods: vec![
            logo("3D Embroidery", "Direct", "Small", &["1.50", "1.25", "1.10", "1.00", "0.90", "0.85", "0.80"], None),
            logo("3D Embroidery", "Direct", "Medium", &["2.00", "1.75", "1.50", "1.40", "1.30", "1.20", "1.10"], None),
            logo("3D Embroidery", "Direct", "Large", &["2.75", "2.40", "2.10", "1.95", "1.80", "1.65", "1.50"], None),
            logo("Flat Embroidery", "Direct", "Small", &["1.00", "0.85", "0.75", "0.70", "0.65", "0.60", "0.55"], None),
            logo("Flat Embroidery", "Direct", "Medium", &["1.40", "1.20", "1.05", "0.95", "0.90", "0.85", "0.80"], None),
            logo("Flat Embroidery", "Direct", "Large", &["1.90", "1.65", "1.45", "1.35", "1.25", "1.15", "1.05"], None),
            logo("Rubber", "Patch", "Small", &["1.60", "1.35", "1.20", "1.10", "1.00", "0.95", "0.90"], Some("Small Mold Charge")),
            logo("Rubber", "Patch", "Medium", &["2.20", "1.90", "1.65", "1.50", "1.40", "1.30", "1.20"], Some("Medium Mold Charge")),
            logo("Rubber", "Patch", "Large", &["3.00", "2.60", "2.30", "2.10", "1.95", "1.80", "1.70"], Some("Large Mold Charge")),
            logo("Leather", "Patch", "Small", &["1.80", "1.55", "1.35", "1.25", "1.15", "1.05", "1.00"], None),
            logo("Leather", "Patch", "Medium", &["2.40", "2.10", "1.85", "1.70", "1.60", "1.50", "1.40"], None),
            logo("Leather", "Patch", "Large", &["3.20", "2.80", "2.50", "2.30", "2.15", "2.00", "1.90"], None),
            logo("Screen Print", "Direct", "Small", &["0.90", "0.75", "0.60", "0.55", "0.50", "0.45", "0.40"], None),
            logo("Screen Print", "Direct", "Large", &["1.50", "1.25", "1.00", "0.90", "0.80", "0.75", "0.70"], None),
        ],
        mold_charges: vec![
            mold("Small Mold Charge", "Small", "50.00"),
            mold("Medium Mold Charge", "Medium", "80.00"),
            mold("Large Mold Charge", "Large", "120.00"),
        ],
        closures: vec![
            closure("Snapback", &["0.00", "0.00", "0.00", "0.00", "0.00", "0.00", "0.00"]),
            closure("Velcro", &["0.30", "0.25", "0.20", "0.20", "0.15", "0.15", "0.10"]),
            closure("Fitted", &["0.75", "0.65", "0.55", "0.50", "0.45", "0.40", "0.35"]),
            closure("Buckle", &["1.00", "0.90", "0.80", "0.75", "0.70", "0.65", "0.60"]),
        ],
        accessories: vec![
            accessory("Hang Tag", &["0.50", "0.40", "0.30", "0.25", "0.20", "0.18", "0.15"]),
            accessory("Inside Label", &["0.40", "0.30", "0.25", "0.20", "0.18", "0.15", "0.12"]),
            accessory("B-Tape Print", &["0.60", "0.50", "0.40", "0.35", "0.30", "0.28", "0.25"]),
            accessory("Sticker", &["0.20", "0.15", "0.12", "0.10", "0.08", "0.07", "0.06"]),
        ],
        delivery_methods: vec![
            delivery("Regular Delivery", "6-10", &["3.00", "2.50", "2.00", "1.75", "1.50", "1.25", "1.00"]),
            delivery("Priority Delivery", "4-6", &["4.50", "3.75", "3.00", "2.60", "2.25", "1.90", "1.60"]),
            delivery("Air Freight", "5-7", &[NA, NA, "1.20", "1.00", "0.90", "0.80", "0.70"]),
            delivery("Sea Freight", "30-45", &[NA, NA, NA, NA, "0.45", "0.35", "0.30"]),
        ],
    }
}
