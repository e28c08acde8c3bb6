//! Built-in seed catalog.
//!
//! A small compiled-in table of common cosmetic ingredients. Seed entries
//! join the aggregation as the lowest-priority source, so any remote answer
//! outranks them; their job is to keep trivial names (water, glycerin)
//! meaningful when every remote source is down and to seed benefits text.

use chrono::Utc;

use crate::types::{CanonicalName, FactStatus, IngredientFact, ProviderId, RiskLevel};

struct SeedEntry {
    name: &'static str,
    risk: RiskLevel,
    eco: f64,
    benefits: &'static str,
    risks: &'static str,
}

/// Canonical-name keyed seed rows. Names must match the canonicalizer's
/// output form: lowercase, single-spaced, synonym-collapsed.
const SEED: &[SeedEntry] = &[
    SeedEntry {
        name: "water",
        risk: RiskLevel::None,
        eco: 98.0,
        benefits: "Solvent and base of most aqueous formulations",
        risks: "",
    },
    SeedEntry {
        name: "glycerin",
        risk: RiskLevel::None,
        eco: 92.0,
        benefits: "Humectant, draws moisture into the skin",
        risks: "",
    },
    SeedEntry {
        name: "tocopherol",
        risk: RiskLevel::None,
        eco: 90.0,
        benefits: "Antioxidant, protects oils from rancidity",
        risks: "",
    },
    SeedEntry {
        name: "niacinamide",
        risk: RiskLevel::None,
        eco: 90.0,
        benefits: "Barrier support and tone evening",
        risks: "",
    },
    SeedEntry {
        name: "panthenol",
        risk: RiskLevel::None,
        eco: 90.0,
        benefits: "Soothing humectant, provitamin B5",
        risks: "",
    },
    SeedEntry {
        name: "hyaluronic acid",
        risk: RiskLevel::None,
        eco: 88.0,
        benefits: "High molecular weight humectant",
        risks: "",
    },
    SeedEntry {
        name: "ascorbic acid",
        risk: RiskLevel::Low,
        eco: 85.0,
        benefits: "Antioxidant, brightening",
        risks: "Can irritate at high concentrations or low pH",
    },
    SeedEntry {
        name: "salicylic acid",
        risk: RiskLevel::Low,
        eco: 75.0,
        benefits: "Keratolytic exfoliant",
        risks: "Irritation and dryness with overuse",
    },
    SeedEntry {
        name: "retinol",
        risk: RiskLevel::Moderate,
        eco: 60.0,
        benefits: "Cell turnover and collagen stimulation",
        risks: "Irritation, photosensitivity, not advised during pregnancy",
    },
    SeedEntry {
        name: "fragrance",
        risk: RiskLevel::Moderate,
        eco: 45.0,
        benefits: "",
        risks: "Undisclosed mixture, common contact allergen",
    },
    SeedEntry {
        name: "sodium lauryl sulfate",
        risk: RiskLevel::High,
        eco: 40.0,
        benefits: "Strong foaming surfactant",
        risks: "Skin barrier disruption and irritation, aquatic toxicity",
    },
    SeedEntry {
        name: "sodium laureth sulfate",
        risk: RiskLevel::Moderate,
        eco: 50.0,
        benefits: "Milder foaming surfactant",
        risks: "Possible 1,4-dioxane contamination from ethoxylation",
    },
    SeedEntry {
        name: "cocamidopropyl betaine",
        risk: RiskLevel::Low,
        eco: 70.0,
        benefits: "Mild amphoteric surfactant",
        risks: "Impurity-driven sensitization in some batches",
    },
    SeedEntry {
        name: "methylparaben",
        risk: RiskLevel::Low,
        eco: 65.0,
        benefits: "Broad-spectrum preservative",
        risks: "Weak estrogenic activity in vitro",
    },
    SeedEntry {
        name: "propylparaben",
        risk: RiskLevel::Moderate,
        eco: 55.0,
        benefits: "Preservative",
        risks: "Endocrine activity concerns at high exposure",
    },
    SeedEntry {
        name: "phenoxyethanol",
        risk: RiskLevel::Low,
        eco: 70.0,
        benefits: "Preservative, paraben alternative",
        risks: "Irritant above 1%",
    },
    SeedEntry {
        name: "dimethicone",
        risk: RiskLevel::Low,
        eco: 55.0,
        benefits: "Occlusive, smooths texture",
        risks: "Poor biodegradability",
    },
    SeedEntry {
        name: "titanium dioxide",
        risk: RiskLevel::Low,
        eco: 75.0,
        benefits: "Mineral UV filter",
        risks: "Inhalation concern in powder form only",
    },
    SeedEntry {
        name: "zinc oxide",
        risk: RiskLevel::None,
        eco: 80.0,
        benefits: "Mineral UV filter, soothing",
        risks: "",
    },
    SeedEntry {
        name: "oxybenzone",
        risk: RiskLevel::High,
        eco: 20.0,
        benefits: "Chemical UV filter",
        risks: "Coral reef toxicity, endocrine activity, photoallergy",
    },
    SeedEntry {
        name: "octocrylene",
        risk: RiskLevel::Moderate,
        eco: 40.0,
        benefits: "Chemical UV filter and stabilizer",
        risks: "Degrades to benzophenone, aquatic toxicity",
    },
    SeedEntry {
        name: "formaldehyde",
        risk: RiskLevel::High,
        eco: 5.0,
        benefits: "",
        risks: "Known human carcinogen, strong sensitizer",
    },
    SeedEntry {
        name: "talc",
        risk: RiskLevel::Moderate,
        eco: 50.0,
        benefits: "Absorbent filler",
        risks: "Asbestos contamination concern in unverified sources",
    },
    SeedEntry {
        name: "shea butter",
        risk: RiskLevel::None,
        eco: 95.0,
        benefits: "Emollient rich in fatty acids",
        risks: "",
    },
    SeedEntry {
        name: "citric acid",
        risk: RiskLevel::None,
        eco: 90.0,
        benefits: "pH adjuster, mild exfoliant",
        risks: "",
    },
];

/// Look up the seed fact for a canonical name, if the catalog covers it.
pub fn seed_fact(name: &CanonicalName) -> Option<IngredientFact> {
    let entry = SEED.iter().find(|e| e.name == name.as_str())?;
    Some(IngredientFact {
        provider: ProviderId::LocalSeed,
        name: name.clone(),
        fetched_at: Utc::now(),
        status: FactStatus::Ok,
        risk: entry.risk,
        eco_score: Some(entry.eco),
        benefits: entry.benefits.to_owned(),
        risks_detailed: entry.risks.to_owned(),
        raw_summary: "seed catalog".to_owned(),
    })
}
