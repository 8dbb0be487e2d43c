pub mod aggregator;
pub mod cache;
pub mod catalog;
pub mod constraints;
pub mod fallback;
pub mod mold;
pub mod provider;
pub mod resolvers;
pub mod tiers;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::breakdown::{CostBreakdown, CostComponent, PriceSource};
use crate::domain::options::{normalize_key, CostCategory};
use crate::domain::specification::{LogoPlacement, QuoteSpecification};
use crate::domain::tier::TierKey;
use crate::errors::PricingError;

use self::aggregator::{ComponentOutcome, CostAggregator};
use self::cache::{CacheStats, CacheStore, InMemoryCacheStore, NoopCacheStore, DEFAULT_TTL};
use self::catalog::{CatalogLoadOptions, CatalogLoadReport, PriceCatalog};
use self::constraints::{DeterministicConstraints, SpecificationConstraints};
use self::mold::MoldChargeResolver;
use self::provider::PriceTableProvider;
use self::resolvers::{PriceResolver, ResolvedPrice};
use self::tiers::{TierPolicy, TierResolver};

pub const DEFAULT_PREWARM_QUANTITIES: [u32; 6] = [48, 144, 576, 1152, 2880, 10000];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricingSettings {
    pub tier_policy: TierPolicy,
    pub allow_fallback: bool,
    pub strict_validation: bool,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub prewarm_quantities: Vec<u32>,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            tier_policy: TierPolicy::default(),
            allow_fallback: true,
            strict_validation: false,
            cache_enabled: true,
            cache_ttl: DEFAULT_TTL,
            prewarm_quantities: DEFAULT_PREWARM_QUANTITIES.to_vec(),
        }
    }
}

impl PricingSettings {
    pub fn load_options(&self) -> CatalogLoadOptions {
        CatalogLoadOptions { allow_fallback: self.allow_fallback, strict: self.strict_validation }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrewarmReport {
    pub tiers: Vec<TierKey>,
    pub entries: usize,
    /// Options with no price at a warmed tier.
    pub skipped: usize,
}

/// Entry point for pricing a specification.
///
/// Holds the current catalog snapshot behind a lock so [`PricingService::refresh`]
/// can swap it without readers ever seeing a half-loaded table set.
pub struct PricingService {
    catalog: RwLock<Arc<PriceCatalog>>,
    cache: Arc<dyn CacheStore>,
    constraints: DeterministicConstraints,
    settings: PricingSettings,
}

impl PricingService {
    pub fn new(catalog: PriceCatalog, cache: Arc<dyn CacheStore>, settings: PricingSettings) -> Self {
        Self {
            catalog: RwLock::new(Arc::new(catalog)),
            cache,
            constraints: DeterministicConstraints,
            settings,
        }
    }

    /// Picks an in-memory or no-op cache from `settings.cache_enabled`.
    pub fn with_settings(catalog: PriceCatalog, settings: PricingSettings) -> Self {
        let cache: Arc<dyn CacheStore> = if settings.cache_enabled {
            Arc::new(InMemoryCacheStore::new())
        } else {
            Arc::new(NoopCacheStore)
        };
        Self::new(catalog, cache, settings)
    }

    pub async fn load(
        provider: &dyn PriceTableProvider,
        settings: PricingSettings,
    ) -> Result<(Self, CatalogLoadReport), PricingError> {
        let (catalog, report) = PriceCatalog::load(provider, settings.load_options()).await?;
        Ok((Self::with_settings(catalog, settings), report))
    }

    pub fn settings(&self) -> &PricingSettings {
        &self.settings
    }

    pub fn catalog(&self) -> Arc<PriceCatalog> {
        let guard = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    pub fn source(&self) -> PriceSource {
        self.catalog().source()
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    pub fn tier_resolver(&self) -> TierResolver {
        self.catalog().tier_resolver(self.settings.tier_policy)
    }

    /// Unit price of one option at a quantity.
    pub fn resolve(
        &self,
        category: CostCategory,
        option_key: &str,
        quantity: u32,
    ) -> Result<ResolvedPrice, PricingError> {
        let catalog = self.catalog();
        let tiers = catalog.tier_resolver(self.settings.tier_policy);
        PriceResolver::new(&catalog, &tiers, self.cache.as_ref(), self.settings.cache_ttl)
            .resolve(category, option_key, quantity)
    }

    /// Prices a full specification. Pure for a fixed catalog: the cache may
    /// change how fast this runs, never what it returns.
    pub fn calculate_quote(&self, spec: &QuoteSpecification) -> Result<CostBreakdown, PricingError> {
        // One snapshot for the whole pass. Cache keys carry its generation, so a
        // concurrent refresh can neither mix catalogs nor let old prices back in.
        let snapshot = self.catalog();
        let catalog: &PriceCatalog = &snapshot;

        self.constraints.validate(spec, catalog)?;
        let tiers = catalog.tier_resolver(self.settings.tier_policy);
        let tier = tiers.resolve(spec.quantity)?;
        let resolver =
            PriceResolver::new(catalog, &tiers, self.cache.as_ref(), self.settings.cache_ttl);
        let quantity = spec.quantity;
        let per_unit = |category: CostCategory, key: &str| {
            resolver.resolve_at(category, key, tier).and_then(|price| {
                CostComponent::per_unit(
                    category,
                    price.name,
                    price.unit_price,
                    quantity,
                    price.tier,
                    price.source,
                )
            })
        };

        let mut outcomes = vec![ComponentOutcome::mandatory(
            CostCategory::BlankCap,
            spec.product.clone(),
            per_unit(CostCategory::BlankCap, &spec.product),
        )];

        for fabric in &spec.fabrics {
            outcomes.push(ComponentOutcome::optional(
                CostCategory::Fabric,
                fabric.clone(),
                per_unit(CostCategory::Fabric, fabric),
            ));
        }

        let mut priced_logos = BTreeMap::new();
        for (position, placement) in &spec.logos {
            let result = per_unit(CostCategory::Logo, &placement.method_key().to_string()).map(
                |mut component| {
                    component.name =
                        LogoPlacement::new(component.name, placement.application, placement.size)
                            .to_string();
                    component.at_position(*position)
                },
            );
            if result.is_ok() {
                priced_logos.insert(*position, placement.clone());
            }
            outcomes.push(ComponentOutcome::optional(
                CostCategory::Logo,
                placement.to_string(),
                result,
            ));
        }

        for mold in MoldChargeResolver::new(catalog).resolve(&priced_logos)? {
            outcomes.push(ComponentOutcome::optional(
                CostCategory::MoldCharge,
                mold.name.clone(),
                Ok(mold),
            ));
        }

        if let Some(closure) = &spec.closure {
            outcomes.push(ComponentOutcome::optional(
                CostCategory::Closure,
                closure.clone(),
                per_unit(CostCategory::Closure, closure),
            ));
        }

        let mut accessories: Vec<&String> = spec.accessories.iter().collect();
        accessories.sort_by_key(|name| normalize_key(name));
        for accessory in accessories {
            outcomes.push(ComponentOutcome::optional(
                CostCategory::Accessory,
                accessory.clone(),
                per_unit(CostCategory::Accessory, accessory),
            ));
        }

        if let Some(delivery) = &spec.delivery {
            outcomes.push(ComponentOutcome::optional(
                CostCategory::Delivery,
                delivery.clone(),
                per_unit(CostCategory::Delivery, delivery),
            ));
        }

        let breakdown = CostAggregator.aggregate(quantity, tier, catalog.source(), outcomes)?;
        debug!(
            event_name = "pricing.quote.calculated",
            correlation_id = "quote_calculation",
            product = %spec.product,
            quantity,
            tier = %breakdown.tier,
            total_cost = %breakdown.total_cost,
            components = breakdown.components.len(),
            "quote calculated"
        );
        Ok(breakdown)
    }

    /// Reloads every table and swaps the catalog in one step. On failure the
    /// current catalog stays in place.
    pub async fn refresh(
        &self,
        provider: &dyn PriceTableProvider,
    ) -> Result<CatalogLoadReport, PricingError> {
        let (catalog, report) = PriceCatalog::load(provider, self.settings.load_options()).await?;
        {
            let mut current = self.catalog.write().unwrap_or_else(PoisonError::into_inner);
            let generation = current.generation() + 1;
            *current = Arc::new(catalog.with_generation(generation));
            self.cache.clear();
        }
        info!(
            event_name = "pricing.catalog.refreshed",
            correlation_id = "catalog_refresh",
            source = ?report.source,
            rejected = report.rejected.len(),
            "price catalog refreshed and cache cleared"
        );
        Ok(report)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn invalidate_category(&self, category: CostCategory) -> usize {
        let evicted = self.cache.invalidate_by_category(category);
        debug!(
            event_name = "pricing.cache.invalidated",
            correlation_id = "cache_admin",
            category = %category,
            evicted,
            "cache category invalidated"
        );
        evicted
    }

    /// Resolves every option at the tiers of `quantities` so later quotes hit
    /// the cache. Does nothing when caching is disabled.
    pub fn prewarm(&self, quantities: &[u32]) -> PrewarmReport {
        if !self.cache.is_enabled() {
            return PrewarmReport::default();
        }

        // A long pass must not hold the lock: a waiting refresh would stall every
        // quote behind it.
        let snapshot = self.catalog();
        let catalog: &PriceCatalog = &snapshot;
        let tiers = catalog.tier_resolver(self.settings.tier_policy);
        let resolver =
            PriceResolver::new(catalog, &tiers, self.cache.as_ref(), self.settings.cache_ttl);

        let warm_tiers: BTreeSet<TierKey> =
            quantities.iter().filter_map(|quantity| tiers.resolve(*quantity).ok()).collect();

        let mut options: Vec<(CostCategory, String)> = Vec::new();
        options.extend(catalog.products().map(|p| (CostCategory::BlankCap, p.name.clone())));
        options.extend(catalog.fabrics().map(|o| (CostCategory::Fabric, o.name.clone())));
        options.extend(catalog.logo_methods().map(|m| (CostCategory::Logo, m.key().to_string())));
        options.extend(catalog.closures().map(|o| (CostCategory::Closure, o.name.clone())));
        options.extend(catalog.accessories().map(|o| (CostCategory::Accessory, o.name.clone())));
        options.extend(
            catalog.delivery_methods().map(|d| (CostCategory::Delivery, d.option.name.clone())),
        );

        let mut report = PrewarmReport {
            tiers: warm_tiers.iter().copied().collect(),
            ..PrewarmReport::default()
        };
        for tier in &warm_tiers {
            for (category, key) in &options {
                match resolver.resolve_at(*category, key, *tier) {
                    Ok(_) => report.entries += 1,
                    Err(_) => report.skipped += 1,
                }
            }
        }

        info!(
            event_name = "pricing.cache.prewarm_complete",
            correlation_id = "cache_prewarm",
            tiers = report.tiers.len(),
            entries = report.entries,
            skipped = report.skipped,
            "pricing cache prewarmed"
        );
        report
    }

    /// Runs [`PricingService::prewarm`] on the blocking pool; callers are not
    /// expected to await the handle.
    pub fn spawn_prewarm(
        self: &Arc<Self>,
        quantities: Vec<u32>,
    ) -> tokio::task::JoinHandle<PrewarmReport> {
        let service = Arc::clone(self);
        tokio::task::spawn_blocking(move || service.prewarm(&quantities))
    }
}
