use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::breakdown::PriceSource;
use crate::domain::options::{CostCategory, LogoApplication, LogoMethodKey, LogoSize};
use crate::domain::tier::{TierKey, TierPrices};
use crate::errors::PricingError;
use crate::pricing::cache::{CacheKey, CacheStore};
use crate::pricing::catalog::PriceCatalog;
use crate::pricing::tiers::TierResolver;

/// A unit price traced back to the bracket and table it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPrice {
    pub category: CostCategory,
    /// Display name as stored in the table.
    pub name: String,
    pub unit_price: Decimal,
    pub tier: TierKey,
    pub source: PriceSource,
}

/// Per-category table lookup. Implementations only find the row; the bracket
/// is always chosen by the shared [`TierResolver`].
pub trait ComponentResolver: Send + Sync {
    fn category(&self) -> CostCategory;

    fn lookup<'c>(
        &self,
        catalog: &'c PriceCatalog,
        option_key: &str,
    ) -> Result<(&'c str, &'c TierPrices), PricingError>;
}

pub struct BlankCapResolver;
pub struct FabricResolver;
pub struct LogoMethodResolver;
pub struct ClosureResolver;
pub struct AccessoryResolver;
pub struct DeliveryResolver;

impl ComponentResolver for BlankCapResolver {
    fn category(&self) -> CostCategory {
        CostCategory::BlankCap
    }

    fn lookup<'c>(
        &self,
        catalog: &'c PriceCatalog,
        option_key: &str,
    ) -> Result<(&'c str, &'c TierPrices), PricingError> {
        let product = catalog
            .product(option_key)
            .ok_or_else(|| PricingError::unknown(CostCategory::BlankCap, option_key))?;
        let family = catalog
            .price_tier(&product.price_tier)
            .ok_or_else(|| PricingError::unknown(CostCategory::BlankCap, &product.price_tier))?;
        Ok((product.name.as_str(), &family.prices))
    }
}

impl ComponentResolver for FabricResolver {
    fn category(&self) -> CostCategory {
        CostCategory::Fabric
    }

    fn lookup<'c>(
        &self,
        catalog: &'c PriceCatalog,
        option_key: &str,
    ) -> Result<(&'c str, &'c TierPrices), PricingError> {
        catalog
            .fabric(option_key)
            .map(|option| (option.name.as_str(), &option.prices))
            .ok_or_else(|| PricingError::unknown(CostCategory::Fabric, option_key))
    }
}

impl ComponentResolver for LogoMethodResolver {
    fn category(&self) -> CostCategory {
        CostCategory::Logo
    }

    /// `option_key` is a [`LogoMethodKey`] in its `method|Application|Size` form.
    fn lookup<'c>(
        &self,
        catalog: &'c PriceCatalog,
        option_key: &str,
    ) -> Result<(&'c str, &'c TierPrices), PricingError> {
        let key = parse_logo_key(option_key)?;
        catalog
            .logo_method(&key)
            .map(|method| (method.name.as_str(), &method.prices))
            .ok_or_else(|| PricingError::unknown(CostCategory::Logo, option_key))
    }
}

impl ComponentResolver for ClosureResolver {
    fn category(&self) -> CostCategory {
        CostCategory::Closure
    }

    fn lookup<'c>(
        &self,
        catalog: &'c PriceCatalog,
        option_key: &str,
    ) -> Result<(&'c str, &'c TierPrices), PricingError> {
        catalog
            .closure(option_key)
            .map(|option| (option.name.as_str(), &option.prices))
            .ok_or_else(|| PricingError::unknown(CostCategory::Closure, option_key))
    }
}

impl ComponentResolver for AccessoryResolver {
    fn category(&self) -> CostCategory {
        CostCategory::Accessory
    }

    fn lookup<'c>(
        &self,
        catalog: &'c PriceCatalog,
        option_key: &str,
    ) -> Result<(&'c str, &'c TierPrices), PricingError> {
        catalog
            .accessory(option_key)
            .map(|option| (option.name.as_str(), &option.prices))
            .ok_or_else(|| PricingError::unknown(CostCategory::Accessory, option_key))
    }
}

impl ComponentResolver for DeliveryResolver {
    fn category(&self) -> CostCategory {
        CostCategory::Delivery
    }

    fn lookup<'c>(
        &self,
        catalog: &'c PriceCatalog,
        option_key: &str,
    ) -> Result<(&'c str, &'c TierPrices), PricingError> {
        catalog
            .delivery_method(option_key)
            .map(|method| (method.option.name.as_str(), &method.option.prices))
            .ok_or_else(|| PricingError::unknown(CostCategory::Delivery, option_key))
    }
}

/// Resolver for a tier-priced category. Mold charges are flat and have none.
pub fn resolver_for(category: CostCategory) -> Option<&'static dyn ComponentResolver> {
    match category {
        CostCategory::BlankCap => Some(&BlankCapResolver),
        CostCategory::Fabric => Some(&FabricResolver),
        CostCategory::Logo => Some(&LogoMethodResolver),
        CostCategory::Closure => Some(&ClosureResolver),
        CostCategory::Accessory => Some(&AccessoryResolver),
        CostCategory::Delivery => Some(&DeliveryResolver),
        CostCategory::MoldCharge => None,
    }
}

fn parse_logo_key(option_key: &str) -> Result<LogoMethodKey, PricingError> {
    let mut parts = option_key.split('|').map(str::trim);
    let (Some(method), Some(application), Some(size), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(PricingError::unknown(CostCategory::Logo, option_key));
    };
    let application = application
        .parse::<LogoApplication>()
        .map_err(|_| PricingError::unknown(CostCategory::Logo, option_key))?;
    let size =
        size.parse::<LogoSize>().map_err(|_| PricingError::unknown(CostCategory::Logo, option_key))?;
    Ok(LogoMethodKey::new(method, application, size))
}

/// One pricing pass over a catalog snapshot: a single tier resolver, the shared
/// cache, and the TTL new entries get.
pub struct PriceResolver<'a> {
    catalog: &'a PriceCatalog,
    tiers: &'a TierResolver,
    cache: &'a dyn CacheStore,
    ttl: Duration,
}

impl<'a> PriceResolver<'a> {
    pub fn new(
        catalog: &'a PriceCatalog,
        tiers: &'a TierResolver,
        cache: &'a dyn CacheStore,
        ttl: Duration,
    ) -> Self {
        Self { catalog, tiers, cache, ttl }
    }

    pub fn catalog(&self) -> &'a PriceCatalog {
        self.catalog
    }

    pub fn resolve(
        &self,
        category: CostCategory,
        option_key: &str,
        quantity: u32,
    ) -> Result<ResolvedPrice, PricingError> {
        let tier = self.tiers.resolve(quantity)?;
        self.resolve_at(category, option_key, tier)
    }

    /// Unit price at an already-resolved bracket. Absent prices are
    /// [`PricingError::PriceNotApplicable`], never zero.
    pub fn resolve_at(
        &self,
        category: CostCategory,
        option_key: &str,
        tier: TierKey,
    ) -> Result<ResolvedPrice, PricingError> {
        let cache_key =
            CacheKey::option(category, option_key, tier).in_generation(self.catalog.generation());
        if let Some(hit) = self.cache.get(&cache_key) {
            return Ok(hit);
        }

        let resolver = resolver_for(category).ok_or_else(|| PricingError::InvalidSpecification {
            field: "category".to_string(),
            message: format!("{category} is a flat charge and has no tier price"),
        })?;
        let (name, prices) = resolver.lookup(self.catalog, option_key)?;
        let unit_price = prices.price_at(tier).ok_or_else(|| PricingError::PriceNotApplicable {
            category,
            key: name.to_string(),
            tier,
        })?;

        let resolved = ResolvedPrice {
            category,
            name: name.to_string(),
            unit_price,
            tier,
            source: self.catalog.source(),
        };
        self.cache.set(cache_key, resolved.clone(), self.ttl);
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal::Decimal;

    use super::PriceResolver;
    use crate::domain::breakdown::PriceSource;
    use crate::domain::options::{CostCategory, LogoApplication, LogoMethodKey, LogoSize};
    use crate::domain::tier::{TierKey, STANDARD_BREAKPOINTS};
    use crate::errors::PricingError;
    use crate::pricing::cache::{CacheStore, InMemoryCacheStore, NoopCacheStore};
    use crate::pricing::catalog::PriceCatalog;
    use crate::pricing::fallback::fallback_tables;
    use crate::pricing::tiers::{TierPolicy, TierResolver};

    fn catalog() -> PriceCatalog {
        PriceCatalog::from_tables(fallback_tables(), PriceSource::Live, true)
            .expect("demo tables are valid")
            .0
    }

    #[test]
    fn every_resolver_uses_the_same_bracket() {
        let catalog = catalog();
        let tiers = TierResolver::standard(TierPolicy::UpperInclusive);
        let resolver = PriceResolver::new(&catalog, &tiers, &NoopCacheStore, Duration::from_secs(60));
        let logo = LogoMethodKey::new("3D Embroidery", LogoApplication::Direct, LogoSize::Large);

        let lookups = [
            (CostCategory::BlankCap, "6P AirFrame HSCS".to_string()),
            (CostCategory::Fabric, "Acrylic".to_string()),
            (CostCategory::Logo, logo.to_string()),
            (CostCategory::Closure, "Velcro".to_string()),
            (CostCategory::Accessory, "Hang Tag".to_string()),
            (CostCategory::Delivery, "Regular Delivery".to_string()),
        ];
        for (category, key) in lookups {
            let resolved = resolver.resolve(category, &key, 577).expect("known option");
            assert_eq!(resolved.tier, TierKey(1152), "{category}");
        }
    }

    #[test]
    fn unit_prices_never_increase_with_quantity() {
        let catalog = catalog();
        let tiers = TierResolver::standard(TierPolicy::UpperInclusive);
        let resolver = PriceResolver::new(&catalog, &tiers, &NoopCacheStore, Duration::from_secs(60));

        let mut options: Vec<(CostCategory, String)> = Vec::new();
        options.extend(catalog.products().map(|p| (CostCategory::BlankCap, p.name.clone())));
        options.extend(catalog.fabrics().map(|o| (CostCategory::Fabric, o.name.clone())));
        options.extend(catalog.logo_methods().map(|m| (CostCategory::Logo, m.key().to_string())));
        options.extend(catalog.closures().map(|o| (CostCategory::Closure, o.name.clone())));
        options.extend(catalog.accessories().map(|o| (CostCategory::Accessory, o.name.clone())));
        options
            .extend(catalog.delivery_methods().map(|d| (CostCategory::Delivery, d.option.name.clone())));

        let mut quantities: Vec<u32> = vec![1, 12, 100, 300, 800, 2000, 5000, 15000, 40000];
        quantities.extend(STANDARD_BREAKPOINTS.iter().flat_map(|bp| [*bp, bp + 1]));
        quantities.sort_unstable();

        for (category, key) in options {
            let mut previous: Option<Decimal> = None;
            for quantity in &quantities {
                let Ok(price) = resolver.resolve(category, &key, *quantity) else {
                    continue;
                };
                if let Some(previous) = previous {
                    assert!(price.unit_price <= previous, "{category} {key} at {quantity}");
                }
                previous = Some(price.unit_price);
            }
        }
    }

    #[test]
    fn unknown_option_is_reported_verbatim() {
        let catalog = catalog();
        let tiers = TierResolver::default();
        let resolver = PriceResolver::new(&catalog, &tiers, &NoopCacheStore, Duration::from_secs(60));

        let error = resolver.resolve(CostCategory::Fabric, "Unobtanium", 100).expect_err("unknown");
        assert_eq!(error, PricingError::unknown(CostCategory::Fabric, "Unobtanium"));
    }

    #[test]
    fn absent_price_is_not_applicable_rather_than_zero() {
        let catalog = catalog();
        let tiers = TierResolver::default();
        let resolver = PriceResolver::new(&catalog, &tiers, &NoopCacheStore, Duration::from_secs(60));

        let error = resolver.resolve(CostCategory::Delivery, "Air Freight", 100).expect_err("n/a");
        assert!(matches!(error, PricingError::PriceNotApplicable { tier: TierKey(144), .. }));
    }

    #[test]
    fn free_fabric_is_an_explicit_zero() {
        let catalog = catalog();
        let tiers = TierResolver::default();
        let resolver = PriceResolver::new(&catalog, &tiers, &NoopCacheStore, Duration::from_secs(60));

        let chino = resolver.resolve(CostCategory::Fabric, "chino twill", 300).expect("free");
        assert_eq!(chino.unit_price, Decimal::ZERO);
        assert_eq!(chino.name, "Chino Twill");
    }

    #[test]
    fn malformed_logo_key_is_unknown() {
        let catalog = catalog();
        let tiers = TierResolver::default();
        let resolver = PriceResolver::new(&catalog, &tiers, &NoopCacheStore, Duration::from_secs(60));

        assert!(matches!(
            resolver.resolve(CostCategory::Logo, "Rubber|Sticker|Medium", 100),
            Err(PricingError::UnknownOption { category: CostCategory::Logo, .. })
        ));
    }

    #[test]
    fn repeated_lookups_are_served_from_cache() {
        let catalog = catalog();
        let tiers = TierResolver::default();
        let cache = InMemoryCacheStore::new();
        let resolver = PriceResolver::new(&catalog, &tiers, &cache, Duration::from_secs(60));

        let first = resolver.resolve(CostCategory::Accessory, "Hang Tag", 500).expect("priced");
        let second = resolver.resolve(CostCategory::Accessory, "hang tag", 500).expect("priced");

        assert_eq!(first, second);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }
}
