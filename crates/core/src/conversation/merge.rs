//! Field-level merge of a conversational delta into a prior specification.
//!
//! Absent fields keep their prior value untouched. Composite fields merge by
//! identity (position for logos, name for fabrics and accessories) and
//! removals are explicit. Any reference that does not resolve to exactly one
//! prior entry stops the merge with a clarification.

use crate::conversation::clarification::{ClarificationNeeded, ClarificationOption};
use crate::domain::options::normalize_key;
use crate::domain::specification::{
    ListChange, LogoChange, LogoPosition, LogoTarget, PartialSpecification, QuoteSpecification,
    ScalarChange,
};
use crate::errors::PricingError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeResult {
    Merged(QuoteSpecification),
    Clarification(ClarificationNeeded),
}

/// Applies `delta` to `prior`, or builds a new specification when there is
/// none (product and quantity are then required).
pub fn merge(
    prior: Option<&QuoteSpecification>,
    delta: &PartialSpecification,
) -> Result<MergeResult, PricingError> {
    let mut spec = match prior {
        Some(prior) => prior.clone(),
        None => {
            let mut missing = Vec::new();
            if delta.product.is_none() {
                missing.push("product".to_string());
            }
            if delta.quantity.is_none() {
                missing.push("quantity".to_string());
            }
            let (Some(product), Some(quantity)) = (&delta.product, delta.quantity) else {
                return Err(PricingError::IncompleteSpecification { missing });
            };
            QuoteSpecification::new(product.clone(), quantity)
        }
    };

    if let Some(product) = &delta.product {
        if product.trim().is_empty() {
            return Err(PricingError::InvalidSpecification {
                field: "product".to_string(),
                message: "product cannot be blank".to_string(),
            });
        }
        if *product != spec.product {
            spec.product = product.clone();
        }
    }
    if let Some(quantity) = delta.quantity {
        if quantity == 0 {
            return Err(PricingError::InvalidQuantity { quantity });
        }
        spec.quantity = quantity;
    }
    if let Some(colors) = &delta.colors {
        spec.colors = colors.clone();
    }
    apply_scalar(&mut spec.closure, delta.closure.as_ref());
    apply_scalar(&mut spec.delivery, delta.delivery.as_ref());

    if let Err(clarification) = apply_list("fabrics", &mut spec.fabrics, &delta.fabrics) {
        return Ok(MergeResult::Clarification(clarification));
    }
    if let Err(clarification) = apply_list("accessories", &mut spec.accessories, &delta.accessories)
    {
        return Ok(MergeResult::Clarification(clarification));
    }
    if let Err(clarification) = apply_logos(&mut spec, &delta.logos) {
        return Ok(MergeResult::Clarification(clarification));
    }

    Ok(MergeResult::Merged(spec))
}

fn apply_scalar(field: &mut Option<String>, change: Option<&ScalarChange<String>>) {
    match change {
        Some(ScalarChange::Set(value)) if field.as_deref() != Some(value.as_str()) => {
            *field = Some(value.clone());
        }
        Some(ScalarChange::Remove) => *field = None,
        _ => {}
    }
}

fn apply_list(
    field: &str,
    entries: &mut Vec<String>,
    changes: &[ListChange],
) -> Result<(), ClarificationNeeded> {
    for change in changes {
        match change {
            ListChange::Add(name) => {
                let key = normalize_key(name);
                if !entries.iter().any(|entry| normalize_key(entry) == key) {
                    entries.push(name.clone());
                }
            }
            ListChange::Remove(name) => {
                let index = find_one(field, entries, name)?;
                entries.remove(index);
            }
            ListChange::Replace { from: Some(from), to } => {
                let index = find_one(field, entries, from)?;
                entries[index] = to.clone();
            }
            ListChange::Replace { from: None, to } => match entries.len() {
                1 => entries[0] = to.clone(),
                0 => return Err(ClarificationNeeded::no_match(field, to.clone(), Vec::new())),
                _ => {
                    return Err(ClarificationNeeded::ambiguous(
                        field,
                        to.clone(),
                        list_candidates(entries.iter().map(String::as_str)),
                    ))
                }
            },
        }
    }
    Ok(())
}

/// Exact (normalized) name first, then a unique partial match.
fn find_one(field: &str, entries: &[String], reference: &str) -> Result<usize, ClarificationNeeded> {
    let key = normalize_key(reference);
    if let Some(index) = entries.iter().position(|entry| normalize_key(entry) == key) {
        return Ok(index);
    }

    let partial: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| !key.is_empty() && normalize_key(entry).contains(&key))
        .map(|(index, _)| index)
        .collect();
    match partial.as_slice() {
        [index] => Ok(*index),
        [] => Err(ClarificationNeeded::no_match(
            field,
            reference,
            list_candidates(entries.iter().map(String::as_str)),
        )),
        many => Err(ClarificationNeeded::ambiguous(
            field,
            reference,
            list_candidates(many.iter().map(|index| entries[*index].as_str())),
        )),
    }
}

fn list_candidates<'a>(names: impl Iterator<Item = &'a str>) -> Vec<ClarificationOption> {
    names.map(|name| ClarificationOption::named(normalize_key(name), name)).collect()
}

fn apply_logos(spec: &mut QuoteSpecification, changes: &[LogoChange]) -> Result<(), ClarificationNeeded> {
    for change in changes {
        match change {
            LogoChange::Set { position, placement } => {
                spec.logos.insert(*position, placement.clone());
            }
            LogoChange::Update { target, patch } => {
                let position = resolve_target(spec, target)?;
                if let Some(current) = spec.logos.get(&position) {
                    let updated = patch.apply_to(current);
                    spec.logos.insert(position, updated);
                }
            }
            LogoChange::Remove { target } => {
                let position = resolve_target(spec, target)?;
                spec.logos.remove(&position);
            }
        }
    }
    Ok(())
}

fn resolve_target(
    spec: &QuoteSpecification,
    target: &LogoTarget,
) -> Result<LogoPosition, ClarificationNeeded> {
    let all_candidates = || {
        spec.logos
            .iter()
            .map(|(position, placement)| ClarificationOption::logo(*position, placement))
            .collect::<Vec<_>>()
    };

    match target {
        LogoTarget::Position(position) => {
            if spec.logos.contains_key(position) {
                Ok(*position)
            } else {
                Err(ClarificationNeeded::no_match("logos", position.to_string(), all_candidates()))
            }
        }
        LogoTarget::Matching(selector) => {
            let matching: Vec<LogoPosition> = spec
                .logos
                .iter()
                .filter(|(_, placement)| selector.matches(placement))
                .map(|(position, _)| *position)
                .collect();
            match matching.as_slice() {
                [position] => Ok(*position),
                [] => Err(ClarificationNeeded::no_match("logos", selector.to_string(), all_candidates())),
                many => Err(ClarificationNeeded::ambiguous(
                    "logos",
                    selector.to_string(),
                    many.iter()
                        .filter_map(|position| {
                            spec.logos
                                .get(position)
                                .map(|placement| ClarificationOption::logo(*position, placement))
                        })
                        .collect(),
                )),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{merge, MergeResult};
    use crate::conversation::clarification::ClarificationReason;
    use crate::domain::options::{LogoApplication, LogoSize};
    use crate::domain::specification::{
        ListChange, LogoChange, LogoPatch, LogoPlacement, LogoPosition, LogoSelector, LogoTarget,
        PartialSpecification, QuoteSpecification, ScalarChange,
    };
    use crate::errors::PricingError;

    fn four_logo_spec() -> QuoteSpecification {
        let mut spec = QuoteSpecification::new("6P AirFrame HSCS", 800);
        spec.fabrics = vec!["Acrylic".into(), "Trucker Mesh".into()];
        spec.accessories = vec!["Hang Tag".into(), "Inside Label".into()];
        spec.closure = Some("Snapback".into());
        spec.delivery = Some("Regular Delivery".into());
        spec.logos.insert(
            LogoPosition::Front,
            LogoPlacement::new("Rubber", LogoApplication::Patch, LogoSize::Medium),
        );
        spec.logos.insert(
            LogoPosition::Left,
            LogoPlacement::new("Flat Embroidery", LogoApplication::Direct, LogoSize::Small),
        );
        spec.logos.insert(
            LogoPosition::Right,
            LogoPlacement::new("Flat Embroidery", LogoApplication::Direct, LogoSize::Small),
        );
        spec.logos.insert(
            LogoPosition::Back,
            LogoPlacement::new("Leather", LogoApplication::Patch, LogoSize::Small),
        );
        spec
    }

    fn merged(result: Result<MergeResult, PricingError>) -> QuoteSpecification {
        match result.expect("merge should not fail") {
            MergeResult::Merged(spec) => spec,
            MergeResult::Clarification(c) => panic!("unexpected clarification: {}", c.prompt),
        }
    }

    #[test]
    fn empty_delta_keeps_everything() {
        let prior = four_logo_spec();
        assert_eq!(merged(merge(Some(&prior), &PartialSpecification::default())), prior);
    }

    #[test]
    fn quantity_change_touches_nothing_else() {
        let prior = four_logo_spec();
        let delta = PartialSpecification { quantity: Some(600), ..PartialSpecification::default() };

        let spec = merged(merge(Some(&prior), &delta));

        assert_eq!(spec.quantity, 600);
        assert_eq!(QuoteSpecification { quantity: 800, ..spec }, prior);
    }

    #[test]
    fn front_update_preserves_other_positions() {
        let prior = four_logo_spec();
        let delta = PartialSpecification {
            logos: vec![LogoChange::Update {
                target: LogoTarget::Position(LogoPosition::Front),
                patch: LogoPatch {
                    method: Some("3D Embroidery".into()),
                    application: Some(LogoApplication::Direct),
                    size: None,
                },
            }],
            ..PartialSpecification::default()
        };

        let spec = merged(merge(Some(&prior), &delta));

        assert_eq!(
            spec.logos[&LogoPosition::Front],
            LogoPlacement::new("3D Embroidery", LogoApplication::Direct, LogoSize::Medium)
        );
        for position in [LogoPosition::Left, LogoPosition::Right, LogoPosition::Back] {
            assert_eq!(spec.logos[&position], prior.logos[&position], "{position}");
        }
    }

    #[test]
    fn selector_matching_two_patches_needs_clarification() {
        let prior = four_logo_spec();
        let delta = PartialSpecification {
            logos: vec![LogoChange::Remove {
                target: LogoTarget::Matching(LogoSelector {
                    application: Some(LogoApplication::Patch),
                    ..LogoSelector::default()
                }),
            }],
            ..PartialSpecification::default()
        };

        let MergeResult::Clarification(clarification) =
            merge(Some(&prior), &delta).expect("not an error")
        else {
            panic!("two patches should be ambiguous");
        };

        assert_eq!(clarification.field, "logos");
        assert_eq!(clarification.reason, ClarificationReason::AmbiguousReference);
        let ids: Vec<&str> = clarification.candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["front", "back"]);
    }

    #[test]
    fn unique_selector_is_applied() {
        let prior = four_logo_spec();
        let delta = PartialSpecification {
            logos: vec![LogoChange::Update {
                target: LogoTarget::Matching(LogoSelector {
                    method: Some("rubber".into()),
                    ..LogoSelector::default()
                }),
                patch: LogoPatch { size: Some(LogoSize::Large), ..LogoPatch::default() },
            }],
            ..PartialSpecification::default()
        };

        let spec = merged(merge(Some(&prior), &delta));
        assert_eq!(spec.logos[&LogoPosition::Front].size, LogoSize::Large);
    }

    #[test]
    fn removing_an_absent_position_needs_clarification() {
        let mut prior = four_logo_spec();
        prior.logos.remove(&LogoPosition::Back);
        let delta = PartialSpecification {
            logos: vec![LogoChange::Remove { target: LogoTarget::Position(LogoPosition::Back) }],
            ..PartialSpecification::default()
        };

        assert!(matches!(
            merge(Some(&prior), &delta),
            Ok(MergeResult::Clarification(ref c)) if c.reason == ClarificationReason::NoMatch
        ));
    }

    #[test]
    fn list_changes_merge_by_name() {
        let prior = four_logo_spec();
        let delta = PartialSpecification {
            accessories: vec![
                ListChange::Remove("hang tag".into()),
                ListChange::Add("Sticker".into()),
                ListChange::Add("Inside Label".into()),
            ],
            fabrics: vec![ListChange::Replace { from: Some("mesh".into()), to: "Polyester".into() }],
            ..PartialSpecification::default()
        };

        let spec = merged(merge(Some(&prior), &delta));

        assert_eq!(spec.accessories, vec!["Inside Label".to_string(), "Sticker".to_string()]);
        assert_eq!(spec.fabrics, vec!["Acrylic".to_string(), "Polyester".to_string()]);
    }

    #[test]
    fn replace_without_from_needs_a_single_entry() {
        let prior = four_logo_spec();
        let delta = PartialSpecification {
            fabrics: vec![ListChange::Replace { from: None, to: "Polyester".into() }],
            ..PartialSpecification::default()
        };

        assert!(matches!(merge(Some(&prior), &delta), Ok(MergeResult::Clarification(_))));
    }

    #[test]
    fn scalar_removal_is_explicit() {
        let prior = four_logo_spec();
        let delta = PartialSpecification {
            closure: Some(ScalarChange::Remove),
            delivery: Some(ScalarChange::Set("Priority Delivery".into())),
            ..PartialSpecification::default()
        };

        let spec = merged(merge(Some(&prior), &delta));

        assert_eq!(spec.closure, None);
        assert_eq!(spec.delivery.as_deref(), Some("Priority Delivery"));
    }

    #[test]
    fn first_delta_must_name_product_and_quantity() {
        let delta = PartialSpecification { quantity: Some(100), ..PartialSpecification::default() };

        assert_eq!(
            merge(None, &delta),
            Err(PricingError::IncompleteSpecification { missing: vec!["product".to_string()] })
        );
    }

    #[test]
    fn full_delta_on_nothing_rebuilds_the_specification() {
        let spec = four_logo_spec();
        let delta = PartialSpecification::from_specification(&spec);
        assert_eq!(merged(merge(None, &delta)), spec);
    }
}
