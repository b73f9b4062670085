use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::ids::{VariantOptionId, VariationTypeId};

use super::value_objects::OptionSelection;
use super::variation_type::VariationType;

// ============================================================================
// Variant Combination Validator
// ============================================================================
//
// Pure check shared by product construction and every later "add variant"
// path: the selection must name exactly one option for each required type,
// and each option must belong to the type it is keyed under.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombinationError {
    MissingType {
        type_id: VariationTypeId,
        type_name: String,
    },
    UnexpectedType(VariationTypeId),
    DuplicateType(VariationTypeId),
    InvalidOption {
        type_id: VariationTypeId,
        type_name: String,
        option_id: VariantOptionId,
    },
}

impl fmt::Display for CombinationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CombinationError::MissingType { type_name, .. } => {
                write!(f, "missing {} option", type_name)
            }
            CombinationError::UnexpectedType(id) => {
                write!(f, "variation type {} does not apply to this product", id)
            }
            CombinationError::DuplicateType(id) => {
                write!(f, "variation type {} selected more than once", id)
            }
            CombinationError::InvalidOption {
                type_name,
                option_id,
                ..
            } => write!(f, "option {} does not belong to {}", option_id, type_name),
        }
    }
}

pub(crate) fn describe_combination_errors(errors: &[CombinationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate `selection` against the product's applicable types.
///
/// Returns the normalized selection on success, or every problem found.
/// Zero required types is valid and requires an empty selection.
pub fn validate_selection(
    required: &[VariationType],
    selection: &[(VariationTypeId, VariantOptionId)],
) -> Result<OptionSelection, Vec<CombinationError>> {
    let mut errors = Vec::new();
    let mut entries: Vec<(VariationTypeId, VariantOptionId)> = Vec::with_capacity(selection.len());

    for &(type_id, option_id) in selection {
        if entries.iter().any(|(t, _)| *t == type_id) {
            errors.push(CombinationError::DuplicateType(type_id));
            continue;
        }

        match required.iter().find(|vt| vt.id() == type_id) {
            None => errors.push(CombinationError::UnexpectedType(type_id)),
            Some(vt) if !vt.has_option(option_id) => {
                errors.push(CombinationError::InvalidOption {
                    type_id,
                    type_name: vt.name().to_string(),
                    option_id,
                })
            }
            Some(_) => {}
        }
        entries.push((type_id, option_id));
    }

    for vt in required {
        if !entries.iter().any(|(t, _)| *t == vt.id()) {
            errors.push(CombinationError::MissingType {
                type_id: vt.id(),
                type_name: vt.name().to_string(),
            });
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    entries.sort_by_key(|(t, _)| *t);
    Ok(OptionSelection::from_sorted(entries))
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(name: &str, values: &[&str]) -> (VariationType, Vec<VariantOptionId>) {
        let mut vt = VariationType::create(name, name).unwrap();
        let ids = values
            .iter()
            .enumerate()
            .map(|(i, v)| vt.add_option(v, v, i as u32).unwrap())
            .collect();
        (vt, ids)
    }

    #[test]
    fn test_complete_selection_passes() {
        let (color, colors) = axis("Color", &["red", "blue"]);
        let (size, sizes) = axis("Size", &["s", "m"]);
        let types = vec![color.clone(), size.clone()];

        let selection =
            validate_selection(&types, &[(size.id(), sizes[1]), (color.id(), colors[0])]).unwrap();

        assert_eq!(selection.len(), 2);
        assert_eq!(selection.option_for(color.id()), Some(colors[0]));
        assert_eq!(selection.option_for(size.id()), Some(sizes[1]));
    }

    #[test]
    fn test_missing_axis_is_reported_by_name() {
        let (color, colors) = axis("Color", &["red"]);
        let (size, _) = axis("Size", &["s"]);
        let types = vec![color.clone(), size.clone()];

        let errors = validate_selection(&types, &[(color.id(), colors[0])]).unwrap_err();
        assert_eq!(
            errors,
            vec![CombinationError::MissingType {
                type_id: size.id(),
                type_name: "size".into()
            }]
        );
        assert_eq!(errors[0].to_string(), "missing size option");
    }

    #[test]
    fn test_option_from_other_axis_is_invalid() {
        let (color, _) = axis("Color", &["red"]);
        let (size, sizes) = axis("Size", &["s"]);
        let types = vec![color.clone(), size];

        let errors = validate_selection(&types, &[(color.id(), sizes[0])]).unwrap_err();
        assert!(matches!(errors[0], CombinationError::InvalidOption { .. }));
    }

    #[test]
    fn test_extra_and_duplicate_axes_are_reported() {
        let (color, colors) = axis("Color", &["red", "blue"]);
        let (size, sizes) = axis("Size", &["s"]);
        let types = vec![color.clone()];

        let errors = validate_selection(
            &types,
            &[
                (color.id(), colors[0]),
                (color.id(), colors[1]),
                (size.id(), sizes[0]),
            ],
        )
        .unwrap_err();

        assert!(errors.contains(&CombinationError::DuplicateType(color.id())));
        assert!(errors.contains(&CombinationError::UnexpectedType(size.id())));
    }

    #[test]
    fn test_simple_product_needs_empty_selection() {
        assert!(validate_selection(&[], &[]).unwrap().is_empty());

        let (color, colors) = axis("Color", &["red"]);
        let errors = validate_selection(&[], &[(color.id(), colors[0])]).unwrap_err();
        assert_eq!(errors, vec![CombinationError::UnexpectedType(color.id())]);
    }
}
