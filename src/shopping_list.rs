use std::collections::BTreeMap;

use crate::{
    constants::{SHOPPING_LIST_EMPTY, SHOPPING_LIST_HEADER},
    schema::{IngredientTotal, RecipePart},
};

/// Sums amounts per (ingredient name, unit) across every part, ordered by
/// name then unit.
pub fn aggregate(parts: &[RecipePart]) -> Vec<IngredientTotal> {
    let mut totals: BTreeMap<(&str, &str), i64> = BTreeMap::new();
    for part in parts {
        *totals
            .entry((part.name.as_str(), part.measurement_unit.as_str()))
            .or_insert(0) += i64::from(part.amount);
    }

    totals
        .into_iter()
        .map(|((name, measurement_unit), amount)| IngredientTotal {
            name: name.to_string(),
            measurement_unit: measurement_unit.to_string(),
            amount,
        })
        .collect()
}

/// Renders the cart's summed ingredients as a plain-text shopping list.
///
/// `totals` are expected grouped by (name, unit) already; they are listed in
/// the order given.
pub fn render(totals: &[IngredientTotal]) -> String {
    if totals.is_empty() {
        return SHOPPING_LIST_EMPTY.to_string();
    }

    let mut text = format!("{SHOPPING_LIST_HEADER}\n\n");
    for total in totals {
        text += &format!(
            "{} - {} {}.\n",
            total.name, total.amount, total.measurement_unit
        );
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(name: &str, amount: i64, unit: &str) -> IngredientTotal {
        IngredientTotal {
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    fn part(recipe_id: i32, ingredient_id: i32, name: &str, amount: i32, unit: &str) -> RecipePart {
        RecipePart {
            recipe_id,
            ingredient_id,
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn amounts_are_summed_across_recipes() {
        let parts = [
            part(1, 10, "flour", 200, "g"),
            part(1, 11, "eggs", 2, "pcs"),
            part(2, 10, "flour", 100, "g"),
        ];

        assert_eq!(
            aggregate(&parts),
            vec![total("eggs", 2, "pcs"), total("flour", 300, "g")]
        );
    }

    #[test]
    fn same_name_in_other_units_stays_separate() {
        let parts = [part(1, 10, "milk", 200, "ml"), part(2, 12, "milk", 1, "cup")];

        assert_eq!(
            aggregate(&parts),
            vec![total("milk", 1, "cup"), total("milk", 200, "ml")]
        );
    }

    #[test]
    fn empty_cart_renders_fixed_message() {
        assert_eq!(render(&[]), "Shopping cart is empty");
    }

    #[test]
    fn one_line_per_group_after_header() {
        let text = render(&[total("eggs", 2, "pcs"), total("flour", 300, "g")]);

        assert_eq!(
            text,
            "To cook the selected recipes you will need:\n\neggs - 2 pcs.\nflour - 300 g.\n"
        );
    }
}
