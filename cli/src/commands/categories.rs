use crmsync_core::{dependency_order, Category};

use crate::output::print_categories;

/// Print the categories a sync with `only` would visit, in visiting order.
pub fn categories(only: &[Category]) {
    print_categories(&dependency_order(only));
}
