use colored::Colorize;
use crmsync_core::Category;
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_categories(categories: &[Category]) {
    println!("{}", categories_table(categories));
}

/// One row per category: slug, collection, identity field, deletion policy
/// and dependencies.
fn categories_table(categories: &[Category]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Category", "Collection", "Key", "Delete", "Depends on"]);
    for category in categories {
        let depends_on = category
            .depends_on()
            .iter()
            .map(Category::slug)
            .collect::<Vec<_>>()
            .join(", ");
        builder.push_record([
            category.slug().to_string(),
            category.resource().to_string(),
            category.identity_field().to_string(),
            if category.allows_deletion() { "yes" } else { "no" }.to_string(),
            if depends_on.is_empty() { "-".to_string() } else { depends_on },
        ]);
    }
    builder.build().with(Style::rounded()).to_string()
}
