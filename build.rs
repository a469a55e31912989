use std::collections::HashSet;
use std::path::Path;

const CATEGORIES: &[&str] = &["abbreviation", "process", "material"];

fn main() {
    let rules_path = Path::new("rules/heuristic_rules.json");
    validate_rules_file(rules_path);
    set_build_dependencies();
}

fn validate_rules_file(rules_path: &Path) {
    assert!(
        rules_path.exists(),
        "\n\nRULES BUILD ERROR: File not found\n\
         Path: {}\n\
         The heuristic rule table is embedded into the binary and must exist.\n",
        rules_path.display()
    );

    let contents = std::fs::read_to_string(rules_path).unwrap_or_else(|e| {
        panic!(
            "\n\nRULES BUILD ERROR: Failed to read file\n\
             Path: {}\n\
             Error: {e}\n",
            rules_path.display()
        );
    });

    let table: serde_json::Value = serde_json::from_str(&contents).unwrap_or_else(|e| {
        panic!(
            "\n\nRULES BUILD ERROR: Invalid JSON\n\
             Path: {}\n\
             Error: {e}\n\
             Hint: Check for missing commas, brackets, or invalid syntax.\n",
            rules_path.display()
        );
    });

    validate_table_structure(&table);
}

fn validate_table_structure(table: &serde_json::Value) {
    assert!(
        table.get("version").and_then(serde_json::Value::as_str).is_some(),
        "\n\nRULES BUILD ERROR: Missing 'version' string\n"
    );

    let rules = table
        .get("rules")
        .and_then(serde_json::Value::as_array)
        .unwrap_or_else(|| {
            panic!(
                "\n\nRULES BUILD ERROR: Missing 'rules' array\n\
                 The rule table must have a top-level 'rules' array.\n"
            );
        });

    let mut ids = HashSet::new();
    let mut alternates = 0;
    for (index, rule) in rules.iter().enumerate() {
        let id = rule
            .get("id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_else(|| panic!("\n\nRULES BUILD ERROR: Rule at index {index} missing 'id'\n"));
        assert!(
            ids.insert(id),
            "\n\nRULES BUILD ERROR: Duplicate rule id '{id}'\n"
        );
        alternates += validate_rule(rule, id);
    }

    println!(
        "cargo:warning=Validated heuristic rules: {} rules, {alternates} alternates",
        rules.len()
    );
}

fn validate_rule(rule: &serde_json::Value, id: &str) -> usize {
    let category = rule
        .get("category")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("<missing>");
    assert!(
        CATEGORIES.contains(&category),
        "\n\nRULES BUILD ERROR: Rule '{id}' has unknown category '{category}'\n\
         Expected one of: {}\n",
        CATEGORIES.join(", ")
    );

    let canonical = rule
        .get("canonical")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("");
    assert!(
        !canonical.trim().is_empty(),
        "\n\nRULES BUILD ERROR: Rule '{id}' has an empty 'canonical' term\n"
    );

    let count = rule
        .get("alternates")
        .and_then(serde_json::Value::as_array)
        .map_or(0, Vec::len);
    assert!(
        count > 0,
        "\n\nRULES BUILD ERROR: Rule '{id}' lists no alternates\n"
    );

    if let Some(confidence) = rule.get("confidence") {
        let value = confidence.as_f64().unwrap_or(-1.0);
        assert!(
            (0.0..=1.0).contains(&value),
            "\n\nRULES BUILD ERROR: Rule '{id}' confidence must be within [0, 1], got {confidence}\n"
        );
    }

    count
}

fn set_build_dependencies() {
    println!("cargo:rerun-if-changed=rules/heuristic_rules.json");
    println!("cargo:rerun-if-changed=build.rs");
}
