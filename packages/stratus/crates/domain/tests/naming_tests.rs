use domain::naming::{hash_string_to_pretty_string, NamingAuthority, PRETTY_CHARS};
use std::collections::HashSet;

const LONG_NAME: &str = "VeryLongFunctionNameThatExceedsSixtyFourCharactersWhenPrefixedWithAppAndStage";

#[test]
fn test_long_function_name_fits_with_hash() {
    let authority = NamingAuthority::new("my-app", "production");
    let name = authority.prefix_name(64, LONG_NAME, "").unwrap();

    assert!(name.len() <= 64, "{} is {} chars", name, name.len());
    assert!(name.starts_with("my-app-production-VeryLong"));

    let hash = &name[name.len() - 8..];
    assert!(hash.chars().all(|c| PRETTY_CHARS.contains(c)));
    assert_eq!(
        hash,
        hash_string_to_pretty_string(&format!("my-app-production-{}", LONG_NAME), 8)
    );
}

#[test]
fn test_names_are_deterministic_and_bounded() {
    let authority = NamingAuthority::new("shop", "pr-1234");
    for max in [16usize, 24, 32, 63, 64, 80, 255] {
        for logical in ["Api", "OrdersTable", LONG_NAME, "Web Site 2"] {
            for suffix in ["", ".fifo", "-useast1"] {
                if max < suffix.len() + 8 {
                    continue;
                }
                let first = authority.prefix_name(max, logical, suffix).unwrap();
                let second = authority.prefix_name(max, logical, suffix).unwrap();
                assert_eq!(first, second);
                assert!(first.len() <= max, "{} > {}", first, max);
                assert!(first.ends_with(suffix));
            }
        }
    }
}

#[test]
fn test_truncated_names_stay_distinct() {
    let authority = NamingAuthority::new("shop", "dev");
    let names: HashSet<String> = (0..200)
        .map(|i| authority.prefix_name(32, &format!("{}{}", LONG_NAME, i), "").unwrap())
        .collect();
    assert_eq!(names.len(), 200);
}

#[test]
fn test_stages_do_not_collide() {
    let dev = NamingAuthority::new("shop", "dev");
    let prod = NamingAuthority::new("shop", "prod");
    assert_ne!(
        dev.prefix_name(64, LONG_NAME, "").unwrap(),
        prod.prefix_name(64, LONG_NAME, "").unwrap()
    );
}
