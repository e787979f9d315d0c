//! Product and name resolution.
//!
//! Matching is a case-insensitive substring test, first match in catalog
//! order. There is no fuzzy matching.

use mercadito_core::Product;

/// Outcome of resolving a product name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    Found(&'a Product),
    NotFound,
}

impl<'a> Resolution<'a> {
    /// The matched product, if any.
    #[must_use]
    pub const fn product(self) -> Option<&'a Product> {
        match self {
            Self::Found(product) => Some(product),
            Self::NotFound => None,
        }
    }
}

/// True when `candidate` contains `query`, ignoring case.
fn contains_ignore_case(candidate: &str, query: &str) -> bool {
    candidate.to_lowercase().contains(query)
}

fn normalize_query(query: &str) -> Option<String> {
    let query = query.trim().to_lowercase();
    (!query.is_empty()).then_some(query)
}

/// Resolve a typed product name against a catalog snapshot.
#[must_use]
pub fn resolve<'a>(products: &'a [Product], name: &str) -> Resolution<'a> {
    let Some(query) = normalize_query(name) else {
        return Resolution::NotFound;
    };

    products
        .iter()
        .find(|product| contains_ignore_case(&product.name, &query))
        .map_or(Resolution::NotFound, Resolution::Found)
}

/// Resolve a name against a plain list of names (categories, brands).
#[must_use]
pub fn match_name<'a>(names: &'a [String], query: &str) -> Option<&'a str> {
    let query = normalize_query(query)?;
    names
        .iter()
        .find(|name| contains_ignore_case(name, &query))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use mercadito_core::Price;

    use super::*;

    fn catalog() -> Vec<Product> {
        vec![
            Product::new("1", "Café Molido", Price::from_cents(1000)),
            Product::new("2", "Cafe Tostado", Price::from_cents(1200)),
            Product::new("3", "Pan Integral", Price::from_cents(250)),
        ]
    }

    #[test]
    fn test_case_insensitive_substring() {
        let products = catalog();
        let found = resolve(&products, "INTEGRAL").product().expect("found");
        assert_eq!(found.id.as_str(), "3");
    }

    #[test]
    fn test_first_match_in_catalog_order() {
        let products = catalog();
        // Both "Café Molido" and "Cafe Tostado" contain "caf".
        let found = resolve(&products, "caf").product().expect("found");
        assert_eq!(found.id.as_str(), "1");
    }

    #[test]
    fn test_no_fuzzy_matching() {
        let products = catalog();
        assert_eq!(resolve(&products, "Tostao"), Resolution::NotFound);
        assert_eq!(resolve(&products, "Soda"), Resolution::NotFound);
    }

    #[test]
    fn test_blank_query_is_not_found() {
        let products = catalog();
        assert_eq!(resolve(&products, "  "), Resolution::NotFound);
        assert_eq!(match_name(&["Bebidas".to_string()], ""), None);
    }

    #[test]
    fn test_match_name() {
        let names = vec!["Bebidas".to_string(), "Panadería".to_string()];
        assert_eq!(match_name(&names, "pan"), Some("Panadería"));
        assert_eq!(match_name(&names, "lácteos"), None);
    }
}
