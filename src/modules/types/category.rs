//! Credential categories

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Namespace a credential record lives in.
///
/// The same product may be registered under more than one category (Zoho is
/// both a business application and an e-commerce backend); records in
/// different categories never see each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Databases and warehouses
    Db,
    /// Spreadsheets
    Ss,
    /// Business applications (CRM, ERP, helpdesk)
    App,
    /// E-commerce platforms
    Ecom,
    /// DevOps and IoT / observability stores
    Doi,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[
            Category::Db,
            Category::Ss,
            Category::App,
            Category::Ecom,
            Category::Doi,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Db => "db",
            Category::Ss => "ss",
            Category::App => "app",
            Category::Ecom => "ecom",
            Category::Doi => "doi",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "db" | "database" | "databases" => Ok(Category::Db),
            "ss" | "spreadsheet" | "spreadsheets" => Ok(Category::Ss),
            "app" | "apps" | "application" | "applications" => Ok(Category::App),
            "ecom" | "ecommerce" => Ok(Category::Ecom),
            "doi" | "devops" => Ok(Category::Doi),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_str() {
        assert_eq!(Category::from_str("db").unwrap(), Category::Db);
        assert_eq!(Category::from_str("SS").unwrap(), Category::Ss);
        assert_eq!(Category::from_str("ecommerce").unwrap(), Category::Ecom);
        assert_eq!(Category::from_str(" doi ").unwrap(), Category::Doi);
        assert!(Category::from_str("warehouse").is_err());
    }

    #[test]
    fn test_category_display_round_trips() {
        for category in Category::all() {
            assert_eq!(Category::from_str(&category.to_string()).unwrap(), *category);
        }
    }

    #[test]
    fn test_category_serde() {
        let json = serde_json::to_string(&Category::App).unwrap();
        assert_eq!(json, "\"app\"");
    }
}
