//! Country drivers.
//!
//! Each driver knows one site's layout: where the listing starts, how its
//! pages chain, and which elements hold the law text or files. The crawl
//! engine in [`crate::scrapers`] does the rest.

mod albania;
mod armenia;
mod bangladesh;
mod belgium;
mod china;
mod drc;
mod france;
mod india;
mod italy;
mod kosovo;
mod philippines;
mod vietnam;

pub use albania::Albania;
pub use armenia::Armenia;
pub use bangladesh::Bangladesh;
pub use belgium::{Belgium, BelgianLanguage};
pub use china::China;
pub use drc::Drc;
pub use france::France;
pub use india::India;
pub use italy::Italy;
pub use kosovo::Kosovo;
pub use philippines::Philippines;
pub use vietnam::Vietnam;

use chrono::NaiveDate;

use crate::scrapers::{BrowserDriver, ListingSite, SiteInfo};

/// A runnable driver, by how it reaches its site.
pub enum Driver {
    Listing(Box<dyn ListingSite>),
    Browser(Box<dyn BrowserDriver>),
}

impl Driver {
    pub fn info(&self) -> SiteInfo {
        match self {
            Self::Listing(site) => site.info(),
            Self::Browser(driver) => driver.info(),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Listing(_) => "http",
            Self::Browser(_) => "browser",
        }
    }
}

/// Names of the built-in drivers, in `list` order.
pub const BUILTIN: &[&str] = &[
    "albania",
    "armenia",
    "bangladesh",
    "belgium",
    "china",
    "drc",
    "france",
    "india",
    "italy",
    "kosovo",
    "philippines",
    "vietnam",
];

/// Look up a built-in driver by name.
pub fn builtin(name: &str) -> Option<Driver> {
    let driver = match name {
        "albania" => Driver::Listing(Box::new(Albania)),
        "armenia" => Driver::Listing(Box::new(Armenia)),
        "bangladesh" => Driver::Listing(Box::new(Bangladesh)),
        "china" => Driver::Listing(Box::new(China)),
        "india" => Driver::Listing(Box::new(India)),
        "philippines" => Driver::Listing(Box::new(Philippines)),
        "vietnam" => Driver::Listing(Box::new(Vietnam)),
        "belgium" => Driver::Browser(Box::new(Belgium::all_languages())),
        "drc" => Driver::Browser(Box::new(Drc)),
        "france" => Driver::Browser(Box::new(France)),
        "italy" => Driver::Browser(Box::new(Italy)),
        "kosovo" => Driver::Browser(Box::new(Kosovo)),
        _ => return None,
    };
    Some(driver)
}

/// Reformat a date found on a page as `YYYY-MM-DD`, if it parses with
/// `format`.
pub(crate) fn iso_date(raw: &str, format: &str) -> Option<String> {
    NaiveDate::parse_from_str(raw.trim(), format)
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_resolves() {
        for name in BUILTIN {
            let driver = builtin(name).unwrap();
            assert_eq!(driver.info().name, *name);
        }
        assert!(builtin("atlantis").is_none());
        assert_eq!(builtin("kosovo").unwrap().mode(), "browser");
    }

    #[test]
    fn test_iso_date() {
        assert_eq!(iso_date(" 05/03/2019", "%d/%m/%Y").as_deref(), Some("2019-03-05"));
        assert_eq!(iso_date("...", "%d/%m/%Y"), None);
    }
}
